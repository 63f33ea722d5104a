//! # Voxel World Application Entry Point
//!
//! Native entry point; calls into the library's `run()`. For web applications, see
//! `run_web()` in the library.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json]
//! ```

fn main() {
    #[cfg(not(target_family = "wasm"))]
    if let Err(err) = voxel_world::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
