//! Error types shared by every engine subsystem.
//!
//! Configuration mistakes (noise dimensionality, malformed meshes, broken biome
//! tables, unreadable config files) are reported when the offending value is
//! constructed. GPU compile and link failures abort the draw path of the frame
//! that triggered them. Resources that are merely not ready yet are never
//! errors; the pipeline skips them and polls again on the next frame.

use thiserror::Error;

/// Every failure the engine can surface to its caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A coordinate, translation or scale vector has the wrong number of components.
    #[error("noise dimensionality mismatch: expected {expected} components, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the noise field.
        expected: usize,
        /// Length of the vector that was supplied.
        actual: usize,
    },

    /// A fractal noise was built without any base field.
    #[error("fractal noise requires at least one base noise field")]
    EmptyFractal,

    /// A gradient lattice has no dimensions or a zero-sized dimension.
    #[error("invalid noise lattice: {0}")]
    InvalidLattice(String),

    /// Mesh attributes or faces violate the triangle mesh invariants.
    #[error("malformed mesh: {0}")]
    MalformedMesh(String),

    /// The biome table cannot resolve every range to a known biome.
    #[error("invalid biome configuration: {0}")]
    BiomeConfiguration(String),

    /// A chunk manager has a zero-sized chunk, window or atlas.
    #[error("invalid chunk manager configuration: {0}")]
    ChunkConfiguration(String),

    /// A shader module was rejected by the GPU backend.
    #[error("shader `{id}` failed to compile: {message}")]
    ShaderCompilation {
        /// Identifier of the shader.
        id: String,
        /// Backend diagnostic.
        message: String,
    },

    /// Vertex and fragment stages could not be linked into a pipeline.
    #[error("program `{id}` failed to link: {message}")]
    ProgramLink {
        /// Identifier of the program.
        id: String,
        /// Backend diagnostic.
        message: String,
    },

    /// A texture source could not be decoded into RGBA pixels.
    #[error("texture `{id}` could not be decoded: {source}")]
    TextureDecode {
        /// Identifier of the texture.
        id: String,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// No GPU adapter satisfied the request.
    #[error("no compatible GPU adapter: {0}")]
    Adapter(String),

    /// The adapter refused to hand out a device.
    #[error("GPU device request failed: {0}")]
    Device(String),

    /// The window surface could not be created, configured or acquired.
    #[error("surface error: {0}")]
    Surface(String),

    /// The windowing system refused to create the event loop or the window.
    #[error("window error: {0}")]
    Window(String),

    /// A worker answered for a chunk manager that does not exist.
    #[error("unknown chunk manager index {0}")]
    UnknownChunkManager(usize),

    /// An entity referenced by id is not in the scene.
    #[error("unknown entity {0}")]
    UnknownEntity(u64),

    /// Reading a file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON document could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;
