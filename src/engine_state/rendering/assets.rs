//! Asynchronously loaded values.
//!
//! Shader sources and decoded images may arrive after the entity using them has been
//! created. An `Asset` is a write-once slot shared between the loader and the render
//! pipeline; the pipeline polls it once per frame and skips draws until it is ready.

use std::sync::{Arc, OnceLock};

#[cfg(target_family = "wasm")]
use wasm_thread as thread;

#[cfg(not(target_family = "wasm"))]
use std::thread;

/// Readiness of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// Still loading.
    Pending,
    /// Loaded successfully.
    Ready,
    /// Loading failed; the message is available from `Asset::error`.
    Failed,
}

/// A write-once value that may still be loading.
#[derive(Debug)]
pub struct Asset<T> {
    slot: Arc<OnceLock<Result<T, String>>>,
}

impl<T> Clone for Asset<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

/// Completes the asset it was created with.
#[derive(Debug)]
pub struct AssetSender<T> {
    slot: Arc<OnceLock<Result<T, String>>>,
}

impl<T> AssetSender<T> {
    /// Stores the loaded value. A second completion is ignored.
    pub fn complete(self, value: Result<T, String>) {
        let _ = self.slot.set(value);
    }
}

impl<T> Asset<T> {
    /// An asset that is available immediately.
    pub fn ready(value: T) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Ok(value));
        Self {
            slot: Arc::new(slot),
        }
    }

    /// An empty asset and the sender that completes it.
    pub fn pending() -> (Self, AssetSender<T>) {
        let slot = Arc::new(OnceLock::new());
        (
            Self { slot: slot.clone() },
            AssetSender { slot },
        )
    }

    /// Current readiness.
    pub fn state(&self) -> AssetState {
        match self.slot.get() {
            None => AssetState::Pending,
            Some(Ok(_)) => AssetState::Ready,
            Some(Err(_)) => AssetState::Failed,
        }
    }

    /// The value once loaded.
    pub fn get(&self) -> Option<&T> {
        self.slot.get().and_then(|value| value.as_ref().ok())
    }

    /// The failure message, if loading failed.
    pub fn error(&self) -> Option<&str> {
        self.slot
            .get()
            .and_then(|value| value.as_ref().err())
            .map(String::as_str)
    }

    /// Whether both handles point at the same slot.
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Send + Sync + 'static> Asset<T> {
    /// Runs `load` on a loader thread and completes the asset with its result.
    pub fn load_with<F>(load: F) -> Self
    where
        F: FnOnce() -> Result<T, String> + Send + 'static,
    {
        let (asset, sender) = Self::pending();
        thread::spawn(move || sender.complete(load()));
        asset
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn pending_until_completed() {
        let (asset, sender) = Asset::<u32>::pending();
        assert_eq!(asset.state(), AssetState::Pending);
        assert_eq!(asset.get(), None);

        let shared = asset.clone();
        sender.complete(Ok(7));
        assert_eq!(shared.state(), AssetState::Ready);
        assert_eq!(asset.get(), Some(&7));
        assert!(asset.same_slot(&shared));
    }

    #[test]
    fn failure_is_reported() {
        let (asset, sender) = Asset::<u32>::pending();
        sender.complete(Err("missing file".to_owned()));
        assert_eq!(asset.state(), AssetState::Failed);
        assert_eq!(asset.error(), Some("missing file"));
    }

    #[test]
    fn loader_thread_completes_the_asset() {
        let asset = Asset::load_with(|| Ok::<_, String>("source".to_owned()));
        let deadline = web_time::Instant::now() + Duration::from_secs(5);
        while asset.state() == AssetState::Pending && web_time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(asset.get().map(String::as_str), Some("source"));
    }
}
