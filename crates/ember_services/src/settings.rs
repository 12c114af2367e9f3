//! The DefaultPlugin-equivalent configuration surface: the handful of
//! options the core actually reads at startup, plus the filesystem
//! adapter trait it consumes but never implements.

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("io error at '{path}': {source}")]
    Io { path: String, source: std::io::Error },
}

/// The filesystem interface the core consumes. Its implementation (OS
/// filesystem, browser storage, virtual archive, ...) is a host concern.
pub trait FilesystemAdapter: Send + Sync {
    fn read_text(&self, path: &str) -> Result<String, FsError>;
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>, FsError>;
    fn write(&self, path: &str, data: &[u8]) -> Result<(), FsError>;
    fn exists(&self, path: &str) -> bool;
    fn list_directory(&self, path: &str) -> Result<Vec<String>, FsError>;
    fn make_directory(&self, path: &str) -> Result<(), FsError>;
    fn delete(&self, path: &str) -> Result<(), FsError>;
}

/// Recognized startup configuration. `surface` is generic over whatever
/// drawing-surface handle the host provides (a window, a canvas, ...);
/// the core never inspects it beyond handing it to the GPU device.
pub struct EngineConfig<S> {
    pub surface: S,
    pub container: Option<String>,
    pub gravity: Option<[f32; 2]>,
    pub filesystem_adapter: Option<Arc<dyn FilesystemAdapter>>,
}

impl<S> EngineConfig<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, container: None, gravity: None, filesystem_adapter: None }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_gravity(mut self, gravity: [f32; 2]) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn with_filesystem_adapter(mut self, adapter: Arc<dyn FilesystemAdapter>) -> Self {
        self.filesystem_adapter = Some(adapter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_leave_optional_fields_unset() {
        let config = EngineConfig::new("surface-handle");
        assert!(config.container.is_none());
        assert!(config.gravity.is_none());
        assert!(config.filesystem_adapter.is_none());
    }

    #[test]
    fn builder_methods_set_the_expected_fields() {
        let config = EngineConfig::new("surface-handle").with_container("#game").with_gravity([0.0, -9.8]);
        assert_eq!(config.container.as_deref(), Some("#game"));
        assert_eq!(config.gravity, Some([0.0, -9.8]));
    }
}
