use std::fmt;

/// Errors surfaced by the slicing, painting and export pipeline.
#[derive(Debug)]
pub enum EditorError {
    /// Source image failed to load or decode.
    RasterDecode(String),
    /// A drawing surface could not be acquired (no session, zero-sized raster, ...).
    ContextUnavailable(String),
    /// Opaque passthrough of the generation service's failure.
    GenerationUpstream(String),
    /// An operation was requested before its inputs were ready.
    Precondition(String),
    /// Encoding a finished raster failed.
    Encode(String),
    /// Filesystem failure in the I/O layer.
    Io(std::io::Error),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::RasterDecode(e) => write!(f, "raster decode error: {}", e),
            EditorError::ContextUnavailable(e) => write!(f, "drawing context unavailable: {}", e),
            EditorError::GenerationUpstream(e) => write!(f, "generation failed: {}", e),
            EditorError::Precondition(e) => write!(f, "precondition failed: {}", e),
            EditorError::Encode(e) => write!(f, "encode error: {}", e),
            EditorError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
