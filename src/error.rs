//! Error types

use thiserror::Error;

/// Failure loading or saving a buffer snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("bad snapshot magic")]
    BadMagic,
    #[error("malformed snapshot header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid snapshot geometry {width}x{height}")]
    BadGeometry { width: i32, height: i32 },
    #[error("snapshot cell size {found} does not match this buffer's {expected}")]
    CellSizeMismatch { expected: usize, found: usize },
    #[error("snapshot holds {found} cell bytes, header promises {expected}")]
    SizeMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
