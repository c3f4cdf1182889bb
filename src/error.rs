use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Conditions that abort a single invocation.
///
/// Ordinary content variation (no page found, no candidate block) is never
/// reported through this type; see [`crate::pipeline::FailureReason`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("cannot rectify degenerate quadrilateral {0:?}")]
    DegenerateQuad([(f32, f32); 4]),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("debug directory is not empty: {0}")]
    DebugDirNotEmpty(PathBuf),
}
