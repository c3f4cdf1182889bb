pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use config::{MergeConfig, PageLocatorConfig, PipelineConfig, RefineConfig};
pub use detection::{PageCrop, locate_page, refine};
pub use error::{Error, Result};
pub use models::{BoundingBox, CandidateFeatures, Contour, Quadrilateral};
pub use pipeline::{DebugConfig, FailureReason, PipelineResult, PipelineRun, QuestionPipeline, Stage, StageLog};
pub use storage::{ProcessOutcome, process_file};
