#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from question_crop for tests
pub use question_crop::{BoundingBox, FailureReason, Quadrilateral, QuestionPipeline, process_file};
