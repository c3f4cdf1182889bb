use image::{DynamicImage, GrayImage, RgbImage};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::detection::{self, PageCrop};
use crate::error::{Error, Result};
use crate::models::{BoundingBox, Quadrilateral};

/// One labelled snapshot of an intermediate image.
#[derive(Clone)]
pub struct Stage {
    pub label: String,
    pub image: DynamicImage,
}

/// Per-call accumulator of diagnostic snapshots.
///
/// A disabled log never evaluates the snapshot closures, so collecting costs
/// nothing unless asked for. Nothing in the pipeline reads stages back.
#[derive(Clone, Default)]
pub struct StageLog {
    enabled: bool,
    stages: Vec<Stage>,
}

impl StageLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stages: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a snapshot; `image` is only called when the log is enabled.
    pub fn record(&mut self, label: impl Into<String>, image: impl FnOnce() -> DynamicImage) {
        if self.enabled {
            self.stages.push(Stage {
                label: label.into(),
                image: image(),
            });
        }
    }

    /// Append another log's stages after this one's.
    pub fn append(&mut self, other: StageLog) {
        self.stages.extend(other.stages);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn labels(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Machine-readable reasons a photo produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The input could not be read or decoded.
    ReadFail,
    /// The pipeline ran but no block cleared the candidate floor.
    NoCandidate,
    /// The output could not be persisted.
    WriteFail,
    /// An unexpected condition aborted the invocation.
    InternalError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ReadFail => "read_fail",
            FailureReason::NoCandidate => "no_candidate",
            FailureReason::WriteFail => "write_fail",
            FailureReason::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the candidate rectifier for one page crop.
///
/// Either all three images/quad are present, or none are.
pub struct PipelineResult {
    /// Winning block in page-crop coordinates.
    pub best_quad: Option<Quadrilateral>,
    /// The block warped upright, in color.
    pub rectified: Option<RgbImage>,
    /// Binarized rendering of `rectified`.
    pub final_binary: Option<GrayImage>,
    pub stages: StageLog,
}

impl PipelineResult {
    pub fn no_candidate(stages: StageLog) -> Self {
        Self {
            best_quad: None,
            rectified: None,
            final_binary: None,
            stages,
        }
    }

    pub fn is_success(&self) -> bool {
        self.final_binary.is_some()
    }

    pub fn failure(&self) -> Option<FailureReason> {
        if self.is_success() {
            None
        } else {
            Some(FailureReason::NoCandidate)
        }
    }
}

/// Everything produced by one photo-to-binary run.
pub struct PipelineRun {
    /// Where the page crop sits in the photo.
    pub page_rect: BoundingBox,
    /// Page detection found nothing and the whole photo was used.
    pub page_fallback: bool,
    pub result: PipelineResult,
}

impl PipelineRun {
    /// The winning quadrilateral mapped back into photo coordinates.
    pub fn photo_quad(&self) -> Option<Quadrilateral> {
        self.result
            .best_quad
            .map(|q| q.translate(self.page_rect.x as f32, self.page_rect.y as f32))
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Write each stage as `NN_<label>.png` into a fresh subdirectory named
    /// after `name` (suffixed `_1`, `_2`, ... if taken). The subdirectory is
    /// claimed atomically, so concurrent runs never share one. Returns it.
    pub fn save_stages(&self, stages: &StageLog, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let mut dir = self.output_dir.join(name);
        let mut i = 1;
        loop {
            match std::fs::create_dir(&dir) {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    dir = self.output_dir.join(format!("{name}_{i}"));
                    i += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        for (idx, stage) in stages.stages().iter().enumerate() {
            let path = dir.join(format!("{:02}_{}.png", idx + 1, slug(&stage.label)));
            stage.image.save(&path).map_err(|source| Error::Encode {
                path: path.clone(),
                source,
            })?;
        }
        debug!(dir = %dir.display(), count = stages.len(), "Saved debug stages");
        Ok(dir)
    }
}

fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Photo-to-binary question block extraction.
///
/// Stateless apart from its read-only configuration; one instance may be
/// shared across threads.
#[derive(Clone, Default)]
pub struct QuestionPipeline {
    config: PipelineConfig,
    collect_stages: bool,
    debug: Option<DebugConfig>,
}

impl QuestionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Keep the white-on-black polarity of the thresholded block when `false`.
    pub fn with_black_text(mut self, black_text: bool) -> Self {
        self.config.invert_to_black_text = black_text;
        self
    }

    /// Collect intermediate stages in [`PipelineResult::stages`].
    pub fn with_stages(mut self, collect: bool) -> Self {
        self.collect_stages = collect;
        self
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent. Implies stage collection.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            if std::fs::read_dir(&output_dir)?.next().is_some() {
                return Err(Error::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        self.collect_stages = true;
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn debug_config(&self) -> Option<&DebugConfig> {
        self.debug.as_ref()
    }

    /// Locate the page, then the best question block, and rectify it.
    ///
    /// "No block found" is an ordinary outcome reported through
    /// [`PipelineResult::failure`]; `Err` means the input itself was unusable.
    #[instrument(skip_all, fields(width = photo.width(), height = photo.height()))]
    pub fn run(&self, photo: &DynamicImage) -> Result<PipelineRun> {
        let (width, height) = (photo.width(), photo.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage { width, height });
        }
        let photo = photo.to_rgb8();

        let PageCrop {
            image: page,
            rect: page_rect,
            fallback: page_fallback,
            stages: page_stages,
        } = detection::locate_page(&photo, &self.config.page, self.collect_stages);

        let refined = detection::refine(
            &page,
            self.config.invert_to_black_text,
            &self.config.refine,
            self.collect_stages,
        )?;

        let mut stages = page_stages;
        stages.append(refined.stages);
        let result = PipelineResult { stages, ..refined };

        match (&result.best_quad, &result.final_binary) {
            (Some(quad), Some(binary)) => info!(
                quad = ?quad.points(),
                out_width = binary.width(),
                out_height = binary.height(),
                page_fallback,
                "Question block extracted"
            ),
            _ => warn!(page_fallback, "No question block candidate"),
        }

        Ok(PipelineRun {
            page_rect,
            page_fallback,
            result,
        })
    }

    /// Write the stages of `run` under the debug directory, if one is set.
    pub fn save_debug(&self, run: &PipelineRun, name: &str) -> Result<Option<PathBuf>> {
        match &self.debug {
            Some(debug) => debug.save_stages(&run.result.stages, name).map(Some),
            None => Ok(None),
        }
    }

    /// Convenience for callers holding a path rather than a decoded image.
    pub fn run_path(&self, path: &Path) -> Result<PipelineRun> {
        let photo = crate::storage::load_photo(path)?;
        self.run(&photo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn disabled_log_skips_snapshots() {
        let mut log = StageLog::new(false);
        log.record("never", || panic!("snapshot evaluated"));
        assert!(log.is_empty());
    }

    #[test]
    fn enabled_log_keeps_order() {
        let mut log = StageLog::new(true);
        let img = || DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([9u8])));
        log.record("first", img);
        log.record("second", img);
        let mut other = StageLog::new(true);
        other.record("third", img);
        log.append(other);
        assert_eq!(log.labels(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failure_codes_are_snake_case() {
        assert_eq!(FailureReason::NoCandidate.as_str(), "no_candidate");
        assert_eq!(
            serde_json::to_string(&FailureReason::WriteFail).unwrap(),
            "\"write_fail\""
        );
    }

    #[test]
    fn slug_flattens_labels() {
        assert_eq!(slug("page: Gray+CLAHE"), "page_gray_clahe");
        assert_eq!(slug("Final BW"), "final_bw");
    }

    #[test]
    fn empty_image_is_an_error() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = QuestionPipeline::new().run(&empty).err().unwrap();
        assert!(matches!(err, Error::EmptyImage { .. }));
    }

    #[test]
    fn concurrent_saves_get_their_own_directories() {
        let root = tempfile::TempDir::new().unwrap();
        let debug = DebugConfig {
            output_dir: root.path().to_path_buf(),
        };
        let mut log = StageLog::new(true);
        log.record("only", || DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0u8]))));

        let mut dirs: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| scope.spawn(|| debug.save_stages(&log, "scan").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 6);
        for dir in &dirs {
            assert_eq!(std::fs::read_dir(dir).unwrap().count(), 1);
        }
    }

    #[test]
    fn debug_dir_must_be_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stale.txt"), b"x").unwrap();
        let err = QuestionPipeline::new().with_debug(dir.path().to_path_buf()).err().unwrap();
        assert!(matches!(err, Error::DebugDirNotEmpty(_)));
    }
}
