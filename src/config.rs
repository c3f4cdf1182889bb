//! Tuning constants for both pipeline stages.
//!
//! Every field defaults to the calibrated value; the structs are plain data so
//! a caller can override individual knobs for experiments.

/// Parameters of the shared binarize-and-merge procedure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// CLAHE clip limit, relative to a uniform histogram.
    pub clahe_clip_limit: f32,
    /// CLAHE grid is `clahe_tiles x clahe_tiles`.
    pub clahe_tiles: u32,
    /// Subtracted from the local Gaussian mean before thresholding.
    pub threshold_bias: f32,
    /// Components smaller than this fraction of the image area are noise.
    pub noise_area_fraction: f64,
    /// Horizontal bridging kernel is `line_kernel_factor * k` wide, `thin_kernel` tall.
    pub line_kernel_factor: u32,
    /// Vertical bridging kernel is `thin_kernel` wide, `block_kernel_factor * k` tall.
    pub block_kernel_factor: u32,
    pub thin_kernel: u32,
    /// Closing kernel side is `close_kernel_factor * k`.
    pub close_kernel_factor: u32,
    pub close_iterations: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            threshold_bias: 10.0,
            noise_area_fraction: 0.00005,
            line_kernel_factor: 10,
            block_kernel_factor: 35,
            thin_kernel: 3,
            close_kernel_factor: 5,
            close_iterations: 2,
        }
    }
}

/// Page boundary detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLocatorConfig {
    pub merge: MergeConfig,
    /// Share of the photo area kept by the centered window.
    pub center_window_area: f64,
}

impl Default for PageLocatorConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            center_window_area: 0.8,
        }
    }
}

/// Candidate scoring and rectification inside the page crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineConfig {
    pub merge: MergeConfig,
    /// Candidates below this fraction of the page area are ignored.
    pub min_candidate_fraction: f64,
    pub lobe_threshold_fraction: f64,
    /// Threshold bias of the final binarization of the rectified block.
    pub final_threshold_bias: f32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            min_candidate_fraction: 0.01,
            lobe_threshold_fraction: crate::detection::scoring::LOBE_THRESHOLD_FRACTION,
            final_threshold_bias: 8.0,
        }
    }
}

/// Configuration of a full photo-to-binary run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub page: PageLocatorConfig,
    pub refine: RefineConfig,
    /// Render ink black on white (OCR polarity) instead of white on black.
    pub invert_to_black_text: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page: PageLocatorConfig::default(),
            refine: RefineConfig::default(),
            invert_to_black_text: true,
        }
    }
}
