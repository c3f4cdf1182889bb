//! Reading photos, persisting final binaries, and the per-file processing
//! service built on [`QuestionPipeline`].

use image::{DynamicImage, GrayImage, ImageFormat};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument, warn};

use crate::error::{Error, Result};
use crate::models::Quadrilateral;
use crate::pipeline::{FailureReason, QuestionPipeline};

/// File extensions accepted as photos (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// All photos under `dir`, recursively, in sorted path order.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_image(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

pub fn load_photo(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `<dir>/<stem>_final.png`, or `<stem>_final_1.png`, `_2`, ... when
/// taken. The file is created atomically, so concurrent writers never share
/// a name.
pub fn create_unique_output(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    let base = format!("{stem}_final");
    let mut path = dir.join(format!("{base}.png"));
    let mut i = 1;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                path = dir.join(format!("{base}_{i}.png"));
                i += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Encode a binary image as PNG (lossless) into `file`, which was opened at
/// `path`. On failure the file at `path` is removed.
pub fn write_png(image: &GrayImage, file: File, path: &Path) -> Result<()> {
    let written = encode_png(image, file, path);
    if written.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Could not remove partial output");
        }
    }
    written
}

fn encode_png(image: &GrayImage, file: File, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(file);
    image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|source| Error::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush()?;
    Ok(())
}

/// Metadata reported alongside a persisted question image.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeMeta {
    /// Winning quadrilateral in page-crop coordinates.
    pub best_box: Option<Quadrilateral>,
    pub width: u32,
    pub height: u32,
}

/// Result of processing one file, ready to hand to a caller or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub input: PathBuf,
    pub ok: bool,
    pub output: Option<PathBuf>,
    pub meta: Option<OutcomeMeta>,
    pub error: Option<FailureReason>,
    pub detail: Option<String>,
}

impl ProcessOutcome {
    fn failed(input: &Path, reason: FailureReason, detail: Option<String>) -> Self {
        Self {
            input: input.to_path_buf(),
            ok: false,
            output: None,
            meta: None,
            error: Some(reason),
            detail,
        }
    }
}

/// Read `input`, extract its question block, and write the final binary into
/// `output_dir`. Every failure is folded into the returned outcome.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn process_file(input: &Path, output_dir: &Path, pipeline: &QuestionPipeline) -> ProcessOutcome {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let photo = match load_photo(input) {
        Ok(photo) => photo,
        Err(e) => {
            warn!(error = %e, "Read failed");
            return ProcessOutcome::failed(input, FailureReason::ReadFail, Some(e.to_string()));
        }
    };

    let run = match pipeline.run(&photo) {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "Pipeline aborted");
            return ProcessOutcome::failed(input, FailureReason::InternalError, Some(e.to_string()));
        }
    };

    if let Err(e) = pipeline.save_debug(&run, &stem) {
        warn!(error = %e, "Could not save debug stages");
    }

    let (Some(binary), best_box) = (run.result.final_binary.as_ref(), run.result.best_quad) else {
        return ProcessOutcome::failed(input, FailureReason::NoCandidate, None);
    };

    let written = std::fs::create_dir_all(output_dir)
        .map_err(Error::from)
        .and_then(|_| create_unique_output(output_dir, &stem))
        .and_then(|(path, file)| write_png(binary, file, &path).map(|_| path));

    match written {
        Ok(path) => {
            debug!(output = %path.display(), "Final image written");
            ProcessOutcome {
                input: input.to_path_buf(),
                ok: true,
                output: Some(path),
                meta: Some(OutcomeMeta {
                    best_box,
                    width: binary.width(),
                    height: binary.height(),
                }),
                error: None,
                detail: None,
            }
        }
        Err(e) => {
            error!(error = %e, "Write failed");
            ProcessOutcome::failed(input, FailureReason::WriteFail, Some(e.to_string()))
        }
    }
}

/// Run [`process_file`] over `inputs` on a pool of `jobs` worker threads.
///
/// Every input yields exactly one outcome, in input order.
pub fn process_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    pipeline: &QuestionPipeline,
    jobs: usize,
) -> Result<Vec<ProcessOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build()?;
    Ok(pool.install(|| {
        inputs
            .par_iter()
            .map(|input| process_file(input, output_dir, pipeline))
            .collect()
    }))
}
