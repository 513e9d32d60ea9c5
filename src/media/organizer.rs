use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::classify::image::{ImageCategorizer, ImageFeatures, ImageMethod};
use crate::classify::taxonomy::ImageCategory;
use crate::ingest::{hasher, scanner};
use crate::utils::config::Mode;

/// One image's outcome in a batch; paths are relative for portability.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedImage {
    pub filename: String,
    pub source_path: String,
    pub category: ImageCategory,
    pub confidence: f64,
    pub classification_method: ImageMethod,
    pub feature_snapshot: Option<ImageFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub organized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// First free name in `dir`: `name`, then `stem_1.ext`, `stem_2.ext`, ...
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Copies every image under `source_dir` into `dest_root/<category>/`.
/// Sources are never moved or deleted; per-file failures are recorded and skipped.
/// A missing `source_dir` is an error only in strict mode.
pub fn organize(
    categorizer: &ImageCategorizer,
    source_dir: &Path,
    dest_root: &Path,
    mode: Mode,
) -> Result<Vec<ClassifiedImage>> {
    if !source_dir.is_dir() {
        if mode.is_strict() {
            bail!("Source directory not found: {:?}", source_dir);
        }
        warn!("Source directory {:?} not found, nothing to organize", source_dir);
        return Ok(Vec::new());
    }

    for category in categorizer.categories() {
        let dir = dest_root.join(category.dir_name());
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let images = scanner::scan_images(source_dir, Some(dest_root))?;
    info!("Found {} images to classify in {:?}", images.len(), source_dir);

    let pb = ProgressBar::new(images.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} images") {
        pb.set_style(style);
    }

    let mut results = Vec::with_capacity(images.len());
    for path in images {
        let entry = organize_one(categorizer, &path, source_dir, dest_root);
        if let Some(err) = &entry.error {
            error!("Failed to organize {:?}: {}", path, err);
        }
        results.push(entry);
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(results)
}

fn organize_one(
    categorizer: &ImageCategorizer,
    path: &Path,
    source_dir: &Path,
    dest_root: &Path,
) -> ClassifiedImage {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result = categorizer.classify(path, &filename);

    let mut entry = ClassifiedImage {
        source_path: relative(path, source_dir),
        category: result.category,
        confidence: result.confidence,
        classification_method: result.method,
        feature_snapshot: result.features,
        sha256: None,
        new_path: None,
        organized: false,
        error: result.error,
        filename,
    };
    if entry.error.is_some() {
        return entry;
    }

    let dest = unique_destination(&dest_root.join(entry.category.dir_name()), &entry.filename);
    let copied = hasher::copy_hashed(path, &dest).map(|hash| (hash, dest));

    match copied {
        Ok((hash, dest)) => {
            entry.sha256 = Some(hash);
            entry.new_path = Some(relative(&dest, dest_root));
            entry.organized = true;
        }
        Err(e) => entry.error = Some(format!("{:#}", e)),
    }
    entry
}
