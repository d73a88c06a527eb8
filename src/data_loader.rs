use std::path::PathBuf;

use glob::glob;
use image::{DynamicImage, ImageReader};
use indicatif::ParallelProgressIterator;
use log::{trace, warn};
use rayon::prelude::*;

use crate::error::Result;

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        let lower = p.as_os_str().to_string_lossy().to_lowercase();
        for ext in &[".png", ".jpg", ".jpeg"] {
            if lower.ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Sorted image paths directly inside `folder`.
pub fn list_images(folder: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", folder.trim_end_matches('/'));
    let mut paths: Vec<PathBuf> = glob(&pattern)?.filter_map(img_filter).collect();
    paths.sort();
    trace!("{} images in {}", paths.len(), folder);
    Ok(paths)
}

/// Decodes every image of `folder` in parallel. Files that fail to decode are
/// skipped with a warning; the returned paths line up with the images.
pub fn load_images(folder: &str) -> Result<(Vec<PathBuf>, Vec<DynamicImage>)> {
    let paths = list_images(folder)?;
    let decoded: Vec<Option<(PathBuf, DynamicImage)>> = paths
        .par_iter()
        .progress_count(paths.len() as u64)
        .map(|path| {
            let img = ImageReader::open(path)
                .map_err(image::ImageError::IoError)
                .and_then(|r| r.decode());
            match img {
                Ok(img) => Some((path.clone(), img)),
                Err(e) => {
                    warn!("failed to load {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();
    Ok(decoded.into_iter().flatten().unzip())
}
