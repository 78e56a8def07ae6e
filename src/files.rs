use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ViewerError;
use crate::image_set::{by_path, ImageRef};

const IMAGE_EXTENSIONS: &[&str] = &[".jpeg", ".jpg", ".png"];

fn has_image_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Result of scanning the command-line path arguments.
pub struct Collection {
    pub images: Vec<ImageRef>,
    /// Whether the list was put in path order. Set by directory arguments,
    /// cleared again by any later file argument.
    pub sorted: bool,
    /// Arguments or directories that contributed nothing.
    pub skipped: Vec<ViewerError>,
}

/// Turn path arguments into an image list. No arguments means the current
/// directory. Directories contribute their `.jpeg`/`.jpg`/`.png` entries,
/// plain files are taken as-is whatever their extension. A path named twice
/// is kept at its first position.
pub fn collect_images(args: &[PathBuf]) -> Collection {
    let start_time = Instant::now();
    let default_args = [PathBuf::from(".")];
    let args = if args.is_empty() { &default_args[..] } else { args };

    let mut images = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = Vec::new();
    let mut to_sort = false;

    for arg in args {
        if arg.is_dir() {
            to_sort = true;
            match scan_dir(arg, &mut images, &mut seen) {
                Ok(()) => log::debug!(
                    "Collected files from {} - total so far: {}",
                    arg.display(),
                    images.len()
                ),
                Err(e) => {
                    log::warn!("{}", e);
                    skipped.push(e);
                }
            }
        } else if arg.is_file() {
            to_sort = false;
            if seen.insert(arg.clone()) {
                images.push(ImageRef::new(arg.clone()));
            }
        } else {
            log::warn!("Input {} is neither file nor directory. Ignoring.", arg.display());
            skipped.push(ViewerError::NotFileOrDirectory(arg.clone()));
        }
    }

    if to_sort {
        images.sort_by(by_path);
    }

    log::info!(
        "Scan complete in {:.2}s. Found {} images.",
        start_time.elapsed().as_secs_f64(),
        images.len()
    );

    Collection {
        images,
        sorted: to_sort,
        skipped,
    }
}

fn scan_dir(
    dir: &Path,
    images: &mut Vec<ImageRef>,
    seen: &mut HashSet<PathBuf>,
) -> Result<(), ViewerError> {
    let entries = fs::read_dir(dir).map_err(|source| ViewerError::CollectionScan {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        if !has_image_extension(&name.to_string_lossy()) {
            continue;
        }
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }
        let path = dir.join(name);
        if seen.insert(path.clone()) {
            images.push(ImageRef::new(path));
        }
    }
    Ok(())
}
