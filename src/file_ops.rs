use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{expand_home, SettingsLookup};
use crate::error::{Result, ViewerError};

/// Look up `dest-<key>` and expand `~` in the result.
pub fn resolve_destination(settings: &dyn SettingsLookup, key: char) -> Result<PathBuf> {
    settings
        .lookup(&format!("dest-{}", key))
        .map(|d| expand_home(&d))
        .ok_or(ViewerError::UnknownDestination(key))
}

/// Where `src` would land inside `dest_dir`. Fails if that name is taken.
fn target_in(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    if !dest_dir.is_dir() {
        return Err(ViewerError::NotADirectory(dest_dir.to_path_buf()));
    }
    let name = src
        .file_name()
        .ok_or_else(|| ViewerError::NoFileName(src.to_path_buf()))?;
    let target = dest_dir.join(name);
    if target.exists() {
        return Err(ViewerError::DestinationExists(target));
    }
    Ok(target)
}

/// Move `src` into `dest_dir`, keeping its file name.
pub fn move_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let target = target_in(src, dest_dir)?;
    match fs::rename(src, &target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, &target)?;
            fs::remove_file(src)?;
        }
        Err(e) => return Err(e.into()),
    }
    log::info!("Moved {} to {}", src.display(), target.display());
    Ok(target)
}

/// Copy `src` into `dest_dir`, keeping its file name.
pub fn copy_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let target = target_in(src, dest_dir)?;
    fs::copy(src, &target)?;
    log::info!("Copied {} to {}", src.display(), target.display());
    Ok(target)
}
