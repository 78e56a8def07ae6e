//! Error type shared by every part of the viewer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// A directory argument could not be listed.
    #[error("couldn't collect images from {}: {source}", path.display())]
    CollectionScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Navigation or lookup was attempted on a collection with no images.
    #[error("no images in the collection")]
    EmptyCollection,

    #[error("index {index} is out of range for {len} images")]
    IndexOutOfRange { index: usize, len: usize },

    /// Move/copy refused because the target name is already taken.
    #[error("{} exists", .0.display())]
    DestinationExists(PathBuf),

    /// No `dest-<key>` entry in the settings.
    #[error("no destination configured for key {0}")]
    UnknownDestination(char),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is neither file nor directory", .0.display())]
    NotFileOrDirectory(PathBuf),

    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("settings: {0}")]
    Settings(String),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("exif: {0}")]
    Exif(#[from] exif::Error),
}

impl From<toml::de::Error> for ViewerError {
    fn from(err: toml::de::Error) -> Self {
        ViewerError::Settings(err.to_string())
    }
}

impl From<toml::ser::Error> for ViewerError {
    fn from(err: toml::ser::Error) -> Self {
        ViewerError::Settings(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
