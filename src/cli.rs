use clap::Parser;
use std::path::PathBuf;

pub const HELP_KEYS: &str = "\
Key Bindings:
  PageDown / '      : Next image (shift x10, ctrl x50)
  PageUp / ;        : Previous image (shift x10, ctrl x50)
  ] / [             : Next / previous in shuffled order
  . / ,             : Next / previous in random order
  Home / End        : First / last image
  Arrows            : Pan (hold to speed up; shift, ctrl, alt slow down)
  s / S             : Slideshow start or faster / slower
  - / +             : Zoom out / in (shift resizes the window)
  2 / 3 / 4         : Zoom 2x / 3x / 4x
  z / 1             : Actual size
  x                 : Fit to window
  r / R             : Rotate CCW / CW
  i                 : File information
  f                 : Toggle fullscreen
  ?                 : Toggle this help
  m <key>           : Move file to destination <key>
  c <key>           : Copy file to destination <key>
  Delete Delete     : Move file to the delete directory
  q q               : Quit
";

#[derive(Parser, Debug)]
#[command(
    name = "tiview",
    about = "Keyboard-driven image viewer for sorting photos",
    after_help = HELP_KEYS
)]
pub struct Cli {
    /// Files or directories to view
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Settings file (default: <config dir>/tiview/settings.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where deleted files are moved to
    #[arg(short, long, value_name = "DIR", default_value = "~/.Trash")]
    pub delete_dir: String,

    /// Slideshow interval in seconds, overriding the settings file
    #[arg(short, long, value_name = "SECS")]
    pub slideshow_interval: Option<u64>,

    /// Window in milliseconds for the second key of a confirmed action
    #[arg(long, value_name = "MS", default_value = "1000")]
    pub confirm_timeout: u64,

    /// Number of decode threads (default: available cores, 2..=8)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl Cli {
    pub fn decode_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(2, 8)
        })
    }
}
