//! Persistent viewer settings.
//!
//! Stored as TOML. The destination table is read-only from the viewer's
//! point of view; the UI section and last-run geometry are written back on
//! exit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Most per-directory geometries remembered, including the fallback.
const MAX_GEOMETRIES: usize = 50;

/// Key/value lookup used by the core. `dest-<key>` resolves to a
/// destination directory.
pub trait SettingsLookup {
    fn lookup(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_destinations")]
    pub destinations: BTreeMap<String, String>,

    #[serde(default)]
    pub ui: UiSettings,

    #[serde(default)]
    pub last_run: LastRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_feedback_fontsize")]
    pub feedback_fontsize: u32,

    #[serde(default = "default_feedback_fg")]
    pub feedback_fg: [f32; 4],

    #[serde(default = "default_feedback_bg")]
    pub feedback_bg: [f32; 4],

    #[serde(default = "default_slideshow_interval")]
    pub slideshow_interval: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastRun {
    /// Fallback geometry when the working directory has no entry.
    #[serde(default)]
    pub geometry: Option<String>,

    /// Most recently used first.
    #[serde(default)]
    pub by_dir: Vec<DirGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirGeometry {
    pub dir: String,
    pub geometry: String,
}

fn default_destinations() -> BTreeMap<String, String> {
    [
        ("a", "~/AI-Images"),
        ("d", "~/AI-Documents"),
        ("f", "~/Family-Photos"),
        ("w", "~/Work-Photos"),
        ("t", "/tmp"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_feedback_fontsize() -> u32 {
    32
}

fn default_feedback_fg() -> [f32; 4] {
    [0.85, 0.85, 0.85, 0.9]
}

fn default_feedback_bg() -> [f32; 4] {
    [0.05, 0.05, 0.05, 0.3]
}

fn default_slideshow_interval() -> u64 {
    20
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            feedback_fontsize: default_feedback_fontsize(),
            feedback_fg: default_feedback_fg(),
            feedback_bg: default_feedback_bg(),
            slideshow_interval: default_slideshow_interval(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destinations: default_destinations(),
            ui: UiSettings::default(),
            last_run: LastRun::default(),
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("tiview/settings.toml")
    }

    /// Read settings from `path`, writing the defaults there first if the file
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save(path)?;
            log::info!("Wrote default settings to {}", path.display());
            return Ok(settings);
        }
        let text = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&text)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Destination directory bound to `key`, with `~` expanded.
    pub fn destination(&self, key: char) -> Option<PathBuf> {
        self.destinations
            .get(key.to_string().as_str())
            .map(|d| expand_home(d))
    }

    pub fn has_destination(&self, key: char) -> bool {
        self.destination(key).is_some()
    }

    /// One `key: path` line per configured destination.
    pub fn destination_listing(&self) -> String {
        self.destinations
            .iter()
            .map(|(k, v)| format!("dest-{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Geometry saved for `dir`, or the fallback.
    pub fn geometry_for(&self, dir: &str) -> Option<Geometry> {
        let key = dir.to_lowercase();
        self.last_run
            .by_dir
            .iter()
            .find(|g| g.dir == key)
            .map(|g| g.geometry.as_str())
            .or(self.last_run.geometry.as_deref())
            .and_then(Geometry::parse)
    }

    /// Remember `geometry` as the fallback and as the entry for `dir`, moving
    /// that entry to the front.
    pub fn remember_geometry(&mut self, dir: &str, geometry: Geometry) {
        let key = dir.to_lowercase();
        let text = geometry.to_string();
        self.last_run.geometry = Some(text.clone());
        self.last_run.by_dir.retain(|g| g.dir != key);
        self.last_run.by_dir.insert(
            0,
            DirGeometry {
                dir: key,
                geometry: text,
            },
        );
        self.last_run.by_dir.truncate(MAX_GEOMETRIES - 1);
    }
}

impl SettingsLookup for Settings {
    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(dest) = key.strip_prefix("dest-") {
            return self.destinations.get(dest).cloned();
        }
        match key {
            "slideshow-interval" => Some(self.ui.slideshow_interval.to_string()),
            "feedback-fontsize" => Some(self.ui.feedback_fontsize.to_string()),
            _ => None,
        }
    }
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Window size and position, written as `WxH+X,Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl Geometry {
    pub fn parse(s: &str) -> Option<Self> {
        let (size, pos) = s.trim().split_once('+')?;
        let (w, h) = size.split_once('x')?;
        let (x, y) = pos.split_once(',')?;
        Some(Self {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
            x: x.trim().parse().ok()?,
            y: y.trim().parse().ok()?,
        })
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{},{}", self.width, self.height, self.x, self.y)
    }
}
