mod cli;
mod config;
mod error;
mod file_ops;
mod files;
mod gate;
mod image_set;
mod keymap;
mod loader;
mod metadata;
mod prefetch;
mod scheduler;
mod ui;
mod viewer;

use clap::Parser;
use std::fs;
use std::process;
use std::time::{Duration, Instant};
use winit::event_loop::EventLoop;

use crate::cli::Cli;
use crate::config::{expand_home, Settings};
use crate::files::collect_images;
use crate::image_set::ImageSet;
use crate::loader::{DecodePool, UserEvent};
use crate::ui::App;
use crate::viewer::Viewer;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = match Settings::load_or_create(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Using default settings, {}: {}", settings_path.display(), e);
            Settings::default()
        }
    };
    if let Some(secs) = cli.slideshow_interval {
        settings.ui.slideshow_interval = secs.max(1);
    }

    let collection = collect_images(&cli.paths);
    if collection.images.is_empty() {
        log::error!("No image files found.");
        process::exit(1);
    }
    log::debug!(
        "{} images, {} skipped arguments, sorted={}",
        collection.images.len(),
        collection.skipped.len(),
        collection.sorted
    );

    let delete_dir = expand_home(&cli.delete_dir);
    if let Err(e) = fs::create_dir_all(&delete_dir) {
        log::warn!("Cannot create delete directory {}: {}", delete_dir.display(), e);
    }

    let working_dir = std::env::current_dir()
        .map(|d| d.to_string_lossy().into_owned())
        .unwrap_or_else(|_| ".".to_string());

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(l) => l,
        Err(e) => {
            log::error!("Cannot create event loop: {}", e);
            process::exit(1);
        }
    };
    let proxy = event_loop.create_proxy();

    let pool = DecodePool::spawn(cli.decode_threads(), move |result| {
        let _ = proxy.send_event(UserEvent::Loaded(result));
    });

    let mut viewer = Viewer::new(
        ImageSet::new(collection.images),
        pool,
        settings,
        delete_dir,
        Duration::from_millis(cli.confirm_timeout),
    );
    viewer.start(Instant::now());

    let mut app = App::new(viewer, settings_path, working_dir);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
        process::exit(1);
    }
}
