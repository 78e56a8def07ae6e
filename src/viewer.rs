//! The viewer controller.
//!
//! Owns the image set, the look-ahead cache, the confirmation gate and the
//! timers, and turns key presses and load completions into state changes.
//! Everything here runs on the event-loop thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::error::ViewerError;
use crate::file_ops::{self, resolve_destination};
use crate::gate::{ActionGate, Confirmation, GateOutcome, ScaryAction};
use crate::image_set::{Direction, ImageSet};
use crate::keymap::{self, Command, KeyName, KeyPress, Modifiers};
use crate::loader::{DecodedImage, ImageLoader, LoadPurpose, LoadRequest, LoadResult};
use crate::metadata;
use crate::prefetch::{Claim, PrefetchCache, PrefetchOutcome};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::ui::state::{Viewport, PAN_REPEAT};

const FEEDBACK_SECS: u64 = 2;
const GIANT_INFO_SECS: u64 = 10;
const METADATA_SECS: u64 = 10;
const MAX_SLIDESHOW_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    SlideshowTick,
    ClearFeedback,
    ClearGiantInfo,
    ClearMetadata,
    PanRepeat,
}

/// Requests for the window layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Quit,
    ResizeWindow { scale: f32 },
    ToggleFullscreen,
}

/// Receives the path of the image being shown whenever it changes.
pub trait TitleSink {
    fn set_displayed_path(&mut self, path: &Path);
}

/// A text overlay that clears itself on a timer.
#[derive(Default)]
struct Timed<T> {
    value: Option<T>,
    timer: Option<TimerHandle>,
}

pub struct Viewer<L: ImageLoader> {
    set: ImageSet,
    prefetch: PrefetchCache,
    gate: ActionGate,
    timers: Scheduler<TimerEvent>,
    loader: L,
    settings: Settings,
    delete_dir: PathBuf,
    title_sink: Option<Box<dyn TitleSink>>,

    pub viewport: Viewport,
    displayed: Option<(PathBuf, Arc<DecodedImage>)>,
    /// Path we are waiting on a decode for.
    awaiting: Option<PathBuf>,
    error_message: Option<String>,

    feedback: Timed<String>,
    giant_info: Timed<String>,
    metadata: Timed<Vec<(String, String)>>,

    slideshow: Option<TimerHandle>,
    slideshow_interval: u64,
    pan_timer: Option<TimerHandle>,
    show_help: bool,
    effects: Vec<Effect>,
}

impl<L: ImageLoader> Viewer<L> {
    pub fn new(
        set: ImageSet,
        loader: L,
        settings: Settings,
        delete_dir: PathBuf,
        confirm_timeout: Duration,
    ) -> Self {
        let slideshow_interval = settings.ui.slideshow_interval.max(1);
        Self {
            set,
            prefetch: PrefetchCache::new(),
            gate: ActionGate::new(confirm_timeout),
            timers: Scheduler::new(),
            loader,
            settings,
            delete_dir,
            title_sink: None,
            viewport: Viewport::default(),
            displayed: None,
            awaiting: None,
            error_message: None,
            feedback: Timed::default(),
            giant_info: Timed::default(),
            metadata: Timed::default(),
            slideshow: None,
            slideshow_interval,
            pan_timer: None,
            show_help: false,
            effects: Vec::new(),
        }
    }

    /// Load the first image and its neighbour.
    pub fn start(&mut self, now: Instant) {
        self.show_current(Direction::Forward);
        self.user_feedback("timeless image viewer", now, Duration::from_secs(1));
    }

    pub fn attach_title_sink(&mut self, mut sink: Box<dyn TitleSink>) {
        if let Ok(current) = self.set.current() {
            sink.set_displayed_path(current.path());
        }
        self.title_sink = Some(sink);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn image_set(&self) -> &ImageSet {
        &self.set
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn displayed_image(&self) -> Option<&Arc<DecodedImage>> {
        self.displayed.as_ref().map(|(_, img)| img)
    }

    pub fn displayed_path(&self) -> Option<&Path> {
        self.displayed.as_ref().map(|(p, _)| p.as_path())
    }

    pub fn is_loading(&self) -> bool {
        self.awaiting.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.value.as_deref()
    }

    pub fn giant_info(&self) -> Option<&str> {
        self.giant_info.value.as_deref()
    }

    pub fn metadata(&self) -> Option<&[(String, String)]> {
        self.metadata.value.as_deref()
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn slideshow_running(&self) -> bool {
        self.slideshow.is_some_and(|h| self.timers.is_scheduled(h))
    }

    /// The action waiting for its confirming key, if any.
    pub fn pending_action(&self) -> Option<ScaryAction> {
        self.gate.armed()
    }

    pub fn slideshow_interval(&self) -> u64 {
        self.slideshow_interval
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Handle one key press. Returns whether the key did anything.
    /// An autorepeat of a held key. Stepping keys keep stepping; keys that
    /// could arm or confirm an action are ignored.
    pub fn key_repeat(&mut self, key: &KeyPress, now: Instant) -> bool {
        if self.gate.repeat_matters(keymap::gate_key(key), now) {
            return false;
        }
        self.key_down(key, now)
    }

    pub fn key_down(&mut self, key: &KeyPress, now: Instant) -> bool {
        log::debug!(
            "keypress - code={}, name={:?}, text={:?}, modifiers={:?}",
            key.code,
            key.name,
            key.text,
            key.modifiers
        );

        if self.giant_info.value.is_some() || self.metadata.value.is_some() {
            self.clear_giant_info();
            self.clear_metadata();
            if key.text == Some('i') {
                return true;
            }
        }

        let gate_key = keymap::gate_key(key);
        if gate_key.is_some() && key.name != KeyName::Char('s') {
            self.stop_slideshow();
        }

        let settings = &self.settings;
        match self.gate.press(gate_key, now, |c| settings.has_destination(c)) {
            GateOutcome::PassThrough => {}
            GateOutcome::Armed(action) => {
                self.user_feedback(
                    &format!("About to {}?", action.description()),
                    now,
                    Duration::from_secs(1),
                );
                if matches!(action, ScaryAction::Move | ScaryAction::Copy) {
                    let listing = format!(
                        "Copying/Moving Destinations:\n\n{}",
                        self.settings.destination_listing()
                    );
                    self.show_giant_info(listing, now);
                }
                return true;
            }
            GateOutcome::Confirmed(confirmation) => {
                self.confirm(confirmation, now);
                return true;
            }
            GateOutcome::Cancelled => return true,
        }

        match keymap::translate(key) {
            Some(command) => {
                self.execute(command, key.modifiers, now);
                true
            }
            None => false,
        }
    }

    /// Any key release ends continuous panning.
    pub fn key_up(&mut self) {
        if let Some(handle) = self.pan_timer.take() {
            self.timers.cancel(handle);
        }
        self.viewport.stop_pan();
    }

    fn execute(&mut self, command: Command, modifiers: Modifiers, now: Instant) {
        match command {
            Command::Pan(direction) => {
                self.viewport.start_pan(direction, modifiers);
                if self.pan_timer.is_none() {
                    self.pan_timer =
                        Some(self.timers.schedule_repeating(now, PAN_REPEAT, TimerEvent::PanRepeat));
                }
            }
            Command::Advance { mode, count } => {
                self.set.advance(mode, count);
                self.show_current(Direction::Forward);
            }
            Command::Retreat { mode, count } => {
                self.set.retreat(mode, count);
                self.show_current(Direction::Backward);
            }
            Command::First => self.jump(0, Direction::Forward),
            Command::Last => {
                if let Some(last) = self.set.last_index() {
                    self.jump(last, Direction::Backward);
                }
            }
            Command::Slideshow { slower } => self.slideshow(slower, now),
            Command::ZoomIn => {
                let scale = self.current_scale();
                self.viewport.zoom_by(1.1, scale);
            }
            Command::ZoomOut => {
                let scale = self.current_scale();
                self.viewport.zoom_by(0.9, scale);
            }
            Command::ZoomTo(zoom) => self.viewport.zoom_to(zoom),
            Command::ZoomActual => self.viewport.zoom_to(1.0),
            Command::ZoomFit => self.viewport.zoom_fit(),
            Command::WindowGrow => {
                let scale = self.viewport.window_zoom_by(0.1);
                self.effects.push(Effect::ResizeWindow { scale });
            }
            Command::WindowShrink => {
                let scale = self.viewport.window_zoom_by(-0.1);
                self.effects.push(Effect::ResizeWindow { scale });
            }
            Command::RotateCcw => self.viewport.rotate(1),
            Command::RotateCw => self.viewport.rotate(3),
            Command::ShowMetadata => self.show_metadata(now),
            Command::ToggleFullscreen => self.effects.push(Effect::ToggleFullscreen),
            Command::ToggleHelp => self.show_help = !self.show_help,
        }
    }

    fn current_scale(&self) -> f32 {
        self.displayed_image()
            .map(|img| self.viewport.scale_for(img.width, img.height))
            .unwrap_or(1.0)
    }

    fn jump(&mut self, index: usize, direction: Direction) {
        match self.set.jump_to(index) {
            Ok(()) => self.show_current(direction),
            Err(e) => log::warn!("{}", e),
        }
    }

    // -----------------------------------------------------------------------
    // Display and look-ahead
    // -----------------------------------------------------------------------

    /// Show whatever is under the cursor and warm the neighbour in
    /// `direction`.
    fn show_current(&mut self, direction: Direction) {
        self.viewport.reset_for_new_image();
        let path = match self.set.current() {
            Ok(current) => current.path().to_path_buf(),
            Err(_) => {
                self.enter_empty_state();
                return;
            }
        };
        self.error_message = None;

        match self.prefetch.claim(&path) {
            Claim::Ready(image) => {
                self.displayed = Some((path.clone(), image));
                self.awaiting = None;
            }
            Claim::InFlight => {
                // Moves the queued prefetch to the front; a no-op once a
                // worker has picked it up.
                self.awaiting = Some(path.clone());
                self.loader.request(LoadRequest {
                    path: path.clone(),
                    purpose: LoadPurpose::Display,
                });
            }
            Claim::Miss => {
                if self.displayed_path() == Some(path.as_path()) {
                    self.awaiting = None;
                } else {
                    self.awaiting = Some(path.clone());
                    self.loader.request(LoadRequest {
                        path: path.clone(),
                        purpose: LoadPurpose::Display,
                    });
                }
            }
        }

        if let Some(sink) = self.title_sink.as_mut() {
            sink.set_displayed_path(&path);
        }

        match self.set.neighbor(direction) {
            Some(neighbor) => {
                let request = self.prefetch.request(neighbor, direction);
                self.loader.request(request);
            }
            None => self.prefetch.clear(),
        }
    }

    fn enter_empty_state(&mut self) {
        self.displayed = None;
        self.awaiting = None;
        self.prefetch.clear();
        self.stop_slideshow();
        self.error_message = Some("No images left".to_string());
    }

    /// A decode finished. Returns true if the screen needs redrawing.
    pub fn on_loaded(&mut self, loaded: LoadResult) -> bool {
        let LoadResult {
            path,
            purpose,
            result,
        } = loaded;
        let mut redraw = false;

        if self.awaiting.as_deref() == Some(path.as_path()) {
            self.awaiting = None;
            match &result {
                Ok(image) => {
                    self.displayed = Some((path.clone(), Arc::clone(image)));
                    self.error_message = None;
                }
                Err(e) => {
                    self.displayed = None;
                    self.error_message = Some(format!("Could not load: {}", e));
                }
            }
            redraw = true;
        } else if purpose == LoadPurpose::Display {
            log::debug!("Dropping display load for {}, no longer current", path.display());
        }

        if purpose == LoadPurpose::Prefetch {
            match result {
                Ok(image) => {
                    let live = self
                        .prefetch
                        .direction()
                        .and_then(|d| self.set.neighbor(d))
                        .map(|r| r.path());
                    if self.prefetch.complete(&path, image, live) == PrefetchOutcome::Committed {
                        log::debug!("Prefetch ready: {:?}", self.prefetch.ready_path());
                    }
                }
                Err(e) => {
                    log::debug!("Prefetch failed, will load on demand: {}", e);
                    self.prefetch.fail(&path);
                }
            }
        }
        redraw
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Run due timers. Returns true if anything fired.
    pub fn tick(&mut self, now: Instant) -> bool {
        let events = self.timers.fire_due(now);
        for event in &events {
            match event {
                TimerEvent::SlideshowTick => {
                    let mode = self.set.mode();
                    self.set.advance(mode, 1);
                    self.show_current(Direction::Forward);
                }
                TimerEvent::ClearFeedback => {
                    self.feedback = Timed::default();
                }
                TimerEvent::ClearGiantInfo => {
                    self.giant_info = Timed::default();
                }
                TimerEvent::ClearMetadata => {
                    self.metadata = Timed::default();
                }
                TimerEvent::PanRepeat => self.viewport.pan_tick(),
            }
        }
        !events.is_empty()
    }

    fn replace_timer(
        &mut self,
        old: Option<TimerHandle>,
        now: Instant,
        delay: Duration,
        event: TimerEvent,
    ) -> TimerHandle {
        if let Some(handle) = old {
            self.timers.cancel(handle);
        }
        self.timers.schedule_once(now, delay, event)
    }

    fn user_feedback(&mut self, text: &str, now: Instant, clear_after: Duration) {
        let old = self.feedback.timer.take();
        let timer = self.replace_timer(old, now, clear_after, TimerEvent::ClearFeedback);
        self.feedback = Timed {
            value: Some(text.to_string()),
            timer: Some(timer),
        };
    }

    fn show_giant_info(&mut self, text: String, now: Instant) {
        let old = self.giant_info.timer.take();
        let timer = self.replace_timer(
            old,
            now,
            Duration::from_secs(GIANT_INFO_SECS),
            TimerEvent::ClearGiantInfo,
        );
        self.giant_info = Timed {
            value: Some(text),
            timer: Some(timer),
        };
    }

    fn clear_giant_info(&mut self) {
        if let Some(handle) = self.giant_info.timer.take() {
            self.timers.cancel(handle);
        }
        self.giant_info.value = None;
    }

    fn clear_metadata(&mut self) {
        if let Some(handle) = self.metadata.timer.take() {
            self.timers.cancel(handle);
        }
        self.metadata.value = None;
    }

    // -----------------------------------------------------------------------
    // Slideshow
    // -----------------------------------------------------------------------

    fn slideshow(&mut self, slower: bool, now: Instant) {
        match self.slideshow.take() {
            Some(handle) => {
                self.timers.cancel(handle);
                let current = self.slideshow_interval as f64;
                self.slideshow_interval = if slower {
                    ((current * 1.65).ceil() as u64).min(MAX_SLIDESHOW_SECS)
                } else {
                    ((current * 0.75).floor() as u64).max(1)
                };
                self.settings.ui.slideshow_interval = self.slideshow_interval;
                self.schedule_slideshow(now);
                self.user_feedback(
                    &format!(
                        "New slideshow interval {} seconds. Shift-S and s change interval.",
                        self.slideshow_interval
                    ),
                    now,
                    Duration::from_secs(FEEDBACK_SECS),
                );
            }
            None => {
                let mode = self.set.mode();
                self.set.advance(mode, 1);
                self.show_current(Direction::Forward);
                self.schedule_slideshow(now);
                self.user_feedback(
                    &format!(
                        "Slideshow started with interval {} seconds. Shift-S and s change interval.",
                        self.slideshow_interval
                    ),
                    now,
                    Duration::from_secs(FEEDBACK_SECS),
                );
            }
        }
    }

    fn schedule_slideshow(&mut self, now: Instant) {
        let interval = Duration::from_secs(self.slideshow_interval);
        self.slideshow = Some(
            self.timers
                .schedule_repeating(now, interval, TimerEvent::SlideshowTick),
        );
    }

    fn stop_slideshow(&mut self) {
        if let Some(handle) = self.slideshow.take() {
            self.timers.cancel(handle);
            log::debug!("Slideshow stopped");
        }
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    fn show_metadata(&mut self, now: Instant) {
        let path = match self.set.current() {
            Ok(current) => current.path().to_path_buf(),
            Err(e) => {
                self.user_feedback(&e.to_string(), now, Duration::from_secs(FEEDBACK_SECS));
                return;
            }
        };
        match metadata::describe(&path) {
            Ok(rows) if !rows.is_empty() => {
                if let Some(handle) = self.metadata.timer.take() {
                    self.timers.cancel(handle);
                }
                let timer = self.timers.schedule_once(
                    now,
                    Duration::from_secs(METADATA_SECS),
                    TimerEvent::ClearMetadata,
                );
                self.metadata = Timed {
                    value: Some(rows),
                    timer: Some(timer),
                };
            }
            Ok(_) => self.user_feedback("No metadata found", now, Duration::from_secs(FEEDBACK_SECS)),
            Err(e) => {
                log::warn!("Metadata lookup for {} failed: {}", path.display(), e);
                self.user_feedback(
                    &format!("No metadata found: {}", e),
                    now,
                    Duration::from_secs(FEEDBACK_SECS),
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Confirmed actions
    // -----------------------------------------------------------------------

    fn confirm(&mut self, confirmation: Confirmation, now: Instant) {
        match confirmation {
            Confirmation::Quit => self.effects.push(Effect::Quit),
            Confirmation::Delete => {
                let trash = self.delete_dir.clone();
                self.move_current(&trash, true, now);
            }
            Confirmation::Move(key) | Confirmation::Copy(key) => {
                self.clear_giant_info();
                let dest = match resolve_destination(&self.settings, key) {
                    Ok(dest) => dest,
                    Err(e) => {
                        log::info!("{}", e);
                        self.user_feedback(
                            &format!("!!! No destination configured for key {}", key),
                            now,
                            Duration::from_secs(3),
                        );
                        return;
                    }
                };
                if matches!(confirmation, Confirmation::Move(_)) {
                    self.move_current(&dest, false, now);
                } else {
                    self.copy_current(&dest, now);
                }
            }
        }
    }

    fn move_current(&mut self, dest: &Path, trash: bool, now: Instant) {
        let src = match self.set.current() {
            Ok(current) => current.path().to_path_buf(),
            Err(e) => {
                self.user_feedback(&e.to_string(), now, Duration::from_secs(FEEDBACK_SECS));
                return;
            }
        };
        let message = match file_ops::move_into(&src, dest) {
            Ok(_) => {
                self.set.remove_current();
                if trash {
                    format!(" x> TRASHED into {}", dest.display())
                } else {
                    format!(" -> MOVED to {}", dest.display())
                }
            }
            Err(ViewerError::DestinationExists(target)) => {
                log::error!("img={} exists! doing nothing.", target.display());
                format!(" ! {} exists, not moving.", target.display())
            }
            Err(e) => {
                log::error!("Moving {} failed: {}", src.display(), e);
                format!(" ! couldn't move {}: {}", src.display(), e)
            }
        };
        self.user_feedback(&message, now, Duration::from_secs(FEEDBACK_SECS));
        if self.set.is_empty() {
            self.enter_empty_state();
        } else if self.set.current().map(|c| c.path() != src).unwrap_or(false) {
            self.show_current(Direction::Forward);
        }
    }

    fn copy_current(&mut self, dest: &Path, now: Instant) {
        let src = match self.set.current() {
            Ok(current) => current.path().to_path_buf(),
            Err(e) => {
                self.user_feedback(&e.to_string(), now, Duration::from_secs(FEEDBACK_SECS));
                return;
            }
        };
        let message = match file_ops::copy_into(&src, dest) {
            Ok(_) => format!(" >> COPIED to {}", dest.display()),
            Err(ViewerError::DestinationExists(target)) => {
                log::error!("img={} exists! doing nothing.", target.display());
                format!(" ! {} exists, not copying.", target.display())
            }
            Err(e) => {
                log::error!("Copying {} failed: {}", src.display(), e);
                format!(" ! couldn't copy {}: {}", src.display(), e)
            }
        };
        self.user_feedback(&message, now, Duration::from_secs(FEEDBACK_SECS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_set::{ImageRef, TraversalMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    #[derive(Clone, Default)]
    struct FakeLoader {
        requests: Rc<RefCell<Vec<LoadRequest>>>,
    }

    impl ImageLoader for FakeLoader {
        fn request(&self, request: LoadRequest) {
            self.requests.borrow_mut().push(request);
        }
    }

    impl FakeLoader {
        fn take(&self) -> Vec<LoadRequest> {
            std::mem::take(&mut *self.requests.borrow_mut())
        }
    }

    struct TitleLog(Rc<RefCell<Vec<PathBuf>>>);

    impl TitleSink for TitleLog {
        fn set_displayed_path(&mut self, path: &Path) {
            self.0.borrow_mut().push(path.to_path_buf());
        }
    }

    struct Fixture {
        viewer: Viewer<FakeLoader>,
        loader: FakeLoader,
        images: TempDir,
        dest: TempDir,
        trash: TempDir,
        t0: Instant,
    }

    fn image(tag: u8) -> Arc<DecodedImage> {
        Arc::new(DecodedImage {
            rgba_bytes: vec![tag; 4],
            width: 1,
            height: 1,
            file_size: 4,
            format_name: "PNG".into(),
        })
    }

    fn loaded(path: &Path, purpose: LoadPurpose, tag: u8) -> LoadResult {
        LoadResult {
            path: path.to_path_buf(),
            purpose,
            result: Ok(image(tag)),
        }
    }

    fn fixture(names: &[&str]) -> Fixture {
        let images = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let trash = tempdir().unwrap();
        let refs = names
            .iter()
            .map(|n| {
                let p = images.path().join(n);
                fs::write(&p, n.as_bytes()).unwrap();
                ImageRef::new(p)
            })
            .collect();
        let set = ImageSet::with_rng(refs, StdRng::seed_from_u64(7));

        let mut destinations = BTreeMap::new();
        destinations.insert("a".to_string(), dest.path().to_string_lossy().into_owned());
        let settings = Settings {
            destinations,
            ..Settings::default()
        };

        let loader = FakeLoader::default();
        let mut viewer = Viewer::new(
            set,
            loader.clone(),
            settings,
            trash.path().to_path_buf(),
            Duration::from_secs(1),
        );
        let t0 = Instant::now();
        viewer.start(t0);
        Fixture {
            viewer,
            loader,
            images,
            dest,
            trash,
            t0,
        }
    }

    fn secs(n: f64) -> Duration {
        Duration::from_secs_f64(n)
    }

    fn current_name(viewer: &Viewer<FakeLoader>) -> String {
        viewer
            .image_set()
            .current()
            .unwrap()
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn start_requests_current_and_neighbor() {
        let f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        let requests = f.loader.take();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].purpose, LoadPurpose::Display);
        assert_eq!(requests[0].path, f.images.path().join("a.jpg"));
        assert_eq!(requests[1].purpose, LoadPurpose::Prefetch);
        assert_eq!(requests[1].path, f.images.path().join("b.jpg"));
        assert!(f.viewer.is_loading());
    }

    #[test]
    fn prefetched_image_is_shown_without_reload() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.loader.take();
        let a = f.images.path().join("a.jpg");
        let b = f.images.path().join("b.jpg");
        assert!(f.viewer.on_loaded(loaded(&a, LoadPurpose::Display, 1)));
        f.viewer.on_loaded(loaded(&b, LoadPurpose::Prefetch, 2));

        f.viewer.key_down(&KeyPress::named(KeyName::PageDown), f.t0);
        assert_eq!(f.viewer.displayed_path(), Some(b.as_path()));
        assert!(!f.viewer.is_loading());
        let requests = f.loader.take();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].purpose, LoadPurpose::Prefetch);
        assert_eq!(requests[0].path, f.images.path().join("c.jpg"));
    }

    #[test]
    fn landing_on_in_flight_neighbor_waits_for_it() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.loader.take();
        let b = f.images.path().join("b.jpg");

        f.viewer.key_down(&KeyPress::char('\''), f.t0);
        let requests = f.loader.take();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], LoadRequest { path: b.clone(), purpose: LoadPurpose::Display });
        assert_eq!(requests[1].purpose, LoadPurpose::Prefetch);
        assert!(f.viewer.is_loading());

        assert!(f.viewer.on_loaded(loaded(&b, LoadPurpose::Prefetch, 2)));
        assert_eq!(f.viewer.displayed_path(), Some(b.as_path()));
    }

    #[test]
    fn stale_loads_do_not_replace_the_current_image() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);
        f.loader.take();
        let a = f.images.path().join("a.jpg");
        let b = f.images.path().join("b.jpg");
        let d = f.images.path().join("d.jpg");

        // Jump two ahead before anything finishes.
        f.viewer.key_down(&KeyPress::named(KeyName::PageDown), f.t0);
        f.viewer.key_down(&KeyPress::named(KeyName::PageDown), f.t0);
        assert_eq!(current_name(&f.viewer), "c.jpg");

        assert!(!f.viewer.on_loaded(loaded(&a, LoadPurpose::Display, 1)));
        assert!(!f.viewer.on_loaded(loaded(&b, LoadPurpose::Prefetch, 2)));
        assert!(f.viewer.displayed_path().is_none());

        // The load for d is the live neighbour and is kept.
        f.viewer.on_loaded(loaded(&d, LoadPurpose::Prefetch, 4));
        f.loader.take();
        f.viewer.key_down(&KeyPress::named(KeyName::PageDown), f.t0);
        assert_eq!(f.viewer.displayed_path(), Some(d.as_path()));
        assert!(f.loader.take().iter().all(|r| r.purpose == LoadPurpose::Prefetch));
    }

    #[test]
    fn failed_display_load_shows_error() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        let a = f.images.path().join("a.jpg");
        f.viewer.on_loaded(LoadResult {
            path: a,
            purpose: LoadPurpose::Display,
            result: Err("bad data".into()),
        });
        assert!(f.viewer.error_message().unwrap().contains("bad data"));
        assert!(!f.viewer.is_loading());
    }

    #[test]
    fn failed_prefetch_falls_back_to_display_load() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.loader.take();
        let a = f.images.path().join("a.jpg");
        let b = f.images.path().join("b.jpg");
        f.viewer.on_loaded(loaded(&a, LoadPurpose::Display, 1));
        f.viewer.on_loaded(LoadResult {
            path: b.clone(),
            purpose: LoadPurpose::Prefetch,
            result: Err("corrupt".into()),
        });

        f.viewer.key_down(&KeyPress::named(KeyName::PageDown), f.t0);
        let requests = f.loader.take();
        assert_eq!(
            requests[0],
            LoadRequest { path: b.clone(), purpose: LoadPurpose::Display }
        );
        assert!(f.viewer.is_loading());

        f.viewer.on_loaded(LoadResult {
            path: b,
            purpose: LoadPurpose::Display,
            result: Err("corrupt".into()),
        });
        assert!(f.viewer.error_message().unwrap().contains("corrupt"));
        assert!(!f.viewer.is_loading());
    }

    #[test]
    fn retreat_prefetches_behind() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        f.loader.take();
        f.viewer.key_down(&KeyPress::char(';'), f.t0);
        assert_eq!(current_name(&f.viewer), "d.jpg");
        let requests = f.loader.take();
        let prefetch = requests.iter().find(|r| r.purpose == LoadPurpose::Prefetch).unwrap();
        assert_eq!(prefetch.path, f.images.path().join("c.jpg"));
    }

    #[test]
    fn home_and_end_jump() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.viewer.key_down(&KeyPress::named(KeyName::End), f.t0);
        assert_eq!(current_name(&f.viewer), "c.jpg");
        f.viewer.key_down(&KeyPress::named(KeyName::Home), f.t0);
        assert_eq!(current_name(&f.viewer), "a.jpg");
    }

    #[test]
    fn title_sink_follows_navigation() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        let log = Rc::new(RefCell::new(Vec::new()));
        f.viewer.attach_title_sink(Box::new(TitleLog(Rc::clone(&log))));
        f.viewer.key_down(&KeyPress::char(']'), f.t0);
        let titles = log.borrow();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0], f.images.path().join("a.jpg"));
        assert_eq!(titles[1].as_path(), f.viewer.image_set().current().unwrap().path());
    }

    #[test]
    fn held_step_key_keeps_stepping_but_held_quit_does_not_quit() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.viewer.key_down(&KeyPress::char('\''), f.t0);
        f.viewer.key_repeat(&KeyPress::char('\''), f.t0 + secs(0.05));
        assert_eq!(current_name(&f.viewer), "c.jpg");

        f.viewer.key_down(&KeyPress::char('q'), f.t0 + secs(0.1));
        assert!(!f.viewer.key_repeat(&KeyPress::char('q'), f.t0 + secs(0.15)));
        assert!(f.viewer.take_effects().is_empty());
        assert_eq!(f.viewer.pending_action(), Some(ScaryAction::Quit));
    }

    #[test]
    fn single_move_key_does_nothing() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        assert!(f.viewer.key_down(&KeyPress::char('m'), f.t0));
        assert_eq!(f.viewer.feedback(), Some("About to Move File?"));
        assert!(f.viewer.giant_info().unwrap().contains("dest-a"));
        f.viewer.tick(f.t0 + secs(5.0));
        assert_eq!(f.viewer.image_set().len(), 2);
        assert!(f.images.path().join("a.jpg").exists());
        assert_eq!(fs::read_dir(f.dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn move_then_destination_moves_file() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.viewer.key_down(&KeyPress::char('m'), f.t0);
        f.viewer.key_down(&KeyPress::char('a'), f.t0 + secs(0.5));

        assert!(!f.images.path().join("a.jpg").exists());
        assert!(f.dest.path().join("a.jpg").exists());
        assert_eq!(f.viewer.image_set().len(), 2);
        assert_eq!(current_name(&f.viewer), "b.jpg");
        assert!(f.viewer.feedback().unwrap().starts_with(" -> MOVED to"));
        assert!(f.viewer.giant_info().is_none());
    }

    #[test]
    fn late_destination_key_does_not_move() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        f.viewer.key_down(&KeyPress::char('m'), f.t0);
        f.viewer.key_down(&KeyPress::char('a'), f.t0 + secs(2.0));
        assert!(f.images.path().join("a.jpg").exists());
        assert_eq!(f.viewer.image_set().len(), 2);
    }

    #[test]
    fn move_onto_existing_name_changes_nothing() {
        let mut f = fixture(&["cat.jpg", "dog.jpg"]);
        fs::write(f.dest.path().join("cat.jpg"), b"other").unwrap();
        f.viewer.key_down(&KeyPress::char('m'), f.t0);
        f.viewer.key_down(&KeyPress::char('a'), f.t0 + secs(0.2));

        assert!(f.images.path().join("cat.jpg").exists());
        assert_eq!(fs::read(f.dest.path().join("cat.jpg")).unwrap(), b"other");
        assert_eq!(f.viewer.image_set().len(), 2);
        assert_eq!(current_name(&f.viewer), "cat.jpg");
        assert!(f.viewer.feedback().unwrap().contains("exists, not moving"));
    }

    #[test]
    fn unknown_destination_is_reported() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        f.viewer.key_down(&KeyPress::char('c'), f.t0);
        f.viewer.key_down(&KeyPress::char('z'), f.t0 + secs(0.2));
        assert!(f.viewer.feedback().unwrap().contains("No destination configured for key z"));
        assert_eq!(fs::read_dir(f.dest.path()).unwrap().count(), 0);
        assert_eq!(f.viewer.image_set().len(), 2);
    }

    #[test]
    fn copy_keeps_collection() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        f.viewer.key_down(&KeyPress::char('c'), f.t0);
        f.viewer.key_down(&KeyPress::char('a'), f.t0 + secs(0.2));
        assert!(f.images.path().join("a.jpg").exists());
        assert!(f.dest.path().join("a.jpg").exists());
        assert_eq!(f.viewer.image_set().len(), 2);
        assert!(f.viewer.feedback().unwrap().starts_with(" >> COPIED"));
    }

    #[test]
    fn double_delete_trashes_current() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        let delete = KeyPress::named(KeyName::Delete);
        f.viewer.key_down(&delete, f.t0);
        assert!(f.images.path().join("a.jpg").exists());
        f.viewer.key_down(&delete, f.t0 + secs(0.3));
        assert!(f.trash.path().join("a.jpg").exists());
        assert_eq!(current_name(&f.viewer), "b.jpg");
        assert!(f.viewer.feedback().unwrap().contains("TRASHED"));
    }

    #[test]
    fn removing_last_image_leaves_empty_state() {
        let mut f = fixture(&["only.jpg"]);
        let delete = KeyPress::named(KeyName::Delete);
        f.viewer.key_down(&delete, f.t0);
        f.viewer.key_down(&delete, f.t0 + secs(0.3));
        assert!(f.viewer.image_set().is_empty());
        assert!(f.viewer.displayed_image().is_none());
        assert_eq!(f.viewer.error_message(), Some("No images left"));

        // Navigation on the empty set is harmless.
        f.viewer.key_down(&KeyPress::char('.'), f.t0 + secs(1.0));
        f.viewer.key_down(&KeyPress::named(KeyName::End), f.t0 + secs(1.0));
        assert!(f.viewer.image_set().is_empty());
    }

    #[test]
    fn deleting_last_position_wraps_to_first() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.viewer.key_down(&KeyPress::named(KeyName::End), f.t0);
        let delete = KeyPress::named(KeyName::Delete);
        f.viewer.key_down(&delete, f.t0);
        f.viewer.key_down(&delete, f.t0 + secs(0.1));
        assert_eq!(f.viewer.image_set().position(), 0);
        assert_eq!(current_name(&f.viewer), "a.jpg");
    }

    #[test]
    fn double_q_quits() {
        let mut f = fixture(&["a.jpg"]);
        f.viewer.key_down(&KeyPress::char('q'), f.t0);
        assert!(f.viewer.take_effects().is_empty());
        f.viewer.key_down(&KeyPress::char('q'), f.t0 + secs(0.5));
        assert_eq!(f.viewer.take_effects(), vec![Effect::Quit]);
    }

    #[test]
    fn slideshow_advances_and_changes_pace() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        f.viewer.key_down(&KeyPress::char('s'), f.t0);
        assert!(f.viewer.slideshow_running());
        assert_eq!(current_name(&f.viewer), "b.jpg");

        f.viewer.tick(f.t0 + secs(20.0));
        assert_eq!(current_name(&f.viewer), "c.jpg");

        f.viewer.key_down(&KeyPress::char('s'), f.t0 + secs(21.0));
        assert_eq!(f.viewer.slideshow_interval(), 15);
        let shift = Modifiers { shift: true, ..Modifiers::default() };
        f.viewer.key_down(&KeyPress::char('S').with_modifiers(shift), f.t0 + secs(22.0));
        assert_eq!(f.viewer.slideshow_interval(), 25);
        assert_eq!(f.viewer.settings().ui.slideshow_interval, 25);

        // Next tick is one new interval after the last change.
        f.viewer.tick(f.t0 + secs(46.0));
        assert_eq!(current_name(&f.viewer), "c.jpg");
        f.viewer.tick(f.t0 + secs(47.0));
        assert_eq!(current_name(&f.viewer), "d.jpg");
    }

    #[test]
    fn slideshow_interval_bounds() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        let mut t = f.t0;
        f.viewer.key_down(&KeyPress::char('s'), t);
        for _ in 0..20 {
            t += secs(0.01);
            f.viewer.key_down(&KeyPress::char('s'), t);
        }
        assert_eq!(f.viewer.slideshow_interval(), 1);
        let shift = Modifiers { shift: true, ..Modifiers::default() };
        for _ in 0..20 {
            t += secs(0.01);
            f.viewer.key_down(&KeyPress::char('S').with_modifiers(shift), t);
        }
        assert_eq!(f.viewer.slideshow_interval(), 120);
    }

    #[test]
    fn other_keys_stop_slideshow() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        f.viewer.key_down(&KeyPress::char('s'), f.t0);
        f.viewer.key_down(&KeyPress::char('x'), f.t0 + secs(1.0));
        assert!(!f.viewer.slideshow_running());
        let before = current_name(&f.viewer);
        f.viewer.tick(f.t0 + secs(60.0));
        assert_eq!(current_name(&f.viewer), before);
    }

    #[test]
    fn shuffled_traversal_keeps_current_image() {
        let names: Vec<String> = (0..40).map(|i| format!("{:02}.jpg", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let mut f = fixture(&refs);
        f.viewer.key_down(&KeyPress::named(KeyName::End), f.t0);
        f.viewer.key_down(&KeyPress::char('['), f.t0);
        assert_eq!(f.viewer.image_set().mode(), TraversalMode::Shuffled);
        assert_eq!(f.viewer.image_set().len(), 40);
    }

    #[test]
    fn feedback_clears_on_timer() {
        let mut f = fixture(&["a.jpg"]);
        assert_eq!(f.viewer.feedback(), Some("timeless image viewer"));
        assert!(f.viewer.tick(f.t0 + secs(1.0)));
        assert!(f.viewer.feedback().is_none());
    }

    #[test]
    fn pan_repeats_until_key_release() {
        let mut f = fixture(&["a.jpg"]);
        f.viewer.key_down(&KeyPress::named(KeyName::Up), f.t0);
        f.viewer.tick(f.t0 + PAN_REPEAT);
        let moved = f.viewer.viewport.offset_y;
        assert!(moved > 0.0);
        f.viewer.key_up();
        f.viewer.tick(f.t0 + PAN_REPEAT * 10);
        assert_eq!(f.viewer.viewport.offset_y, moved);
    }

    #[test]
    fn metadata_panel_opens_and_any_key_dismisses() {
        let mut f = fixture(&["a.jpg", "b.jpg"]);
        let png = f.images.path().join("real.png");
        image::RgbaImage::new(2, 2).save(&png).unwrap();
        fs::rename(&png, f.images.path().join("a.jpg")).unwrap();

        assert!(f.viewer.key_down(&KeyPress::char('i'), f.t0));
        assert!(f.viewer.metadata().is_some());
        assert!(f.viewer.key_down(&KeyPress::char('i'), f.t0 + secs(1.0)));
        assert!(f.viewer.metadata().is_none());
        assert_eq!(current_name(&f.viewer), "a.jpg");
    }

    #[test]
    fn window_zoom_emits_resize() {
        let mut f = fixture(&["a.jpg"]);
        let shift = Modifiers { shift: true, ..Modifiers::default() };
        f.viewer.key_down(&KeyPress::char('+').with_modifiers(shift), f.t0);
        match f.viewer.take_effects().as_slice() {
            [Effect::ResizeWindow { scale }] => assert!((scale - 1.1).abs() < 1e-6),
            other => panic!("unexpected effects {:?}", other),
        }
    }
}
