use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};
use softbuffer::Surface;

use crate::config::Geometry;
use crate::keymap::{KeyName, KeyPress, Modifiers};
use crate::loader::{DecodePool, UserEvent};
use crate::viewer::{Effect, TitleSink, Viewer};

pub mod render;
pub mod state;

/// Keeps the window title pointing at the image on screen.
struct WindowTitle(Arc<Window>);

impl TitleSink for WindowTitle {
    fn set_displayed_path(&mut self, path: &Path) {
        self.0.set_title(&format!("TimelessIV - {}", path.display()));
    }
}

fn key_name(key: &Key) -> KeyName {
    match key {
        Key::Named(NamedKey::ArrowUp) => KeyName::Up,
        Key::Named(NamedKey::ArrowDown) => KeyName::Down,
        Key::Named(NamedKey::ArrowLeft) => KeyName::Left,
        Key::Named(NamedKey::ArrowRight) => KeyName::Right,
        Key::Named(NamedKey::PageUp) => KeyName::PageUp,
        Key::Named(NamedKey::PageDown) => KeyName::PageDown,
        Key::Named(NamedKey::Home) => KeyName::Home,
        Key::Named(NamedKey::End) => KeyName::End,
        Key::Named(NamedKey::Delete) => KeyName::Delete,
        Key::Named(NamedKey::Backspace) => KeyName::Backspace,
        Key::Named(NamedKey::Escape) => KeyName::Escape,
        Key::Character(s) => s
            .chars()
            .next()
            .map(|c| KeyName::Char(c.to_ascii_lowercase()))
            .unwrap_or(KeyName::Other),
        _ => KeyName::Other,
    }
}

fn key_press(event: &KeyEvent, modifiers: Modifiers) -> KeyPress {
    // Some platforms drop the text while ctrl is held; fall back to the
    // logical character so ctrl+' still steps.
    let text = event
        .text
        .as_ref()
        .and_then(|t| t.chars().next())
        .filter(|c| !c.is_control())
        .or_else(|| match &event.logical_key {
            Key::Character(s) => s.chars().next(),
            _ => None,
        });
    KeyPress {
        code: text.map(|c| c as u32).unwrap_or(0),
        name: key_name(&event.logical_key),
        text,
        modifiers,
    }
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    viewer: Viewer<DecodePool>,
    settings_path: PathBuf,
    /// Key for the per-directory window geometry.
    working_dir: String,
    modifiers: Modifiers,
    geometry: Option<Geometry>,
    window: Option<Arc<Window>>,
    _context: Option<softbuffer::Context<Arc<Window>>>,
    surface: Option<Surface<Arc<Window>, Arc<Window>>>,
}

impl App {
    pub fn new(viewer: Viewer<DecodePool>, settings_path: PathBuf, working_dir: String) -> Self {
        Self {
            viewer,
            settings_path,
            working_dir,
            modifiers: Modifiers::default(),
            geometry: None,
            window: None,
            _context: None,
            surface: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn apply_effects(&mut self, event_loop: &ActiveEventLoop) {
        for effect in self.viewer.take_effects() {
            match effect {
                Effect::Quit => {
                    log::info!("Quit confirmed");
                    event_loop.exit();
                }
                Effect::ResizeWindow { scale } => {
                    if let Some(ref window) = self.window {
                        let size = window.inner_size();
                        let _ = window.request_inner_size(PhysicalSize::new(
                            (size.width as f32 * scale).round().max(1.0) as u32,
                            (size.height as f32 * scale).round().max(1.0) as u32,
                        ));
                    }
                }
                Effect::ToggleFullscreen => {
                    if let Some(ref window) = self.window {
                        if window.fullscreen().is_some() {
                            window.set_fullscreen(None);
                        } else {
                            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                        }
                    }
                }
            }
        }
    }

    fn save_settings(&self) {
        let mut settings = self.viewer.settings().clone();
        if let Some(geometry) = self.geometry {
            settings.remember_geometry(&self.working_dir, geometry);
        }
        match settings.save(&self.settings_path) {
            Ok(()) => log::debug!("Saved settings to {}", self.settings_path.display()),
            Err(e) => log::warn!("Couldn't save settings: {}", e),
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let mut attrs = Window::default_attributes().with_title("TimelessIV");
        match self.viewer.settings().geometry_for(&self.working_dir) {
            Some(g) => {
                attrs = attrs
                    .with_inner_size(PhysicalSize::new(g.width.max(1), g.height.max(1)))
                    .with_position(PhysicalPosition::new(g.x, g.y));
            }
            None => attrs = attrs.with_inner_size(LogicalSize::new(1280u32, 720u32)),
        }

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Cannot create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let context = match softbuffer::Context::new(Arc::clone(&window)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Cannot create drawing context: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = match Surface::new(&context, Arc::clone(&window)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Cannot create drawing surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.viewer.viewport.set_window_size(size.width, size.height);
        self.viewer
            .attach_title_sink(Box::new(WindowTitle(Arc::clone(&window))));

        window.request_redraw();
        self.window = Some(window);
        self._context = Some(context);
        self.surface = Some(surface);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Loaded(result) => {
                if self.viewer.on_loaded(result) {
                    self.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let (w, h) = (width.max(1), height.max(1));
                if let (Some(surface), Some(nw), Some(nh)) =
                    (self.surface.as_mut(), NonZeroU32::new(w), NonZeroU32::new(h))
                {
                    if let Err(e) = surface.resize(nw, nh) {
                        log::warn!("Surface resize failed: {}", e);
                    }
                }
                self.viewer.viewport.set_window_size(w, h);
                let (x, y) = self.geometry.map(|g| (g.x, g.y)).unwrap_or((0, 0));
                self.geometry = Some(Geometry { width: w, height: h, x, y });
                self.request_redraw();
            }

            WindowEvent::Moved(PhysicalPosition { x, y }) => {
                let (width, height) = self
                    .window
                    .as_ref()
                    .map(|w| (w.inner_size().width, w.inner_size().height))
                    .unwrap_or((1280, 720));
                self.geometry = Some(Geometry { width, height, x, y });
            }

            WindowEvent::ModifiersChanged(m) => {
                let state = m.state();
                self.modifiers = Modifiers {
                    shift: state.shift_key(),
                    ctrl: state.control_key(),
                    alt: state.alt_key(),
                    meta: state.super_key(),
                };
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Released {
                    self.viewer.key_up();
                    return;
                }
                let press = key_press(&event, self.modifiers);
                let now = Instant::now();
                let changed = if event.repeat {
                    self.viewer.key_repeat(&press, now)
                } else {
                    self.viewer.key_down(&press, now)
                };
                if changed {
                    self.apply_effects(event_loop);
                    self.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.as_ref() else { return };
                let Some(surface) = self.surface.as_mut() else { return };
                let size = window.inner_size();
                let fb_w = size.width.max(1);
                let fb_h = size.height.max(1);
                match surface.buffer_mut() {
                    Ok(mut buffer) => {
                        self.viewer.render(&mut buffer, fb_w, fb_h);
                        if let Err(e) = buffer.present() {
                            log::warn!("Present failed: {}", e);
                        }
                    }
                    Err(e) => log::warn!("No framebuffer: {}", e),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.tick(Instant::now()) {
            self.request_redraw();
        }
        match self.viewer.next_deadline() {
            Some(when) => event_loop.set_control_flow(ControlFlow::WaitUntil(when)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.save_settings();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_map_to_key_names() {
        assert_eq!(key_name(&Key::Named(NamedKey::PageDown)), KeyName::PageDown);
        assert_eq!(key_name(&Key::Named(NamedKey::Delete)), KeyName::Delete);
        assert_eq!(key_name(&Key::Named(NamedKey::F1)), KeyName::Other);
        assert_eq!(key_name(&Key::Character("M".into())), KeyName::Char('m'));
    }
}
