use std::time::Duration;

use crate::cli::HELP_KEYS;
use crate::keymap::{Modifiers, PanDirection};
use crate::loader::ImageLoader;
use crate::ui::render::{
    color_from_floats, fit_scale, font_scale, line_height, text_width, Canvas, BG_COLOR,
    ERROR_COLOR, PANEL_COLOR, WHITE,
};
use crate::viewer::Viewer;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How often a held arrow key moves the image.
pub const PAN_REPEAT: Duration = Duration::from_millis(8);
const PAN_RESET_STEP: f32 = 20.0;
const PAN_ACCEL: f32 = 2.0;

const MIN_ZOOM: f32 = 0.01;
const MAX_ZOOM: f32 = 64.0;
const MIN_WINDOW_ZOOM: f32 = 0.2;
const MAX_WINDOW_ZOOM: f32 = 5.0;

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomMode {
    /// Scale the image to fit the window.
    #[default]
    Fit,
    /// Fixed zoom with free panning; survives image changes.
    Pan,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    pub zoom_mode: ZoomMode,
    pub img_zoom: f32,
    pub window_zoom: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Counter-clockwise quarter turns.
    pub rotation: u8,
    window_size: (u32, u32),
    pan_direction: Option<PanDirection>,
    pan_step: f32,
    pan_amount: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom_mode: ZoomMode::Fit,
            img_zoom: 1.0,
            window_zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation: 0,
            window_size: (1280, 720),
            pan_direction: None,
            pan_step: PAN_RESET_STEP,
            pan_amount: 0.0,
        }
    }
}

impl Viewport {
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width.max(1), height.max(1));
    }

    /// Image dimensions after rotation.
    fn rotated(&self, img_w: u32, img_h: u32) -> (f32, f32) {
        if self.rotation % 2 == 1 {
            (img_h as f32, img_w as f32)
        } else {
            (img_w as f32, img_h as f32)
        }
    }

    pub fn scale_in(&self, img_w: u32, img_h: u32, win_w: u32, win_h: u32) -> f32 {
        match self.zoom_mode {
            ZoomMode::Fit => {
                let (w, h) = self.rotated(img_w, img_h);
                fit_scale(w, h, win_w as f32, win_h as f32)
            }
            ZoomMode::Pan => self.img_zoom,
        }
    }

    /// Scale the image is drawn at in the current window.
    pub fn scale_for(&self, img_w: u32, img_h: u32) -> f32 {
        self.scale_in(img_w, img_h, self.window_size.0, self.window_size.1)
    }

    /// Multiply the drawn scale by `factor`, leaving fit mode.
    pub fn zoom_by(&mut self, factor: f32, current_scale: f32) {
        self.img_zoom = (current_scale * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom_mode = ZoomMode::Pan;
    }

    pub fn zoom_to(&mut self, zoom: f32) {
        self.img_zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom_mode = ZoomMode::Pan;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    pub fn zoom_fit(&mut self) {
        self.zoom_mode = ZoomMode::Fit;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    /// Change the window zoom by `step`. Returns the ratio to resize the
    /// window by.
    pub fn window_zoom_by(&mut self, step: f32) -> f32 {
        let old = self.window_zoom;
        self.window_zoom = (old + step).clamp(MIN_WINDOW_ZOOM, MAX_WINDOW_ZOOM);
        self.window_zoom / old
    }

    pub fn rotate(&mut self, quarter_turns: u8) {
        self.rotation = (self.rotation + quarter_turns) % 4;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    /// Offsets and rotation go back to neutral; the zoom mode stays.
    pub fn reset_for_new_image(&mut self) {
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.rotation = 0;
    }

    /// Each repeated press in the same direction speeds panning up.
    pub fn start_pan(&mut self, direction: PanDirection, modifiers: Modifiers) {
        if self.pan_direction == Some(direction) {
            self.pan_step += PAN_ACCEL;
        } else {
            self.pan_direction = Some(direction);
            self.pan_step = PAN_RESET_STEP;
        }
        let mut amount = self.pan_step;
        if modifiers.shift {
            amount /= 2.0;
        }
        if modifiers.ctrl {
            amount /= 5.0;
        }
        if modifiers.alt {
            amount /= 18.0;
        }
        self.pan_amount = amount;
    }

    pub fn pan_tick(&mut self) {
        let amount = self.pan_amount;
        match self.pan_direction {
            Some(PanDirection::Up) => self.offset_y += amount,
            Some(PanDirection::Down) => self.offset_y -= amount,
            Some(PanDirection::Left) => self.offset_x += amount,
            Some(PanDirection::Right) => self.offset_x -= amount,
            None => {}
        }
    }

    pub fn stop_pan(&mut self) {
        self.pan_direction = None;
        self.pan_step = PAN_RESET_STEP;
        self.pan_amount = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

impl<L: ImageLoader> Viewer<L> {
    /// Render into the softbuffer framebuffer.
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let mut canvas = Canvas::new(frame, fb_w, fb_h);
        canvas.clear(BG_COLOR);

        let ui = &self.settings().ui;
        let scale = font_scale(ui.feedback_fontsize);
        let center_y = fb_h as i32 / 2;

        if let Some(image) = self.displayed_image() {
            let zoom = self.viewport.scale_in(image.width, image.height, fb_w, fb_h);
            let (draw_w, draw_h) = if self.viewport.rotation % 2 == 1 {
                (image.height as f32 * zoom, image.width as f32 * zoom)
            } else {
                (image.width as f32 * zoom, image.height as f32 * zoom)
            };
            let x0 = (fb_w as f32 - draw_w) / 2.0 + self.viewport.offset_x;
            let y0 = (fb_h as f32 - draw_h) / 2.0 + self.viewport.offset_y;
            canvas.blit_image(image, x0, y0, zoom, self.viewport.rotation);
        }

        if let Some(err) = self.error_message() {
            let x = (fb_w as i32 - text_width(err, 2) as i32) / 2;
            canvas.draw_text(err, x.max(10), center_y, 2, ERROR_COLOR);
        } else if self.is_loading() {
            let label = "Loading...";
            let x = (fb_w as i32 - text_width(label, 2) as i32) / 2;
            if self.displayed_image().is_some() {
                canvas.fill_rect(x - 10, center_y - 10, text_width(label, 2) + 20, 34, PANEL_COLOR);
            }
            canvas.draw_text(label, x, center_y, 2, WHITE);
        }

        let status = self.status_line();
        let x = fb_w as i32 - text_width(&status, 2) as i32 - 10;
        canvas.draw_text(&status, x, 10, 2, [200, 200, 200, 160]);

        if let Some(rows) = self.metadata() {
            draw_metadata(&mut canvas, rows);
        }

        if let Some(info) = self.giant_info() {
            draw_panel(&mut canvas, info, scale, color_from_floats(ui.feedback_fg));
        }

        if let Some(text) = self.feedback() {
            let bar_h = line_height(scale) + 8;
            let y = fb_h as i32 - bar_h as i32;
            canvas.fill_rect(0, y, fb_w, bar_h, color_from_floats(ui.feedback_bg));
            canvas.draw_text(text, 10, y + 4, scale, color_from_floats(ui.feedback_fg));
        }

        if self.show_help() {
            canvas.fill_rect(0, 0, fb_w, fb_h, [0, 0, 0, 200]);
            let mut y = 20;
            for line in HELP_KEYS.lines() {
                canvas.draw_text(line, 20, y, 2, WHITE);
                y += line_height(2) as i32 + 4;
            }
        }
    }
}

impl<L: ImageLoader> Viewer<L> {
    /// Position, traversal mode and slideshow/confirmation state for the
    /// top-right corner.
    fn status_line(&self) -> String {
        let set = self.image_set();
        let mut parts = Vec::new();
        if !set.is_empty() {
            parts.push(format!("{}/{}", set.position() + 1, set.len()));
        }
        if let Some(image) = self.displayed_image() {
            parts.push(format!(
                "{}x{} {} {:.0} kB",
                image.width,
                image.height,
                image.format_name,
                image.file_size as f64 / 1024.0
            ));
        }
        parts.push(set.mode().label().to_string());
        if self.slideshow_running() {
            parts.push(format!("slideshow {}s", self.slideshow_interval()));
        }
        if let Some(action) = self.pending_action() {
            parts.push(format!("{}?", action.description()));
        }
        parts.join(" | ")
    }
}

/// Centered multi-line panel.
fn draw_panel(canvas: &mut Canvas<'_>, text: &str, scale: u32, color: [u8; 4]) {
    let lines: Vec<&str> = text.lines().collect();
    let line_h = line_height(scale);
    let width = lines.iter().map(|l| text_width(l, scale)).max().unwrap_or(0) + 40;
    let height = line_h * lines.len() as u32 + 40;
    let x = (canvas.width() as i32 - width as i32) / 2;
    let y = (canvas.height() as i32 - height as i32) / 2;
    canvas.fill_rect(x, y, width, height, PANEL_COLOR);
    for (i, line) in lines.iter().enumerate() {
        canvas.draw_text(line, x + 20, y + 20 + (i as u32 * line_h) as i32, scale, color);
    }
}

/// Two columns: labels on the left, values on the right.
fn draw_metadata(canvas: &mut Canvas<'_>, rows: &[(String, String)]) {
    let scale = 2;
    let line_h = line_height(scale);
    let label_w = rows.iter().map(|(k, _)| text_width(k, scale)).max().unwrap_or(0);
    let value_w = rows.iter().map(|(_, v)| text_width(v, scale)).max().unwrap_or(0);
    let width = (label_w + value_w + 60).min(canvas.width());
    let height = line_h * rows.len() as u32 + 30;
    canvas.fill_rect(10, 10, width, height, PANEL_COLOR);
    for (i, (label, value)) in rows.iter().enumerate() {
        let y = 25 + (i as u32 * line_h) as i32;
        canvas.draw_text(label, 25, y, scale, [200, 200, 120, 255]);
        canvas.draw_text(value, 25 + label_w as i32 + 20, y, scale, WHITE);
    }
}
