//! Software drawing primitives over a softbuffer framebuffer (one `u32` per
//! pixel, `0x00RRGGBB`).

use crate::loader::DecodedImage;

/// RGBA, straight alpha.
pub type Color = [u8; 4];

pub const BG_COLOR: Color = [31, 31, 31, 255];
pub const WHITE: Color = [255, 255, 255, 255];
pub const ERROR_COLOR: Color = [255, 80, 80, 255];
pub const PANEL_COLOR: Color = [0, 0, 0, 190];

pub const GLYPH_W: u32 = 5;
pub const GLYPH_H: u32 = 7;

/// ASCII 32..=127, one byte per column, LSB is the top row.
static FONT_5X7: [[u8; 5]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x5F, 0x00, 0x00], [0x00, 0x07, 0x00, 0x07, 0x00], [0x14, 0x7F, 0x14, 0x7F, 0x14],
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], [0x23, 0x13, 0x08, 0x64, 0x62], [0x36, 0x49, 0x55, 0x22, 0x50], [0x00, 0x05, 0x03, 0x00, 0x00],
    [0x00, 0x1C, 0x22, 0x41, 0x00], [0x00, 0x41, 0x22, 0x1C, 0x00], [0x14, 0x08, 0x3E, 0x08, 0x14], [0x08, 0x08, 0x3E, 0x08, 0x08],
    [0x00, 0x50, 0x30, 0x00, 0x00], [0x08, 0x08, 0x08, 0x08, 0x08], [0x00, 0x60, 0x60, 0x00, 0x00], [0x20, 0x10, 0x08, 0x04, 0x02],
    [0x3E, 0x51, 0x49, 0x45, 0x3E], [0x00, 0x42, 0x7F, 0x40, 0x00], [0x42, 0x61, 0x51, 0x49, 0x46], [0x21, 0x41, 0x45, 0x4B, 0x31],
    [0x18, 0x14, 0x12, 0x7F, 0x10], [0x27, 0x45, 0x45, 0x45, 0x39], [0x3C, 0x4A, 0x49, 0x49, 0x30], [0x01, 0x71, 0x09, 0x05, 0x03],
    [0x36, 0x49, 0x49, 0x49, 0x36], [0x06, 0x49, 0x49, 0x29, 0x1E], [0x00, 0x36, 0x36, 0x00, 0x00], [0x00, 0x56, 0x36, 0x00, 0x00],
    [0x08, 0x14, 0x22, 0x41, 0x00], [0x14, 0x14, 0x14, 0x14, 0x14], [0x00, 0x41, 0x22, 0x14, 0x08], [0x02, 0x01, 0x51, 0x09, 0x06],
    [0x3E, 0x41, 0x5D, 0x55, 0x1E], [0x7E, 0x11, 0x11, 0x11, 0x7E], [0x7F, 0x49, 0x49, 0x49, 0x36], [0x3E, 0x41, 0x41, 0x41, 0x22],
    [0x7F, 0x41, 0x41, 0x22, 0x1C], [0x7F, 0x49, 0x49, 0x49, 0x41], [0x7F, 0x09, 0x09, 0x09, 0x01], [0x3E, 0x41, 0x49, 0x49, 0x7A],
    [0x7F, 0x08, 0x08, 0x08, 0x7F], [0x00, 0x41, 0x7F, 0x41, 0x00], [0x20, 0x40, 0x41, 0x3F, 0x01], [0x7F, 0x08, 0x14, 0x22, 0x41],
    [0x7F, 0x40, 0x40, 0x40, 0x40], [0x7F, 0x02, 0x0C, 0x02, 0x7F], [0x7F, 0x04, 0x08, 0x10, 0x7F], [0x3E, 0x41, 0x41, 0x41, 0x3E],
    [0x7F, 0x09, 0x09, 0x09, 0x06], [0x3E, 0x41, 0x51, 0x21, 0x5E], [0x7F, 0x09, 0x19, 0x29, 0x46], [0x46, 0x49, 0x49, 0x49, 0x31],
    [0x01, 0x01, 0x7F, 0x01, 0x01], [0x3F, 0x40, 0x40, 0x40, 0x3F], [0x1F, 0x20, 0x40, 0x20, 0x1F], [0x3F, 0x40, 0x38, 0x40, 0x3F],
    [0x63, 0x14, 0x08, 0x14, 0x63], [0x07, 0x08, 0x70, 0x08, 0x07], [0x61, 0x51, 0x49, 0x45, 0x43], [0x00, 0x7F, 0x41, 0x41, 0x00],
    [0x02, 0x04, 0x08, 0x10, 0x20], [0x00, 0x41, 0x41, 0x7F, 0x00], [0x04, 0x02, 0x01, 0x02, 0x04], [0x40, 0x40, 0x40, 0x40, 0x40],
    [0x00, 0x01, 0x02, 0x04, 0x00], [0x20, 0x54, 0x54, 0x54, 0x78], [0x7F, 0x48, 0x44, 0x44, 0x38], [0x38, 0x44, 0x44, 0x44, 0x20],
    [0x38, 0x44, 0x44, 0x48, 0x7F], [0x38, 0x54, 0x54, 0x54, 0x18], [0x08, 0x7E, 0x09, 0x01, 0x02], [0x0C, 0x52, 0x52, 0x52, 0x3E],
    [0x7F, 0x08, 0x04, 0x04, 0x78], [0x00, 0x44, 0x7D, 0x40, 0x00], [0x20, 0x40, 0x44, 0x3D, 0x00], [0x7F, 0x10, 0x28, 0x44, 0x00],
    [0x00, 0x41, 0x7F, 0x40, 0x00], [0x7C, 0x04, 0x18, 0x04, 0x78], [0x7C, 0x08, 0x04, 0x04, 0x78], [0x38, 0x44, 0x44, 0x44, 0x38],
    [0x7C, 0x14, 0x14, 0x14, 0x08], [0x08, 0x14, 0x14, 0x18, 0x7C], [0x7C, 0x08, 0x04, 0x04, 0x08], [0x48, 0x54, 0x54, 0x54, 0x20],
    [0x04, 0x3F, 0x44, 0x40, 0x20], [0x3C, 0x40, 0x40, 0x20, 0x7C], [0x1C, 0x20, 0x40, 0x20, 0x1C], [0x3C, 0x40, 0x30, 0x40, 0x3C],
    [0x44, 0x28, 0x10, 0x28, 0x44], [0x0C, 0x50, 0x50, 0x50, 0x3C], [0x44, 0x64, 0x54, 0x4C, 0x44], [0x00, 0x08, 0x36, 0x41, 0x00],
    [0x00, 0x00, 0x7F, 0x00, 0x00], [0x00, 0x41, 0x36, 0x08, 0x00], [0x10, 0x08, 0x08, 0x10, 0x08], [0x00, 0x00, 0x00, 0x00, 0x00],
];

pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

/// Settings colours are stored as 0.0..=1.0 floats.
pub fn color_from_floats(c: [f32; 4]) -> Color {
    c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Pixel scale for the bitmap font that gets closest to `fontsize` pixels of
/// line height.
pub fn font_scale(fontsize: u32) -> u32 {
    (fontsize / (GLYPH_H + 1)).max(1)
}

pub fn line_height(scale: u32) -> u32 {
    (GLYPH_H + 3) * scale
}

pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (GLYPH_W + 1) * scale
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h)
}

pub struct Canvas<'a> {
    buf: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(buf: &'a mut [u32], width: u32, height: u32) -> Self {
        Self { buf, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: Color) {
        self.buf.fill(rgb(color[0], color[1], color[2]));
    }

    fn blend(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let off = (y as u32 * self.width + x as u32) as usize;
        let Some(px) = self.buf.get_mut(off) else { return };
        let a = color[3] as u32;
        if a == 255 {
            *px = rgb(color[0], color[1], color[2]);
            return;
        }
        let (dr, dg, db) = unpack_rgb(*px);
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
        *px = rgb(mix(color[0], dr), mix(color[1], dg), mix(color[2], db));
    }

    pub fn fill_rect(&mut self, rx: i32, ry: i32, rw: u32, rh: u32, color: Color) {
        let x_start = rx.max(0);
        let y_start = ry.max(0);
        let x_end = (rx + rw as i32).min(self.width as i32);
        let y_end = (ry + rh as i32).min(self.height as i32);
        for y in y_start..y_end {
            for x in x_start..x_end {
                self.blend(x, y, color);
            }
        }
    }

    fn draw_char(&mut self, ch: char, px: i32, py: i32, scale: u32, color: Color) {
        let idx = (ch as u32).wrapping_sub(32) as usize;
        let Some(glyph) = FONT_5X7.get(idx) else { return };
        for (col, bits) in glyph.iter().enumerate() {
            for row in 0..GLYPH_H {
                if bits & (1 << row) == 0 {
                    continue;
                }
                let x = px + (col as u32 * scale) as i32;
                let y = py + (row * scale) as i32;
                self.fill_rect(x, y, scale, scale, color);
            }
        }
    }

    /// Draw one line of text. Returns the x position after the last glyph.
    pub fn draw_text(&mut self, text: &str, px: i32, py: i32, scale: u32, color: Color) -> i32 {
        let mut x = px;
        for ch in text.chars() {
            self.draw_char(ch, x, py, scale, color);
            x += ((GLYPH_W + 1) * scale) as i32;
        }
        x
    }

    /// Draw `image` scaled by `scale` with its top-left corner at (x0, y0),
    /// rotated by `rotation` quarter turns counter-clockwise.
    pub fn blit_image(&mut self, image: &DecodedImage, x0: f32, y0: f32, scale: f32, rotation: u8) {
        let (src_w, src_h) = (image.width, image.height);
        let src = &image.rgba_bytes;
        let (draw_w, draw_h) = if rotation % 2 == 1 {
            (src_h as f32 * scale, src_w as f32 * scale)
        } else {
            (src_w as f32 * scale, src_h as f32 * scale)
        };

        let dx_start = x0.max(0.0) as u32;
        let dy_start = y0.max(0.0) as u32;
        let dx_end = ((x0 + draw_w).ceil().max(0.0) as u32).min(self.width);
        let dy_end = ((y0 + draw_h).ceil().max(0.0) as u32).min(self.height);
        let inv_scale = 1.0 / scale;

        for dy in dy_start..dy_end {
            let vy = (dy as f32 - y0) * inv_scale;
            for dx in dx_start..dx_end {
                let vx = (dx as f32 - x0) * inv_scale;
                let (sx, sy) = match rotation % 4 {
                    1 => ((src_w as f32 - 1.0 - vy) as u32, vx as u32),
                    2 => ((src_w as f32 - 1.0 - vx) as u32, (src_h as f32 - 1.0 - vy) as u32),
                    3 => (vy as u32, (src_h as f32 - 1.0 - vx) as u32),
                    _ => (vx as u32, vy as u32),
                };
                if sx >= src_w || sy >= src_h {
                    continue;
                }
                let si = (sy as usize * src_w as usize + sx as usize) * 4;
                let Some(p) = src.get(si..si + 4) else { continue };
                if p[3] > 0 {
                    self.blend(dx as i32, dy as i32, [p[0], p[1], p[2], p[3]]);
                }
            }
        }
    }
}
