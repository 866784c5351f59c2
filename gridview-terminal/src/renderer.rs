/// Character-cell framebuffer for terminal rendering
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::Write;

/// A rasterized vertex in framebuffer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    /// Window-space depth in [0, 1]
    pub depth: f32,
}

/// Pixel grid shown two pixels per terminal cell (upper and lower half blocks)
pub struct Framebuffer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    color_buffer: Vec<Option<[u8; 3]>>,
    background: [u8; 3],
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            color_buffer: vec![None; size],
            background: [0, 0, 0],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn clear(&mut self, color: [f32; 4]) {
        self.depth_buffer.fill(f32::INFINITY);
        self.color_buffer.fill(None);
        self.background = to_rgb(color);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x < self.width && y < self.height {
            self.color_buffer[y * self.width + x]
        } else {
            None
        }
    }

    pub fn lit_pixels(&self) -> usize {
        self.color_buffer.iter().filter(|c| c.is_some()).count()
    }

    fn plot(&mut self, x: i64, y: i64, depth: f32, color: [u8; 3], depth_test: bool) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        if !(0.0..=1.0).contains(&depth) {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if !depth_test || depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.color_buffer[idx] = Some(color);
        }
    }

    /// Square point of `size` pixels centred on `v`
    pub fn draw_point(&mut self, v: ScreenVertex, size: f32, color: [f32; 4], depth_test: bool) {
        let rgb = to_rgb(color);
        // No point needs to be wider than twice the framebuffer to cover it
        let extent = (self.width.max(self.height).max(1) * 2) as f32;
        let half = size.clamp(1.0, extent) / 2.0;
        // Pixels whose centres fall inside the square, limited to the framebuffer
        let span = |centre: f32, limit: usize| {
            let lo = (centre - half - 0.5).ceil().max(0.0) as i64;
            let hi = ((centre + half - 0.5).ceil() as i64).min(limit as i64);
            lo..hi
        };
        let (xs, ys) = (span(v.x, self.width), span(v.y, self.height));
        for y in ys {
            for x in xs.clone() {
                self.plot(x, y, v.depth, rgb, depth_test);
            }
        }
    }

    /// Line segment with depth interpolated along its length
    pub fn draw_line(&mut self, a: ScreenVertex, b: ScreenVertex, color: [f32; 4], depth_test: bool) {
        let Some((a, b)) = clip_segment(a, b, self.width as f32, self.height as f32) else {
            return;
        };
        let rgb = to_rgb(color);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (a.x + dx * t).floor() as i64;
            let y = (a.y + dy * t).floor() as i64;
            let depth = a.depth + (b.depth - a.depth) * t;
            self.plot(x, y, depth, rgb, depth_test);
        }
    }

    /// Half-block glyph and colours for the terminal cell at (`column`, `row`)
    pub fn cell(&self, column: usize, row: usize) -> (char, Option<[u8; 3]>, Option<[u8; 3]>) {
        let top = self.pixel(column, row * 2);
        let bottom = self.pixel(column, row * 2 + 1);
        match (top, bottom) {
            (None, None) => (' ', None, None),
            (Some(t), None) => ('▀', Some(t), None),
            (None, Some(b)) => ('▄', Some(b), None),
            (Some(t), Some(b)) if t == b => ('█', Some(t), None),
            (Some(t), Some(b)) => ('▀', Some(t), Some(b)),
        }
    }

    /// Write the frame as terminal cells, starting at screen row `top`
    pub fn draw<W: Write>(&self, writer: &mut W, top: u16) -> std::io::Result<()> {
        let background = rgb_color(self.background);
        for row in 0..self.height.div_ceil(2) {
            writer.queue(cursor::MoveTo(0, top + row as u16))?;
            for column in 0..self.width {
                let (glyph, fg, bg) = self.cell(column, row);
                writer.queue(SetBackgroundColor(bg.map(rgb_color).unwrap_or(background)))?;
                if let Some(fg) = fg {
                    writer.queue(SetForegroundColor(rgb_color(fg)))?;
                }
                writer.queue(Print(glyph))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

fn to_rgb(color: [f32; 4]) -> [u8; 3] {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(color[0]), channel(color[1]), channel(color[2])]
}

fn rgb_color([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb { r, g, b }
}

/// Liang-Barsky clip of a segment against `[0, width) x [0, height)`
fn clip_segment(
    a: ScreenVertex,
    b: ScreenVertex,
    width: f32,
    height: f32,
) -> Option<(ScreenVertex, ScreenVertex)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    let edges = [
        (-dx, a.x),
        (dx, width - a.x),
        (-dy, a.y),
        (dy, height - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let lerp = |t: f32| ScreenVertex {
        x: a.x + dx * t,
        y: a.y + dy * t,
        depth: a.depth + (b.depth - a.depth) * t,
    };
    Some((lerp(t0), lerp(t1)))
}
