//! Minimal chart rasterizer for trend and relationship plots.
//!
//! Draws a title, axes with tick labels, axis names, one colour per series
//! and a text legend onto an [`RgbImage`], using the bitmap font in
//! [`super::font`].

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::font::{self, ADVANCE, GLYPH_HEIGHT};
use super::types::AnalyticsResult;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 480;
const PLOT_LEFT: i64 = 72;
const PLOT_RIGHT: i64 = WIDTH as i64 - 24;
const PLOT_TOP: i64 = 40;
const PLOT_BOTTOM: i64 = HEIGHT as i64 - 56;
const Y_TICKS: usize = 5;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([23, 190, 207]),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Scatter,
}

/// One plotted series; `label` is `None` for an unsegmented plot.
///
/// A non-finite coordinate marks a missing value: line charts leave a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct Chart {
    pub kind: ChartKind,
    pub series: Vec<Series>,
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    /// Categorical x ticks `(x, label)`; numeric ticks are used when empty.
    pub x_ticks: Vec<(f64, String)>,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Bounds {
    fn of(series: &[Series], x_ticks: &[(f64, String)]) -> Self {
        let mut b = Bounds {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for &(x, y) in series.iter().flat_map(|s| &s.points) {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            b.x_min = b.x_min.min(x);
            b.x_max = b.x_max.max(x);
            b.y_min = b.y_min.min(y);
            b.y_max = b.y_max.max(y);
        }
        if b.x_min > b.x_max {
            return Bounds {
                x_min: 0.0,
                x_max: 1.0,
                y_min: 0.0,
                y_max: 1.0,
            };
        }
        // Keep every categorical tick on the axis, even ones with no data.
        for &(x, _) in x_ticks {
            if x.is_finite() {
                b.x_min = b.x_min.min(x);
                b.x_max = b.x_max.max(x);
            }
        }
        if b.x_max == b.x_min {
            b.x_min -= 1.0;
            b.x_max += 1.0;
        }
        if b.y_max == b.y_min {
            b.y_min -= 1.0;
            b.y_max += 1.0;
        }
        b
    }

    fn px(&self, x: f64) -> i64 {
        let w = (PLOT_RIGHT - PLOT_LEFT) as f64;
        (PLOT_LEFT as f64 + (x - self.x_min) / (self.x_max - self.x_min) * w).round() as i64
    }

    fn py(&self, y: f64) -> i64 {
        let h = (PLOT_BOTTOM - PLOT_TOP) as f64;
        (PLOT_BOTTOM as f64 - (y - self.y_min) / (self.y_max - self.y_min) * h).round() as i64
    }

    fn project(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        Some((self.px(x), self.py(y)))
    }
}

/// Compact tick text: `1.2M`, `3.5k`, `12`, `0.25`.
fn tick_text(v: f64) -> String {
    let a = v.abs();
    if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e4 {
        format!("{:.1}k", v / 1e3)
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line.
fn draw_line(img: &mut RgbImage, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        put(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_marker(img: &mut RgbImage, (cx, cy): (i64, i64), color: Rgb<u8>) {
    for dy in -2..=2 {
        for dx in -2..=2 {
            put(img, cx + dx, cy + dy, color);
        }
    }
}

impl Chart {
    fn new(kind: ChartKind, series: Vec<Series>) -> Self {
        Self {
            kind,
            series,
            title: None,
            x_label: None,
            y_label: None,
            x_ticks: Vec::new(),
        }
    }

    pub fn line(series: Vec<Series>) -> Self {
        Self::new(ChartKind::Line, series)
    }

    pub fn scatter(series: Vec<Series>) -> Self {
        Self::new(ChartKind::Scatter, series)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_axis_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn with_x_ticks(mut self, ticks: Vec<(f64, String)>) -> Self {
        self.x_ticks = ticks;
        self
    }

    pub fn color(index: usize) -> Rgb<u8> {
        PALETTE[index % PALETTE.len()]
    }

    pub fn render(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        let bounds = Bounds::of(&self.series, &self.x_ticks);

        self.draw_frame(&mut img, &bounds);
        for (i, series) in self.series.iter().enumerate() {
            let color = Self::color(i);
            let projected: Vec<Option<(i64, i64)>> = series
                .points
                .iter()
                .map(|&(x, y)| bounds.project(x, y))
                .collect();
            match self.kind {
                ChartKind::Line => {
                    for pair in projected.windows(2) {
                        if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                            draw_line(&mut img, a, b, color);
                        }
                    }
                    for p in projected.iter().flatten() {
                        put(&mut img, p.0, p.1, color);
                    }
                }
                ChartKind::Scatter => {
                    for &p in projected.iter().flatten() {
                        draw_marker(&mut img, p, color);
                    }
                }
            }
        }
        self.draw_legend(&mut img);
        img
    }

    fn draw_frame(&self, img: &mut RgbImage, bounds: &Bounds) {
        let origin = (PLOT_LEFT, PLOT_BOTTOM);
        draw_line(img, origin, (PLOT_LEFT, PLOT_TOP), AXIS);
        draw_line(img, origin, (PLOT_RIGHT, PLOT_BOTTOM), AXIS);

        if let Some(title) = &self.title {
            let max_chars = ((WIDTH as i64 - 16) / (ADVANCE * 2)) as usize;
            let text = font::fit(title, max_chars);
            let x = (WIDTH as i64 - font::text_width(&text, 2)) / 2;
            font::draw_text(img, x, 12, &text, AXIS, 2);
        }

        // y ticks
        for i in 0..Y_TICKS {
            let v = bounds.y_min + (bounds.y_max - bounds.y_min) * i as f64 / (Y_TICKS - 1) as f64;
            let y = bounds.py(v);
            draw_line(img, (PLOT_LEFT - 4, y), (PLOT_LEFT, y), AXIS);
            let text = font::fit(&tick_text(v), 9);
            let x = PLOT_LEFT - 8 - font::text_width(&text, 1);
            font::draw_text(img, x, y - GLYPH_HEIGHT / 2, &text, AXIS, 1);
        }

        // x ticks: categorical labels thinned so they never overlap
        let ticks: Vec<(f64, String)> = if self.x_ticks.is_empty() {
            (0..Y_TICKS)
                .map(|i| {
                    let v = bounds.x_min
                        + (bounds.x_max - bounds.x_min) * i as f64 / (Y_TICKS - 1) as f64;
                    (v, tick_text(v))
                })
                .collect()
        } else {
            self.x_ticks.clone()
        };
        let widest = ticks
            .iter()
            .map(|(_, t)| font::text_width(&font::fit(t, 16), 1))
            .max()
            .unwrap_or(0);
        let spacing = if ticks.len() > 1 {
            ((PLOT_RIGHT - PLOT_LEFT) / (ticks.len() as i64 - 1)).max(1)
        } else {
            PLOT_RIGHT - PLOT_LEFT
        };
        let stride = ((widest + ADVANCE) / spacing + 1).max(1) as usize;
        for (x, label) in ticks.iter().step_by(stride) {
            if !x.is_finite() {
                continue;
            }
            let px = bounds.px(*x);
            draw_line(img, (px, PLOT_BOTTOM), (px, PLOT_BOTTOM + 4), AXIS);
            let text = font::fit(label, 16);
            let left = px - font::text_width(&text, 1) / 2;
            font::draw_text(img, left, PLOT_BOTTOM + 8, &text, AXIS, 1);
        }

        if let Some(x_label) = &self.x_label {
            let left = (PLOT_LEFT + PLOT_RIGHT - font::text_width(x_label, 1)) / 2;
            font::draw_text(img, left, PLOT_BOTTOM + 28, x_label, AXIS, 1);
        }
        if let Some(y_label) = &self.y_label {
            let text = font::fit(y_label, 11);
            font::draw_text(img, 4, PLOT_TOP - 14, &text, AXIS, 1);
        }
    }

    /// Swatch plus label for every labelled series, top right of the plot.
    fn draw_legend(&self, img: &mut RgbImage) {
        let labels: Vec<(usize, String)> = self
            .series
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.label.as_deref().map(|l| (i, font::fit(l, 24))))
            .collect();
        if labels.is_empty() {
            return;
        }
        let widest = labels
            .iter()
            .map(|(_, l)| font::text_width(l, 1))
            .max()
            .unwrap_or(0);
        let left = PLOT_RIGHT - widest - 32;
        for (row, (i, label)) in labels.iter().enumerate() {
            let top = PLOT_TOP + 6 + 12 * row as i64;
            let color = Self::color(*i);
            for dy in 2..5 {
                draw_line(img, (left, top + dy), (left + 16, top + dy), color);
            }
            font::draw_text(img, left + 22, top, label, AXIS, 1);
        }
    }

    /// Render and encode as PNG.
    pub fn to_png(&self) -> AnalyticsResult<Vec<u8>> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(self.render()).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}
