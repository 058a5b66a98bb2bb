/// Software rasteriser: paints a [`DrawList`] into an RGB pixel grid.
///
/// Fills use nonzero winding sampled at pixel centres. Strokes of at most
/// ~1.5 device pixels are walked pixel by pixel so hairlines never vanish;
/// thicker strokes become one quad per segment plus a square per joint, all
/// wound the same way and filled in a single pass so overlaps blend once.
/// Text is not rasterised; it is kept as [`Glyph`]s for the terminal to
/// print over the cells.
use crate::core::assets::Assets;
use crate::core::geometry::{Color, Point, Rect, Transform};
use crate::core::sprite::Sprite;
use crate::core::surface::{DrawList, DrawOp, Surface, TextAlign, TextStyle};

const HAIRLINE_MAX: f64 = 1.5;
const MAX_LINE_STEPS: usize = 1 << 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);

    fn blend(self, src: Color) -> Rgb {
        let a = src.a.clamp(0.0, 1.0);
        let mix = |s: u8, d: u8| (f64::from(s) * a + f64::from(d) * (1.0 - a)).round() as u8;
        Rgb(mix(src.r, self.0), mix(src.g, self.1), mix(src.b, self.2))
    }
}

impl From<Color> for Rgb {
    fn from(c: Color) -> Self {
        Rgb(c.r, c.g, c.b)
    }
}

/// Text anchored at a pixel; one character per pixel column.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub x: i64,
    pub y: i64,
    pub text: String,
    pub color: Rgb,
    pub bold: bool,
}

#[derive(Debug, Clone)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
    glyphs: Vec<Glyph>,
}

impl Raster {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::WHITE; width * height],
            glyphs: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Paints every command, scaling the list's logical size onto this grid.
    pub fn paint(&mut self, list: &DrawList, assets: &Assets) {
        if self.width == 0 || self.height == 0 || list.width() <= 0.0 || list.height() <= 0.0 {
            return;
        }
        let viewport = Transform::scaling(
            self.width as f64 / list.width(),
            self.height as f64 / list.height(),
        );

        for command in list.commands() {
            let m = viewport.then(&command.transform);
            match &command.op {
                DrawOp::Clear(rect) => {
                    self.fill(&[corners(rect, &m)], Color::WHITE);
                }
                DrawOp::FillRect(rect, color) => {
                    self.fill(&[corners(rect, &m)], *color);
                }
                DrawOp::StrokeRect(rect, color, width) => {
                    let ring = (corners(rect, &m), true);
                    self.stroke(&[ring], *color, width * m.mean_scale());
                }
                DrawOp::FillPath(path, color) => {
                    let polys: Vec<Vec<Point>> = path
                        .subpaths()
                        .iter()
                        .map(|s| s.points.iter().map(|p| m.apply(*p)).collect())
                        .collect();
                    self.fill(&polys, *color);
                }
                DrawOp::StrokePath(path, color, width) => {
                    let lines: Vec<(Vec<Point>, bool)> = path
                        .subpaths()
                        .iter()
                        .map(|s| (s.points.iter().map(|p| m.apply(*p)).collect(), s.closed))
                        .collect();
                    self.stroke(&lines, *color, width * m.mean_scale());
                }
                DrawOp::Image(id, rect) => {
                    if let Some(sprite) = assets.sprite(*id) {
                        self.blit(sprite, rect, &m);
                    }
                }
                DrawOp::Text(text, at, style) => self.place_text(text, m.apply(*at), style),
            }
        }
    }

    fn place_text(&mut self, text: &str, at: Point, style: &TextStyle) {
        if !at.x.is_finite() || !at.y.is_finite() {
            return;
        }
        let len = text.chars().count() as i64;
        let mut x = at.x.floor() as i64;
        if style.align == TextAlign::Center {
            x -= len / 2;
        }
        self.glyphs.push(Glyph {
            x,
            y: at.y.floor() as i64,
            text: text.to_owned(),
            color: Rgb::from(style.color),
            bold: style.bold,
        });
    }

    fn blend_at(&mut self, x: usize, y: usize, color: Color) {
        let idx = y * self.width + x;
        self.pixels[idx] = self.pixels[idx].blend(color);
    }

    /// Nonzero-winding scanline fill over all polygons together.
    fn fill(&mut self, polys: &[Vec<Point>], color: Color) {
        if !(color.a > 0.0) {
            return;
        }
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in polys.iter().flatten() {
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if !min_y.is_finite() || !max_y.is_finite() {
            return;
        }
        let row_start = (min_y - 0.5).ceil().max(0.0) as usize;
        let row_end = ((max_y - 0.5).floor() + 1.0).clamp(0.0, self.height as f64) as usize;

        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for row in row_start..row_end {
            let sy = row as f64 + 0.5;
            crossings.clear();
            for poly in polys.iter().filter(|p| p.len() >= 3) {
                for (i, a) in poly.iter().enumerate() {
                    let b = &poly[(i + 1) % poly.len()];
                    let dir = if a.y <= sy && b.y > sy {
                        1
                    } else if b.y <= sy && a.y > sy {
                        -1
                    } else {
                        continue;
                    };
                    let x = a.x + (sy - a.y) / (b.y - a.y) * (b.x - a.x);
                    crossings.push((x, dir));
                }
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                let start = (pair[0].0 - 0.5).ceil().max(0.0) as usize;
                let end = (pair[1].0 - 0.5).ceil().clamp(0.0, self.width as f64) as usize;
                for col in start..end {
                    self.blend_at(col, row, color);
                }
            }
        }
    }

    fn stroke(&mut self, lines: &[(Vec<Point>, bool)], color: Color, width: f64) {
        if !(color.a > 0.0) {
            return;
        }
        let segments = lines.iter().flat_map(|(points, closed)| {
            let wrap = if *closed && points.len() > 2 {
                points.first().zip(points.last()).map(|(first, last)| (*last, *first))
            } else {
                None
            };
            points.windows(2).map(|w| (w[0], w[1])).chain(wrap)
        });

        if width <= HAIRLINE_MAX {
            let mut hits: Vec<(usize, usize)> = Vec::new();
            for (a, b) in segments {
                self.walk_line(a, b, &mut hits);
            }
            hits.sort_unstable();
            hits.dedup();
            for (x, y) in hits {
                self.blend_at(x, y, color);
            }
            return;
        }

        let half = width / 2.0;
        let mut quads: Vec<Vec<Point>> = Vec::new();
        for (a, b) in segments {
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = (dx * dx + dy * dy).sqrt();
            if len > f64::EPSILON {
                let (nx, ny) = (-dy / len * half, dx / len * half);
                quads.push(clockwise(vec![
                    Point::new(a.x + nx, a.y + ny),
                    Point::new(b.x + nx, b.y + ny),
                    Point::new(b.x - nx, b.y - ny),
                    Point::new(a.x - nx, a.y - ny),
                ]));
            }
            quads.push(clockwise(corners(&Rect::centered(width, width), &Transform::translation(b.x, b.y))));
        }
        self.fill(&quads, color);
    }

    /// Marks the pixels containing each sample along `a → b`.
    fn walk_line(&self, a: Point, b: Point, hits: &mut Vec<(usize, usize)>) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        let steps = (dx.abs().max(dy.abs()).ceil() as usize).clamp(1, MAX_LINE_STEPS);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = snap(a.x + dx * t, self.width);
            let y = snap(a.y + dy * t, self.height);
            if let (Some(x), Some(y)) = (x, y) {
                hits.push((x, y));
            }
        }
    }

    /// Nearest-neighbour sprite sampling through the inverse transform.
    fn blit(&mut self, sprite: &Sprite, rect: &Rect, m: &Transform) {
        let Some(inverse) = m.invert() else {
            return;
        };
        if rect.width == 0.0 || rect.height == 0.0 {
            return;
        }
        let device = corners(rect, m);
        let (mut x0, mut y0, mut x1, mut y1) = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &device {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        let cols = x0.floor().max(0.0) as usize..x1.ceil().clamp(0.0, self.width as f64) as usize;
        let rows = y0.floor().max(0.0) as usize..y1.ceil().clamp(0.0, self.height as f64) as usize;

        for row in rows {
            for col in cols.clone() {
                let local = inverse.apply(Point::new(col as f64 + 0.5, row as f64 + 0.5));
                let u = (local.x - rect.x) / rect.width;
                let v = (local.y - rect.y) / rect.height;
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let sx = (u * sprite.width() as f64) as usize;
                let sy = (v * sprite.height() as f64) as usize;
                if let Some(color) = sprite.pixel(sx, sy) {
                    self.blend_at(col, row, color);
                }
            }
        }
    }
}

fn corners(rect: &Rect, m: &Transform) -> Vec<Point> {
    rect.corners().iter().map(|p| m.apply(*p)).collect()
}

/// Reverses the polygon if needed so it winds clockwise in screen space.
fn clockwise(mut poly: Vec<Point>) -> Vec<Point> {
    let area: f64 = poly
        .iter()
        .zip(poly.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    if area < 0.0 {
        poly.reverse();
    }
    poly
}

/// Pixel index for a hairline coordinate; the far canvas edge maps onto the
/// last pixel instead of falling off the grid.
fn snap(v: f64, limit: usize) -> Option<usize> {
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    let edge = limit as f64;
    if v == edge && limit > 0 {
        return Some(limit - 1);
    }
    let p = v.floor();
    (p < edge).then_some(p as usize)
}
