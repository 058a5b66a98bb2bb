/// 2D primitives shared by the renderer, the draw list and the rasteriser.
use std::f64::consts::TAU;

/// Segments used to flatten a full circle; partial arcs use a proportional share.
const SEGMENTS_PER_TURN: f64 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of the given size centred on the origin.
    pub fn centered(width: f64, height: f64) -> Self {
        Self::new(-width / 2.0, -height / 2.0, width, height)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }
}

/// Straight RGBA colour; alpha is 0.0..=1.0 like a CSS `rgba()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(
                channel(0)?,
                channel(2)?,
                channel(4)?,
                f64::from(channel(6)?) / 255.0,
            )),
            _ => None,
        }
    }
}

/// Affine transform with the same layout as a 2D canvas matrix:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub const fn translation(x: f64, y: f64) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    pub const fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// `self · other`: `other` is applied to a point first.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn invert(&self) -> Option<Transform> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Transform {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Average linear scale, used to size strokes after transformation.
    pub fn mean_scale(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subpath {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// A canvas-style path, flattened to polylines as it is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    subpaths: Vec<Subpath>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full circle as its own closed subpath.
    pub fn circle(cx: f64, cy: f64, radius: f64) -> Self {
        let mut path = Self::new();
        path.arc(cx, cy, radius, 0.0, TAU);
        path.close();
        path
    }

    pub fn polygon(points: impl IntoIterator<Item = Point>) -> Self {
        let mut path = Self::new();
        let mut points = points.into_iter();
        if let Some(first) = points.next() {
            path.move_to(first.x, first.y);
            for p in points {
                path.line_to(p.x, p.y);
            }
            path.close();
        }
        path
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.subpaths.push(Subpath {
            points: vec![Point::new(x, y)],
            closed: false,
        });
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        match self.subpaths.last_mut() {
            Some(sub) if !sub.closed => sub.points.push(Point::new(x, y)),
            _ => {
                self.move_to(x, y);
            }
        }
        self
    }

    /// Clockwise arc from `start` to `end` (radians), joined to the current point.
    pub fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64) -> &mut Self {
        self.ellipse(cx, cy, radius, radius, 0.0, start, end)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        rotation: f64,
        start: f64,
        end: f64,
    ) -> &mut Self {
        let sweep = end - start;
        let steps = ((sweep.abs() / TAU) * SEGMENTS_PER_TURN).ceil().max(1.0) as usize;
        let (rot_sin, rot_cos) = rotation.sin_cos();
        for i in 0..=steps {
            let angle = start + sweep * (i as f64 / steps as f64);
            let (sin, cos) = angle.sin_cos();
            let (ex, ey) = (rx * cos, ry * sin);
            self.line_to(
                cx + ex * rot_cos - ey * rot_sin,
                cy + ex * rot_sin + ey * rot_cos,
            );
        }
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if let Some(sub) = self.subpaths.last_mut() {
            sub.closed = true;
        }
        self
    }

    pub fn subpaths(&self) -> &[Subpath] {
        &self.subpaths
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }
}
