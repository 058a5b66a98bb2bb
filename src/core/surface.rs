/// Drawing surface the renderer targets, plus a recording implementation.
use crate::core::assets::AssetId;
use crate::core::geometry::{Color, Path, Point, Rect, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Color,
    pub size: f64,
    pub bold: bool,
    pub align: TextAlign,
}

impl TextStyle {
    pub fn new(color: Color, size: f64) -> Self {
        Self {
            color,
            size,
            bold: false,
            align: TextAlign::Left,
        }
    }

    pub fn bold(self) -> Self {
        Self { bold: true, ..self }
    }

    pub fn centered(self) -> Self {
        Self {
            align: TextAlign::Center,
            ..self
        }
    }
}

/// A 2D canvas in logical pixels with a transform stack.
pub trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, radians: f64);
    fn scale(&mut self, sx: f64, sy: f64);

    fn clear_rect(&mut self, rect: Rect);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);
    fn fill_path(&mut self, path: &Path, color: Color);
    fn stroke_path(&mut self, path: &Path, color: Color, line_width: f64);
    fn draw_image(&mut self, asset: AssetId, rect: Rect);
    fn fill_text(&mut self, text: &str, at: Point, style: TextStyle);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Rect),
    FillRect(Rect, Color),
    StrokeRect(Rect, Color, f64),
    FillPath(Path, Color),
    StrokePath(Path, Color, f64),
    Image(AssetId, Rect),
    Text(String, Point, TextStyle),
}

/// One recorded call and the transform that was current when it was made.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub transform: Transform,
    pub op: DrawOp,
}

impl DrawCommand {
    /// Where the local origin of this command lands on the canvas.
    pub fn origin(&self) -> Point {
        self.transform.apply(Point::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    width: f64,
    height: f64,
    current: Transform,
    stack: Vec<Transform>,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            current: Transform::IDENTITY,
            stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn ops(&self) -> impl Iterator<Item = &DrawOp> {
        self.commands.iter().map(|c| &c.op)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn record(&mut self, op: DrawOp) {
        self.commands.push(DrawCommand {
            transform: self.current,
            op,
        });
    }
}

impl Surface for DrawList {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn save(&mut self) {
        self.stack.push(self.current);
    }

    fn restore(&mut self) {
        // Unbalanced restore is a no-op, as on a canvas.
        if let Some(t) = self.stack.pop() {
            self.current = t;
        }
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.current = self.current.then(&Transform::translation(x, y));
    }

    fn rotate(&mut self, radians: f64) {
        self.current = self.current.then(&Transform::rotation(radians));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.current = self.current.then(&Transform::scaling(sx, sy));
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.record(DrawOp::Clear(rect));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.record(DrawOp::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        self.record(DrawOp::StrokeRect(rect, color, line_width));
    }

    fn fill_path(&mut self, path: &Path, color: Color) {
        self.record(DrawOp::FillPath(path.clone(), color));
    }

    fn stroke_path(&mut self, path: &Path, color: Color, line_width: f64) {
        self.record(DrawOp::StrokePath(path.clone(), color, line_width));
    }

    fn draw_image(&mut self, asset: AssetId, rect: Rect) {
        self.record(DrawOp::Image(asset, rect));
    }

    fn fill_text(&mut self, text: &str, at: Point, style: TextStyle) {
        self.record(DrawOp::Text(text.to_owned(), at, style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_transform_at_call_time() {
        let mut list = DrawList::new(800.0, 600.0);
        list.save();
        list.translate(100.0, 40.0);
        list.fill_rect(Rect::centered(10.0, 10.0), Color::BLACK);
        list.restore();
        list.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE);

        let commands = list.commands();
        assert_eq!(commands[0].origin(), Point::new(100.0, 40.0));
        assert_eq!(commands[1].origin(), Point::new(0.0, 0.0));
    }

    #[test]
    fn extra_restore_keeps_transform() {
        let mut list = DrawList::new(10.0, 10.0);
        list.translate(5.0, 5.0);
        list.restore();
        list.clear_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(list.commands()[0].origin(), Point::new(5.0, 5.0));
    }
}
