/// Terminal session lifecycle and the widget that shows a [`Raster`].
use std::io::stdout;

use anyhow::Result;
use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::execute;
use crossterm::terminal::supports_keyboard_enhancement;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier};
use ratatui::widgets::Widget;
use ratatui::DefaultTerminal;
use tracing::{info, warn};

use crate::core::raster::{Raster, Rgb};

const UPPER_HALF: &str = "▀";

/// Raw mode plus alternate screen for the lifetime of the value.
///
/// Release events are requested when the terminal supports the kitty
/// keyboard protocol; otherwise [`TerminalSession::reports_key_release`]
/// is false and callers emulate releases.
pub struct TerminalSession {
    terminal: DefaultTerminal,
    enhanced: bool,
}

impl TerminalSession {
    pub fn open() -> Result<Self> {
        let terminal = ratatui::init();
        let enhanced = match supports_keyboard_enhancement() {
            Ok(true) => {
                execute!(
                    stdout(),
                    PushKeyboardEnhancementFlags(
                        KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                            | KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    )
                )?;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "could not query keyboard enhancement support");
                false
            }
        };
        info!(key_release_events = enhanced, "terminal session opened");
        Ok(Self { terminal, enhanced })
    }

    pub fn reports_key_release(&self) -> bool {
        self.enhanced
    }

    pub fn terminal(&mut self) -> &mut DefaultTerminal {
        &mut self.terminal
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if self.enhanced {
            if let Err(e) = execute!(stdout(), PopKeyboardEnhancementFlags) {
                warn!(error = %e, "failed to pop keyboard enhancement flags");
            }
        }
        ratatui::restore();
    }
}

fn cell_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Shows a raster with two pixels per cell: upper half-block in the top
/// pixel's colour over the bottom pixel's colour. Glyphs are printed over
/// the cells they land in.
pub struct CanvasWidget<'a> {
    raster: &'a Raster,
}

impl<'a> CanvasWidget<'a> {
    pub fn new(raster: &'a Raster) -> Self {
        Self { raster }
    }
}

impl Widget for CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let raster = self.raster;
        for row in 0..area.height {
            for col in 0..area.width {
                let (x, y) = (usize::from(col), usize::from(row) * 2);
                let (Some(top), Some(bottom)) = (raster.pixel(x, y), raster.pixel(x, y + 1)) else {
                    continue;
                };
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(UPPER_HALF)
                        .set_fg(cell_color(top))
                        .set_bg(cell_color(bottom));
                }
            }
        }

        for glyph in raster.glyphs() {
            let row = glyph.y.div_euclid(2);
            if row < 0 || row >= i64::from(area.height) {
                continue;
            }
            for (i, ch) in glyph.text.chars().enumerate() {
                let col = glyph.x + i as i64;
                if col < 0 || col >= i64::from(area.width) {
                    continue;
                }
                // Text takes the colour under its upper half as background.
                let under = raster
                    .pixel(col as usize, row as usize * 2)
                    .unwrap_or(Rgb::WHITE);
                let pos = (area.x + col as u16, area.y + row as u16);
                if let Some(cell) = buf.cell_mut(pos) {
                    cell.set_char(ch)
                        .set_fg(cell_color(glyph.color))
                        .set_bg(cell_color(under));
                    if glyph.bold {
                        cell.modifier.insert(Modifier::BOLD);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::Assets;
    use crate::core::geometry::{Color as Rgba, Point, Rect as CanvasRect};
    use crate::core::surface::{DrawList, Surface, TextStyle};

    #[test]
    fn half_blocks_carry_two_pixels() {
        let mut list = DrawList::new(4.0, 4.0);
        list.fill_rect(CanvasRect::new(0.0, 0.0, 4.0, 1.0), Rgba::rgb(255, 0, 0));
        let mut raster = Raster::new(4, 4);
        raster.paint(&list, &Assets::new());

        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        CanvasWidget::new(&raster).render(area, &mut buf);

        let top = &buf[(0, 0)];
        assert_eq!(top.symbol(), UPPER_HALF);
        assert_eq!(top.fg, Color::Rgb(255, 0, 0));
        assert_eq!(top.bg, Color::Rgb(255, 255, 255));
        assert_eq!(buf[(0, 1)].fg, Color::Rgb(255, 255, 255));
    }

    #[test]
    fn glyphs_overwrite_cells() {
        let mut list = DrawList::new(10.0, 4.0);
        list.fill_text("$", Point::new(5.0, 2.0), TextStyle::new(Rgba::WHITE, 16.0).bold().centered());
        let mut raster = Raster::new(10, 4);
        raster.paint(&list, &Assets::new());

        let area = Rect::new(0, 0, 10, 2);
        let mut buf = Buffer::empty(area);
        CanvasWidget::new(&raster).render(area, &mut buf);

        let cell = &buf[(5, 1)];
        assert_eq!(cell.symbol(), "$");
        assert!(cell.modifier.contains(Modifier::BOLD));
    }
}
