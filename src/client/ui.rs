/// Screen layout: HUD bar, canvas, key hints and the game-over popup.
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::core::assets::Assets;
use crate::core::page::{GameOverPanel, LabelId, Page};
use crate::core::raster::Raster;
use crate::core::surface::{DrawList, Surface};
use crate::core::terminal::CanvasWidget;

const KEY_HINT: &str = "[Arrows] Drive  [Ctrl+R] New game  [Ctrl+C] Quit";
const POPUP_WIDTH: u16 = 34;
const POPUP_HEIGHT: u16 = 7;

pub fn draw(frame: &mut Frame, list: &DrawList, assets: &Assets, page: &Page) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    frame.render_widget(hud_line(page), chunks[0]);

    let canvas = fit_canvas(chunks[1], list.width(), list.height());
    let mut raster = Raster::new(usize::from(canvas.width), usize::from(canvas.height) * 2);
    raster.paint(list, assets);
    frame.render_widget(CanvasWidget::new(&raster), canvas);

    frame.render_widget(
        Paragraph::new(KEY_HINT)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray)),
        chunks[2],
    );

    if let Some(panel) = page.game_over().filter(|p| p.visible) {
        draw_game_over(frame, panel, chunks[1]);
    }
}

fn hud_line(page: &Page) -> Paragraph<'static> {
    let labelled = [
        ("Score", LabelId::Score),
        ("Time", LabelId::Time),
        ("Level", LabelId::Level),
    ];
    let mut spans: Vec<Span<'static>> = Vec::new();
    for (title, id) in labelled {
        let Some(value) = page.label(id) else {
            continue;
        };
        if !spans.is_empty() {
            spans.push(Span::raw("   "));
        }
        spans.push(Span::styled(format!("{title}: "), Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            value.to_owned(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    Paragraph::new(Line::from(spans)).alignment(Alignment::Center)
}

/// Largest area inside `area` with the canvas aspect ratio, counting two
/// pixels per cell row, centred.
pub fn fit_canvas(area: Rect, canvas_width: f64, canvas_height: f64) -> Rect {
    if area.width == 0 || area.height == 0 || canvas_width <= 0.0 || canvas_height <= 0.0 {
        return Rect::new(area.x, area.y, 0, 0);
    }
    let aspect = canvas_width / canvas_height;
    let (avail_w, avail_h) = (f64::from(area.width), f64::from(area.height) * 2.0);

    let (w, rows) = if avail_w / avail_h > aspect {
        let w = (avail_h * aspect).round().clamp(1.0, avail_w);
        (w as u16, area.height)
    } else {
        let rows = (avail_w / aspect / 2.0).round().clamp(1.0, f64::from(area.height));
        (area.width, rows as u16)
    };

    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - rows) / 2,
        w,
        rows,
    )
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let (w, h) = (width.min(area.width), height.min(area.height));
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}

fn draw_game_over(frame: &mut Frame, panel: &GameOverPanel, area: Rect) {
    let popup = centered(area, POPUP_WIDTH, POPUP_HEIGHT);
    let body = vec![
        Line::from(format!("Final score: {}", panel.final_score)),
        Line::from(format!("Level reached: {}", panel.final_level)),
        Line::default(),
        Line::from(Span::styled("Ctrl+R  new game", Style::default().fg(Color::Cyan))),
    ];

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" GAME OVER ")
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(Color::Red)),
        ),
        popup,
    );
}
