/// Draws the held snapshot onto a [`Surface`] once per display frame.
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use tracing::debug;

use crate::core::assets::{AssetId, Assets};
use crate::core::geometry::{Color, Path, Point, Rect};
use crate::core::page::{LabelId, Page};
use crate::core::snapshot::{
    ActivePowerup, Collectible, CollectibleKind, Entity, EntityKind, Player, PowerupKind, Snapshot,
};
use crate::core::surface::{Surface, TextStyle};

pub const GRID_SPACING: f64 = 50.0;
pub const CONNECTING_TEXT: &str = "Connecting to game...";

const GRID_COLOR: Color = Color::rgb(0xe0, 0xe0, 0xe0);
const BORDER_COLOR: Color = Color::rgb(0xff, 0x00, 0x00);
const ROCK_COLOR: Color = Color::rgb(0x66, 0x66, 0x66);
const ROCK_HIGHLIGHT: Color = Color::rgb(0x55, 0x55, 0x55);
const TRUNK_COLOR: Color = Color::rgb(0x8b, 0x45, 0x13);
const LEAF_COLOR: Color = Color::rgb(0x2d, 0x5a, 0x27);
const WAVE_FILL: Color = Color::rgba(68, 68, 255, 0.5);
const COIN_OUTER: Color = Color::rgb(0xff, 0xd7, 0x00);
const COIN_INNER: Color = Color::rgb(0xff, 0xc6, 0x00);
const STAR_STROKE: Color = Color::rgba(255, 255, 255, 0.8);
const PLAYER_FALLBACK: Color = Color::rgb(0xff, 0x44, 0x44);
const PANEL_COLOR: Color = Color::rgba(0, 0, 0, 0.7);
const BAR_TRACK: Color = Color::rgba(255, 255, 255, 0.3);

const WAVE_IMAGE_SCALE: f64 = 1.6;
const STAR_RADIUS: f64 = 15.0;
const BAR_WIDTH: f64 = 50.0;
const MAX_WAVE_STEPS: usize = 2048;

/// Coin pulse factor; always within `[0.9, 1.1]`.
pub fn coin_scale(now_secs: f64) -> f64 {
    1.0 + (now_secs * 1000.0 / 200.0).sin() * 0.1
}

/// Powerup star fill alpha; always within `[0.2, 0.8]`.
pub fn powerup_alpha(now_secs: f64) -> f64 {
    0.5 + (now_secs * 4.0).sin() * 0.3
}

pub fn powerup_color(kind: &PowerupKind) -> Color {
    match kind {
        PowerupKind::Speed => Color::rgb(0xff, 0x44, 0x44),
        PowerupKind::Shield => Color::rgb(0x44, 0xff, 0x44),
        PowerupKind::Magnet => Color::rgb(0x44, 0x44, 0xff),
        PowerupKind::Time => Color::rgb(0xff, 0xff, 0x44),
        PowerupKind::Other(_) => Color::rgb(0xff, 0x44, 0xff),
    }
}

/// Seconds left rounded up and padded to two digits.
pub fn format_time_left(time_left: f64) -> String {
    format!("{:02}", time_left.ceil() as i64)
}

fn level_text(level: u32) -> String {
    // A zero level reads as the first one.
    level.max(1).to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RenderState {
    #[default]
    Connecting,
    Active(Box<Snapshot>),
}

#[derive(Debug, Default)]
pub struct Renderer {
    state: RenderState,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match &self.state {
            RenderState::Active(snapshot) => Some(snapshot),
            RenderState::Connecting => None,
        }
    }

    /// Replaces the held snapshot and raises the game-over panel if needed.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, page: &mut Page) {
        debug!(
            entities = snapshot.entities.len(),
            collectibles = snapshot.collectibles.len(),
            "snapshot received"
        );
        if snapshot.game_over {
            page.show_game_over(snapshot.score.to_string(), level_text(snapshot.level));
        }
        self.state = RenderState::Active(Box::new(snapshot));
    }

    /// Back to the pre-connection state.
    pub fn reset(&mut self) {
        self.state = RenderState::Connecting;
    }

    pub fn render<S: Surface>(&self, surface: &mut S, assets: &Assets, page: &mut Page, now_secs: f64) {
        let canvas = Rect::new(0.0, 0.0, surface.width(), surface.height());
        surface.clear_rect(canvas);

        let Some(snapshot) = self.snapshot() else {
            surface.fill_text(
                CONNECTING_TEXT,
                Point::new(canvas.width / 2.0, canvas.height / 2.0),
                TextStyle::new(Color::BLACK, 24.0).centered(),
            );
            return;
        };

        if assets.is_ready(AssetId::Background) {
            surface.draw_image(AssetId::Background, canvas);
        }
        draw_grid(surface);

        for entity in &snapshot.entities {
            draw_entity(surface, assets, entity, now_secs);
        }
        for collectible in snapshot.collectibles.iter().filter(|c| !c.collected) {
            draw_collectible(surface, collectible, now_secs);
        }
        if let Some(player) = &snapshot.player {
            draw_player(surface, assets, player);
        }

        update_hud(page, snapshot);

        if let Some(powerup) = &snapshot.active_powerup {
            draw_powerup_indicator(surface, powerup);
        }

        surface.stroke_rect(canvas, BORDER_COLOR, 2.0);
    }
}

fn draw_grid<S: Surface>(surface: &mut S) {
    let (width, height) = (surface.width(), surface.height());
    let mut x = 0.0;
    while x < width {
        let mut line = Path::new();
        line.move_to(x, 0.0).line_to(x, height);
        surface.stroke_path(&line, GRID_COLOR, 1.0);
        x += GRID_SPACING;
    }
    let mut y = 0.0;
    while y < height {
        let mut line = Path::new();
        line.move_to(0.0, y).line_to(width, y);
        surface.stroke_path(&line, GRID_COLOR, 1.0);
        y += GRID_SPACING;
    }
}

fn draw_entity<S: Surface>(surface: &mut S, assets: &Assets, entity: &Entity, now_secs: f64) {
    let at = entity.position.resolve();
    surface.save();
    surface.translate(at.x, at.y);

    match entity.kind {
        EntityKind::Rock => {
            surface.fill_path(&Path::circle(0.0, 0.0, entity.width / 2.0), ROCK_COLOR);
            surface.stroke_path(&Path::circle(-5.0, -5.0, 5.0), ROCK_HIGHLIGHT, 2.0);
        }
        EntityKind::Palmtree if assets.is_ready(AssetId::Palm) => {
            let (w, h) = (entity.width.max(1.0), entity.height.max(1.0));
            surface.draw_image(AssetId::Palm, Rect::centered(w, h));
        }
        EntityKind::Palmtree => {
            let h = entity.height;
            surface.fill_rect(Rect::new(-5.0, -h / 2.0, 10.0, h), TRUNK_COLOR);
            for quarter in 0..4 {
                surface.save();
                surface.rotate(f64::from(quarter) * FRAC_PI_2);
                let mut leaf = Path::new();
                leaf.ellipse(0.0, -h / 2.0, 20.0, 8.0, 0.0, 0.0, TAU).close();
                surface.fill_path(&leaf, LEAF_COLOR);
                surface.restore();
            }
        }
        EntityKind::Wave if assets.is_ready(AssetId::Wave) => {
            let w = (entity.width * WAVE_IMAGE_SCALE).max(1.0);
            let h = (entity.height * WAVE_IMAGE_SCALE).max(1.0);
            surface.draw_image(AssetId::Wave, Rect::centered(w, h));
        }
        EntityKind::Wave => {
            surface.fill_path(&wave_silhouette(entity.width, entity.height, now_secs), WAVE_FILL);
        }
        EntityKind::Unknown => {}
    }

    surface.restore();
}

fn wave_silhouette(width: f64, height: f64, now_secs: f64) -> Path {
    let half = width / 2.0;
    let crest = |x: f64| (x / 10.0 + now_secs).sin() * 5.0;
    // One vertex per pixel, thinned out for absurdly wide waves.
    let steps = if width.is_finite() && width > 1.0 {
        (width.ceil() as usize).min(MAX_WAVE_STEPS)
    } else {
        1
    };
    let stride = if width.is_finite() { width.max(0.0) / steps as f64 } else { 0.0 };

    let mut path = Path::new();
    path.move_to(-half, crest(-half));
    for i in 1..steps {
        let x = -half + i as f64 * stride;
        path.line_to(x, crest(x));
    }
    path.line_to(half, height).line_to(-half, height).close();
    path
}

fn draw_collectible<S: Surface>(surface: &mut S, collectible: &Collectible, now_secs: f64) {
    let at = collectible.position.resolve();
    surface.save();
    surface.translate(at.x, at.y);

    match collectible.kind {
        CollectibleKind::Coin => {
            let scale = coin_scale(now_secs);
            surface.scale(scale, scale);
            surface.fill_path(&Path::circle(0.0, 0.0, 15.0), COIN_OUTER);
            surface.fill_path(&Path::circle(0.0, 0.0, 12.0), COIN_INNER);
            surface.fill_text(
                "$",
                Point::default(),
                TextStyle::new(Color::WHITE, 16.0).bold().centered(),
            );
        }
        CollectibleKind::Powerup => {
            let star = star_path();
            surface.fill_path(&star, Color::rgba(255, 0, 255, powerup_alpha(now_secs)));
            surface.stroke_path(&star, STAR_STROKE, 2.0);
        }
        CollectibleKind::Unknown => {}
    }

    surface.restore();
}

fn star_path() -> Path {
    let mut star = Path::new();
    star.move_to(0.0, -STAR_RADIUS);
    for i in 0..5 {
        let angle = f64::from(i) * 4.0 * PI / 5.0;
        star.line_to(angle.cos() * STAR_RADIUS, angle.sin() * STAR_RADIUS);
    }
    star.close();
    star
}

fn draw_player<S: Surface>(surface: &mut S, assets: &Assets, player: &Player) {
    let at = player.position.resolve();
    surface.save();
    surface.translate(at.x, at.y);
    surface.rotate(player.rotation.to_radians());

    if assets.is_ready(AssetId::Car) {
        let (w, h) = (player.width.max(1.0), player.height.max(1.0));
        surface.draw_image(AssetId::Car, Rect::centered(w, h));
    } else {
        surface.fill_rect(Rect::centered(player.width, player.height), PLAYER_FALLBACK);
    }

    surface.restore();
}

fn update_hud(page: &mut Page, snapshot: &Snapshot) {
    page.set_label(LabelId::Score, snapshot.score.to_string());
    page.set_label(LabelId::Time, format_time_left(snapshot.time_left));
    page.set_label(LabelId::Level, level_text(snapshot.level));
}

fn draw_powerup_indicator<S: Surface>(surface: &mut S, powerup: &ActivePowerup) {
    let x = surface.width() - 120.0;
    let y = 30.0;
    let color = powerup_color(&powerup.kind);

    surface.fill_rect(Rect::new(x - 10.0, y - 20.0, 100.0, 40.0), PANEL_COLOR);
    surface.fill_rect(Rect::new(x, y - 15.0, 20.0, 20.0), color);
    surface.fill_rect(Rect::new(x + 25.0, y - 5.0, BAR_WIDTH, 10.0), BAR_TRACK);
    surface.fill_rect(
        Rect::new(x + 25.0, y - 5.0, BAR_WIDTH * powerup.remaining_fraction(), 10.0),
        color,
    );
    surface.fill_text(
        &powerup.kind.name().to_uppercase(),
        Point::new(x + 25.0, y + 15.0),
        TextStyle::new(Color::WHITE, 12.0),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::AssetLoaded;
    use crate::core::snapshot::Position;
    use crate::core::sprite::Sprite;
    use crate::core::surface::{DrawList, DrawOp};

    const NOW: f64 = 1_700_000_000.25;

    fn canvas() -> DrawList {
        DrawList::new(800.0, 600.0)
    }

    fn player_at(x: f64, y: f64) -> Player {
        Player {
            position: Position::world(x, y),
            rotation: 0.0,
            width: 30.0,
            height: 20.0,
        }
    }

    fn entity(kind: EntityKind, position: Position) -> Entity {
        Entity {
            kind,
            position,
            width: 40.0,
            height: 40.0,
        }
    }

    fn all_ready() -> Assets {
        let mut assets = Assets::new();
        for id in AssetId::ALL {
            let sprite = Sprite::parse("size 1 1\ncolor r #ff0000\npixels\nr\n").unwrap();
            assets.complete(AssetLoaded { id, result: Ok(sprite) });
        }
        assets
    }

    fn render(snapshot: Snapshot, assets: &Assets, page: &mut Page) -> DrawList {
        let mut renderer = Renderer::new();
        renderer.apply_snapshot(snapshot, page);
        let mut list = canvas();
        renderer.render(&mut list, assets, page, NOW);
        list
    }

    #[test]
    fn connecting_state_draws_placeholder_only() {
        let renderer = Renderer::new();
        let mut page = Page::new();
        let mut list = canvas();
        renderer.render(&mut list, &Assets::new(), &mut page, NOW);

        let ops: Vec<_> = list.ops().collect();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], DrawOp::Clear(_)));
        match ops[1] {
            DrawOp::Text(text, at, style) => {
                assert_eq!(text, CONNECTING_TEXT);
                assert_eq!(*at, Point::new(400.0, 300.0));
                assert_eq!(style.size, 24.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(page.label(LabelId::Score), Some(""));
    }

    #[test]
    fn hud_and_player_scenario() {
        let snapshot = Snapshot {
            player: Some(player_at(100.0, 100.0)),
            score: 50,
            time_left: 12.4,
            level: 2,
            ..Snapshot::default()
        };
        let mut page = Page::new();
        let list = render(snapshot, &Assets::new(), &mut page);

        assert_eq!(page.label(LabelId::Score), Some("50"));
        assert_eq!(page.label(LabelId::Time), Some("13"));
        assert_eq!(page.label(LabelId::Level), Some("2"));

        let body = list
            .commands()
            .iter()
            .find(|c| matches!(c.op, DrawOp::FillRect(_, color) if color == PLAYER_FALLBACK))
            .expect("player rectangle");
        assert_eq!(body.origin(), Point::new(100.0, 100.0));
        assert_eq!(body.transform.b, 0.0);
        assert_eq!(body.op, DrawOp::FillRect(Rect::new(-15.0, -10.0, 30.0, 20.0), PLAYER_FALLBACK));
    }

    #[test]
    fn screen_coordinates_win_for_rocks() {
        let snapshot = Snapshot {
            entities: vec![entity(
                EntityKind::Rock,
                Position::world(999.0, 999.0).with_screen(200.0, 50.0),
            )],
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let rock = list
            .commands()
            .iter()
            .find(|c| matches!(c.op, DrawOp::FillPath(_, color) if color == ROCK_COLOR))
            .expect("rock body");
        assert_eq!(rock.origin(), Point::new(200.0, 50.0));
    }

    #[test]
    fn player_uses_screen_coordinates() {
        let snapshot = Snapshot {
            player: Some(Player {
                position: Position::world(999.0, 999.0).with_screen(320.0, 240.0),
                ..player_at(0.0, 0.0)
            }),
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let body = list
            .commands()
            .iter()
            .find(|c| matches!(c.op, DrawOp::FillRect(_, color) if color == PLAYER_FALLBACK))
            .expect("player rectangle");
        assert_eq!(body.origin(), Point::new(320.0, 240.0));
    }

    #[test]
    fn coin_uses_screen_coordinates() {
        let snapshot = Snapshot {
            collectibles: vec![Collectible {
                kind: CollectibleKind::Coin,
                position: Position::world(999.0, 999.0).with_screen(150.0, 75.0),
                collected: false,
            }],
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let coin = list
            .commands()
            .iter()
            .find(|c| matches!(c.op, DrawOp::FillPath(_, color) if color == COIN_OUTER))
            .expect("coin body");
        assert_eq!(coin.origin(), Point::new(150.0, 75.0));
    }

    #[test]
    fn player_rotation_is_in_degrees() {
        let snapshot = Snapshot {
            player: Some(Player {
                rotation: 90.0,
                ..player_at(100.0, 100.0)
            }),
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let body = list
            .commands()
            .iter()
            .find(|c| matches!(c.op, DrawOp::FillRect(_, color) if color == PLAYER_FALLBACK))
            .expect("player rectangle");
        assert!((body.transform.b - 1.0).abs() < 1e-12, "{:?}", body.transform);
        assert!(body.transform.a.abs() < 1e-12);
        assert_eq!(body.origin(), Point::new(100.0, 100.0));
    }

    #[test]
    fn draw_order_is_back_to_front() {
        let snapshot = Snapshot {
            player: Some(player_at(10.0, 10.0)),
            entities: vec![entity(EntityKind::Rock, Position::world(1.0, 1.0))],
            collectibles: vec![Collectible {
                kind: CollectibleKind::Coin,
                position: Position::world(2.0, 2.0),
                collected: false,
            }],
            active_powerup: Some(ActivePowerup {
                kind: PowerupKind::Speed,
                duration: 5.0,
                original_duration: Some(5.0),
            }),
            ..Snapshot::default()
        };
        let list = render(snapshot, &all_ready(), &mut Page::new());
        let ops: Vec<_> = list.ops().collect();

        let position = |pred: &dyn Fn(&DrawOp) -> bool| ops.iter().position(|op| pred(*op)).unwrap();
        let clear = position(&|op| matches!(op, DrawOp::Clear(_)));
        let background = position(&|op| matches!(op, DrawOp::Image(AssetId::Background, _)));
        let grid = position(&|op| matches!(op, DrawOp::StrokePath(_, c, _) if *c == GRID_COLOR));
        let rock = position(&|op| matches!(op, DrawOp::FillPath(_, c) if *c == ROCK_COLOR));
        let coin = position(&|op| matches!(op, DrawOp::FillPath(_, c) if *c == COIN_OUTER));
        let car = position(&|op| matches!(op, DrawOp::Image(AssetId::Car, _)));
        let panel = position(&|op| matches!(op, DrawOp::FillRect(_, c) if *c == PANEL_COLOR));

        assert!(clear < background && background < grid && grid < rock);
        assert!(rock < coin && coin < car && car < panel);
        assert!(matches!(ops.last(), Some(DrawOp::StrokeRect(_, c, w)) if *c == BORDER_COLOR && *w == 2.0));
    }

    #[test]
    fn grid_has_a_line_every_fifty_pixels() {
        let list = render(Snapshot::default(), &Assets::new(), &mut Page::new());
        let lines = list
            .ops()
            .filter(|op| matches!(op, DrawOp::StrokePath(_, c, w) if *c == GRID_COLOR && *w == 1.0))
            .count();
        assert_eq!(lines, 16 + 12);
    }

    #[test]
    fn collected_and_unknown_items_are_skipped() {
        let snapshot = Snapshot {
            entities: vec![entity(EntityKind::Unknown, Position::world(5.0, 5.0))],
            collectibles: vec![
                Collectible {
                    kind: CollectibleKind::Coin,
                    position: Position::world(5.0, 5.0),
                    collected: true,
                },
                Collectible {
                    kind: CollectibleKind::Unknown,
                    position: Position::world(5.0, 5.0),
                    collected: false,
                },
            ],
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        assert!(!list.ops().any(|op| matches!(op, DrawOp::FillPath(..) | DrawOp::Text(..))));
    }

    #[test]
    fn palm_fallback_has_trunk_and_four_leaves() {
        let snapshot = Snapshot {
            entities: vec![entity(EntityKind::Palmtree, Position::world(300.0, 300.0))],
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let trunk = list
            .ops()
            .filter(|op| matches!(op, DrawOp::FillRect(r, c) if *c == TRUNK_COLOR && *r == Rect::new(-5.0, -20.0, 10.0, 40.0)))
            .count();
        let leaves = list
            .ops()
            .filter(|op| matches!(op, DrawOp::FillPath(_, c) if *c == LEAF_COLOR))
            .count();
        assert_eq!((trunk, leaves), (1, 4));
    }

    #[test]
    fn ready_images_replace_fallback_shapes() {
        let snapshot = Snapshot {
            entities: vec![
                entity(EntityKind::Palmtree, Position::world(0.0, 0.0)),
                entity(EntityKind::Wave, Position::world(0.0, 0.0)),
            ],
            ..Snapshot::default()
        };
        let list = render(snapshot, &all_ready(), &mut Page::new());
        assert!(list.ops().any(|op| *op == DrawOp::Image(AssetId::Palm, Rect::centered(40.0, 40.0))));
        assert!(list.ops().any(|op| *op == DrawOp::Image(AssetId::Wave, Rect::centered(64.0, 64.0))));
        assert!(!list.ops().any(|op| matches!(op, DrawOp::FillPath(_, c) if *c == WAVE_FILL)));
    }

    #[test]
    fn wave_fallback_closes_below_the_crest() {
        let path = wave_silhouette(40.0, 40.0, 0.0);
        let ring = &path.subpaths()[0];
        assert!(ring.closed);
        assert_eq!(ring.points.first().map(|p| p.x), Some(-20.0));
        let tail = &ring.points[ring.points.len() - 2..];
        assert_eq!(tail, &[Point::new(20.0, 40.0), Point::new(-20.0, 40.0)]);
    }

    #[test]
    fn wide_waves_keep_a_bounded_outline() {
        let path = wave_silhouette(1e9, 40.0, NOW);
        let ring = &path.subpaths()[0];
        assert!(ring.points.len() <= MAX_WAVE_STEPS + 2);
        assert_eq!(ring.points.first().map(|p| p.x), Some(-5e8));
        assert!(ring.points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));

        let degenerate = wave_silhouette(0.0, 10.0, NOW);
        assert_eq!(degenerate.subpaths()[0].points.len(), 3);
    }

    #[test]
    fn powerup_indicator_layout() {
        let snapshot = Snapshot {
            active_powerup: Some(ActivePowerup {
                kind: PowerupKind::Magnet,
                duration: 2.5,
                original_duration: None,
            }),
            ..Snapshot::default()
        };
        let list = render(snapshot, &Assets::new(), &mut Page::new());
        let magnet = powerup_color(&PowerupKind::Magnet);
        assert!(list.ops().any(|op| *op == DrawOp::FillRect(Rect::new(670.0, 10.0, 100.0, 40.0), PANEL_COLOR)));
        assert!(list.ops().any(|op| *op == DrawOp::FillRect(Rect::new(680.0, 15.0, 20.0, 20.0), magnet)));
        assert!(list.ops().any(|op| *op == DrawOp::FillRect(Rect::new(705.0, 25.0, 25.0, 10.0), magnet)));
        assert!(list.ops().any(|op| matches!(op, DrawOp::Text(t, at, _) if t == "MAGNET" && *at == Point::new(705.0, 45.0))));
    }

    #[test]
    fn powerup_colours_are_canonical() {
        assert_eq!(powerup_color(&PowerupKind::Shield), Color::rgb(0x44, 0xff, 0x44));
        assert_eq!(powerup_color(&PowerupKind::Time), Color::rgb(0xff, 0xff, 0x44));
        assert_eq!(powerup_color(&PowerupKind::Other("x".into())), Color::rgb(0xff, 0x44, 0xff));
    }

    #[test]
    fn animation_ranges_hold() {
        for i in 0..2000 {
            let t = i as f64 * 0.0137 - 5.0;
            let s = coin_scale(t);
            let a = powerup_alpha(t);
            assert!((0.9 - 1e-12..=1.1 + 1e-12).contains(&s), "scale {s} at {t}");
            assert!((0.2 - 1e-12..=0.8 + 1e-12).contains(&a), "alpha {a} at {t}");
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let snapshot = Snapshot {
            player: Some(player_at(40.0, 60.0)),
            entities: vec![entity(EntityKind::Wave, Position::world(100.0, 100.0))],
            collectibles: vec![Collectible {
                kind: CollectibleKind::Powerup,
                position: Position::world(5.0, 5.0),
                collected: false,
            }],
            ..Snapshot::default()
        };
        let mut page = Page::new();
        let mut renderer = Renderer::new();
        renderer.apply_snapshot(snapshot.clone(), &mut page);

        let mut first = canvas();
        let mut second = canvas();
        renderer.render(&mut first, &Assets::new(), &mut page, NOW);
        renderer.render(&mut second, &Assets::new(), &mut page, NOW);
        assert_eq!(first, second);
        assert_eq!(renderer.snapshot(), Some(&snapshot));
    }

    #[test]
    fn latest_snapshot_replaces_everything() {
        let mut page = Page::new();
        let mut renderer = Renderer::new();
        renderer.apply_snapshot(
            Snapshot {
                entities: vec![entity(EntityKind::Rock, Position::world(1.0, 1.0))],
                score: 9,
                ..Snapshot::default()
            },
            &mut page,
        );
        let latest = Snapshot {
            score: 10,
            ..Snapshot::default()
        };
        renderer.apply_snapshot(latest.clone(), &mut page);
        assert_eq!(renderer.state(), &RenderState::Active(Box::new(latest)));
    }

    #[test]
    fn game_over_stays_visible_across_snapshots() {
        let over = Snapshot {
            score: 75,
            level: 3,
            game_over: true,
            ..Snapshot::default()
        };
        let mut page = Page::new();
        let mut renderer = Renderer::new();
        renderer.apply_snapshot(over.clone(), &mut page);
        assert!(page.game_over_visible());
        renderer.apply_snapshot(over, &mut page);
        let panel = page.game_over().unwrap();
        assert!(panel.visible);
        assert_eq!((panel.final_score.as_str(), panel.final_level.as_str()), ("75", "3"));

        // Rendering frames never hides it either.
        renderer.apply_snapshot(Snapshot::default(), &mut page);
        renderer.render(&mut canvas(), &Assets::new(), &mut page, NOW);
        assert!(page.game_over_visible());
    }

    #[test]
    fn time_label_formatting() {
        assert_eq!(format_time_left(12.4), "13");
        assert_eq!(format_time_left(3.0), "03");
        assert_eq!(format_time_left(0.0), "00");
        assert_eq!(format_time_left(120.2), "121");
    }
}
