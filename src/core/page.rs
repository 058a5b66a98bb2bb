/// Page elements the renderer writes into: HUD labels and the game-over panel.
///
/// Any element may be absent; writes to a missing element are skipped.
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelId {
    Score,
    Time,
    Level,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameOverPanel {
    pub visible: bool,
    pub final_score: String,
    pub final_level: String,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    labels: HashMap<LabelId, String>,
    game_over: Option<GameOverPanel>,
}

impl Page {
    /// A page with every label and the game-over panel.
    pub fn new() -> Self {
        Self::empty()
            .with_label(LabelId::Score)
            .with_label(LabelId::Time)
            .with_label(LabelId::Level)
            .with_game_over_panel()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, id: LabelId) -> Self {
        self.labels.entry(id).or_default();
        self
    }

    pub fn with_game_over_panel(mut self) -> Self {
        self.game_over.get_or_insert_with(GameOverPanel::default);
        self
    }

    pub fn set_label(&mut self, id: LabelId, text: impl Into<String>) {
        if let Some(label) = self.labels.get_mut(&id) {
            *label = text.into();
        }
    }

    pub fn label(&self, id: LabelId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn show_game_over(&mut self, score: impl Into<String>, level: impl Into<String>) {
        if let Some(panel) = self.game_over.as_mut() {
            panel.final_score = score.into();
            panel.final_level = level.into();
            panel.visible = true;
        }
    }

    pub fn hide_game_over(&mut self) {
        if let Some(panel) = self.game_over.as_mut() {
            panel.visible = false;
        }
    }

    pub fn game_over(&self) -> Option<&GameOverPanel> {
        self.game_over.as_ref()
    }

    pub fn game_over_visible(&self) -> bool {
        self.game_over.as_ref().is_some_and(|p| p.visible)
    }

    /// Blank state of a freshly loaded page; element presence is kept.
    pub fn reset(&mut self) {
        for text in self.labels.values_mut() {
            text.clear();
        }
        if let Some(panel) = self.game_over.as_mut() {
            *panel = GameOverPanel::default();
        }
    }
}
