/// The client event loop: frames, transport, assets and keyboard on one task.
use std::ops::ControlFlow;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyEvent};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::client::ui;
use crate::client::websocket_client::{TransportAdapter, TransportEvent, TransportHandle};
use crate::config::ClientConfig;
use crate::core::assets::{spawn_loaders, AssetLoaded, Assets};
use crate::core::input::{map_key, InputAction, KeyReleaseEmulator};
use crate::core::page::Page;
use crate::core::protocol::InputEvent;
use crate::core::renderer::Renderer;
use crate::core::surface::DrawList;
use crate::core::terminal::TerminalSession;

/// Ends [`ClientEngine::run`] from outside the loop.
#[derive(Debug, Clone)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewGameOutcome {
    /// `new_game` was queued on the live transport.
    Requested,
    /// No transport: the client was reset and reconnected.
    Reloaded,
}

/// Hides the game-over panel, then asks the server for a new game through
/// `transport` when it is still available.
pub fn start_new_game(page: &mut Page, transport: Option<&TransportHandle>) -> NewGameOutcome {
    page.hide_game_over();
    match transport {
        Some(handle) if handle.is_available() && handle.request_new_game() => NewGameOutcome::Requested,
        _ => NewGameOutcome::Reloaded,
    }
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

pub struct ClientEngine {
    config: ClientConfig,
    renderer: Renderer,
    page: Page,
    assets: Assets,
    transport: Option<TransportHandle>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    asset_tx: mpsc::UnboundedSender<AssetLoaded>,
    asset_rx: mpsc::UnboundedReceiver<AssetLoaded>,
    releases: Option<KeyReleaseEmulator>,
    stop_tx: watch::Sender<bool>,
}

impl ClientEngine {
    pub fn new(config: ClientConfig) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (asset_tx, asset_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            renderer: Renderer::new(),
            page: Page::new(),
            assets: Assets::new(),
            transport: None,
            transport_tx,
            transport_rx,
            asset_tx,
            asset_rx,
            releases: None,
            stop_tx,
        }
    }

    /// Starts asset loading and the connection. Needs a tokio runtime.
    pub fn start(&mut self) {
        spawn_loaders(self.config.asset_dir.clone(), self.asset_tx.clone());
        self.connect();
    }

    fn connect(&mut self) {
        match TransportAdapter::spawn(&self.config.server_url, self.config.reconnect, self.transport_tx.clone()) {
            Ok((handle, _task)) => self.transport = Some(handle),
            Err(e) => {
                error!(error = %e, "transport not started");
                self.transport = None;
            }
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_tx.clone())
    }

    /// Emulate key releases; for terminals that never report them.
    pub fn emulate_key_release(&mut self) {
        self.releases = Some(KeyReleaseEmulator::new(self.config.key_release_timeout));
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn transport(&self) -> Option<&TransportHandle> {
        self.transport.as_ref()
    }

    pub fn set_transport(&mut self, transport: Option<TransportHandle>) {
        self.transport = transport;
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Snapshot(snapshot) => self.renderer.apply_snapshot(*snapshot, &mut self.page),
            TransportEvent::Connected => debug!("transport connected"),
            TransportEvent::Disconnected => debug!("transport disconnected"),
            TransportEvent::Error(e) => debug!(error = %e, "transport error"),
        }
    }

    pub fn handle_asset(&mut self, loaded: AssetLoaded) {
        self.assets.complete(loaded);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ControlFlow<()> {
        match map_key(&key) {
            InputAction::Forward(event) => {
                if let Some(releases) = self.releases.as_mut() {
                    releases.observe(&event, Instant::now());
                }
                self.forward(event);
            }
            InputAction::NewGame => {
                self.new_game();
            }
            InputAction::Quit => return ControlFlow::Break(()),
            InputAction::Ignore => {}
        }
        ControlFlow::Continue(())
    }

    fn forward(&self, event: InputEvent) {
        let Some(transport) = &self.transport else {
            return;
        };
        if !transport.send_input(event) {
            debug!("input dropped, transport closed");
        }
    }

    pub fn new_game(&mut self) -> NewGameOutcome {
        let outcome = start_new_game(&mut self.page, self.transport.as_ref());
        match outcome {
            NewGameOutcome::Requested => info!("new game requested"),
            NewGameOutcome::Reloaded => {
                warn!("transport unavailable, reloading client");
                self.reload();
            }
        }
        outcome
    }

    /// Fresh client state: no snapshot, blank page, new connection.
    ///
    /// Held keys are forgotten: the old transport is gone and the new
    /// server session starts with nothing pressed.
    fn reload(&mut self) {
        self.renderer.reset();
        self.page.reset();
        if let Some(releases) = self.releases.as_mut() {
            releases.clear();
        }
        self.connect();
    }

    fn release_stale_keys(&mut self) {
        let Some(releases) = self.releases.as_mut() else {
            return;
        };
        for event in releases.expire(Instant::now()) {
            self.forward(event);
        }
    }

    /// Sends a keyup for every key still held, so the car stops on exit.
    fn release_held_keys(&mut self) {
        let Some(releases) = self.releases.as_mut() else {
            return;
        };
        for event in releases.release_all() {
            self.forward(event);
        }
    }

    /// Renders the held snapshot into a fresh draw list.
    pub fn compose_frame(&mut self, now_secs: f64) -> DrawList {
        let mut list = DrawList::new(self.config.canvas_width, self.config.canvas_height);
        self.renderer.render(&mut list, &self.assets, &mut self.page, now_secs);
        list
    }

    pub async fn run(&mut self, session: &mut TerminalSession) -> Result<()> {
        let mut frames = tokio::time::interval(self.config.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keys = EventStream::new();
        let mut stop = self.stop_tx.subscribe();

        info!(url = %self.config.server_url, fps = self.config.fps, "client loop started");
        loop {
            tokio::select! {
                _ = frames.tick() => {
                    self.release_stale_keys();
                    let list = self.compose_frame(wall_clock_secs());
                    session
                        .terminal()
                        .draw(|f| ui::draw(f, &list, &self.assets, &self.page))?;
                }

                Some(event) = self.transport_rx.recv() => self.handle_transport_event(event),

                Some(loaded) = self.asset_rx.recv() => self.handle_asset(loaded),

                key = keys.next() => match key {
                    Some(Ok(Event::Key(key))) => {
                        if self.handle_key(key).is_break() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },

                _ = stop.changed() => break,
            }
        }
        self.release_held_keys();
        info!("client loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::{AssetId, AssetError, AssetState};
    use crate::core::protocol::ClientMessage;
    use crate::core::renderer::RenderState;
    use crate::core::snapshot::Snapshot;
    use crossterm::event::{KeyCode, KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn offline_config() -> ClientConfig {
        ClientConfig {
            server_url: "http://127.0.0.1:9".into(),
            reconnect: crate::client::websocket_client::ReconnectPolicy {
                enabled: false,
                delay: std::time::Duration::from_millis(10),
            },
            ..ClientConfig::default()
        }
    }

    /// Engine wired to a handle whose receiving end the test holds.
    fn engine_with_outbox() -> (ClientEngine, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = ClientEngine::new(offline_config());
        engine.set_transport(Some(TransportHandle::from_sender(tx)));
        (engine, rx)
    }

    #[test]
    fn snapshots_replace_renderer_state() {
        let mut engine = ClientEngine::new(offline_config());
        let snapshot = Snapshot {
            score: 3,
            ..Snapshot::default()
        };
        engine.handle_transport_event(TransportEvent::Snapshot(Box::new(snapshot.clone())));
        engine.handle_transport_event(TransportEvent::Disconnected);
        assert_eq!(engine.renderer().snapshot(), Some(&snapshot));
    }

    #[test]
    fn ctrl_r_requests_new_game_without_forwarding_r() {
        let (mut engine, mut outbox) = engine_with_outbox();
        engine.handle_transport_event(TransportEvent::Snapshot(Box::new(Snapshot {
            game_over: true,
            ..Snapshot::default()
        })));
        assert!(engine.page().game_over_visible());

        let flow = engine.handle_key(key(KeyCode::Char('r'), KeyModifiers::CONTROL));
        assert!(flow.is_continue());
        assert!(!engine.page().game_over_visible());
        assert_eq!(outbox.try_recv().ok(), Some(ClientMessage::NewGame));
        assert!(outbox.try_recv().is_err());
    }

    #[test]
    fn plain_keys_are_forwarded() {
        let (mut engine, mut outbox) = engine_with_outbox();
        assert!(engine.handle_key(key(KeyCode::Left, KeyModifiers::NONE)).is_continue());
        assert_eq!(
            outbox.try_recv().ok(),
            Some(ClientMessage::Input(InputEvent::keydown("ArrowLeft")))
        );
    }

    #[test]
    fn ctrl_c_breaks_the_loop() {
        let (mut engine, _outbox) = engine_with_outbox();
        assert!(engine
            .handle_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .is_break());
    }

    #[tokio::test]
    async fn new_game_without_transport_reloads() {
        let mut engine = ClientEngine::new(offline_config());
        engine.handle_transport_event(TransportEvent::Snapshot(Box::new(Snapshot {
            game_over: true,
            ..Snapshot::default()
        })));
        assert_eq!(engine.new_game(), NewGameOutcome::Reloaded);
        assert_eq!(engine.renderer().state(), &RenderState::Connecting);
        assert!(!engine.page().game_over_visible());
        // Reload starts a fresh connection task.
        assert!(engine.transport().is_some());
    }

    #[tokio::test]
    async fn closed_transport_also_reloads() {
        let (mut engine, outbox) = engine_with_outbox();
        drop(outbox);
        assert_eq!(engine.new_game(), NewGameOutcome::Reloaded);
    }

    #[tokio::test]
    async fn reload_forgets_held_keys() {
        let (mut engine, outbox) = engine_with_outbox();
        engine.emulate_key_release();
        assert!(engine.handle_key(key(KeyCode::Up, KeyModifiers::NONE)).is_continue());
        assert_eq!(engine.releases.as_ref().map(KeyReleaseEmulator::held_count), Some(1));

        drop(outbox);
        assert_eq!(engine.new_game(), NewGameOutcome::Reloaded);
        assert_eq!(engine.releases.as_ref().map(KeyReleaseEmulator::held_count), Some(0));
    }

    #[test]
    fn held_keys_are_released_on_exit() {
        let (mut engine, mut outbox) = engine_with_outbox();
        engine.emulate_key_release();
        assert!(engine.handle_key(key(KeyCode::Left, KeyModifiers::NONE)).is_continue());
        engine.release_held_keys();

        assert_eq!(
            outbox.try_recv().ok(),
            Some(ClientMessage::Input(InputEvent::keydown("ArrowLeft")))
        );
        assert_eq!(
            outbox.try_recv().ok(),
            Some(ClientMessage::Input(InputEvent::keyup("ArrowLeft")))
        );
        assert!(outbox.try_recv().is_err());
    }

    #[test]
    fn start_new_game_uses_the_given_handle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = TransportHandle::from_sender(tx);
        let mut page = Page::new();
        page.show_game_over("1", "1");
        assert_eq!(start_new_game(&mut page, Some(&handle)), NewGameOutcome::Requested);
        assert!(!page.game_over_visible());
        assert_eq!(rx.try_recv().ok(), Some(ClientMessage::NewGame));
        assert_eq!(start_new_game(&mut page, None), NewGameOutcome::Reloaded);
    }

    #[test]
    fn emulated_releases_follow_presses() {
        let (mut engine, mut outbox) = engine_with_outbox();
        engine.config.key_release_timeout = std::time::Duration::ZERO;
        engine.emulate_key_release();
        assert!(engine.handle_key(key(KeyCode::Up, KeyModifiers::NONE)).is_continue());
        engine.release_stale_keys();

        assert_eq!(
            outbox.try_recv().ok(),
            Some(ClientMessage::Input(InputEvent::keydown("ArrowUp")))
        );
        assert_eq!(
            outbox.try_recv().ok(),
            Some(ClientMessage::Input(InputEvent::keyup("ArrowUp")))
        );
    }

    #[test]
    fn asset_completion_updates_state_once() {
        let mut engine = ClientEngine::new(offline_config());
        engine.handle_asset(AssetLoaded {
            id: AssetId::Wave,
            result: Err(AssetError::Join("cancelled".into())),
        });
        assert!(matches!(engine.assets().state(AssetId::Wave), AssetState::Failed));
    }

    #[test]
    fn frames_render_every_time() {
        let mut engine = ClientEngine::new(offline_config());
        let first = engine.compose_frame(10.0);
        let second = engine.compose_frame(10.0);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[tokio::test]
    async fn stop_handle_signals_subscribers() {
        let engine = ClientEngine::new(offline_config());
        let mut watcher = engine.stop_tx.subscribe();
        engine.stop_handle().stop();
        watcher.changed().await.unwrap();
        assert!(*watcher.borrow());
    }
}
