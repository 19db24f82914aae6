//! UI state and the event loop.
//!
//! One task owns all mutable state. Server calls are awaited inline while a
//! command is handled, so at most one request is in flight at a time and a
//! periodic refresh can never interleave with an action's round-trip.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{self, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::actions::{self, ActionError, Session};
use crate::api::{ApiClient, ApiError};
use crate::config::Settings;
use crate::host::HostContext;
use crate::input::{self, UiAction};
use crate::model::{GridPos, PlantStatus};
use crate::progression::ProgressionTracker;
use crate::render;

const NOTICE_TTL: Duration = Duration::from_secs(3);
const MAX_NOTICES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scene {
    Farm,
    Shop { cursor: usize, qty: u32 },
    Sell { cursor: usize, qty: u32 },
    LevelUp,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NoticeKind {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct Notice {
    pub(crate) kind: NoticeKind,
    pub(crate) text: String,
    expires_at: Instant,
}

#[derive(Debug)]
enum Cmd {
    RefreshState,
}

pub(crate) struct RunConfig {
    pub(crate) settings: Settings,
    pub(crate) host: HostContext,
    pub(crate) debug: bool,
}

pub(crate) struct App {
    api: ApiClient,
    pub(crate) session: Option<Session>,
    pub(crate) scene: Scene,
    pub(crate) cursor: GridPos,
    pub(crate) seed_choice: Option<usize>,
    pub(crate) notices: Vec<Notice>,
    pub(crate) last_error: Option<String>,
    pub(crate) last_fetch: Option<Instant>,
    pub(crate) mono: bool,
    pub(crate) user: Option<String>,
    debug_enabled: bool,
}

pub(crate) async fn run(cfg: RunConfig) -> Result<()> {
    let api = ApiClient::new(&cfg.settings.server_url, cfg.settings.player_id, &cfg.host)?;
    let mut app = App::new(api, &cfg);
    app.bootstrap().await;

    let (tx, mut rx) = mpsc::channel::<Cmd>(16);
    spawn_state_refresher(tx, Duration::from_secs(cfg.settings.refresh_secs.max(1)));

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, &mut rx).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    rx: &mut mpsc::Receiver<Cmd>,
) -> Result<()> {
    loop {
        // Drain refresh ticks queued while we were busy; handling each one
        // awaits the fetch before the next is looked at.
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Cmd::RefreshState => app.refresh().await,
            }
        }

        app.expire_notices();
        app.promote_level_up();
        render::draw(terminal, app)?;

        if event::poll(Duration::from_millis(33))? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press {
                    if let Some(action) = input::map_key(&app.scene, k) {
                        if app.handle(action).await? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn spawn_state_refresher(tx: mpsc::Sender<Cmd>, every: Duration) {
    tokio::spawn(async move {
        let mut t = tokio::time::interval(every);
        t.tick().await; // the bootstrap already fetched once
        loop {
            t.tick().await;
            if tx.send(Cmd::RefreshState).await.is_err() {
                break;
            }
        }
    });
}

impl App {
    fn new(api: ApiClient, cfg: &RunConfig) -> Self {
        Self {
            api,
            session: None,
            scene: Scene::Farm,
            cursor: GridPos::new(0, 0),
            seed_choice: None,
            notices: Vec::new(),
            last_error: None,
            last_fetch: None,
            mono: cfg.settings.mono || cfg.host.mono,
            user: cfg.host.user.clone(),
            debug_enabled: cfg.debug,
        }
    }

    async fn bootstrap(&mut self) {
        match self.connect().await {
            Ok(()) => info!(player = self.api.player_id(), "connected"),
            Err(err) => {
                error!(error = %err, "initial fetch failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Full handshake: catalog and level table once, then the first snapshot.
    async fn connect(&mut self) -> Result<(), ApiError> {
        let catalog = self.api.plants_info().await?;
        let table = self.api.level_table().await?;
        let snapshot = self.api.game_state().await?;
        let tracker = ProgressionTracker::new(snapshot.level.clone(), table);
        self.session = Some(Session {
            snapshot,
            catalog,
            tracker,
        });
        self.last_fetch = Some(Instant::now());
        self.last_error = None;
        Ok(())
    }

    /// Fetches a fresh snapshot and adopts it as ground truth. Retries the
    /// full handshake while the first one has not succeeded yet.
    async fn refresh(&mut self) {
        if self.session.is_none() {
            if let Err(err) = self.connect().await {
                error!(error = %err, "reconnect failed");
                self.last_error = Some(err.to_string());
            }
            return;
        }
        match self.api.game_state().await {
            Ok(snap) => {
                if let Some(session) = self.session.as_mut() {
                    session.tracker.sync_from_server(snap.level.clone());
                    session.snapshot = snap;
                }
                self.last_error = None;
                self.last_fetch = Some(Instant::now());
            }
            Err(err) => {
                error!(error = %err, "state refresh failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    async fn handle(&mut self, action: UiAction) -> Result<bool> {
        match action {
            UiAction::Quit => return Ok(true),
            UiAction::HelpToggle => {
                self.scene = if self.scene == Scene::Help {
                    Scene::Farm
                } else {
                    Scene::Help
                };
            }
            UiAction::Back => self.close_overlay(),
            UiAction::Move(dx, dy) => self.move_cursor(dx, dy),
            UiAction::CellAction => self.cell_action().await,
            UiAction::Water => self.water_cursor().await,
            UiAction::WaterAll => self.water_all().await,
            UiAction::Refresh => {
                self.refresh().await;
                if self.last_error.is_none() {
                    self.push_notice(NoticeKind::Info, "Refreshed".to_string());
                }
            }
            UiAction::OpenShop => self.scene = Scene::Shop { cursor: 0, qty: 1 },
            UiAction::OpenSell => self.scene = Scene::Sell { cursor: 0, qty: 1 },
            UiAction::CycleSeed => {
                let n = self.seed_kinds().len();
                if n > 0 {
                    self.seed_choice = Some(match self.seed_choice {
                        None => 0,
                        Some(i) => (i + 1) % n,
                    });
                }
            }
            UiAction::MenuMove(delta) => self.menu_move(delta),
            UiAction::QtyAdjust(delta) => {
                if let Scene::Shop { qty, .. } | Scene::Sell { qty, .. } = &mut self.scene {
                    *qty = (*qty as i64 + delta as i64).clamp(1, 99) as u32;
                }
            }
            UiAction::Confirm => self.confirm_modal().await,
            UiAction::DebugXp => {
                if self.debug_enabled {
                    if let Some(session) = self.session.as_mut() {
                        session.tracker.grant_xp(100);
                        self.push_notice(NoticeKind::Info, "+100 XP".to_string());
                    }
                }
            }
        }
        Ok(false)
    }

    fn close_overlay(&mut self) {
        if self.scene == Scene::LevelUp {
            if let Some(session) = self.session.as_mut() {
                session.tracker.acknowledge();
            }
        }
        self.scene = Scene::Farm;
    }

    /// Moves the LevelUp celebration in front of the farm once the tracker
    /// has something pending. Modals finish first; the event survives until
    /// acknowledged.
    fn promote_level_up(&mut self) {
        if self.scene != Scene::Farm {
            return;
        }
        let pending = self
            .session
            .as_ref()
            .is_some_and(|s| s.tracker.pending().is_some());
        if pending {
            self.scene = Scene::LevelUp;
        }
    }

    fn move_cursor(&mut self, dx: i16, dy: i16) {
        let size = self
            .session
            .as_ref()
            .map(|s| s.snapshot.grid)
            .unwrap_or_default();
        let x = (self.cursor.x as i32 + dx as i32).clamp(0, size.width.max(1) as i32 - 1);
        let y = (self.cursor.y as i32 + dy as i32).clamp(0, size.height.max(1) as i32 - 1);
        self.cursor = GridPos::new(x as u16, y as u16);
    }

    /// Crop kinds the seed selector cycles through. Locked crops are skipped;
    /// empty seed pouches are not, the plant check reports those.
    pub(crate) fn seed_kinds(&self) -> Vec<String> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        session
            .catalog
            .crops()
            .filter(|c| session.tracker.info().unlocked_plants.contains(&c.kind))
            .map(|c| c.kind.clone())
            .collect()
    }

    pub(crate) fn selected_seed(&self) -> Option<String> {
        let idx = self.seed_choice?;
        let kinds = self.seed_kinds();
        if kinds.is_empty() {
            return None;
        }
        Some(kinds[idx % kinds.len()].clone())
    }

    pub(crate) fn sell_items(&self) -> Vec<(String, u32)> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        session
            .snapshot
            .inventory
            .harvest
            .iter()
            .map(|(k, n)| (k.clone(), *n))
            .collect()
    }

    fn menu_move(&mut self, delta: i32) {
        let len = match self.scene {
            Scene::Shop { .. } => self
                .session
                .as_ref()
                .map(|s| s.catalog.crops().count())
                .unwrap_or(0),
            Scene::Sell { .. } => self.sell_items().len(),
            _ => 0,
        };
        if len == 0 {
            return;
        }
        if let Scene::Shop { cursor, .. } | Scene::Sell { cursor, .. } = &mut self.scene {
            *cursor = (*cursor as i64 + delta as i64).rem_euclid(len as i64) as usize;
        }
    }

    /// Context action for the cursor cell: plant on empty, harvest when
    /// ready, water when dry or withered.
    async fn cell_action(&mut self) {
        let pos = self.cursor;
        let seed = self.selected_seed();
        let status = match &self.session {
            Some(session) => {
                let grid = session.grid();
                grid.cell(pos.x, pos.y).map(|p| p.status())
            }
            None => return,
        };

        match status {
            None => match seed {
                Some(kind) => {
                    if let Some(session) = self.session.as_mut() {
                        let res = actions::plant(&self.api, session, &kind, pos).await;
                        if res.is_ok() {
                            // A planted seed deselects itself; the next plant
                            // is an explicit choice again.
                            self.seed_choice = None;
                        }
                        self.finish_action(res).await;
                    }
                }
                None => {
                    self.finish_action(Err(ActionError::NoSeedSelected)).await;
                }
            },
            Some(PlantStatus::Ready) => {
                if let Some(session) = self.session.as_mut() {
                    let res = actions::harvest(&self.api, session, pos).await;
                    self.finish_action(res).await;
                }
            }
            Some(PlantStatus::NeedsWater) | Some(PlantStatus::Withered) => {
                self.water_cursor().await;
            }
            Some(PlantStatus::Growing) => {
                self.push_notice(NoticeKind::Info, "Still growing".to_string());
            }
        }
    }

    async fn water_cursor(&mut self) {
        let pos = self.cursor;
        if let Some(session) = self.session.as_mut() {
            let res = actions::water(&self.api, session, pos).await;
            self.finish_action(res).await;
        }
    }

    async fn water_all(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match actions::water_all(&self.api, session).await {
            Ok(report) if report.watered == 0 && report.failed == 0 => {
                self.push_notice(NoticeKind::Info, "Nothing needs water".to_string());
            }
            Ok(report) => {
                let msg = if report.failed == 0 {
                    format!("Watered {} plants", report.watered)
                } else {
                    format!("Watered {} plants, {} skipped", report.watered, report.failed)
                };
                self.push_notice(NoticeKind::Info, msg);
                self.refresh().await;
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.push_notice(NoticeKind::Error, err.to_string());
            }
        }
    }

    async fn confirm_modal(&mut self) {
        match self.scene {
            Scene::Shop { cursor, qty } => {
                let kind = self
                    .session
                    .as_ref()
                    .and_then(|s| s.catalog.crops().nth(cursor).map(|c| c.kind.clone()));
                if let Some(kind) = kind {
                    if let Some(session) = self.session.as_mut() {
                        let res = actions::buy(&self.api, session, &kind, qty).await;
                        self.finish_action(res).await;
                    }
                }
            }
            Scene::Sell { cursor, qty } => {
                let kind = self.sell_items().get(cursor).map(|(k, _)| k.clone());
                if let Some(kind) = kind {
                    if let Some(session) = self.session.as_mut() {
                        let res = actions::sell(&self.api, session, &kind, qty).await;
                        self.finish_action(res).await;
                    }
                }
            }
            _ => {}
        }
    }

    /// Reports the outcome and, on success, pulls a fresh snapshot so the
    /// optimistic patch is replaced by server truth.
    async fn finish_action(&mut self, res: Result<String, ActionError>) {
        match res {
            Ok(msg) => {
                self.push_notice(NoticeKind::Info, msg);
                self.refresh().await;
            }
            Err(err) => {
                if matches!(&err, ActionError::Api(ApiError::Transport(_))) {
                    self.last_error = Some(err.to_string());
                }
                self.push_notice(NoticeKind::Error, err.to_string());
            }
        }
    }

    fn push_notice(&mut self, kind: NoticeKind, text: String) {
        self.notices.push(Notice {
            kind,
            text,
            expires_at: Instant::now() + NOTICE_TTL,
        });
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }

    fn expire_notices(&mut self) {
        let now = Instant::now();
        self.notices.retain(|n| n.expires_at > now);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode()?;
    let mut out = io::stdout();
    execute!(out, EnterAlternateScreen, DisableLineWrap, cursor::Hide)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(term: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut out = io::stdout();
    execute!(out, cursor::Show, EnableLineWrap, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    term.show_cursor()?;
    Ok(())
}
