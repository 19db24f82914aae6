//! All drawing. Pure view of [`App`]; nothing here mutates state.

use std::io::Stdout;

use anyhow::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};

use crate::actions::Session;
use crate::app::{App, NoticeKind, Scene};
use crate::model::PlantStatus;

pub(crate) fn draw(term: &mut Terminal<CrosstermBackend<Stdout>>, app: &App) -> Result<()> {
    term.draw(|f| {
        let area = f.size();
        let mut title = vec![Span::styled(
            " farmstead ",
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if let Some(user) = &app.user {
            title.push(Span::styled(
                format!(" {user} "),
                Style::default().fg(ink(app.mono, Color::Cyan)),
            ));
        }
        let outer = Block::default()
            .borders(Borders::ALL)
            .title(Line::from(title))
            .border_style(Style::default().fg(ink(app.mono, Color::DarkGray)));
        f.render_widget(outer, area);

        let inner = area.inner(Margin {
            horizontal: 1,
            vertical: 1,
        });
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(inner);

        render_header(f, rows[0], app);
        render_main(f, rows[1], app);
        render_footer(f, rows[2], app);
        render_notices(f, rows[1], app);

        match app.scene {
            Scene::Shop { cursor, qty } => render_shop(f, area, app, cursor, qty),
            Scene::Sell { cursor, qty } => render_sell(f, area, app, cursor, qty),
            Scene::LevelUp => render_level_up(f, area, app),
            Scene::Help => render_help(f, area, app),
            Scene::Farm => {}
        }
    })?;
    Ok(())
}

fn ink(mono: bool, color: Color) -> Color {
    if mono {
        Color::White
    } else {
        color
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let wallet = match &app.session {
        Some(s) => Line::from(vec![
            Span::raw(format!("🪙 {}", s.snapshot.player.coins)),
            Span::raw("   "),
            Span::raw(format!("💎 {}", s.snapshot.player.diamonds)),
            Span::raw("   "),
            Span::styled(
                format!("seed: {}", app.selected_seed().unwrap_or_else(|| "-".into())),
                Style::default().fg(ink(app.mono, Color::Green)),
            ),
        ]),
        None => Line::from(Span::styled(
            "connecting...",
            Style::default().fg(ink(app.mono, Color::Yellow)),
        )),
    };
    f.render_widget(
        Paragraph::new(wallet).block(Block::default().borders(Borders::ALL).title("Wallet")),
        cols[0],
    );

    match &app.session {
        Some(s) => {
            let info = s.tracker.info();
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL).title("Level"))
                .gauge_style(Style::default().fg(ink(app.mono, Color::Magenta)))
                .ratio(info.progress())
                .label(format!(
                    "Lv {}  {}/{} XP",
                    info.current_level, info.current_xp, info.xp_to_next_level
                ));
            f.render_widget(gauge, cols[1]);
        }
        None => {
            f.render_widget(
                Block::default().borders(Borders::ALL).title("Level"),
                cols[1],
            );
        }
    }
}

fn render_main(f: &mut Frame, area: Rect, app: &App) {
    let Some(session) = &app.session else {
        f.render_widget(
            Paragraph::new("Waiting for the server (press r to retry).")
                .style(Style::default().fg(ink(app.mono, Color::Yellow)))
                .block(Block::default().borders(Borders::ALL).title("Farm")),
            area,
        );
        return;
    };

    let grid_w = (session.snapshot.grid.width as u16) * 5 + 2;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(grid_w.max(20)), Constraint::Min(20)])
        .split(area);

    let ready = session.grid().ready_count();
    let title = if ready > 0 {
        format!("Farm ({ready} ready)")
    } else {
        "Farm".to_string()
    };
    f.render_widget(
        Paragraph::new(grid_lines(app, session))
            .block(Block::default().borders(Borders::ALL).title(title)),
        cols[0],
    );

    render_side_panel(f, cols[1], app, session);
}

fn grid_lines(app: &App, session: &Session) -> Vec<Line<'static>> {
    let grid = session.grid();
    let mut lines = Vec::with_capacity(grid.height() as usize * 2);
    for y in 0..grid.height() {
        let mut spans = Vec::with_capacity(grid.width() as usize);
        for x in 0..grid.width() {
            let (text, mut style) = match grid.cell(x, y) {
                Some(p) => (
                    format!(" {} ", p.glyph(&session.catalog)),
                    status_style(p.status(), app.mono),
                ),
                None => ("  ·  ".to_string(), Style::default().fg(Color::DarkGray)),
            };
            if app.cursor.x == x && app.cursor.y == y {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(text, style));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }
    lines
}

fn status_style(status: PlantStatus, mono: bool) -> Style {
    match status {
        PlantStatus::Ready => Style::default()
            .fg(ink(mono, Color::Yellow))
            .add_modifier(Modifier::BOLD),
        PlantStatus::Withered => Style::default().fg(ink(mono, Color::Red)),
        PlantStatus::NeedsWater => Style::default().fg(ink(mono, Color::Blue)),
        PlantStatus::Growing => Style::default().fg(ink(mono, Color::Green)),
    }
}

fn render_side_panel(f: &mut Frame, area: Rect, app: &App, session: &Session) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    // Cursor cell details.
    let grid = session.grid();
    let lines = match grid.cell(app.cursor.x, app.cursor.y) {
        Some(p) => {
            let name = session.catalog.display_name(&p.kind);
            let status = match p.status() {
                PlantStatus::Ready => "ready to harvest",
                PlantStatus::Withered => "withered, water it",
                PlantStatus::NeedsWater => "needs water",
                PlantStatus::Growing => "growing",
            };
            vec![
                Line::from(format!("{} {}", p.glyph(&session.catalog), name)),
                Line::from(format!("stage {}/{}", p.stage, crate::model::READY_STAGE)),
                Line::from(status.to_string()),
            ]
        }
        None => vec![
            Line::from("empty plot"),
            Line::from(match app.selected_seed() {
                Some(kind) => format!("enter plants {}", session.catalog.display_name(&kind)),
                None => "no seed selected".to_string(),
            }),
        ],
    };
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Plot ({}, {})", app.cursor.x, app.cursor.y)),
        ),
        rows[0],
    );

    // Inventory.
    let mut inv_lines = vec![Line::from(Span::styled(
        "Seeds",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if session.snapshot.inventory.seeds.is_empty() {
        inv_lines.push(Line::from("  (none, press b to buy)"));
    }
    for (kind, n) in &session.snapshot.inventory.seeds {
        inv_lines.push(Line::from(format!(
            "  {} x{}",
            session.catalog.display_name(kind),
            n
        )));
    }
    inv_lines.push(Line::from(""));
    inv_lines.push(Line::from(Span::styled(
        "Harvest",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if session.snapshot.inventory.harvest.is_empty() {
        inv_lines.push(Line::from("  (none)"));
    }
    for (kind, n) in &session.snapshot.inventory.harvest {
        inv_lines.push(Line::from(format!(
            "  {} x{}",
            session.catalog.display_name(kind),
            n
        )));
    }
    f.render_widget(
        Paragraph::new(inv_lines)
            .block(Block::default().borders(Borders::ALL).title("Inventory")),
        rows[1],
    );
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let keys = match app.scene {
        Scene::Farm => "q quit | arrows move | enter plant/harvest | w water | W water all | tab seed | b buy | s sell | r refresh | ? help",
        Scene::Shop { .. } | Scene::Sell { .. } => "↑/↓ item | ←/→ qty | enter confirm | esc back",
        Scene::LevelUp => "any key to continue",
        Scene::Help => "? or esc to close",
    };
    let mut spans = Vec::new();
    if let Some(s) = &app.session {
        let info = s.tracker.info();
        let harvest: u32 = s.snapshot.inventory.harvest.values().sum();
        spans.push(Span::styled(
            format!(
                "plants {} | lv {} | {} xp | harvest {}",
                s.snapshot.farm.len(),
                info.current_level,
                info.total_xp,
                harvest
            ),
            Style::default().fg(ink(app.mono, Color::Cyan)),
        ));
        spans.push(Span::raw("   "));
    }
    spans.push(Span::raw(keys));
    if let Some(e) = &app.last_error {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            format!("ERR: {e}"),
            Style::default().fg(ink(app.mono, Color::Red)),
        ));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Keys")),
        area,
    );
}

fn render_notices(f: &mut Frame, area: Rect, app: &App) {
    if app.notices.is_empty() {
        return;
    }
    let width = app
        .notices
        .iter()
        .map(|n| n.text.len() as u16 + 4)
        .max()
        .unwrap_or(20)
        .min(area.width);
    let height = (app.notices.len() as u16 + 2).min(area.height);
    let rect = Rect {
        x: area.right().saturating_sub(width),
        y: area.y,
        width,
        height,
    };
    let lines: Vec<Line> = app
        .notices
        .iter()
        .map(|n| {
            let style = match n.kind {
                NoticeKind::Info => Style::default().fg(ink(app.mono, Color::Green)),
                NoticeKind::Error => Style::default().fg(ink(app.mono, Color::Red)),
            };
            Line::from(Span::styled(n.text.clone(), style))
        })
        .collect();
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        rect,
    );
}

fn render_shop(f: &mut Frame, area: Rect, app: &App, cursor: usize, qty: u32) {
    let Some(session) = &app.session else {
        return;
    };
    let rect = centered_rect(area, 46, 16);
    f.render_widget(Clear, rect);

    let level = session.tracker.info();
    let mut lines = Vec::new();
    let mut total: u64 = 0;
    for (i, crop) in session.catalog.crops().enumerate() {
        let unlocked = level.unlocked_plants.contains(&crop.kind);
        let selected = i == cursor;
        let label = if unlocked {
            format!(
                "{} {:<12} {:>4} 🪙  (have {})",
                crop.emoji_static(),
                session.catalog.display_name(&crop.kind),
                crop.seed_price,
                session.snapshot.inventory.seed_count(&crop.kind),
            )
        } else {
            format!(
                "🔒 {:<12} unlocks at level {}",
                session.catalog.display_name(&crop.kind),
                crop.required_level
            )
        };
        let mut style = if unlocked {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if selected {
            style = style.add_modifier(Modifier::REVERSED);
            if unlocked {
                total = crop.seed_price * qty as u64;
            }
        }
        lines.push(Line::from(Span::styled(label, style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "qty {qty}   total {total} 🪙   coins {}",
        session.snapshot.player.coins
    )));

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Buy seeds")),
        rect,
    );
}

fn render_sell(f: &mut Frame, area: Rect, app: &App, cursor: usize, qty: u32) {
    let Some(session) = &app.session else {
        return;
    };
    let rect = centered_rect(area, 44, 14);
    f.render_widget(Clear, rect);

    let items = app.sell_items();
    let mut lines = Vec::new();
    let mut total: u64 = 0;
    if items.is_empty() {
        lines.push(Line::from("Nothing to sell yet."));
    }
    for (i, (kind, have)) in items.iter().enumerate() {
        let price = session.catalog.crop(kind).map(|c| c.sell_price).unwrap_or(0);
        let mut style = Style::default();
        if i == cursor {
            style = style.add_modifier(Modifier::REVERSED);
            total = price * qty.min(*have) as u64;
        }
        lines.push(Line::from(Span::styled(
            format!(
                "{:<12} x{:<4} {:>4} 🪙 each",
                session.catalog.display_name(kind),
                have,
                price
            ),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!("qty {qty}   total {total} 🪙")));

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Sell harvest")),
        rect,
    );
}

fn render_level_up(f: &mut Frame, area: Rect, app: &App) {
    let Some(ev) = app.session.as_ref().and_then(|s| s.tracker.pending()) else {
        return;
    };
    let Some(session) = &app.session else {
        return;
    };
    let rect = centered_rect(area, 42, 12);
    f.render_widget(Clear, rect);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("🎉 Level {}!", ev.new_level),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    if ev.coins > 0 || ev.diamonds > 0 {
        lines.push(Line::from(format!(
            "Rewards: {} 🪙  {} 💎",
            ev.coins, ev.diamonds
        )));
    }
    if !ev.unlocked_plants.is_empty() {
        let names: Vec<String> = ev
            .unlocked_plants
            .iter()
            .map(|k| session.catalog.display_name(k))
            .collect();
        lines.push(Line::from(format!("New crops: {}", names.join(", "))));
    }
    if !ev.unlocked_features.is_empty() {
        lines.push(Line::from(format!(
            "New features: {}",
            ev.unlocked_features
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("press any key"));

    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Level up"))
            .wrap(Wrap { trim: true }),
        rect,
    );
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let rect = centered_rect(area, 56, 16);
    f.render_widget(Clear, rect);
    let lines = vec![
        Line::from("Keys:"),
        Line::from("  arrows / hjkl   move the plot cursor"),
        Line::from("  enter / space   plant, harvest or water the plot"),
        Line::from("  tab             cycle the selected seed"),
        Line::from("  w               water the plot"),
        Line::from("  W               water everything that needs it"),
        Line::from("  b               buy seeds"),
        Line::from("  s               sell harvest"),
        Line::from("  r               refresh from the server"),
        Line::from("  q               quit"),
        Line::from(""),
        Line::from("The farm refreshes itself periodically; growth and"),
        Line::from("the economy are decided by the server."),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(ink(app.mono, Color::Gray))),
        rect,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    }
}
