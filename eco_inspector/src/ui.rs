use std::collections::VecDeque;
use std::time::Instant;

use eco_client::energy::EnergyPhase;
use eco_client::transport::IntentSink;
use eco_client::water::WaterPhase;
use eco_client::{BannerKind, GameSession, NavTarget, ServerVerdict, TimerUrgency, Tone};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

const MAX_LOGS: usize = 200;

pub struct UiState {
    pub logs: VecDeque<String>,
    pub input: String,
    pub location: NavTarget,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logs: VecDeque::with_capacity(MAX_LOGS),
            input: String::new(),
            location: NavTarget::Home,
        }
    }
}

impl UiState {
    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let text = line.into();
        for part in text.lines() {
            if part.trim().is_empty() {
                continue;
            }
            if self.logs.len() == MAX_LOGS {
                self.logs.pop_front();
            }
            self.logs.push_back(part.to_string());
        }
    }

    pub fn celebrate(&mut self, particles: u32) {
        self.push_log(format!("*** {particles} confetti! ***"));
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Good => Color::Green,
        Tone::Warning => Color::Yellow,
        Tone::Critical => Color::Red,
    }
}

fn banner_color(kind: BannerKind) -> Color {
    match kind {
        BannerKind::Info => Color::Cyan,
        BannerKind::Success => Color::Green,
        BannerKind::Warning => Color::Yellow,
        BannerKind::Error => Color::Red,
    }
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn draw_panel(frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line>) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

pub fn draw_ui<S: IntentSink>(
    frame: &mut Frame,
    state: &UiState,
    session: &GameSession<S>,
    now: Instant,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(7),
        ])
        .split(frame.size());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);

    draw_header(frame, chunks[0], state, session);
    draw_metrics(frame, top[0], session);
    draw_puzzles(frame, top[1], session, now);
    draw_banners(frame, chunks[2], session);
    draw_chat(frame, middle[0], session);
    draw_commands(frame, middle[1]);
    draw_input(frame, chunks[4], state);
    draw_logs(frame, chunks[5], state);

    if let Some(overlay) = session.presenter().overlay() {
        let area = centered(frame.size(), 50, 12);
        let mut lines = vec![Line::from(Span::styled(
            overlay.subtitle(),
            Style::default().add_modifier(Modifier::ITALIC),
        ))];
        lines.extend(overlay.rows().into_iter().map(|row| {
            let color = if row.favorable { Color::Green } else { Color::Red };
            Line::from(vec![
                Span::raw(format!("{:<20}", row.label)),
                Span::styled(format!("{:>3}%", row.value), Style::default().fg(color)),
            ])
        }));
        lines.push(Line::from(Span::styled(
            "type 'return' to continue",
            Style::default().fg(Color::Yellow),
        )));
        frame.render_widget(Clear, area);
        draw_panel(frame, area, overlay.title(), lines);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_header<S: IntentSink>(
    frame: &mut Frame,
    area: Rect,
    state: &UiState,
    session: &GameSession<S>,
) {
    let timer = match session.mirror().timer_view() {
        Some(view) => {
            let mut style = Style::default().fg(match view.urgency {
                TimerUrgency::Normal => Color::Green,
                TimerUrgency::Warning => Color::Yellow,
                TimerUrgency::Urgent => Color::Red,
            });
            if view.urgency.pulses() {
                style = style.add_modifier(Modifier::SLOW_BLINK | Modifier::BOLD);
            }
            Span::styled(view.label, style)
        }
        None => Span::raw("--:--"),
    };
    let room = session
        .lobby()
        .my_room()
        .map(|room| room.wire_name().to_string())
        .unwrap_or_else(|| "no room".to_string());
    let line = Line::from(vec![
        Span::styled("EcoQuest", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}  [{}]  ", session.chat().username(), room)),
        timer,
        Span::raw(format!("  page {}", state.location.path())),
        Span::styled(
            verdict_label(session.last_verdict()),
            Style::default().fg(Color::Cyan),
        ),
    ]);
    draw_panel(frame, area, "Session", vec![line]);
}

fn verdict_label(verdict: Option<&ServerVerdict>) -> String {
    match verdict {
        Some(ServerVerdict::RoomCompleted(room)) => format!("  last: {room} solved"),
        Some(ServerVerdict::RoomUnlocked(room)) => format!("  last: {room} unlocked"),
        Some(ServerVerdict::GameWon) => "  last: game won".to_string(),
        Some(ServerVerdict::GameLost) => "  last: game lost".to_string(),
        None => String::new(),
    }
}

fn draw_metrics<S: IntentSink>(frame: &mut Frame, area: Rect, session: &GameSession<S>) {
    let lines = match session.mirror().metrics_view() {
        Some(view) => view
            .readings
            .iter()
            .map(|reading| {
                Line::from(vec![
                    Span::raw(format!("{:<18}", reading.kind.label())),
                    Span::styled(
                        format!("{:>3}%", reading.value),
                        Style::default().fg(tone_color(reading.tone)),
                    ),
                ])
            })
            .collect(),
        None => vec![Line::from("waiting for the first state update")],
    };
    draw_panel(frame, area, "Environment", lines);
}

fn draw_puzzles<S: IntentSink>(
    frame: &mut Frame,
    area: Rect,
    session: &GameSession<S>,
    now: Instant,
) {
    let energy = session.energy();
    let cables = energy
        .connections()
        .iter()
        .map(|(left, right)| format!("{left}-{right}({:?})", energy.color_of(*right)))
        .collect::<Vec<_>>()
        .join(" ");
    let energy_phase = match energy.phase() {
        EnergyPhase::NoConnections => "no connections".to_string(),
        EnergyPhase::Partial(count) => format!("{count}/4 connected"),
        EnergyPhase::CompletePendingValidation => "ready to check".to_string(),
    };

    let water = session.water();
    let chemical = water.chemical();
    let mut items = water.stream().positions(now);
    items.sort_by(|a, b| b.progress.total_cmp(&a.progress));
    let river = items
        .iter()
        .take(6)
        .map(|pos| format!("#{} {} {:>2.0}%", pos.item.id, pos.item.kind, pos.progress * 100.0))
        .collect::<Vec<_>>()
        .join("  ");
    let phase = match water.phase() {
        WaterPhase::Sorting => "sorting",
        WaterPhase::Chemical => "chemical",
    };

    let mut lines = vec![
        Line::from(format!("Energy: {energy_phase}  {cables}")),
        Line::from(format!("Water: purity {}% ({phase})", water.purity())),
        Line::from(format!("River: {river}")),
        Line::from(vec![
            Span::raw("pH "),
            Span::styled(
                format!("{:.1}", chemical.ph()),
                Style::default().fg(tone_color(chemical.ph_tone())),
            ),
            Span::raw("  O2 "),
            Span::styled(
                format!("{:.1} mg/L", chemical.o2()),
                Style::default().fg(tone_color(chemical.o2_tone())),
            ),
            Span::raw(format!("  fish {}", water.fish().len())),
        ]),
    ];
    if let Some(held) = water.stream().held() {
        lines.push(Line::from(format!("Holding item #{held}")));
    }
    if energy.modal_open() || water.modal_open() {
        lines.push(Line::from(Span::styled(
            "Room restored! type 'close'",
            Style::default().fg(Color::Green),
        )));
    }
    draw_panel(frame, area, "Puzzles", lines);
}

fn draw_banners<S: IntentSink>(frame: &mut Frame, area: Rect, session: &GameSession<S>) {
    let lines = session
        .presenter()
        .banners()
        .iter()
        .rev()
        .map(|banner| {
            Line::from(Span::styled(
                banner.text.clone(),
                Style::default().fg(banner_color(banner.kind)),
            ))
        })
        .collect();
    draw_panel(frame, area, "Notifications", lines);
}

fn draw_chat<S: IntentSink>(frame: &mut Frame, area: Rect, session: &GameSession<S>) {
    let chat = session.chat();
    let visible = area.height.saturating_sub(2) as usize;
    let messages = chat.messages();
    let lines = messages[messages.len().saturating_sub(visible)..]
        .iter()
        .map(|msg| {
            let color = if msg.own { Color::Cyan } else { Color::White };
            Line::from(vec![
                Span::styled(
                    format!("{} {}: ", msg.time_label, msg.username),
                    Style::default().fg(color),
                ),
                Span::raw(msg.message.clone()),
            ])
        })
        .collect();
    let title = if chat.speaks_incoming() {
        "Chat (speech on)"
    } else {
        "Chat"
    };
    draw_panel(frame, area, title, lines);
}

fn draw_commands(frame: &mut Frame, area: Rect) {
    let entries = [
        ("link L1 R3", "connect a cable"),
        ("check", "validate cables"),
        ("sort <id> <bin>", "plastic | metal | organic"),
        ("lime / aerate", "adjust the water"),
        ("validate", "check chemistry"),
        ("source <name> yes|no", "pollution source"),
        ("room <name> / ready", "lobby"),
        ("say <text> / voice / tts", "chat"),
        ("code <text> / reset", "final code, reset"),
        ("esc", "exit client"),
    ];
    let lines = entries
        .iter()
        .map(|(keys, help)| {
            Line::from(vec![
                Span::styled(format!("{keys:<26}"), Style::default().fg(Color::Yellow)),
                Span::raw(*help),
            ])
        })
        .collect();
    draw_panel(frame, area, "Commands", lines);
}

fn draw_input(frame: &mut Frame, area: Rect, state: &UiState) {
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Yellow)),
        Span::raw(state.input.clone()),
    ]);
    draw_panel(frame, area, "Input", vec![line]);
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(state.logs.len().saturating_sub(visible))
        .map(|entry| Line::from(Span::raw(entry.clone())))
        .collect();
    draw_panel(frame, area, "Logs", lines);
}
