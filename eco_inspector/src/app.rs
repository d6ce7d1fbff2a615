use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use eco_client::chat::ChatRequest;
use eco_client::final_code::FinalCodeError;
use eco_client::{
    parse_command_line, BannerKind, ChatUpdate, EventChannelHandle, GameSession, LobbyUpdate,
    NavTarget, Notice, PlayerCommand, RestError,
};
use eco_proto::{FinalCodeResponse, ServerEvent};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::ui::{draw_ui, UiState};

/// Calls that need the HTTP session but no polling loop.
#[derive(Debug, Clone)]
pub enum RestRequest {
    FinalCode(String),
    ResetGame,
}

#[derive(Debug)]
pub enum RestOutcome {
    FinalCode(Result<FinalCodeResponse, FinalCodeError>),
    Reset(Result<(), RestError>),
}

pub struct InspectorChannels {
    pub events: UnboundedReceiver<ServerEvent>,
    pub chat_updates: UnboundedReceiver<ChatUpdate>,
    pub lobby_updates: UnboundedReceiver<LobbyUpdate>,
    pub rest_outcomes: UnboundedReceiver<RestOutcome>,
    pub chat_requests: UnboundedSender<ChatRequest>,
    pub rest_requests: UnboundedSender<RestRequest>,
    pub logs: Receiver<String>,
}

pub struct InspectorApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    session: GameSession<EventChannelHandle>,
    channels: InspectorChannels,
}

impl InspectorApp {
    pub fn new(session: GameSession<EventChannelHandle>, channels: InspectorChannels) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            session,
            channels,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();
        self.session.start(Instant::now());

        loop {
            let now = Instant::now();
            self.drain_channels(now);

            let tick = self.session.tick(now);
            if tick.confetti > 0 {
                self.ui_state.celebrate(tick.confetti);
            }
            if tick.energy_modal_opened {
                self.ui_state
                    .push_log("Power restored. Type 'close' to dismiss the message.");
            }
            if tick.water_modal_opened {
                self.ui_state
                    .push_log("The river flows again. Type 'close' to dismiss the message.");
            }
            if let Some(target) = tick.navigate {
                if self.navigate(target) {
                    break;
                }
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                let now = Instant::now();
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.ui_state, &self.session, now))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Esc => break,
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            break
                        }
                        KeyCode::Enter => {
                            let line = std::mem::take(&mut self.ui_state.input);
                            if self.submit_line(&line, Instant::now()) {
                                break;
                            }
                        }
                        KeyCode::Backspace => {
                            self.ui_state.input.pop();
                        }
                        KeyCode::Char(ch) => self.ui_state.input.push(ch),
                        _ => {}
                    }
                }
            }
        }

        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        Ok(())
    }

    fn drain_channels(&mut self, now: Instant) {
        while let Ok(event) = self.channels.events.try_recv() {
            self.session.handle_event(&event, now);
        }
        while let Ok(update) = self.channels.chat_updates.try_recv() {
            self.session.apply_chat(update, now);
        }
        while let Ok(update) = self.channels.lobby_updates.try_recv() {
            self.session.apply_lobby(update, now);
        }
        while let Ok(outcome) = self.channels.rest_outcomes.try_recv() {
            match outcome {
                RestOutcome::FinalCode(result) => self.session.apply_final_code(result, now),
                RestOutcome::Reset(Ok(())) => info!("Game reset requested"),
                RestOutcome::Reset(Err(err)) => {
                    self.session
                        .notify(Notice::new(BannerKind::Error, err.to_string()), now);
                }
            }
        }
        while let Ok(line) = self.channels.logs.try_recv() {
            self.ui_state.push_log(line);
        }
    }

    /// Returns `true` when the client should exit.
    fn navigate(&mut self, target: NavTarget) -> bool {
        info!(path = target.path(), "navigate");
        self.ui_state.location = target;
        if target == NavTarget::Login {
            self.ui_state
                .push_log("Session ended by a game reset. Log in again to play.");
            return true;
        }
        false
    }

    /// Returns `true` when the client should exit.
    fn submit_line(&mut self, line: &str, now: Instant) -> bool {
        let command = match parse_command_line(line) {
            Ok(command) => command,
            Err(err) => {
                warn!("Rejected command '{}': {}", line.trim(), err);
                self.ui_state.push_log(format!("error: {err}"));
                return false;
            }
        };
        self.dispatch(command, now)
    }

    fn dispatch(&mut self, command: PlayerCommand, now: Instant) -> bool {
        match command {
            PlayerCommand::Link { left, right } => self.session.connect_cable(left, right),
            PlayerCommand::CheckCables => {
                let guess = self.session.validate_cables(now);
                self.ui_state
                    .push_log(format!("Cables checked (local guess: {})", verdict(guess.is_correct())));
            }
            PlayerCommand::CloseModal => self.session.close_modal(),
            PlayerCommand::Grab { item } => {
                if !self.session.grab_waste(item) {
                    self.ui_state.push_log(format!("No item {item} in the river"));
                }
            }
            PlayerCommand::Sort { item, bin } => {
                if self.session.sort_waste(item, bin, now).is_none() {
                    self.ui_state.push_log(format!("No item {item} in the river"));
                }
            }
            PlayerCommand::Drop { bin } => {
                if self.session.drop_held_waste(bin, now).is_none() {
                    self.ui_state.push_log("Nothing is held");
                }
            }
            PlayerCommand::AddLime => {
                let adjustment = self.session.add_lime();
                self.ui_state.push_log(format!("pH now {:.1}", adjustment.value));
            }
            PlayerCommand::Aerate => {
                let adjustment = self.session.activate_aerator();
                self.ui_state.push_log(format!("O2 now {:.1} mg/L", adjustment.value));
            }
            PlayerCommand::ValidateChemical => {
                self.session.validate_chemical(now);
            }
            PlayerCommand::IdentifySource { source, correct } => {
                self.session.identify_pollution_source(&source, correct);
            }
            PlayerCommand::SelectPlant { plant } => self.session.select_plant(&plant),
            PlayerCommand::SelectRoom { room } => self.session.select_room(room),
            PlayerCommand::Ready => self.session.player_ready(),
            PlayerCommand::FinalCode { code } => {
                self.send_rest(RestRequest::FinalCode(code));
            }
            PlayerCommand::Say { text } => {
                if let Some(request) = self.session.submit_chat(&text, now) {
                    self.send_chat(request);
                }
            }
            PlayerCommand::ToggleSpeech => {
                self.session.toggle_speech(now);
            }
            PlayerCommand::Voice => {
                if let Some(request) = self.session.start_voice_input(now) {
                    self.send_chat(request);
                }
            }
            PlayerCommand::Return => {
                if let Some(target) = self.session.return_from_overlay() {
                    return self.navigate(target);
                }
            }
            PlayerCommand::ResetGame => self.send_rest(RestRequest::ResetGame),
        }
        false
    }

    fn send_chat(&mut self, request: ChatRequest) {
        if let Err(err) = self.channels.chat_requests.send(request) {
            error!("Failed to queue chat message: {}", err);
        }
    }

    fn send_rest(&mut self, request: RestRequest) {
        if let Err(err) = self.channels.rest_requests.send(request) {
            error!("Failed to queue request: {}", err);
        }
    }
}

fn verdict(correct: bool) -> &'static str {
    if correct {
        "correct"
    } else {
        "incorrect"
    }
}
