//! The single owner of client-side game state.
//!
//! Server events come in through [`GameSession::handle_event`]; player actions
//! go through the puzzle methods, which hand intents to the session's
//! [`IntentSink`]. Time is always supplied by the caller.

use std::sync::Arc;
use std::time::Instant;

use eco_proto::{ClientIntent, FinalCodeResponse, PuzzleIntent, Room, ServerEvent};
use rand::rngs::SmallRng;

use crate::capability::Speech;
use crate::chat::{ChatRelay, ChatRequest, ChatUpdate};
use crate::chemical::ChemicalAdjustment;
use crate::config::ClientConfig;
use crate::energy::{EnergyPuzzle, LeftNode, RightNode};
use crate::final_code::FinalCodeError;
use crate::lobby::{self, LobbyState, LobbyUpdate};
use crate::mirror::GameStateMirror;
use crate::presenter::{BannerKind, NavTarget, Notice, Presenter};
use crate::transport::IntentSink;
use crate::verdict::{ClientGuess, ServerVerdict};
use crate::waste::WasteKind;
use crate::water::{WaterOutcome, WaterPuzzle};

/// Time-driven side effects surfaced by [`GameSession::tick`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionTick {
    pub navigate: Option<NavTarget>,
    pub confetti: u32,
    pub energy_modal_opened: bool,
    pub water_modal_opened: bool,
}

pub struct GameSession<S: IntentSink> {
    sink: S,
    rng: SmallRng,
    mirror: GameStateMirror,
    presenter: Presenter,
    energy: EnergyPuzzle,
    water: WaterPuzzle,
    pollution_attempts: u32,
    chat: ChatRelay,
    lobby: LobbyState,
    speech: Speech,
    last_verdict: Option<ServerVerdict>,
}

impl<S: IntentSink> GameSession<S> {
    pub fn new(
        config: Arc<ClientConfig>,
        username: &str,
        sink: S,
        mut rng: SmallRng,
        speech: Speech,
    ) -> Self {
        let energy = EnergyPuzzle::new(&mut rng, config.energy.success_modal_delay());
        Self {
            sink,
            mirror: GameStateMirror::new(config.timer.clone()),
            presenter: Presenter::new(config.presenter.clone()),
            energy,
            water: WaterPuzzle::new(config.water.clone(), config.chemical.clone()),
            pollution_attempts: 0,
            chat: ChatRelay::new(username, config.chat.max_message_len()),
            lobby: LobbyState::new(username),
            speech,
            last_verdict: None,
            rng,
        }
    }

    /// Start the river flowing.
    pub fn start(&mut self, now: Instant) {
        self.water.start(&mut self.rng, now);
    }

    pub fn mirror(&self) -> &GameStateMirror {
        &self.mirror
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn energy(&self) -> &EnergyPuzzle {
        &self.energy
    }

    pub fn water(&self) -> &WaterPuzzle {
        &self.water
    }

    pub fn chat(&self) -> &ChatRelay {
        &self.chat
    }

    pub fn lobby(&self) -> &LobbyState {
        &self.lobby
    }

    pub fn speech(&self) -> &Speech {
        &self.speech
    }

    /// Most recent authoritative outcome from the server.
    pub fn last_verdict(&self) -> Option<&ServerVerdict> {
        self.last_verdict.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn notify(&mut self, notice: Notice, now: Instant) {
        self.presenter.notify(notice, now);
    }

    fn emit(&mut self, intent: ClientIntent) {
        tracing::debug!(target: "eco_quest::session", intent = intent.name(), "intent.emitted");
        self.sink.emit(intent);
    }

    fn emit_action(&mut self, intent: PuzzleIntent) {
        self.emit(ClientIntent::Action(intent));
    }

    /// Route one server push to the mirror, the presenter and the puzzles.
    pub fn handle_event(&mut self, event: &ServerEvent, now: Instant) {
        tracing::trace!(target: "eco_quest::session", event = event.name(), "event.dispatched");
        match event {
            ServerEvent::TimerUpdate { remaining } => {
                self.mirror.apply_timer_update(*remaining);
            }
            ServerEvent::StateUpdate(metrics) => {
                self.mirror.apply_state_update(*metrics);
            }
            ServerEvent::PuzzleCompleted { room } if Room::from_wire(room) == Some(Room::Water) => {
                self.water.schedule_completion_modal(now);
            }
            _ => {}
        }
        if let Some(verdict) = ServerVerdict::from_event(event) {
            tracing::info!(target: "eco_quest::session", ?verdict, "verdict.received");
            self.last_verdict = Some(verdict);
        }
        self.presenter.handle(event, now);
    }

    /// Advance every clock-driven piece of state.
    pub fn tick(&mut self, now: Instant) -> SessionTick {
        self.presenter.expire(now);
        let energy_modal_opened = self.energy.poll_modal(now);
        let water_modal_opened = self.water.tick(&mut self.rng, now);
        SessionTick {
            navigate: self.presenter.poll_redirect(now),
            confetti: self.presenter.take_confetti(),
            energy_modal_opened,
            water_modal_opened,
        }
    }

    pub fn connect_cable(&mut self, left: LeftNode, right: RightNode) {
        self.energy.connect(left, right);
    }

    pub fn energy_press(&mut self, x: f64, y: f64) {
        self.energy.press_at(x, y);
    }

    pub fn energy_release(&mut self, x: f64, y: f64) -> Option<(LeftNode, RightNode)> {
        self.energy.release_at(x, y)
    }

    pub fn validate_cables(&mut self, now: Instant) -> ClientGuess {
        let validation = self.energy.validate(&mut self.rng, now);
        self.emit_action(validation.intent);
        validation.guess
    }

    /// Close whichever follow-up modal is open.
    pub fn close_modal(&mut self) {
        self.energy.close_modal();
        self.water.close_modal();
    }

    fn apply_water(&mut self, outcome: WaterOutcome, now: Instant) -> Option<ClientGuess> {
        for intent in outcome.intents {
            self.emit_action(intent);
        }
        if let Some(notice) = outcome.notice {
            self.presenter.notify(notice, now);
        }
        outcome.guess
    }

    pub fn grab_waste(&mut self, item: u64) -> bool {
        self.water.stream_mut().grab(item)
    }

    pub fn sort_waste(&mut self, item: u64, bin: WasteKind, now: Instant) -> Option<ClientGuess> {
        let outcome = self.water.sort(item, bin)?;
        self.apply_water(outcome, now)
    }

    pub fn drop_held_waste(&mut self, bin: WasteKind, now: Instant) -> Option<ClientGuess> {
        let outcome = self.water.drop_held(bin)?;
        self.apply_water(outcome, now)
    }

    pub fn add_lime(&mut self) -> ChemicalAdjustment {
        let adjustment = self.water.add_lime();
        self.emit_action(adjustment.intent.clone());
        adjustment
    }

    pub fn activate_aerator(&mut self) -> ChemicalAdjustment {
        let adjustment = self.water.activate_aerator();
        self.emit_action(adjustment.intent.clone());
        adjustment
    }

    pub fn validate_chemical(&mut self, now: Instant) -> Option<ClientGuess> {
        let outcome = self.water.validate_chemical(now);
        self.apply_water(outcome, now)
    }

    pub fn identify_pollution_source(&mut self, source: &str, correct: bool) {
        self.pollution_attempts += 1;
        self.emit_action(PuzzleIntent::IdentifyPollutionSource {
            source: source.to_string(),
            correct,
            attempts: self.pollution_attempts,
        });
    }

    pub fn select_plant(&mut self, plant: &str) {
        self.emit_action(PuzzleIntent::SelectPlant {
            plant: plant.to_string(),
        });
    }

    pub fn select_room(&mut self, room: Room) {
        self.emit(lobby::select_room(room));
    }

    pub fn player_ready(&mut self) {
        self.emit(lobby::player_ready());
    }

    pub fn apply_lobby(&mut self, update: LobbyUpdate, now: Instant) {
        match update {
            LobbyUpdate::Status(status) => self.lobby.apply(status),
            LobbyUpdate::NotLoggedIn => {
                self.presenter
                    .notify(Notice::new(BannerKind::Error, "Not logged in"), now);
            }
            LobbyUpdate::Failed(message) => {
                self.presenter.notify(Notice::new(BannerKind::Error, message), now);
            }
        }
    }

    pub fn apply_chat(&mut self, update: ChatUpdate, now: Instant) {
        match update {
            ChatUpdate::Messages(batch) => {
                let lines = self.chat.ingest(batch);
                if let Some(output) = self.speech.output() {
                    for line in lines {
                        if let Err(err) = output.speak(&line) {
                            tracing::warn!(target: "eco_quest::speech", error = %err, "speech.speak_failed");
                        }
                    }
                }
            }
            ChatUpdate::Sent => {
                tracing::debug!(target: "eco_quest::chat", "chat.sent");
            }
            ChatUpdate::Failed(message) => {
                self.presenter.notify(Notice::new(BannerKind::Error, message), now);
            }
        }
    }

    /// Validate a draft locally. Returns the request to hand to the chat
    /// worker, or surfaces why the draft was refused.
    pub fn submit_chat(&mut self, raw: &str, now: Instant) -> Option<ChatRequest> {
        match self.chat.prepare_submission(raw) {
            Ok(text) => Some(ChatRequest::Submit(text)),
            Err(err) => {
                self.presenter
                    .notify(Notice::new(BannerKind::Error, err.to_string()), now);
                None
            }
        }
    }

    pub fn toggle_speech(&mut self, now: Instant) -> bool {
        let enabled = self.chat.toggle_speech();
        let text = if enabled {
            "Text-to-speech enabled"
        } else {
            "Text-to-speech disabled"
        };
        self.presenter.notify(Notice::new(BannerKind::Info, text), now);
        enabled
    }

    /// Capture one utterance and submit it as a chat message.
    pub fn start_voice_input(&mut self, now: Instant) -> Option<ChatRequest> {
        let Some(input) = self.speech.input() else {
            self.presenter.notify(
                Notice::new(BannerKind::Error, "Speech recognition not supported"),
                now,
            );
            return None;
        };
        match input.listen() {
            Ok(transcript) => self.submit_chat(&transcript, now),
            Err(err) => {
                tracing::warn!(target: "eco_quest::speech", error = %err, "speech.listen_failed");
                self.presenter.notify(
                    Notice::new(BannerKind::Error, "Speech recognition error"),
                    now,
                );
                None
            }
        }
    }

    pub fn apply_final_code(
        &mut self,
        result: Result<FinalCodeResponse, FinalCodeError>,
        now: Instant,
    ) {
        let notice = match result {
            Ok(response) if response.success => {
                Notice::new(BannerKind::Success, response.message)
            }
            Ok(response) => Notice::new(BannerKind::Error, response.message),
            Err(err) => Notice::new(BannerKind::Error, err.to_string()),
        };
        self.presenter.notify(notice, now);
    }

    pub fn return_from_overlay(&mut self) -> Option<NavTarget> {
        self.presenter.return_from_overlay()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eco_proto::{ChatMessage, EnvironmentMetrics};
    use rand::SeedableRng;

    use super::*;
    use crate::capability::{SpeechError, SpeechOutput};
    use crate::mirror::TimerUrgency;

    fn session() -> GameSession<Vec<ClientIntent>> {
        GameSession::new(
            ClientConfig::builtin(),
            "ada",
            Vec::new(),
            SmallRng::seed_from_u64(5),
            Speech::none(),
        )
    }

    #[test]
    fn state_and_timer_events_reach_the_mirror() {
        let mut session = session();
        let now = Instant::now();
        session.handle_event(&ServerEvent::TimerUpdate { remaining: 59 }, now);
        session.handle_event(
            &ServerEvent::StateUpdate(EnvironmentMetrics {
                energy_level: 80.0,
                ..EnvironmentMetrics::default()
            }),
            now,
        );
        assert_eq!(session.mirror().timer_view().unwrap().urgency, TimerUrgency::Urgent);
        assert_eq!(session.mirror().metrics().unwrap().energy_level, 80.0);
        assert!(session.presenter().banners().is_empty());
    }

    #[test]
    fn correct_cabling_emits_and_opens_modal_after_delay() {
        let mut session = session();
        for left in LeftNode::ALL {
            session.connect_cable(left, left.expected_target());
        }
        let now = Instant::now();
        assert!(session.validate_cables(now).is_correct());
        assert_eq!(
            session.sink(),
            &vec![ClientIntent::Action(PuzzleIntent::ConnectCables { correct: true })]
        );
        assert!(!session.tick(now + Duration::from_secs(1)).energy_modal_opened);
        assert!(session.tick(now + Duration::from_secs(3)).energy_modal_opened);
        assert!(session.energy().modal_open());
        session.close_modal();
        assert!(!session.energy().modal_open());
    }

    #[test]
    fn chemistry_actions_emit_adjustments() {
        let mut session = session();
        let lime = session.add_lime();
        assert_eq!(lime.value, 5.8);
        session.activate_aerator();
        assert_eq!(
            session.sink(),
            &vec![
                ClientIntent::Action(PuzzleIntent::AdjustPh { value: 5.8 }),
                ClientIntent::Action(PuzzleIntent::AdjustO2 { value: 3.7 }),
            ]
        );
        let guess = session.validate_chemical(Instant::now()).unwrap();
        assert!(!guess.is_correct());
        assert_eq!(session.presenter().banners()[0].kind, BannerKind::Error);
    }

    #[test]
    fn water_completion_event_schedules_modal_and_banner() {
        let mut session = session();
        let now = Instant::now();
        session.start(now);
        session.handle_event(&ServerEvent::PuzzleCompleted { room: "Eau".into() }, now);
        assert_eq!(
            session.last_verdict(),
            Some(&ServerVerdict::RoomCompleted("Eau".into()))
        );
        let first = session.tick(now);
        assert_eq!(first.confetti, 50);
        assert!(!first.water_modal_opened);
        assert!(session.tick(now + Duration::from_secs(3)).water_modal_opened);
    }

    #[test]
    fn only_the_latest_verdict_is_kept() {
        let mut session = session();
        let now = Instant::now();
        assert_eq!(session.last_verdict(), None);
        session.handle_event(&ServerEvent::TimerUpdate { remaining: 500 }, now);
        assert_eq!(session.last_verdict(), None);
        for room in ["Energie", "Eau", "Air"] {
            session.handle_event(&ServerEvent::RoomUnlocked { room: room.into() }, now);
        }
        assert_eq!(
            session.last_verdict(),
            Some(&ServerVerdict::RoomUnlocked("Air".into()))
        );
        session.handle_event(&ServerEvent::Feedback { message: "ok".into() }, now);
        assert_eq!(
            session.last_verdict().and_then(ServerVerdict::room),
            Some(Room::Air)
        );
    }

    #[test]
    fn pollution_attempts_count_up() {
        let mut session = session();
        session.identify_pollution_source("traffic", false);
        session.identify_pollution_source("factory", true);
        assert_eq!(
            session.sink().last(),
            Some(&ClientIntent::Action(PuzzleIntent::IdentifyPollutionSource {
                source: "factory".into(),
                correct: true,
                attempts: 2
            }))
        );
    }

    #[test]
    fn voice_without_recognizer_only_notifies() {
        let mut session = session();
        let now = Instant::now();
        assert_eq!(session.start_voice_input(now), None);
        assert_eq!(
            session.presenter().banners()[0].text,
            "Speech recognition not supported"
        );
        assert!(session.sink().is_empty());
    }

    #[test]
    fn empty_chat_draft_is_refused_locally() {
        let mut session = session();
        let now = Instant::now();
        assert_eq!(session.submit_chat("   ", now), None);
        assert_eq!(
            session.submit_chat(" hi ", now),
            Some(ChatRequest::Submit("hi".into()))
        );
    }

    struct Recorder(Arc<parking_lot::Mutex<Vec<String>>>);

    impl SpeechOutput for Recorder {
        fn speak(&mut self, line: &str) -> Result<(), SpeechError> {
            self.0.lock().push(line.to_string());
            Ok(())
        }
    }

    #[test]
    fn incoming_chat_is_spoken_when_enabled() {
        let spoken = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut session = GameSession::new(
            ClientConfig::builtin(),
            "ada",
            Vec::new(),
            SmallRng::seed_from_u64(5),
            Speech::none().with_output(Box::new(Recorder(Arc::clone(&spoken)))),
        );
        let now = Instant::now();
        assert!(session.toggle_speech(now));
        session.apply_chat(
            ChatUpdate::Messages(vec![
                ChatMessage {
                    id: 1,
                    username: "bob".into(),
                    message: "pH is 7".into(),
                    timestamp: "2025-01-01T10:00:00".into(),
                },
                ChatMessage {
                    id: 2,
                    username: "ada".into(),
                    message: "thanks".into(),
                    timestamp: "2025-01-01T10:00:01".into(),
                },
            ]),
            now,
        );
        assert_eq!(*spoken.lock(), vec!["bob says: pH is 7".to_string()]);
        assert_eq!(session.chat().messages().len(), 2);
    }

    #[test]
    fn defeat_overlay_returns_home() {
        let mut session = session();
        session.handle_event(&ServerEvent::Defeat(EnvironmentMetrics::default()), Instant::now());
        assert_eq!(session.last_verdict(), Some(&ServerVerdict::GameLost));
        assert_eq!(session.return_from_overlay(), Some(NavTarget::Home));
    }
}
