//! Turns server outcome events into banners, overlays and navigation.

use std::time::Instant;

use eco_proto::{EnvironmentMetrics, Room, ServerEvent};

use crate::config::PresenterConfig;
use crate::mirror::{clamp_display, MetricKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A message waiting to become a banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: BannerKind,
    pub text: String,
}

impl Notice {
    pub fn new(kind: BannerKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub id: u64,
    pub kind: BannerKind,
    pub text: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    Victory(EnvironmentMetrics),
    Defeat(EnvironmentMetrics),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRow {
    pub label: &'static str,
    pub value: u8,
    pub favorable: bool,
}

impl Overlay {
    pub fn title(&self) -> &'static str {
        match self {
            Overlay::Victory(_) => "VICTORY!",
            Overlay::Defeat(_) => "DEFEAT",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Overlay::Victory(_) => "You saved the ecosystem!",
            Overlay::Defeat(_) => "The ecosystem could not be saved...",
        }
    }

    /// Final metrics. Victory rows are always favorable; defeat rows are
    /// judged against the halfway mark.
    pub fn rows(&self) -> Vec<OverlayRow> {
        let (metrics, victory) = match self {
            Overlay::Victory(metrics) => (metrics, true),
            Overlay::Defeat(metrics) => (metrics, false),
        };
        MetricKind::ALL
            .iter()
            .map(|kind| {
                let raw = kind.read(metrics);
                let favorable = victory
                    || if kind.lower_is_better() {
                        raw <= 50.0
                    } else {
                        raw >= 50.0
                    };
                OverlayRow {
                    label: kind.label(),
                    value: clamp_display(raw).round() as u8,
                    favorable,
                }
            })
            .collect()
    }

    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![self.title().to_string(), self.subtitle().to_string()];
        lines.extend(self.rows().into_iter().map(|row| {
            format!(
                "{}: {}%{}",
                row.label,
                row.value,
                if row.favorable { "" } else { " (!)" }
            )
        }));
        lines
    }
}

/// Pages the client can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    Home,
    FinalCode,
    Victory,
    Login,
}

impl NavTarget {
    pub fn path(self) -> &'static str {
        match self {
            NavTarget::Home => "/",
            NavTarget::FinalCode => "/final_code",
            NavTarget::Victory => "/victory",
            NavTarget::Login => "/login",
        }
    }
}

#[derive(Debug)]
pub struct Presenter {
    banners: Vec<Banner>,
    overlay: Option<Overlay>,
    redirect: Option<(Instant, NavTarget)>,
    confetti: u32,
    next_banner_id: u64,
    config: PresenterConfig,
}

impl Presenter {
    pub fn new(config: PresenterConfig) -> Self {
        Self {
            banners: Vec::new(),
            overlay: None,
            redirect: None,
            confetti: 0,
            next_banner_id: 1,
            config,
        }
    }

    /// Show a banner. An identical active banner is refreshed instead of
    /// stacked.
    pub fn notify(&mut self, notice: Notice, now: Instant) {
        let expires_at = now + self.config.banner_duration();
        if let Some(existing) = self
            .banners
            .iter_mut()
            .find(|banner| banner.kind == notice.kind && banner.text == notice.text)
        {
            existing.expires_at = expires_at;
            return;
        }
        let id = self.next_banner_id;
        self.next_banner_id += 1;
        tracing::debug!(
            target: "eco_quest::presenter",
            id,
            kind = ?notice.kind,
            text = %notice.text,
            "banner.shown"
        );
        self.banners.push(Banner {
            id,
            kind: notice.kind,
            text: notice.text,
            expires_at,
        });
    }

    /// React to one server push.
    pub fn handle(&mut self, event: &ServerEvent, now: Instant) {
        match event {
            ServerEvent::Feedback { message } => {
                self.notify(Notice::new(BannerKind::Info, message.clone()), now);
            }
            ServerEvent::PuzzleCompleted { room } => {
                self.notify(
                    Notice::new(BannerKind::Success, format!("Room {room} puzzle solved!")),
                    now,
                );
                self.confetti += self.config.completion_confetti();
                if Room::from_wire(room) == Some(Room::Water) {
                    self.notify(
                        Notice::new(
                            BannerKind::Success,
                            "The river is purified! Flow restored to the other rooms.",
                        ),
                        now,
                    );
                }
            }
            ServerEvent::RoomUnlocked { room } => {
                self.notify(
                    Notice::new(BannerKind::Success, format!("Room {room} unlocked!")),
                    now,
                );
            }
            ServerEvent::GameOver { message } => {
                self.notify(Notice::new(BannerKind::Warning, message.clone()), now);
            }
            ServerEvent::Victory(metrics) => {
                self.overlay = Some(Overlay::Victory(*metrics));
                self.confetti += self.config.victory_confetti();
            }
            ServerEvent::Defeat(metrics) => {
                self.overlay = Some(Overlay::Defeat(*metrics));
            }
            ServerEvent::Error { message } => {
                self.notify(Notice::new(BannerKind::Error, message.clone()), now);
            }
            ServerEvent::RedirectToFinal => {
                self.notify(
                    Notice::new(BannerKind::Success, "Redirecting to the final code..."),
                    now,
                );
                self.schedule(NavTarget::FinalCode, now + self.config.final_code_redirect());
            }
            ServerEvent::VictoryAchieved { validator, .. } => {
                self.notify(
                    Notice::new(
                        BannerKind::Success,
                        format!("{validator} found the secret code! Redirecting..."),
                    ),
                    now,
                );
                self.schedule(NavTarget::Victory, now + self.config.victory_redirect());
            }
            ServerEvent::GameReset { message } => {
                self.notify(Notice::new(BannerKind::Warning, message.clone()), now);
                self.schedule(NavTarget::Login, now + self.config.reset_redirect());
            }
            ServerEvent::RoomSelected { room } => {
                self.notify(
                    Notice::new(BannerKind::Info, format!("You joined room {room}")),
                    now,
                );
            }
            ServerEvent::TimerUpdate { .. } | ServerEvent::StateUpdate(_) => {}
        }
    }

    fn schedule(&mut self, target: NavTarget, at: Instant) {
        tracing::info!(
            target: "eco_quest::presenter",
            path = target.path(),
            "redirect.scheduled"
        );
        self.redirect = Some((at, target));
    }

    /// Drop banners whose display time has passed.
    pub fn expire(&mut self, now: Instant) {
        self.banners.retain(|banner| banner.expires_at > now);
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// The overlay's only interaction: dismiss it and head back to the lobby.
    pub fn return_from_overlay(&mut self) -> Option<NavTarget> {
        self.overlay.take().map(|_| NavTarget::Home)
    }

    /// Yields the pending redirect once it is due.
    pub fn poll_redirect(&mut self, now: Instant) -> Option<NavTarget> {
        match self.redirect {
            Some((at, target)) if now >= at => {
                self.redirect = None;
                Some(target)
            }
            _ => None,
        }
    }

    /// Confetti pieces requested since the last call.
    pub fn take_confetti(&mut self) -> u32 {
        std::mem::take(&mut self.confetti)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn presenter() -> Presenter {
        Presenter::new(PresenterConfig::default())
    }

    #[test]
    fn banners_expire_after_three_seconds() {
        let mut presenter = presenter();
        let now = Instant::now();
        presenter.handle(
            &ServerEvent::Error {
                message: "Room locked".into(),
            },
            now,
        );
        assert_eq!(presenter.banners()[0].kind, BannerKind::Error);
        assert_eq!(presenter.banners()[0].text, "Room locked");
        presenter.expire(now + Duration::from_millis(2_999));
        assert_eq!(presenter.banners().len(), 1);
        presenter.expire(now + Duration::from_secs(3));
        assert!(presenter.banners().is_empty());
    }

    #[test]
    fn identical_banner_is_refreshed_not_stacked() {
        let mut presenter = presenter();
        let now = Instant::now();
        let notice = Notice::new(BannerKind::Info, "hello");
        presenter.notify(notice.clone(), now);
        presenter.notify(notice, now + Duration::from_secs(2));
        assert_eq!(presenter.banners().len(), 1);
        presenter.expire(now + Duration::from_secs(4));
        assert_eq!(presenter.banners().len(), 1);
    }

    #[test]
    fn redirect_to_final_fires_once_after_two_seconds() {
        let mut presenter = presenter();
        let now = Instant::now();
        presenter.handle(&ServerEvent::RedirectToFinal, now);
        assert_eq!(presenter.poll_redirect(now + Duration::from_millis(1_999)), None);
        assert_eq!(
            presenter.poll_redirect(now + Duration::from_secs(2)),
            Some(NavTarget::FinalCode)
        );
        assert_eq!(presenter.poll_redirect(now + Duration::from_secs(5)), None);
    }

    #[test]
    fn victory_achieved_names_validator() {
        let mut presenter = presenter();
        let now = Instant::now();
        presenter.handle(
            &ServerEvent::VictoryAchieved {
                validator: "Ada".into(),
                message: None,
            },
            now,
        );
        insta::assert_snapshot!(
            presenter.banners()[0].text,
            @"Ada found the secret code! Redirecting..."
        );
        assert_eq!(
            presenter.poll_redirect(now + Duration::from_secs(3)),
            Some(NavTarget::Victory)
        );
    }

    #[test]
    fn game_reset_sends_players_to_login() {
        let mut presenter = presenter();
        let now = Instant::now();
        presenter.handle(
            &ServerEvent::GameReset {
                message: "The game was reset".into(),
            },
            now,
        );
        assert_eq!(
            presenter.poll_redirect(now + Duration::from_secs(2)),
            Some(NavTarget::Login)
        );
    }

    #[test]
    fn water_completion_adds_river_banner_and_confetti() {
        let mut presenter = presenter();
        presenter.handle(
            &ServerEvent::PuzzleCompleted { room: "Eau".into() },
            Instant::now(),
        );
        assert_eq!(presenter.banners().len(), 2);
        assert_eq!(presenter.take_confetti(), 50);
        assert_eq!(presenter.take_confetti(), 0);
    }

    #[test]
    fn defeat_overlay_judges_against_halfway() {
        let mut presenter = presenter();
        presenter.handle(
            &ServerEvent::Defeat(EnvironmentMetrics {
                energy_level: 62.4,
                water_pollution: 71.0,
                air_co2: 50.0,
                air_o2: 12.0,
                flora_health: 120.0,
            }),
            Instant::now(),
        );
        let lines = presenter.overlay().unwrap().render_lines();
        insta::assert_snapshot!(lines.join("\n"), @r###"
        DEFEAT
        The ecosystem could not be saved...
        Energy: 62%
        Water pollution: 71% (!)
        Air CO2: 50%
        Air O2: 12% (!)
        Flora health: 100%
        "###);
        assert_eq!(presenter.return_from_overlay(), Some(NavTarget::Home));
        assert!(presenter.overlay().is_none());
        assert_eq!(presenter.return_from_overlay(), None);
    }

    #[test]
    fn victory_overlay_bursts_confetti() {
        let mut presenter = presenter();
        presenter.handle(&ServerEvent::Victory(EnvironmentMetrics::default()), Instant::now());
        assert!(matches!(presenter.overlay(), Some(Overlay::Victory(_))));
        assert!(presenter.overlay().unwrap().rows().iter().all(|row| row.favorable));
        assert_eq!(presenter.take_confetti(), 100);
    }
}
