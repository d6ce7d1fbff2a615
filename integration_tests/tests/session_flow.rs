mod common;

use std::time::{Duration, Instant};

use eco_client::energy::LeftNode;
use eco_client::water::WaterPhase;
use eco_client::{GameSession, NavTarget, ServerVerdict, Speech};
use eco_proto::{ClientIntent, EnvironmentMetrics, PuzzleIntent, ServerEvent};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn new_session() -> GameSession<Vec<ClientIntent>> {
    GameSession::new(
        common::test_config(),
        "ada",
        Vec::new(),
        SmallRng::seed_from_u64(11),
        Speech::none(),
    )
}

fn sort_visible(session: &mut GameSession<Vec<ClientIntent>>, now: Instant) -> usize {
    let items: Vec<_> = session
        .water()
        .stream()
        .positions(now)
        .into_iter()
        .map(|pos| pos.item)
        .collect();
    for item in &items {
        let guess = session.sort_waste(item.id, item.kind, now);
        assert!(guess.is_some_and(|guess| guess.is_correct()));
    }
    items.len()
}

fn water_completions(session: &GameSession<Vec<ClientIntent>>) -> usize {
    session
        .sink()
        .iter()
        .filter(|intent| {
            matches!(
                intent,
                ClientIntent::Action(PuzzleIntent::CompleteWater { .. })
            )
        })
        .count()
}

#[test]
fn energy_then_water_then_final_code() {
    let mut session = new_session();
    let start = Instant::now();
    session.start(start);

    for left in LeftNode::ALL {
        session.connect_cable(left, left.expected_target());
    }
    assert!(session.validate_cables(start).is_correct());
    assert!(session.tick(start + Duration::from_millis(150)).energy_modal_opened);
    session.close_modal();

    session.handle_event(&ServerEvent::PuzzleCompleted { room: "Energie".into() }, start);
    session.handle_event(&ServerEvent::RoomUnlocked { room: "Eau".into() }, start);
    assert_eq!(
        session.last_verdict(),
        Some(&ServerVerdict::RoomUnlocked("Eau".into()))
    );

    assert_eq!(sort_visible(&mut session, start), 5);
    assert_eq!(session.water().purity(), 25);
    assert_eq!(session.water().phase(), WaterPhase::Sorting);

    for _ in 0..7 {
        session.add_lime();
    }
    for _ in 0..9 {
        session.activate_aerator();
    }
    assert!(session.validate_chemical(start).is_some_and(|g| g.is_correct()));
    assert_eq!(session.water().purity(), 75);
    assert_eq!(session.water().phase(), WaterPhase::Chemical);

    // A second success must not stack the bonus.
    session.validate_chemical(start);
    assert_eq!(session.water().purity(), 75);

    let mut clock = start;
    for _ in 0..20 {
        if session.water().purity() == 100 {
            break;
        }
        clock += Duration::from_millis(3500);
        session.tick(clock);
        sort_visible(&mut session, clock);
    }
    assert_eq!(session.water().purity(), 100);
    assert_eq!(water_completions(&session), 1);
    assert_eq!(session.water().fish().len(), 5);

    session.handle_event(&ServerEvent::PuzzleCompleted { room: "Eau".into() }, clock);
    let tick = session.tick(clock + Duration::from_millis(150));
    assert!(tick.water_modal_opened);

    session.handle_event(&ServerEvent::RedirectToFinal, clock);
    assert_eq!(session.tick(clock + Duration::from_millis(100)).navigate, None);
    assert_eq!(
        session.tick(clock + Duration::from_millis(250)).navigate,
        Some(NavTarget::FinalCode)
    );
}

#[test]
fn wrong_moves_are_reported_but_not_decided_locally() {
    let mut session = new_session();
    let now = Instant::now();
    session.start(now);

    for left in LeftNode::ALL {
        session.connect_cable(left, eco_client::energy::RightNode::R1);
    }
    assert!(!session.validate_cables(now).is_correct());
    assert_eq!(
        session.sink().last(),
        Some(&ClientIntent::Action(PuzzleIntent::ConnectCables { correct: false }))
    );
    assert!(session.energy().connections().is_empty());
    assert_eq!(session.last_verdict(), None);

    session.handle_event(
        &ServerEvent::Feedback {
            message: "Incorrect connection".into(),
        },
        now,
    );
    assert_eq!(session.presenter().banners().len(), 1);
    session.tick(now + Duration::from_secs(1));
    assert!(session.presenter().banners().is_empty());
}

#[test]
fn defeat_overlay_and_reset_redirect() {
    let mut session = new_session();
    let now = Instant::now();
    let metrics = EnvironmentMetrics {
        energy_level: 10.0,
        water_pollution: 90.0,
        air_co2: 85.0,
        air_o2: 15.0,
        flora_health: 5.0,
    };
    session.handle_event(&ServerEvent::Defeat(metrics), now);
    assert_eq!(session.last_verdict(), Some(&ServerVerdict::GameLost));
    assert!(session.presenter().overlay().is_some());
    assert_eq!(session.return_from_overlay(), Some(NavTarget::Home));
    assert_eq!(session.return_from_overlay(), None);

    session.handle_event(
        &ServerEvent::GameReset {
            message: "The game has been reset".into(),
        },
        now,
    );
    assert_eq!(
        session.tick(now + Duration::from_millis(250)).navigate,
        Some(NavTarget::Login)
    );
}
