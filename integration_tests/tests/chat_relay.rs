mod common;

use std::time::{Duration, Instant};

use eco_client::{run_chat_worker, ChatRelay, ChatRequest, ChatUpdate, GameSession, Speech};
use eco_proto::ClientIntent;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::mpsc::unbounded_channel;

#[tokio::test(start_paused = true)]
async fn worker_delivers_each_message_once() -> anyhow::Result<()> {
    let api = common::FakeChat::default();
    api.post("bob", "the pH meter is in the cabinet");

    let (request_tx, request_rx) = unbounded_channel();
    let (update_tx, mut update_rx) = unbounded_channel();
    let worker = tokio::spawn(run_chat_worker(
        api.clone(),
        Duration::from_millis(100),
        request_rx,
        update_tx,
    ));

    let mut relay = ChatRelay::new("me", 40);
    let Some(ChatUpdate::Messages(first)) = update_rx.recv().await else {
        anyhow::bail!("expected the backlog first");
    };
    relay.ingest(first);

    let text = relay.prepare_submission("  on my way  ")?;
    request_tx.send(ChatRequest::Submit(text))?;
    assert_eq!(update_rx.recv().await, Some(ChatUpdate::Sent));
    let Some(ChatUpdate::Messages(second)) = update_rx.recv().await else {
        anyhow::bail!("expected the sent message to be fetched");
    };
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].message, "on my way");
    relay.ingest(second);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(update_rx.try_recv().is_err());

    let rendered = relay.messages();
    assert_eq!(rendered.len(), 2);
    assert!(!rendered[0].own);
    assert!(rendered[1].own);
    assert_eq!(api.len(), 2);

    drop(update_rx);
    api.post("bob", "see you there");
    request_tx.send(ChatRequest::PollNow)?;
    worker.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_send_surfaces_as_banner() -> anyhow::Result<()> {
    let api = common::FakeChat {
        reject_with: Some("Message too long".into()),
        ..common::FakeChat::default()
    };
    let (request_tx, request_rx) = unbounded_channel();
    let (update_tx, mut update_rx) = unbounded_channel();
    tokio::spawn(run_chat_worker(
        api,
        Duration::from_millis(100),
        request_rx,
        update_tx,
    ));

    let mut session: GameSession<Vec<ClientIntent>> = GameSession::new(
        common::test_config(),
        "me",
        Vec::new(),
        SmallRng::seed_from_u64(3),
        Speech::none(),
    );
    let now = Instant::now();
    let request = session
        .submit_chat("hello", now)
        .ok_or_else(|| anyhow::anyhow!("draft refused"))?;
    request_tx.send(request)?;

    let update = update_rx
        .recv()
        .await
        .ok_or_else(|| anyhow::anyhow!("worker stopped"))?;
    assert_eq!(update, ChatUpdate::Failed("Message too long".into()));
    session.apply_chat(update, now);
    assert_eq!(session.presenter().banners()[0].text, "Message too long");

    assert!(session.submit_chat(&"x".repeat(41), now).is_none());
    Ok(())
}
