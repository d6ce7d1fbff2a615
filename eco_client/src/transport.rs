//! Persistent event channel to the game server.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use eco_proto::{
    decode_frame_payload, encode_frame, frame_len, ClientIntent, EventFrame, FrameError,
    ServerEvent,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("event channel i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Where controllers hand their intents. Delivery is at most once.
pub trait IntentSink {
    fn emit(&mut self, intent: ClientIntent);
}

impl IntentSink for Vec<ClientIntent> {
    fn emit(&mut self, intent: ClientIntent) {
        self.push(intent);
    }
}

/// Cloneable sending side of the event channel.
#[derive(Debug, Clone)]
pub struct EventChannelHandle {
    intents: UnboundedSender<ClientIntent>,
}

impl EventChannelHandle {
    pub fn new(intents: UnboundedSender<ClientIntent>) -> Self {
        Self { intents }
    }
}

impl IntentSink for EventChannelHandle {
    fn emit(&mut self, intent: ClientIntent) {
        let name = intent.name();
        match self.intents.send(intent) {
            Ok(()) => tracing::debug!(target: "eco_quest::transport", intent = name, "intent.queued"),
            Err(_) => tracing::warn!(
                target: "eco_quest::transport",
                intent = name,
                "intent.dropped"
            ),
        }
    }
}

/// Fan-out of decoded server events, by name or as one ordered stream.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    by_name: Mutex<AHashMap<&'static str, Vec<UnboundedSender<ServerEvent>>>>,
    all: Mutex<Vec<UnboundedSender<ServerEvent>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive only events named `name` (e.g. `"timer_update"`).
    pub fn subscribe(&self, name: &'static str) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        self.by_name.lock().entry(name).or_default().push(tx);
        rx
    }

    /// Receive every event in arrival order.
    pub fn subscribe_all(&self) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        self.all.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, pruning closed ones. Returns the
    /// number of deliveries.
    pub fn publish(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        if let Some(senders) = self.by_name.lock().get_mut(event.name()) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            delivered += senders.len();
        }
        let mut all = self.all.lock();
        all.retain(|tx| tx.send(event.clone()).is_ok());
        delivered + all.len()
    }
}

/// A running event channel: the intent handle, the subscriber registry, and
/// the background connection task.
pub struct EventChannel {
    handle: EventChannelHandle,
    registry: Arc<SubscriberRegistry>,
    task: JoinHandle<()>,
}

impl EventChannel {
    pub fn handle(&self) -> EventChannelHandle {
        self.handle.clone()
    }

    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Connect to `endpoint` in the background, greeting the server as
/// `username` on every (re)connect.
pub fn start_event_channel(
    endpoint: String,
    username: String,
    reconnect_delay: Duration,
) -> EventChannel {
    let (intent_tx, intent_rx) = unbounded_channel();
    let registry = Arc::new(SubscriberRegistry::new());
    let task = tokio::spawn(run_connection_loop(
        endpoint,
        username,
        reconnect_delay,
        Arc::clone(&registry),
        intent_rx,
    ));
    EventChannel {
        handle: EventChannelHandle::new(intent_tx),
        registry,
        task,
    }
}

async fn run_connection_loop(
    endpoint: String,
    username: String,
    reconnect_delay: Duration,
    registry: Arc<SubscriberRegistry>,
    mut intents: UnboundedReceiver<ClientIntent>,
) {
    loop {
        match TcpStream::connect(&endpoint).await {
            Ok(stream) => {
                tracing::info!(target: "eco_quest::transport", %endpoint, "channel.connected");
                if let Err(err) = stream.set_nodelay(true) {
                    tracing::warn!(target: "eco_quest::transport", error = %err, "channel.nodelay_failed");
                }
                let (mut reader, mut writer) = stream.into_split();
                if let Err(err) = write_frame(&mut writer, &EventFrame::hello(&username)).await {
                    tracing::warn!(target: "eco_quest::transport", error = %err, "channel.hello_failed");
                } else {
                    let outcome = tokio::select! {
                        result = pump_events(&mut reader, &registry) => result.map(|_| true),
                        result = pump_intents(&mut writer, &mut intents) => result,
                    };
                    match outcome {
                        Ok(false) => {
                            tracing::info!(target: "eco_quest::transport", "channel.closed_by_client");
                            return;
                        }
                        Ok(true) => {
                            tracing::warn!(target: "eco_quest::transport", "channel.closed_by_server");
                        }
                        Err(err) => {
                            tracing::warn!(target: "eco_quest::transport", error = %err, "channel.failed");
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(target: "eco_quest::transport", %endpoint, error = %err, "channel.connect_failed");
            }
        }
        tracing::info!(
            target: "eco_quest::transport",
            delay_ms = reconnect_delay.as_millis() as u64,
            "channel.reconnecting"
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

pub async fn write_frame<W>(writer: &mut W, frame: &EventFrame) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    Ok(())
}

/// Read one frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = frame_len(len_buf)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Decode incoming frames and publish them until the stream ends.
/// Frames that fail to decode are skipped; the connection stays up.
pub async fn pump_events<R>(
    reader: &mut R,
    registry: &SubscriberRegistry,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    while let Some(payload) = read_frame(reader).await? {
        let frame = match decode_frame_payload(&payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(target: "eco_quest::transport", error = %err, "frame.malformed");
                continue;
            }
        };
        match ServerEvent::from_frame(frame) {
            Ok(event) => {
                tracing::trace!(target: "eco_quest::transport", event = event.name(), "event.received");
                registry.publish(&event);
            }
            Err(FrameError::UnknownEvent(name)) => {
                tracing::debug!(target: "eco_quest::transport", event = %name, "event.unknown");
            }
            Err(err) => {
                tracing::warn!(target: "eco_quest::transport", error = %err, "event.invalid");
            }
        }
    }
    Ok(())
}

/// Forward queued intents to the server. Returns `Ok(false)` once every
/// handle has been dropped. A failed write loses that intent.
pub async fn pump_intents<W>(
    writer: &mut W,
    intents: &mut UnboundedReceiver<ClientIntent>,
) -> Result<bool, TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(intent) = intents.recv().await {
        let frame = match intent.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(target: "eco_quest::transport", intent = intent.name(), error = %err, "intent.encode_failed");
                continue;
            }
        };
        if let Err(err) = write_frame(writer, &frame).await {
            tracing::warn!(target: "eco_quest::transport", intent = intent.name(), error = %err, "intent.send_failed");
            return Err(err);
        }
        tracing::debug!(target: "eco_quest::transport", intent = intent.name(), "intent.emitted");
    }
    Ok(false)
}
