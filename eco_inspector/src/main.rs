use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use eco_client::final_code::submit_final_code;
use eco_client::{
    detect_system_speech, load_client_config, load_client_config_from_env, run_chat_worker,
    run_lobby_poller, start_event_channel, GameSession, RestClient,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

mod app;
mod ui;

use app::{InspectorApp, InspectorChannels, RestOutcome, RestRequest};

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "EcoQuest terminal client", long_about = None)]
struct Cli {
    /// Player name used to log in and to greet the event channel.
    #[arg(long)]
    username: String,
    /// Event channel address. Overrides the configured endpoint.
    #[arg(long)]
    endpoint: Option<String>,
    /// Base URL of the game's HTTP API. Overrides the configured base.
    #[arg(long)]
    http: Option<String>,
    /// Client tuning file. Falls back to `ECO_CLIENT_CONFIG_PATH`, then the
    /// built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_client_config(path),
        None => load_client_config_from_env(),
    };
    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| config.event_endpoint.clone());
    let http_base = cli.http.clone().unwrap_or_else(|| config.http_base.clone());

    let rest = RestClient::new(http_base.clone())?;
    rest.login(&cli.username)
        .await
        .map_err(|err| eyre!("login to {} failed: {}", http_base, err))?;
    info!("Logged in as {}", cli.username);

    info!("Connecting to event channel at {}", endpoint);
    let channel = start_event_channel(endpoint, cli.username.clone(), config.reconnect_delay());
    let events = channel.registry().subscribe_all();

    let (chat_request_tx, chat_request_rx) = unbounded_channel();
    let (chat_update_tx, chat_update_rx) = unbounded_channel();
    tokio::spawn(run_chat_worker(
        rest.clone(),
        config.chat.poll_interval(),
        chat_request_rx,
        chat_update_tx,
    ));

    let (lobby_tx, lobby_rx) = unbounded_channel();
    tokio::spawn(run_lobby_poller(
        rest.clone(),
        config.lobby.poll_interval(),
        lobby_tx,
    ));

    let (rest_request_tx, rest_request_rx) = unbounded_channel();
    let (rest_outcome_tx, rest_outcome_rx) = unbounded_channel();
    tokio::spawn(run_rest_pump(rest.clone(), rest_request_rx, rest_outcome_tx));

    let session = GameSession::new(
        config,
        &cli.username,
        channel.handle(),
        SmallRng::from_entropy(),
        detect_system_speech(),
    );
    let channels = InspectorChannels {
        events,
        chat_updates: chat_update_rx,
        lobby_updates: lobby_rx,
        rest_outcomes: rest_outcome_rx,
        chat_requests: chat_request_tx,
        rest_requests: rest_request_tx,
        logs: log_rx,
    };

    let ui = tokio::task::spawn_blocking(move || -> Result<()> {
        let app = InspectorApp::new(session, channels)?;
        app.run()
    });
    let outcome = ui.await?;

    info!("Inspector requested shutdown");
    channel.shutdown();
    if let Err(err) = rest.logout().await {
        warn!("Failed to log out: {}", err);
    }
    outcome
}

async fn run_rest_pump(
    rest: RestClient,
    mut requests: UnboundedReceiver<RestRequest>,
    outcomes: UnboundedSender<RestOutcome>,
) {
    while let Some(request) = requests.recv().await {
        let outcome = match request {
            RestRequest::FinalCode(code) => {
                RestOutcome::FinalCode(submit_final_code(&rest, &code).await)
            }
            RestRequest::ResetGame => RestOutcome::Reset(rest.reset_game().await),
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}
