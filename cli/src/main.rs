use clap::{Parser, Subcommand};
use client::{ClientConfig, ClientError, RealtimeChannel, Reconnector, RoomHandler};
use frames::{InboundEvent, Message, RoomId};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("event is scoped to room {event_room}, not {room_id}")]
    RoomMismatch { room_id: RoomId, event_room: RoomId },
}

#[derive(Parser, Debug)]
#[command(name = "globechat", about = "globechat realtime relay CLI")]
struct Cli {
    #[arg(long, env = "GLOBECHAT_ORIGIN", default_value = client::config::DEFAULT_ORIGIN)]
    origin: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join a room and print each event as one JSON line.
    Watch {
        room_id: RoomId,
        #[arg(long, default_value_t = false)]
        reconnect: bool,
    },
    /// Broadcast an event to a room through the relay.
    Publish {
        room_id: RoomId,
        #[arg(long)]
        event: String,
        /// Shared secret configured on the relay as `PUBLISH_TOKEN`.
        #[arg(long, env = "GLOBECHAT_PUBLISH_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Query the relay healthcheck.
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig { origin: cli.origin, ..ClientConfig::from_env() };

    match cli.command {
        Command::Watch { room_id, reconnect } => run_watch(&config, room_id, reconnect).await,
        Command::Publish { room_id, event, token } => run_publish(&config, room_id, &event, &token).await,
        Command::Ping => run_ping(&config).await,
    }
}

// =============================================================================
// WATCH
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum WatchLine {
    Event(InboundEvent),
    Disconnected,
}

/// Forwards every callback to the printing loop on the main task.
struct EventPrinter {
    room_id: RoomId,
    tx: mpsc::UnboundedSender<WatchLine>,
}

impl RoomHandler for EventPrinter {
    fn on_new_message(&mut self, message: Message) {
        let _ = self.tx.send(WatchLine::Event(InboundEvent::new_message(message)));
    }

    fn on_delete_message(&mut self, message: Message) {
        let _ = self.tx.send(WatchLine::Event(InboundEvent::delete_message(message)));
    }

    fn on_delete_thread(&mut self) {
        let _ = self.tx.send(WatchLine::Event(InboundEvent::delete_thread(self.room_id)));
    }

    fn on_disconnect(&mut self) {
        let _ = self.tx.send(WatchLine::Disconnected);
    }
}

async fn run_watch(config: &ClientConfig, room_id: RoomId, reconnect: bool) -> Result<(), CliError> {
    let channel = RealtimeChannel::new(config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = EventPrinter { room_id, tx };
    eprintln!("watching room {room_id} on {}", channel.url());

    if reconnect {
        let handle = Reconnector::new(channel, config.reconnect).join(room_id, printer);
        print_until_done(&mut rx).await;
        handle.close();
        handle.closed().await;
    } else {
        let subscription = channel.join(room_id, printer);
        print_until_done(&mut rx).await;
        subscription.close();
        subscription.closed().await;
    }
    Ok(())
}

/// Print events until Ctrl-C or the subscription reports a disconnect.
async fn print_until_done(rx: &mut mpsc::UnboundedReceiver<WatchLine>) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted");
                return;
            }
            line = rx.recv() => match line {
                Some(WatchLine::Event(event)) => println!("{}", frames::encode(&event)),
                Some(WatchLine::Disconnected) | None => {
                    eprintln!("disconnected");
                    return;
                }
            },
        }
    }
}

// =============================================================================
// HTTP
// =============================================================================

const PUBLISH_TOKEN_HEADER: &str = "x-publish-token";

async fn run_publish(config: &ClientConfig, room_id: RoomId, event: &str, token: &str) -> Result<(), CliError> {
    let event = parse_event(room_id, event)?;
    let url = api_url(&config.origin, &format!("/rooms/{room_id}/events"))?;
    let response = reqwest::Client::new()
        .post(url)
        .header(PUBLISH_TOKEN_HEADER, token)
        .json(&event)
        .send()
        .await?;
    let body = checked_json(response).await?;
    print_json(&body)
}

async fn run_ping(config: &ClientConfig) -> Result<(), CliError> {
    let url = api_url(&config.origin, "/healthcheck")?;
    let response = reqwest::Client::new().get(url).send().await?;
    let body = checked_json(response).await?;
    print_json(&body)
}

async fn checked_json(response: reqwest::Response) -> Result<Value, CliError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::Status { status: status.as_u16(), body });
    }
    Ok(response.json::<Value>().await?)
}

fn parse_event(room_id: RoomId, raw: &str) -> Result<InboundEvent, CliError> {
    let event = serde_json::from_str::<InboundEvent>(raw)?;
    if event.room_id() != room_id {
        return Err(CliError::RoomMismatch { room_id, event_room: event.room_id() });
    }
    Ok(event)
}

fn api_url(origin: &str, path: &str) -> Result<String, CliError> {
    if !origin.starts_with("http://") && !origin.starts_with("https://") {
        return Err(CliError::InvalidOrigin(origin.to_owned()));
    }
    Ok(format!("{}/api/v1{path}", origin.trim_end_matches('/')))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
