use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use canvas::camera::Point;
use canvas::doc::{BoardId, ElementDraft, ElementKind};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use vibeboard::clock::SystemClock;
use vibeboard::config::{RelayConfig, SyncConfig};
use vibeboard::routes::{self, RelayState};
use vibeboard::services::identity::{self, Actor, AuthenticatedUser, FileLocalStore};
use vibeboard::services::persistence::PgElementStore;
use vibeboard::services::runner::{SessionHandle, spawn_session};
use vibeboard::state::{BoardSession, SessionDeps, SessionError};
use vibeboard::transport::ws::WsTransport;

/// How long `post` waits for its broadcast to reach the relay after closing.
const FLUSH_WAIT: Duration = Duration::from_secs(2);

/// Snapshot polling interval for `watch`.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "vibeboard", about = "Whiteboard sync relay and headless board client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the websocket relay.
    Relay {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Join a board and log what peers do until interrupted.
    Watch(BoardArgs),
    /// Join a board, create one sticky note, and leave.
    Post {
        #[command(flatten)]
        board: BoardArgs,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        #[arg(long)]
        content: Option<String>,
    },
}

#[derive(Args, Debug)]
struct BoardArgs {
    #[arg(long)]
    board: BoardId,
    #[arg(long, env = "VIBEBOARD_RELAY_URL", default_value = "ws://127.0.0.1:3000")]
    relay_url: String,
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    /// Where the anonymous id is kept between runs.
    #[arg(long, env = "VIBEBOARD_IDENTITY_FILE", default_value = ".vibeboard-identity.json")]
    identity_file: PathBuf,
    #[arg(long, env = "VIBEBOARD_USER_ID")]
    user_id: Option<String>,
    #[arg(long, env = "VIBEBOARD_USER_NAME")]
    user_name: Option<String>,
    #[arg(long, env = "VIBEBOARD_USER_EMAIL")]
    user_email: Option<String>,
}

impl BoardArgs {
    fn actor(&self) -> Actor {
        let user = self.user_id.as_ref().map(|id| AuthenticatedUser {
            id: id.clone(),
            name: self.user_name.clone(),
            email: self.user_email.clone(),
        });
        identity::resolve(user.as_ref(), &FileLocalStore::new(&self.identity_file))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "vibeboard failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Relay { port } => relay(port).await,
        Command::Watch(args) => watch(args).await,
        Command::Post { board, x, y, content } => post(board, Point::new(x, y), content).await,
    }
}

async fn relay(port: Option<u16>) -> Result<(), CliError> {
    let mut config = RelayConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    let app = routes::app(RelayState::new(&config));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!(port = config.port, "vibeboard relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Open a board session against Postgres and the relay.
async fn join(args: &BoardArgs) -> Result<(SessionHandle, Arc<WsTransport>), CliError> {
    let config = SyncConfig::from_env();
    let pool = vibeboard::db::init_pool(&args.database_url).await?;
    let transport = Arc::new(WsTransport::new(args.relay_url.clone(), config.inbound_capacity));
    let deps = SessionDeps {
        transport: transport.clone(),
        store: Arc::new(PgElementStore::new(pool)),
        clock: Arc::new(SystemClock),
    };
    let actor = args.actor();
    info!(actor = %actor.id, name = %actor.display_name, "joining board");

    let session = BoardSession::open(args.board, actor, config, deps).await?;
    let (handle, _task) = spawn_session(session, config.inbound_capacity);
    Ok((handle, transport))
}

async fn watch(args: BoardArgs) -> Result<(), CliError> {
    let (handle, transport) = join(&args).await?;
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);
    let mut last = (usize::MAX, usize::MAX);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = handle.snapshot().await?;
                let counts = (snap.elements.len(), snap.cursors.len());
                if counts != last {
                    let peers: Vec<&str> = snap.cursors.iter().map(|c| c.display_name.as_str()).collect();
                    info!(elements = counts.0, cursors = counts.1, ?peers, "board changed");
                    last = counts;
                }
                for notice in handle.take_notices().await? {
                    warn!(code = notice.code, "{}", notice.message);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.close().await?;
    transport.drain(FLUSH_WAIT).await;
    Ok(())
}

async fn post(args: BoardArgs, position: Point, content: Option<String>) -> Result<(), CliError> {
    let (handle, transport) = join(&args).await?;
    let mut draft = ElementDraft::new(ElementKind::Postit, position);
    if let Some(content) = content {
        draft = draft.with_content(content);
    }

    let created = handle.create_element(draft).await;
    handle.close().await?;
    transport.drain(FLUSH_WAIT).await;

    let element = created?;
    info!(id = %element.id, x = element.position.x, y = element.position.y, "sticky note created");
    Ok(())
}
