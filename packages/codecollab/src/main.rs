use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{delete, get, post},
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod auth;
mod config;
mod db;
mod handlers;
mod identity;
mod metrics;
mod models;
mod repository;
mod ws;

use crate::auth::IdentityResolver;
use crate::config::CollabConfig;
use crate::db::Database;
use crate::identity::TokenKey;
use crate::metrics::ServerMetrics;
use crate::models::UserId;
use crate::repository::CollabRepository;
use crate::ws::router::EventRouter;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "codecollab")]
#[command(about = "Collaborative code room server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.codecollab)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in the foreground
    Server(ServerArgs),

    /// Create a user account
    CreateUser(CreateUserArgs),

    /// Mint a signed access token for a user
    IssueToken(IssueTokenArgs),
}

#[derive(Parser)]
struct ServerArgs {
    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the server
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct CreateUserArgs {
    /// Unique username
    username: String,

    /// Unique email address
    email: String,
}

#[derive(Parser)]
struct IssueTokenArgs {
    /// User id the token authenticates as
    #[arg(long)]
    user_id: i64,

    /// Validity window in seconds (default from config)
    #[arg(long)]
    ttl_secs: Option<i64>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub repository: CollabRepository,
    pub resolver: Arc<IdentityResolver>,
    pub router: Arc<EventRouter>,
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let config = CollabConfig::new(cli.data_dir, None, None)?;
            run_server(false, config).await
        }
        Some(Commands::Server(args)) => {
            let config = CollabConfig::new(cli.data_dir, args.host, args.port)?;
            run_server(args.debug, config).await
        }
        Some(Commands::CreateUser(args)) => {
            let config = CollabConfig::new(cli.data_dir, None, None)?;
            create_user_command(&config, args).await
        }
        Some(Commands::IssueToken(args)) => {
            let config = CollabConfig::new(cli.data_dir, None, None)?;
            issue_token_command(&config, args).await
        }
    }
}

async fn create_user_command(config: &CollabConfig, args: CreateUserArgs) -> Result<()> {
    let db = Database::new(config).await?;
    let repository = CollabRepository::new(db.pool.clone());

    let user = repository.create_user(&args.username, &args.email).await?;
    println!("Created user {} (id {})", user.username, user.id);
    Ok(())
}

async fn issue_token_command(config: &CollabConfig, args: IssueTokenArgs) -> Result<()> {
    let db = Database::new(config).await?;
    let repository = CollabRepository::new(db.pool.clone());

    let user = repository
        .get_user(UserId(args.user_id))
        .await?
        .with_context(|| format!("No user with id {}", args.user_id))?;

    let key = TokenKey::load_or_generate(&config.key_path)?;
    let ttl = args.ttl_secs.unwrap_or(config.token_ttl_secs);
    let now = chrono::Utc::now().timestamp();
    let token = codecollab_auth::AccessToken::issue(key.signing_key(), user.id.0, now, ttl);

    println!("{}", token.encode());
    Ok(())
}

async fn run_server(debug: bool, config: CollabConfig) -> Result<()> {
    // Setup logging
    let default_directive = if debug {
        "codecollab=debug,tower_http=debug,info"
    } else {
        "codecollab=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting CodeCollab server");

    let db = Database::new(&config).await?;
    let repository = CollabRepository::new(db.pool.clone());

    let key = TokenKey::load_or_generate(&config.key_path)?;
    info!("Token verification key: {}", key.public_key);
    let resolver = Arc::new(IdentityResolver::new(key.public_key, repository.clone()));

    let metrics = Arc::new(ServerMetrics::new());
    let registry = Arc::new(ws::registry::ConnectionRegistry::new());
    let router = Arc::new(EventRouter::new(
        registry,
        repository.clone(),
        metrics.clone(),
    ));

    let app_state = AppState {
        repository,
        resolver,
        router,
        metrics,
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::get_metrics))
        .route(
            "/api/rooms",
            get(handlers::rooms::list_rooms).post(handlers::rooms::create_room),
        )
        .route("/api/rooms/{id}", get(handlers::rooms::get_room))
        .route("/api/rooms/{id}", delete(handlers::rooms::delete_room))
        .route("/api/rooms/{id}/join", post(handlers::rooms::join_room))
        .route("/api/rooms/{id}/leave", post(handlers::rooms::leave_room))
        .route(
            "/api/rooms/{id}/toggle-video",
            post(handlers::rooms::toggle_video),
        )
        .route("/ws", get(handlers::websocket::websocket_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let actual_addr = listener.local_addr()?;

    info!("CodeCollab listening on http://{}", actual_addr);
    info!("  GET    /api/rooms        - List rooms");
    info!("  POST   /api/rooms        - Create room");
    info!("  GET    /api/rooms/:id    - Room details and members");
    info!("  GET    /ws?token=...     - Real-time room connection");

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")
}
