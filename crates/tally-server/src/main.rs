use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use tally_api::auth::AppStateInner;
use tally_gateway::dispatcher::Dispatcher;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

struct Config {
    jwt_secret: String,
    db_path: PathBuf,
    addr: SocketAddr,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("TALLY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            anyhow::bail!("TALLY_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let db_path = std::env::var("TALLY_DB_PATH").unwrap_or_else(|_| "tally.db".into());
        let host = std::env::var("TALLY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TALLY_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;

        Ok(Self {
            jwt_secret,
            db_path: db_path.into(),
            addr: format!("{}:{}", host, port).parse()?,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tally_api=debug,tally_db=debug,tally_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = tally_db::Database::open(&config.db_path)?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        dispatcher: Dispatcher::new(),
    });

    let app = tally_api::router(state);

    info!("Tally server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
