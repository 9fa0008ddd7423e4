// ============================
// ems-backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the auth server, plus operator commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ems_backend_lib::{
    admin,
    auth::{hash_password_secure, HashParams, SessionIssuer},
    config::{LoggingSettings, Settings, DEFAULT_CONFIG_FILE},
    router,
    storage::FlatFileAccountStore,
    AppState,
};
use ems_common::Role;
use secrecy::SecretString;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroize;

/// How often expired entries are dropped from the revocation list
const REVOCATION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "ems-server", version, about = "Employee-management auth server")]
struct Cli {
    /// Configuration file (TOML); overridden by EMS_* environment variables
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the hash of a password
    HashPassword {
        /// Read from stdin when omitted
        password: Option<String>,
    },
    /// Create an account
    CreateAccount {
        #[arg(long)]
        email: String,
        /// manager or assistant
        #[arg(long)]
        role: Role,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Replace an account's password and lift any lock
    SetPassword {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear an account's failed attempts and lock
    Unlock {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&settings.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::HashPassword { password } => {
            let mut plain = password_or_stdin(password)?;
            let hash = hash_password_secure(&mut plain)?;
            println!("{hash}");
            Ok(())
        },
        Command::CreateAccount {
            email,
            role,
            password,
        } => {
            let store = open_store(&settings)?;
            let password = SecretString::from(password_or_stdin(password)?);
            admin::provision_account(&store, &email, role, &password, HashParams::recommended())
                .await?;
            println!("created {role} account {email}");
            Ok(())
        },
        Command::SetPassword { email, password } => {
            let store = open_store(&settings)?;
            let password = SecretString::from(password_or_stdin(password)?);
            admin::reset_password(&store, &email, &password, HashParams::recommended()).await?;
            println!("password updated for {email}");
            Ok(())
        },
        Command::Unlock { email } => {
            let store = open_store(&settings)?;
            admin::unlock(&store, &email).await?;
            println!("unlocked {email}");
            Ok(())
        },
    }
}

fn init_tracing(logging: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_store(settings: &Settings) -> anyhow::Result<FlatFileAccountStore> {
    FlatFileAccountStore::new(&settings.storage.path)
        .with_context(|| format!("opening store at {}", settings.storage.path.display()))
}

/// The given password, or one line read from stdin
fn password_or_stdin(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    line.zeroize();

    anyhow::ensure!(!password.is_empty(), "no password given");
    Ok(password)
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&settings)?);
    let addr = settings.bind_addr()?;

    let state = Arc::new(AppState::new(store, settings));
    let sweeper = tokio::spawn(sweep_revocations(state.sessions.clone()));
    let app = router::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // Without a signal handler the server just runs until killed
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await?;

    sweeper.abort();
    Ok(())
}

async fn sweep_revocations(sessions: Arc<dyn SessionIssuer>) {
    let mut interval = tokio::time::interval(REVOCATION_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let dropped = sessions.purge_revoked();
        if dropped > 0 {
            debug!(dropped, "expired revocations dropped");
        }
    }
}
