use std::path::PathBuf;

use clap::Parser;
use taskd_server::{Credentials, ServerConfig};
use taskd_store::Database;

#[derive(Parser)]
#[command(name = "taskd", about = "Minimal task-tracking web service")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9091)]
    port: u16,

    /// Path to the SQLite database. Defaults to ~/.taskd/tasks.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Basic-auth username for the /tasks routes.
    #[arg(long, env = "TASKD_AUTH_USERNAME")]
    auth_username: String,

    /// Basic-auth password for the /tasks routes.
    #[arg(long, env = "TASKD_AUTH_PASSWORD")]
    auth_password: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting taskd");

    let db_path = args
        .db
        .unwrap_or_else(|| dirs_home().join(".taskd").join("tasks.db"));
    let db = Database::open(&db_path).expect("Failed to open database");

    let credentials = Credentials::new(args.auth_username, args.auth_password);
    let config = ServerConfig::new(args.port, credentials);
    let handle = taskd_server::start(config, db)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "taskd ready");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
