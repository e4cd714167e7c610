use chrono::Utc;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pustaka::services::loan_service;
use pustaka::{config, db, seed, server};

/// School library service
///
/// Serves the catalog and circulation API. Maintenance subcommands run
/// against the same database and exit.
#[derive(Parser, Debug)]
#[command(name = "pustaka", version)]
#[command(about = "School library: catalog, members and loans", long_about = None)]
struct Cli {
    /// Database URL, overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Listen port, overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Mark borrowed loans past their due date as overdue
    CheckOverdue,
    /// Insert demo users, books and loans
    Seed,
    /// Recompute every book's available copies from its active loans
    Reconcile,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pustaka=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = config::Config::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let db = match db::init_db(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    let outcome = match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(db, &config).await.map_err(|e| e.to_string())
        }
        Command::CheckOverdue => loan_service::sweep_overdue(&db, Utc::now())
            .await
            .map(|n| println!("{} loans marked as overdue", n))
            .map_err(|e| e.to_string()),
        Command::Seed => seed::seed_demo_data(&db)
            .await
            .map(|inserted| {
                if inserted {
                    println!("Demo data seeded");
                } else {
                    println!("Demo data already present");
                }
            })
            .map_err(|e| e.to_string()),
        Command::Reconcile => loan_service::reconcile_availability(&db)
            .await
            .map(|n| println!("Availability corrected for {} books", n))
            .map_err(|e| e.to_string()),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        process::exit(1);
    }
}
