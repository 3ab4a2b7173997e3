use std::{fs, path::Path};

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
mod services;
mod settings;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Create a staff account, or promote an existing user, with a password.
    CreateAdmin {
        #[arg(long)]
        telegram_id: i64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let settings = settings::Settings::new(&args.config)?;

    init_logging(&args.log4rs)?;
    log::info!("Starting tap rewards service.");

    let conn = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await?;

    sqlx::migrate!("./migrations").run(&conn).await?;
    log::info!("Database migrations applied.");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => services::start_services(conn, settings).await?,
        Command::CreateAdmin {
            telegram_id,
            username,
            password,
        } => {
            let repository = repositories::users::UserRepository::new(conn);
            let admin = repository
                .upsert_admin(telegram_id, &username, &utils::hash_password(&password))
                .await?;
            log::info!("Admin account {} ({}) is ready.", admin.telegram_id, admin.username);
        }
    }

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
