use clap::{Parser, Subcommand};
use sheetdesk::{AppConfig, app, login};
use std::path::PathBuf;

/// Master spreadsheet web application
#[derive(Parser)]
#[command(name = "sheetdesk", version, about)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "sheetdesk.json")]
    config: PathBuf,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Print an Argon2 hash to use as a password in the user store
    HashPassword { password: String },
}

/// Main entry point for the web application
///
/// Logging goes through env_logger; set `RUST_LOG` to change the level
/// (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::HashPassword { password } => {
            println!("{}", login::hash_password(&password)?);
            Ok(())
        }
        Command::Serve => {
            let mut config = AppConfig::load(&cli.config)?;
            if let Some(bind) = cli.bind {
                config.bind = bind;
            }
            if config.users.is_empty() {
                log::warn!("no users configured; nobody can log in");
            }
            app::run(config).await
        }
    }
}
