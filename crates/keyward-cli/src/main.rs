//! Keyward - identity store and directory credential verification
//!
//! Operator entry point: loads configuration, wires the configured user
//! store and verifiers together and runs one command.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CommandContext, CommandOutcome};
use keyward_core::config::LoggingConfig;
use keyward_core::KeywardConfig;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "keyward")]
#[command(author = "Keyward Team")]
#[command(version = keyward_core::VERSION)]
#[command(
    about = "Identity store with directory-backed credential verification",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KEYWARD_CONFIG")]
    config: Option<String>,

    /// Identities directory of the flat-file store
    #[arg(long, global = true, env = "KEYWARD_IDENTITIES_DIR")]
    identities_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "KEYWARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a user's password
    Verify {
        /// User id or email address
        identifier: String,

        /// Read the password from stdin instead of KEYWARD_PASSWORD
        #[arg(long)]
        password_stdin: bool,
    },

    /// Find the user whose attribute has a value
    Find {
        /// Record path, e.g. email or userinfo.name
        attribute: String,
        value: String,
    },

    /// Print a user record with secret fields removed
    Show {
        uid: String,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Hash a password for a local user record
    HashPassword {
        /// Read the password from stdin instead of KEYWARD_PASSWORD
        #[arg(long)]
        password_stdin: bool,
    },

    /// Validate the configuration
    CheckConfig {
        /// Also open and release a directory connection
        #[arg(long)]
        connect: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => KeywardConfig::from_file(path),
        None => Ok(KeywardConfig::from_env()),
    };

    let logging = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    init_logging(&cli, &logging);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(critical = true, "{}", e);
            return ExitCode::from(2);
        }
    };

    if let Some(dir) = &cli.identities_dir {
        config.store.identities_dir = dir.into();
    }

    match run(cli.command, config).await {
        Ok(CommandOutcome::Success) => ExitCode::SUCCESS,
        Ok(CommandOutcome::Negative) => ExitCode::from(1),
        Err(e) => {
            let critical = e
                .downcast_ref::<keyward_core::Error>()
                .map(|e| e.is_fatal())
                .unwrap_or(false);
            if critical {
                error!(critical = true, "{:#}", e);
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr; stdout carries command output.
    if cli.log_json || logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

async fn run(command: Commands, config: KeywardConfig) -> anyhow::Result<CommandOutcome> {
    match command {
        Commands::HashPassword { password_stdin } => {
            commands::hash::execute(password_stdin).await
        }
        Commands::CheckConfig { connect } => commands::check::execute(&config, connect).await,
        Commands::Verify {
            identifier,
            password_stdin,
        } => {
            let ctx = CommandContext::from_config(config)?;
            commands::verify::execute(&ctx, &identifier, password_stdin).await
        }
        Commands::Find { attribute, value } => {
            let ctx = CommandContext::from_config(config)?;
            commands::find::execute(&ctx, &attribute, &value).await
        }
        Commands::Show { uid, json } => {
            let ctx = CommandContext::from_config(config)?;
            commands::show::execute(&ctx, &uid, json).await
        }
    }
}
