mod cli;
mod config;
mod error;

use std::process;

use clap::Parser;
use gcm_sender::{Message, Notification, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    config::AppConfig,
    error::{CliError, Result},
};

/// Exit code when `check` finds an invalid registration.
const EXIT_INVALID: i32 = 2;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let config = AppConfig::load(args.config.as_deref())?.with_overrides(
        args.api_key,
        args.endpoint,
        args.timeout,
    );
    if config.sender.api_key.is_empty() {
        return Err(CliError::config(
            "no API key: pass --api-key, set GCM_API_KEY, or add it to the config file",
        ));
    }
    let sender = Sender::from_config(&config.sender)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling delivery");
            on_signal.cancel();
        }
    });

    match args.command {
        Commands::Send {
            to,
            data,
            title,
            body,
            icon,
            priority,
            ttl,
            collapse_key,
            dry_run,
            retries,
            pretty,
        } => {
            let notification = match icon {
                Some(icon) => Some(Notification {
                    title,
                    body,
                    ..Notification::new(icon)
                }),
                None if title.is_some() || body.is_some() => {
                    return Err(CliError::invalid_argument(
                        "--title and --body require --icon",
                    ));
                }
                None => None,
            };
            let message = Message {
                priority,
                time_to_live: ttl,
                collapse_key,
                dry_run: dry_run.then_some(true),
                data: data.into_iter().collect(),
                notification,
                ..Default::default()
            };
            let retries = retries.unwrap_or(config.default_retries);

            let result = sender
                .send_multicast(&message, &to, retries, &cancel)
                .await?;
            info!("{}", result);

            let output = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{output}");
            Ok(0)
        }
        Commands::Check { registration_id } => {
            if sender
                .is_registration_valid(&registration_id, &cancel)
                .await?
            {
                println!("valid");
                Ok(0)
            } else {
                println!("invalid");
                Ok(EXIT_INVALID)
            }
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
