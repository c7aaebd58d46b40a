use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gcm_sender::Priority;

#[derive(Parser, Debug)]
#[command(name = "gcm", version, about = "Send push notifications through a GCM-style gateway")]
pub struct Args {
    /// Server API key
    #[arg(long, env = "GCM_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Gateway endpoint URL
    #[arg(long, env = "GCM_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message to one or more registrations
    Send {
        /// Recipient registration id (repeatable)
        #[arg(long = "to", required = true, num_args = 1..)]
        to: Vec<String>,

        /// Payload entry as key=value (repeatable)
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,

        /// Notification title
        #[arg(long)]
        title: Option<String>,

        /// Notification body
        #[arg(long)]
        body: Option<String>,

        /// Notification icon; required to attach a notification block
        #[arg(long)]
        icon: Option<String>,

        /// Delivery priority (normal or high)
        #[arg(long)]
        priority: Option<Priority>,

        /// Time to live in seconds
        #[arg(long)]
        ttl: Option<u32>,

        /// Collapse key
        #[arg(long)]
        collapse_key: Option<String>,

        /// Validate the request without delivering it
        #[arg(long)]
        dry_run: bool,

        /// Retry budget (defaults to the configured value)
        #[arg(long)]
        retries: Option<u32>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Check whether a registration id is still valid
    Check {
        /// Registration id to probe
        registration_id: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
