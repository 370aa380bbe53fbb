//! `wasapi-bridge` binary: webhook server and one-shot Wasapi commands.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use wasapi_bridge::bus::{BusEvent, Topic};
use wasapi_bridge::config::{config_dir, Config};
use wasapi_bridge::logging;
use wasapi_bridge::wasapi::provider::WasapiProvider;
use wasapi_bridge::wasapi::status::DeviceStatus;
use wasapi_bridge::webhook;

#[derive(Parser)]
#[command(name = "wasapi-bridge", version, about = "Wasapi WhatsApp webhook bridge")]
struct Cli {
    /// Path to the config file (overrides `$WASAPI_BRIDGE_CONFIG`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the device and serve the inbound webhook.
    Start {
        /// Directory for rotated JSON logs (default: `~/.wasapi-bridge/logs`).
        #[arg(long)]
        logs_dir: Option<PathBuf>,
    },
    /// Check that the configured device is registered.
    Status,
    /// Send a text message.
    Send {
        /// Recipient chat id (e.g. `521555@c.us`).
        to: String,
        /// Message text.
        text: String,
    },
    /// Download an inbound attachment and print the saved path.
    Download {
        /// Media resource id.
        resource_id: String,
        /// Target directory (default: configured download dir).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => Config::load()?,
    };

    match cli.command {
        Command::Start { logs_dir } => {
            let logs_dir = match logs_dir {
                Some(dir) => dir,
                None => config_dir()?.join("logs"),
            };
            let _guard = logging::init_server(&logs_dir)?;
            start(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            logging::init_cli()?;
            let provider = WasapiProvider::from_config(&config)?;
            match provider.init().await {
                DeviceStatus::Ready => {
                    println!("device {} is ready", provider.settings().device_id);
                    Ok(ExitCode::SUCCESS)
                }
                DeviceStatus::AuthFailure(failure) => {
                    for line in failure.instructions {
                        eprintln!("{line}");
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Send { to, text } => {
            logging::init_cli()?;
            let provider = WasapiProvider::from_config(&config)?;
            let response = provider
                .send_message(&to, &text)
                .await
                .with_context(|| format!("failed to send message to {to}"))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Download { resource_id, dir } => {
            logging::init_cli()?;
            let provider = WasapiProvider::from_config(&config)?;
            let path = provider.save_file(&resource_id, dir.as_deref()).await?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the provider, run the device check and serve the webhook.
async fn start(config: &Config) -> anyhow::Result<()> {
    let provider = Arc::new(WasapiProvider::from_config(config)?);

    provider.subscribe(Topic::Message, |event| {
        if let BusEvent::Message(msg) = event {
            info!(from = %msg.from, name = %msg.name, body = %msg.body, host = %msg.host.phone, "message received");
        }
    });
    provider.subscribe(Topic::AuthFailure, |event| {
        if let BusEvent::AuthFailure(failure) = event {
            for line in &failure.instructions {
                tracing::warn!("{line}");
            }
        }
    });

    provider.init().await;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(name = %config.server.name, %addr, "starting Wasapi bridge");
    webhook::serve(addr, provider).await
}
