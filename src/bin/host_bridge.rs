//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! drives a voice session through the host command channel, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages to stdout.
//!
//! All tracing output goes to stderr so that stdout remains a clean JSON
//! protocol channel.
//!
//! Configuration is read from `$NOVA_CONFIG` when set, otherwise from the
//! default config path if that file exists.

use anyhow::Context;
use nova::VoiceConfig;
use nova::host::stdio::run_stdio_bridge;
use std::path::PathBuf;

fn load_config() -> anyhow::Result<VoiceConfig> {
    let explicit = std::env::var_os("NOVA_CONFIG").map(PathBuf::from);
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = VoiceConfig::default_config_path();
            if !default.exists() {
                tracing::info!("no config file found; using defaults");
                return Ok(VoiceConfig::default());
            }
            default
        }
    };

    tracing::info!(path = %path.display(), "loading config");
    VoiceConfig::from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nova=info")),
        )
        .init();

    tracing::info!("nova-host starting");

    let config = load_config()?;

    run_stdio_bridge(config).await.map_err(|e| {
        tracing::error!(error = %e, "nova-host exited with error");
        anyhow::anyhow!("nova-host failed: {e}")
    })?;

    tracing::info!("nova-host shut down cleanly");
    Ok(())
}
