//! Structured logging setup. `RUST_LOG` always wins if set; otherwise the
//! level comes from `ServerConfig.log_level`. Stdout is reserved for the
//! framed protocol messages, so all logging goes to stderr (or a file, if
//! `log_file` is configured) regardless of format.

use std::fs::OpenOptions;

use rlm_core::ServerConfig;
use tracing_subscriber::EnvFilter;

pub fn init(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match (&config.log_file, config.structured_logging) {
        (Some(path), true) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.json().with_writer(file).init();
        }
        (Some(path), false) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_writer(file).init();
        }
        (None, true) => {
            builder.json().with_writer(std::io::stderr).init();
        }
        (None, false) => {
            builder.compact().with_writer(std::io::stderr).init();
        }
    }

    Ok(())
}
