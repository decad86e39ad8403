use std::str::FromStr;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Console logging. `RUST_LOG` wins over `level`; anything unparsable falls back to `info`.
pub fn init_logger(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    Ok(())
}
