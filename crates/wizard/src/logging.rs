use color_eyre::Result;
use lazy_static::lazy_static;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{self, PROJECT_NAME};

lazy_static! {
    pub static ref LOG_ENV: String = format!("{}_LOG_LEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = "hostel-wizard.log".to_string();
}

/// Log to a file in the data directory; stdout belongs to the terminal UI.
///
/// `RUST_LOG` wins over `HOSTEL_WIZARD_LOG_LEVEL`; without either, `info`.
pub fn init() -> Result<()> {
    let directory = config::ensure_data_dir_exists()?;
    let log_path = directory.join(LOG_FILE.as_str());
    let log_file = std::fs::File::create(log_path)?;

    let env_filter = EnvFilter::builder().with_default_directive(tracing::Level::INFO.into());
    let env_filter = env_filter
        .try_from_env()
        .or_else(|_| env_filter.with_env_var(LOG_ENV.clone()).from_env())?;

    let file_subscriber = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);
    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}
