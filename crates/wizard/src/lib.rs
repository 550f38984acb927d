pub mod action;
pub mod app;
pub mod cli;
pub mod commands;
pub mod components;
pub mod config;
pub mod errors;
pub mod logging;
pub mod tui;

use std::process::ExitCode;

use color_eyre::Result;

use crate::cli::{Cli, Cmd};

/// Dispatch a parsed command line. `check` fails with a non-zero exit code
/// when the value is invalid.
pub async fn run(args: Cli) -> Result<ExitCode> {
    let mut config = config::Config::new()?;
    if let Some(url) = &args.api_url {
        config.backend.base_url = url.clone();
    }

    match args.cmd.unwrap_or(Cmd::Register) {
        Cmd::Register => {
            let mut app = app::App::new(config, args.frame_rate)?;
            app.run().await?;
        }
        Cmd::Departments => commands::departments(config).await?,
        Cmd::Check {
            field,
            value,
            password,
        } => {
            if !commands::check(field, &value, password.as_deref()) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
