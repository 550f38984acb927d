use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use wizard::cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    wizard::errors::init()?;
    wizard::logging::init()?;

    let args = Cli::parse();
    wizard::run(args).await
}
