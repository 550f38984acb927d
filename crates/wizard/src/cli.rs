use std::str::FromStr;

use clap::{Parser, Subcommand};
use registration::FieldId;
use strum::IntoEnumIterator;

#[derive(Parser, Debug)]
#[command(name = "hostel-wizard", version, about = "Hostel registration wizard")]
pub struct Cli {
    /// Backend base URL, overriding the config file
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Frames per second of the interactive wizard
    #[arg(short, long, value_name = "FLOAT", default_value_t = 30.0)]
    pub frame_rate: f64,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Cmd {
    /// Run the interactive registration wizard (default)
    Register,
    /// Print the departments offered by the backend
    Departments,
    /// Validate a single field value
    Check {
        /// Field id, e.g. `rollNumber`
        #[arg(value_parser = parse_field)]
        field: FieldId,
        value: String,
        /// Password to compare against when checking `confirmPassword`
        #[arg(long)]
        password: Option<String>,
    },
}

fn parse_field(s: &str) -> Result<FieldId, String> {
    FieldId::from_str(s).map_err(|_| {
        let known: Vec<&'static str> = FieldId::iter().map(Into::into).collect();
        format!("unknown field `{s}`, expected one of: {}", known.join(", "))
    })
}
