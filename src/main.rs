// Stdout is reserved for command results; logs go to stderr.

use std::process::ExitCode;

use notevault::commands::{self, Command};
use notevault::{Vault, VaultConfig, VaultError};

const USAGE: &str = "usage: notevault <operation> [json-arguments]\n\
    e.g. notevault search_vault '{\"query\": \"needle\"}'";

fn run() -> Result<serde_json::Value, VaultError> {
    let config = VaultConfig::from_env()?;

    env_logger::Builder::new()
        .filter_level(config.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let op = args
        .next()
        .ok_or_else(|| VaultError::InvalidQuery(USAGE.to_string()))?;
    let json_args = match args.next() {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| VaultError::InvalidQuery(format!("arguments are not valid JSON: {}", e)))?,
        ),
        None => None,
    };

    let vault = Vault::from_config(&config)?;
    let command = Command::from_parts(&op, json_args)?;
    log::info!("[notevault] Running {}", op);
    commands::execute(&vault, command)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            print_json(&commands::error_json(&err));
            ExitCode::FAILURE
        }
    }
}
