use clap::Parser;
use std::process::ExitCode;
use taskmaster::cli::{Cli, run};

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(formatted) => {
                println!("{formatted}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("error: {error}");
                ExitCode::FAILURE
            }
        },
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
