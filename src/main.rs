use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use prompt_canvas::{App, AppConfig, cli::{self, Cli}};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = match App::build(AppConfig::from_env()).await {
        Ok(app) => app,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };

    match cli::execute(cli.command, &app).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        },
        Err(err) => {
            if !err.is_client_error() {
                error!("command failed: {err:?}");
            }
            eprintln!("Error: {}", err.public_message());
            process::exit(1);
        }
    }
}
