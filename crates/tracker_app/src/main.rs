use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracker_app::{
    app::{App, AppConfig},
    cli::Cli,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let result = App::new(config).and_then(|mut app| app.execute(cli.command));
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("tracker: {err:#}");
            ExitCode::FAILURE
        }
    }
}
