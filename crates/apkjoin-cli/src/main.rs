//! apkjoin - split APK merger CLI

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apkjoin_cli::cmd::{self, Settings};
use apkjoin_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_cli(&cli);

    let result = match cli.command {
        Commands::Merge {
            input,
            output,
            keystore,
            ks_key_alias,
            ks_pass,
            strip_signatures,
            json,
        } => {
            cmd::merge::merge(
                &settings,
                cmd::merge::MergeArgs {
                    input,
                    output,
                    keystore,
                    ks_key_alias,
                    ks_pass,
                    strip_signatures,
                    json,
                },
            )
            .await
        }
        Commands::Inspect { input, json } => cmd::inspect::inspect(&settings, &input, json).await,
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
