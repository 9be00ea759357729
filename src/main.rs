use anyhow::Result;
use clap::{Parser, Subcommand};
use gemini_batch::app::{load_manifest, App, BatchReport};
use gemini_batch::config::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gemini-batch")]
#[command(about = "Submit and collect Gemini batch inference jobs")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload media from a manifest and submit one batch job.
    Submit {
        /// JSON array of {"file": ..., "prompt": ...} entries.
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,
        /// Return right after the job is created.
        #[arg(long)]
        no_wait: bool,
    },
    /// Print the current state of a batch job.
    Status {
        #[arg(value_name = "BATCH", value_parser = parse_batch_name)]
        batch: String,
    },
    /// Download and print the results of a finished batch job.
    Results {
        #[arg(value_name = "BATCH", value_parser = parse_batch_name)]
        batch: String,
    },
}

fn parse_batch_name(input: &str) -> std::result::Result<String, String> {
    let name = input.trim();
    if name.is_empty() {
        return Err("Batch name must not be empty".to_string());
    }
    if name.starts_with("batches/") {
        Ok(name.to_string())
    } else {
        Ok(format!("batches/{}", name))
    }
}

fn print_report(report: &BatchReport) {
    for response in &report.responses {
        let item = response.request.label("item").unwrap_or("?");
        if response.is_success() {
            println!("[{}] {}", item, response.text().unwrap_or(""));
        } else {
            println!("[{}] Error: {}", item, response.status);
        }
    }
    for (i, entry) in report.inline.iter().enumerate() {
        match entry.error_message() {
            Some(message) => println!("[{}] Error: {}", i, message),
            None => println!("[{}] {}", i, entry.text().unwrap_or("")),
        }
    }
    info!(
        "{} results, {} failed, {} rejected",
        report.responses.len() + report.inline.len(),
        report.failed(),
        report.rejected
    );
}

async fn run(app: &App, command: Command) -> gemini_batch::Result<()> {
    match command {
        Command::Submit { manifest, no_wait } => {
            let entries = load_manifest(&manifest)?;
            info!("Loaded {} manifest entries", entries.len());

            let job = app.submit(&entries).await?;
            println!("{}", job.name);
            if !no_wait {
                let job = app.wait_for_completion(&job.name).await?;
                print_report(&app.fetch_results(job).await?);
            }
        }
        Command::Status { batch } => {
            let job = app.status(&batch).await?;
            println!("{} {}", job.name, job.state);
        }
        Command::Results { batch } => {
            let job = app.status(&batch).await?;
            print_report(&app.fetch_results(job).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_batch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let app = match Config::from_env().and_then(|config| App::new(&config)) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match run(&app, args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Batch command failed: {}", e);
            std::process::exit(1);
        }
    }
}
