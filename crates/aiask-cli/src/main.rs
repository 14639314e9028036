//! aiask - ask a hosted chat model one question from the terminal.
//!
//! ```bash
//! aiask "How do I undo the last git commit?"
//! ```
//!
//! The first run walks through device authorization; the platform token is
//! then cached in `./token` (or `$DATA_DIR/token`). Every answer is appended
//! to `./logs/YYYY-MM-DD.log` (or `$DATA_DIR/logs`).

use std::io;
use std::process::ExitCode;

use aiask_core::{App, Config};
use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "Usage: aiask \"your question\"";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Join all positional arguments into one prompt
fn prompt_from_args<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let prompt = args.into_iter().collect::<Vec<_>>().join(" ");
    if prompt.is_empty() {
        None
    } else {
        Some(prompt)
    }
}

fn render_answer(answer: &str) -> String {
    format!("\nResponse:\n{}", answer)
}

/// 0 on success, 1 on any failure
fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Print error message
fn print_error(error: &anyhow::Error) {
    eprintln!("Error: {:#}", error);
    if std::env::var("DEBUG").is_ok() {
        eprintln!("{:?}", error);
    }
}

async fn run(prompt: &str) -> Result<()> {
    let app = App::new(Config::from_env())?;

    println!("Asking: \"{}\"", prompt);
    let answer = app.ask(prompt).await?;
    println!("{}", render_answer(&answer));

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let Some(prompt) = prompt_from_args(std::env::args().skip(1)) else {
        println!("{}", USAGE);
        return ExitCode::from(1);
    };

    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("aiask starting");

    let result = run(&prompt).await;
    if let Err(ref e) = result {
        print_error(e);
    }
    ExitCode::from(exit_status(&result))
}
