use std::io::{self, Read};

use anyhow::Result;
use is_terminal::IsTerminal;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use tablegpt::{cli, handlers};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = cli::Cli::parse();

    // Pipe support: an empty positional question falls back to stdin.
    let mut question = args.question.clone().unwrap_or_default();
    if question.is_empty() && !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        question = buf.trim().to_string();
    }

    handlers::ask::run(&args, &question).await
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
