// nexa-chat/crates/nexa-chat/src/main.rs

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use nexa_chat::{config::Config, repl, telemetry};

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "nexa-chat", version, about = "Chat with persona-driven characters from the terminal")]
struct Cli {
    /// Directory holding the database and session files.
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    /// Log the effective configuration at startup.
    #[arg(long)]
    print_config: bool,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("nexa_chat=info");
    let cli = Cli::parse();

    let mut cfg = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    if cli.print_config {
        cfg.print_config();
    }

    repl::run(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
