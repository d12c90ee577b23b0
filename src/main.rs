use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use workspace_proxy::cli::{Cli, Commands};
use workspace_proxy::config::AppConfig;
use workspace_proxy::gate::{Gate, TracingObserver};
use workspace_proxy::logging::{self, DecisionLogObserver};
use workspace_proxy::proxy::ProxyServer;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => cmd_start(&cli.config).await?,
        Commands::Init => cmd_init(&cli.config)?,
        Commands::Status => cmd_status(&cli.config)?,
        Commands::Logs {
            tail,
            export,
            format,
        } => cmd_logs(&cli.config, tail, export, &format)?,
    }

    Ok(())
}

async fn cmd_start(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let logging_config = config.logging();
    init_tracing(&logging_config.level);

    let mut gate = Gate::new().with_observer(Arc::new(TracingObserver));
    if let Some(db_path) = &logging_config.database {
        let pool = logging::open_pool(db_path)?;
        gate = gate.with_observer(Arc::new(DecisionLogObserver::new(pool)));
        println!("Decision log: {}", db_path.display());
    }

    println!("Workspace proxy starting...");
    println!("Config: {}", config_path.display());

    let server = ProxyServer::new(config.proxy.clone()).with_gate(gate);
    let addr = server.start().await?;
    println!("Proxy running on {}", addr);
    println!("Send absolute-form https:// requests to http://{}", addr);
    if config.proxy.allow_connect {
        println!("CONNECT tunnels are enabled and NOT inspected");
    } else {
        println!("CONNECT tunnels are refused (set allow_connect to opt in; tunnels are not inspected)");
    }

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    Ok(())
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        return Ok(());
    }
    std::fs::write(config_path, include_str!("../templates/default.toml"))?;
    println!("Created config: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Start the proxy:  workspace-proxy start");
    println!("  2. Point clients at: http://127.0.0.1:8080 (absolute-form https:// requests)");
    println!("CONNECT tunnels are refused by default. They bypass inspection; see allow_connect.");
    Ok(())
}

/// Decision log path from the config, or `None` with a hint printed.
fn decision_db(config_path: &Path) -> anyhow::Result<Option<PathBuf>> {
    let config = AppConfig::load_from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    match config.logging().database {
        Some(path) if path.exists() => Ok(Some(path)),
        Some(path) => {
            println!("No decision log found at {}.", path.display());
            println!("Run 'workspace-proxy start' to begin recording.");
            Ok(None)
        }
        None => {
            println!("Decision logging is disabled. Set [logging] database in the config.");
            Ok(None)
        }
    }
}

fn cmd_status(config_path: &Path) -> anyhow::Result<()> {
    let Some(db) = decision_db(config_path)? else {
        return Ok(());
    };
    let conn = logging::open_db(&db)?;
    let stats = logging::query_stats(&conn)?;

    println!("Workspace Proxy Status");
    println!("──────────────────────");
    println!("Total decisions:     {}", stats.total);
    println!("  Allowed:           {}", stats.allowed);
    println!("  Denied (scheme):   {}", stats.denied_scheme);
    println!("  Denied (upgrade):  {}", stats.denied_upgrade);
    println!("  Websockets killed: {}", stats.websockets_killed);
    Ok(())
}

fn cmd_logs(config_path: &Path, tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let Some(db) = decision_db(config_path)? else {
        return Ok(());
    };
    let conn = logging::open_db(&db)?;

    if export {
        match format {
            "csv" => print!("{}", logging::export::export_csv(&conn)?),
            _ => println!("{}", logging::export::export_json(&conn)?),
        }
        return Ok(());
    }

    let logs = logging::query_recent(&conn, tail)?;
    if logs.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }
    println!(
        "{:<32} {:<8} {:<13} {:<50} {}",
        "TIMESTAMP", "METHOD", "VERDICT", "URL", "REASON"
    );
    println!("{}", "─".repeat(120));
    for log in &logs {
        println!(
            "{:<32} {:<8} {:<13} {:<50} {}",
            log.timestamp, log.method, log.verdict, log.url, log.reason
        );
    }
    Ok(())
}
