use anyhow::Result;
use clap::Parser;
use kv_rs::database::Database;
use kv_server::config::ServerConfig;
use kv_server::replica::ReplicaSupervisor;
use kv_server::{net, trace};
use log::info;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Parser, PartialEq)]
#[command(version, author, about)]
pub struct Args {
    /// Configuration file path.
    #[clap(short = 'c', long = "config", help = "Configuration file path", default_value = "kv-server.toml")]
    config: String,

    #[clap(short, long, help = "print the parsed config and exit")]
    debug: bool,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  KV Storage Server");
    eprintln!();

    let args = Args::parse();
    let cfg = ServerConfig::load(&args.config)?;
    if args.debug {
        println!("{cfg:?}");
        return Ok(());
    }

    let _guards = trace::init_logging(&cfg.logfile, &cfg.loglevel).await?;
    info!("kv-server starting with config: {:?}", &cfg);

    let db = Database::open(cfg.to_database_options())?;
    let repl = Arc::new(ReplicaSupervisor::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    })
    .expect("failed to install signal handler");

    net::serve(db, repl, &cfg.bind, cfg.port, shutdown_rx).await?;

    info!("kv-server shut down cleanly");
    Ok(())
}
