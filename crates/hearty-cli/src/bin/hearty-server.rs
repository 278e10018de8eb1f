// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The RPC service binary: brings up `HeartyServer` over the configured
//! `base_path` and `server_addr`.

use std::path::PathBuf;

use clap::Parser;

use hearty_cli::config::HeartyConfig;
use hearty_cli::logger;
use hearty_rpc::HeartyServer;

#[derive(Parser, Debug)]
#[command(name = "hearty-server", about = "Block-addressed object store RPC service")]
struct Opts {
    /// Path to an optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding each store's data.bin/metadata.bin/log.txt.
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    server_addr: Option<std::net::SocketAddr>,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let mut cfg = HeartyConfig::load(opts.config.as_deref())?;
    if let Some(base_path) = opts.base_path {
        cfg.base_path = base_path;
    }
    if let Some(server_addr) = opts.server_addr {
        cfg.server_addr = server_addr;
    }

    logger::setup_logger(&cfg.log_filter);

    let engine = hearty_store::StoreEngine::new(&cfg.base_path);
    let server = HeartyServer::new(engine);
    server.run(cfg.server_addr).await?;
    Ok(())
}
