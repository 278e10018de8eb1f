// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The eviction endpoint binary, run alongside a client so the store
//! server can dial back in and demand writeback+invalidate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use hearty_cache::ClientCache;
use hearty_cli::config::HeartyConfig;
use hearty_cli::logger;

#[derive(Parser, Debug)]
#[command(name = "hearty-evictd", about = "Client-side eviction endpoint")]
struct Opts {
    /// Path to an optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address this endpoint listens on for Evict calls from the server.
    #[arg(long)]
    listen_addr: SocketAddr,

    /// The store server's address, to reach with Cache/Get/Put calls.
    #[arg(long)]
    server_addr: Option<SocketAddr>,

    /// Directory holding this client's cached objects and index.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let mut cfg = HeartyConfig::load(opts.config.as_deref())?;
    if let Some(server_addr) = opts.server_addr {
        cfg.server_addr = server_addr;
    }
    if let Some(cache_dir) = opts.cache_dir {
        cfg.cache_dir = cache_dir;
    }

    logger::setup_logger(&cfg.log_filter);

    let cache = Arc::new(ClientCache::open(
        &cfg.cache_dir,
        cfg.cache_capacity,
        cfg.server_addr,
        opts.listen_addr,
    )?);
    hearty_cache::eviction::serve(cache, opts.listen_addr).await?;
    Ok(())
}
