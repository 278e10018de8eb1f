// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin per-command client executable. Talks directly to a running
//! `hearty-server` over the wire protocol; the client-side cache is not
//! wired into this binary, since this is a direct admin/debugging tool
//! rather than an application that benefits from local caching.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hearty_cli::config::HeartyConfig;
use hearty_cli::logger;

#[derive(Parser, Debug)]
#[command(name = "hearty", about = "Block-addressed object store client")]
struct Opts {
    /// Path to an optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address of the store server to talk to.
    #[arg(long)]
    server_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new store.
    Init { store: u32 },
    /// Write a file's content into a store.
    Put { store: u32, path: PathBuf },
    /// Read an object back by id, optionally to a file.
    Get {
        store: u32,
        id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List every known store.
    List,
    /// Destroy a store.
    Destroy { store: u32 },
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let opts = Opts::parse();
    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let msg = e.to_string();
            if !msg.is_empty() {
                eprintln!("{msg}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let mut cfg = HeartyConfig::load(opts.config.as_deref())?;
    if let Some(server_addr) = opts.server_addr {
        cfg.server_addr = server_addr;
    }
    logger::setup_logger(&cfg.log_filter);

    match opts.command {
        Command::Init { store } => {
            let response = hearty_rpc::client::call_init(cfg.server_addr, store).await?;
            print_simple(response)
        }
        Command::Put { store, path } => {
            let content = fs::read(&path)?;
            let file_path = path.to_string_lossy().into_owned();
            let response = hearty_rpc::client::call_put(cfg.server_addr, store, file_path, content).await?;
            if response.success {
                println!("{}", response.file_id.unwrap_or_default());
                Ok(())
            } else {
                anyhow::bail!(response.message)
            }
        }
        Command::Get { store, id, out } => {
            let content = hearty_rpc::client::call_get(cfg.server_addr, store, id).await?;
            match out {
                Some(path) => fs::write(path, &content)?,
                None => std::io::Write::write_all(&mut std::io::stdout(), &content)?,
            }
            Ok(())
        }
        Command::List => {
            let response = hearty_rpc::client::call_list(cfg.server_addr).await?;
            print_simple(response)
        }
        Command::Destroy { store } => {
            let response = hearty_rpc::client::call_destroy(cfg.server_addr, store).await?;
            print_simple(response)
        }
    }
}

/// Prints a `SimpleResponse`'s message unconditionally, then turns
/// `success=false` into an error so `main` reports exit code 1.
fn print_simple(response: hearty_rpc::protocol::SimpleResponse) -> anyhow::Result<()> {
    println!("{}", response.message);
    if response.success {
        Ok(())
    } else {
        anyhow::bail!("")
    }
}
