mod attendance;
mod config;
mod db;
mod google_auth;
mod http;
mod ipc;
mod sheets;

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "schoold", version, about = "School records and attendance backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Line-delimited JSON requests on stdin, responses on stdout.
    Stdio,
    /// HTTP server.
    Serve {
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the sidecar protocol.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn run_stdio(state: &ipc::AppState) {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        }

        let resp = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<ipc::Request>(line) {
                Ok(req) => ipc::handle_request(state, req),
                Err(e) => {
                    warn!(error = %e, "undecodable request line");
                    ipc::bad_json(&e)
                }
            },
            Err(e) => {
                warn!(error = %e, "request line is not utf-8");
                ipc::bad_json(&e)
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = config::SchoolConfig::from_env()?;
    init_tracing(config.log_json);

    // The blocking sheets client must be dropped outside the tokio runtime.
    let state = Arc::new(ipc::AppState::from_config(config)?);

    match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => {
            info!("serving requests on stdio");
            run_stdio(&state);
            Ok(())
        }
        Command::Serve { listen } => {
            let addr = listen.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], state.config.port)));
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(http::serve(state.clone(), addr))
        }
    }
}
