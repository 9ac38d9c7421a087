//! edgeview-ctl: command-line interface for the EdgeView launcher daemon.

use anyhow::{Context, Result};

mod cmd;

use cmd::sessions::{cmd_connect, cmd_session_drop, cmd_session_inspect, cmd_sessions};
use cmd::status::{cmd_key, cmd_status};

const DEFAULT_PORT: u16 = 8080;

fn print_usage() {
    println!("Usage: edgeview-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show daemon status");
    println!("  sessions            List active sessions");
    println!("  session <node>      Show one session");
    println!("  connect <file|->    Connect using a saved EdgeView script");
    println!("  drop <node>         End a session");
    println!("  key                 Show (and create if needed) the SSH key");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["sessions"] => cmd_sessions(port).await,
        ["session", node] => cmd_session_inspect(port, node).await,
        ["connect", source] => cmd_connect(port, source).await,
        ["drop", node] => cmd_session_drop(port, node).await,
        ["key"] => cmd_key(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
