//! Session management commands.

use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use super::http::{base_url, delete_json, get_json, post_json_body};

#[derive(Deserialize)]
#[allow(dead_code)]
struct SessionInfo {
    node_id: String,
    url: String,
    instance_id: u32,
    max_instances: u32,
    port: u16,
    local_endpoint: String,
    established_at: u64,
    expires_at: u64,
    expires_in_secs: u64,
}

fn print_session(s: &SessionInfo) {
    println!("  ┌─ {}", s.node_id);
    println!("  │  dispatcher : {}", s.url);
    println!("  │  instance   : {} of {}", s.instance_id, s.max_instances);
    println!("  │  endpoint   : {}", s.local_endpoint);
    println!("  └─ expires in : {}s", s.expires_in_secs);
}

pub async fn cmd_sessions(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct SessionListResponse {
        sessions: Vec<SessionInfo>,
    }

    let resp: SessionListResponse = get_json(&format!("{}/sessions", base_url(port))).await?;

    if resp.sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Active Sessions ({})", resp.sessions.len());
    println!("═══════════════════════════════════════");
    for s in &resp.sessions {
        print_session(s);
    }

    Ok(())
}

pub async fn cmd_session_inspect(port: u16, node_id: &str) -> Result<()> {
    let resp: SessionInfo = get_json(&format!("{}/sessions/{}", base_url(port), node_id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session Details");
    println!("═══════════════════════════════════════");
    print_session(&resp);

    Ok(())
}

/// `source` is a path to a saved EdgeView script, or `-` for stdin.
pub async fn cmd_connect(port: u16, source: &str) -> Result<()> {
    let script = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read script from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {}", source))?
    };

    let resp: SessionInfo = post_json_body(
        &format!("{}/sessions", base_url(port)),
        &json!({ "script": script }),
    )
    .await?;

    println!("✓ Session ready");
    print_session(&resp);

    Ok(())
}

pub async fn cmd_session_drop(port: u16, node_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct DropResponse {
        node_id: String,
        dropped: bool,
    }

    let resp: DropResponse =
        delete_json(&format!("{}/sessions/{}", base_url(port), node_id)).await?;

    if resp.dropped {
        println!("✓ Session dropped: {}", resp.node_id);
    } else {
        println!("Session not found: {}", node_id);
    }

    Ok(())
}
