//! Daemon status and SSH key commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    active_sessions: usize,
    public_key: Option<String>,
}

#[derive(Deserialize)]
struct SshKeyResponse {
    private_key_path: String,
    public_key: String,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  EdgeView Launcher Status");
    println!("═══════════════════════════════════════");
    println!("  Version          : {}", resp.version);
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!("  Active sessions  : {}", resp.active_sessions);
    match resp.public_key {
        Some(key) => println!("  SSH key          : {}", key),
        None => println!("  SSH key          : not provisioned"),
    }

    Ok(())
}

pub async fn cmd_key(port: u16) -> Result<()> {
    let resp: SshKeyResponse = get_json(&format!("{}/ssh-key", base_url(port))).await?;

    println!("  Private key : {}", resp.private_key_path);
    println!("  Public key  : {}", resp.public_key);

    Ok(())
}
