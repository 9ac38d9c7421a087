//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

/// `{ success, data, error }` wrapper every daemon response carries.
#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if !self.success {
            let msg = self.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(anyhow!("edgeviewd: {}", msg));
        }
        self.data.context("response carried no data")
    }
}

fn unreachable_daemon(url: &str) -> String {
    format!("failed to connect to edgeviewd at {}, is it running?", url)
}

async fn unwrap_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    resp.json::<Envelope<T>>()
        .await
        .context("failed to parse response")?
        .into_data()
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| unreachable_daemon(url))?;
    unwrap_response(resp).await
}

pub async fn delete_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::Client::new()
        .delete(url)
        .send()
        .await
        .with_context(|| unreachable_daemon(url))?;
    unwrap_response(resp).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| unreachable_daemon(url))?;
    unwrap_response(resp).await
}
