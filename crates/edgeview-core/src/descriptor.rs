//! Connection descriptor parsing.
//!
//! A descriptor arrives embedded in a pasted EdgeView script:
//!
//!   edgeview -token <header>.<claims>.<signature>
//!
//! Each segment is base64url without padding. The claims segment is a JSON
//! object; the signature segment is decoded but never verified, the channel
//! that delivered the script is what vouches for it.
//!
//! Claims:
//!   dep  dispatcher endpoint (required, URL)
//!   sub  target device id (required, non-empty)
//!   num  max instances on the device endpoint (required, integer)
//!   key  session nonce (required, may be empty)
//!   exp  descriptor expiry, unix seconds (optional)
//!   enc  payload encryption expected (optional, default false)

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

/// Flags that introduce the token inside a script.
const TOKEN_MARKERS: [&str; 2] = ["--token", "-token"];

/// A validated, normalized descriptor. Only built after every required
/// claim has been checked.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// The bearer token exactly as it appeared in the script.
    pub token: String,
    /// Dispatcher endpoint with a websocket scheme.
    pub dispatch_url: String,
    pub target_id: String,
    pub max_instances: u32,
    /// Instance slot this launcher connects to.
    pub instance_id: u32,
    pub nonce_key: String,
    pub expires_at: Option<SystemTime>,
    pub encrypted: bool,
}

// Token and nonce are bearer secrets; keep them out of logs.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("token", &"<redacted>")
            .field("dispatch_url", &self.dispatch_url)
            .field("target_id", &self.target_id)
            .field("max_instances", &self.max_instances)
            .field("instance_id", &self.instance_id)
            .field("nonce_key", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// What is wrong with a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimProblem {
    Missing,
    WrongType,
    Invalid,
}

impl fmt::Display for ClaimProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClaimProblem::Missing => "missing",
            ClaimProblem::WrongType => "wrong type",
            ClaimProblem::Invalid => "invalid value",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("invalid claim `{field}`: {problem}")]
    InvalidClaims {
        field: &'static str,
        problem: ClaimProblem,
    },
}

impl DescriptorError {
    fn malformed(reason: impl Into<String>) -> Self {
        DescriptorError::MalformedToken(reason.into())
    }

    fn claim(field: &'static str, problem: ClaimProblem) -> Self {
        DescriptorError::InvalidClaims { field, problem }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a script (or any text carrying a `-token` flag) into a descriptor.
pub fn parse(raw: &str) -> Result<ConnectionDescriptor, DescriptorError> {
    let token = extract_token(raw)?;

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DescriptorError::malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header = decode_segment(segments[0], "header")?;
    let claims = decode_segment(segments[1], "claims")?;
    let _signature = decode_segment(segments[2], "signature")?;

    match serde_json::from_slice::<Value>(&header) {
        Ok(Value::Object(_)) => {}
        _ => return Err(DescriptorError::malformed("header is not a JSON object")),
    }
    let claims = match serde_json::from_slice::<Value>(&claims) {
        Ok(Value::Object(map)) => map,
        _ => return Err(DescriptorError::malformed("claims segment is not a JSON object")),
    };

    let dep = required_str(&claims, "dep")?;
    let parsed = url::Url::parse(dep).map_err(|_| DescriptorError::claim("dep", ClaimProblem::Invalid))?;
    if !parsed.has_host() {
        return Err(DescriptorError::claim("dep", ClaimProblem::Invalid));
    }

    let target_id = required_str(&claims, "sub")?;
    if target_id.is_empty() {
        return Err(DescriptorError::claim("sub", ClaimProblem::Invalid));
    }

    let max_instances = required(&claims, "num")?
        .as_u64()
        .ok_or(DescriptorError::claim("num", ClaimProblem::WrongType))?;
    let max_instances = u32::try_from(max_instances)
        .map_err(|_| DescriptorError::claim("num", ClaimProblem::Invalid))?;

    let nonce_key = required_str(&claims, "key")?;

    let expires_at = match optional(&claims, "exp") {
        None => None,
        Some(v) => {
            let secs = v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or(DescriptorError::claim("exp", ClaimProblem::WrongType))?;
            let at = UNIX_EPOCH
                .checked_add(Duration::from_secs(secs))
                .ok_or(DescriptorError::claim("exp", ClaimProblem::Invalid))?;
            Some(at)
        }
    };

    let encrypted = match optional(&claims, "enc") {
        None => false,
        Some(v) => v
            .as_bool()
            .ok_or(DescriptorError::claim("enc", ClaimProblem::WrongType))?,
    };

    let dispatch_url = websocket_url(dep).unwrap_or_else(|| {
        tracing::warn!(url = %dep, "dispatch url has no websocket equivalent, passing through");
        dep.to_string()
    });

    Ok(ConnectionDescriptor {
        token: token.to_string(),
        dispatch_url,
        target_id: target_id.to_string(),
        max_instances,
        instance_id: select_instance(max_instances),
        nonce_key: nonce_key.to_string(),
        expires_at,
        encrypted,
    })
}

/// Instance slot 0 is commonly held by another operator, so multi-instance
/// endpoints get slot 1.
pub fn select_instance(max_instances: u32) -> u32 {
    if max_instances > 1 {
        1
    } else {
        0
    }
}

/// Rewrite a dispatcher URL to its websocket form.
///
/// Returns `None` for schemes with no known mapping; the caller decides
/// whether to pass the URL through. Everything after `://` is preserved.
pub fn websocket_url(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let mapped = match scheme.to_ascii_lowercase().as_str() {
        "https" | "edgeview" | "wss" => "wss",
        "http" | "ws" => "ws",
        _ => return None,
    };
    Some(format!("{mapped}://{rest}"))
}

fn extract_token(raw: &str) -> Result<&str, DescriptorError> {
    let mut words = raw.split_whitespace().map(unquote);
    while let Some(word) = words.next() {
        for marker in TOKEN_MARKERS {
            if word == marker {
                return match words.next() {
                    Some(token) if !token.is_empty() => Ok(token),
                    _ => Err(DescriptorError::malformed(format!("no token after `{marker}`"))),
                };
            }
            if let Some(token) = word.strip_prefix(marker).and_then(|r| r.strip_prefix('=')) {
                let token = unquote(token);
                if token.is_empty() {
                    return Err(DescriptorError::malformed(format!("no token after `{marker}=`")));
                }
                return Ok(token);
            }
        }
    }
    Err(DescriptorError::malformed("no -token flag found"))
}

fn unquote(word: &str) -> &str {
    word.trim_matches(|c| c == '"' || c == '\'')
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, DescriptorError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| DescriptorError::malformed(format!("{name} segment is not base64url")))
}

fn optional<'a>(claims: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    claims.get(field).filter(|v| !v.is_null())
}

fn required<'a>(claims: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DescriptorError> {
    optional(claims, field).ok_or(DescriptorError::claim(field, ClaimProblem::Missing))
}

fn required_str<'a>(claims: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, DescriptorError> {
    required(claims, field)?
        .as_str()
        .ok_or(DescriptorError::claim(field, ClaimProblem::WrongType))
}
