//! Parsers for command-line values.

use anyhow::{Context, Result, bail};
use gossip_core::{AttributeValue, ConflictMode, PeerAddress, Value};
use std::collections::BTreeMap;

/// Attribute under which `--put` stores its text.
pub const SEED_ATTRIBUTE: &str = "value";

/// Parse `host:port`. The port is taken after the last colon.
pub fn parse_endpoint(s: &str) -> Result<PeerAddress> {
    let (host, port) = s
        .rsplit_once(':')
        .with_context(|| format!("Expected host:port, got {:?}", s))?;
    if host.is_empty() {
        bail!("Missing host in {:?}", s);
    }
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in {:?}", s))?;
    Ok(PeerAddress::new(host, port))
}

/// Parse `KEY=TEXT` into a freshly stamped value.
pub fn parse_assignment(s: &str) -> Result<(String, Value)> {
    let (key, text) = s
        .split_once('=')
        .with_context(|| format!("Expected KEY=TEXT, got {:?}", s))?;
    if key.is_empty() {
        bail!("Missing key in {:?}", s);
    }
    let attributes = BTreeMap::from([(SEED_ATTRIBUTE.to_string(), AttributeValue::from(text))]);
    Ok((
        key.to_string(),
        Value::new(ConflictMode::MergeKeepNewer, attributes),
    ))
}
