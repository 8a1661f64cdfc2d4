//! Cluster key file handling.
//!
//! Every node of a cluster must be started with the same key file. The
//! first node creates it; the file is then copied to the others.

use std::path::Path;

use anyhow::{Context, Result};
use gossip_core::NodeKeys;

/// Load the PEM key at `path`, or generate a `bits`-bit key and write it there.
pub fn load_or_create(path: &Path, bits: usize) -> Result<NodeKeys> {
    if path.exists() {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {:?}", path))?;
        let keys = NodeKeys::from_pkcs8_pem(&pem)
            .with_context(|| format!("Failed to load key file: {:?}", path))?;
        tracing::info!("Loaded {}-bit cluster key from {:?}", keys.bits(), path);
        return Ok(keys);
    }

    tracing::info!("No key file at {:?}, generating a {}-bit cluster key", path, bits);
    let keys = NodeKeys::generate(bits).context("Failed to generate cluster key")?;
    let pem = keys.to_pkcs8_pem()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create key directory: {:?}", parent))?;
    }
    std::fs::write(path, pem).with_context(|| format!("Failed to write key file: {:?}", path))?;
    restrict_permissions(path)?;
    tracing::info!("Wrote cluster key to {:?}", path);

    Ok(keys)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to restrict key file permissions: {:?}", path))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
