//! Device-model discovery
//!
//! Best-effort identification of the player hardware for the scrobble log's
//! `#CLIENT` header. Every lookup here is allowed to fail without affecting
//! the pipeline.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Vendor capability XML describing the device.
pub const CAPABILITY_XML: &str = "/system/vendor/sony/etc/default-capability_w_internal.xml";

/// NVP node holding the raw model string.
pub const NVP_MODEL_NODE: &str = "/dev/icx_nvp/033";

/// Present (as a directory) on Walkman One custom images.
const WALKMAN_ONE_MARKER: &str = "/etc/.mod";

#[derive(Debug, Default, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub device: Device,
}

#[derive(Debug, Default, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub identification: Identification,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Identification {
    pub class: String,
    pub model: String,
    pub marketingname: String,
    pub vendor: String,
    pub firmwareversion: String,
}

/// Read and decode the capability XML.
pub async fn model() -> Result<Capabilities> {
    let raw = tokio::fs::read(CAPABILITY_XML).await?;
    parse_capabilities(&raw)
}

/// Decode capability XML bytes, tolerating the vendor's ISO-8859-1 files.
fn parse_capabilities(raw: &[u8]) -> Result<Capabilities> {
    // Latin-1 bytes map 1:1 onto code points, which covers the non-UTF-8
    // files seen in the field.
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    };

    quick_xml::de::from_str(&text).map_err(|e| Error::Device(e.to_string()))
}

/// Model id as reported by the vendor's `nvpflag` tool.
pub async fn model_id() -> Result<String> {
    let output = tokio::process::Command::new("nvpflag")
        .args(["-x", "mid"])
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::Device(format!("nvpflag exited with {}", output.status)));
    }

    let id = String::from_utf8_lossy(&output.stdout)
        .trim_end_matches('\n')
        .to_string();

    Ok(id)
}

/// Raw model string from the NVP node, NUL padding trimmed.
pub async fn model_nvp() -> Result<String> {
    let raw = tokio::fs::read(NVP_MODEL_NODE).await?;
    let trimmed: Vec<u8> = raw
        .iter()
        .copied()
        .skip_while(|&b| b == 0)
        .take_while(|&b| b != 0)
        .collect();

    Ok(String::from_utf8_lossy(&trimmed).into_owned())
}

/// True when running on a Walkman One image.
pub async fn is_walkman_one() -> bool {
    match tokio::fs::metadata(WALKMAN_ONE_MARKER).await {
        Ok(meta) => meta.is_dir(),
        Err(_) => false,
    }
}
