//! Parsing of `docker inspect` output.

use cleanslate_core::{ContainerState, Error, PortBinding, Result};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    state: StateSection,
    #[serde(default)]
    network_settings: Option<NetworkSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateSection {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSection {
    // Unpublished exposed ports are reported as `null`.
    #[serde(default)]
    ports: Option<HashMap<String, Option<Vec<HostBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct HostBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort")]
    host_port: String,
}

/// Parse the JSON array printed by `docker inspect <container>`.
///
/// Only the first record is used, and only the first host binding of `port`.
pub fn parse_inspect(container: &str, port: &str, output: &[u8]) -> Result<ContainerState> {
    let records: Vec<InspectRecord> = serde_json::from_slice(output)?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse(format!("no inspect record for {}", container)))?;

    let binding = record
        .network_settings
        .and_then(|network| network.ports)
        .and_then(|mut ports| ports.remove(port))
        .flatten()
        .and_then(|bindings| bindings.into_iter().next())
        .map(|b| PortBinding {
            host_address: b.host_ip,
            host_port: b.host_port,
        });

    Ok(ContainerState {
        name: container.to_string(),
        status: record.state.status,
        port: port.to_string(),
        binding,
    })
}
