//! Deployment record for the saving circle, kept as JSON next to the project.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PaymentError;
use crate::types::Address;

/// What is known about a deployed circle.
///
/// Unknown keys survive a load/save cycle so records written by other tools
/// are not truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: Address,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    /// RFC 3339 on disk.
    #[serde(default, alias = "deployedAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DeploymentRecord {
    pub fn new(address: Address, created_at: DateTime<Utc>) -> Self {
        Self {
            address,
            factory: None,
            tx_hash: None,
            created_at: Some(created_at),
            args: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading deployment record {}", path.display()))?;
        let record = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing deployment record {}", path.display()))?;
        Ok(record)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing deployment record {}", path.display()))?;
        info!("Deployment record for {} written to {}", self.address, path.display());
        Ok(())
    }
}

/// Agreement address from the explicit setting, else from the record file.
pub async fn resolve_agreement(
    explicit: Option<Address>,
    record_path: &Path,
) -> Result<Address, PaymentError> {
    if let Some(address) = explicit {
        return Ok(address);
    }

    match DeploymentRecord::load(record_path).await {
        Ok(record) => {
            info!(
                "Agreement {} taken from {}",
                record.address,
                record_path.display()
            );
            Ok(record.address)
        }
        Err(e) => {
            warn!("No usable deployment record: {:#}", e);
            Err(PaymentError::Configuration(format!(
                "no agreement address: pass --agreement, set AGREEMENT_ADDRESS or write {}",
                record_path.display()
            )))
        }
    }
}
