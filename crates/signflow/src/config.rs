//! Workflow configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use signflow_composite::{CompositeConfig, DEFAULT_MAX_IMAGE_BYTES};
use signflow_core::{RankTable, UNRANKED};

/// Configuration for the [`Workflow`](crate::Workflow).
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```json
/// { "ranks": { "Director": 1, "Manager": 2 }, "upload_attempts": 5 }
/// ```
///
/// A `ranks` map replaces the built-in table entirely.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Title → signing priority. Rank 1 signs first.
    pub ranks: HashMap<String, u32>,
    /// Rank for signers with no title or an unknown one.
    pub default_rank: u32,
    /// Lifetime of preview URLs.
    pub preview_ttl_secs: u64,
    /// Total attempts for a composite upload, including the first.
    pub upload_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub upload_backoff_ms: u64,
    /// Largest decoded signature image accepted.
    pub max_image_bytes: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ranks: RankTable::default()
                .entries()
                .map(|(title, rank)| (title.to_string(), rank))
                .collect(),
            default_rank: UNRANKED,
            preview_ttl_secs: 15 * 60,
            upload_attempts: 3,
            upload_backoff_ms: 50,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl WorkflowConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn rank_table(&self) -> RankTable {
        self.ranks
            .iter()
            .fold(RankTable::empty(), |table, (title, rank)| {
                table.with_rank(title, *rank)
            })
            .with_unranked(self.default_rank)
    }

    pub fn composite_config(&self) -> CompositeConfig {
        CompositeConfig {
            max_image_bytes: self.max_image_bytes,
        }
    }

    pub fn preview_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_ttl_secs)
    }

    pub(crate) fn upload_backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.upload_backoff_ms.saturating_mul(1 << retry.min(10)))
    }
}
