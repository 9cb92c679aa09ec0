//! Startup seed data.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stockroom_core::OrderDraft;
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::state::AppState;

/// Catalog entries and orders loaded when the node starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    /// product id -> SKU
    #[serde(default)]
    pub catalog: HashMap<String, String>,

    #[serde(default)]
    pub orders: Vec<OrderDraft>,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SeedRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::SeedParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load everything into `state`. Orders that fail to import are
    /// skipped with a warning.
    pub async fn apply(self, state: &AppState) -> usize {
        let products = self.catalog.len();
        state.catalog.extend(self.catalog).await;

        let mut imported = 0;
        for draft in self.orders {
            let code = draft.code.clone();
            match state.fulfillment.import_order(draft).await {
                Ok(_) => imported += 1,
                Err(e) => warn!(order_code = %code, error = %e, "seed order skipped"),
            }
        }

        info!(products, orders = imported, "🌱 seed data loaded");
        imported
    }
}
