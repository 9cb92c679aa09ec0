//! Line-item SKU enrichment.
//!
//! Legacy checkouts stored lines without a SKU. Before picking, the live SKU
//! of each such product is fetched from the catalog so the picker can scan
//! barcodes instead of falling back to id matching.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use stockroom_core::{Catalog, LineItem};
use tracing::{debug, warn};

/// A SKU found for a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledSku {
    pub line_id: String,
    pub sku: String,
}

/// A catalog lookup that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupFailure {
    pub line_id: String,
    pub product_id: String,
    pub message: String,
}

/// What an enrichment pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub filled: Vec<FilledSku>,
    /// Lines the catalog had no SKU for.
    pub still_unknown: Vec<String>,
    pub lookup_failures: Vec<LookupFailure>,
}

impl EnrichmentReport {
    pub fn filled_count(&self) -> usize {
        self.filled.len()
    }

    /// Fill the found SKUs into `items`. Known SKUs are never overwritten.
    ///
    /// Returns the number of lines changed.
    pub fn apply(&self, items: &mut [LineItem]) -> usize {
        let mut changed = 0;
        for found in &self.filled {
            if let Some(item) = items.iter_mut().find(|i| i.id == found.line_id) {
                if item.fill_sku(&found.sku) {
                    changed += 1;
                }
            }
        }
        changed
    }
}

enum Lookup {
    Filled(FilledSku),
    Unknown(String),
    Failed(LookupFailure),
}

/// Looks up missing SKUs in the catalog.
pub struct LineItemEnricher {
    catalog: Arc<dyn Catalog>,
}

impl LineItemEnricher {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Look up a SKU for every line that lacks one, concurrently.
    ///
    /// Never fails: lookup errors are logged and reported, and the line keeps
    /// its unknown SKU.
    pub async fn enrich(&self, items: &[LineItem]) -> EnrichmentReport {
        let lookups = items
            .iter()
            .filter(|item| !item.has_known_sku())
            .map(|item| self.lookup(item));

        let mut report = EnrichmentReport::default();
        for lookup in join_all(lookups).await {
            match lookup {
                Lookup::Filled(found) => report.filled.push(found),
                Lookup::Unknown(line_id) => report.still_unknown.push(line_id),
                Lookup::Failed(failure) => report.lookup_failures.push(failure),
            }
        }

        debug!(
            filled = report.filled.len(),
            unknown = report.still_unknown.len(),
            failed = report.lookup_failures.len(),
            "line item enrichment finished"
        );
        report
    }

    async fn lookup(&self, item: &LineItem) -> Lookup {
        match self.catalog.sku_for_product(&item.product_id).await {
            Ok(Some(sku)) if !stockroom_core::is_sku_sentinel(&sku) => Lookup::Filled(FilledSku {
                line_id: item.id.clone(),
                sku: sku.trim().to_string(),
            }),
            Ok(_) => Lookup::Unknown(item.id.clone()),
            Err(e) => {
                warn!(
                    product_id = %item.product_id,
                    line_id = %item.id,
                    error = %e,
                    "catalog SKU lookup failed"
                );
                Lookup::Failed(LookupFailure {
                    line_id: item.id.clone(),
                    product_id: item.product_id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stockroom_core::{FulfillmentError, Result};

    struct MapCatalog {
        skus: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for MapCatalog {
        async fn sku_for_product(&self, product_id: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if product_id == "broken" {
                return Err(FulfillmentError::Collaborator {
                    collaborator: "catalog".to_string(),
                    message: "timeout".to_string(),
                });
            }
            Ok(self.skus.get(product_id).cloned())
        }
    }

    fn catalog() -> Arc<MapCatalog> {
        let mut skus = HashMap::new();
        skus.insert("prod-hat".to_string(), "HAT-RED-L".to_string());
        skus.insert("prod-scarf".to_string(), "SCF-NEW".to_string());
        Arc::new(MapCatalog {
            skus,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_enrich_only_unknown_skus() {
        let catalog = catalog();
        let enricher = LineItemEnricher::new(catalog.clone());

        let mut items = vec![
            LineItem::new("li-1", "prod-scarf", "Scarf", 1).with_sku("SCF-01"),
            LineItem::new("li-2", "prod-hat", "Hat", 1).with_sku("unknown"),
            LineItem::new("li-3", "prod-bag", "Bag", 1),
            LineItem::new("li-4", "broken", "Belt", 1),
        ];

        let report = enricher.enrich(&items).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            report.filled,
            vec![FilledSku {
                line_id: "li-2".to_string(),
                sku: "HAT-RED-L".to_string()
            }]
        );
        assert_eq!(report.still_unknown, vec!["li-3".to_string()]);
        assert_eq!(report.lookup_failures.len(), 1);

        assert_eq!(report.apply(&mut items), 1);
        assert_eq!(items[0].known_sku(), Some("SCF-01"));
        assert_eq!(items[1].known_sku(), Some("HAT-RED-L"));
        assert!(!items[2].has_known_sku());
    }

    #[test]
    fn test_apply_never_overwrites() {
        let report = EnrichmentReport {
            filled: vec![FilledSku {
                line_id: "li-1".to_string(),
                sku: "LATE".to_string(),
            }],
            ..Default::default()
        };
        let mut items = vec![LineItem::new("li-1", "p", "Tee", 1).with_sku("EARLY")];
        assert_eq!(report.apply(&mut items), 0);
        assert_eq!(items[0].known_sku(), Some("EARLY"));
    }
}
