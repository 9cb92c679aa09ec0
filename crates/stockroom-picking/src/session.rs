//! Pick-and-verify session.
//!
//! A session tracks how many units of each manifest line have been
//! physically verified. Counts only move through capped increments, so
//! `scanned <= required` holds for every line at all times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_core::{is_sku_sentinel, FulfillmentError, LineItem, Order, Principal, Result};
use tracing::debug;
use uuid::Uuid;

use crate::scan::{match_token, normalize_token, MatchRule, ScanOutcome};

/// Lifecycle of a picking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepting scans.
    Opened,
    /// Every unit verified and the order moved on to packaging.
    Completed,
    /// Progress discarded.
    Abandoned,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Opened => "opened",
            SessionState::Completed => "completed",
            SessionState::Abandoned => "abandoned",
        }
    }
}

/// One manifest line as seen by the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickLine {
    pub line_id: String,
    pub product_id: String,
    pub sku: Option<String>,
    pub name: String,
    pub variant: Option<String>,
    pub required: u32,
    scanned: u32,
}

impl PickLine {
    pub fn from_item(item: &LineItem) -> Self {
        Self {
            line_id: item.id.clone(),
            product_id: item.product_id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            variant: item.variant.clone(),
            required: item.quantity,
            scanned: 0,
        }
    }

    pub fn scanned(&self) -> u32 {
        self.scanned
    }

    pub fn remaining(&self) -> u32 {
        self.required.saturating_sub(self.scanned)
    }

    pub fn is_complete(&self) -> bool {
        self.scanned >= self.required
    }

    pub fn known_sku(&self) -> Option<&str> {
        self.sku.as_deref().filter(|s| !is_sku_sentinel(s))
    }

    pub fn has_known_sku(&self) -> bool {
        self.known_sku().is_some()
    }

    /// Credit one unit. Returns false if the line was already full.
    fn increment(&mut self) -> bool {
        if self.scanned < self.required {
            self.scanned += 1;
            true
        } else {
            false
        }
    }
}

/// Aggregate progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickProgress {
    pub scanned: u32,
    pub required: u32,
    pub lines_complete: usize,
    pub lines_total: usize,
}

impl PickProgress {
    pub fn is_complete(&self) -> bool {
        self.scanned == self.required
    }
}

/// A server-held pick-and-verify session for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickSession {
    /// Unique ID for this session.
    pub id: Uuid,

    pub order_id: Uuid,

    pub order_code: String,

    /// Staff id that opened the session.
    pub opened_by: String,

    pub opened_at: DateTime<Utc>,

    /// Set when the session leaves `Opened`.
    pub closed_at: Option<DateTime<Utc>>,

    state: SessionState,

    lines: Vec<PickLine>,
}

impl PickSession {
    /// Open a session over the order's current manifest.
    pub fn open(order: &Order, principal: &Principal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            order_code: order.code.clone(),
            opened_by: principal.staff_id().to_string(),
            opened_at: Utc::now(),
            closed_at: None,
            state: SessionState::Opened,
            lines: order.line_items.iter().map(PickLine::from_item).collect(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Opened
    }

    pub fn lines(&self) -> &[PickLine] {
        &self.lines
    }

    pub fn line(&self, line_id: &str) -> Option<&PickLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// Process one scan token.
    ///
    /// Mismatches are outcomes, not errors: the picker keeps scanning.
    pub fn scan(&mut self, raw: &str) -> Result<ScanOutcome> {
        self.ensure_open()?;

        let Some(token) = normalize_token(raw) else {
            return Ok(ScanOutcome::Ignored);
        };

        let Some(found) = match_token(&self.lines, &token) else {
            debug!(
                session = %self.id,
                order_code = %self.order_code,
                token = %token,
                "scan matched no line"
            );
            return Ok(ScanOutcome::NoMatch { token });
        };

        match found.first_open(&self.lines) {
            Some(index) => Ok(self.credit(index, found.rule)),
            None => {
                let line_id = found
                    .candidates
                    .first()
                    .and_then(|&index| self.lines.get(index))
                    .map(|l| l.line_id.clone())
                    .unwrap_or_default();
                Ok(ScanOutcome::AlreadyComplete {
                    line_id,
                    rule: found.rule,
                })
            }
        }
    }

    /// Verify one unit of a specific line by hand.
    pub fn verify_manually(&mut self, line_id: &str) -> Result<ScanOutcome> {
        self.ensure_open()?;

        let index = self
            .lines
            .iter()
            .position(|l| l.line_id == line_id)
            .ok_or_else(|| FulfillmentError::NotFound {
                resource_type: "LineItem".to_string(),
                id: line_id.to_string(),
            })?;

        if self.lines[index].is_complete() {
            return Ok(ScanOutcome::AlreadyComplete {
                line_id: line_id.to_string(),
                rule: MatchRule::Manual,
            });
        }
        Ok(self.credit(index, MatchRule::Manual))
    }

    fn credit(&mut self, index: usize, rule: MatchRule) -> ScanOutcome {
        let line = &mut self.lines[index];
        if !line.increment() {
            return ScanOutcome::AlreadyComplete {
                line_id: line.line_id.clone(),
                rule,
            };
        }
        ScanOutcome::Verified {
            line_id: line.line_id.clone(),
            rule,
            scanned: line.scanned,
            required: line.required,
        }
    }

    pub fn progress(&self) -> PickProgress {
        PickProgress {
            scanned: self.lines.iter().map(|l| l.scanned).sum(),
            required: self.lines.iter().map(|l| l.required).sum(),
            lines_complete: self.lines.iter().filter(|l| l.is_complete()).count(),
            lines_total: self.lines.len(),
        }
    }

    /// Every unit verified. An empty manifest is complete.
    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    /// Close the session as completed. Fails unless every unit is verified.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_open()?;

        let progress = self.progress();
        if !progress.is_complete() {
            return Err(FulfillmentError::PickingIncomplete {
                order_id: self.order_id,
                scanned: progress.scanned,
                required: progress.required,
            });
        }

        self.state = SessionState::Completed;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Close the session and drop its progress.
    pub fn abandon(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = SessionState::Abandoned;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Put a completed session back into service, keeping its counts.
    pub(crate) fn reopen(&mut self) {
        self.state = SessionState::Opened;
        self.closed_at = None;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(FulfillmentError::SessionClosed {
                session_id: self.id,
                state: self.state.as_str().to_string(),
            })
        }
    }
}
