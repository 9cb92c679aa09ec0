//! # Stockroom Picking
//!
//! Pick-and-verify sessions: staff scan each physical item against the
//! order manifest before it may be packed.

pub mod enricher;
pub mod registry;
pub mod scan;
pub mod session;

pub use enricher::{EnrichmentReport, FilledSku, LineItemEnricher, LookupFailure};
pub use registry::SessionRegistry;
pub use scan::{match_token, normalize_token, MatchRule, ScanOutcome, TokenMatch};
pub use session::{PickLine, PickProgress, PickSession, SessionState};
