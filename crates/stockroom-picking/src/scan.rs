//! Scan token matching.

use serde::{Deserialize, Serialize};

use crate::session::PickLine;

/// Normalize a raw scan token. Returns `None` for blank input.
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_uppercase())
    }
}

/// Which rule matched a token to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Exact SKU match.
    Sku,
    /// Exact internal line id match.
    LineId,
    /// Substring of the line id or product id, for lines with no usable SKU.
    IdFallback,
    /// Staff verified the line by hand.
    Manual,
}

impl MatchRule {
    /// Rules tried for a scanned token, in priority order.
    pub const SCAN_ORDER: [MatchRule; 3] =
        [MatchRule::Sku, MatchRule::LineId, MatchRule::IdFallback];

    /// Whether `token` (already normalized) matches `line` under this rule.
    pub fn matches(&self, line: &PickLine, token: &str) -> bool {
        match self {
            MatchRule::Sku => line
                .known_sku()
                .map(|sku| sku.to_uppercase() == token)
                .unwrap_or(false),
            MatchRule::LineId => line.line_id.to_uppercase() == token,
            MatchRule::IdFallback => {
                !line.has_known_sku()
                    && (line.line_id.to_uppercase().contains(token)
                        || line.product_id.to_uppercase().contains(token))
            }
            MatchRule::Manual => false,
        }
    }
}

/// Lines matched by the first rule that matched anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    pub rule: MatchRule,
    /// Indices into the session's lines, in manifest order.
    pub candidates: Vec<usize>,
}

impl TokenMatch {
    /// First candidate that still needs units.
    pub fn first_open(&self, lines: &[PickLine]) -> Option<usize> {
        self.candidates
            .iter()
            .copied()
            .find(|&index| lines.get(index).map(|l| !l.is_complete()).unwrap_or(false))
    }
}

/// Match a normalized token against `lines`.
pub fn match_token(lines: &[PickLine], token: &str) -> Option<TokenMatch> {
    MatchRule::SCAN_ORDER.iter().find_map(|rule| {
        let candidates: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| rule.matches(line, token))
            .map(|(index, _)| index)
            .collect();

        if candidates.is_empty() {
            None
        } else {
            Some(TokenMatch {
                rule: *rule,
                candidates,
            })
        }
    })
}

/// Result of one scan or manual verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// One unit credited to `line_id`.
    Verified {
        line_id: String,
        rule: MatchRule,
        scanned: u32,
        required: u32,
    },
    /// The token matched, but every matched line is already full.
    AlreadyComplete { line_id: String, rule: MatchRule },
    /// Nothing on the manifest matches the token.
    NoMatch { token: String },
    /// Blank token.
    Ignored,
}

impl ScanOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, ScanOutcome::Verified { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::LineItem;

    fn lines() -> Vec<PickLine> {
        vec![
            PickLine::from_item(&LineItem::new("li-1", "prod-scarf", "Scarf", 2).with_sku("SCF-01")),
            PickLine::from_item(&LineItem::new("li-2", "prod-hat", "Hat", 1).with_sku("unknown")),
            PickLine::from_item(&LineItem::new("li-3", "prod-bag", "Bag", 1)),
        ]
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_token("  scf-01 "), Some("SCF-01".to_string()));
        assert_eq!(normalize_token("   "), None);
        assert_eq!(normalize_token(""), None);
    }

    #[test]
    fn test_sku_rule_wins_first() {
        let m = match_token(&lines(), "SCF-01").unwrap();
        assert_eq!(m.rule, MatchRule::Sku);
        assert_eq!(m.candidates, vec![0]);
    }

    #[test]
    fn test_line_id_rule() {
        let m = match_token(&lines(), "LI-1").unwrap();
        assert_eq!(m.rule, MatchRule::LineId);
        assert_eq!(m.candidates, vec![0]);
    }

    #[test]
    fn test_sentinel_never_matches_as_sku() {
        let m = match_token(&lines(), "UNKNOWN");
        assert!(m.is_none());
    }

    #[test]
    fn test_fallback_only_for_unknown_sku() {
        // "SCARF" is a substring of prod-scarf, but that line has a real SKU.
        assert!(match_token(&lines(), "SCARF").is_none());

        let m = match_token(&lines(), "HAT").unwrap();
        assert_eq!(m.rule, MatchRule::IdFallback);
        assert_eq!(m.candidates, vec![1]);

        // "LI-" hits both unknown-SKU lines; manifest order is preserved.
        let m = match_token(&lines(), "LI-").unwrap();
        assert_eq!(m.candidates, vec![1, 2]);
    }
}
