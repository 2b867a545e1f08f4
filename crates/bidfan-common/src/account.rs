use std::collections::HashMap;

use serde::Deserialize;

use crate::config::ExecutionPlanConfig;

/// Publisher account record, resolved per request by the host's account
/// store (lookup itself is outside this crate).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub id: String,
    /// Whether this account may receive debug output at all.
    #[serde(default)]
    pub debug_allow: bool,
    /// Account-scope hook execution plan; replaces the default-account plan
    /// wherever it defines groups.
    #[serde(default)]
    pub hooks: Option<ExecutionPlanConfig>,
    #[serde(default)]
    pub alternate_bidder_codes: AlternateBidderCodes,
    /// Bid price adjustment factors keyed by bidder / seat name.
    #[serde(default)]
    pub bid_adjustments: HashMap<String, f64>,
}

/// Which alternate seat names each bidder may bid under.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AlternateBidderCodes {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bidders: HashMap<String, AlternateBidderCodesBidder>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AlternateBidderCodesBidder {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_bidder_codes: Vec<String>,
}

impl AlternateBidderCodes {
    /// Validates that `bidder` is allowed to place bids under seat `seat`.
    /// A bidder may always use its own name. Everything else requires the
    /// feature to be enabled and the seat to be allow-listed (or `*`).
    pub fn is_valid_bidder_code(&self, bidder: &str, seat: &str) -> Result<(), String> {
        if seat.eq_ignore_ascii_case(bidder) {
            return Ok(());
        }

        if !self.enabled {
            return Err(format!(
                "alternateBidderCodes disabled for \"{bidder}\", rejecting bids on seat \"{seat}\""
            ));
        }

        let cfg = self
            .bidders
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(bidder))
            .map(|(_, cfg)| cfg);

        let cfg = match cfg {
            Some(cfg) if cfg.enabled => cfg,
            _ => {
                return Err(format!(
                    "alternateBidderCodes not enabled for adapter \"{bidder}\", rejecting bids on seat \"{seat}\""
                ));
            }
        };

        let allowed = cfg
            .allowed_bidder_codes
            .iter()
            .any(|c| c == "*" || c.eq_ignore_ascii_case(seat));
        if allowed {
            Ok(())
        } else {
            Err(format!(
                "invalid biddercode \"{seat}\" sent by adapter \"{bidder}\""
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_codes(bidder: &str, enabled: bool, allowed: &[&str]) -> AlternateBidderCodes {
        AlternateBidderCodes {
            enabled: true,
            bidders: HashMap::from([(
                bidder.to_string(),
                AlternateBidderCodesBidder {
                    enabled,
                    allowed_bidder_codes: allowed.iter().map(|s| s.to_string()).collect(),
                },
            )]),
        }
    }

    #[test]
    fn test_own_name_always_valid() {
        let codes = AlternateBidderCodes::default();
        assert!(codes.is_valid_bidder_code("bidder-a", "bidder-a").is_ok());
        assert!(codes.is_valid_bidder_code("bidder-a", "Bidder-A").is_ok());
    }

    #[test]
    fn test_disabled_rejects_alternates() {
        let codes = AlternateBidderCodes::default();
        let err = codes.is_valid_bidder_code("bidder-a", "seat-x").unwrap_err();
        assert!(err.contains("disabled"), "unexpected message: {err}");
    }

    #[test]
    fn test_allow_list_and_wildcard() {
        let codes = make_codes("bidder-a", true, &["seat-x"]);
        assert!(codes.is_valid_bidder_code("bidder-a", "seat-x").is_ok());
        assert!(codes.is_valid_bidder_code("bidder-a", "seat-y").is_err());

        let codes = make_codes("bidder-a", true, &["*"]);
        assert!(codes.is_valid_bidder_code("bidder-a", "anything").is_ok());
    }

    #[test]
    fn test_bidder_entry_disabled() {
        let codes = make_codes("bidder-a", false, &["seat-x"]);
        assert!(codes.is_valid_bidder_code("bidder-a", "seat-x").is_err());
    }
}
