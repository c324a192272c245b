//! Error taxonomy for the metrics engine
//!
//! Failures are scoped to the unit of work that hit them: one bond's bad
//! read must never sink a whole aggregation pass, and raw transport noise
//! is never surfaced to a display layer unwrapped.

use crate::registry::Network;

// ============================================
// ERROR TYPE
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// Address resolution found no deployment on the requested network.
    UnsupportedNetwork { network: Network },

    /// Node or transport failure during a contract read. Retryable.
    Provider(String),

    /// A required USD price is missing from the oracle cache.
    PriceUnavailable { symbol: String },

    /// Computed payout exceeds the depository's per-deposit cap.
    /// Warning-grade: the valuation that raised it is still displayable.
    PurchaseExceedsLimit { quote: f64, max_payout: f64 },

    /// Deposit amount is empty, non-numeric, or out of range.
    /// Raised before any network call goes out.
    InvalidAmount(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::UnsupportedNetwork { network } => {
                write!(f, "no deployment on {}", network)
            }
            MetricsError::Provider(msg) => {
                write!(f, "provider unavailable: {}", msg)
            }
            MetricsError::PriceUnavailable { symbol } => {
                write!(f, "no USD price cached for {}", symbol)
            }
            MetricsError::PurchaseExceedsLimit { quote, max_payout } => {
                write!(
                    f,
                    "quote of {:.4} LUX exceeds the max payout of {:.4} LUX",
                    quote, max_payout
                )
            }
            MetricsError::InvalidAmount(raw) => {
                write!(f, "invalid amount: {:?}", raw)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

impl MetricsError {
    /// Transport trouble and a cold price cache clear up on their own;
    /// everything else needs operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MetricsError::Provider(_) | MetricsError::PriceUnavailable { .. }
        )
    }

    /// Warning-grade errors ride alongside an otherwise valid result.
    pub fn is_warning(&self) -> bool {
        matches!(self, MetricsError::PurchaseExceedsLimit { .. })
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let err = MetricsError::Provider("connection reset".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_warning());

        let err = MetricsError::PriceUnavailable {
            symbol: "FTM".to_string(),
        };
        assert!(err.is_retryable());

        let err = MetricsError::UnsupportedNetwork {
            network: Network::Bsc,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_exceeds_limit_is_warning_grade() {
        let err = MetricsError::PurchaseExceedsLimit {
            quote: 1200.0,
            max_payout: 1000.0,
        };
        assert!(err.is_warning());
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("1200.0000"));
        assert!(msg.contains("1000.0000"));
    }

    #[test]
    fn test_display_names_the_network() {
        let err = MetricsError::UnsupportedNetwork {
            network: Network::Bsc,
        };
        assert_eq!(err.to_string(), "no deployment on BSC");
    }

    #[test]
    fn test_invalid_amount_echoes_input() {
        let err = MetricsError::InvalidAmount("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }
}
