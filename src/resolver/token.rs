//! Pool references embedded in activation/shipment token strings.
//!
//! Certain legacy write paths recorded a product's pool link only as a
//! side-channel string of colon-separated segments, the first being an
//! operation code and the second the pool ID. A token is trusted as a
//! hint only when its operation code is on the recognized whitelist for
//! that flow.

use crate::pool::PoolId;

/// Recognized operation codes per token flow.
///
/// Overridable through configuration; the defaults cover the codes the
/// legacy flows are known to have written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCodes {
    pub activation: Vec<String>,
    pub shipment: Vec<String>,
}

impl Default for TokenCodes {
    fn default() -> Self {
        Self {
            activation: vec!["ACT".into(), "ACT2".into(), "REL".into()],
            shipment: vec!["SHP".into(), "XFR".into()],
        }
    }
}

/// Parse a pool reference out of a token string.
///
/// Format: `<code>:<pool-id>[:<rest>]`. Returns `None` when the code is
/// not whitelisted or the ID segment does not parse — a malformed token
/// is silently skipped, never an error, because tokens are hints.
pub fn parse_pool_token(token: &str, whitelist: &[String]) -> Option<PoolId> {
    let mut segments = token.split(':');
    let code = segments.next()?.trim();
    if !whitelist.iter().any(|c| c == code) {
        return None;
    }
    segments.next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitelisted_token() {
        let codes = TokenCodes::default();
        let pool = PoolId::new();
        let token = format!("ACT:{pool}:batch-7");
        assert_eq!(parse_pool_token(&token, &codes.activation), Some(pool));
    }

    #[test]
    fn rejects_unknown_operation_code() {
        let codes = TokenCodes::default();
        let token = format!("NOPE:{}", PoolId::new());
        assert_eq!(parse_pool_token(&token, &codes.activation), None);
    }

    #[test]
    fn shipment_codes_are_separate() {
        let codes = TokenCodes::default();
        let pool = PoolId::new();
        let token = format!("SHP:{pool}");
        assert_eq!(parse_pool_token(&token, &codes.shipment), Some(pool));
        assert_eq!(parse_pool_token(&token, &codes.activation), None);
    }

    #[test]
    fn malformed_id_segment_is_skipped() {
        let codes = TokenCodes::default();
        assert_eq!(parse_pool_token("ACT:not-a-uuid", &codes.activation), None);
        assert_eq!(parse_pool_token("ACT", &codes.activation), None);
        assert_eq!(parse_pool_token("", &codes.activation), None);
    }
}
