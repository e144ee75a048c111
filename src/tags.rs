//! The reserved internal tag namespace, and the `x-datadog-tags` wire
//! encoding used to carry the `_dd.p.*` propagation tag map.

use std::collections::BTreeMap;

/// Tag names outside of `_dd.*` that are still reserved — writable only
/// through the dedicated error-tagging operations on [`crate::span::Span`].
pub const RESERVED_EXACT: &[&str] = &["error.message", "error.type", "error.stack"];

/// Internal tag prefix. Any key starting with this is read-only from the
/// application's perspective.
pub const RESERVED_PREFIX: &str = "_dd.";

/// True when `key` falls in the reserved internal namespace and so must be
/// rejected by the public set/remove tag operations.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX) || RESERVED_EXACT.contains(&key)
}

/// Propagation tag keys are restricted to the `_dd.p.` sub-namespace; this is
/// the admissibility check used both when decoding `x-datadog-tags` and when
/// merging a W3C `tracestate`'s `t.*` subkeys.
pub fn is_propagation_tag(key: &str) -> bool {
    key.starts_with("_dd.p.")
}

/// Error surfaced as a tag on the local-root span, never as a `Result` to
/// the application, when `x-datadog-tags` fails to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagDecodeError {
    /// A `key=value` pair was missing its `=`.
    Malformed,
}

/// Decode the `x-datadog-tags` header: `key=value` pairs joined by `,`.
///
/// Only keys starting with `_dd.p.` are retained; other keys are silently
/// dropped rather than causing a decode failure. A pair missing `=` is a
/// hard decode error — non-fatal to extraction as a whole, but the whole
/// tag block is discarded and the failure is recorded as an extraction
/// error on the resulting context.
pub fn decode_propagation_tags(header: &str) -> Result<BTreeMap<String, String>, TagDecodeError> {
    let mut tags = BTreeMap::new();
    if header.is_empty() {
        return Ok(tags);
    }
    for pair in header.split(',') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().ok_or(TagDecodeError::Malformed)?;
        let value = parts.next().ok_or(TagDecodeError::Malformed)?;
        if is_propagation_tag(key) {
            tags.insert(key.to_string(), value.to_string());
        }
    }
    Ok(tags)
}

/// Encode a propagation tag map back into the `x-datadog-tags` wire format.
/// Returns `None` (and the caller sets `_dd.propagation_error =
/// "inject_max_size"`) when the encoded form would exceed `max_len`.
pub fn encode_propagation_tags(tags: &BTreeMap<String, String>, max_len: usize) -> Option<String> {
    if tags.is_empty() {
        return Some(String::new());
    }
    let encoded = tags
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    if encoded.len() > max_len {
        None
    } else {
        Some(encoded)
    }
}

/// Numeric tag names written during segment finalization.
pub mod numeric {
    pub const SAMPLING_PRIORITY_V1: &str = "_sampling_priority_v1";
    pub const AGENT_PSR: &str = "_dd.agent_psr";
    pub const RULE_PSR: &str = "_dd.rule_psr";
    pub const LIMIT_PSR: &str = "_dd.limit_psr";
    pub const SPAN_SAMPLING_MECHANISM: &str = "_dd.span_sampling.mechanism";
    pub const SPAN_SAMPLING_RULE_RATE: &str = "_dd.span_sampling.rule_rate";
    pub const SPAN_SAMPLING_MAX_PER_SECOND: &str = "_dd.span_sampling.max_per_second";
}

/// Propagation tag names written during extraction/injection.
pub mod propagation {
    pub const DECISION_MAKER: &str = "_dd.p.dm";
    pub const TRACE_ID_HIGH: &str = "_dd.p.tid";
    pub const PROPAGATION_ERROR: &str = "_dd.propagation_error";
    pub const W3C_EXTRACTION_ERROR: &str = "_dd.w3c_extraction_error";
    pub const HOSTNAME: &str = "_dd.hostname";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_prefix_and_exact() {
        assert!(is_reserved("_dd.p.dm"));
        assert!(is_reserved("error.message"));
        assert!(!is_reserved("http.method"));
    }

    #[test]
    fn decode_drops_non_propagation_keys() {
        let decoded = decode_propagation_tags("_dd.p.dm=-4,other=thing,_dd.p.tid=640cfd8d00000000").unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get("_dd.p.dm").unwrap(), "-4");
        assert!(!decoded.contains_key("other"));
    }

    #[test]
    fn decode_rejects_missing_equals() {
        assert_eq!(
            decode_propagation_tags("_dd.p.dm"),
            Err(TagDecodeError::Malformed)
        );
    }

    #[test]
    fn encode_respects_cap() {
        let mut tags = BTreeMap::new();
        tags.insert("_dd.p.dm".to_string(), "x".repeat(10_000));
        assert!(encode_propagation_tags(&tags, 512).is_none());
        assert!(encode_propagation_tags(&tags, 20_000).is_some());
    }
}
