//! Trace and span identifiers, and the hex/decimal codecs used to move them
//! across the wire formats in [`crate::propagation`].

use std::fmt;

/// A 128-bit trace identifier.
///
/// Trace ids are carried as two 64-bit halves. When `high` is zero the trace
/// is indistinguishable from a legacy 64-bit trace id, which is what lets a
/// Datadog-only deployment round-trip through this type without ever seeing
/// the high half.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceId {
    pub high: u64,
    pub low: u64,
}

impl TraceId {
    pub const ZERO: TraceId = TraceId { high: 0, low: 0 };

    pub fn from_low(low: u64) -> Self {
        TraceId { high: 0, low }
    }

    pub fn new(high: u64, low: u64) -> Self {
        TraceId { high, low }
    }

    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }

    /// True when this trace id carries no information in its high half, i.e.
    /// it is compatible with a 64-bit-only tracer.
    pub fn is_64_bit(&self) -> bool {
        self.high == 0
    }

    /// Parse a decimal string into the low 64 bits of a trace id (the
    /// Datadog `x-datadog-trace-id` wire format never carries a high half).
    pub fn parse_decimal_low(s: &str) -> Result<Self, IdParseError> {
        let low = s.trim().parse::<u64>().map_err(|_| IdParseError)?;
        Ok(TraceId::from_low(low))
    }

    /// Parse up to 32 zero-padded hex characters into a full 128-bit trace
    /// id. Fewer than 32 characters are treated as the low half only.
    pub fn parse_hex(s: &str) -> Result<Self, IdParseError> {
        let s = s.trim();
        if s.is_empty() || s.len() > 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError);
        }
        if s.len() <= 16 {
            let low = u64::from_str_radix(s, 16).map_err(|_| IdParseError)?;
            return Ok(TraceId::from_low(low));
        }
        let split = s.len() - 16;
        let high = u64::from_str_radix(&s[..split], 16).map_err(|_| IdParseError)?;
        let low = u64::from_str_radix(&s[split..], 16).map_err(|_| IdParseError)?;
        Ok(TraceId::new(high, low))
    }

    /// The lower 64 bits, left-zero-padded to 16 hex chars.
    pub fn low_hex16(&self) -> String {
        format!("{:016x}", self.low)
    }

    /// The upper 64 bits, left-zero-padded to 16 hex chars (used for the
    /// `_dd.p.tid` propagation tag).
    pub fn high_hex16(&self) -> String {
        format!("{:016x}", self.high)
    }

    /// The full 128 bits, left-zero-padded to 32 hex chars.
    pub fn full_hex32(&self) -> String {
        format!("{:016x}{:016x}", self.high, self.low)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high == 0 {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}", self.full_hex32())
        }
    }
}

/// A 64-bit span identifier. Zero means "unset / no parent".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

impl SpanId {
    pub const ZERO: SpanId = SpanId(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn parse_decimal(s: &str) -> Result<Self, IdParseError> {
        s.trim().parse::<u64>().map(SpanId).map_err(|_| IdParseError)
    }

    pub fn parse_hex(s: &str) -> Result<Self, IdParseError> {
        let s = s.trim();
        if s.is_empty() || s.len() > 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError);
        }
        u64::from_str_radix(s, 16).map(SpanId).map_err(|_| IdParseError)
    }

    /// Left-zero-padded to 16 hex chars, as written onto `traceparent` /
    /// W3C `tracestate` `p:` subkeys.
    pub fn hex16(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque marker returned by the id parsers in this module; callers attach
/// their own descriptive prefix when surfacing it as an extraction error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdParseError;

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse identifier")
    }
}

impl std::error::Error for IdParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_decimal_roundtrip() {
        let id = TraceId::parse_decimal_low("11803532876627986230").unwrap();
        assert_eq!(id.low, 11803532876627986230);
        assert!(id.is_64_bit());
    }

    #[test]
    fn trace_id_hex_full_128_bit() {
        let id = TraceId::parse_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
        assert_eq!(id.high, 0x4bf92f3577b34da6);
        assert_eq!(id.low, 0xa3ce929d0e0e4736);
        assert_eq!(id.full_hex32(), "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn trace_id_hex_short_is_low_only() {
        let id = TraceId::parse_hex("640cfd8d").unwrap();
        assert_eq!(id.high, 0);
        assert_eq!(id.low, 0x640cfd8d);
    }

    #[test]
    fn trace_id_hex_rejects_non_hex_and_overlong() {
        assert!(TraceId::parse_hex("zz").is_err());
        assert!(TraceId::parse_hex(&"a".repeat(33)).is_err());
        assert!(TraceId::parse_hex("").is_err());
    }

    #[test]
    fn span_id_hex16_padding() {
        let id = SpanId(0x00f067aa0ba902b7);
        assert_eq!(id.hex16(), "00f067aa0ba902b7");
    }

    #[test]
    fn span_id_zero() {
        assert!(SpanId::ZERO.is_zero());
        assert!(!SpanId(1).is_zero());
    }
}
