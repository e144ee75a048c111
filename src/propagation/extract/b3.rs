//! B3 multi-header extraction. The single-header `b3` variant is not
//! supported.

use crate::id::{SpanId, TraceId};
use crate::propagation::context::ExtractedContext;
use crate::propagation::header::{AuditedReader, HeaderSource};
use crate::propagation::PropagationStyle;
use crate::sampling::SamplingPriority;

pub const TRACE_ID_HEADER: &str = "x-b3-traceid";
pub const SPAN_ID_HEADER: &str = "x-b3-spanid";
pub const SAMPLED_HEADER: &str = "x-b3-sampled";

pub fn extract(source: &dyn HeaderSource) -> ExtractedContext {
    let reader = AuditedReader::new(source);
    let mut ctx = ExtractedContext::empty(PropagationStyle::B3);

    let trace_id = match reader.get(TRACE_ID_HEADER) {
        Some(value) => match TraceId::parse_hex(value) {
            Ok(id) => Some(id),
            Err(_) => {
                ctx.headers_examined = reader.into_audit_log();
                return ctx;
            }
        },
        None => None,
    };

    let parent_id = match reader.get(SPAN_ID_HEADER) {
        Some(value) => match SpanId::parse_hex(value) {
            Ok(id) => Some(id),
            Err(_) => {
                ctx.headers_examined = reader.into_audit_log();
                return ctx;
            }
        },
        None => None,
    };

    let sampling_priority = match reader.get(SAMPLED_HEADER) {
        Some("1") => Some(SamplingPriority::AUTO_KEEP),
        Some("0") => Some(SamplingPriority::AUTO_DROP),
        _ => None,
    };

    ctx.trace_id = trace_id;
    ctx.parent_id = parent_id;
    ctx.sampling_priority = sampling_priority;
    ctx.headers_examined = reader.into_audit_log();
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn extracts_128_bit_trace_id() {
        let source = headers(&[
            (TRACE_ID_HEADER, "4bf92f3577b34da6a3ce929d0e0e4736"),
            (SPAN_ID_HEADER, "00f067aa0ba902b7"),
            (SAMPLED_HEADER, "1"),
        ]);
        let ctx = extract(&source);
        let trace_id = ctx.trace_id.unwrap();
        assert_eq!(trace_id.high, 0x4bf92f3577b34da6);
        assert_eq!(trace_id.low, 0xa3ce929d0e0e4736);
        assert_eq!(ctx.parent_id.unwrap().0, 0x00f067aa0ba902b7);
        assert_eq!(ctx.sampling_priority.unwrap(), SamplingPriority::AUTO_KEEP);
    }

    #[test]
    fn unparseable_trace_id_yields_empty_context() {
        let source = headers(&[(TRACE_ID_HEADER, "not-hex-zzzz")]);
        assert!(extract(&source).is_empty());
    }
}
