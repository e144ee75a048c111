//! Datadog header extraction.

use crate::id::{SpanId, TraceId};
use crate::propagation::context::ExtractedContext;
use crate::propagation::header::{AuditedReader, HeaderSource};
use crate::propagation::PropagationStyle;
use crate::sampling::SamplingPriority;
use crate::tags::{decode_propagation_tags, propagation};

pub const TRACE_ID_HEADER: &str = "x-datadog-trace-id";
pub const PARENT_ID_HEADER: &str = "x-datadog-parent-id";
pub const SAMPLING_PRIORITY_HEADER: &str = "x-datadog-sampling-priority";
pub const ORIGIN_HEADER: &str = "x-datadog-origin";
pub const TAGS_HEADER: &str = "x-datadog-tags";

pub fn extract(source: &dyn HeaderSource) -> ExtractedContext {
    let reader = AuditedReader::new(source);
    let mut ctx = ExtractedContext::empty(PropagationStyle::Datadog);

    let trace_id = match reader.get(TRACE_ID_HEADER) {
        Some(value) => match TraceId::parse_decimal_low(value) {
            Ok(id) => Some(id),
            Err(_) => {
                ctx.headers_examined = reader.into_audit_log();
                return ctx;
            }
        },
        None => None,
    };

    let parent_id = match reader.get(PARENT_ID_HEADER) {
        Some(value) => match SpanId::parse_decimal(value) {
            Ok(id) => Some(id),
            Err(_) => {
                ctx.headers_examined = reader.into_audit_log();
                return ctx;
            }
        },
        None => None,
    };

    let sampling_priority = match reader.get(SAMPLING_PRIORITY_HEADER) {
        Some(value) => match value.trim().parse::<i32>() {
            Ok(p) => Some(SamplingPriority(p)),
            Err(_) => {
                ctx.headers_examined = reader.into_audit_log();
                return ctx;
            }
        },
        None => None,
    };

    let origin = reader.get(ORIGIN_HEADER).map(|s| s.to_string());

    let mut trace_id = trace_id;
    let mut trace_tags = std::collections::BTreeMap::new();
    let mut extraction_errors = Vec::new();

    if let Some(tags_header) = reader.get(TAGS_HEADER) {
        match decode_propagation_tags(tags_header) {
            Ok(decoded) => {
                for (key, value) in decoded {
                    if key == propagation::TRACE_ID_HIGH {
                        if value.len() != 16 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
                            extraction_errors.push((
                                propagation::PROPAGATION_ERROR,
                                format!("malformed_tid {value}"),
                            ));
                            continue;
                        }
                        if let (Some(tid), Ok(high)) = (trace_id.as_mut(), u64::from_str_radix(&value, 16)) {
                            tid.high = high;
                        }
                    }
                    trace_tags.insert(key, value);
                }
            }
            Err(_) => {
                extraction_errors.push((propagation::PROPAGATION_ERROR, "decoding_error".to_string()));
            }
        }
    }

    ctx.trace_id = trace_id;
    ctx.parent_id = parent_id;
    ctx.sampling_priority = sampling_priority;
    ctx.origin = origin;
    ctx.trace_tags = trace_tags;
    ctx.extraction_errors = extraction_errors;
    ctx.headers_examined = reader.into_audit_log();
    ctx
}
