//! W3C Trace Context extraction: `traceparent` and `tracestate`. The
//! `traceparent` grammar is a fixed-width, fixed-layout string, so it is
//! hand-parsed by field rather than matched with `regex`.

use crate::id::{SpanId, TraceId};
use crate::propagation::context::ExtractedContext;
use crate::propagation::header::{AuditedReader, HeaderSource};
use crate::propagation::PropagationStyle;
use crate::sampling::SamplingPriority;
use crate::tags::propagation;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

struct ParsedTraceparent {
    trace_id: TraceId,
    full_trace_id_hex: String,
    parent_id: SpanId,
    sampled: bool,
}

enum TraceparentError {
    Malformed,
    InvalidVersion,
    TraceIdZero,
    ParentIdZero,
}

impl TraceparentError {
    fn tag_value(&self) -> &'static str {
        match self {
            TraceparentError::Malformed => "malformed_traceparent",
            TraceparentError::InvalidVersion => "invalid_version",
            TraceparentError::TraceIdZero => "trace_id_zero",
            TraceparentError::ParentIdZero => "parent_id_zero",
        }
    }
}

/// `VV-TTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTT-SSSSSSSSSSSSSSSS-FF(-...)?`
fn parse_traceparent(header: &str) -> Result<ParsedTraceparent, TraceparentError> {
    let header = header.trim();
    let mut parts = header.splitn(5, '-');

    let version = parts.next().ok_or(TraceparentError::Malformed)?;
    let trace_id_hex = parts.next().ok_or(TraceparentError::Malformed)?;
    let span_id_hex = parts.next().ok_or(TraceparentError::Malformed)?;
    let flags_hex = parts.next().ok_or(TraceparentError::Malformed)?;
    // any further `-...` segments are allowed and ignored.

    if version.len() != 2 || !version.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TraceparentError::Malformed);
    }
    let version_byte = u8::from_str_radix(version, 16).map_err(|_| TraceparentError::Malformed)?;
    if version_byte == 0xff {
        return Err(TraceparentError::InvalidVersion);
    }

    if trace_id_hex.len() != 32 || !trace_id_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TraceparentError::Malformed);
    }
    if span_id_hex.len() != 16 || !span_id_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TraceparentError::Malformed);
    }
    if flags_hex.len() != 2 || !flags_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TraceparentError::Malformed);
    }

    let high = u64::from_str_radix(&trace_id_hex[..16], 16).map_err(|_| TraceparentError::Malformed)?;
    let low = u64::from_str_radix(&trace_id_hex[16..], 16).map_err(|_| TraceparentError::Malformed)?;
    if high == 0 && low == 0 {
        return Err(TraceparentError::TraceIdZero);
    }

    let span_id = u64::from_str_radix(span_id_hex, 16).map_err(|_| TraceparentError::Malformed)?;
    if span_id == 0 {
        return Err(TraceparentError::ParentIdZero);
    }

    let flags = u8::from_str_radix(flags_hex, 16).map_err(|_| TraceparentError::Malformed)?;

    Ok(ParsedTraceparent {
        trace_id: TraceId::new(high, low),
        full_trace_id_hex: trace_id_hex.to_ascii_lowercase(),
        parent_id: SpanId(span_id),
        sampled: flags & 1 == 1,
    })
}

struct ParsedTracestate {
    origin: Option<String>,
    priority: Option<SamplingPriority>,
    datadog_parent_id: Option<String>,
    trace_tags: std::collections::BTreeMap<String, String>,
    additional_w3c_tracestate: Option<String>,
    additional_datadog_w3c_tracestate: Option<String>,
}

fn parse_tracestate(header: &str, traceparent_priority: Option<SamplingPriority>) -> ParsedTracestate {
    let entries: Vec<&str> = header
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && s.contains('='))
        .collect();

    let dd_index = entries.iter().position(|e| {
        e.splitn(2, '=').next().map(|k| k == "dd").unwrap_or(false)
    });

    let mut result = ParsedTracestate {
        origin: None,
        priority: None,
        datadog_parent_id: None,
        trace_tags: std::collections::BTreeMap::new(),
        additional_w3c_tracestate: None,
        additional_datadog_w3c_tracestate: None,
    };

    let Some(dd_index) = dd_index else {
        if !entries.is_empty() {
            result.additional_w3c_tracestate = Some(entries.join(","));
        }
        return result;
    };

    let dd_entry = entries[dd_index];
    let (_, dd_value) = dd_entry.split_once('=').expect("filtered for '='");

    let remainder: Vec<&str> = entries
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != dd_index)
        .map(|(_, e)| *e)
        .collect();
    if !remainder.is_empty() {
        result.additional_w3c_tracestate = Some(remainder.join(","));
    }

    let mut unknown_subkeys = Vec::new();
    for subentry in dd_value.split(';') {
        if subentry.is_empty() {
            continue;
        }
        // Split on the first ':' so a subkey value is free to contain one.
        let Some((key, value)) = subentry.split_once(':') else {
            continue;
        };
        if key == "o" {
            result.origin = Some(value.to_string());
        } else if key == "s" {
            if let Ok(parsed) = value.parse::<i32>() {
                let candidate = SamplingPriority(parsed);
                let apply = match traceparent_priority {
                    None => true,
                    Some(existing) => existing.is_keep() == candidate.is_keep(),
                };
                if apply {
                    result.priority = Some(candidate);
                }
            }
        } else if key == "p" {
            result.datadog_parent_id = Some(value.to_string());
        } else if let Some(suffix) = key.strip_prefix("t.") {
            result
                .trace_tags
                .insert(format!("_dd.p.{suffix}"), value.replace('~', "="));
        } else {
            unknown_subkeys.push(subentry.to_string());
        }
    }
    if !unknown_subkeys.is_empty() {
        result.additional_datadog_w3c_tracestate = Some(unknown_subkeys.join(";"));
    }

    result
}

pub fn extract(source: &dyn HeaderSource) -> ExtractedContext {
    let reader = AuditedReader::new(source);
    let mut ctx = ExtractedContext::empty(PropagationStyle::W3C);

    let Some(traceparent) = reader.get(TRACEPARENT_HEADER) else {
        ctx.headers_examined = reader.into_audit_log();
        return ctx;
    };

    let parsed = match parse_traceparent(traceparent) {
        Ok(parsed) => parsed,
        Err(err) => {
            ctx.extraction_errors
                .push((propagation::W3C_EXTRACTION_ERROR, err.tag_value().to_string()));
            ctx.headers_examined = reader.into_audit_log();
            return ctx;
        }
    };

    let traceparent_priority = Some(if parsed.sampled {
        SamplingPriority::AUTO_KEEP
    } else {
        SamplingPriority::AUTO_DROP
    });

    let tracestate = parse_tracestate(reader.get(TRACESTATE_HEADER).unwrap_or(""), traceparent_priority);

    ctx.trace_id = Some(parsed.trace_id);
    ctx.full_w3c_trace_id_hex = Some(parsed.full_trace_id_hex);
    ctx.parent_id = Some(parsed.parent_id);
    ctx.sampling_priority = tracestate.priority.or(traceparent_priority);
    ctx.origin = tracestate.origin;
    ctx.datadog_w3c_parent_id = tracestate.datadog_parent_id;
    ctx.trace_tags = tracestate.trace_tags;
    ctx.additional_w3c_tracestate = tracestate.additional_w3c_tracestate;
    ctx.additional_datadog_w3c_tracestate = tracestate.additional_datadog_w3c_tracestate;
    ctx.headers_examined = reader.into_audit_log();
    ctx
}
