//! W3C Trace Context outbound injection: `traceparent` and `tracestate`.

use super::InjectSnapshot;
use crate::propagation::extract::w3c::{TRACEPARENT_HEADER, TRACESTATE_HEADER};
use crate::propagation::header::HeaderSink;

pub fn inject(snapshot: &InjectSnapshot, sink: &mut dyn HeaderSink) {
    let trace_id_hex = snapshot
        .full_w3c_trace_id_hex
        .clone()
        .unwrap_or_else(|| format!("{}{}", snapshot.trace_id.high_hex16(), snapshot.trace_id.low_hex16()));
    let flags = if snapshot.sampling_priority.is_keep() { "01" } else { "00" };
    sink.set(
        TRACEPARENT_HEADER,
        format!("00-{trace_id_hex}-{}-{flags}", snapshot.span_id.hex16()),
    );

    if let Some(tracestate) = build_tracestate(snapshot) {
        sink.set(TRACESTATE_HEADER, tracestate);
    }
}

/// Assembles the `dd=` entry, preferring our own subkeys and dropping the
/// lowest-priority ones first (preserved unknown subkeys, then vendor
/// entries) until the header fits `max_tracestate_len`.
fn build_tracestate(snapshot: &InjectSnapshot) -> Option<String> {
    let mut subkeys = Vec::new();
    subkeys.push(format!("s:{}", snapshot.sampling_priority.0));
    if let Some(origin) = &snapshot.origin {
        subkeys.push(format!("o:{}", origin.replace('=', "~")));
    }
    subkeys.push(format!("p:{}", snapshot.span_id.hex16()));
    for (key, value) in &snapshot.trace_tags {
        if let Some(suffix) = key.strip_prefix("_dd.p.") {
            subkeys.push(format!("t.{suffix}:{}", value.replace('=', "~")));
        }
    }

    let mut low_priority = Vec::new();
    if let Some(preserved) = &snapshot.additional_datadog_w3c_tracestate {
        low_priority.extend(preserved.split(';').map(|s| s.to_string()));
    }

    let vendor_suffix = snapshot
        .additional_w3c_tracestate
        .as_ref()
        .map(|s| format!(",{s}"))
        .unwrap_or_default();

    loop {
        let dd_value = subkeys
            .iter()
            .chain(low_priority.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(";");
        let candidate = format!("dd={dd_value}{vendor_suffix}");
        if candidate.len() <= snapshot.max_tracestate_len {
            return Some(candidate);
        }
        if low_priority.pop().is_some() {
            continue;
        }
        // still too long with only our own subkeys; truncate to just the
        // priority, which is mandatory for a valid dd= entry.
        if subkeys.len() > 1 {
            subkeys.truncate(1);
            continue;
        }
        return if candidate.len() <= snapshot.max_tracestate_len {
            Some(candidate)
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{SpanId, TraceId};
    use crate::sampling::SamplingPriority;
    use std::collections::{BTreeMap, HashMap};

    fn snapshot() -> InjectSnapshot {
        InjectSnapshot {
            trace_id: TraceId::new(0x4bf92f3577b34da6, 0xa3ce929d0e0e4736),
            span_id: SpanId(0x00f067aa0ba902b7),
            sampling_priority: SamplingPriority::AUTO_KEEP,
            origin: Some("rum".to_string()),
            trace_tags: BTreeMap::new(),
            full_w3c_trace_id_hex: Some("4bf92f3577b34da6a3ce929d0e0e4736".to_string()),
            additional_w3c_tracestate: Some("vendor=other".to_string()),
            additional_datadog_w3c_tracestate: None,
            max_tags_header_len: 512,
            max_tracestate_len: 512,
        }
    }

    #[test]
    fn writes_traceparent() {
        let snap = snapshot();
        let mut sink = HashMap::new();
        inject(&snap, &mut sink);
        assert_eq!(
            sink.get(TRACEPARENT_HEADER).unwrap(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
    }

    #[test]
    fn tracestate_preserves_vendor_entries() {
        let snap = snapshot();
        let mut sink = HashMap::new();
        inject(&snap, &mut sink);
        let tracestate = sink.get(TRACESTATE_HEADER).unwrap();
        assert!(tracestate.starts_with("dd=s:1;o:rum;p:00f067aa0ba902b7"));
        assert!(tracestate.ends_with(",vendor=other"));
    }

    #[test]
    fn drops_low_priority_subkeys_under_length_cap() {
        let mut snap = snapshot();
        snap.additional_datadog_w3c_tracestate = Some("z:overflow-value-that-is-long".to_string());
        snap.max_tracestate_len = 20;
        let mut sink = HashMap::new();
        inject(&snap, &mut sink);
        let tracestate = sink.get(TRACESTATE_HEADER).unwrap();
        assert!(!tracestate.contains("z:overflow"));
        assert!(tracestate.starts_with("dd=s:1"));
    }
}
