//! B3 multi-header outbound injection, plus the Datadog-compatible
//! cross-bridge headers (`x-datadog-origin`/`x-datadog-tags`) carried
//! alongside B3 so a mixed-propagation deployment doesn't lose origin or
//! propagation-tag information when B3 is the primary outbound style.

use super::{InjectDiagnostics, InjectSnapshot};
use crate::propagation::extract::b3::{SAMPLED_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER};
use crate::propagation::extract::datadog::{ORIGIN_HEADER, TAGS_HEADER};
use crate::propagation::header::HeaderSink;
use crate::tags::{encode_propagation_tags, propagation};

pub fn inject(snapshot: &InjectSnapshot, sink: &mut dyn HeaderSink, diagnostics: &mut InjectDiagnostics) {
    let trace_id_hex = if snapshot.trace_id.is_64_bit() {
        snapshot.trace_id.low_hex16()
    } else {
        snapshot.trace_id.full_hex32()
    };
    sink.set(TRACE_ID_HEADER, trace_id_hex);
    sink.set(SPAN_ID_HEADER, snapshot.span_id.hex16());

    if snapshot.sampling_priority.is_keep() {
        sink.set(SAMPLED_HEADER, "1".to_string());
    } else if snapshot.sampling_priority.is_drop() {
        sink.set(SAMPLED_HEADER, "0".to_string());
    }

    if let Some(origin) = &snapshot.origin {
        sink.set(ORIGIN_HEADER, origin.clone());
    }

    match encode_propagation_tags(&snapshot.trace_tags, snapshot.max_tags_header_len) {
        Some(encoded) if !encoded.is_empty() => sink.set(TAGS_HEADER, encoded),
        Some(_) => {}
        None => diagnostics
            .errors
            .push((propagation::PROPAGATION_ERROR, "inject_max_size".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{SpanId, TraceId};
    use crate::sampling::SamplingPriority;
    use std::collections::{BTreeMap, HashMap};

    fn snapshot(trace_id: TraceId) -> InjectSnapshot {
        InjectSnapshot {
            trace_id,
            span_id: SpanId(0x00f067aa0ba902b7),
            sampling_priority: SamplingPriority::AUTO_KEEP,
            origin: None,
            trace_tags: BTreeMap::new(),
            full_w3c_trace_id_hex: None,
            additional_w3c_tracestate: None,
            additional_datadog_w3c_tracestate: None,
            max_tags_header_len: 512,
            max_tracestate_len: 512,
        }
    }

    #[test]
    fn writes_hex_ids_and_sampled_flag() {
        let snap = snapshot(TraceId::from_low(0xa3ce929d0e0e4736));
        let mut sink = HashMap::new();
        let mut diag = InjectDiagnostics::default();
        inject(&snap, &mut sink, &mut diag);
        assert_eq!(sink.get(TRACE_ID_HEADER).unwrap(), "a3ce929d0e0e4736");
        assert_eq!(sink.get(SPAN_ID_HEADER).unwrap(), "00f067aa0ba902b7");
        assert_eq!(sink.get(SAMPLED_HEADER).unwrap(), "1");
    }

    #[test]
    fn full_128_bit_trace_id_when_high_set() {
        let snap = snapshot(TraceId::new(0x4bf92f3577b34da6, 0xa3ce929d0e0e4736));
        let mut sink = HashMap::new();
        let mut diag = InjectDiagnostics::default();
        inject(&snap, &mut sink, &mut diag);
        assert_eq!(
            sink.get(TRACE_ID_HEADER).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
    }
}
