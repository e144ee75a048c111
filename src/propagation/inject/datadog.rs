//! Datadog outbound header injection.

use super::{InjectDiagnostics, InjectSnapshot};
use crate::propagation::extract::datadog::{
    ORIGIN_HEADER, PARENT_ID_HEADER, SAMPLING_PRIORITY_HEADER, TAGS_HEADER, TRACE_ID_HEADER,
};
use crate::propagation::header::HeaderSink;
use crate::tags::{encode_propagation_tags, propagation};

pub fn inject(snapshot: &InjectSnapshot, sink: &mut dyn HeaderSink, diagnostics: &mut InjectDiagnostics) {
    sink.set(TRACE_ID_HEADER, snapshot.trace_id.low.to_string());
    sink.set(PARENT_ID_HEADER, snapshot.span_id.0.to_string());
    sink.set(SAMPLING_PRIORITY_HEADER, snapshot.sampling_priority.0.to_string());

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

    fn snapshot(trace_tags: BTreeMap<String, String>, max_tags_header_len: usize) -> InjectSnapshot {
        InjectSnapshot {
            trace_id: TraceId::from_low(123),
            span_id: SpanId(456),
            sampling_priority: SamplingPriority::AUTO_KEEP,
            origin: Some("synthetics".to_string()),
            trace_tags,
            full_w3c_trace_id_hex: None,
            additional_w3c_tracestate: None,
            additional_datadog_w3c_tracestate: None,
            max_tags_header_len,
            max_tracestate_len: 512,
        }
    }

    #[test]
    fn writes_core_headers() {
        let snap = snapshot(BTreeMap::new(), 512);
        let mut sink = HashMap::new();
        let mut diag = InjectDiagnostics::default();
        inject(&snap, &mut sink, &mut diag);
        assert_eq!(sink.get(TRACE_ID_HEADER).unwrap(), "123");
        assert_eq!(sink.get(PARENT_ID_HEADER).unwrap(), "456");
        assert_eq!(sink.get(SAMPLING_PRIORITY_HEADER).unwrap(), "1");
        assert_eq!(sink.get(ORIGIN_HEADER).unwrap(), "synthetics");
        assert!(diag.errors.is_empty());
    }

    #[test]
    fn oversized_tags_skip_header_and_set_error() {
        let mut tags = BTreeMap::new();
        tags.insert("_dd.p.dm".to_string(), "x".repeat(1000));
        let snap = snapshot(tags, 32);
        let mut sink = HashMap::new();
        let mut diag = InjectDiagnostics::default();
        inject(&snap, &mut sink, &mut diag);
        assert!(sink.get(TAGS_HEADER).is_none());
        assert_eq!(diag.errors[0], (propagation::PROPAGATION_ERROR, "inject_max_size".to_string()));
    }

    #[test]
    fn empty_tags_omit_header() {
        let snap = snapshot(BTreeMap::new(), 512);
        let mut sink = HashMap::new();
        let mut diag = InjectDiagnostics::default();
        inject(&snap, &mut sink, &mut diag);
        assert!(sink.get(TAGS_HEADER).is_none());
    }
}
