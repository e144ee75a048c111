//! One injector per outbound wire format, operating on a snapshot taken
//! under the segment's lock.

pub mod b3;
pub mod datadog;
pub mod w3c;

use std::collections::BTreeMap;

use crate::id::{SpanId, TraceId};
use crate::sampling::SamplingPriority;

/// Everything an outbound injector needs to write headers for one span,
/// taken as a consistent copy under the segment's lock.
#[derive(Clone, Debug)]
pub struct InjectSnapshot {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampling_priority: SamplingPriority,
    pub origin: Option<String>,
    pub trace_tags: BTreeMap<String, String>,
    pub full_w3c_trace_id_hex: Option<String>,
    pub additional_w3c_tracestate: Option<String>,
    pub additional_datadog_w3c_tracestate: Option<String>,
    /// Byte cap applied to the encoded `x-datadog-tags` header.
    pub max_tags_header_len: usize,
    /// Byte cap applied to the assembled W3C `tracestate` header.
    pub max_tracestate_len: usize,
}

/// Errors produced during injection surface as tags on the root span, never
/// as a `Result` — this is the sink the injectors write those diagnostics
/// into, read back by `TraceSegment` after injection.
#[derive(Clone, Debug, Default)]
pub struct InjectDiagnostics {
    pub errors: Vec<(&'static str, String)>,
}
