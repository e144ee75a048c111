//! [`ExtractedContext`]: the intermediate form produced by extractors.

use std::collections::BTreeMap;

use crate::id::{SpanId, TraceId};
use crate::sampling::SamplingPriority;

use super::PropagationStyle;

/// Everything one extractor could glean from a set of inbound headers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedContext {
    pub style: Option<PropagationStyle>,
    pub trace_id: Option<TraceId>,
    pub parent_id: Option<SpanId>,
    pub sampling_priority: Option<SamplingPriority>,
    pub origin: Option<String>,
    /// Only `_dd.p.*` keys are admissible here.
    pub trace_tags: BTreeMap<String, String>,
    /// Preserves the exact 32-hex form when parsed from W3C, so injection
    /// can round-trip a trace id that arrived with a non-canonical high
    /// half without corrupting it.
    pub full_w3c_trace_id_hex: Option<String>,
    /// Non-`dd` vendor entries from `tracestate`, preserved verbatim.
    pub additional_w3c_tracestate: Option<String>,
    /// Unknown `dd`-subkeys from `tracestate`, to re-emit on injection.
    pub additional_datadog_w3c_tracestate: Option<String>,
    /// The W3C `traceparent` parent span id as 16-hex, kept distinct from
    /// `parent_id` when the formats disagree.
    pub datadog_w3c_parent_id: Option<String>,
    /// Every successfully looked-up header, across every extractor that ran
    /// (merged in by [`super::merge::merge_contexts`]).
    pub headers_examined: Vec<(String, String)>,
    /// Diagnostic tags (`_dd.propagation_error`, `_dd.w3c_extraction_error`)
    /// produced during extraction. These belong on the local-root span's
    /// tags, but the root span doesn't exist yet at extraction time, so
    /// they travel here until the facade creates the segment and copies
    /// them over.
    pub extraction_errors: Vec<(&'static str, String)>,
}

impl ExtractedContext {
    pub fn empty(style: PropagationStyle) -> Self {
        ExtractedContext {
            style: Some(style),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none()
    }
}
