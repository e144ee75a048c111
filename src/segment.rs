//! [`TraceSegment`]: owns the process-local portion of a trace, coordinates
//! its sampling decision, and hands the finished batch off to a collector.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures_channel::mpsc;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::collector::Collector;
use crate::id::{SpanId, TraceId};
use crate::idgen::IdGenerator;
use crate::propagation::inject::{InjectDiagnostics, InjectSnapshot};
use crate::propagation::PropagationStyle;
use crate::sampling::{DecisionOrigin, SampleInput, SamplingDecision, SamplingDecisionState, SamplingMechanism, SamplingPriority, SpanSampler, TraceSampler};
use crate::span::{Span, SpanData};
use crate::tags::{numeric, propagation};

/// Everything a segment needs that the facade configures once and shares
/// across every segment it creates.
pub struct TraceSegmentConfig {
    pub trace_sampler: Arc<TraceSampler>,
    pub span_sampler: Arc<SpanSampler>,
    pub id_generator: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub env: String,
    pub hostname: Option<String>,
    pub injection_styles: Vec<PropagationStyle>,
    pub max_tags_header_len: usize,
    pub max_tracestate_len: usize,
}

/// A batch of finished spans ready for a collector, paired with the sampler
/// the collector feeds agent-provided rates back into.
pub struct FinalizedBatch {
    pub spans: Vec<SpanData>,
}

struct SegmentState {
    spans: Vec<Arc<Mutex<SpanData>>>,
    finished: usize,
    finalized: bool,
}

/// Owns a process-local portion of one trace. Kept alive by every live
/// [`Span`] sharing it; when the last one finishes, finalization runs
/// synchronously on that span's thread and the finished batch is pushed to
/// whichever collector loop is draining `finalized_tx`.
pub struct TraceSegment {
    trace_id: TraceId,
    state: Mutex<SegmentState>,
    decision: SamplingDecisionState,
    trace_tags: Mutex<BTreeMap<String, String>>,
    origin: Option<String>,
    hostname: Option<String>,
    injection_styles: Vec<PropagationStyle>,
    trace_sampler: Arc<TraceSampler>,
    span_sampler: Arc<SpanSampler>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    env: String,
    max_tags_header_len: usize,
    max_tracestate_len: usize,
    /// Non-`dd` vendor `tracestate` entries captured at extraction, re-emitted
    /// verbatim on every subsequent W3C injection.
    additional_w3c_tracestate: Option<String>,
    /// Unknown `dd`-subkeys captured at extraction, re-emitted on every
    /// subsequent W3C injection.
    additional_datadog_w3c_tracestate: Option<String>,
    /// Diagnostic tags produced during extraction (`_dd.propagation_error`,
    /// `_dd.w3c_extraction_error`), applied to the root span at finalization.
    extraction_errors: Vec<(&'static str, String)>,
    finalized_tx: mpsc::UnboundedSender<FinalizedBatch>,
}

impl TraceSegment {
    /// Creates a segment and its root span. `parent_id`/`initial_decision`/
    /// `trace_tags`/`origin` come from a merged [`crate::propagation::ExtractedContext`]
    /// when this segment continues a trace from an upstream service, or are
    /// all empty/`None` for a trace that originates here.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        config: TraceSegmentConfig,
        trace_id: Option<TraceId>,
        parent_id: SpanId,
        initial_priority: Option<SamplingPriority>,
        trace_tags: BTreeMap<String, String>,
        origin: Option<String>,
        additional_w3c_tracestate: Option<String>,
        additional_datadog_w3c_tracestate: Option<String>,
        extraction_errors: Vec<(&'static str, String)>,
        service: impl Into<String>,
        name: impl Into<String>,
        resource: impl Into<String>,
    ) -> (Arc<TraceSegment>, Span, mpsc::UnboundedReceiver<FinalizedBatch>) {
        let trace_id = trace_id.unwrap_or_else(|| TraceId::from_low(config.id_generator.generate()));
        let (tx, rx) = mpsc::unbounded();

        let decision = SamplingDecisionState::new();
        if let Some(priority) = initial_priority {
            let mechanism = trace_tags
                .get(propagation::DECISION_MAKER)
                .and_then(|v| v.trim_start_matches('-').parse::<i32>().ok())
                .and_then(SamplingMechanism::from_i32)
                .unwrap_or(SamplingMechanism::Default);
            decision.set(SamplingDecision {
                priority,
                mechanism,
                origin: DecisionOrigin::Extracted,
                configured_rate: None,
                limiter_effective_rate: None,
                limiter_max_per_second: None,
            });
        }

        let segment = Arc::new(TraceSegment {
            trace_id,
            state: Mutex::new(SegmentState {
                spans: Vec::new(),
                finished: 0,
                finalized: false,
            }),
            decision,
            trace_tags: Mutex::new(trace_tags),
            origin,
            hostname: config.hostname,
            injection_styles: config.injection_styles,
            trace_sampler: config.trace_sampler,
            span_sampler: config.span_sampler,
            id_generator: config.id_generator,
            clock: config.clock,
            env: config.env,
            max_tags_header_len: config.max_tags_header_len,
            max_tracestate_len: config.max_tracestate_len,
            additional_w3c_tracestate,
            additional_datadog_w3c_tracestate,
            extraction_errors,
            finalized_tx: tx,
        });

        let span_id = SpanId(segment.id_generator.generate());
        let data = Arc::new(Mutex::new(SpanData::new(
            trace_id,
            span_id,
            parent_id,
            service,
            name,
            resource,
            segment.clock.now(),
        )));
        segment.state.lock().unwrap_or_else(|e| e.into_inner()).spans.push(data.clone());

        let root = Span::new(segment.clone(), data, span_id);
        (segment, root, rx)
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn create_child_span(
        self: &Arc<Self>,
        parent_id: SpanId,
        service: impl Into<String>,
        name: impl Into<String>,
        resource: impl Into<String>,
    ) -> Span {
        let span_id = SpanId(self.id_generator.generate());
        let data = Arc::new(Mutex::new(SpanData::new(
            self.trace_id,
            span_id,
            parent_id,
            service,
            name,
            resource,
            self.clock.now(),
        )));
        self.state.lock().unwrap_or_else(|e| e.into_inner()).spans.push(data.clone());
        Span::new(self.clone(), data, span_id)
    }

    /// Overrides the sampling decision unconditionally. Every subsequent
    /// reader — including finalization, if it hasn't run yet — sees this
    /// decision.
    pub fn override_sampling_priority(&self, priority: SamplingPriority) {
        self.decision.set(SamplingDecision {
            priority,
            mechanism: SamplingMechanism::Manual,
            origin: DecisionOrigin::Local,
            configured_rate: None,
            limiter_effective_rate: None,
            limiter_max_per_second: None,
        });
    }

    /// Snapshots the data an injector needs under the segment's lock.
    pub fn snapshot_for_injection(&self, full_w3c_trace_id_hex: Option<String>) -> InjectSnapshot {
        let decision = self.decision.get();
        let priority = decision.as_ref().map(|d| d.priority).unwrap_or(SamplingPriority::AUTO_KEEP);
        let trace_tags = self.trace_tags.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let root_span_id = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .spans
            .first()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).span_id)
            .unwrap_or(SpanId::ZERO);

        InjectSnapshot {
            trace_id: self.trace_id,
            span_id: root_span_id,
            sampling_priority: priority,
            origin: self.origin.clone(),
            trace_tags,
            full_w3c_trace_id_hex,
            additional_w3c_tracestate: self.additional_w3c_tracestate.clone(),
            additional_datadog_w3c_tracestate: self.additional_datadog_w3c_tracestate.clone(),
            max_tags_header_len: self.max_tags_header_len,
            max_tracestate_len: self.max_tracestate_len,
        }
    }

    /// Injects outbound headers for every configured style. A lone `None`
    /// style is skipped entirely rather than writing nothing for one format.
    pub fn inject(&self, sink: &mut dyn crate::propagation::header::HeaderSink, full_w3c_trace_id_hex: Option<String>) {
        if self.injection_styles == [PropagationStyle::None] {
            return;
        }
        let snapshot = self.snapshot_for_injection(full_w3c_trace_id_hex);
        let mut diagnostics = InjectDiagnostics::default();
        for style in &self.injection_styles {
            style.inject(&snapshot, sink, &mut diagnostics);
        }
        if !diagnostics.errors.is_empty() {
            if let Some(root) = self.state.lock().unwrap_or_else(|e| e.into_inner()).spans.first() {
                let mut root = root.lock().unwrap_or_else(|e| e.into_inner());
                for (key, value) in diagnostics.errors {
                    root.set_internal_tag(key, value);
                }
            }
        }
    }

    pub(crate) fn notify_span_finished(self: &Arc<Self>) {
        let should_finalize = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.finished += 1;
            debug_assert!(state.finished <= state.spans.len());
            state.finished == state.spans.len() && !state.finalized
        };
        if should_finalize {
            {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                state.finalized = true;
            }
            self.finalize();
        }
    }

    /// Runs exactly once, on whichever thread finishes the last span.
    fn finalize(self: &Arc<Self>) {
        let spans = self.state.lock().unwrap_or_else(|e| e.into_inner()).spans.clone();

        let root = spans.first().cloned();
        let Some(root) = root else { return };

        let decision = self.decision.get_or_init(|| {
            let root_guard = root.lock().unwrap_or_else(|e| e.into_inner());
            let input = SampleInput {
                trace_id_low: self.trace_id.low,
                service: &root_guard.service,
                name: &root_guard.name,
                resource: &root_guard.resource,
                tags: &root_guard.tags,
            };
            self.trace_sampler.decide(&input, &self.env, None)
        });

        if decision.priority.is_drop() {
            for span in &spans {
                let input = {
                    let guard = span.lock().unwrap_or_else(|e| e.into_inner());
                    SampleInput {
                        trace_id_low: self.trace_id.low,
                        service: &guard.service,
                        name: &guard.name,
                        resource: &guard.resource,
                        tags: &guard.tags,
                    }
                };
                if let Some(outcome) = self.span_sampler.sample(&input) {
                    let mut guard = span.lock().unwrap_or_else(|e| e.into_inner());
                    guard.set_internal_numeric_tag(numeric::SPAN_SAMPLING_MECHANISM, outcome.mechanism.as_i32() as f64);
                    guard.set_internal_numeric_tag(numeric::SPAN_SAMPLING_RULE_RATE, outcome.rule_rate);
                    if let Some(max) = outcome.max_per_second {
                        guard.set_internal_numeric_tag(numeric::SPAN_SAMPLING_MAX_PER_SECOND, max);
                    }
                }
            }
        }

        {
            let mut trace_tags = self.trace_tags.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((key, value)) = decision.decision_maker_tag() {
                trace_tags.insert(key.to_string(), value);
            } else {
                trace_tags.remove(propagation::DECISION_MAKER);
            }

            let mut root_guard = root.lock().unwrap_or_else(|e| e.into_inner());
            for (key, value) in trace_tags.iter() {
                root_guard.set_internal_tag(key.clone(), value.clone());
            }
            root_guard.set_internal_numeric_tag(numeric::SAMPLING_PRIORITY_V1, decision.priority.0 as f64);
            if let Some(hostname) = &self.hostname {
                root_guard.set_internal_tag(propagation::HOSTNAME, hostname.clone());
            }
            if decision.origin == DecisionOrigin::Local {
                match decision.mechanism {
                    SamplingMechanism::AgentRate => {
                        if let Some(rate) = decision.configured_rate {
                            root_guard.set_internal_numeric_tag(numeric::AGENT_PSR, rate);
                        }
                    }
                    SamplingMechanism::Rule => {
                        if let Some(rate) = decision.configured_rate {
                            root_guard.set_internal_numeric_tag(numeric::RULE_PSR, rate);
                        }
                        if let Some(limit) = decision.limiter_effective_rate {
                            root_guard.set_internal_numeric_tag(numeric::LIMIT_PSR, limit);
                        }
                    }
                    _ => {}
                }
            }
        }

        if let Some(origin) = &self.origin {
            for span in &spans {
                span.lock().unwrap_or_else(|e| e.into_inner()).set_internal_tag("_dd.origin", origin.clone());
            }
        }

        if !self.extraction_errors.is_empty() {
            let mut root_guard = root.lock().unwrap_or_else(|e| e.into_inner());
            for (key, value) in &self.extraction_errors {
                root_guard.set_internal_tag(*key, value.clone());
            }
        }

        let finished_spans: Vec<SpanData> = spans
            .into_iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect();

        if self.finalized_tx.unbounded_send(FinalizedBatch { spans: finished_spans }).is_err() {
            warn!("no collector loop is draining finalized trace batches; dropping segment {}", self.trace_id);
        }
    }
}

/// Drains finalized batches and forwards them to `collector`, feeding
/// `trace_sampler` any agent rate updates the collector relays back.
/// The facade spawns this on whatever async runtime it owns — the core
/// itself never starts one.
pub async fn run_collector_loop(
    mut rx: mpsc::UnboundedReceiver<FinalizedBatch>,
    collector: Arc<dyn Collector>,
    trace_sampler: Arc<TraceSampler>,
) {
    use futures_util::StreamExt;
    while let Some(batch) = rx.next().await {
        if let Err(err) = collector.send(batch.spans, &trace_sampler).await {
            error!(error = %err, "collector failed to accept finished trace batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::sampling::{SamplingRule, SpanSampler, TraceSampler};

    fn config() -> TraceSegmentConfig {
        TraceSegmentConfig {
            trace_sampler: Arc::new(TraceSampler::new(vec![], 100.0, 1.0)),
            span_sampler: Arc::new(SpanSampler::new(vec![])),
            id_generator: Arc::new(crate::idgen::RandomIdGenerator),
            clock: Arc::new(SystemClock),
            env: "test".to_string(),
            hostname: None,
            injection_styles: vec![PropagationStyle::Datadog],
            max_tags_header_len: 512,
            max_tracestate_len: 512,
        }
    }

    #[test]
    fn finalizes_once_last_span_finishes() {
        let (segment, root, mut rx) = TraceSegment::start(
            config(),
            None,
            SpanId::ZERO,
            None,
            BTreeMap::new(),
            None,
            None,
            None,
            Vec::new(),
            "svc",
            "web.request",
            "GET /",
        );
        let child = root.create_child("svc", "db.query", "SELECT 1");
        drop(child);
        assert!(rx.try_next().is_err() || rx.try_next().unwrap().is_none());
        drop(root);
        let batch = rx.try_next().unwrap().unwrap();
        assert_eq!(batch.spans.len(), 2);
        let _ = segment.trace_id();
    }

    #[test]
    fn manual_override_wins_over_trace_sampler() {
        let cfg = TraceSegmentConfig {
            trace_sampler: Arc::new(TraceSampler::new(vec![], 100.0, 0.0)),
            ..config()
        };
        let (_segment, root, mut rx) = TraceSegment::start(
            cfg,
            None,
            SpanId::ZERO,
            None,
            BTreeMap::new(),
            None,
            None,
            None,
            Vec::new(),
            "svc",
            "web.request",
            "GET /",
        );
        root.override_sampling_priority(SamplingPriority::USER_KEEP);
        drop(root);
        let batch = rx.try_next().unwrap().unwrap();
        let root_span = &batch.spans[0];
        assert_eq!(
            root_span.numeric_tags.get(numeric::SAMPLING_PRIORITY_V1),
            Some(&2.0)
        );
    }

    #[test]
    fn span_sampling_rescues_span_from_dropped_trace() {
        let rule = SamplingRule {
            service: Some("svc".to_string()),
            name: None,
            resource: None,
            tags: vec![],
            rate: 1.0,
            mechanism: SamplingMechanism::SpanRule,
            max_per_second: None,
        };
        let cfg = TraceSegmentConfig {
            trace_sampler: Arc::new(TraceSampler::new(vec![], 100.0, 0.0)),
            span_sampler: Arc::new(SpanSampler::new(vec![rule])),
            ..config()
        };
        let (_segment, root, mut rx) = TraceSegment::start(
            cfg,
            None,
            SpanId::ZERO,
            None,
            BTreeMap::new(),
            None,
            None,
            None,
            Vec::new(),
            "svc",
            "web.request",
            "GET /",
        );
        root.override_sampling_priority(SamplingPriority::USER_DROP);
        let child = root.create_child("svc", "db.query", "SELECT 1");
        drop(child);
        drop(root);
        let batch = rx.try_next().unwrap().unwrap();
        let child_span = batch.spans.iter().find(|s| s.parent_id != SpanId::ZERO).unwrap();
        assert_eq!(
            child_span.numeric_tags.get(numeric::SPAN_SAMPLING_MECHANISM),
            Some(&8.0)
        );
    }
}
