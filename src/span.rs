//! [`SpanData`]: the data held for one span. [`Span`]: the scoped handle an
//! application holds while a span is active.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Timestamp;
use crate::id::{SpanId, TraceId};
use crate::sampling::SamplingPriority;
use crate::segment::TraceSegment;
use crate::tags::is_reserved;

/// One span's mutable state. Held behind its own `Mutex` so the owning
/// [`Span`] handle can mutate tags without taking the segment's structural
/// lock.
#[derive(Clone, Debug)]
pub struct SpanData {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_id: SpanId,
    pub service: String,
    /// Datadog's `span.type` rendering hint — a dedicated field rather than
    /// a general tag, since it drives UI rendering rather than being free
    /// user metadata.
    pub span_type: Option<String>,
    pub name: String,
    pub resource: String,
    pub start: Timestamp,
    pub duration: Option<Duration>,
    pub error: bool,
    pub tags: BTreeMap<String, String>,
    pub numeric_tags: BTreeMap<String, f64>,
}

impl SpanData {
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        parent_id: SpanId,
        service: impl Into<String>,
        name: impl Into<String>,
        resource: impl Into<String>,
        start: Timestamp,
    ) -> Self {
        SpanData {
            trace_id,
            span_id,
            parent_id,
            service: service.into(),
            span_type: None,
            name: name.into(),
            resource: resource.into(),
            start,
            duration: None,
            error: false,
            tags: BTreeMap::new(),
            numeric_tags: BTreeMap::new(),
        }
    }

    /// No-op (rather than an error) when `key` is in the reserved internal
    /// namespace — observable as the tag simply not being present afterward.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if is_reserved(&key) {
            return;
        }
        self.tags.insert(key, value.into());
    }

    pub fn remove_tag(&mut self, key: &str) {
        if is_reserved(key) {
            return;
        }
        self.tags.remove(key);
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error = true;
        self.tags.insert("error.message".to_string(), message.into());
    }

    pub fn set_error_type(&mut self, error_type: impl Into<String>) {
        self.error = true;
        self.tags.insert("error.type".to_string(), error_type.into());
    }

    pub fn set_error_stack(&mut self, stack: impl Into<String>) {
        self.error = true;
        self.tags.insert("error.stack".to_string(), stack.into());
    }

    /// Directly sets an internal tag, bypassing [`is_reserved`]. Used only by
    /// finalization and extraction error reporting, never exposed publicly.
    pub(crate) fn set_internal_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub(crate) fn set_internal_numeric_tag(&mut self, key: impl Into<String>, value: f64) {
        self.numeric_tags.insert(key.into(), value);
    }
}

/// Scoped handle onto one span's data. Construction registers the span with
/// its segment; on drop (or explicit [`Span::finish`]) it computes the
/// duration and notifies the segment, which may trigger finalization if this
/// was the last outstanding span.
pub struct Span {
    pub(crate) segment: Arc<TraceSegment>,
    pub(crate) data: Arc<Mutex<SpanData>>,
    span_id: SpanId,
    finished: Cell<bool>,
}

impl Span {
    pub(crate) fn new(segment: Arc<TraceSegment>, data: Arc<Mutex<SpanData>>, span_id: SpanId) -> Self {
        Span {
            segment,
            data,
            span_id,
            finished: Cell::new(false),
        }
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn trace_id(&self) -> TraceId {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).trace_id
    }

    /// Allocates a new span, inheriting `trace_id` and setting `parent_id`
    /// to this span's id, and registers it on the shared segment.
    pub fn create_child(&self, service: impl Into<String>, name: impl Into<String>, resource: impl Into<String>) -> Span {
        self.segment.create_child_span(self.span_id, service, name, resource)
    }

    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).set_tag(key, value);
    }

    pub fn remove_tag(&self, key: &str) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).remove_tag(key);
    }

    pub fn set_span_type(&self, span_type: impl Into<String>) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).span_type = Some(span_type.into());
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).set_error_message(message);
    }

    pub fn set_error_type(&self, error_type: impl Into<String>) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).set_error_type(error_type);
    }

    pub fn set_error_stack(&self, stack: impl Into<String>) {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).set_error_stack(stack);
    }

    /// Sets (or clears, with a keep priority) the manual sampling decision
    /// for this span's whole segment. Visible to every observer afterward,
    /// even ones that already read an earlier decision.
    pub fn override_sampling_priority(&self, priority: SamplingPriority) {
        self.segment.override_sampling_priority(priority);
    }

    /// Finishes the span now, using the configured clock for the end time.
    /// Idempotent: a second call (or the eventual drop) is a no-op.
    pub fn finish(&self) {
        self.finish_internal(None);
    }

    /// Finishes the span with an explicit end tick, for callers that
    /// captured their own timestamp rather than using the segment's clock.
    pub fn finish_at(&self, end_tick: std::time::Instant) {
        self.finish_internal(Some(end_tick));
    }

    fn finish_internal(&self, end_tick: Option<std::time::Instant>) {
        if self.finished.replace(true) {
            return;
        }
        let end_tick = end_tick.unwrap_or_else(|| self.segment.clock().now().tick);
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let start_tick = data.start.tick;
        data.duration = Some(end_tick.saturating_duration_since(start_tick));
        drop(data);
        self.segment.notify_span_finished();
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish_internal(None);
    }
}
