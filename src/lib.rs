//! Distributed-tracing core: context propagation across several wire
//! formats, the trace segment lifecycle, and the sampling engine that
//! decides whether a trace is kept.
//!
//! This crate does not talk to an agent, load configuration, or generate
//! logging output on its own — those are the job of an application-facing
//! facade built on top of it. What lives here is the part every such facade
//! needs identically: parsing and writing propagation headers, tracking a
//! trace segment's finished-span count to the point it can hand a batch to
//! a collector, and computing the sampling decision that batch carries.

pub mod clock;
pub mod collector;
pub mod error;
pub mod id;
pub mod idgen;
pub mod propagation;
pub mod sampling;
pub mod segment;
pub mod span;
pub mod tags;

pub use clock::{Clock, SystemClock, Timestamp};
pub use collector::Collector;
pub use error::CollectorError;
pub use id::{IdParseError, SpanId, TraceId};
pub use idgen::{IdGenerator, RandomIdGenerator};
pub use propagation::{ExtractedContext, HeaderSink, HeaderSource, PropagationStyle};
pub use sampling::{SamplingDecision, SamplingMechanism, SamplingPriority, SpanSampler, TraceSampler};
pub use segment::{run_collector_loop, FinalizedBatch, TraceSegment, TraceSegmentConfig};
pub use span::{Span, SpanData};
