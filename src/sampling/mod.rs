//! The sampling engine: [`trace_sampler::TraceSampler`] makes the one
//! trace-wide keep/drop call, [`span_sampler::SpanSampler`] rescues
//! individual spans out of an otherwise-dropped trace, and
//! [`decision::SamplingDecisionState`] is the thread-safe holder both of
//! them, and `TraceSegment`, read and write through.

pub mod decision;
pub mod limiter;
pub mod rule;
pub mod span_sampler;
pub mod trace_sampler;

pub use decision::{DecisionOrigin, SamplingDecision, SamplingDecisionState};
pub use rule::SamplingRule;
pub use span_sampler::SpanSampler;
pub use trace_sampler::TraceSampler;

/// Semantic buckets for a sampling priority. Values `<= 0` mean drop,
/// values `> 0` mean keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SamplingPriority(pub i32);

impl SamplingPriority {
    pub const USER_DROP: SamplingPriority = SamplingPriority(-1);
    pub const AUTO_DROP: SamplingPriority = SamplingPriority(0);
    pub const AUTO_KEEP: SamplingPriority = SamplingPriority(1);
    pub const USER_KEEP: SamplingPriority = SamplingPriority(2);

    pub fn is_keep(&self) -> bool {
        self.0 > 0
    }

    pub fn is_drop(&self) -> bool {
        self.0 <= 0
    }
}

impl std::fmt::Display for SamplingPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tag attached to every decision identifying which rule/source made it
/// (carried on the wire as the `_dd.p.dm` propagation tag).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingMechanism {
    Default = 0,
    AgentRate = 1,
    RemoteAutoRate = 2,
    Rule = 3,
    Manual = 4,
    AppDecision = 5,
    RemoteUserRate = 6,
    SpanRule = 8,
}

impl SamplingMechanism {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Option<SamplingMechanism> {
        match value {
            0 => Some(SamplingMechanism::Default),
            1 => Some(SamplingMechanism::AgentRate),
            2 => Some(SamplingMechanism::RemoteAutoRate),
            3 => Some(SamplingMechanism::Rule),
            4 => Some(SamplingMechanism::Manual),
            5 => Some(SamplingMechanism::AppDecision),
            6 => Some(SamplingMechanism::RemoteUserRate),
            8 => Some(SamplingMechanism::SpanRule),
            _ => None,
        }
    }
}

impl std::fmt::Display for SamplingMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// The view of a span's identity a sampler needs in order to decide,
/// borrowed rather than owned so [`trace_sampler::TraceSampler::decide`] and
/// [`span_sampler::SpanSampler::sample`] don't need to clone tag maps.
#[derive(Clone, Copy, Debug)]
pub struct SampleInput<'a> {
    pub trace_id_low: u64,
    pub service: &'a str,
    pub name: &'a str,
    pub resource: &'a str,
    pub tags: &'a std::collections::HashMap<String, String>,
}
