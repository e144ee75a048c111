//! Context propagation: extracting inbound trace context from request
//! headers in several wire formats, merging concurrently-produced contexts
//! into one, and injecting outbound headers from a trace segment's current
//! state.

pub mod context;
pub mod extract;
pub mod header;
pub mod inject;
pub mod merge;

pub use context::ExtractedContext;
pub use header::{AuditedReader, HeaderSink, HeaderSource};
pub use merge::merge_contexts;

/// Which wire format a context came from (or, for outbound, which format to
/// write). A closed enum of tagged variants rather than a trait object, since
/// the set of formats is fixed and known at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropagationStyle {
    Datadog,
    B3,
    W3C,
    None,
}

impl PropagationStyle {
    pub fn extract(&self, source: &dyn HeaderSource) -> ExtractedContext {
        match self {
            PropagationStyle::Datadog => extract::datadog::extract(source),
            PropagationStyle::B3 => extract::b3::extract(source),
            PropagationStyle::W3C => extract::w3c::extract(source),
            PropagationStyle::None => ExtractedContext::empty(*self),
        }
    }

    /// `snapshot` is a copy of the data an injector needs, taken under the
    /// segment's lock by the caller. Diagnostics (e.g. `inject_max_size`)
    /// are appended to `diagnostics` for the caller to stamp onto the root
    /// span.
    pub fn inject(
        &self,
        snapshot: &inject::InjectSnapshot,
        sink: &mut dyn HeaderSink,
        diagnostics: &mut inject::InjectDiagnostics,
    ) {
        match self {
            PropagationStyle::Datadog => inject::datadog::inject(snapshot, sink, diagnostics),
            PropagationStyle::B3 => inject::b3::inject(snapshot, sink, diagnostics),
            PropagationStyle::W3C => inject::w3c::inject(snapshot, sink),
            PropagationStyle::None => {}
        }
    }
}
