//! The collector contract: hands a finished batch of spans off to whatever
//! transport the application wires in. No HTTP client lives in this crate;
//! an application-facing facade supplies the implementation.

use async_trait::async_trait;

use crate::error::CollectorError;
use crate::sampling::TraceSampler;
use crate::span::SpanData;

/// Receives a finished trace segment's spans and forwards them to an agent.
/// `sampler` gives the collector a place to feed back agent-provided rates
/// after a response, via [`TraceSampler::update_agent_rate`].
#[async_trait]
pub trait Collector: Send + Sync {
    async fn send(&self, spans: Vec<SpanData>, sampler: &TraceSampler) -> Result<(), CollectorError>;
}
