//! The one error type that crosses the core's API boundary: everything else
//! (parse failures, tag-decoding failures) is converted into a tag on the
//! local-root span rather than returned (see [`crate::propagation`]).

/// Returned by [`crate::collector::Collector::send`]. The core logs this and
/// moves on; it is never propagated back to the application.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("no collector configured")]
    NoTransportConfigured,
}
