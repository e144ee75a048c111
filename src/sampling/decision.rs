//! [`SamplingDecision`] and its thread-safe holder.

use std::sync::Mutex;

use super::{SamplingMechanism, SamplingPriority};
use crate::tags::propagation::DECISION_MAKER;

/// Where a decision came from: made locally by this process, or carried in
/// on an inbound propagation header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionOrigin {
    Local,
    Extracted,
}

/// A fully-resolved sampling outcome for a trace: the keep/drop priority,
/// which mechanism produced it, whether it was computed locally or carried
/// in from an upstream service, and the rate-related figures worth
/// recording alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingDecision {
    pub priority: SamplingPriority,
    pub mechanism: SamplingMechanism,
    pub origin: DecisionOrigin,
    pub configured_rate: Option<f64>,
    pub limiter_effective_rate: Option<f64>,
    pub limiter_max_per_second: Option<f64>,
}

impl SamplingDecision {
    pub fn extracted(priority: SamplingPriority, mechanism: SamplingMechanism) -> Self {
        SamplingDecision {
            priority,
            mechanism,
            origin: DecisionOrigin::Extracted,
            configured_rate: None,
            limiter_effective_rate: None,
            limiter_max_per_second: None,
        }
    }

    pub fn manual(priority: SamplingPriority) -> Self {
        SamplingDecision {
            priority,
            mechanism: SamplingMechanism::Manual,
            origin: DecisionOrigin::Local,
            configured_rate: None,
            limiter_effective_rate: None,
            limiter_max_per_second: None,
        }
    }

    /// The `_dd.p.dm` propagation tag value, present iff `priority > 0`.
    pub fn decision_maker_tag(&self) -> Option<(&'static str, String)> {
        if self.priority.is_keep() {
            Some((DECISION_MAKER, format!("-{}", self.mechanism.as_i32())))
        } else {
            None
        }
    }
}

/// Thread-safe holder for the decision, shared by every live
/// [`crate::span::Span`] on a segment. This type only guards the decision
/// slot itself; `TraceSegment` composes it alongside its own lock for the
/// other structural state.
#[derive(Debug, Default)]
pub struct SamplingDecisionState {
    decision: Mutex<Option<SamplingDecision>>,
}

impl SamplingDecisionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until either extraction carried a decision in, or finalization
    /// (or a manual override) computed one.
    pub fn get(&self) -> Option<SamplingDecision> {
        self.decision.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_set(&self) -> bool {
        self.decision.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Set the decision if (and only if) it is not already set, returning
    /// the decision now in effect. Used by finalization, which must compute
    /// the decision at most once per segment.
    pub fn get_or_init(&self, make: impl FnOnce() -> SamplingDecision) -> SamplingDecision {
        let mut guard = self.decision.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(make());
        }
        guard.clone().expect("just initialized")
    }

    /// Override the decision unconditionally — the manual-override path,
    /// after which every later observer sees the manual decision.
    pub fn set(&self, decision: SamplingDecision) {
        *self.decision.lock().unwrap_or_else(|e| e.into_inner()) = Some(decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_maker_tag_present_only_when_keep() {
        let keep = SamplingDecision::manual(SamplingPriority::USER_KEEP);
        assert_eq!(keep.decision_maker_tag(), Some((DECISION_MAKER, "-4".to_string())));

        let drop = SamplingDecision::manual(SamplingPriority::USER_DROP);
        assert_eq!(drop.decision_maker_tag(), None);
    }

    #[test]
    fn get_or_init_runs_once() {
        let state = SamplingDecisionState::new();
        let mut calls = 0;
        let first = state.get_or_init(|| {
            calls += 1;
            SamplingDecision::manual(SamplingPriority::AUTO_KEEP)
        });
        let second = state.get_or_init(|| {
            calls += 1;
            SamplingDecision::manual(SamplingPriority::AUTO_DROP)
        });
        assert_eq!(calls, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn set_overrides_unconditionally() {
        let state = SamplingDecisionState::new();
        state.set(SamplingDecision::manual(SamplingPriority::AUTO_KEEP));
        state.set(SamplingDecision::manual(SamplingPriority::USER_DROP));
        assert_eq!(state.get().unwrap().priority, SamplingPriority::USER_DROP);
    }
}
