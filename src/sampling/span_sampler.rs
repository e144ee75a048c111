//! Per-span rescue sampling, consulted only when a trace is being dropped.

use std::collections::HashMap;

use super::limiter::RateLimiter;
use super::rule::SamplingRule;
use super::trace_sampler::deterministic_sample;
use super::{SampleInput, SamplingMechanism};

/// The tags to stamp on a span that a span-sampling rule rescued, matching
/// the numeric tag names the trace segment finalizer writes.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanSamplingOutcome {
    pub mechanism: SamplingMechanism,
    pub rule_rate: f64,
    pub max_per_second: Option<f64>,
}

struct ConfiguredRule {
    rule: SamplingRule,
    limiter: Option<RateLimiter>,
}

/// Configured independently of [`super::TraceSampler`], with its own rule
/// set and (optionally, per rule) its own rate limiter.
#[derive(Default)]
pub struct SpanSampler {
    rules: Vec<ConfiguredRule>,
}

impl std::fmt::Debug for SpanSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanSampler")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl SpanSampler {
    pub fn new(rules: Vec<SamplingRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let limiter = rule.max_per_second.map(RateLimiter::new);
                ConfiguredRule { rule, limiter }
            })
            .collect();
        SpanSampler { rules }
    }

    /// For one span in a dropped trace: if a rule matches and its own
    /// sampling/limiting accepts, return the outcome to stamp on the span;
    /// `None` means the span stays dropped along with the trace.
    pub fn sample(&self, input: &SampleInput<'_>) -> Option<SpanSamplingOutcome> {
        let configured = self.rules.iter().find(|c| c.rule.matches(input))?;
        if !deterministic_sample(input.trace_id_low, configured.rule.rate) {
            return None;
        }
        if let Some(limiter) = &configured.limiter {
            if !limiter.allow() {
                return None;
            }
        }
        Some(SpanSamplingOutcome {
            mechanism: SamplingMechanism::SpanRule,
            rule_rate: configured.rule.rate,
            max_per_second: configured.rule.max_per_second,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(service: &str, rate: f64, max_per_second: Option<f64>) -> SamplingRule {
        SamplingRule {
            service: Some(service.to_string()),
            name: None,
            resource: None,
            tags: vec![],
            rate,
            mechanism: SamplingMechanism::SpanRule,
            max_per_second,
        }
    }

    #[test]
    fn no_matching_rule_yields_none() {
        let sampler = SpanSampler::new(vec![rule("checkout", 1.0, None)]);
        let tags = HashMap::new();
        let input = SampleInput {
            trace_id_low: 1,
            service: "payments",
            name: "db.query",
            resource: "SELECT",
            tags: &tags,
        };
        assert!(sampler.sample(&input).is_none());
    }

    #[test]
    fn matching_rule_rescues_span() {
        let sampler = SpanSampler::new(vec![rule("checkout", 1.0, None)]);
        let tags = HashMap::new();
        let input = SampleInput {
            trace_id_low: 1,
            service: "checkout",
            name: "db.query",
            resource: "SELECT",
            tags: &tags,
        };
        let outcome = sampler.sample(&input).unwrap();
        assert_eq!(outcome.mechanism, SamplingMechanism::SpanRule);
        assert_eq!(outcome.rule_rate, 1.0);
    }

    #[test]
    fn per_rule_limiter_caps_rescues() {
        let sampler = SpanSampler::new(vec![rule("checkout", 1.0, Some(1.0))]);
        let tags = HashMap::new();
        let input = SampleInput {
            trace_id_low: 1,
            service: "checkout",
            name: "db.query",
            resource: "SELECT",
            tags: &tags,
        };
        assert!(sampler.sample(&input).is_some());
        assert!(sampler.sample(&input).is_none());
    }
}
