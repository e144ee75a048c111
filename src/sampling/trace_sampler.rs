//! The trace-wide sampler.

use std::collections::HashMap;
use std::sync::Mutex;

use super::limiter::RateLimiter;
use super::rule::SamplingRule;
use super::{DecisionOrigin, SampleInput, SamplingDecision, SamplingMechanism, SamplingPriority};

/// `(service, env)` → agent-provided rate, populated out of band whenever
/// the collector relays a sampling-rate response back to the tracer, via
/// the `sampler` parameter `Collector::send` is handed.
pub type AgentRateTable = Mutex<HashMap<(String, String), f64>>;

/// Combines rule-based and rate-limited sampling with remote configuration
/// feedback to make the one trace-wide keep/drop decision.
#[derive(Debug)]
pub struct TraceSampler {
    rules: Vec<SamplingRule>,
    limiter: RateLimiter,
    agent_rates: AgentRateTable,
    default_rate: f64,
}

impl TraceSampler {
    pub fn new(rules: Vec<SamplingRule>, limiter_max_per_second: f64, default_rate: f64) -> Self {
        TraceSampler {
            rules,
            limiter: RateLimiter::new(limiter_max_per_second),
            agent_rates: Mutex::new(HashMap::new()),
            default_rate,
        }
    }

    /// Called by the collector after an agent response carries updated
    /// per-service sampling rates.
    pub fn update_agent_rate(&self, service: String, env: String, rate: f64) {
        self.agent_rates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((service, env), rate);
    }

    /// `manual` is `Some` when the application set a manual keep/drop
    /// decision on the root span before it finished, which short-circuits
    /// rule matching, agent rates, and rate limiting entirely.
    pub fn decide(&self, input: &SampleInput<'_>, env: &str, manual: Option<SamplingPriority>) -> SamplingDecision {
        if let Some(priority) = manual {
            return SamplingDecision {
                priority,
                mechanism: SamplingMechanism::Manual,
                origin: DecisionOrigin::Local,
                configured_rate: None,
                limiter_effective_rate: None,
                limiter_max_per_second: None,
            };
        }

        if let Some(rule) = self.rules.iter().find(|r| r.matches(input)) {
            let sampled = deterministic_sample(input.trace_id_low, rule.rate);
            let allowed = sampled && self.limiter.allow();
            return SamplingDecision {
                priority: priority_for(allowed),
                mechanism: SamplingMechanism::Rule,
                origin: DecisionOrigin::Local,
                configured_rate: Some(rule.rate),
                limiter_effective_rate: Some(self.limiter.effective_rate()),
                limiter_max_per_second: Some(self.limiter.max_per_second()),
            };
        }

        let agent_rates = self.agent_rates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&rate) = agent_rates.get(&(input.service.to_string(), env.to_string())) {
            let sampled = deterministic_sample(input.trace_id_low, rate);
            return SamplingDecision {
                priority: priority_for(sampled),
                mechanism: SamplingMechanism::AgentRate,
                origin: DecisionOrigin::Local,
                configured_rate: Some(rate),
                limiter_effective_rate: None,
                limiter_max_per_second: None,
            };
        }
        drop(agent_rates);

        let sampled = deterministic_sample(input.trace_id_low, self.default_rate);
        SamplingDecision {
            priority: priority_for(sampled),
            mechanism: SamplingMechanism::Default,
            origin: DecisionOrigin::Local,
            configured_rate: Some(self.default_rate),
            limiter_effective_rate: None,
            limiter_max_per_second: None,
        }
    }
}

fn priority_for(sampled: bool) -> SamplingPriority {
    if sampled {
        SamplingPriority::AUTO_KEEP
    } else {
        SamplingPriority::AUTO_DROP
    }
}

/// Deterministic hash of the trace id's low 64 bits against `rate`, so every
/// service seeing the same trace id reaches the same keep/drop verdict
/// without coordination. Uses the same Knuth multiplicative hash constant
/// dd-trace's samplers use across languages.
const KNUTH_FACTOR: u64 = 1_111_111_111_111_111_111;

pub fn deterministic_sample(trace_id_low: u64, rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    let hashed = trace_id_low.wrapping_mul(KNUTH_FACTOR);
    (hashed as f64 / u64::MAX as f64) < rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(tags: &'a HashMap<String, String>) -> SampleInput<'a> {
        SampleInput {
            trace_id_low: 42,
            service: "checkout",
            name: "web.request",
            resource: "GET /cart",
            tags,
        }
    }

    #[test]
    fn manual_decision_short_circuits() {
        let sampler = TraceSampler::new(vec![], 100.0, 1.0);
        let tags = HashMap::new();
        let decision = sampler.decide(&input(&tags), "prod", Some(SamplingPriority::USER_DROP));
        assert_eq!(decision.mechanism, SamplingMechanism::Manual);
        assert_eq!(decision.priority, SamplingPriority::USER_DROP);
    }

    #[test]
    fn default_rate_one_always_keeps() {
        let sampler = TraceSampler::new(vec![], 100.0, 1.0);
        let tags = HashMap::new();
        let decision = sampler.decide(&input(&tags), "prod", None);
        assert_eq!(decision.mechanism, SamplingMechanism::Default);
        assert!(decision.priority.is_keep());
    }

    #[test]
    fn default_rate_zero_always_drops() {
        let sampler = TraceSampler::new(vec![], 100.0, 0.0);
        let tags = HashMap::new();
        let decision = sampler.decide(&input(&tags), "prod", None);
        assert!(decision.priority.is_drop());
    }

    #[test]
    fn agent_rate_used_when_no_rule_matches() {
        let sampler = TraceSampler::new(vec![], 100.0, 0.0);
        sampler.update_agent_rate("checkout".to_string(), "prod".to_string(), 1.0);
        let tags = HashMap::new();
        let decision = sampler.decide(&input(&tags), "prod", None);
        assert_eq!(decision.mechanism, SamplingMechanism::AgentRate);
        assert!(decision.priority.is_keep());
    }

    #[test]
    fn rule_takes_priority_over_agent_rate() {
        let rule = SamplingRule {
            service: Some("checkout".to_string()),
            name: None,
            resource: None,
            tags: vec![],
            rate: 1.0,
            mechanism: SamplingMechanism::Rule,
            max_per_second: None,
        };
        let sampler = TraceSampler::new(vec![rule], 100.0, 0.0);
        sampler.update_agent_rate("checkout".to_string(), "prod".to_string(), 0.0);
        let tags = HashMap::new();
        let decision = sampler.decide(&input(&tags), "prod", None);
        assert_eq!(decision.mechanism, SamplingMechanism::Rule);
        assert!(decision.priority.is_keep());
    }

    #[test]
    fn deterministic_sample_is_stable() {
        assert!(deterministic_sample(42, 1.0));
        assert!(!deterministic_sample(42, 0.0));
        assert_eq!(deterministic_sample(42, 0.5), deterministic_sample(42, 0.5));
    }
}
