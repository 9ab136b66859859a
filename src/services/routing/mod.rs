//! Adaptive Guardian router.
//!
//! Routes task text to a Guardian with the table-driven scorer in
//! [`keywords`] and adjusts confidence from recorded outcomes.
//!
//! # Confidence
//!
//! ```text
//! match_strength = 0.3                          if no keyword matched (fallback)
//!                = min(1, 0.5 + 0.1 * matched)  otherwise
//! smoothed_rate  = (successes + 1) / (total + 2)
//! confidence     = match_strength * (0.5 + 0.5 * smoothed_rate)
//! ```
//!
//! For a fixed query, each recorded success raises `smoothed_rate` and each
//! recorded failure lowers it, so confidence moves monotonically with the
//! outcome run and stays within `(0, 1]`.

pub mod keywords;

use crate::config::DEFAULT_GUARDIAN;
use crate::models::{
    GuardianConfig, GuardianProfile, Outcome, RoutingDecision, RoutingStats, canonical_guardians,
};
use crate::{Error, Result};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::instrument;

const FALLBACK_STRENGTH: f64 = 0.3;

#[derive(Debug, Default)]
struct RouterState {
    profiles: Vec<GuardianProfile>,
    total_routes: u64,
    total_latency: Duration,
    total_confidence: f64,
    outcomes_recorded: u64,
}

/// Keyword router with learned confidence.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::RoutingEngine;
///
/// let router = RoutingEngine::new();
/// let decision = router.route("database schema");
/// assert_eq!(decision.guardian_id, "lyssandria");
/// assert_eq!(decision.matched_keywords, vec!["database", "schema"]);
/// ```
#[derive(Debug)]
pub struct RoutingEngine {
    state: RwLock<RouterState>,
    default_guardian: String,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine {
    /// Creates a router over the canonical Guardians, defaulting to Shinkami.
    #[must_use]
    pub fn new() -> Self {
        let profiles = canonical_guardians()
            .iter()
            .map(|g| profile_for(g, keywords::domain_keywords(&g.id)))
            .collect();
        Self {
            state: RwLock::new(RouterState {
                profiles,
                ..RouterState::default()
            }),
            default_guardian: DEFAULT_GUARDIAN.to_string(),
        }
    }

    /// Sets the fallback Guardian.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the Guardian is not in the table.
    pub fn with_default_guardian(mut self, guardian_id: &str) -> Result<Self> {
        if self.guardian_profile(guardian_id).is_none() {
            return Err(Error::InvalidInput(format!(
                "default guardian '{guardian_id}' is not registered with the router"
            )));
        }
        self.default_guardian = guardian_id.to_string();
        Ok(self)
    }

    /// The fallback Guardian id.
    #[must_use]
    pub fn default_guardian(&self) -> &str {
        &self.default_guardian
    }

    /// Appends a Guardian to the routing table.
    ///
    /// Appended entries lose ties to every earlier entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the entry is malformed or its id or
    /// frequency is already routed.
    pub fn register_guardian(&self, config: &GuardianConfig, domain_keywords: &[&str]) -> Result<()> {
        config.validate()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state
            .profiles
            .iter()
            .any(|p| p.id == config.id || p.frequency == config.frequency)
        {
            return Err(Error::InvalidInput(format!(
                "guardian '{}' (frequency {}) is already routed",
                config.id, config.frequency
            )));
        }
        state.profiles.push(profile_for(config, domain_keywords));
        Ok(())
    }

    /// Routes task text to a Guardian. Never fails; unmatched text goes to
    /// the default Guardian.
    #[instrument(name = "guardian_cognition.router.route", skip(self, text), fields(text_len = text.len()))]
    pub fn route(&self, text: &str) -> RoutingDecision {
        let start = Instant::now();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let best = keywords::best_match(text, state.profiles.iter().map(|p| p.domains.as_slice()));
        let (index, matched) = match best {
            Some(found) => found,
            None => {
                let index = state
                    .profiles
                    .iter()
                    .position(|p| p.id == self.default_guardian)
                    .unwrap_or(0);
                (index, Vec::new())
            },
        };

        let Some(profile) = state.profiles.get(index) else {
            return RoutingDecision {
                guardian_id: self.default_guardian.clone(),
                guardian_name: self.default_guardian.clone(),
                gate: String::new(),
                frequency: 0,
                confidence: FALLBACK_STRENGTH * 0.5,
                reasoning: "Routing table is empty; using the default Guardian".to_string(),
                matched_keywords: Vec::new(),
                latency: start.elapsed(),
            };
        };

        let confidence = confidence(matched.len(), profile);
        let reasoning = if matched.is_empty() {
            format!(
                "No domain keywords matched; defaulting to {} ({} Gate)",
                profile.name, profile.gate
            )
        } else {
            format!(
                "Routed to {} ({} Gate): matched {} domain keyword(s): {}",
                profile.name,
                profile.gate,
                matched.len(),
                matched.join(", ")
            )
        };
        let mut decision = RoutingDecision {
            guardian_id: profile.id.clone(),
            guardian_name: profile.name.clone(),
            gate: profile.gate.clone(),
            frequency: profile.frequency,
            confidence,
            reasoning,
            matched_keywords: matched,
            latency: Duration::ZERO,
        };

        decision.latency = start.elapsed();
        state.total_routes += 1;
        state.total_latency += decision.latency;
        state.total_confidence += decision.confidence;
        drop(state);

        metrics::counter!("router_route_total", "guardian" => decision.guardian_id.clone())
            .increment(1);
        metrics::histogram!("router_confidence").record(decision.confidence);
        tracing::debug!(
            guardian_id = %decision.guardian_id,
            confidence = decision.confidence,
            matched = decision.matched_keywords.len(),
            "routed task"
        );
        decision
    }

    /// Records the outcome of a routed task against the addressed Guardian.
    ///
    /// Only that Guardian's counters change; earlier decisions are not
    /// revisited. Returns false if the Guardian is not in the table.
    pub fn record_outcome(&self, decision: &RoutingDecision, outcome: Outcome, reward: f64) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(profile) = state
            .profiles
            .iter_mut()
            .find(|p| p.id == decision.guardian_id)
        else {
            tracing::warn!(guardian_id = %decision.guardian_id, "outcome for unrouted guardian");
            return false;
        };

        profile.total_tasks += 1;
        if outcome.is_success() {
            profile.successes += 1;
            profile.pattern_count += 1;
        }
        let success_rate = profile.success_rate();
        state.outcomes_recorded += 1;
        drop(state);

        tracing::debug!(
            guardian_id = %decision.guardian_id,
            outcome = %outcome,
            reward,
            success_rate,
            "router outcome recorded"
        );
        true
    }

    /// Returns a copy of one Guardian's profile.
    #[must_use]
    pub fn guardian_profile(&self, guardian_id: &str) -> Option<GuardianProfile> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.profiles.iter().find(|p| p.id == guardian_id).cloned()
    }

    /// Returns copies of every profile in table order.
    #[must_use]
    pub fn all_profiles(&self) -> Vec<GuardianProfile> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.profiles.clone()
    }

    /// Returns running routing statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> RoutingStats {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.total_routes == 0 {
            return RoutingStats {
                outcomes_recorded: state.outcomes_recorded,
                ..RoutingStats::default()
            };
        }
        let routes = u32::try_from(state.total_routes).unwrap_or(u32::MAX);
        RoutingStats {
            total_routes: state.total_routes,
            avg_latency: state.total_latency / routes,
            avg_confidence: state.total_confidence / state.total_routes as f64,
            outcomes_recorded: state.outcomes_recorded,
        }
    }

    /// Clears every learned statistic, keeping the routing table.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for profile in &mut state.profiles {
            profile.successes = 0;
            profile.total_tasks = 0;
            profile.pattern_count = 0;
        }
        state.total_routes = 0;
        state.total_latency = Duration::ZERO;
        state.total_confidence = 0.0;
        state.outcomes_recorded = 0;
    }
}

fn profile_for(config: &GuardianConfig, domain_keywords: &[&str]) -> GuardianProfile {
    GuardianProfile {
        id: config.id.clone(),
        name: config.name.clone(),
        gate: config.gate.clone(),
        frequency: config.frequency,
        element: config.element.clone(),
        domains: domain_keywords.iter().map(|k| k.to_lowercase()).collect(),
        successes: 0,
        total_tasks: 0,
        pattern_count: 0,
    }
}

#[allow(clippy::cast_precision_loss)]
fn confidence(matched: usize, profile: &GuardianProfile) -> f64 {
    let strength = if matched == 0 {
        FALLBACK_STRENGTH
    } else {
        0.1f64.mul_add(matched as f64, 0.5).min(1.0)
    };
    (strength * 0.5f64.mul_add(profile.smoothed_success_rate(), 0.5)).clamp(f64::MIN_POSITIVE, 1.0)
}
