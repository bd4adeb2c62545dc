use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::sampling;
use crate::models::{CategoryVector, ComponentRewardVector, FeedbackKind, RewardCategory, WeightVector};

/// Fixed id of the singleton bandit row
pub const BANDIT_STATE_ID: &str = "global";

/// Floor on the signal strength so neutral feedback still counts as a trial
const MIN_SIGNAL_STRENGTH: f64 = 0.1;

/// Floor on every per-arm trial increment
const MIN_TRIAL_INCREMENT: f64 = 0.05;

/// Global Beta-Bernoulli bandit over the six reward categories
///
/// `BanditState::default()` is the uninitialized state: zero accumulators and
/// the default weight vector. Every feedback event moves all six arms together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanditState {
    pub weights: WeightVector,
    pub trials: CategoryVector,
    pub successes: CategoryVector,
    pub last_updated: DateTime<Utc>,
}

impl Default for BanditState {
    fn default() -> Self {
        Self {
            weights: CategoryVector::default_weights(),
            trials: CategoryVector::default(),
            successes: CategoryVector::default(),
            last_updated: Utc::now(),
        }
    }
}

impl BanditState {
    /// Fold one reward vector into the trial/success accumulators
    pub fn record(&mut self, rewards: &ComponentRewardVector, feedback: FeedbackKind) {
        let feedback_score = feedback.score();
        let signal_strength = feedback_score.abs().max(MIN_SIGNAL_STRENGTH);

        for category in RewardCategory::ALL {
            let reward = rewards[category];
            let reward = if reward.is_finite() { reward } else { 0.0 };
            let trial_increment = (reward * signal_strength).max(MIN_TRIAL_INCREMENT);

            let success_increment = if feedback_score > 0.0 {
                trial_increment
            } else if feedback_score == 0.0 {
                trial_increment * 0.5
            } else {
                trial_increment * 0.1
            };

            self.trials[category] += trial_increment;
            self.successes[category] =
                self.trials[category].min(self.successes[category] + success_increment);
        }
    }

    /// Draw a fresh weight vector from the per-arm Beta posteriors
    pub fn resample<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let samples = sample_posteriors(&self.trials, &self.successes, rng);
        self.weights = normalize_weights(&samples);
    }

    /// Record feedback, resample weights and stamp the update time
    pub fn learn<R: Rng + ?Sized>(
        &mut self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
        rng: &mut R,
    ) {
        self.record(rewards, feedback);
        self.resample(rng);
        self.last_updated = Utc::now();
    }

    /// Posterior mean of each arm, Beta(successes + 1, failures + 1)
    pub fn posterior_means(&self) -> CategoryVector {
        CategoryVector::from_fn(|c| {
            let (alpha, beta) = posterior_params(self.trials[c], self.successes[c]);
            alpha / (alpha + beta)
        })
    }

    /// `successes <= trials` and both non-negative on every arm
    pub fn is_consistent(&self) -> bool {
        RewardCategory::ALL.iter().all(|&c| {
            let trials = self.trials[c];
            let successes = self.successes[c];
            trials >= 0.0 && successes >= 0.0 && successes <= trials
        })
    }
}

#[inline]
fn posterior_params(trials: f64, successes: f64) -> (f64, f64) {
    let alpha = successes + 1.0;
    let beta = (trials - successes).max(0.0) + 1.0;
    (alpha, beta)
}

/// One Beta draw per arm using the gamma ratio method
pub fn sample_posteriors<R: Rng + ?Sized>(
    trials: &CategoryVector,
    successes: &CategoryVector,
    rng: &mut R,
) -> CategoryVector {
    CategoryVector::from_fn(|c| {
        let (alpha, beta) = posterior_params(trials[c], successes[c]);
        sampling::beta(alpha, beta, rng)
    })
}

/// Normalize raw samples to sum to 1, rounded to 4 decimals
///
/// An all-zero sample falls back to the default weight vector.
pub fn normalize_weights(samples: &CategoryVector) -> WeightVector {
    let total = samples.sum();
    if !(total > 0.0) || !total.is_finite() {
        return CategoryVector::default_weights();
    }
    CategoryVector::from_fn(|c| round4(samples[c] / total))
}

#[inline]
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
