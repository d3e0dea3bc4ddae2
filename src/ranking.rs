//! # Ranking Engine
//! Turns a skill request into an ordered, explainable list of people.
//!
//! Stages:
//! 1. Candidate generation: available persons whose proficiency index shares
//!    at least one skill with the request. Affinity alone never qualifies.
//! 2. Features per candidate:
//!    - coverage    = |matched| / |required|
//!    - proficiency = mean synthesized rating over matched skills
//!    - affinity    = mean model prediction over all required skills
//! 3. `score = w_c·coverage + w_p·proficiency/5 + w_a·affinity/5`, sorted
//!    descending over the full pool, then truncated to `limit`.
//!
//! Pure, in-memory and lock-free: it only reads an immutable [`Snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::affinity::{AffinityModel, RATING_MAX};
use crate::observations::{PersonId, SkillId};
use crate::synth::Synthesis;

/// Relative priorities of the three features. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub coverage: f64,
    pub proficiency: f64,
    pub affinity: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            coverage: 0.6,
            proficiency: 0.3,
            affinity: 0.1,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> anyhow::Result<()> {
        let parts = [self.coverage, self.proficiency, self.affinity];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            anyhow::bail!("ranking weights must be finite and non-negative: {self:?}");
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("ranking weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }

    /// Combine raw features into one score in [0, 1].
    pub fn combine(&self, coverage: f64, proficiency: f64, affinity: f64) -> f64 {
        self.coverage * coverage
            + self.proficiency * (proficiency / RATING_MAX)
            + self.affinity * (affinity / RATING_MAX)
    }
}

/// Raw sub-scores kept on every result for explainability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    #[serde(rename = "skill_coverage")]
    pub coverage: f64,
    #[serde(rename = "avg_proficiency")]
    pub proficiency: f64,
    #[serde(rename = "affinity_score")]
    pub affinity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "user_id")]
    pub person_id: PersonId,
    pub score: f64,
    pub details: ScoreDetails,
}

/// One published generation of engine state. Built once, never mutated.
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    synthesis: Synthesis,
    /// person → skills with a rating; derived from `synthesis` at build time.
    proficiency_index: HashMap<PersonId, BTreeSet<SkillId>>,
    available: Vec<PersonId>,
    model: Arc<dyn AffinityModel>,
}

impl Snapshot {
    pub fn new(
        generation: u64,
        synthesis: Synthesis,
        available: impl IntoIterator<Item = PersonId>,
        model: Arc<dyn AffinityModel>,
    ) -> Self {
        let mut proficiency_index: HashMap<PersonId, BTreeSet<SkillId>> = HashMap::new();
        for r in &synthesis.ratings {
            proficiency_index
                .entry(r.person_id)
                .or_default()
                .insert(r.skill_id);
        }
        // Stable candidate order, no duplicates.
        let available: Vec<PersonId> = available
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            generation,
            built_at: Utc::now(),
            synthesis,
            proficiency_index,
            available,
            model,
        }
    }

    pub fn rating_count(&self) -> usize {
        self.synthesis.len()
    }

    pub fn person_count(&self) -> usize {
        self.proficiency_index.len()
    }

    pub fn skill_count(&self) -> usize {
        self.proficiency_index
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn skills_of(&self, person_id: PersonId) -> Option<&BTreeSet<SkillId>> {
        self.proficiency_index.get(&person_id)
    }

    pub fn actual_rating(&self, person_id: PersonId, skill_id: SkillId) -> Option<f64> {
        self.synthesis.lookup(person_id, skill_id)
    }

    pub fn affinity(&self, person_id: PersonId, skill_id: SkillId) -> f64 {
        self.model.predict(person_id, skill_id)
    }

    /// Rank the available pool for `required`, returning at most `limit`.
    pub fn recommend(
        &self,
        required: &[SkillId],
        limit: usize,
        weights: &RankingWeights,
    ) -> Vec<Recommendation> {
        let required: BTreeSet<SkillId> = required.iter().copied().collect();
        if required.is_empty() {
            return Vec::new();
        }

        // Stage 1
        let candidates: Vec<(PersonId, Vec<SkillId>)> = self
            .available
            .iter()
            .filter_map(|&person_id| {
                let held = self.proficiency_index.get(&person_id)?;
                let matched: Vec<SkillId> = required.intersection(held).copied().collect();
                (!matched.is_empty()).then_some((person_id, matched))
            })
            .collect();
        tracing::info!(
            candidates = candidates.len(),
            required = required.len(),
            "stage 1: candidate pool generated"
        );

        // Stage 2 + 3
        let mut ranked: Vec<Recommendation> = candidates
            .into_iter()
            .map(|(person_id, matched)| self.score_candidate(person_id, &matched, &required, weights))
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        match ranked.first() {
            Some(top) => tracing::info!(
                person_id = top.person_id,
                score = top.score,
                coverage = top.details.coverage,
                proficiency = top.details.proficiency,
                affinity = top.details.affinity,
                "top recommendation"
            ),
            None => tracing::warn!(skills = ?required, "no suitable recommendations found"),
        }

        ranked.truncate(limit);
        ranked
    }

    fn score_candidate(
        &self,
        person_id: PersonId,
        matched: &[SkillId],
        required: &BTreeSet<SkillId>,
        weights: &RankingWeights,
    ) -> Recommendation {
        let coverage = matched.len() as f64 / required.len() as f64;

        // Missing entries count as 0 but stay in the denominator.
        let proficiency = matched
            .iter()
            .map(|&s| self.synthesis.lookup(person_id, s).unwrap_or(0.0))
            .sum::<f64>()
            / matched.len() as f64;

        let affinity = required
            .iter()
            .map(|&s| self.model.predict(person_id, s))
            .sum::<f64>()
            / required.len() as f64;

        Recommendation {
            person_id,
            score: weights.combine(coverage, proficiency, affinity),
            details: ScoreDetails {
                coverage,
                proficiency,
                affinity,
            },
        }
    }
}
