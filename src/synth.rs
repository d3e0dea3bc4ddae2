//! # Rating Synthesizer
//! Merges declared (explicit) and history-derived (implicit) proficiency into
//! one rating per (person, skill).
//!
//! Policy:
//! - only explicit → explicit anchor
//! - only implicit → implicit anchor (5.0)
//! - both → `(1 - w)·explicit + w·implicit`, where `w` is a logistic confidence
//!   curve over the person's total completed work (0 for zero experience).
//!
//! Output order is ascending by (person, skill), so re-running on unchanged
//! input is bit-identical.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::observations::{ObservationSet, PersonId, SkillId, IMPLICIT_ANCHOR};

/// Logistic curve parameters for the implicit weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    #[serde(default = "default_steepness")]
    pub steepness: f64,
    #[serde(default = "default_midpoint")]
    pub midpoint: f64,
}

fn default_steepness() -> f64 {
    0.5
}
fn default_midpoint() -> f64 {
    10.0
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            steepness: default_steepness(),
            midpoint: default_midpoint(),
        }
    }
}

/// A synthesized proficiency value in [1, 5].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub person_id: PersonId,
    pub skill_id: SkillId,
    pub value: f64,
}

/// Synthesizer output: the rating list plus O(1) lookup by pair.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub ratings: Vec<Rating>,
    pub actual: HashMap<(PersonId, SkillId), f64>,
}

impl Synthesis {
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn lookup(&self, person_id: PersonId, skill_id: SkillId) -> Option<f64> {
        self.actual.get(&(person_id, skill_id)).copied()
    }
}

/// Weight given to implicit evidence for a person with `completed` items.
pub fn implicit_weight(completed: u32, params: &SynthesisParams) -> f64 {
    if completed == 0 {
        return 0.0;
    }
    let t = f64::from(completed);
    1.0 / (1.0 + (-params.steepness * (t - params.midpoint)).exp())
}

/// Blend one pair. Returns `None` when neither value is present.
pub fn blend(explicit: Option<f64>, implicit: Option<f64>, weight: f64) -> Option<f64> {
    match (explicit, implicit) {
        (Some(e), None) => Some(e),
        (None, Some(i)) => Some(i),
        (Some(e), Some(i)) => Some((1.0 - weight) * e + weight * i),
        (None, None) => None,
    }
}

#[derive(Default)]
struct PairEvidence {
    explicit: Option<f64>,
    implicit: Option<f64>,
}

/// Build the full rating set from one observation snapshot.
/// Empty evidence yields an empty `Synthesis`; callers decide what that means.
pub fn synthesize(obs: &ObservationSet, params: &SynthesisParams) -> Synthesis {
    // Outer join on (person, skill).
    let mut pairs: BTreeMap<(PersonId, SkillId), PairEvidence> = BTreeMap::new();
    for e in &obs.explicit {
        pairs.entry((e.person_id, e.skill_id)).or_default().explicit = Some(e.level.anchor());
    }
    for i in &obs.implicit {
        pairs.entry((i.person_id, i.skill_id)).or_default().implicit = Some(IMPLICIT_ANCHOR);
    }

    // Left join experience; absent persons have 0.
    let experience: HashMap<PersonId, u32> = obs
        .experience
        .iter()
        .map(|x| (x.person_id, x.total_completed))
        .collect();

    let mut ratings = Vec::with_capacity(pairs.len());
    let mut actual = HashMap::with_capacity(pairs.len());
    for ((person_id, skill_id), ev) in pairs {
        let completed = experience.get(&person_id).copied().unwrap_or(0);
        let w = implicit_weight(completed, params);
        let Some(value) = blend(ev.explicit, ev.implicit, w) else {
            continue;
        };
        ratings.push(Rating {
            person_id,
            skill_id,
            value,
        });
        actual.insert((person_id, skill_id), value);
    }

    tracing::info!(
        explicit = obs.explicit.len(),
        implicit = obs.implicit.len(),
        experience = obs.experience.len(),
        ratings = ratings.len(),
        "synthesized ratings"
    );

    Synthesis { ratings, actual }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::{
        ExperienceCount, ExplicitObservation, ImplicitObservation, SkillLevel,
    };

    fn p() -> SynthesisParams {
        SynthesisParams::default()
    }

    fn explicit(person_id: PersonId, skill_id: SkillId, level: SkillLevel) -> ExplicitObservation {
        ExplicitObservation {
            person_id,
            skill_id,
            level,
        }
    }

    fn implicit(person_id: PersonId, skill_id: SkillId, n: u32) -> ImplicitObservation {
        ImplicitObservation {
            person_id,
            skill_id,
            completion_count: n,
        }
    }

    fn exp(person_id: PersonId, n: u32) -> ExperienceCount {
        ExperienceCount {
            person_id,
            total_completed: n,
        }
    }

    #[test]
    fn weight_is_zero_without_experience() {
        assert_eq!(implicit_weight(0, &p()), 0.0);
    }

    #[test]
    fn weight_is_half_at_midpoint() {
        assert_eq!(implicit_weight(10, &p()), 0.5);
    }

    #[test]
    fn weight_is_monotone_non_decreasing() {
        let mut prev = implicit_weight(0, &p());
        for t in 1..200 {
            let w = implicit_weight(t, &p());
            assert!(w >= prev, "w({t})={w} < w({})={prev}", t - 1);
            assert!(w <= 1.0);
            prev = w;
        }
    }

    #[test]
    fn explicit_only_keeps_anchor() {
        let obs = ObservationSet {
            explicit: vec![
                explicit(1, 1, SkillLevel::Beginner),
                explicit(1, 2, SkillLevel::Intermediate),
                explicit(2, 1, SkillLevel::Expert),
            ],
            experience: vec![exp(1, 30)],
            ..Default::default()
        };
        let s = synthesize(&obs, &p());
        assert_eq!(s.lookup(1, 1), Some(2.0));
        assert_eq!(s.lookup(1, 2), Some(3.5));
        assert_eq!(s.lookup(2, 1), Some(5.0));
    }

    #[test]
    fn implicit_only_is_five() {
        let obs = ObservationSet {
            implicit: vec![implicit(1, 9, 3)],
            experience: vec![exp(1, 3)],
            ..Default::default()
        };
        assert_eq!(synthesize(&obs, &p()).lookup(1, 9), Some(5.0));
    }

    #[test]
    fn implicit_only_without_experience_row_is_still_five() {
        let obs = ObservationSet {
            implicit: vec![implicit(1, 9, 1)],
            ..Default::default()
        };
        assert_eq!(synthesize(&obs, &p()).lookup(1, 9), Some(5.0));
    }

    #[test]
    fn beginner_plus_history_at_midpoint_blends_evenly() {
        let obs = ObservationSet {
            explicit: vec![explicit(1, 1, SkillLevel::Beginner)],
            implicit: vec![implicit(1, 1, 10)],
            experience: vec![exp(1, 10)],
            ..Default::default()
        };
        assert_eq!(synthesize(&obs, &p()).lookup(1, 1), Some(3.5));
    }

    #[test]
    fn zero_experience_ignores_implicit_when_both_present() {
        let obs = ObservationSet {
            explicit: vec![explicit(1, 1, SkillLevel::Beginner)],
            implicit: vec![implicit(1, 1, 4)],
            ..Default::default()
        };
        assert_eq!(synthesize(&obs, &p()).lookup(1, 1), Some(2.0));
    }

    #[test]
    fn veteran_leans_on_history() {
        let obs = ObservationSet {
            explicit: vec![explicit(1, 1, SkillLevel::Intermediate)],
            implicit: vec![implicit(1, 1, 25)],
            experience: vec![exp(1, 25)],
            ..Default::default()
        };
        let v = synthesize(&obs, &p()).lookup(1, 1).unwrap();
        assert!(v > 4.9 && v <= 5.0, "got {v}");
    }

    #[test]
    fn pairs_without_evidence_are_not_emitted() {
        let obs = ObservationSet {
            experience: vec![exp(1, 10), exp(2, 4)],
            available: vec![1, 2],
            ..Default::default()
        };
        let s = synthesize(&obs, &p());
        assert!(s.is_empty());
        assert!(s.actual.is_empty());
    }

    #[test]
    fn one_rating_per_pair_and_map_matches_list() {
        let obs = ObservationSet {
            explicit: vec![
                explicit(2, 1, SkillLevel::Expert),
                explicit(1, 1, SkillLevel::Beginner),
            ],
            implicit: vec![implicit(1, 1, 2), implicit(1, 3, 2)],
            experience: vec![exp(1, 2)],
            ..Default::default()
        };
        let s = synthesize(&obs, &p());
        assert_eq!(s.len(), 3);
        assert_eq!(s.actual.len(), 3);
        for r in &s.ratings {
            assert_eq!(s.lookup(r.person_id, r.skill_id), Some(r.value));
        }
        let keys: Vec<_> = s.ratings.iter().map(|r| (r.person_id, r.skill_id)).collect();
        assert_eq!(keys, vec![(1, 1), (1, 3), (2, 1)]);
    }

    #[test]
    fn rerun_is_bit_identical() {
        let obs = ObservationSet {
            explicit: vec![
                explicit(1, 1, SkillLevel::Intermediate),
                explicit(3, 2, SkillLevel::Beginner),
            ],
            implicit: vec![implicit(1, 1, 7), implicit(3, 2, 13), implicit(3, 4, 1)],
            experience: vec![exp(1, 7), exp(3, 13)],
            ..Default::default()
        };
        let a = synthesize(&obs, &p());
        let b = synthesize(&obs, &p());
        let bits = |s: &Synthesis| {
            s.ratings
                .iter()
                .map(|r| (r.person_id, r.skill_id, r.value.to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(bits(&a), bits(&b));
    }
}
