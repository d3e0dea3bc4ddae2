//! # Observations
//! Raw evidence the rating synthesizer consumes: declared proficiency levels,
//! completed work history and per-person experience counts.
//!
//! Completed work is aggregated here (one implicit row per person/skill, one
//! experience row per person) so the synthesizer only ever sees counts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type PersonId = u64;
pub type SkillId = u64;

/// Every completed assignment implies this proficiency for its skills.
pub const IMPLICIT_ANCHOR: f64 = 5.0;

/// Declared proficiency category (self or peer reported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl SkillLevel {
    /// Numeric anchor on the 1..=5 rating scale.
    pub fn anchor(self) -> f64 {
        match self {
            SkillLevel::Beginner => 2.0,
            SkillLevel::Intermediate => 3.5,
            SkillLevel::Expert => 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplicitObservation {
    pub person_id: PersonId,
    pub skill_id: SkillId,
    pub level: SkillLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitObservation {
    pub person_id: PersonId,
    pub skill_id: SkillId,
    pub completion_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceCount {
    pub person_id: PersonId,
    pub total_completed: u32,
}

/// Status of a work item as the data source reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Open,
    InProgress,
    Done,
}

/// One work item with the skills it required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedWork {
    #[serde(default)]
    pub assignee_id: Option<PersonId>,
    pub status: WorkStatus,
    #[serde(default)]
    pub required_skill_ids: Vec<SkillId>,
}

/// Everything one synthesize+train cycle needs, fully resident in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    pub explicit: Vec<ExplicitObservation>,
    pub implicit: Vec<ImplicitObservation>,
    pub experience: Vec<ExperienceCount>,
    pub available: Vec<PersonId>,
}

impl ObservationSet {
    /// Build from declared levels and raw work history.
    pub fn from_history(
        explicit: Vec<ExplicitObservation>,
        work: &[CompletedWork],
        available: Vec<PersonId>,
    ) -> Self {
        let (implicit, experience) = aggregate_completed_work(work);
        Self {
            explicit,
            implicit,
            experience,
            available,
        }
    }

    /// True when neither explicit nor implicit evidence exists.
    pub fn has_no_evidence(&self) -> bool {
        self.explicit.is_empty() && self.implicit.is_empty()
    }
}

/// Count completed, assigned work per (person, skill) and per person.
/// Items that are not `Done` or have no assignee are ignored. A skill listed
/// twice on one item counts once.
pub fn aggregate_completed_work(
    work: &[CompletedWork],
) -> (Vec<ImplicitObservation>, Vec<ExperienceCount>) {
    let mut per_skill: BTreeMap<(PersonId, SkillId), u32> = BTreeMap::new();
    let mut per_person: BTreeMap<PersonId, u32> = BTreeMap::new();

    for item in work {
        let Some(person_id) = item.assignee_id else {
            continue;
        };
        if item.status != WorkStatus::Done {
            continue;
        }
        *per_person.entry(person_id).or_insert(0) += 1;

        let skills: BTreeSet<SkillId> = item.required_skill_ids.iter().copied().collect();
        for skill_id in skills {
            *per_skill.entry((person_id, skill_id)).or_insert(0) += 1;
        }
    }

    let implicit = per_skill
        .into_iter()
        .map(|((person_id, skill_id), completion_count)| ImplicitObservation {
            person_id,
            skill_id,
            completion_count,
        })
        .collect();
    let experience = per_person
        .into_iter()
        .map(|(person_id, total_completed)| ExperienceCount {
            person_id,
            total_completed,
        })
        .collect();

    (implicit, experience)
}
