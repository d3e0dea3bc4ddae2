// src/source.rs
//! Observation sources: the thin data-access layer the engine pulls from on
//! every initialize/refresh. Everything is loaded into memory up front.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::observations::{
    CompletedWork, ExplicitObservation, ObservationSet, PersonId, SkillId, SkillLevel,
};

#[async_trait::async_trait]
pub trait ObservationSource: Send + Sync {
    async fn load(&self) -> Result<ObservationSet>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredSkill {
    pub user_id: PersonId,
    pub skill_id: SkillId,
    pub proficiency: SkillLevel,
}

/// On-disk JSON shape: people, declared skills and work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub users: Vec<PersonRecord>,
    #[serde(default)]
    pub user_skills: Vec<DeclaredSkill>,
    #[serde(default)]
    pub tasks: Vec<CompletedWork>,
}

impl SnapshotDocument {
    pub fn into_observations(self) -> ObservationSet {
        let explicit = self
            .user_skills
            .iter()
            .map(|d| ExplicitObservation {
                person_id: d.user_id,
                skill_id: d.skill_id,
                level: d.proficiency,
            })
            .collect();
        let available = self
            .users
            .iter()
            .filter(|u| u.availability == Availability::Available)
            .map(|u| u.id)
            .collect();
        ObservationSet::from_history(explicit, &self.tasks, available)
    }
}

/// Reads a [`SnapshotDocument`] from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ObservationSource for SnapshotFileSource {
    async fn load(&self) -> Result<ObservationSet> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading observation snapshot {}", self.path.display()))?;
        let doc: SnapshotDocument = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing observation snapshot {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            users = doc.users.len(),
            user_skills = doc.user_skills.len(),
            tasks = doc.tasks.len(),
            "observation snapshot loaded"
        );
        Ok(doc.into_observations())
    }

    fn name(&self) -> &'static str {
        "snapshot-file"
    }
}

/// In-memory source whose contents can be swapped between loads.
#[derive(Debug, Default)]
pub struct StaticSource {
    inner: RwLock<Option<ObservationSet>>,
}

impl StaticSource {
    pub fn new(obs: ObservationSet) -> Self {
        Self {
            inner: RwLock::new(Some(obs)),
        }
    }

    /// A source that fails every load, as if the backing store were down.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn replace(&self, obs: ObservationSet) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(obs);
        }
    }

    pub fn disconnect(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}

#[async_trait::async_trait]
impl ObservationSource for StaticSource {
    async fn load(&self) -> Result<ObservationSet> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("static source lock poisoned"))?;
        guard
            .clone()
            .ok_or_else(|| anyhow::anyhow!("static source is disconnected"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
