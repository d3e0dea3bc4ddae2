//! # Recommendation Engine
//! Owns the live [`Snapshot`] and coordinates rebuilding it.
//!
//! Readers clone the `Arc<Snapshot>` under a momentary read lock and rank
//! against it without holding anything, so a long training run never blocks
//! `recommend`. Refreshes are serialized by an async mutex; the expensive part
//! (synthesis + training) runs on the blocking pool and the result is
//! published with a single pointer replacement. A failed refresh publishes
//! nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::affinity::{train_model, ModelParams};
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::metrics as m;
use crate::observations::SkillId;
use crate::ranking::{RankingWeights, Recommendation, Snapshot};
use crate::source::ObservationSource;
use crate::synth::{synthesize, SynthesisParams};

/// Tunables the engine needs from the full configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineSettings {
    pub synthesis: SynthesisParams,
    pub model: ModelParams,
    pub weights: RankingWeights,
}

impl From<&AppConfig> for EngineSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            synthesis: cfg.synthesis,
            model: cfg.model,
            weights: cfg.ranking.weights,
        }
    }
}

/// Summary of a successful initialize/refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub generation: u64,
    pub ratings: usize,
    pub persons: usize,
    pub skills: usize,
    pub available: usize,
    pub model: &'static str,
    pub elapsed_ms: u64,
}

/// Point-in-time view for health/diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub ready: bool,
    pub generation: Option<u64>,
    pub ratings: usize,
    pub available: usize,
    pub model: Option<&'static str>,
    pub built_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Inner {
    source: Arc<dyn ObservationSource>,
    settings: EngineSettings,
    live: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    last_error: RwLock<Option<String>>,
}

/// Cheap-to-clone handle shared by all request handlers.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Inner>,
}

impl EngineHandle {
    /// A handle with nothing published yet; `is_ready()` is false until a
    /// refresh succeeds.
    pub fn unready(source: Arc<dyn ObservationSource>, settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                settings,
                live: RwLock::new(None),
                refresh_lock: tokio::sync::Mutex::new(()),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// Load, synthesize and train once. Errors are returned as-is
    /// (Configuration / EmptyData / Training).
    pub async fn initialize(
        source: Arc<dyn ObservationSource>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        tracing::info!(source = source.name(), "initializing recommendation engine");
        let handle = Self::unready(source, settings);
        let report = handle.rebuild().await?;
        tracing::info!(
            generation = report.generation,
            ratings = report.ratings,
            elapsed_ms = report.elapsed_ms,
            "recommendation engine initialized and model trained"
        );
        Ok(handle)
    }

    /// Rebuild from the source and swap atomically. On failure the previous
    /// snapshot stays live and `RefreshFailed` is returned.
    pub async fn refresh(&self) -> Result<RefreshReport, EngineError> {
        self.rebuild().await.map_err(|e| {
            tracing::warn!(error = %e, "model refresh failed, keeping previous snapshot");
            EngineError::RefreshFailed(Box::new(e))
        })
    }

    /// Rank available people for `skill_ids`. Never blocks on I/O.
    pub fn recommend(
        &self,
        skill_ids: &[SkillId],
        limit: usize,
    ) -> Result<Vec<Recommendation>, EngineError> {
        let snap = self.snapshot().ok_or(EngineError::NotReady)?;

        let started = Instant::now();
        let out = snap.recommend(skill_ids, limit, &self.inner.settings.weights);

        metrics::counter!(m::RECOMMEND_REQUESTS).increment(1);
        if out.is_empty() {
            metrics::counter!(m::RECOMMEND_EMPTY).increment(1);
        }
        metrics::histogram!(m::RECOMMEND_DURATION_MS)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        Ok(out)
    }

    /// Only non-empty snapshots are ever published, so presence is readiness.
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// The currently published snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.live.read().ok().and_then(|g| g.clone())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn status(&self) -> EngineStatus {
        let snap = self.snapshot();
        let last_error = self.inner.last_error.read().ok().and_then(|g| g.clone());
        EngineStatus {
            ready: snap.is_some(),
            generation: snap.as_ref().map(|s| s.generation),
            ratings: snap.as_ref().map_or(0, |s| s.rating_count()),
            available: snap.as_ref().map_or(0, |s| s.available_count()),
            model: snap.as_ref().map(|s| s.model_name()),
            built_at: snap.as_ref().map(|s| s.built_at),
            last_error,
        }
    }

    async fn rebuild(&self) -> Result<RefreshReport, EngineError> {
        m::ensure_metrics_described();
        let _serial = self.inner.refresh_lock.lock().await;
        let started = Instant::now();

        match self.build_snapshot().await {
            Ok(snap) => {
                let report = RefreshReport {
                    generation: snap.generation,
                    ratings: snap.rating_count(),
                    persons: snap.person_count(),
                    skills: snap.skill_count(),
                    available: snap.available_count(),
                    model: snap.model_name(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
                self.publish(snap);
                self.set_last_error(None);

                metrics::counter!(m::REFRESH_TOTAL, "outcome" => "success").increment(1);
                metrics::gauge!(m::ENGINE_RATINGS).set(report.ratings as f64);
                metrics::gauge!(m::ENGINE_GENERATION).set(report.generation as f64);
                metrics::histogram!(m::REFRESH_MS).record(report.elapsed_ms as f64);

                tracing::info!(
                    generation = report.generation,
                    ratings = report.ratings,
                    persons = report.persons,
                    skills = report.skills,
                    available = report.available,
                    model = report.model,
                    elapsed_ms = report.elapsed_ms,
                    "snapshot published"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_last_error(Some(e.to_string()));
                metrics::counter!(m::REFRESH_TOTAL, "outcome" => "failure").increment(1);
                Err(e)
            }
        }
    }

    async fn build_snapshot(&self) -> Result<Snapshot, EngineError> {
        let source = &self.inner.source;
        let obs = source
            .load()
            .await
            .map_err(|e| EngineError::Configuration(format!("{}: {e:#}", source.name())))?;

        if obs.has_no_evidence() {
            tracing::error!(source = source.name(), "no explicit or implicit observations");
            return Err(EngineError::EmptyData);
        }

        let generation = self.snapshot().map_or(0, |s| s.generation) + 1;
        let settings = self.inner.settings;

        tokio::task::spawn_blocking(move || -> Result<Snapshot, EngineError> {
            let synthesis = synthesize(&obs, &settings.synthesis);
            if synthesis.is_empty() {
                return Err(EngineError::EmptyData);
            }
            let model = train_model(&settings.model, &synthesis.ratings)?;
            Ok(Snapshot::new(generation, synthesis, obs.available, model))
        })
        .await
        .map_err(|e| EngineError::Training(format!("training task aborted: {e}")))?
    }

    fn publish(&self, snap: Snapshot) {
        let snap = Arc::new(snap);
        match self.inner.live.write() {
            Ok(mut guard) => *guard = Some(snap),
            Err(poisoned) => *poisoned.into_inner() = Some(snap),
        }
    }

    fn set_last_error(&self, err: Option<String>) {
        if let Ok(mut guard) = self.inner.last_error.write() {
            *guard = err;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::{
        ExperienceCount, ExplicitObservation, ImplicitObservation, ObservationSet, SkillLevel,
    };
    use crate::source::StaticSource;

    fn obs() -> ObservationSet {
        ObservationSet {
            explicit: vec![
                ExplicitObservation { person_id: 1, skill_id: 1, level: SkillLevel::Expert },
                ExplicitObservation { person_id: 2, skill_id: 2, level: SkillLevel::Beginner },
            ],
            implicit: vec![ImplicitObservation { person_id: 2, skill_id: 1, completion_count: 3 }],
            experience: vec![ExperienceCount { person_id: 2, total_completed: 3 }],
            available: vec![1, 2],
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            model: ModelParams {
                factors: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unready_engine_refuses_to_serve() {
        let h = EngineHandle::unready(Arc::new(StaticSource::new(obs())), settings());
        assert!(!h.is_ready());
        assert!(matches!(h.recommend(&[1], 5), Err(EngineError::NotReady)));
        assert!(!h.status().ready);
    }

    #[tokio::test]
    async fn initialize_publishes_generation_one() {
        let h = EngineHandle::initialize(Arc::new(StaticSource::new(obs())), settings())
            .await
            .unwrap();
        assert!(h.is_ready());
        let st = h.status();
        assert_eq!(st.generation, Some(1));
        assert_eq!(st.ratings, 3);
        assert_eq!(st.model, Some("factor"));
        assert!(st.last_error.is_none());
    }

    #[tokio::test]
    async fn initialize_reports_empty_data() {
        let err = EngineHandle::initialize(
            Arc::new(StaticSource::new(ObservationSet::default())),
            settings(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::EmptyData));
    }

    #[tokio::test]
    async fn initialize_reports_unreachable_source() {
        let err = EngineHandle::initialize(Arc::new(StaticSource::unreachable()), settings())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn evidence_free_data_never_publishes() {
        // Experience without any rated pair must not yield a servable snapshot.
        let src = Arc::new(StaticSource::new(ObservationSet {
            experience: vec![ExperienceCount { person_id: 1, total_completed: 9 }],
            available: vec![1],
            ..Default::default()
        }));
        let h = EngineHandle::unready(src, settings());
        assert!(h.refresh().await.is_err());
        assert!(h.snapshot().is_none());
        assert!(!h.is_ready());
        assert_eq!(h.status().ready, h.is_ready());
        assert!(matches!(h.recommend(&[1], 5), Err(EngineError::NotReady)));
    }

    #[tokio::test]
    async fn status_readiness_tracks_is_ready() {
        let h = EngineHandle::initialize(Arc::new(StaticSource::new(obs())), settings())
            .await
            .unwrap();
        assert!(h.is_ready());
        assert_eq!(h.status().ready, h.is_ready());
    }

    #[tokio::test]
    async fn empty_request_is_empty_not_error() {
        let h = EngineHandle::initialize(Arc::new(StaticSource::new(obs())), settings())
            .await
            .unwrap();
        assert!(h.recommend(&[], 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_bumps_generation() {
        let h = EngineHandle::initialize(Arc::new(StaticSource::new(obs())), settings())
            .await
            .unwrap();
        let report = h.refresh().await.unwrap();
        assert_eq!(report.generation, 2);
        assert_eq!(h.status().generation, Some(2));
    }

    #[tokio::test]
    async fn refresh_can_recover_an_unready_engine() {
        let src = Arc::new(StaticSource::unreachable());
        let h = EngineHandle::unready(src.clone(), settings());
        assert!(h.refresh().await.is_err());
        assert!(h.status().last_error.is_some());

        src.replace(obs());
        h.refresh().await.unwrap();
        assert!(h.is_ready());
        assert!(h.status().last_error.is_none());
    }
}
