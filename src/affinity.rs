//! # Affinity Model
//! Latent-factor collaborative filtering over the synthesized rating matrix.
//!
//! Two interchangeable implementations sit behind [`AffinityModel`]:
//! - [`FactorModel`]: biased matrix factorization trained with SGD
//!   (`r̂ = μ + b_p + b_s + p·q`), seeded for reproducibility.
//! - [`BaselineModel`]: global mean plus regularized person/skill biases, for
//!   small deployments where latent factors add little.
//!
//! Both accept continuous ratings, clip predictions to [1, 5] and answer for
//! pairs never seen in training. A trained model is never mutated.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::observations::{PersonId, SkillId};
use crate::synth::Rating;

pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 5.0;

// Bias shrinkage for the baseline model (skill, person).
const BASELINE_REG_SKILL: f64 = 10.0;
const BASELINE_REG_PERSON: f64 = 15.0;

/// Trained person×skill predictor.
pub trait AffinityModel: Send + Sync + fmt::Debug {
    /// Predicted affinity in [1, 5], defined for any pair.
    fn predict(&self, person_id: PersonId, skill_id: SkillId) -> f64;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Factor,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub kind: ModelKind,
    pub factors: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub init_std: f64,
    pub seed: u64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            kind: ModelKind::Factor,
            factors: 50,
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            init_std: 0.1,
            seed: 42,
        }
    }
}

/// Train the configured model kind. Blocking; run off the async executor.
pub fn train_model(
    params: &ModelParams,
    ratings: &[Rating],
) -> Result<Arc<dyn AffinityModel>, EngineError> {
    let model: Arc<dyn AffinityModel> = match params.kind {
        ModelKind::Factor => Arc::new(FactorModel::train(params, ratings)?),
        ModelKind::Baseline => Arc::new(BaselineModel::train(params.epochs, ratings)?),
    };
    Ok(model)
}

fn clip(x: f64) -> f64 {
    x.clamp(RATING_MIN, RATING_MAX)
}

fn global_mean(ratings: &[Rating]) -> f64 {
    ratings.iter().map(|r| r.value).sum::<f64>() / ratings.len() as f64
}

/// Dense ids for persons and skills, assigned in first-seen order.
#[derive(Debug, Default)]
struct Index {
    persons: HashMap<PersonId, usize>,
    skills: HashMap<SkillId, usize>,
}

impl Index {
    fn build(ratings: &[Rating]) -> (Self, Vec<(usize, usize, f64)>) {
        let mut idx = Index::default();
        let mut rows = Vec::with_capacity(ratings.len());
        for r in ratings {
            let n = idx.persons.len();
            let p = *idx.persons.entry(r.person_id).or_insert(n);
            let n = idx.skills.len();
            let s = *idx.skills.entry(r.skill_id).or_insert(n);
            rows.push((p, s, clip(r.value)));
        }
        (idx, rows)
    }
}

/* ----------------------------
Biased matrix factorization
---------------------------- */

pub struct FactorModel {
    index: Index,
    factors: usize,
    mean: f64,
    person_bias: Vec<f64>,
    skill_bias: Vec<f64>,
    person_factors: Vec<f64>,
    skill_factors: Vec<f64>,
    train_rmse: f64,
}

impl fmt::Debug for FactorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorModel")
            .field("persons", &self.index.persons.len())
            .field("skills", &self.index.skills.len())
            .field("factors", &self.factors)
            .field("mean", &self.mean)
            .field("train_rmse", &self.train_rmse)
            .finish()
    }
}

impl FactorModel {
    pub fn train(params: &ModelParams, ratings: &[Rating]) -> Result<Self, EngineError> {
        if ratings.is_empty() {
            return Err(EngineError::EmptyData);
        }
        if params.factors == 0 || params.epochs == 0 {
            return Err(EngineError::Training(
                "factors and epochs must be at least 1".into(),
            ));
        }

        let (index, mut rows) = Index::build(ratings);
        let k = params.factors;
        let n_persons = index.persons.len();
        let n_skills = index.skills.len();
        let mean = rows.iter().map(|r| r.2).sum::<f64>() / rows.len() as f64;

        let mut rng = StdRng::seed_from_u64(params.seed);
        // Uniform with the requested standard deviation.
        let half_width = params.init_std.max(0.0) * 3f64.sqrt();
        let mut init = |len: usize| -> Vec<f64> {
            (0..len)
                .map(|_| {
                    if half_width > 0.0 {
                        rng.random_range(-half_width..half_width)
                    } else {
                        0.0
                    }
                })
                .collect()
        };
        let mut person_factors = init(n_persons * k);
        let mut skill_factors = init(n_skills * k);
        let mut person_bias = vec![0.0; n_persons];
        let mut skill_bias = vec![0.0; n_skills];

        let lr = params.learning_rate;
        let reg = params.regularization;
        let mut rmse = f64::NAN;

        for epoch in 0..params.epochs {
            rows.shuffle(&mut rng);
            let mut sq_err = 0.0;
            for &(p, s, r) in rows.iter() {
                let pf = &person_factors[p * k..(p + 1) * k];
                let sf = &skill_factors[s * k..(s + 1) * k];
                let dot: f64 = pf.iter().zip(sf).map(|(a, b)| a * b).sum();
                let err = r - (mean + person_bias[p] + skill_bias[s] + dot);
                sq_err += err * err;

                person_bias[p] += lr * (err - reg * person_bias[p]);
                skill_bias[s] += lr * (err - reg * skill_bias[s]);

                for f in 0..k {
                    let pu = person_factors[p * k + f];
                    let qi = skill_factors[s * k + f];
                    person_factors[p * k + f] += lr * (err * qi - reg * pu);
                    skill_factors[s * k + f] += lr * (err * pu - reg * qi);
                }
            }
            rmse = (sq_err / rows.len() as f64).sqrt();
            tracing::debug!(epoch, rmse, "factor model epoch");
        }

        let all_finite = rmse.is_finite()
            && person_bias.iter().chain(&skill_bias).all(|x| x.is_finite())
            && person_factors.iter().chain(&skill_factors).all(|x| x.is_finite());
        if !all_finite {
            return Err(EngineError::Training(format!(
                "diverged after {} epochs (lr={lr}, reg={reg})",
                params.epochs
            )));
        }

        tracing::info!(
            persons = n_persons,
            skills = n_skills,
            factors = k,
            epochs = params.epochs,
            rmse,
            "factor model trained"
        );

        Ok(Self {
            index,
            factors: k,
            mean,
            person_bias,
            skill_bias,
            person_factors,
            skill_factors,
            train_rmse: rmse,
        })
    }

    /// RMSE over the training set as measured during the final epoch.
    pub fn train_rmse(&self) -> f64 {
        self.train_rmse
    }

    pub fn global_mean(&self) -> f64 {
        self.mean
    }
}

impl AffinityModel for FactorModel {
    fn predict(&self, person_id: PersonId, skill_id: SkillId) -> f64 {
        let k = self.factors;
        let p = self.index.persons.get(&person_id).copied();
        let s = self.index.skills.get(&skill_id).copied();

        let mut est = self.mean;
        if let Some(p) = p {
            est += self.person_bias[p];
        }
        if let Some(s) = s {
            est += self.skill_bias[s];
        }
        // Latent term only when both sides were seen in training.
        if let (Some(p), Some(s)) = (p, s) {
            let pf = &self.person_factors[p * k..(p + 1) * k];
            let sf = &self.skill_factors[s * k..(s + 1) * k];
            est += pf.iter().zip(sf).map(|(a, b)| a * b).sum::<f64>();
        }
        clip(est)
    }

    fn name(&self) -> &'static str {
        "factor"
    }
}

/* ----------------------------
Bias-only baseline
---------------------------- */

pub struct BaselineModel {
    index: Index,
    mean: f64,
    person_bias: Vec<f64>,
    skill_bias: Vec<f64>,
}

impl fmt::Debug for BaselineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaselineModel")
            .field("persons", &self.index.persons.len())
            .field("skills", &self.index.skills.len())
            .field("mean", &self.mean)
            .finish()
    }
}

impl BaselineModel {
    /// Alternating bias estimation, `rounds` passes.
    pub fn train(rounds: usize, ratings: &[Rating]) -> Result<Self, EngineError> {
        if ratings.is_empty() {
            return Err(EngineError::EmptyData);
        }
        let (index, rows) = Index::build(ratings);
        let mean = global_mean(ratings).clamp(RATING_MIN, RATING_MAX);
        let mut person_bias = vec![0.0; index.persons.len()];
        let mut skill_bias = vec![0.0; index.skills.len()];

        for _ in 0..rounds.max(1) {
            let mut sum = vec![0.0; skill_bias.len()];
            let mut cnt = vec![0.0; skill_bias.len()];
            for &(p, s, r) in &rows {
                sum[s] += r - mean - person_bias[p];
                cnt[s] += 1.0;
            }
            for s in 0..skill_bias.len() {
                skill_bias[s] = sum[s] / (BASELINE_REG_SKILL + cnt[s]);
            }

            let mut sum = vec![0.0; person_bias.len()];
            let mut cnt = vec![0.0; person_bias.len()];
            for &(p, s, r) in &rows {
                sum[p] += r - mean - skill_bias[s];
                cnt[p] += 1.0;
            }
            for p in 0..person_bias.len() {
                person_bias[p] = sum[p] / (BASELINE_REG_PERSON + cnt[p]);
            }
        }

        tracing::info!(
            persons = person_bias.len(),
            skills = skill_bias.len(),
            "baseline model trained"
        );

        Ok(Self {
            index,
            mean,
            person_bias,
            skill_bias,
        })
    }
}

impl AffinityModel for BaselineModel {
    fn predict(&self, person_id: PersonId, skill_id: SkillId) -> f64 {
        let mut est = self.mean;
        if let Some(&p) = self.index.persons.get(&person_id) {
            est += self.person_bias[p];
        }
        if let Some(&s) = self.index.skills.get(&skill_id) {
            est += self.skill_bias[s];
        }
        clip(est)
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}
