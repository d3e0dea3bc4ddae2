// tests/recommend_scenarios.rs
//
// End-to-end ranking over a small team built from declared skills and work
// history, loaded through the JSON snapshot source.

use std::sync::Arc;

use synapse_recommender::source::{ObservationSource, SnapshotFileSource};
use synapse_recommender::{EngineHandle, EngineSettings};

// Skills: 1 Python, 2 React, 3 PostgreSQL, 4 Docker, 5 TypeScript, 8 Go, 10 AWS,
// 11 Kubernetes.
const TEAM: &str = r#"{
  "users": [
    {"id": 1, "name": "Priya",  "availability": "available"},
    {"id": 2, "name": "Leo",    "availability": "available"},
    {"id": 3, "name": "Maria",  "availability": "available"},
    {"id": 4, "name": "Sam",    "availability": "available"},
    {"id": 5, "name": "Busy B", "availability": "busy"},
    {"id": 6, "name": "Newbie", "availability": "available"}
  ],
  "user_skills": [
    {"user_id": 1, "skill_id": 1, "proficiency": "expert"},
    {"user_id": 1, "skill_id": 2, "proficiency": "intermediate"},
    {"user_id": 1, "skill_id": 3, "proficiency": "expert"},
    {"user_id": 2, "skill_id": 2, "proficiency": "expert"},
    {"user_id": 2, "skill_id": 5, "proficiency": "expert"},
    {"user_id": 3, "skill_id": 8, "proficiency": "expert"},
    {"user_id": 3, "skill_id": 3, "proficiency": "expert"},
    {"user_id": 3, "skill_id": 4, "proficiency": "expert"},
    {"user_id": 4, "skill_id": 10, "proficiency": "expert"},
    {"user_id": 5, "skill_id": 1, "proficiency": "expert"},
    {"user_id": 5, "skill_id": 2, "proficiency": "expert"},
    {"user_id": 5, "skill_id": 3, "proficiency": "expert"},
    {"user_id": 6, "skill_id": 1, "proficiency": "beginner"}
  ],
  "tasks": [
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 6, "status": "done", "required_skill_ids": [1]},
    {"assignee_id": 2, "status": "done", "required_skill_ids": [2, 5]},
    {"assignee_id": 2, "status": "open", "required_skill_ids": [8]},
    {"assignee_id": 4, "status": "done", "required_skill_ids": [11]}
  ]
}"#;

async fn engine() -> (EngineHandle, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("observations.json");
    std::fs::write(&path, TEAM).expect("write fixture");
    let source: Arc<dyn ObservationSource> = Arc::new(SnapshotFileSource::new(path));
    let engine = EngineHandle::initialize(source, EngineSettings::default())
        .await
        .expect("engine initializes from fixture");
    (engine, dir)
}

#[tokio::test]
async fn full_stack_request_prefers_full_coverage() {
    let (engine, _dir) = engine().await;
    let out = engine.recommend(&[1, 2, 3], 10).unwrap();

    assert_eq!(out[0].person_id, 1, "Priya holds all three skills");
    assert_eq!(out[0].details.coverage, 1.0);
    assert!(out.iter().all(|r| r.person_id != 5), "busy people are never ranked");
    assert!(out.iter().all(|r| r.person_id != 4), "no overlap, never ranked");
    assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn history_blends_with_declared_level() {
    let (engine, _dir) = engine().await;
    let snap = engine.snapshot().unwrap();
    // Beginner (2.0) + 10 completed items → even blend with 5.0.
    assert_eq!(snap.actual_rating(6, 1), Some(3.5));
    // Implicit-only pair.
    assert_eq!(snap.actual_rating(4, 11), Some(5.0));
    // Open work contributes nothing.
    assert_eq!(snap.actual_rating(2, 8), None);
}

#[tokio::test]
async fn affinity_only_candidates_are_excluded() {
    let (engine, _dir) = engine().await;
    // Only Sam holds AWS; nobody else may appear however high their affinity.
    let out = engine.recommend(&[10], 50).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].person_id, 4);
}

#[tokio::test]
async fn limit_truncates_the_sorted_list() {
    let (engine, _dir) = engine().await;
    let all = engine.recommend(&[1, 2, 3, 4, 5], 50).unwrap();
    assert!(all.len() >= 3);
    for limit in 1..=all.len() {
        let top = engine.recommend(&[1, 2, 3, 4, 5], limit).unwrap();
        assert_eq!(top.len(), limit);
        assert_eq!(top, all[..limit].to_vec());
    }
}

#[tokio::test]
async fn every_result_carries_sub_scores() {
    let (engine, _dir) = engine().await;
    for r in engine.recommend(&[1, 8], 50).unwrap() {
        assert!(r.details.coverage > 0.0 && r.details.coverage <= 1.0);
        assert!((1.0..=5.0).contains(&r.details.proficiency));
        assert!((1.0..=5.0).contains(&r.details.affinity));
        let expected = 0.6 * r.details.coverage
            + 0.3 * r.details.proficiency / 5.0
            + 0.1 * r.details.affinity / 5.0;
        assert!((r.score - expected).abs() < 1e-12);
    }
}

#[tokio::test]
async fn empty_request_yields_empty_result() {
    let (engine, _dir) = engine().await;
    assert!(engine.recommend(&[], 10).unwrap().is_empty());
}
