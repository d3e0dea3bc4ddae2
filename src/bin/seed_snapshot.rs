//! Writes a demo observation snapshot: four personas with a known work
//! history plus a seeded crowd of engineers for model training.
//!
//! Usage: `cargo run --bin seed_snapshot [OUTPUT_PATH]`
//! (default `data/observations.json`).

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};
use std::path::PathBuf;

use synapse_recommender::config::engine::DEFAULT_DATA_PATH;
use synapse_recommender::observations::{CompletedWork, SkillLevel, WorkStatus};
use synapse_recommender::source::{Availability, DeclaredSkill, PersonRecord, SnapshotDocument};

const EXTRA_ENGINEERS: u64 = 40;

const SKILLS: &[(&str, u64)] = &[
    ("Python", 1),
    ("React", 2),
    ("PostgreSQL", 3),
    ("Docker", 4),
    ("TypeScript", 5),
    ("Tailwind CSS", 6),
    ("Next.js", 7),
    ("Go", 8),
    ("Redis", 9),
    ("AWS", 10),
    ("Kubernetes", 11),
    ("Terraform", 12),
    ("CI/CD", 13),
    ("Pandas", 14),
];

struct Archetype {
    name: &'static str,
    skills: &'static [(&'static str, SkillLevel)],
}

const ARCHETYPES: &[Archetype] = &[
    Archetype {
        name: "Veteran Full-Stack Generalist",
        skills: &[
            ("Python", SkillLevel::Expert),
            ("React", SkillLevel::Intermediate),
            ("PostgreSQL", SkillLevel::Expert),
            ("Docker", SkillLevel::Intermediate),
        ],
    },
    Archetype {
        name: "New Frontend Specialist",
        skills: &[
            ("React", SkillLevel::Expert),
            ("TypeScript", SkillLevel::Expert),
            ("Tailwind CSS", SkillLevel::Expert),
            ("Next.js", SkillLevel::Intermediate),
        ],
    },
    Archetype {
        name: "Pure Backend Specialist",
        skills: &[
            ("Go", SkillLevel::Expert),
            ("PostgreSQL", SkillLevel::Expert),
            ("Docker", SkillLevel::Expert),
            ("Redis", SkillLevel::Intermediate),
        ],
    },
    Archetype {
        name: "T-Shaped DevOps Engineer",
        skills: &[
            ("AWS", SkillLevel::Expert),
            ("Kubernetes", SkillLevel::Expert),
            ("Terraform", SkillLevel::Expert),
            ("Python", SkillLevel::Intermediate),
            ("CI/CD", SkillLevel::Expert),
        ],
    },
];

// (persona, archetype index)
const PERSONAS: &[(&str, usize)] = &[
    ("Priya Patel", 0),
    ("Leo Chen", 1),
    ("Maria Garcia", 2),
    ("Sam Jones", 3),
];

const WORK_TEMPLATES: &[(&str, &[&str])] = &[
    ("Full-Stack Feature", &["Python", "React", "PostgreSQL"]),
    ("UI Component Build", &["React", "TypeScript", "Tailwind CSS"]),
    ("API Endpoint Creation", &["Go", "PostgreSQL", "Docker"]),
    ("Infrastructure Migration", &["Kubernetes", "Terraform", "AWS"]),
    ("CI/CD Scripting", &["CI/CD", "Python"]),
    ("Cross-Functional Dashboard", &["React", "Pandas"]),
];

// (persona, template, completed count)
const HISTORY: &[(&str, &str, usize)] = &[
    ("Priya Patel", "Full-Stack Feature", 25),
    ("Leo Chen", "UI Component Build", 2),
    ("Maria Garcia", "API Endpoint Creation", 12),
    ("Sam Jones", "Infrastructure Migration", 10),
    ("Sam Jones", "CI/CD Scripting", 4),
];

fn skill_id(name: &str) -> Result<u64> {
    SKILLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
        .with_context(|| format!("unknown skill {name}"))
}

fn declare(doc: &mut SnapshotDocument, user_id: u64, archetype: &Archetype) -> Result<()> {
    for (skill, level) in archetype.skills {
        doc.user_skills.push(DeclaredSkill {
            user_id,
            skill_id: skill_id(skill)?,
            proficiency: *level,
        });
    }
    Ok(())
}

fn build(seed: u64) -> Result<SnapshotDocument> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut doc = SnapshotDocument::default();

    for (i, (name, arch)) in PERSONAS.iter().enumerate() {
        let id = i as u64 + 1;
        doc.users.push(PersonRecord {
            id,
            name: Some((*name).to_string()),
            availability: Availability::Available,
        });
        declare(&mut doc, id, &ARCHETYPES[*arch])?;
        tracing::info!(id, name, archetype = ARCHETYPES[*arch].name, "persona");
    }

    let first_extra = PERSONAS.len() as u64 + 1;
    for id in first_extra..first_extra + EXTRA_ENGINEERS {
        let arch = ARCHETYPES.choose(&mut rng).context("no archetypes")?;
        let availability = if rng.random_bool(0.8) {
            Availability::Available
        } else {
            Availability::Busy
        };
        doc.users.push(PersonRecord {
            id,
            name: Some(format!("User-{}", rng.random_range(100..10_000))),
            availability,
        });
        declare(&mut doc, id, arch)?;
    }

    for (persona, template, count) in HISTORY {
        let user_id = PERSONAS
            .iter()
            .position(|(n, _)| n == persona)
            .map(|i| i as u64 + 1)
            .with_context(|| format!("unknown persona {persona}"))?;
        let (_, skills) = WORK_TEMPLATES
            .iter()
            .find(|(t, _)| t == template)
            .with_context(|| format!("unknown template {template}"))?;
        let required_skill_ids = skills.iter().map(|s| skill_id(s)).collect::<Result<Vec<_>>>()?;
        for _ in 0..*count {
            doc.tasks.push(CompletedWork {
                assignee_id: Some(user_id),
                status: WorkStatus::Done,
                required_skill_ids: required_skill_ids.clone(),
            });
        }
        tracing::info!(persona, template, count, "work history");
    }

    Ok(doc)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let out = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

    let doc = build(42)?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;

    println!(
        "wrote {} users, {} declared skills, {} work items to {}",
        doc.users.len(),
        doc.user_skills.len(),
        doc.tasks.len(),
        out.display()
    );
    Ok(())
}
