//! crates/companion_core/src/onboarding.rs
//!
//! Flattening of the onboarding wizard's answers.

use crate::domain::{NewCareerGoal, ProfileData};

/// Category stamped on every memory row written during onboarding.
pub const INITIALIZE_CATEGORY: &str = "initialize";

/// Turns a profile into `"{label}: {value}"` memory lines, one per non-empty field.
pub fn profile_memory_entries(profile: &ProfileData) -> Vec<String> {
    let mut fields: Vec<(String, String)> = vec![
        ("ニックネーム".into(), profile.nickname.clone()),
        ("性別".into(), profile.gender.clone()),
        ("年齢".into(), profile.age.clone()),
        ("居住地".into(), profile.location.clone()),
        (
            "IoTデバイスURL".into(),
            profile.iot_device_url.clone().unwrap_or_default(),
        ),
    ];
    for (idx, goal) in profile.career_goals.iter().enumerate() {
        fields.push((
            format!("キャリア目標{idx}"),
            format!(
                "タイトル: {}｜内容: {}｜期間: {}",
                goal.career_title, goal.career_body, goal.target_period
            ),
        ));
    }
    for (idx, initiative) in profile.initiatives.iter().enumerate() {
        fields.push((
            format!("プラン{idx}"),
            format!(
                "タイトル: {}｜内容: {}｜期間: {}",
                initiative.title, initiative.body, initiative.target_period
            ),
        ));
    }
    fields.extend([
        ("スキル".into(), profile.skills.join(", ")),
        ("現在の役割".into(), profile.current_role.clone()),
        ("経験".into(), profile.experience.clone()),
        ("プロジェクト".into(), profile.projects.clone()),
        ("学習方法".into(), profile.learning_methods.join(", ")),
        ("1日あたりの学習時間".into(), profile.daily_study_time.clone()),
    ]);

    fields
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect()
}

/// The newline-joined `"{title}: {body}"` digest sent to initiative generation.
pub fn career_goals_digest(goals: &[NewCareerGoal]) -> String {
    goals
        .iter()
        .map(|goal| format!("{}: {}", goal.career_title, goal.career_body))
        .collect::<Vec<_>>()
        .join("\n")
}
