//! Personality registry operations: validation, creation with optional
//! propagation to existing users, soft-delete, and seeding of built-ins.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::BUILTIN_PERSONALITIES;
use crate::db::Database;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPersonality {
    pub name: String,
    pub description: String,
    pub prompt: String,
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9 _-]+$").unwrap())
}

/// Lowercase-trimmed normalization applied to every name before storage
/// or lookup, making the registry case-insensitive.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validate and normalize the fields of a personality. A missing prompt is
/// generated from the description. The error string is user-facing.
pub fn validate(
    name: &str,
    description: &str,
    prompt: Option<&str>,
) -> Result<NewPersonality, String> {
    let name = normalize_name(name);
    let name_chars = name.chars().count();
    if name_chars < 2 || name_chars > 50 {
        return Err("Name must be 2-50 characters".to_string());
    }
    if !name_pattern().is_match(&name) {
        return Err("Name may only contain letters, digits, spaces, '-' and '_'".to_string());
    }

    let description = description.trim().to_string();
    // Bounds are in characters, not bytes; Indic text is 3 bytes a char.
    let description_chars = description.chars().count();
    if description_chars < 10 || description_chars > 500 {
        return Err("Description must be 10-500 characters".to_string());
    }

    let prompt = match prompt {
        Some(p) => {
            let p = p.trim();
            if p.chars().count() > 2000 {
                return Err("Prompt must be at most 2000 characters".to_string());
            }
            p.to_string()
        }
        None => generate_prompt(&name, &description),
    };

    Ok(NewPersonality {
        name,
        description,
        prompt,
    })
}

pub fn generate_prompt(name: &str, description: &str) -> String {
    format!(
        "You are Ananya, in {name} mode. {description}. \
         Be helpful, friendly, and engaging."
    )
}

#[derive(Debug, PartialEq, Eq)]
pub enum AddResult {
    /// Created; carries how many existing users received the name.
    Created { propagated_to: u64 },
    Duplicate,
    Invalid(String),
}

/// Add a personality profile. Propagation to user lists is best-effort: a
/// failure there logs but does not undo the creation.
pub async fn add(
    db: &Database,
    name: &str,
    description: &str,
    prompt: Option<&str>,
    auto_add_to_users: bool,
) -> anyhow::Result<AddResult> {
    let profile = match validate(name, description, prompt) {
        Ok(p) => p,
        Err(msg) => return Ok(AddResult::Invalid(msg)),
    };

    if !db
        .insert_personality(&profile.name, &profile.description, &profile.prompt)
        .await?
    {
        return Ok(AddResult::Duplicate);
    }

    let mut propagated_to = 0;
    if auto_add_to_users {
        match db.add_personality_to_all_users(&profile.name).await {
            Ok(n) => propagated_to = n,
            Err(e) => {
                tracing::warn!("personality '{}' created but propagation failed: {e}", profile.name);
            }
        }
    }

    Ok(AddResult::Created { propagated_to })
}

/// Remove by name. Removal deactivates the profile; user lists keep the
/// name and existing references stay resolvable against inactive rows.
pub async fn remove(db: &Database, name: &str) -> anyhow::Result<bool> {
    db.deactivate_personality(&normalize_name(name)).await
}

/// Partial update: the prompt is retained when not supplied.
pub async fn update(
    db: &Database,
    name: &str,
    description: &str,
    prompt: Option<&str>,
) -> anyhow::Result<bool> {
    let description = description.trim();
    let chars = description.chars().count();
    if chars < 10 || chars > 500 {
        anyhow::bail!("Description must be 10-500 characters");
    }
    db.update_personality(&normalize_name(name), description, prompt)
        .await
}

/// Seed the built-in profiles. Existing rows are left alone so admin edits
/// survive restarts.
pub async fn initialize_defaults(db: &Database) -> anyhow::Result<()> {
    for (name, description, prompt) in BUILTIN_PERSONALITIES {
        if db.insert_personality(name, description, prompt).await? {
            tracing::info!("seeded built-in personality '{name}'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_case_insensitive_and_idempotent() {
        assert_eq!(normalize_name("  Teacher "), "teacher");
        assert_eq!(normalize_name("TEACHER"), "teacher");
        assert_eq!(normalize_name(&normalize_name("TeAcHeR")), "teacher");
    }

    #[test]
    fn validation_normalizes_the_name() {
        let p = validate("  Study Buddy ", "Helps with homework and revision", None).unwrap();
        assert_eq!(p.name, "study buddy");
    }

    #[test]
    fn name_bounds_and_charset_are_enforced() {
        assert!(validate("x", "A perfectly fine description", None).is_err());
        assert!(validate(&"x".repeat(51), "A perfectly fine description", None).is_err());
        assert!(validate("emoji🙂name", "A perfectly fine description", None).is_err());
        assert!(validate("ok-name_1", "A perfectly fine description", None).is_ok());
    }

    #[test]
    fn description_bounds_are_enforced() {
        assert!(validate("teacher", "too short", None).is_err());
        assert!(validate("teacher", &"d".repeat(501), None).is_err());
    }

    #[test]
    fn description_bounds_count_characters_not_bytes() {
        // 6 characters, 18 bytes: must fail the >=10 bound.
        assert!(validate("tutor", "नमस्ते", None).is_err());
        // 400 characters, 1200 bytes: must pass the <=500 bound.
        assert!(validate("tutor", &"न".repeat(400), None).is_ok());
    }

    #[test]
    fn missing_prompt_is_generated_from_description() {
        let p = validate("teacher", "Patient and encouraging tutor", None).unwrap();
        assert!(p.prompt.contains("teacher mode"));
        assert!(p.prompt.contains("Patient and encouraging tutor"));
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        let long = "p".repeat(2001);
        assert!(validate("teacher", "Patient and encouraging tutor", Some(&long)).is_err());
    }
}
