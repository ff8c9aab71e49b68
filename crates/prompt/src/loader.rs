//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use electro_core::{AppError, AppResult};
use std::path::Path;

const DEFAULT_PROMPT_YAML: &str = include_str!("../prompts/default.yml");

/// The built-in datasheet answering prompt.
pub fn default_prompt() -> AppResult<PromptDefinition> {
    parse_prompt(DEFAULT_PROMPT_YAML, "built-in prompt")
}

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use electro_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts/terse.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompt_file: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;
    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load `prompt_file` when configured, otherwise the built-in prompt.
pub fn resolve_prompt(prompt_file: Option<&Path>) -> AppResult<PromptDefinition> {
    match prompt_file {
        Some(path) => load_prompt(path),
        None => default_prompt(),
    }
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if def.condense_template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt condenseTemplate cannot be empty".to_string(),
        ));
    }

    if !def.template.contains("{{question}}") {
        return Err(AppError::Prompt(format!(
            "Prompt {} template never references {{{{question}}}}",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
