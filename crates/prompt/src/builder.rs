//! Prompt builder for rendering templates.

use crate::types::{AnswerInput, BuiltPrompt, BuiltPromptMetadata, CondenseInput, PromptDefinition};
use electro_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Build the grounded answer prompt.
///
/// The definition's `system` text becomes the system message and the
/// rendered `template` the user message.
///
/// # Example
/// ```no_run
/// use electro_prompt::{build_prompt, default_prompt, AnswerInput};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let input = AnswerInput {
///     question: "What is the tolerance?".to_string(),
///     ..AnswerInput::default()
/// };
/// let built = build_prompt(&default_prompt()?, &input)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, input: &AnswerInput) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt = %definition.id,
        context_blocks = input.context.len(),
        history_turns = input.history.len(),
        "Building answer prompt"
    );

    let user = render_template(&definition.template, input)?;
    let system = Some(definition.system.trim().to_string()).filter(|s| !s.is_empty());

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            context_blocks: input.context.len(),
            history_turns: input.history.len(),
        },
    })
}

/// Render the prompt that asks the model to rewrite a follow-up question.
pub fn build_condense_prompt(
    definition: &PromptDefinition,
    input: &CondenseInput,
) -> AppResult<String> {
    render_template(&definition.condense_template, input)
}

/// Render a Handlebars template against serializable variables.
fn render_template<T: Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered.trim().to_string())
}
