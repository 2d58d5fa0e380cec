use serde::Deserialize;
use tracing::debug;

use spark_core::model::{Step, StepError};

use crate::ai::client::AiClient;
use crate::error::AiError;

/// Project plan produced by the generation endpoint, validated into domain
/// steps.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedProject {
    pub title: String,
    pub description: String,
    pub steps: Vec<Step>,
}

/// Drives the prompt/parse loop for turning a topic into a project plan.
pub struct ProjectGenerator {
    client: AiClient,
}

impl ProjectGenerator {
    #[must_use]
    pub fn new(client: AiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    /// Generate a step-by-step project plan for the given topic.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Disabled` when no API key is configured,
    /// `AiError::MalformedResponse` when the model's output cannot be parsed
    /// into a plan, and transport errors after the retry policy gives up.
    pub async fn generate_project(&self, topic: &str) -> Result<GeneratedProject, AiError> {
        let prompt = build_prompt(topic);
        let text = self.client.generate_with_retry(&prompt).await?;
        debug!(chars = text.len(), "parsing generated project plan");
        parse_generated_project(&text)
    }
}

fn build_prompt(topic: &str) -> String {
    format!(
        "You are a project planner for a hands-on learning app. \
         Create a practical project for learning: {topic}\n\n\
         Respond with ONLY a JSON object, no markdown fences, shaped as:\n\
         {{\n\
           \"title\": \"short project title\",\n\
           \"description\": \"one-paragraph summary\",\n\
           \"steps\": [\n\
             {{\"title\": \"step title\", \"description\": \"what to do\", \
         \"learningFocus\": \"the skill this step teaches\"}}\n\
           ]\n\
         }}\n\n\
         Produce between 3 and 8 steps, ordered from setup to finish."
    )
}

#[derive(Deserialize)]
struct WireProject {
    title: String,
    #[serde(default)]
    description: String,
    steps: Vec<WireStep>,
}

#[derive(Deserialize)]
struct WireStep {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "learningFocus")]
    learning_focus: String,
}

/// Parse a model response into a [`GeneratedProject`].
///
/// Models tend to wrap JSON in prose or markdown fences, so this takes the
/// slice between the first `{` and the last `}` before deserializing.
///
/// # Errors
///
/// Returns `AiError::MalformedResponse` when no JSON object is present, the
/// JSON does not match the expected shape, or the plan has no usable steps.
pub fn parse_generated_project(text: &str) -> Result<GeneratedProject, AiError> {
    let start = text
        .find('{')
        .ok_or_else(|| AiError::MalformedResponse("no JSON object in response".to_owned()))?;
    let end = text
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| AiError::MalformedResponse("unterminated JSON object".to_owned()))?;

    let wire: WireProject = serde_json::from_str(&text[start..=end])
        .map_err(|e| AiError::MalformedResponse(e.to_string()))?;

    let steps = wire
        .steps
        .into_iter()
        .map(|step| Step::new(step.title, step.description, step.learning_focus))
        .collect::<Result<Vec<_>, StepError>>()
        .map_err(|e| AiError::MalformedResponse(e.to_string()))?;
    if steps.is_empty() {
        return Err(AiError::MalformedResponse(
            "plan contains no steps".to_owned(),
        ));
    }

    let title = wire.title.trim();
    if title.is_empty() {
        return Err(AiError::MalformedResponse("plan has no title".to_owned()));
    }

    Ok(GeneratedProject {
        title: title.to_owned(),
        description: wire.description.trim().to_owned(),
        steps,
    })
}
