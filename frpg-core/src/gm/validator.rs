//! Structured-output validation for world setup tasks.
//!
//! After a setup task runs, the produced artifact is judged by a second
//! generation pass constrained to a verdict schema. A non-complying
//! verdict carries feedback that is fed back into the next attempt.

use crate::provider::{Generate, GenerationError};
use groq::ChatMessage;
use serde_json::{json, Value};

const VALIDATOR_PROMPT: &str = include_str!("prompts/validator.txt");

/// Whether an artifact satisfied its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compliance {
    Comply,
    NotComply,
}

/// The validator's judgement of one setup artifact.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub compliance: Compliance,
    /// What to fix; meaningful when the verdict is `NotComply`.
    pub feedback: String,
}

impl Verdict {
    pub fn complies(&self) -> bool {
        self.compliance == Compliance::Comply
    }
}

fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "format_comply_or_not": {
                "type": "string",
                "enum": ["comply", "not comply"],
                "description": "Whether the output fits the requested format"
            },
            "feedback": {
                "type": "string",
                "description": "What is wrong with the output, if anything"
            }
        },
        "required": ["format_comply_or_not", "feedback"]
    })
}

/// Judge `artifact` against `task`.
pub async fn check(
    provider: &dyn Generate,
    task: &str,
    artifact: &str,
) -> Result<Verdict, GenerationError> {
    let messages = vec![
        ChatMessage::system(VALIDATOR_PROMPT),
        ChatMessage::user(format!(
            "The requested task was:\n{task}\n\nThe output produced was:\n{artifact}"
        )),
    ];

    let value = provider
        .complete_structured(messages, &verdict_schema())
        .await?;
    parse_verdict(&value)
}

/// Parse a verdict object, tolerating minor key and casing drift.
fn parse_verdict(value: &Value) -> Result<Verdict, GenerationError> {
    let raw = value
        .get("format_comply_or_not")
        .or_else(|| value.get("compliance"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GenerationError::Malformed(format!("verdict missing compliance field: {value}"))
        })?;

    let compliance = match raw.to_lowercase().replace('_', " ").trim() {
        "comply" | "complies" | "yes" => Compliance::Comply,
        "not comply" | "does not comply" | "no" => Compliance::NotComply,
        other => {
            return Err(GenerationError::Malformed(format!(
                "unrecognized compliance value: {other}"
            )))
        }
    };

    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Verdict {
        compliance,
        feedback,
    })
}
