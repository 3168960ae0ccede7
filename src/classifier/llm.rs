//! LLM-backed habit classifier.
//!
//! Each operation declares one function (`generate_plant_data` or
//! `track_habit_progress`) and asks the model to call it. A proper function
//! call yields [`Classified::Structured`]; a text answer containing a JSON
//! object yields [`Classified::Recovered`]. Values are validated either way.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::classifier::recovery::extract_json;
use crate::classifier::{
    Classified, HabitClassifier, InitialAssessment, PlantSeed, TrendRequest,
};
use crate::error::ClassifierError;
use crate::garden::habits::describe;
use crate::garden::{
    Dimension, HabitSnapshot, InitialHabits, MAX_LEVEL, MIN_LEVEL, PerDimension, Polarity,
    Verdict, Verdicts,
};
use crate::llm::{ChatMessage, LlmProvider, ToolCompletionRequest, ToolDefinition};

pub const INITIATE_TOOL: &str = "generate_plant_data";
pub const TRACK_TOOL: &str = "track_habit_progress";

const SYSTEM_PROMPT: &str = "You assess lifestyle habits for a habit-tracking garden. \
Always answer by calling the provided function with arguments that match its schema.";

/// Classifier that delegates judgement to an LLM through function calling.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    async fn call(
        &self,
        prompt: String,
        tool: ToolDefinition,
    ) -> Result<Classified<Value>, ClassifierError> {
        let tool_name = tool.name.clone();
        let request = ToolCompletionRequest::new(
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            vec![tool],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(512)
        .with_tool_choice("auto");

        let response = self.llm.complete_with_tools(request).await?;

        tracing::debug!(
            model = self.llm.model_name(),
            tool = %tool_name,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            calls = response.tool_calls.len(),
            "classifier response received"
        );

        if let Some(call) = response.tool_calls.into_iter().find(|c| c.name == tool_name) {
            return match call.arguments {
                Value::Object(_) => Ok(Classified::Structured(call.arguments)),
                // Arguments the provider could not parse as JSON.
                Value::String(raw) => extract_json(&raw).map(Classified::Recovered).ok_or_else(|| {
                    ClassifierError::InvalidOutput {
                        reason: format!("{tool_name} arguments are not a JSON object"),
                    }
                }),
                other => Err(ClassifierError::InvalidOutput {
                    reason: format!("{tool_name} arguments are not an object: {other}"),
                }),
            };
        }

        match response.content.as_deref().and_then(extract_json) {
            Some(value) => {
                tracing::warn!(tool = %tool_name, "model answered in text; recovered JSON from it");
                Ok(Classified::Recovered(value))
            }
            None => Err(ClassifierError::MissingCall { tool: tool_name }),
        }
    }
}

#[async_trait]
impl HabitClassifier for LlmClassifier {
    async fn initiate(
        &self,
        habits: &InitialHabits,
    ) -> Result<Classified<InitialAssessment>, ClassifierError> {
        let raw = self.call(initiate_prompt(habits), initiate_tool()).await?;
        raw.try_map(|value| parse_assessment(&value))
    }

    async fn classify(
        &self,
        request: &TrendRequest,
    ) -> Result<Classified<Verdicts>, ClassifierError> {
        let raw = self.call(trend_prompt(request), track_tool()).await?;
        raw.try_map(|value| parse_verdicts(&value))
    }
}

// ==================== Function schemas ====================

fn initiate_tool() -> ToolDefinition {
    let seed = json!({
        "type": "array",
        "description": "[polarityA, polarityB, age, health] where polarities are \"good\" or \"bad\" and age/health are integers 0-10 given as strings",
        "items": { "type": "string" },
        "minItems": 4,
        "maxItems": 4
    });
    ToolDefinition {
        name: INITIATE_TOOL.to_string(),
        description: "Generates plant polarities, age, and health from the user's habits."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "food": seed.clone(),
                "health": seed.clone(),
                "toxic": seed,
            },
            "required": ["food", "health", "toxic"]
        }),
    }
}

fn track_tool() -> ToolDefinition {
    let verdict = json!({ "type": "string", "enum": ["progress", "degrade", "constant"] });
    ToolDefinition {
        name: TRACK_TOOL.to_string(),
        description: "Reports whether each habit dimension is improving, degrading, or constant."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "food": verdict.clone(),
                "health": verdict.clone(),
                "toxic": verdict,
            },
            "required": ["food", "health", "toxic"]
        }),
    }
}

// ==================== Prompts ====================

fn list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn initiate_prompt(habits: &InitialHabits) -> String {
    format!(
        "Classify the user's habits into plant pairs, one pair per dimension.\n\
         Give each pair a polarity (\"good\" or \"bad\") for both plants, an age, and a health from 0 to 10.\n\
         Mostly healthy habits get health 6 to 10; mostly unhealthy habits get health 0 to 4.\n\n\
         Food, regular: {regular}\n\
         Food, occasional: {occasional}\n\
         Health status: {health}\n\
         Toxin use: {toxic}\n\n\
         Pairing rules:\n\
         - healthy diet: [\"good\", \"good\"]; mixed diet: [\"good\", \"bad\"]; mostly junk food: [\"bad\", \"bad\"]\n\
         - good health: [\"good\", \"good\"]; health issues: [\"good\", \"bad\"]\n\
         - no toxins: [\"good\", \"good\"]; occasional toxins: [\"good\", \"bad\"]; regular toxins: [\"bad\", \"bad\"]\n\n\
         Call {INITIATE_TOOL} with food, health and toxic each set to [polarityA, polarityB, age, health].",
        regular = list(&habits.regular),
        occasional = list(&habits.occasional),
        health = list(&habits.health),
        toxic = list(&habits.toxic),
    )
}

fn snapshot_lines(snapshot: &HabitSnapshot) -> String {
    Dimension::ALL
        .iter()
        .map(|d| format!("- {d}: {}", describe(*d, snapshot)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn trend_prompt(request: &TrendRequest) -> String {
    let mut prompt = format!(
        "Compare the user's previous and current habits and decide, per dimension, whether they are \
         progressing, degrading, or constant.\n\n\
         Previous:\n{previous}\n\n\
         Current:\n{current}\n",
        previous = snapshot_lines(&request.previous),
        current = snapshot_lines(&request.current),
    );

    if let Some(baseline) = &request.baseline {
        prompt.push_str(&format!(
            "\nWhen the garden was planted the habits were:\n{}\n",
            snapshot_lines(&baseline.to_snapshot())
        ));
    }

    prompt.push_str(&format!(
        "\nRules:\n\
         - healthier food added or unhealthy food removed: \"progress\"\n\
         - unhealthy food added or junk food increased: \"degrade\"\n\
         - a health issue improving: \"progress\"; a new health issue: \"degrade\"\n\
         - less toxin use: \"progress\"; more toxin use: \"degrade\"\n\
         - nothing meaningfully different: \"constant\"\n\n\
         Call {TRACK_TOOL} with food, health and toxic set to \"progress\", \"degrade\" or \"constant\"."
    ));
    prompt
}

// ==================== Output parsing ====================

/// Look up a dimension's field, accepting the `<dimension>Prompt` spelling too.
fn field<'a>(value: &'a Value, dimension: Dimension) -> Result<&'a Value, ClassifierError> {
    value
        .get(dimension.as_str())
        .or_else(|| value.get(format!("{}Prompt", dimension.as_str())))
        .ok_or_else(|| ClassifierError::InvalidOutput {
            reason: format!("missing field '{dimension}'"),
        })
}

fn invalid(dimension: Dimension, reason: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::InvalidOutput {
        reason: format!("{dimension}: {reason}"),
    }
}

fn parse_polarity(dimension: Dimension, item: &Value) -> Result<Polarity, ClassifierError> {
    item.as_str()
        .ok_or_else(|| invalid(dimension, format!("polarity {item} is not a string")))?
        .parse()
        .map_err(|e| invalid(dimension, e))
}

/// Accept integers, integral floats, and numeric strings; reject out-of-range.
fn parse_level(dimension: Dimension, name: &str, item: &Value) -> Result<i64, ClassifierError> {
    let level = match item {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(dimension, format!("{name} {item} is not an integer")))?;

    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return Err(invalid(
            dimension,
            format!("{name} {level} outside {MIN_LEVEL}..={MAX_LEVEL}"),
        ));
    }
    Ok(level)
}

fn parse_seed(dimension: Dimension, value: &Value) -> Result<PlantSeed, ClassifierError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(dimension, "expected a 4-element array"))?;
    let [a, b, age, health] = items.as_slice() else {
        return Err(invalid(
            dimension,
            format!("expected 4 elements, got {}", items.len()),
        ));
    };

    Ok(PlantSeed {
        polarity_a: parse_polarity(dimension, a)?,
        polarity_b: parse_polarity(dimension, b)?,
        age: parse_level(dimension, "age", age)?,
        health: parse_level(dimension, "health", health)?,
    })
}

pub(crate) fn parse_assessment(value: &Value) -> Result<InitialAssessment, ClassifierError> {
    Ok(PerDimension {
        food: parse_seed(Dimension::Food, field(value, Dimension::Food)?)?,
        health: parse_seed(Dimension::Health, field(value, Dimension::Health)?)?,
        toxic: parse_seed(Dimension::Toxic, field(value, Dimension::Toxic)?)?,
    })
}

fn parse_verdict(dimension: Dimension, value: &Value) -> Result<Verdict, ClassifierError> {
    value
        .as_str()
        .ok_or_else(|| invalid(dimension, format!("verdict {value} is not a string")))?
        .parse()
        .map_err(|e| invalid(dimension, e))
}

pub(crate) fn parse_verdicts(value: &Value) -> Result<Verdicts, ClassifierError> {
    Ok(PerDimension {
        food: parse_verdict(Dimension::Food, field(value, Dimension::Food)?)?,
        health: parse_verdict(Dimension::Health, field(value, Dimension::Health)?)?,
        toxic: parse_verdict(Dimension::Toxic, field(value, Dimension::Toxic)?)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{FinishReason, ToolCall, ToolCompletionResponse};

    /// Provider returning canned responses and recording requests.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<ToolCompletionResponse, LlmError>>>,
        requests: Mutex<Vec<ToolCompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<ToolCompletionResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments,
            }],
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::ToolUse,
        }
    }

    fn text(content: &str) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: Some(content.to_string()),
            tool_calls: vec![],
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::Stop,
        }
    }

    fn habits() -> InitialHabits {
        InitialHabits {
            regular: vec!["salad".to_string()],
            occasional: vec!["pizza".to_string()],
            health: vec![],
            toxic: vec!["smoking".to_string()],
        }
    }

    fn trend() -> TrendRequest {
        TrendRequest {
            previous: habits().to_snapshot(),
            current: HabitSnapshot {
                food: vec!["salad".to_string()],
                health: vec![],
                toxic: vec![],
            },
            baseline: Some(habits()),
        }
    }

    #[tokio::test]
    async fn initiate_parses_function_call_with_string_numbers() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            INITIATE_TOOL,
            json!({
                "food": ["good", "bad", "4", "6"],
                "health": ["Good", "good", 7, 8],
                "toxic": ["bad", "bad", "2", "3"]
            }),
        ))]);
        let classifier = LlmClassifier::new(provider.clone(), 0.0);

        let result = classifier.initiate(&habits()).await.unwrap();
        let Classified::Structured(assessment) = result else {
            panic!("expected structured result");
        };
        assert_eq!(
            assessment.food,
            PlantSeed {
                polarity_a: Polarity::Good,
                polarity_b: Polarity::Bad,
                age: 4,
                health: 6,
            }
        );
        assert_eq!(assessment.health.polarity_a, Polarity::Good);
        assert_eq!(assessment.toxic.health, 3);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].tools[0].name, INITIATE_TOOL);
        assert!(requests[0].messages[1].content.contains("smoking"));
    }

    #[tokio::test]
    async fn initiate_rejects_out_of_range_levels() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            INITIATE_TOOL,
            json!({
                "food": ["good", "bad", "4", "11"],
                "health": ["good", "good", "7", "8"],
                "toxic": ["bad", "bad", "2", "3"]
            }),
        ))]);
        let classifier = LlmClassifier::new(provider, 0.0);

        let err = classifier.initiate(&habits()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidOutput { .. }), "{err}");
        assert!(err.to_string().contains("health 11"), "{err}");
    }

    #[tokio::test]
    async fn initiate_rejects_short_arrays() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            INITIATE_TOOL,
            json!({
                "food": ["good", "bad", "4"],
                "health": ["good", "good", "7", "8"],
                "toxic": ["bad", "bad", "2", "3"]
            }),
        ))]);
        let err = LlmClassifier::new(provider, 0.0)
            .initiate(&habits())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 4 elements"), "{err}");
    }

    #[tokio::test]
    async fn classify_parses_verdicts() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            TRACK_TOOL,
            json!({"food": "constant", "health": "degrade", "toxic": "progress"}),
        ))]);
        let classifier = LlmClassifier::new(provider.clone(), 0.0);

        let result = classifier.classify(&trend()).await.unwrap();
        assert_eq!(
            result,
            Classified::Structured(Verdicts {
                food: Verdict::Constant,
                health: Verdict::Degrade,
                toxic: Verdict::Progress,
            })
        );

        let requests = provider.requests.lock().unwrap();
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("When the garden was planted"), "{prompt}");
        assert!(prompt.contains("- toxic: (none)"), "{prompt}");
    }

    #[tokio::test]
    async fn classify_accepts_prompt_suffixed_fields() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            TRACK_TOOL,
            json!({"foodPrompt": "progress", "healthPrompt": "constant", "toxicPrompt": "constant"}),
        ))]);
        let verdicts = LlmClassifier::new(provider, 0.0)
            .classify(&trend())
            .await
            .unwrap()
            .into_inner();
        assert_eq!(verdicts.food, Verdict::Progress);
    }

    #[tokio::test]
    async fn text_answers_are_tagged_recovered() {
        let provider = ScriptedProvider::new(vec![Ok(text(
            "Here is the result: {\"food\": \"progress\", \"health\": \"constant\", \"toxic\": \"degrade\"}",
        ))]);
        let result = LlmClassifier::new(provider, 0.0)
            .classify(&trend())
            .await
            .unwrap();
        assert_eq!(result.confidence(), crate::classifier::Confidence::Recovered);
        assert_eq!(result.value().toxic, Verdict::Degrade);
    }

    #[tokio::test]
    async fn missing_call_without_json_fails() {
        let provider = ScriptedProvider::new(vec![Ok(text("I cannot help with that."))]);
        let err = LlmClassifier::new(provider, 0.0)
            .classify(&trend())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::MissingCall { ref tool } if tool == TRACK_TOOL));
    }

    #[tokio::test]
    async fn unknown_verdict_is_invalid_output() {
        let provider = ScriptedProvider::new(vec![Ok(call(
            TRACK_TOOL,
            json!({"food": "better", "health": "constant", "toxic": "constant"}),
        ))]);
        let err = LlmClassifier::new(provider, 0.0)
            .classify(&trend())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidOutput { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = ScriptedProvider::new(vec![Err(LlmError::RateLimited {
            provider: "scripted".to_string(),
            retry_after: None,
        })]);
        let err = LlmClassifier::new(provider, 0.0)
            .classify(&trend())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn parse_level_accepts_integral_floats() {
        assert_eq!(parse_level(Dimension::Food, "age", &json!(3.0)).unwrap(), 3);
        assert!(parse_level(Dimension::Food, "age", &json!(3.5)).is_err());
        assert!(parse_level(Dimension::Food, "age", &json!("-1")).is_err());
        assert!(parse_level(Dimension::Food, "age", &json!(null)).is_err());
    }
}
