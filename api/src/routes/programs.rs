use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

use nutrifit_core::plan::{self, NewPlan};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::llm::CompletionRequest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/vapi/generate-program", post(generate_program))
}

/// Shared-secret header the voice platform attaches to tool-call requests.
const VAPI_SECRET_HEADER: &str = "x-vapi-secret";

/// Sampling temperature for both plan completions. High enough for varied
/// exercise selection, low enough to keep the JSON shape stable.
const PLAN_TEMPERATURE: f32 = 0.5;

const WORKOUT_SYSTEM_PROMPT: &str =
    "You are a professional fitness coach. Return ONLY valid JSON. No conversational text.";
const DIET_SYSTEM_PROMPT: &str = "You are a professional nutritionist. Return ONLY valid JSON.";

/// Every recognized tool-call option with its default, resolved in one
/// place so the prompt templates and the normalizer cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramArgs {
    pub user_id: String,
    pub fitness_goal: String,
    pub workout_days: i64,
    pub age: i64,
    pub fitness_level: String,
    pub dietary_restrictions: String,
    /// Echoed back in the tool-result envelope when present
    pub tool_call_id: Option<String>,
}

impl ProgramArgs {
    /// Accepts either the platform's tool-call envelope
    /// (`message.toolCalls[0].function.arguments`, native object or
    /// JSON-encoded string) or a flat argument object.
    ///
    /// `user_id` is the one hard requirement; rejecting it here means no
    /// model call is ever billed for an unattributable request.
    pub fn resolve(payload: &Value) -> Result<Self, AppError> {
        let (args, tool_call_id) = extract_arguments(payload)?;

        let user_id = match args.get("user_id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
            _ => {
                return Err(AppError::Validation {
                    message: "user_id is required".to_string(),
                    field: Some("user_id".to_string()),
                    received: args.get("user_id").cloned(),
                    docs_hint: Some(
                        "Pass user_id through the assistant's tool-call variables; without it \
                         the generated plan cannot be attached to an account."
                            .to_string(),
                    ),
                });
            }
        };

        Ok(Self {
            user_id,
            fitness_goal: plan::coerce_label(args.get("fitness_goal"), "general fitness"),
            workout_days: plan::coerce_count(args.get("workout_days"), 3),
            age: plan::coerce_count(args.get("age"), 25),
            fitness_level: plan::coerce_label(args.get("fitness_level"), "beginner"),
            dietary_restrictions: plan::coerce_label(args.get("dietary_restrictions"), "none"),
            tool_call_id,
        })
    }
}

fn extract_arguments(payload: &Value) -> Result<(Value, Option<String>), AppError> {
    let Some(tool_calls) = payload
        .pointer("/message/toolCalls")
        .and_then(Value::as_array)
    else {
        // No envelope: the payload itself is the argument bundle.
        return Ok((payload.clone(), None));
    };

    let Some(call) = tool_calls.first() else {
        return Err(AppError::Validation {
            message: "message.toolCalls is empty".to_string(),
            field: Some("message.toolCalls".to_string()),
            received: None,
            docs_hint: Some("The envelope must carry at least one tool call.".to_string()),
        });
    };

    let tool_call_id = call.get("id").and_then(Value::as_str).map(String::from);

    let args = match call.pointer("/function/arguments").cloned() {
        // The platform sometimes double-encodes arguments as a JSON string.
        Some(Value::String(encoded)) => {
            serde_json::from_str(&encoded).map_err(|err| AppError::Validation {
                message: format!("tool-call arguments are not valid JSON: {err}"),
                field: Some("message.toolCalls[0].function.arguments".to_string()),
                received: Some(Value::String(encoded)),
                docs_hint: None,
            })?
        }
        Some(other) => other,
        None => Value::Null,
    };

    Ok((args, tool_call_id))
}

fn workout_prompt(args: &ProgramArgs) -> String {
    format!(
        r#"Create a {days}-day workout plan for a {age}yo {level} focused on {goal}.
REQUIRED JSON FORMAT:
{{
  "schedule": ["Monday", "Wednesday", "Friday"],
  "exercises": [
    {{ "day": "Monday", "routines": [{{"name": "Squats", "sets": 3, "reps": 12}}] }}
  ]
}}"#,
        days = args.workout_days,
        age = args.age,
        level = args.fitness_level,
        goal = args.fitness_goal,
    )
}

fn diet_prompt(args: &ProgramArgs) -> String {
    format!(
        r#"Create a diet plan for goal: {goal} with restrictions: {restrictions}.
REQUIRED JSON FORMAT:
{{
  "dailyCalories": 2400,
  "meals": [
    {{ "name": "Breakfast", "foods": ["Oatmeal", "Egg whites"] }}
  ]
}}"#,
        goal = args.fitness_goal,
        restrictions = args.dietary_restrictions,
    )
}

/// Completion content that fails to parse is replaced by an empty object;
/// the normalizer turns that into the all-defaults plan.
fn parse_completion(content: &str) -> Value {
    serde_json::from_str(content).unwrap_or_else(|_| json!({}))
}

/// Tool-result envelope the voice platform expects back.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ToolCallResponse {
    pub results: Vec<ToolCallResult>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ToolCallResult {
    /// Echo of the originating tool call's id, when the envelope carried one
    #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub result: String,
}

/// Fulfill the voice agent's generate-program tool call.
///
/// The two completions share no data and run concurrently; both outputs go
/// through the normalizer no matter how well-formed they look, because
/// model JSON carries no type guarantee. The store write happens at most
/// once, after both completions succeed.
#[utoipa::path(
    post,
    path = "/vapi/generate-program",
    responses(
        (status = 200, description = "Plan generated and persisted", body = ToolCallResponse),
        (status = 400, description = "Missing user_id or malformed tool-call arguments", body = nutrifit_core::error::ApiError),
        (status = 401, description = "Shared secret mismatch", body = nutrifit_core::error::ApiError),
        (status = 500, description = "Model or store failure", body = nutrifit_core::error::ApiError)
    ),
    tag = "programs"
)]
pub async fn generate_program(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<Value>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &headers)?;

    let args = ProgramArgs::resolve(&payload)?;
    tracing::info!(user_id = %args.user_id, goal = %args.fitness_goal, "generating program");

    let workout_request = CompletionRequest {
        system: WORKOUT_SYSTEM_PROMPT.to_string(),
        prompt: workout_prompt(&args),
        temperature: PLAN_TEMPERATURE,
    };
    let diet_request = CompletionRequest {
        system: DIET_SYSTEM_PROMPT.to_string(),
        prompt: diet_prompt(&args),
        temperature: PLAN_TEMPERATURE,
    };

    let (workout_content, diet_content) = tokio::join!(
        state.model.complete_json(workout_request),
        state.model.complete_json(diet_request),
    );
    let (workout_content, diet_content) = (workout_content?, diet_content?);

    let workout_plan = plan::normalize_workout_plan(&parse_completion(&workout_content));
    let diet_plan = plan::normalize_diet_plan(&parse_completion(&diet_content));

    let plan_id = state
        .store
        .create_plan(NewPlan {
            user_id: args.user_id.clone(),
            name: format!("{} Plan", args.fitness_goal),
            workout_plan,
            diet_plan,
            is_active: true,
        })
        .await?;

    tracing::info!(user_id = %args.user_id, plan_id = %plan_id, "program persisted");

    Ok(Json(ToolCallResponse {
        results: vec![ToolCallResult {
            tool_call_id: args.tool_call_id,
            result: format!("Successfully generated and saved plan {plan_id}."),
        }],
    }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.vapi_secret.as_deref() else {
        // No secret configured: the check is skipped. Deliberate permissive
        // fallback for development deployments; see DESIGN.md.
        return Ok(());
    };

    let presented = headers
        .get(VAPI_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented == Some(expected) {
        Ok(())
    } else {
        tracing::warn!(decision = "deny", "tool-call shared secret mismatch");
        Err(AppError::Unauthorized {
            message: "Invalid or missing x-vapi-secret header".to_string(),
        })
    }
}
