use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Schedule used when the model omits one or returns an empty list.
const FALLBACK_SCHEDULE: [&str; 3] = ["Monday", "Wednesday", "Friday"];

/// Foods used when a meal arrives with no food list.
const FALLBACK_FOODS: [&str; 3] = ["Healthy Protein", "Vegetables", "Complex Carbs"];

const DEFAULT_DAY_LABEL: &str = "Workout Day";
const DEFAULT_ROUTINE_NAME: &str = "Strength Exercise";
const DEFAULT_MEAL_NAME: &str = "Meal";
const DEFAULT_SETS: i64 = 3;
const DEFAULT_REPS: i64 = 10;
const DEFAULT_DAILY_CALORIES: i64 = 2200;

/// A week of training: which days to train and what to do on each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkoutPlan {
    /// Day names, never empty
    pub schedule: Vec<String>,
    pub exercises: Vec<WorkoutDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkoutDay {
    pub day: String,
    pub routines: Vec<Routine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Routine {
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    pub daily_calories: i64,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Meal {
    pub name: String,
    /// Never empty
    pub foods: Vec<String>,
}

/// The record handed to the store's `createPlan` mutation. Field names
/// follow the store's document schema, not this crate's conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub user_id: String,
    /// Derived as "<goal> Plan"
    pub name: String,
    pub workout_plan: WorkoutPlan,
    pub diet_plan: DietPlan,
    pub is_active: bool,
}

/// Shape arbitrary decoded JSON into a valid [`WorkoutPlan`].
///
/// Model output is unreliable rather than malicious: fields go missing,
/// arrive as strings, or hold the wrong type entirely. This function is
/// total and idempotent; whatever comes in, the result satisfies the plan
/// shape invariants.
pub fn normalize_workout_plan(raw: &Value) -> WorkoutPlan {
    let schedule = match raw.get("schedule").and_then(Value::as_array) {
        Some(days) if !days.is_empty() => days.iter().map(stringify_entry).collect(),
        _ => FALLBACK_SCHEDULE.iter().map(|day| day.to_string()).collect(),
    };

    let exercises = raw
        .get("exercises")
        .and_then(Value::as_array)
        .map(|days| days.iter().map(normalize_workout_day).collect())
        .unwrap_or_default();

    WorkoutPlan { schedule, exercises }
}

/// Shape arbitrary decoded JSON into a valid [`DietPlan`]. Same contract
/// as [`normalize_workout_plan`]: total, idempotent, always in-shape.
pub fn normalize_diet_plan(raw: &Value) -> DietPlan {
    let meals = raw
        .get("meals")
        .and_then(Value::as_array)
        .map(|meals| meals.iter().map(normalize_meal).collect())
        .unwrap_or_default();

    DietPlan {
        daily_calories: coerce_count(raw.get("dailyCalories"), DEFAULT_DAILY_CALORIES),
        meals,
    }
}

fn normalize_workout_day(entry: &Value) -> WorkoutDay {
    let routines = entry
        .get("routines")
        .and_then(Value::as_array)
        .map(|routines| routines.iter().map(normalize_routine).collect())
        .unwrap_or_default();

    WorkoutDay {
        day: coerce_label(entry.get("day"), DEFAULT_DAY_LABEL),
        routines,
    }
}

fn normalize_routine(entry: &Value) -> Routine {
    Routine {
        name: coerce_label(entry.get("name"), DEFAULT_ROUTINE_NAME),
        sets: coerce_count(entry.get("sets"), DEFAULT_SETS),
        reps: coerce_count(entry.get("reps"), DEFAULT_REPS),
        duration: optional_text(entry.get("duration")),
        description: optional_text(entry.get("description")),
    }
}

fn normalize_meal(entry: &Value) -> Meal {
    let foods = match entry.get("foods").and_then(Value::as_array) {
        Some(foods) if !foods.is_empty() => foods.iter().map(stringify_entry).collect(),
        _ => FALLBACK_FOODS.iter().map(|food| food.to_string()).collect(),
    };

    Meal {
        name: coerce_label(entry.get("name"), DEFAULT_MEAL_NAME),
        foods,
    }
}

/// Numify-or-default: absent, non-numeric, and zero all yield the default.
/// Numeric strings count as numeric ("12" is 12), everything else does not.
pub fn coerce_count(value: Option<&Value>, default: i64) -> i64 {
    match numify(value) {
        Some(n) if n != 0.0 => n as i64,
        _ => default,
    }
}

/// String-or-default for required labels: non-empty strings pass through,
/// non-zero numbers are rendered, everything else yields the default.
pub fn coerce_label(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        _ => default.to_string(),
    }
}

/// Optional free-text fields are carried only when present and non-empty;
/// there is no default to substitute.
fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// List entries keep their text if they already are text, otherwise their
/// JSON rendering. Keeps the normalizer total on mixed-type lists.
fn stringify_entry(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numify(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}
