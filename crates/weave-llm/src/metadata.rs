use serde_json::Value;
use weave_core::{Result, WeaveError};

/// The five coerced fields of an `update_generation` tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationUpdate {
    pub prompt: String,
    pub generate_image: bool,
    pub steps: i64,
    pub cfg: f64,
    pub seed: i64,
}

const EXPECTED_FUNCTION: &str = "update_generation";
const REQUIRED_FIELDS: [&str; 5] = ["prompt", "generate_image", "steps", "cfg", "seed"];

/// Coerces an already-located arguments object into a `GenerationUpdate`.
/// Each field accepts its schema-correct type or a string form; `prompt`
/// always becomes its string form regardless of source type.
pub fn parse_arguments(args: &Value) -> Result<GenerationUpdate> {
    let obj = args
        .as_object()
        .ok_or_else(|| WeaveError::ParseError("tool call arguments are not a JSON object".into()))?;

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| !obj.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(WeaveError::MissingFields(missing));
    }

    Ok(GenerationUpdate {
        prompt: coerce_prompt(&obj["prompt"]),
        generate_image: coerce_bool("generate_image", &obj["generate_image"])?,
        steps: coerce_i64("steps", &obj["steps"])?,
        cfg: coerce_f64("cfg", &obj["cfg"])?,
        seed: coerce_i64("seed", &obj["seed"])?,
    })
}

fn coerce_prompt(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_bool(field: &'static str, v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(WeaveError::ParseError(format!(
            "{field} is not a boolean or \"true\"/\"false\""
        ))),
    }
}

fn coerce_i64(field: &'static str, v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| WeaveError::ParseError(format!("{field} is not an integer"))),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| WeaveError::ParseError(format!("{field} is not a decimal integer string"))),
        _ => Err(WeaveError::ParseError(format!("{field} has an unsupported type"))),
    }
}

fn coerce_f64(field: &'static str, v: &Value) -> Result<f64> {
    match v {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| WeaveError::ParseError(format!("{field} is not a number"))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| WeaveError::ParseError(format!("{field} is not a decimal string"))),
        _ => Err(WeaveError::ParseError(format!("{field} has an unsupported type"))),
    }
}

/// Locates the `update_generation` call inside a decoded `tool_calls` JSON
/// array and coerces its arguments. `arguments` may itself be a JSON-encoded
/// string wrapping the object, an observed quirk of some providers.
pub fn extract_update_generation(tool_calls_json: &str) -> Result<GenerationUpdate> {
    let calls: Value =
        serde_json::from_str(tool_calls_json).map_err(|e| WeaveError::ParseError(e.to_string()))?;
    let calls = calls
        .as_array()
        .ok_or_else(|| WeaveError::ParseError("tool_calls is not a JSON array".into()))?;

    if calls.is_empty() {
        return Err(WeaveError::NoToolCalls);
    }

    let call = calls.iter().find(|c| call_name(c) == Some(EXPECTED_FUNCTION));
    let call = match call {
        Some(c) => c,
        None => {
            let found = call_name(&calls[0]).unwrap_or("<unknown>").to_string();
            return Err(WeaveError::WrongFunction {
                expected: EXPECTED_FUNCTION,
                found,
            });
        }
    };

    let args_value = call
        .get("function")
        .and_then(|f| f.get("arguments"))
        .or_else(|| call.get("arguments"))
        .ok_or_else(|| WeaveError::ParseError("tool call is missing an arguments field".into()))?;

    let args_obj = match args_value {
        Value::Object(_) => args_value.clone(),
        Value::String(s) => {
            serde_json::from_str(s).map_err(|e| WeaveError::ParseError(e.to_string()))?
        }
        _ => {
            return Err(WeaveError::ParseError(
                "tool call arguments have an unsupported type".into(),
            ));
        }
    };

    parse_arguments(&args_obj)
}

fn call_name(call: &Value) -> Option<&str> {
    call.get("function")
        .and_then(|f| f.get("name"))
        .and_then(Value::as_str)
        .or_else(|| call.get("name").and_then(Value::as_str))
}

/// The `tools` entry advertising `update_generation` to the provider. Sent
/// alongside every chat request so the model knows the function it can
/// call and the shape of its arguments.
pub fn update_generation_tool_schema() -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": EXPECTED_FUNCTION,
            "description": "Report the image generation request extracted from the conversation so far, including whether one was requested at all.",
            "parameters": {
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The image prompt to render, in the model's own words.",
                    },
                    "generate_image": {
                        "type": "boolean",
                        "description": "True if the user wants an image generated for this turn.",
                    },
                    "steps": {
                        "type": "integer",
                        "description": "Sampling steps to run.",
                    },
                    "cfg": {
                        "type": "number",
                        "description": "Classifier-free guidance scale.",
                    },
                    "seed": {
                        "type": "integer",
                        "description": "Seed to render with, or -1 for no preference.",
                    },
                },
                "required": REQUIRED_FIELDS,
            },
        },
    })
}
