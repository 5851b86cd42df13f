//! Default tools registered on every assistant.
//!
//! Provides the stock tool set (`get_weather`, `generate_ai_id`,
//! `generate_frequency`). Each tool is constructed via [`FnTool::new`] and
//! returned as `Arc<dyn Tool>`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::tools::tool::{FnTool, Tool, ToolExecutionContext};
use crate::tools::types::ToolParameters;

const CONDITIONS: &[&str] = &["sunny", "partly cloudy", "overcast", "light rain", "thunderstorms"];

fn stable_hash(input: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    hasher.finish()
}

/// Create the `get_weather` tool — reports conditions for a city and date.
///
/// Conditions are derived deterministically from the city/date pair; no
/// upstream weather service is contacted.
pub fn weather_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_weather",
        "Get the weather for a city on a given date",
        ToolParameters::object()
            .string("city", "City name, e.g. Singapore, Beijing, London", true)
            .string("date", "Date, e.g. today, tomorrow", false)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let city = args.get_str("city")?.to_string();
            let date = args.get_str_opt("date").unwrap_or("today").to_string();

            let hash = stable_hash(&format!("{city}|{date}"));
            let condition = CONDITIONS[(hash % CONDITIONS.len() as u64) as usize];
            let temperature_c = 8 + (hash / 7 % 28) as i64;

            Ok(serde_json::json!({
                "city": city,
                "date": date,
                "condition": condition,
                "temperature_c": temperature_c,
            }))
        },
    ))
}

/// Create the `generate_ai_id` tool — mints a unique AI identifier.
pub fn ai_id_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "generate_ai_id",
        "Generate a unique AI identifier",
        ToolParameters::object()
            .string("name", "Optional name to prefix the identifier with", false)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            let ai_id = match args.get_str_opt("name") {
                Some(name) if !name.is_empty() => {
                    let slug: String = name
                        .chars()
                        .map(|c| {
                            if c.is_ascii_alphanumeric() {
                                c.to_ascii_lowercase()
                            } else {
                                '-'
                            }
                        })
                        .collect();
                    format!("{slug}-{}", &suffix[..8])
                }
                _ => format!("ai-{}", &suffix[..8]),
            };
            Ok(serde_json::json!({ "ai_id": ai_id }))
        },
    ))
}

/// Create the `generate_frequency` tool — derives a frequency code from an
/// AI identifier plus personality/AI type codes.
pub fn frequency_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "generate_frequency",
        "Generate a frequency code for an AI identifier",
        ToolParameters::object()
            .string("ai_id", "AI identifier to derive the code from", true)
            .string("personality_type", "Personality type code, defaults to P", false)
            .string("ai_type", "AI type code, defaults to A", false)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let ai_id = args.get_str("ai_id")?.to_string();
            let personality = args.get_str_opt("personality_type").unwrap_or("P").to_string();
            let ai_type = args.get_str_opt("ai_type").unwrap_or("A").to_string();

            let code = stable_hash(&ai_id) % 10_000;
            Ok(serde_json::json!({
                "frequency": format!("FRQ-{personality}{ai_type}-{code:04}"),
                "ai_id": ai_id,
            }))
        },
    ))
}

/// The default tool set registered on every assistant.
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![weather_tool(), ai_id_tool(), frequency_tool()]
}
