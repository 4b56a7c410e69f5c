//! Prompt construction and response parsing shared by the remote providers.

use crate::types::{GeneratorError, IssueDraft};

pub(crate) fn build_generation_prompt(template: &str, components: &[String], count: u32) -> String {
    let components_text = if components.is_empty() {
        String::new()
    } else {
        format!("\n\nComponents to include:\n{}", components.join("\n"))
    };

    format!(
        "You are a GitHub issue generation assistant. Generate {count} unique issue descriptions based on the following template.\n\n\
         Template:\n{template}{components_text}\n\n\
         Requirements:\n\
         - Each issue should be unique and follow the template structure\n\
         - Maintain professional tone\n\
         - Keep titles concise (under 80 characters)\n\
         - Include all relevant details in the body\n\
         - If components are provided, incorporate them naturally\n\n\
         Generate {count} issues in the following JSON format:\n\
         [\n  {{\n    \"title\": \"Issue title here\",\n    \"body\": \"Issue body here\"\n  }}\n]\n\n\
         Only return valid JSON, no additional text."
    )
}

pub(crate) fn build_count_prompt(template: &str) -> String {
    format!(
        "You are a task breakdown assistant. Analyze the following requirements and determine the optimal number of smaller issues needed to implement them.\n\n\
         Requirements:\n{template}\n\n\
         Consider the complexity, a natural logical breakdown into subtasks, and manageable task sizes.\n\n\
         Respond with ONLY a JSON object in this format:\n\
         {{\"count\": <number>, \"reasoning\": \"<brief explanation>\"}}"
    )
}

/// Extracts the draft array from a provider reply, tolerating markdown code
/// fences and prose around the JSON payload.
pub(crate) fn parse_drafts(content: &str) -> Result<Vec<IssueDraft>, GeneratorError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(GeneratorError::InvalidResponse(
            "reply does not contain a JSON array".to_string(),
        ));
    };
    if end < start {
        return Err(GeneratorError::InvalidResponse(
            "reply does not contain a JSON array".to_string(),
        ));
    }
    let drafts: Vec<IssueDraft> = serde_json::from_str(&content[start..=end])?;
    if drafts.is_empty() {
        return Err(GeneratorError::InvalidResponse(
            "reply contained an empty draft array".to_string(),
        ));
    }
    Ok(drafts)
}

/// Pulls a count out of a provider reply: a `{"count": N}` object when
/// present, otherwise the first integer in the text.
pub(crate) fn parse_count(content: &str) -> Option<u32> {
    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content[start..=end]) {
                if let Some(count) = value.get("count").and_then(serde_json::Value::as_u64) {
                    return u32::try_from(count).ok();
                }
            }
        }
    }

    let mut digits = String::new();
    for ch in content.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

/// Size heuristic used when no provider can decide a count.
pub(crate) fn estimate_count(template: &str) -> u32 {
    let length = template.len();
    let line_count = template.lines().count().max(1);
    if length < 200 || line_count < 3 {
        1
    } else if length < 500 || line_count < 10 {
        3
    } else if length < 1_000 || line_count < 20 {
        5
    } else if length < 2_000 || line_count < 40 {
        8
    } else {
        10
    }
}
