//! JSON extraction templates: each supplies the system prompt that tells the
//! model which fields to pull out of a markdown document.

use crate::api::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Field name and a short type/meaning hint.
    pub schema: &'static [(&'static str, &'static str)],
    pub system_prompt: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Please select a valid template")]
    UnknownTemplate(String),
    #[error("Please paste markdown content")]
    EmptyInput,
}

pub const JSON_TEMPLATES: &[JsonTemplate] = &[JsonTemplate {
    id: "mutual-fund",
    name: "Mutual Fund Factsheet",
    description: "Extract structured data from mutual fund factsheets",
    schema: &[
        ("fundName", "string - Name of the mutual fund"),
        ("amcName", "string - Asset Management Company name"),
        ("nav", "number - Current Net Asset Value"),
        ("expenseRatio", "number - Expense ratio as percentage"),
        ("aum", "string - Assets Under Management"),
        ("returns1Y", "number - 1-year return percentage"),
        ("returns3Y", "number - 3-year return percentage (annualized)"),
        ("returns5Y", "number - 5-year return percentage (annualized)"),
        ("riskLevel", "string - Risk level (Low/Medium/High)"),
        ("category", "string - Fund category (Equity/Debt/Hybrid/etc)"),
        ("managerName", "string - Fund manager name"),
        ("inceptionDate", "string - Fund inception date"),
    ],
    system_prompt: "You are an expert at extracting structured data from mutual fund factsheets.
Extract the following information from the provided markdown content and return it as valid JSON.
Use the exact field names specified below. For numeric values, extract just the number.
For dates, use YYYY-MM-DD format if possible.
If a field is not found, use null.

Required fields:
- fundName: string
- amcName: string
- nav: number (or null)
- expenseRatio: number (or null)
- aum: string
- returns1Y: number (or null)
- returns3Y: number (or null)
- returns5Y: number (or null)
- riskLevel: string
- category: string
- managerName: string
- inceptionDate: string

Return ONLY valid JSON, no additional text or explanation.",
}];

pub fn get_template(id: &str) -> Option<&'static JsonTemplate> {
    JSON_TEMPLATES.iter().find(|template| template.id == id)
}

/// Build the system + user turn for an extraction run.
pub fn build_extraction_messages(
    template_id: &str,
    markdown: &str,
) -> Result<Vec<ChatMessage>, TemplateError> {
    let template = get_template(template_id)
        .ok_or_else(|| TemplateError::UnknownTemplate(template_id.to_string()))?;
    if markdown.trim().is_empty() {
        return Err(TemplateError::EmptyInput);
    }

    Ok(vec![
        ChatMessage::system(template.system_prompt),
        ChatMessage::user(markdown),
    ])
}

/// Pull a JSON value out of a model reply, accepting either bare JSON or a
/// fenced code block around it.
pub fn extract_json(reply: &str) -> Result<serde_json::Value, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```")
        .map(|rest| {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        })
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    #[test]
    fn schema_matches_prompt_fields() {
        let template = get_template("mutual-fund").expect("template");
        for (field, _) in template.schema {
            assert!(
                template.system_prompt.contains(&format!("- {field}:")),
                "prompt is missing {field}"
            );
        }
    }

    #[test]
    fn build_extraction_messages_validates_input() {
        assert_eq!(
            build_extraction_messages("nope", "# Fund"),
            Err(TemplateError::UnknownTemplate("nope".into()))
        );
        assert_eq!(
            build_extraction_messages("mutual-fund", " \n "),
            Err(TemplateError::EmptyInput)
        );

        let messages = build_extraction_messages("mutual-fund", "# Fund").expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "# Fund");
    }

    #[test]
    fn extract_json_handles_fences() {
        let bare = extract_json(r#"{"nav": 12.5}"#).expect("bare");
        assert_eq!(bare["nav"], 12.5);

        let fenced = extract_json("```json\n{\"fundName\": \"Alpha\"}\n```\n").expect("fenced");
        assert_eq!(fenced["fundName"], "Alpha");

        let plain_fence = extract_json("```\n[1, 2]\n```").expect("plain fence");
        assert_eq!(plain_fence[1], 2);

        assert!(extract_json("Here is your JSON: {").is_err());
    }
}
