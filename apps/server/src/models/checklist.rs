//! Checklist items embedded on a job item, and checklist templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::work_order::JobType;

/// Outcome of one inspection line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecklistResult {
    Pass,
    Fail,
}

/// One line of a job item checklist. `result` stays `None` until inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub result: Option<ChecklistResult>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ChecklistItem {
    /// Fresh, uninspected line.
    pub fn unchecked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            result: None,
            note: None,
        }
    }
}

/// Checklist template as listed on the admin pages.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistTemplate {
    pub id: Uuid,
    pub name: String,
    pub job_type: JobType,
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Admin form for creating or updating a checklist template.
///
/// `items` holds one checklist line per row of the textarea.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChecklistTemplateForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    pub job_type: String,
    #[validate(length(min = 1, message = "needs at least one line"))]
    pub items: String,
}

impl ChecklistTemplateForm {
    /// Non-blank, trimmed lines of the textarea.
    pub fn item_lines(&self) -> Vec<String> {
        split_template_lines(&self.items)
    }
}

pub fn split_template_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserializes_null_result() {
        let item: ChecklistItem =
            serde_json::from_str(r#"{"text":"Clean filter","result":null}"#).unwrap();
        assert_eq!(item.result, None);
        assert_eq!(item.note, None);
    }

    #[test]
    fn test_template_lines_skip_blank_rows() {
        let lines = split_template_lines("Clean filter\r\n\n  Check refrigerant  \n");
        assert_eq!(lines, vec!["Clean filter", "Check refrigerant"]);
    }
}
