//! Checklist evaluation for job items.

use crate::error::{AppError, AppResult};
use crate::models::{ChecklistItem, ChecklistResult};

/// Parse the JSON document posted by the checklist form.
pub fn parse_submission(raw: &str) -> AppResult<Vec<ChecklistItem>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::InvalidInput(format!("Checklist could not be read: {}", e)))
}

/// Validate a checklist and return the document to store.
///
/// Every line needs a result, and every FAIL needs a note. Blank notes are
/// dropped so the stored document only carries real remarks.
pub fn evaluate(items: Vec<ChecklistItem>) -> AppResult<serde_json::Value> {
    if items.is_empty() {
        return Err(AppError::InvalidInput("Checklist has no items".to_string()));
    }

    let mut normalized = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let line = index + 1;
        let text = item.text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Checklist item {} has no text",
                line
            )));
        }

        let note = item
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        match item.result {
            None => {
                return Err(AppError::InvalidInput(format!(
                    "Checklist item {} ({}) needs a PASS or FAIL result",
                    line, text
                )));
            }
            Some(ChecklistResult::Fail) if note.is_none() => {
                return Err(AppError::InvalidInput(format!(
                    "Checklist item {} ({}) failed and needs a note",
                    line, text
                )));
            }
            Some(_) => {}
        }

        normalized.push(ChecklistItem {
            text,
            result: item.result,
            note,
        });
    }

    Ok(serde_json::to_value(normalized)?)
}

/// Stored checklist document back into items. Unreadable documents yield an empty list.
pub fn load(document: Option<&serde_json::Value>) -> Vec<ChecklistItem> {
    document
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

/// Unchecked items built from template lines.
pub fn from_template(lines: &[String]) -> Vec<ChecklistItem> {
    lines.iter().map(ChecklistItem::unchecked).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, result: Option<ChecklistResult>, note: Option<&str>) -> ChecklistItem {
        ChecklistItem {
            text: text.to_string(),
            result,
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn test_null_result_blocks_save() {
        let err = evaluate(vec![
            item("Clean filter", Some(ChecklistResult::Pass), None),
            item("Check drain", None, None),
        ])
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Check drain"));
    }

    #[test]
    fn test_fail_without_note_blocks_save() {
        for note in [None, Some(""), Some("   \t")] {
            let err = evaluate(vec![item("Check drain", Some(ChecklistResult::Fail), note)])
                .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_valid_checklist_is_stored_whole() {
        let document = evaluate(vec![
            item("Clean filter", Some(ChecklistResult::Pass), Some("  ")),
            item("Check drain", Some(ChecklistResult::Fail), Some(" clogged ")),
        ])
        .unwrap();

        let stored = load(Some(&document));
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].note, None);
        assert_eq!(stored[1].note.as_deref(), Some("clogged"));
        assert_eq!(stored[1].result, Some(ChecklistResult::Fail));
    }

    #[test]
    fn test_empty_checklist_is_rejected() {
        assert!(evaluate(Vec::new()).unwrap_err().is_validation());
    }

    #[test]
    fn test_parse_submission() {
        let items =
            parse_submission(r#"[{"text":"Clean filter","result":"PASS","note":null}]"#).unwrap();
        assert_eq!(items[0].result, Some(ChecklistResult::Pass));

        assert!(parse_submission(r#"[{"text":"x","result":"MAYBE"}]"#).is_err());
        assert!(parse_submission("not json").is_err());
    }

    #[test]
    fn test_template_prefill_is_unchecked() {
        let items = from_template(&["Clean filter".to_string()]);
        assert_eq!(items, vec![ChecklistItem::unchecked("Clean filter")]);
    }
}
