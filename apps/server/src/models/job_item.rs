//! Job item and photo evidence models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Per-asset work status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobItemStatus {
    Pending,
    InProgress,
    Done,
    IssueFound,
}

impl JobItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::IssueFound => "ISSUE_FOUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            "ISSUE_FOUND" => Some(Self::IssueFound),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of evidence photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoType {
    Before,
    After,
    Defect,
    Meter,
}

impl PhotoType {
    pub const ALL: [PhotoType; 4] = [Self::Before, Self::After, Self::Defect, Self::Meter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::Defect => "DEFECT",
            Self::Meter => "METER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BEFORE" => Some(Self::Before),
            "AFTER" => Some(Self::After),
            "DEFECT" => Some(Self::Defect),
            "METER" => Some(Self::Meter),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhotoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which evidence photos exist for a job item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotoEvidence {
    pub before: u64,
    pub after: u64,
}

impl PhotoEvidence {
    pub fn from_types<'a, I>(types: I) -> Self
    where
        I: IntoIterator<Item = &'a PhotoType>,
    {
        let mut evidence = Self::default();
        for photo_type in types {
            match photo_type {
                PhotoType::Before => evidence.before += 1,
                PhotoType::After => evidence.after += 1,
                PhotoType::Defect | PhotoType::Meter => {}
            }
        }
        evidence
    }

    pub fn has_before_and_after(&self) -> bool {
        self.before > 0 && self.after > 0
    }
}

/// Photo as shown on the job page.
#[derive(Debug, Clone, Serialize)]
pub struct JobPhoto {
    pub id: Uuid,
    pub job_item_id: Uuid,
    pub photo_type: PhotoType,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Staff form for a job item status change.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobStatusForm {
    pub status: String,
}

/// Admin form for assigning a technician.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignTechnicianForm {
    pub technician_id: Uuid,
}

/// Staff form for the free-text technician note.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TechNoteForm {
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub tech_note: String,
}

/// Staff form carrying the checklist document as JSON.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistForm {
    pub items: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_evidence_counts_before_and_after_only() {
        let types = [
            PhotoType::Before,
            PhotoType::Defect,
            PhotoType::Meter,
            PhotoType::Before,
        ];
        let evidence = PhotoEvidence::from_types(&types);
        assert_eq!(evidence.before, 2);
        assert_eq!(evidence.after, 0);
        assert!(!evidence.has_before_and_after());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            JobItemStatus::parse("issue_found"),
            Some(JobItemStatus::IssueFound)
        );
        assert_eq!(JobItemStatus::parse("DONE"), Some(JobItemStatus::Done));
        assert_eq!(JobItemStatus::parse("closed"), None);
    }
}
