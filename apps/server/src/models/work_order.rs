//! Work order domain models and forms.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::job_item::JobItemStatus;

/// Kind of service work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// Preventive maintenance
    Pm,
    /// Corrective maintenance
    Cm,
    /// New installation
    Install,
}

impl JobType {
    pub const ALL: [JobType; 3] = [Self::Pm, Self::Cm, Self::Install];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pm => "PM",
            Self::Cm => "CM",
            Self::Install => "INSTALL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PM" => Some(Self::Pm),
            "CM" => Some(Self::Cm),
            "INSTALL" => Some(Self::Install),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pm => "Preventive maintenance",
            Self::Cm => "Corrective maintenance",
            Self::Install => "Installation",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work order status. Only an admin changes it; job item progress never promotes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 4] = [
        Self::Open,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rolled-up job item completion of one work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct WorkOrderProgress {
    pub done: u64,
    pub total: u64,
}

impl WorkOrderProgress {
    pub fn from_statuses<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a JobItemStatus>,
    {
        let (done, total) = statuses.into_iter().fold((0, 0), |(done, total), status| {
            if *status == JobItemStatus::Done {
                (done + 1, total + 1)
            } else {
                (done, total + 1)
            }
        });
        Self { done, total }
    }

    /// All job items DONE. A work order without job items is never complete.
    pub fn is_fully_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }

    /// Whole-number percentage for progress bars.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.done * 100) / self.total) as u8
    }
}

impl std::fmt::Display for WorkOrderProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.done, self.total)
    }
}

/// Progress payload of the JSON endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkOrderProgressResponse {
    pub work_order_id: Uuid,
    pub number: String,
    pub status: WorkOrderStatus,
    pub done: u64,
    pub total: u64,
    pub fully_complete: bool,
}

/// Filters for the work order list page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkOrderFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Admin form for creating a work order.
///
/// `asset_ids` is a comma-separated list; empty means every asset of the site.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkOrderForm {
    pub site_id: Uuid,
    pub job_type: String,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub assigned_team: Option<String>,
    #[serde(default)]
    pub asset_ids: String,
}

/// Admin form for editing a work order's schedule.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateWorkOrderForm {
    pub job_type: String,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub assigned_team: Option<String>,
}

/// Admin form for the manual status gate.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkOrderStatusForm {
    pub status: String,
}

/// Admin form for attaching another asset to a work order.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddJobItemForm {
    pub asset_id: Uuid,
}

/// Client sign-off confirmation form.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalForm {
    pub confirm: String,
}

/// Row of the work order list and the CSV export.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderRow {
    pub id: Uuid,
    pub number: String,
    pub job_type: JobType,
    pub scheduled_date: NaiveDate,
    pub status: WorkOrderStatus,
    pub site_id: Uuid,
    pub site_name: String,
    pub assigned_team: Option<String>,
    pub progress: WorkOrderProgress,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Parse the comma-separated asset id list of the create form.
pub fn parse_asset_ids(raw: &str) -> Result<Vec<Uuid>, uuid::Error> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_two_of_three() {
        let statuses = [
            JobItemStatus::Done,
            JobItemStatus::Done,
            JobItemStatus::Pending,
        ];
        let progress = WorkOrderProgress::from_statuses(&statuses);
        assert_eq!(progress.done, 2);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.to_string(), "2/3");
        assert!(!progress.is_fully_complete());
        assert_eq!(progress.percent(), 66);
    }

    #[test]
    fn test_progress_all_done() {
        let statuses = [JobItemStatus::Done, JobItemStatus::Done];
        let progress = WorkOrderProgress::from_statuses(&statuses);
        assert!(progress.is_fully_complete());
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_issue_found_is_not_done() {
        let statuses = [JobItemStatus::Done, JobItemStatus::IssueFound];
        assert!(!WorkOrderProgress::from_statuses(&statuses).is_fully_complete());
    }

    #[test]
    fn test_empty_work_order_is_not_complete() {
        let progress = WorkOrderProgress::from_statuses(&[] as &[JobItemStatus]);
        assert_eq!(progress.total, 0);
        assert!(!progress.is_fully_complete());
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_parse_asset_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = format!(" {a}, {b},,{a} ");
        assert_eq!(parse_asset_ids(&raw).unwrap(), vec![a, b]);
        assert!(parse_asset_ids("").unwrap().is_empty());
        assert!(parse_asset_ids("not-a-uuid").is_err());
    }

    #[test]
    fn test_job_type_roundtrip_strings() {
        for job_type in JobType::ALL {
            assert_eq!(JobType::parse(job_type.as_str()), Some(job_type));
        }
        assert_eq!(JobType::parse("install"), Some(JobType::Install));
        assert_eq!(JobType::parse("repair"), None);
    }
}
