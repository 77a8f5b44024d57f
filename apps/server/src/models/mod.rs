//! Domain models for the service operations server.

use utoipa::ToSchema;

pub mod checklist;
pub mod contact;
pub mod job_item;
pub mod location;
pub mod user;
pub mod work_order;

// Re-export commonly used types
pub use checklist::{ChecklistItem, ChecklistResult, ChecklistTemplate, ChecklistTemplateForm};
pub use contact::{ContactForm, ContactKind, IncidentKind, RepairRequestForm};
pub use job_item::{JobItemStatus, JobPhoto, PhotoEvidence, PhotoType};
pub use location::{AssetForm, AssetLocation, ClientForm, NamedLocationForm, SiteForm};
pub use user::{SessionClaims, User, UserRole};
pub use work_order::{JobType, WorkOrderProgress, WorkOrderStatus};

/// Page query for list views.
#[derive(Debug, Clone, Default, serde::Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(default_page()).max(1)
    }

    /// Calculate the offset for database queries.
    pub fn offset(&self) -> u64 {
        u64::from(self.page().saturating_sub(1)) * u64::from(self.clamped_limit())
    }

    /// Clamp limit to maximum allowed value.
    pub fn clamped_limit(&self) -> u32 {
        self.limit.unwrap_or(default_limit()).clamp(1, 100)
    }
}

/// Pagination metadata for list pages.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit)) as u32
        };

        Pagination {
            page,
            limit,
            total,
            total_pages,
            prev_page: (page > 1).then(|| page - 1),
            next_page: (page < total_pages).then(|| page + 1),
        }
    }
}

/// Treat blank optional form fields as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_pages() {
        let p = Pagination::new(2, 50, 120);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.prev_page, Some(1));
        assert_eq!(p.next_page, Some(3));

        let empty = Pagination::new(1, 50, 0);
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.next_page, None);
    }

    #[test]
    fn test_offset_uses_clamped_limit() {
        let params = PaginationParams {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(params.clamped_limit(), 100);
        assert_eq!(params.offset(), 200);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
