//! Location hierarchy forms: clients, sites, buildings, floors, rooms and assets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Admin form for a client organisation.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ClientForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub contact_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub email: Option<String>,
}

/// Admin form for a site of a client.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SiteForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub address: Option<String>,
}

/// Admin form shared by buildings, floors and rooms, which only carry a name.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NamedLocationForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
}

/// Admin form for an air-conditioning unit.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AssetForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub brand: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub model_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub serial_number: Option<String>,
    /// Cooling capacity in BTU; blank means unknown.
    #[serde(default)]
    pub capacity_btu: Option<String>,
    #[validate(length(min = 1, max = 100, message = "is required"))]
    pub qr_code: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl AssetForm {
    /// Parse the optional capacity field.
    pub fn capacity(&self) -> Result<Option<i32>, String> {
        match self.capacity_btu.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i32>()
                .ok()
                .filter(|btu| *btu > 0)
                .map(Some)
                .ok_or_else(|| "capacity_btu must be a positive whole number".to_string()),
        }
    }
}

/// Breadcrumb entry shown above location pages.
#[derive(Debug, Clone, Serialize)]
pub struct Crumb {
    pub label: String,
    pub href: String,
}

/// Where an asset sits, resolved for display and notifications.
#[derive(Debug, Clone, Serialize)]
pub struct AssetLocation {
    pub client_id: Uuid,
    pub client_name: String,
    pub site_id: Uuid,
    pub site_name: String,
    pub building_name: String,
    pub floor_name: String,
    pub room_name: String,
}

impl AssetLocation {
    pub fn summary(&self) -> String {
        format!(
            "{} / {} / {} / {}",
            self.site_name, self.building_name, self.floor_name, self.room_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_form(capacity: Option<&str>) -> AssetForm {
        AssetForm {
            name: "Lobby cassette".to_string(),
            brand: None,
            model_number: None,
            serial_number: None,
            capacity_btu: capacity.map(str::to_string),
            qr_code: "QR-001".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_capacity_parsing() {
        assert_eq!(asset_form(None).capacity(), Ok(None));
        assert_eq!(asset_form(Some(" ")).capacity(), Ok(None));
        assert_eq!(asset_form(Some("18000")).capacity(), Ok(Some(18000)));
        assert!(asset_form(Some("-5")).capacity().is_err());
        assert!(asset_form(Some("big")).capacity().is_err());
    }
}
