//! # Domain Types
//!
//! Core domain types used throughout the packing station.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌─────────────────┐ 1   * ┌───────────────┐ │
//! │  │    Shipment     │──────►│      Part       │──────►│     Photo     │ │
//! │  │  ─────────────  │       │  ─────────────  │       │ ───────────── │ │
//! │  │  number         │       │  sap_index      │       │ file_path     │ │
//! │  │  destination    │       │  quantity/unit  │       │ file_size     │ │
//! │  │  status         │       │  status         │       │ taken_at      │ │
//! │  │  requirements   │       │  weights        │       └───────────────┘ │
//! │  └─────────────────┘       └─────────────────┘                          │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │ ShipmentStatus  │   │   PartStatus    │       │
//! │  │  login (unique) │   │  InProgress     │   │   Pending       │       │
//! │  │  role           │   │  Paused         │   │   Packed        │       │
//! │  │  password_hash  │   │  Completed      │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Statuses and Roles
// =============================================================================

/// Lifecycle of a packing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Operator is packing.
    InProgress,
    /// Put aside, can be resumed.
    Paused,
    /// Every part is packed and the shipment was closed.
    Completed,
}

impl ShipmentStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::InProgress => "in_progress",
            ShipmentStatus::Paused => "paused",
            ShipmentStatus::Completed => "completed",
        }
    }
}

/// Pack state of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PartStatus {
    Pending,
    Packed,
}

/// Access level of a station user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

// =============================================================================
// Shipment
// =============================================================================

/// One packing job.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shipment {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier printed on labels and reports.
    pub shipment_number: String,

    pub destination: String,

    pub status: ShipmentStatus,

    /// Every part must carry a captured weight before it can be packed.
    pub require_weight: bool,

    /// Every part must carry a country of origin.
    pub require_country: bool,

    /// At least one photo per part is expected.
    pub require_photos: bool,

    /// Every part must carry a serial number (typically read by OCR).
    pub require_serial_numbers: bool,

    /// Argon2 hash guarding the shipment. Never leaves the backend.
    #[serde(skip)]
    pub password_hash: Option<String>,

    /// Output folder chosen by the operator, used verbatim when set.
    pub custom_folder_path: Option<String>,

    pub archived: bool,

    pub notes: Option<String>,

    /// User who created the shipment.
    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Shipment {
    /// Whether the shipment is protected by a password.
    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether the shipment still accepts pack/unpack changes.
    pub fn is_editable(&self) -> bool {
        self.status != ShipmentStatus::Completed
    }
}

/// Input for creating a shipment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewShipment {
    pub shipment_number: String,
    pub destination: String,
    #[serde(default)]
    pub require_weight: bool,
    #[serde(default)]
    pub require_country: bool,
    #[serde(default)]
    pub require_photos: bool,
    #[serde(default)]
    pub require_serial_numbers: bool,
    /// Plaintext, hashed before it is stored.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub custom_folder_path: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Field patch sent by the UI. `None` leaves a field untouched; for the
/// nullable text fields an empty string clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShipmentPatch {
    #[serde(default)]
    pub shipment_number: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub status: Option<ShipmentStatus>,
    #[serde(default)]
    pub require_weight: Option<bool>,
    #[serde(default)]
    pub require_country: Option<bool>,
    #[serde(default)]
    pub require_photos: Option<bool>,
    #[serde(default)]
    pub require_serial_numbers: Option<bool>,
    #[serde(default)]
    pub custom_folder_path: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
}

impl ShipmentPatch {
    /// True when the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.shipment_number.is_none()
            && self.destination.is_none()
            && self.status.is_none()
            && self.require_weight.is_none()
            && self.require_country.is_none()
            && self.require_photos.is_none()
            && self.require_serial_numbers.is_none()
            && self.custom_folder_path.is_none()
            && self.notes.is_none()
            && self.archived.is_none()
    }

    /// True when the patch touches more than the status and archive flag.
    pub fn edits_content(&self) -> bool {
        self.shipment_number.is_some()
            || self.destination.is_some()
            || self.require_weight.is_some()
            || self.require_country.is_some()
            || self.require_photos.is_some()
            || self.require_serial_numbers.is_some()
            || self.custom_folder_path.is_some()
            || self.notes.is_some()
    }
}

/// Filter for shipment listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentFilter {
    #[serde(default)]
    pub include_archived: bool,
    #[serde(default)]
    pub status: Option<ShipmentStatus>,
}

/// Aggregates from the `shipment_stats` view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShipmentStats {
    pub shipment_id: String,
    pub total_parts: i64,
    pub packed_parts: i64,
    pub photo_count: i64,
    pub total_weight: f64,
}

impl ShipmentStats {
    pub fn pending_parts(&self) -> i64 {
        self.total_parts - self.packed_parts
    }

    /// A shipment with no parts is not considered fully packed.
    pub fn is_fully_packed(&self) -> bool {
        self.total_parts > 0 && self.packed_parts == self.total_parts
    }
}

// =============================================================================
// Part
// =============================================================================

/// One line item of a shipment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Part {
    pub id: String,
    pub shipment_id: String,

    /// SAP material index. Blank means "unassigned, pack manually".
    pub sap_index: String,

    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub status: PartStatus,

    #[ts(as = "Option<String>")]
    pub packed_at: Option<DateTime<Utc>>,

    /// Weight of one unit, kg.
    pub weight_per_unit: Option<f64>,

    /// Weight of the whole line, kg.
    pub weight_total: Option<f64>,

    pub country: Option<String>,
    pub order_number: Option<String>,
    pub order_description: Option<String>,
    pub serial_number: Option<String>,

    /// Row ordinal in the source spreadsheet.
    pub row_number: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Part {
    /// Parts without a SAP index have to be matched by hand.
    pub fn is_unassigned(&self) -> bool {
        self.sap_index.trim().is_empty()
    }

    pub fn is_packed(&self) -> bool {
        self.status == PartStatus::Packed
    }

    /// Checks the shipment's requirement flags against this part.
    ///
    /// Photos are not checked here: they are evidence collected alongside
    /// packing, and the report flags parts without them.
    pub fn check_packable(&self, shipment: &Shipment) -> CoreResult<()> {
        if !shipment.is_editable() {
            return Err(CoreError::ShipmentCompleted(shipment.id.clone()));
        }

        let missing = |requirement: &str| CoreError::RequirementNotMet {
            part_id: self.id.clone(),
            requirement: requirement.to_string(),
        };

        if shipment.require_weight && self.weight_per_unit.is_none() {
            return Err(missing("weight"));
        }
        if shipment.require_country && blank(self.country.as_deref()) {
            return Err(missing("country of origin"));
        }
        if shipment.require_serial_numbers && blank(self.serial_number.as_deref()) {
            return Err(missing("serial number"));
        }

        Ok(())
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Line weight from a unit weight, rounded to grams.
pub fn line_weight(weight_per_unit: f64, quantity: f64) -> f64 {
    (weight_per_unit * quantity * 1000.0).round() / 1000.0
}

/// Part row handed over by the spreadsheet import collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportedPart {
    #[serde(default)]
    pub sap_index: String,
    pub description: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    pub row_number: i64,
}

/// Field patch for a part. Same conventions as [`ShipmentPatch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PartPatch {
    #[serde(default)]
    pub sap_index: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// Text recognised by the OCR collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OcrResult {
    pub text: String,
    #[serde(default)]
    pub lines: Vec<String>,
    pub confidence: f64,
}

impl OcrResult {
    /// The text to store as a serial number: the whole text when it is a
    /// single line, otherwise the first non-empty line.
    pub fn primary_text(&self) -> Option<&str> {
        let text = self.text.trim();
        if !text.is_empty() && !text.contains('\n') {
            return Some(text);
        }
        self.lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()))
    }
}

// =============================================================================
// Photo
// =============================================================================

/// Photo evidence attached to a part.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Photo {
    pub id: String,
    pub part_id: String,
    pub shipment_id: String,
    pub file_path: String,
    pub file_size: i64,
    #[ts(as = "String")]
    pub taken_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// A station login.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub login: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    /// Set for seeded and reset accounts.
    pub must_change_password: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    pub login: String,
    pub password: String,
    pub role: UserRole,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment() -> Shipment {
        let now = Utc::now();
        Shipment {
            id: "s-1".to_string(),
            shipment_number: "SH-1".to_string(),
            destination: "Gdansk".to_string(),
            status: ShipmentStatus::InProgress,
            require_weight: false,
            require_country: false,
            require_photos: false,
            require_serial_numbers: false,
            password_hash: None,
            custom_folder_path: None,
            archived: false,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn part() -> Part {
        let now = Utc::now();
        Part {
            id: "p-1".to_string(),
            shipment_id: "s-1".to_string(),
            sap_index: "100200".to_string(),
            description: "Bearing".to_string(),
            quantity: 4.0,
            unit: "pcs".to_string(),
            status: PartStatus::Pending,
            packed_at: None,
            weight_per_unit: None,
            weight_total: None,
            country: None,
            order_number: None,
            order_description: None,
            serial_number: None,
            row_number: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_content_excludes_status_and_archive() {
        let reclassify = ShipmentPatch {
            status: Some(ShipmentStatus::Paused),
            archived: Some(true),
            ..Default::default()
        };
        assert!(!reclassify.is_empty());
        assert!(!reclassify.edits_content());

        let notes = ShipmentPatch {
            notes: Some(String::new()),
            ..Default::default()
        };
        assert!(notes.edits_content());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(ShipmentStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(serde_json::to_string(&PartStatus::Packed).unwrap(), "\"packed\"");
    }

    #[test]
    fn test_unassigned_part() {
        let mut p = part();
        assert!(!p.is_unassigned());
        p.sap_index = "  ".to_string();
        assert!(p.is_unassigned());
    }

    #[test]
    fn test_check_packable_requirements() {
        let mut s = shipment();
        let mut p = part();
        assert!(p.check_packable(&s).is_ok());

        s.require_weight = true;
        assert!(matches!(
            p.check_packable(&s),
            Err(CoreError::RequirementNotMet { .. })
        ));
        p.weight_per_unit = Some(0.25);
        assert!(p.check_packable(&s).is_ok());

        s.require_country = true;
        p.country = Some(" ".to_string());
        assert!(p.check_packable(&s).is_err());
        p.country = Some("DE".to_string());
        assert!(p.check_packable(&s).is_ok());

        s.status = ShipmentStatus::Completed;
        assert!(matches!(
            p.check_packable(&s),
            Err(CoreError::ShipmentCompleted(_))
        ));
    }

    #[test]
    fn test_line_weight_rounding() {
        assert_eq!(line_weight(0.3333, 3.0), 1.0);
        assert_eq!(line_weight(1.25, 4.0), 5.0);
    }

    #[test]
    fn test_stats_fully_packed() {
        let mut stats = ShipmentStats::default();
        assert!(!stats.is_fully_packed());
        stats.total_parts = 3;
        stats.packed_parts = 3;
        assert!(stats.is_fully_packed());
        stats.packed_parts = 1;
        assert_eq!(stats.pending_parts(), 2);
    }

    #[test]
    fn test_ocr_primary_text() {
        let single = OcrResult {
            text: " SN-12345 ".to_string(),
            lines: vec![],
            confidence: 91.0,
        };
        assert_eq!(single.primary_text(), Some("SN-12345"));

        let multi = OcrResult {
            text: "\nSN-1\nLOT 7".to_string(),
            lines: vec!["".to_string(), "SN-1".to_string(), "LOT 7".to_string()],
            confidence: 80.0,
        };
        assert_eq!(multi.primary_text(), Some("SN-1"));

        assert_eq!(OcrResult::default().primary_text(), None);
    }
}
