use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{AgroError, Result};

/// Declares a choice enum persisted and serialized as a short code,
/// with a human-readable label for prompts and summaries.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident($code:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Short code stored in the database and exchanged over the API
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AgroError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($code => Ok($name::$variant),)+
                    _ => Err(AgroError::Validation(format!(
                        "invalid {} code: '{s}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

coded_enum! {
    /// Account role
    #[derive(Default)]
    pub enum Role {
        Merchant("M", "Merchant"),
        Farmer("F", "Farmer"),
        #[default]
        SimpleUser("S", "Simple user"),
    }
}

coded_enum! {
    /// Growing season of a field
    pub enum Period {
        Spring("SP", "Spring"),
        Winter("WI", "Winter"),
        Summer("SU", "Summer"),
        Autumn("AU", "Autumn"),
    }
}

coded_enum! {
    #[derive(Default)]
    pub enum GrowSpeed {
        Slow("S", "Slow"),
        #[default]
        Normal("N", "Normal"),
        Good("G", "Good"),
        Accelerated("A", "Accelerated"),
    }
}

coded_enum! {
    pub enum GroundType {
        Clay("C", "Clay"),
        Loam("L", "Loam"),
        Sand("S", "Sand"),
        ClayLoam("CL", "Clay loam"),
    }
}

coded_enum! {
    /// Cultivation lifecycle of a field
    #[derive(Default)]
    pub enum FieldStatus {
        #[default]
        Initial("I", "Initial"),
        Growing("G", "Growing"),
        Harvested("H", "Harvested"),
        Processed("P", "Processed"),
    }
}

coded_enum! {
    #[derive(Default)]
    pub enum TaskFrequency {
        Daily("D", "Daily"),
        Weekly("W", "Weekly"),
        #[default]
        Monthly("M", "Monthly"),
        Annual("A", "Annual"),
    }
}

coded_enum! {
    /// Field task lifecycle.
    ///
    /// - `Planned` → `Executing`, `Done`
    /// - `Executing` → `Done`
    /// - `Done` → (terminal)
    #[derive(Default)]
    pub enum TaskStatus {
        #[default]
        Planned("P", "Planned"),
        Executing("E", "Executing"),
        Done("D", "Done"),
    }
}

coded_enum! {
    /// Unit a product quantity is expressed in
    #[derive(Default)]
    pub enum MeasurementUnit {
        #[default]
        Kilogram("Kg", "Kilogram"),
        Tonne("T", "Tonne"),
    }
}

/// Registered account.
///
/// The password hash never leaves the repository layer except through
/// [`UserCredentials`], which is only used by the login flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Credit balance debited when products are listed
    pub access_units: Amount,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user together with its stored password hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.role.is_none()
    }
}

/// Cultivated land parcel owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub id: i64,
    pub plant_specie: String,
    pub country: String,
    pub region: String,
    pub start_on: NaiveDate,
    /// Surface of the parcel
    pub measure: f64,
    pub prod_quantity_estimated: f64,
    pub period: Period,
    pub project_description: String,
    pub grow_speed: GrowSpeed,
    pub ground_ph: Option<i32>,
    pub ground_type: GroundType,
    pub organic_materials: Option<i32>,
    pub longitude: f64,
    pub latitude: f64,
    /// Free-form equipment inventory
    pub equipments: Option<serde_json::Value>,
    pub advices: Option<String>,
    pub status: FieldStatus,
    pub prod_quantity: Option<f64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewField {
    pub plant_specie: String,
    pub country: String,
    pub region: String,
    pub start_on: NaiveDate,
    pub measure: f64,
    pub prod_quantity_estimated: f64,
    pub period: Period,
    pub project_description: String,
    #[serde(default)]
    pub grow_speed: GrowSpeed,
    pub ground_ph: Option<i32>,
    pub ground_type: GroundType,
    pub organic_materials: Option<i32>,
    pub longitude: f64,
    pub latitude: f64,
    pub equipments: Option<serde_json::Value>,
    #[serde(default)]
    pub status: FieldStatus,
}

/// Partial field update; `None` leaves the column untouched
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateField {
    pub plant_specie: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub start_on: Option<NaiveDate>,
    pub measure: Option<f64>,
    pub prod_quantity_estimated: Option<f64>,
    pub period: Option<Period>,
    pub project_description: Option<String>,
    pub grow_speed: Option<GrowSpeed>,
    pub ground_ph: Option<i32>,
    pub ground_type: Option<GroundType>,
    pub organic_materials: Option<i32>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub equipments: Option<serde_json::Value>,
    pub advices: Option<String>,
    pub status: Option<FieldStatus>,
    pub prod_quantity: Option<f64>,
}

/// Short field reference embedded in product responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldBrief {
    pub id: i64,
    pub plant_specie: String,
    pub region: String,
    pub country: String,
}

/// Human-readable summary of a field, used in listings and AI prompts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldProfile {
    pub plant_specie: String,
    pub location: String,
    pub measure: f64,
    pub period: String,
    pub grow_speed: String,
    pub ground_type: String,
    pub ground_ph: Option<i32>,
    pub organic_materials: Option<i32>,
    pub status: String,
    pub start_on: NaiveDate,
    pub equipments: Vec<String>,
    pub recent_task: String,
}

/// Text shown when a field has no completed task yet
pub const NO_RECENT_TASK: &str = "No task recently done";

impl Field {
    pub fn brief(&self) -> FieldBrief {
        FieldBrief {
            id: self.id,
            plant_specie: self.plant_specie.clone(),
            region: self.region.clone(),
            country: self.country.clone(),
        }
    }

    /// Equipment names found in the free-form inventory.
    ///
    /// Accepts a list of strings, a list of objects with a `name` key, or an
    /// object whose keys are equipment names.
    pub fn equipment_names(&self) -> Vec<String> {
        use serde_json::Value;

        match &self.equipments {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(map) => map
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string),
                    _ => None,
                })
                .collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::String(name)) if !name.trim().is_empty() => vec![name.clone()],
            _ => Vec::new(),
        }
    }

    pub fn profile(&self, recent_task: Option<&Task>) -> FieldProfile {
        FieldProfile {
            plant_specie: self.plant_specie.clone(),
            location: format!("{}, {}", self.region, self.country),
            measure: self.measure,
            period: self.period.label().to_string(),
            grow_speed: self.grow_speed.label().to_string(),
            ground_type: self.ground_type.label().to_string(),
            ground_ph: self.ground_ph,
            organic_materials: self.organic_materials,
            status: self.status.label().to_string(),
            start_on: self.start_on,
            equipments: self.equipment_names(),
            recent_task: recent_task
                .map(|task| task.title.clone())
                .unwrap_or_else(|| NO_RECENT_TASK.to_string()),
        }
    }
}

/// Recurring work item on a field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub frequency: TaskFrequency,
    pub description: Option<String>,
    pub field_id: i64,
    pub status: TaskStatus,
    /// Suggested by the planning model rather than entered by hand
    pub generated: bool,
    pub approved: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Check if the task can move to the given status
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self.status, new_status),
            (Planned, Executing) | (Planned, Done) | (Executing, Done)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub frequency: TaskFrequency,
    pub description: Option<String>,
    #[serde(default)]
    pub generated: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            frequency: TaskFrequency::default(),
            description: None,
            generated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub frequency: Option<TaskFrequency>,
    pub description: Option<String>,
}

/// Marketplace listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    /// Originating field; cleared when the field is deleted
    pub field_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub country: String,
    pub region: String,
    pub quantity: Amount,
    pub unit: MeasurementUnit,
    pub price: Amount,
    pub on_sale: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProduct {
    #[serde(default)]
    pub field_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub country: String,
    pub region: String,
    pub quantity: Amount,
    #[serde(default)]
    pub unit: MeasurementUnit,
    pub price: Amount,
    #[serde(default)]
    pub on_sale: bool,
}

/// Product update; quantity and unit are fixed once the listing is paid for
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateProduct {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub price: Option<Amount>,
    pub on_sale: Option<bool>,
}

/// Result of a paid product listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductListing {
    pub product: Product,
    pub cost: Amount,
    pub remaining_access_units: Amount,
}

/// Filter criteria for product queries
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProductFilter {
    pub field_id: Option<i64>,
    pub created_by: Option<i64>,
    /// Also return listings that are not on sale
    #[serde(default)]
    pub include_off_sale: bool,
}

/// Stored rotation offset for plant database API keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestOffset {
    pub id: i64,
    pub offset: i64,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Limit/offset pagination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Page {
    /// Limit clamped to `1..=MAX_PAGE_SIZE`
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}
