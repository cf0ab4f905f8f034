use chrono::{NaiveDate, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ScheduleSlot {
    #[schemars(description = "Network the placement is booked on (e.g., 'ESPN', 'CNN')")]
    pub network: String,

    #[serde(default)]
    #[schemars(
        description = "Optional day of week for the slot. Carried through to the report but not used for matching; the template recurs every week."
    )]
    pub day: Option<String>,

    #[schemars(description = "Time slot label in 'start-end' form, e.g. '7:00am-8:00am'")]
    pub time: String,

    #[schemars(description = "Number of spots booked in this slot per week. Must be >= 0.")]
    pub spots: i64,

    #[schemars(description = "Cost per spot. Must be >= 0.")]
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct InvoiceRecord {
    #[schemars(description = "Network the spot aired on")]
    pub network: String,

    #[schemars(description = "Air date, in the configured date pattern (default MM-DD-YYYY)")]
    pub date: String,

    #[schemars(description = "Air time, in the configured time pattern (default HH:MM:SS, 24-hour)")]
    pub time: String,

    #[schemars(description = "Rate actually charged for the spot")]
    pub rate: f64,

    #[serde(default)]
    #[schemars(
        description = "Identifying pass-through fields (invoice number, ISCI code, spot title...). Never used for matching."
    )]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BucketGranularity {
    #[default]
    #[schemars(
        description = "Compare per named schedule slot, with a tolerance window around each slot's boundaries. Airings outside every slot are reported as unscheduled extras."
    )]
    Slot,

    #[schemars(description = "Compare per hour of day of the slot start time, without tolerance.")]
    Hour,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AuditConfig {
    #[serde(default = "default_date_format")]
    #[schemars(description = "chrono pattern for invoice dates")]
    pub date_format: String,

    #[serde(default = "default_time_format")]
    #[schemars(
        description = "chrono pattern for invoice times. Times that don't match fall back to the 12/24-hour auto-detection."
    )]
    pub time_format: String,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    #[serde(default = "default_decimal_places")]
    #[schemars(description = "Decimal places used when rendering monetary values (0-10)")]
    pub decimal_places: usize,

    #[serde(default = "default_tolerance_minutes")]
    #[schemars(description = "Minutes of slack on each side of a slot in slot mode")]
    pub tolerance_minutes: u32,

    #[serde(default)]
    pub granularity: BucketGranularity,

    #[serde(default)]
    #[schemars(
        description = "If true, the first malformed invoice date/time aborts the run instead of dropping the row"
    )]
    pub strict: bool,

    #[serde(default = "default_fallback_week_count")]
    #[schemars(
        description = "Number of weeks to audit when no invoice row survives normalization and no audit period is given. Such weeks have no calendar window."
    )]
    pub fallback_week_count: u32,

    #[serde(default)]
    #[schemars(
        description = "First day of the audited period (YYYY-MM-DD). Defaults to the earliest invoice date; invoice rows before the week containing it are dropped."
    )]
    pub audit_start: Option<NaiveDate>,

    #[serde(default)]
    #[schemars(
        description = "Last day of the audited period (YYYY-MM-DD). Defaults to the latest invoice date; invoice rows after the week containing it are dropped."
    )]
    pub audit_end: Option<NaiveDate>,
}

fn default_date_format() -> String {
    "%m-%d-%Y".to_string()
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_decimal_places() -> usize {
    2
}

fn default_tolerance_minutes() -> u32 {
    3
}

fn default_fallback_week_count() -> u32 {
    4
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            time_format: default_time_format(),
            currency_symbol: default_currency_symbol(),
            decimal_places: default_decimal_places(),
            tolerance_minutes: default_tolerance_minutes(),
            granularity: BucketGranularity::default(),
            strict: false,
            fallback_week_count: default_fallback_week_count(),
            audit_start: None,
            audit_end: None,
        }
    }
}

impl AuditConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AuditConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn format_money(&self, value: f64) -> String {
        format!("{}{:.*}", self.currency_symbol, self.decimal_places, value)
    }
}

/// A schedule row tagged with the audited week it stands for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpandedScheduleOccurrence {
    pub week: u32,
    /// Position of the source row in the weekly template
    pub template_index: usize,
    pub slot: ScheduleSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedInvoiceRecord {
    /// 0-based position in the caller's invoice table
    pub row: usize,
    pub network: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiredSpot {
    pub week: u32,
    pub record: NormalizedInvoiceRecord,
}

/// A Monday-to-Sunday calendar span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekWindow {
    pub index: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Format,
    OutOfWindow,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DroppedRow {
    pub row: usize,
    pub network: String,
    pub reason: DropReason,
    pub details: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DropSummary {
    pub format_errors: usize,
    pub out_of_window: usize,
    pub invalid_rows: usize,
    pub rows: Vec<DroppedRow>,
}

impl DropSummary {
    pub fn record(&mut self, dropped: DroppedRow) {
        match dropped.reason {
            DropReason::Format => self.format_errors += 1,
            DropReason::OutOfWindow => self.out_of_window += 1,
            DropReason::Invalid => self.invalid_rows += 1,
        }
        self.rows.push(dropped);
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditWarning {
    /// Occurrences sharing a bucket disagree on cost; the first occurrence's
    /// cost was used.
    InconsistentRate {
        network: String,
        week: u32,
        bucket: String,
        rates: Vec<f64>,
        applied_rate: f64,
    },
}
