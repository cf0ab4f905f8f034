//! # Placement Audit
//!
//! A library for reconciling a recurring advertising schedule against the
//! invoice of spots that actually aired, reporting pre-emptions (booked spots
//! that never ran) and extras (spots that ran beyond the booking or at an
//! unscheduled time), each valued in currency.
//!
//! ## Core Concepts
//!
//! - **Schedule**: One week of booked slots per network, recurring every week
//! - **Invoice**: Aired spots with date, time and the rate actually charged
//! - **Week Windows**: Monday-to-Sunday spans covering the invoice dates; the
//!   schedule is expanded once per window
//! - **Buckets**: The unit of comparison within a network and week, either a
//!   named slot (with a tolerance around its boundaries) or an hour of day
//! - **Row-Level Resilience**: Malformed or out-of-period invoice rows are
//!   dropped and counted, never abort the audit
//!
//! ## Example
//!
//! ```rust,ignore
//! use placement_audit::*;
//!
//! let schedule = vec![ScheduleSlot {
//!     network: "ABC".to_string(),
//!     day: None,
//!     time: "7:00am-8:00am".to_string(),
//!     spots: 5,
//!     cost: 100.0,
//! }];
//!
//! let invoice = vec![InvoiceRecord {
//!     network: "ABC".to_string(),
//!     date: "01-03-2022".to_string(),
//!     time: "07:01:00".to_string(),
//!     rate: 100.0,
//!     extra: Default::default(),
//! }];
//!
//! let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
//! for line in &report.lines {
//!     println!("{}", line);
//! }
//! ```

pub mod aggregator;
pub mod bucketizer;
pub mod engine;
pub mod error;
pub mod expander;
pub mod ingestion;
pub mod report;
pub mod schema;
pub mod utils;

pub use aggregator::{aggregate, verify_summaries, NetworkSummary, WeekResult};
pub use bucketizer::{assign_weeks, normalize_invoice, BucketKey, Bucketizer, PartitionPlan};
pub use engine::{check_uniform_rate, BucketResult, Comparator, PartitionOutcome};
pub use error::{AuditError, Result};
pub use expander::expand;
pub use ingestion::{read_invoice_csv, read_schedule_csv, ColumnMapping};
pub use report::{render_drop_summary, render_report};
pub use schema::*;
pub use utils::{compute_week_windows, parse_date, parse_time_of_day};

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Everything one audit run produces: the rendered lines and the structured
/// tree they were rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub networks: Vec<NetworkSummary>,
    pub lines: Vec<String>,
    pub windows: Vec<WeekWindow>,
    pub warnings: Vec<AuditWarning>,
    pub drops: DropSummary,
}

impl AuditReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct AuditProcessor;

impl AuditProcessor {
    pub fn process(
        schedule: &[ScheduleSlot],
        invoice: &[InvoiceRecord],
        config: &AuditConfig,
    ) -> Result<AuditReport> {
        validate_config(config)?;
        validate_schedule(schedule, config)?;

        info!(
            "Auditing {} schedule slots against {} invoice rows",
            schedule.len(),
            invoice.len()
        );

        let mut drops = DropSummary::default();

        let normalized = normalize_invoice(invoice, config)?;
        for dropped in normalized.drops {
            warn!("Dropping invoice row {}: {}", dropped.row, dropped.details);
            drops.record(dropped);
        }

        let span = audit_span(&normalized.records, config);
        let (windows, week_count) = match span {
            Some((start, end)) => {
                let windows = compute_week_windows(start, end)?;
                let count = windows.len() as u32;
                (windows, count)
            }
            None => {
                warn!(
                    "No dated invoice rows; auditing {} weeks without calendar windows",
                    config.fallback_week_count
                );
                (Vec::new(), config.fallback_week_count)
            }
        };
        debug!("Audit covers {} weeks", week_count);

        let (aired, out_of_window) = assign_weeks(&normalized.records, &windows);
        for dropped in out_of_window {
            drops.record(dropped);
        }

        let occurrences = expand(schedule, week_count)?;
        let plans = Bucketizer::from_config(config).plan(&occurrences, &aired, week_count)?;
        let outcomes = Comparator::new(config.granularity).compare_all(&plans);

        let warnings: Vec<AuditWarning> = outcomes
            .iter()
            .flat_map(|o| o.warnings.iter().cloned())
            .collect();

        let networks = aggregate(outcomes, &windows);
        let lines = render_report(&networks, config);

        info!(
            "Audit complete: {} networks, {} aired spots matched, {} rows dropped, {} warnings",
            networks.len(),
            aired.len(),
            drops.total(),
            warnings.len()
        );

        Ok(AuditReport {
            networks,
            lines,
            windows,
            warnings,
            drops,
        })
    }

    pub fn process_with_verification(
        schedule: &[ScheduleSlot],
        invoice: &[InvoiceRecord],
        config: &AuditConfig,
        tolerance: f64,
    ) -> Result<AuditReport> {
        let report = Self::process(schedule, invoice, config)?;

        verify_summaries(&report.networks, tolerance)?;

        Ok(report)
    }
}

pub fn run_audit(
    schedule: &[ScheduleSlot],
    invoice: &[InvoiceRecord],
    config: &AuditConfig,
) -> Result<AuditReport> {
    AuditProcessor::process(schedule, invoice, config)
}

pub fn run_audit_with_verification(
    schedule: &[ScheduleSlot],
    invoice: &[InvoiceRecord],
    config: &AuditConfig,
    tolerance: f64,
) -> Result<AuditReport> {
    AuditProcessor::process_with_verification(schedule, invoice, config, tolerance)
}

/// First and last day the week windows must cover: the configured audit
/// period where given, otherwise the invoice date range. A lone bound never
/// lets the invoice range pull the span past it, and with no invoice dates
/// the lone bound is used for both ends.
fn audit_span(
    records: &[NormalizedInvoiceRecord],
    config: &AuditConfig,
) -> Option<(NaiveDate, NaiveDate)> {
    let earliest = records.iter().map(|r| r.date).min();
    let latest = records.iter().map(|r| r.date).max();

    let start = match (config.audit_start, earliest) {
        (Some(start), _) => start,
        (None, Some(first)) => config.audit_end.map_or(first, |end| first.min(end)),
        (None, None) => config.audit_end?,
    };
    let end = match (config.audit_end, latest) {
        (Some(end), _) => end,
        (None, Some(last)) => last.max(start),
        (None, None) => start,
    };
    Some((start, end.max(start)))
}

fn validate_pattern(name: &str, pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() || StrftimeItems::new(pattern).any(|i| matches!(i, Item::Error)) {
        return Err(AuditError::InvalidArgument(format!(
            "{} '{}' is not a valid chrono pattern",
            name, pattern
        )));
    }
    Ok(())
}

pub fn validate_config(config: &AuditConfig) -> Result<()> {
    validate_pattern("Date format", &config.date_format)?;
    validate_pattern("Time format", &config.time_format)?;

    if config.decimal_places > 10 {
        return Err(AuditError::InvalidArgument(format!(
            "Decimal places {} must be between 0 and 10",
            config.decimal_places
        )));
    }

    if config.tolerance_minutes >= 12 * 60 {
        return Err(AuditError::InvalidArgument(format!(
            "Tolerance of {} minutes must be under 12 hours",
            config.tolerance_minutes
        )));
    }

    if config.fallback_week_count == 0 {
        return Err(AuditError::InvalidArgument(
            "Fallback week count must be at least 1".to_string(),
        ));
    }

    if let (Some(start), Some(end)) = (config.audit_start, config.audit_end) {
        if end < start {
            return Err(AuditError::InvalidArgument(format!(
                "Audit period ends on {} before it starts on {}",
                end, start
            )));
        }
    }

    Ok(())
}

fn validate_schedule(schedule: &[ScheduleSlot], config: &AuditConfig) -> Result<()> {
    if schedule.is_empty() {
        return Err(AuditError::InvalidArgument(
            "Schedule has no slots".to_string(),
        ));
    }

    let bucketizer = Bucketizer::from_config(config);
    for (idx, slot) in schedule.iter().enumerate() {
        if slot.network.trim().is_empty() {
            return Err(AuditError::InvalidArgument(format!(
                "Schedule row {} has a blank network",
                idx
            )));
        }
        if slot.spots < 0 {
            return Err(AuditError::InvalidArgument(format!(
                "Schedule row {} ({} {}) has negative spot count {}",
                idx, slot.network, slot.time, slot.spots
            )));
        }
        if slot.spots > i64::from(u32::MAX) {
            return Err(AuditError::InvalidArgument(format!(
                "Schedule row {} ({} {}) has spot count {} above the limit of {}",
                idx,
                slot.network,
                slot.time,
                slot.spots,
                u32::MAX
            )));
        }
        if !slot.cost.is_finite() || slot.cost < 0.0 {
            return Err(AuditError::InvalidArgument(format!(
                "Schedule row {} ({} {}) has invalid cost {}",
                idx, slot.network, slot.time, slot.cost
            )));
        }
        bucketizer.resolve_slot(slot)?;
    }

    Ok(())
}
