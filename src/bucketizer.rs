use crate::error::{AuditError, Result};
use crate::schema::{
    AiredSpot, AuditConfig, BucketGranularity, DropReason, DroppedRow,
    ExpandedScheduleOccurrence, InvoiceRecord, NormalizedInvoiceRecord, ScheduleSlot, WeekWindow,
};
use crate::utils::{
    format_hour_label, locate_week, parse_date, parse_invoice_time, parse_slot_label, SlotRange,
};
use chrono::{Duration, NaiveTime, Timelike};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unit of comparison within one network and one week.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BucketKey {
    /// A named schedule slot, e.g. `7:00am-8:00am`
    Slot(String),
    /// Hour of day (0-23) of a slot start
    Hour(u32),
    /// Hour of day anchoring airings that matched no scheduled slot
    Unscheduled(u32),
}

impl BucketKey {
    pub fn label(&self) -> String {
        match self {
            BucketKey::Slot(label) => label.clone(),
            BucketKey::Hour(hour) | BucketKey::Unscheduled(hour) => format_hour_label(*hour),
        }
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self, BucketKey::Unscheduled(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub records: Vec<NormalizedInvoiceRecord>,
    pub drops: Vec<DroppedRow>,
}

/// Parses invoice rows into typed records.
///
/// Rows with an unreadable date or time are dropped with [`DropReason::Format`]
/// unless `config.strict` is set, in which case the first one aborts the run.
/// Rows with a blank network or a negative / non-finite rate are dropped as
/// [`DropReason::Invalid`].
pub fn normalize_invoice(records: &[InvoiceRecord], config: &AuditConfig) -> Result<Normalized> {
    let mut normalized = Vec::with_capacity(records.len());
    let mut drops = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let network = record.network.trim().to_string();

        if network.is_empty() {
            drops.push(DroppedRow {
                row,
                network,
                reason: DropReason::Invalid,
                details: "Blank network".to_string(),
            });
            continue;
        }

        if !record.rate.is_finite() || record.rate < 0.0 {
            drops.push(DroppedRow {
                row,
                network,
                reason: DropReason::Invalid,
                details: format!("Rate {} is not a non-negative amount", record.rate),
            });
            continue;
        }

        let parsed = parse_date(&record.date, &config.date_format).and_then(|date| {
            parse_invoice_time(&record.time, &config.time_format).map(|time| (date, time))
        });

        match parsed {
            Ok((date, time)) => normalized.push(NormalizedInvoiceRecord {
                row,
                network,
                date,
                time,
                rate: record.rate,
            }),
            Err(e) if config.strict => return Err(e),
            Err(e) => drops.push(DroppedRow {
                row,
                network,
                reason: DropReason::Format,
                details: e.to_string(),
            }),
        }
    }

    Ok(Normalized {
        records: normalized,
        drops,
    })
}

/// Attaches a week index to every record whose date lies in one of `windows`.
/// Records outside all windows are returned as drops.
pub fn assign_weeks(
    records: &[NormalizedInvoiceRecord],
    windows: &[WeekWindow],
) -> (Vec<AiredSpot>, Vec<DroppedRow>) {
    let mut aired = Vec::with_capacity(records.len());
    let mut drops = Vec::new();

    for record in records {
        match locate_week(record.date, windows) {
            Ok(week) => aired.push(AiredSpot {
                week,
                record: record.clone(),
            }),
            Err(e) => {
                warn!("Dropping invoice row {}: {}", record.row, e);
                drops.push(DroppedRow {
                    row: record.row,
                    network: record.network.clone(),
                    reason: DropReason::OutOfWindow,
                    details: e.to_string(),
                });
            }
        }
    }

    (aired, drops)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBucket {
    pub key: BucketKey,
    pub label: String,
    /// Slot boundaries, present for slot-mode scheduled buckets only
    pub range: Option<SlotRange>,
    pub occurrences: Vec<ExpandedScheduleOccurrence>,
    pub airings: Vec<AiredSpot>,
}

impl PlannedBucket {
    fn new(key: BucketKey, range: Option<SlotRange>) -> Self {
        Self {
            label: key.label(),
            key,
            range,
            occurrences: Vec::new(),
            airings: Vec::new(),
        }
    }
}

/// Everything the comparator needs for one (network, week) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPlan {
    pub network: String,
    pub week: u32,
    /// Scheduled buckets in schedule order, followed by any hour buckets
    /// opened by airings (hour mode)
    pub buckets: Vec<PlannedBucket>,
    /// Airings that matched no scheduled bucket (slot mode)
    pub unmatched: Vec<AiredSpot>,
}

pub struct Bucketizer {
    granularity: BucketGranularity,
    tolerance: Duration,
}

impl Bucketizer {
    pub fn new(granularity: BucketGranularity, tolerance_minutes: u32) -> Self {
        Self {
            granularity,
            tolerance: Duration::minutes(tolerance_minutes as i64),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.granularity, config.tolerance_minutes)
    }

    /// Bucket key and parsed boundaries of a schedule slot.
    pub fn resolve_slot(&self, slot: &ScheduleSlot) -> Result<(BucketKey, SlotRange)> {
        let label = slot.time.trim();
        let range = parse_slot_label(label)?;
        let key = match self.granularity {
            BucketGranularity::Slot => BucketKey::Slot(label.to_string()),
            BucketGranularity::Hour => BucketKey::Hour(range.start.hour()),
        };
        Ok((key, range))
    }

    /// Builds one [`PartitionPlan`] per network and week.
    ///
    /// Networks appear in schedule order, followed by networks that only
    /// appear on the invoice; weeks run from 1 to `week_count`.
    pub fn plan(
        &self,
        occurrences: &[ExpandedScheduleOccurrence],
        aired: &[AiredSpot],
        week_count: u32,
    ) -> Result<Vec<PartitionPlan>> {
        let networks = network_order(occurrences, aired);

        let mut partitions = Vec::with_capacity(networks.len() * week_count as usize);
        let mut index: HashMap<(String, u32), usize> = HashMap::new();
        for network in &networks {
            for week in 1..=week_count {
                index.insert((network.clone(), week), partitions.len());
                partitions.push(PartitionPlan {
                    network: network.clone(),
                    week,
                    buckets: Vec::new(),
                    unmatched: Vec::new(),
                });
            }
        }

        for occurrence in occurrences {
            let network = occurrence.slot.network.trim().to_string();
            let slot_idx = *index.get(&(network, occurrence.week)).ok_or_else(|| {
                AuditError::InvalidArgument(format!(
                    "Schedule occurrence in week {} but only {} weeks are audited",
                    occurrence.week, week_count
                ))
            })?;

            let (key, range) = self.resolve_slot(&occurrence.slot)?;
            let buckets = &mut partitions[slot_idx].buckets;
            let bucket_idx = match buckets.iter().position(|b| b.key == key) {
                Some(i) => i,
                None => {
                    let range = match self.granularity {
                        BucketGranularity::Slot => Some(range),
                        BucketGranularity::Hour => None,
                    };
                    buckets.push(PlannedBucket::new(key, range));
                    buckets.len() - 1
                }
            };
            buckets[bucket_idx].occurrences.push(occurrence.clone());
        }

        for spot in aired {
            let slot_idx = *index
                .get(&(spot.record.network.clone(), spot.week))
                .ok_or_else(|| {
                    AuditError::InvalidArgument(format!(
                        "Invoice row {} falls in week {} but only {} weeks are audited",
                        spot.record.row, spot.week, week_count
                    ))
                })?;
            let partition = &mut partitions[slot_idx];

            match self.granularity {
                BucketGranularity::Slot => {
                    match self.match_slot(&partition.buckets, spot.record.time) {
                        Some(i) => partition.buckets[i].airings.push(spot.clone()),
                        None => partition.unmatched.push(spot.clone()),
                    }
                }
                BucketGranularity::Hour => {
                    let key = BucketKey::Hour(spot.record.time.hour());
                    let bucket_idx = match partition.buckets.iter().position(|b| b.key == key) {
                        Some(i) => i,
                        None => {
                            partition.buckets.push(PlannedBucket::new(key, None));
                            partition.buckets.len() - 1
                        }
                    };
                    partition.buckets[bucket_idx].airings.push(spot.clone());
                }
            }
        }

        debug!(
            "Planned {} partitions across {} networks and {} weeks",
            partitions.len(),
            networks.len(),
            week_count
        );

        Ok(partitions)
    }

    /// Picks the slot for an air time: a slot whose own range holds the time
    /// wins over one that only matches thanks to the tolerance.
    fn match_slot(&self, buckets: &[PlannedBucket], time: NaiveTime) -> Option<usize> {
        let candidates: Vec<usize> = buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                b.range
                    .is_some_and(|r| r.contains_with_tolerance(time, self.tolerance))
            })
            .map(|(i, _)| i)
            .collect();

        candidates
            .iter()
            .copied()
            .find(|&i| buckets[i].range.is_some_and(|r| r.contains_exact(time)))
            .or_else(|| candidates.first().copied())
    }
}

fn network_order(occurrences: &[ExpandedScheduleOccurrence], aired: &[AiredSpot]) -> Vec<String> {
    let mut networks: Vec<String> = Vec::new();
    let scheduled = occurrences.iter().map(|o| o.slot.network.trim());
    let invoiced = aired.iter().map(|a| a.record.network.as_str());

    for network in scheduled.chain(invoiced) {
        if !networks.iter().any(|n| n == network) {
            networks.push(network.to_string());
        }
    }
    networks
}
