use crate::bucketizer::{BucketKey, PartitionPlan, PlannedBucket};
use crate::error::{AuditError, Result};
use crate::schema::{AiredSpot, AuditWarning, BucketGranularity, ExpandedScheduleOccurrence};
use chrono::Timelike;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketResult {
    pub key: BucketKey,
    pub label: String,
    pub scheduled_spots: u64,
    pub scheduled_value: f64,
    pub aired_spots: u64,
    pub pre_empted_spots: u64,
    pub pre_empted_value: f64,
    pub extra_spots: u64,
    pub extra_value: f64,
    /// Cost per spot used to value pre-emptions and extras. `None` when the
    /// bucket has no scheduled occurrence and extras carry their charged rate.
    pub unit_cost: Option<f64>,
}

impl BucketResult {
    pub fn ran_as_scheduled(&self) -> bool {
        self.scheduled_spots > 0 && self.aired_spots == self.scheduled_spots
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled_spots == 0 && self.aired_spots == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionOutcome {
    pub network: String,
    pub week: u32,
    pub buckets: Vec<BucketResult>,
    pub warnings: Vec<AuditWarning>,
}

/// Returns the cost shared by every occurrence in a bucket, or
/// [`AuditError::InconsistentRate`] listing the distinct costs found.
pub fn check_uniform_rate(
    network: &str,
    bucket: &str,
    occurrences: &[ExpandedScheduleOccurrence],
) -> Result<Option<f64>> {
    let Some(first) = occurrences.first() else {
        return Ok(None);
    };

    let mut rates = vec![first.slot.cost];
    for occurrence in occurrences {
        if !rates.contains(&occurrence.slot.cost) {
            rates.push(occurrence.slot.cost);
        }
    }

    if rates.len() > 1 {
        return Err(AuditError::InconsistentRate {
            network: network.to_string(),
            bucket: bucket.to_string(),
            rates,
        });
    }

    Ok(Some(first.slot.cost))
}

pub struct Comparator {
    granularity: BucketGranularity,
}

impl Comparator {
    pub fn new(granularity: BucketGranularity) -> Self {
        Self { granularity }
    }

    pub fn compare_all(&self, plans: &[PartitionPlan]) -> Vec<PartitionOutcome> {
        plans.iter().map(|plan| self.compare(plan)).collect()
    }

    /// Compares scheduled against aired spots for one (network, week).
    ///
    /// Scheduled buckets keep schedule order; in slot mode the airings that
    /// matched no slot follow as unscheduled extras, ordered by hour. Buckets
    /// with nothing scheduled and nothing aired are left out.
    pub fn compare(&self, plan: &PartitionPlan) -> PartitionOutcome {
        let mut warnings = Vec::new();

        let mut buckets: Vec<BucketResult> = plan
            .buckets
            .iter()
            .map(|bucket| self.compare_bucket(&plan.network, plan.week, bucket, &mut warnings))
            .collect();

        if self.granularity == BucketGranularity::Slot {
            buckets.extend(reclassify_unmatched(&plan.unmatched));
        }

        buckets.retain(|b| !b.is_empty());

        debug!(
            "{} week {}: {} buckets, {} unscheduled airings",
            plan.network,
            plan.week,
            buckets.len(),
            plan.unmatched.len()
        );

        PartitionOutcome {
            network: plan.network.clone(),
            week: plan.week,
            buckets,
            warnings,
        }
    }

    fn compare_bucket(
        &self,
        network: &str,
        week: u32,
        bucket: &PlannedBucket,
        warnings: &mut Vec<AuditWarning>,
    ) -> BucketResult {
        let scheduled_spots: u64 = bucket
            .occurrences
            .iter()
            .map(|o| o.slot.spots.unsigned_abs())
            .sum();
        let scheduled_value: f64 = bucket
            .occurrences
            .iter()
            .map(|o| o.slot.spots as f64 * o.slot.cost)
            .sum();
        let aired_spots = bucket.airings.len() as u64;

        let unit_cost = match check_uniform_rate(network, &bucket.label, &bucket.occurrences) {
            Ok(rate) => rate,
            Err(e) => {
                warn!("{} (week {}); using the first occurrence's cost", e, week);
                let applied = bucket.occurrences.first().map(|o| o.slot.cost);
                if let (AuditError::InconsistentRate { rates, .. }, Some(applied_rate)) = (e, applied) {
                    warnings.push(AuditWarning::InconsistentRate {
                        network: network.to_string(),
                        week,
                        bucket: bucket.label.clone(),
                        rates,
                        applied_rate,
                    });
                }
                applied
            }
        };

        let pre_empted_spots = scheduled_spots.saturating_sub(aired_spots);
        let extra_spots = aired_spots.saturating_sub(scheduled_spots);

        let pre_empted_value = pre_empted_spots as f64 * unit_cost.unwrap_or(0.0);
        let extra_value = match unit_cost {
            Some(cost) => extra_spots as f64 * cost,
            None => bucket.airings.iter().map(|a| a.record.rate).sum(),
        };

        BucketResult {
            key: bucket.key.clone(),
            label: bucket.label.clone(),
            scheduled_spots,
            scheduled_value,
            aired_spots,
            pre_empted_spots,
            pre_empted_value,
            extra_spots,
            extra_value,
            unit_cost,
        }
    }
}

/// Turns airings that fit no scheduled slot into hour-wide extra buckets
/// anchored at each airing's hour and valued at the rate actually charged.
fn reclassify_unmatched(unmatched: &[AiredSpot]) -> Vec<BucketResult> {
    let mut synthesized: Vec<BucketResult> = Vec::new();

    for spot in unmatched {
        let key = BucketKey::Unscheduled(spot.record.time.hour());
        let idx = match synthesized.iter().position(|b| b.key == key) {
            Some(i) => i,
            None => {
                synthesized.push(BucketResult {
                    label: key.label(),
                    key,
                    scheduled_spots: 0,
                    scheduled_value: 0.0,
                    aired_spots: 0,
                    pre_empted_spots: 0,
                    pre_empted_value: 0.0,
                    extra_spots: 0,
                    extra_value: 0.0,
                    unit_cost: None,
                });
                synthesized.len() - 1
            }
        };

        let bucket = &mut synthesized[idx];
        bucket.aired_spots += 1;
        bucket.extra_spots += 1;
        bucket.extra_value += spot.record.rate;
    }

    synthesized.sort_by(|a, b| a.key.cmp(&b.key));
    synthesized
}
