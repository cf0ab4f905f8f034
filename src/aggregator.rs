use crate::engine::{BucketResult, PartitionOutcome};
use crate::error::{AuditError, Result};
use crate::schema::WeekWindow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekResult {
    pub week: u32,
    /// Calendar span of the week; `None` when the week count did not come
    /// from invoice dates
    pub window: Option<WeekWindow>,
    pub buckets: Vec<BucketResult>,
    pub scheduled_spots: u64,
    pub scheduled_value: f64,
    pub aired_spots: u64,
    pub pre_empted_spots: u64,
    pub pre_empted_value: f64,
    pub extra_spots: u64,
    pub extra_value: f64,
}

impl WeekResult {
    pub fn from_buckets(week: u32, window: Option<WeekWindow>, buckets: Vec<BucketResult>) -> Self {
        let mut result = Self {
            week,
            window,
            buckets: Vec::new(),
            scheduled_spots: 0,
            scheduled_value: 0.0,
            aired_spots: 0,
            pre_empted_spots: 0,
            pre_empted_value: 0.0,
            extra_spots: 0,
            extra_value: 0.0,
        };

        for bucket in &buckets {
            result.scheduled_spots += bucket.scheduled_spots;
            result.scheduled_value += bucket.scheduled_value;
            result.aired_spots += bucket.aired_spots;
            result.pre_empted_spots += bucket.pre_empted_spots;
            result.pre_empted_value += bucket.pre_empted_value;
            result.extra_spots += bucket.extra_spots;
            result.extra_value += bucket.extra_value;
        }

        result.buckets = buckets;
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub network: String,
    pub weeks: Vec<WeekResult>,
    pub total_pre_empted_spots: u64,
    pub total_pre_empted_value: f64,
    pub total_extra_spots: u64,
    pub total_extra_value: f64,
}

impl NetworkSummary {
    fn new(network: String) -> Self {
        Self {
            network,
            weeks: Vec::new(),
            total_pre_empted_spots: 0,
            total_pre_empted_value: 0.0,
            total_extra_spots: 0,
            total_extra_value: 0.0,
        }
    }

    fn push_week(&mut self, week: WeekResult) {
        self.total_pre_empted_spots += week.pre_empted_spots;
        self.total_pre_empted_value += week.pre_empted_value;
        self.total_extra_spots += week.extra_spots;
        self.total_extra_value += week.extra_value;
        self.weeks.push(week);
    }
}

/// Rolls partition outcomes up into one summary per network.
///
/// Networks keep the order in which they first appear in `outcomes`; weeks
/// within a network are sorted ascending whatever order the partitions
/// arrive in.
pub fn aggregate(outcomes: Vec<PartitionOutcome>, windows: &[WeekWindow]) -> Vec<NetworkSummary> {
    let mut rank: HashMap<String, usize> = HashMap::new();
    for outcome in &outcomes {
        let next = rank.len();
        rank.entry(outcome.network.clone()).or_insert(next);
    }

    let mut ordered = outcomes;
    ordered.sort_by_key(|o| (rank[&o.network], o.week));

    let mut summaries: Vec<NetworkSummary> = Vec::with_capacity(rank.len());
    for outcome in ordered {
        if summaries.last().map(|s| &s.network) != Some(&outcome.network) {
            summaries.push(NetworkSummary::new(outcome.network.clone()));
        }

        let window = windows.iter().find(|w| w.index == outcome.week).copied();
        let week = WeekResult::from_buckets(outcome.week, window, outcome.buckets);

        if let Some(summary) = summaries.last_mut() {
            summary.push_week(week);
        }
    }

    summaries
}

/// Re-checks every bucket invariant and that week and network totals equal
/// the sums of their parts (values within `tolerance`).
pub fn verify_summaries(summaries: &[NetworkSummary], tolerance: f64) -> Result<()> {
    let fail = |network: &str, details: String| AuditError::VerificationError {
        network: network.to_string(),
        details,
    };

    for summary in summaries {
        let network = summary.network.as_str();
        let mut pre_spots = 0u64;
        let mut pre_value = 0.0;
        let mut extra_spots = 0u64;
        let mut extra_value = 0.0;

        for week in &summary.weeks {
            let mut week_pre = 0u64;
            let mut week_pre_value = 0.0;
            let mut week_extra = 0u64;
            let mut week_extra_value = 0.0;

            for bucket in &week.buckets {
                if bucket.pre_empted_spots != bucket.scheduled_spots.saturating_sub(bucket.aired_spots)
                    || bucket.extra_spots != bucket.aired_spots.saturating_sub(bucket.scheduled_spots)
                {
                    return Err(fail(
                        network,
                        format!(
                            "week {} bucket {}: scheduled {}, aired {}, pre-empted {}, extra {}",
                            week.week,
                            bucket.label,
                            bucket.scheduled_spots,
                            bucket.aired_spots,
                            bucket.pre_empted_spots,
                            bucket.extra_spots
                        ),
                    ));
                }
                if bucket.pre_empted_value < 0.0 || bucket.extra_value < 0.0 {
                    return Err(fail(
                        network,
                        format!("week {} bucket {} has a negative value", week.week, bucket.label),
                    ));
                }
                week_pre += bucket.pre_empted_spots;
                week_pre_value += bucket.pre_empted_value;
                week_extra += bucket.extra_spots;
                week_extra_value += bucket.extra_value;
            }

            if week_pre != week.pre_empted_spots
                || week_extra != week.extra_spots
                || (week_pre_value - week.pre_empted_value).abs() > tolerance
                || (week_extra_value - week.extra_value).abs() > tolerance
            {
                return Err(fail(
                    network,
                    format!("week {} totals do not match its buckets", week.week),
                ));
            }

            pre_spots += week.pre_empted_spots;
            pre_value += week.pre_empted_value;
            extra_spots += week.extra_spots;
            extra_value += week.extra_value;
        }

        if pre_spots != summary.total_pre_empted_spots
            || extra_spots != summary.total_extra_spots
            || (pre_value - summary.total_pre_empted_value).abs() > tolerance
            || (extra_value - summary.total_extra_value).abs() > tolerance
        {
            return Err(fail(
                network,
                "network totals do not match its weeks".to_string(),
            ));
        }
    }

    Ok(())
}
