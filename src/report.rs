use crate::aggregator::{NetworkSummary, WeekResult};
use crate::engine::BucketResult;
use crate::schema::{AuditConfig, DropSummary};
use crate::utils::format_week_heading;
use log::debug;

fn spots(count: u64) -> &'static str {
    if count == 1 {
        "spot"
    } else {
        "spots"
    }
}

fn was_were(count: u64) -> &'static str {
    if count == 1 {
        "was"
    } else {
        "were"
    }
}

/// Renders the audit narrative: a block per network, a block per week inside
/// it, and network totals at the end of each network block.
///
/// Weeks without a calendar window are left out of the narrative; their
/// spots still count in the network totals.
pub fn render_report(summaries: &[NetworkSummary], config: &AuditConfig) -> Vec<String> {
    let mut lines = Vec::new();

    for summary in summaries {
        let network = &summary.network;
        lines.push(network.clone());

        for week in &summary.weeks {
            if week.window.is_none() {
                debug!("Skipping week {} of {} in narrative: no window", week.week, network);
                continue;
            }
            render_week(&mut lines, week, config);
        }

        lines.push(format!(
            "Total pre-empted spots for {} = {}",
            network, summary.total_pre_empted_spots
        ));
        lines.push(format!(
            "Total pre-empted value for {} = {}",
            network,
            config.format_money(summary.total_pre_empted_value)
        ));
        lines.push(format!(
            "Total extra spots for {} = {}",
            network, summary.total_extra_spots
        ));
        lines.push(format!(
            "Total extra value for {} = {}",
            network,
            config.format_money(summary.total_extra_value)
        ));
        lines.push(String::new());
    }

    lines
}

fn render_week(lines: &mut Vec<String>, week: &WeekResult, config: &AuditConfig) {
    if let Some(window) = week.window {
        lines.push(format_week_heading(window.start));
    }

    for bucket in &week.buckets {
        render_bucket(lines, bucket, config);
    }

    let pre = week.pre_empted_spots;
    if pre > 0 {
        lines.push(format!(
            "{} total {} {} pre-empted",
            pre,
            spots(pre),
            was_were(pre)
        ));
        lines.push(format!(
            "Total pre-empted value is {}",
            config.format_money(week.pre_empted_value)
        ));
    } else {
        lines.push("Spots ran as scheduled".to_string());
    }

    let extra = week.extra_spots;
    if extra > 0 {
        lines.push(format!("{} total extra {} ran", extra, spots(extra)));
        lines.push(format!(
            "Total extra value is {}",
            config.format_money(week.extra_value)
        ));
    }

    lines.push(String::new());
}

fn render_bucket(lines: &mut Vec<String>, bucket: &BucketResult, config: &AuditConfig) {
    let scheduled = bucket.scheduled_spots;
    if scheduled > 0 {
        lines.push(format!(
            "{} {} {} scheduled to run at {} at a value of {} each",
            scheduled,
            spots(scheduled),
            was_were(scheduled),
            bucket.label,
            config.format_money(bucket.scheduled_value / scheduled as f64)
        ));
    }

    let pre = bucket.pre_empted_spots;
    if pre > 0 {
        lines.push(format!(
            "{} {} {} pre-empted at a value of {} each",
            pre,
            spots(pre),
            was_were(pre),
            config.format_money(bucket.pre_empted_value / pre as f64)
        ));
    }

    if bucket.ran_as_scheduled() {
        lines.push(format!(
            "{} {} ran as scheduled at {}",
            scheduled,
            spots(scheduled),
            bucket.label
        ));
    }

    let extra = bucket.extra_spots;
    if extra > 0 {
        match bucket.unit_cost {
            Some(_) => lines.push(format!(
                "{} extra {} ran at {} at a value of {} each",
                extra,
                spots(extra),
                bucket.label,
                config.format_money(bucket.extra_value / extra as f64)
            )),
            None => lines.push(format!(
                "{} extra {} ran outside the schedule at {} for a total value of {}",
                extra,
                spots(extra),
                bucket.label,
                config.format_money(bucket.extra_value)
            )),
        }
    }
}

/// One-line-per-reason summary of invoice rows left out of the audit.
pub fn render_drop_summary(drops: &DropSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let counts = [
        (drops.format_errors, "had an unreadable date or time"),
        (drops.out_of_window, "fell outside the audited weeks"),
        (drops.invalid_rows, "had a blank network or an invalid rate"),
    ];

    for (count, reason) in counts {
        if count > 0 {
            let (noun, verb) = if count == 1 {
                ("invoice row", "was")
            } else {
                ("invoice rows", "were")
            };
            lines.push(format!("{} {} {} and {} excluded", count, noun, reason, verb));
        }
    }

    lines
}
