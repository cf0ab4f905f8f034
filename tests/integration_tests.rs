use chrono::{Datelike, NaiveDate, Weekday};
use placement_audit::*;

const SCHEDULE_CSV: &str = "\
Network,Day,Time,Spots,Cost
ESPN,,7:00am-8:00am,5,100.00
ESPN,,8:00pm-9:00pm,2,350.00
CNN,,6:00am-7:00am,3,45.00
HGTV,Saturday,12:00pm-1:00pm,1,80.00
";

const INVOICE_CSV: &str = "\
Invoice,Order Number,Line Number,Network,Date,Time,Day,Spot ID,Spot Title,Amount,Currency
INV-100,ORD-9,1,ESPN,04-01-2024,07:01:00,Mon,S1,Spring Sale,$100.00,USD
INV-100,ORD-9,2,ESPN,04-02-2024,07:02:00,Tue,S2,Spring Sale,$100.00,USD
INV-100,ORD-9,3,ESPN,04-03-2024,07:58:00,Wed,S3,Spring Sale,$100.00,USD
INV-100,ORD-9,4,ESPN,04-03-2024,20:15:00,Wed,S4,Spring Sale,$350.00,USD
INV-100,ORD-9,5,ESPN,04-04-2024,20:45:00,Thu,S5,Spring Sale,$350.00,USD
INV-100,ORD-9,6,CNN,04-02-2024,06:10:00,Tue,S6,Spring Sale,$45.00,USD
INV-100,ORD-9,7,CNN,04-03-2024,06:20:00,Wed,S7,Spring Sale,$45.00,USD
INV-100,ORD-9,8,CNN,04-04-2024,06:30:00,Thu,S8,Spring Sale,$45.00,USD
INV-100,ORD-9,9,CNN,04-05-2024,06:40:00,Fri,S9,Spring Sale,$45.00,USD
INV-100,ORD-9,10,ESPN,04-09-2024,07:30:00,Tue,S10,Spring Sale,$100.00,USD
INV-100,ORD-9,11,ESPN,04-10-2024,09:15:00,Wed,S11,Spring Sale,$62.50,USD
INV-100,ORD-9,12,ESPN,04-11-2024,9:40pm,Thu,S12,Spring Sale,$350.00,USD
INV-100,ORD-9,13,HGTV,04-13-2024,12:20:00,Sat,S13,Spring Sale,$80.00,USD
INV-100,ORD-9,14,ESPN,2024-04-12,07:10:00,Fri,S14,Spring Sale,$100.00,USD
";

fn slot(network: &str, time: &str, spots: i64, cost: f64) -> ScheduleSlot {
    ScheduleSlot {
        network: network.to_string(),
        day: None,
        time: time.to_string(),
        spots,
        cost,
    }
}

fn aired(network: &str, date: &str, time: &str, rate: f64) -> InvoiceRecord {
    InvoiceRecord {
        network: network.to_string(),
        date: date.to_string(),
        time: time.to_string(),
        rate,
        extra: Default::default(),
    }
}

fn load_fixture() -> anyhow::Result<(Vec<ScheduleSlot>, Vec<InvoiceRecord>)> {
    let schedule = read_schedule_csv(SCHEDULE_CSV.as_bytes())?;
    let invoice = read_invoice_csv(INVOICE_CSV.as_bytes(), &ColumnMapping::spectrum_invoice())?;
    Ok((schedule, invoice))
}

fn find_bucket<'a>(week: &'a WeekResult, label: &str) -> &'a BucketResult {
    week.buckets
        .iter()
        .find(|b| b.label == label)
        .unwrap_or_else(|| panic!("no bucket labelled {} in week {}", label, week.week))
}

#[test]
fn test_provider_invoice_audit() -> anyhow::Result<()> {
    let (schedule, invoice) = load_fixture()?;
    assert_eq!(schedule.len(), 4);
    assert_eq!(invoice.len(), 14);

    let report = run_audit_with_verification(&schedule, &invoice, &AuditConfig::default(), 0.001)?;

    // 2024-04-01 (Mon) .. 2024-04-13 (Sat): two Monday windows
    assert_eq!(report.windows.len(), 2);
    assert_eq!(report.windows[0].start, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    assert_eq!(report.windows[1].end, NaiveDate::from_ymd_opt(2024, 4, 14).unwrap());

    // the ISO-formatted date on the last row does not match MM-DD-YYYY
    assert_eq!(report.drops.format_errors, 1);
    assert_eq!(report.drops.rows[0].row, 13);

    let networks: Vec<&str> = report.networks.iter().map(|n| n.network.as_str()).collect();
    assert_eq!(networks, vec!["ESPN", "CNN", "HGTV"]);

    let espn = &report.networks[0];
    let morning = find_bucket(&espn.weeks[0], "7:00am-8:00am");
    assert_eq!(morning.aired_spots, 3);
    assert_eq!(morning.pre_empted_spots, 2);
    assert_eq!(morning.pre_empted_value, 200.0);
    assert!(find_bucket(&espn.weeks[0], "8:00pm-9:00pm").ran_as_scheduled());

    let week2 = &espn.weeks[1];
    assert_eq!(find_bucket(week2, "7:00am-8:00am").pre_empted_spots, 4);
    let evening = find_bucket(week2, "8:00pm-9:00pm");
    assert_eq!(evening.pre_empted_spots, 2);
    let nine_am = find_bucket(week2, "9:00am-10:00am");
    assert_eq!(nine_am.key, BucketKey::Unscheduled(9));
    assert_eq!(nine_am.extra_value, 62.5);
    let nine_pm = find_bucket(week2, "9:00pm-10:00pm");
    assert_eq!(nine_pm.extra_spots, 1);
    assert_eq!(nine_pm.extra_value, 350.0);

    assert_eq!(espn.total_pre_empted_spots, 2 + 4 + 2);
    assert_eq!(espn.total_pre_empted_value, 200.0 + 400.0 + 700.0);
    assert_eq!(espn.total_extra_spots, 2);
    assert_eq!(espn.total_extra_value, 412.5);

    let cnn = &report.networks[1];
    assert_eq!(cnn.weeks[0].buckets[0].extra_spots, 1);
    assert_eq!(cnn.weeks[0].buckets[0].extra_value, 45.0);
    assert_eq!(cnn.weeks[1].buckets[0].pre_empted_spots, 3);

    let hgtv = &report.networks[2];
    assert_eq!(hgtv.weeks[0].pre_empted_spots, 1);
    assert_eq!(hgtv.weeks[1].pre_empted_spots, 0);
    assert_eq!(hgtv.total_pre_empted_value, 80.0);

    Ok(())
}

#[test]
fn test_report_lines_follow_network_then_week_order() -> anyhow::Result<()> {
    let (schedule, invoice) = load_fixture()?;
    let report = run_audit(&schedule, &invoice, &AuditConfig::default())?;

    let headers: Vec<&String> = report
        .lines
        .iter()
        .filter(|l| l.starts_with("Week of"))
        .collect();
    assert_eq!(
        headers,
        vec![
            "Week of April 1st",
            "Week of April 8th",
            "Week of April 1st",
            "Week of April 8th",
            "Week of April 1st",
            "Week of April 8th",
        ]
    );

    let espn_start = report.lines.iter().position(|l| l == "ESPN").unwrap();
    let cnn_start = report.lines.iter().position(|l| l == "CNN").unwrap();
    let hgtv_start = report.lines.iter().position(|l| l == "HGTV").unwrap();
    assert!(espn_start < cnn_start && cnn_start < hgtv_start);

    assert!(report
        .lines
        .contains(&"Total pre-empted value for ESPN = $1300.00".to_string()));
    assert!(report
        .lines
        .contains(&"1 extra spot ran outside the schedule at 9:00am-10:00am for a total value of $62.50".to_string()));
    assert!(report
        .lines
        .contains(&"1 extra spot ran at 6:00am-7:00am at a value of $45.00 each".to_string()));
    assert_eq!(report.lines.last().map(String::as_str), Some(""));

    Ok(())
}

#[test]
fn test_pre_emption_example() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 5, 100.0)];
    let invoice = vec![
        aired("ABC", "01-03-2022", "07:01:00", 100.0),
        aired("ABC", "01-03-2022", "07:02:00", 100.0),
        aired("ABC", "01-03-2022", "07:58:00", 100.0),
    ];

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    let bucket = &report.networks[0].weeks[0].buckets[0];
    assert_eq!(bucket.scheduled_spots, 5);
    assert_eq!(bucket.aired_spots, 3);
    assert_eq!(bucket.pre_empted_spots, 2);
    assert_eq!(bucket.pre_empted_value, 200.0);
    assert_eq!(bucket.extra_spots, 0);
}

#[test]
fn test_extra_spots_example() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 5, 100.0)];
    let invoice: Vec<InvoiceRecord> = (0..7)
        .map(|i| aired("ABC", "01-04-2022", &format!("07:{:02}:00", i * 8), 95.0))
        .collect();

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    let bucket = &report.networks[0].weeks[0].buckets[0];
    assert_eq!(bucket.pre_empted_spots, 0);
    assert_eq!(bucket.extra_spots, 2);
    assert_eq!(bucket.extra_value, 2.0 * 100.0);
}

#[test]
fn test_unscheduled_airing_example() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 5, 100.0)];
    let invoice = vec![aired("ABC", "01-05-2022", "09:15:00", 73.25)];

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    let week = &report.networks[0].weeks[0];
    let synthesized = week
        .buckets
        .iter()
        .find(|b| b.key.is_unscheduled())
        .expect("unscheduled bucket");

    assert_eq!(synthesized.key, BucketKey::Unscheduled(9));
    assert!(synthesized.label.starts_with("9:00am"));
    assert_eq!(synthesized.extra_spots, 1);
    assert_eq!(synthesized.extra_value, 73.25);
    assert_eq!(week.buckets[0].pre_empted_spots, 5);
}

#[test]
fn test_twenty_day_invoice_spans_three_weeks() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 1, 100.0)];
    let invoice = vec![
        aired("ABC", "01-03-2022", "07:05:00", 100.0),
        aired("ABC", "01-22-2022", "07:05:00", 100.0),
    ];

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    assert_eq!(report.windows.len(), 3);
    for window in &report.windows {
        assert_eq!(window.start.weekday(), Weekday::Mon);
    }

    let weeks = &report.networks[0].weeks;
    assert_eq!(weeks.len(), 3);
    assert!(weeks[0].buckets[0].ran_as_scheduled());
    assert_eq!(weeks[1].pre_empted_spots, 1);
    assert!(weeks[2].buckets[0].ran_as_scheduled());
}

#[test]
fn test_week_windows_cover_span_for_many_ranges() {
    let base = NaiveDate::from_ymd_opt(2023, 12, 20).unwrap();
    for offset in 0..10u64 {
        for length in 0..40u64 {
            let min = base.checked_add_days(chrono::Days::new(offset)).unwrap();
            let max = min.checked_add_days(chrono::Days::new(length)).unwrap();
            let windows = compute_week_windows(min, max).unwrap();

            let first = windows.first().unwrap();
            let last = windows.last().unwrap();
            assert_eq!(first.start.weekday(), Weekday::Mon);
            assert_eq!(last.end.weekday(), Weekday::Sun);
            assert!(first.start <= min && min - first.start < chrono::Duration::days(7));
            assert!(last.end >= max && last.end - max < chrono::Duration::days(7));

            for pair in windows.windows(2) {
                assert_eq!(pair[1].start, pair[0].end.succ_opt().unwrap());
            }
            for w in &windows {
                assert_eq!((w.end - w.start).num_days(), 6);
            }

            let total_days = (last.end - first.start).num_days() + 1;
            assert_eq!(windows.len() as i64, (total_days + 6) / 7);
        }
    }
}

#[test]
fn test_expansion_size_for_many_templates() {
    let template: Vec<ScheduleSlot> = (0..5)
        .map(|i| slot("ABC", &format!("{}:00am-{}:00am", i + 1, i + 2), i, 10.0))
        .collect();

    for size in 1..=template.len() {
        for weeks in 1..=8u32 {
            let expanded = expand(&template[..size], weeks).unwrap();
            assert_eq!(expanded.len(), size * weeks as usize);
            for week in 1..=weeks {
                assert_eq!(expanded.iter().filter(|o| o.week == week).count(), size);
            }
        }
    }
}

#[test]
fn test_hour_granularity_audit() {
    let schedule = vec![
        slot("ABC", "7:00am-7:30am", 2, 100.0),
        slot("ABC", "7:30am-8:00am", 1, 100.0),
        slot("ABC", "10:00pm-11:00pm", 1, 400.0),
    ];
    let invoice = vec![
        aired("ABC", "01-03-2022", "07:59:00", 100.0),
        aired("ABC", "01-03-2022", "07:10:00", 100.0),
        // 6:58 would fit 7:00am-7:30am with tolerance, but hour mode has none
        aired("ABC", "01-03-2022", "06:58:00", 90.0),
    ];
    let config = AuditConfig {
        granularity: BucketGranularity::Hour,
        ..AuditConfig::default()
    };

    let report = run_audit_with_verification(&schedule, &invoice, &config, 0.001).unwrap();
    let week = &report.networks[0].weeks[0];
    let labels: Vec<&str> = week.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["7:00am-8:00am", "10:00pm-11:00pm", "6:00am-7:00am"]);

    assert_eq!(week.buckets[0].scheduled_spots, 3);
    assert_eq!(week.buckets[0].pre_empted_spots, 1);
    assert_eq!(week.buckets[1].pre_empted_value, 400.0);
    assert_eq!(week.buckets[2].extra_value, 90.0);
}

#[test]
fn test_configurable_tolerance() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 1, 100.0)];
    let invoice = vec![aired("ABC", "01-03-2022", "08:05:00", 100.0)];

    let default_report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    let week = &default_report.networks[0].weeks[0];
    assert_eq!(week.pre_empted_spots, 1);
    assert_eq!(week.extra_spots, 1);

    let wide = AuditConfig {
        tolerance_minutes: 10,
        ..AuditConfig::default()
    };
    let wide_report = run_audit(&schedule, &invoice, &wide).unwrap();
    let week = &wide_report.networks[0].weeks[0];
    assert_eq!(week.pre_empted_spots, 0);
    assert_eq!(week.extra_spots, 0);
    assert!(week.buckets[0].ran_as_scheduled());
}

#[test]
fn test_inconsistent_rates_surface_as_warnings() {
    let schedule = vec![
        slot("ABC", "7:00am-8:00am", 1, 100.0),
        slot("ABC", "7:00am-8:00am", 1, 120.0),
    ];
    let invoice = vec![
        aired("ABC", "01-03-2022", "07:05:00", 100.0),
        aired("ABC", "01-10-2022", "07:05:00", 100.0),
    ];

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    // one warning per week the bucket appears in
    assert_eq!(report.warnings.len(), 2);
    match &report.warnings[0] {
        AuditWarning::InconsistentRate {
            rates, applied_rate, ..
        } => {
            assert_eq!(rates, &vec![100.0, 120.0]);
            assert_eq!(*applied_rate, 100.0);
        }
    }
    assert_eq!(report.networks[0].weeks[0].buckets[0].pre_empted_value, 100.0);
}

#[test]
fn test_invoice_only_network_is_all_extras() {
    let schedule = vec![slot("ABC", "7:00am-8:00am", 1, 100.0)];
    let invoice = vec![
        aired("ABC", "01-03-2022", "07:05:00", 100.0),
        aired("FOX", "01-03-2022", "19:05:00", 55.0),
    ];

    let report = run_audit(&schedule, &invoice, &AuditConfig::default()).unwrap();
    assert_eq!(report.networks.len(), 2);
    let fox = &report.networks[1];
    assert_eq!(fox.network, "FOX");
    assert_eq!(fox.total_extra_spots, 1);
    assert_eq!(fox.total_extra_value, 55.0);
    assert_eq!(fox.total_pre_empted_spots, 0);
}

#[test]
fn test_audit_is_idempotent_and_leaves_inputs_untouched() -> anyhow::Result<()> {
    let (schedule, invoice) = load_fixture()?;
    let schedule_before = schedule.clone();
    let invoice_before = invoice.clone();

    let first = run_audit(&schedule, &invoice, &AuditConfig::default())?;
    let second = run_audit(&schedule, &invoice, &AuditConfig::default())?;

    assert_eq!(first, second);
    assert_eq!(schedule, schedule_before);
    assert_eq!(invoice, invoice_before);
    Ok(())
}

#[test]
fn test_bucket_invariants_hold_across_fixture() -> anyhow::Result<()> {
    let (schedule, invoice) = load_fixture()?;
    for granularity in [BucketGranularity::Slot, BucketGranularity::Hour] {
        let config = AuditConfig {
            granularity,
            ..AuditConfig::default()
        };
        let report = run_audit(&schedule, &invoice, &config)?;
        for network in &report.networks {
            for week in &network.weeks {
                for bucket in &week.buckets {
                    assert_eq!(bucket.pre_empted_spots * bucket.extra_spots, 0);
                    assert!(bucket.pre_empted_value >= 0.0 && bucket.extra_value >= 0.0);
                    assert!(!bucket.is_empty(), "empty buckets are never reported");
                }
            }
        }
        verify_summaries(&report.networks, 0.001)?;
    }
    Ok(())
}
