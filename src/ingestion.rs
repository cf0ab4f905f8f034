use crate::error::{AuditError, Result};
use crate::schema::{InvoiceRecord, ScheduleSlot};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::io::Read;

pub const NETWORK: &str = "Network";
pub const DATE: &str = "Date";
pub const TIME: &str = "Time";
pub const RATE: &str = "Rate";
pub const DAY: &str = "Day";
pub const SPOTS: &str = "Spots";
pub const COST: &str = "Cost";

/// Maps source headers onto canonical column names before any row is read.
/// Headers without an entry keep their own name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    renames: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, source: &str, canonical: &str) -> Self {
        self.renames
            .insert(source.trim().to_lowercase(), canonical.to_string());
        self
    }

    /// Column layout of the cable provider invoice export (Amount carries the
    /// charged rate).
    pub fn spectrum_invoice() -> Self {
        Self::new()
            .rename("Amount", RATE)
            .rename("Spot Title", "Description")
            .rename("Program Description", "Program")
            .rename("Spot Length", "Duration")
    }

    pub fn canonical(&self, header: &str) -> String {
        let header = header.trim();
        self.renames
            .get(&header.to_lowercase())
            .cloned()
            .unwrap_or_else(|| header.to_string())
    }
}

struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, mapping: &ColumnMapping) -> Self {
        Self {
            names: headers.iter().map(|h| mapping.canonical(h)).collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| AuditError::MissingColumn(name.to_string()))
    }
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

/// Parses a money cell such as `100`, `$1,250.00` or `€ 80.5`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok()
}

pub fn read_schedule_csv<R: Read>(reader: R) -> Result<Vec<ScheduleSlot>> {
    read_schedule_csv_with_mapping(reader, &ColumnMapping::new())
}

pub fn read_schedule_csv_with_mapping<R: Read>(
    reader: R,
    mapping: &ColumnMapping,
) -> Result<Vec<ScheduleSlot>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let columns = Columns::from_headers(csv_reader.headers()?, mapping);

    let network_idx = columns.require(NETWORK)?;
    let time_idx = columns.require(TIME)?;
    let spots_idx = columns.require(SPOTS)?;
    let cost_idx = columns.require(COST)?;
    let day_idx = columns.position(DAY);

    let mut slots = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result?;

        let spots_text = field(&record, spots_idx);
        let spots = spots_text.parse::<i64>().map_err(|_| {
            AuditError::InvalidArgument(format!(
                "Schedule row {}: spot count '{}' is not a whole number",
                row, spots_text
            ))
        })?;

        let cost_text = field(&record, cost_idx);
        let cost = parse_amount(cost_text).ok_or_else(|| {
            AuditError::InvalidArgument(format!(
                "Schedule row {}: cost '{}' is not a number",
                row, cost_text
            ))
        })?;

        let day = day_idx
            .map(|idx| field(&record, idx).to_string())
            .filter(|d| !d.is_empty());

        slots.push(ScheduleSlot {
            network: field(&record, network_idx).to_string(),
            day,
            time: field(&record, time_idx).to_string(),
            spots,
            cost,
        });
    }

    Ok(slots)
}

/// Reads invoice rows. Columns other than Network, Date, Time and Rate are
/// kept as pass-through fields under their canonical names. An unreadable
/// rate becomes NaN so the row is dropped during normalization instead of
/// failing the whole file.
pub fn read_invoice_csv<R: Read>(reader: R, mapping: &ColumnMapping) -> Result<Vec<InvoiceRecord>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let columns = Columns::from_headers(csv_reader.headers()?, mapping);

    let network_idx = columns.require(NETWORK)?;
    let date_idx = columns.require(DATE)?;
    let time_idx = columns.require(TIME)?;
    let rate_idx = columns.require(RATE)?;
    let core = [network_idx, date_idx, time_idx, rate_idx];

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result?;

        let extra = columns
            .names
            .iter()
            .enumerate()
            .filter(|(idx, _)| !core.contains(idx))
            .map(|(idx, name)| (name.clone(), field(&record, idx).to_string()))
            .collect();

        records.push(InvoiceRecord {
            network: field(&record, network_idx).to_string(),
            date: field(&record, date_idx).to_string(),
            time: field(&record, time_idx).to_string(),
            rate: parse_amount(field(&record, rate_idx)).unwrap_or(f64::NAN),
            extra,
        });
    }

    Ok(records)
}
