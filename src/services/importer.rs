use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::job::FileType;
use crate::models::vehicle::NewVehicle;

/// A parsed spreadsheet row: header -> cell text, untyped.
pub type RawRow = HashMap<String, String>;

/// Column-name aliases accepted for each vehicle field; first match wins.
const FIRST_NAME: &[&str] = &["first_name", "firstName", "First Name"];
const LAST_NAME: &[&str] = &["last_name", "lastName", "Last Name"];
const EMAIL: &[&str] = &["email", "Email"];
const CAR_MAKE: &[&str] = &["car_make", "carMake", "Car Make"];
const CAR_MODEL: &[&str] = &["car_model", "carModel", "Car Model"];
const VIN: &[&str] = &["vin", "VIN"];
const MANUFACTURED_DATE: &[&str] = &[
    "manufactured_date",
    "manufacturedDate",
    "Manufactured Date",
];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

/// Outcome of validating a whole file: valid candidates plus error messages
/// tagged with their 1-based row index.
#[derive(Debug, Default)]
pub struct RowBatch {
    pub vehicles: Vec<NewVehicle>,
    pub errors: Vec<String>,
}

/// Parse an uploaded file into untyped rows, dispatching on file type.
pub fn parse_file(path: &Path, file_type: FileType) -> Result<Vec<RawRow>, ImportError> {
    match file_type {
        FileType::Csv => parse_csv(path),
        FileType::Excel => parse_excel(path),
    }
}

fn parse_csv(path: &Path) -> Result<Vec<RawRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn parse_excel(path: &Path) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)??;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(|c| cell_text(c)).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for record in rows_iter {
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), cell_text(cell)))
            .filter(|(header, value)| !header.is_empty() && !value.is_empty())
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn field(row: &RawRow, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| row.get(*alias))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_manufactured_date(raw: &str) -> Option<NaiveDate> {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Validate and transform a single untyped row into a vehicle candidate.
pub fn validate_row(row: &RawRow) -> Result<NewVehicle, String> {
    let mut missing = Vec::new();

    let first_name = field(row, FIRST_NAME);
    let last_name = field(row, LAST_NAME);
    let email = field(row, EMAIL);
    let car_make = field(row, CAR_MAKE);
    let car_model = field(row, CAR_MODEL);
    let vin = field(row, VIN);
    let manufactured_date = field(row, MANUFACTURED_DATE);

    for (name, value) in [
        ("first_name", &first_name),
        ("last_name", &last_name),
        ("email", &email),
        ("car_make", &car_make),
        ("car_model", &car_model),
        ("vin", &vin),
        ("manufactured_date", &manufactured_date),
    ] {
        if value.is_none() {
            missing.push(name);
        }
    }

    if !missing.is_empty() {
        return Err(format!("missing required field(s): {}", missing.join(", ")));
    }

    let email = email.expect("presence checked above");
    if !email_regex().is_match(&email) {
        return Err(format!("invalid email address: {email}"));
    }

    let raw_date = manufactured_date.expect("presence checked above");
    let manufactured_date = parse_manufactured_date(&raw_date)
        .ok_or_else(|| format!("invalid manufactured date: {raw_date}"))?;

    Ok(NewVehicle {
        first_name: first_name.expect("presence checked above"),
        last_name: last_name.expect("presence checked above"),
        email,
        car_make: car_make.expect("presence checked above"),
        car_model: car_model.expect("presence checked above"),
        vin: vin.expect("presence checked above"),
        manufactured_date,
    })
}

/// Fold every row into (valid candidates, tagged errors), never aborting on
/// a single bad row. Row indices in error messages are 1-based.
pub fn collect_vehicles(rows: &[RawRow]) -> RowBatch {
    let mut batch = RowBatch::default();

    for (index, row) in rows.iter().enumerate() {
        match validate_row(row) {
            Ok(vehicle) => batch.vehicles.push(vehicle),
            Err(reason) => batch.errors.push(format!("Row {}: {}", index + 1, reason)),
        }
    }
    batch
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel parse error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("Workbook contains no worksheets")]
    NoWorksheet,
}
