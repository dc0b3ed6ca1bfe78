//! Tabular codecs: CSV, JSON record lists and spreadsheets.
//!
//! Reading produces [`RawTable`]s (headers plus string cells) which
//! [`dataset_from_tables`] turns into a [`Dataset`]; writing renders a
//! dataset with its geocode columns appended.

use crate::domain::model::{
    Accuracy, Coordinates, Dataset, EnrichedRecord, GeocodeResult, ServiceRecord, COL_ACCURACY,
    COL_DISPLAY_NAME, COL_GROUP, COL_LATITUDE, COL_LONGITUDE, COL_POSTCODE, COL_SOURCE,
    COL_STATE, DEFAULT_PROVIDER, GEOCODE_COLUMNS, REQUIRED_COLUMNS,
};
use crate::utils::error::{GeocodeError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;
use std::path::Path;

pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xls", "xlsm", "xlsb", "ods"];

// Excel 工作表名稱上限
const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
    Workbook,
}

impl TableFormat {
    pub fn from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            ext if WORKBOOK_EXTENSIONS.contains(&ext) => Ok(TableFormat::Workbook),
            _ => Err(GeocodeError::UnsupportedFormat {
                path: path.to_string(),
            }),
        }
    }
}

/// Headers and rows of one sheet or file; `label` is the sheet name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub label: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    fn cell(&self, row: &[String], column: &str) -> Option<String> {
        let index = self.headers.iter().position(|h| h == column)?;
        row.get(index)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Read a table file, picking the codec from the extension.
///
/// For workbooks, a sheet named `combined_sheet` (written by a previous run)
/// is read alone; otherwise every sheet is read.
pub fn read_tables(path: &str, bytes: &[u8], combined_sheet: &str) -> Result<Vec<RawTable>> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => Ok(vec![read_csv(bytes)?]),
        TableFormat::Json => Ok(vec![read_json(bytes)?]),
        TableFormat::Workbook => read_workbook(bytes, combined_sheet),
    }
}

pub fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable {
        label: None,
        headers,
        rows,
    })
}

pub fn read_json(bytes: &[u8]) -> Result<RawTable> {
    let items: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(bytes)?;

    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        for key in item.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|header| match item.get(header) {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    Ok(RawTable {
        label: None,
        headers,
        rows,
    })
}

pub fn read_workbook(bytes: &[u8], combined_sheet: &str) -> Result<Vec<RawTable>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        return Err(GeocodeError::ProcessingError {
            message: "workbook contains no sheets".to_string(),
        });
    }

    let selected: Vec<String> = if sheet_names.iter().any(|s| s == combined_sheet) {
        vec![combined_sheet.to_string()]
    } else {
        sheet_names
    };

    let mut tables = Vec::with_capacity(selected.len());
    for sheet_name in selected {
        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell_to_string(cell).trim().to_string())
                .collect(),
            None => Vec::new(),
        };

        let rows = rows
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        tables.push(RawTable {
            label: Some(sheet_name),
            headers,
            rows,
        });
    }

    Ok(tables)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        // 郵遞區號常以 5006.0 之類的浮點數存放
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Build a dataset from raw tables.
///
/// Headers are matched case-insensitively against the known columns. Every
/// table must carry Name, Address, Suburb and Postcode. Existing geocode
/// columns are read back as checkpoint state; a row counts as resolved only
/// when both coordinates parse.
pub fn dataset_from_tables(source_name: &str, tables: Vec<RawTable>) -> Result<Dataset> {
    let mut dataset = Dataset::default();

    for mut table in tables {
        if table.headers.iter().all(|h| h.trim().is_empty())
            && table
                .rows
                .iter()
                .all(|row| row.iter().all(|cell| cell.trim().is_empty()))
        {
            tracing::debug!(
                "Skipping empty table: {}",
                table.label.as_deref().unwrap_or(source_name)
            );
            continue;
        }

        canonicalize_headers(&mut table.headers);

        for required in REQUIRED_COLUMNS {
            if !table.headers.iter().any(|h| h == required) {
                return Err(GeocodeError::MissingColumn {
                    source_name: match &table.label {
                        Some(label) => format!("{} [{}]", source_name, label),
                        None => source_name.to_string(),
                    },
                    column: required.to_string(),
                });
            }
        }

        for header in &table.headers {
            if !header.is_empty() && !GEOCODE_COLUMNS.contains(&header.as_str()) {
                dataset.ensure_column(header);
            }
        }
        if table.label.is_some() {
            dataset.ensure_column(COL_GROUP);
        }

        for (index, row) in table.rows.iter().enumerate() {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            if row.len() > table.headers.len() {
                tracing::debug!(
                    "Row {} of {} has {} cells but only {} headers, extra cells ignored",
                    index + 1,
                    table.label.as_deref().unwrap_or(source_name),
                    row.len(),
                    table.headers.len()
                );
            }

            let mut service = ServiceRecord::default();
            for (header, value) in table.headers.iter().zip(row) {
                if header.is_empty() || GEOCODE_COLUMNS.contains(&header.as_str()) {
                    continue;
                }
                service.set_field(header, value.trim().to_string());
            }
            if service.source_group.is_none() {
                service.source_group = table.label.clone();
            }

            let geocode = checkpoint_result(&table, row);
            dataset.records.push(EnrichedRecord { service, geocode });
        }
    }

    Ok(dataset)
}

fn canonicalize_headers(headers: &mut [String]) {
    let known = REQUIRED_COLUMNS
        .iter()
        .chain(&[COL_STATE, COL_GROUP])
        .chain(GEOCODE_COLUMNS.iter())
        .copied()
        .collect::<Vec<_>>();

    for header in headers.iter_mut() {
        if let Some(canonical) = known.iter().find(|k| k.eq_ignore_ascii_case(header)) {
            *header = canonical.to_string();
        }
    }
}

fn checkpoint_result(table: &RawTable, row: &[String]) -> Option<GeocodeResult> {
    let accuracy = table
        .cell(row, COL_ACCURACY)
        .and_then(|value| value.parse::<Accuracy>().ok());
    let latitude = table
        .cell(row, COL_LATITUDE)
        .and_then(|value| value.parse::<f64>().ok());
    let longitude = table
        .cell(row, COL_LONGITUDE)
        .and_then(|value| value.parse::<f64>().ok());

    let coordinates = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    if coordinates.is_none() && accuracy.is_none() {
        return None;
    }

    let accuracy = match (accuracy, coordinates.is_some()) {
        (Some(Accuracy::Failed | Accuracy::Error), true) | (None, true) => Accuracy::High,
        // 標記為已定位卻沒有座標
        (Some(Accuracy::High | Accuracy::ManualFix), false) => Accuracy::Error,
        (Some(accuracy), _) => accuracy,
        (None, false) => Accuracy::Error,
    };

    Some(GeocodeResult {
        coordinates,
        accuracy,
        source: table
            .cell(row, COL_SOURCE)
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        display_name: if coordinates.is_some() {
            table.cell(row, COL_DISPLAY_NAME)
        } else {
            None
        },
    })
}

/// 單一輸出儲存格
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCell {
    Empty,
    Text(String),
    Integer(u32),
    Float(f64),
}

impl OutputCell {
    fn to_text(&self) -> String {
        match self {
            OutputCell::Empty => String::new(),
            OutputCell::Text(s) => s.clone(),
            OutputCell::Integer(n) => n.to_string(),
            OutputCell::Float(f) => f.to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            OutputCell::Empty => serde_json::Value::Null,
            OutputCell::Text(s) => serde_json::Value::String(s.clone()),
            OutputCell::Integer(n) => serde_json::Value::from(*n),
            OutputCell::Float(f) => serde_json::Value::from(*f),
        }
    }
}

fn record_cells(columns: &[&str], record: &EnrichedRecord) -> Vec<OutputCell> {
    let geocode = record.geocode.as_ref();
    let coordinates = record.coordinates();

    columns
        .iter()
        .map(|column| match *column {
            COL_LATITUDE => coordinates
                .map(|c| OutputCell::Float(c.latitude))
                .unwrap_or(OutputCell::Empty),
            COL_LONGITUDE => coordinates
                .map(|c| OutputCell::Float(c.longitude))
                .unwrap_or(OutputCell::Empty),
            COL_ACCURACY => geocode
                .map(|g| OutputCell::Text(g.accuracy.to_string()))
                .unwrap_or(OutputCell::Empty),
            COL_SOURCE => geocode
                .map(|g| OutputCell::Text(g.source.clone()))
                .unwrap_or(OutputCell::Empty),
            COL_DISPLAY_NAME => geocode
                .and_then(|g| g.display_name.clone())
                .map(OutputCell::Text)
                .unwrap_or(OutputCell::Empty),
            COL_POSTCODE => match record.service.postcode.as_deref() {
                Some(raw) if raw.chars().all(|c| c.is_ascii_digit()) && !raw.starts_with('0') => {
                    raw.parse()
                        .map(OutputCell::Integer)
                        .unwrap_or_else(|_| OutputCell::Text(raw.to_string()))
                }
                Some(raw) => OutputCell::Text(raw.to_string()),
                None => OutputCell::Empty,
            },
            other => record
                .service
                .field(other)
                .map(|value| OutputCell::Text(value.into_owned()))
                .unwrap_or(OutputCell::Empty),
        })
        .collect()
}

pub fn write_csv(dataset: &Dataset) -> Result<Vec<u8>> {
    let columns = dataset.output_columns();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&columns)?;
    for record in &dataset.records {
        let cells = record_cells(&columns, record);
        writer.write_record(cells.iter().map(OutputCell::to_text))?;
    }

    writer
        .into_inner()
        .map_err(|e| GeocodeError::IoError(e.into_error()))
}

pub fn write_json(dataset: &Dataset) -> Result<Vec<u8>> {
    let columns = dataset.output_columns();

    let items: Vec<serde_json::Map<String, serde_json::Value>> = dataset
        .records
        .iter()
        .map(|record| {
            columns
                .iter()
                .zip(record_cells(&columns, record))
                .map(|(column, cell)| (column.to_string(), cell.to_json()))
                .collect()
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&items)?)
}

/// Write the dataset as an xlsx workbook: one combined sheet, then one
/// sheet per source group when `split_by_group` is set.
pub fn write_workbook(dataset: &Dataset, combined_sheet: &str, split_by_group: bool) -> Result<Vec<u8>> {
    let columns = dataset.output_columns();
    let mut workbook = Workbook::new();
    let mut used_names: Vec<String> = Vec::new();

    let all: Vec<&EnrichedRecord> = dataset.records.iter().collect();
    let name = unique_sheet_name(combined_sheet, &mut used_names);
    write_sheet(&mut workbook, &name, &columns, &all)?;

    if split_by_group {
        for group in dataset.groups() {
            let records: Vec<&EnrichedRecord> = dataset
                .records
                .iter()
                .filter(|r| r.service.source_group.as_deref() == Some(group))
                .collect();
            let name = unique_sheet_name(group, &mut used_names);
            write_sheet(&mut workbook, &name, &columns, &records)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    columns: &[&str],
    records: &[&EnrichedRecord],
) -> Result<()> {
    let worksheet = workbook.add_worksheet().set_name(name)?;

    for (col, header) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in record_cells(columns, record).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                OutputCell::Empty => {}
                OutputCell::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                OutputCell::Integer(n) => {
                    worksheet.write_number(row, col, n as f64)?;
                }
                OutputCell::Float(f) => {
                    worksheet.write_number(row, col, f)?;
                }
            }
        }
    }

    Ok(())
}

fn unique_sheet_name(raw: &str, used: &mut Vec<String>) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME_LEN).collect()
    };

    let mut candidate = base.clone();
    let mut suffix = 2;
    while used.iter().any(|u| u.eq_ignore_ascii_case(&candidate)) {
        let tail = format!("_{}", suffix);
        let keep = MAX_SHEET_NAME_LEN - tail.len();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), tail);
        suffix += 1;
    }

    used.push(candidate.clone());
    candidate
}
