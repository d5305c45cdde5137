use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fields every equipment file must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "equipment_name",
    "type",
    "flowrate",
    "pressure",
    "temperature",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One equipment measurement parsed from an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EquipmentRow {
    #[schema(example = "Pump-1")]
    pub equipment_name: String,
    #[serde(rename = "type")]
    #[schema(example = "Pump")]
    pub eq_type: String,
    #[schema(example = 120.5)]
    pub flowrate: f64,
    #[schema(example = 5.2)]
    pub pressure: f64,
    #[schema(example = 110.0)]
    pub temperature: f64,
}

/// Reasons an uploaded file is rejected. Any of these rejects the whole file.
#[derive(Debug, Error)]
pub enum MalformedInput {
    #[error("file is not valid UTF-8 text")]
    NotUtf8,

    #[error("file is empty: expected a header row")]
    MissingHeader,

    #[error("unreadable tabular data: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(&'static str),

    #[error("row {row}: {column} value {value:?} is not a finite number")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Positions of the required fields within the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    name: usize,
    eq_type: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, MalformedInput> {
        let mut slots: [Option<usize>; 5] = [None; 5];

        for (idx, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header);
            if let Some(pos) = REQUIRED_COLUMNS.iter().position(|c| *c == normalized) {
                if slots[pos].is_some() {
                    return Err(MalformedInput::DuplicateColumn(REQUIRED_COLUMNS[pos]));
                }
                slots[pos] = Some(idx);
            }
        }

        match slots {
            [
                Some(name),
                Some(eq_type),
                Some(flowrate),
                Some(pressure),
                Some(temperature),
            ] => Ok(Self {
                name,
                eq_type,
                flowrate,
                pressure,
                temperature,
            }),
            _ => Err(MalformedInput::MissingColumns(
                REQUIRED_COLUMNS
                    .iter()
                    .zip(slots.iter())
                    .filter(|(_, slot)| slot.is_none())
                    .map(|(name, _)| *name)
                    .collect(),
            )),
        }
    }
}

/// `Equipment Name`, `equipment-name` and `EQUIPMENT_NAME` all map to `equipment_name`.
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn parse_number(
    record: &StringRecord,
    idx: usize,
    row: usize,
    column: &'static str,
) -> Result<f64, MalformedInput> {
    let raw = record.get(idx).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(MalformedInput::InvalidNumber {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}

/// Parse an uploaded equipment CSV into typed rows.
///
/// The header is validated once against [`REQUIRED_COLUMNS`]; extra columns are
/// ignored and column order is free. Every data row must have the same number of
/// fields as the header and finite numeric values, otherwise the whole file is
/// rejected.
pub fn parse_equipment_csv(bytes: &[u8]) -> Result<Vec<EquipmentRow>, MalformedInput> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let content = std::str::from_utf8(bytes).map_err(|_| MalformedInput::NotUtf8)?;

    if content.trim().is_empty() {
        return Err(MalformedInput::MissingHeader);
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(false)
        .from_reader(content.as_bytes());

    let columns = ColumnMap::resolve(reader.headers()?)?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let row = index + 1;

        rows.push(EquipmentRow {
            equipment_name: record.get(columns.name).unwrap_or("").to_string(),
            eq_type: record.get(columns.eq_type).unwrap_or("").to_string(),
            flowrate: parse_number(&record, columns.flowrate, row, "flowrate")?,
            pressure: parse_number(&record, columns.pressure, row, "pressure")?,
            temperature: parse_number(&record, columns.temperature, row, "temperature")?,
        });
    }

    tracing::debug!(rows = rows.len(), "Parsed equipment file");
    Ok(rows)
}
