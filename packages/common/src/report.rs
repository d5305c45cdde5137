//! Fixed-layout PDF summary report for one upload.
//!
//! Rendering is split in two: [`ReportLayout::build`] decides what text goes
//! where, [`ReportLayout::to_pdf`] paints it onto a single US-Letter page. Both
//! steps are deterministic, so the same upload always produces the same bytes.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

use crate::equipment::EquipmentRow;
use crate::stats::UploadStats;

/// Timestamp format used in the report and in upload history listings.
pub const DATE_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Only the first rows of an upload are printed.
pub const MAX_TABLE_ROWS: usize = 10;

pub const TABLE_HEADER: [&str; 5] = [
    "Equipment Name",
    "Type",
    "Flowrate",
    "Pressure",
    "Temperature",
];

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 54;
const COLUMN_WIDTHS: [i64; 5] = [160, 120, 76, 74, 74];
const ROW_HEIGHT: i64 = 20;
const CELL_PADDING: i64 = 6;
/// Approximate Helvetica glyph budget per column at body size.
const COLUMN_CHARS: [usize; 5] = [28, 21, 12, 12, 12];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode report PDF: {0}")]
    Pdf(String),
}

/// The stored summary fields a report prints.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub upload_id: i32,
    pub created_at: DateTime<Utc>,
    pub stats: UploadStats,
}

/// Text content of a report, positioned by [`ReportLayout::to_pdf`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub summary: Vec<String>,
    pub rows: Vec<[String; 5]>,
}

pub fn format_average(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}

impl ReportLayout {
    /// Lay out the title, summary block and the first [`MAX_TABLE_ROWS`] records.
    ///
    /// `records` must already be in stored order.
    pub fn build(summary: &ReportSummary, records: &[EquipmentRow]) -> Self {
        let stats = &summary.stats;
        let rows = records
            .iter()
            .take(MAX_TABLE_ROWS)
            .map(|r| {
                [
                    r.equipment_name.clone(),
                    r.eq_type.clone(),
                    format!("{:.2}", r.flowrate),
                    format!("{:.2}", r.pressure),
                    format!("{:.2}", r.temperature),
                ]
            })
            .collect();

        Self {
            title: format!("Chemical Equipment Report - Upload #{}", summary.upload_id),
            summary: vec![
                format!("Date: {}", summary.created_at.format(DATE_FORMAT)),
                format!("Total Equipment: {}", stats.total_count),
                format!("Average Flowrate: {}", format_average(stats.avg_flowrate)),
                format!("Average Pressure: {}", format_average(stats.avg_pressure)),
                format!(
                    "Average Temperature: {}",
                    format_average(stats.avg_temperature)
                ),
            ],
            rows,
        }
    }

    /// Encode the layout as a one-page PDF.
    pub fn to_pdf(&self) -> Result<Vec<u8>, ReportError> {
        let mut ops = Vec::new();
        let mut y = PAGE_HEIGHT - 72;

        text(&mut ops, "F2", 18, MARGIN, y, &self.title, usize::MAX);
        y -= 40;

        text(&mut ops, "F2", 12, MARGIN, y, "Summary Statistics:", usize::MAX);
        for line in &self.summary {
            y -= 16;
            text(&mut ops, "F1", 11, MARGIN, y, line, usize::MAX);
        }
        y -= 36;

        let header: Vec<String> = TABLE_HEADER.iter().map(|h| h.to_string()).collect();
        table_row(&mut ops, y, &header, true);
        for row in &self.rows {
            y -= ROW_HEIGHT;
            table_row(&mut ops, y, row, false);
        }

        encode_page(ops)
    }
}

/// Paint one table row whose bottom edge sits at `y`.
fn table_row(ops: &mut Vec<Operation>, y: i64, cells: &[String], header: bool) {
    let table_width: i64 = COLUMN_WIDTHS.iter().sum();

    // Background band: grey header, beige body.
    if header {
        ops.push(op("rg", vec![Object::Real(0.5), Object::Real(0.5), Object::Real(0.5)]));
    } else {
        ops.push(op("rg", vec![Object::Real(0.96), Object::Real(0.96), Object::Real(0.86)]));
    }
    ops.push(op("re", ints([MARGIN, y, table_width, ROW_HEIGHT])));
    ops.push(op("f", vec![]));

    // Grid.
    ops.push(op("RG", ints([0, 0, 0])));
    ops.push(op("w", ints([1])));
    let mut x = MARGIN;
    for width in COLUMN_WIDTHS {
        ops.push(op("re", ints([x, y, width, ROW_HEIGHT])));
        ops.push(op("S", vec![]));
        x += width;
    }

    // Cell text: whitesmoke bold for the header, black regular for the body.
    if header {
        ops.push(op("rg", vec![Object::Real(0.96), Object::Real(0.96), Object::Real(0.96)]));
    } else {
        ops.push(op("rg", ints([0, 0, 0])));
    }
    let (font, size) = if header { ("F2", 11) } else { ("F1", 10) };
    let mut x = MARGIN;
    for ((cell, width), max_chars) in cells.iter().zip(COLUMN_WIDTHS).zip(COLUMN_CHARS) {
        text(ops, font, size, x + CELL_PADDING, y + 6, cell, max_chars);
        x += width;
    }
    ops.push(op("rg", ints([0, 0, 0])));
}

fn text(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, s: &str, max_chars: usize) {
    ops.push(op("BT", vec![]));
    ops.push(op("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)]));
    ops.push(op("Td", ints([x, y])));
    ops.push(op("Tj", vec![Object::string_literal(pdf_text(s, max_chars))]));
    ops.push(op("ET", vec![]));
}

/// Standard Type1 fonts only cover ASCII reliably; anything else becomes `?`.
fn pdf_text(s: &str, max_chars: usize) -> String {
    let ascii: String = s
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect();
    if ascii.len() <= max_chars {
        ascii
    } else {
        let keep = max_chars.saturating_sub(3);
        format!("{}...", &ascii[..keep])
    }
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn ints<const N: usize>(values: [i64; N]) -> Vec<Object> {
    values.into_iter().map(Object::Integer).collect()
}

fn encode_page(operations: Vec<Operation>) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let content = Content { operations }
        .encode()
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(buf)
}
