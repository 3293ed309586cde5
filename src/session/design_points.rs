//! CSV files exchanged with the parameter manager.
//!
//! Two files go back and forth:
//!
//! - the design point index, written here and read by remote scripts:
//!   `ID,<var1>,<var2>,...` followed by one numbered row per variation
//! - the design point table exported by the workbench, read here: the
//!   column names sit on row 4 and data starts on row 8

use std::path::Path;

use tracing::info;

use crate::client::error::{BridgeError, BridgeResult};

/// Row holding the column names in an exported table.
pub const TABLE_HEADER_ROW: usize = 3;

/// First data row in an exported table.
pub const TABLE_FIRST_DATA_ROW: usize = 7;

/// One design point read back from an exported table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignPoint {
    /// `(column name, raw value)` pairs in column order.
    pub values: Vec<(String, String)>,
}

impl DesignPoint {
    /// Raw value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// Writes the design point index.
///
/// Rows are numbered from 1. When materials are given, the material of each
/// row is appended as `{name}` to that row's last field.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_design_point_index(
    path: &Path,
    variables: &[&str],
    rows: &[Vec<String>],
    materials: Option<&[String]>,
) -> BridgeResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| BridgeError::csv(path, e))?;

    let mut header = Vec::with_capacity(variables.len() + 1);
    header.push("ID".to_string());
    header.extend(variables.iter().map(|v| (*v).to_string()));
    writer
        .write_record(&header)
        .map_err(|e| BridgeError::csv(path, e))?;

    for (i, row) in rows.iter().enumerate() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push((i + 1).to_string());
        record.extend(row.iter().cloned());
        if let Some(material) = materials.and_then(|m| m.get(i)) {
            if let Some(last) = record.last_mut() {
                last.push('{');
                last.push_str(material);
                last.push('}');
            }
        }
        writer
            .write_record(&record)
            .map_err(|e| BridgeError::csv(path, e))?;
    }

    writer
        .flush()
        .map_err(|e| BridgeError::csv(path, csv::Error::from(e)))
}

/// Reads an exported design point table.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn read_design_point_table(path: &Path) -> BridgeResult<Vec<DesignPoint>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(b'|')
        .from_path(path)
        .map_err(|e| BridgeError::csv(path, e))?;

    let mut table: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BridgeError::csv(path, e))?;
        table.push(record.iter().map(str::to_string).collect());
    }

    let Some(header) = table.get(TABLE_HEADER_ROW) else {
        return Ok(Vec::new());
    };

    Ok(table
        .iter()
        .skip(TABLE_FIRST_DATA_ROW)
        .map(|row| DesignPoint {
            values: header
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })
        .collect())
}

/// Logs every design point as `name=value` lines.
pub fn log_design_points(points: &[DesignPoint]) {
    for point in points {
        info!("Updated table");
        for (name, value) in &point.values {
            info!("{name}={}", format_value(value));
        }
    }
}

/// Numbers in `1.23e+04` form, anything else unchanged.
#[must_use]
pub fn format_value(raw: &str) -> String {
    raw.trim()
        .parse::<f64>()
        .map_or_else(|_| raw.to_string(), format_scientific)
}

/// Two-decimal scientific notation with a signed, two-digit exponent.
#[must_use]
pub fn format_scientific(value: f64) -> String {
    let rendered = format!("{value:.2e}");
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return rendered;
    };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}
