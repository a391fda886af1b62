//! Serialization of feature definitions and per-item values.
//!
//! Every writer takes the descriptors in column order and one [`Record`] per
//! item whose values line up with them. Absent values are written as the
//! format's missing marker (`?` in ARFF, empty in CSV, `null` in JSON, and
//! left out of ACE XML).

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::FeatureDescriptor;
use crate::error::CoreError;

/// File format of the values output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ACE XML feature vector file (definitions go to a second file).
    #[default]
    Ace,
    /// Weka ARFF.
    Arff,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ace" | "xml" => Ok(Self::Ace),
            "arff" => Ok(Self::Arff),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(CoreError::config(format!(
                "unknown output format '{other}' (expected ace, arff, csv or json)"
            ))),
        }
    }
}

/// Values of one item, aligned with the descriptors they are written with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub values: Vec<Option<Vec<f64>>>,
}

/// Scientific notation with four decimals, as used by ACE XML and ARFF.
///
/// # Example
/// ```
/// use mf_core::export::format_value;
/// assert_eq!(format_value(1234.5), "1.2345E3");
/// assert_eq!(format_value(0.0), "0.0000E0");
/// ```
#[must_use]
pub fn format_value(v: f64) -> String {
    format!("{v:.4E}")
}

/// Checks that `path` may be written before any work is done.
///
/// # Errors
/// Returns [`CoreError::Configuration`] if the path is empty, names a
/// directory, sits in a missing directory, or exists while `overwrite` is off.
pub fn verify_can_save(path: &Path, overwrite: bool) -> Result<(), CoreError> {
    if path.as_os_str().is_empty() {
        return Err(CoreError::config("no output path given"));
    }
    if path.is_dir() {
        return Err(CoreError::config(format!(
            "output path {} is a directory",
            path.display()
        )));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.is_dir()
    {
        return Err(CoreError::config(format!(
            "output directory {} does not exist",
            parent.display()
        )));
    }
    if path.exists() && !overwrite {
        return Err(CoreError::config(format!(
            "{} already exists and overwriting is disabled",
            path.display()
        )));
    }
    Ok(())
}

/// Writes the ACE XML feature key file.
///
/// # Errors
/// Returns any I/O error from `out`.
pub fn write_ace_definitions<W: Write>(out: &mut W, descriptors: &[FeatureDescriptor]) -> Result<()> {
    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(out, "<!DOCTYPE feature_key_file [")?;
    writeln!(out, "   <!ELEMENT feature_key_file (comments, feature+)>")?;
    writeln!(out, "   <!ELEMENT comments (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT feature (name, description?, is_sequential, parallel_dimensions)>")?;
    writeln!(out, "   <!ELEMENT name (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT description (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT is_sequential (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT parallel_dimensions (#PCDATA)>")?;
    writeln!(out, "]>")?;
    writeln!(out)?;
    writeln!(out, "<feature_key_file>")?;
    writeln!(out)?;
    writeln!(out, "   <comments></comments>")?;
    writeln!(out)?;
    for d in descriptors {
        writeln!(out, "   <feature>")?;
        writeln!(out, "      <name>{}</name>", xml_escape(&d.name))?;
        writeln!(out, "      <description>{}</description>", xml_escape(&d.description))?;
        writeln!(out, "      <is_sequential>{}</is_sequential>", d.is_sequential)?;
        writeln!(out, "      <parallel_dimensions>{}</parallel_dimensions>", d.dimensions)?;
        writeln!(out, "   </feature>")?;
        writeln!(out)?;
    }
    writeln!(out, "</feature_key_file>")?;
    Ok(())
}

/// Writes the ACE XML feature vector file.
///
/// # Errors
/// Returns any I/O error from `out`.
pub fn write_ace_values<W: Write>(
    out: &mut W,
    descriptors: &[FeatureDescriptor],
    records: &[Record],
) -> Result<()> {
    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(out, "<!DOCTYPE feature_vector_file [")?;
    writeln!(out, "   <!ELEMENT feature_vector_file (comments, data_set+)>")?;
    writeln!(out, "   <!ELEMENT comments (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT data_set (data_set_id, section*, feature*)>")?;
    writeln!(out, "   <!ELEMENT data_set_id (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT section (feature+)>")?;
    writeln!(out, "   <!ATTLIST section start CDATA \"\" stop CDATA \"\">")?;
    writeln!(out, "   <!ELEMENT feature (name, v+)>")?;
    writeln!(out, "   <!ELEMENT name (#PCDATA)>")?;
    writeln!(out, "   <!ELEMENT v (#PCDATA)>")?;
    writeln!(out, "]>")?;
    writeln!(out)?;
    writeln!(out, "<feature_vector_file>")?;
    writeln!(out)?;
    writeln!(out, "   <comments></comments>")?;
    writeln!(out)?;
    for record in records {
        writeln!(out, "   <data_set>")?;
        writeln!(out, "      <data_set_id>{}</data_set_id>", xml_escape(&record.id))?;
        for (d, value) in descriptors.iter().zip(&record.values) {
            let Some(value) = value else { continue };
            writeln!(out, "      <feature>")?;
            writeln!(out, "         <name>{}</name>", xml_escape(&d.name))?;
            for v in value {
                writeln!(out, "         <v>{}</v>", format_value(*v))?;
            }
            writeln!(out, "      </feature>")?;
        }
        writeln!(out, "   </data_set>")?;
        writeln!(out)?;
    }
    writeln!(out, "</feature_vector_file>")?;
    Ok(())
}

/// Writes a Weka ARFF file with one string identifier attribute followed by
/// one numeric attribute per feature dimension.
///
/// # Errors
/// Returns any I/O error from `out`.
pub fn write_arff<W: Write>(
    out: &mut W,
    relation: &str,
    descriptors: &[FeatureDescriptor],
    records: &[Record],
) -> Result<()> {
    let widths = column_widths(descriptors, records);
    writeln!(out, "@RELATION {}", arff_quote(relation))?;
    writeln!(out)?;
    writeln!(out, "@ATTRIBUTE identifier STRING")?;
    for name in attribute_names(descriptors, &widths) {
        writeln!(out, "@ATTRIBUTE {} NUMERIC", arff_quote(&name))?;
    }
    writeln!(out)?;
    writeln!(out, "@DATA")?;
    for record in records {
        let mut line = arff_quote(&record.id);
        for (value, &width) in record.values.iter().zip(&widths) {
            for d in 0..width {
                line.push(',');
                match value.as_ref().and_then(|v| v.get(d)) {
                    Some(v) => line.push_str(&format_value(*v)),
                    None => line.push('?'),
                }
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Writes a CSV table, one row per item, absent values left empty.
///
/// # Errors
/// Returns any I/O error from `out`.
pub fn write_csv<W: Write>(
    out: &mut W,
    descriptors: &[FeatureDescriptor],
    records: &[Record],
) -> Result<()> {
    let widths = column_widths(descriptors, records);
    let mut header = String::from("identifier");
    for name in attribute_names(descriptors, &widths) {
        header.push(',');
        header.push_str(&csv_field(&name));
    }
    writeln!(out, "{header}")?;
    for record in records {
        let mut line = csv_field(&record.id);
        for (value, &width) in record.values.iter().zip(&widths) {
            for d in 0..width {
                line.push(',');
                if let Some(v) = value.as_ref().and_then(|v| v.get(d)) {
                    let _ = write!(line, "{v}");
                }
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    features: &'a [FeatureDescriptor],
    items: Vec<JsonItem<'a>>,
}

#[derive(Serialize)]
struct JsonItem<'a> {
    id: &'a str,
    values: Vec<JsonValue<'a>>,
}

#[derive(Serialize)]
struct JsonValue<'a> {
    feature: &'a str,
    value: Option<&'a [f64]>,
}

/// Writes definitions and values as one pretty-printed JSON document.
///
/// # Errors
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(
    out: &mut W,
    descriptors: &[FeatureDescriptor],
    records: &[Record],
) -> Result<()> {
    let doc = JsonDocument {
        features: descriptors,
        items: records
            .iter()
            .map(|r| JsonItem {
                id: &r.id,
                values: descriptors
                    .iter()
                    .zip(&r.values)
                    .map(|(d, v)| JsonValue {
                        feature: &d.name,
                        value: v.as_deref(),
                    })
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &doc).context("JSON serialization failed")?;
    writeln!(out)?;
    Ok(())
}

/// Writes `records` to `path` in `format`. For ACE XML this is the values
/// file only; see [`write_ace_definitions`].
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn save_records(
    path: &Path,
    format: OutputFormat,
    relation: &str,
    descriptors: &[FeatureDescriptor],
    records: &[Record],
) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    match format {
        OutputFormat::Ace => write_ace_values(&mut out, descriptors, records)?,
        OutputFormat::Arff => write_arff(&mut out, relation, descriptors, records)?,
        OutputFormat::Csv => write_csv(&mut out, descriptors, records)?,
        OutputFormat::Json => write_json(&mut out, descriptors, records)?,
    }
    out.flush()
        .with_context(|| format!("Cannot write {}", path.display()))?;
    log::info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Writes the ACE XML definitions of `descriptors` to `path`.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn save_definitions(path: &Path, descriptors: &[FeatureDescriptor]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    write_ace_definitions(&mut out, descriptors)?;
    out.flush()
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

/// Output width of each column: the declared dimensions, or for variable
/// features the widest value seen (at least 1).
fn column_widths(descriptors: &[FeatureDescriptor], records: &[Record]) -> Vec<usize> {
    descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| {
            if d.dimensions > 0 {
                return d.dimensions;
            }
            records
                .iter()
                .filter_map(|r| r.values.get(i).and_then(Option::as_ref))
                .map(Vec::len)
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect()
}

fn attribute_names(descriptors: &[FeatureDescriptor], widths: &[usize]) -> Vec<String> {
    descriptors
        .iter()
        .zip(widths)
        .flat_map(|(d, &w)| {
            (0..w).map(move |i| {
                if w == 1 {
                    d.name.clone()
                } else {
                    format!("{}{i}", d.name)
                }
            })
        })
        .collect()
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn arff_quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
