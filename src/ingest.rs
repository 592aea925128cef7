//! Loading and shaping the two source collections.
//!
//! Shape problems (not an array, an element that is not an object) are fatal
//! and reported before any matching starts. Missing or mistyped fields are
//! not: they default to empty values, are logged, and are counted.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::errors::{MergeError, MergeResult};
use crate::models::{
    Fields, Ingested, MergedRecord, PrimaryRecord, SecondaryRecord, ANNOUNCEMENT_FIELD,
    IMAGES_FIELD, PRIMARY_COMPANY_FIELD, PRIMARY_PRODUCT_FIELD, PRIMARY_REASON_FIELD,
    SECONDARY_COMPANY_FIELD, SECONDARY_DETAILS_FIELD, SECONDARY_PRODUCT_FIELD,
    SECONDARY_REASON_FIELD, SECONDARY_URL_FIELD,
};

pub const PRIMARY_SOURCE: &str = "primary";
pub const SECONDARY_SOURCE: &str = "secondary";

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Field Extraction
// ============================================================================

/// Reads fields of one record, counting every field that had to be defaulted.
struct FieldReader<'a> {
    source_name: &'a str,
    position: usize,
    missing: usize,
}

impl<'a> FieldReader<'a> {
    fn new(source_name: &'a str, position: usize) -> Self {
        Self {
            source_name,
            position,
            missing: 0,
        }
    }

    fn report(&mut self, field: &str, problem: &str) {
        self.missing += 1;
        log::warn!(
            "{} record {}: field '{}' {}; using empty value",
            self.source_name,
            self.position,
            field,
            problem
        );
    }

    fn optional_string(&mut self, map: &Fields, field: &str) -> Option<String> {
        match map.get(field) {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => {
                self.report(field, "is missing");
                None
            }
            Some(other) => {
                self.report(field, &format!("is {}, expected a string", kind(other)));
                None
            }
        }
    }

    fn string(&mut self, map: &Fields, field: &str) -> String {
        self.optional_string(map, field).unwrap_or_default()
    }

    fn string_list(&mut self, map: &Fields, field: &str) -> Vec<String> {
        match map.get(field) {
            Some(Value::Array(items)) => {
                let mut strings = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) => strings.push(s.clone()),
                        other => self.report(
                            &format!("{field}[{i}]"),
                            &format!("is {}, expected a string", kind(other)),
                        ),
                    }
                }
                strings
            }
            None | Some(Value::Null) => {
                self.report(field, "is missing");
                Vec::new()
            }
            Some(other) => {
                self.report(field, &format!("is {}, expected an array", kind(other)));
                Vec::new()
            }
        }
    }
}

fn not_an_object(value: &Value, source_name: &str, position: usize) -> MergeError {
    MergeError::malformed(
        source_name,
        format!("element {} is {}, expected an object", position, kind(value)),
    )
}

fn into_object(value: Value, source_name: &str, position: usize) -> MergeResult<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(not_an_object(&other, source_name, position)),
    }
}

// ============================================================================
// Record Conversion
// ============================================================================

/// Convert source A elements. Every element must be an object; all of its
/// fields are kept for passthrough.
pub fn primary_records(values: Vec<Value>) -> MergeResult<Ingested<PrimaryRecord>> {
    let mut ingested = Ingested {
        records: Vec::with_capacity(values.len()),
        missing_fields: 0,
    };

    for (position, value) in values.into_iter().enumerate() {
        let fields = into_object(value, PRIMARY_SOURCE, position)?;
        let mut reader = FieldReader::new(PRIMARY_SOURCE, position);
        let record = PrimaryRecord {
            company: reader.string(&fields, PRIMARY_COMPANY_FIELD),
            product: reader.string(&fields, PRIMARY_PRODUCT_FIELD),
            reason: reader.string(&fields, PRIMARY_REASON_FIELD),
            fields,
        };
        ingested.missing_fields += reader.missing;
        ingested.records.push(record);
    }

    Ok(ingested)
}

/// Convert source B elements, reading the nested `product_details` mapping.
pub fn secondary_records(values: Vec<Value>) -> MergeResult<Ingested<SecondaryRecord>> {
    let mut ingested = Ingested {
        records: Vec::with_capacity(values.len()),
        missing_fields: 0,
    };

    for (position, value) in values.into_iter().enumerate() {
        let fields = into_object(value, SECONDARY_SOURCE, position)?;
        let mut reader = FieldReader::new(SECONDARY_SOURCE, position);

        let details = match fields.get(SECONDARY_DETAILS_FIELD) {
            Some(Value::Object(details)) => Some(details),
            None | Some(Value::Null) => {
                reader.report(SECONDARY_DETAILS_FIELD, "is missing");
                None
            }
            Some(other) => {
                reader.report(
                    SECONDARY_DETAILS_FIELD,
                    &format!("is {}, expected an object", kind(other)),
                );
                None
            }
        };

        let record = match details {
            Some(details) => SecondaryRecord {
                company: reader.string(details, SECONDARY_COMPANY_FIELD),
                product: reader.string(details, SECONDARY_PRODUCT_FIELD),
                reason: reader.string(details, SECONDARY_REASON_FIELD),
                ..Default::default()
            },
            None => SecondaryRecord::default(),
        };
        let record = SecondaryRecord {
            url: reader.optional_string(&fields, SECONDARY_URL_FIELD),
            announcement: reader.optional_string(&fields, ANNOUNCEMENT_FIELD),
            images: reader.string_list(&fields, IMAGES_FIELD),
            ..record
        };

        ingested.missing_fields += reader.missing;
        ingested.records.push(record);
    }

    Ok(ingested)
}

// ============================================================================
// Files
// ============================================================================

/// Read a file holding a JSON array and return its elements.
pub fn load_json_array(path: &Path, source_name: &str) -> MergeResult<Vec<Value>> {
    let text = fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| MergeError::malformed(source_name, format!("invalid JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(MergeError::malformed(
            source_name,
            format!("expected a JSON array, found {}", kind(&other)),
        )),
    }
}

/// Keep the first `limit` elements. Elements past the limit are still
/// shape-checked, so a malformed file fails with or without a limit.
fn limit_values(
    mut values: Vec<Value>,
    limit: Option<usize>,
    source_name: &str,
) -> MergeResult<Vec<Value>> {
    let Some(limit) = limit else {
        return Ok(values);
    };
    if let Some((position, value)) = values
        .iter()
        .enumerate()
        .skip(limit)
        .find(|(_, value)| !value.is_object())
    {
        return Err(not_an_object(value, source_name, position));
    }
    values.truncate(limit);
    Ok(values)
}

/// Load source A. Only the first `limit` records are converted, so missing
/// fields are reported for the records that will be matched.
pub fn load_primary(path: &Path, limit: Option<usize>) -> MergeResult<Ingested<PrimaryRecord>> {
    let values = load_json_array(path, PRIMARY_SOURCE)?;
    primary_records(limit_values(values, limit, PRIMARY_SOURCE)?)
}

pub fn load_secondary(
    path: &Path,
    limit: Option<usize>,
) -> MergeResult<Ingested<SecondaryRecord>> {
    let values = load_json_array(path, SECONDARY_SOURCE)?;
    secondary_records(limit_values(values, limit, SECONDARY_SOURCE)?)
}

/// Truncate a source to the configured record limit.
pub fn apply_limit<T>(records: &[T], limit: Option<usize>) -> &[T] {
    match limit {
        Some(limit) if limit < records.len() => &records[..limit],
        _ => records,
    }
}

/// Write merged records as a pretty-printed JSON array (4-space indent).
pub fn write_json_array(path: &Path, records: &[MergedRecord]) -> MergeResult<()> {
    let file = File::create(path).map_err(|e| MergeError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut serializer)?;
    writer.flush().map_err(|e| MergeError::io(path, e))?;
    Ok(())
}
