//! The anomaly score attributed to one partition of a job result.
//!
//! A partition is a named dimension value (a specific host, a specific user)
//! that anomaly results are grouped by. The record carries four persisted
//! scalars plus one transient flag set by the normalization pass.

use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ResultsError;
use crate::stream::{Readable, StreamInput, StreamOutput, Writeable};

/// Object name used in parse errors.
pub const PARTITION_SCORE: &str = "partition_score";

/// Document field names.
pub mod fields {
    pub const PARTITION_FIELD_NAME: &str = "partition_field_name";
    pub const PARTITION_FIELD_VALUE: &str = "partition_field_value";
    pub const ANOMALY_SCORE: &str = "anomaly_score";
    pub const PROBABILITY: &str = "probability";
}

/// Anomaly score for a single partition.
///
/// Equality and hashing cover the four persisted fields only.
/// `had_big_normalised_update` is a runtime signal: it survives the binary
/// form but is never written to documents and never affects identity.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionScore {
    partition_field_name: String,
    partition_field_value: String,
    #[serde(serialize_with = "serialize_score")]
    anomaly_score: f64,
    #[serde(serialize_with = "serialize_score")]
    probability: f64,
    #[serde(skip)]
    had_big_normalised_update: bool,
}

impl PartitionScore {
    pub fn new(
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        anomaly_score: f64,
        probability: f64,
    ) -> Self {
        Self {
            partition_field_name: field_name.into(),
            partition_field_value: field_value.into(),
            anomaly_score,
            probability,
            had_big_normalised_update: false,
        }
    }

    /// Build a record from a parsed document.
    ///
    /// All four fields are required. Text fields must be strings; numeric
    /// fields may be numbers or strings holding a number. Unknown fields are
    /// ignored and the transient flag always starts out false.
    ///
    /// String coercion goes through `str::parse::<f64>`, so it also takes
    /// `inf`, `infinity` and `nan` in any case, on top of the `NaN`,
    /// `Infinity` and `-Infinity` spellings [`Self::to_document`] emits.
    pub fn from_document(doc: &Value) -> Result<Self, ResultsError> {
        let obj = doc.as_object().ok_or(ResultsError::NotAnObject {
            object: PARTITION_SCORE,
        })?;
        Ok(Self::new(
            required_str(obj, fields::PARTITION_FIELD_NAME)?,
            required_str(obj, fields::PARTITION_FIELD_VALUE)?,
            required_f64(obj, fields::ANOMALY_SCORE)?,
            required_f64(obj, fields::PROBABILITY)?,
        ))
    }

    pub fn from_json_str(s: &str) -> Result<Self, ResultsError> {
        let doc: Value = serde_json::from_str(s)?;
        Self::from_document(&doc)
    }

    /// Document form: the four persisted fields, in wire order.
    ///
    /// Non-finite scores have no JSON number form and come out as the strings
    /// `"NaN"`, `"Infinity"` and `"-Infinity"`, which [`Self::from_document`] reads back.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::with_capacity(4);
        obj.insert(
            fields::PARTITION_FIELD_NAME.to_string(),
            Value::from(self.partition_field_name.as_str()),
        );
        obj.insert(
            fields::PARTITION_FIELD_VALUE.to_string(),
            Value::from(self.partition_field_value.as_str()),
        );
        obj.insert(fields::ANOMALY_SCORE.to_string(), score_value(self.anomaly_score));
        obj.insert(fields::PROBABILITY.to_string(), score_value(self.probability));
        Value::Object(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ResultsError> {
        let mut out = StreamOutput::new(Vec::new());
        self.write_to(&mut out)?;
        Ok(out.into_inner())
    }

    /// Decode exactly one record; leftover input is an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ResultsError> {
        let mut input = StreamInput::new(bytes);
        let score = Self::read_from(&mut input)?;
        let rest = input.into_inner();
        if !rest.is_empty() {
            return Err(ResultsError::TrailingBytes(rest.len()));
        }
        Ok(score)
    }

    pub fn partition_field_name(&self) -> &str {
        &self.partition_field_name
    }

    pub fn set_partition_field_name(&mut self, name: impl Into<String>) {
        self.partition_field_name = name.into();
    }

    pub fn partition_field_value(&self) -> &str {
        &self.partition_field_value
    }

    pub fn set_partition_field_value(&mut self, value: impl Into<String>) {
        self.partition_field_value = value.into();
    }

    pub fn anomaly_score(&self) -> f64 {
        self.anomaly_score
    }

    pub fn set_anomaly_score(&mut self, anomaly_score: f64) {
        self.anomaly_score = anomaly_score;
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn set_probability(&mut self, probability: f64) {
        self.probability = probability;
    }

    pub fn had_big_normalised_update(&self) -> bool {
        self.had_big_normalised_update
    }

    pub fn raise_big_normalised_update_flag(&mut self) {
        self.had_big_normalised_update = true;
    }

    pub fn reset_big_normalised_update_flag(&mut self) {
        self.had_big_normalised_update = false;
    }
}

impl Writeable for PartitionScore {
    fn write_to<W: Write>(&self, out: &mut StreamOutput<W>) -> Result<(), ResultsError> {
        out.write_string(&self.partition_field_name)?;
        out.write_string(&self.partition_field_value)?;
        out.write_double(self.anomaly_score)?;
        out.write_double(self.probability)?;
        out.write_bool(self.had_big_normalised_update)
    }
}

impl Readable for PartitionScore {
    fn read_from<R: Read>(input: &mut StreamInput<R>) -> Result<Self, ResultsError> {
        let partition_field_name = input.read_string()?;
        let partition_field_value = input.read_string()?;
        let anomaly_score = input.read_double()?;
        let probability = input.read_double()?;
        let had_big_normalised_update = input.read_bool()?;
        debug!(
            partition_field_name = %partition_field_name,
            partition_field_value = %partition_field_value,
            had_big_normalised_update,
            "decoded partition score"
        );
        Ok(Self {
            partition_field_name,
            partition_field_value,
            anomaly_score,
            probability,
            had_big_normalised_update,
        })
    }
}

impl PartialEq for PartitionScore {
    fn eq(&self, other: &Self) -> bool {
        self.partition_field_name == other.partition_field_name
            && self.partition_field_value == other.partition_field_value
            && self.anomaly_score == other.anomaly_score
            && self.probability == other.probability
    }
}

impl Hash for PartitionScore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.partition_field_name.hash(state);
        self.partition_field_value.hash(state);
        canonical_bits(self.anomaly_score).hash(state);
        canonical_bits(self.probability).hash(state);
    }
}

fn non_finite_name(v: f64) -> Option<&'static str> {
    if v.is_nan() {
        Some("NaN")
    } else if v == f64::INFINITY {
        Some("Infinity")
    } else if v == f64::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

fn score_value(v: f64) -> Value {
    match non_finite_name(v) {
        Some(name) => Value::from(name),
        None => Value::from(v),
    }
}

fn serialize_score<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    match non_finite_name(*v) {
        Some(name) => serializer.serialize_str(name),
        None => serializer.serialize_f64(*v),
    }
}

/// `0.0 == -0.0`, so both must hash the same.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ResultsError> {
    obj.get(field).ok_or(ResultsError::MissingField {
        object: PARTITION_SCORE,
        field,
    })
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, ResultsError> {
    match required(obj, field)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(ResultsError::WrongType {
            object: PARTITION_SCORE,
            field,
            expected: "a string",
        }),
    }
}

fn required_f64(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ResultsError> {
    let value = match required(obj, field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.ok_or(ResultsError::WrongType {
        object: PARTITION_SCORE,
        field,
        expected: "a number",
    })
}
