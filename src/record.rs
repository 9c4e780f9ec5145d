use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture format version written in [`CaptureHeader::version`].
pub const CAPTURE_VERSION: u16 = 1;

/// A field whose source encoding is either a numeric code or free text
/// (action codes, side indicators).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    /// Textual form, as used for prefix matching.
    pub fn text(&self) -> String {
        self.to_string()
    }

    /// Integer form, if the value is an integer or text holding one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

/// One decoded record. Every source field is optional; `None` means the
/// decoder did not expose the field at all, which is distinct from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub action: Option<FieldValue>,
    pub order_id: Option<u64>,
    pub price: Option<i64>, // fixed-point, passed through unscaled
    pub size: Option<u32>,
    pub qty: Option<u32>,
    pub side: Option<FieldValue>,
    pub ts_event: Option<u64>,
    pub ts_recv: Option<u64>,
    pub new_price: Option<i64>,
    pub new_size: Option<u32>,
    pub fill_qty: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureHeader {
    pub version: u16,
    pub created_unix_ns: u128,
    pub dataset: String, // e.g. GLBX.MDP3
    pub schema: String,  // e.g. mbo
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureFrame {
    Header(CaptureHeader),
    Record(RawRecord),
}
