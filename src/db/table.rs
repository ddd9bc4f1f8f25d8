//! Result table model and its wire shape.
//!
//! The same types carry the raw table returned by a data source and the
//! final formatted table: assignment, pivoting and formatting all mutate a
//! [`ResultTable`] in place.

use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{GqlError, Reason, Result};

/// Protocol version reported in every response.
pub const WIRE_VERSION: &str = "0.7";

/// Display types. Data sources map native column types onto this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Boolean,
    Number,
    Date,
    TimeOfDay,
    DateTime,
}

impl ColumnType {
    /// Column index into the pattern decision table.
    pub fn index(&self) -> usize {
        match self {
            ColumnType::String => 0,
            ColumnType::Boolean => 1,
            ColumnType::Number => 2,
            ColumnType::Date => 3,
            ColumnType::TimeOfDay => 4,
            ColumnType::DateTime => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::TimeOfDay => "timeofday",
            ColumnType::DateTime => "datetime",
        }
    }
}

/// Raw cell value.
///
/// Dates and datetimes arrive either as database strings or as epoch
/// milliseconds; times of day as milliseconds since midnight. After
/// formatting they become `Date(...)` strings and `[h, m, s, ms]` tuples.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    TimeOfDay([u32; 4]),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Plain text rendering used when a cell has no formatted value.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::TimeOfDay(t) => format!("[{},{},{},{}]", t[0], t[1], t[2], t[3]),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::TimeOfDay(parts) => {
                let mut seq = serializer.serialize_seq(Some(parts.len()))?;
                for p in parts {
                    seq.serialize_element(p)?;
                }
                seq.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// A cell: raw value `v` and formatted text `f`, either of which may be
/// absent on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Cell {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
}

impl Cell {
    pub fn new(v: impl Into<Value>) -> Self {
        Self {
            v: Some(v.into()),
            f: None,
        }
    }

    pub fn null() -> Self {
        Self {
            v: Some(Value::Null),
            f: None,
        }
    }

    /// Formatted text if present, else the raw value's text.
    pub fn text(&self) -> String {
        match (&self.f, &self.v) {
            (Some(f), _) => f.clone(),
            (None, Some(v)) => v.display(),
            (None, None) => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.v.as_ref().map_or(true, Value::is_null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    /// Native type of the data once a pattern resolved a different display
    /// type.
    #[serde(skip)]
    pub format: Option<ColumnType>,
}

impl Column {
    pub fn new(id: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            column_type,
            pattern: String::new(),
            format: None,
        }
    }

    /// Label if set, else the id.
    pub fn title(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Row {
    pub c: Vec<Cell>,
}

impl Row {
    pub fn new(c: Vec<Cell>) -> Self {
        Self { c }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResultTable {
    pub cols: Vec<Column>,
    pub rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(cols: Vec<Column>) -> Self {
        Self {
            cols,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(Row::new(cells));
    }

    /// Every row must have exactly one cell per column.
    pub fn check_shape(&self) -> Result<()> {
        let width = self.cols.len();
        match self.rows.iter().position(|r| r.c.len() != width) {
            Some(i) => Err(GqlError::internal(format!(
                "row {} has {} cells but the table has {} columns",
                i,
                self.rows[i].c.len(),
                width
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub reason: Reason,
    pub message: String,
}

/// Response envelope handed to the serializers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub version: String,
    #[serde(rename = "reqId", skip_serializing_if = "Option::is_none")]
    pub req_id: Option<i64>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<ResultTable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

impl Response {
    pub fn ok(table: ResultTable) -> Self {
        Self {
            version: WIRE_VERSION.to_string(),
            req_id: None,
            status: Status::Ok,
            table: Some(table),
            errors: Vec::new(),
        }
    }

    pub fn error(err: &GqlError) -> Self {
        Self {
            version: WIRE_VERSION.to_string(),
            req_id: None,
            status: Status::Error,
            table: None,
            errors: vec![ErrorEntry {
                reason: err.reason,
                message: err.message.clone(),
            }],
        }
    }

    pub fn with_req_id(mut self, req_id: Option<i64>) -> Self {
        self.req_id = req_id;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
