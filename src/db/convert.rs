//! Format/conversion engine.
//!
//! Runs after label/format assignment. Every cell is converted to its
//! column's display type: `f` gets the text rendered through the column
//! pattern and `v` gets the wire representation of the raw value. Null
//! cells are left alone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::labels::GENERAL;
use super::pattern::{format_general, DatePattern, NumberPattern};
use super::table::{Cell, Column, ColumnType, ResultTable, Value};
use crate::error::{GqlError, Result};

const TRUE_WORDS: [&str; 4] = ["1", "true", "True", "TRUE"];
const FALSE_WORDS: [&str; 5] = ["0", "false", "False", "FALSE", ""];

const DEFAULT_DATE_PATTERN: &str = "yyyy/MM/dd";
const DEFAULT_TIME_PATTERN: &str = "H:mm:ss.SSS";
const DEFAULT_DATETIME_PATTERN: &str = "yyyy/MM/dd H:mm:ss.SSS";

/// Output switches from the query's `OPTIONS` clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub no_values: bool,
    pub no_format: bool,
}

/// Conversion compiled once per column.
#[derive(Debug)]
enum Conversion {
    Boolean { truthy: String, falsy: String },
    /// `None` renders with the locale default.
    Number(Option<NumberPattern>),
    String,
    Temporal {
        kind: ColumnType,
        pattern: DatePattern,
        from_text: bool,
    },
}

impl Conversion {
    fn for_column(col: &Column) -> Result<Self> {
        let general = col.pattern.is_empty() || col.pattern == GENERAL;
        match col.column_type {
            ColumnType::Boolean => {
                if general {
                    return Ok(Conversion::Boolean {
                        truthy: "TRUE".to_string(),
                        falsy: "FALSE".to_string(),
                    });
                }
                match col.pattern.split_once(':') {
                    Some((t, f)) => Ok(Conversion::Boolean {
                        truthy: t.to_string(),
                        falsy: f.to_string(),
                    }),
                    None => Err(GqlError::formatting(format!(
                        "pattern '{}' is not a valid boolean pattern",
                        col.pattern
                    ))),
                }
            }
            ColumnType::Number => {
                if general {
                    return Ok(Conversion::Number(None));
                }
                NumberPattern::parse(&col.pattern)
                    .map(|p| Conversion::Number(Some(p)))
                    .ok_or_else(|| {
                        GqlError::formatting(format!(
                            "pattern '{}' is not a valid number pattern",
                            col.pattern
                        ))
                    })
            }
            ColumnType::String => Ok(Conversion::String),
            kind => {
                let text = if general {
                    match kind {
                        ColumnType::Date => DEFAULT_DATE_PATTERN,
                        ColumnType::TimeOfDay => DEFAULT_TIME_PATTERN,
                        _ => DEFAULT_DATETIME_PATTERN,
                    }
                } else {
                    col.pattern.as_str()
                };
                let pattern = DatePattern::parse(text).ok_or_else(|| {
                    GqlError::formatting(format!("pattern '{}' is not a valid date pattern", text))
                })?;
                Ok(Conversion::Temporal {
                    kind,
                    pattern,
                    from_text: col.format == Some(ColumnType::String),
                })
            }
        }
    }

    fn apply(&self, cell: &mut Cell) -> Result<()> {
        let raw = match &cell.v {
            None | Some(Value::Null) => return Ok(()),
            Some(v) => v.clone(),
        };
        match self {
            Conversion::Boolean { truthy, falsy } => {
                let b = to_bool(&raw)?;
                cell.v = Some(Value::Bool(b));
                cell.f = Some(if b { truthy.clone() } else { falsy.clone() });
            }
            Conversion::Number(pattern) => {
                let (value, text) = format_number(&raw, pattern.as_ref())?;
                cell.v = Some(value);
                cell.f = Some(text);
            }
            Conversion::String => {
                cell.v = Some(Value::String(to_text(&raw)));
            }
            Conversion::Temporal {
                kind,
                pattern,
                from_text,
            } => {
                let dt = to_datetime(&raw, *from_text)?;
                cell.f = Some(pattern.format(&dt));
                cell.v = Some(temporal_value(*kind, &dt));
            }
        }
        Ok(())
    }
}

fn to_bool(raw: &Value) -> Result<bool> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        Value::UInt(u) => Ok(*u != 0),
        Value::Float(f) => Ok(*f != 0.0),
        Value::String(s) if TRUE_WORDS.contains(&s.as_str()) => Ok(true),
        Value::String(s) if FALSE_WORDS.contains(&s.as_str()) => Ok(false),
        other => Err(GqlError::formatting(format!(
            "cannot convert '{}' to a boolean",
            other.display()
        ))),
    }
}

fn format_float(value: f64, pattern: Option<&NumberPattern>) -> String {
    match pattern {
        Some(p) => p.format_f64(value),
        None => format_general(value),
    }
}

fn format_int(value: i64, pattern: Option<&NumberPattern>) -> String {
    match pattern {
        Some(p) => p.format_i64(value),
        None => NumberPattern::general().format_i64(value),
    }
}

/// Numeric raw value and its formatted text.
fn format_number(raw: &Value, pattern: Option<&NumberPattern>) -> Result<(Value, String)> {
    match raw {
        Value::Int(i) => Ok((raw.clone(), format_int(*i, pattern))),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Ok((raw.clone(), format_int(i, pattern))),
            Err(_) => Ok((raw.clone(), format_float(*u as f64, pattern))),
        },
        Value::Float(f) => Ok((raw.clone(), format_float(*f, pattern))),
        Value::Bool(b) => {
            let i = i64::from(*b);
            Ok((Value::Int(i), format_int(i, pattern)))
        }
        Value::String(s) => {
            let text = s.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Ok((Value::Int(i), format_int(i, pattern)));
            }
            match text.parse::<f64>() {
                Ok(f) => Ok((Value::Float(f), format_float(f, pattern))),
                Err(_) => Err(GqlError::formatting(format!(
                    "cannot convert '{}' to a number",
                    s
                ))),
            }
        }
        other => Err(GqlError::formatting(format!(
            "cannot convert '{}' to a number",
            other.display()
        ))),
    }
}

fn to_text(raw: &Value) -> String {
    match raw {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => NumberPattern::general().format_i64(*i),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => NumberPattern::general().format_i64(i),
            Err(_) => NumberPattern::general().format_f64(*u as f64),
        },
        Value::Float(f) => NumberPattern::general().format_f64(*f),
        other => other.display(),
    }
}

/// Sentinel for all-zero database dates.
fn min_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Times of day are anchored on the epoch date.
fn at_epoch(t: NaiveTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap_or_default()
        .and_time(t)
}

fn from_millis(ms: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.naive_utc())
        .ok_or_else(|| GqlError::formatting(format!("timestamp {} is out of range", ms)))
}

/// Parse the `Date(y,m,d[,h,mi,s,ms])` literal with a zero-based month.
fn parse_date_literal(text: &str) -> Option<NaiveDateTime> {
    let inner = text.strip_prefix("Date(")?.strip_suffix(')')?;
    let (year, rest) = inner.split_once(',')?;
    let year: i32 = year.trim().parse().ok()?;
    let parts: Vec<u32> = rest
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if parts.len() != 2 && parts.len() != 6 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, parts[0].checked_add(1)?, parts[1])?;
    if parts.len() == 2 {
        return Some(date.and_time(NaiveTime::MIN));
    }
    date.and_hms_milli_opt(parts[2], parts[3], parts[4], parts[5])
}

fn parse_db_datetime(text: &str) -> Result<NaiveDateTime> {
    let s = text.trim();
    if s.starts_with("0000-00-00") || s == "0000" {
        return Ok(min_datetime());
    }
    if let Some(dt) = parse_date_literal(s) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
        return Ok(at_epoch(t));
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Some(d) = s
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
        {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }
    Err(GqlError::formatting(format!(
        "cannot convert '{}' to a date",
        text
    )))
}

fn to_datetime(raw: &Value, from_text: bool) -> Result<NaiveDateTime> {
    match raw {
        Value::String(s) => {
            if !from_text {
                if let Ok(ms) = s.trim().parse::<f64>() {
                    return from_millis(ms.round() as i64);
                }
            }
            parse_db_datetime(s)
        }
        Value::Int(ms) => from_millis(*ms),
        Value::UInt(ms) => from_millis(i64::try_from(*ms).unwrap_or(i64::MAX)),
        Value::Float(ms) => from_millis(ms.round() as i64),
        Value::TimeOfDay([h, m, s, ms]) => NaiveTime::from_hms_milli_opt(*h, *m, *s, *ms)
            .map(at_epoch)
            .ok_or_else(|| {
                GqlError::formatting(format!("cannot convert '{}' to a time", raw.display()))
            }),
        other => Err(GqlError::formatting(format!(
            "cannot convert '{}' to a date",
            other.display()
        ))),
    }
}

fn temporal_value(kind: ColumnType, dt: &NaiveDateTime) -> Value {
    let millis = dt.nanosecond() / 1_000_000;
    match kind {
        ColumnType::TimeOfDay => {
            Value::TimeOfDay([dt.hour(), dt.minute(), dt.second(), millis.min(999)])
        }
        ColumnType::Date => Value::String(format!(
            "Date({},{},{})",
            dt.year(),
            dt.month0(),
            dt.day()
        )),
        _ => Value::String(format!(
            "Date({},{},{},{},{},{},{})",
            dt.year(),
            dt.month0(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            millis.min(999)
        )),
    }
}

/// Convert every cell of `table` to its column's display type.
pub fn apply_formats(table: &mut ResultTable, options: FormatOptions) -> Result<()> {
    table.check_shape()?;
    let ResultTable { cols, rows } = table;
    for (idx, col) in cols.iter().enumerate() {
        let conversion = Conversion::for_column(col)?;
        let is_string = col.column_type == ColumnType::String;
        for row in rows.iter_mut() {
            let cell = &mut row.c[idx];
            conversion.apply(cell)?;
            if options.no_values {
                let raw = cell.v.take();
                if is_string && cell.f.is_none() {
                    cell.f = raw.filter(|v| !v.is_null()).map(|v| v.display());
                }
            }
            if options.no_format {
                cell.f = None;
            }
        }
    }
    Ok(())
}

/// Drop formatted text from every cell.
pub fn strip_formatted(table: &mut ResultTable) {
    for row in &mut table.rows {
        for cell in &mut row.c {
            cell.f = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Reason;

    fn column(id: &str, display: ColumnType, native: ColumnType, pattern: &str) -> Column {
        let mut col = Column::new(id, display);
        col.pattern = pattern.to_string();
        if display != native || (!pattern.is_empty() && pattern != GENERAL) {
            col.format = Some(native);
        }
        col
    }

    fn single(col: Column, raw: Value) -> ResultTable {
        let mut t = ResultTable::new(vec![col]);
        t.push_row(vec![Cell::new(raw)]);
        t
    }

    fn convert(col: Column, raw: Value) -> Cell {
        let mut t = single(col, raw);
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        t.rows[0].c[0].clone()
    }

    #[test]
    fn test_boolean_conversion() {
        let col = column("b", ColumnType::Boolean, ColumnType::Boolean, GENERAL);
        let c = convert(col.clone(), Value::Bool(true));
        assert_eq!(c.v, Some(Value::Bool(true)));
        assert_eq!(c.f.as_deref(), Some("TRUE"));

        let col = column("b", ColumnType::Boolean, ColumnType::String, "Yes!:Not yet");
        assert_eq!(convert(col.clone(), "1".into()).f.as_deref(), Some("Yes!"));
        assert_eq!(convert(col.clone(), "FALSE".into()).f.as_deref(), Some("Not yet"));
        assert_eq!(convert(col.clone(), "".into()).v, Some(Value::Bool(false)));

        let mut t = single(col, "maybe".into());
        let err = apply_formats(&mut t, FormatOptions::default()).unwrap_err();
        assert_eq!(err.reason, Reason::IllegalFormattingPatterns);
    }

    #[test]
    fn test_time_pattern_on_boolean_column() {
        // a single colon classifies as boolean
        let col = column("b", ColumnType::Boolean, ColumnType::TimeOfDay, "HH:mm");
        let c = convert(col, Value::Bool(false));
        assert_eq!(c.f.as_deref(), Some("mm"));
    }

    #[test]
    fn test_boolean_pattern_without_colon() {
        let col = column("b", ColumnType::Boolean, ColumnType::Boolean, "dd-MM");
        let mut t = single(col, Value::Bool(true));
        let err = apply_formats(&mut t, FormatOptions::default()).unwrap_err();
        assert!(err.message.contains("not a valid boolean pattern"));
    }

    #[test]
    fn test_number_conversion() {
        let col = column("n", ColumnType::Number, ColumnType::Number, GENERAL);
        assert_eq!(convert(col.clone(), Value::Int(1234567)).f.as_deref(), Some("1,234,567"));
        assert_eq!(convert(col.clone(), Value::Float(0.5)).f.as_deref(), Some("0.5"));

        let col = column("n", ColumnType::Number, ColumnType::Number, "#,##0.00");
        let c = convert(col.clone(), Value::Float(1234.5));
        assert_eq!(c.v, Some(Value::Float(1234.5)));
        assert_eq!(c.f.as_deref(), Some("1,234.50"));

        let big = convert(col.clone(), Value::UInt(u64::MAX));
        assert_eq!(big.v, Some(Value::UInt(u64::MAX)));
        assert!(big.f.is_some());
    }

    #[test]
    fn test_number_from_string() {
        let col = column("n", ColumnType::Number, ColumnType::String, "0.0");
        let c = convert(col.clone(), "42".into());
        assert_eq!(c.v, Some(Value::Int(42)));
        assert_eq!(c.f.as_deref(), Some("42.0"));
        let c = convert(col.clone(), "2.25".into());
        assert_eq!(c.v, Some(Value::Float(2.25)));

        let mut t = single(col, "abc".into());
        assert!(apply_formats(&mut t, FormatOptions::default()).is_err());
    }

    #[test]
    fn test_string_conversion() {
        let col = column("s", ColumnType::String, ColumnType::String, GENERAL);
        assert_eq!(convert(col.clone(), Value::Bool(true)).v, Some("TRUE".into()));
        assert_eq!(convert(col.clone(), Value::Int(1500)).v, Some("1,500".into()));
        let c = convert(col, "Eng".into());
        assert_eq!(c.v, Some("Eng".into()));
        assert_eq!(c.f, None);
    }

    #[test]
    fn test_date_from_db_string() {
        let col = column("d", ColumnType::Date, ColumnType::String, "dd MMM yyyy");
        let c = convert(col, "2020-01-15".into());
        assert_eq!(c.v, Some("Date(2020,0,15)".into()));
        assert_eq!(c.f.as_deref(), Some("15 Jan 2020"));
    }

    #[test]
    fn test_default_patterns() {
        let col = column("d", ColumnType::Date, ColumnType::Date, GENERAL);
        let c = convert(col, "2021-03-04".into());
        assert_eq!(c.f.as_deref(), Some("2021/03/04"));

        let col = column("dt", ColumnType::DateTime, ColumnType::DateTime, GENERAL);
        let c = convert(col, "2021-03-04 05:06:07.089".into());
        assert_eq!(c.v, Some("Date(2021,2,4,5,6,7,89)".into()));
        assert_eq!(c.f.as_deref(), Some("2021/03/04 5:06:07.089"));

        let col = column("t", ColumnType::TimeOfDay, ColumnType::TimeOfDay, GENERAL);
        let c = convert(col, "13:05:00".into());
        assert_eq!(c.v, Some(Value::TimeOfDay([13, 5, 0, 0])));
        assert_eq!(c.f.as_deref(), Some("13:05:00.000"));
    }

    #[test]
    fn test_epoch_millis() {
        let col = column("d", ColumnType::DateTime, ColumnType::Number, "yyyy-MM-dd HH:mm");
        let c = convert(col, Value::Int(86_400_000 + 3_600_000));
        assert_eq!(c.v, Some("Date(1970,0,2,1,0,0,0)".into()));
        assert_eq!(c.f.as_deref(), Some("1970-01-02 01:00"));

        let col = column("t", ColumnType::TimeOfDay, ColumnType::TimeOfDay, GENERAL);
        let c = convert(col, Value::Int(45_296_789));
        assert_eq!(c.v, Some(Value::TimeOfDay([12, 34, 56, 789])));
    }

    #[test]
    fn test_zero_date_sentinel() {
        let col = column("d", ColumnType::Date, ColumnType::Date, GENERAL);
        let c = convert(col, "0000-00-00".into());
        assert_eq!(c.v, Some("Date(1,0,1)".into()));
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let col = column("d", ColumnType::DateTime, ColumnType::DateTime, "yyyy-MM-dd HH:mm:ss");
        let mut t = single(col, "2019-12-31 23:59:58".into());
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        let first = t.rows[0].c[0].clone();
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        assert_eq!(t.rows[0].c[0], first);

        let col = column("t", ColumnType::TimeOfDay, ColumnType::TimeOfDay, "HH:mm:ss");
        let mut t = single(col, Value::Int(3_723_000));
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        let first = t.rows[0].c[0].clone();
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        assert_eq!(t.rows[0].c[0], first);
    }

    #[test]
    fn test_date_literal_out_of_range_parts() {
        assert_eq!(
            parse_date_literal("Date(2020,1,29)"),
            NaiveDate::from_ymd_opt(2020, 2, 29).map(|d| d.and_time(NaiveTime::MIN))
        );
        assert_eq!(parse_date_literal("Date(2020,4294967295,1)"), None);
        assert_eq!(parse_date_literal("Date(4294967295,0,1)"), None);
        assert_eq!(parse_date_literal("Date(2020,0)"), None);

        let col = column("d", ColumnType::Date, ColumnType::Date, GENERAL);
        let mut t = single(col, "Date(2020,4294967295,1)".into());
        let err = apply_formats(&mut t, FormatOptions::default()).unwrap_err();
        assert_eq!(err.reason, Reason::IllegalFormattingPatterns);
    }

    #[test]
    fn test_nulls_untouched() {
        let col = column("n", ColumnType::Number, ColumnType::Number, "0.00");
        let mut t = ResultTable::new(vec![col]);
        t.push_row(vec![Cell::null()]);
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        assert_eq!(t.rows[0].c[0], Cell::null());
    }

    #[test]
    fn test_no_values_and_no_format() {
        let cols = vec![
            column("s", ColumnType::String, ColumnType::String, GENERAL),
            column("n", ColumnType::Number, ColumnType::Number, GENERAL),
        ];
        let mut t = ResultTable::new(cols.clone());
        t.push_row(vec![Cell::new("Eng"), Cell::new(5i64)]);
        apply_formats(
            &mut t,
            FormatOptions {
                no_values: true,
                no_format: false,
            },
        )
        .unwrap();
        assert_eq!(t.rows[0].c[0].v, None);
        assert_eq!(t.rows[0].c[0].f.as_deref(), Some("Eng"));
        assert_eq!(t.rows[0].c[1].v, None);
        assert_eq!(t.rows[0].c[1].f.as_deref(), Some("5"));

        let mut t = ResultTable::new(cols);
        t.push_row(vec![Cell::new("Eng"), Cell::new(5i64)]);
        apply_formats(
            &mut t,
            FormatOptions {
                no_values: false,
                no_format: true,
            },
        )
        .unwrap();
        assert_eq!(t.rows[0].c[1].v, Some(Value::Int(5)));
        assert_eq!(t.rows[0].c[1].f, None);
    }

    #[test]
    fn test_strip_formatted() {
        let col = column("n", ColumnType::Number, ColumnType::Number, GENERAL);
        let mut t = single(col, Value::Int(7));
        apply_formats(&mut t, FormatOptions::default()).unwrap();
        strip_formatted(&mut t);
        assert_eq!(t.rows[0].c[0].f, None);
        assert_eq!(t.rows[0].c[0].v, Some(Value::Int(7)));
    }
}
