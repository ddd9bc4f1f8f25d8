//! Locale-style display patterns.
//!
//! [`NumberPattern`] understands decimal patterns such as `#,##0.00`,
//! `0.###`, `0%` or `#,##0;(#,##0)`. [`DatePattern`] understands the usual
//! date/time field letters (`yyyy`, `MMM`, `dd`, `H`, `mm`, `ss`, `SSS`,
//! `EEEE`, `a`, ...) with `'quoted'` literal text. Symbols are en-US and
//! times are rendered in UTC.

use chrono::{Datelike, NaiveDateTime, Timelike};

/// Field letters that make a pattern carry date information.
pub const DATE_FIELD_CHARS: &str = "GyYuQMdEeDFwWgqLc";
/// Field letters that make a pattern carry time-of-day information.
pub const TIME_FIELD_CHARS: &str = "hHmsSakKAzZvV";

pub fn has_date_fields(pattern: &str) -> bool {
    pattern.chars().any(|c| DATE_FIELD_CHARS.contains(c))
}

pub fn has_time_fields(pattern: &str) -> bool {
    pattern.chars().any(|c| TIME_FIELD_CHARS.contains(c))
}

/// Split at the first unquoted `;`.
fn split_subpatterns(pattern: &str) -> (&str, Option<&str>) {
    let mut quoted = false;
    for (i, c) in pattern.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ';' if !quoted => return (&pattern[..i], Some(&pattern[i + 1..])),
            _ => {}
        }
    }
    (pattern, None)
}

#[derive(Debug, Default)]
struct Subpattern {
    prefix: String,
    number: String,
    suffix: String,
    multiplier: u32,
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '#' | ',' | '.')
}

fn parse_subpattern(text: &str) -> Option<Subpattern> {
    let chars: Vec<char> = text.chars().collect();
    let mut sub = Subpattern {
        multiplier: 1,
        ..Default::default()
    };
    // 0: prefix, 1: number, 2: suffix
    let mut stage = 0;
    let mut quoted = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            if stage == 1 {
                stage = 2;
            }
            if chars.get(i + 1) == Some(&'\'') {
                let affix = if stage == 0 { &mut sub.prefix } else { &mut sub.suffix };
                affix.push('\'');
                i += 2;
                continue;
            }
            quoted = !quoted;
            i += 1;
            continue;
        }

        if !quoted && is_number_char(c) {
            match stage {
                0 => stage = 1,
                1 => {}
                _ => return None,
            }
            sub.number.push(c);
        } else {
            if stage == 1 {
                stage = 2;
            }
            let affix = if stage == 0 { &mut sub.prefix } else { &mut sub.suffix };
            match c {
                '%' if !quoted => {
                    sub.multiplier = 100;
                    affix.push('%');
                }
                '\u{2030}' if !quoted => {
                    sub.multiplier = 1000;
                    affix.push(c);
                }
                '\u{a4}' if !quoted => affix.push('$'),
                _ => affix.push(c),
            }
        }
        i += 1;
    }

    if quoted {
        return None;
    }
    Some(sub)
}

/// Compiled decimal pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberPattern {
    pos_prefix: String,
    pos_suffix: String,
    neg_prefix: String,
    neg_suffix: String,
    min_int: usize,
    min_frac: usize,
    max_frac: usize,
    grouping: usize,
    multiplier: u32,
}

impl NumberPattern {
    /// Returns `None` when `pattern` is not a decimal pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        let (positive, negative) = split_subpatterns(pattern);
        let pos = parse_subpattern(positive)?;

        let (int_part, frac_part) = match pos.number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (pos.number.as_str(), ""),
        };
        if frac_part.contains('.') || frac_part.contains(',') {
            return None;
        }
        if pos.number.chars().any(|c| c.is_ascii_digit() && c != '0') {
            return None;
        }

        let int_digits: String = int_part.chars().filter(|&c| c != ',').collect();
        if int_digits.is_empty() && frac_part.is_empty() {
            return None;
        }
        // '#' may not follow '0' in the integer part, nor precede it in the fraction.
        if int_digits.trim_start_matches('#').contains('#') {
            return None;
        }
        if frac_part.trim_end_matches('#').contains('#') {
            return None;
        }

        let grouping = match int_part.rfind(',') {
            Some(idx) => {
                let size = int_part.len() - idx - 1;
                if size == 0 {
                    return None;
                }
                size
            }
            None => 0,
        };

        let (neg_prefix, neg_suffix) = match negative {
            Some(text) => {
                let neg = parse_subpattern(text)?;
                (neg.prefix, neg.suffix)
            }
            None => (format!("-{}", pos.prefix), pos.suffix.clone()),
        };

        Some(Self {
            min_int: int_digits.chars().filter(|&c| c == '0').count(),
            min_frac: frac_part.chars().filter(|&c| c == '0').count(),
            max_frac: frac_part.len(),
            grouping,
            multiplier: pos.multiplier,
            pos_prefix: pos.prefix,
            pos_suffix: pos.suffix,
            neg_prefix,
            neg_suffix,
        })
    }

    /// The locale default: grouped integer part, up to three decimals.
    pub fn general() -> Self {
        Self {
            pos_prefix: String::new(),
            pos_suffix: String::new(),
            neg_prefix: "-".to_string(),
            neg_suffix: String::new(),
            min_int: 1,
            min_frac: 0,
            max_frac: 3,
            grouping: 3,
            multiplier: 1,
        }
    }

    pub fn format_f64(&self, value: f64) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        let negative = value < 0.0;
        if value.is_infinite() {
            return self.assemble(negative, "\u{221e}", "");
        }

        let scaled = value.abs() * f64::from(self.multiplier);
        let text = format!("{:.*}", self.max_frac, scaled);
        let (int_digits, frac_digits) = match text.split_once('.') {
            Some((i, f)) => (i.to_string(), f.to_string()),
            None => (text.clone(), String::new()),
        };
        let is_zero = int_digits.chars().chain(frac_digits.chars()).all(|c| c == '0');
        self.assemble(negative && !is_zero, &int_digits, &frac_digits)
    }

    pub fn format_i64(&self, value: i64) -> String {
        let scaled = i128::from(value) * i128::from(self.multiplier);
        let digits = scaled.unsigned_abs().to_string();
        self.assemble(scaled < 0, &digits, "")
    }

    fn assemble(&self, negative: bool, int_digits: &str, frac_digits: &str) -> String {
        let mut frac = frac_digits.to_string();
        while frac.len() > self.min_frac && frac.ends_with('0') {
            frac.pop();
        }
        while frac.len() < self.min_frac {
            frac.push('0');
        }

        let mut int = int_digits.trim_start_matches('0').to_string();
        while int.len() < self.min_int {
            int.insert(0, '0');
        }
        if int.is_empty() && frac.is_empty() {
            int.push('0');
        }
        let int = group_digits(&int, self.grouping);

        let (prefix, suffix) = if negative {
            (&self.neg_prefix, &self.neg_suffix)
        } else {
            (&self.pos_prefix, &self.pos_suffix)
        };
        if frac.is_empty() {
            format!("{}{}{}", prefix, int, suffix)
        } else {
            format!("{}{}.{}{}", prefix, int, frac, suffix)
        }
    }
}

fn group_digits(digits: &str, size: usize) -> String {
    if size == 0 || digits.len() <= size || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / size);
    let lead = digits.len() % size;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + size - lead) % size == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `printf("%g")`: six significant digits, exponent form outside
/// `1e-4 ..< 1e6`, trailing zeros dropped.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.5e}", value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if !(-4..6).contains(&exp) {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let precision = usize::try_from(5 - exp).unwrap_or(0);
        trim_fraction(&format!("{:.*}", precision, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DateItem {
    Literal(String),
    Field(char, usize),
}

/// Compiled date/time pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct DatePattern {
    items: Vec<DateItem>,
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

impl DatePattern {
    /// Returns `None` when an unquoted letter is not a known field.
    pub fn parse(pattern: &str) -> Option<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut items = Vec::new();
        let mut literal = String::new();
        let mut quoted = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                if chars.get(i + 1) == Some(&'\'') {
                    literal.push('\'');
                    i += 2;
                    continue;
                }
                quoted = !quoted;
                i += 1;
                continue;
            }
            if quoted || !c.is_ascii_alphabetic() {
                literal.push(c);
                i += 1;
                continue;
            }
            if !DATE_FIELD_CHARS.contains(c) && !TIME_FIELD_CHARS.contains(c) {
                return None;
            }
            let mut count = 1;
            while chars.get(i + count) == Some(&c) {
                count += 1;
            }
            if !literal.is_empty() {
                items.push(DateItem::Literal(std::mem::take(&mut literal)));
            }
            items.push(DateItem::Field(c, count));
            i += count;
        }

        if quoted {
            return None;
        }
        if !literal.is_empty() {
            items.push(DateItem::Literal(literal));
        }
        Some(Self { items })
    }

    pub fn format(&self, dt: &NaiveDateTime) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                DateItem::Literal(text) => out.push_str(text),
                DateItem::Field(c, count) => out.push_str(&format_field(*c, *count, dt)),
            }
        }
        out
    }
}

fn pad(n: i64, width: usize) -> String {
    if n < 0 {
        format!("-{:0width$}", -n, width = width)
    } else {
        format!("{:0width$}", n, width = width)
    }
}

fn text_form(full: &str, count: usize) -> String {
    match count {
        0..=3 => full.chars().take(3).collect(),
        4 => full.to_string(),
        5 => full.chars().take(1).collect(),
        _ => full.chars().take(2).collect(),
    }
}

fn format_field(c: char, count: usize, dt: &NaiveDateTime) -> String {
    let date = dt.date();
    let millis = i64::from(dt.nanosecond() / 1_000_000).min(999);
    let weekday = date.weekday().num_days_from_sunday() as usize;
    let month0 = date.month0() as usize;
    let quarter = i64::from(date.month0() / 3 + 1);

    match c {
        'G' => String::from(if date.year() > 0 { "AD" } else { "BC" }),
        'y' | 'Y' | 'u' => {
            let year = if c == 'Y' {
                i64::from(date.iso_week().year())
            } else {
                i64::from(date.year())
            };
            if count == 2 && c != 'u' {
                pad(year.rem_euclid(100), 2)
            } else {
                pad(year, count)
            }
        }
        'Q' | 'q' => match count {
            1 | 2 => pad(quarter, count),
            3 => format!("Q{}", quarter),
            _ => {
                let ordinal = ["1st", "2nd", "3rd", "4th"][(quarter - 1) as usize];
                format!("{} quarter", ordinal)
            }
        },
        'M' | 'L' => match count {
            1 | 2 => pad(i64::from(date.month()), count),
            n => text_form(MONTHS[month0], n),
        },
        'd' => pad(i64::from(date.day()), count),
        'D' => pad(i64::from(date.ordinal()), count),
        'F' => pad(i64::from((date.day() - 1) / 7 + 1), count),
        'w' => pad(i64::from(date.iso_week().week()), count),
        'W' => {
            let first = date.with_day(1).unwrap_or(date);
            let offset = first.weekday().num_days_from_sunday();
            pad(i64::from((date.day() - 1 + offset) / 7 + 1), count)
        }
        'g' => pad(i64::from(date.num_days_from_ce()) + 1_721_425, count),
        'E' => text_form(WEEKDAYS[weekday], count.max(3)),
        'e' | 'c' => match count {
            1 | 2 => pad(weekday as i64 + 1, count),
            n => text_form(WEEKDAYS[weekday], n),
        },
        'a' => String::from(if dt.hour() < 12 { "AM" } else { "PM" }),
        'h' => {
            let h = dt.hour() % 12;
            pad(i64::from(if h == 0 { 12 } else { h }), count)
        }
        'H' => pad(i64::from(dt.hour()), count),
        'k' => {
            let h = dt.hour();
            pad(i64::from(if h == 0 { 24 } else { h }), count)
        }
        'K' => pad(i64::from(dt.hour() % 12), count),
        'm' => pad(i64::from(dt.minute()), count),
        's' => pad(i64::from(dt.second()), count),
        'S' => {
            let mut digits = format!("{:03}", millis);
            while digits.len() < count {
                digits.push('0');
            }
            digits.truncate(count);
            digits
        }
        'A' => pad(
            i64::from(dt.num_seconds_from_midnight()) * 1000 + millis,
            count,
        ),
        'z' | 'v' | 'V' if count >= 4 => "Coordinated Universal Time".to_string(),
        'z' | 'v' | 'V' => "UTC".to_string(),
        'Z' if count == 4 => "GMT".to_string(),
        'Z' if count == 5 => "Z".to_string(),
        'Z' => "+0000".to_string(),
        _ => String::new(),
    }
}
