//! Number and date formatting that matches what the dashboard templates
//! render server-side.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

/// Leading float literal of `s` (after leading whitespace), or `None` when
/// there is none. Trailing garbage is ignored: `"12 units"` reads as 12.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return Some(if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return None;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    s[..i].parse::<f64>().ok()
}

const TIE_PROBE_DIGITS: usize = 30;

/// Fixed-point rendering with exact ties rounded away from zero.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let x = value.abs();

    let wide = format!("{:.*}", digits + TIE_PROBE_DIGITS, x);
    let (head, tail) = wide.split_at(wide.len() - TIE_PROBE_DIGITS);
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    let body = if is_tie {
        round_up_last_digit(head.trim_end_matches('.'))
    } else {
        format!("{:.*}", digits, x)
    };
    format!("{sign}{body}")
}

fn round_up_last_digit(s: &str) -> String {
    let mut out: Vec<u8> = s.as_bytes().to_vec();
    let mut i = out.len();
    loop {
        if i == 0 {
            out.insert(0, b'1');
            break;
        }
        i -= 1;
        match out[i] {
            b'.' => continue,
            b'9' => out[i] = b'0',
            d => {
                out[i] = d + 1;
                break;
            }
        }
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Plain number rendering: integers without a fraction, no `-0`, and
/// exponent notation (`1e+21`, `1.5e-7`) outside `[1e-6, 1e21)`.
pub fn number_text(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let sci = format!("{value:e}");
        return match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => sci,
        };
    }
    format!("{value}")
}

fn group_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let lead = int_part.len() % 3;
    for (i, c) in int_part.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// US dollars with thousands separators: `$1,234.56`, `-$12.00`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("${}", to_fixed(amount, 2));
    }
    let fixed = to_fixed(amount.abs(), 2);
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount.is_sign_negative() { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(int_part))
}

/// `M/D/YYYY` for ISO dates, RFC 3339 timestamps (shown in local time) and
/// naive `YYYY-MM-DDTHH:MM:SS` values.
pub fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        d
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Local).date_naive()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        dt.date()
    } else {
        return None;
    };
    Some(date.format("%-m/%-d/%Y").to_string())
}

/// Value for `data-default-today` date inputs (UTC calendar date).
pub fn today_iso() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Blur handler for `data-currency` inputs; `None` leaves the value as is.
pub fn normalize_currency_input(raw: &str) -> Option<String> {
    parse_float(raw).map(|v| to_fixed(v, 2))
}

pub fn format_roi(value: f64) -> String {
    format!("{}%", to_fixed(value, 1))
}

pub fn format_total(value: f64) -> String {
    format!("${}", to_fixed(value, 0))
}
