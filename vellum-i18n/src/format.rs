//! Locale-aware number and date formatting

use chrono::Datelike;

/// Decimal and grouping separators for a language.
fn number_separators(language: &str) -> (&'static str, &'static str) {
    match language {
        "de" | "es" | "it" | "pt" | "nl" | "da" | "sv" | "no" | "fi" | "pl" | "cs" | "sk"
        | "hu" | "ro" | "bg" | "el" | "ru" | "uk" | "tr" | "id" | "vi" => (",", "."),
        "fr" => (",", " "),
        _ => (".", ","),
    }
}

/// Format a number with up to three fraction digits and grouping separators.
///
/// ```
/// use vellum_i18n::format_number;
///
/// assert_eq!(format_number(1234567.891, "ko"), "1,234,567.891");
/// assert_eq!(format_number(1234567.5, "de"), "1.234.567,5");
/// assert_eq!(format_number(-1000.0, "en"), "-1,000");
/// ```
pub fn format_number(n: f64, language: &str) -> String {
    let (decimal_sep, group_sep) = number_separators(language);
    let formatted = format!("{:.3}", n);
    let (integer_part, fraction_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), ""));

    let (sign, digits) = match integer_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", integer_part),
    };
    let grouped = add_grouping(digits, group_sep);
    let fraction = fraction_part.trim_end_matches('0');

    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}{decimal_sep}{fraction}")
    }
}

/// Format a calendar date for a language.
///
/// Korean uses `YYYY. M. D.`; every other language uses `M/D/YYYY`.
pub fn format_date<D: Datelike>(date: &D, language: &str) -> String {
    match language {
        "ko" => format!("{}. {}. {}.", date.year(), date.month(), date.day()),
        _ => format!("{}/{}/{}", date.month(), date.day(), date.year()),
    }
}

fn add_grouping(s: &str, sep: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();

    if len <= 3 {
        return s.to_string();
    }

    let mut result = String::with_capacity(len + (len - 1) / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push_str(sep);
        }
        result.push(*c);
    }
    result
}
