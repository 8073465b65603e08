// Month/year normalization into a canonical first-of-month period.
//
// Every function here is total: bad input falls back to a fixed default
// (month 1, year 2000) instead of failing, so each record always gets a
// period to sort and group on.
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Calendar-ordered month names as they appear in the source data.
pub const MONTH_NAMES: [&str; 12] = [
    "JANUARI",
    "FEBRUARI",
    "MARET",
    "APRIL",
    "MEI",
    "JUNI",
    "JULI",
    "AGUSTUS",
    "SEPTEMBER",
    "OKTOBER",
    "NOVEMBER",
    "DESEMBER",
];

/// Year used for period construction when the record has none.
pub const FALLBACK_YEAR: i32 = 2000;

/// Month used when the label is missing or not a known month name.
pub const FALLBACK_MONTH: u32 = 1;

static MONTH_MAP: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as u32 + 1))
        .collect()
});

/// Upper-case and trim a month label the way it is stored on a record.
pub fn normalize_month_label(s: Option<&str>) -> String {
    s.map(|m| m.trim().to_uppercase()).unwrap_or_default()
}

/// Map a free-text month name to 1..=12.
///
/// Case-insensitive and whitespace-tolerant. Anything unrecognized,
/// including `None`, maps to January.
pub fn month_to_num(s: Option<&str>) -> u32 {
    let Some(s) = s else {
        return FALLBACK_MONTH;
    };
    let key = s.trim().to_uppercase();
    MONTH_MAP.get(key.as_str()).copied().unwrap_or(FALLBACK_MONTH)
}

/// Whether the label names one of the twelve canonical months.
pub fn is_known_month(s: &str) -> bool {
    MONTH_MAP.contains_key(s.trim().to_uppercase().as_str())
}

/// `FEBRUARI` -> `Februari`, used for selector labels.
pub fn month_title(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build the first-of-month period for a record.
///
/// A missing year uses [`FALLBACK_YEAR`]; the month is expected to already be
/// in range, but out-of-range values are clamped rather than rejected.
pub fn period_for(year: Option<i32>, month: u32) -> NaiveDate {
    let year = year.unwrap_or(FALLBACK_YEAR);
    let month = month.clamp(1, 12);
    NaiveDate::from_ymd_opt(year, month, 1)
        .or_else(|| NaiveDate::from_ymd_opt(FALLBACK_YEAR, month, 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Render a period for the "last updated" banner, e.g. `01 February 2023`.
pub fn format_period(period: Option<NaiveDate>) -> String {
    match period {
        Some(p) => p.format("%d %B %Y").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_lookup_is_case_and_space_insensitive() {
        assert_eq!(month_to_num(Some("Februari")), 2);
        assert_eq!(month_to_num(Some("  desember ")), 12);
        assert_eq!(month_to_num(Some("MEI")), 5);
    }

    #[test]
    fn month_lookup_defaults_to_january() {
        assert_eq!(month_to_num(None), 1);
        assert_eq!(month_to_num(Some("")), 1);
        assert_eq!(month_to_num(Some("February")), 1);
        assert_eq!(month_to_num(Some("13")), 1);
        assert_eq!(month_to_num(Some("nan")), 1);
    }

    #[test]
    fn month_lookup_stays_in_range() {
        let inputs = ["", "x", "januari", "OKTOBER", "ÄÖ", "\t", "maret "];
        for input in inputs {
            let m = month_to_num(Some(input));
            assert!((1..=12).contains(&m), "{input:?} -> {m}");
        }
    }

    #[test]
    fn period_uses_fallback_year() {
        assert_eq!(
            period_for(None, 3),
            NaiveDate::from_ymd_opt(2000, 3, 1).unwrap()
        );
        assert_eq!(
            period_for(Some(2023), 2),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
        );
    }

    #[test]
    fn period_survives_out_of_range_input() {
        assert_eq!(
            period_for(Some(2021), 0),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
        );
        assert_eq!(
            period_for(Some(i32::MAX), 4),
            NaiveDate::from_ymd_opt(FALLBACK_YEAR, 4, 1).unwrap()
        );
    }

    #[test]
    fn titles_and_banner() {
        assert_eq!(month_title("FEBRUARI"), "Februari");
        assert_eq!(month_title(""), "");
        assert!(is_known_month(" agustus"));
        assert!(!is_known_month("August"));
        assert_eq!(format_period(None), "-");
        assert_eq!(
            format_period(NaiveDate::from_ymd_opt(2023, 2, 1)),
            "01 February 2023"
        );
    }
}
