use crate::error::ReportError;
use crate::period::{is_known_month, month_title, MONTH_NAMES};
use crate::types::Record;
use std::collections::BTreeSet;
use std::fmt;

pub const ALL: &str = "ALL";

/// Labels that mean "no constraint" in addition to [`ALL`].
const ALL_ALIASES: [&str; 3] = [ALL, "SEMUA", "SEMUA KEJAHATAN"];

/// One selector value: either unconstrained or a single concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    fn admits(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(v) => v == value,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Only(v) => v.fmt(f),
        }
    }
}

/// The four dashboard selectors. Owned by the session and passed into
/// [`apply`] on every recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub gender: Selection<String>,
    pub category: Selection<String>,
    pub year: Selection<i32>,
    /// Canonical upper-case month name.
    pub month: Selection<String>,
}

impl FilterState {
    pub fn reset(&mut self) {
        *self = FilterState::default();
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == FilterState::default()
    }

    /// All active constraints combined with AND.
    pub fn matches(&self, r: &Record) -> bool {
        self.gender.admits(&r.gender)
            && self.category.admits(&r.category)
            && match &self.year {
                Selection::All => true,
                Selection::Only(y) => r.year == Some(*y),
            }
            && match &self.month {
                Selection::All => true,
                Selection::Only(m) => r.month.eq_ignore_ascii_case(m),
            }
    }

    pub fn set_gender(&mut self, value: &str, opts: &FilterOptions) -> Result<(), ReportError> {
        self.gender = match parse_all(value) {
            None => Selection::All,
            Some(v) => {
                let v = v.to_uppercase();
                if !opts.genders.contains(&v) {
                    return Err(invalid("gender", value));
                }
                Selection::Only(v)
            }
        };
        Ok(())
    }

    pub fn set_category(&mut self, value: &str, opts: &FilterOptions) -> Result<(), ReportError> {
        self.category = match parse_all(value) {
            None => Selection::All,
            Some(v) => {
                if !opts.categories.iter().any(|c| c == v) {
                    return Err(invalid("crime category", value));
                }
                Selection::Only(v.to_string())
            }
        };
        Ok(())
    }

    pub fn set_year(&mut self, value: &str, opts: &FilterOptions) -> Result<(), ReportError> {
        self.year = match parse_all(value) {
            None => Selection::All,
            Some(v) => match v.parse::<i32>() {
                Ok(y) if opts.years.contains(&y) => Selection::Only(y),
                _ => return Err(invalid("year", value)),
            },
        };
        Ok(())
    }

    pub fn set_month(&mut self, value: &str) -> Result<(), ReportError> {
        self.month = match parse_all(value) {
            None => Selection::All,
            Some(v) if is_known_month(v) => Selection::Only(v.to_uppercase()),
            Some(_) => return Err(invalid("month", value)),
        };
        Ok(())
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gender={}, category={}, year={}, month={}",
            self.gender, self.category, self.year, self.month
        )
    }
}

/// `None` when the input is one of the "no constraint" labels, otherwise the
/// trimmed value.
fn parse_all(value: &str) -> Option<&str> {
    let v = value.trim();
    if v.is_empty() || ALL_ALIASES.iter().any(|a| v.eq_ignore_ascii_case(a)) {
        None
    } else {
        Some(v)
    }
}

fn invalid(field: &'static str, value: &str) -> ReportError {
    ReportError::InvalidSelection {
        field,
        value: value.to_string(),
    }
}

/// Selector values observed in the normalized table, sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub genders: Vec<String>,
    pub categories: Vec<String>,
    pub years: Vec<i32>,
}

impl FilterOptions {
    pub fn from_records(records: &[Record]) -> Self {
        let genders: BTreeSet<&str> = records.iter().map(|r| r.gender.as_str()).collect();
        let categories: BTreeSet<&str> = records.iter().map(|r| r.category.as_str()).collect();
        let years: BTreeSet<i32> = records.iter().filter_map(|r| r.year).collect();
        FilterOptions {
            genders: genders.into_iter().map(str::to_string).collect(),
            categories: categories.into_iter().map(str::to_string).collect(),
            years: years.into_iter().collect(),
        }
    }

    /// Month selector labels in calendar order.
    pub fn months() -> Vec<String> {
        MONTH_NAMES.iter().map(|m| month_title(m)).collect()
    }
}

/// Rows of `records` that satisfy every active constraint. The input table
/// is never modified.
pub fn apply(records: &[Record], filter: &FilterState) -> Vec<Record> {
    let out: Vec<Record> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    log::debug!("filter [{}] kept {} of {} rows", filter, out.len(), records.len());
    out
}

/// Case-insensitive category search used for the record listing and export.
pub fn search(records: Vec<Record>, query: &str) -> Vec<Record> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| r.category.to_lowercase().contains(&q))
        .collect()
}
