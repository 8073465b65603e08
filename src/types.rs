use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

pub const COL_REGION: &str = "nama_kabupaten_kota";
pub const COL_GENDER: &str = "jenis_kelamin";
pub const COL_CATEGORY: &str = "kategori_kejahatan";
pub const COL_YEAR: &str = "tahun";
pub const COL_MONTH: &str = "bulan";
pub const COL_COUNT: &str = "jumlah_narapidana";

pub const REQUIRED_COLUMNS: [&str; 5] = [COL_GENDER, COL_CATEGORY, COL_YEAR, COL_MONTH, COL_COUNT];

/// One source row before cleaning. Every cell is kept as text; the loader
/// decides how to coerce it.
#[derive(Debug, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "nama_kabupaten_kota", default)]
    pub region: Option<String>,
    #[serde(rename = "jenis_kelamin", default)]
    pub gender: Option<String>,
    #[serde(rename = "kategori_kejahatan", default)]
    pub category: Option<String>,
    #[serde(rename = "tahun", default)]
    pub year: Option<String>,
    #[serde(rename = "bulan", default)]
    pub month: Option<String>,
    #[serde(rename = "jumlah_narapidana", default)]
    pub count: Option<String>,
}

/// A normalized record. `year` keeps the source value (possibly missing);
/// `period` is always defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub region: Option<String>,
    pub gender: String,
    pub category: String,
    pub year: Option<i32>,
    pub month: String,
    pub month_num: u32,
    pub count: u64,
    pub period: NaiveDate,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CategoryTotal {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct PeriodTotal {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: NaiveDate,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct PeriodGenderTotal {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: NaiveDate,
    #[serde(rename = "Gender")]
    #[tabled(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct PeriodCategoryTotal {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: NaiveDate,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearCategoryTotal {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CategoryGenderShare {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Gender")]
    #[tabled(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
    #[serde(rename = "SharePct")]
    #[tabled(rename = "Share %", display_with = "display_pct")]
    pub share_pct: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CumulativePoint {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: NaiveDate,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
    #[serde(rename = "Cumulative")]
    #[tabled(rename = "Cumulative")]
    pub cumulative: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearChange {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
    #[serde(rename = "YoYChangePct")]
    #[tabled(rename = "YoY %", display_with = "display_pct")]
    pub change_pct: f64,
}

/// Category by month pivot; `counts[0]` is JANUARI.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HeatRow {
    pub category: String,
    pub counts: [u64; 12],
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct GenderTotals {
    pub total: u64,
    pub male: u64,
    pub female: u64,
    pub male_pct: f64,
    pub female_pct: f64,
}

/// Every aggregate the presentation layer needs for one filter state.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Dashboard {
    pub filter: String,
    pub rows: usize,
    pub last_update: String,
    pub total: u64,
    pub top_category: String,
    pub densest_month: String,
    pub capacity: u32,
    pub occupancy_rate: f64,
    pub gender: GenderTotals,
    pub top_categories: Vec<CategoryTotal>,
    pub gender_trend: Vec<PeriodGenderTotal>,
    pub top_category_trend: Vec<PeriodCategoryTotal>,
    pub month_heat: Vec<HeatRow>,
    pub top_categories_by_year: Vec<YearCategoryTotal>,
    pub category_mix_by_year: Vec<YearCategoryTotal>,
    pub category_gender: Vec<CategoryGenderShare>,
    pub gender_share: Vec<CategoryGenderShare>,
    pub cumulative: Vec<CumulativePoint>,
    pub yoy: Vec<YearChange>,
}

fn display_pct(v: &f64) -> String {
    format!("{:.1}", v)
}
