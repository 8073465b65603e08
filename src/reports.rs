use crate::filter::{self, FilterState};
use crate::period::{format_period, is_known_month, MONTH_NAMES};
use crate::types::{
    CategoryGenderShare, CategoryTotal, CumulativePoint, Dashboard, GenderTotals, HeatRow,
    PeriodCategoryTotal, PeriodGenderTotal, PeriodTotal, Record, YearCategoryTotal, YearChange,
};
use crate::util::percent;
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Placeholder shown for "top"/"densest" values when nothing matches.
pub const NO_DATA: &str = "-";
/// Bucket for categories outside the top-N in the category mix view.
pub const OTHER: &str = "OTHER";

pub const TOP_TREND: usize = 4;
pub const TOP_BY_YEAR: usize = 5;
pub const TOP_MIX: usize = 6;
pub const TOP_BAR: usize = 10;
pub const TOP_COMPOSITION: usize = 12;
pub const TOP_HEAT: usize = 15;

const MALE_MARKER: &str = "LAKI";
const FEMALE_MARKER: &str = "PEREMPUAN";

/// Sum counts per key, keeping keys in the order they are first seen.
fn group_sum<K, F>(data: &[Record], key: F) -> Vec<(K, u64)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Record) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<(K, u64)> = Vec::new();
    for r in data {
        let k = key(r);
        match index.get(&k) {
            Some(&i) => out[i].1 = out[i].1.saturating_add(r.count),
            None => {
                index.insert(k.clone(), out.len());
                out.push((k, r.count));
            }
        }
    }
    out
}

/// Descending by total, ties alphabetical by category.
fn by_total_then_name(a: &CategoryTotal, b: &CategoryTotal) -> Ordering {
    b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category))
}

/// Sum of counts, saturating instead of overflowing.
fn saturating_sum<'a>(records: impl Iterator<Item = &'a Record>) -> u64 {
    records.fold(0u64, |acc, r| acc.saturating_add(r.count))
}

pub fn total(data: &[Record]) -> u64 {
    saturating_sum(data.iter())
}

pub fn category_totals(data: &[Record]) -> Vec<CategoryTotal> {
    let mut rows: Vec<CategoryTotal> = group_sum(data, |r| r.category.clone())
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();
    rows.sort_by(by_total_then_name);
    rows
}

pub fn top_category(totals: &[CategoryTotal]) -> String {
    totals
        .first()
        .map(|t| t.category.clone())
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// The `n` largest categories of the filtered data, best first.
pub fn top_categories(data: &[Record], n: usize) -> Vec<String> {
    category_totals(data)
        .into_iter()
        .take(n)
        .map(|t| t.category)
        .collect()
}

pub fn period_totals(data: &[Record]) -> Vec<PeriodTotal> {
    let mut rows: Vec<PeriodTotal> = group_sum(data, |r| r.period)
        .into_iter()
        .map(|(period, total)| PeriodTotal { period, total })
        .collect();
    rows.sort_by_key(|p| p.period);
    rows
}

/// Period with the largest total. Ties go to the period seen first in the
/// filtered rows.
pub fn densest_period(data: &[Record]) -> Option<NaiveDate> {
    let mut best: Option<(NaiveDate, u64)> = None;
    for (period, sum) in group_sum(data, |r| r.period) {
        match best {
            Some((_, b)) if sum <= b => {}
            _ => best = Some((period, sum)),
        }
    }
    best.map(|(p, _)| p)
}

/// Month label of the densest period, taken from its first row.
pub fn densest_month(data: &[Record]) -> String {
    let Some(period) = densest_period(data) else {
        return NO_DATA.to_string();
    };
    match data.iter().find(|r| r.period == period) {
        Some(r) if !r.month.is_empty() => r.month.clone(),
        _ => MONTH_NAMES[period.month0() as usize].to_string(),
    }
}

/// Male/female totals. Labels are matched by substring so variants like
/// `LAKI-LAKI` and `LAKI LAKI` both count.
pub fn gender_totals(data: &[Record]) -> GenderTotals {
    let total = total(data);
    let sum_where = |marker: &str| -> u64 {
        saturating_sum(data.iter().filter(|r| r.gender.contains(marker)))
    };
    let male = sum_where(MALE_MARKER);
    let female = sum_where(FEMALE_MARKER);
    GenderTotals {
        total,
        male,
        female,
        male_pct: percent(male as f64, total as f64),
        female_pct: percent(female as f64, total as f64),
    }
}

pub fn period_gender_totals(data: &[Record]) -> Vec<PeriodGenderTotal> {
    let mut rows: Vec<PeriodGenderTotal> = group_sum(data, |r| (r.period, r.gender.clone()))
        .into_iter()
        .map(|((period, gender), total)| PeriodGenderTotal {
            period,
            gender,
            total,
        })
        .collect();
    rows.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.gender.cmp(&b.gender)));
    rows
}

/// Per-period totals of the top `n` categories; other categories are dropped.
pub fn top_category_trend(data: &[Record], n: usize) -> Vec<PeriodCategoryTotal> {
    let top: HashSet<String> = top_categories(data, n).into_iter().collect();
    let kept: Vec<Record> = data
        .iter()
        .filter(|r| top.contains(&r.category))
        .cloned()
        .collect();
    let mut rows: Vec<PeriodCategoryTotal> = group_sum(&kept, |r| (r.period, r.category.clone()))
        .into_iter()
        .map(|((period, category), total)| PeriodCategoryTotal {
            period,
            category,
            total,
        })
        .collect();
    rows.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.category.cmp(&b.category)));
    rows
}

/// Year by category totals restricted to the top `n` categories. With
/// `bucket_rest` the remaining categories are summed into [`OTHER`] instead
/// of being dropped. Rows without a year are skipped.
pub fn category_by_year(data: &[Record], n: usize, bucket_rest: bool) -> Vec<YearCategoryTotal> {
    let top: HashSet<String> = top_categories(data, n).into_iter().collect();
    let mut totals: HashMap<(i32, String), u64> = HashMap::new();
    for r in data {
        let Some(year) = r.year else { continue };
        let category = if top.contains(&r.category) {
            r.category.clone()
        } else if bucket_rest {
            OTHER.to_string()
        } else {
            continue;
        };
        let t = totals.entry((year, category)).or_insert(0);
        *t = t.saturating_add(r.count);
    }
    let mut rows: Vec<YearCategoryTotal> = totals
        .into_iter()
        .map(|((year, category), total)| YearCategoryTotal {
            year,
            category,
            total,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.category.cmp(&b.category))
    });
    rows
}

/// Category by month grid for the top `n` categories, in rank order. Rows
/// whose month label is not a known month are left out of the grid.
pub fn month_heat(data: &[Record], n: usize) -> Vec<HeatRow> {
    let top = top_categories(data, n);
    let mut rows: Vec<HeatRow> = top
        .iter()
        .map(|c| HeatRow {
            category: c.clone(),
            counts: [0; 12],
        })
        .collect();
    let slot: HashMap<&str, usize> = top.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    for r in data {
        if !is_known_month(&r.month) {
            continue;
        }
        if let Some(&i) = slot.get(r.category.as_str()) {
            let cell = &mut rows[i].counts[(r.month_num - 1) as usize];
            *cell = cell.saturating_add(r.count);
        }
    }
    rows
}

/// Gender split inside each of the top `n` categories. `share_pct` is the
/// gender's share of its category total, 0 when that total is 0.
pub fn category_gender_shares(data: &[Record], n: usize) -> Vec<CategoryGenderShare> {
    let top = top_categories(data, n);
    let rank: HashMap<&str, usize> = top.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    let kept: Vec<Record> = data
        .iter()
        .filter(|r| rank.contains_key(r.category.as_str()))
        .cloned()
        .collect();
    let per_category: HashMap<String, u64> = group_sum(&kept, |r| r.category.clone())
        .into_iter()
        .collect();

    let pairs = group_sum(&kept, |r| (r.category.clone(), r.gender.clone()));
    let mut rows: Vec<CategoryGenderShare> = pairs
        .into_iter()
        .map(|((category, gender), total)| {
            let category_total = per_category.get(&category).copied().unwrap_or(0);
            CategoryGenderShare {
                share_pct: percent(total as f64, category_total as f64),
                category,
                gender,
                total,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        rank[a.category.as_str()]
            .cmp(&rank[b.category.as_str()])
            .then_with(|| a.gender.cmp(&b.gender))
    });
    rows
}

/// Running total over the period series.
pub fn cumulative_totals(data: &[Record]) -> Vec<CumulativePoint> {
    let mut running = 0u64;
    period_totals(data)
        .into_iter()
        .map(|p| {
            running = running.saturating_add(p.total);
            CumulativePoint {
                period: p.period,
                total: p.total,
                cumulative: running,
            }
        })
        .collect()
}

/// Year-over-year change of the yearly totals. The first year, and any year
/// following a zero total, reports 0%.
pub fn yoy_change(data: &[Record]) -> Vec<YearChange> {
    let mut years: Vec<(i32, u64)> = {
        let mut m: HashMap<i32, u64> = HashMap::new();
        for r in data {
            if let Some(y) = r.year {
                let t = m.entry(y).or_insert(0);
                *t = t.saturating_add(r.count);
            }
        }
        m.into_iter().collect()
    };
    years.sort_by_key(|(y, _)| *y);

    let mut prev: Option<u64> = None;
    years
        .into_iter()
        .map(|(year, total)| {
            let change_pct = match prev {
                Some(p) => percent(total as f64 - p as f64, p as f64),
                None => 0.0,
            };
            prev = Some(total);
            YearChange {
                year,
                total,
                change_pct,
            }
        })
        .collect()
}

pub fn occupancy_rate(total: u64, capacity: u32) -> f64 {
    percent(total as f64, capacity as f64)
}

/// Latest period in the table, used for the "last updated" banner.
pub fn last_period(data: &[Record]) -> Option<NaiveDate> {
    data.iter().map(|r| r.period).max()
}

/// Run the filter and the whole aggregate catalogue for one filter state.
///
/// `records` is the unfiltered normalized table; it is only read.
pub fn build_dashboard(records: &[Record], state: &FilterState, capacity: u32) -> Dashboard {
    let data = filter::apply(records, state);
    let categories = category_totals(&data);
    let gender = gender_totals(&data);

    Dashboard {
        filter: state.to_string(),
        rows: data.len(),
        last_update: format_period(last_period(records)),
        total: gender.total,
        top_category: top_category(&categories),
        densest_month: densest_month(&data),
        capacity,
        occupancy_rate: occupancy_rate(gender.total, capacity),
        top_categories: categories.into_iter().take(TOP_BAR).collect(),
        gender_trend: period_gender_totals(&data),
        top_category_trend: top_category_trend(&data, TOP_TREND),
        month_heat: month_heat(&data, TOP_HEAT),
        top_categories_by_year: category_by_year(&data, TOP_BY_YEAR, false),
        category_mix_by_year: category_by_year(&data, TOP_MIX, true),
        category_gender: category_gender_shares(&data, TOP_COMPOSITION),
        gender_share: category_gender_shares(&data, TOP_BAR),
        cumulative: cumulative_totals(&data),
        yoy: yoy_change(&data),
        gender,
    }
}
