use crate::error::ReportError;
use crate::types::{
    Dashboard, Record, COL_CATEGORY, COL_COUNT, COL_GENDER, COL_MONTH, COL_REGION, COL_YEAR,
};
use crate::util::{format_int, format_number};
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub const EXPORT_CSV: &str = "dashboard_lapas_cirebon_filtered.csv";
pub const EXPORT_XLSX: &str = "dashboard_lapas_cirebon_filtered.xlsx";
pub const EXPORT_SHEET: &str = "filtered";
pub const SUMMARY_JSON: &str = "dashboard_summary.json";

/// Order rows for listing and export: newest period first, then category
/// and gender ascending.
pub fn sort_for_export(records: &[Record]) -> Vec<&Record> {
    let mut rows: Vec<&Record> = records.iter().collect();
    rows.sort_by(|a, b| {
        b.period
            .cmp(&a.period)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.gender.cmp(&b.gender))
    });
    rows
}

fn export_headers(has_region: bool) -> Vec<&'static str> {
    let mut h = Vec::with_capacity(6);
    if has_region {
        h.push(COL_REGION);
    }
    h.extend([COL_CATEGORY, COL_GENDER, COL_COUNT, COL_MONTH, COL_YEAR]);
    h
}

fn export_fields(r: &Record, has_region: bool) -> Vec<String> {
    let mut f = Vec::with_capacity(6);
    if has_region {
        f.push(r.region.clone().unwrap_or_default());
    }
    f.push(r.category.clone());
    f.push(r.gender.clone());
    f.push(r.count.to_string());
    f.push(r.month.clone());
    f.push(r.year.map(|y| y.to_string()).unwrap_or_default());
    f
}

/// Write the filtered records as CSV. The period column is internal and is
/// not exported.
pub fn write_csv(path: &Path, records: &[Record], has_region: bool) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(export_headers(has_region))?;
    for r in sort_for_export(records) {
        wtr.write_record(export_fields(r, has_region))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_xlsx(path: &Path, records: &[Record], has_region: bool) -> Result<(), ReportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET)?;

    for (col, h) in export_headers(has_region).into_iter().enumerate() {
        sheet.write_string(0, col as u16, h)?;
    }
    for (i, r) in sort_for_export(records).into_iter().enumerate() {
        let row = i as u32 + 1;
        let mut col: u16 = 0;
        if has_region {
            sheet.write_string(row, col, r.region.clone().unwrap_or_default())?;
            col += 1;
        }
        sheet.write_string(row, col, r.category.as_str())?;
        sheet.write_string(row, col + 1, r.gender.as_str())?;
        sheet.write_number(row, col + 2, r.count as f64)?;
        sheet.write_string(row, col + 3, r.month.as_str())?;
        if let Some(year) = r.year {
            sheet.write_number(row, col + 4, year as f64)?;
        }
    }
    workbook.save(path)?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write both export files into `dir`. Returns the paths written.
pub fn export(
    dir: &Path,
    records: &[Record],
    has_region: bool,
) -> Result<[PathBuf; 2], ReportError> {
    std::fs::create_dir_all(dir)?;
    let csv_path = dir.join(EXPORT_CSV);
    let xlsx_path = dir.join(EXPORT_XLSX);
    write_csv(&csv_path, records, has_region)?;
    write_xlsx(&xlsx_path, records, has_region)?;
    log::info!(
        "exported {} rows to {} and {}",
        records.len(),
        csv_path.display(),
        xlsx_path.display()
    );
    Ok([csv_path, xlsx_path])
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Print the record listing (first `max_rows` rows) in export order.
pub fn preview_records(records: &[Record], has_region: bool, max_rows: usize) {
    println!("Total rows: {}", format_int(records.len() as u64));
    let rows = sort_for_export(records);
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut b = Builder::default();
    b.push_record(export_headers(has_region));
    for r in rows.into_iter().take(max_rows) {
        b.push_record(export_fields(r, has_region));
    }
    println!("{}\n", b.build().with(Style::markdown()));
}

fn print_heat(d: &Dashboard) {
    if d.month_heat.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut b = Builder::default();
    let mut header = vec!["Category".to_string()];
    header.extend(crate::period::MONTH_NAMES.iter().map(|m| m[..3].to_string()));
    b.push_record(header);
    for row in &d.month_heat {
        let mut rec = vec![row.category.clone()];
        rec.extend(row.counts.iter().map(|c| c.to_string()));
        b.push_record(rec);
    }
    println!("{}\n", b.build().with(Style::markdown()));
}

/// Console rendering of one dashboard snapshot.
pub fn print_dashboard(d: &Dashboard, max_rows: usize) {
    println!("Last updated: {}", d.last_update);
    println!("Filter: {}\n", d.filter);

    if d.rows == 0 {
        println!("No data for this filter.\n");
        return;
    }

    println!("Total inmates:    {}", format_int(d.total));
    println!(
        "Capacity:         {} ({}%)",
        format_int(d.capacity),
        format_number(d.occupancy_rate, 1)
    );
    println!(
        "Male:             {} ({}% of total)",
        format_int(d.gender.male),
        format_number(d.gender.male_pct, 1)
    );
    println!(
        "Female:           {} ({}% of total)",
        format_int(d.gender.female),
        format_number(d.gender.female_pct, 1)
    );
    println!("Top category:     {}", d.top_category);
    println!("Densest month:    {}\n", d.densest_month);

    println!("Crime categories (Top 10)");
    preview_table_rows(&d.top_categories, max_rows);
    println!("Population trend by gender");
    preview_table_rows(&d.gender_trend, max_rows);
    println!("Top 4 categories per period");
    preview_table_rows(&d.top_category_trend, max_rows);
    println!("Category by month (Top 15)");
    print_heat(d);
    println!("Top 5 categories per year");
    preview_table_rows(&d.top_categories_by_year, max_rows);
    println!("Category mix per year (Top 6 + OTHER)");
    preview_table_rows(&d.category_mix_by_year, max_rows);
    println!("Category by gender (Top 12)");
    preview_table_rows(&d.category_gender, max_rows);
    println!("Gender share per category (Top 10)");
    preview_table_rows(&d.gender_share, max_rows);
    println!("Cumulative total");
    preview_table_rows(&d.cumulative, max_rows);
    println!("Year-over-year change");
    preview_table_rows(&d.yoy, max_rows);
}
