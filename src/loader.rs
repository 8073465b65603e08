use crate::error::ReportError;
use crate::period::{is_known_month, month_to_num, normalize_month_label, period_for};
use crate::types::{
    RawRow, Record, COL_CATEGORY, COL_COUNT, COL_GENDER, COL_MONTH, COL_REGION, COL_YEAR,
    REQUIRED_COLUMNS,
};
use crate::util::{parse_f64_safe, parse_year_safe};
use calamine::{Data, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Largest count a single row may carry; anything above is clamped.
pub const MAX_COUNT: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub region_dropped: usize,
    pub defaulted_counts: usize,
    pub negative_counts: usize,
    pub oversized_counts: usize,
    pub defaulted_months: usize,
    pub missing_years: usize,
}

/// A normalized table. Built once per distinct file content and shared
/// read-only afterwards.
#[derive(Debug)]
pub struct LoadedTable {
    pub records: Vec<Record>,
    pub report: LoadReport,
    pub has_region: bool,
}

/// Parsed tables keyed by the SHA-256 of the file bytes.
pub struct TableCache {
    region_target: String,
    entries: HashMap<String, Rc<LoadedTable>>,
}

impl TableCache {
    pub fn new(region_target: &str) -> Self {
        Self {
            region_target: region_target.trim().to_uppercase(),
            entries: HashMap::new(),
        }
    }

    /// Return the cached table for these bytes, parsing them on a miss.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<Rc<LoadedTable>, ReportError> {
        let key = content_key(bytes);
        if let Some(table) = self.entries.get(&key) {
            log::debug!("table cache hit for {}", &key[..12]);
            return Ok(Rc::clone(table));
        }
        let (rows, has_region) = parse_table(bytes)?;
        let table = Rc::new(normalize(rows, has_region, &self.region_target));
        self.entries.insert(key, Rc::clone(&table));
        Ok(table)
    }

    /// Drop every cached table. Called when a new file is uploaded.
    pub fn invalidate(&mut self) {
        if self.len() > 0 {
            log::debug!("invalidating {} cached table(s)", self.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn content_key(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read the raw bytes of a data file, reporting the path and whether it
/// exists when that fails.
pub fn read_source(path: &Path) -> Result<Vec<u8>, ReportError> {
    std::fs::read(path).map_err(|source| ReportError::Unreadable {
        path: path.to_path_buf(),
        exists: path.exists(),
        source,
    })
}

/// Split the file into raw rows. Returns whether the region column exists.
pub fn parse_table(bytes: &[u8]) -> Result<(Vec<RawRow>, bool), ReportError> {
    if bytes.starts_with(ZIP_MAGIC) {
        read_xlsx(bytes)
    } else {
        read_csv(bytes)
    }
}

fn check_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Result<bool, ReportError> {
    let present: Vec<&str> = headers.collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::MissingColumns(missing));
    }
    Ok(present.contains(&COL_REGION))
}

fn read_csv(bytes: &[u8]) -> Result<(Vec<RawRow>, bool), ReportError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);
    let has_region = check_columns(rdr.headers()?.iter())?;

    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawRow>() {
        let row = result?;
        if is_blank(&row) {
            continue;
        }
        rows.push(row);
    }
    Ok((rows, has_region))
}

fn read_xlsx(bytes: &[u8]) -> Result<(Vec<RawRow>, bool), ReportError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| ReportError::Workbook(format!("failed to open xlsx: {e}")))?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or(ReportError::EmptyWorkbook)?
        .map_err(|e| ReportError::Workbook(format!("failed to read first sheet: {e}")))?;

    let mut sheet_rows = sheet.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|r| r.iter().map(|c| cell_text(c).unwrap_or_default()).collect())
        .unwrap_or_default();
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let has_region = check_columns(headers.iter().map(String::as_str))?;

    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();
    let cell = |row: &[Data], col: &str| -> Option<String> {
        index.get(col).and_then(|i| row.get(*i)).and_then(cell_text)
    };

    let mut rows = Vec::new();
    for r in sheet_rows {
        let row = RawRow {
            region: cell(r, COL_REGION),
            gender: cell(r, COL_GENDER),
            category: cell(r, COL_CATEGORY),
            year: cell(r, COL_YEAR),
            month: cell(r, COL_MONTH),
            count: cell(r, COL_COUNT),
        };
        if is_blank(&row) {
            continue;
        }
        rows.push(row);
    }
    Ok((rows, has_region))
}

/// Render a spreadsheet cell as text. Integral floats lose their `.0` so a
/// year cell of `2023.0` reads as `2023`.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        other => Some(other.to_string()),
    }
}

fn is_blank(row: &RawRow) -> bool {
    [
        &row.region,
        &row.gender,
        &row.category,
        &row.year,
        &row.month,
        &row.count,
    ]
    .iter()
    .all(|c| c.as_deref().map_or(true, |s| s.trim().is_empty()))
}

/// Clean raw rows into records.
///
/// Malformed cells never fail the load: counts default to 0 (negatives are
/// clamped), unknown months become January and missing years stay `None`
/// while the period falls back to year 2000. Each correction is tallied in
/// the returned [`LoadReport`].
pub fn normalize(rows: Vec<RawRow>, has_region: bool, region_target: &str) -> LoadedTable {
    let target = region_target.trim().to_uppercase();
    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let region = if has_region {
            let region = row
                .region
                .as_deref()
                .map(|s| s.trim().to_uppercase())
                .unwrap_or_default();
            if !region.contains(&target) {
                report.region_dropped += 1;
                continue;
            }
            Some(region)
        } else {
            None
        };

        let count = match parse_f64_safe(row.count.as_deref()) {
            Some(v) if v < 0.0 => {
                report.negative_counts += 1;
                0
            }
            Some(v) if v > MAX_COUNT as f64 => {
                report.oversized_counts += 1;
                MAX_COUNT
            }
            Some(v) => v.trunc() as u64,
            None => {
                report.defaulted_counts += 1;
                0
            }
        };

        let month = normalize_month_label(row.month.as_deref());
        if !is_known_month(&month) {
            report.defaulted_months += 1;
        }
        let month_num = month_to_num(Some(&month));

        let year = parse_year_safe(row.year.as_deref());
        if year.is_none() {
            report.missing_years += 1;
        }

        records.push(Record {
            region,
            gender: row
                .gender
                .as_deref()
                .map(|s| s.trim().to_uppercase())
                .unwrap_or_default(),
            category: row
                .category
                .as_deref()
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            year,
            month,
            month_num,
            count,
            period: period_for(year, month_num),
        });
    }

    report.kept_rows = records.len();
    log::info!(
        "normalized {} of {} rows ({} outside region {})",
        report.kept_rows,
        report.total_rows,
        report.region_dropped,
        target
    );
    if report.defaulted_counts > 0 || report.negative_counts > 0 {
        log::warn!(
            "{} non-numeric and {} negative counts set to 0",
            report.defaulted_counts,
            report.negative_counts
        );
    }
    if report.oversized_counts > 0 {
        log::warn!(
            "{} counts above {} clamped",
            report.oversized_counts,
            MAX_COUNT
        );
    }
    if report.defaulted_months > 0 || report.missing_years > 0 {
        log::warn!(
            "{} rows defaulted to January, {} rows without a year",
            report.defaulted_months,
            report.missing_years
        );
    }

    LoadedTable {
        records,
        report,
        has_region,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;

    const CSV: &str = "\
nama_kabupaten_kota,jenis_kelamin,kategori_kejahatan,tahun,bulan,jumlah_narapidana
Kota Cirebon ,Laki-Laki, Narkotika ,2023,Februari,5
KABUPATEN CIREBON,perempuan,Pencurian,2023,maret,2
Kota Bandung,LAKI-LAKI,Narkotika,2023,Maret,40
Kab. Cirebon,LAKI-LAKI,Penipuan,,bulan?,abc
Kab. Cirebon,PEREMPUAN,Penipuan,2022.0,Juni,-4
";

    fn load(csv: &str) -> LoadedTable {
        let (rows, has_region) = parse_table(csv.as_bytes()).unwrap();
        normalize(rows, has_region, "cirebon")
    }

    #[test]
    fn scenario_a_row_is_normalized() {
        let table = load(CSV);
        let r = &table.records[0];
        assert_eq!(r.gender, "LAKI-LAKI");
        assert_eq!(r.category, "Narkotika");
        assert_eq!(r.region.as_deref(), Some("KOTA CIREBON"));
        assert_eq!(r.month, "FEBRUARI");
        assert_eq!(r.year, Some(2023));
        assert_eq!(r.count, 5);
        assert_eq!(r.period, NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
    }

    #[test]
    fn region_filter_keeps_only_target() {
        let table = load(CSV);
        assert_eq!(table.report.total_rows, 5);
        assert_eq!(table.report.region_dropped, 1);
        assert_eq!(table.records.len(), 4);
        assert!(table.has_region);
        assert!(table
            .records
            .iter()
            .all(|r| r.region.as_deref().unwrap().contains("CIREBON")));
    }

    #[test]
    fn malformed_cells_are_defaulted() {
        let table = load(CSV);
        let bad = &table.records[2];
        assert_eq!(bad.count, 0);
        assert_eq!(bad.year, None);
        assert_eq!(bad.month_num, 1);
        assert_eq!(bad.period, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());

        let negative = &table.records[3];
        assert_eq!(negative.count, 0);
        assert_eq!(negative.year, Some(2022));

        assert_eq!(table.report.defaulted_counts, 1);
        assert_eq!(table.report.negative_counts, 1);
        assert_eq!(table.report.defaulted_months, 1);
        assert_eq!(table.report.missing_years, 1);
    }

    #[test]
    fn oversized_counts_are_clamped() {
        let csv = "jenis_kelamin,kategori_kejahatan,tahun,bulan,jumlah_narapidana\n\
                   L,Narkotika,2023,Januari,99999999999999999999\n\
                   L,Narkotika,2023,Januari,99999999999999999999\n\
                   P,Narkotika,2023,Januari,4294967295\n";
        let table = load(csv);
        let counts: Vec<u64> = table.records.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![MAX_COUNT, MAX_COUNT, MAX_COUNT]);
        assert_eq!(table.report.oversized_counts, 2);

        let d = crate::reports::build_dashboard(&table.records, &Default::default(), 1200);
        assert_eq!(d.total, 3 * MAX_COUNT);
        assert_eq!(d.cumulative.last().unwrap().cumulative, 3 * MAX_COUNT);
        assert_eq!(d.yoy[0].total, 3 * MAX_COUNT);
    }

    #[test]
    fn missing_region_column_skips_filter() {
        let csv = "jenis_kelamin,kategori_kejahatan,tahun,bulan,jumlah_narapidana\n\
                   L,Narkotika,2023,Januari,3\n";
        let table = load(csv);
        assert!(!table.has_region);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].region, None);
    }

    #[test]
    fn missing_required_columns_are_named() {
        let csv = "jenis_kelamin,tahun,bulan\nL,2023,Januari\n";
        let err = parse_table(csv.as_bytes()).unwrap_err();
        match err {
            ReportError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["kategori_kejahatan", "jumlah_narapidana"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_xlsx_workbooks() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = [
            "jenis_kelamin",
            "kategori_kejahatan",
            "tahun",
            "bulan",
            "jumlah_narapidana",
        ];
        for (c, h) in headers.iter().enumerate() {
            sheet.write_string(0, c as u16, *h).unwrap();
        }
        sheet.write_string(1, 0, "Perempuan").unwrap();
        sheet.write_string(1, 1, "Narkotika").unwrap();
        sheet.write_number(1, 2, 2023.0).unwrap();
        sheet.write_string(1, 3, "Oktober").unwrap();
        sheet.write_number(1, 4, 7.9).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let (rows, has_region) = parse_table(&bytes).unwrap();
        let table = normalize(rows, has_region, "CIREBON");
        assert_eq!(table.records.len(), 1);
        let r = &table.records[0];
        assert_eq!(r.gender, "PEREMPUAN");
        assert_eq!(r.year, Some(2023));
        assert_eq!(r.count, 7);
        assert_eq!(r.period, NaiveDate::from_ymd_opt(2023, 10, 1).unwrap());
    }

    #[test]
    fn cache_is_keyed_by_content() {
        let mut cache = TableCache::new("CIREBON");
        let a = cache.load_bytes(CSV.as_bytes()).unwrap();
        let b = cache.load_bytes(CSV.as_bytes()).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let other = CSV.replace("5\n", "6\n");
        let c = cache.load_bytes(other.as_bytes()).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert_eq!(cache.len(), 0);
        let d = cache.load_bytes(CSV.as_bytes()).unwrap();
        assert!(!Rc::ptr_eq(&a, &d));
        assert_eq!(a.records, d.records);
    }

    #[test]
    fn unreadable_source_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");
        match read_source(&path).unwrap_err() {
            ReportError::Unreadable { path: p, exists, .. } => {
                assert_eq!(p, path);
                assert!(!exists);
            }
            other => panic!("unexpected error: {other}"),
        }

        let present = dir.path().join("data.csv");
        std::fs::write(&present, CSV).unwrap();
        assert_eq!(read_source(&present).unwrap(), CSV.as_bytes());
    }
}
