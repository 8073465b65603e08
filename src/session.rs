// Per-run session state: the loaded table, the filter selectors and the
// capacity setting. Every view is recomputed from these on demand.
use crate::error::ReportError;
use crate::filter::{self, FilterOptions, FilterState};
use crate::loader::{read_source, LoadReport, LoadedTable, TableCache};
use crate::output;
use crate::reports;
use crate::types::{Dashboard, Record};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Gender,
    Category,
    Year,
    Month,
}

pub struct Session {
    cache: TableCache,
    table: Option<Rc<LoadedTable>>,
    source: Option<PathBuf>,
    filter: FilterState,
    capacity: u32,
    query: String,
}

impl Session {
    pub fn new(region_target: &str, capacity: u32) -> Self {
        Self {
            cache: TableCache::new(region_target),
            table: None,
            source: None,
            filter: FilterState::default(),
            capacity,
            query: String::new(),
        }
    }

    /// Load a file through the content cache. Reloading unchanged bytes
    /// reuses the parsed table.
    pub fn load(&mut self, path: &Path) -> Result<&LoadReport, ReportError> {
        let table = read_source(path).and_then(|bytes| self.cache.load_bytes(&bytes));
        self.finish_load(table, path)
    }

    /// Load a newly uploaded file. Earlier cached tables are dropped first.
    pub fn upload(&mut self, path: &Path) -> Result<&LoadReport, ReportError> {
        let table = read_source(path).and_then(|bytes| {
            self.cache.invalidate();
            self.cache.load_bytes(&bytes)
        });
        self.finish_load(table, path)
    }

    /// A failed load leaves no table behind, so nothing stale is rendered.
    fn finish_load(
        &mut self,
        table: Result<Rc<LoadedTable>, ReportError>,
        path: &Path,
    ) -> Result<&LoadReport, ReportError> {
        match table {
            Ok(table) => Ok(self.install(table, path)),
            Err(e) => {
                log::warn!("failed to load {}: {e}", path.display());
                self.table = None;
                self.source = None;
                Err(e)
            }
        }
    }

    fn install(&mut self, table: Rc<LoadedTable>, path: &Path) -> &LoadReport {
        let same = self
            .table
            .as_ref()
            .is_some_and(|t| Rc::ptr_eq(t, &table));
        if !same && !self.filter.is_unconstrained() {
            log::info!("new table loaded, filters reset");
            self.filter.reset();
        }
        log::info!("using {} ({} rows)", path.display(), table.records.len());
        self.source = Some(path.to_path_buf());
        &self.table.insert(table).report
    }

    fn table(&self) -> Result<&LoadedTable, ReportError> {
        self.table.as_deref().ok_or(ReportError::NoData)
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn has_region(&self) -> bool {
        self.table.as_ref().is_some_and(|t| t.has_region)
    }

    pub fn options(&self) -> Result<FilterOptions, ReportError> {
        Ok(FilterOptions::from_records(&self.table()?.records))
    }

    /// Change one selector. On error the filter state is left untouched.
    pub fn select(&mut self, field: FilterField, value: &str) -> Result<(), ReportError> {
        let opts = self.options()?;
        match field {
            FilterField::Gender => self.filter.set_gender(value, &opts),
            FilterField::Category => self.filter.set_category(value, &opts),
            FilterField::Year => self.filter.set_year(value, &opts),
            FilterField::Month => self.filter.set_month(value),
        }
    }

    pub fn reset_filters(&mut self) {
        self.filter.reset();
    }

    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), ReportError> {
        if capacity == 0 {
            return Err(ReportError::InvalidSelection {
                field: "capacity",
                value: capacity.to_string(),
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
    }

    pub fn dashboard(&self) -> Result<Dashboard, ReportError> {
        let table = self.table()?;
        Ok(reports::build_dashboard(&table.records, &self.filter, self.capacity))
    }

    /// Filtered rows narrowed by the category search, as listed and exported.
    pub fn listed_records(&self) -> Result<Vec<Record>, ReportError> {
        let table = self.table()?;
        Ok(filter::search(
            filter::apply(&table.records, &self.filter),
            &self.query,
        ))
    }

    /// Write the CSV and XLSX exports plus the JSON summary into `dir`.
    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        let records = self.listed_records()?;
        let mut written = output::export(dir, &records, self.has_region())?.to_vec();
        let summary = dir.join(output::SUMMARY_JSON);
        output::write_json(&summary, &self.dashboard()?)?;
        written.push(summary);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;

    const CSV: &str = "\
nama_kabupaten_kota,jenis_kelamin,kategori_kejahatan,tahun,bulan,jumlah_narapidana
Kota Cirebon,Laki-Laki,Narkotika,2022,Januari,100
Kota Cirebon,Perempuan,Narkotika,2023,Februari,50
Kab. Cirebon,Laki-Laki,Pencurian,2023,Februari,100
";

    fn loaded(dir: &Path) -> Session {
        let path = dir.join("data.csv");
        std::fs::write(&path, CSV).unwrap();
        let mut s = Session::new("CIREBON", 1200);
        s.load(&path).unwrap();
        s
    }

    #[test]
    fn nothing_works_before_load() {
        let s = Session::new("CIREBON", 1200);
        assert!(matches!(s.dashboard(), Err(ReportError::NoData)));
        assert!(!s.is_loaded());
    }

    #[test]
    fn missing_default_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Session::new("CIREBON", 1200);
        let err = s.load(&dir.path().join("nope.xlsx")).unwrap_err();
        assert!(err.to_string().contains("file exists: false"));
        assert!(!s.is_loaded());
    }

    #[test]
    fn selections_drive_the_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = loaded(dir.path());
        let d = s.dashboard().unwrap();
        assert_eq!(d.total, 250);
        assert_eq!(d.yoy[1].change_pct, 50.0);

        s.select(FilterField::Year, "2023").unwrap();
        s.select(FilterField::Gender, "PEREMPUAN").unwrap();
        let d = s.dashboard().unwrap();
        assert_eq!(d.total, 50);
        assert_eq!(d.densest_month, "FEBRUARI");

        assert!(s.select(FilterField::Year, "1900").is_err());
        assert_eq!(s.filter().year, Selection::Only(2023));

        s.reset_filters();
        assert!(s.filter().is_unconstrained());
    }

    #[test]
    fn capacity_must_be_positive() {
        let mut s = Session::new("CIREBON", 1200);
        assert!(s.set_capacity(0).is_err());
        assert_eq!(s.capacity(), 1200);
        s.set_capacity(500).unwrap();
        assert_eq!(s.capacity(), 500);
    }

    #[test]
    fn reload_keeps_filters_but_upload_of_new_data_resets() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = loaded(dir.path());
        s.select(FilterField::Category, "Narkotika").unwrap();

        let path = dir.path().join("data.csv");
        s.load(&path).unwrap();
        assert_eq!(s.filter().category, Selection::Only("Narkotika".into()));

        let other = dir.path().join("other.csv");
        std::fs::write(&other, CSV.replace("100\n", "10\n")).unwrap();
        s.upload(&other).unwrap();
        assert!(s.filter().is_unconstrained());
        assert_eq!(s.source(), Some(other.as_path()));
        assert_eq!(s.dashboard().unwrap().total, 70);

        assert!(s.upload(&dir.path().join("gone.csv")).is_err());
        assert!(!s.is_loaded());
        assert!(matches!(s.dashboard(), Err(ReportError::NoData)));
    }

    #[test]
    fn export_follows_filter_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = loaded(dir.path());
        s.select(FilterField::Year, "2023").unwrap();
        s.set_query("pencu");
        assert_eq!(s.listed_records().unwrap().len(), 1);

        let out = dir.path().join("out");
        let written = s.export(&out).unwrap();
        assert_eq!(written.len(), 3);
        let text = std::fs::read_to_string(out.join(output::EXPORT_CSV)).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Pencurian"));
    }
}
