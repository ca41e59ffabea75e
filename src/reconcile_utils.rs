// reconcile_utils.rs
use crate::district_utils::{DistrictResolver, DISTRICT_SUFFIX};
use crate::error_utils::SeoulError;
use crate::geocode_utils::Geocoder;
use crate::rate_utils::{normalize_category, round_to};
use crate::tabular_utils::TableBuilder;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const NUM_CRIME_TYPES: usize = 5;
/// The five crime categories carried by crime.csv, in column order.
pub const CRIME_TYPES: [&str; NUM_CRIME_TYPES] = ["살인", "강도", "강간", "절도", "폭력"];

/// Known data-quality fixes: district name → corrected population. The
/// historic central district's population cell in pop.xls is unreliable, so
/// it is patched here after the merge. Extend this table rather than the
/// reconciliation logic when further corrections surface.
pub const POPULATION_OVERRIDES: [(&str, f64); 1] = [("종로구", 162820.0)];

pub const STATION_COLUMN: &str = "관서명";
pub const DISTRICT_COLUMN: &str = "자치구";
pub const POPULATION_COLUMN: &str = "인구";
pub const CCTV_DISTRICT_COLUMN: &str = "기관명";

/// CCTV installation-year columns dropped before use; the district key
/// must survive the drop.
pub const CCTV_DROP_COLUMNS: [&str; 4] = ["2013년도 이전", "2014년", "2015년", "2016년"];

// pop.xls layout: district name in column 2, population in column 4, first
// three data rows are header/metadata.
const POP_DISTRICT_INDEX: usize = 1;
const POP_POPULATION_INDEX: usize = 3;
const POP_METADATA_ROWS: usize = 3;

pub fn occurrence_column(crime_type: &str) -> String {
    format!("{} 발생", crime_type)
}

pub fn clearance_column(crime_type: &str) -> String {
    format!("{} 검거", crime_type)
}

/// One crime-table row: a station name plus per-category incident counts.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub station: String,
    pub occurrences: [f64; NUM_CRIME_TYPES],
    pub clearances: [f64; NUM_CRIME_TYPES],
}

/// A district name plus its parsed population count.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub district: String,
    pub population: f64,
}

/// Per-district crime counts after duplicate-district aggregation. The
/// station field keeps the first contributor in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictCrime {
    pub district: String,
    pub station: String,
    pub occurrences: [f64; NUM_CRIME_TYPES],
    pub clearances: [f64; NUM_CRIME_TYPES],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeCategoryStats {
    pub crime_type: String,
    pub occurrences: f64,
    pub clearances: f64,
    /// Incidents per 100,000 population, rounded to 1 decimal. Defined as
    /// 0.0 when the population is 0 or missing.
    pub occurrence_rate_per_100k: f64,
    /// Clearances as a percentage of occurrences, rounded to 1 decimal.
    /// Defined as 0.0 when there are no occurrences.
    pub clearance_rate_percent: f64,
    /// Relative severity in [0, 1]: this category's rate divided by the
    /// category maximum across districts.
    pub normalized_rate: f64,
}

/// The final per-district record. One row per unique normalized district
/// name; no duplicates survive reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledDistrictRow {
    pub district: String,
    pub station: String,
    pub population: f64,
    pub categories: Vec<CrimeCategoryStats>,
}

/// Parses a numeric cell permissively: group separators are stripped, the
/// remainder is parsed as a float, and anything malformed becomes 0.0. A
/// single bad cell never aborts the batch.
///
/// ```
/// use seoulcrime::reconcile_utils::parse_numeric;
///
/// assert_eq!(parse_numeric("162,820"), 162820.0);
/// assert_eq!(parse_numeric("  3 "), 3.0);
/// assert_eq!(parse_numeric("n/a"), 0.0);
/// ```
pub fn parse_numeric(cell: &str) -> f64 {
    cell.replace(',', "").trim().parse::<f64>().unwrap_or(0.0)
}

/// Normalizes a district-name string: surrounding whitespace stripped, then
/// surrounding double/single quotes, then whitespace again.
pub fn normalize_district(name: &str) -> String {
    name.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn comparable_stem(name: &str) -> String {
    name.chars()
        .filter(|c| *c != DISTRICT_SUFFIX && !c.is_whitespace())
        .collect()
}

/// Searches `candidates` for a name "similar" to `target`, applying three
/// equality-relaxed rules in order: exact match, substring containment in
/// either direction, then equality after dropping the district suffix and
/// any interior whitespace (which is how a quirky "종로 구" still finds
/// "종로구").
///
/// The substring rule can false-match when one district name contains
/// another; that ambiguity is inherited from the source data policy and is
/// deliberately not second-guessed here.
pub fn match_similar_district(target: &str, candidates: &[String]) -> Option<String> {
    if let Some(exact) = candidates.iter().find(|c| c.as_str() == target) {
        return Some(exact.clone());
    }

    candidates
        .iter()
        .find(|c| {
            c.contains(target)
                || target.contains(c.as_str())
                || comparable_stem(c) == comparable_stem(target)
        })
        .cloned()
}

/// Extracts typed station records from the raw crime table. Missing key
/// columns are fatal; malformed numeric cells default to 0.0.
pub fn station_records(crime: &TableBuilder) -> Result<Vec<StationRecord>, SeoulError> {
    let station_idx = crime.require_column(STATION_COLUMN)?;

    let mut occurrence_indices = [0usize; NUM_CRIME_TYPES];
    let mut clearance_indices = [0usize; NUM_CRIME_TYPES];
    for (i, crime_type) in CRIME_TYPES.iter().enumerate() {
        occurrence_indices[i] = crime.require_column(&occurrence_column(crime_type))?;
        clearance_indices[i] = crime.require_column(&clearance_column(crime_type))?;
    }

    let mut records = Vec::with_capacity(crime.row_count());
    for row in crime.get_data() {
        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

        let mut occurrences = [0.0; NUM_CRIME_TYPES];
        let mut clearances = [0.0; NUM_CRIME_TYPES];
        for i in 0..NUM_CRIME_TYPES {
            occurrences[i] = parse_numeric(cell(occurrence_indices[i]));
            clearances[i] = parse_numeric(cell(clearance_indices[i]));
        }

        records.push(StationRecord {
            station: cell(station_idx).trim().to_string(),
            occurrences,
            clearances,
        });
    }

    Ok(records)
}

/// Extracts population records from the population sheet by position:
/// district in the second column, population in the fourth, first three
/// data rows skipped as metadata.
pub fn population_records(population: &TableBuilder) -> Result<Vec<PopulationRecord>, SeoulError> {
    if population.get_headers().len() <= POP_POPULATION_INDEX {
        return Err(SeoulError::MissingColumn(POPULATION_COLUMN.to_string()));
    }

    let mut records = Vec::new();
    for row in population.get_data().iter().skip(POP_METADATA_ROWS) {
        let district = normalize_district(
            row.get(POP_DISTRICT_INDEX).map(String::as_str).unwrap_or(""),
        );
        if district.is_empty() {
            continue;
        }

        let population = parse_numeric(
            row.get(POP_POPULATION_INDEX)
                .map(String::as_str)
                .unwrap_or(""),
        );
        records.push(PopulationRecord {
            district,
            population,
        });
    }

    Ok(records)
}

/// Aggregates station records that resolved to the same district by summing
/// each occurrence/clearance column. The station name of an aggregated row
/// keeps the first contributor's value (first seen in input order).
pub fn aggregate_by_district(resolved: Vec<(String, StationRecord)>) -> Vec<DistrictCrime> {
    let mut by_district: HashMap<String, usize> = HashMap::new();
    let mut aggregated: Vec<DistrictCrime> = Vec::new();

    for (district, record) in resolved {
        match by_district.get(&district).copied() {
            Some(idx) => {
                let existing = &mut aggregated[idx];
                for i in 0..NUM_CRIME_TYPES {
                    existing.occurrences[i] += record.occurrences[i];
                    existing.clearances[i] += record.clearances[i];
                }
            }
            None => {
                by_district.insert(district.clone(), aggregated.len());
                aggregated.push(DistrictCrime {
                    district,
                    station: record.station,
                    occurrences: record.occurrences,
                    clearances: record.clearances,
                });
            }
        }
    }

    aggregated
}

/// Remaps population-table district names onto the crime table's names for
/// crime districts with no exact population match; the crime table is
/// authoritative for naming. Every applied mapping is logged.
pub fn remap_similar_districts(
    population: &mut [PopulationRecord],
    crime_districts: &[String],
) {
    for crime_district in crime_districts {
        let pop_names: Vec<String> = population.iter().map(|r| r.district.clone()).collect();
        if pop_names.iter().any(|name| name == crime_district) {
            continue;
        }

        if let Some(similar) = match_similar_district(crime_district, &pop_names) {
            log::info!(
                "district name mapping: population '{}' → crime '{}'",
                similar,
                crime_district
            );
            for record in population.iter_mut() {
                if record.district == similar {
                    record.district = crime_district.clone();
                    break;
                }
            }
        }
    }
}

/// Joins crime, population and CCTV tables into one row per district and
/// derives the rate columns. Owns the tables for the duration of one pass;
/// every step is a pure transformation over typed records.
pub struct TableReconciler {
    geocoder: Arc<dyn Geocoder>,
}

impl TableReconciler {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        TableReconciler { geocoder }
    }

    /// Runs the full reconciliation pass:
    ///
    /// 1. resolve each crime-table station to a district (geocoder fallback),
    /// 2. normalize district names in both crime and population tables,
    /// 3. aggregate duplicate districts by summing counts,
    /// 4. remap similar population names onto crime names,
    /// 5. left-join population onto crime (missing population filled as 0),
    /// 6. apply the population override table,
    /// 7. derive per-100k occurrence rates, clearance percentages, and the
    ///    normalized [0, 1] severity score per category.
    ///
    /// File/schema-level problems are fatal; anything scoped to one station
    /// or one cell is logged and defaulted.
    pub async fn reconcile(
        &self,
        crime: &TableBuilder,
        population: &TableBuilder,
        cctv: &TableBuilder,
    ) -> Result<Vec<ReconciledDistrictRow>, SeoulError> {
        cctv.require_column(CCTV_DISTRICT_COLUMN)?;
        let known_districts: HashSet<String> = cctv
            .get_unique(CCTV_DISTRICT_COLUMN)
            .iter()
            .map(|name| normalize_district(name))
            .collect();

        let resolver =
            DistrictResolver::new(Arc::clone(&self.geocoder), known_districts);

        let records = station_records(crime)?;
        log::info!("resolving districts for {} stations", records.len());

        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            let resolution = resolver.station_to_district(&record.station).await;
            if !resolution.is_resolved() {
                log::warn!(
                    "station '{}' left with best-effort district '{}'",
                    record.station,
                    resolution.district()
                );
            }
            resolved.push((normalize_district(resolution.district()), record));
        }

        let districts = aggregate_by_district(resolved);
        log::info!("aggregated to {} districts", districts.len());

        let mut population_records = population_records(population)?;
        let crime_district_names: Vec<String> =
            districts.iter().map(|d| d.district.clone()).collect();
        remap_similar_districts(&mut population_records, &crime_district_names);

        let mut population_by_district: HashMap<String, f64> = HashMap::new();
        for record in &population_records {
            population_by_district
                .entry(record.district.clone())
                .or_insert(record.population);
        }

        let overrides: HashMap<&str, f64> = POPULATION_OVERRIDES.iter().copied().collect();

        let mut rows: Vec<ReconciledDistrictRow> = districts
            .into_iter()
            .map(|district_crime| {
                let mut population = population_by_district
                    .get(&district_crime.district)
                    .copied()
                    .unwrap_or_else(|| {
                        log::warn!(
                            "no population data for district '{}', defaulting to 0",
                            district_crime.district
                        );
                        0.0
                    });

                if let Some(&corrected) = overrides.get(district_crime.district.as_str()) {
                    if population != corrected {
                        log::info!(
                            "population override for '{}': {} → {}",
                            district_crime.district,
                            population,
                            corrected
                        );
                        population = corrected;
                    }
                }

                let categories = CRIME_TYPES
                    .iter()
                    .enumerate()
                    .map(|(i, crime_type)| {
                        let occurrences = district_crime.occurrences[i];
                        let clearances = district_crime.clearances[i];

                        let occurrence_rate_per_100k = if population > 0.0 {
                            round_to(occurrences / population * 100_000.0, 1)
                        } else {
                            0.0
                        };
                        let clearance_rate_percent = if occurrences > 0.0 {
                            round_to(clearances / occurrences * 100.0, 1)
                        } else {
                            0.0
                        };

                        CrimeCategoryStats {
                            crime_type: crime_type.to_string(),
                            occurrences,
                            clearances,
                            occurrence_rate_per_100k,
                            clearance_rate_percent,
                            normalized_rate: 0.0,
                        }
                    })
                    .collect();

                ReconciledDistrictRow {
                    district: district_crime.district,
                    station: district_crime.station,
                    population,
                    categories,
                }
            })
            .collect();

        attach_normalized_rates(&mut rows);

        Ok(rows)
    }
}

/// Fills in the normalized [0, 1] score for each category column across all
/// districts.
fn attach_normalized_rates(rows: &mut [ReconciledDistrictRow]) {
    for i in 0..NUM_CRIME_TYPES {
        let column: Vec<f64> = rows
            .iter()
            .map(|row| row.categories[i].occurrence_rate_per_100k)
            .collect();
        let normalized = normalize_category(&column);
        for (row, value) in rows.iter_mut().zip(normalized) {
            row.categories[i].normalized_rate = value;
        }
    }
}

/// Lays reconciled rows back out as a flat table in the shape the CSV sink
/// expects: station, interleaved count columns, district, population, then
/// the derived rate columns.
pub fn rows_to_table(rows: &[ReconciledDistrictRow]) -> TableBuilder {
    let mut headers: Vec<String> = vec![STATION_COLUMN.to_string()];
    for crime_type in &CRIME_TYPES {
        headers.push(occurrence_column(crime_type));
        headers.push(clearance_column(crime_type));
    }
    headers.push(DISTRICT_COLUMN.to_string());
    headers.push(POPULATION_COLUMN.to_string());
    for crime_type in &CRIME_TYPES {
        headers.push(format!("{} 발생율", crime_type));
    }
    for crime_type in &CRIME_TYPES {
        headers.push(format!("{} 검거율", crime_type));
    }
    for crime_type in &CRIME_TYPES {
        headers.push(format!("{} 정규화", crime_type));
    }

    let data = rows
        .iter()
        .map(|row| {
            let mut record: Vec<String> = vec![row.station.clone()];
            for stats in &row.categories {
                record.push(format!("{:.0}", stats.occurrences));
                record.push(format!("{:.0}", stats.clearances));
            }
            record.push(row.district.clone());
            record.push(format!("{:.0}", row.population));
            for stats in &row.categories {
                record.push(format!("{:.1}", stats.occurrence_rate_per_100k));
            }
            for stats in &row.categories {
                record.push(format!("{:.1}", stats.clearance_rate_percent));
            }
            for stats in &row.categories {
                record.push(format!("{:.4}", stats.normalized_rate));
            }
            record
        })
        .collect();

    TableBuilder::from_raw_data(headers, data)
}

/// Source-file and output-artifact locations for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub data_dir: String,
    pub save_dir: String,
}

impl TableReconciler {
    /// Loads cctv.csv, crime.csv and pop.xls from the configured data
    /// directory, reconciles them, and overwrites the reconciled CSV in the
    /// save directory. Every run re-reads and re-joins from scratch.
    pub async fn preprocess(
        &self,
        config: &ReconcileConfig,
    ) -> anyhow::Result<Vec<ReconciledDistrictRow>> {
        log::info!("preprocess start: data_dir={}", config.data_dir);

        let mut cctv = TableBuilder::from_csv(&format!("{}/cctv.csv", config.data_dir))?;
        cctv.drop_columns(CCTV_DROP_COLUMNS.to_vec()).trim_all();

        let crime = TableBuilder::from_csv(&format!("{}/crime.csv", config.data_dir))?;
        let population =
            TableBuilder::from_spreadsheet(&format!("{}/pop.xls", config.data_dir))?;

        let rows = self.reconcile(&crime, &population, &cctv).await?;

        std::fs::create_dir_all(&config.save_dir)?;
        let out_path = format!("{}/crime_with_gu.csv", config.save_dir);
        rows_to_table(&rows).save_as(&out_path)?;
        log::info!("reconciled table saved: {}", out_path);

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode_utils::GeocodeResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGeocoder {
        calls: AtomicUsize,
        result: Option<GeocodeResult>,
    }

    impl MockGeocoder {
        fn returning(result: Option<GeocodeResult>) -> Arc<Self> {
            Arc::new(MockGeocoder {
                calls: AtomicUsize::new(0),
                result,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn resolve(&self, _query: &str) -> Result<Option<GeocodeResult>, SeoulError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn crime_row(station: &str, counts: [&str; 10]) -> Vec<String> {
        let mut row = vec![station.to_string()];
        row.extend(counts.iter().map(|c| c.to_string()));
        row
    }

    fn crime_headers() -> Vec<String> {
        let mut headers = vec![STATION_COLUMN.to_string()];
        for crime_type in &CRIME_TYPES {
            headers.push(occurrence_column(crime_type));
            headers.push(clearance_column(crime_type));
        }
        headers
    }

    fn cctv_table() -> TableBuilder {
        TableBuilder::from_raw_data(
            vec![CCTV_DISTRICT_COLUMN.to_string(), "소계".to_string()],
            vec![
                vec!["강남구".to_string(), "2780".to_string()],
                vec!["마포구".to_string(), "574".to_string()],
                vec!["종로구".to_string(), "1002".to_string()],
            ],
        )
    }

    fn population_table(rows: Vec<(&str, &str)>) -> TableBuilder {
        let headers = vec![
            "기간".to_string(),
            "자치구".to_string(),
            "세대".to_string(),
            "인구".to_string(),
        ];
        let mut data = vec![
            vec!["기간".to_string(), "자치구".to_string(), "세대".to_string(), "인구".to_string()],
            vec!["2024".to_string(), "합계".to_string(), "4,469,417".to_string(), "9,384,512".to_string()],
            vec!["2024".to_string(), "소계".to_string(), "".to_string(), "".to_string()],
        ];
        for (district, population) in rows {
            data.push(vec![
                "2024".to_string(),
                district.to_string(),
                "".to_string(),
                population.to_string(),
            ]);
        }
        TableBuilder::from_raw_data(headers, data)
    }

    #[test]
    fn parse_numeric_handles_group_separators_and_garbage() {
        assert_eq!(parse_numeric("162,820"), 162820.0);
        assert_eq!(parse_numeric(" 1,234,567 "), 1234567.0);
        assert_eq!(parse_numeric("-"), 0.0);
        assert_eq!(parse_numeric(""), 0.0);
    }

    #[test]
    fn normalize_district_strips_whitespace_and_quotes() {
        assert_eq!(normalize_district("  \"강남구\"  "), "강남구");
        assert_eq!(normalize_district("'마포구'"), "마포구");
        assert_eq!(normalize_district(" 종로구 "), "종로구");
    }

    #[test]
    fn similar_district_matches_exact_substring_and_stem() {
        let candidates = vec!["종로구".to_string(), "강남구".to_string()];
        assert_eq!(
            match_similar_district("종로구", &candidates),
            Some("종로구".to_string())
        );
        assert_eq!(
            match_similar_district("종로 구", &candidates),
            Some("종로구".to_string())
        );
        assert_eq!(
            match_similar_district("강남", &candidates),
            Some("강남구".to_string())
        );
        assert_eq!(match_similar_district("은평구", &candidates), None);
    }

    #[test]
    fn duplicate_districts_aggregate_by_summing_counts() {
        let record_a = StationRecord {
            station: "강남서".to_string(),
            occurrences: [3.0, 1.0, 0.0, 10.0, 20.0],
            clearances: [2.0, 1.0, 0.0, 5.0, 15.0],
        };
        let record_b = StationRecord {
            station: "수서서".to_string(),
            occurrences: [5.0, 0.0, 2.0, 4.0, 6.0],
            clearances: [4.0, 0.0, 1.0, 2.0, 3.0],
        };

        let aggregated = aggregate_by_district(vec![
            ("강남구".to_string(), record_a),
            ("강남구".to_string(), record_b),
        ]);

        assert_eq!(aggregated.len(), 1);
        let row = &aggregated[0];
        // 살인 발생: 3 + 5
        assert_eq!(row.occurrences[0], 8.0);
        assert_eq!(row.clearances[4], 18.0);
        assert_eq!(row.station, "강남서");
    }

    #[test]
    fn population_records_skip_metadata_and_parse_counts() {
        let table = population_table(vec![("마포구", "372,745"), ("강남구", "562,000")]);
        let records = population_records(&table).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].district, "마포구");
        assert_eq!(records[0].population, 372745.0);
    }

    #[test]
    fn remap_renames_similar_population_names_to_crime_names() {
        let mut population = vec![PopulationRecord {
            district: "종로구".to_string(),
            population: 150000.0,
        }];
        remap_similar_districts(&mut population, &["종로 구".to_string()]);
        assert_eq!(population[0].district, "종로 구");
    }

    #[tokio::test]
    async fn known_station_resolves_offline_and_joins_population() {
        let geocoder = MockGeocoder::returning(None);
        let reconciler = TableReconciler::new(geocoder.clone());

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![crime_row(
                "마포서",
                ["2", "2", "7", "7", "74", "63", "912", "813", "2,034", "1,678"],
            )],
        );
        let population = population_table(vec![("마포구", "372,745")]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        assert_eq!(geocoder.call_count(), 0);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.district, "마포구");
        assert_eq!(row.population, 372745.0);
        // 절도: 912 / 372745 * 100000 = 244.67 → 244.7
        assert_eq!(row.categories[3].occurrence_rate_per_100k, 244.7);
        // 살인 검거율: 2 / 2 * 100
        assert_eq!(row.categories[0].clearance_rate_percent, 100.0);
    }

    #[tokio::test]
    async fn unknown_station_is_resolved_through_geocoder_address() {
        let geocoder = MockGeocoder::returning(Some(GeocodeResult {
            address: "서울특별시 강남구 방배동".to_string(),
            lat: 37.48,
            lng: 127.01,
        }));
        let reconciler = TableReconciler::new(geocoder.clone());

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![crime_row(
                "방배서",
                ["1", "1", "2", "2", "10", "9", "100", "90", "200", "180"],
            )],
        );
        let population = population_table(vec![("강남구", "562,000")]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(rows[0].district, "강남구");
        assert_eq!(rows[0].population, 562000.0);
    }

    #[tokio::test]
    async fn missing_population_defaults_to_zero_rate_never_infinite() {
        let geocoder = MockGeocoder::returning(None);
        let reconciler = TableReconciler::new(geocoder);

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![crime_row(
                "마포서",
                ["2", "1", "0", "0", "5", "4", "10", "8", "20", "15"],
            )],
        );
        let population = population_table(vec![]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        let row = &rows[0];
        assert_eq!(row.population, 0.0);
        for stats in &row.categories {
            assert_eq!(stats.occurrence_rate_per_100k, 0.0);
            assert!(stats.occurrence_rate_per_100k.is_finite());
        }
        // 강도: 0 occurrences → clearance rate 0, not NaN.
        assert_eq!(row.categories[1].clearance_rate_percent, 0.0);
    }

    #[tokio::test]
    async fn population_override_patches_the_historic_central_district() {
        let geocoder = MockGeocoder::returning(None);
        let reconciler = TableReconciler::new(geocoder);

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![crime_row(
                "종로서",
                ["3", "3", "4", "4", "30", "25", "300", "250", "600", "500"],
            )],
        );
        // pop.xls carries a stale value for this district.
        let population = population_table(vec![("종로구", "11,111")]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        assert_eq!(rows[0].district, "종로구");
        assert_eq!(rows[0].population, 162820.0);
        // 살인: 3 / 162820 * 100000 = 1.84 → 1.8
        assert_eq!(rows[0].categories[0].occurrence_rate_per_100k, 1.8);
    }

    #[tokio::test]
    async fn quirky_district_spelling_reconciles_through_similarity_rule() {
        // The population sheet spells the district with an interior space
        // ("마포 구"); the suffix-stripped rule must still unify it with the
        // crime table's "마포구", which stays authoritative.
        let geocoder = MockGeocoder::returning(None);
        let reconciler = TableReconciler::new(geocoder);

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![crime_row(
                "마포서",
                ["1", "1", "1", "1", "5", "5", "50", "40", "100", "80"],
            )],
        );
        let population = population_table(vec![("마포 구", "372,745")]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].district, "마포구");
        assert_eq!(rows[0].population, 372745.0);
    }

    #[tokio::test]
    async fn normalized_rates_span_unit_interval_across_districts() {
        let geocoder = MockGeocoder::returning(None);
        let reconciler = TableReconciler::new(geocoder);

        let crime = TableBuilder::from_raw_data(
            crime_headers(),
            vec![
                crime_row("마포서", ["4", "4", "2", "2", "8", "8", "80", "70", "160", "150"]),
                crime_row("강남서", ["2", "2", "1", "1", "4", "4", "40", "35", "80", "75"]),
            ],
        );
        let population =
            population_table(vec![("마포구", "100,000"), ("강남구", "100,000")]);

        let rows = reconciler
            .reconcile(&crime, &population, &cctv_table())
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for i in 0..NUM_CRIME_TYPES {
            assert_eq!(rows[0].categories[i].normalized_rate, 1.0);
            assert_eq!(rows[1].categories[i].normalized_rate, 0.5);
        }
    }

    #[test]
    fn rows_to_table_lays_out_counts_district_population_then_rates() {
        let rows = vec![ReconciledDistrictRow {
            district: "마포구".to_string(),
            station: "마포서".to_string(),
            population: 372745.0,
            categories: CRIME_TYPES
                .iter()
                .map(|crime_type| CrimeCategoryStats {
                    crime_type: crime_type.to_string(),
                    occurrences: 10.0,
                    clearances: 8.0,
                    occurrence_rate_per_100k: 2.7,
                    clearance_rate_percent: 80.0,
                    normalized_rate: 0.5,
                })
                .collect(),
        }];

        let table = rows_to_table(&rows);
        let headers = table.get_headers();
        assert_eq!(headers[0], STATION_COLUMN);
        assert_eq!(headers[1], "살인 발생");
        assert_eq!(headers[2], "살인 검거");
        assert_eq!(headers[11], DISTRICT_COLUMN);
        assert_eq!(headers[12], POPULATION_COLUMN);
        assert_eq!(headers[13], "살인 발생율");
        assert_eq!(headers[18], "살인 검거율");
        assert_eq!(headers[23], "살인 정규화");

        let record = &table.get_data()[0];
        assert_eq!(record[0], "마포서");
        assert_eq!(record[1], "10");
        assert_eq!(record[12], "372745");
        assert_eq!(record[13], "2.7");
        assert_eq!(record[23], "0.5000");
    }
}
