// lib.rs
//! # SEOULCRIME
//!
//! A RUST-dominant data reconciliation toolkit for the Seoul district
//! crime/population/CCTV datasets 🚀. It resolves police-station names to
//! administrative districts (with a Kakao Local geocoding fallback), joins
//! the three sources on district name, and derives per-100k occurrence
//! rates, clearance percentages, and normalized severity scores ready for
//! heatmap/choropleth sinks. 💪
//!
//! ## `tabular_utils`
//!
//! - **Purpose**: Load and reshape the CSV/XLS source files.
//! - **Features**:
//!   - **TableBuilder**: headers plus string rows, with chainable methods to
//!     drop/rename/retain columns, trim cells, and skip metadata rows.
//!   - UTF-8 BOM handling on both read and write (the source files are saved
//!     as `utf-8-sig`).
//!   - Spreadsheet engine selection by extension: `.xls` via the legacy
//!     binary engine, `.xlsx` via the XML one.
//!
//! ## `geocode_utils`
//!
//! - **Purpose**: Keyword-search geocoding against the Kakao Local API.
//! - **Features**:
//!   - **Geocoder** trait as the seam for the district resolver, so tests
//!     run without the network.
//!   - **KakaoLocalClient**: one API key and HTTP client per process, loaded
//!     lazily from `KAKAO_REST_API_KEY`/`KAKAO_MAP_API_KEY` on first use.
//!   - Distinct error kinds for 403 permission denials, transient network
//!     failures, and other upstream errors; an empty result set is a normal
//!     "no result", never an abort.
//!
//! ## `district_utils`
//!
//! - **Purpose**: Map a police-station name ('…서') to its containing
//!   district ('…구').
//! - **Features**:
//!   - Deterministic suffix rewrite checked against the known-district set
//!     first, so the common case makes no network call.
//!   - Geocoder fallback with address-component search and a Hangul regex
//!     sweep over the formatted address.
//!   - Best-effort by contract: unresolved stations degrade to
//!     `Unresolved { fallback }` with a warning and the batch continues.
//!
//! ## `reconcile_utils`
//!
//! - **Purpose**: The reconciliation core: one pass from raw tables to one
//!   typed row per district.
//! - **Features**:
//!   - District-name normalization and a three-rule similarity match for
//!     near-duplicate names between tables.
//!   - Duplicate-district aggregation by summing counts.
//!   - Left-join of population onto crime data with explicit zero fill, a
//!     named population-override table, and zero-guarded rate math.
//!   - `preprocess` orchestration: load, reconcile, overwrite the reconciled
//!     CSV sink.
//!
//! ## `rate_utils`
//!
//! - **Purpose**: Rescale each crime-category rate column to [0, 1] for
//!   cross-category legends.
//! - **Features**: max-based normalization with negative clamping, rounding,
//!   and an all-zero guard; column averaging for single-value choropleths.
//!
//! ## `error_utils`
//!
//! - **Purpose**: The `SeoulError` type splitting pipeline-fatal failures
//!   (missing file, missing column, missing configuration) from per-lookup
//!   geocoding failures that degrade to "no result".
//!
//! ## License
//!
//! This project is licensed under the MIT License - see the LICENSE file for details.

pub mod district_utils;
pub mod error_utils;
pub mod geocode_utils;
pub mod rate_utils;
pub mod reconcile_utils;
pub mod tabular_utils;
