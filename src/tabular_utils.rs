// tabular_utils.rs
use crate::error_utils::SeoulError;
use calamine::{open_workbook, Reader, Xls, Xlsx};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Represents a TableBuilder object. This struct holds tabular data loaded from
/// the CSV/XLS source files as headers and string rows, and offers chainable
/// methods to reshape it before reconciliation.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    headers: Vec<String>,
    data: Vec<Vec<String>>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        TableBuilder {
            headers: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Builds a `TableBuilder` directly from headers and rows.
    ///
    /// ```
    /// use seoulcrime::tabular_utils::TableBuilder;
    ///
    /// let table = TableBuilder::from_raw_data(
    ///     vec!["관서명".to_string(), "살인 발생".to_string()],
    ///     vec![vec!["중부서".to_string(), "2".to_string()]],
    /// );
    /// assert_eq!(table.row_count(), 1);
    /// ```
    pub fn from_raw_data(headers: Vec<String>, data: Vec<Vec<String>>) -> Self {
        TableBuilder { headers, data }
    }

    /// Reads a CSV file at `file_path` into a `TableBuilder`.
    ///
    /// The source files are saved as UTF-8 with a BOM (`utf-8-sig`), so a
    /// leading U+FEFF is stripped before parsing. Fails with
    /// `SeoulError::FileNotFound` when the path does not exist; the caller
    /// must re-invoke, there are no retries.
    pub fn from_csv(file_path: &str) -> Result<Self, SeoulError> {
        if !Path::new(file_path).exists() {
            return Err(SeoulError::FileNotFound(file_path.to_string()));
        }

        let mut bytes = std::fs::read(file_path)?;
        if bytes.starts_with(UTF8_BOM) {
            bytes.drain(..UTF8_BOM.len());
        }

        let mut builder = TableBuilder::new();
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes.as_slice());

        builder.headers = rdr.headers()?.iter().map(String::from).collect();
        for result in rdr.records() {
            let record = result?;
            builder.data.push(record.iter().map(String::from).collect());
        }

        Ok(builder)
    }

    /// Reads the first sheet of a spreadsheet file into a `TableBuilder`,
    /// choosing the parsing engine by file extension: `.xls` uses the legacy
    /// binary engine, `.xlsx` the XML one. Any other extension fails with
    /// `SeoulError::UnsupportedFormat` naming the engine that would be
    /// required.
    pub fn from_spreadsheet(file_path: &str) -> Result<Self, SeoulError> {
        let path = Path::new(file_path);
        if !path.exists() {
            return Err(SeoulError::FileNotFound(file_path.to_string()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "xls" => {
                let mut workbook = open_workbook::<Xls<_>, _>(file_path)
                    .map_err(|e| SeoulError::Spreadsheet(e.to_string()))?;
                Self::from_first_sheet(&mut workbook)
            }
            "xlsx" => {
                let mut workbook = open_workbook::<Xlsx<_>, _>(file_path)
                    .map_err(|e| SeoulError::Spreadsheet(e.to_string()))?;
                Self::from_first_sheet(&mut workbook)
            }
            _ => Err(SeoulError::UnsupportedFormat {
                extension,
                engine: "calamine Xls/Xlsx".to_string(),
            }),
        }
    }

    fn from_first_sheet<R: Reader<std::io::BufReader<File>>>(
        workbook: &mut R,
    ) -> Result<Self, SeoulError>
    where
        R::Error: std::fmt::Display,
    {
        let sheet_names = workbook.sheet_names().to_vec();
        let first_sheet = sheet_names
            .first()
            .ok_or_else(|| SeoulError::Spreadsheet("workbook has no sheets".to_string()))?;

        let range = workbook
            .worksheet_range(first_sheet)
            .map_err(|e| SeoulError::Spreadsheet(e.to_string()))?;

        let mut builder = TableBuilder::new();
        for row in range.rows() {
            let row_data: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            if builder.headers.is_empty() {
                builder.headers = row_data;
            } else {
                builder.data.push(row_data);
            }
        }

        Ok(builder)
    }

    pub fn set_header(&mut self, header: Vec<&str>) -> &mut Self {
        self.headers = header.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn add_row(&mut self, row: Vec<&str>) -> &mut Self {
        self.data.push(row.iter().map(|cell| cell.to_string()).collect());
        self
    }

    /// Renames columns per the given `(old, new)` pairs; unknown names are
    /// ignored.
    pub fn rename_columns(&mut self, renames: Vec<(&str, &str)>) -> &mut Self {
        for (old_name, new_name) in renames {
            if let Some(pos) = self.headers.iter().position(|h| h == old_name) {
                self.headers[pos] = new_name.to_string();
            }
        }
        self
    }

    /// Drops the named columns from the headers and every row.
    pub fn drop_columns(&mut self, columns: Vec<&str>) -> &mut Self {
        let drop_set: HashSet<&str> = columns.into_iter().collect();
        let keep_indices: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !drop_set.contains(h.as_str()))
            .map(|(i, _)| i)
            .collect();

        self.project(&keep_indices);
        self
    }

    /// Retains only the columns at the given positional indices, in the given
    /// order. Used for the population sheet, where the district and population
    /// columns are addressed by position rather than by header.
    pub fn retain_columns_by_index(&mut self, indices: Vec<usize>) -> &mut Self {
        let keep: Vec<usize> = indices
            .into_iter()
            .filter(|&i| i < self.headers.len())
            .collect();
        self.project(&keep);
        self
    }

    fn project(&mut self, keep_indices: &[usize]) {
        self.headers = keep_indices
            .iter()
            .map(|&i| self.headers[i].clone())
            .collect();
        for row in &mut self.data {
            *row = keep_indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
        }
    }

    /// Drops the first `n` data rows. The population sheet carries three
    /// metadata rows above the real district rows.
    pub fn drop_first_rows(&mut self, n: usize) -> &mut Self {
        let n = n.min(self.data.len());
        self.data.drain(..n);
        self
    }

    /// Trims surrounding whitespace from every header and cell.
    pub fn trim_all(&mut self) -> &mut Self {
        for header in &mut self.headers {
            *header = header.trim().to_string();
        }
        for row in &mut self.data {
            for cell in row {
                *cell = cell.trim().to_string();
            }
        }
        self
    }

    /// Returns the first `n` rows as owned data, for preview endpoints.
    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        self.data.iter().take(n).cloned().collect()
    }

    pub fn get_headers(&self) -> &[String] {
        &self.headers
    }

    pub fn get_data(&self) -> &[Vec<String>] {
        &self.data
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column_name)
    }

    /// Returns the positional index of `column_name`, or
    /// `SeoulError::MissingColumn`.
    pub fn require_column(&self, column_name: &str) -> Result<usize, SeoulError> {
        self.column_index(column_name)
            .ok_or_else(|| SeoulError::MissingColumn(column_name.to_string()))
    }

    /// Returns the distinct values of `column_name` in first-seen order.
    pub fn get_unique(&self, column_name: &str) -> Vec<String> {
        let Some(index) = self.column_index(column_name) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for row in &self.data {
            if let Some(value) = row.get(index) {
                if seen.insert(value.clone()) {
                    unique.push(value.clone());
                }
            }
        }
        unique
    }

    /// Saves the table as a CSV file at `new_file_path`, prefixed with a
    /// UTF-8 BOM so spreadsheet tools read the Korean headers correctly.
    /// Output artifacts are overwritten wholesale on every run. Rows shorter
    /// than the header are padded with empty cells.
    pub fn save_as(&mut self, new_file_path: &str) -> Result<&mut Self, SeoulError> {
        let mut file = File::create(new_file_path)?;
        file.write_all(UTF8_BOM)?;

        let mut wtr = csv::Writer::from_writer(file);

        if !self.headers.is_empty() {
            wtr.write_record(&self.headers)?;
        }

        let headers_len = self.headers.len();
        for record in &mut self.data {
            while record.len() < headers_len {
                record.push("".to_string());
            }
            wtr.write_record(record.iter())?;
        }

        wtr.flush()?;

        Ok(self)
    }
}
