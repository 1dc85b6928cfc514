use std::path::{Path, PathBuf};

use bulletin_core::{matches_all_keywords, normalize_title, ExtractionTarget, TableOutput};
use bulletin_logging::{bulletin_debug, bulletin_error, bulletin_info, bulletin_warn, LogScope};
use calamine::{open_workbook_auto, Data, Range, Reader};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not open workbook {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("could not read worksheet {sheet}: {message}")]
    Sheet { sheet: String, message: String },
    #[error("could not encode csv: {0}")]
    Csv(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<csv::Error> for ExtractError {
    fn from(err: csv::Error) -> Self {
        ExtractError::Csv(err.to_string())
    }
}

/// A worksheet as rows of display strings, aligned so that row 0 / column 0 is A1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    pub target: ExtractionTarget,
    pub sheet: String,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// CRLF-terminated CSV with minimal quoting.
    pub fn to_csv(&self) -> Result<Vec<u8>, ExtractError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::CRLF)
            .from_writer(Vec::new());
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|err| ExtractError::Csv(err.error().to_string()))
    }
}

/// First sheet whose normalized title carries every keyword.
pub fn find_sheet<'n, S: AsRef<str>>(names: &'n [String], keywords: &[S]) -> Option<&'n str> {
    names
        .iter()
        .find(|name| matches_all_keywords(&normalize_title(name), keywords))
        .map(String::as_str)
}

/// Renders one cell the way it reads in the sheet. Blank cells become "".
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(err) => err.to_string(),
    }
}

fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn table_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let width = first_col as usize + range.width();
    let mut rows: Vec<Vec<String>> = (0..first_row).map(|_| vec![String::new(); width]).collect();
    for row in range.rows() {
        let mut line = vec![String::new(); first_col as usize];
        line.extend(row.iter().map(cell_text));
        rows.push(line);
    }
    rows
}

pub struct WorkbookExtractor {
    targets: Vec<ExtractionTarget>,
    log: LogScope,
}

impl WorkbookExtractor {
    pub fn new(targets: Vec<ExtractionTarget>, log: LogScope) -> Self {
        Self { targets, log }
    }

    pub fn targets(&self) -> &[ExtractionTarget] {
        &self.targets
    }

    /// Reads every target that has a matching worksheet. Targets without one
    /// are skipped with a warning.
    pub fn tables(&self, path: &Path) -> Result<Vec<ExtractedTable>, ExtractError> {
        let mut workbook = open_workbook_auto(path).map_err(|err| ExtractError::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let names = workbook.sheet_names();
        bulletin_debug!(self.log, "{} has sheets {names:?}", path.display());

        let mut tables = Vec::new();
        for target in &self.targets {
            let Some(sheet) = find_sheet(&names, &target.keywords) else {
                bulletin_warn!(
                    self.log,
                    "no worksheet in {} matches {} (keywords {:?}); skipping",
                    path.display(),
                    target.label,
                    target.keywords
                );
                continue;
            };
            match workbook.worksheet_range(sheet) {
                Ok(range) => tables.push(ExtractedTable {
                    target: target.clone(),
                    sheet: sheet.to_string(),
                    rows: table_rows(&range),
                }),
                Err(err) => {
                    let err = ExtractError::Sheet {
                        sheet: sheet.to_string(),
                        message: err.to_string(),
                    };
                    bulletin_warn!(self.log, "{err}; skipping {}", target.label);
                }
            }
        }
        Ok(tables)
    }

    /// Writes each matched table next to the workbook as `<prefix><suffix>.csv`.
    pub fn extract(
        &self,
        path: &Path,
        category: &str,
        suffix: &str,
    ) -> Result<Vec<TableOutput>, ExtractError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let writer = AtomicFileWriter::new(dir.to_path_buf());

        let mut outputs = Vec::new();
        for table in self.tables(path)? {
            let file_name = table.target.output_file_name(suffix);
            let written = table
                .to_csv()
                .and_then(|bytes| writer.write(&file_name, &bytes).map_err(ExtractError::from));
            match written {
                Ok(out_path) => {
                    bulletin_info!(
                        self.log,
                        "{} -> {} ({} rows from '{}')",
                        table.target.label,
                        out_path.display(),
                        table.rows.len(),
                        table.sheet
                    );
                    outputs.push(TableOutput {
                        category: category.to_string(),
                        label: table.target.label,
                        sheet: table.sheet,
                        path: out_path,
                        rows: table.rows.len(),
                    });
                }
                Err(err) => bulletin_error!(self.log, "could not write {file_name}: {err}"),
            }
        }
        Ok(outputs)
    }
}
