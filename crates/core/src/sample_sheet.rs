//! Illumina-style sample sheets.
//!
//! Only the parts the pipeline needs are understood: key/value pairs in the
//! `[Header]` section and the sample rows of the `[Data]` section. Other
//! sections are skipped.
//!
//! ```text
//! [Header]
//! RunName,220101_SL-NVA_0001_AHXXXXX
//! Flowcell,HXXXXX
//!
//! [Data]
//! Lane,Sample_ID,Sample_Name,index,index2
//! 1,SM-1,SM-1,ACGTACGT,TTGGCCAA
//! ```

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header key holding the flowcell barcode.
pub const FLOWCELL_KEY: &str = "Flowcell";

/// Header key holding the sequencing run name.
pub const RUN_NAME_KEY: &str = "RunName";

const DATA_COLUMNS: [&str; 5] = ["Lane", "Sample_ID", "Sample_Name", "index", "index2"];

#[derive(Error, Debug)]
pub enum SampleSheetError {
    #[error("Failed to access sample sheet at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed sample sheet {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Sample sheet {0} has no [Data] section")]
    MissingDataSection(PathBuf),

    #[error("Sample sheet {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid row {line} in {path}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

pub type SampleSheetResult<T> = Result<T, SampleSheetError>;

/// One sample on one lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub lane: u32,
    pub sample_id: String,
    pub sample_name: String,
    pub index: String,
    pub index2: Option<String>,
}

impl SampleRecord {
    pub fn new(lane: u32, sample: impl Into<String>, index: impl Into<String>) -> Self {
        let sample = sample.into();
        Self {
            lane,
            sample_id: sample.clone(),
            sample_name: sample,
            index: index.into(),
            index2: None,
        }
    }

    pub fn with_index2(mut self, index2: impl Into<String>) -> Self {
        self.index2 = Some(index2.into());
        self
    }
}

/// A parsed sample sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSheet {
    /// `[Header]` key/value pairs in file order.
    pub header: Vec<(String, String)>,
    pub records: Vec<SampleRecord>,
}

#[derive(PartialEq, Eq)]
enum Section {
    Header,
    Data,
    Other,
}

impl SampleSheet {
    pub fn new(records: Vec<SampleRecord>) -> Self {
        Self {
            header: Vec::new(),
            records,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.push((key.into(), value.into()));
        self
    }

    /// Look up a `[Header]` value, case-insensitively.
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn read(path: &Path) -> SampleSheetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SampleSheetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse sample sheet text; `path` is used for error context only.
    ///
    /// Fields follow CSV quoting rules, so a quoted value may contain commas.
    /// Rows whose fields are all empty are ignored.
    pub fn parse(content: &str, path: &Path) -> SampleSheetResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let mut sheet = SampleSheet::default();
        let mut section = Section::Other;
        let mut seen_data = false;
        let mut columns: Option<Columns> = None;

        for row in reader.records() {
            let row = row.map_err(|source| SampleSheetError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let first = row.get(0).unwrap_or_default();
            if first.starts_with('[') {
                section = match first {
                    "[Header]" => Section::Header,
                    "[Data]" => {
                        seen_data = true;
                        Section::Data
                    }
                    _ => Section::Other,
                };
                continue;
            }
            if row.iter().all(str::is_empty) {
                continue;
            }

            match section {
                Section::Header => {
                    let value = row.get(1).unwrap_or_default();
                    sheet.header.push((first.to_string(), value.to_string()));
                }
                Section::Data => match &columns {
                    None => columns = Some(Columns::from_header(&row, path)?),
                    Some(columns) => {
                        let line = row.position().map_or(0, |p| p.line() as usize);
                        sheet.records.push(columns.record(&row, line, path)?);
                    }
                },
                Section::Other => {}
            }
        }

        if !seen_data {
            return Err(SampleSheetError::MissingDataSection(path.to_path_buf()));
        }
        Ok(sheet)
    }

    /// Render the sheet with `[Header]` and `[Data]` sections.
    pub fn render(&self) -> csv::Result<String> {
        let mut header = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        header.write_record(["[Header]"])?;
        for (key, value) in &self.header {
            header.write_record([key, value])?;
        }

        let mut data = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        data.write_record(["[Data]"])?;
        data.write_record(DATA_COLUMNS)?;
        for record in &self.records {
            data.write_record([
                record.lane.to_string().as_str(),
                record.sample_id.as_str(),
                record.sample_name.as_str(),
                record.index.as_str(),
                record.index2.as_deref().unwrap_or_default(),
            ])?;
        }

        let mut out = into_bytes(header)?;
        out.push(b'\n');
        out.extend(into_bytes(data)?);
        String::from_utf8(out)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    pub fn write(&self, path: &Path) -> SampleSheetResult<()> {
        let io_err = |source| SampleSheetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = self.render().map_err(|source| SampleSheetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)
    }
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> csv::Result<Vec<u8>> {
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Column positions of the `[Data]` section, resolved from its header row.
struct Columns {
    lane: Option<usize>,
    sample_id: usize,
    sample_name: Option<usize>,
    index: Option<usize>,
    index2: Option<usize>,
}

impl Columns {
    fn from_header(fields: &StringRecord, path: &Path) -> SampleSheetResult<Self> {
        let find = |name: &str| fields.iter().position(|f| f.eq_ignore_ascii_case(name));
        let sample_id = find("Sample_ID").ok_or_else(|| SampleSheetError::MissingColumn {
            path: path.to_path_buf(),
            column: "Sample_ID".to_string(),
        })?;
        Ok(Self {
            lane: find("Lane"),
            sample_id,
            sample_name: find("Sample_Name"),
            index: find("index"),
            index2: find("index2"),
        })
    }

    fn record(&self, fields: &StringRecord, line: usize, path: &Path) -> SampleSheetResult<SampleRecord> {
        let get = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).filter(|v| !v.is_empty());
        let invalid = |reason: String| SampleSheetError::InvalidRow {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let sample_id = get(Some(self.sample_id))
            .ok_or_else(|| invalid("missing Sample_ID".to_string()))?
            .to_string();
        let lane = match get(self.lane) {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| invalid(format!("lane '{value}' is not a number")))?,
            None => 1,
        };

        Ok(SampleRecord {
            lane,
            sample_name: get(self.sample_name)
                .map(str::to_string)
                .unwrap_or_else(|| sample_id.clone()),
            sample_id,
            index: get(self.index).unwrap_or_default().to_string(),
            index2: get(self.index2).map(str::to_string),
        })
    }
}

/// Read every `[Data]` record of the sheet at `path`.
pub fn read_sample_sheet(path: &Path) -> SampleSheetResult<Vec<SampleRecord>> {
    SampleSheet::read(path).map(|sheet| sheet.records)
}

/// Write `records` as a sample sheet with an empty header.
pub fn write_sample_sheet(path: &Path, records: &[SampleRecord]) -> SampleSheetResult<()> {
    SampleSheet::new(records.to_vec()).write(path)
}

/// Read group id shared by the demultiplex manifest and alignment tasks.
pub fn read_group_id(flowcell: &str, lane: u32, sample: &str) -> String {
    format!("{flowcell}.{lane}.{sample}")
}
