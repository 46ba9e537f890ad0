//! CSV report emission.
//!
//! One header per file, derived from the first record; every later record
//! must carry exactly the same field set. Output order is input order —
//! callers sort the enriched stream beforehand when they want sorted
//! reports. An optional ceiling rolls output over into `{stem}_{N}` files.

use crate::error::{Rep365Error, Result};
use crate::join::EnrichedRecord;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// How the output file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    Overwrite,
    Append,
}

/// What a finished export produced
#[derive(Debug)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    pub records: usize,
}

/// Streaming CSV writer with shape checking and file splitting
pub struct CsvExporter {
    path: PathBuf,
    mode: SinkMode,
    ceiling: Option<usize>,
    writer: Option<csv::Writer<File>>,
    header: Option<Vec<String>>,
    in_current_file: usize,
    file_index: usize,
    files: Vec<PathBuf>,
    records: usize,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>, mode: SinkMode) -> Self {
        Self {
            path: path.into(),
            mode,
            ceiling: None,
            writer: None,
            header: None,
            in_current_file: 0,
            file_index: 0,
            files: Vec::new(),
            records: 0,
        }
    }

    /// Cap records per file; on reaching it the next record opens
    /// `{stem}_{N}` with a fresh header. 0 means unbounded.
    pub fn ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = if ceiling == 0 { None } else { Some(ceiling) };
        self
    }

    /// Write one record, opening files and emitting headers as needed
    pub fn write(&mut self, record: &EnrichedRecord) -> Result<()> {
        let names = record.field_names();

        match &self.header {
            None => self.header = Some(names),
            Some(header) => {
                if *header != names {
                    return Err(Rep365Error::ShapeMismatch(format!(
                        "record fields {:?} do not match the established header {:?}",
                        names, header
                    )));
                }
            }
        }

        if self.writer.is_none() {
            self.open_next_file()?;
        } else if let Some(ceiling) = self.ceiling {
            if self.in_current_file >= ceiling {
                self.open_next_file()?;
            }
        }

        let writer = self.writer.as_mut().expect("writer opened above");
        writer.write_record(record.values())?;
        self.in_current_file += 1;
        self.records += 1;
        Ok(())
    }

    /// Flush and close, reporting the files written and the record total
    pub fn finish(mut self) -> Result<ExportSummary> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(ExportSummary {
            files: self.files,
            records: self.records,
        })
    }

    fn open_next_file(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.file_index += 1;
        let path = self.current_path();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let (file, needs_header) = match self.mode {
            SinkMode::Overwrite => (File::create(&path)?, true),
            SinkMode::Append => {
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                // Header only when the sink is empty; appending to an
                // existing report must not repeat it
                let needs_header = file.metadata()?.len() == 0;
                (file, needs_header)
            }
        };

        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            let header = self.header.as_ref().expect("header set before first open");
            writer.write_record(header)?;
        }

        self.writer = Some(writer);
        self.in_current_file = 0;
        self.files.push(path);
        Ok(())
    }

    fn current_path(&self) -> PathBuf {
        if self.ceiling.is_none() {
            return self.path.clone();
        }
        split_path(&self.path, self.file_index)
    }
}

/// `reports/devices.csv` -> `reports/devices_3.csv`
fn split_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    };
    path.with_file_name(name)
}
