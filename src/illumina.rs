//! Run information from Illumina FASTQ files: the run date comes from the
//! run folder name, instrument and lane from the first read header.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{RegistryError, Result};
use crate::standards::MachineTypes;

lazy_static! {
    // @<instrument>:<run number>:<flowcell>:<lane>:<tile>:<x>:<y> ...
    static ref RE_HEADER: Regex =
        Regex::new(r"^@(?P<instrument>[A-Za-z0-9_-]+):(?P<run_number>\d+):(?P<flowcell>[A-Za-z0-9-]+):(?P<lane>\d+):")
            .unwrap();
    // YYMMDD_<instrument>_<run number>_<flowcell>, newer instruments write YYYYMMDD
    static ref RE_RUN_FOLDER: Regex =
        Regex::new(r"^(?P<date>\d{6}|\d{8})_(?P<instrument>[A-Za-z0-9-]+)_(?P<run_number>\d+)_(?P<flowcell>[A-Za-z0-9-]+)$")
            .unwrap();
}

/// Parses the date prefix of a run folder, either "YYMMDD" or "YYYYMMDD"
fn parse_date(source: &str) -> Result<NaiveDate> {
    let (year, rest) = match source.len() {
        6 => (source[0..2].parse::<i32>().map(|y| y + 2000), &source[2..]),
        8 => (source[0..4].parse::<i32>(), &source[4..]),
        _ => {
            return Err(RegistryError::Validation(format!(
                "Date string {} has unexpected length",
                source
            )))
        }
    };
    let bad_date = || RegistryError::Validation(format!("Bad date in run folder: {}", source));
    let year = year.map_err(|_| bad_date())?;
    let month = rest[0..2].parse::<u32>().map_err(|_| bad_date())?;
    let day = rest[2..4].parse::<u32>().map_err(|_| bad_date())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad_date)
}

/// What a run registration needs to know about an Illumina FASTQ file
#[derive(Debug, Clone, PartialEq)]
pub struct IlluminaFastq {
    pub filepath: PathBuf,
    pub run_date: NaiveDate,
    pub instrument: String,
    pub machine_type: String,
    pub lane: i32,
}

impl IlluminaFastq {
    /// Builds the run information from a file path and the first line of the file.
    pub fn from_header(filepath: &Path, header: &str, machines: &MachineTypes) -> Result<Self> {
        let captures = RE_HEADER.captures(header.trim()).ok_or_else(|| {
            RegistryError::Validation(format!("Not an Illumina read header: {}", header.trim()))
        })?;
        let instrument = captures["instrument"].to_string();
        let lane = captures["lane"]
            .parse::<i32>()
            .map_err(|e| RegistryError::Validation(format!("Bad lane in read header: {}", e)))?;

        let machine_type = machines
            .resolve(&instrument)
            .ok_or_else(|| {
                RegistryError::Validation(format!("Unknown instrument type: {}", instrument))
            })?
            .to_string();

        let folder = filepath
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .filter_map(|c| RE_RUN_FOLDER.captures(c))
            .last()
            .ok_or_else(|| {
                RegistryError::Validation(format!(
                    "No Illumina run folder in path {}",
                    filepath.display()
                ))
            })?;
        if &folder["instrument"] != instrument.as_str() {
            warn!(
                "Run folder instrument {} does not match read header instrument {}",
                &folder["instrument"], instrument
            );
        }
        let run_date = parse_date(&folder["date"])?;

        Ok(IlluminaFastq {
            filepath: filepath.to_path_buf(),
            run_date,
            instrument,
            machine_type,
            lane,
        })
    }

    /// Reads the first read header of a gzipped FASTQ file.
    pub fn open(filepath: &Path, machines: &MachineTypes) -> Result<Self> {
        let mut reader = BufReader::new(GzDecoder::new(File::open(filepath)?));
        let mut header = String::new();
        reader.read_line(&mut header)?;
        if header.trim().is_empty() {
            return Err(RegistryError::Validation(format!(
                "{} contains no reads",
                filepath.display()
            )));
        }
        Self::from_header(filepath, &header, machines)
    }

    /// The file path as stored with the run
    pub fn data_uri(&self) -> String {
        self.filepath.display().to_string()
    }
}
