//! Standardized annotation tags and the reference vocabularies of sample
//! types, host species and sequencing machines.

use std::fmt;
use std::io::BufRead;

use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::models::{Sample, SampleChanges, StandardHostSpecies, StandardSampleType};

/// Annotation keys stored as columns of the sample row instead of as
/// key/value annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StandardTag {
    SampleType,
    SubjectId,
    HostSpecies,
}

impl StandardTag {
    pub const ALL: [StandardTag; 3] = [
        StandardTag::SampleType,
        StandardTag::SubjectId,
        StandardTag::HostSpecies,
    ];

    /// Looks up the tag for an annotation key as it appears in sample tables.
    pub fn from_key(key: &str) -> Option<Self> {
        StandardTag::ALL.iter().copied().find(|t| t.key() == key)
    }

    pub fn is_standard(key: &str) -> bool {
        Self::from_key(key).is_some()
    }

    /// Name of the tag in sample tables
    pub fn key(self) -> &'static str {
        match self {
            StandardTag::SampleType => "SampleType",
            StandardTag::SubjectId => "SubjectID",
            StandardTag::HostSpecies => "HostSpecies",
        }
    }

    /// Name of the sample column holding the tag
    pub fn column(self) -> &'static str {
        match self {
            StandardTag::SampleType => "sample_type",
            StandardTag::SubjectId => "subject_id",
            StandardTag::HostSpecies => "host_species",
        }
    }

    pub fn value(self, sample: &Sample) -> Option<&str> {
        match self {
            StandardTag::SampleType => sample.sample_type.as_deref(),
            StandardTag::SubjectId => sample.subject_id.as_deref(),
            StandardTag::HostSpecies => sample.host_species.as_deref(),
        }
    }

    pub fn assign(self, changes: &mut SampleChanges, value: String) {
        match self {
            StandardTag::SampleType => changes.sample_type = Some(value),
            StandardTag::SubjectId => changes.subject_id = Some(value),
            StandardTag::HostSpecies => changes.host_species = Some(value),
        }
    }
}

impl fmt::Display for StandardTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Reads the rows of a tab-separated vocabulary file.
///
/// The first line is a header and skipped, as are blank lines and lines
/// starting with `#`. Every row must have at least `ncol` fields, only the
/// first `ncol` are kept.
pub fn read_rows<R: BufRead>(reader: R, ncol: usize) -> Result<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        if idx == 0 || line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < ncol {
            return Err(RegistryError::Validation(format!(
                "Line {} has {} fields, expected at least {}",
                idx + 1,
                fields.len(),
                ncol
            )));
        }
        rows.push(fields[..ncol].iter().map(|f| f.to_string()).collect());
    }
    Ok(rows)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y"
    )
}

fn check_columns(row: &[String], ncol: usize) -> Result<()> {
    if row.len() < ncol {
        return Err(RegistryError::Validation(format!(
            "Row {:?} has {} fields, expected at least {}",
            row,
            row.len(),
            ncol
        )));
    }
    Ok(())
}

/// An entry of a reference vocabulary, identified by its name.
pub trait VocabularyEntry: Sized {
    /// Number of columns a row must provide
    const COLUMNS: usize;

    /// Default contents shipped with the crate
    const BUNDLED: &'static str;

    fn from_row(row: &[String]) -> Result<Self>;

    fn name(&self) -> &str;
}

impl VocabularyEntry for StandardSampleType {
    const COLUMNS: usize = 4;
    const BUNDLED: &'static str = include_str!("../data/standard_sample_types.tsv");

    fn from_row(row: &[String]) -> Result<Self> {
        check_columns(row, Self::COLUMNS)?;
        Ok(StandardSampleType {
            sample_type: row[0].clone(),
            rarity: row[1].clone(),
            host_associated: parse_bool(&row[2]),
            description: row[3].clone(),
        })
    }

    fn name(&self) -> &str {
        &self.sample_type
    }
}

impl VocabularyEntry for StandardHostSpecies {
    const COLUMNS: usize = 3;
    const BUNDLED: &'static str = include_str!("../data/standard_host_species.tsv");

    fn from_row(row: &[String]) -> Result<Self> {
        check_columns(row, Self::COLUMNS)?;
        let ncbi_taxon_id = row[2].trim().parse::<i32>().map_err(|e| {
            RegistryError::Validation(format!(
                "NCBI taxon ID '{}' of {} is not a number: {}",
                row[2], row[0], e
            ))
        })?;
        Ok(StandardHostSpecies {
            host_species: row[0].clone(),
            scientific_name: row[1].clone(),
            ncbi_taxon_id,
        })
    }

    fn name(&self) -> &str {
        &self.host_species
    }
}

/// Maps the prefix of an instrument ID to a machine type label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineType {
    pub prefix: String,
    pub machine_type: String,
}

impl VocabularyEntry for MachineType {
    const COLUMNS: usize = 2;
    const BUNDLED: &'static str = include_str!("../data/machine_types.tsv");

    fn from_row(row: &[String]) -> Result<Self> {
        check_columns(row, Self::COLUMNS)?;
        Ok(MachineType {
            prefix: row[0].clone(),
            machine_type: row[1].clone(),
        })
    }

    fn name(&self) -> &str {
        &self.prefix
    }
}

/// A read-only lookup table of reference entries
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary<T> {
    entries: Vec<T>,
}

pub type StandardSampleTypes = Vocabulary<StandardSampleType>;
pub type StandardHostSpeciesList = Vocabulary<StandardHostSpecies>;
pub type MachineTypes = Vocabulary<MachineType>;

impl<T: VocabularyEntry> Vocabulary<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Vocabulary { entries }
    }

    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let entries = read_rows(reader, T::COLUMNS)?
            .iter()
            .map(|row| T::from_row(row))
            .collect::<Result<Vec<T>>>()?;
        Ok(Vocabulary { entries })
    }

    /// The vocabulary shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::load(T::BUNDLED.as_bytes())
    }

    pub fn all(&self) -> &[T] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    pub fn is_standard(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }
}

impl Vocabulary<MachineType> {
    /// Distinct machine type labels, in file order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for e in &self.entries {
            if !labels.contains(&e.machine_type.as_str()) {
                labels.push(&e.machine_type);
            }
        }
        labels
    }

    pub fn machine_type(&self, prefix: &str) -> Option<&str> {
        self.get(prefix).map(|e| e.machine_type.as_str())
    }

    /// Machine type of an instrument ID such as `M03543`, using the longest
    /// matching prefix.
    pub fn resolve(&self, instrument_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| instrument_id.starts_with(e.prefix.as_str()))
            .max_by_key(|e| e.prefix.len())
            .map(|e| e.machine_type.as_str())
    }
}
