//! This module contains the sample table: a tab-separated list of sample
//! records as submitted by users, where `sample_name` and `barcode_sequence`
//! identify a sample and every other column is an annotation.

use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, Write};

use serde::Serialize;

use crate::error::{RegistryError, Result};

/// Fields that identify a sample within a run. Everything else is an annotation.
pub const CORE_FIELDS: [&str; 2] = ["sample_name", "barcode_sequence"];

/// Written for cells without a value.
pub const MISSING: &str = "NA";

// Compared after lowercasing, so "NULL", "None", "N/A", "NA" etc. all match
const NULL_VALUES: [&str; 5] = ["", "null", "none", "na", "n/a"];

const QIIME_FIELDS: [(&str, &str); 3] = [
    ("SampleID", "sample_name"),
    ("BarcodeSequence", "barcode_sequence"),
    ("LinkerPrimerSequence", "primer_sequence"),
];

const DNA_BASES: &str = "ACGT";
const IUPAC_BASES: &str = "ACGTRYMKSWHBVDN";

/// True if `value` is one of the tokens that mark a cell as empty.
pub fn is_null_value(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    NULL_VALUES.contains(&lower.as_str())
}

fn normalize(value: &str) -> Option<String> {
    if is_null_value(value) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

fn tokenize(line: &str) -> Vec<&str> {
    line.trim_end_matches(&['\n', '\r'][..])
        .split('\t')
        .map(str::trim)
        .collect()
}

/// One row of a sample table.
///
/// A field is either present with a value or absent. Absent covers both a
/// column that was never there and a cell holding a null token, there is no
/// way to tell these apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    fields: Vec<(String, Option<String>)>,
}

impl SampleRecord {
    pub fn new() -> Self {
        SampleRecord { fields: Vec::new() }
    }

    /// Builder-style `push`, handy when assembling records in code.
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.push(field, value);
        self
    }

    /// Appends a field, normalizing null tokens to an absent value.
    /// Does not check whether `field` is already there, see [`SampleTable::validate`].
    pub fn push(&mut self, field: &str, value: &str) {
        self.fields.push((field.to_string(), normalize(value)));
    }

    /// Sets `field` to `value`, replacing an earlier entry of the same name.
    pub fn set(&mut self, field: &str, value: Option<String>) {
        match self.fields.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    /// Removes every entry named `field`, returning the first value found.
    pub fn remove(&mut self, field: &str) -> Option<String> {
        let mut removed = None;
        self.fields.retain(|(f, v)| {
            if f == field {
                if removed.is_none() {
                    removed = v.clone();
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| f == field)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn sample_name(&self) -> Option<&str> {
        self.get("sample_name")
    }

    pub fn barcode_sequence(&self) -> Option<&str> {
        self.get("barcode_sequence")
    }

    /// `(sample_name, barcode_sequence)`, empty strings standing in for absent fields.
    pub fn core_info(&self) -> (&str, &str) {
        (
            self.sample_name().unwrap_or(""),
            self.barcode_sequence().unwrap_or(""),
        )
    }

    /// Present fields as `(name, value)` pairs, in column order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields
            .iter()
            .filter_map(|(f, v)| v.as_deref().map(|v| (f.as_str(), v)))
    }

    /// Present non-core fields as `(key, value)` pairs, in column order.
    pub fn annotations(&self) -> Vec<(&str, &str)> {
        self.present()
            .filter(|(f, _)| !CORE_FIELDS.contains(f))
            .collect()
    }

    pub(crate) fn duplicate_field(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|(f, _)| f.as_str())
            .find(|f| !seen.insert(*f))
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .present()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for SampleRecord {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut record = SampleRecord::new();
        for (field, value) in iter {
            record.push(field, value);
        }
        record
    }
}

fn check_chars(record: &SampleRecord, field: &str, allowed: impl Fn(char) -> bool) -> Result<()> {
    if let Some(value) = record.get(field) {
        if let Some(c) = value.chars().find(|c| !allowed(*c)) {
            return Err(RegistryError::Validation(format!(
                "Illegal character '{}' in {}: {}",
                c, field, record
            )));
        }
    }
    Ok(())
}

/// A sample table containing a list of sample records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    pub records: Vec<SampleRecord>,
}

impl SampleTable {
    pub fn new(records: Vec<SampleRecord>) -> Self {
        SampleTable { records }
    }

    /// Parses a sample table from its lines.
    ///
    /// The first line is the header, a leading `#` on it is ignored. Further
    /// lines starting with `#` are comments, blank lines are skipped.
    pub fn parse<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let header_line = lines
            .next()
            .ok_or_else(|| RegistryError::Validation(String::from("Sample table is empty")))?;
        let header: Vec<String> = tokenize(header_line.as_ref().trim_start_matches('#'))
            .into_iter()
            .map(String::from)
            .collect();

        if header.iter().any(|h| h.is_empty()) {
            return Err(RegistryError::Validation(format!(
                "Blank field name in sample table header: {:?}",
                header
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(RegistryError::Validation(format!(
                "Field {} appears more than once in sample table header",
                dup
            )));
        }

        let mut records: Vec<SampleRecord> = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = line.as_ref();
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let values = tokenize(line);
            if values.len() != header.len() {
                debug!(
                    "Line {} has {} fields, header has {}",
                    idx + 2,
                    values.len(),
                    header.len()
                );
            }
            records.push(header.iter().map(String::as_str).zip(values).collect());
        }

        if records.is_empty() {
            return Err(RegistryError::Validation(String::from(
                "No records found in sample table. Problem with windows line endings?",
            )));
        }
        Ok(SampleTable { records })
    }

    /// Reads and parses a sample table.
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
        Self::parse(lines)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(sample_name, barcode_sequence)` for each record.
    pub fn core_info(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.records.iter().map(SampleRecord::core_info)
    }

    /// Annotation pairs for each record.
    pub fn annotations(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.records.iter().map(SampleRecord::annotations)
    }

    /// Checks characters, presence and uniqueness of sample names and barcodes.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut barcodes = HashSet::new();

        for r in &self.records {
            if let Some(field) = r.duplicate_field() {
                return Err(RegistryError::Validation(format!(
                    "Field {} given more than once: {}",
                    field, r
                )));
            }
            check_chars(r, "sample_name", |c| {
                c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
            })?;
            check_chars(r, "barcode_sequence", |c| DNA_BASES.contains(c))?;
            check_chars(r, "primer_sequence", |c| IUPAC_BASES.contains(c))?;

            let name = r
                .sample_name()
                .ok_or_else(|| RegistryError::Validation(format!("No sample_name: {}", r)))?;
            if !names.insert(name) {
                return Err(RegistryError::Validation(format!(
                    "Duplicate sample_name: {}",
                    r
                )));
            }

            // at most one record may go without a barcode
            let barcode = r.barcode_sequence().unwrap_or("");
            if !barcodes.insert(barcode) {
                return Err(RegistryError::Validation(format!("Duplicate barcode: {}", r)));
            }
        }
        Ok(())
    }

    /// Renames QIIME mapping file columns to registry field names.
    ///
    /// The QIIME `Description` column is dropped, it is usually filled with junk.
    pub fn convert_qiime(&mut self) -> Result<()> {
        for r in &mut self.records {
            r.remove("Description");
            for (qiime_field, field) in QIIME_FIELDS.iter() {
                if r.get(field).is_some() {
                    return Err(RegistryError::Validation(format!(
                        "Trying to convert from QIIME format mapping, but {} is already present and filled in",
                        field
                    )));
                }
                if let Some(value) = r.remove(qiime_field) {
                    r.set(field, Some(value));
                }
            }
        }
        Ok(())
    }

    /// Core fields first, then every other field in the order first seen.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = CORE_FIELDS.to_vec();
        for r in &self.records {
            for (field, _) in r.present() {
                if !names.contains(&field) {
                    names.push(field);
                }
            }
        }
        names
    }

    /// Writes the table as tab-separated text, `NA` marking missing cells.
    pub fn write<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        let header = self.field_names();
        writeln!(out, "{}", header.join("\t"))?;
        for r in &self.records {
            let row: Vec<&str> = header
                .iter()
                .map(|field| r.get(field).unwrap_or(MISSING))
                .collect();
            writeln!(out, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

impl From<Vec<SampleRecord>> for SampleTable {
    fn from(records: Vec<SampleRecord>) -> Self {
        SampleTable::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const NORMAL_TSV: &str = "\
sample_name\tbarcode_sequence\tHostSpecies\tSubjectID
S1\tGCCT\tHuman\tHu23
S2\tGCAT\tNA\tNA
";

    fn recs() -> Vec<SampleRecord> {
        vec![
            SampleRecord::new()
                .with("sample_name", "S1")
                .with("barcode_sequence", "GCCT")
                .with("HostSpecies", "Human")
                .with("SubjectID", "Hu23"),
            SampleRecord::new()
                .with("sample_name", "S2")
                .with("barcode_sequence", "GCAT"),
        ]
    }

    #[test]
    fn write() -> Result<()> {
        let mut out = Vec::new();
        SampleTable::new(recs()).write(&mut out)?;
        assert_eq!(String::from_utf8(out).unwrap(), NORMAL_TSV);
        Ok(())
    }

    #[test]
    fn parse() -> Result<()> {
        let t = SampleTable::parse(NORMAL_TSV.lines())?;
        assert_eq!(t.len(), 2);
        assert_eq!(t.records[0].get("HostSpecies"), Some("Human"));
        assert_eq!(t.records[1].get("HostSpecies"), None);
        assert_eq!(t.records[1].annotations(), Vec::<(&str, &str)>::new());
        assert_eq!(
            t.core_info().collect::<Vec<_>>(),
            vec![("S1", "GCCT"), ("S2", "GCAT")]
        );
        Ok(())
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() -> Result<()> {
        let text = "#sample_name\tbarcode_sequence\tcolor\n\
                    # a comment\n\
                    \n\
                    S1\tAAAA\t red \r\n\
                    \t\t\n\
                    S2\tCCCC\tnull\n";
        let t = SampleTable::parse(text.lines())?;
        assert_eq!(t.len(), 2);
        assert_eq!(t.records[0].annotations(), vec![("color", "red")]);
        assert_eq!(t.records[1].get("color"), None);
        Ok(())
    }

    #[test]
    fn null_tokens() {
        for token in &["", "null", "NULL", "None", "none", "NONE", "N/A", "n/a", "na", "NA"] {
            assert!(is_null_value(token), "{} should be null", token);
        }
        assert!(!is_null_value("nan"));
        assert!(!is_null_value("0"));
    }

    #[test]
    fn parse_rejects_bad_header() {
        assert_matches!(
            SampleTable::parse(vec!["sample_name\t\tbarcode_sequence", "S1\tx\tAAAA"]),
            Err(RegistryError::Validation(_))
        );
        assert_matches!(
            SampleTable::parse(vec!["sample_name\tcolor\tcolor", "S1\tred\tblue"]),
            Err(RegistryError::Validation(_))
        );
    }

    #[test]
    fn parse_rejects_empty_tables() {
        assert_matches!(
            SampleTable::parse(Vec::<&str>::new()),
            Err(RegistryError::Validation(_))
        );
        assert_matches!(
            SampleTable::parse(vec!["sample_name\tbarcode_sequence", "# nothing here"]),
            Err(RegistryError::Validation(_))
        );
        // a file with only carriage returns ends up as one long header line
        assert_matches!(
            SampleTable::parse("sample_name\tbarcode_sequence\rS1\tAAAA\r".lines()),
            Err(RegistryError::Validation(_))
        );
    }

    #[test]
    fn load_from_reader() -> Result<()> {
        let t = SampleTable::load(NORMAL_TSV.as_bytes())?;
        assert_eq!(t, SampleTable::parse(NORMAL_TSV.lines())?);
        Ok(())
    }

    #[test]
    fn validate() -> Result<()> {
        SampleTable::new(recs()).validate()
    }

    #[test]
    fn validate_duplicate_sample_name() {
        let mut r = recs();
        r[1].set("sample_name", Some(String::from("S1")));
        assert_matches!(
            SampleTable::new(r).validate(),
            Err(RegistryError::Validation(msg)) if msg.contains("Duplicate sample_name")
        );
    }

    #[test]
    fn validate_duplicate_barcode() {
        let mut r = recs();
        r[1].set("barcode_sequence", Some(String::from("GCCT")));
        assert_matches!(
            SampleTable::new(r).validate(),
            Err(RegistryError::Validation(msg)) if msg.contains("Duplicate barcode")
        );
    }

    #[test]
    fn validate_empty_barcodes() {
        let one = vec![
            SampleRecord::new().with("sample_name", "A"),
            SampleRecord::new().with("sample_name", "B").with("barcode_sequence", "ACGT"),
        ];
        assert!(SampleTable::new(one).validate().is_ok());

        let two = vec![
            SampleRecord::new().with("sample_name", "A"),
            SampleRecord::new().with("sample_name", "B").with("barcode_sequence", "NA"),
        ];
        assert_matches!(SampleTable::new(two).validate(), Err(RegistryError::Validation(_)));
    }

    #[test]
    fn validate_characters() {
        let bad_name = vec![SampleRecord::new().with("sample_name", "S 1")];
        assert_matches!(SampleTable::new(bad_name).validate(), Err(RegistryError::Validation(_)));

        let bad_barcode = vec![SampleRecord::new()
            .with("sample_name", "S1")
            .with("barcode_sequence", "ACGN")];
        assert_matches!(
            SampleTable::new(bad_barcode).validate(),
            Err(RegistryError::Validation(_))
        );

        let ambiguous_primer = vec![SampleRecord::new()
            .with("sample_name", "S1.a_b-c")
            .with("barcode_sequence", "ACGT")
            .with("primer_sequence", "GTGYCAGCMGCCGCGGTAA")];
        assert!(SampleTable::new(ambiguous_primer).validate().is_ok());
    }

    #[test]
    fn validate_missing_name() {
        let r = vec![SampleRecord::new().with("barcode_sequence", "ACGT")];
        assert_matches!(
            SampleTable::new(r).validate(),
            Err(RegistryError::Validation(msg)) if msg.contains("No sample_name")
        );
    }

    #[test]
    fn validate_repeated_field() {
        let r = vec![SampleRecord::new()
            .with("sample_name", "S1")
            .with("color", "red")
            .with("color", "blue")];
        assert_matches!(SampleTable::new(r).validate(), Err(RegistryError::Validation(_)));
    }

    #[test]
    fn write_then_parse() -> Result<()> {
        let submitted = SampleTable::new(vec![
            SampleRecord::new()
                .with("sample_name", "S1")
                .with("barcode_sequence", "AAAA")
                .with("SampleType", "Stool")
                .with("color", "red"),
            SampleRecord::new()
                .with("sample_name", "S2")
                .with("barcode_sequence", "CCCC")
                .with("day", "3"),
        ]);
        let mut out = Vec::new();
        submitted.write(&mut out)?;
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("sample_name\tbarcode_sequence\tSampleType\tcolor\tday")
        );

        let parsed = SampleTable::parse(text.lines())?;
        assert_eq!(
            parsed.core_info().collect::<Vec<_>>(),
            submitted.core_info().collect::<Vec<_>>()
        );
        assert_eq!(
            parsed.annotations().collect::<Vec<_>>(),
            vec![
                vec![("SampleType", "Stool"), ("color", "red")],
                vec![("day", "3")],
            ]
        );
        Ok(())
    }

    #[test]
    fn qiime_conversion() -> Result<()> {
        let text = "#SampleID\tBarcodeSequence\tLinkerPrimerSequence\tSampleType\tDescription\n\
                    S1\tAAAA\tGTGCCAGC\tFeces\tjunk\n";
        let mut t = SampleTable::parse(text.lines())?;
        t.convert_qiime()?;
        let r = &t.records[0];
        assert_eq!(r.core_info(), ("S1", "AAAA"));
        assert_eq!(r.get("primer_sequence"), Some("GTGCCAGC"));
        assert_eq!(r.get("Description"), None);
        assert_eq!(
            r.annotations(),
            vec![("SampleType", "Feces"), ("primer_sequence", "GTGCCAGC")]
        );
        t.validate()
    }

    #[test]
    fn qiime_conversion_refuses_to_overwrite() -> Result<()> {
        let text = "SampleID\tsample_name\n S1\tS1\n";
        let mut t = SampleTable::parse(text.lines())?;
        assert_matches!(t.convert_qiime(), Err(RegistryError::Validation(_)));
        Ok(())
    }
}
