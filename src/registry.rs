//! The registry of runs, samples and their annotations.
//!
//! A `Registry` borrows one connection and never commits: callers wrap one or
//! more calls in `conn.transaction(..)` and decide about commit or rollback.
//! Every check a write depends on runs before the first write of that call.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use diesel::dsl::max;
use diesel::prelude::*;
use serde::Serialize;

use crate::db::DbConnection;
use crate::error::{RegistryError, Result};
use crate::models::{
    Annotation, NewRun, NewSample, Run, RunChanges, Sample, SampleChanges, StandardHostSpecies,
    StandardSampleType,
};
use crate::sampletable::{SampleRecord, SampleTable};
use crate::schema::{annotations, runs, samples, standard_host_species, standard_sample_types};
use crate::standards::StandardTag;

// SQLite binds at most 32766 parameters per statement
const INSERT_CHUNK: usize = 500;

fn accessions_exhausted() -> RegistryError {
    RegistryError::Conflict(String::from("No accession numbers left"))
}

/// Accessions are handed out as max + 1, starting at 1 on an empty table.
fn next_accession(current_max: Option<i32>) -> Result<i32> {
    match current_max {
        None => Ok(1),
        Some(m) => m.checked_add(1).ok_or_else(accessions_exhausted),
    }
}

/// Number of samples in a run carrying `value` for a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStat {
    pub run_accession: i32,
    pub value: Option<String>,
    pub sample_count: usize,
}

pub struct Registry<'a> {
    conn: &'a mut DbConnection,
}

impl<'a> Registry<'a> {
    pub fn new(conn: &'a mut DbConnection) -> Self {
        Registry { conn }
    }

    pub fn get_run(&mut self, run_accession: i32) -> Result<Option<Run>> {
        Ok(runs::table
            .find(run_accession)
            .first::<Run>(self.conn)
            .optional()?)
    }

    pub fn check_run_accession(&mut self, run_accession: i32) -> Result<Run> {
        self.get_run(run_accession)?.ok_or_else(|| {
            RegistryError::NotFound(format!("Run does not exist: {}", run_accession))
        })
    }

    pub fn register_run(
        &mut self,
        run_date: NaiveDate,
        machine_type: &str,
        machine_kit: &str,
        lane: i32,
        data_uri: &str,
        comment: &str,
    ) -> Result<i32> {
        let existing: Option<i32> = runs::table
            .filter(runs::data_uri.eq(data_uri))
            .select(runs::run_accession)
            .first(self.conn)
            .optional()?;
        if let Some(acc) = existing {
            return Err(RegistryError::Conflict(format!(
                "{} is already registered as run {}",
                data_uri, acc
            )));
        }

        let current_max: Option<i32> = runs::table
            .select(max(runs::run_accession))
            .get_result(self.conn)?;
        let run_accession = next_accession(current_max)?;

        diesel::insert_into(runs::table)
            .values(&NewRun {
                run_accession,
                run_date,
                machine_type,
                machine_kit,
                lane,
                data_uri,
                comment,
            })
            .execute(self.conn)?;
        info!("Registered run {} for {}", run_accession, data_uri);
        Ok(run_accession)
    }

    /// Writes the given fields of a run. Returns the number of rows changed.
    pub fn modify_run(&mut self, run_accession: i32, changes: &RunChanges) -> Result<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        Ok(diesel::update(runs::table.find(run_accession))
            .set(changes)
            .execute(self.conn)?)
    }

    pub fn get_sample(&mut self, sample_accession: i32) -> Result<Option<Sample>> {
        Ok(samples::table
            .find(sample_accession)
            .first::<Sample>(self.conn)
            .optional()?)
    }

    pub fn check_sample_accession(&mut self, sample_accession: i32) -> Result<Sample> {
        self.get_sample(sample_accession)?.ok_or_else(|| {
            RegistryError::NotFound(format!("Sample does not exist: {}", sample_accession))
        })
    }

    /// Fetches the samples of a run, failing with a conflict unless the
    /// presence of samples matches `exists`.
    pub fn check_samples(&mut self, run_accession: i32, exists: bool) -> Result<Vec<Sample>> {
        let found = self.samples_for_run(run_accession)?;
        match (found.is_empty(), exists) {
            (true, true) => Err(RegistryError::Conflict(format!(
                "No samples registered for run {}",
                run_accession
            ))),
            (false, false) => Err(RegistryError::Conflict(format!(
                "{} samples already registered for run {}",
                found.len(),
                run_accession
            ))),
            _ => Ok(found),
        }
    }

    /// Inserts one sample per record and returns the new accessions in
    /// record order. Nothing is inserted if any (name, barcode) pair is
    /// already registered for the run or given twice in the table.
    pub fn register_samples(&mut self, run_accession: i32, table: &SampleTable) -> Result<Vec<i32>> {
        let registered: HashSet<(String, String)> = samples::table
            .filter(samples::run_accession.eq(run_accession))
            .select((samples::sample_name, samples::barcode_sequence))
            .load::<(String, String)>(self.conn)?
            .into_iter()
            .collect();

        let mut submitted = HashSet::new();
        let repeated: Vec<String> = table
            .core_info()
            .filter(|pair| !submitted.insert(*pair))
            .map(|(name, barcode)| format!("{} ({})", name, barcode))
            .collect();
        if !repeated.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "Samples given more than once for run {}: {}",
                run_accession,
                repeated.join(", ")
            )));
        }

        let collisions: Vec<String> = table
            .core_info()
            .filter(|(name, barcode)| registered.contains(&(name.to_string(), barcode.to_string())))
            .map(|(name, barcode)| format!("{} ({})", name, barcode))
            .collect();
        if !collisions.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "Samples already registered for run {}: {}",
                run_accession,
                collisions.join(", ")
            )));
        }

        let current_max: Option<i32> = samples::table
            .select(max(samples::sample_accession))
            .get_result(self.conn)?;
        let first = next_accession(current_max)?;
        let count = i32::try_from(table.len()).map_err(|_| accessions_exhausted())?;
        if count > 0 {
            first.checked_add(count - 1).ok_or_else(accessions_exhausted)?;
        }

        let new_samples: Vec<NewSample> = table
            .core_info()
            .enumerate()
            .map(|(i, (sample_name, barcode_sequence))| NewSample {
                sample_accession: first + i as i32,
                sample_name,
                run_accession,
                barcode_sequence,
            })
            .collect();
        // savepoint when the caller already opened a transaction
        self.conn.transaction::<_, RegistryError, _>(|conn| {
            for chunk in new_samples.chunks(INSERT_CHUNK) {
                diesel::insert_into(samples::table)
                    .values(chunk)
                    .execute(conn)?;
            }
            Ok(())
        })?;
        debug!("Registered {} samples for run {}", new_samples.len(), run_accession);

        Ok(new_samples.iter().map(|s| s.sample_accession).collect())
    }

    /// Deletes the samples of a run together with their annotations.
    pub fn remove_samples(&mut self, run_accession: i32) -> Result<Vec<i32>> {
        let accessions: Vec<i32> = samples::table
            .filter(samples::run_accession.eq(run_accession))
            .select(samples::sample_accession)
            .order(samples::sample_accession)
            .load(self.conn)?;
        if accessions.is_empty() {
            return Ok(accessions);
        }

        self.conn.transaction::<_, RegistryError, _>(|conn| {
            diesel::delete(annotations::table.filter(annotations::sample_accession.eq_any(&accessions)))
                .execute(conn)?;
            diesel::delete(samples::table.filter(samples::sample_accession.eq_any(&accessions)))
                .execute(conn)?;
            Ok(())
        })?;
        info!("Removed {} samples from run {}", accessions.len(), run_accession);
        Ok(accessions)
    }

    /// Maps every record to the accession of the registered sample with the
    /// same name and barcode in the run.
    fn resolve_accessions(&mut self, run_accession: i32, table: &SampleTable) -> Result<Vec<i32>> {
        let registered: HashMap<(String, String), i32> = samples::table
            .filter(samples::run_accession.eq(run_accession))
            .select((
                samples::sample_name,
                samples::barcode_sequence,
                samples::sample_accession,
            ))
            .load::<(String, String, i32)>(self.conn)?
            .into_iter()
            .map(|(name, barcode, acc)| ((name, barcode), acc))
            .collect();

        let mut accessions = Vec::with_capacity(table.len());
        let mut unresolved: Vec<SampleRecord> = Vec::new();
        for record in &table.records {
            if let Some(field) = record.duplicate_field() {
                return Err(RegistryError::Validation(format!(
                    "Field {} given more than once in {}",
                    field, record
                )));
            }
            let (name, barcode) = record.core_info();
            match registered.get(&(name.to_string(), barcode.to_string())) {
                Some(acc) => accessions.push(*acc),
                None => unresolved.push(record.clone()),
            }
        }
        if !unresolved.is_empty() {
            return Err(RegistryError::Unresolved {
                run_accession,
                records: unresolved,
            });
        }

        let mut seen = HashSet::new();
        if let Some(acc) = accessions.iter().find(|acc| !seen.insert(**acc)) {
            return Err(RegistryError::Validation(format!(
                "Sample {} is annotated more than once",
                acc
            )));
        }
        Ok(accessions)
    }

    /// Replaces the annotations of the samples in `table`.
    ///
    /// Previous annotations of those samples are discarded, including keys
    /// the new table does not mention. Standard tags go into the sample
    /// columns, every other key becomes an annotation row. Returns the
    /// `(accession, key)` pairs of the annotation rows written.
    pub fn register_annotations(
        &mut self,
        run_accession: i32,
        table: &SampleTable,
    ) -> Result<Vec<(i32, String)>> {
        let accessions = self.resolve_accessions(run_accession, table)?;
        if accessions.is_empty() {
            return Ok(Vec::new());
        }

        let mut column_updates: Vec<(i32, SampleChanges)> = Vec::new();
        let mut new_annotations: Vec<Annotation> = Vec::new();
        for (accession, pairs) in accessions.iter().zip(table.annotations()) {
            let mut changes = SampleChanges::default();
            for (key, val) in pairs {
                match StandardTag::from_key(key) {
                    Some(tag) => tag.assign(&mut changes, val.to_string()),
                    None => new_annotations.push(Annotation {
                        sample_accession: *accession,
                        key: key.to_string(),
                        val: val.to_string(),
                    }),
                }
            }
            if !changes.is_empty() {
                column_updates.push((*accession, changes));
            }
        }

        self.conn.transaction::<_, RegistryError, _>(|conn| {
            diesel::delete(annotations::table.filter(annotations::sample_accession.eq_any(&accessions)))
                .execute(conn)?;
            diesel::update(samples::table.filter(samples::sample_accession.eq_any(&accessions)))
                .set((
                    samples::sample_type.eq(None::<String>),
                    samples::subject_id.eq(None::<String>),
                    samples::host_species.eq(None::<String>),
                ))
                .execute(conn)?;

            for (accession, changes) in &column_updates {
                diesel::update(samples::table.find(*accession))
                    .set(changes)
                    .execute(conn)?;
            }
            for chunk in new_annotations.chunks(INSERT_CHUNK) {
                diesel::insert_into(annotations::table)
                    .values(chunk)
                    .execute(conn)?;
            }
            Ok(())
        })?;
        debug!(
            "Run {}: {} samples annotated, {} annotation rows, {} standard tag updates",
            run_accession,
            accessions.len(),
            new_annotations.len(),
            column_updates.len()
        );

        Ok(new_annotations
            .into_iter()
            .map(|a| (a.sample_accession, a.key))
            .collect())
    }

    /// Writes the given fields of a sample. Returns the number of rows changed.
    pub fn modify_sample(&mut self, sample_accession: i32, changes: &SampleChanges) -> Result<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        Ok(diesel::update(samples::table.find(sample_accession))
            .set(changes)
            .execute(self.conn)?)
    }

    /// Sets the value of an existing annotation. A missing annotation is not
    /// an error; the returned row count is 0 then.
    pub fn modify_annotation(&mut self, sample_accession: i32, key: &str, val: &str) -> Result<usize> {
        Ok(diesel::update(
            annotations::table
                .filter(annotations::sample_accession.eq(sample_accession))
                .filter(annotations::key.eq(key)),
        )
        .set(annotations::val.eq(val))
        .execute(self.conn)?)
    }

    pub fn register_standard_sample_types(&mut self, sample_types: &[StandardSampleType]) -> Result<usize> {
        let mut inserted = 0;
        for chunk in sample_types.chunks(INSERT_CHUNK) {
            inserted += diesel::insert_into(standard_sample_types::table)
                .values(chunk)
                .execute(self.conn)?;
        }
        Ok(inserted)
    }

    pub fn remove_standard_sample_types(&mut self) -> Result<usize> {
        Ok(diesel::delete(standard_sample_types::table).execute(self.conn)?)
    }

    pub fn register_standard_host_species(&mut self, host_species: &[StandardHostSpecies]) -> Result<usize> {
        let mut inserted = 0;
        for chunk in host_species.chunks(INSERT_CHUNK) {
            inserted += diesel::insert_into(standard_host_species::table)
                .values(chunk)
                .execute(self.conn)?;
        }
        Ok(inserted)
    }

    pub fn remove_standard_host_species(&mut self) -> Result<usize> {
        Ok(diesel::delete(standard_host_species::table).execute(self.conn)?)
    }
}

// Read side, used by reporting and export
impl<'a> Registry<'a> {
    pub fn runs(&mut self) -> Result<Vec<Run>> {
        Ok(runs::table
            .order(runs::run_accession)
            .load(self.conn)?)
    }

    pub fn samples_for_run(&mut self, run_accession: i32) -> Result<Vec<Sample>> {
        Ok(samples::table
            .filter(samples::run_accession.eq(run_accession))
            .order(samples::sample_accession)
            .load(self.conn)?)
    }

    pub fn annotations_for_samples(&mut self, sample_accessions: &[i32]) -> Result<Vec<Annotation>> {
        Ok(annotations::table
            .filter(annotations::sample_accession.eq_any(sample_accessions))
            .order((annotations::sample_accession, annotations::key))
            .load(self.conn)?)
    }

    pub fn standard_sample_types(&mut self) -> Result<Vec<StandardSampleType>> {
        Ok(standard_sample_types::table
            .order(standard_sample_types::sample_type)
            .load(self.conn)?)
    }

    pub fn standard_host_species(&mut self) -> Result<Vec<StandardHostSpecies>> {
        Ok(standard_host_species::table
            .order(standard_host_species::host_species)
            .load(self.conn)?)
    }

    /// Counts, per run and value, the samples carrying `tag`. Samples without
    /// a value for a standard tag are counted under `None`.
    pub fn tag_stats(&mut self, tag: &str) -> Result<Vec<TagStat>> {
        let mut counts: BTreeMap<(i32, Option<String>), usize> = BTreeMap::new();
        match StandardTag::from_key(tag) {
            Some(standard) => {
                let all: Vec<Sample> = samples::table.load(self.conn)?;
                for sample in &all {
                    let value = standard.value(sample).map(String::from);
                    *counts.entry((sample.run_accession, value)).or_insert(0) += 1;
                }
            }
            None => {
                let rows: Vec<(i32, String)> = annotations::table
                    .inner_join(samples::table)
                    .filter(annotations::key.eq(tag))
                    .select((samples::run_accession, annotations::val))
                    .load(self.conn)?;
                for (run_accession, val) in rows {
                    *counts.entry((run_accession, Some(val))).or_insert(0) += 1;
                }
            }
        }

        Ok(counts
            .into_iter()
            .map(|((run_accession, value), sample_count)| TagStat {
                run_accession,
                value,
                sample_count,
            })
            .collect())
    }

    /// The samples of a run as a sample table: core fields, standard tags,
    /// then the annotations in key order.
    pub fn sample_table_for_run(&mut self, run_accession: i32) -> Result<SampleTable> {
        let found = self.samples_for_run(run_accession)?;
        let accessions: Vec<i32> = found.iter().map(|s| s.sample_accession).collect();

        let mut by_sample: HashMap<i32, Vec<Annotation>> = HashMap::new();
        for annotation in self.annotations_for_samples(&accessions)? {
            by_sample
                .entry(annotation.sample_accession)
                .or_default()
                .push(annotation);
        }

        let records = found
            .iter()
            .map(|sample| {
                // stored values go out as they are, even if they look like null tokens
                let mut record = SampleRecord::new();
                record.set("sample_name", Some(sample.sample_name.clone()));
                record.set("barcode_sequence", Some(sample.barcode_sequence.clone()));
                for tag in StandardTag::ALL.iter() {
                    if let Some(value) = tag.value(sample) {
                        record.set(tag.key(), Some(value.to_string()));
                    }
                }
                for annotation in by_sample.get(&sample.sample_accession).into_iter().flatten() {
                    record.set(&annotation.key, Some(annotation.val.clone()));
                }
                record
            })
            .collect();
        Ok(SampleTable::new(records))
    }
}
