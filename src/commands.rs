//! The operations behind the command line. Each runs in its own transaction,
//! committed when it returns `Ok` and rolled back otherwise.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use chrono::NaiveDate;
use diesel::Connection;

use crate::config::Command;
use crate::db::{self, DbConnection};
use crate::error::{RegistryError, Result};
use crate::illumina::IlluminaFastq;
use crate::models::{RunChanges, SampleChanges};
use crate::registry::Registry;
use crate::sampletable::SampleTable;
use crate::standards::{MachineTypes, StandardHostSpeciesList, StandardSampleTypes};

/// Machine kit recorded for runs taken from FASTQ files
const DEFAULT_KIT: &str = "Nextera XT";

fn check_machine_type(machine_type: &str) -> Result<()> {
    let machines = MachineTypes::bundled()?;
    let labels = machines.labels();
    if !labels.contains(&machine_type) {
        return Err(RegistryError::Validation(format!(
            "Unknown machine type {}, expected one of: {}",
            machine_type,
            labels.join(", ")
        )));
    }
    Ok(())
}

/// Loads and validates a sample table file.
fn load_table(path: &Path, qiime: bool) -> Result<SampleTable> {
    let mut table = SampleTable::load(BufReader::new(File::open(path)?))?;
    if qiime {
        table.convert_qiime()?;
    }
    table.validate()?;
    debug!("{}: {} sample records", path.display(), table.len());
    Ok(table)
}

pub fn init(conn: &mut DbConnection) -> Result<()> {
    db::initialize(conn)?;
    info!("Registry tables are in place");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn register_run<W: Write>(
    conn: &mut DbConnection,
    out: &mut W,
    file: &str,
    date: NaiveDate,
    comment: &str,
    machine_type: &str,
    machine_kit: &str,
    lane: i32,
) -> Result<i32> {
    check_machine_type(machine_type)?;
    let acc = conn.transaction::<_, RegistryError, _>(|conn| {
        Registry::new(conn).register_run(date, machine_type, machine_kit, lane, file, comment)
    })?;
    writeln!(out, "Registered run {} in the database", acc)?;
    Ok(acc)
}

pub fn register_illumina_file<W: Write>(
    conn: &mut DbConnection,
    out: &mut W,
    file: &Path,
    comment: &str,
) -> Result<i32> {
    let fastq = IlluminaFastq::open(file, &MachineTypes::bundled()?)?;
    info!(
        "{}: {} run from {}, lane {}",
        file.display(),
        fastq.machine_type,
        fastq.run_date,
        fastq.lane
    );
    let acc = conn.transaction::<_, RegistryError, _>(|conn| {
        Registry::new(conn).register_run(
            fastq.run_date,
            &fastq.machine_type,
            DEFAULT_KIT,
            fastq.lane,
            &fastq.data_uri(),
            comment,
        )
    })?;
    writeln!(out, "Registered run {} in the database", acc)?;
    Ok(acc)
}

/// Registers the samples of a table for a run without samples, then their
/// annotations.
pub fn register_samples(
    conn: &mut DbConnection,
    run_accession: i32,
    sample_table: &Path,
    qiime: bool,
) -> Result<Vec<i32>> {
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_run_accession(run_accession)?;
        registry.check_samples(run_accession, false)?;
        let table = load_table(sample_table, qiime)?;

        let accessions = registry.register_samples(run_accession, &table)?;
        let annotations = registry.register_annotations(run_accession, &table)?;
        info!(
            "Registered {} samples with {} annotations for run {}",
            accessions.len(),
            annotations.len(),
            run_accession
        );
        Ok(accessions)
    })
}

/// Replaces the annotations of the samples in a table.
pub fn register_annotations(
    conn: &mut DbConnection,
    run_accession: i32,
    sample_table: &Path,
    qiime: bool,
) -> Result<Vec<(i32, String)>> {
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_run_accession(run_accession)?;
        let table = load_table(sample_table, qiime)?;

        let annotations = registry.register_annotations(run_accession, &table)?;
        info!(
            "Replaced annotations of {} samples in run {}, {} annotations written",
            table.len(),
            run_accession,
            annotations.len()
        );
        Ok(annotations)
    })
}

pub fn unregister_samples<W: Write>(
    conn: &mut DbConnection,
    out: &mut W,
    run_accession: i32,
) -> Result<Vec<i32>> {
    let removed = conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_run_accession(run_accession)?;
        registry.remove_samples(run_accession)
    })?;
    writeln!(out, "Removed {} samples: {:?}", removed.len(), removed)?;
    Ok(removed)
}

pub fn register_sample_types(conn: &mut DbConnection, file: &Path) -> Result<usize> {
    let sample_types = StandardSampleTypes::load(BufReader::new(File::open(file)?))?.into_entries();
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.remove_standard_sample_types()?;
        let n = registry.register_standard_sample_types(&sample_types)?;
        info!("Registered {} standard sample types", n);
        Ok(n)
    })
}

pub fn register_host_species(conn: &mut DbConnection, file: &Path) -> Result<usize> {
    let host_species = StandardHostSpeciesList::load(BufReader::new(File::open(file)?))?.into_entries();
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.remove_standard_host_species()?;
        let n = registry.register_standard_host_species(&host_species)?;
        info!("Registered {} standard host species", n);
        Ok(n)
    })
}

pub fn modify_run(conn: &mut DbConnection, run_accession: i32, changes: &RunChanges) -> Result<usize> {
    if let Some(machine_type) = &changes.machine_type {
        check_machine_type(machine_type)?;
    }
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_run_accession(run_accession)?;
        registry.modify_run(run_accession, changes)
    })
}

pub fn modify_sample(conn: &mut DbConnection, sample_accession: i32, changes: &SampleChanges) -> Result<usize> {
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_sample_accession(sample_accession)?;
        registry.modify_sample(sample_accession, changes)
    })
}

pub fn modify_annotation(conn: &mut DbConnection, sample_accession: i32, key: &str, val: &str) -> Result<usize> {
    conn.transaction::<_, RegistryError, _>(|conn| {
        let mut registry = Registry::new(conn);
        registry.check_sample_accession(sample_accession)?;
        let n = registry.modify_annotation(sample_accession, key, val)?;
        if n == 0 {
            warn!("Sample {} has no annotation {}", sample_accession, key);
        }
        Ok(n)
    })
}

/// Writes the sample table of a run. Expects a read-only connection.
pub fn export_samples<W: Write>(conn: &mut DbConnection, out: &mut W, run_accession: i32) -> Result<usize> {
    let mut registry = Registry::new(conn);
    registry.check_run_accession(run_accession)?;
    let table = registry.sample_table_for_run(run_accession)?;
    if table.is_empty() {
        warn!("Run {} has no samples", run_accession);
    }
    table.write(out)?;
    Ok(table.len())
}

/// Runs one command line invocation.
pub fn dispatch<W: Write>(conn: &mut DbConnection, out: &mut W, cmd: Command) -> Result<()> {
    match cmd {
        Command::Init => init(conn),

        Command::RegisterRun {
            file,
            date,
            comment,
            machine_type,
            machine_kit,
            lane,
        } => register_run(conn, out, &file, date, &comment, &machine_type, &machine_kit, lane).map(|_| ()),

        Command::RegisterIlluminaFile { file, comment } => {
            register_illumina_file(conn, out, &file, &comment).map(|_| ())
        }

        Command::RegisterSamples {
            run_accession,
            sample_table,
            qiime,
        } => register_samples(conn, run_accession, &sample_table, qiime).map(|_| ()),

        Command::RegisterAnnotations {
            run_accession,
            sample_table,
            qiime,
        } => register_annotations(conn, run_accession, &sample_table, qiime).map(|_| ()),

        Command::UnregisterSamples { run_accession } => {
            unregister_samples(conn, out, run_accession).map(|_| ())
        }

        Command::RegisterSampleTypes { file } => register_sample_types(conn, &file).map(|_| ()),

        Command::RegisterHostSpecies { file } => register_host_species(conn, &file).map(|_| ()),

        Command::ModifyRun {
            run_accession,
            date,
            comment,
            machine_type,
            machine_kit,
            lane,
            data_uri,
            admin_comment,
        } => {
            let changes = RunChanges {
                run_date: date,
                machine_type,
                machine_kit,
                lane,
                data_uri,
                comment,
                admin_comment,
            };
            modify_run(conn, run_accession, &changes).map(|_| ())
        }

        Command::ModifySample {
            sample_accession,
            sample_name,
            barcode_sequence,
            primer_sequence,
            sample_type,
            subject_id,
            host_species,
        } => {
            let changes = SampleChanges {
                sample_name,
                barcode_sequence,
                primer_sequence,
                sample_type,
                subject_id,
                host_species,
            };
            modify_sample(conn, sample_accession, &changes).map(|_| ())
        }

        Command::ModifyAnnotation {
            sample_accession,
            key,
            val,
        } => modify_annotation(conn, sample_accession, &key, &val).map(|_| ()),

        Command::ExportSamples { run_accession, output } => match output {
            Some(path) => {
                let mut f = File::create(&path)?;
                let n = export_samples(conn, &mut f, run_accession)?;
                info!("Wrote {} samples to {}", n, path.display());
                Ok(())
            }
            None => export_samples(conn, out, run_accession).map(|_| ()),
        },
    }
}
