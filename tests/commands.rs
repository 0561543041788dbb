mod common;

use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;
use tempfile::TempDir;

use common::{connection, STOOL_AND_BLOOD};
use sample_registry::commands;
use sample_registry::config::Command;
use sample_registry::models::RunChanges;
use sample_registry::{Registry, RegistryError};

const QIIME_MAPPING: &str = "#SampleID\tBarcodeSequence\tLinkerPrimerSequence\tSampleType\tDescription
S1\tAAAA\tGTGCCAGCMGCCGCGGTAA\tStool\tfirst
S2\tCCCC\tGTGCCAGCMGCCGCGGTAA\tBlood\tsecond
";

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn register_run(conn: &mut sample_registry::db::DbConnection, file: &str) -> i32 {
    let mut out: Vec<u8> = Vec::new();
    let acc = commands::register_run(
        conn,
        &mut out,
        file,
        common::run_date(),
        "Mock run",
        "Illumina-MiSeq",
        "Nextera XT",
        1,
    )
    .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("Registered run {} in the database\n", acc)
    );
    acc
}

#[test]
fn register_run_with_unknown_machine() {
    let mut conn = connection();
    let mut out: Vec<u8> = Vec::new();
    assert_matches!(
        commands::register_run(
            &mut conn,
            &mut out,
            "run1",
            common::run_date(),
            "Mock run",
            "Illumina-MySeq",
            "Nextera XT",
            1
        ),
        Err(RegistryError::Validation(_))
    );
    assert!(out.is_empty());
}

#[test]
fn register_samples_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "samples.tsv", STOOL_AND_BLOOD);
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");

    let accessions = commands::register_samples(&mut conn, run, &path, false).unwrap();
    assert_eq!(accessions, vec![1, 2]);

    let mut registry = Registry::new(&mut conn);
    let s1 = registry.check_sample_accession(1).unwrap();
    assert_eq!(s1.sample_type.as_deref(), Some("Stool"));
    assert_eq!(registry.annotations_for_samples(&[1]).unwrap().len(), 1);

    // second registration of the same run is refused
    assert_matches!(
        commands::register_samples(&mut conn, run, &path, false),
        Err(RegistryError::Conflict(_))
    );
}

#[test]
fn register_samples_for_missing_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "samples.tsv", STOOL_AND_BLOOD);
    let mut conn = connection();
    assert_matches!(
        commands::register_samples(&mut conn, 5, &path, false),
        Err(RegistryError::NotFound(_))
    );
}

#[test]
fn invalid_table_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "samples.tsv",
        "sample_name\tbarcode_sequence\nS1\tAAAA\nS1\tCCCC\n",
    );
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");

    assert_matches!(
        commands::register_samples(&mut conn, run, &path, false),
        Err(RegistryError::Validation(_))
    );
    assert!(Registry::new(&mut conn).samples_for_run(run).unwrap().is_empty());
}

#[test]
fn unresolved_annotations_roll_back() {
    let dir = tempfile::tempdir().unwrap();
    let samples = write_file(&dir, "samples.tsv", STOOL_AND_BLOOD);
    let stray = write_file(
        &dir,
        "annotations.tsv",
        "sample_name\tbarcode_sequence\tSampleType\nS1\tAAAA\tSaliva\nS3\tGGGG\tSaliva\n",
    );
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");
    commands::register_samples(&mut conn, run, &samples, false).unwrap();

    assert_matches!(
        commands::register_annotations(&mut conn, run, &stray, false),
        Err(RegistryError::Unresolved { .. })
    );
    let s1 = Registry::new(&mut conn).check_sample_accession(1).unwrap();
    assert_eq!(s1.sample_type.as_deref(), Some("Stool"));
}

#[test]
fn qiime_mapping_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "mapping.txt", QIIME_MAPPING);
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");

    commands::register_samples(&mut conn, run, &path, true).unwrap();

    let mut registry = Registry::new(&mut conn);
    let found = registry.samples_for_run(run).unwrap();
    assert_eq!(found[1].sample_name, "S2");
    assert_eq!(found[1].barcode_sequence, "CCCC");
    assert_eq!(found[1].sample_type.as_deref(), Some("Blood"));
    let keys: Vec<String> = registry
        .annotations_for_samples(&[found[1].sample_accession])
        .unwrap()
        .into_iter()
        .map(|a| a.key)
        .collect();
    assert_eq!(keys, vec![String::from("primer_sequence")]);
}

#[test]
fn unregister_samples_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "samples.tsv", STOOL_AND_BLOOD);
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");
    commands::register_samples(&mut conn, run, &path, false).unwrap();

    let mut out: Vec<u8> = Vec::new();
    commands::unregister_samples(&mut conn, &mut out, run).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Removed 2 samples: [1, 2]\n");

    let mut out: Vec<u8> = Vec::new();
    commands::unregister_samples(&mut conn, &mut out, run).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Removed 0 samples: []\n");
}

#[test]
fn vocabulary_files() {
    let dir = tempfile::tempdir().unwrap();
    let sample_types = write_file(
        &dir,
        "sample_types.tsv",
        "sample_type\trarity\thost_associated\tdescription\n\
         # comment\n\
         Feces\tCommon\t1\tHuman and animal fecal material.\n\
         Soil\tCommon\tno\tSoil samples.\textra\n",
    );
    let host_species = write_file(
        &dir,
        "host_species.tsv",
        "host_species\tscientific_name\tncbi_taxon_id\nHuman\tHomo sapiens\t9606\n\nMouse\tMus musculus\t10090\n",
    );
    let mut conn = connection();

    assert_eq!(commands::register_sample_types(&mut conn, &sample_types).unwrap(), 2);
    // importing again replaces instead of adding
    assert_eq!(commands::register_sample_types(&mut conn, &sample_types).unwrap(), 2);
    assert_eq!(commands::register_host_species(&mut conn, &host_species).unwrap(), 2);

    let mut registry = Registry::new(&mut conn);
    let stored = registry.standard_sample_types().unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].host_associated);
    assert!(!stored[1].host_associated);
    let hosts = registry.standard_host_species().unwrap();
    assert_eq!(hosts[0].ncbi_taxon_id, 9606);
    assert_eq!(hosts[1].scientific_name, "Mus musculus");

    let short = write_file(&dir, "short.tsv", "host_species\tscientific_name\tncbi_taxon_id\nHuman\t9606\n");
    assert_matches!(
        commands::register_host_species(&mut conn, &short),
        Err(RegistryError::Validation(_))
    );
    assert_eq!(Registry::new(&mut conn).standard_host_species().unwrap().len(), 2);
}

#[test]
fn modify_commands_check_existence() {
    let mut conn = connection();
    assert_matches!(
        commands::modify_run(&mut conn, 1, &RunChanges::default()),
        Err(RegistryError::NotFound(_))
    );
    assert_matches!(
        commands::modify_annotation(&mut conn, 1, "color", "red"),
        Err(RegistryError::NotFound(_))
    );

    let run = register_run(&mut conn, "run1");
    let changes = RunChanges {
        machine_type: Some(String::from("Illumina-NovaSeq")),
        ..Default::default()
    };
    assert_eq!(commands::modify_run(&mut conn, run, &changes).unwrap(), 1);
    let bad = RunChanges {
        machine_type: Some(String::from("Sanger")),
        ..Default::default()
    };
    assert_matches!(
        commands::modify_run(&mut conn, run, &bad),
        Err(RegistryError::Validation(_))
    );
}

#[test]
fn dispatch_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "samples.tsv", STOOL_AND_BLOOD);
    let mut conn = connection();
    let run = register_run(&mut conn, "run1");

    let mut out: Vec<u8> = Vec::new();
    commands::dispatch(
        &mut conn,
        &mut out,
        Command::RegisterSamples {
            run_accession: run,
            sample_table: path,
            qiime: false,
        },
    )
    .unwrap();
    assert!(out.is_empty());

    commands::dispatch(&mut conn, &mut out, Command::ExportSamples { run_accession: run, output: None }).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), STOOL_AND_BLOOD);

    let output = dir.path().join("export.tsv");
    let mut out: Vec<u8> = Vec::new();
    commands::dispatch(
        &mut conn,
        &mut out,
        Command::ExportSamples {
            run_accession: run,
            output: Some(output.clone()),
        },
    )
    .unwrap();
    assert_eq!(fs::read_to_string(output).unwrap(), STOOL_AND_BLOOD);
}
