use std::path::PathBuf;

use chrono::NaiveDate;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Create the registry tables
    Init,

    /// Add a new run to the registry
    RegisterRun {
        /// Resource filepath (not checked)
        file: String,

        /// Run date (YYYY-MM-DD)
        #[structopt(long)]
        date: NaiveDate,

        /// Comment (free text)
        #[structopt(long)]
        comment: String,

        /// Machine type
        #[structopt(long = "type", default_value = "Illumina-MiSeq")]
        machine_type: String,

        /// Machine kit
        #[structopt(long = "kit", default_value = "Nextera XT")]
        machine_kit: String,

        /// Lane number
        #[structopt(long, default_value = "1")]
        lane: i32,
    },

    /// Add a new run to the registry from a gzipped Illumina FASTQ file
    RegisterIlluminaFile {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        /// Comment (free text)
        comment: String,
    },

    /// Add new samples to the registry, with annotations
    RegisterSamples {
        /// Run accession number
        run_accession: i32,

        /// Sample table in tab-separated values format. Field names are listed in
        /// the first line, a leading '#' on it is ignored. Other lines beginning
        /// with '#' are comments.
        #[structopt(parse(from_os_str))]
        sample_table: PathBuf,

        /// Sample table uses QIIME mapping file column names
        #[structopt(long)]
        qiime: bool,
    },

    /// Replace annotations for samples in the registry. Samples are matched using
    /// the sample name and barcode sequence.
    ///
    /// All existing annotations of the matched samples are replaced with those
    /// found in the table, including keys the table does not mention.
    RegisterAnnotations {
        /// Run accession number
        run_accession: i32,

        /// Sample table in tab-separated values format
        #[structopt(parse(from_os_str))]
        sample_table: PathBuf,

        /// Sample table uses QIIME mapping file column names
        #[structopt(long)]
        qiime: bool,
    },

    /// Remove samples for a sequencing run from the registry
    UnregisterSamples {
        /// Run accession number
        run_accession: i32,
    },

    /// Update the list of standard sample types in the registry
    RegisterSampleTypes {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    /// Update the list of standard host species in the registry
    RegisterHostSpecies {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    /// Modify an existing run in the registry
    ModifyRun {
        /// Run accession number
        run_accession: i32,

        /// Run date (YYYY-MM-DD)
        #[structopt(long)]
        date: Option<NaiveDate>,

        /// Comment (free text)
        #[structopt(long)]
        comment: Option<String>,

        /// Machine type
        #[structopt(long = "type")]
        machine_type: Option<String>,

        /// Machine kit
        #[structopt(long = "kit")]
        machine_kit: Option<String>,

        /// Lane number
        #[structopt(long)]
        lane: Option<i32>,

        #[structopt(long)]
        data_uri: Option<String>,

        #[structopt(long)]
        admin_comment: Option<String>,
    },

    /// Modify an existing sample in the registry
    ModifySample {
        /// Sample accession number
        sample_accession: i32,

        #[structopt(long)]
        sample_name: Option<String>,

        #[structopt(long)]
        barcode_sequence: Option<String>,

        #[structopt(long)]
        primer_sequence: Option<String>,

        #[structopt(long)]
        sample_type: Option<String>,

        #[structopt(long)]
        subject_id: Option<String>,

        #[structopt(long)]
        host_species: Option<String>,
    },

    /// Modify an existing annotation in the registry
    ModifyAnnotation {
        /// Sample accession number
        sample_accession: i32,

        /// Annotation key
        key: String,

        /// Annotation value
        val: String,
    },

    /// Write the sample table of a run
    ExportSamples {
        /// Run accession number
        run_accession: i32,

        /// Output file (default: stdout)
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

#[derive(StructOpt, Debug)]
#[structopt(name = "sample-registry", about = "Registry of sequencing runs, samples and annotations")]
pub struct Opt {
    /// DB connection URI (SQLite file path)
    #[structopt(default_value = "sample_registry.sqlite", long, env = "SAMPLE_REGISTRY_DB_URI")]
    pub connstr: String,

    #[structopt(subcommand)]
    pub cmd: Command,
}
