#![allow(dead_code)]

use chrono::NaiveDate;
use sample_registry::db::{self, DbConnection};
use sample_registry::{Registry, SampleTable};

/// A fresh in-memory registry database.
pub fn connection() -> DbConnection {
    let mut conn = db::establish_connection(":memory:").unwrap();
    db::initialize(&mut conn).unwrap();
    conn
}

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
}

pub fn register_run(registry: &mut Registry, data_uri: &str) -> i32 {
    registry
        .register_run(run_date(), "Illumina-MiSeq", "Nextera XT", 1, data_uri, "Mock run")
        .unwrap()
}

pub fn table(text: &str) -> SampleTable {
    SampleTable::parse(text.lines()).unwrap()
}

pub const TWO_SAMPLES: &str = "sample_name\tbarcode_sequence
S1\tAAAA
S2\tCCCC
";

pub const STOOL_AND_BLOOD: &str = "sample_name\tbarcode_sequence\tSampleType\tcolor
S1\tAAAA\tStool\tred
S2\tCCCC\tBlood\tNA
";
