use crate::schema::*;

use diesel::prelude::*;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Queryable, Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub run_accession: i32,
    pub run_date: NaiveDate,
    pub machine_type: String,
    pub machine_kit: String,
    pub lane: i32,
    pub data_uri: String,
    pub comment: String,
    pub admin_comment: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = runs)]
pub struct NewRun<'a> {
    pub run_accession: i32,
    pub run_date: NaiveDate,
    pub machine_type: &'a str,
    pub machine_kit: &'a str,
    pub lane: i32,
    pub data_uri: &'a str,
    pub comment: &'a str,
}

/// Partial update of a run; `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = runs)]
pub struct RunChanges {
    pub run_date: Option<NaiveDate>,
    pub machine_type: Option<String>,
    pub machine_kit: Option<String>,
    pub lane: Option<i32>,
    pub data_uri: Option<String>,
    pub comment: Option<String>,
    pub admin_comment: Option<String>,
}

impl RunChanges {
    pub fn is_empty(&self) -> bool {
        self.run_date.is_none()
            && self.machine_type.is_none()
            && self.machine_kit.is_none()
            && self.lane.is_none()
            && self.data_uri.is_none()
            && self.comment.is_none()
            && self.admin_comment.is_none()
    }
}

#[derive(Queryable, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sample {
    pub sample_accession: i32,
    pub sample_name: String,
    pub run_accession: i32,
    pub barcode_sequence: String,
    pub primer_sequence: Option<String>,
    pub sample_type: Option<String>,
    pub subject_id: Option<String>,
    pub host_species: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = samples)]
pub struct NewSample<'a> {
    pub sample_accession: i32,
    pub sample_name: &'a str,
    pub run_accession: i32,
    pub barcode_sequence: &'a str,
}

/// Partial update of a sample; `None` leaves the column untouched.
///
/// Also carries the standardized annotation columns written during
/// annotation registration.
#[derive(AsChangeset, Debug, Clone, Default, PartialEq)]
#[diesel(table_name = samples)]
pub struct SampleChanges {
    pub sample_name: Option<String>,
    pub barcode_sequence: Option<String>,
    pub primer_sequence: Option<String>,
    pub sample_type: Option<String>,
    pub subject_id: Option<String>,
    pub host_species: Option<String>,
}

impl SampleChanges {
    pub fn is_empty(&self) -> bool {
        *self == SampleChanges::default()
    }
}

#[derive(Queryable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = annotations)]
pub struct Annotation {
    pub sample_accession: i32,
    pub key: String,
    pub val: String,
}

#[derive(Queryable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = standard_sample_types)]
pub struct StandardSampleType {
    pub sample_type: String,
    pub rarity: String,
    pub host_associated: bool,
    pub description: String,
}

#[derive(Queryable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = standard_host_species)]
pub struct StandardHostSpecies {
    pub host_species: String,
    pub scientific_name: String,
    pub ncbi_taxon_id: i32,
}
