#[macro_use]
extern crate log;

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod illumina;
pub mod models;
pub mod registry;
pub mod sampletable;
pub mod schema;
pub mod standards;

pub use error::{RegistryError, Result};
pub use registry::Registry;
pub use sampletable::{SampleRecord, SampleTable};
