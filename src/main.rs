#[macro_use]
extern crate log;

use env_logger::Env;
use structopt::StructOpt;

use sample_registry::config::{Command, Opt};
use sample_registry::{commands, db, Result};

fn run(config: Opt) -> Result<()> {
    let mut conn = match config.cmd {
        Command::ExportSamples { .. } => db::establish_read_only(&config.connstr)?,
        _ => db::establish_connection(&config.connstr)?,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::dispatch(&mut conn, &mut out, config.cmd)
}

fn main() {
    // a .env file may carry SAMPLE_REGISTRY_DB_URI
    dotenv::dotenv().ok();
    let config = Opt::from_args();

    // set up logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run(config) {
        error!("{}", e);
        std::process::exit(if e.is_user_error() { 1 } else { 2 });
    }
}
