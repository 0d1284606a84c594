//! The dynamic sampling worker.
//!
//! Runs one scheduling cycle over all active organizations: refreshes the sliding window and low
//! volume project caches, then regenerates and publishes the sampling rules of every project.
//! Statistics are read from a JSON document, rules are written as JSON lines.

mod cli;
mod setup;

use std::process;

use ds_log::Hub;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            ds_log::ensure_error(&err);
            1
        }
    };

    if let Some(client) = Hub::current().client() {
        client.close(None);
    }
    process::exit(exit_code);
}
