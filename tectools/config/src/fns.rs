use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

// spinner glyphs and tick interval, per platform
#[cfg(not(windows))]
const SPINNER: (&str, u64) = ("◐◓◑◒ ", 120);
#[cfg(windows)]
const SPINNER: (&str, u64) = (r"-\|/ ", 200);

/// progress bar shared by the long-running stages
pub fn get_progress_bar(length: u64, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new(length);

    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}/{len} ({eta})")
            .expect("progress template parses")
            .tick_chars(SPINNER.0),
    );
    bar.enable_steady_tick(Duration::from_millis(SPINNER.1));
    bar.set_message(msg.to_owned());

    bar
}

/// write any collection to a file
pub fn write_collection(data: &Vec<String>, fname: &Path) {
    log::info!("Lines in {:?}: {:?}. Writing...", fname, data.len());
    let f = match File::create(fname) {
        Ok(f) => f,
        Err(e) => panic!("Error creating file: {}", e),
    };
    let mut writer = BufWriter::new(f);

    for line in data.iter() {
        writeln!(writer, "{}", line).unwrap_or_else(|e| {
            panic!("Error writing to file: {}", e);
        });
    }
}

/// error handling for CLI
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// argument validation
pub fn validate(arg: &PathBuf) -> Result<(), CliError> {
    if !arg.exists() {
        return Err(CliError::InvalidInput(format!(
            "ERROR: {:?} does not exist",
            arg
        )));
    }

    if !arg.is_file() {
        return Err(CliError::InvalidInput(format!(
            "ERROR: {:?} is not a file",
            arg
        )));
    }

    match std::fs::metadata(arg) {
        Ok(metadata) if metadata.len() == 0 => Err(CliError::InvalidInput(format!(
            "ERROR: file {:?} is empty",
            arg
        ))),
        Ok(_) => Ok(()),
        Err(e) => Err(CliError::IoError(e)),
    }
}
