//! Process logging: every record goes to stderr and to a daily file
//! `<log_dir>/etl_YYYY-MM-DD.log`.

use chrono::{Local, NaiveDate};
use env_logger::{Builder, Env, Target, WriteStyle};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn log_file_path(log_dir: &Path, day: NaiveDate) -> PathBuf {
    log_dir.join(format!("etl_{}.log", day.format("%Y-%m-%d")))
}

/// Open the day's log file for appending, creating the directory.
pub fn open_log_file(log_dir: &Path, day: NaiveDate) -> io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(log_dir, day))
}

/// Writes to stderr and, when present, to a file.
pub struct Tee {
    file: Option<File>,
}

impl Tee {
    pub fn new(file: Option<File>) -> Self {
        Tee { file }
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install the logger. `RUST_LOG` overrides the default `info` filter.
/// A log file that cannot be opened only disables file output.
pub fn init(log_dir: &Path) {
    let today = Local::now().date_naive();
    let file = match open_log_file(log_dir, today) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "Cannot open log file in {}: {}; logging to stderr only",
                log_dir.display(),
                e
            );
            None
        }
    };

    let result = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(Tee::new(file))))
        .try_init();
    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}
