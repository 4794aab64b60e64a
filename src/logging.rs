//! Logger setup: timestamped lines to the console and to a log file.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes every log line to stdout and, when available, to the log file.
struct ConsoleAndFile {
    file: Option<File>,
}

impl Write for ConsoleAndFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // A broken log file must not take the console down with it
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Initializes the global logger. Default level is `info`, `RUST_LOG` overrides it.
///
/// Lines look like `[12:34:56.789] INFO  message`.
pub fn init(log_path: &Path) {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(ConsoleAndFile { file })))
        .init();
}
