//! Stderr logger for the `log` facade, driven by `--verbose` / `--quiet`

use console::style;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Filtering is done by `log::max_level`, set once in [`init`]
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl StderrLogger {
    fn accepts(metadata: &Metadata, level: LevelFilter) -> bool {
        metadata.level() <= level && metadata.target().starts_with("tdb")
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        Self::accepts(metadata, log::max_level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => style("error").red().bold(),
            Level::Warn => style("warn").yellow().bold(),
            Level::Info => style("info").blue(),
            Level::Debug => style("debug").dim(),
            Level::Trace => style("trace").dim(),
        };
        eprintln!("{} {}", tag, record.args());
    }

    fn flush(&self) {}
}

/// Level for the global flags: quiet wins, then each `-v` adds one level
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger; a second call is ignored
pub fn init(verbose: u8, quiet: bool) {
    let level = level_for(verbose, quiet);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
