use ansi_term::{Colour, Style};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Writes log records to stderr, coloured by level.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let style = match record.level() {
            Level::Error => Colour::Red.bold(),
            Level::Warn => Colour::Yellow.normal(),
            Level::Info => Style::new(),
            Level::Debug => Colour::Cyan.normal(),
            Level::Trace => Style::new().dimmed(),
        };
        let level = record.level().to_string().to_lowercase();
        eprintln!("{}: {}", style.paint(level), record.args());
    }

    fn flush(&self) {}
}

pub fn init(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }
}
