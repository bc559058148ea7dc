use core::fmt::Display;
use std::io::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy)]
enum Color {
    Default,
    Gray,
    BrightRed,
    BrightYellow,
    BrightBlue,
    BrightCyan,
    BrightMagenta,
}

fn write_with_color(out: &mut impl Write, color: Color, string: impl Display) -> io::Result<()> {
    let string: &dyn Display = match color {
        Color::Default => &string,
        Color::Gray => &string.dimmed(),
        Color::BrightRed => &string.bright_red(),
        Color::BrightYellow => &string.bright_yellow(),
        Color::BrightBlue => &string.bright_blue(),
        Color::BrightCyan => &string.bright_cyan(),
        Color::BrightMagenta => &string.bright_magenta(),
    };
    write!(out, "{string}")
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::BrightRed,
        Level::Warn => Color::BrightYellow,
        Level::Info => Color::BrightBlue,
        Level::Debug => Color::BrightCyan,
        Level::Trace => Color::BrightMagenta,
    }
}

fn write_record(out: &mut impl Write, record: &Record) -> io::Result<()> {
    let level = record.level();
    write_with_color(out, level_color(level), format_args!("{level:5} "))?;
    write_with_color(out, Color::Gray, format_args!("[{}] ", record.target()))?;
    write_with_color(out, Color::Default, record.args())?;
    writeln!(out)
}

/// Colored, level-tagged lines on stderr so they never mix with file
/// contents streamed to stdout.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // a closed stderr is not worth failing over
        let _ = write_record(&mut io::stderr().lock(), record);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// `-v` count to a level: warnings by default, then info, debug, trace.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_for_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn gray_text_is_escaped() {
        let mut out = Vec::new();
        write_with_color(&mut out, Color::Gray, "x").unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains('x'));
        assert!(s.starts_with('\u{1b}'));
    }
}
