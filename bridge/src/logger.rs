//! Logger initialization for the bridge

use std::{fmt::Write, io::IsTerminal, str::FromStr, sync::Once};

use jiff::{Zoned, tz::TimeZone};
use logforth::{
    append::Stderr,
    filter::EnvFilter,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

static INIT: Once = Once::new();

/// Formats timestamps in UTC, with an optionally colored level
#[derive(Debug)]
struct UtcLayout {
    no_color: bool,
}

impl UtcLayout {
    fn new() -> Self {
        Self { no_color: false }
    }

    fn no_color(mut self) -> Self {
        self.no_color = true;
        self
    }
}

impl Layout for UtcLayout {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();

        let now = Zoned::now().with_time_zone(TimeZone::UTC);
        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = if self.no_color {
            format!("{:>5}", record.level())
        } else {
            let color = match record.level() {
                log::Level::Error => 31,
                log::Level::Warn => 33,
                log::Level::Info => 32,
                log::Level::Debug => 34,
                log::Level::Trace => 35,
            };

            format!("\x1b[{color}m{:>5}\x1b[0m", record.level())
        };

        write!(output, "{level}  {}", record.args())?;

        Ok(output.into_bytes())
    }
}

/// Initialize the stderr logger from the command line arguments.
pub fn init(args: &Args) {
    INIT.call_once(|| apply_logger(&args.log, args.log_style));
}

fn apply_logger(log_filter: &str, style: LogStyle) {
    let log_filter = log_filter.to_owned();

    logforth::builder()
        .dispatch(move |d| {
            let filter = EnvFilter::from_str(&log_filter)
                .unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter should be valid"));

            let d = d.filter(filter);

            match style {
                LogStyle::Json => d.append(Stderr::default().with_layout(JsonLayout::default())),
                LogStyle::Color if std::io::stderr().is_terminal() => {
                    d.append(Stderr::default().with_layout(UtcLayout::new()))
                }
                LogStyle::Color => d.append(Stderr::default().with_layout(UtcLayout::new().no_color())),
            }
        })
        .apply();
}
