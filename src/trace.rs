use chrono::{Local, SecondsFormat};
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, time},
    prelude::*,
};

use crate::config::Log;

pub fn init(log: &Log) -> Result<(), String> {
    let is_color = log.style.is_color();
    if !is_color {
        yansi::disable();
    }
    let filter: Targets = log
        .level
        .parse()
        .map_err(|e| format!("log level {} did not parse successfully: {}", log.level, e))?;
    let format = fmt::layer().with_timer(LocalTime).with_ansi(is_color);

    tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init()
        .map_err(|e| e.to_string())
}

struct LocalTime;

impl time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
        )
    }
}
