//! Logging setup (spec §6's `loglevel`/`logfile`). Adapted from the
//! teacher's own `fern` + `tracing-appender` pipeline: a non-blocking
//! writer buffered through a plain `BufWriter`, with `fern` doing level
//! filtering and formatting on top. An empty `logfile` means "log to
//! stderr", matching a bare `redis-server` run with no `logfile` set.

use anyhow::Result;
use log::LevelFilter;
use std::io::{BufWriter, Write};
use std::str::FromStr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Keeps the non-blocking writer's flush guard alive for the process
/// lifetime; dropping it early would silently stop delivering log lines.
pub async fn init_logging(logfile: &str, level: &str) -> Result<Vec<Box<dyn Drop + Send + Sync + 'static>>> {
    let mut guards: Vec<Box<dyn Drop + Send + Sync + 'static>> = Vec::new();
    let level = LevelFilter::from_str(level)?;

    let sink: Box<dyn Write + Send> = if logfile.is_empty() {
        Box::new(std::io::stderr())
    } else {
        let path = std::path::Path::new(logfile);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("kv-server.log");
        let rolling = RollingFileAppender::builder().rotation(Rotation::NEVER).filename_prefix(filename).build(dir)?;
        let (non_blocking, flush_guard) = tracing_appender::non_blocking(rolling);
        guards.push(Box::new(flush_guard));
        Box::new(BufWriter::with_capacity(64 * 1024, non_blocking))
    };

    let logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] - {} - [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(sink);

    if logger.apply().is_err() {
        eprintln!("logger has already been set");
        return Ok(Vec::new());
    }

    Ok(guards)
}
