#[cfg(feature = "logging")]
use std::path::Path;

/// Sends all log records at or above `min_level` to the file at `log_path`.
#[cfg(feature = "logging")]
pub fn init_logger(min_level: log::LevelFilter, log_path: &Path) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            // Local time is not safe to query once there are other threads.
            let offset = time::OffsetDateTime::now_utc();
            let timestamp = offset
                .format(&time::macros::format_description!(
                    // "[[" is an escaped "[".
                    "[[[year]-[month]-[day]][[[hour]:[minute]:[second][subsecond digits:9]]"
                ))
                .unwrap_or_default();

            out.finish(format_args!(
                "{}[{}][{}] {}",
                timestamp,
                record.target(),
                record.level(),
                message
            ))
        })
        .level(min_level)
        .chain(fern::log_file(log_path)?)
        .apply()?;

    Ok(())
}
