use std::sync::OnceLock;

use crate::config::PluginConfig;

const LOG_BASENAME: &str = "unity_texture_reader";

// `log` only accepts one logger per process, while Unity may load the plugin more than once.
static LOGGER: OnceLock<Option<flexi_logger::LoggerHandle>> = OnceLock::new();

/// Keeps only this crate's records, the host process may carry other `log` users.
pub struct LogFilter;
impl flexi_logger::filter::LogLineFilter for LogFilter {
    fn write(
        &self,
        now: &mut flexi_logger::DeferredNow,
        record: &log::Record,
        log_line_writer: &dyn flexi_logger::filter::LogLineWriter,
    ) -> std::io::Result<()> {
        if is_own_record(record.module_path()) {
            log_line_writer.write(now, record)?;
        }
        Ok(())
    }
}

fn is_own_record(module_path: Option<&str>) -> bool {
    module_path.is_some_and(|path| path.split("::").next() == Some(env!("CARGO_CRATE_NAME")))
}

/// Starts the file logger on first call; later calls reuse whatever the first one produced.
pub fn init(config: &PluginConfig) {
    LOGGER.get_or_init(|| start(config));
}

pub fn flush() {
    if let Some(Some(handle)) = LOGGER.get() {
        handle.flush();
    }
}

fn start(config: &PluginConfig) -> Option<flexi_logger::LoggerHandle> {
    if !config.log_to_file {
        return None;
    }

    let mut file_spec = flexi_logger::FileSpec::default()
        .basename(LOG_BASENAME)
        .suppress_timestamp();
    if let Some(directory) = &config.log_directory {
        file_spec = file_spec.directory(directory);
    }

    let logger = flexi_logger::Logger::try_with_str(&config.log_spec)
        .inspect_err(|err| eprintln!("invalid log spec \"{}\": {err}", config.log_spec))
        .ok()?;

    logger
        .log_to_file(file_spec)
        .append()
        .write_mode(flexi_logger::WriteMode::BufferAndFlush)
        .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
        .filter(Box::new(LogFilter))
        .start()
        .inspect_err(|err| eprintln!("texture reader logging disabled: {err}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_only_crate_modules() {
        assert!(is_own_record(Some("texture_reader")));
        assert!(is_own_record(Some("texture_reader::d3d12::fence")));
        assert!(!is_own_record(Some("texture_reader_extra::module")));
        assert!(!is_own_record(Some("flexi_logger::writers")));
        assert!(!is_own_record(None));
    }

    #[test]
    fn disabled_file_logging_starts_nothing() {
        let config = PluginConfig::default().with_log_to_file(false);
        assert!(start(&config).is_none());
    }
}
