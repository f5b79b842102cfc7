//! How to turn the config file and arguments into the pipeline's settings.

pub mod config;
mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub use config::Config;
pub use error::{OptionError, OptionResult};

use self::config::StringOrNum;
use crate::{
    args::Args,
    constants::{
        CONFIG_DIR_NAME, DEFAULT_CONFIG_FILE_NAME, DEFAULT_SYMBOLS, DEFAULT_UPDATE_RATE,
        MIN_UPDATE_RATE, USERNAME_CACHE_MAX_ENTRIES, USERNAME_LOOKUP_TIMEOUT,
    },
};

/// The validated settings for the collection pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// How often each poller samples.
    pub update_rate: Duration,

    /// Whether to sample the GPU if one is present.
    pub enable_gpu: bool,

    /// How long a username lookup may take.
    pub lookup_timeout: Duration,

    /// The username cache is emptied past this many entries.
    pub max_cache_entries: usize,

    /// The glyphs handed out to processes.
    pub glyphs: Vec<char>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            update_rate: DEFAULT_UPDATE_RATE,
            enable_gpu: true,
            lookup_timeout: USERNAME_LOOKUP_TIMEOUT,
            max_cache_entries: USERNAME_CACHE_MAX_ENTRIES,
            glyphs: DEFAULT_SYMBOLS.to_vec(),
        }
    }
}

/// Returns the default config path, if there is a config directory at all.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(DEFAULT_CONFIG_FILE_NAME))
}

/// Reads the config file.
///
/// An explicitly given path must exist. If none is given, the default location
/// is tried, and if nothing is there the defaults are used.
pub fn read_config(config_path: Option<&Path>) -> OptionResult<Config> {
    match config_path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|err| {
                OptionError::config(format!(
                    "unable to read the config file at '{}': {err}",
                    path.display()
                ))
            })?;
            parse_config(&text)
        }
        None => match default_config_path() {
            Some(path) if path.exists() => {
                log::debug!("Reading the config file at {}.", path.display());
                parse_config(&fs::read_to_string(path)?)
            }
            _ => Ok(Config::default()),
        },
    }
}

fn parse_config(text: &str) -> OptionResult<Config> {
    Ok(toml_edit::de::from_str(text)?)
}

/// Combines the config file and arguments, with arguments taking precedence.
pub fn get_pipeline_config(args: &Args, config: &Config) -> OptionResult<PipelineConfig> {
    let update_rate = get_update_rate(args, config)?;

    let enable_gpu = !args.disable_gpu && config.collection.enable_gpu.unwrap_or(true);

    let lookup_timeout = match &config.username_cache.lookup_timeout {
        Some(value) => try_parse_duration(value)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| OptionError::invalid_config_value("lookup_timeout"))?,
        None => USERNAME_LOOKUP_TIMEOUT,
    };

    let max_cache_entries = config
        .username_cache
        .max_entries
        .unwrap_or(USERNAME_CACHE_MAX_ENTRIES);

    let glyphs = match &config.symbols.glyphs {
        Some(glyphs) if glyphs.is_empty() => {
            return Err(OptionError::config("'glyphs' must have at least one glyph."));
        }
        Some(glyphs) => glyphs.chars().collect(),
        None => DEFAULT_SYMBOLS.to_vec(),
    };

    Ok(PipelineConfig {
        update_rate,
        enable_gpu,
        lookup_timeout,
        max_cache_entries,
        glyphs,
    })
}

fn get_update_rate(args: &Args, config: &Config) -> OptionResult<Duration> {
    let too_low = |rate: Duration| rate < MIN_UPDATE_RATE;
    let min_ms = MIN_UPDATE_RATE.as_millis();

    if let Some(rate) = &args.rate {
        let rate = try_parse_duration(&StringOrNum::from(rate.clone()))
            .map_err(|_| OptionError::invalid_arg_value("rate"))?;
        if too_low(rate) {
            return Err(OptionError::Argument(
                format!("'--rate' must be at least {min_ms}ms.").into(),
            ));
        }
        Ok(rate)
    } else if let Some(rate) = &config.collection.update_rate {
        let rate = try_parse_duration(rate)
            .map_err(|_| OptionError::invalid_config_value("update_rate"))?;
        if too_low(rate) {
            return Err(OptionError::config(format!(
                "'update_rate' must be at least {min_ms}ms."
            )));
        }
        Ok(rate)
    } else {
        Ok(DEFAULT_UPDATE_RATE)
    }
}

/// Parses a duration given either as plain milliseconds or as a human
/// duration like `2s`.
fn try_parse_duration(value: &StringOrNum) -> Result<Duration, humantime::DurationError> {
    match value {
        StringOrNum::Num(ms) => Ok(Duration::from_millis(*ms)),
        StringOrNum::String(s) => match s.trim().parse::<u64>() {
            Ok(ms) => Ok(Duration::from_millis(ms)),
            Err(_) => humantime::parse_duration(s.trim()),
        },
    }
}
