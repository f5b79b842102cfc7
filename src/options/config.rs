//! The config file's layout. Everything is optional; anything missing falls
//! back to a default.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub(crate) collection: CollectionConfig,
    #[serde(default)]
    pub(crate) username_cache: UsernameCacheConfig,
    #[serde(default)]
    pub(crate) symbols: SymbolsConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrNum {
    String(String),
    Num(u64),
}

impl From<String> for StringOrNum {
    fn from(value: String) -> Self {
        StringOrNum::String(value)
    }
}

impl From<u64> for StringOrNum {
    fn from(value: u64) -> Self {
        StringOrNum::Num(value)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) update_rate: Option<StringOrNum>,
    pub(crate) enable_gpu: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct UsernameCacheConfig {
    pub(crate) lookup_timeout: Option<StringOrNum>,
    pub(crate) max_entries: Option<usize>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct SymbolsConfig {
    pub(crate) glyphs: Option<String>,
}
