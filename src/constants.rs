use std::time::Duration;

use indoc::indoc;

/// How often each poller samples by default.
pub const DEFAULT_UPDATE_RATE: Duration = Duration::from_millis(1000);

/// The fastest update rate allowed. sysinfo needs some time between CPU
/// refreshes to produce meaningful numbers.
pub const MIN_UPDATE_RATE: Duration = Duration::from_millis(250);

/// How long a username lookup may take before we fall back to the uid.
pub const USERNAME_LOOKUP_TIMEOUT: Duration = Duration::from_millis(100);

/// Once the username cache grows past this, [`clear`](crate::collection::username_cache::UsernameCache::clear)
/// empties it.
pub const USERNAME_CACHE_MAX_ENTRIES: usize = 1000;

/// Returned when the owner of a process can't be determined at all.
pub const UNKNOWN_USER: &str = "?";

/// Glyphs handed out to processes for cross-table identification.
pub const DEFAULT_SYMBOLS: [char; 20] = [
    '▣', '▤', '▥', '▦', '▧', '▨', '▩', '▪', '▫', '▬', '◆', '◇', '○', '●', '◉', '◍', '◎', '◌', '◔',
    '◕',
];

/// How many rows of top processes the driver reports per snapshot.
pub const TOP_PROCESS_COUNT: usize = 5;

pub const CONFIG_DIR_NAME: &str = "mim";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "mim.toml";

pub const CONFIG_TEXT: &str = indoc! {r##"
    # This is a default config file for mim. All of the settings are commented
    # out by default; if you wish to change them, uncomment and modify as you see fit.

    [collection]
    # How often to sample, either in milliseconds or as a duration like "2s".
    #update_rate = "1s"
    # Whether to sample the GPU, if one is present.
    #enable_gpu = true

    [username_cache]
    # How long a username lookup may take before falling back to the numeric uid.
    #lookup_timeout = "100ms"
    # The cache is emptied once it holds more than this many entries.
    #max_entries = 1000

    [symbols]
    # The glyphs assigned to processes.
    #glyphs = "▣▤▥▦▧▨▩▪▫▬◆◇○●◉◍◎◌◔◕"
"##};
