//! A metrics acquisition pipeline for terminal dashboards.
//!
//! Two pollers run in the background: one samples CPU, memory, and process
//! usage from the host, and one samples an NVIDIA GPU, if there is one. Each
//! publishes complete snapshots on its own stream. A [`UsernameCache`] and a
//! [`SymbolAllocator`] are shared with whatever consumes those snapshots, to
//! decorate process rows with their owner and a stable glyph.
//!
//! [`UsernameCache`]: collection::UsernameCache
//! [`SymbolAllocator`]: symbols::SymbolAllocator

pub mod args;
pub mod collection;
pub mod constants;
pub mod options;
pub mod symbols;

pub mod utils {
    pub mod cancellation_token;
    pub mod logging;
}
