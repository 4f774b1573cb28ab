// Storage primitives shared by the backends
//
// Index records, lazily opened file sets, the single-entry block cache, and
// per-backend read counters.

pub mod block_cache;
pub mod data_index;
pub mod open_state;
pub mod read_stats;

pub use block_cache::{BlockCache, BlockKey};
pub use data_index::{DataIndex, SizeWidth};
pub use open_state::{open_module_file, OpenState};
pub use read_stats::{ReadStats, ReadStatsSnapshot};
