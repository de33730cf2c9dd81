//! Domain models: validated symbols, UTC timestamps, stock snapshots.

pub mod snapshot;
pub mod symbol;
pub mod timestamp;

pub use snapshot::{
    categorize, classify_gap, format_count, format_dollars, gap_percent, relative_volume, round2,
    StockSnapshot,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
