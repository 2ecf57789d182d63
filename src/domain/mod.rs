mod details;
pub mod types;

pub use types::{
    system_clock, CacheMap, Clock, ListingId, QueueSnapshot, RunStats, Verdict,
};
