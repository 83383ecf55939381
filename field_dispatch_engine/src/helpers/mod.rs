mod dedup_cache;
mod distance;

pub use dedup_cache::RecentEventCache;
pub use distance::{distance_miles, round_to_tenth};
