//! Host hardware/environment detection: cache line size, cache tier
//! sizes, and total RAM, cached after the first query.

pub mod memory;
