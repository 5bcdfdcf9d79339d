/// Work partitioning and fork-join dispatch
pub mod threading;
