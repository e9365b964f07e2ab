//! Metric collaborators and the data they produce.
//!
//! Sources wrap the OS-specific readings (CPU ticks, memory, disk, network
//! counters, processes, temperature) behind the [`SampleSource`] trait; the
//! expensive ones are memoized per kind by [`cache::TtlCache`].

pub mod cache;
pub mod collector;
pub mod data;
pub mod source;

// Re-export commonly used items
pub use cache::{CacheKind, MetricCaches, TtlCache};
pub use collector::default_sources;
pub use data::SystemSnapshot;
pub use source::{CpuTopology, SampleSource, SampleSources};
