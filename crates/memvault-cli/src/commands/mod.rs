pub mod memory;
pub mod stats;

pub use memory::MemoryCommand;
pub use stats::StatsCommand;
