pub mod page_table;
pub mod scheduler;

pub use page_table::{PageTable, ReaderSnapshot, PREFETCH_DEPTH};
pub use scheduler::{Scheduler, SchedulerEvent};
