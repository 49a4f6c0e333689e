mod memory;
pub use memory::MemoryCalendar;
