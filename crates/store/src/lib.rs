pub mod export;
pub mod read;

pub use export::FileSpanExporter;
pub use read::read_trace_log;
