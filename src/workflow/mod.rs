pub mod pipeline;

pub use pipeline::{PageSource, RunReport, RunRequest, process_snapshot, run};
