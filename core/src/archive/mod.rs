// keel/src/archive/mod.rs

//! Archive report: a fan-out/fan-in composite that queries a set of history
//! archives in parallel and summarizes their published state.

pub mod get_state;
pub mod report;
pub mod state;

pub use get_state::GetArchiveStateWork;
pub use report::{ArchiveReportWork, MemorySink, ReportSink, TracingSink};
pub use state::{ArchiveDescriptor, ArchiveStateFetcher, HistoryArchiveState};
