//! The report `Layout` part as a folder tree of sections and visuals.

pub mod naming;
mod serializer;

pub use serializer::{REPORT_FOLDER, ReportSerializer};
