//! Terminal presentation of refresh results

pub mod display;
pub mod formatting;
mod report;

pub use report::{render_compact, render_json, render_table, ReportFormat, Summary};
