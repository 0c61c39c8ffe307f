//! Financial report generation.
//!
//! Pure aggregation over a ledger snapshot:
//! - Financial summary (realized, pending, projected)
//! - Income statement (DRE) under cash or competence regime

pub mod error;
pub mod period;
pub mod regime;
pub mod service;
pub mod types;


pub use error::ReportError;
pub use period::DateRange;
pub use regime::Regime;
pub use service::ReportService;
pub use types::*;
