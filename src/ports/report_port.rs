//! Report output port.

use crate::domain::aggregate::PeriodSummary;
use crate::domain::error::LedgerError;
use crate::domain::forecast::Projection;

/// Writes pipeline results to a destination such as a file.
pub trait ReportPort {
    fn write_summary(&self, rows: &[PeriodSummary], output_path: &str) -> Result<(), LedgerError>;

    fn write_forecast(&self, projection: &Projection, output_path: &str) -> Result<(), LedgerError>;
}
