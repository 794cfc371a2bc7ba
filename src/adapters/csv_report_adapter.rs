//! CSV export of summaries and forecasts.

use crate::domain::aggregate::PeriodSummary;
use crate::domain::error::LedgerError;
use crate::domain::forecast::Projection;
use crate::domain::taxonomy::NameTranslator;
use crate::ports::report_port::ReportPort;
use serde::Serialize;

/// Writes one CSV row per summary or forecast point. Category labels are
/// translated when a translator is set.
#[derive(Default)]
pub struct CsvReportAdapter {
    translator: Option<NameTranslator>,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    period: Option<&'a str>,
    entity_id: Option<u32>,
    category: Option<String>,
    total: String,
}

#[derive(Serialize)]
struct ForecastRow {
    period: usize,
    inflow: String,
    outflow: String,
    closing_balance: String,
    receivables_remaining: String,
    payables_remaining: String,
}

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translator(translator: NameTranslator) -> Self {
        Self {
            translator: Some(translator),
        }
    }

    fn label(&self, category: &str) -> String {
        match &self.translator {
            Some(t) => t.translate(category),
            None => category.to_string(),
        }
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_summary(&self, rows: &[PeriodSummary], output_path: &str) -> Result<(), LedgerError> {
        let mut writer = csv::Writer::from_path(output_path)?;
        for row in rows {
            writer.serialize(SummaryRow {
                period: row.period_key.as_deref(),
                entity_id: row.entity_id,
                category: row.category.as_deref().map(|c| self.label(c)),
                total: row.total.to_string(),
            })?;
        }
        writer.flush()?;
        tracing::info!(rows = rows.len(), path = output_path, "summary written");
        Ok(())
    }

    fn write_forecast(&self, projection: &Projection, output_path: &str) -> Result<(), LedgerError> {
        let mut writer = csv::Writer::from_path(output_path)?;
        for point in &projection.points {
            writer.serialize(ForecastRow {
                period: point.period_index,
                inflow: point.inflow.to_string(),
                outflow: point.outflow.to_string(),
                closing_balance: point.closing_balance.to_string(),
                receivables_remaining: point.receivables_remaining.to_string(),
                payables_remaining: point.payables_remaining.to_string(),
            })?;
        }
        writer.flush()?;
        tracing::info!(points = projection.points.len(), path = output_path, "forecast written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::{AgingBuckets, ForecastEngine};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn summary_has_header_and_translated_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.csv");
        let rows = vec![
            PeriodSummary {
                period_key: Some("2025-01".into()),
                entity_id: None,
                category: Some("Kantoorkosten".into()),
                total: dec!(150.50),
            },
            PeriodSummary {
                period_key: Some("2025-02".into()),
                entity_id: Some(2),
                category: None,
                total: dec!(-3),
            },
        ];
        CsvReportAdapter::with_translator(NameTranslator::default())
            .write_summary(&rows, path.to_str().unwrap())
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "period,entity_id,category,total");
        assert_eq!(lines[1], "2025-01,,Office costs,150.50");
        assert_eq!(lines[2], "2025-02,2,,-3");
    }

    #[test]
    fn forecast_writes_one_row_per_period() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("forecast.csv");
        let projection = ForecastEngine::default().project(
            dec!(1000),
            AgingBuckets::default(),
            AgingBuckets::default(),
            dec!(100),
            dec!(50),
            4,
        );
        CsvReportAdapter::new()
            .write_forecast(&projection, path.to_str().unwrap())
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert!(content.starts_with("period,inflow,outflow,closing_balance"));
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let err = CsvReportAdapter::new()
            .write_summary(&[], "/nonexistent/dir/out.csv")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Csv(_) | LedgerError::Io(_)));
    }
}
