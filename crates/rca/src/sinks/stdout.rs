use async_trait::async_trait;

use super::{Delivery, ReportSink};
use crate::config::ReportFormat;
use crate::Result;

#[derive(Debug)]
pub struct StdoutSink {
    format: ReportFormat,
    pretty: bool, // For JSON output
}

impl StdoutSink {
    pub fn new(format: ReportFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }

    fn render(&self, delivery: &Delivery) -> Result<String> {
        match self.format {
            ReportFormat::Json if self.pretty => Ok(serde_json::to_string_pretty(delivery)?),
            ReportFormat::Json => Ok(serde_json::to_string(delivery)?),
            ReportFormat::Text => Ok(delivery.report.format_report()),
        }
    }
}

#[async_trait]
impl ReportSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, delivery: &Delivery) -> Result<()> {
        println!("{}", self.render(delivery)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::parse_report;

    fn delivery() -> Delivery {
        Delivery {
            job_id: "job-1".to_string(),
            report: parse_report("DiskFull", "ANALYSIS: /var filled by logs\nCOMMAND: none"),
            request: "AlertName: DiskFull".to_string(),
            reply_to: None,
        }
    }

    #[test]
    fn json_carries_result_contract() {
        let sink = StdoutSink::new(ReportFormat::Json, false);
        let value: serde_json::Value = serde_json::from_str(&sink.render(&delivery()).unwrap()).unwrap();

        assert_eq!(value["report"]["analysis_results"], "/var filled by logs");
        assert!(value["report"]["final_command"].is_null());
        assert!(value.get("reply_to").is_none());
    }

    #[test]
    fn pretty_json_spans_lines() {
        let sink = StdoutSink::new(ReportFormat::Json, true);
        assert!(sink.render(&delivery()).unwrap().contains('\n'));
    }

    #[tokio::test]
    async fn text_format_prints_report() {
        let sink = StdoutSink::new(ReportFormat::Text, false);
        assert!(sink
            .render(&delivery())
            .unwrap()
            .starts_with("# Root Cause Analysis: DiskFull"));
        assert!(sink.send(&delivery()).await.is_ok());
    }
}
