//! Analysis queue
//!
//! Webhook and chat handlers enqueue jobs and return immediately. A single
//! worker drains the queue, so analyses run one at a time in arrival order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::RcaAgent;
use crate::alert::{AlertData, GrafanaAlert};
use crate::chat::ReplyTarget;
use crate::metrics::record_analysis;
use crate::o11y::GrafanaClient;
use crate::sinks::{Delivery, ReportSink};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisJob {
    /// Grafana alert. Reports go to the sinks' default destinations.
    Alert { alert: GrafanaAlert },
    /// Free-form request, answered at `reply_to` when set.
    Chat {
        text: String,
        reply_to: Option<ReplyTarget>,
    },
}

impl AnalysisJob {
    fn origin(&self) -> &'static str {
        match self {
            AnalysisJob::Alert { .. } => "alert",
            AnalysisJob::Chat { .. } => "chat",
        }
    }
}

#[derive(Debug)]
pub struct QueuedJob {
    pub id: String,
    pub job: AnalysisJob,
}

/// Sending half of the analysis queue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<QueuedJob>,
}

impl Dispatcher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a job without waiting, returning its id.
    pub fn submit(&self, job: AnalysisJob) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let origin = job.origin();

        self.tx
            .try_send(QueuedJob {
                id: id.clone(),
                job,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    Error::Internal("analysis queue is full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    Error::Internal("analysis worker has stopped".to_string())
                }
            })?;

        info!(job_id = %id, origin = origin, "Analysis queued");
        Ok(id)
    }
}

pub struct AnalysisWorker {
    agent: RcaAgent,
    grafana: GrafanaClient,
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl AnalysisWorker {
    pub fn new(agent: RcaAgent, grafana: GrafanaClient, sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self {
            agent,
            grafana,
            sinks,
        }
    }

    /// Process jobs until every [`Dispatcher`] is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<QueuedJob>) {
        info!("Starting analysis worker");

        while let Some(queued) = rx.recv().await {
            let origin = queued.job.origin();
            let job_id = queued.id.clone();

            match self.process(queued).await {
                Ok(()) => record_analysis(origin, true),
                Err(e) => {
                    record_analysis(origin, false);
                    error!(job_id = %job_id, "Analysis failed: {}", e);
                }
            }
        }

        info!("Analysis queue closed, worker exiting");
    }

    pub async fn process(&self, queued: QueuedJob) -> Result<()> {
        let QueuedJob { id, job } = queued;

        let (report, request, reply_to) = match job {
            AnalysisJob::Alert { alert } => {
                info!(
                    job_id = %id,
                    status = ?alert.status,
                    alert_name = %alert.alert_name(),
                    "Analyzing alert"
                );
                let data = AlertData::extract(&alert, &self.grafana).await?;
                let report = self.agent.analyze_alert(&data).await.map_err(agent_error)?;
                (report, data.message(), None)
            }
            AnalysisJob::Chat { text, reply_to } => {
                info!(job_id = %id, "Analyzing chat request");
                let report = self.agent.analyze_text(&text).await.map_err(agent_error)?;
                (report, text, reply_to)
            }
        };

        let delivery = Delivery {
            job_id: id,
            report,
            request,
            reply_to,
        };
        self.deliver(&delivery).await;
        Ok(())
    }

    async fn deliver(&self, delivery: &Delivery) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(delivery).await {
                warn!(
                    job_id = %delivery.job_id,
                    sink = sink.name(),
                    "Failed to deliver report: {}",
                    e
                );
            }
        }
    }
}

fn agent_error(e: anyhow::Error) -> Error {
    Error::Agent(format!("{:#}", e))
}
