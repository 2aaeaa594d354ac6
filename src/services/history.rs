use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{db::HistorySink, models::HistoryRecord};

/// Fire-and-forget writer for the query history
///
/// Records are handed to a background task over a channel, so a slow or
/// failing sink never delays or fails a recommendation response.
#[derive(Clone)]
pub struct HistoryLogger {
    write_tx: mpsc::UnboundedSender<HistoryRecord>,
}

/// Handle for gracefully shutting down the history writer
pub struct HistoryLoggerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl HistoryLoggerHandle {
    /// Stops accepting records, flushes the pending ones and waits for the writer
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("History writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "History writer task failed");
        }
    }
}

impl HistoryLogger {
    /// Spawns the background writer for the given sink
    pub fn spawn(sink: Arc<dyn HistorySink>) -> (Self, HistoryLoggerHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            Self::writer_task(sink, write_rx, shutdown_rx).await;
        });

        (Self { write_tx }, HistoryLoggerHandle { shutdown_tx, task })
    }

    async fn writer_task(
        sink: Arc<dyn HistorySink>,
        mut write_rx: mpsc::UnboundedReceiver<HistoryRecord>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(sink = sink.name(), "History writer task started");

        loop {
            tokio::select! {
                Some(record) = write_rx.recv() => {
                    Self::write(sink.as_ref(), record).await;
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0;
                    while let Some(record) = write_rx.recv().await {
                        Self::write(sink.as_ref(), record).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "History writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write(sink: &dyn HistorySink, record: HistoryRecord) {
        if let Err(e) = sink.record(&record).await {
            tracing::error!(
                error = %e,
                sink = sink.name(),
                seeds = ?record.seed_ids,
                "Failed to write recommendation history"
            );
        }
    }

    /// Queues a record without waiting for it to be written
    pub fn record_in_background(&self, record: HistoryRecord) {
        if let Err(e) = self.write_tx.send(record) {
            tracing::error!(error = %e, "Failed to queue history record");
        }
    }
}
