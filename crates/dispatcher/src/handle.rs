//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use safety_gate::Command;

use crate::metrics::SinkMetrics;
use crate::sink::CommandSink;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Command>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink`
    pub fn spawn<S: CommandSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new(name.clone()));

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a command without waiting.
    ///
    /// Returns false if the queue is full (command dropped) or the worker is gone.
    pub fn try_send(&self, command: Command) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(c)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    command = %c.command_type(),
                    mono_ms = c.time().mono_ms,
                    "queue full, command dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.inc_failure_count();
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "worker task panicked");
        }
        debug!(sink = %self.name, "sink handle shut down");
    }
}

#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: CommandSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Command>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    while let Some(command) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.send(&command).await {
            Ok(()) => metrics.inc_write_count(),
            Err(e) => {
                // the gate never retries; the failure is only recorded
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    command = %command.command_type(),
                    error = %e,
                    "command delivery failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stop;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl CommandSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&mut self, _command: &Command) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn mock(name: &str, should_fail: bool, delay_ms: u64) -> (MockSink, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            name: name.to_string(),
            write_count: Arc::clone(&count),
            should_fail,
            delay_ms,
        };
        (sink, count)
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let (sink, count) = mock("test", false, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..5 {
            assert!(handle.try_send(stop(i)));
        }

        handle.shutdown().await;
        assert_eq!(count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_queue_full_drops() {
        let (sink, _count) = mock("slow", false, 100);
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(stop(i));
        }

        assert!(handle.metrics().dropped_count() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let (sink, _count) = mock("failing", true, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(stop(i));
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(handle.metrics().failure_count(), 3);
        handle.shutdown().await;
    }
}
