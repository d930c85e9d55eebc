//! Result delivery pipeline.
//!
//! `deliver` is called from the engine callback context and must never
//! block it: batches go onto an unbounded channel and a forwarding task
//! drains them to the consumer's sink in arrival order. The engine has no
//! notion of flow control, so with no sink registered batches are
//! discarded rather than buffered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use platelink_core::types::ResultBatch;

/// Consumer-registered receiver of recognition batches.
///
/// `on_batch` runs on the dispatcher's forwarding task, which the consumer
/// controls the lifetime of via `register_sink`/`clear_sink`; hand off to
/// a UI queue from here if needed.
pub trait ResultSink: Send + Sync {
    fn on_batch(&self, batch: ResultBatch);
}

/// Marshals incoming recognition batches to the consumer.
///
/// Guarantees FIFO delivery with no drops or merges while a sink is
/// registered. Delivery and discard counts are kept for logging.
#[derive(Clone, Default)]
pub struct ResultDispatcher {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<ResultBatch>>>>,
    delivered: Arc<AtomicU64>,
    discarded: Arc<AtomicU64>,
}

impl ResultDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer sink and start the forwarding task.
    ///
    /// Replaces any previously registered sink; batches already queued for
    /// the old sink are still delivered to it in order before its task
    /// winds down.
    pub fn register_sink(&self, sink: Arc<dyn ResultSink>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ResultBatch>();
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                sink.on_batch(batch);
            }
            tracing::debug!("Result forwarding task finished");
        });
        *self.sender.lock().expect("sink mutex poisoned") = Some(tx);
    }

    /// Drop the sink. Subsequent batches are discarded.
    pub fn clear_sink(&self) {
        *self.sender.lock().expect("sink mutex poisoned") = None;
    }

    /// Accept one batch from the engine callback channel. Never blocks.
    pub fn deliver(&self, batch: ResultBatch) {
        let sender = self.sender.lock().expect("sink mutex poisoned");
        match sender.as_ref() {
            Some(tx) if tx.send(batch).is_ok() => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                let n = self.discarded.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(discarded = n, "Result batch discarded (no sink)");
            }
        }
    }

    /// Batches handed to a sink so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Batches dropped because no sink was registered.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use platelink_core::types::{Confidence, FrameSnapshot, PlateRead, PlateRect, PlateText};

    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn plates(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ResultSink for RecordingSink {
        fn on_batch(&self, batch: ResultBatch) {
            let mut seen = self.seen.lock().unwrap();
            for read in batch.reads {
                seen.push(read.plate.0);
            }
        }
    }

    fn batch_with_plate(plate: &str) -> ResultBatch {
        ResultBatch::new(
            vec![PlateRead {
                plate: PlateText::new(plate.to_string()),
                confidence: Confidence::new(0.9),
                region: PlateRect::default(),
            }],
            FrameSnapshot::default(),
        )
    }

    async fn wait_for_count(sink: &RecordingSink, count: usize) {
        for _ in 0..200 {
            if sink.plates().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!(
            "sink never reached {count} batches, got {}",
            sink.plates().len()
        );
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let dispatcher = ResultDispatcher::new();
        let sink = RecordingSink::new();
        dispatcher.register_sink(sink.clone());

        dispatcher.deliver(batch_with_plate("B1"));
        dispatcher.deliver(batch_with_plate("B2"));
        dispatcher.deliver(batch_with_plate("B3"));

        wait_for_count(&sink, 3).await;
        assert_eq!(sink.plates(), vec!["B1", "B2", "B3"]);
        assert_eq!(dispatcher.delivered(), 3);
        assert_eq!(dispatcher.discarded(), 0);
    }

    #[tokio::test]
    async fn test_no_sink_discards_without_buffering() {
        let dispatcher = ResultDispatcher::new();
        dispatcher.deliver(batch_with_plate("LOST"));
        dispatcher.deliver(batch_with_plate("GONE"));
        assert_eq!(dispatcher.discarded(), 2);

        // A sink registered afterwards sees nothing from before.
        let sink = RecordingSink::new();
        dispatcher.register_sink(sink.clone());
        dispatcher.deliver(batch_with_plate("SEEN"));
        wait_for_count(&sink, 1).await;
        assert_eq!(sink.plates(), vec!["SEEN"]);
    }

    #[tokio::test]
    async fn test_clear_sink_resumes_discarding() {
        let dispatcher = ResultDispatcher::new();
        let sink = RecordingSink::new();
        dispatcher.register_sink(sink.clone());

        dispatcher.deliver(batch_with_plate("A"));
        wait_for_count(&sink, 1).await;

        dispatcher.clear_sink();
        dispatcher.deliver(batch_with_plate("B"));
        assert_eq!(dispatcher.discarded(), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.plates(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_deliver_from_many_producers_keeps_all_batches() {
        let dispatcher = ResultDispatcher::new();
        let sink = RecordingSink::new();
        dispatcher.register_sink(sink.clone());

        let mut handles = Vec::new();
        for producer in 0..4 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    dispatcher.deliver(batch_with_plate(&format!("P{producer}-{i}")));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        wait_for_count(&sink, 40).await;
        let plates = sink.plates();
        assert_eq!(plates.len(), 40);

        // Per-producer order is preserved even when producers interleave.
        for producer in 0..4 {
            let seen: Vec<&String> = plates
                .iter()
                .filter(|p| p.starts_with(&format!("P{producer}-")))
                .collect();
            let expected: Vec<String> =
                (0..10).map(|i| format!("P{producer}-{i}")).collect();
            assert_eq!(seen.len(), 10);
            for (got, want) in seen.iter().zip(expected.iter()) {
                assert_eq!(*got, want);
            }
        }
    }
}
