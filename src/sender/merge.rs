//! Stack-of-sources fan-in with strict top-wins precedence.
//!
//! What looks like a simple fan-in is a LIFO stack of sources: while the
//! most recently added source has elements or is still open, nothing from
//! any deeper source is emitted. The sender relies on this to replay the
//! tail of a failed connection before any newly submitted notification:
//! the requeue source is pushed on top of the user-input source and
//! drained completely before input is consumed again.

use tokio::sync::mpsc;

/// Merges a stack of sources, giving strict precedence to the most
/// recently added source until it closes.
///
/// Owned and driven by a single consumer: [`add`](Self::add) pushes a new
/// top source, [`recv`](Self::recv) always drains the current top before
/// popping it. `recv` on an empty stack stays pending until the owner adds
/// a source, and yields `None` only once the merge was closed and every
/// source has drained.
#[derive(Debug)]
pub(crate) struct PriorityMerge<T> {
    stack: Vec<mpsc::Receiver<T>>,
    closed: bool,
}

impl<T> PriorityMerge<T> {
    /// Create a merge with no sources.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            closed: false,
        }
    }

    /// Push a source. It immediately becomes the top of the stack.
    ///
    /// Must not be called after [`close`](Self::close).
    pub fn add(&mut self, source: mpsc::Receiver<T>) {
        debug_assert!(!self.closed, "add after close");
        self.stack.push(source);
    }

    /// Signal that no further sources will be added.
    ///
    /// The merge keeps emitting until every remaining source has drained,
    /// then `recv` yields `None`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Receive the next element, always from the topmost non-empty source.
    ///
    /// Cancel-safe: no element is lost when the returned future is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                if self.closed {
                    return None;
                }
                // Nothing to emit until the owner adds a source; the owner
                // is the caller, so just stay pending until re-entered.
                std::future::pending::<()>().await;
                continue;
            };

            match top.recv().await {
                Some(item) => return Some(item),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn source_of(items: &[u32]) -> mpsc::Receiver<u32> {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for &item in items {
            tx.try_send(item).unwrap();
        }
        rx
    }

    async fn collect(merge: &mut PriorityMerge<u32>) -> Vec<u32> {
        let mut items = Vec::new();
        while let Some(item) = merge.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_single_source_in_order() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1, 2, 3]));
        merge.close();

        assert_eq!(collect(&mut merge).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_newest_source_takes_precedence() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1, 2, 3]));
        merge.add(source_of(&[4, 5]));
        merge.close();

        assert_eq!(collect(&mut merge).await, vec![4, 5, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_add_mid_drain_preempts_deeper_source() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1, 2, 3]));

        assert_eq!(merge.recv().await, Some(1));

        merge.add(source_of(&[10]));
        merge.close();

        assert_eq!(collect(&mut merge).await, vec![10, 2, 3]);
    }

    #[tokio::test]
    async fn test_add_with_undelivered_elements_does_not_block() {
        let mut merge = PriorityMerge::new();

        let (tx_a, rx_a) = mpsc::channel(1);
        merge.add(rx_a);

        // An element is waiting in the top source with no consumer.
        tx_a.send(1u32).await.unwrap();

        // Pushing another source must still complete.
        let (_tx_b, rx_b) = mpsc::channel::<u32>(1);
        merge.add(rx_b);
    }

    #[tokio::test]
    async fn test_open_top_source_blocks_deeper_sources() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1]));

        let (_tx_top, rx_top) = mpsc::channel::<u32>(1);
        merge.add(rx_top);

        // The top source is empty but still open, so nothing may be
        // emitted from the deeper source.
        let pending = timeout(Duration::from_millis(50), merge.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_emission_resumes_when_top_closes() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1]));

        let (tx_top, rx_top) = mpsc::channel(1);
        merge.add(rx_top);
        tx_top.send(10u32).await.unwrap();
        drop(tx_top);

        merge.close();
        assert_eq!(collect(&mut merge).await, vec![10, 1]);
    }

    #[tokio::test]
    async fn test_recv_pends_on_empty_unclosed_merge() {
        let mut merge = PriorityMerge::<u32>::new();

        let pending = timeout(Duration::from_millis(50), merge.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_output_closes_only_after_close_and_drain() {
        let mut merge = PriorityMerge::new();
        merge.add(source_of(&[1]));
        merge.close();

        assert_eq!(merge.recv().await, Some(1));
        assert_eq!(merge.recv().await, None);
    }

    #[tokio::test]
    async fn test_elements_arriving_later_are_emitted() {
        let mut merge = PriorityMerge::new();
        let (tx, rx) = mpsc::channel(1);
        merge.add(rx);

        let feeder = tokio::spawn(async move {
            for item in [7u32, 8, 9] {
                tx.send(item).await.unwrap();
            }
        });

        assert_eq!(merge.recv().await, Some(7));
        assert_eq!(merge.recv().await, Some(8));
        assert_eq!(merge.recv().await, Some(9));
        feeder.await.unwrap();
    }
}
