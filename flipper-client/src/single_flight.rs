use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::ClientError;

type SharedResult = Result<Vec<u8>, ClientError>;

/// Coalesces concurrent requests for the same canonical URL into a single
/// outbound call (SPEC_FULL.md §4.2, "Single-flight"). The first caller for
/// a key performs the work and broadcasts the result to everyone else who
/// arrived while it was in flight.
#[derive(Debug, Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, broadcast::Sender<SharedResult>>>,
}

pub enum Lead {
    /// Caller is the leader: must call `finish` with the fetch result.
    Leader,
    /// Caller must wait on the given receiver for the leader's result.
    Follower(broadcast::Receiver<SharedResult>),
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, key: &str) -> Lead {
        let mut inflight = self.inflight.lock();
        if let Some(tx) = inflight.get(key) {
            return Lead::Follower(tx.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        inflight.insert(key.to_string(), tx);
        Lead::Leader
    }

    pub fn finish(&self, key: &str, result: SharedResult) {
        if let Some(tx) = self.inflight.lock().remove(key) {
            let _ = tx.send(result);
        }
    }

    /// Run `fetch` with single-flight coalescing for `key`.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = SharedResult>,
    {
        match self.join(key) {
            Lead::Leader => {
                let result = fetch().await;
                self.finish(key, result.clone());
                result
            }
            Lead::Follower(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Canceled),
            },
        }
    }
}

/// Helper shared by any single-flight-coalesced cache entry (`Arc` so
/// clones share the in-flight state).
pub type SharedSingleFlight = Arc<SingleFlight>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_joins_coalesce_to_one_fetch() {
        let flight: SharedSingleFlight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("contracts/region/10000002", || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(b"payload".to_vec())
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"payload".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
