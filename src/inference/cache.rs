//! Classifier cache.
//!
//! Memoizes loaded pipelines per model id for the lifetime of the process —
//! the catalog is finite, so there is no eviction. Concurrent `get` calls
//! for the same id share one in-flight load; a failed load propagates to
//! every waiter and leaves the slot empty for a later retry.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use tokio::sync::OnceCell;

use super::{Classifier, InferenceError, InferenceRuntime};
use crate::engine::catalog;

type Slot = Arc<OnceCell<Arc<dyn Classifier>>>;

pub struct ClassifierCache {
    runtime: Arc<dyn InferenceRuntime>,
    slots: Mutex<HashMap<&'static str, Slot>>,
}

impl ClassifierCache {
    pub fn new(runtime: Arc<dyn InferenceRuntime>) -> Self {
        Self {
            runtime,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or load) the classifier for `model_id`.
    ///
    /// Unknown ids resolve to the default catalog model, mirroring the
    /// settings normalizer.
    pub async fn get(&self, model_id: &str) -> Result<Arc<dyn Classifier>, InferenceError> {
        let spec = catalog::resolve(model_id);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(spec.id).or_default())
        };

        slot.get_or_try_init(|| self.runtime.load(spec))
            .await
            .cloned()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ModelOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct StubClassifier;

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, _text: &str, _top_k: usize) -> Result<ModelOutput, InferenceError> {
            Ok(ModelOutput::TextClassification(Vec::new()))
        }
    }

    /// Runtime that counts loads and can hold them open on a gate.
    struct CountingRuntime {
        loads: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl InferenceRuntime for CountingRuntime {
        async fn load(
            &self,
            _spec: &'static catalog::ModelSpec,
        ) -> Result<Arc<dyn Classifier>, InferenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                Err(InferenceError::Load("boom".into()))
            } else {
                Ok(Arc::new(StubClassifier))
            }
        }
    }

    fn runtime(fail: bool, gate: Option<Arc<Notify>>) -> Arc<CountingRuntime> {
        Arc::new(CountingRuntime {
            loads: AtomicUsize::new(0),
            gate,
            fail,
        })
    }

    #[tokio::test]
    async fn repeated_get_loads_once() {
        let rt = runtime(false, None);
        let cache = ClassifierCache::new(rt.clone());
        cache.get("toxic-bert").await.unwrap();
        cache.get("toxic-bert").await.unwrap();
        assert_eq!(rt.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_ids_load_separately() {
        let rt = runtime(false, None);
        let cache = ClassifierCache::new(rt.clone());
        cache.get("toxic-bert").await.unwrap();
        cache.get("mdeberta-xnli").await.unwrap();
        assert_eq!(rt.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_id_shares_the_default_slot() {
        let rt = runtime(false, None);
        let cache = ClassifierCache::new(rt.clone());
        cache.get("no-such-model").await.unwrap();
        cache.get("toxic-bert").await.unwrap();
        assert_eq!(rt.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_load() {
        let gate = Arc::new(Notify::new());
        let rt = runtime(false, Some(gate.clone()));
        let cache = Arc::new(ClassifierCache::new(rt.clone()));

        let a = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("toxic-bert").await }
        });
        let b = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("toxic-bert").await }
        });

        // Give both tasks a chance to reach the slot, then open the gate.
        // Single-flight means only one task is actually inside load(), so a
        // single stored permit is enough.
        tokio::task::yield_now().await;
        gate.notify_one();

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(rt.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_does_not_populate() {
        let rt = runtime(true, None);
        let cache = ClassifierCache::new(rt.clone());
        assert!(cache.get("toxic-bert").await.is_err());
        assert!(cache.get("toxic-bert").await.is_err());
        // Both calls attempted a fresh load: errors are not cached either.
        assert_eq!(rt.loads.load(Ordering::SeqCst), 2);
    }
}
