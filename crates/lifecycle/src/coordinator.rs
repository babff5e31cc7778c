//! Transaction coordinator: one logical operation, one transaction.

use std::future::Future;
use std::time::Instant;

use store::{Store, Transaction};

use crate::error::{LifecycleError, Result};
use crate::retry::RetryPolicy;

/// Runs units of work atomically with bounded retry on transient failures.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: Store> TransactionCoordinator<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `unit` inside a fresh transaction.
    ///
    /// The unit receives the transaction by value and hands it back with its
    /// result: Ok commits, Err rolls back. Retryable failures start over with
    /// a new transaction until the policy gives up, which surfaces as
    /// [`LifecycleError::Conflict`]. A unit that is dropped mid-way (for
    /// example by a timeout) drops its transaction, which rolls it back.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut unit: F) -> Result<T>
    where
        F: FnMut(S::Tx) -> Fut,
        Fut: Future<Output = (S::Tx, Result<T>)>,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match self.attempt(&mut unit).await {
                Ok(value) => {
                    metrics::histogram!("transaction_duration_seconds", "operation" => operation)
                        .record(started.elapsed().as_secs_f64());
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "transaction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    metrics::counter!("transaction_retries_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transaction failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    metrics::counter!("transaction_conflicts_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(operation, attempt, error = %err, "transaction retries exhausted");
                    return Err(LifecycleError::Conflict(format!(
                        "{operation} gave up after {attempt} attempts: {err}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt<T, F, Fut>(&self, unit: &mut F) -> Result<T>
    where
        F: FnMut(S::Tx) -> Fut,
        Fut: Future<Output = (S::Tx, Result<T>)>,
    {
        let tx = self.store.begin().await?;
        let (tx, result) = unit(tx).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use common::UserId;
    use domain::{Money, Product, ProductStatus};
    use store::InMemoryStore;

    use super::*;

    fn coordinator(store: &InMemoryStore, attempts: u32) -> TransactionCoordinator<InMemoryStore> {
        TransactionCoordinator::new(
            store.clone(),
            RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    fn product() -> Product {
        Product::new(
            UserId::new(),
            "Widget",
            Money::from_cents(100),
            1,
            ProductStatus::Published,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn commits_on_success() {
        let store = InMemoryStore::new();
        let product = product();
        let id = product.id;

        coordinator(&store, 3)
            .run("insert", |mut tx| {
                let product = product.clone();
                async move {
                    let result = tx.insert_product(&product).await.map_err(Into::into);
                    (tx, result)
                }
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_product(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let store = InMemoryStore::new();
        let product = product();
        let id = product.id;

        let result: Result<()> = coordinator(&store, 3)
            .run("insert", |mut tx| {
                let product = product.clone();
                async move {
                    if let Err(e) = tx.insert_product(&product).await {
                        return (tx, Err(e.into()));
                    }
                    (tx, Err(LifecycleError::forbidden("nope")))
                }
            })
            .await;

        assert!(matches!(result, Err(LifecycleError::Forbidden(_))));
        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_product(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retries_transient_commit_failures() {
        let store = InMemoryStore::new();
        store.inject_commit_conflicts(2);
        let calls = Arc::new(AtomicU32::new(0));

        coordinator(&store, 3)
            .run("noop", |tx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (tx, Ok(()))
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_conflict() {
        let store = InMemoryStore::new();
        store.inject_commit_conflicts(5);

        let result: Result<()> = coordinator(&store, 2)
            .run("noop", |tx| async move { (tx, Ok(())) })
            .await;

        assert!(matches!(result, Err(LifecycleError::Conflict(_))));
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let store = InMemoryStore::new();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = coordinator(&store, 5)
            .run("fail", |tx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (tx, Err(LifecycleError::not_found("order", "x")))
                }
            })
            .await;

        assert!(matches!(result, Err(LifecycleError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
