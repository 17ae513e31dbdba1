//! Readiness coordination: a typed publish/subscribe channel with
//! barrier semantics.
//!
//! Components announce "the application has finished loading" and "a
//! resolver has become ready" without the subscriber holding a
//! compile-time dependency on the announcer. `publish` is a barrier,
//! not fire-and-forget: it completes only after every handler for that
//! signal type has finished its asynchronous work, in subscription
//! order. Late subscribers do not receive signals published before
//! they subscribed.

use crate::contract::ContractKind;
use crate::result::{ElegirError, ElegirResult};
use futures::future::{self, BoxFuture, FutureExt};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Published when the application under test has finished loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppInitialized;

/// Published by a resolver after its one-time readiness transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverReady {
    /// Which resolver became ready
    pub kind: ContractKind,
}

/// One-time readiness of a single resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    /// Waiting for the application-initialized signal
    #[default]
    Pending,
    /// Live data fetched, resolution queries allowed
    Ready,
    /// The readiness fetch failed; the session is unusable
    Failed,
}

type SignalHandler =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> BoxFuture<'static, ElegirResult<()>> + Send + Sync>;

/// Typed publish/subscribe channel gating engine readiness
#[derive(Default)]
pub struct ReadinessBus {
    handlers: Mutex<HashMap<TypeId, Vec<SignalHandler>>>,
}

impl ReadinessBus {
    /// Create a bus with no subscriptions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every future publication of signal `S`
    ///
    /// Handlers for one signal type run in subscription order.
    pub fn subscribe<S, F, Fut>(&self, handler: F)
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ElegirResult<()>> + Send + 'static,
    {
        let wrapped: SignalHandler = Arc::new(move |signal: Arc<dyn Any + Send + Sync>| {
            match signal.downcast::<S>() {
                Ok(typed) => handler(typed).boxed(),
                Err(_) => future::ready(Err(ElegirError::Configuration {
                    message: "signal type mismatch in readiness bus".to_string(),
                }))
                .boxed(),
            }
        });
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.entry(TypeId::of::<S>()).or_default().push(wrapped);
        }
    }

    /// Publish `signal`, suspending until every handler completes
    ///
    /// The first handler error aborts the remaining handlers and
    /// propagates to the publisher; readiness failures are fatal for
    /// the session, so there is nothing useful to run afterward.
    ///
    /// # Errors
    ///
    /// Whatever a handler returns.
    pub async fn publish<S: Send + Sync + 'static>(&self, signal: S) -> ElegirResult<()> {
        let snapshot: Vec<SignalHandler> = self
            .handlers
            .lock()
            .map(|handlers| {
                handlers
                    .get(&TypeId::of::<S>())
                    .cloned()
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        // The lock is released before any handler runs, so handlers may
        // publish follow-up signals on this same bus.
        let signal: Arc<dyn Any + Send + Sync> = Arc::new(signal);
        for handler in snapshot {
            handler(signal.clone()).await?;
        }
        Ok(())
    }

    /// Number of subscriptions for signal `S`
    #[must_use]
    pub fn subscriber_count<S: Send + Sync + 'static>(&self) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.get(&TypeId::of::<S>()).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl fmt::Debug for ReadinessBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self
            .handlers
            .lock()
            .map(|h| h.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("ReadinessBus")
            .field("subscriptions", &total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_publish_with_no_subscribers_is_ok() {
        let bus = ReadinessBus::new();
        assert!(bus.publish(AppInitialized).await.is_ok());
    }

    #[tokio::test]
    async fn test_handlers_run_in_subscription_order() {
        let bus = ReadinessBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe::<AppInitialized, _, _>(move |_| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(tag);
                    Ok(())
                }
            });
        }
        bus.publish(AppInitialized).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_publish_is_a_barrier() {
        let bus = ReadinessBus::new();
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let completed = completed.clone();
            bus.subscribe::<AppInitialized, _, _>(move |_| {
                let completed = completed.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }
        bus.publish(AppInitialized).await.unwrap();
        // All async handler work finished before publish returned
        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_handler_error_aborts_and_propagates() {
        let bus = ReadinessBus::new();
        let ran_after_failure = Arc::new(AtomicUsize::new(0));
        bus.subscribe::<AppInitialized, _, _>(|_| async {
            Err(ElegirError::RemoteFetch {
                operation: "widgets".to_string(),
                message: "503".to_string(),
            })
        });
        let ran = ran_after_failure.clone();
        bus.subscribe::<AppInitialized, _, _>(move |_| {
            let ran = ran.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let err = bus.publish(AppInitialized).await.unwrap_err();
        assert!(matches!(err, ElegirError::RemoteFetch { .. }));
        assert_eq!(ran_after_failure.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_signal() {
        let bus = ReadinessBus::new();
        bus.publish(AppInitialized).await.unwrap();

        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = invoked.clone();
        bus.subscribe::<AppInitialized, _, _>(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        // The missed signal is not replayed
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        bus.publish(AppInitialized).await.unwrap();
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signal_types_are_isolated() {
        let bus = ReadinessBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        bus.subscribe::<ResolverReady, _, _>(move |signal| {
            let counter = counter.clone();
            async move {
                assert_eq!(signal.kind, ContractKind::CustomWidget);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        bus.publish(AppInitialized).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.publish(ResolverReady {
            kind: ContractKind::CustomWidget,
        })
        .await
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_may_publish_follow_up_signal() {
        let bus = Arc::new(ReadinessBus::new());
        let ready_seen = Arc::new(AtomicUsize::new(0));

        let seen = ready_seen.clone();
        bus.subscribe::<ResolverReady, _, _>(move |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let bus_for_handler = Arc::downgrade(&bus);
        bus.subscribe::<AppInitialized, _, _>(move |_| {
            let bus = bus_for_handler.clone();
            async move {
                if let Some(bus) = bus.upgrade() {
                    bus.publish(ResolverReady {
                        kind: ContractKind::NativePlatform,
                    })
                    .await?;
                }
                Ok(())
            }
        });

        bus.publish(AppInitialized).await.unwrap();
        assert_eq!(ready_seen.load(Ordering::SeqCst), 1);
    }
}
