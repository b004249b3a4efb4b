//! # Office Hours Runtime
//!
//! The [`Store`] — runtime coordinator for a reducer.
//!
//! The store manages:
//! 1. State (behind an `RwLock` for concurrent access)
//! 2. The reducer (business logic)
//! 3. The environment (injected dependencies)
//! 4. Effect execution, with produced actions fed back into the reducer
//!
//! Actions sent to the store are applied in arrival order: the reducer runs
//! under the state write lock, so two concurrent `send`s serialize and the
//! view only ever observes whole transitions. Effects run on spawned tasks
//! and re-enter through [`Store::send`].

use officehours_core::reducer::{Effect, Reducer};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Runtime coordinator for a reducer.
///
/// Cheap to clone; clones share the same state, reducer and environment.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(QueueState::default(), QueueReducer, env);
/// store.send(QueueAction::LoadPartition { status: TicketStatus::Open }).await;
/// let open = store.state(|s| s.open.tickets.clone()).await;
/// ```
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: Arc<R>,
    environment: Arc<E>,
    pending_effects: Arc<AtomicUsize>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: Arc::clone(&self.reducer),
            environment: Arc::clone(&self.environment),
            pending_effects: Arc::clone(&self.pending_effects),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer: Arc::new(reducer),
            environment: Arc::new(environment),
            pending_effects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Send an action through the reducer and schedule its effects.
    ///
    /// The reducer runs before this returns; effects run on background
    /// tasks and feed any produced actions back through `send`.
    pub async fn send(&self, action: A) {
        let effects = {
            let mut state = self.state.write().await;
            self.reducer.reduce(&mut state, action, &self.environment)
        };

        for effect in effects {
            if matches!(effect, Effect::None) {
                continue;
            }
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let store = self.clone();
            tokio::spawn(async move {
                execute(store.clone(), effect).await;
                store.pending_effects.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    /// Read the current state through a closure.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Number of effect tasks currently in flight.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.pending_effects.load(Ordering::SeqCst)
    }

    /// Wait until all in-flight effects (and the actions they feed back)
    /// have drained, or the deadline passes.
    ///
    /// Returns `true` if the store settled within the deadline.
    pub async fn settle(&self, deadline: Duration) -> bool {
        let poll = async {
            loop {
                if self.pending_effects() == 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(deadline, poll).await.is_ok()
    }
}

/// Execute one effect, recursing into composites.
///
/// Boxed because `Sequential`/`Parallel` recurse through an async fn.
fn execute<S, A, E, R>(
    store: Store<S, A, E, R>,
    effect: Effect<A>,
) -> Pin<Box<dyn Future<Output = ()> + Send>>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) => {
                let mut handles = Vec::with_capacity(effects.len());
                for inner in effects {
                    handles.push(tokio::spawn(execute(store.clone(), inner)));
                }
                for handle in handles {
                    if let Err(error) = handle.await {
                        tracing::error!(%error, "parallel effect task failed");
                    }
                }
            },
            Effect::Sequential(effects) => {
                for inner in effects {
                    execute(store.clone(), inner).await;
                }
            },
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                store.send(*action).await;
            },
            Effect::Future(future) => {
                if let Some(action) = future.await {
                    store.send(action).await;
                }
            },
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use officehours_core::reducer::Effects;
    use officehours_core::smallvec;

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum CounterAction {
        Increment,
        IncrementLater,
    }

    struct CounterReducer;
    struct NoEnv;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = NoEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Effects<Self::Action> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![]
                },
                CounterAction::IncrementLater => {
                    smallvec![Effect::Future(Box::pin(async {
                        Some(CounterAction::Increment)
                    }))]
                },
            }
        }
    }

    #[tokio::test]
    async fn send_applies_reducer_immediately() {
        let store = Store::new(CounterState::default(), CounterReducer, NoEnv);
        store.send(CounterAction::Increment).await;
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn effects_feed_actions_back() {
        let store = Store::new(CounterState::default(), CounterReducer, NoEnv);
        store.send(CounterAction::IncrementLater).await;
        assert!(store.settle(Duration::from_secs(1)).await);
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn actions_apply_in_arrival_order() {
        let store = Store::new(CounterState::default(), CounterReducer, NoEnv);
        for _ in 0..10 {
            store.send(CounterAction::Increment).await;
        }
        assert_eq!(store.state(|s| s.count).await, 10);
    }
}
