//! The reducer abstraction: pure state transitions with explicit effects.
//!
//! Business logic lives in reducers — functions of
//! `(State, Action, Environment) → Effects` that mutate state in place and
//! return descriptions of side effects for the runtime to execute. Side
//! effects are values, never hidden I/O, which keeps the logic deterministic
//! and directly testable.

use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// The effect vector returned by reducers.
///
/// Inline capacity of four covers the common case without allocation.
pub type Effects<Action> = SmallVec<[Effect<Action>; 4]>;

/// Describes a side effect to be executed by the runtime.
///
/// Effects are NOT executed where they are created; the runtime runs them
/// and feeds any produced actions back into the reducer.
#[allow(missing_docs)]
pub enum Effect<Action> {
    /// No-op effect.
    None,

    /// Run effects concurrently.
    Parallel(Vec<Effect<Action>>),

    /// Run effects one after another.
    Sequential(Vec<Effect<Action>>),

    /// Dispatch an action after a delay (timeouts, retries).
    Delay {
        /// How long to wait.
        duration: Duration,
        /// Action to dispatch after the delay.
        action: Box<Action>,
    },

    /// Arbitrary async computation.
    ///
    /// Resolving to `Some(action)` feeds the action back into the reducer.
    Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
}

impl<Action> std::fmt::Debug for Effect<Action>
where
    Action: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "Effect::None"),
            Self::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Self::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
            Self::Delay { duration, action } => f
                .debug_struct("Effect::Delay")
                .field("duration", duration)
                .field("action", action)
                .finish(),
            Self::Future(_) => write!(f, "Effect::Future(<future>)"),
        }
    }
}

impl<Action> Effect<Action> {
    /// Combine effects to run concurrently.
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially.
    #[must_use]
    pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Sequential(effects)
    }
}

/// The core trait for business logic.
///
/// A reducer:
/// 1. Validates the action.
/// 2. Updates state in place.
/// 3. Returns effect descriptions for the runtime to execute.
pub trait Reducer {
    /// The state type this reducer operates on.
    type State;

    /// The action type this reducer processes.
    type Action;

    /// The environment type carrying injected dependencies.
    type Environment;

    /// Reduce an action into state changes and effects.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action>;
}
