//! # PayKit Core
//!
//! Core traits and types for the PayKit reducer architecture.
//!
//! The customer request lifecycle is modelled as a reducer: a pure function
//! that assigns a new state and *describes* the side effects that go with it.
//! The runtime crate owns execution (spawning, cancellation, observer
//! notification); this crate only owns the vocabulary.
//!
//! ## Core Concepts
//!
//! - **State**: The value owned by a store (for PayKit, the lifecycle state)
//! - **Action**: Every input to a reducer (API calls, signals, network completions)
//! - **Reducer**: `(State, Action, Environment) → Option<Effects>`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use paykit_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for LightReducer {
//!     type State = Light;
//!     type Action = LightAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Light,
//!         action: LightAction,
//!         _env: &(),
//!     ) -> Option<SmallVec<[Effect<LightAction>; 4]>> {
//!         match action {
//!             LightAction::Toggle => {
//!                 *state = state.toggled();
//!                 Some(smallvec![Effect::None])
//!             }
//!             LightAction::Ignored => None,
//!         }
//!     }
//! }
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Declarative helpers for building effects
pub mod effect_macros;

/// Reducer module - The core trait for lifecycle logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They never perform I/O themselves; anything that touches the outside world
/// is returned as an [`Effect`](crate::effect::Effect).
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Effects produced by a single reduction.
    pub type Effects<Action> = SmallVec<[Effect<Action>; 4]>;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into a state assignment and effects
        ///
        /// # Returns
        ///
        /// - `None` when the action is ignored in the current state. The state
        ///   must be left untouched and nobody is notified.
        /// - `Some(effects)` when the state was assigned. The runtime executes
        ///   the effects in order and then notifies observers of the new state,
        ///   even when the new value equals the old one.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Option<Effects<Self::Action>>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values. They are returned from reducers and executed by the
/// runtime `Store`, which feeds any resulting action back into the reducer.
pub mod effect {
    use futures::stream::Stream;
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Boxed async computation that may produce a follow-up action.
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Factory invoked on every tick of an [`Effect::Interval`].
    pub type TickFn<Action> = Arc<dyn Fn() -> EffectFuture<Action> + Send + Sync>;

    /// Stream of actions forwarded by an [`Effect::Subscribe`].
    pub type ActionStream<Action> = Pin<Box<dyn Stream<Item = Action> + Send>>;

    /// Identifier of a long-running, cancellable effect.
    ///
    /// At most one task per id is alive at any time: starting a keyed effect
    /// replaces (and aborts) the task previously registered under the same id.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EffectId(&'static str);

    impl EffectId {
        /// Create an effect id from a static name
        #[must_use]
        pub const fn new(name: &'static str) -> Self {
            Self(name)
        }

        /// The name this id was created with
        #[must_use]
        pub const fn name(self) -> &'static str {
            self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer.
        /// Once started, a future is never cancelled.
        Future(EffectFuture<Action>),

        /// Repeating task: runs `tick` immediately, then every `period`.
        ///
        /// Each tick's future runs on its own task, so a slow tick never delays
        /// the next one. Cancelling the interval stops future ticks only.
        Interval {
            /// Key used for replacement and cancellation
            id: EffectId,
            /// Time between ticks
            period: Duration,
            /// Computation started on every tick
            tick: TickFn<Action>,
        },

        /// Forward every item of `stream` as an action until it ends or is cancelled
        Subscribe {
            /// Key used for replacement and cancellation
            id: EffectId,
            /// Source of actions
            stream: ActionStream<Action>,
        },

        /// Cancel the keyed task registered under this id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since futures and streams don't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Interval { id, period, .. } => f
                    .debug_struct("Effect::Interval")
                    .field("id", id)
                    .field("period", period)
                    .finish_non_exhaustive(),
                Effect::Subscribe { id, .. } => f
                    .debug_struct("Effect::Subscribe")
                    .field("id", id)
                    .finish_non_exhaustive(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Whether this effect starts a keyed task with the given id
        #[must_use]
        pub fn starts(&self, target: EffectId) -> bool {
            match self {
                Effect::Interval { id, .. } | Effect::Subscribe { id, .. } => *id == target,
                Effect::Parallel(effects) => effects.iter().any(|e| e.starts(target)),
                _ => false,
            }
        }

        /// Whether this effect cancels the keyed task with the given id
        #[must_use]
        pub fn cancels(&self, target: EffectId) -> bool {
            match self {
                Effect::Cancel(id) => *id == target,
                Effect::Parallel(effects) => effects.iter().any(|e| e.cancels(target)),
                _ => false,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external capabilities the lifecycle needs (time, handing a URL to the
/// host platform) are abstracted behind traits and injected via the
/// Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};
    use url::Url;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use paykit_core::environment::{Clock, SystemClock};
    ///
    /// let now = SystemClock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Hands a URL to the host platform for external handling
    ///
    /// On mobile hosts this opens the payment app through a deep link. The
    /// lifecycle never observes the outcome; completion arrives later through
    /// the redirect or foreground signals.
    pub trait UrlOpener: Send + Sync {
        /// Open `url` outside of the SDK
        fn open(&self, url: &Url);
    }
}
