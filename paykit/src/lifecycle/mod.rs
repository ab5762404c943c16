//! Customer request lifecycle.
//!
//! [`LifecycleReducer`] decides transitions and describes the work each state
//! starts; [`StateMachine`] runs it on a store, wires in the redirect and
//! foreground signals, and keeps the observer registry.

mod machine;
mod reducer;
mod state;

pub use machine::StateMachine;
pub use reducer::{
    FOREGROUND_LISTENER, LifecycleAction, LifecycleEnvironment, LifecycleReducer, POLLING_TIMER,
    REDIRECT_LISTENER, REFRESH_RETRY_POLICY,
};
pub use state::LifecycleState;
