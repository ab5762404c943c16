//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce the boxing boilerplate of `Effect::Future` and
//! `Effect::Interval`.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use paykit_core::async_effect;
///
/// async_effect! {
///     let result = client.retrieve(&id, None).await;
///     Some(LifecycleAction::RequestPolled(result))
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Interval` whose every tick runs an async block
///
/// Variables listed in `capture` are cloned into each tick.
///
/// # Example
///
/// ```rust,ignore
/// use paykit_core::interval;
/// use std::time::Duration;
///
/// interval! {
///     id: POLLING_TIMER,
///     period: Duration::from_secs(1),
///     capture: [client, id],
///     tick: {
///         Some(LifecycleAction::RequestPolled(client.retrieve(&id, None).await))
///     }
/// }
/// ```
#[macro_export]
macro_rules! interval {
    (
        id: $id:expr,
        period: $period:expr,
        capture: [$($captured:ident),* $(,)?],
        tick: $body:block
    ) => {
        $crate::effect::Effect::Interval {
            id: $id,
            period: $period,
            tick: ::std::sync::Arc::new(move || {
                $(let $captured = ::std::clone::Clone::clone(&$captured);)*
                let tick: $crate::effect::EffectFuture<_> =
                    ::std::boxed::Box::pin(async move $body);
                tick
            }),
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::{Effect, EffectId};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Ticked { value: String },
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::Ticked { value: "once".to_string() })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[tokio::test]
    async fn test_interval_macro_clones_captures_per_tick() {
        let value = "req_123".to_string();
        let effect = interval! {
            id: EffectId::new("poll"),
            period: Duration::from_secs(1),
            capture: [value],
            tick: { Some(TestAction::Ticked { value }) }
        };

        let Effect::Interval { id, period, tick } = effect else {
            unreachable!("interval! builds an Effect::Interval");
        };
        assert_eq!(id, EffectId::new("poll"));
        assert_eq!(period, Duration::from_secs(1));

        assert_eq!(tick().await, Some(TestAction::Ticked { value: "req_123".to_string() }));
        assert_eq!(tick().await, Some(TestAction::Ticked { value: "req_123".to_string() }));
    }
}
