//! # PayKit Testing
//!
//! Testing utilities and helpers for the PayKit reducer architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clock, URL opener)
//! - A scripted [`RestExecutor`](paykit_runtime::RestExecutor)
//! - An observer that records every state it is notified of
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use paykit_testing::{MockRestExecutor, RecordingObserver};
//!
//! #[tokio::test]
//! async fn test_create_flow() {
//!     let executor = MockRestExecutor::new();
//!     executor.respond(Method::POST, Exchange::completed(HttpResponse::new(201), body));
//!
//!     let observer = RecordingObserver::new();
//!     store.add_observer(observer.clone());
//!
//!     store.send(LifecycleAction::Enter(creating)).await?;
//!     assert!(matches!(observer.next().await, LifecycleState::CreatingCustomerRequest(_)));
//! }
//! ```

use chrono::{DateTime, Utc};
use paykit_core::environment::{Clock, UrlOpener};


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, UrlOpener, Utc};
    use async_trait::async_trait;
    use paykit_runtime::store::Observer;
    use paykit_runtime::{Exchange, HttpRequest, RestExecutor, RetryPolicy};
    use reqwest::Method;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use url::Url;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use paykit_testing::mocks::FixedClock;
    /// use paykit_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// A request seen by [`MockRestExecutor`], with the policy it was sent with
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        /// The request as handed to the executor
        pub request: HttpRequest,
        /// Retry policy passed alongside
        pub retry_policy: Option<RetryPolicy>,
    }

    #[derive(Default)]
    struct Script {
        responses: HashMap<Method, VecDeque<Exchange>>,
        recorded: Vec<RecordedRequest>,
    }

    /// Scripted REST executor
    ///
    /// Responses are queued per HTTP method and handed out in order. The last
    /// queued response for a method is sticky, so a single scripted `GET`
    /// answers every poll. Unscripted methods get an empty [`Exchange`].
    #[derive(Clone, Default)]
    pub struct MockRestExecutor {
        script: Arc<Mutex<Script>>,
        delay: Option<Duration>,
    }

    impl MockRestExecutor {
        /// Executor with nothing scripted
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every response, e.g. to observe in-flight states
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Queue a response for `method`
        pub fn respond(&self, method: Method, exchange: Exchange) {
            self.lock().responses.entry(method).or_default().push_back(exchange);
        }

        /// Every request executed so far
        #[must_use]
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.lock().recorded.clone()
        }

        /// Number of requests executed with `method`
        #[must_use]
        pub fn call_count(&self, method: &Method) -> usize {
            self.lock()
                .recorded
                .iter()
                .filter(|recorded| recorded.request.method == *method)
                .count()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[async_trait]
    impl RestExecutor for MockRestExecutor {
        async fn execute(&self, request: HttpRequest, retry_policy: Option<RetryPolicy>) -> Exchange {
            let exchange = {
                let mut script = self.lock();
                let method = request.method.clone();
                script.recorded.push(RecordedRequest {
                    request,
                    retry_policy,
                });
                match script.responses.get_mut(&method) {
                    Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
                    Some(queue) => queue.front().cloned().unwrap_or_default(),
                    None => Exchange::default(),
                }
            };

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            exchange
        }
    }

    /// Observer that records every state it is notified of
    pub struct RecordingObserver<S> {
        sender: mpsc::UnboundedSender<S>,
        receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<S>>,
    }

    impl<S: Clone + Send + 'static> RecordingObserver<S> {
        /// Create a recorder, ready to be registered with a store
        #[must_use]
        pub fn new() -> Arc<Self> {
            let (sender, receiver) = mpsc::unbounded_channel();
            Arc::new(Self {
                sender,
                receiver: tokio::sync::Mutex::new(receiver),
            })
        }

        /// Wait up to two seconds for the next recorded state
        ///
        /// # Panics
        ///
        /// Panics if no state arrives in time.
        #[allow(clippy::panic)]
        pub async fn next(&self) -> S {
            let mut receiver = self.receiver.lock().await;
            match tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await {
                Ok(Some(state)) => state,
                Ok(None) => panic!("observer channel closed"),
                Err(_) => panic!("timed out waiting for a state change"),
            }
        }

        /// The states recorded so far and not yet consumed
        pub async fn drain(&self) -> Vec<S> {
            let mut receiver = self.receiver.lock().await;
            let mut states = Vec::new();
            while let Ok(state) = receiver.try_recv() {
                states.push(state);
            }
            states
        }
    }

    impl<S: Clone + Send + 'static> Observer<S> for RecordingObserver<S> {
        fn state_did_change(&self, state: &S) {
            let _ = self.sender.send(state.clone());
        }
    }

    /// URL opener that records what it was asked to open
    #[derive(Debug, Clone, Default)]
    pub struct RecordingUrlOpener {
        opened: Arc<Mutex<Vec<Url>>>,
    }

    impl RecordingUrlOpener {
        /// Create an opener with an empty history
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every URL opened so far
        #[must_use]
        pub fn opened(&self) -> Vec<Url> {
            self.opened
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl UrlOpener for RecordingUrlOpener {
        fn open(&self, url: &Url) {
            self.opened
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.clone());
        }
    }
}

/// Install a `tracing` subscriber that writes through the test harness
///
/// Respects `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, MockRestExecutor, RecordedRequest, RecordingObserver, RecordingUrlOpener,
    test_clock,
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use paykit_runtime::{Exchange, HttpRequest, HttpResponse, RestExecutor, RetryPolicy};
    use paykit_runtime::store::Observer;
    use reqwest::Method;
    use url::Url;

    fn request(method: Method) -> HttpRequest {
        HttpRequest::new(method, Url::parse("https://example.com").unwrap())
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[tokio::test]
    async fn test_mock_executor_pops_then_sticks() {
        let executor = MockRestExecutor::new();
        executor.respond(Method::GET, Exchange::completed(HttpResponse::new(500), "a"));
        executor.respond(Method::GET, Exchange::completed(HttpResponse::new(200), "b"));

        let first = executor.execute(request(Method::GET), None).await;
        let second = executor.execute(request(Method::GET), None).await;
        let third = executor
            .execute(request(Method::GET), Some(RetryPolicy::exponential(5)))
            .await;

        assert_eq!(first.response.unwrap().status, 500);
        assert_eq!(second.response.unwrap().status, 200);
        assert_eq!(third.response.unwrap().status, 200);
        assert_eq!(executor.call_count(&Method::GET), 3);
        assert_eq!(
            executor.requests()[2].retry_policy,
            Some(RetryPolicy::exponential(5))
        );
    }

    #[tokio::test]
    async fn test_mock_executor_unscripted_is_empty() {
        let executor = MockRestExecutor::new();
        let exchange = executor.execute(request(Method::PATCH), None).await;
        assert_eq!(exchange, Exchange::default());
    }

    #[tokio::test]
    async fn test_recording_observer() {
        let observer = RecordingObserver::<u8>::new();
        observer.state_did_change(&1);
        observer.state_did_change(&2);

        assert_eq!(observer.next().await, 1);
        assert_eq!(observer.drain().await, vec![2]);
    }

    #[test]
    fn test_recording_url_opener() {
        let opener = RecordingUrlOpener::new();
        let url = Url::parse("https://cash.app/p/1").unwrap();
        opener.open(&url);
        assert_eq!(opener.opened(), vec![url]);
    }
}
