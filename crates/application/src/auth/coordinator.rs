//! Single-flight token refresh.
//!
//! Any number of requests may discover at the same time that the access token
//! was rejected. The coordinator collapses them into one refresh call: the
//! first caller drives the refresh, later callers queue a one-shot completion
//! handle and are released, in the order they queued, with the same outcome.
//! If the first caller is dropped mid-refresh, a waiter takes over.
//!
//! State lives behind a `std::sync::Mutex` that is only taken in short
//! synchronous sections. The check for `Idle` and the switch to `Refreshing`
//! happen in one such section, so no await point can sneak in between them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tessera_domain::{RefreshError, RefreshFailure, RefreshState, Token};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::ports::{StoreError, TokenRefresher, TokenStore};

type Outcome = Result<Token, RefreshFailure>;

/// What a queued caller is woken with.
#[derive(Debug, Clone)]
enum Release {
    Settled(Outcome),
    /// The leading caller went away; the attempt never produced an outcome.
    Orphaned,
}

/// What a request observed when it was dispatched.
///
/// Handed back to [`RefreshCoordinator::obtain_fresh_token`] when the request
/// comes back with 401, so a refresh that already concluded after the
/// dispatch can be reused instead of starting another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    concluded: u64,
    credential: Option<Token>,
}

impl RefreshTicket {
    /// The credential the request was sent with.
    #[must_use]
    pub const fn credential(&self) -> Option<&Token> {
        self.credential.as_ref()
    }
}

struct Inner {
    state: RefreshState,
    waiters: VecDeque<oneshot::Sender<Release>>,
    /// Attempts started so far; the in-flight attempt has this number.
    started: u64,
    /// Attempts concluded so far.
    concluded: u64,
}

enum Role {
    Leader(u64),
    Follower(u64, oneshot::Receiver<Release>),
}

/// Serializes token refreshes for one authenticated client.
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn TokenStore>,
    timeout: Option<Duration>,
    inner: Mutex<Inner>,
}

impl RefreshCoordinator {
    /// Creates a coordinator with no refresh timeout.
    #[must_use]
    pub fn new(refresher: Arc<dyn TokenRefresher>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            refresher,
            store,
            timeout: None,
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                waiters: VecDeque::new(),
                started: 0,
                concluded: 0,
            }),
        }
    }

    /// Treats a refresh call that takes longer than `timeout` as failed.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Current refresh state.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of callers queued behind the in-flight refresh.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Number of refresh calls issued so far.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.lock().started
    }

    /// Records what a request is about to be sent with.
    ///
    /// The refresh count is taken before the stored token is read, so a
    /// refresh that concludes in between is never mistaken for a later one.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub async fn ticket(&self) -> Result<RefreshTicket, StoreError> {
        let concluded = self.lock().concluded;
        let credential = self.store.get().await?;
        Ok(RefreshTicket {
            concluded,
            credential,
        })
    }

    /// Returns a token the rejected request can be retried with.
    ///
    /// - If a refresh concluded since `ticket` was taken and the store now
    ///   holds a token other than the one the request used, the stored token
    ///   is returned as is.
    /// - If no refresh is in flight, one is started, authenticated with the
    ///   token currently in the store.
    /// - If a refresh is in flight, the caller waits for its outcome. Should
    ///   the caller driving it be dropped first, one of the waiters starts the
    ///   refresh again and the rest queue behind it.
    ///
    /// # Errors
    ///
    /// Returns the shared [`RefreshFailure`] of the attempt the caller
    /// started or waited on. Failed attempts are never retried here.
    pub async fn obtain_fresh_token(&self, ticket: &RefreshTicket) -> Outcome {
        if self.superseded(ticket)
            && let Some(token) = self.replacement(ticket).await
        {
            debug!(token = %token.preview(), "reusing token stored since dispatch");
            return Ok(token);
        }

        loop {
            match self.enter() {
                Role::Leader(attempt) => return self.lead(attempt).await,
                Role::Follower(attempt, release) => match release.await {
                    Ok(Release::Settled(outcome)) => return outcome,
                    Ok(Release::Orphaned) | Err(_) => {
                        debug!(attempt, "refresh lost its leader, taking over");
                    }
                },
            }
        }
    }

    /// Whether a refresh concluded after `ticket` was taken.
    fn superseded(&self, ticket: &RefreshTicket) -> bool {
        let inner = self.lock();
        inner.state == RefreshState::Idle && inner.concluded > ticket.concluded
    }

    /// The stored token, if it replaced the one `ticket` was sent with.
    async fn replacement(&self, ticket: &RefreshTicket) -> Option<Token> {
        let stored = self.store.get().await.ok().flatten()?;
        (ticket.credential.as_ref() != Some(&stored)).then_some(stored)
    }

    fn enter(&self) -> Role {
        let mut inner = self.lock();
        match inner.state {
            RefreshState::Refreshing => {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(tx);
                debug!(
                    attempt = inner.started,
                    waiting = inner.waiters.len(),
                    "queued behind in-flight token refresh"
                );
                Role::Follower(inner.started, rx)
            }
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                inner.started += 1;
                Role::Leader(inner.started)
            }
        }
    }

    async fn lead(&self, attempt: u64) -> Outcome {
        let flight = Flight {
            coordinator: self,
            attempt,
            settled: false,
        };
        info!(attempt, "refreshing access token");

        let outcome = self
            .refresh()
            .await
            .map_err(|cause| RefreshFailure::new(attempt, cause));

        match &outcome {
            Ok(token) => info!(attempt, token = %token.preview(), "access token refreshed"),
            Err(failure) => warn!(attempt, error = %failure.cause, "token refresh failed"),
        }
        flight.settle(&outcome);
        outcome
    }

    async fn refresh(&self) -> Result<Token, RefreshError> {
        let current = self
            .store
            .get()
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?;

        let call = self.refresher.refresh(current.as_ref());
        let token = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RefreshError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })??,
            None => call.await?,
        };

        // Persisted before any waiter is released.
        self.store
            .set(&token)
            .await
            .map_err(|e| RefreshError::Store(e.to_string()))?;
        Ok(token)
    }

    fn conclude(&self, release: &Release) {
        let waiters = {
            let mut inner = self.lock();
            inner.state = RefreshState::Idle;
            inner.concluded = inner.started;
            std::mem::take(&mut inner.waiters)
        };

        debug!(waiters = waiters.len(), "releasing refresh waiters");
        for waiter in waiters {
            // A waiter whose request was cancelled has dropped its receiver.
            let _ = waiter.send(release.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("RefreshCoordinator")
            .field("state", &inner.state)
            .field("waiting", &inner.waiters.len())
            .field("started", &inner.started)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The in-flight refresh, owned by the caller that started it.
///
/// If that caller is dropped mid-refresh the state returns to `Idle` and the
/// waiters are woken to take the refresh over.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    attempt: u64,
    settled: bool,
}

impl Flight<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.settled = true;
        self.coordinator.conclude(&Release::Settled(outcome.clone()));
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(attempt = self.attempt, "token refresh dropped by its caller");
            self.coordinator.conclude(&Release::Orphaned);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    type Script = Box<dyn Fn(usize) -> Result<Token, RefreshError> + Send + Sync>;

    /// Refresher that blocks until the test opens its gate.
    struct GatedRefresher {
        gate: Semaphore,
        calls: AtomicUsize,
        seen: Mutex<Vec<Option<String>>>,
        script: Script,
    }

    impl GatedRefresher {
        fn new(script: impl Fn(usize) -> Result<Token, RefreshError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                script: Box::new(script),
            })
        }

        fn issuing(value: &'static str) -> Arc<Self> {
            Self::new(move |_| Ok(token(value)))
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for GatedRefresher {
        async fn refresh(&self, current: Option<&Token>) -> Result<Token, RefreshError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(current.map(|t| t.as_str().to_string()));
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RefreshError::Transport("gate closed".to_string()))?;
            (self.script)(call)
        }
    }

    /// Store whose next read hands back its value only once the gate opens.
    struct StalledStore {
        inner: MemoryTokenStore,
        stall: AtomicBool,
        gate: Semaphore,
    }

    #[async_trait]
    impl TokenStore for StalledStore {
        async fn get(&self) -> Result<Option<Token>, StoreError> {
            let value = self.inner.get().await;
            if self.stall.swap(false, Ordering::SeqCst) {
                let _permit = self.gate.acquire().await;
            }
            value
        }

        async fn set(&self, token: &Token) -> Result<(), StoreError> {
            self.inner.set(token).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear().await
        }
    }

    fn token(value: &str) -> Token {
        Token::new(value).unwrap()
    }

    fn setup(
        refresher: &Arc<GatedRefresher>,
        stored: &str,
    ) -> (Arc<RefreshCoordinator>, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::with_token(token(stored)));
        let coordinator = RefreshCoordinator::new(
            Arc::clone(refresher) as Arc<dyn TokenRefresher>,
            Arc::clone(&store) as Arc<dyn TokenStore>,
        );
        (Arc::new(coordinator), store)
    }

    async fn eventually(condition: impl Fn() -> bool) {
        for _ in 0..1_000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    fn spawn_obtain(coordinator: &Arc<RefreshCoordinator>) -> tokio::task::JoinHandle<Outcome> {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move {
            let ticket = coordinator.ticket().await.unwrap();
            coordinator.obtain_fresh_token(&ticket).await
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let refresher = GatedRefresher::issuing("T2");
        let (coordinator, store) = setup(&refresher, "T1");

        let leader = spawn_obtain(&coordinator);
        eventually(|| coordinator.state().is_refreshing()).await;
        let followers: Vec<_> = (0..4).map(|_| spawn_obtain(&coordinator)).collect();
        eventually(|| coordinator.waiting() == 4).await;

        refresher.open();

        assert_eq!(leader.await.unwrap(), Ok(token("T2")));
        for follower in followers {
            assert_eq!(follower.await.unwrap(), Ok(token("T2")));
        }
        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.get().await.unwrap(), Some(token("T2")));
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.waiting(), 0);
    }

    #[tokio::test]
    async fn test_refresh_uses_stored_token_not_callers_copy() {
        let refresher = GatedRefresher::issuing("T3");
        let (coordinator, store) = setup(&refresher, "T1");
        refresher.open();

        let ticket = coordinator.ticket().await.unwrap();
        store.set(&token("T2")).await.unwrap();
        let outcome = coordinator.obtain_fresh_token(&ticket).await;

        assert_eq!(outcome, Ok(token("T3")));
        assert_eq!(
            *refresher.seen.lock().unwrap(),
            vec![Some("T2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_is_delivered_to_every_waiter() {
        let refresher = GatedRefresher::new(|_| Err(RefreshError::Rejected { status: 401 }));
        let (coordinator, store) = setup(&refresher, "T1");

        let leader = spawn_obtain(&coordinator);
        eventually(|| coordinator.state().is_refreshing()).await;
        let followers: Vec<_> = (0..2).map(|_| spawn_obtain(&coordinator)).collect();
        eventually(|| coordinator.waiting() == 2).await;
        refresher.open();

        let expected = Err(RefreshFailure::new(1, RefreshError::Rejected { status: 401 }));
        assert_eq!(leader.await.unwrap(), expected);
        for follower in followers {
            assert_eq!(follower.await.unwrap(), expected);
        }
        // The coordinator never clears the store.
        assert_eq!(store.get().await.unwrap(), Some(token("T1")));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_returns_to_idle_after_success_and_failure() {
        let refresher = GatedRefresher::new(|call| match call {
            0 => Ok(token("T2")),
            1 => Err(RefreshError::MissingAccessToken),
            _ => Ok(token("T4")),
        });
        let (coordinator, _store) = setup(&refresher, "T1");
        refresher.open();

        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T2")));
        assert_eq!(
            spawn_obtain(&coordinator).await.unwrap(),
            Err(RefreshFailure::new(2, RefreshError::MissingAccessToken))
        );
        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T4")));

        assert_eq!(refresher.calls(), 3);
        assert_eq!(coordinator.attempts(), 3);
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_waiters_complete_in_enqueue_order() {
        let refresher = GatedRefresher::issuing("T2");
        let (coordinator, _store) = setup(&refresher, "T1");
        let completed = Arc::new(Mutex::new(Vec::new()));

        let leader = spawn_obtain(&coordinator);
        eventually(|| coordinator.state().is_refreshing()).await;

        let mut handles = Vec::new();
        for (position, label) in ["A", "B", "C"].into_iter().enumerate() {
            let coordinator_ref = Arc::clone(&coordinator);
            let completed = Arc::clone(&completed);
            handles.push(tokio::spawn(async move {
                let ticket = coordinator_ref.ticket().await.unwrap();
                let outcome = coordinator_ref.obtain_fresh_token(&ticket).await;
                completed.lock().unwrap().push(label);
                outcome
            }));
            eventually(|| coordinator.waiting() == position + 1).await;
        }

        refresher.open();
        leader.await.unwrap().unwrap();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(token("T2")));
        }
        assert_eq!(*completed.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_concluded_refresh_is_reused_by_late_401() {
        let refresher = GatedRefresher::issuing("T2");
        let (coordinator, _store) = setup(&refresher, "T1");
        refresher.open();

        // Dispatched with T1 before the refresh, rejected after it concluded.
        let late = coordinator.ticket().await.unwrap();
        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T2")));

        assert_eq!(coordinator.obtain_fresh_token(&late).await, Ok(token("T2")));
        assert_eq!(refresher.calls(), 1);

        // Dispatched with T2 itself: a real rejection, refresh again.
        let independent = coordinator.ticket().await.unwrap();
        assert_eq!(independent.credential(), Some(&token("T2")));
        assert_eq!(coordinator.obtain_fresh_token(&independent).await, Ok(token("T2")));
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_ticket_counts_refreshes_before_reading_store() {
        let refresher = GatedRefresher::issuing("T2");
        refresher.open();
        let store = Arc::new(StalledStore {
            inner: MemoryTokenStore::with_token(token("T1")),
            stall: AtomicBool::new(true),
            gate: Semaphore::new(0),
        });
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
            Arc::clone(&store) as Arc<dyn TokenStore>,
        ));

        // The read of T1 completes, then a refresh concludes before the
        // ticket is handed out.
        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.ticket().await.unwrap() })
        };
        eventually(|| !store.stall.load(Ordering::SeqCst)).await;
        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T2")));
        store.gate.add_permits(1);
        let ticket = pending.await.unwrap();
        assert_eq!(ticket.credential(), Some(&token("T1")));

        assert_eq!(coordinator.obtain_fresh_token(&ticket).await, Ok(token("T2")));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_late_401_takes_token_from_newer_login() {
        let refresher = GatedRefresher::issuing("T2");
        let (coordinator, store) = setup(&refresher, "T1");
        refresher.open();

        let late = coordinator.ticket().await.unwrap();
        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T2")));
        store.clear().await.unwrap();
        store.set(&token("T5")).await.unwrap();

        assert_eq!(coordinator.obtain_fresh_token(&late).await, Ok(token("T5")));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_late_401_after_logout_does_not_resurrect_refreshed_token() {
        let refresher = GatedRefresher::new(|call| match call {
            0 => Ok(token("T2")),
            _ => Err(RefreshError::Rejected { status: 401 }),
        });
        let (coordinator, store) = setup(&refresher, "T1");
        refresher.open();

        let late = coordinator.ticket().await.unwrap();
        assert_eq!(spawn_obtain(&coordinator).await.unwrap(), Ok(token("T2")));
        store.clear().await.unwrap();

        assert_eq!(
            coordinator.obtain_fresh_token(&late).await,
            Err(RefreshFailure::new(2, RefreshError::Rejected { status: 401 }))
        );
        assert_eq!(
            *refresher.seen.lock().unwrap(),
            vec![Some("T1".to_string()), None]
        );
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let refresher = GatedRefresher::issuing("never");
        let store = Arc::new(MemoryTokenStore::with_token(token("T1")));
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
            Arc::clone(&store) as Arc<dyn TokenStore>,
        )
        .with_timeout(Duration::from_millis(20));

        let ticket = coordinator.ticket().await.unwrap();
        let outcome = coordinator.obtain_fresh_token(&ticket).await;

        assert_eq!(
            outcome,
            Err(RefreshFailure::new(1, RefreshError::Timeout { timeout_ms: 20 }))
        );
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(store.get().await.unwrap(), Some(token("T1")));
    }

    #[tokio::test]
    async fn test_waiter_takes_over_from_dropped_leader() {
        let refresher = GatedRefresher::issuing("T2");
        let (coordinator, store) = setup(&refresher, "T1");

        let leader = spawn_obtain(&coordinator);
        eventually(|| coordinator.state().is_refreshing()).await;
        let followers: Vec<_> = (0..2).map(|_| spawn_obtain(&coordinator)).collect();
        eventually(|| coordinator.waiting() == 2).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        // One waiter leads the second attempt, the other queues behind it.
        eventually(|| coordinator.attempts() == 2 && coordinator.waiting() == 1).await;
        assert!(coordinator.state().is_refreshing());
        refresher.open();

        for follower in followers {
            assert_eq!(follower.await.unwrap(), Ok(token("T2")));
        }
        assert_eq!(refresher.calls(), 2);
        assert_eq!(
            *refresher.seen.lock().unwrap(),
            vec![Some("T1".to_string()), Some("T1".to_string())]
        );
        assert_eq!(store.get().await.unwrap(), Some(token("T2")));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }
}
