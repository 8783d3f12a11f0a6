//! Client-side session guard.
//!
//! The edge gateway is the authoritative check; this guard re-verifies after
//! a view has already mounted and reacts to session changes that happen out
//! of band (sign-out in another tab, token revocation). It is deliberately
//! framework-agnostic: a view layer binds to the `watch` channel and renders
//! `Checking` as a loading state, so protected content is never shown before
//! the first resolution.
//!
//! Conflicting signals are resolved by restriction ordering: once anything
//! reports "denied", no later "allowed" signal can undo it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::identity::{CookieJar, Identity, IdentityService, SessionEvent};

/// What the mounted view should render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardState {
    /// First identity check still pending; render a loading state.
    Checking,
    /// Identity confirmed; protected content may render.
    Allowed(Identity),
    /// No identity; the guard has navigated to the login route.
    Denied,
}

/// Navigation sink the guard drives when access is denied.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Handle to a mounted guard. Unmounting (or dropping) cancels the in-flight
/// check and the event subscription; neither may call back afterwards.
pub struct GuardHandle {
    state_rx: watch::Receiver<GuardState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GuardHandle {
    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state_rx.borrow().clone()
    }

    /// Wait until the initial check has settled, returning the first
    /// non-`Checking` state.
    pub async fn settled(&mut self) -> GuardState {
        let state = self
            .state_rx
            .wait_for(|state| *state != GuardState::Checking)
            .await;
        match state {
            Ok(state) => state.clone(),
            // Task gone; nothing was confirmed, treat as denied.
            Err(_) => GuardState::Denied,
        }
    }

    /// Watch state transitions; useful for views that re-render reactively.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GuardState> {
        self.state_rx.clone()
    }

    /// Tear down the guard.
    pub fn unmount(self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}

/// Mount a guard over a view tree.
///
/// `jar` is the session credential snapshot the page was served with. The
/// guard performs one identity check, then follows the provider's event
/// stream until unmounted. On denial it navigates to `login_path` without a
/// `redirect` parameter; the gateway already handled the authoritative
/// server-side redirect on first load.
pub fn mount(
    identity: Arc<dyn IdentityService>,
    navigator: Arc<dyn Navigator>,
    login_path: &str,
    jar: CookieJar,
) -> GuardHandle {
    let (state_tx, state_rx) = watch::channel(GuardState::Checking);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let login_path = login_path.to_string();
    // Subscribe before spawning so an event published right after mount
    // cannot slip past the guard.
    let mut subscription = identity.subscribe();

    let task = tokio::spawn(async move {
        let check = {
            let identity = Arc::clone(&identity);
            async move {
                let mut jar = jar;
                identity.resolve_identity(&mut jar).await
            }
        };
        tokio::pin!(check);

        let mut settled = false;
        let mut denied = false;
        let mut stream_open = true;

        loop {
            if settled && !stream_open {
                break;
            }
            tokio::select! {
                result = &mut check, if !settled => {
                    settled = true;
                    match result {
                        // The check can only confirm access, never restore
                        // it after a denial already won the race.
                        Ok(Some(identity)) if !denied => {
                            let _ = state_tx.send(GuardState::Allowed(identity));
                        }
                        Ok(Some(_)) => {}
                        // No identity or a failed check: fail closed.
                        Ok(None) | Err(_) => {
                            if !denied {
                                denied = true;
                                let _ = state_tx.send(GuardState::Denied);
                                navigator.navigate(&login_path);
                            }
                        }
                    }
                }
                event = subscription.next(), if stream_open => {
                    match event {
                        Some(SessionEvent::SignedIn(identity)) if !denied => {
                            let _ = state_tx.send(GuardState::Allowed(identity));
                        }
                        Some(SessionEvent::SignedIn(_)) => {}
                        Some(SessionEvent::SignedOut) => {
                            if !denied {
                                denied = true;
                                let _ = state_tx.send(GuardState::Denied);
                                navigator.navigate(&login_path);
                            }
                        }
                        None => {
                            debug!("Session event stream closed");
                            stream_open = false;
                        }
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    GuardHandle {
        state_rx,
        shutdown_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::{mount, GuardState, Navigator};
    use crate::identity::{
        AuthError, CookieJar, Identity, IdentityService, MemoryIdentity, SessionEvents,
        Subscription,
    };
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingNavigator {
        paths: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, path: &str) {
            self.paths.lock().unwrap().push(path.to_string());
        }
    }

    impl RecordingNavigator {
        fn paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }
    }

    /// Identity service whose resolution blocks until released, to script
    /// races between the initial check and the event stream.
    struct GatedIdentity {
        result: Option<Identity>,
        release: Arc<Notify>,
        events: SessionEvents,
    }

    #[async_trait]
    impl IdentityService for GatedIdentity {
        async fn resolve_identity(
            &self,
            _jar: &mut CookieJar,
        ) -> Result<Option<Identity>, AuthError> {
            self.release.notified().await;
            Ok(self.result.clone())
        }

        async fn sign_in(
            &self,
            _email: &str,
            _secret: &SecretString,
            _jar: &mut CookieJar,
        ) -> Result<Identity, AuthError> {
            unreachable!("not used by guard tests")
        }

        async fn sign_out(&self, _jar: &mut CookieJar) -> Result<(), AuthError> {
            unreachable!("not used by guard tests")
        }

        fn subscribe(&self) -> Subscription {
            self.events.subscribe()
        }
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
        }
    }

    async fn signed_in_backend() -> (Arc<MemoryIdentity>, CookieJar, SessionEvents) {
        let events = SessionEvents::new();
        let backend = Arc::new(MemoryIdentity::new(events.clone()));
        backend.register("ops@example.com", "hunter2").await;
        let mut jar = CookieJar::default();
        backend
            .sign_in(
                "ops@example.com",
                &SecretString::from("hunter2".to_string()),
                &mut jar,
            )
            .await
            .unwrap();
        (backend, jar, events)
    }

    #[tokio::test]
    async fn starts_checking_then_allows_valid_session() {
        let (backend, jar, _events) = signed_in_backend().await;
        let navigator = Arc::new(RecordingNavigator::default());

        let mut handle = mount(backend, navigator.clone(), "/admin/login", jar);
        let state = handle.settled().await;
        assert!(matches!(state, GuardState::Allowed(_)));
        assert!(navigator.paths().is_empty());
        handle.unmount();
    }

    #[tokio::test]
    async fn missing_session_navigates_to_login() {
        let events = SessionEvents::new();
        let backend = Arc::new(MemoryIdentity::new(events));
        let navigator = Arc::new(RecordingNavigator::default());

        let mut handle = mount(
            backend,
            navigator.clone(),
            "/admin/login",
            CookieJar::default(),
        );
        assert_eq!(handle.settled().await, GuardState::Denied);
        assert_eq!(navigator.paths(), vec!["/admin/login".to_string()]);
        handle.unmount();
    }

    #[tokio::test]
    async fn signed_out_event_after_allowed_denies() {
        let (backend, jar, events) = signed_in_backend().await;
        let navigator = Arc::new(RecordingNavigator::default());

        let mut handle = mount(backend.clone(), navigator.clone(), "/admin/login", jar);
        assert!(matches!(handle.settled().await, GuardState::Allowed(_)));

        events.publish(crate::identity::SessionEvent::SignedOut);
        let mut watch = handle.watch();
        watch
            .wait_for(|state| *state == GuardState::Denied)
            .await
            .unwrap();
        assert_eq!(navigator.paths(), vec!["/admin/login".to_string()]);
        handle.unmount();
    }

    #[tokio::test]
    async fn late_allowed_never_overrides_denial() {
        let release = Arc::new(Notify::new());
        let events = SessionEvents::new();
        let backend = Arc::new(GatedIdentity {
            result: Some(identity()),
            release: release.clone(),
            events: events.clone(),
        });
        let navigator = Arc::new(RecordingNavigator::default());

        let mut handle = mount(
            backend,
            navigator.clone(),
            "/admin/login",
            CookieJar::default(),
        );
        assert_eq!(handle.state(), GuardState::Checking);

        // The sign-out lands while the initial check is still in flight.
        events.publish(crate::identity::SessionEvent::SignedOut);
        let mut watch = handle.watch();
        watch
            .wait_for(|state| *state == GuardState::Denied)
            .await
            .unwrap();

        // Now the check resolves "allowed": the earlier denial must stand.
        release.notify_one();
        tokio::task::yield_now().await;
        assert_eq!(handle.state(), GuardState::Denied);
        assert_eq!(navigator.paths(), vec!["/admin/login".to_string()]);
        handle.unmount();
    }

    #[tokio::test]
    async fn unmounted_guard_never_navigates() {
        let release = Arc::new(Notify::new());
        let events = SessionEvents::new();
        let backend = Arc::new(GatedIdentity {
            result: None,
            release: release.clone(),
            events: events.clone(),
        });
        let navigator = Arc::new(RecordingNavigator::default());

        let handle = mount(
            backend,
            navigator.clone(),
            "/admin/login",
            CookieJar::default(),
        );
        handle.unmount();

        // The check result arriving after unmount must be a no-op.
        release.notify_one();
        events.publish(crate::identity::SessionEvent::SignedOut);
        tokio::task::yield_now().await;
        assert!(navigator.paths().is_empty());
    }
}
