//! Fatal-path session cleanup
//!
//! Runs when the session cannot be recovered: renewal failed, no refresh
//! token, a 401 from the login or renewal endpoint, or an explicit logout.
//! Wipes credentials and registered caches, publishes `Terminated` to
//! subscribers, and redirects to the unauthenticated entry point once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use session_auth::TokenStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the user currently is, and how to send them elsewhere.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> String;

    fn navigate(&self, to: &str);
}

/// Published on every termination and re-arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Terminated,
}

type WipeHook = Box<dyn Fn() + Send + Sync>;

pub struct SessionTerminator {
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    entry_point: String,
    hooks: Mutex<Vec<(String, WipeHook)>>,
    redirected: AtomicBool,
    status: watch::Sender<SessionStatus>,
}

impl SessionTerminator {
    pub fn new(
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        entry_point: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Active);
        Self {
            tokens,
            navigator,
            entry_point: entry_point.into(),
            hooks: Mutex::new(Vec::new()),
            redirected: AtomicBool::new(false),
            status,
        }
    }

    /// Register state that must not survive into the next session. The hook
    /// runs on every termination; its contents are opaque to this crate.
    pub fn register_wipe_hook(
        &self,
        name: impl Into<String>,
        hook: impl Fn() + Send + Sync + 'static,
    ) {
        let name = name.into();
        debug!(hook = %name, "registered wipe hook");
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name, Box::new(hook)));
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// End the session. Never fails: storage errors are logged and cleanup
    /// continues. Safe to call repeatedly; only the first call after a
    /// `rearm()` navigates.
    pub async fn terminate(&self) {
        warn!("terminating session");
        metrics::counter!("api_session_terminations_total").increment(1);

        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "failed to clear access token");
        }
        if let Err(e) = self.tokens.set_refresh_token(None).await {
            warn!(error = %e, "failed to clear refresh token");
        }

        {
            let hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
            for (name, hook) in hooks.iter() {
                debug!(hook = %name, "running wipe hook");
                hook();
            }
        }

        self.status.send_replace(SessionStatus::Terminated);

        let location = self.navigator.current_location();
        if location == self.entry_point {
            debug!(%location, "already at entry point, not navigating");
            return;
        }
        // Claimed only when a navigation actually happens.
        if self.redirected.swap(true, Ordering::SeqCst) {
            debug!("redirect already issued for this session");
            return;
        }
        info!(from = %location, to = %self.entry_point, "redirecting to entry point");
        self.navigator.navigate(&self.entry_point);
    }

    /// Mark a new session as established (after login). The next
    /// `terminate()` will navigate again.
    pub fn rearm(&self) {
        self.redirected.store(false, Ordering::SeqCst);
        self.status.send_replace(SessionStatus::Active);
    }
}
