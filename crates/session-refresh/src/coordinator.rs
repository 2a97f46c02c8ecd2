//! Single-flight renewal actor
//!
//! `RefreshCoordinator` is a cheap cloneable handle; the state lives in one
//! spawned task that processes acquire requests strictly one at a time. Only
//! the Idle → Refreshing transition spawns a renewal, so two exchanges can
//! never overlap no matter how many callers race.

use std::sync::Arc;

use common::Secret;
use session_auth::TokenStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transport::Transport;

use crate::error::{RefreshError, Result};
use crate::state::{CoordinatorAction, CoordinatorEvent, CoordinatorState, handle_event};
use crate::terminator::SessionTerminator;

type Outcome = Result<Secret<String>>;
type Waiter = oneshot::Sender<Outcome>;

/// Everything a renewal cycle needs.
#[derive(Clone)]
pub struct RefreshContext {
    pub transport: Arc<dyn Transport>,
    pub tokens: Arc<TokenStore>,
    pub terminator: Arc<SessionTerminator>,
    pub refresh_path: String,
}

/// Handle to the renewal actor.
#[derive(Clone)]
pub struct RefreshCoordinator {
    commands: mpsc::UnboundedSender<Waiter>,
}

impl RefreshCoordinator {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(context: RefreshContext) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        tokio::spawn(run(inbox, context));
        Self { commands }
    }

    /// Wait for a renewed access token.
    ///
    /// Starts a renewal if none is running, otherwise joins the one in
    /// flight. There is no separate timeout: a waiter lives exactly as long
    /// as the renewal call, which carries the transport timeout.
    pub async fn acquire_fresh_token(&self) -> Result<Secret<String>> {
        let (waiter, outcome) = oneshot::channel();
        self.commands
            .send(waiter)
            .map_err(|_| RefreshError::CoordinatorClosed)?;
        outcome.await.map_err(|_| RefreshError::CoordinatorClosed)?
    }
}

async fn run(mut inbox: mpsc::UnboundedReceiver<Waiter>, context: RefreshContext) {
    let mut state: CoordinatorState<Waiter> = CoordinatorState::Idle;
    let mut in_flight: Option<JoinHandle<Outcome>> = None;

    loop {
        let event = tokio::select! {
            waiter = inbox.recv() => match waiter {
                Some(waiter) => CoordinatorEvent::Acquire(waiter),
                None => break,
            },
            outcome = join_renewal(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                CoordinatorEvent::Settled(outcome)
            }
        };

        let (next, action) = handle_event(state, event);
        state = next;

        match action {
            CoordinatorAction::StartRenewal => {
                debug!("starting token renewal");
                in_flight = Some(tokio::spawn(renew(context.clone())));
            }
            CoordinatorAction::Enqueued { queued } => {
                debug!(queued, "joined in-flight token renewal");
            }
            CoordinatorAction::Resolve { waiters, outcome } => {
                debug!(waiters = waiters.len(), ok = outcome.is_ok(), "renewal settled");
                for waiter in waiters {
                    // A dropped receiver means the caller went away; nothing to deliver.
                    let _ = waiter.send(outcome.clone());
                }
            }
            CoordinatorAction::None => {}
        }
    }

    debug!("refresh coordinator stopped");
}

async fn join_renewal(slot: &mut Option<JoinHandle<Outcome>>) -> Outcome {
    match slot.as_mut() {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| Err(RefreshError::Exchange(format!("renewal task failed: {e}")))),
        None => std::future::pending().await,
    }
}

/// One renewal cycle. Persists the new pair on success; terminates the
/// session on any failure before the waiters hear about it.
async fn renew(context: RefreshContext) -> Outcome {
    let Some(refresh) = context.tokens.refresh_token().await else {
        warn!("no refresh token stored, ending session");
        metrics::counter!("api_token_refresh_total", "outcome" => "missing_refresh_token")
            .increment(1);
        context.terminator.terminate().await;
        return Err(RefreshError::MissingRefreshToken);
    };

    match session_auth::refresh_tokens(context.transport.as_ref(), &context.refresh_path, &refresh)
        .await
    {
        Ok(pair) => {
            if let Err(e) = context.tokens.store_pair(&pair).await {
                warn!(error = %e, "failed to persist refreshed tokens");
            }
            metrics::counter!("api_token_refresh_total", "outcome" => "success").increment(1);
            info!("token refresh succeeded");
            Ok(pair.access)
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed, ending session");
            metrics::counter!("api_token_refresh_total", "outcome" => "failure").increment(1);
            context.terminator.terminate().await;
            Err(e.into())
        }
    }
}
