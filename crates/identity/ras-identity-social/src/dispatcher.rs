//! Dispatcher: concurrency-safe entry point for starting and completing logins.

use crate::engine::HandshakeEngine;
use crate::error::{SocialError, SocialResult};
use crate::record::{HandshakeRecord, state_hint};
use crate::store::SessionStore;
use crate::types::{LoginOutcome, LoginRequest};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Creates handshake records, persists them, and consumes each one exactly once.
///
/// All session store access goes through one reader/writer lock shared by
/// every clone of a dispatcher. Lookups share the lock; writes and callback
/// consumption hold it exclusively, so a state token can be claimed by at
/// most one `complete_login` call.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn SessionStore>,
    engine: HandshakeEngine,
    lock: Arc<RwLock<()>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn SessionStore>, engine: HandshakeEngine) -> Self {
        Self {
            store,
            engine,
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn engine(&self) -> &HandshakeEngine {
        &self.engine
    }

    /// Start a login and return the provider authorization URL to redirect to.
    ///
    /// Nothing is persisted when the provider or redirect URL is invalid.
    pub async fn start_login(&self, request: LoginRequest) -> SocialResult<String> {
        let mut record = self.engine.configure(&request.provider);
        record.extend_scopes(request.scopes)?;
        let auth_url = self
            .engine
            .redirect(&mut record, &request.client, &request.redirect_url)?;

        {
            let _guard = self.lock.write().await;
            self.store.set(record.state(), &record).await?;
        }

        info!("Started social login for provider: {}", record.provider());
        Ok(auth_url)
    }

    /// Re-persist `record` under its own state token.
    ///
    /// Only records that have not been redirected yet can be updated. A
    /// redirected record may already have been consumed by a callback, and
    /// writing it back would let its state token complete a second time.
    pub async fn update(&self, record: &HandshakeRecord) -> SocialResult<()> {
        if record.is_redirected() {
            return Err(SocialError::AlreadyRedirected);
        }
        let _guard = self.lock.write().await;
        self.store.set(record.state(), record).await?;
        Ok(())
    }

    /// The pending record for `state`, if any. Does not consume it.
    pub async fn pending(&self, state: &str) -> SocialResult<Option<HandshakeRecord>> {
        let _guard = self.lock.read().await;
        Ok(self.store.get(state).await?)
    }

    /// Complete the login for `state`. The record is consumed whether or not
    /// the provider calls succeed; a second call with the same state fails
    /// with [`SocialError::InvalidState`].
    pub async fn complete_login(&self, state: &str, code: &str) -> SocialResult<LoginOutcome> {
        self.complete_login_with_cancel(state, code, CancellationToken::new())
            .await
    }

    /// [`complete_login`](Self::complete_login) that gives up with
    /// [`SocialError::Cancelled`] once `cancel` fires.
    pub async fn complete_login_with_cancel(
        &self,
        state: &str,
        code: &str,
        cancel: CancellationToken,
    ) -> SocialResult<LoginOutcome> {
        let claimed = {
            let _guard = self.lock.write().await;
            self.store.take(state).await?
        };

        let Some(mut record) = claimed else {
            debug!("Rejected callback for unknown state {}...", state_hint(state));
            return Err(SocialError::InvalidState);
        };
        debug!("Consumed handshake record {}...", record.state_hint());

        let result = self
            .engine
            .handle_callback(&mut record, state, code, &cancel)
            .await;

        if let Err(e) = &result {
            warn!(
                "Social login for provider {} failed: {}",
                record.provider(),
                e
            );
        }
        result
    }
}
