//! Process-wide holder of all provider sessions
//!
//! One [`WalletSession`] per [`WalletProvider`], all behind a single lock.
//! Every mutation that changes a provider's snapshot notifies that
//! provider's subscribers synchronously, in subscription order, once per
//! change. Notification runs outside the state lock so subscribers may read
//! the store (or act on it) from inside their callback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, WalletLinkError};
use crate::provider::{AppIdentity, ProviderConfig, WalletProvider};
use crate::state::{CallbackOutcome, ProviderSessionState, WalletSession};

/// Hands a URL off to the wallet app (OS-level app switch)
pub trait UrlDispatcher: Send + Sync {
    fn open(&self, url: &Url) -> std::result::Result<(), String>;
}

type Listener = Arc<dyn Fn(WalletProvider, &ProviderSessionState) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    provider: WalletProvider,
    callback: Listener,
}

struct Inner {
    app: AppIdentity,
    /// Indexed by `slot(provider)`
    sessions: Mutex<[WalletSession; 2]>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    /// Keeps mutate-then-notify sequences from interleaving across threads
    notify_gate: ReentrantMutex<()>,
    dispatcher: Arc<dyn UrlDispatcher>,
}

fn slot(provider: WalletProvider) -> usize {
    match provider {
        WalletProvider::Phantom => 0,
        WalletProvider::Solflare => 1,
    }
}

/// Shared handle to the session store; clones refer to the same store
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

/// Handle returned by [`SessionStore::subscribe`]
#[must_use = "dropping the handle keeps the subscription; call unsubscribe() to remove it"]
pub struct Subscription {
    inner: Weak<Inner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|entry| entry.id != self.id);
        }
    }
}

impl SessionStore {
    /// Store using built-in provider configs, overridden by `overrides`
    pub fn new(
        app: AppIdentity,
        overrides: BTreeMap<WalletProvider, ProviderConfig>,
        dispatcher: Arc<dyn UrlDispatcher>,
    ) -> Self {
        let sessions = WalletProvider::ALL.map(|provider| {
            let config = overrides
                .get(&provider)
                .cloned()
                .unwrap_or_else(|| provider.default_config());
            WalletSession::new(provider, config, app.clone())
        });

        Self {
            inner: Arc::new(Inner {
                app,
                sessions: Mutex::new(sessions),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                notify_gate: ReentrantMutex::new(()),
                dispatcher,
            }),
        }
    }

    pub fn with_defaults(app: AppIdentity, dispatcher: Arc<dyn UrlDispatcher>) -> Self {
        Self::new(app, BTreeMap::new(), dispatcher)
    }

    pub fn app(&self) -> &AppIdentity {
        &self.inner.app
    }

    pub fn provider_config(&self, provider: WalletProvider) -> ProviderConfig {
        self.inner.sessions.lock()[slot(provider)].config().clone()
    }

    /// Immutable snapshot of one provider's session
    pub fn get_state(&self, provider: WalletProvider) -> ProviderSessionState {
        self.inner.sessions.lock()[slot(provider)].state().clone()
    }

    /// Register `callback` for every change to `provider`'s session
    pub fn subscribe<F>(&self, provider: WalletProvider, callback: F) -> Subscription
    where
        F: Fn(WalletProvider, &ProviderSessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            provider,
            callback: Arc::new(callback),
        });
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Run `f` against one session, then notify if its snapshot changed
    fn mutate<R>(&self, provider: WalletProvider, f: impl FnOnce(&mut WalletSession) -> R) -> R {
        let _gate = self.inner.notify_gate.lock();

        let (result, changed) = {
            let mut sessions = self.inner.sessions.lock();
            let session = &mut sessions[slot(provider)];
            let before = session.state().clone();
            let result = f(session);
            let after = session.state();
            let changed = (*after != before).then(|| after.clone());
            (result, changed)
        };

        if let Some(snapshot) = changed {
            let listeners: Vec<Listener> = self
                .inner
                .listeners
                .lock()
                .iter()
                .filter(|entry| entry.provider == provider)
                .map(|entry| entry.callback.clone())
                .collect();
            debug!(
                %provider,
                status = %snapshot.connection_status,
                listeners = listeners.len(),
                "session state changed"
            );
            for listener in listeners {
                listener(provider, &snapshot);
            }
        }
        result
    }

    fn dispatch(&self, provider: WalletProvider, url: &Url) -> Result<()> {
        debug!(%provider, path = url.path(), "dispatching wallet link");
        self.inner.dispatcher.open(url).map_err(|reason| {
            warn!(%provider, %reason, "wallet link dispatch failed");
            WalletLinkError::DispatchFailed(reason)
        })
    }

    // ========================================================================
    // Session operations
    // ========================================================================

    /// Start a fresh connection attempt, superseding any outstanding one
    pub fn connect(&self, provider: WalletProvider) -> Result<Url> {
        let url = self.mutate(provider, |session| session.connect())?;
        if let Err(e) = self.dispatch(provider, &url) {
            self.mutate(provider, |session| session.dispatch_failed(&e.to_string()));
            return Err(e);
        }
        Ok(url)
    }

    /// Ask the connected wallet to sign and send `unsigned_transaction`
    pub fn request_signature(&self, provider: WalletProvider, unsigned_transaction: &[u8]) -> Result<Url> {
        let url = self.mutate(provider, |session| session.request_signature(unsigned_transaction))?;
        if let Err(e) = self.dispatch(provider, &url) {
            self.mutate(provider, |session| session.dispatch_failed(&e.to_string()));
            return Err(e);
        }
        Ok(url)
    }

    /// Drop the local session and its keys
    pub fn disconnect(&self, provider: WalletProvider) {
        self.mutate(provider, |session| session.disconnect());
    }

    /// Tell the wallet to end the session (if one exists), then disconnect locally
    ///
    /// The local disconnect happens even if the hand-off fails.
    pub fn disconnect_remote(&self, provider: WalletProvider) -> Result<Option<Url>> {
        let request = self.mutate(provider, |session| {
            let request = session.disconnect_request();
            session.disconnect();
            request
        })?;

        if let Some(url) = &request {
            self.dispatch(provider, url)?;
        }
        Ok(request)
    }

    /// Abandon the outstanding request after a caller-chosen deadline
    pub fn time_out(&self, provider: WalletProvider) -> bool {
        self.mutate(provider, |session| session.time_out())
    }

    /// Route an inbound deep link to the provider it is addressed to
    ///
    /// Returns the provider when the link belongs to one; foreign links are
    /// ignored.
    pub fn handle_callback(&self, url: &str) -> Option<(WalletProvider, CallbackOutcome)> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!("ignoring unparseable deep link");
                return None;
            }
        };

        let provider = {
            let sessions = self.inner.sessions.lock();
            WalletProvider::ALL
                .into_iter()
                .find(|p| self.inner.app.matches_callback(sessions[slot(*p)].config(), &parsed))
        };

        match provider {
            Some(provider) => Some((provider, self.handle_provider_callback(provider, url))),
            None => {
                debug!(scheme = parsed.scheme(), "deep link not addressed to a wallet session");
                None
            }
        }
    }

    /// Apply a callback already known to belong to `provider`
    pub fn handle_provider_callback(&self, provider: WalletProvider, url: &str) -> CallbackOutcome {
        self.mutate(provider, |session| session.handle_callback(url))
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("app", &self.inner.app)
            .finish_non_exhaustive()
    }
}
