pub mod telegram;

use std::{
    ops::Deref,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    base::types::{Res, SessionState, SignIn, Void},
    service::store::Account,
};

// Types.

/// Callback invoked for every new message observed in a subscribed channel.
pub type MessageHandler = Arc<dyn Fn(IncomingMessage) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A new message observed in a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// The channel name the subscription was made for.
    pub channel: String,
    /// Platform identifier of the chat the message was posted in.
    pub chat_id: i64,
    /// Platform identifier of the message within its chat.
    pub message_id: i32,
    /// Message text (empty for media-only posts).
    pub text: String,
}

// Traits.

/// Generic messaging session trait that clients must implement.
///
/// A session belongs to exactly one account. It is created unauthorised by a
/// [`GenericConnector`], walked through login, and then used to subscribe to
/// channels and post replies.
#[async_trait]
pub trait GenericSession: Send + Sync + 'static {
    /// The phone number that identifies the account.
    fn phone(&self) -> &str;

    /// Whether a stored session is already authorised.
    async fn is_authorized(&self) -> Res<bool>;

    /// Ask the platform to deliver a one-time login code.
    async fn request_login_code(&self) -> Void;

    /// Submit the one-time login code.
    ///
    /// Returns [`SignIn::PasswordRequired`] when the account has a second factor enabled.
    async fn sign_in(&self, code: &str) -> Res<SignIn>;

    /// Submit the second-factor password after [`SignIn::PasswordRequired`].
    async fn check_password(&self, password: &str) -> Void;

    /// Invoke `handler` for every new message in `channel`.
    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Void;

    /// Post `text` as a comment on `message` in `channel`.
    async fn send_reply(&self, channel: &str, message: &IncomingMessage, text: &str) -> Void;

    /// Deliver updates to subscribers until the session disconnects.
    async fn run_until_disconnected(&self) -> Void;

    /// Persist the session and stop delivering updates.
    ///
    /// Handler tasks still in flight are cancelled and later replies fail.
    async fn disconnect(&self) -> Void;
}

/// Generic connector trait that opens sessions for accounts.
#[async_trait]
pub trait GenericConnector: Send + Sync + 'static {
    /// Open a session for `account`.  The session may still need to log in.
    async fn connect(&self, account: &Account) -> Res<Session>;
}

// Structs.

/// Messaging session for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Session {
    inner: Arc<dyn GenericSession>,
    state: Arc<Mutex<SessionState>>,
}

impl Deref for Session {
    type Target = dyn GenericSession;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Session {
    pub fn new(inner: Arc<dyn GenericSession>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(SessionState::Unauthenticated)),
        }
    }

    /// Where the session is in its lifecycle.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move the session to `next`.
    pub fn advance(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!("Session moved from {} to {}.", *state, next);
        *state = next;
    }

    /// A handle that does not keep the session alive.
    ///
    /// Sessions own their handlers, so handlers must refer back through this.
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
            state: self.state.clone(),
        }
    }
}

/// Non-owning counterpart of [`Session`].
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<dyn GenericSession>,
    state: Arc<Mutex<SessionState>>,
}

impl WeakSession {
    /// The session, unless it has already been dropped.
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session {
            inner,
            state: self.state.clone(),
        })
    }
}

/// Connector for the application.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<dyn GenericConnector>,
}

impl Deref for Connector {
    type Target = dyn GenericConnector;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Connector {
    pub fn new(inner: Arc<dyn GenericConnector>) -> Self {
        Self { inner }
    }
}
