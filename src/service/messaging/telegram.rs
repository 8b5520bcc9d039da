//! Telegram implementation of the messaging session, built on the `grammers` MTProto client.
//!
//! Sessions log in as regular user accounts (phone number, one-time code and an
//! optional cloud password), so they can comment on channel posts the way a
//! person would.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use grammers_client::{
    Client, Config as ClientConfig, InitParams, SignInError, Update,
    types::{InputMessage, LoginToken, Message, PasswordToken},
};
use grammers_session::{PackedChat, PackedType, Session as StoredSession};
use grammers_tl_types as tl;
use tokio::{
    sync::{Mutex, Notify, RwLock},
    task::JoinSet,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Res, SignIn, Void},
    },
    service::store::Account,
};

use super::{Connector, GenericConnector, GenericSession, IncomingMessage, MessageHandler, Session};

// Extra methods on `Connector` applied by the telegram implementation.

impl Connector {
    /// Creates a connector that opens Telegram sessions.
    pub fn telegram(config: &Config) -> Self {
        Self::new(Arc::new(TelegramConnector { config: config.clone() }))
    }
}

// Structs.

/// Opens one Telegram session per account, persisted under the configured session directory.
struct TelegramConnector {
    config: Config,
}

/// A channel subscription resolved to its packed chat.
struct Subscription {
    channel: String,
    chat: PackedChat,
    handler: MessageHandler,
}

/// Telegram session for a single account.
struct TelegramSession {
    phone: String,
    session_path: PathBuf,
    client: Client,
    login_token: Mutex<Option<LoginToken>>,
    password_token: Mutex<Option<PasswordToken>>,
    subscriptions: RwLock<Vec<Subscription>>,
    tasks: Mutex<JoinSet<()>>,
    disconnected: AtomicBool,
    shutdown: Notify,
}

#[async_trait]
impl GenericConnector for TelegramConnector {
    #[instrument(name = "TelegramConnector::connect", skip_all, fields(phone = %account.phone))]
    async fn connect(&self, account: &Account) -> Res<Session> {
        let session_path = self.config.session_path(&account.phone);
        let stored = StoredSession::load_file_or_create(&session_path).with_context(|| format!("Failed to open session file {}", session_path.display()))?;

        let client = Client::connect(ClientConfig {
            session: stored,
            api_id: account.api_id,
            api_hash: account.api_hash.clone(),
            params: InitParams {
                catch_up: self.config.catch_up,
                ..Default::default()
            },
        })
        .await?;

        info!("Connected to Telegram.");

        Ok(Session::new(Arc::new(TelegramSession {
            phone: account.phone.clone(),
            session_path,
            client,
            login_token: Mutex::new(None),
            password_token: Mutex::new(None),
            subscriptions: RwLock::new(Vec::new()),
            tasks: Mutex::new(JoinSet::new()),
            disconnected: AtomicBool::new(false),
            shutdown: Notify::new(),
        })))
    }
}

impl TelegramSession {
    /// Write the session (auth key and known peers) back to disk.
    fn save_session(&self) -> Void {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .with_context(|| format!("Failed to save session file {}", self.session_path.display()))
    }

    /// Hand a new message to every subscription registered for its chat.
    async fn dispatch(&self, message: Message) {
        let chat_id = message.chat().id();
        let subscriptions = self.subscriptions.read().await;
        let mut tasks = self.tasks.lock().await;

        // Reap finished handlers.
        while tasks.try_join_next().is_some() {}

        for subscription in recipients(message.outgoing(), chat_id, &subscriptions) {
            let incoming = IncomingMessage {
                channel: subscription.channel.clone(),
                chat_id,
                message_id: message.id(),
                text: message.text().to_string(),
            };

            debug!(channel = %subscription.channel, message_id = incoming.message_id, "Dispatching new message.");

            tasks.spawn((subscription.handler)(incoming));
        }
    }

    /// Find the discussion-group copy of a channel post, which is where comments live.
    async fn discussion_target(&self, chat: PackedChat, message_id: i32) -> Res<(PackedChat, i32)> {
        let request = tl::functions::messages::GetDiscussionMessage {
            peer: chat.to_input_peer(),
            msg_id: message_id,
        };

        let tl::enums::messages::DiscussionMessage::Message(discussion) = self.client.invoke(&request).await?;

        let posts = discussion.messages.iter().filter_map(|m| match m {
            tl::enums::Message::Message(m) => match &m.peer_id {
                tl::enums::Peer::Channel(peer) => Some((peer.channel_id, m.id)),
                _ => None,
            },
            _ => None,
        });

        let groups = discussion.chats.iter().filter_map(|c| match c {
            tl::enums::Chat::Channel(channel) => Some((channel.id, channel.access_hash)),
            _ => None,
        });

        thread_root(message_id, posts, groups)
    }
}

// Helpers.

/// Subscriptions that should see a message posted in `chat_id`.
///
/// Messages sent by this account are never dispatched.
fn recipients(outgoing: bool, chat_id: i64, subscriptions: &[Subscription]) -> impl Iterator<Item = &Subscription> {
    subscriptions.iter().filter(move |s| !outgoing && s.chat.id == chat_id)
}

/// Pick the comment thread out of a discussion response.
///
/// `posts` are the `(channel id, message id)` pairs of the messages posted in a
/// channel, and `groups` the `(channel id, access hash)` pairs of the chats
/// returned with them.  The thread root is the lowest message id.
fn thread_root<P, G>(message_id: i32, posts: P, groups: G) -> Res<(PackedChat, i32)>
where
    P: IntoIterator<Item = (i64, i32)>,
    G: IntoIterator<Item = (i64, Option<i64>)>,
{
    let (group_id, root_id) = posts
        .into_iter()
        .min_by_key(|(_, id)| *id)
        .ok_or_else(|| anyhow!("Post {message_id} has no discussion thread."))?;

    let access_hash = groups
        .into_iter()
        .find_map(|(id, hash)| (id == group_id).then_some(hash))
        .ok_or_else(|| anyhow!("Discussion group {group_id} missing from response."))?;

    let group = PackedChat {
        ty: PackedType::Megagroup,
        id: group_id,
        access_hash,
    };

    Ok((group, root_id))
}

#[async_trait]
impl GenericSession for TelegramSession {
    fn phone(&self) -> &str {
        &self.phone
    }

    async fn is_authorized(&self) -> Res<bool> {
        Ok(self.client.is_authorized().await?)
    }

    #[instrument(skip(self), fields(phone = %self.phone))]
    async fn request_login_code(&self) -> Void {
        let token = self.client.request_login_code(&self.phone).await?;
        *self.login_token.lock().await = Some(token);

        Ok(())
    }

    #[instrument(skip_all, fields(phone = %self.phone))]
    async fn sign_in(&self, code: &str) -> Res<SignIn> {
        let token = self.login_token.lock().await.take().ok_or_else(|| anyhow!("No login code has been requested."))?;

        match self.client.sign_in(&token, code).await {
            Ok(_) => {
                self.save_session()?;
                Ok(SignIn::Authorized)
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                let hint = password_token.hint().map(|h| h.to_string());
                *self.password_token.lock().await = Some(password_token);
                Ok(SignIn::PasswordRequired { hint })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all, fields(phone = %self.phone))]
    async fn check_password(&self, password: &str) -> Void {
        let token = self.password_token.lock().await.take().ok_or_else(|| anyhow!("No second factor was requested."))?;

        self.client.check_password(token, password).await?;
        self.save_session()?;

        Ok(())
    }

    #[instrument(skip(self, handler), fields(phone = %self.phone))]
    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Void {
        let chat = self.client.resolve_username(channel).await?.ok_or_else(|| anyhow!("Channel `{channel}` could not be resolved."))?;

        self.subscriptions.write().await.push(Subscription {
            channel: channel.to_string(),
            chat: chat.pack(),
            handler,
        });

        info!("Subscribed to `{}`.", channel);

        Ok(())
    }

    #[instrument(skip(self, message, text), fields(phone = %self.phone, message_id = message.message_id))]
    async fn send_reply(&self, channel: &str, message: &IncomingMessage, text: &str) -> Void {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(anyhow!("Session {} is disconnected.", self.phone));
        }

        let chat = self
            .subscriptions
            .read()
            .await
            .iter()
            .find(|s| s.channel == channel)
            .map(|s| s.chat)
            .ok_or_else(|| anyhow!("Not subscribed to `{channel}`."))?;

        // Broadcast channels only accept comments through their linked discussion group.
        let (target, reply_to) = if matches!(chat.ty, PackedType::Broadcast) {
            self.discussion_target(chat, message.message_id).await?
        } else {
            (chat, message.message_id)
        };

        self.client.send_message(target, InputMessage::text(text).reply_to(Some(reply_to))).await?;

        Ok(())
    }

    #[instrument(skip(self), fields(phone = %self.phone))]
    async fn run_until_disconnected(&self) -> Void {
        while !self.disconnected.load(Ordering::SeqCst) {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                update = self.client.next_update() => {
                    if let Update::NewMessage(message) = update? {
                        self.dispatch(message).await;
                    }
                }
            }
        }

        info!("Update loop stopped.");

        Ok(())
    }

    #[instrument(skip(self), fields(phone = %self.phone))]
    async fn disconnect(&self) -> Void {
        self.disconnected.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();

        self.tasks.lock().await.abort_all();
        self.subscriptions.write().await.clear();

        if let Err(e) = self.save_session() {
            warn!("Failed to save session on disconnect: {}", e);
        }

        Ok(())
    }
}

// Tests.
