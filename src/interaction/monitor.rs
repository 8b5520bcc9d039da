//! Authentication and per-channel comment handlers.
//!
//! For every configured account this module logs a session in, attaches one
//! handler per channel, and keeps the sessions running until they disconnect
//! or the operator interrupts the process.

use std::{pin::Pin, sync::Arc, time::Duration};

use chrono::Local;
use futures::future::join_all;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::types::{Res, SessionState, SignIn, Void},
    interaction::operator::Operator,
    service::{
        messaging::{Connector, IncomingMessage, MessageHandler, Session, WeakSession},
        store::{Account, Accounts, Channel},
    },
};

/// The immutable channel and comment pair captured by one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTarget {
    pub channel: String,
    pub comment: String,
}

impl From<&Channel> for CommentTarget {
    fn from(channel: &Channel) -> Self {
        Self {
            channel: channel.username.clone(),
            comment: channel.comment.clone(),
        }
    }
}

/// Open a session for `account` and log it in if needed.
///
/// When no stored session is authorised, the operator is asked for the one-time
/// code and, if the account requires it, the second-factor password.  Any
/// other failure is returned; there is no retry.
#[instrument(skip_all, fields(phone = %account.phone))]
pub async fn authenticate(connector: &Connector, account: &Account, operator: &Operator) -> Res<Session> {
    let session = connector.connect(account).await?;

    if session.is_authorized().await? {
        session.advance(SessionState::Authenticated);
        return Ok(session);
    }

    operator.say(&format!("Authorizing {}...", account.phone));
    session.request_login_code().await?;
    session.advance(SessionState::AwaitingCode);

    let code = operator.prompt(&format!("Enter the code received on {}: ", account.phone)).await?;

    if let SignIn::PasswordRequired { hint } = session.sign_in(code.trim()).await? {
        session.advance(SessionState::AwaitingSecondFactor);

        let question = match hint {
            Some(hint) => format!("Two-step verification is enabled (hint: {hint}). Please enter your password: "),
            None => "Two-step verification is enabled. Please enter your password: ".to_string(),
        };
        let password = operator.prompt_secret(&question).await?;

        session.check_password(&password).await?;
    }

    session.advance(SessionState::Authenticated);
    info!("Account authorised.");

    Ok(session)
}

/// Build the handler that comments `target.comment` under every new message.
///
/// The handler only keeps a weak reference to `session`; once the session is
/// dropped, pending and later messages are ignored.
pub fn comment_handler(session: &Session, target: CommentTarget, delay: Duration) -> MessageHandler {
    let session = session.downgrade();
    let target = Arc::new(target);

    Arc::new(move |message: IncomingMessage| {
        let session = session.clone();
        let target = target.clone();

        let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move { handle_new_message(&session, &target, message, delay).await }.in_current_span());
        fut
    })
}

/// Wait `delay`, then post the comment as a reply to `message`.
///
/// Failures are logged with a timestamp and the channel name, then dropped, so
/// the subscription keeps serving later messages.
#[instrument(skip_all, fields(channel = %target.channel, message_id = message.message_id))]
pub async fn handle_new_message(session: &WeakSession, target: &CommentTarget, message: IncomingMessage, delay: Duration) {
    tokio::time::sleep(delay).await;

    let Some(session) = session.upgrade() else {
        debug!("Session is gone; not commenting.");
        return;
    };

    match session.send_reply(&target.channel, &message, &target.comment).await {
        Ok(()) => info!("[{}] Commented on post in {}", Local::now(), target.channel),
        Err(err) => error!("[{}] Error commenting in {}: {}", Local::now(), target.channel, err),
    }
}

/// Subscribe `session` to `target.channel` with a comment handler.
#[instrument(skip_all, fields(phone = %session.phone(), channel = %target.channel))]
pub async fn register_handler(session: &Session, target: CommentTarget, delay: Duration) -> Void {
    let channel = target.channel.clone();
    let handler = comment_handler(session, target, delay);

    session.subscribe(&channel, handler).await
}

/// Log every account in and register one handler per configured channel.
///
/// Accounts are processed in order; an authentication failure aborts the whole
/// setup.  A channel that cannot be subscribed to is reported and skipped.
#[instrument(skip_all)]
pub async fn start_monitoring(accounts: &Accounts, connector: &Connector, operator: &Operator, delay: Duration) -> Res<Vec<Session>> {
    let mut sessions = Vec::with_capacity(accounts.accounts.len());

    for account in &accounts.accounts {
        let session = authenticate(connector, account, operator).await?;

        for channel in &account.channels {
            let target = CommentTarget::from(channel);

            if let Err(err) = register_handler(&session, target, delay).await {
                warn!("Skipping channel `{}` for {}: {}", channel.username, account.phone, err);
                operator.say(&format!("Could not monitor {} on {}: {}", channel.username, account.phone, err));
            }
        }

        session.advance(SessionState::Monitoring);
        sessions.push(session);
    }

    Ok(sessions)
}

/// Run every session until all of them disconnect or `shutdown` resolves.
///
/// On shutdown every session is disconnected before returning.
#[instrument(skip_all, fields(sessions = sessions.len()))]
pub async fn run_until<F>(sessions: &[Session], shutdown: F) -> Void
where
    F: Future<Output = ()>,
{
    let running = join_all(sessions.iter().map(|s| s.run_until_disconnected()));

    tokio::select! {
        results = running => {
            for (session, result) in sessions.iter().zip(results) {
                if let Err(err) = result {
                    error!("Session {} stopped with an error: {}", session.phone(), err);
                }
            }

            info!("All sessions disconnected.");
        }
        _ = shutdown => {
            info!("Interrupted; disconnecting {} session(s) ...", sessions.len());

            for session in sessions {
                if let Err(err) = session.disconnect().await {
                    error!("Failed to disconnect {}: {}", session.phone(), err);
                }
            }
        }
    }

    for session in sessions {
        session.advance(SessionState::Disconnected);
    }

    Ok(())
}

/// Resolves when the operator presses Ctrl+C.
///
/// Never resolves if the signal cannot be listened for.
pub async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Run every session until all of them disconnect or the operator presses Ctrl+C.
pub async fn run(sessions: &[Session]) -> Void {
    run_until(sessions, interrupted()).await
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_target_copies_the_channel_entry() {
        let channel = Channel::new("newsroom", "first!");

        let target = CommentTarget::from(&channel);

        assert_eq!(target.channel, "newsroom");
        assert_eq!(target.comment, "first!");
    }

    #[tokio::test]
    async fn run_until_with_no_sessions_returns() {
        run_until(&[], std::future::pending::<()>()).await.unwrap();
    }
}
