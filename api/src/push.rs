//! Real-time push channel.
//!
//! Writers publish [`Envelope`]s on a broadcast hub; each connected socket
//! forwards the ones addressed to its user (or to everyone).

use agentboard_shared::{ClientFrame, PushEvent, User};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::auth;
use crate::error::Result;
use crate::extract::Params;
use crate::store::{notifications::Delivery, users};
use crate::{db, AppState};

/// Pending events per subscriber before a slow socket starts lagging.
const HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Envelope {
    /// `None` goes to every connected client.
    pub recipient: Option<i64>,
    pub event: PushEvent,
}

impl Envelope {
    pub fn is_for(&self, user_id: i64) -> bool {
        self.recipient.is_none_or(|r| r == user_id)
    }
}

#[derive(Clone)]
pub struct PushHub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    fn publish(&self, envelope: Envelope) {
        // An error only means nobody is connected right now.
        if self.tx.send(envelope).is_err() {
            tracing::trace!("push event dropped, no subscribers");
        }
    }

    pub fn deliver(&self, deliveries: &[Delivery]) {
        for d in deliveries {
            self.publish(Envelope {
                recipient: Some(d.recipient),
                event: PushEvent::from(&d.notification),
            });
        }
    }

    pub fn broadcast(&self, event: PushEvent) {
        self.publish(Envelope {
            recipient: None,
            event,
        });
    }
}

#[derive(Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// GET /ws/bot?token=...: upgrade to the push channel
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Params(params): Params<ConnectParams>,
) -> Result<Response> {
    let user_id = match params.token.as_deref() {
        Some(token) => state.auth.verify(token)?,
        None => auth::extract_user_id(&headers, &state.auth)?,
    };
    let user = db::run(&state.db, move |conn| users::require(conn, user_id)).await?;

    // Subscribe before upgrading so nothing published meanwhile is missed.
    let rx = state.push.subscribe();
    Ok(ws.on_upgrade(move |socket| serve(socket, user, rx)))
}

async fn serve(socket: WebSocket, user: User, mut rx: broadcast::Receiver<Envelope>) {
    let (mut sink, mut stream) = socket.split();
    tracing::info!(user_id = user.id, "push channel connected");

    let hello = PushEvent::Connected {
        user_id: user.id,
        message: user.username.clone(),
    };
    if send(&mut sink, &hello).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(envelope) if envelope.is_for(user.id) => {
                    if send(&mut sink, &envelope.event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = user.id, skipped, "push channel lagged");
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientFrame>(text.as_str()) {
                        Ok(ClientFrame::Ping) => {
                            if send(&mut sink, &PushEvent::Pong).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(user_id = user.id, error = %e, "ignoring client frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(user_id = user.id, error = %e, "push channel read failed");
                    break;
                }
            },
        }
    }

    tracing::info!(user_id = user.id, "push channel closed");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &PushEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentboard_shared::{Notification, NotificationKind};

    fn delivery(recipient: i64) -> Delivery {
        Delivery {
            recipient,
            notification: Notification {
                id: 1,
                kind: NotificationKind::Reply,
                thread_id: 5,
                thread_title: "t".into(),
                reply_id: 6,
                from_user: User {
                    id: 9,
                    username: "bob".into(),
                },
                content: "hi".into(),
                is_read: false,
                created_at: String::new(),
            },
        }
    }

    #[test]
    fn envelopes_route_by_recipient() {
        let direct = Envelope {
            recipient: Some(3),
            event: PushEvent::Pong,
        };
        assert!(direct.is_for(3));
        assert!(!direct.is_for(4));

        let everyone = Envelope {
            recipient: None,
            event: PushEvent::Pong,
        };
        assert!(everyone.is_for(4));
    }

    #[tokio::test]
    async fn hub_fans_out_deliveries_and_broadcasts() {
        let hub = PushHub::new(8);
        let mut rx = hub.subscribe();

        hub.deliver(&[delivery(2)]);
        hub.broadcast(PushEvent::NewThread {
            thread_id: 1,
            thread_title: "hello".into(),
            author: "alice".into(),
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.recipient, Some(2));
        assert!(matches!(first.event, PushEvent::Reply(ref p) if p.from_username == "bob"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.recipient, None);
        assert!(matches!(second.event, PushEvent::NewThread { thread_id: 1, .. }));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let hub = PushHub::default();
        hub.deliver(&[delivery(1)]);
    }
}
