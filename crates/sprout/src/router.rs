//! Push notification dispatch.
//!
//! The session turns each Notify frame into a [`Notification`] and hands it
//! to the [`EventRouter`], which runs every subscribed handler on its own
//! task. A slow or panicking handler never holds up the receive loop or the
//! handlers of the next notification.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use prost::Message;
use smallvec::SmallVec;
use tracing::trace;
use uuid::Uuid;

use crate::error::DecodeError;
use crate::proto::task::TaskInfoNotify;
use crate::proto::user::BasicNotify;
use crate::proto::{BasicInfo, TaskInfo};

/// Discriminant of a [`Notification`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Connected,
    Disconnected,
    Kicked,
    LandsChanged,
    ItemChanged,
    BasicChanged,
    TaskChanged,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Login completed and the account snapshot is populated.
    Connected,
    /// The session closed. Published at most once per session.
    Disconnected,
    /// The server ended the session.
    Kicked { reason: String },
    LandsChanged { body: Bytes },
    ItemChanged { body: Bytes },
    /// Already applied to [`UserState`](crate::UserState) when published.
    BasicChanged(BasicInfo),
    TaskChanged(Option<TaskInfo>),
    /// Push type outside the known set. Never published.
    Unknown { message_type: String },
}

impl Notification {
    /// Maps a push discriminator and its body to a notification.
    pub fn from_event(message_type: &str, body: Bytes) -> Result<Self, DecodeError> {
        let name = message_type.rsplit('.').next().unwrap_or(message_type);

        let notification = if name.contains("Kickout") {
            Self::Kicked {
                reason: message_type.to_string(),
            }
        } else if name.contains("LandsNotify") {
            Self::LandsChanged { body }
        } else if name.contains("ItemNotify") {
            Self::ItemChanged { body }
        } else if name.contains("BasicNotify") {
            let notify = BasicNotify::decode(body)?;
            Self::BasicChanged(notify.basic.unwrap_or_default())
        } else if name.contains("TaskInfoNotify") {
            let notify = TaskInfoNotify::decode(body)?;
            Self::TaskChanged(notify.task_info)
        } else {
            Self::Unknown {
                message_type: message_type.to_string(),
            }
        };
        Ok(notification)
    }

    pub fn kind(&self) -> Option<NotificationKind> {
        match self {
            Self::Connected => Some(NotificationKind::Connected),
            Self::Disconnected => Some(NotificationKind::Disconnected),
            Self::Kicked { .. } => Some(NotificationKind::Kicked),
            Self::LandsChanged { .. } => Some(NotificationKind::LandsChanged),
            Self::ItemChanged { .. } => Some(NotificationKind::ItemChanged),
            Self::BasicChanged(_) => Some(NotificationKind::BasicChanged),
            Self::TaskChanged(_) => Some(NotificationKind::TaskChanged),
            Self::Unknown { .. } => None,
        }
    }
}

/// Boxed subscriber callback.
pub type Handler = Arc<dyn Fn(Notification) -> BoxFuture<'static, ()> + Send + Sync>;

/// Token returned by [`EventRouter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// Subscription registry keyed by notification kind.
#[derive(Default)]
pub struct EventRouter {
    handlers: DashMap<NotificationKind, SmallVec<[(SubscriptionId, Handler); 4]>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F, Fut>(&self, kind: NotificationKind, handler: F) -> SubscriptionId
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let handler: Handler = Arc::new(move |notification| handler(notification).boxed());
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: NotificationKind, id: SubscriptionId) -> bool {
        match self.handlers.get_mut(&kind) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Spawns every handler subscribed to the notification's kind.
    ///
    /// Returns the number of handlers started. Must be called from within a
    /// tokio runtime.
    pub fn publish(&self, notification: Notification) -> usize {
        let Some(kind) = notification.kind() else {
            return 0;
        };

        // Clone the handler list out so no shard lock is held while spawning.
        let handlers: SmallVec<[Handler; 4]> = match self.handlers.get(&kind) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return 0,
        };

        trace!(target: "sprout::router", ?kind, handlers = handlers.len(), "publishing");
        for handler in &handlers {
            tokio::spawn(handler(notification.clone()));
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, kind: NotificationKind) -> usize {
        self.handlers.get(&kind).map(|list| list.len()).unwrap_or(0)
    }
}
