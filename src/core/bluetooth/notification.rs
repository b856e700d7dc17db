//! Notification handling for subscribed characteristics
//! Each subscription runs its own task that owns the characteristic's notify
//! stream; values are forwarded over a channel to a single printer task.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bluest::Characteristic;
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::console::Console;
use crate::core::bluetooth::transport::{LinkEventSink, NotificationSink, TransportError};
use crate::core::bluetooth::types::{LinkEvent, Notification};
use crate::utils::render_value;

/// A running notify/indicate registration for one characteristic
pub struct NotificationSubscription {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handshake sent by a pump task once the peripheral accepted or refused the registration
type Ready = oneshot::Sender<Result<(), String>>;

impl NotificationSubscription {
    /// Enables notifications and starts forwarding values into `sink`.
    ///
    /// Returns once the peripheral has accepted the registration, so a refused
    /// subscription is reported to the caller instead of only being logged.
    /// If the stream later fails or ends, `events` receives
    /// [`LinkEvent::SubscriptionEnded`].
    pub async fn start(
        characteristic: Characteristic,
        sink: NotificationSink,
        events: Option<LinkEventSink>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let uuid = characteristic.uuid();
        Self::establish(uuid, timeout, move |cancel_token, ready| async move {
            pump(uuid, characteristic.notify(), sink, events, cancel_token, ready).await;
        })
        .await
    }

    /// Spawns `task` and waits for its handshake.
    ///
    /// The task is cancelled unless the handshake succeeds, including when this
    /// future is dropped half-way.
    async fn establish<F, Fut>(uuid: Uuid, timeout: Duration, task: F) -> Result<Self, TransportError>
    where
        F: FnOnce(CancellationToken, Ready) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(task(cancel_token.clone(), ready_tx));
        let guard = cancel_token.clone().drop_guard();

        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                guard.disarm();
                Ok(Self {
                    cancel_token,
                    handle,
                })
            }
            Ok(Ok(Err(reason))) => Err(TransportError::Subscription { uuid, reason }),
            Ok(Err(_)) => Err(TransportError::Subscription {
                uuid,
                reason: "notification task ended before registering".to_string(),
            }),
            Err(_) => {
                handle.abort();
                Err(TransportError::OperationTimeout {
                    operation: "subscribe",
                    uuid,
                })
            }
        }
    }

    /// False once the pump task has exited
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops forwarding and waits up to `grace` for the registration to be released
    pub async fn stop(mut self, grace: Duration) -> Result<(), String> {
        self.cancel_token.cancel();
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("notification task failed: {}", e)),
            Err(_) => {
                self.handle.abort();
                Err("timed out waiting for notifications to stop".to_string())
            }
        }
    }
}

/// Registers for notifications, then forwards every value into `sink` until cancelled.
///
/// A stream that fails or ends on its own is reported on `events`; cancellation is not.
async fn pump<S, E>(
    uuid: Uuid,
    registration: impl Future<Output = Result<S, E>>,
    sink: NotificationSink,
    events: Option<LinkEventSink>,
    cancel_token: CancellationToken,
    ready: Ready,
) where
    S: Stream<Item = Result<Vec<u8>, E>>,
    E: fmt::Display,
{
    info!("Subscribing to notifications on {}", uuid);

    let stream = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            debug!("Subscription to {} cancelled before it was registered", uuid);
            return;
        }
        result = registration => match result {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                stream
            }
            Err(e) => {
                error!("Failed to subscribe to notifications on {}: {}", uuid, e);
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        },
    };
    tokio::pin!(stream);

    let ended_by_peer = loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Notification task for {} cancelled", uuid);
                break false;
            }
            result = stream.next() => {
                match result {
                    Some(Ok(value)) => {
                        debug!("Received {} byte(s) from {}", value.len(), uuid);
                        let notification = Notification {
                            characteristic: uuid,
                            value,
                        };
                        if sink.send(notification).is_err() {
                            warn!("Notification receiver dropped, stopping {}", uuid);
                            break false;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Error in notification stream for {}: {}", uuid, e);
                        break true;
                    }
                    None => break true,
                }
            }
        }
    };

    if ended_by_peer {
        if let Some(events) = events {
            let _ = events.send(LinkEvent::SubscriptionEnded(uuid));
        }
    }
    // Dropping the stream disables notifications on the peripheral
    info!("Notification stream for {} ended", uuid);
}

/// Prints every inbound notification until all senders are gone
pub fn spawn_notification_printer(
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    console: Arc<dyn Console>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            console.interject(&format_notification(&notification));
        }
        debug!("Notification printer stopped");
    })
}

pub fn format_notification(notification: &Notification) -> String {
    format!(
        "[Notification] From {}: {}",
        notification.characteristic,
        render_value(&notification.value)
    )
}
