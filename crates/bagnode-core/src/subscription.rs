//! Type-erased subscription.
//!
//! A [`GenericSubscription`] hands every received message to its
//! callback as a raw serialized buffer. When set up for intra-process
//! delivery, messages coming from a publisher registered in the same
//! [`IntraProcessManager`](crate::IntraProcessManager) are taken from
//! the manager instead of using the transported copy.
//!
//! # Example
//!
//! ```ignore
//! use bagnode_core::channel_callback;
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let subscription = node.create_generic_subscription(
//!     "/camera/image",
//!     "sensor_msgs/msg/Image",
//!     channel_callback("/camera/image", tx),
//! )?;
//!
//! while let Some((topic, msg)) = rx.recv().await {
//!     println!("Received {} bytes on {}", msg.len(), topic);
//! }
//! ```

use crate::{
    context::next_endpoint_id,
    error::{Error, Result},
    intra_process::IntraProcessRegistration,
    transport::{TransportOptions, TransportSubscription},
    type_support::TypeSupportHandle,
    types::{Gid, MessageCallback, MessageInfo, SerializedMessage},
};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Takes the message `(publisher_id, sequence)` for `subscription_id`
/// out of the intra-process manager.
pub type TakeIntraProcessMessage =
    Box<dyn Fn(u64, u64, u64) -> Result<Arc<SerializedMessage>> + Send + Sync>;

/// Tells whether a publisher gid belongs to a local publisher.
pub type MatchesAnyPublisher = Box<dyn Fn(&Gid) -> Result<bool> + Send + Sync>;

/// A subscription to serialized messages of a type known only at
/// runtime.
///
/// Created by [`BagNode::create_generic_subscription`](crate::BagNode::create_generic_subscription).
pub struct GenericSubscription {
    id: u64,
    topic: String,
    type_support: TypeSupportHandle,
    callback: MessageCallback,
    options: TransportOptions,
    /// Must be declared before `intra_process`: the transport
    /// registration is released before the intra-process entry.
    handle: OnceLock<Box<dyn TransportSubscription>>,
    intra_process: Option<IntraProcessSetup>,
}

struct IntraProcessSetup {
    registration: IntraProcessRegistration,
    take: TakeIntraProcessMessage,
    matches_any_publisher: MatchesAnyPublisher,
}

impl GenericSubscription {
    pub(crate) fn new(topic: String, type_support: TypeSupportHandle, callback: MessageCallback) -> Self {
        Self {
            id: next_endpoint_id(),
            topic,
            type_support,
            callback,
            options: TransportOptions::default(),
            handle: OnceLock::new(),
            intra_process: None,
        }
    }

    /// Enable intra-process delivery through `registration`.
    pub(crate) fn setup_intra_process(
        &mut self,
        registration: IntraProcessRegistration,
        take: TakeIntraProcessMessage,
        matches_any_publisher: MatchesAnyPublisher,
        options: TransportOptions,
    ) {
        self.options = options;
        self.intra_process = Some(IntraProcessSetup {
            registration,
            take,
            matches_any_publisher,
        });
    }

    /// Keep the transport registration alive for as long as this
    /// subscription.
    pub(crate) fn attach(&self, handle: Box<dyn TransportSubscription>) -> Result<()> {
        self.handle
            .set(handle)
            .map_err(|_| Error::registration(&self.topic, "subscription is already attached"))
    }

    /// Route one delivery from the transport to the callback.
    pub(crate) fn handle_message(&self, message: Arc<SerializedMessage>, info: MessageInfo) {
        if let Some(ipc) = &self.intra_process {
            match self.take_local(ipc, &info) {
                Ok(Some(local)) => {
                    (self.callback)(local);
                    return;
                }
                Ok(None) => {}
                Err(err @ Error::IntraProcessLifecycle { .. }) => {
                    error!(
                        topic = %self.topic,
                        error = %err,
                        "Dropping message, intra process manager is gone"
                    );
                    return;
                }
                Err(err) => {
                    debug!(
                        topic = %self.topic,
                        error = %err,
                        "Intra process message unavailable, using transported copy"
                    );
                }
            }
        }

        (self.callback)(message);
    }

    fn take_local(
        &self,
        ipc: &IntraProcessSetup,
        info: &MessageInfo,
    ) -> Result<Option<Arc<SerializedMessage>>> {
        let Some(notice) = info.intra_process else {
            return Ok(None);
        };
        if !(ipc.matches_any_publisher)(&info.publisher_gid)? {
            return Ok(None);
        }
        let subscription_id = ipc.registration.subscription_id();
        (ipc.take)(notice.publisher_id, notice.sequence, subscription_id).map(Some)
    }

    /// Process-wide endpoint id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The fully qualified topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn type_name(&self) -> &str {
        self.type_support.type_name()
    }

    pub fn type_support(&self) -> &TypeSupportHandle {
        &self.type_support
    }

    pub fn options(&self) -> TransportOptions {
        self.options
    }

    /// Id in the intra-process manager, if registered there.
    pub fn intra_process_subscription_id(&self) -> Option<u64> {
        self.intra_process
            .as_ref()
            .map(|ipc| ipc.registration.subscription_id())
    }

    /// Whether the subscription is registered on the transport.
    pub fn is_active(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl std::fmt::Debug for GenericSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericSubscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("type_name", &self.type_name())
            .field("intra_process_subscription_id", &self.intra_process_subscription_id())
            .finish()
    }
}

impl Drop for GenericSubscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, id = self.id, "Destroyed generic subscription");
    }
}

/// Build a callback forwarding every message, tagged with `topic`, into
/// a tokio channel.
pub fn channel_callback(
    topic: impl Into<String>,
    tx: mpsc::UnboundedSender<(String, Arc<SerializedMessage>)>,
) -> impl Fn(Arc<SerializedMessage>) + Send + Sync + 'static {
    let topic = topic.into();
    move |message| {
        if let Err(e) = tx.send((topic.clone(), message)) {
            error!(
                topic = %topic,
                error = %e,
                "Failed to forward message to channel"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_callback_forwards_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = channel_callback("/chatter", tx);

        callback(Arc::new(SerializedMessage::from(vec![1, 2, 3])));

        let (topic, message) = rx.recv().await.unwrap();
        assert_eq!(topic, "/chatter");
        assert_eq!(message.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_channel_callback_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let callback = channel_callback("/chatter", tx);
        callback(Arc::new(SerializedMessage::default()));
    }
}
