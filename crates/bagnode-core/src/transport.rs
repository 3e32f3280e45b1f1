//! The boundary to the middleware that moves serialized messages.
//!
//! The endpoints in this crate never talk to a network themselves. A
//! [`Transport`] registers publishers and subscriptions on the graph,
//! delivers raw buffers to subscription callbacks and answers discovery
//! queries. [`LoopbackGraph`](crate::loopback::LoopbackGraph) is an
//! in-process implementation.

use crate::{
    error::Result,
    type_support::TypeSupportHandle,
    types::{Gid, IntraProcessNotice, MessageInfo, SerializedMessage, TopicTypeTable},
};
use std::sync::Arc;

/// Callback the transport invokes for every delivered message.
pub type RawCallback = Arc<dyn Fn(Arc<SerializedMessage>, MessageInfo) + Send + Sync>;

/// Subscription settings passed down to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportOptions {
    /// Do not deliver messages published by the same participant.
    pub ignore_local_publications: bool,
}

/// A middleware able to carry serialized messages between endpoints.
pub trait Transport: Send + Sync {
    /// Advertise a publisher of `type_support` on `topic`.
    fn register_publisher(
        &self,
        topic: &str,
        type_support: &TypeSupportHandle,
    ) -> Result<Box<dyn TransportPublisher>>;

    /// Start delivering messages on `topic` to `callback`.
    ///
    /// Delivery stops when the returned handle is dropped.
    fn register_subscription(
        &self,
        topic: &str,
        type_support: &TypeSupportHandle,
        options: TransportOptions,
        callback: RawCallback,
    ) -> Result<Box<dyn TransportSubscription>>;

    /// Every topic currently on the graph with the types it is
    /// advertised with.
    fn discover_topics(&self) -> TopicTypeTable;
}

/// A publisher registered on a [`Transport`]. Dropping it unregisters.
pub trait TransportPublisher: Send + Sync {
    /// Globally unique identity, reported to subscribers with every
    /// message.
    fn gid(&self) -> Gid;

    /// Send a pre-serialized message. `notice` is forwarded untouched to
    /// subscribers.
    fn publish(
        &self,
        message: Arc<SerializedMessage>,
        notice: Option<IntraProcessNotice>,
    ) -> Result<()>;
}

/// A subscription registered on a [`Transport`]. Dropping it
/// unregisters.
pub trait TransportSubscription: Send + Sync {
    fn topic(&self) -> &str;
}
