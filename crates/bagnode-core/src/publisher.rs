//! Type-erased publisher.

use crate::{
    context::next_endpoint_id,
    error::{Error, Result},
    intra_process::IntraProcessManager,
    transport::TransportPublisher,
    type_support::TypeSupportHandle,
    types::{Gid, SerializedMessage},
};
use std::sync::{Arc, Weak};
use tracing::debug;

/// A publisher of pre-serialized messages of a type known only at
/// runtime.
///
/// Created by [`BagNode::create_generic_publisher`](crate::BagNode::create_generic_publisher).
pub struct GenericPublisher {
    id: u64,
    topic: String,
    type_support: TypeSupportHandle,
    inner: Box<dyn TransportPublisher>,
    intra_process: Option<PublisherIntraProcess>,
}

struct PublisherIntraProcess {
    id: u64,
    manager: Weak<IntraProcessManager>,
}

impl GenericPublisher {
    pub(crate) fn new(
        topic: String,
        type_support: TypeSupportHandle,
        inner: Box<dyn TransportPublisher>,
    ) -> Self {
        Self {
            id: next_endpoint_id(),
            topic,
            type_support,
            inner,
            intra_process: None,
        }
    }

    /// Register with `manager` so that local subscriptions can take
    /// published messages without going through the transport copy.
    pub(crate) fn setup_intra_process(&mut self, manager: &Arc<IntraProcessManager>, depth: usize) {
        let id = manager.add_publisher(
            &self.topic,
            self.type_support.type_name(),
            self.inner.gid(),
            depth,
        );
        self.intra_process = Some(PublisherIntraProcess {
            id,
            manager: Arc::downgrade(manager),
        });
    }

    /// Publish a serialized message. The bytes are not interpreted.
    pub fn publish(&self, message: impl Into<SerializedMessage>) -> Result<()> {
        let message = Arc::new(message.into());

        let notice = match &self.intra_process {
            Some(ipc) => {
                let manager = ipc.manager.upgrade().ok_or(Error::IntraProcessLifecycle {
                    operation: "publish",
                })?;
                Some(manager.store_intra_process_message(ipc.id, message.clone())?)
            }
            None => None,
        };

        self.inner.publish(message, notice)
    }

    /// Process-wide endpoint id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identity of the publisher on the transport.
    pub fn gid(&self) -> Gid {
        self.inner.gid()
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

    /// Id in the intra-process manager, if registered there.
    pub fn intra_process_id(&self) -> Option<u64> {
        self.intra_process.as_ref().map(|ipc| ipc.id)
    }
}

impl std::fmt::Debug for GenericPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericPublisher")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("type_name", &self.type_name())
            .field("intra_process_id", &self.intra_process_id())
            .finish()
    }
}

impl Drop for GenericPublisher {
    fn drop(&mut self) {
        if let Some(ipc) = &self.intra_process
            && let Some(manager) = ipc.manager.upgrade()
        {
            manager.remove_publisher(ipc.id);
        }
        debug!(topic = %self.topic, id = self.id, "Destroyed generic publisher");
    }
}
