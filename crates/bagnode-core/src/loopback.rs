//! In-process message graph.
//!
//! A [`LoopbackGraph`] plays the role of the middleware for endpoints
//! living in the same process. Each [`LoopbackParticipant`] stands for
//! one process attached to the graph: messages flow between all
//! participants, and the `ignore_local_publications` option filters
//! messages from the subscriber's own participant.
//!
//! A message is delivered only to subscriptions whose topic and message
//! type both equal the publisher's. Callbacks run synchronously on the
//! publishing thread, outside of the graph lock.

use crate::{
    error::Result,
    transport::{
        RawCallback, Transport, TransportOptions, TransportPublisher, TransportSubscription,
    },
    type_support::TypeSupportHandle,
    types::{Gid, IntraProcessNotice, MessageInfo, SerializedMessage, TopicTypeTable},
};
use indexmap::IndexMap;
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};
use tracing::trace;

/// A graph shared by every participant created from it.
#[derive(Debug, Clone, Default)]
pub struct LoopbackGraph {
    inner: Arc<GraphInner>,
}

#[derive(Debug, Default)]
struct GraphInner {
    last_participant: AtomicU64,
    state: Mutex<GraphState>,
}

#[derive(Default)]
struct GraphState {
    last_endpoint: u64,
    publishers: IndexMap<u64, PublisherRecord>,
    subscriptions: IndexMap<u64, SubscriptionRecord>,
}

impl std::fmt::Debug for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphState")
            .field("publishers", &self.publishers.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

struct PublisherRecord {
    topic: String,
    type_name: String,
}

struct SubscriptionRecord {
    participant: u64,
    topic: String,
    type_name: String,
    options: TransportOptions,
    callback: RawCallback,
}

impl GraphInner {
    fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LoopbackGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new participant to the graph.
    pub fn participant(&self) -> Arc<LoopbackParticipant> {
        let id = self.inner.last_participant.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(LoopbackParticipant {
            id,
            graph: self.inner.clone(),
        })
    }

    pub fn publisher_count(&self) -> usize {
        self.inner.state().publishers.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.state().subscriptions.len()
    }
}

/// One process attached to a [`LoopbackGraph`].
#[derive(Debug)]
pub struct LoopbackParticipant {
    id: u64,
    graph: Arc<GraphInner>,
}

impl LoopbackParticipant {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Transport for LoopbackParticipant {
    fn register_publisher(
        &self,
        topic: &str,
        type_support: &TypeSupportHandle,
    ) -> Result<Box<dyn TransportPublisher>> {
        let mut state = self.graph.state();
        state.last_endpoint += 1;
        let endpoint = state.last_endpoint;
        state.publishers.insert(
            endpoint,
            PublisherRecord {
                topic: topic.to_string(),
                type_name: type_support.type_name().to_string(),
            },
        );

        Ok(Box::new(LoopbackPublisher {
            endpoint,
            participant: self.id,
            gid: Gid::from_parts(self.id, endpoint),
            topic: topic.to_string(),
            type_name: type_support.type_name().to_string(),
            graph: self.graph.clone(),
        }))
    }

    fn register_subscription(
        &self,
        topic: &str,
        type_support: &TypeSupportHandle,
        options: TransportOptions,
        callback: RawCallback,
    ) -> Result<Box<dyn TransportSubscription>> {
        let mut state = self.graph.state();
        state.last_endpoint += 1;
        let endpoint = state.last_endpoint;
        state.subscriptions.insert(
            endpoint,
            SubscriptionRecord {
                participant: self.id,
                topic: topic.to_string(),
                type_name: type_support.type_name().to_string(),
                options,
                callback,
            },
        );

        Ok(Box::new(LoopbackSubscription {
            endpoint,
            topic: topic.to_string(),
            graph: self.graph.clone(),
        }))
    }

    fn discover_topics(&self) -> TopicTypeTable {
        let state = self.graph.state();
        let advertised = state
            .publishers
            .values()
            .map(|record| (&record.topic, &record.type_name));
        let subscribed = state
            .subscriptions
            .values()
            .map(|record| (&record.topic, &record.type_name));

        let mut table = TopicTypeTable::new();
        for (topic, type_name) in advertised.chain(subscribed) {
            table
                .entry(topic.clone())
                .or_default()
                .insert(type_name.clone());
        }
        table.sort_keys();
        table
    }
}

struct LoopbackPublisher {
    endpoint: u64,
    participant: u64,
    gid: Gid,
    topic: String,
    type_name: String,
    graph: Arc<GraphInner>,
}

impl TransportPublisher for LoopbackPublisher {
    fn gid(&self) -> Gid {
        self.gid
    }

    fn publish(
        &self,
        message: Arc<SerializedMessage>,
        notice: Option<IntraProcessNotice>,
    ) -> Result<()> {
        let callbacks: Vec<RawCallback> = self
            .graph
            .state()
            .subscriptions
            .values()
            .filter(|sub| sub.topic == self.topic && sub.type_name == self.type_name)
            .filter(|sub| {
                !(sub.options.ignore_local_publications && sub.participant == self.participant)
            })
            .map(|sub| sub.callback.clone())
            .collect();

        trace!(
            topic = %self.topic,
            receivers = callbacks.len(),
            "Delivering message on loopback graph"
        );

        let info = MessageInfo {
            publisher_gid: self.gid,
            intra_process: notice,
        };
        for callback in callbacks {
            callback(message.clone(), info);
        }
        Ok(())
    }
}

impl Drop for LoopbackPublisher {
    fn drop(&mut self) {
        let _removed = self.graph.state().publishers.shift_remove(&self.endpoint);
    }
}

struct LoopbackSubscription {
    endpoint: u64,
    topic: String,
    graph: Arc<GraphInner>,
}

impl TransportSubscription for LoopbackSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for LoopbackSubscription {
    fn drop(&mut self) {
        // The callback is released after the lock.
        let _removed = self.graph.state().subscriptions.shift_remove(&self.endpoint);
    }
}
