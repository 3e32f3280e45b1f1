//! Process-local routing of messages between colocated endpoints.
//!
//! A publisher registered with the [`IntraProcessManager`] stores each
//! outgoing message here before handing it to the transport. The
//! transport delivery then carries an [`IntraProcessNotice`] and a local
//! subscription takes the stored message instead of the transported
//! copy.
//!
//! Messages are destined, at store time, to every registered
//! subscription on the same topic with the same message type. Each
//! destination may take a given message at most once.

use crate::{
    error::{Error, Result},
    types::{Gid, IntraProcessNotice, SerializedMessage},
};
use indexmap::{IndexMap, IndexSet};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, Weak},
};
use tracing::{debug, warn};

/// Number of in-flight messages kept per publisher when none is given.
pub const DEFAULT_INTRA_PROCESS_DEPTH: usize = 16;

/// Registry of the intra-process publishers and subscriptions of one
/// [`Context`](crate::Context).
#[derive(Debug, Default)]
pub struct IntraProcessManager {
    registry: Mutex<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    /// Last id handed out, shared by publishers and subscriptions.
    last_id: u64,
    publishers: IndexMap<u64, PublisherEntry>,
    subscriptions: IndexMap<u64, SubscriptionEntry>,
}

#[derive(Debug)]
struct PublisherEntry {
    topic: String,
    type_name: String,
    gid: Gid,
    depth: usize,
    next_sequence: u64,
    /// In-flight messages ordered by sequence number.
    buffer: VecDeque<StoredMessage>,
}

#[derive(Debug)]
struct StoredMessage {
    sequence: u64,
    message: Arc<SerializedMessage>,
    /// Subscriptions that have not taken the message yet.
    pending: IndexSet<u64>,
}

#[derive(Debug)]
struct SubscriptionEntry {
    topic: String,
    type_name: String,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

impl IntraProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a publisher and return its intra-process id.
    pub fn add_publisher(&self, topic: &str, type_name: &str, gid: Gid, depth: usize) -> u64 {
        let mut registry = self.registry();
        let id = registry.next_id();
        registry.publishers.insert(
            id,
            PublisherEntry {
                topic: topic.to_string(),
                type_name: type_name.to_string(),
                gid,
                depth: depth.max(1),
                next_sequence: 1,
                buffer: VecDeque::new(),
            },
        );
        debug!(topic = %topic, publisher_id = id, "Added intra process publisher");
        id
    }

    /// Unregister a publisher, dropping its in-flight messages.
    pub fn remove_publisher(&self, publisher_id: u64) -> bool {
        let removed = self.registry().publishers.shift_remove(&publisher_id);
        if let Some(entry) = &removed {
            debug!(
                topic = %entry.topic,
                publisher_id,
                dropped = entry.buffer.len(),
                "Removed intra process publisher"
            );
        }
        removed.is_some()
    }

    /// Register a subscription and return its intra-process id.
    pub fn add_subscription(&self, topic: &str, type_name: &str) -> u64 {
        let mut registry = self.registry();
        let id = registry.next_id();
        registry.subscriptions.insert(
            id,
            SubscriptionEntry {
                topic: topic.to_string(),
                type_name: type_name.to_string(),
            },
        );
        debug!(topic = %topic, subscription_id = id, "Added intra process subscription");
        id
    }

    /// Unregister a subscription. Messages still waiting for it are
    /// released.
    pub fn remove_subscription(&self, subscription_id: u64) -> bool {
        let mut registry = self.registry();
        if registry.subscriptions.shift_remove(&subscription_id).is_none() {
            return false;
        }

        for publisher in registry.publishers.values_mut() {
            publisher.buffer.retain_mut(|stored| {
                stored.pending.shift_remove(&subscription_id);
                !stored.pending.is_empty()
            });
        }
        debug!(subscription_id, "Removed intra process subscription");
        true
    }

    /// Store a message published by `publisher_id` for every matching
    /// local subscription.
    ///
    /// The returned notice locates the message; each destination takes
    /// it with [`take_intra_process_message`](Self::take_intra_process_message).
    pub fn store_intra_process_message(
        &self,
        publisher_id: u64,
        message: Arc<SerializedMessage>,
    ) -> Result<IntraProcessNotice> {
        let mut registry = self.registry();
        let Registry {
            publishers,
            subscriptions,
            ..
        } = &mut *registry;

        let publisher = publishers
            .get_mut(&publisher_id)
            .ok_or(Error::UnknownPublisher { publisher_id })?;

        let sequence = publisher.next_sequence;
        publisher.next_sequence += 1;

        let pending: IndexSet<u64> = subscriptions
            .iter()
            .filter(|(_, sub)| sub.topic == publisher.topic && sub.type_name == publisher.type_name)
            .map(|(&id, _)| id)
            .collect();

        if !pending.is_empty() {
            if publisher.buffer.len() >= publisher.depth
                && let Some(evicted) = publisher.buffer.pop_front()
            {
                warn!(
                    topic = %publisher.topic,
                    publisher_id,
                    sequence = evicted.sequence,
                    untaken = evicted.pending.len(),
                    "Intra process buffer full, dropping oldest message"
                );
            }
            publisher.buffer.push_back(StoredMessage {
                sequence,
                message,
                pending,
            });
        }

        Ok(IntraProcessNotice {
            publisher_id,
            sequence,
        })
    }

    /// Hand over the message `sequence` of `publisher_id` to
    /// `subscription_id`.
    ///
    /// Succeeds at most once per triple; the message is released once
    /// every destination has taken it.
    pub fn take_intra_process_message(
        &self,
        publisher_id: u64,
        sequence: u64,
        subscription_id: u64,
    ) -> Result<Arc<SerializedMessage>> {
        let not_available = || Error::MessageNotAvailable {
            publisher_id,
            sequence,
            subscription_id,
        };

        let mut registry = self.registry();
        let publisher = registry
            .publishers
            .get_mut(&publisher_id)
            .ok_or_else(not_available)?;

        let index = publisher
            .buffer
            .binary_search_by_key(&sequence, |stored| stored.sequence)
            .map_err(|_| not_available())?;
        let stored = &mut publisher.buffer[index];

        if !stored.pending.shift_remove(&subscription_id) {
            return Err(not_available());
        }

        let message = if stored.pending.is_empty() {
            publisher
                .buffer
                .remove(index)
                .map(|stored| stored.message)
                .ok_or_else(not_available)?
        } else {
            stored.message.clone()
        };
        Ok(message)
    }

    /// Whether `gid` belongs to a publisher registered here.
    pub fn matches_any_publishers(&self, gid: &Gid) -> bool {
        self.registry()
            .publishers
            .values()
            .any(|publisher| publisher.gid == *gid)
    }

    /// Number of local subscriptions a publisher's messages are routed to.
    pub fn get_subscription_count(&self, publisher_id: u64) -> usize {
        let registry = self.registry();
        let Some(publisher) = registry.publishers.get(&publisher_id) else {
            return 0;
        };
        registry
            .subscriptions
            .values()
            .filter(|sub| sub.topic == publisher.topic && sub.type_name == publisher.type_name)
            .count()
    }

    pub fn publisher_count(&self) -> usize {
        self.registry().publishers.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry().subscriptions.len()
    }
}

/// A subscription's entry in an [`IntraProcessManager`].
///
/// Holds only a weak reference to the manager. Dropping the
/// registration removes the entry, so the manager never keeps routing
/// messages to a destroyed subscription.
#[derive(Debug)]
pub struct IntraProcessRegistration {
    subscription_id: u64,
    manager: Weak<IntraProcessManager>,
}

impl IntraProcessRegistration {
    /// Register a subscription on `topic` for messages of `type_name`.
    pub fn subscribe(manager: &Arc<IntraProcessManager>, topic: &str, type_name: &str) -> Self {
        Self {
            subscription_id: manager.add_subscription(topic, type_name),
            manager: Arc::downgrade(manager),
        }
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    /// A fresh weak reference to the manager holding this entry.
    pub fn manager(&self) -> Weak<IntraProcessManager> {
        self.manager.clone()
    }
}

impl Drop for IntraProcessRegistration {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.remove_subscription(self.subscription_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE: &str = "std_msgs/msg/String";

    fn message(data: &[u8]) -> Arc<SerializedMessage> {
        Arc::new(SerializedMessage::from(data))
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let ipm = IntraProcessManager::new();
        let a = ipm.add_subscription("/a", TYPE);
        let b = ipm.add_subscription("/a", TYPE);
        let p = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 4);
        assert!(a < b && b < p);
    }

    #[test]
    fn test_take_succeeds_exactly_once() {
        let ipm = IntraProcessManager::new();
        let sub = ipm.add_subscription("/a", TYPE);
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 4);

        let notice = ipm
            .store_intra_process_message(publisher, message(b"hello"))
            .unwrap();
        let taken = ipm
            .take_intra_process_message(notice.publisher_id, notice.sequence, sub)
            .unwrap();
        assert_eq!(taken.data, b"hello");

        let second = ipm.take_intra_process_message(notice.publisher_id, notice.sequence, sub);
        assert!(matches!(second, Err(Error::MessageNotAvailable { .. })));
    }

    #[test]
    fn test_each_destination_takes_its_own_copy() {
        let ipm = IntraProcessManager::new();
        let sub_a = ipm.add_subscription("/a", TYPE);
        let sub_b = ipm.add_subscription("/a", TYPE);
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 4);
        assert_eq!(ipm.get_subscription_count(publisher), 2);

        let notice = ipm
            .store_intra_process_message(publisher, message(b"x"))
            .unwrap();
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, sub_a)
                .is_ok()
        );
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, sub_b)
                .is_ok()
        );
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, sub_b)
                .is_err()
        );
    }

    #[test]
    fn test_only_matching_topic_and_type_are_destinations() {
        let ipm = IntraProcessManager::new();
        let other_topic = ipm.add_subscription("/b", TYPE);
        let other_type = ipm.add_subscription("/a", "std_msgs/msg/Int32");
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 4);

        let notice = ipm
            .store_intra_process_message(publisher, message(b"x"))
            .unwrap();
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, other_topic)
                .is_err()
        );
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, other_type)
                .is_err()
        );
    }

    #[test]
    fn test_sequences_preserve_publish_order() {
        let ipm = IntraProcessManager::new();
        let sub = ipm.add_subscription("/a", TYPE);
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 8);

        let notices: Vec<_> = (0..3u8)
            .map(|i| {
                ipm.store_intra_process_message(publisher, message(&[i]))
                    .unwrap()
            })
            .collect();
        assert!(notices.windows(2).all(|w| w[0].sequence < w[1].sequence));

        for (i, notice) in notices.iter().enumerate() {
            let taken = ipm
                .take_intra_process_message(publisher, notice.sequence, sub)
                .unwrap();
            assert_eq!(taken.data, vec![i as u8]);
        }
    }

    #[test]
    fn test_full_buffer_evicts_oldest() {
        let ipm = IntraProcessManager::new();
        let sub = ipm.add_subscription("/a", TYPE);
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 2);

        let first = ipm
            .store_intra_process_message(publisher, message(b"1"))
            .unwrap();
        ipm.store_intra_process_message(publisher, message(b"2"))
            .unwrap();
        let third = ipm
            .store_intra_process_message(publisher, message(b"3"))
            .unwrap();

        assert!(
            ipm.take_intra_process_message(publisher, first.sequence, sub)
                .is_err()
        );
        assert!(
            ipm.take_intra_process_message(publisher, third.sequence, sub)
                .is_ok()
        );
    }

    #[test]
    fn test_store_for_unknown_publisher_fails() {
        let ipm = IntraProcessManager::new();
        assert_eq!(
            ipm.store_intra_process_message(42, message(b"x")),
            Err(Error::UnknownPublisher { publisher_id: 42 })
        );
    }

    #[test]
    fn test_matches_any_publishers_follows_registration() {
        let ipm = IntraProcessManager::new();
        let gid = Gid::from_parts(7, 1);
        assert!(!ipm.matches_any_publishers(&gid));

        let publisher = ipm.add_publisher("/a", TYPE, gid, 1);
        assert!(ipm.matches_any_publishers(&gid));
        assert!(!ipm.matches_any_publishers(&Gid::from_parts(7, 2)));

        assert!(ipm.remove_publisher(publisher));
        assert!(!ipm.matches_any_publishers(&gid));
    }

    #[test]
    fn test_removing_subscription_releases_pending_messages() {
        let ipm = IntraProcessManager::new();
        let sub = ipm.add_subscription("/a", TYPE);
        let publisher = ipm.add_publisher("/a", TYPE, Gid::from_parts(1, 1), 4);

        let notice = ipm
            .store_intra_process_message(publisher, message(b"x"))
            .unwrap();
        assert!(ipm.remove_subscription(sub));
        assert!(!ipm.remove_subscription(sub));
        assert_eq!(ipm.subscription_count(), 0);
        assert!(
            ipm.take_intra_process_message(publisher, notice.sequence, sub)
                .is_err()
        );
    }

    #[test]
    fn test_registration_is_removed_on_drop() {
        let ipm = Arc::new(IntraProcessManager::new());
        let registration = IntraProcessRegistration::subscribe(&ipm, "/a", TYPE);
        assert_eq!(ipm.subscription_count(), 1);

        drop(registration);
        assert_eq!(ipm.subscription_count(), 0);
    }

    #[test]
    fn test_registration_outliving_manager_is_harmless() {
        let ipm = Arc::new(IntraProcessManager::new());
        let registration = IntraProcessRegistration::subscribe(&ipm, "/a", TYPE);
        drop(ipm);
        assert!(registration.manager().upgrade().is_none());
        drop(registration);
    }

    #[test]
    fn test_concurrent_registration() {
        let ipm = Arc::new(IntraProcessManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ipm = ipm.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| ipm.add_subscription("/a", TYPE))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(ipm.subscription_count(), 800);
    }
}
