//! The node-level façade creating endpoints and answering discovery
//! queries.

use crate::{
    catalog::TopicTypeCatalog,
    config::NodeOptions,
    context::Context,
    error::{Error, Result},
    intra_process::IntraProcessRegistration,
    names::{TopicNameResolver, node_fully_qualified_name},
    publisher::GenericPublisher,
    subscription::{GenericSubscription, MatchesAnyPublisher, TakeIntraProcessMessage},
    transport::{RawCallback, Transport, TransportOptions},
    type_support::{TypeSupportHandle, TypeSupportLookup},
    types::{Gid, MessageCallback, MessageInfo, SerializedMessage, TopicTypeTable, TopicTypes},
};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A node creating type-erased publishers and subscriptions.
///
/// Topic names are expanded with the node's name, namespace and
/// substitutions; message types are looked up by name through a
/// [`TypeSupportLookup`]; endpoints are registered on a [`Transport`]
/// and, when intra-process communication is enabled, with the
/// intra-process manager of the node's [`Context`].
///
/// # Example
///
/// ```
/// use bagnode_core::{BagNode, Context, LoopbackGraph, NodeOptions, TypeSupportRegistry};
/// use std::sync::{Arc, Mutex};
///
/// # fn main() -> bagnode_core::Result<()> {
/// let registry = Arc::new(TypeSupportRegistry::new());
/// registry.register("std_msgs/msg/String")?;
///
/// let graph = LoopbackGraph::new();
/// let node = BagNode::new(
///     NodeOptions::new("recorder").with_namespace("/robot"),
///     Context::new(),
///     graph.participant(),
///     registry,
/// )?;
///
/// let received = Arc::new(Mutex::new(Vec::new()));
/// let sink = received.clone();
/// let subscription = node
///     .create_generic_subscription("chatter", "std_msgs/String", move |msg| {
///         sink.lock().unwrap().push(msg.data.clone());
///     })?
///     .expect("subscription is registered");
/// assert_eq!(subscription.topic(), "/robot/chatter");
///
/// let publisher = node.create_generic_publisher("chatter", "std_msgs/msg/String")?;
/// publisher.publish(b"hello".to_vec())?;
///
/// assert_eq!(*received.lock().unwrap(), vec![b"hello".to_vec()]);
/// assert_eq!(node.get_all_topics_with_types()["/robot/chatter"], "std_msgs/msg/String");
/// # Ok(())
/// # }
/// ```
pub struct BagNode {
    options: NodeOptions,
    resolver: TopicNameResolver,
    context: Arc<Context>,
    transport: Arc<dyn Transport>,
    type_support: Arc<dyn TypeSupportLookup>,
}

impl BagNode {
    /// Create a node. Fails if the node name or namespace is invalid.
    ///
    /// An invalid substitution table does not fail here: every name
    /// expansion of the node fails instead.
    pub fn new(
        options: NodeOptions,
        context: Arc<Context>,
        transport: Arc<dyn Transport>,
        type_support: Arc<dyn TypeSupportLookup>,
    ) -> Result<Self> {
        // Resolving the private name checks the node identity. User
        // substitutions are only checked when a name is expanded.
        TopicNameResolver::new(&options.name, &options.namespace).resolve("~")?;

        let resolver = TopicNameResolver::new(&options.name, &options.namespace)
            .with_substitutions(options.substitutions.clone());

        info!(
            node = %node_fully_qualified_name(&options.name, &options.namespace),
            intra_process = options.use_intra_process_comms,
            "Created node"
        );

        Ok(Self {
            options,
            resolver,
            context,
            transport,
            type_support,
        })
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    pub fn fully_qualified_name(&self) -> String {
        node_fully_qualified_name(&self.options.name, &self.options.namespace)
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Create a publisher on `topic` for messages of `type_name`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownType`] or [`Error::InvalidTypeName`] if the type
    ///   cannot be looked up
    /// - [`Error::NameResolution`] if the topic name cannot be expanded
    /// - [`Error::IntraProcessLifecycle`] if intra-process communication is
    ///   enabled and the context was shut down
    pub fn create_generic_publisher(
        &self,
        topic: &str,
        type_name: &str,
    ) -> Result<Arc<GenericPublisher>> {
        let type_support = self.type_support.lookup(type_name)?;
        let topic = self.resolver.resolve(topic)?;

        let inner = self.transport.register_publisher(&topic, &type_support)?;
        let mut publisher = GenericPublisher::new(topic, type_support, inner);

        if self.options.use_intra_process_comms {
            let ipm = self.context.intra_process_manager()?;
            publisher.setup_intra_process(&ipm, self.options.intra_process_depth);
        }

        info!(
            topic = %publisher.topic(),
            msg_type = %publisher.type_name(),
            "Created generic publisher"
        );
        Ok(Arc::new(publisher))
    }

    /// Create a subscription on `topic` delivering raw messages of
    /// `type_name` to `callback`.
    ///
    /// Delivery starts as soon as this returns. A type lookup failure is
    /// returned as an error. Any later failure is logged and yields
    /// `Ok(None)`: the caller is then not subscribed.
    pub fn create_generic_subscription<F>(
        &self,
        topic: &str,
        type_name: &str,
        callback: F,
    ) -> Result<Option<Arc<GenericSubscription>>>
    where
        F: Fn(Arc<SerializedMessage>) + Send + Sync + 'static,
    {
        let type_support = self.type_support.lookup(type_name)?;

        match self.subscribe(topic, type_support, Arc::new(callback)) {
            Ok(subscription) => {
                info!(
                    topic = %subscription.topic(),
                    msg_type = %subscription.type_name(),
                    "Created generic subscription"
                );
                Ok(Some(subscription))
            }
            Err(err) => {
                error!(
                    topic = %topic,
                    error = %err,
                    "Error subscribing to topic '{}'",
                    topic
                );
                Ok(None)
            }
        }
    }

    fn subscribe(
        &self,
        topic: &str,
        type_support: TypeSupportHandle,
        callback: MessageCallback,
    ) -> Result<Arc<GenericSubscription>> {
        let topic = self.resolver.resolve(topic)?;
        let mut subscription = GenericSubscription::new(topic.clone(), type_support, callback);

        if self.options.use_intra_process_comms {
            let ipm = self.context.intra_process_manager()?;
            let registration =
                IntraProcessRegistration::subscribe(&ipm, &topic, subscription.type_name());

            let weak_ipm = registration.manager();
            let take: TakeIntraProcessMessage =
                Box::new(move |publisher_id: u64, sequence: u64, subscription_id: u64| {
                    let ipm = weak_ipm
                        .upgrade()
                        .ok_or(Error::IntraProcessLifecycle { operation: "take" })?;
                    ipm.take_intra_process_message(publisher_id, sequence, subscription_id)
                });

            let weak_ipm = registration.manager();
            let matches_any_publisher: MatchesAnyPublisher = Box::new(move |gid: &Gid| {
                let ipm = weak_ipm.upgrade().ok_or(Error::IntraProcessLifecycle {
                    operation: "publisher check",
                })?;
                Ok(ipm.matches_any_publishers(gid))
            });

            // Local publications are delivered too; duplicates are
            // filtered with the publisher check.
            let options = TransportOptions {
                ignore_local_publications: false,
            };
            subscription.setup_intra_process(registration, take, matches_any_publisher, options);
        }

        let subscription = Arc::new(subscription);
        let weak_subscription = Arc::downgrade(&subscription);
        let raw_callback: RawCallback =
            Arc::new(move |message: Arc<SerializedMessage>, info: MessageInfo| {
                if let Some(subscription) = weak_subscription.upgrade() {
                    subscription.handle_message(message, info);
                }
            });

        let handle = self
            .transport
            .register_subscription(
                &topic,
                subscription.type_support(),
                subscription.options(),
                raw_callback,
            )
            .map_err(|err| Error::registration(&topic, err))?;
        subscription.attach(handle)?;

        Ok(subscription)
    }

    /// Expand `name` into a fully qualified topic name.
    ///
    /// Returns an empty string, after logging the reason, when the name
    /// cannot be expanded. An empty result is a failure, never the root.
    pub fn expand_topic_name(&self, name: &str) -> String {
        match self.resolver.resolve(name) {
            Ok(expanded) => expanded,
            Err(err) => {
                error!(
                    topic = %name,
                    error = %err,
                    "Failed to expand topic name {}",
                    name
                );
                String::new()
            }
        }
    }

    /// Every topic on the graph with all the types it is advertised with.
    pub fn get_topic_names_and_types(&self) -> TopicTypeTable {
        self.transport.discover_topics()
    }

    /// The requested topics that exist on the graph with exactly one
    /// type.
    ///
    /// Names that fail to expand are skipped; topics with several types
    /// are logged and left out.
    pub fn get_topics_with_types<S>(&self, topic_names: &[S]) -> TopicTypes
    where
        S: AsRef<str>,
    {
        let sanitized: IndexSet<String> = topic_names
            .iter()
            .filter_map(|name| {
                let expanded = self.expand_topic_name(name.as_ref());
                if expanded.is_empty() {
                    warn!(topic = %name.as_ref(), "Skipping topic that cannot be expanded");
                    None
                } else {
                    Some(expanded)
                }
            })
            .collect();

        let selected = TopicTypeCatalog::select(
            self.get_topic_names_and_types(),
            sanitized.iter().map(String::as_str),
        );
        TopicTypeCatalog::filter(selected)
    }

    /// Every topic on the graph that has exactly one type.
    pub fn get_all_topics_with_types(&self) -> TopicTypes {
        TopicTypeCatalog::filter(self.get_topic_names_and_types())
    }
}

impl std::fmt::Debug for BagNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagNode")
            .field("options", &self.options)
            .field("context", &self.context)
            .finish()
    }
}
