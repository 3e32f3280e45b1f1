//! The recording node: publishes the configured topics and records what
//! its subscriptions receive.

use crate::config::{Config, PublisherConfig};
use bagnode_core::{
    BagNode, Context, GenericPublisher, GenericSubscription, LoopbackGraph, SerializedMessage,
    TypeSupportRegistry, channel_callback,
};
use eyre::{Result, WrapErr};
use futures::future::try_join_all;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

type Delivery = (String, Arc<SerializedMessage>);

/// Messages and bytes recorded on one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicSummary {
    pub messages: usize,
    pub bytes: usize,
}

/// What a run published and recorded, keyed by fully qualified topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub published: IndexMap<String, usize>,
    pub recorded: IndexMap<String, TopicSummary>,
}

/// A node wired to an in-process graph.
pub struct BagRecorderNode {
    node: BagNode,
    publishers: Vec<(Arc<GenericPublisher>, PublisherConfig)>,
    subscriptions: Vec<Arc<GenericSubscription>>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl BagRecorderNode {
    /// Create the node, its publishers, then subscriptions to the
    /// requested topics found on the graph.
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(TypeSupportRegistry::new());
        for msg_type in config.message_types() {
            registry
                .register(msg_type)
                .wrap_err_with(|| format!("Failed to register message type {}", msg_type))?;
        }

        let graph = LoopbackGraph::new();
        let node = BagNode::new(
            config.node_options(),
            Context::new(),
            graph.participant(),
            registry,
        )
        .wrap_err("Failed to create node")?;

        let publishers = config
            .publishers
            .iter()
            .map(|publisher_config| {
                let publisher = node
                    .create_generic_publisher(&publisher_config.topic, &publisher_config.msg_type)
                    .wrap_err_with(|| {
                        format!("Failed to create publisher on {}", publisher_config.topic)
                    })?;
                Ok((publisher, publisher_config.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let topics = node.get_topics_with_types(&config.subscriptions);
        if topics.len() < config.subscriptions.len() {
            warn!(
                requested = config.subscriptions.len(),
                found = topics.len(),
                "Some requested topics are not available"
            );
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::with_capacity(topics.len());
        for (topic, msg_type) in &topics {
            let subscription = node
                .create_generic_subscription(topic, msg_type, channel_callback(topic, tx.clone()))
                .wrap_err_with(|| format!("Failed to subscribe to {}", topic))?;
            match subscription {
                Some(subscription) => subscriptions.push(subscription),
                None => warn!(topic = %topic, "Topic is not recorded"),
            }
        }

        info!(
            node = %node.fully_qualified_name(),
            num_publishers = publishers.len(),
            num_subscriptions = subscriptions.len(),
            "Creating BagRecorderNode"
        );

        Ok(Self {
            node,
            publishers,
            subscriptions,
            rx,
        })
    }

    pub fn node(&self) -> &BagNode {
        &self.node
    }

    /// Publish every configured message, then return what was recorded.
    ///
    /// This consumes the node; recording ends once every publisher is
    /// done.
    pub async fn run(self) -> Result<Report> {
        let Self {
            node,
            publishers,
            subscriptions,
            mut rx,
        } = self;

        let recorder = tokio::spawn(async move {
            let mut recorded: IndexMap<String, TopicSummary> = IndexMap::new();
            while let Some((topic, message)) = rx.recv().await {
                let summary = recorded.entry(topic).or_default();
                summary.messages += 1;
                summary.bytes += message.len();
            }
            recorded
        });

        let tasks = publishers.into_iter().map(|(publisher, publisher_config)| {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(publisher_config.period);
                for index in 0..publisher_config.count {
                    interval.tick().await;
                    publisher
                        .publish(publisher_config.payload(index))
                        .wrap_err_with(|| format!("Failed to publish on {}", publisher.topic()))?;
                }
                info!(
                    topic = %publisher.topic(),
                    count = publisher_config.count,
                    "Publisher finished"
                );
                Ok::<_, eyre::Report>((publisher.topic().to_string(), publisher_config.count))
            })
        });

        let mut published: IndexMap<String, usize> = IndexMap::new();
        for result in try_join_all(tasks).await.wrap_err("Publisher task panicked")? {
            let (topic, count) = result?;
            *published.entry(topic).or_default() += count;
        }

        // Subscriptions own the channel senders.
        drop(subscriptions);
        let recorded = recorder.await.wrap_err("Recorder task panicked")?;

        info!(node = %node.fully_qualified_name(), "Run finished");
        Ok(Report {
            published,
            recorded,
        })
    }
}
