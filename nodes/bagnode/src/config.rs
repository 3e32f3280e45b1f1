//! Configuration parsing and validation for the bagnode executable.

use bagnode_core::{NodeOptions, normalize_msg_type};
use eyre::{Result, WrapErr, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Identity of the node.
    pub node: NodeConfig,

    /// User substitutions available as `{key}` in topic names.
    #[serde(default)]
    pub substitutions: IndexMap<String, String>,

    /// Message types registered in addition to the publishers' types.
    #[serde(default)]
    pub types: Vec<String>,

    /// Topics to publish on.
    #[serde(default)]
    pub publishers: Vec<PublisherConfig>,

    /// Topic names to record.
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        ensure!(!self.node.name.is_empty(), "node.name cannot be empty");
        ensure!(
            self.node.intra_process_depth > 0,
            "node.intra_process_depth must be greater than zero"
        );
        ensure!(
            !self.publishers.is_empty() || !self.subscriptions.is_empty(),
            "At least one publisher or subscription is required"
        );

        for (i, publisher) in self.publishers.iter().enumerate() {
            ensure!(
                !publisher.topic.is_empty(),
                "Publisher topic at index {} cannot be empty",
                i
            );
            ensure!(
                !publisher.period.is_zero(),
                "Publisher period at index {} must be greater than zero",
                i
            );
            normalize_msg_type(&publisher.msg_type)
                .wrap_err_with(|| format!("Invalid publisher type at index {}", i))?;
        }

        for msg_type in &self.types {
            normalize_msg_type(msg_type)
                .wrap_err_with(|| format!("Invalid message type: {}", msg_type))?;
        }

        let mut seen = IndexSet::new();
        for topic in &self.subscriptions {
            ensure!(!topic.is_empty(), "Subscription topic cannot be empty");
            if !seen.insert(topic.as_str()) {
                bail!("Duplicate subscription topic: {}", topic);
            }
        }

        Ok(())
    }

    /// Build the options the node is created with.
    pub fn node_options(&self) -> NodeOptions {
        let mut options = NodeOptions::new(self.node.name.clone())
            .with_namespace(self.node.namespace.clone())
            .with_intra_process_comms(self.node.intra_process)
            .with_intra_process_depth(self.node.intra_process_depth);
        for (key, value) in &self.substitutions {
            options = options.with_substitution(key.clone(), value.clone());
        }
        options
    }

    /// Every message type the configuration refers to, without
    /// duplicates.
    pub fn message_types(&self) -> IndexSet<&str> {
        self.publishers
            .iter()
            .map(|publisher| publisher.msg_type.as_str())
            .chain(self.types.iter().map(String::as_str))
            .collect()
    }
}

/// Identity of the node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node name, without namespace.
    pub name: String,

    /// Namespace of the node.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Route local messages through the intra-process manager.
    #[serde(default = "default_intra_process")]
    pub intra_process: bool,

    /// In-flight messages kept per publisher for local subscriptions.
    #[serde(default = "default_intra_process_depth")]
    pub intra_process_depth: usize,
}

fn default_namespace() -> String {
    "/".to_string()
}

fn default_intra_process() -> bool {
    true
}

fn default_intra_process_depth() -> usize {
    bagnode_core::intra_process::DEFAULT_INTRA_PROCESS_DEPTH
}

/// A topic the node publishes on.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// The topic name, expanded by the node.
    pub topic: String,

    /// The message type (e.g., "std_msgs/msg/String").
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Number of messages to publish.
    #[serde(default = "default_count")]
    pub count: usize,

    /// Time between two messages.
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Payload prefix; each message carries the prefix and its index.
    #[serde(default)]
    pub payload: String,
}

fn default_count() -> usize {
    1
}

impl PublisherConfig {
    /// The serialized bytes of message number `index`.
    pub fn payload(&self, index: usize) -> Vec<u8> {
        if self.payload.is_empty() {
            index.to_string().into_bytes()
        } else {
            format!("{} {}", self.payload, index).into_bytes()
        }
    }
}
