//! bagnode - a node publishing and recording type-erased topics.
//!
//! The node is configured from a YAML file listing:
//! - The node name, namespace and intra-process settings
//! - Substitutions usable in topic names as `{key}`
//! - Topics to publish on, with their message type, count and period
//! - Topic names to record
//!
//! Publishers are created first. The requested topics are then looked up
//! on the graph and only those advertised with exactly one message type
//! are recorded. See `config/example.yaml` for a complete example.

pub mod config;
pub mod node;

pub use config::Config;
pub use node::{BagRecorderNode, Report, TopicSummary};
