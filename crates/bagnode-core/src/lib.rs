//! Type-erased publishers and subscriptions over a topic graph.
//!
//! This library lets a node publish and subscribe to topics whose
//! message type is only known at runtime, as a type name string such as
//! `"sensor_msgs/msg/Image"`. Messages are carried as opaque serialized
//! buffers; nothing here interprets their contents.
//!
//! # Overview
//!
//! - [`BagNode`]: the node façade creating endpoints and answering
//!   "which topics with which types exist" queries
//! - [`GenericPublisher`] / [`GenericSubscription`]: the type-erased
//!   endpoints
//! - [`IntraProcessManager`]: routes messages between publishers and
//!   subscriptions of the same process without the transport copy
//! - [`names`]: expansion of relative, private (`~`) and substituted
//!   (`{node}`) topic names into fully qualified names
//! - [`TopicTypeCatalog`]: drops topics advertised with several types
//! - [`Transport`] / [`TypeSupportLookup`]: the boundaries to the
//!   middleware and to the type-support libraries, with in-memory
//!   implementations ([`LoopbackGraph`], [`TypeSupportRegistry`])
//!
//! # Usage
//!
//! ```rust
//! use bagnode_core::{BagNode, Context, LoopbackGraph, NodeOptions, TypeSupportRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> bagnode_core::Result<()> {
//! let registry = Arc::new(TypeSupportRegistry::new());
//! registry.register("sensor_msgs/msg/Image")?;
//! registry.register("sensor_msgs/msg/PointCloud2")?;
//!
//! let graph = LoopbackGraph::new();
//! let node = BagNode::new(
//!     NodeOptions::new("recorder"),
//!     Context::new(),
//!     graph.participant(),
//!     registry,
//! )?;
//!
//! let _camera = node.create_generic_publisher("/camera/image", "sensor_msgs/Image")?;
//! let _lidar = node.create_generic_publisher("/lidar/points", "sensor_msgs/PointCloud2")?;
//!
//! // Ask which of the requested topics can be recorded.
//! let topics = node.get_topics_with_types(&["camera/image", "/missing", "bad name"]);
//! assert_eq!(topics.len(), 1);
//! assert_eq!(topics["/camera/image"], "sensor_msgs/msg/Image");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
mod config;
mod context;
mod error;
pub mod intra_process;
pub mod loopback;
pub mod names;
mod node;
mod publisher;
mod subscription;
pub mod transport;
mod type_support;
mod types;

pub use catalog::{TopicTypeCatalog, TypeConflict};
pub use config::NodeOptions;
pub use context::Context;
pub use error::{Error, NameError, Result};
pub use intra_process::{IntraProcessManager, IntraProcessRegistration};
pub use loopback::{LoopbackGraph, LoopbackParticipant};
pub use node::BagNode;
pub use publisher::GenericPublisher;
pub use subscription::{
    GenericSubscription, MatchesAnyPublisher, TakeIntraProcessMessage, channel_callback,
};
pub use transport::{Transport, TransportOptions, TransportPublisher, TransportSubscription};
pub use type_support::{
    DEFAULT_TYPESUPPORT_IDENTIFIER, TypeSupportHandle, TypeSupportLookup, TypeSupportRegistry,
    normalize_msg_type,
};
pub use types::*;
