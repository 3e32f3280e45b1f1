#![allow(dead_code)]

use bagnode_core::{
    BagNode, Context, LoopbackGraph, NodeOptions, SerializedMessage, TypeSupportRegistry,
};
use std::sync::{Arc, Mutex};

pub const STRING_TYPE: &str = "std_msgs/msg/String";
pub const INT32_TYPE: &str = "std_msgs/msg/Int32";

/// A graph, a type registry, and a context standing for one process.
pub struct Fixture {
    pub graph: LoopbackGraph,
    pub registry: Arc<TypeSupportRegistry>,
    pub context: Arc<Context>,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = Arc::new(TypeSupportRegistry::new());
        for type_name in [STRING_TYPE, INT32_TYPE, "sensor_msgs/msg/Image"] {
            registry.register(type_name).unwrap();
        }
        Self {
            graph: LoopbackGraph::new(),
            registry,
            context: Context::new(),
        }
    }

    /// A node of this process.
    pub fn node(&self, options: NodeOptions) -> BagNode {
        BagNode::new(
            options,
            self.context.clone(),
            self.graph.participant(),
            self.registry.clone(),
        )
        .unwrap()
    }

    /// A node of another process attached to the same graph.
    pub fn remote_node(&self, options: NodeOptions) -> BagNode {
        BagNode::new(
            options,
            Context::new(),
            self.graph.participant(),
            self.registry.clone(),
        )
        .unwrap()
    }
}

/// Collects every message handed to a subscription callback.
#[derive(Clone, Default)]
pub struct Received {
    messages: Arc<Mutex<Vec<Arc<SerializedMessage>>>>,
}

impl Received {
    pub fn callback(&self) -> impl Fn(Arc<SerializedMessage>) + Send + Sync + 'static {
        let messages = self.messages.clone();
        move |message| messages.lock().unwrap().push(message)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.data.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<Arc<SerializedMessage>> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}
