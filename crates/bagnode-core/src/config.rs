use crate::intra_process::DEFAULT_INTRA_PROCESS_DEPTH;
use indexmap::IndexMap;

/// Options a [`BagNode`](crate::BagNode) is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOptions {
    /// The node name, without namespace.
    pub name: String,
    /// The absolute namespace the node lives in.
    pub namespace: String,
    /// Route messages between endpoints of this process through the
    /// intra-process manager.
    pub use_intra_process_comms: bool,
    /// Number of in-flight messages each publisher keeps for local
    /// subscriptions.
    pub intra_process_depth: usize,
    /// User substitutions applied when expanding topic names.
    pub substitutions: IndexMap<String, String>,
}

impl NodeOptions {
    /// Create options for a node in the root namespace with
    /// intra-process communication enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "/".to_string(),
            use_intra_process_comms: true,
            intra_process_depth: DEFAULT_INTRA_PROCESS_DEPTH,
            substitutions: IndexMap::new(),
        }
    }

    /// Set the namespace. A missing leading `/` is added.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.starts_with('/') {
            namespace
        } else {
            format!("/{namespace}")
        };
        self
    }

    /// Enable or disable intra-process communication
    pub fn with_intra_process_comms(mut self, enabled: bool) -> Self {
        self.use_intra_process_comms = enabled;
        self
    }

    pub fn with_intra_process_depth(mut self, depth: usize) -> Self {
        self.intra_process_depth = depth;
        self
    }

    /// Add a `{key}` substitution for topic names.
    pub fn with_substitution(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = NodeOptions::new("recorder");
        assert_eq!(options.namespace, "/");
        assert!(options.use_intra_process_comms);
        assert_eq!(options.intra_process_depth, DEFAULT_INTRA_PROCESS_DEPTH);
        assert!(options.substitutions.is_empty());
    }

    #[test]
    fn test_namespace_gets_leading_slash() {
        assert_eq!(NodeOptions::new("n").with_namespace("robot").namespace, "/robot");
        assert_eq!(NodeOptions::new("n").with_namespace("/robot").namespace, "/robot");
    }
}
