//! Type-support lookup for message types known only by name.
//!
//! Endpoints never look at message contents. They only need a
//! [`TypeSupportHandle`], an opaque token obtained once at creation from
//! a [`TypeSupportLookup`], that identifies how the transport should
//! (de)serialize the raw buffers flowing through them.
//!
//! # Example
//!
//! ```
//! use bagnode_core::{TypeSupportLookup, TypeSupportRegistry};
//!
//! let registry = TypeSupportRegistry::new();
//! registry.register("std_msgs/msg/String").unwrap();
//!
//! // Both the short and the full form resolve to the same support.
//! let handle = registry.lookup("std_msgs/String").unwrap();
//! assert_eq!(handle.type_name(), "std_msgs/msg/String");
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock};

/// Typesupport identifier used when none is given.
pub const DEFAULT_TYPESUPPORT_IDENTIFIER: &str = "rosidl_typesupport_cpp";

/// Maps a type identifier to a [`TypeSupportHandle`].
pub trait TypeSupportLookup: Send + Sync {
    /// Look up the type support for `type_name`, accepting both
    /// `package/Type` and `package/msg/Type`.
    fn lookup(&self, type_name: &str) -> Result<TypeSupportHandle>;
}

/// An opaque type-support capability.
///
/// Cloning is cheap; each endpoint keeps its own clone for its whole
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSupportHandle {
    inner: Arc<TypeSupportInfo>,
}

#[derive(Debug, PartialEq, Eq)]
struct TypeSupportInfo {
    type_name: String,
    typesupport_identifier: String,
}

impl TypeSupportHandle {
    pub fn new(type_name: impl Into<String>, typesupport_identifier: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TypeSupportInfo {
                type_name: type_name.into(),
                typesupport_identifier: typesupport_identifier.into(),
            }),
        }
    }

    /// The normalized `package/msg/Type` name.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn typesupport_identifier(&self) -> &str {
        &self.inner.typesupport_identifier
    }
}

/// In-memory [`TypeSupportLookup`] populated by the application.
#[derive(Debug, Default)]
pub struct TypeSupportRegistry {
    supports: RwLock<IndexMap<String, TypeSupportHandle>>,
    typesupport_identifier: Option<String>,
}

impl TypeSupportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose handles carry a custom typesupport
    /// identifier.
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            supports: RwLock::default(),
            typesupport_identifier: Some(identifier.into()),
        }
    }

    /// Register support for a message type. Registering the same type
    /// twice returns the existing handle.
    pub fn register(&self, type_name: &str) -> Result<TypeSupportHandle> {
        let normalized = normalize_msg_type(type_name)?;
        let identifier = self
            .typesupport_identifier
            .as_deref()
            .unwrap_or(DEFAULT_TYPESUPPORT_IDENTIFIER);

        let mut supports = self
            .supports
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let handle = supports
            .entry(normalized.clone())
            .or_insert_with(|| TypeSupportHandle::new(normalized, identifier));
        Ok(handle.clone())
    }

    /// Returns the registered type names in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.supports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl TypeSupportLookup for TypeSupportRegistry {
    fn lookup(&self, type_name: &str) -> Result<TypeSupportHandle> {
        let normalized = normalize_msg_type(type_name)?;
        self.supports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&normalized)
            .cloned()
            .ok_or(Error::UnknownType {
                type_name: type_name.to_string(),
            })
    }
}

/// Normalize a message type to the full form (`package/msg/Type`).
///
/// ```
/// use bagnode_core::normalize_msg_type;
///
/// assert_eq!(normalize_msg_type("sensor_msgs/Image").unwrap(), "sensor_msgs/msg/Image");
/// assert_eq!(normalize_msg_type("sensor_msgs/msg/Image").unwrap(), "sensor_msgs/msg/Image");
/// assert!(normalize_msg_type("Image").is_err());
/// ```
pub fn normalize_msg_type(msg_type: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidTypeName {
        type_name: msg_type.to_string(),
        reason,
    };

    let segments: Vec<&str> = msg_type.split('/').collect();
    let (package, middle, type_name) = match segments.as_slice() {
        [package, type_name] => (*package, "msg", *type_name),
        [package, middle, type_name] => (*package, *middle, *type_name),
        [_] => return Err(invalid("expected 'package/Type' or 'package/msg/Type'")),
        _ => return Err(invalid("too many '/' separators")),
    };

    if package.is_empty() {
        return Err(invalid("package name is empty"));
    }
    if middle.is_empty() {
        return Err(invalid("interface kind is empty"));
    }
    if type_name.is_empty() {
        return Err(invalid("type name is empty"));
    }

    Ok(format!("{package}/{middle}/{type_name}"))
}
