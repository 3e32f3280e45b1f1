use std::fmt;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while creating endpoints, resolving names or routing
/// intra-process messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested message type has no registered type support.
    #[error("no type support registered for message type '{type_name}'")]
    UnknownType { type_name: String },

    /// The message type identifier is malformed.
    #[error("invalid message type '{type_name}': {reason}")]
    InvalidTypeName {
        type_name: String,
        reason: &'static str,
    },

    /// A topic name could not be expanded into a fully qualified name.
    #[error("failed to expand topic name '{name}': {reason}")]
    NameResolution { name: String, reason: NameError },

    /// A topic is advertised with more than one message type.
    #[error("topic '{topic}' has several types associated: {types:?}")]
    TypeConflict { topic: String, types: Vec<String> },

    /// The intra-process manager was destroyed while an endpoint still
    /// relied on it.
    #[error("intra process {operation} called after destruction of intra process manager")]
    IntraProcessLifecycle { operation: &'static str },

    /// Any other failure while wiring a subscription.
    #[error("error subscribing to topic '{topic}': {reason}")]
    SubscriptionRegistration { topic: String, reason: String },

    /// The requested intra-process message was already taken, evicted,
    /// or never destined for the subscription.
    #[error(
        "intra process message (publisher {publisher_id}, sequence {sequence}) \
         is not available for subscription {subscription_id}"
    )]
    MessageNotAvailable {
        publisher_id: u64,
        sequence: u64,
        subscription_id: u64,
    },

    /// The publisher is not registered with the intra-process manager.
    #[error("publisher {publisher_id} is not registered for intra process communication")]
    UnknownPublisher { publisher_id: u64 },

    /// The underlying transport refused an operation.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub(crate) fn resolution(name: &str, reason: NameError) -> Self {
        Error::NameResolution {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn registration(topic: &str, reason: impl fmt::Display) -> Self {
        Error::SubscriptionRegistration {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The reason a topic name failed to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    EmptyName,
    InvalidCharacter { character: char, index: usize },
    MisplacedTilde,
    UnmatchedBrace { index: usize },
    UnknownSubstitution(String),
    InvalidSubstitutionKey(String),
    InvalidSubstitutionValue { key: String, value: String },
    InvalidNodeName(String),
    InvalidNamespace(String),
    InvalidResolvedName { name: String, reason: &'static str },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::EmptyName => write!(f, "topic name must not be empty"),
            NameError::InvalidCharacter { character, index } => {
                write!(f, "invalid character '{character}' at index {index}")
            }
            NameError::MisplacedTilde => {
                write!(f, "'~' is only allowed at the start, optionally followed by '/'")
            }
            NameError::UnmatchedBrace { index } => write!(f, "unmatched brace at index {index}"),
            NameError::UnknownSubstitution(key) => write!(f, "unknown substitution '{{{key}}}'"),
            NameError::InvalidSubstitutionKey(key) => {
                write!(f, "invalid substitution key '{key}'")
            }
            NameError::InvalidSubstitutionValue { key, value } => {
                write!(f, "invalid value '{value}' for substitution '{key}'")
            }
            NameError::InvalidNodeName(name) => write!(f, "invalid node name '{name}'"),
            NameError::InvalidNamespace(ns) => write!(f, "invalid node namespace '{ns}'"),
            NameError::InvalidResolvedName { name, reason } => {
                write!(f, "expanded name '{name}' is invalid: {reason}")
            }
        }
    }
}
