//! Reduction of discovered topics to a single type per topic.

use crate::{
    error::Error,
    types::{TopicTypeTable, TopicTypes},
};
use tracing::{debug, error};

/// A topic advertised with more than one message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    pub topic: String,
    pub types: Vec<String>,
}

impl From<TypeConflict> for Error {
    fn from(conflict: TypeConflict) -> Self {
        Error::TypeConflict {
            topic: conflict.topic,
            types: conflict.types,
        }
    }
}

/// Turns a [`TopicTypeTable`] into a one-type-per-topic mapping.
///
/// Topics bound to several types are never merged and no type is
/// picked for them: they are left out of the result and reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicTypeCatalog;

impl TopicTypeCatalog {
    /// Split `table` into the clean mapping and the conflicting topics.
    pub fn partition(table: TopicTypeTable) -> (TopicTypes, Vec<TypeConflict>) {
        let mut topics = TopicTypes::with_capacity(table.len());
        let mut conflicts = Vec::new();

        for (topic, types) in table {
            match types.len() {
                0 => debug!(topic = %topic, "Topic has no associated type, skipping"),
                1 => {
                    let type_name = types.into_iter().next().unwrap_or_default();
                    topics.insert(topic, type_name);
                }
                _ => conflicts.push(TypeConflict {
                    topic,
                    types: types.into_iter().collect(),
                }),
            }
        }

        (topics, conflicts)
    }

    /// Filter out topics with more than one type, logging each one.
    pub fn filter(table: TopicTypeTable) -> TopicTypes {
        let (topics, conflicts) = Self::partition(table);
        for conflict in &conflicts {
            error!(
                topic = %conflict.topic,
                types = ?conflict.types,
                "Topic '{}' has several types associated. Only topics with one type are supported",
                conflict.topic
            );
        }
        topics
    }

    /// Keep only the entries of `table` whose topic is in `names`.
    pub fn select<'a, I>(table: TopicTypeTable, names: I) -> TopicTypeTable
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        table
            .into_iter()
            .filter(|(topic, _)| names.contains(&topic.as_str()))
            .collect()
    }
}
