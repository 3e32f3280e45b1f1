//! Topic name expansion.
//!
//! A topic name given by a user may be relative (`chatter`), private
//! (`~/status`) or contain substitutions (`{node}/cmd`). Expansion turns
//! it into a fully qualified name (`/ns/chatter`) using the node's name,
//! its namespace and a [`SubstitutionTable`].
//!
//! Expansion is pure: the same node identity and table always give the
//! same result, and expanding an already fully qualified name returns
//! it unchanged.
//!
//! ```
//! use bagnode_core::names::TopicNameResolver;
//!
//! let resolver = TopicNameResolver::new("talker", "/robot");
//! assert_eq!(resolver.resolve("chatter").unwrap(), "/robot/chatter");
//! assert_eq!(resolver.resolve("~/status").unwrap(), "/robot/talker/status");
//! assert_eq!(resolver.resolve("/{node}/cmd").unwrap(), "/talker/cmd");
//! ```

use crate::error::{Error, NameError, Result};
use indexmap::IndexMap;

/// Substitution keys provided for every node. They cannot be overridden.
pub const BUILTIN_SUBSTITUTIONS: [&str; 3] = ["node", "ns", "namespace"];

/// Key/value table used to replace `{key}` tokens in topic names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    entries: IndexMap<String, String>,
}

impl SubstitutionTable {
    /// Build the default table for a node: its name and namespace.
    pub fn for_node(node_name: &str, namespace: &str) -> Self {
        let mut entries = IndexMap::new();
        entries.insert("node".to_string(), node_name.to_string());
        entries.insert("ns".to_string(), namespace.to_string());
        entries.insert("namespace".to_string(), namespace.to_string());
        Self { entries }
    }

    /// Add a user substitution. Keys are `[A-Za-z0-9_]+` and may not
    /// shadow a builtin; values may only contain name characters.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), NameError> {
        let key = key.into();
        let value = value.into();

        if key.is_empty()
            || !key.chars().all(is_name_char)
            || BUILTIN_SUBSTITUTIONS.contains(&key.as_str())
        {
            return Err(NameError::InvalidSubstitutionKey(key));
        }
        if value.is_empty() || !value.chars().all(|c| is_name_char(c) || c == '/') {
            return Err(NameError::InvalidSubstitutionValue { key, value });
        }

        self.entries.insert(key, value);
        Ok(())
    }

    /// Add every pair from `pairs`, failing on the first invalid one.
    pub fn extend<'a, I>(&mut self, pairs: I) -> Result<(), NameError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in pairs {
            self.insert(key.clone(), value.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expands topic names on behalf of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNameResolver {
    node_name: String,
    namespace: String,
    substitutions: IndexMap<String, String>,
}

impl TopicNameResolver {
    pub fn new(node_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            namespace: namespace.into(),
            substitutions: IndexMap::new(),
        }
    }

    /// Attach user substitutions. They are validated at resolution time.
    pub fn with_substitutions(mut self, substitutions: IndexMap<String, String>) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Build the substitution table for this node.
    pub fn substitution_table(&self) -> Result<SubstitutionTable> {
        let mut table = SubstitutionTable::for_node(&self.node_name, &self.namespace);
        table
            .extend(&self.substitutions)
            .map_err(|reason| Error::resolution("", reason))?;
        Ok(table)
    }

    /// Expand `name` into a fully qualified topic name.
    pub fn resolve(&self, name: &str) -> Result<String> {
        let table = self.substitution_table().map_err(|err| match err {
            Error::NameResolution { reason, .. } => Error::resolution(name, reason),
            other => other,
        })?;
        resolve_topic_name(name, &self.node_name, &self.namespace, &table)
    }
}

/// Expand `name` for the node `node_name` living in `namespace`.
pub fn resolve_topic_name(
    name: &str,
    node_name: &str,
    namespace: &str,
    substitutions: &SubstitutionTable,
) -> Result<String> {
    let fail = |reason| Error::resolution(name, reason);

    validate_node_name(node_name).map_err(fail)?;
    validate_namespace(namespace).map_err(fail)?;

    if name.is_empty() {
        return Err(fail(NameError::EmptyName));
    }
    if let Some((index, character)) = name
        .char_indices()
        .find(|&(_, c)| !(is_name_char(c) || matches!(c, '/' | '~' | '{' | '}')))
    {
        return Err(fail(NameError::InvalidCharacter { character, index }));
    }

    let mut expanded = String::with_capacity(name.len() + namespace.len());

    // Private names: `~` or `~/...`.
    let rest = match name.strip_prefix('~') {
        Some(rest) => {
            if !(rest.is_empty() || rest.starts_with('/')) {
                return Err(fail(NameError::MisplacedTilde));
            }
            expanded.push_str(&join_namespace(namespace, node_name));
            rest
        }
        None => name,
    };
    if rest.contains('~') {
        return Err(fail(NameError::MisplacedTilde));
    }

    substitute(rest, substitutions, &mut expanded).map_err(fail)?;

    let expanded = if expanded.starts_with('/') {
        expanded
    } else {
        join_namespace(namespace, &expanded)
    };

    validate_full_topic_name(&expanded).map_err(fail)?;
    Ok(expanded)
}

/// Return the fully qualified name of a node.
pub fn node_fully_qualified_name(node_name: &str, namespace: &str) -> String {
    join_namespace(namespace, node_name)
}

fn join_namespace(namespace: &str, name: &str) -> String {
    if namespace == "/" {
        format!("/{name}")
    } else {
        format!("{namespace}/{name}")
    }
}

/// Replace every `{key}` token of `input`, appending to `out`.
fn substitute(
    input: &str,
    table: &SubstitutionTable,
    out: &mut String,
) -> Result<(), NameError> {
    let mut open: Option<usize> = None;
    let mut literal_start = 0;

    for (index, c) in input.char_indices() {
        match (c, open) {
            ('{', None) => {
                out.push_str(&input[literal_start..index]);
                open = Some(index);
            }
            ('{', Some(_)) | ('}', None) => return Err(NameError::UnmatchedBrace { index }),
            ('}', Some(start)) => {
                let key = &input[start + 1..index];
                let value = table
                    .get(key)
                    .ok_or_else(|| NameError::UnknownSubstitution(key.to_string()))?;
                out.push_str(value);
                open = None;
                literal_start = index + 1;
            }
            _ => {}
        }
    }

    if let Some(index) = open {
        return Err(NameError::UnmatchedBrace { index });
    }
    out.push_str(&input[literal_start..]);
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn validate_node_name(node_name: &str) -> Result<(), NameError> {
    let valid = !node_name.is_empty()
        && node_name.chars().all(is_name_char)
        && !node_name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(NameError::InvalidNodeName(node_name.to_string()))
    }
}

fn validate_namespace(namespace: &str) -> Result<(), NameError> {
    if namespace == "/" {
        return Ok(());
    }
    let invalid = || NameError::InvalidNamespace(namespace.to_string());
    let tokens = namespace.strip_prefix('/').ok_or_else(invalid)?;
    tokens
        .split('/')
        .all(is_valid_token)
        .then_some(())
        .ok_or_else(invalid)
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(is_name_char)
        && !token.starts_with(|c: char| c.is_ascii_digit())
}

fn validate_full_topic_name(name: &str) -> Result<(), NameError> {
    let invalid = |reason| NameError::InvalidResolvedName {
        name: name.to_string(),
        reason,
    };

    let Some(tokens) = name.strip_prefix('/') else {
        return Err(invalid("not absolute"));
    };
    if tokens.is_empty() || tokens.ends_with('/') {
        return Err(invalid("ends with '/'"));
    }
    for token in tokens.split('/') {
        if token.is_empty() {
            return Err(invalid("contains repeated '/'"));
        }
        if !token.chars().all(is_name_char) {
            return Err(invalid("contains characters other than alphanumerics, '_' and '/'"));
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid("a name token starts with a digit"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Result<String> {
        TopicNameResolver::new("my_node", "/my_ns").resolve(name)
    }

    fn reason(result: Result<String>) -> NameError {
        match result {
            Err(Error::NameResolution { reason, .. }) => reason,
            other => panic!("expected a resolution error, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_and_absolute_names() {
        assert_eq!(resolve("chatter").unwrap(), "/my_ns/chatter");
        assert_eq!(resolve("a/b").unwrap(), "/my_ns/a/b");
        assert_eq!(resolve("/chatter").unwrap(), "/chatter");
    }

    #[test]
    fn test_root_namespace() {
        let resolver = TopicNameResolver::new("my_node", "/");
        assert_eq!(resolver.resolve("chatter").unwrap(), "/chatter");
        assert_eq!(resolver.resolve("~").unwrap(), "/my_node");
        assert_eq!(resolver.resolve("~/ping").unwrap(), "/my_node/ping");
    }

    #[test]
    fn test_private_names() {
        assert_eq!(resolve("~").unwrap(), "/my_ns/my_node");
        assert_eq!(resolve("~/status").unwrap(), "/my_ns/my_node/status");
        assert_eq!(reason(resolve("~status")), NameError::MisplacedTilde);
        assert_eq!(reason(resolve("a/~/b")), NameError::MisplacedTilde);
    }

    #[test]
    fn test_builtin_substitutions() {
        assert_eq!(resolve("{node}/cmd").unwrap(), "/my_ns/my_node/cmd");
        assert_eq!(resolve("{ns}/cmd").unwrap(), "/my_ns/cmd");
        assert_eq!(resolve("{namespace}/x_{node}").unwrap(), "/my_ns/x_my_node");
    }

    #[test]
    fn test_user_substitutions() {
        let mut subs = IndexMap::new();
        subs.insert("robot".to_string(), "r2".to_string());
        let resolver = TopicNameResolver::new("my_node", "/my_ns").with_substitutions(subs);

        assert_eq!(resolver.resolve("/{robot}/odom").unwrap(), "/r2/odom");
        assert_eq!(
            reason(resolver.resolve("/{arm}/odom")),
            NameError::UnknownSubstitution("arm".into())
        );
    }

    #[test]
    fn test_unmatched_braces() {
        assert_eq!(
            reason(resolve("/a/{node")),
            NameError::UnmatchedBrace { index: 3 }
        );
        assert_eq!(
            reason(resolve("/a/node}")),
            NameError::UnmatchedBrace { index: 7 }
        );
        assert_eq!(
            reason(resolve("/{a{b}}")),
            NameError::UnmatchedBrace { index: 3 }
        );
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(reason(resolve("")), NameError::EmptyName);
        assert_eq!(
            reason(resolve("/a b")),
            NameError::InvalidCharacter {
                character: ' ',
                index: 2
            }
        );
        assert!(matches!(
            reason(resolve("/")),
            NameError::InvalidResolvedName { .. }
        ));
        assert!(matches!(
            reason(resolve("/a//b")),
            NameError::InvalidResolvedName { .. }
        ));
        assert!(matches!(
            reason(resolve("/a/")),
            NameError::InvalidResolvedName { .. }
        ));
        assert!(matches!(
            reason(resolve("/1abc")),
            NameError::InvalidResolvedName { .. }
        ));
    }

    #[test]
    fn test_invalid_node_identity() {
        let bad_node = TopicNameResolver::new("9node", "/");
        assert_eq!(
            reason(bad_node.resolve("chatter")),
            NameError::InvalidNodeName("9node".into())
        );

        let bad_ns = TopicNameResolver::new("node", "ns/");
        assert_eq!(
            reason(bad_ns.resolve("chatter")),
            NameError::InvalidNamespace("ns/".into())
        );
    }

    #[test]
    fn test_substitution_table_rejects_builtins_and_bad_values() {
        let mut table = SubstitutionTable::for_node("n", "/");
        assert_eq!(
            table.insert("node", "other"),
            Err(NameError::InvalidSubstitutionKey("node".into()))
        );
        assert_eq!(
            table.insert("bad key", "v"),
            Err(NameError::InvalidSubstitutionKey("bad key".into()))
        );
        assert!(matches!(
            table.insert("k", "{v}"),
            Err(NameError::InvalidSubstitutionValue { .. })
        ));
        assert_eq!(table.insert("k", "v/w"), Ok(()));
        assert_eq!(table.get("k"), Some("v/w"));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        for name in ["chatter", "~/status", "{node}/cmd", "/abs/name", "~", "a/b/c"] {
            let once = resolve(name).unwrap();
            let twice = resolve(&once).unwrap();
            assert_eq!(once, twice, "resolving {name:?} twice changed the result");
        }
    }
}
