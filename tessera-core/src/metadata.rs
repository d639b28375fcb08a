//! Flat index of every object a parser has discovered, keyed by path.
//!
//! Hierarchy is not stored explicitly; listing a group is a prefix scan over
//! the keys followed by splitting off the first path segment.

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon, TrieKey};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Element type of a dataset or attribute as decoded by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Integer { signed: bool },
    Float,
    String,
    Compound,
    Opaque,
    Other,
}

/// What the parser learned about one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub is_attribute: bool,
    pub datatype: Option<ElementType>,
    /// Size of a single element in bytes.
    pub element_size: u64,
    pub dimensions: Vec<u64>,
    pub fill_value: Option<Vec<u8>>,
    /// Address of the object header within the container.
    pub address: Option<u64>,
}

impl MetadataRecord {
    pub fn variable() -> Self {
        Self::default()
    }

    pub fn attribute() -> Self {
        Self {
            is_attribute: true,
            ..Self::default()
        }
    }

    pub fn with_datatype(mut self, datatype: ElementType, element_size: u64) -> Self {
        self.datatype = Some(datatype);
        self.element_size = element_size;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<u64>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    /// Number of elements, `1` for scalars.
    pub fn num_elements(&self) -> u64 {
        self.dimensions.iter().product()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MetadataKey(SmolStr);

impl TrieKey for MetadataKey {
    fn encode_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

/// Keys are stored without leading or trailing `/`.
pub fn canonical_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Strips one leading and one trailing `/` from a group name.
pub fn normalize_group(group: &str) -> &str {
    let group = group.strip_prefix('/').unwrap_or(group);
    group.strip_suffix('/').unwrap_or(group)
}

/// Path to metadata index shared by every read task of a container.
#[derive(Debug)]
pub struct MetadataTable {
    tree: RwLock<Trie<MetadataKey, MetadataRecord>>,
    hits: AtomicU64,
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataTable {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Trie::new()),
            hits: AtomicU64::new(0),
        }
    }

    /// Inserts `record` unless `path` already has one.
    ///
    /// Returns `false` when an existing record was kept.
    pub fn insert(&self, path: &str, record: MetadataRecord) -> bool {
        let key = MetadataKey(SmolStr::new(canonical_path(path)));
        let mut tree = self.tree.write();
        if tree.get(&key).is_some() {
            return false;
        }
        tree.insert(key, record);
        true
    }

    pub fn get(&self, path: &str) -> Option<MetadataRecord> {
        let record = self
            .tree
            .read()
            .get(&MetadataKey(SmolStr::new(canonical_path(path))))
            .cloned();
        if record.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        record
    }

    pub fn contains(&self, path: &str) -> bool {
        self.tree
            .read()
            .get(&MetadataKey(SmolStr::new(canonical_path(path))))
            .is_some()
    }

    /// Number of successful lookups through [`MetadataTable::get`].
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn paths(&self) -> Vec<String> {
        self.tree.read().keys().map(|k| k.0.to_string()).collect()
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn list_prefix(&self, prefix: &str) -> Vec<(String, MetadataRecord)> {
        let tree = self.tree.read();
        if prefix.is_empty() {
            return entries_under(tree.iter(), prefix);
        }
        match tree.get_raw_descendant(&MetadataKey(SmolStr::new(prefix))) {
            Some(subtrie) => entries_under(subtrie.iter(), prefix),
            None => Vec::new(),
        }
    }

    /// Immediate children of `group`, split into variables and attributes.
    ///
    /// An entry one segment below the group is classified by its own
    /// `is_attribute` flag. Anything deeper only proves that its first segment
    /// is a child node, so `g/b/units` adds `b` to the variables of `g` and
    /// nothing to its attributes.
    pub fn children(&self, group: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        let group = normalize_group(group);
        let prefix = if group.is_empty() {
            String::new()
        } else {
            format!("{group}/")
        };

        let mut variables = BTreeSet::new();
        let mut attributes = BTreeSet::new();
        for (path, record) in self.list_prefix(&prefix) {
            let remainder = &path[prefix.len()..];
            let (element, nested) = match remainder.split_once('/') {
                Some((element, _)) => (element, true),
                None => (remainder, false),
            };
            if element.is_empty() {
                continue;
            }
            if record.is_attribute && !nested {
                attributes.insert(element.to_string());
            } else {
                variables.insert(element.to_string());
            }
        }
        (variables, attributes)
    }
}

// The descendant subtrie is keyed on nibbles, so its root may sit above `prefix`.
fn entries_under<'a>(
    entries: impl Iterator<Item = (&'a MetadataKey, &'a MetadataRecord)>,
    prefix: &str,
) -> Vec<(String, MetadataRecord)> {
    entries
        .filter(|(key, _)| key.0.starts_with(prefix))
        .map(|(key, record)| (key.0.to_string(), record.clone()))
        .collect()
}
