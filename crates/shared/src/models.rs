//! Data model for the mirrored collection and the change events that update it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::WireEvent;

/// Wire names of the item attributes.
pub const PROJECT_ID: &str = "projectId";
pub const USER_ID: &str = "userId";
pub const CREATED_AT: &str = "createdAt";
pub const NAME: &str = "name";

/// Key attributes of an affected item, by wire attribute name.
pub type Keys = BTreeMap<String, String>;

/// One record of the mirrored collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub project_id: String,
    pub user_id: String,
    pub created_at: String,
    pub name: String,
}

impl Item {
    pub fn new(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        created_at: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            created_at: created_at.into(),
            name: name.into(),
        }
    }

    /// Look up an attribute by its wire name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            PROJECT_ID => Some(&self.project_id),
            USER_ID => Some(&self.user_id),
            CREATED_AT => Some(&self.created_at),
            NAME => Some(&self.name),
            _ => None,
        }
    }

    /// True if every attribute named in `keys` is present on this item with
    /// an equal value.
    ///
    /// An empty key set matches every item; the decoder never lets one
    /// through.
    pub fn matches(&self, keys: &Keys) -> bool {
        keys.iter()
            .all(|(name, value)| self.attribute(name) == Some(value.as_str()))
    }

    /// The `(projectId, userId)` key pair of this item.
    pub fn primary_keys(&self) -> Keys {
        Keys::from([
            (PROJECT_ID.to_string(), self.project_id.clone()),
            (USER_ID.to_string(), self.user_id.clone()),
        ])
    }

    /// A copy of this item with the fields present in `patch` overwritten.
    pub fn merged(&self, patch: &ItemPatch) -> Item {
        Item {
            project_id: patch.project_id.as_ref().unwrap_or(&self.project_id).clone(),
            user_id: patch.user_id.as_ref().unwrap_or(&self.user_id).clone(),
            created_at: patch.created_at.as_ref().unwrap_or(&self.created_at).clone(),
            name: patch.name.as_ref().unwrap_or(&self.name).clone(),
        }
    }
}

/// Partial item carried by MODIFY events. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ItemPatch {
    /// A patch that only renames the item.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<Item> for ItemPatch {
    fn from(item: Item) -> Self {
        Self {
            project_id: Some(item.project_id),
            user_id: Some(item.user_id),
            created_at: Some(item.created_at),
            name: Some(item.name),
        }
    }
}

/// A change notification for one record of the source table.
///
/// On the wire this is a JSON object discriminated by its `event` field; see
/// [`crate::protocol`] for decoding and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub enum ChangeEvent {
    /// A new item, appended to the collection.
    Insert { keys: Keys, item: Item },
    /// Attributes of existing items matching `keys` are overwritten.
    Modify { keys: Keys, item: ItemPatch },
    /// Items matching `keys` are deleted.
    Remove { keys: Keys },
    /// Any discriminant this version does not know. Applying it is a no-op.
    Unknown { event: String, keys: Keys },
}

impl ChangeEvent {
    pub const INSERT: &'static str = "INSERT";
    pub const MODIFY: &'static str = "MODIFY";
    pub const REMOVE: &'static str = "REMOVE";

    /// INSERT keyed by the item's own `(projectId, userId)`.
    pub fn insert(item: Item) -> Self {
        ChangeEvent::Insert {
            keys: item.primary_keys(),
            item,
        }
    }

    pub fn modify(keys: Keys, item: ItemPatch) -> Self {
        ChangeEvent::Modify { keys, item }
    }

    pub fn remove(keys: Keys) -> Self {
        ChangeEvent::Remove { keys }
    }

    /// The wire discriminant.
    pub fn kind(&self) -> &str {
        match self {
            ChangeEvent::Insert { .. } => Self::INSERT,
            ChangeEvent::Modify { .. } => Self::MODIFY,
            ChangeEvent::Remove { .. } => Self::REMOVE,
            ChangeEvent::Unknown { event, .. } => event,
        }
    }

    pub fn keys(&self) -> &Keys {
        match self {
            ChangeEvent::Insert { keys, .. }
            | ChangeEvent::Modify { keys, .. }
            | ChangeEvent::Remove { keys }
            | ChangeEvent::Unknown { keys, .. } => keys,
        }
    }
}

/// Build a [`Keys`] map from attribute/value pairs.
pub fn keys<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Keys {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Ordered sequence of items; order drives rendering.
///
/// Uniqueness is not enforced here. The reducer keeps it under the configured
/// insert policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    items: Vec<Item>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Items matching every attribute in `keys`, in collection order.
    pub fn find<'a>(&'a self, keys: &'a Keys) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |item| item.matches(keys))
    }
}

impl From<Vec<Item>> for Collection {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl FromIterator<Item> for Collection {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Collection {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
