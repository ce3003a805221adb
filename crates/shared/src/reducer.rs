//! Change-stream reducer.
//!
//! Folds an ordered sequence of [`ChangeEvent`]s into a [`Collection`]. The
//! fold is a pure function: the input collection is never touched and the
//! same `(collection, events)` always yields the same output.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownPolicy;
use crate::models::{ChangeEvent, Collection, Item, Keys, PROJECT_ID, USER_ID};

/// What INSERT does when an item with the same keys already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertPolicy {
    /// Append unconditionally. Replaying an INSERT yields a duplicate.
    #[default]
    Append,
    /// Replace the first item matching the event keys in place, append
    /// otherwise.
    Upsert,
}

/// Which items a REMOVE deletes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoveMatch {
    /// Items matching every declared key, the same rule MODIFY uses.
    #[default]
    DeclaredKeys,
    /// Items whose `projectId` and `userId` equal the event's, ignoring any
    /// other declared key.
    ProjectAndUser,
}

impl FromStr for InsertPolicy {
    type Err = UnknownPolicy;

    /// Parses `append` or `upsert`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(InsertPolicy::Append),
            "upsert" => Ok(InsertPolicy::Upsert),
            _ => Err(UnknownPolicy {
                policy: "insert policy",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for RemoveMatch {
    type Err = UnknownPolicy;

    /// Parses `keys` or `project-user`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keys" => Ok(RemoveMatch::DeclaredKeys),
            "project-user" => Ok(RemoveMatch::ProjectAndUser),
            _ => Err(UnknownPolicy {
                policy: "remove match",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerConfig {
    pub insert: InsertPolicy,
    pub remove: RemoveMatch,
}

impl ReducerConfig {
    pub fn with_insert(mut self, insert: InsertPolicy) -> Self {
        self.insert = insert;
        self
    }

    pub fn with_remove(mut self, remove: RemoveMatch) -> Self {
        self.remove = remove;
        self
    }
}

/// Apply one event to `items`, returning the new sequence.
pub fn apply_event(items: &[Item], event: &ChangeEvent, config: &ReducerConfig) -> Vec<Item> {
    match event {
        ChangeEvent::Modify { keys, item: patch } => items
            .iter()
            .map(|existing| {
                if existing.matches(keys) {
                    existing.merged(patch)
                } else {
                    existing.clone()
                }
            })
            .collect(),

        ChangeEvent::Insert { keys, item } => {
            let mut next = items.to_vec();
            match config.insert {
                InsertPolicy::Append => next.push(item.clone()),
                InsertPolicy::Upsert => match next.iter_mut().find(|e| e.matches(keys)) {
                    Some(existing) => *existing = item.clone(),
                    None => next.push(item.clone()),
                },
            }
            next
        }

        ChangeEvent::Remove { keys } => items
            .iter()
            .filter(|existing| !removes(existing, keys, config.remove))
            .cloned()
            .collect(),

        ChangeEvent::Unknown { .. } => items.to_vec(),
    }
}

fn removes(item: &Item, keys: &Keys, rule: RemoveMatch) -> bool {
    match rule {
        RemoveMatch::DeclaredKeys => item.matches(keys),
        RemoveMatch::ProjectAndUser => {
            keys.get(PROJECT_ID) == Some(&item.project_id)
                && keys.get(USER_ID) == Some(&item.user_id)
        }
    }
}

/// Fold `events` into `initial` in order, with the default policies.
pub fn merge_events(initial: &[Item], events: &[ChangeEvent]) -> Vec<Item> {
    merge_events_with(initial, events, &ReducerConfig::default())
}

/// Fold `events` into `initial` in order.
pub fn merge_events_with(
    initial: &[Item],
    events: &[ChangeEvent],
    config: &ReducerConfig,
) -> Vec<Item> {
    events
        .iter()
        .fold(initial.to_vec(), |items, event| apply_event(&items, event, config))
}

impl Collection {
    /// The collection that results from applying `event`.
    pub fn apply(&self, event: &ChangeEvent, config: &ReducerConfig) -> Collection {
        Collection::from(apply_event(self.as_slice(), event, config))
    }

    /// The collection that results from applying `events` in order.
    pub fn apply_all<'a>(
        &self,
        events: impl IntoIterator<Item = &'a ChangeEvent>,
        config: &ReducerConfig,
    ) -> Collection {
        events
            .into_iter()
            .fold(self.clone(), |collection, event| collection.apply(event, config))
    }
}
