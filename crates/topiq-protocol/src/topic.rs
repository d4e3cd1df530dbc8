use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

pub type TopicId = u64;

/// Unordered set of topic ids. Iteration is ascending so that derived
/// transaction sequences are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSet(BTreeSet<TopicId>);

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configured topic strings. Entries that are not base-10 `u64`
    /// values are returned separately so the caller can report them.
    pub fn parse_lossy<S: AsRef<str>>(raw: &[S]) -> (Self, Vec<ProtocolError>) {
        let mut set = BTreeSet::new();
        let mut rejected = Vec::new();
        for entry in raw {
            let entry = entry.as_ref();
            match entry.parse::<TopicId>() {
                Ok(id) => {
                    set.insert(id);
                }
                Err(_) => rejected.push(ProtocolError::InvalidTopicId(entry.to_owned())),
            }
        }
        (Self(set), rejected)
    }

    pub fn insert(&mut self, id: TopicId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<TopicId> {
        self.iter().collect()
    }
}

impl FromIterator<TopicId> for TopicSet {
    fn from_iter<I: IntoIterator<Item = TopicId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Minimal register/deregister operations aligning on-chain state with the
/// desired topic set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// `desired \ on_chain`, ascending.
    pub to_register: Vec<TopicId>,
    /// `on_chain \ desired`, ascending.
    pub to_deregister: Vec<TopicId>,
}

impl ReconciliationPlan {
    pub fn between(desired: &TopicSet, on_chain: &TopicSet) -> Self {
        Self {
            to_register: desired.0.difference(&on_chain.0).copied().collect(),
            to_deregister: on_chain.0.difference(&desired.0).copied().collect(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_register.is_empty() && self.to_deregister.is_empty()
    }
}
