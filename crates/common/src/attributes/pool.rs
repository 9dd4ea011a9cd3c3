// Per-document mapping between (key, value) pairs and dense integer ids.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{Attribute, AttributeError, AttributeId};

/// Ids are handed out densely from zero and never reused or renumbered.
///
/// Allocation takes `&mut self`; the daemon keeps each pool inside its
/// document's exclusive region, so concurrent first uses of the same pair
/// cannot race.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePool {
    by_id: Vec<Attribute>,
    ids: HashMap<Attribute, AttributeId>,
}

/// Wire form of a pool: `{"numToAttrib": {"0": ["k", "v"]}, "nextNum": 1}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub num_to_attrib: BTreeMap<u32, Attribute>,
    pub next_num: u32,
}

impl AttributePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(&mut self, key: &str, value: &str) -> AttributeId {
        let attribute = Attribute::new(key, value);
        if let Some(id) = self.ids.get(&attribute) {
            return *id;
        }

        let id = AttributeId::new(self.next_num());
        self.ids.insert(attribute.clone(), id);
        self.by_id.push(attribute);
        id
    }

    pub fn lookup(&self, key: &str, value: &str) -> Option<AttributeId> {
        self.ids.get(&Attribute::new(key, value)).copied()
    }

    pub fn attribute(&self, id: AttributeId) -> Result<&Attribute, AttributeError> {
        self.by_id.get(id.get() as usize).ok_or(AttributeError::UnknownAttributeId(id))
    }

    /// Resolves every id, failing on the first one this pool never issued.
    pub fn attributes(&self, ids: &[AttributeId]) -> Result<Vec<&Attribute>, AttributeError> {
        ids.iter().map(|id| self.attribute(*id)).collect()
    }

    /// Allocates ids for `attributes`, sorted and deduplicated.
    pub fn resolve(&mut self, attributes: &[Attribute]) -> Vec<AttributeId> {
        let mut ids: Vec<_> =
            attributes.iter().map(|attribute| self.id_for(&attribute.key, &attribute.value)).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, &Attribute)> {
        self.by_id
            .iter()
            .enumerate()
            .map(|(index, attribute)| (AttributeId::new(index as u32), attribute))
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            num_to_attrib: self
                .iter()
                .map(|(id, attribute)| (id.get(), attribute.clone()))
                .collect(),
            next_num: self.next_num(),
        }
    }

    /// Rebuilds a pool, requiring ids `0..nextNum` with no gaps and no
    /// pair listed twice.
    pub fn from_snapshot(snapshot: PoolSnapshot) -> Result<Self, AttributeError> {
        if snapshot.num_to_attrib.len() != snapshot.next_num as usize {
            return Err(AttributeError::InvalidSnapshot(format!(
                "{} attributes listed but nextNum is {}",
                snapshot.num_to_attrib.len(),
                snapshot.next_num
            )));
        }

        let mut pool = Self::new();
        for (num, attribute) in snapshot.num_to_attrib {
            if num != pool.next_num() {
                return Err(AttributeError::InvalidSnapshot(format!("attribute id {num} is out of sequence")));
            }
            if pool.ids.contains_key(&attribute) {
                return Err(AttributeError::InvalidSnapshot(format!(
                    "attribute [{:?}, {:?}] is listed twice",
                    attribute.key, attribute.value
                )));
            }
            pool.id_for(&attribute.key, &attribute.value);
        }
        Ok(pool)
    }

    fn next_num(&self) -> u32 {
        self.by_id.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_pairs_share_an_id() {
        let mut pool = AttributePool::new();
        let red = pool.id_for("color", "red");
        assert_eq!(pool.id_for("color", "red"), red);

        let blue = pool.id_for("color", "blue");
        assert_ne!(blue, red);
        assert_eq!((red.get(), blue.get()), (0, 1));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn lookup_never_allocates() {
        let mut pool = AttributePool::new();
        assert_eq!(pool.lookup("bold", "true"), None);
        let id = pool.id_for("bold", "true");
        assert_eq!(pool.lookup("bold", "true"), Some(id));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let mut pool = AttributePool::new();
        let id = pool.id_for("bold", "true");
        assert_eq!(pool.attribute(id).unwrap(), &Attribute::new("bold", "true"));
        assert_eq!(
            pool.attributes(&[id, AttributeId::new(3)]),
            Err(AttributeError::UnknownAttributeId(AttributeId::new(3)))
        );
    }

    #[test]
    fn resolve_sorts_and_deduplicates() {
        let mut pool = AttributePool::new();
        pool.id_for("a", "1");
        pool.id_for("b", "2");
        let ids = pool.resolve(&[Attribute::new("b", "2"), Attribute::new("a", "1"), Attribute::new("b", "2")]);
        assert_eq!(ids, vec![AttributeId::new(0), AttributeId::new(1)]);
    }

    #[test]
    fn snapshot_uses_the_session_pool_format() {
        let mut pool = AttributePool::new();
        pool.id_for("author", "a.1");
        pool.id_for("foreground", "150,150,150");

        let json = serde_json::to_value(pool.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "numToAttrib": { "0": ["author", "a.1"], "1": ["foreground", "150,150,150"] },
                "nextNum": 2
            })
        );

        let restored = AttributePool::from_snapshot(serde_json::from_value(json).unwrap()).unwrap();
        assert_eq!(restored, pool);
    }

    #[test]
    fn snapshot_restore_rejects_gaps_and_duplicates() {
        let gap: PoolSnapshot =
            serde_json::from_str(r#"{"numToAttrib":{"0":["a","1"],"2":["b","2"]},"nextNum":2}"#).unwrap();
        assert!(matches!(AttributePool::from_snapshot(gap), Err(AttributeError::InvalidSnapshot(_))));

        let duplicate: PoolSnapshot =
            serde_json::from_str(r#"{"numToAttrib":{"0":["a","1"],"1":["a","1"]},"nextNum":2}"#).unwrap();
        assert!(matches!(AttributePool::from_snapshot(duplicate), Err(AttributeError::InvalidSnapshot(_))));

        let short: PoolSnapshot = serde_json::from_str(r#"{"numToAttrib":{},"nextNum":1}"#).unwrap();
        assert!(matches!(AttributePool::from_snapshot(short), Err(AttributeError::InvalidSnapshot(_))));
    }
}
