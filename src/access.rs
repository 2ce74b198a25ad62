//! Field access strategies
//!
//! One capability, two interchangeable implementations with identical
//! observable behavior:
//! - `Scan`: walk the type's accessor table on every call
//! - `Indexed`: build a name-to-slot index per type once, then hash
//!
//! Call sites depend only on `FieldAccessor`; the strategy is selected at
//! configuration time.

use crate::meta::Entity;
use crate::value::FieldValue;
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Field access strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Linear walk of the accessor table per call
    #[default]
    Scan,
    /// Cached name-to-slot index per type
    Indexed,
}

/// Reads and writes named fields of mapped instances.
pub struct FieldAccessor {
    mode: AccessMode,
    index: RwLock<HashMap<TypeId, Arc<HashMap<&'static str, usize>>>>,
}

impl FieldAccessor {
    pub fn new(mode: AccessMode) -> Self {
        Self {
            mode,
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Read a field by its logical name
    pub fn get<E: Entity>(&self, instance: &E, field: &str) -> Result<FieldValue> {
        let slot = self.lookup::<E>(field)?;
        (E::accessors()[slot].get)(instance)
    }

    /// Write a field by its logical name
    pub fn set<E: Entity>(&self, instance: &mut E, field: &str, value: FieldValue) -> Result<()> {
        let slot = self.lookup::<E>(field)?;
        (E::accessors()[slot].set)(instance, value)
    }

    /// Pre-build the index for a type so first use pays no lookup cost.
    /// A no-op under the scan strategy.
    pub fn register<E: Entity>(&self) {
        if self.mode == AccessMode::Indexed {
            self.index_for::<E>();
        }
    }

    fn lookup<E: Entity>(&self, field: &str) -> Result<usize> {
        let slot = match self.mode {
            AccessMode::Scan => E::accessors().iter().position(|f| f.name == field),
            AccessMode::Indexed => self.index_for::<E>().get(field).copied(),
        };
        slot.ok_or_else(|| {
            Error::Configuration(format!(
                "{} has no field named {}",
                E::entity_name(),
                field
            ))
        })
    }

    fn index_for<E: Entity>(&self) -> Arc<HashMap<&'static str, usize>> {
        let key = TypeId::of::<E>();

        if let Some(index) = self
            .index
            .read()
            .expect("accessor index lock poisoned")
            .get(&key)
        {
            return index.clone();
        }

        let built: Arc<HashMap<&'static str, usize>> = Arc::new(
            E::accessors()
                .iter()
                .enumerate()
                .map(|(slot, entry)| (entry.name, slot))
                .collect(),
        );

        let mut cache = self.index.write().expect("accessor index lock poisoned");
        cache.entry(key).or_insert(built).clone()
    }
}

impl Default for FieldAccessor {
    fn default() -> Self {
        Self::new(AccessMode::Scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::fixtures::User;

    fn sample_user() -> User {
        User {
            clan_tag: "RAID".to_string(),
            membership_status: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_strategies_agree() {
        let user = sample_user();

        for mode in [AccessMode::Scan, AccessMode::Indexed] {
            let accessor = FieldAccessor::new(mode);
            assert_eq!(
                accessor.get(&user, "clan_tag").unwrap(),
                FieldValue::Text("RAID".to_string())
            );
            assert_eq!(
                accessor.get(&user, "membership_status").unwrap(),
                FieldValue::I32(4)
            );
        }
    }

    #[test]
    fn test_set_roundtrip() {
        for mode in [AccessMode::Scan, AccessMode::Indexed] {
            let accessor = FieldAccessor::new(mode);
            let mut user = User::default();

            accessor
                .set(&mut user, "clan_tag", FieldValue::from("NEW"))
                .unwrap();
            assert_eq!(user.clan_tag, "NEW");
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        for mode in [AccessMode::Scan, AccessMode::Indexed] {
            let accessor = FieldAccessor::new(mode);
            let user = sample_user();
            assert!(matches!(
                accessor.get(&user, "missing"),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_type_mismatch_on_set() {
        let accessor = FieldAccessor::default();
        let mut user = User::default();
        let result = accessor.set(&mut user, "membership_status", FieldValue::from("text"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
