//! Durable entity identity and naming.
//!
//! Every stored entity carries an [`Identity`]: a name that is unique within
//! its type's pack, plus the type tag. A [`Reference`] is the same pair used as
//! a handle: it stays meaningful across swap-erase, undo and redo, where an
//! [`EntityId`] or a row index does not.
//!
//! Names are requested through [`EntityName`]. A unique name is used verbatim.
//! A generic name is a base string that gets a generated suffix, see
//! [`NameGenerator`].

use std::fmt;

use rand::Rng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::schema::TypeTag;

// ---------------------------------------------------------------------------
// Identity / Reference
// ---------------------------------------------------------------------------

/// The durable `{name, type}` pair stored with every entity row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub type_tag: TypeTag,
}

impl Identity {
    /// A [`Reference`] addressing this entity.
    pub fn reference(&self) -> Reference {
        Reference {
            type_tag: self.type_tag,
            name: self.name.clone(),
        }
    }
}

/// A durable handle `{type, name}` that addresses an entity independent of
/// where it is currently stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub type_tag: TypeTag,
    pub name: String,
}

impl Reference {
    pub fn new(type_tag: TypeTag, name: impl Into<String>) -> Self {
        Self {
            type_tag,
            name: name.into(),
        }
    }

    /// The same entity type under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.type_tag, name)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:'{}'", self.type_tag, self.name)
    }
}

// ---------------------------------------------------------------------------
// EntityName
// ---------------------------------------------------------------------------

/// A requested name for a new or renamed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityName {
    /// Used verbatim; fails if the name is already taken.
    Unique(String),
    /// Base string that receives a generated suffix.
    Generic(String),
}

impl EntityName {
    pub fn unique(name: impl Into<String>) -> Self {
        Self::Unique(name.into())
    }

    pub fn generic(base: impl Into<String>) -> Self {
        Self::Generic(base.into())
    }

    /// The requested name or base string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unique(name) | Self::Generic(name) => name,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic(_))
    }
}

impl From<&str> for EntityName {
    fn from(name: &str) -> Self {
        Self::Unique(name.to_owned())
    }
}

impl From<String> for EntityName {
    fn from(name: String) -> Self {
        Self::Unique(name)
    }
}

// ---------------------------------------------------------------------------
// NameGenerator
// ---------------------------------------------------------------------------

/// Produces candidate suffixes for a generic name.
///
/// Candidates are tried in order: the pack's incrementing counter, a suffix
/// derived from the handle the entity will occupy, then `random_attempts`
/// random suffixes. The first candidate accepted by `is_free` wins.
pub(crate) struct NameGenerator<'a> {
    pub separator: &'a str,
    pub random_attempts: u32,
    pub rng: &'a mut Pcg64,
}

impl NameGenerator<'_> {
    pub fn generate(
        &mut self,
        base: &str,
        counter: &mut u64,
        object: EntityId,
        is_free: impl Fn(&str) -> bool,
    ) -> Option<String> {
        *counter += 1;
        let candidate = format!("{base}{}{}", self.separator, counter);
        if is_free(&candidate) {
            return Some(candidate);
        }

        let candidate = format!("{base}{}{:x}", self.separator, object.to_raw());
        if is_free(&candidate) {
            return Some(candidate);
        }

        for attempt in 0..self.random_attempts {
            let candidate = format!("{base}{}{:08x}", self.separator, self.rng.gen::<u32>());
            if is_free(&candidate) {
                return Some(candidate);
            }
            tracing::trace!(base, attempt, "random name suffix collided");
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn counter_suffix_first() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut generator = NameGenerator {
            separator: "_",
            random_attempts: 4,
            rng: &mut rng,
        };
        let mut counter = 0;
        let name = generator
            .generate("Foo", &mut counter, EntityId::new(5, 0), |_| true)
            .unwrap();
        assert_eq!(name, "Foo_1");
        assert_eq!(counter, 1);
    }

    #[test]
    fn falls_back_to_object_then_random() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut generator = NameGenerator {
            separator: "_",
            random_attempts: 4,
            rng: &mut rng,
        };
        let object = EntityId::new(10, 0);
        let mut counter = 0;

        let name = generator
            .generate("Foo", &mut counter, object, |c| c != "Foo_1")
            .unwrap();
        assert_eq!(name, "Foo_a");

        let taken: HashSet<&str> = ["Foo_2", "Foo_a"].into_iter().collect();
        let name = generator
            .generate("Foo", &mut counter, object, |c| !taken.contains(c))
            .unwrap();
        assert!(name.starts_with("Foo_"));
        assert_eq!(name.len(), "Foo_".len() + 8);
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut rng = Pcg64::seed_from_u64(7);
        let mut generator = NameGenerator {
            separator: "-",
            random_attempts: 3,
            rng: &mut rng,
        };
        let mut counter = 0;
        assert!(generator
            .generate("Foo", &mut counter, EntityId::new(0, 0), |_| false)
            .is_none());
    }

    #[test]
    fn reference_display_and_rename() {
        let reference = Reference::new(TypeTag(2), "notes");
        assert_eq!(reference.to_string(), "#2:'notes'");
        assert_eq!(reference.renamed("drafts").name, "drafts");
        assert_eq!(reference.renamed("drafts").type_tag, TypeTag(2));
    }

    #[test]
    fn entity_name_conversions() {
        assert_eq!(EntityName::from("a"), EntityName::Unique("a".to_owned()));
        assert!(EntityName::generic("b").is_generic());
        assert_eq!(EntityName::generic("b").as_str(), "b");
    }
}
