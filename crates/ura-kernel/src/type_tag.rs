//! Runtime type tags and the explicit supertype table.
//!
//! Payloads are not introspected. Every registrable payload variant carries
//! a [`TypeTag`], and the integrator declares which tags are subtypes of
//! which in a [`TypeHierarchy`]. Subtype dispatch in the content store
//! consults only this table.

use crate::error::Problem;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A runtime type tag, conventionally a fully qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared subtype relation between type tags.
///
/// The relation is reflexive and transitive; the declared edges must be
/// acyclic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHierarchy {
    /// Direct supertypes of each tag.
    supertypes: BTreeMap<TypeTag, BTreeSet<TypeTag>>,
}

impl TypeHierarchy {
    /// The flat hierarchy: every tag is only a subtype of itself.
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn builder() -> TypeHierarchyBuilder {
        TypeHierarchyBuilder::default()
    }

    pub fn direct_supertypes(&self, tag: &TypeTag) -> impl Iterator<Item = &TypeTag> {
        self.supertypes.get(tag).into_iter().flatten()
    }

    /// `sub` is `sup` or a (transitive) declared subtype of it.
    pub fn is_subtype(&self, sub: &TypeTag, sup: &TypeTag) -> bool {
        if sub == sup {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut pending = vec![sub];
        while let Some(tag) = pending.pop() {
            for parent in self.direct_supertypes(tag) {
                if parent == sup {
                    return true;
                }
                if seen.insert(parent) {
                    pending.push(parent);
                }
            }
        }
        false
    }

    /// Length of the longest declared supertype chain above `tag`.
    pub fn depth(&self, tag: &TypeTag) -> usize {
        self.direct_supertypes(tag)
            .map(|parent| 1 + self.depth(parent))
            .max()
            .unwrap_or(0)
    }

    /// Total specificity order: more derived tags first.
    ///
    /// A strict subtype is always deeper than its supertypes, so it sorts
    /// before them. Tags of equal depth fall back to name order.
    pub fn compare_specificity(&self, a: &TypeTag, b: &TypeTag) -> Ordering {
        self.depth(b)
            .cmp(&self.depth(a))
            .then_with(|| a.name().cmp(b.name()))
    }
}

/// Collects subtype declarations and checks them for cycles.
#[derive(Debug, Default)]
pub struct TypeHierarchyBuilder {
    supertypes: BTreeMap<TypeTag, BTreeSet<TypeTag>>,
}

impl TypeHierarchyBuilder {
    /// Declare `sub` a direct subtype of `sup`.
    pub fn declare(mut self, sub: TypeTag, sup: TypeTag) -> Self {
        self.supertypes.entry(sub).or_default().insert(sup);
        self
    }

    pub fn build(self) -> Result<TypeHierarchy, Problem> {
        let hierarchy = TypeHierarchy {
            supertypes: self.supertypes,
        };
        for (sub, parents) in &hierarchy.supertypes {
            for parent in parents {
                if hierarchy.is_subtype(parent, sub) {
                    return Err(Problem::InvalidHierarchy {
                        message: format!("`{sub}` and `{parent}` are subtypes of each other"),
                    });
                }
            }
        }
        Ok(hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: TypeTag = TypeTag::from_static("shapes::Base");
    const DERIVED_A: TypeTag = TypeTag::from_static("shapes::DerivedA");
    const DERIVED_B: TypeTag = TypeTag::from_static("shapes::DerivedB");
    const LEAF: TypeTag = TypeTag::from_static("shapes::Leaf");

    fn hierarchy() -> TypeHierarchy {
        TypeHierarchy::builder()
            .declare(DERIVED_A, BASE)
            .declare(DERIVED_B, BASE)
            .declare(LEAF, DERIVED_A)
            .build()
            .unwrap()
    }

    #[test]
    fn subtype_is_reflexive_and_transitive() {
        let h = hierarchy();
        assert!(h.is_subtype(&BASE, &BASE));
        assert!(h.is_subtype(&DERIVED_A, &BASE));
        assert!(h.is_subtype(&LEAF, &BASE));
        assert!(!h.is_subtype(&BASE, &DERIVED_A));
        assert!(!h.is_subtype(&DERIVED_B, &DERIVED_A));
    }

    #[test]
    fn specificity_puts_derived_first() {
        let h = hierarchy();
        let mut tags = vec![BASE, DERIVED_B, LEAF, DERIVED_A];
        tags.sort_by(|a, b| h.compare_specificity(a, b));
        assert_eq!(tags, vec![LEAF, DERIVED_A, DERIVED_B, BASE]);
    }

    #[test]
    fn cycles_are_rejected() {
        let result = TypeHierarchy::builder()
            .declare(DERIVED_A, BASE)
            .declare(BASE, DERIVED_A)
            .build();
        assert!(matches!(result, Err(Problem::InvalidHierarchy { .. })));
    }
}
