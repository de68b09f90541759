//! Media types paired with runtime type tags.
//!
//! A [`TypedMediaType`] is the dispatch key of a content store. Equality is
//! structural; unification additionally accepts wildcards, compatible
//! parameters and subtypes.

use crate::error::Problem;
use crate::media_type::MediaType;
use crate::type_tag::{TypeHierarchy, TypeTag};
use serde::{Deserialize, Serialize};
use std::fmt;

const NOTHING_TAG: TypeTag = TypeTag::from_static("!nothing");

/// A media type with the runtime type of the values it is backed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedMediaType {
    mime: MediaType,
    type_tag: TypeTag,
}

impl TypedMediaType {
    pub fn new(mime: MediaType, type_tag: TypeTag) -> Self {
        Self { mime, type_tag }
    }

    /// The sentinel reported by probes that found nothing.
    pub fn nothing() -> Self {
        Self {
            mime: MediaType::known("nothing", "nothing"),
            type_tag: NOTHING_TAG,
        }
    }

    pub fn is_nothing(&self) -> bool {
        self.type_tag == NOTHING_TAG
    }

    pub fn mime(&self) -> &MediaType {
        &self.mime
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// `self` as a request accepts `other` as an offer.
    ///
    /// Requires media type unification and that `other`'s runtime type is a
    /// subtype of (or equal to) `self`'s.
    pub fn unifies(&self, other: &Self, hierarchy: &TypeHierarchy) -> bool {
        !self.is_nothing()
            && !other.is_nothing()
            && self.mime.unifies(&other.mime)
            && hierarchy.is_subtype(&other.type_tag, &self.type_tag)
    }

    /// The unified key: wildcards resolved, parameters intersected and the
    /// more specific runtime type kept.
    pub fn unify(&self, other: &Self, hierarchy: &TypeHierarchy) -> Result<Self, Problem> {
        if !self.unifies(other, hierarchy) {
            return Err(Problem::UnificationMismatch {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        Ok(Self {
            mime: self.mime.unify(&other.mime)?,
            type_tag: other.type_tag.clone(),
        })
    }
}

impl fmt::Display for TypedMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.mime, self.type_tag)
    }
}
