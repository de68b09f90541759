//! Tagged payloads.
//!
//! Stores hold payloads of one closed union type `P`. Each variant reports
//! its [`TypeTag`], and consumers extract concrete Rust types through a
//! checked variant match ([`FromPayload`]). A failed match is a
//! [`Problem::PayloadMismatch`](crate::error::Problem::PayloadMismatch),
//! never a cast.

use crate::type_tag::TypeTag;
use serde::{Deserialize, Serialize};

/// A closed union of payload variants, each identified by a tag.
pub trait Payload: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// The tag of the variant this value holds.
    fn type_tag(&self) -> TypeTag;
}

/// Extraction of a concrete type from a payload union.
///
/// Implementations for a supertype should accept every variant whose tag is
/// declared a subtype of it, so that subtype dispatch can hand them a more
/// derived value.
pub trait FromPayload<P>: Sized {
    /// The tag requests for this type are made with.
    fn type_tag() -> TypeTag;

    fn from_payload(payload: P) -> Option<Self>;
}

pub mod tags {
    use crate::type_tag::TypeTag;

    pub const TEXT: TypeTag = TypeTag::from_static("text");
    pub const INTEGER: TypeTag = TypeTag::from_static("integer");
    pub const FLOAT: TypeTag = TypeTag::from_static("float");
    pub const BOOLEAN: TypeTag = TypeTag::from_static("boolean");
    pub const BYTES: TypeTag = TypeTag::from_static("bytes");
    pub const JSON: TypeTag = TypeTag::from_static("json");
}

/// The stock payload union for stores without a custom hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Payload for Value {
    fn type_tag(&self) -> TypeTag {
        match self {
            Self::Text(_) => tags::TEXT,
            Self::Integer(_) => tags::INTEGER,
            Self::Float(_) => tags::FLOAT,
            Self::Boolean(_) => tags::BOOLEAN,
            Self::Bytes(_) => tags::BYTES,
            Self::Json(_) => tags::JSON,
        }
    }
}

macro_rules! value_variant {
    ($ty:ty, $variant:ident, $tag:expr) => {
        impl FromPayload<Value> for $ty {
            fn type_tag() -> TypeTag {
                $tag
            }

            fn from_payload(payload: Value) -> Option<Self> {
                match payload {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(inner: $ty) -> Self {
                Value::$variant(inner)
            }
        }
    };
}

value_variant!(String, Text, tags::TEXT);
value_variant!(i64, Integer, tags::INTEGER);
value_variant!(f64, Float, tags::FLOAT);
value_variant!(bool, Boolean, tags::BOOLEAN);
value_variant!(Vec<u8>, Bytes, tags::BYTES);
value_variant!(serde_json::Value, Json, tags::JSON);

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}
