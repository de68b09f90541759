//! Problems arising during chain construction and resolution.
//!
//! Every failure in the kernel is a value: it travels through the failure
//! channel of [`Outcome`](crate::outcome::Outcome) or a `Result` and is never
//! swallowed on the way up.

use crate::typed::TypedMediaType;
use serde::Serialize;

/// Which operator table an operation lookup consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationScope {
    /// The lookup ran against an empty (root) context.
    Root,
    /// The lookup ran against a populated context.
    Nested,
    /// The lookup does not distinguish context shapes.
    Any,
}

impl std::fmt::Display for OperationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Nested => write!(f, "nested"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// A problem in the resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// No handler is registered for the operator in this context shape.
    #[error("undefined {scope} operation `{op}`")]
    UndefinedOperation { op: String, scope: OperationScope },

    /// None of the required inputs is present or derivable in the store.
    #[error("unsatisfied requirements: none of [{}] available", render_list(.wanted))]
    UnsatisfiedRequirements { wanted: Vec<TypedMediaType> },

    /// A string failed to parse against its grammar.
    #[error("cannot parse `{input}` as {expected}")]
    Parse { input: String, expected: String },

    /// `unify` was called on operands that do not unify.
    #[error("`{left}` does not unify with `{right}`")]
    UnificationMismatch { left: String, right: String },

    /// A flat token list did not have odd length >= 1.
    #[error("expected 1, 3, 5, ... tokens, got {count}")]
    ArgumentCount { count: usize },

    /// A key was registered twice where duplicates are rejected.
    #[error("duplicate registration of `{key}`")]
    DuplicateRegistration { key: String },

    /// A produced payload did not carry the variant its key declared.
    #[error("payload mismatch: expected `{expected}`, got `{actual}`")]
    PayloadMismatch { expected: String, actual: String },

    /// The supertype table is not a partial order.
    #[error("invalid type hierarchy: {message}")]
    InvalidHierarchy { message: String },

    /// The chain exceeds the configured length bound.
    #[error("chain of {length} steps exceeds the limit of {limit}")]
    ChainTooLong { length: usize, limit: usize },

    /// A resolver refused its input for its own reasons.
    #[error("{resolver}: {message}")]
    Rejected { resolver: String, message: String },
}

impl Problem {
    /// Shorthand for a resolver-specific rejection.
    pub fn rejected(resolver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            resolver: resolver.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

fn render_list(items: &[TypedMediaType]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from loading a [`KernelConfig`](crate::config::KernelConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid toml: {source}")]
    ParseToml {
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_operation_names_scope() {
        let problem = Problem::UndefinedOperation {
            op: "select".into(),
            scope: OperationScope::Nested,
        };
        insta::assert_snapshot!(problem.to_string(), @"undefined nested operation `select`");
    }

    #[test]
    fn problems_serialize_with_kind_tag() {
        let problem = Problem::ArgumentCount { count: 2 };
        insta::assert_json_snapshot!(problem, @r#"
        {
          "kind": "argument_count",
          "count": 2
        }
        "#);
    }
}
