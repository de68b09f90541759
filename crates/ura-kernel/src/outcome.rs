//! Dual-channel outcomes.
//!
//! An [`Outcome`] is exactly one of `Success(S)` or `Failure(F)`. It composes
//! in two modes:
//!
//! - **success-chaining** ([`Outcome::chain_success`]): sequence dependent
//!   steps, the first failure is terminal;
//! - **alternative-chaining** ([`Outcome::chain_failure`]): try candidates in
//!   turn, a failure means "not applicable, try the next" and the first
//!   success stops the chain.
//!
//! The four combinators are pairwise duals and never evaluate their argument
//! on the inactive channel.

use serde::{Deserialize, Serialize};

/// Success or failure, with combinators on both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<S, F> {
    Success(S),
    Failure(F),
}

pub use self::Outcome::{Failure, Success};

impl<S, F> Outcome<S, F> {
    /// Transform the success payload.
    pub fn map_success<S2>(self, f: impl FnOnce(S) -> S2) -> Outcome<S2, F> {
        match self {
            Success(s) => Success(f(s)),
            Failure(e) => Failure(e),
        }
    }

    /// Transform the failure payload.
    pub fn map_failure<F2>(self, f: impl FnOnce(F) -> F2) -> Outcome<S, F2> {
        match self {
            Success(s) => Success(s),
            Failure(e) => Failure(f(e)),
        }
    }

    /// Bind on the success channel.
    pub fn chain_success<S2>(self, f: impl FnOnce(S) -> Outcome<S2, F>) -> Outcome<S2, F> {
        match self {
            Success(s) => f(s),
            Failure(e) => Failure(e),
        }
    }

    /// Bind on the failure channel: attempt an alternative.
    pub fn chain_failure<F2>(self, f: impl FnOnce(F) -> Outcome<S, F2>) -> Outcome<S, F2> {
        match self {
            Success(s) => Success(s),
            Failure(e) => f(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Failure(_))
    }

    pub fn success(self) -> Option<S> {
        match self {
            Success(s) => Some(s),
            Failure(_) => None,
        }
    }

    pub fn failure(self) -> Option<F> {
        match self {
            Success(_) => None,
            Failure(e) => Some(e),
        }
    }

    pub fn as_ref(&self) -> Outcome<&S, &F> {
        match self {
            Success(s) => Success(s),
            Failure(e) => Failure(e),
        }
    }

    /// Collapse both channels into one value.
    pub fn fold<T>(self, on_success: impl FnOnce(S) -> T, on_failure: impl FnOnce(F) -> T) -> T {
        match self {
            Success(s) => on_success(s),
            Failure(e) => on_failure(e),
        }
    }

    /// Convert into a `Result` so `?` can be used at the edges.
    pub fn into_result(self) -> Result<S, F> {
        match self {
            Success(s) => Ok(s),
            Failure(e) => Err(e),
        }
    }

    /// Lift an optional value, producing the failure lazily when absent.
    pub fn from_option(value: Option<S>, on_none: impl FnOnce() -> F) -> Self {
        match value {
            Some(s) => Success(s),
            None => Failure(on_none()),
        }
    }
}

impl<S, F> Outcome<Outcome<S, F>, F> {
    pub fn flatten(self) -> Outcome<S, F> {
        self.chain_success(|inner| inner)
    }
}

impl<S, F> From<Result<S, F>> for Outcome<S, F> {
    fn from(result: Result<S, F>) -> Self {
        match result {
            Ok(s) => Success(s),
            Err(e) => Failure(e),
        }
    }
}

impl<S, F> From<Outcome<S, F>> for Result<S, F> {
    fn from(outcome: Outcome<S, F>) -> Self {
        outcome.into_result()
    }
}

/// Try each candidate in order until one succeeds.
///
/// Candidates are evaluated lazily; the failures of rejected candidates are
/// collected and returned if none succeeds.
pub fn first_success<S, F, I>(candidates: I) -> Outcome<S, Vec<F>>
where
    I: IntoIterator,
    I::Item: FnOnce() -> Outcome<S, F>,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        match candidate() {
            Success(s) => return Success(s),
            Failure(e) => failures.push(e),
        }
    }
    Failure(failures)
}
