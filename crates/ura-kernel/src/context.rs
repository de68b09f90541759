//! Resolvers and resolution contexts.
//!
//! A [`ResolutionContext`] owns a root value and decides, for every step of
//! a [`NavigationChain`], which [`Resolver`] turns the current value into
//! the next one. Resolution is strictly sequential: the first failing step
//! ends it, and intermediate values are dropped.

use crate::config::ResolutionConfig;
use crate::error::{OperationScope, Problem};
use crate::nav::{NavigationChain, Step};
use crate::outcome::{Failure, Outcome, Success};
use crate::uri::Uri;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Maps a context value and an argument to the next context value.
pub trait Resolver<V>: Send + Sync {
    fn resolve(&self, context: &V, argument: &Uri) -> Outcome<V, Problem>;
}

impl<V, F> Resolver<V> for F
where
    F: Fn(&V, &Uri) -> Outcome<V, Problem> + Send + Sync,
{
    fn resolve(&self, context: &V, argument: &Uri) -> Outcome<V, Problem> {
        self(context, argument)
    }
}

pub type SharedResolver<V> = Arc<dyn Resolver<V>>;

/// Operator lookup plus the driver that walks a chain.
pub trait ResolutionContext<V> {
    /// The value the first step resolves against.
    fn root(&self) -> &V;

    /// The resolver for `op` given the current value.
    fn operation(&self, context: &V, op: &str) -> Outcome<SharedResolver<V>, Problem>;

    /// Chains with more steps are refused before any step runs.
    fn max_chain_length(&self) -> Option<usize> {
        None
    }

    /// Resolve `chain` from the root.
    fn resolve(&self, chain: &NavigationChain) -> Outcome<V, Problem> {
        resolve_chain(self, chain).into()
    }
}

fn resolve_chain<V, C>(context: &C, chain: &NavigationChain) -> Result<V, Problem>
where
    C: ResolutionContext<V> + ?Sized,
{
    let length = chain.len();
    if let Some(limit) = context.max_chain_length() {
        if length > limit {
            return Err(Problem::ChainTooLong { length, limit });
        }
    }
    debug!(chain = %chain.digest(), steps = length, "resolving chain");

    let mut value = apply(context, context.root(), chain.head())?;
    for step in chain.steps().skip(1) {
        value = apply(context, &value, step)?;
    }
    Ok(value)
}

fn apply<V, C>(context: &C, value: &V, step: &Step) -> Result<V, Problem>
where
    C: ResolutionContext<V> + ?Sized,
{
    trace!(op = step.op(), argument = %step.argument(), "resolving step");
    let resolved = context
        .operation(value, step.op())
        .chain_success(|resolver| resolver.resolve(value, step.argument()))
        .into_result();
    if let Err(problem) = &resolved {
        debug!(op = step.op(), %problem, "step failed");
    }
    resolved
}

/// A context whose operators do not depend on the current value.
pub struct DefaultContext<V> {
    root: V,
    operations: BTreeMap<String, SharedResolver<V>>,
    config: ResolutionConfig,
}

impl<V> DefaultContext<V> {
    pub fn new(root: V) -> Self {
        Self {
            root,
            operations: BTreeMap::new(),
            config: ResolutionConfig::default(),
        }
    }

    /// Register `resolver` under `op`, replacing an earlier one.
    pub fn with_operation(mut self, op: impl Into<String>, resolver: impl Resolver<V> + 'static) -> Self {
        self.operations.insert(op.into(), Arc::new(resolver));
        self
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

impl<V> ResolutionContext<V> for DefaultContext<V> {
    fn root(&self) -> &V {
        &self.root
    }

    fn operation(&self, _context: &V, op: &str) -> Outcome<SharedResolver<V>, Problem> {
        match self.operations.get(op) {
            Some(resolver) => Success(Arc::clone(resolver)),
            None => Failure(Problem::UndefinedOperation {
                op: op.to_string(),
                scope: OperationScope::Any,
            }),
        }
    }

    fn max_chain_length(&self) -> Option<usize> {
        self.config.max_chain_length
    }
}
