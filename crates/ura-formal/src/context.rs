//! Formal contexts: operator tables chosen by the shape of the store.

use crate::handler::HandlerSet;
use crate::resolver::{FormalNestedResolver, FormalProvider, FormalRootResolver};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;
use ura_kernel::{
    ContentStore, Failure, OperationScope, Outcome, Payload, Problem, ResolutionConfig,
    ResolutionContext, SharedResolver, Success,
};

type OperatorTable<P> = BTreeMap<String, SharedResolver<ContentStore<P>>>;

/// A resolution context over content stores.
///
/// Operators are looked up in the root table while the current store is
/// empty, and in the nested table otherwise.
pub struct FormalContext<P> {
    global: ContentStore<P>,
    root: OperatorTable<P>,
    nested: OperatorTable<P>,
    config: ResolutionConfig,
}

impl<P: Payload> FormalContext<P> {
    pub fn builder() -> FormalContextBuilder<P> {
        FormalContextBuilder::new()
    }

    pub fn root_operations(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn nested_operations(&self) -> impl Iterator<Item = &str> {
        self.nested.keys().map(String::as_str)
    }
}

impl<P: Payload> ResolutionContext<ContentStore<P>> for FormalContext<P> {
    fn root(&self) -> &ContentStore<P> {
        &self.global
    }

    fn operation(
        &self,
        context: &ContentStore<P>,
        op: &str,
    ) -> Outcome<SharedResolver<ContentStore<P>>, Problem> {
        let (table, scope) = if context.is_empty() {
            (&self.root, OperationScope::Root)
        } else {
            (&self.nested, OperationScope::Nested)
        };
        match table.get(op) {
            Some(resolver) => Success(Arc::clone(resolver)),
            None => {
                debug!(op, %scope, "undefined operation");
                Failure(Problem::UndefinedOperation {
                    op: op.to_string(),
                    scope,
                })
            }
        }
    }

    fn max_chain_length(&self) -> Option<usize> {
        self.config.max_chain_length
    }
}

/// Collects root providers and nested handler sets into a [`FormalContext`].
pub struct FormalContextBuilder<P> {
    root: OperatorTable<P>,
    nested: OperatorTable<P>,
    config: ResolutionConfig,
    problem: Option<Problem>,
}

impl<P: Payload> Default for FormalContextBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> FormalContextBuilder<P> {
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
            nested: BTreeMap::new(),
            config: ResolutionConfig::default(),
            problem: None,
        }
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle the root operators `ops` with `provider`.
    pub fn root<C, I, S>(mut self, ops: I, config: C, provider: FormalProvider<C, P>) -> Self
    where
        C: Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ops: BTreeSet<String> = ops.into_iter().map(Into::into).collect();
        let resolver: SharedResolver<ContentStore<P>> = Arc::new(FormalRootResolver::new(
            Arc::new(config),
            ops.clone(),
            provider,
        ));
        self.insert(OperationScope::Root, ops, resolver);
        self
    }

    /// Handle the nested operators `ops` with `handlers`.
    pub fn nested<C, I, S>(mut self, ops: I, config: C, handlers: HandlerSet<C, P>) -> Self
    where
        C: Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handlers = match handlers.into_handlers() {
            Ok(handlers) => handlers,
            Err(problem) => {
                self.problem.get_or_insert(problem);
                return self;
            }
        };
        let ops: BTreeSet<String> = ops.into_iter().map(Into::into).collect();
        let resolver: SharedResolver<ContentStore<P>> = Arc::new(FormalNestedResolver::new(
            Arc::new(config),
            ops.clone(),
            handlers,
        ));
        self.insert(OperationScope::Nested, ops, resolver);
        self
    }

    fn insert(
        &mut self,
        scope: OperationScope,
        ops: BTreeSet<String>,
        resolver: SharedResolver<ContentStore<P>>,
    ) {
        let table = match scope {
            OperationScope::Nested => &mut self.nested,
            _ => &mut self.root,
        };
        for op in ops {
            if table.contains_key(&op) {
                self.problem.get_or_insert(Problem::DuplicateRegistration {
                    key: format!("{scope} operation `{op}`"),
                });
                continue;
            }
            table.insert(op, Arc::clone(&resolver));
        }
    }

    /// Build over the empty store.
    pub fn build(self) -> Result<FormalContext<P>, Problem> {
        self.build_with(ContentStore::empty())
    }

    /// Build over an explicit global store.
    pub fn build_with(self, global: ContentStore<P>) -> Result<FormalContext<P>, Problem> {
        if let Some(problem) = self.problem {
            return Err(problem);
        }
        Ok(FormalContext {
            global,
            root: self.root,
            nested: self.nested,
            config: self.config,
        })
    }
}
