//! Root and nested formal resolvers.
//!
//! A root resolver turns the argument of the first step into a store through
//! a [`FormalProvider`]. A nested resolver derives a new store from the
//! current one through its [`FormalHandler`]s; the derived entries are lazy
//! and read the incoming store only when probed.

use crate::handler::FormalHandler;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use ura_kernel::{
    ContentStore, DuplicatePolicy, Failure, Outcome, Payload, Problem, Resolver, Uri,
};

type ProvideFn<C, P> = dyn Fn(&C, &Uri) -> Outcome<ContentStore<P>, Problem> + Send + Sync;

/// Provides the initial store of a chain from a URI.
pub struct FormalProvider<C, P> {
    provide: Arc<ProvideFn<C, P>>,
}

impl<C, P> Clone for FormalProvider<C, P> {
    fn clone(&self) -> Self {
        Self {
            provide: Arc::clone(&self.provide),
        }
    }
}

impl<C, P: Payload> FormalProvider<C, P> {
    pub fn new(
        provide: impl Fn(&C, &Uri) -> Outcome<ContentStore<P>, Problem> + Send + Sync + 'static,
    ) -> Self {
        Self {
            provide: Arc::new(provide),
        }
    }

    pub fn provide(&self, config: &C, uri: &Uri) -> Outcome<ContentStore<P>, Problem> {
        (self.provide)(config, uri)
    }
}

/// Resolves root operations; applies only to the empty store.
pub struct FormalRootResolver<C, P> {
    config: Arc<C>,
    ops: BTreeSet<String>,
    provider: FormalProvider<C, P>,
}

impl<C, P: Payload> FormalRootResolver<C, P> {
    pub fn new(config: Arc<C>, ops: BTreeSet<String>, provider: FormalProvider<C, P>) -> Self {
        Self {
            config,
            ops,
            provider,
        }
    }

    pub fn ops(&self) -> &BTreeSet<String> {
        &self.ops
    }
}

impl<C, P> Resolver<ContentStore<P>> for FormalRootResolver<C, P>
where
    C: Send + Sync,
    P: Payload,
{
    fn resolve(&self, context: &ContentStore<P>, argument: &Uri) -> Outcome<ContentStore<P>, Problem> {
        if !context.is_empty() {
            warn!(argument = %argument, "root resolver applied to a populated store");
            return Failure(Problem::rejected(
                "formal root resolver",
                "root operations apply to the empty store only",
            ));
        }
        self.provider.provide(&self.config, argument)
    }
}

/// Resolves nested operations by deriving a store through handlers.
pub struct FormalNestedResolver<C, P> {
    config: Arc<C>,
    ops: BTreeSet<String>,
    handlers: Vec<FormalHandler<C, P>>,
}

impl<C, P: Payload> FormalNestedResolver<C, P> {
    pub fn new(config: Arc<C>, ops: BTreeSet<String>, handlers: Vec<FormalHandler<C, P>>) -> Self {
        Self {
            config,
            ops,
            handlers,
        }
    }

    pub fn ops(&self) -> &BTreeSet<String> {
        &self.ops
    }

    pub fn handlers(&self) -> &[FormalHandler<C, P>] {
        &self.handlers
    }
}

impl<C, P> Resolver<ContentStore<P>> for FormalNestedResolver<C, P>
where
    C: Send + Sync + 'static,
    P: Payload,
{
    fn resolve(&self, context: &ContentStore<P>, argument: &Uri) -> Outcome<ContentStore<P>, Problem> {
        let applicable: Vec<&FormalHandler<C, P>> = self
            .handlers
            .iter()
            .filter(|handler| context.contains(handler.src()))
            .collect();
        if applicable.is_empty() {
            return Failure(Problem::UnsatisfiedRequirements {
                wanted: self.handlers.iter().map(|handler| handler.src().clone()).collect(),
            });
        }
        debug!(
            ops = ?self.ops,
            handlers = applicable.len(),
            argument = %argument,
            "deriving nested store"
        );

        // Handlers sharing a destination: the later one wins.
        let builder = applicable.into_iter().fold(
            ContentStore::builder()
                .with_hierarchy(Arc::clone(context.hierarchy()))
                .with_policy(DuplicatePolicy::Overwrite),
            |builder, handler| {
                let source = context.clone();
                let config = Arc::clone(&self.config);
                let argument = argument.clone();
                let handler = handler.clone();
                builder.register_fallible(handler.dst().clone(), move || {
                    source
                        .with_typed(handler.src(), |payload| {
                            handler.handle(&config, &argument, payload)
                        })
                        .into_outcome()
                        .flatten()
                })
            },
        );
        builder.seal().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ura_kernel::{MediaType, Success, Value};

    fn mt(s: &str) -> MediaType {
        s.parse().unwrap()
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    fn upper() -> FormalNestedResolver<(), Value> {
        FormalNestedResolver::new(
            Arc::new(()),
            BTreeSet::from(["upper".to_string()]),
            vec![FormalHandler::id_via(mt("text/plain"), |_, _, s: String| {
                Success(s.to_uppercase())
            })],
        )
    }

    #[test]
    fn root_resolver_refuses_populated_store() {
        let resolver = FormalRootResolver::new(
            Arc::new(()),
            BTreeSet::from(["mem".to_string()]),
            FormalProvider::new(|_: &(), _: &Uri| Success(ContentStore::<Value>::empty())),
        );
        let populated = ContentStore::builder()
            .put(mt("text/plain"), || "x".to_string())
            .seal()
            .unwrap();
        assert!(matches!(
            resolver.resolve(&populated, &uri("mem:a")),
            Failure(Problem::Rejected { .. })
        ));
        assert!(resolver.resolve(&ContentStore::empty(), &uri("mem:a")).is_success());
    }

    #[test]
    fn nested_resolver_requires_a_source() {
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int"), || 1_i64)
            .seal()
            .unwrap();
        let outcome = upper().resolve(&store, &uri("arg:_"));
        assert!(matches!(
            outcome,
            Failure(Problem::UnsatisfiedRequirements { ref wanted }) if wanted.len() == 1
        ));
    }

    #[test]
    fn nested_resolver_derives_lazily() {
        let store = ContentStore::<Value>::builder()
            .put(mt("text/plain"), || "quiet".to_string())
            .seal()
            .unwrap();
        let derived = upper().resolve(&store, &uri("arg:_")).success().unwrap();
        assert_eq!(derived.len(), 1);
        assert_eq!(
            derived.with(&mt("text/plain"), |s: String| s).into_resolved(),
            Some("QUIET".to_string())
        );
    }
}
