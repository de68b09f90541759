//! Layering one resolution context over another.
//!
//! [`over`] answers operator lookups from the primary context first. When
//! the primary has no resolver, the lookup is retried against the secondary
//! context in translated form: the current value is mapped forward, the
//! operator and argument are rewritten, results are mapped back and the
//! secondary's problems are translated. Resolution against the composed
//! context starts from the primary root.

use crate::bx::Bx;
use std::sync::Arc;
use tracing::debug;
use ura_kernel::{Outcome, Problem, ResolutionContext, Resolver, SharedResolver, Uri};

type OpFn = dyn Fn(&str) -> String + Send + Sync;
type ArgumentFn = dyn Fn(&Uri) -> Uri + Send + Sync;
type ProblemFn = dyn Fn(Problem) -> Problem + Send + Sync;

/// How values, operators, arguments and problems cross from the primary
/// space `V1` to the secondary space `V2`.
pub struct Translation<V1, V2> {
    op: Arc<OpFn>,
    argument: Arc<ArgumentFn>,
    result: Arc<dyn Bx<V1, V2>>,
    problem: Arc<ProblemFn>,
}

impl<V1, V2> Clone for Translation<V1, V2> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
            argument: Arc::clone(&self.argument),
            result: Arc::clone(&self.result),
            problem: Arc::clone(&self.problem),
        }
    }
}

impl<V1, V2> Translation<V1, V2> {
    /// Operators, arguments and problems pass through unchanged.
    pub fn new(result: impl Bx<V1, V2> + 'static) -> Self {
        Self {
            op: Arc::new(str::to_string),
            argument: Arc::new(Uri::clone),
            result: Arc::new(result),
            problem: Arc::new(|problem: Problem| problem),
        }
    }

    pub fn with_op(mut self, op: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.op = Arc::new(op);
        self
    }

    pub fn with_argument(mut self, argument: impl Fn(&Uri) -> Uri + Send + Sync + 'static) -> Self {
        self.argument = Arc::new(argument);
        self
    }

    pub fn with_problem(
        mut self,
        problem: impl Fn(Problem) -> Problem + Send + Sync + 'static,
    ) -> Self {
        self.problem = Arc::new(problem);
        self
    }
}

/// The context built by [`over`].
pub struct Composed<A, B, V1, V2> {
    primary: A,
    secondary: B,
    translation: Translation<V1, V2>,
}

/// Compose `primary` over `secondary`.
pub fn over<A, B, V1, V2>(
    primary: A,
    secondary: B,
    translation: Translation<V1, V2>,
) -> Composed<A, B, V1, V2>
where
    A: ResolutionContext<V1>,
    B: ResolutionContext<V2>,
{
    Composed {
        primary,
        secondary,
        translation,
    }
}

impl<A, B, V1, V2> Composed<A, B, V1, V2> {
    pub fn primary(&self) -> &A {
        &self.primary
    }

    pub fn secondary(&self) -> &B {
        &self.secondary
    }
}

impl<A, B, V1, V2> ResolutionContext<V1> for Composed<A, B, V1, V2>
where
    A: ResolutionContext<V1>,
    B: ResolutionContext<V2>,
    V1: Clone + 'static,
    V2: 'static,
{
    fn root(&self) -> &V1 {
        self.primary.root()
    }

    fn operation(&self, context: &V1, op: &str) -> Outcome<SharedResolver<V1>, Problem> {
        self.primary.operation(context, op).chain_failure(|primary_problem| {
            let translated = (self.translation.op)(op);
            debug!(op, translated = %translated, %primary_problem, "falling back to secondary context");
            let forwarded = self.translation.result.forward(context.clone());
            self.secondary
                .operation(&forwarded, &translated)
                .map_success(|inner| {
                    let resolver: SharedResolver<V1> = Arc::new(Translated {
                        inner,
                        translation: self.translation.clone(),
                    });
                    resolver
                })
                .map_failure(|problem| (self.translation.problem)(problem))
        })
    }

    fn max_chain_length(&self) -> Option<usize> {
        self.primary.max_chain_length()
    }
}

/// A secondary resolver seen from the primary space.
struct Translated<V1, V2> {
    inner: SharedResolver<V2>,
    translation: Translation<V1, V2>,
}

impl<V1: Clone, V2> Resolver<V1> for Translated<V1, V2> {
    fn resolve(&self, context: &V1, argument: &Uri) -> Outcome<V1, Problem> {
        let forwarded = self.translation.result.forward(context.clone());
        let argument = (self.translation.argument)(argument);
        self.inner
            .resolve(&forwarded, &argument)
            .map_success(|value| self.translation.result.backward(value))
            .map_failure(|problem| (self.translation.problem)(problem))
    }
}
