//! Immutable typed content stores.
//!
//! A [`ContentStore`] maps [`TypedMediaType`] keys to lazily evaluated
//! producers. The same media type may be backed by several runtime types
//! (a base type and some of its subtypes, say), each under its own key.
//!
//! ## Lookup
//!
//! A request `(mime, type)` is answered by the first tier that matches:
//!
//! 1. **exact**: a key structurally equal to the request;
//! 2. **subtype**: among the keys with the requested media type, the most
//!    specific runtime type that is a subtype of the requested type;
//! 3. **unification**: among all keys the request unifies with, the one
//!    sharing the most parameters with the request. The response is the
//!    unified key, not the stored one;
//! 4. otherwise nothing, and the consumer is not invoked.
//!
//! Producers are not memoized: every hit re-invokes the producer.

use crate::config::{DuplicatePolicy, StoreConfig};
use crate::error::Problem;
use crate::media_type::MediaType;
use crate::outcome::{Failure, Outcome, Success};
use crate::payload::{FromPayload, Payload};
use crate::type_tag::TypeHierarchy;
use crate::typed::TypedMediaType;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{trace, warn};

/// A zero-argument payload producer.
pub type Producer<P> = Arc<dyn Fn() -> Outcome<P, Problem> + Send + Sync>;

struct Entry<P> {
    key: TypedMediaType,
    producer: Producer<P>,
}

struct Inner<P> {
    entries: Vec<Entry<P>>,
    exact: BTreeMap<TypedMediaType, usize>,
    hierarchy: Arc<TypeHierarchy>,
    /// Entry indices grouped by media type, most specific type first.
    co_associated: OnceLock<BTreeMap<MediaType, Vec<usize>>>,
    /// Entry indices grouped by media type, registration order.
    de_associated: OnceLock<BTreeMap<MediaType, Vec<usize>>>,
}

/// Which lookup tier produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Exact,
    Subtype,
    Unification,
}

struct Hit {
    index: usize,
    response: TypedMediaType,
    tier: Tier,
}

/// Immutable association from typed media types to payload producers.
pub struct ContentStore<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for ContentStore<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for ContentStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field(
                "keys",
                &self.inner.entries.iter().map(|entry| &entry.key).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<P: Payload> Default for ContentStore<P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P: Payload> ContentStore<P> {
    pub fn builder() -> ContentStoreBuilder<P> {
        ContentStoreBuilder::new()
    }

    /// The store without entries, over the flat hierarchy.
    pub fn empty() -> Self {
        ContentStoreBuilder::new().into_store()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &TypedMediaType> {
        self.inner.entries.iter().map(|entry| &entry.key)
    }

    /// Distinct media types, ignoring runtime types.
    pub fn media_types(&self) -> impl Iterator<Item = &MediaType> {
        self.de_associated().keys()
    }

    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.inner.hierarchy
    }

    /// Whether a request would hit, without evaluating any producer.
    pub fn contains(&self, wanted: &TypedMediaType) -> bool {
        matches!(self.lookup(wanted), Ok(Some(_)))
    }

    /// Whether any stored media type unifies with `mime`, whatever its
    /// runtime type.
    pub fn offers(&self, mime: &MediaType) -> bool {
        self.de_associated().keys().any(|stored| mime.unifies(stored))
    }

    /// Probe for `T` under `mime` and apply `block` to the value.
    pub fn with<T, U>(&self, mime: &MediaType, block: impl FnOnce(T) -> U) -> Item<'_, P, U>
    where
        T: FromPayload<P>,
    {
        Item::pending(self).with(mime, block)
    }

    /// Probe with an explicit key and hand `block` the raw payload.
    pub fn with_typed<U>(
        &self,
        wanted: &TypedMediaType,
        block: impl FnOnce(P) -> U,
    ) -> Item<'_, P, U> {
        Item::pending(self).with_typed(wanted, block)
    }

    /// Evaluate every producer once.
    ///
    /// For inspection only; resolution never materializes a store.
    pub fn materialize(&self) -> Result<BTreeMap<TypedMediaType, P>, Problem> {
        self.inner
            .entries
            .iter()
            .map(|entry| {
                let payload = evaluate(entry, &self.inner.hierarchy)?;
                Ok((entry.key.clone(), payload))
            })
            .collect()
    }

    fn co_associated(&self) -> &BTreeMap<MediaType, Vec<usize>> {
        self.inner.co_associated.get_or_init(|| {
            let hierarchy = &self.inner.hierarchy;
            let entries = &self.inner.entries;
            let mut groups = self.de_associated().clone();
            for group in groups.values_mut() {
                // Stable sort: registration order breaks remaining ties.
                group.sort_by(|&a, &b| {
                    hierarchy.compare_specificity(entries[a].key.type_tag(), entries[b].key.type_tag())
                });
            }
            groups
        })
    }

    fn de_associated(&self) -> &BTreeMap<MediaType, Vec<usize>> {
        self.inner.de_associated.get_or_init(|| {
            let mut groups: BTreeMap<MediaType, Vec<usize>> = BTreeMap::new();
            for (index, entry) in self.inner.entries.iter().enumerate() {
                groups.entry(entry.key.mime().clone()).or_default().push(index);
            }
            groups
        })
    }

    fn lookup(&self, wanted: &TypedMediaType) -> Result<Option<Hit>, Problem> {
        if wanted.is_nothing() {
            return Ok(None);
        }
        let entries = &self.inner.entries;
        let hierarchy = &self.inner.hierarchy;

        if let Some(&index) = self.inner.exact.get(wanted) {
            return Ok(Some(Hit {
                index,
                response: wanted.clone(),
                tier: Tier::Exact,
            }));
        }

        let subtype = self.co_associated().get(wanted.mime()).and_then(|group| {
            group
                .iter()
                .copied()
                .find(|&index| hierarchy.is_subtype(entries[index].key.type_tag(), wanted.type_tag()))
        });
        if let Some(index) = subtype {
            return Ok(Some(Hit {
                index,
                response: TypedMediaType::new(
                    wanted.mime().clone(),
                    entries[index].key.type_tag().clone(),
                ),
                tier: Tier::Subtype,
            }));
        }

        let mut best: Option<(usize, UnificationRank<'_>)> = None;
        for (index, entry) in entries.iter().enumerate() {
            if !wanted.unifies(&entry.key, hierarchy) {
                continue;
            }
            let rank = UnificationRank::of(wanted.mime(), entry.key.mime());
            if best.as_ref().is_none_or(|(_, top)| rank > *top) {
                best = Some((index, rank));
            }
        }
        match best {
            Some((index, _)) => Ok(Some(Hit {
                index,
                response: wanted.unify(&entries[index].key, hierarchy)?,
                tier: Tier::Unification,
            })),
            None => Ok(None),
        }
    }

    fn fetch(&self, wanted: &TypedMediaType) -> Result<Option<(TypedMediaType, P)>, Problem> {
        let Some(hit) = self.lookup(wanted)? else {
            trace!(wanted = %wanted, "store miss");
            return Ok(None);
        };
        let entry = &self.inner.entries[hit.index];
        trace!(wanted = %wanted, stored = %entry.key, tier = ?hit.tier, "store hit");
        let payload = evaluate(entry, &self.inner.hierarchy)?;
        Ok(Some((hit.response, payload)))
    }
}

/// Run the producer of `entry`. The payload must carry the key's tag or a
/// declared subtype of it.
fn evaluate<P: Payload>(entry: &Entry<P>, hierarchy: &TypeHierarchy) -> Result<P, Problem> {
    let payload = (entry.producer)().into_result()?;
    let actual = payload.type_tag();
    if !hierarchy.is_subtype(&actual, entry.key.type_tag()) {
        warn!(key = %entry.key, actual = %actual, "producer returned a foreign variant");
        return Err(Problem::PayloadMismatch {
            expected: entry.key.type_tag().to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(payload)
}

/// Ordering of unification candidates; greater is better.
///
/// Most shared parameters with the request, then most parameters overall,
/// then the lexicographically smallest sorted key set.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct UnificationRank<'a> {
    shared: usize,
    total: usize,
    keys: Reverse<Vec<&'a str>>,
}

impl<'a> UnificationRank<'a> {
    fn of(wanted: &MediaType, stored: &'a MediaType) -> Self {
        Self {
            shared: stored.shared_params(wanted),
            total: stored.params().len(),
            keys: Reverse(stored.params().keys().map(String::as_str).collect()),
        }
    }
}

enum Probe<U> {
    Pending,
    Resolved(U),
    Failed(Problem),
}

/// The result of a chain of probes against one store.
///
/// The first probe that hits decides the response type; later probes on a
/// decided item are no-ops.
pub struct Item<'s, P, U> {
    store: &'s ContentStore<P>,
    response: TypedMediaType,
    probe: Probe<U>,
    attempted: Vec<TypedMediaType>,
}

impl<'s, P: Payload, U> Item<'s, P, U> {
    fn pending(store: &'s ContentStore<P>) -> Self {
        Self {
            store,
            response: TypedMediaType::nothing(),
            probe: Probe::Pending,
            attempted: Vec::new(),
        }
    }

    /// Try `T` under `mime` unless an earlier probe already hit.
    pub fn with<T>(self, mime: &MediaType, block: impl FnOnce(T) -> U) -> Self
    where
        T: FromPayload<P>,
    {
        let wanted = TypedMediaType::new(mime.clone(), T::type_tag());
        self.attempt(&wanted, |payload| {
            let actual = payload.type_tag();
            match T::from_payload(payload) {
                Some(value) => Success(block(value)),
                None => Failure(Problem::PayloadMismatch {
                    expected: T::type_tag().to_string(),
                    actual: actual.to_string(),
                }),
            }
        })
    }

    /// Try an explicit key unless an earlier probe already hit.
    pub fn with_typed(self, wanted: &TypedMediaType, block: impl FnOnce(P) -> U) -> Self {
        self.attempt(wanted, |payload| Success(block(payload)))
    }

    fn attempt(
        self,
        wanted: &TypedMediaType,
        block: impl FnOnce(P) -> Outcome<U, Problem>,
    ) -> Self {
        if !matches!(self.probe, Probe::Pending) {
            return self;
        }
        let Self {
            store,
            mut attempted,
            ..
        } = self;
        attempted.push(wanted.clone());
        let (response, probe) = match store.fetch(wanted) {
            Ok(Some((response, payload))) => match block(payload) {
                Success(value) => (response, Probe::Resolved(value)),
                Failure(problem) => (TypedMediaType::nothing(), Probe::Failed(problem)),
            },
            Ok(None) => (TypedMediaType::nothing(), Probe::Pending),
            Err(problem) => (TypedMediaType::nothing(), Probe::Failed(problem)),
        };
        Self {
            store,
            response,
            probe,
            attempted,
        }
    }

    /// The key that answered, or the nothing sentinel.
    pub fn response(&self) -> &TypedMediaType {
        &self.response
    }

    pub fn resolved(&self) -> Option<&U> {
        match &self.probe {
            Probe::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.probe, Probe::Resolved(_))
    }

    pub fn problem(&self) -> Option<&Problem> {
        match &self.probe {
            Probe::Failed(problem) => Some(problem),
            _ => None,
        }
    }

    /// Every key probed so far, in order.
    pub fn attempted(&self) -> &[TypedMediaType] {
        &self.attempted
    }

    pub fn into_resolved(self) -> Option<U> {
        match self.probe {
            Probe::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// Unresolved items become unsatisfied requirements.
    pub fn into_outcome(self) -> Outcome<U, Problem> {
        match self.probe {
            Probe::Resolved(value) => Success(value),
            Probe::Failed(problem) => Failure(problem),
            Probe::Pending => Failure(Problem::UnsatisfiedRequirements {
                wanted: self.attempted,
            }),
        }
    }
}

/// Write-once registration surface for a [`ContentStore`].
pub struct ContentStoreBuilder<P> {
    entries: Vec<Entry<P>>,
    exact: BTreeMap<TypedMediaType, usize>,
    hierarchy: Arc<TypeHierarchy>,
    policy: DuplicatePolicy,
    duplicate: Option<TypedMediaType>,
}

impl<P: Payload> Default for ContentStoreBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> ContentStoreBuilder<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            exact: BTreeMap::new(),
            hierarchy: Arc::new(TypeHierarchy::flat()),
            policy: DuplicatePolicy::default(),
            duplicate: None,
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: Arc<TypeHierarchy>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(self, config: &StoreConfig) -> Self {
        self.with_policy(config.duplicate_policy)
    }

    /// Register a producer that may fail.
    pub fn register_fallible(
        mut self,
        key: TypedMediaType,
        producer: impl Fn() -> Outcome<P, Problem> + Send + Sync + 'static,
    ) -> Self {
        let producer: Producer<P> = Arc::new(producer);
        match self.exact.get(&key) {
            Some(&index) => match self.policy {
                DuplicatePolicy::Overwrite => {
                    warn!(key = %key, "overwriting earlier registration");
                    self.entries[index].producer = producer;
                }
                DuplicatePolicy::Reject => {
                    self.duplicate.get_or_insert(key);
                }
            },
            None => {
                self.exact.insert(key.clone(), self.entries.len());
                self.entries.push(Entry { key, producer });
            }
        }
        self
    }

    pub fn register(
        self,
        key: TypedMediaType,
        producer: impl Fn() -> P + Send + Sync + 'static,
    ) -> Self {
        self.register_fallible(key, move || Success(producer()))
    }

    /// Register under `mime`, taking the runtime type from `T`.
    pub fn put<T>(self, mime: MediaType, producer: impl Fn() -> T + Send + Sync + 'static) -> Self
    where
        T: FromPayload<P> + Into<P>,
    {
        let key = TypedMediaType::new(mime, T::type_tag());
        self.register(key, move || producer().into())
    }

    /// Register a fixed value under `mime`, keyed by the value's own tag.
    pub fn put_value(self, mime: MediaType, value: P) -> Self {
        let key = TypedMediaType::new(mime, value.type_tag());
        self.register(key, move || value.clone())
    }

    /// Seal into an immutable store.
    pub fn seal(self) -> Result<ContentStore<P>, Problem> {
        if let Some(key) = &self.duplicate {
            return Err(Problem::DuplicateRegistration {
                key: key.to_string(),
            });
        }
        Ok(self.into_store())
    }

    fn into_store(self) -> ContentStore<P> {
        ContentStore {
            inner: Arc::new(Inner {
                entries: self.entries,
                exact: self.exact,
                hierarchy: self.hierarchy,
                co_associated: OnceLock::new(),
                de_associated: OnceLock::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Value, tags};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mt(s: &str) -> MediaType {
        s.parse().unwrap()
    }

    #[test]
    fn exact_hit_applies_block() {
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int"), || 100_i64)
            .put(mt("app/string"), || "23400".to_string())
            .seal()
            .unwrap();

        let item = store.with(&mt("app/int"), |i: i64| i + 1);
        assert_eq!(item.resolved(), Some(&101));
        assert_eq!(
            item.response(),
            &TypedMediaType::new(mt("app/int"), tags::INTEGER)
        );
    }

    #[test]
    fn first_successful_probe_decides_response() {
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int"), || 100_i64)
            .put(mt("app/string"), || "23400".to_string())
            .seal()
            .unwrap();

        let first = store
            .with(&mt("app/string"), |s: String| s.parse::<i64>().unwrap() + 1)
            .with(&mt("app/int"), |i: i64| i + 1);
        assert_eq!(first.response().mime(), &mt("app/string"));
        assert_eq!(first.into_resolved(), Some(23401));

        let fallback = store
            .with(&mt("app/float"), |s: String| s.len() as i64)
            .with(&mt("app/int"), |i: i64| i * 20);
        assert_eq!(fallback.response().mime(), &mt("app/int"));
        assert_eq!(fallback.into_resolved(), Some(2000));
    }

    #[test]
    fn unification_prefers_parameter_share() {
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int; space=positive"), || 95_i64)
            .put(mt("app/int; space=positive even=true"), || 100_i64)
            .put(mt("app/int; space=negative"), || -100_i64)
            .seal()
            .unwrap();

        let explicit = store.with(&mt("app/int; space=negative even=true"), |i: i64| i + 20);
        assert_eq!(explicit.response().mime(), &mt("app/int; space=negative"));
        assert_eq!(explicit.into_resolved(), Some(-80));

        let open = store.with(&mt("app/int"), |i: i64| i + 20);
        assert_eq!(open.response().mime(), &mt("app/int"));
        assert_eq!(open.into_resolved(), Some(120));

        let wildcard = store.with(&mt("app/*; even=true"), |i: i64| i);
        assert_eq!(
            wildcard.response().mime(),
            &mt("app/int; even=true")
        );
        assert_eq!(wildcard.into_resolved(), Some(100));
    }

    #[test]
    fn miss_does_not_invoke_block() {
        let store = ContentStore::<Value>::builder()
            .put(mt("text/plain"), || "hello".to_string())
            .seal()
            .unwrap();
        let item = store.with(&mt("text/html"), |_: String| -> i32 {
            panic!("block must not run")
        });
        assert!(!item.is_resolved());
        assert!(item.response().is_nothing());
        assert!(matches!(
            item.into_outcome(),
            Failure(Problem::UnsatisfiedRequirements { .. })
        ));
    }

    #[test]
    fn producers_are_lazy_and_not_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int"), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                1_i64
            })
            .put(mt("app/other"), || -> i64 { panic!("never probed") })
            .seal()
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        store.with(&mt("app/int"), |i: i64| i);
        store.with(&mt("app/int"), |i: i64| i);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.contains(&TypedMediaType::new(mt("app/int"), tags::INTEGER)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicates_rejected_by_default() {
        let result = ContentStore::<Value>::builder()
            .put(mt("app/int"), || 1_i64)
            .put(mt("app/int"), || 2_i64)
            .seal();
        assert!(matches!(
            result,
            Err(Problem::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn duplicates_overwrite_in_place_when_configured() {
        let store = ContentStore::<Value>::builder()
            .with_policy(DuplicatePolicy::Overwrite)
            .put(mt("app/int"), || 1_i64)
            .put(mt("app/text"), || "x".to_string())
            .put(mt("app/int"), || 2_i64)
            .seal()
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.with(&mt("app/int"), |i: i64| i).into_resolved(), Some(2));
        assert_eq!(store.keys().next().unwrap().mime(), &mt("app/int"));
    }

    #[test]
    fn foreign_variant_is_a_problem() {
        let store = ContentStore::<Value>::builder()
            .register(
                TypedMediaType::new(mt("app/int"), tags::INTEGER),
                || Value::from("not a number"),
            )
            .seal()
            .unwrap();
        let item = store.with(&mt("app/int"), |i: i64| i);
        assert!(matches!(
            item.problem(),
            Some(Problem::PayloadMismatch { .. })
        ));
        // A failed hit is final; later probes do not run.
        let item = item.with(&mt("app/int"), |i: i64| i + 1);
        assert!(!item.is_resolved());
    }

    #[test]
    fn failing_producer_surfaces_its_problem() {
        let store = ContentStore::<Value>::builder()
            .register_fallible(TypedMediaType::new(mt("text/plain"), tags::TEXT), || {
                Failure(Problem::rejected("fetch", "offline"))
            })
            .seal()
            .unwrap();
        let outcome = store.with(&mt("text/plain"), |s: String| s).into_outcome();
        assert_eq!(outcome, Failure(Problem::rejected("fetch", "offline")));
    }

    #[test]
    fn offers_ignores_runtime_types() {
        let store = ContentStore::<Value>::builder()
            .put(mt("text/html; charset=UTF-8"), || "<p/>".to_string())
            .seal()
            .unwrap();
        assert!(store.offers(&mt("text/html")));
        assert!(store.offers(&mt("text/*")));
        assert!(!store.offers(&mt("text/plain")));
        assert_eq!(store.media_types().count(), 1);
    }

    #[test]
    fn materialize_evaluates_everything() {
        let store = ContentStore::<Value>::builder()
            .put(mt("app/int"), || 1_i64)
            .put(mt("app/text"), || "one".to_string())
            .seal()
            .unwrap();
        let realized = store.materialize().unwrap();
        assert_eq!(
            realized.get(&TypedMediaType::new(mt("app/int"), tags::INTEGER)),
            Some(&Value::Integer(1))
        );
        assert_eq!(realized.len(), 2);
    }

    #[test]
    fn empty_store() {
        let store = ContentStore::<Value>::empty();
        assert!(store.is_empty());
        assert!(!store.contains(&TypedMediaType::new(mt("*/*"), tags::TEXT)));
    }
}
