//! Formal handlers: typed transformations from one store entry to another.

use std::sync::Arc;
use ura_kernel::{
    Failure, FromPayload, MediaType, Outcome, Payload, Problem, TypedMediaType, Uri,
};

type HandleFn<C, P> = dyn Fn(&C, &Uri, P) -> Outcome<P, Problem> + Send + Sync;

/// Transforms the payload under `src` into a payload under `dst`, given a
/// configuration `C` and the step argument.
pub struct FormalHandler<C, P> {
    src: TypedMediaType,
    dst: TypedMediaType,
    handle: Arc<HandleFn<C, P>>,
}

impl<C, P> Clone for FormalHandler<C, P> {
    fn clone(&self) -> Self {
        Self {
            src: self.src.clone(),
            dst: self.dst.clone(),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<C, P> std::fmt::Debug for FormalHandler<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormalHandler")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .finish_non_exhaustive()
    }
}

impl<C, P: Payload> FormalHandler<C, P> {
    /// A handler over raw payloads.
    pub fn new(
        src: TypedMediaType,
        dst: TypedMediaType,
        handle: impl Fn(&C, &Uri, P) -> Outcome<P, Problem> + Send + Sync + 'static,
    ) -> Self {
        Self {
            src,
            dst,
            handle: Arc::new(handle),
        }
    }

    /// A handler from `T` under `src` to `U` under `dst`.
    pub fn via<T, U>(
        src: MediaType,
        dst: MediaType,
        handle: impl Fn(&C, &Uri, T) -> Outcome<U, Problem> + Send + Sync + 'static,
    ) -> Self
    where
        T: FromPayload<P>,
        U: FromPayload<P> + Into<P>,
    {
        let src = TypedMediaType::new(src, T::type_tag());
        let dst = TypedMediaType::new(dst, U::type_tag());
        Self::new(src, dst, move |config, uri, payload| {
            let actual = payload.type_tag();
            match T::from_payload(payload) {
                Some(value) => handle(config, uri, value).map_success(Into::into),
                None => Failure(Problem::PayloadMismatch {
                    expected: T::type_tag().to_string(),
                    actual: actual.to_string(),
                }),
            }
        })
    }

    /// A handler that keeps media type and runtime type.
    pub fn id_via<T>(
        mime: MediaType,
        handle: impl Fn(&C, &Uri, T) -> Outcome<T, Problem> + Send + Sync + 'static,
    ) -> Self
    where
        T: FromPayload<P> + Into<P>,
    {
        Self::via(mime.clone(), mime, handle)
    }

    /// As [`via`](Self::via), parsing both media types.
    pub fn parse_via<T, U>(
        src: &str,
        dst: &str,
        handle: impl Fn(&C, &Uri, T) -> Outcome<U, Problem> + Send + Sync + 'static,
    ) -> Result<Self, Problem>
    where
        T: FromPayload<P>,
        U: FromPayload<P> + Into<P>,
    {
        Ok(Self::via(src.parse()?, dst.parse()?, handle))
    }

    /// As [`id_via`](Self::id_via), parsing the media type.
    pub fn parse_id_via<T>(
        mime: &str,
        handle: impl Fn(&C, &Uri, T) -> Outcome<T, Problem> + Send + Sync + 'static,
    ) -> Result<Self, Problem>
    where
        T: FromPayload<P> + Into<P>,
    {
        Ok(Self::id_via(mime.parse()?, handle))
    }

    pub fn src(&self) -> &TypedMediaType {
        &self.src
    }

    pub fn dst(&self) -> &TypedMediaType {
        &self.dst
    }

    pub fn handle(&self, config: &C, argument: &Uri, payload: P) -> Outcome<P, Problem> {
        (self.handle)(config, argument, payload)
    }
}

/// Handlers of one nested resolver, at most one per source key.
pub struct HandlerSet<C, P> {
    handlers: Vec<FormalHandler<C, P>>,
    duplicate: Option<TypedMediaType>,
}

impl<C, P: Payload> Default for HandlerSet<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, P: Payload> HandlerSet<C, P> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            duplicate: None,
        }
    }

    pub fn handler(mut self, handler: FormalHandler<C, P>) -> Self {
        if self.handlers.iter().any(|known| known.src() == handler.src()) {
            self.duplicate.get_or_insert_with(|| handler.src().clone());
        } else {
            self.handlers.push(handler);
        }
        self
    }

    pub fn via<T, U>(
        self,
        src: MediaType,
        dst: MediaType,
        handle: impl Fn(&C, &Uri, T) -> Outcome<U, Problem> + Send + Sync + 'static,
    ) -> Self
    where
        T: FromPayload<P>,
        U: FromPayload<P> + Into<P>,
    {
        self.handler(FormalHandler::via(src, dst, handle))
    }

    pub fn id_via<T>(
        self,
        mime: MediaType,
        handle: impl Fn(&C, &Uri, T) -> Outcome<T, Problem> + Send + Sync + 'static,
    ) -> Self
    where
        T: FromPayload<P> + Into<P>,
    {
        self.handler(FormalHandler::id_via(mime, handle))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The handlers in insertion order, or the first duplicated source.
    pub fn into_handlers(self) -> Result<Vec<FormalHandler<C, P>>, Problem> {
        match self.duplicate {
            Some(key) => Err(Problem::DuplicateRegistration {
                key: key.to_string(),
            }),
            None => Ok(self.handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ura_kernel::{Success, Value, payload::tags};

    fn mt(s: &str) -> MediaType {
        s.parse().unwrap()
    }

    fn uri() -> Uri {
        Uri::parse("arg:x").unwrap()
    }

    #[test]
    fn typed_handler_converts_both_ways() {
        let handler = FormalHandler::<(), Value>::via(
            mt("text/plain"),
            mt("app/int"),
            |_, _, text: String| Success(text.len() as i64),
        );
        assert_eq!(handler.src().type_tag(), &tags::TEXT);
        assert_eq!(handler.dst().type_tag(), &tags::INTEGER);
        assert_eq!(
            handler.handle(&(), &uri(), Value::from("four")),
            Success(Value::Integer(4))
        );
        assert!(matches!(
            handler.handle(&(), &uri(), Value::Integer(1)),
            Failure(Problem::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn parse_variants_report_bad_media_types() {
        let parsed = FormalHandler::<(), Value>::parse_id_via("text/html", |_, _, s: String| {
            Success(s)
        })
        .unwrap();
        assert_eq!(parsed.src(), parsed.dst());
        let broken =
            FormalHandler::<(), Value>::parse_id_via("not a mime", |_, _, s: String| Success(s));
        assert!(matches!(broken, Err(Problem::Parse { .. })));
    }

    #[test]
    fn duplicate_sources_are_rejected() {
        let set = HandlerSet::<(), Value>::new()
            .id_via(mt("text/html"), |_, _, s: String| Success(s))
            .id_via(mt("text/html"), |_, _, s: String| Success(s.to_uppercase()));
        assert_eq!(set.len(), 1);
        assert!(matches!(
            set.into_handlers(),
            Err(Problem::DuplicateRegistration { .. })
        ));
    }
}
