//! Navigation chains.
//!
//! A chain is an immutable linked list of `(operator, argument)` steps.
//! Tails are shared, so extending a chain at its head is cheap. Dropping,
//! comparing and formatting walk the steps in a loop, so chain length is
//! bounded by memory alone.

use crate::error::Problem;
use crate::uri::Uri;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// One step of a chain.
#[derive(Serialize)]
pub struct Step {
    op: String,
    argument: Uri,
    #[serde(skip)]
    next: Option<NavigationChain>,
}

impl Step {
    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn argument(&self) -> &Uri {
        &self.argument
    }

    pub fn next(&self) -> Option<&NavigationChain> {
        self.next.as_ref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("op", &self.op)
            .field("argument", &self.argument)
            .finish_non_exhaustive()
    }
}

/// A non-empty sequence of resolution steps.
#[derive(Clone)]
pub struct NavigationChain {
    head: Arc<Step>,
}

/// Unlinks uniquely owned tails one at a time. A tail still shared with
/// another chain is left to that chain.
impl Drop for NavigationChain {
    fn drop(&mut self) {
        let mut next = Arc::get_mut(&mut self.head).and_then(|step| step.next.take());
        while let Some(mut chain) = next {
            next = Arc::get_mut(&mut chain.head).and_then(|step| step.next.take());
        }
    }
}

impl PartialEq for NavigationChain {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.head, &other.head)
            || self
                .steps()
                .map(|step| (&step.op, &step.argument))
                .eq(other.steps().map(|step| (&step.op, &step.argument)))
    }
}

impl Eq for NavigationChain {}

impl fmt::Debug for NavigationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps()).finish()
    }
}

impl NavigationChain {
    /// Prepend a step to `next`.
    pub fn step(op: impl Into<String>, argument: Uri, next: Option<NavigationChain>) -> Self {
        Self {
            head: Arc::new(Step {
                op: op.into(),
                argument,
                next,
            }),
        }
    }

    /// A single-step chain whose operator is the scheme of `uri`.
    pub fn root(uri: Uri) -> Result<Self, Problem> {
        let op = uri
            .scheme()
            .ok_or_else(|| Problem::parse(uri.as_str(), "absolute uri"))?
            .to_string();
        Ok(Self::step(op, uri, None))
    }

    /// Build from `[root, op1, arg1, op2, arg2, ...]`.
    ///
    /// The first token is the root argument. Its scheme names the root
    /// operator; a token without scheme names itself.
    pub fn from_flat_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, Problem> {
        check_arity(tokens.len())?;
        let root = Uri::parse(tokens[0].as_ref())?;
        let op = root.scheme().unwrap_or(root.as_str()).to_string();
        Self::assemble(op, root, &tokens[1..])
    }

    /// As [`from_flat_tokens`](Self::from_flat_tokens) with an explicit
    /// root operator.
    pub fn from_flat_tokens_rooted<S: AsRef<str>>(
        op: impl Into<String>,
        tokens: &[S],
    ) -> Result<Self, Problem> {
        check_arity(tokens.len())?;
        let root = Uri::parse(tokens[0].as_ref())?;
        Self::assemble(op.into(), root, &tokens[1..])
    }

    fn assemble<S: AsRef<str>>(op: String, root: Uri, pairs: &[S]) -> Result<Self, Problem> {
        let mut next = None;
        for pair in pairs.chunks_exact(2).rev() {
            let argument = Uri::parse(pair[1].as_ref())?;
            next = Some(Self::step(pair[0].as_ref(), argument, next));
        }
        Ok(Self::step(op, root, next))
    }

    pub fn head(&self) -> &Step {
        &self.head
    }

    /// Steps from head to tail.
    pub fn steps(&self) -> Steps<'_> {
        Steps {
            current: Some(&self.head),
        }
    }

    pub fn len(&self) -> usize {
        self.steps().count()
    }

    /// Chains always hold at least one step.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Content address of the chain: `nav1_` followed by a SHA-256 over
    /// the steps in order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for step in self.steps() {
            hasher.update(b"op:");
            hasher.update(step.op.as_bytes());
            hasher.update(b"\narg:");
            hasher.update(step.argument.as_str().as_bytes());
            hasher.update(b"\n");
        }
        format!("nav1_{:x}", hasher.finalize())
    }
}

fn check_arity(count: usize) -> Result<(), Problem> {
    if count == 0 || count % 2 == 0 {
        return Err(Problem::ArgumentCount { count });
    }
    Ok(())
}

pub struct Steps<'a> {
    current: Option<&'a Step>,
}

impl<'a> Iterator for Steps<'a> {
    type Item = &'a Step;

    fn next(&mut self) -> Option<Self::Item> {
        let step = self.current?;
        self.current = step.next.as_ref().map(|chain| chain.head.as_ref());
        Some(step)
    }
}

impl Serialize for NavigationChain {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.steps())
    }
}

/// Renders as the flat token form, `root op1 arg1 ...`.
impl fmt::Display for NavigationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps = self.steps();
        if let Some(head) = steps.next() {
            write!(f, "{}", head.argument)?;
        }
        for step in steps {
            write!(f, " {} {}", step.op, step.argument)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_must_be_odd() {
        let empty: [&str; 0] = [];
        assert_eq!(
            NavigationChain::from_flat_tokens(&empty),
            Err(Problem::ArgumentCount { count: 0 })
        );
        assert_eq!(
            NavigationChain::from_flat_tokens(&["mem:a", "select"]),
            Err(Problem::ArgumentCount { count: 2 })
        );
    }

    #[test]
    fn flat_tokens_pair_up() {
        let chain =
            NavigationChain::from_flat_tokens(&["mem:doc", "select", "arg:line-1-2"]).unwrap();
        assert_eq!(chain.len(), 2);
        let ops: Vec<&str> = chain.steps().map(Step::op).collect();
        assert_eq!(ops, vec!["mem", "select"]);
        insta::assert_snapshot!(chain.to_string(), @"mem:doc select arg:line-1-2");
    }

    #[test]
    fn schemeless_root_names_itself() {
        let chain = NavigationChain::from_flat_tokens(&["root", "op1", "arg1"]).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.head().op(), "root");
        assert_eq!(chain.head().argument().as_str(), "root");
        let tail = chain.head().next().unwrap();
        assert_eq!(tail.head().op(), "op1");
        assert_eq!(tail.head().argument().as_str(), "arg1");
        assert!(tail.head().next().is_none());
        assert_eq!(
            NavigationChain::from_flat_tokens(&["a", "b"]),
            Err(Problem::ArgumentCount { count: 2 })
        );
    }

    #[test]
    fn rooted_tokens_take_explicit_operator() {
        let chain = NavigationChain::from_flat_tokens_rooted("load", &["doc"]).unwrap();
        assert_eq!(chain.head().op(), "load");
        assert!(chain.head().next().is_none());
    }

    #[test]
    fn root_requires_scheme() {
        let uri = Uri::parse("relative/path").unwrap();
        assert!(matches!(
            NavigationChain::root(uri),
            Err(Problem::Parse { .. })
        ));
    }

    fn long_tokens(pairs: usize) -> Vec<String> {
        let mut tokens = vec!["mem:root".to_string()];
        for i in 0..pairs {
            tokens.push("op".to_string());
            tokens.push(format!("arg:{i}"));
        }
        tokens
    }

    #[test]
    fn long_chains_compare_and_drop_without_recursion() {
        let chain = NavigationChain::from_flat_tokens(&long_tokens(200_000)).unwrap();
        let same = NavigationChain::from_flat_tokens(&long_tokens(200_000)).unwrap();
        assert_eq!(chain.len(), 200_001);
        assert_eq!(chain, same);
        assert_ne!(
            chain,
            NavigationChain::from_flat_tokens(&long_tokens(199_999)).unwrap()
        );
        drop(same);
        drop(chain);
    }

    #[test]
    fn dropping_a_head_keeps_shared_tails() {
        let chain = NavigationChain::from_flat_tokens(&long_tokens(100_000)).unwrap();
        let tail = chain.head().next().cloned().unwrap();
        drop(chain);
        assert_eq!(tail.len(), 100_000);
        assert_eq!(tail.head().argument().as_str(), "arg:0");
        let extended = NavigationChain::step("mem", Uri::parse("mem:root").unwrap(), Some(tail));
        assert_eq!(extended.len(), 100_001);
    }

    #[test]
    fn debug_lists_steps() {
        let chain = NavigationChain::from_flat_tokens(&["mem:doc", "select", "arg:x"]).unwrap();
        insta::assert_snapshot!(format!("{chain:?}"), @r#"[Step { op: "mem", argument: Uri("mem:doc"), .. }, Step { op: "select", argument: Uri("arg:x"), .. }]"#);
    }

    #[test]
    fn digest_is_stable_and_order_sensitive() {
        let a = NavigationChain::from_flat_tokens(&["mem:doc", "x", "arg:1", "y", "arg:2"]).unwrap();
        let b = NavigationChain::from_flat_tokens(&["mem:doc", "x", "arg:1", "y", "arg:2"]).unwrap();
        let c = NavigationChain::from_flat_tokens(&["mem:doc", "y", "arg:2", "x", "arg:1"]).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert!(a.digest().starts_with("nav1_"));
    }

    #[test]
    fn serializes_as_step_list() {
        let chain = NavigationChain::from_flat_tokens(&["mem:doc", "select", "arg:x"]).unwrap();
        insta::assert_json_snapshot!(chain, @r#"
        [
          {
            "op": "mem",
            "argument": "mem:doc"
          },
          {
            "op": "select",
            "argument": "arg:x"
          }
        ]
        "#);
    }
}
