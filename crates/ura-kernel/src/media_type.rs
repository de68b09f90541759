//! Structured media types with wildcard unification.
//!
//! A [`MediaType`] generalizes a MIME type:
//!
//! ```text
//! top/[tree.]sub[+suffix][; key=value ...]
//! ```
//!
//! Any of `top`, `tree`, `sub` and `suffix` may be the wildcard token `*`,
//! which matches any concrete value in that position during unification.
//! Parameters are a key-unique map; their order in the textual form is
//! irrelevant.

use crate::error::Problem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The wildcard token.
pub const WILDCARD: &str = "*";

const GRAMMAR: &str = "media type `top/[tree.]sub[+suffix][; key=value ...]`";

fn media_type_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^([^/;]+)/(?:([^./+;]+)\.)?([^/+;]+)(?:\+([^;]+))?(?:;(.*))?$")
            .expect("media type regex")
    })
}

fn extended_sub_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^(?:([^./+;]+)\.)?([^/+;]+)(?:\+([^;]+))?$")
            .expect("extended subtype regex")
    })
}

/// A fully represented media type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaType {
    top: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tree: Option<String>,
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suffix: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

impl MediaType {
    /// A media type without tree, suffix or parameters.
    ///
    /// Builders check each component against the grammar, so every built
    /// value renders to text that parses back to it. A `.` in `sub` is only
    /// accepted once a tree is present.
    pub fn new(top: impl Into<String>, sub: impl Into<String>) -> Result<Self, Problem> {
        Ok(Self {
            top: component(top.into(), &['/', ';'], "media type top level")?,
            tree: None,
            sub: component(sub.into(), &['/', '+', ';', '.'], "media subtype")?,
            suffix: None,
            params: BTreeMap::new(),
        })
    }

    /// Crate-internal constructor for literals known to satisfy the grammar.
    pub(crate) fn known(top: &str, sub: &str) -> Self {
        Self {
            top: top.to_string(),
            tree: None,
            sub: sub.to_string(),
            suffix: None,
            params: BTreeMap::new(),
        }
    }

    /// Parse a media type, `None` if it does not match the grammar.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = media_type_re().captures(input)?;
        let top = non_empty(caps.get(1).map(|m| m.as_str()))?;
        let tree = non_empty(caps.get(2).map(|m| m.as_str()));
        let sub = non_empty(caps.get(3).map(|m| m.as_str()))?;
        let suffix = non_empty(caps.get(4).map(|m| m.as_str()));
        let params = parse_params(caps.get(5).map_or("", |m| m.as_str()))?;
        Some(Self {
            top,
            tree,
            sub,
            suffix,
            params,
        })
    }

    /// Build from a top level type and an extended subtype `[tree.]sub[+suffix]`.
    pub fn from_extended_sub<K, V>(
        top: impl Into<String>,
        extended_sub: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Option<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let caps = extended_sub_re().captures(extended_sub)?;
        let top: String = top.into();
        let top = non_empty(Some(top.as_str()))?;
        let mut params_map = BTreeMap::new();
        for (key, value) in params {
            if params_map.insert(key.into(), value.into()).is_some() {
                return None;
            }
        }
        Some(Self {
            top,
            tree: non_empty(caps.get(1).map(|m| m.as_str())),
            sub: non_empty(caps.get(2).map(|m| m.as_str()))?,
            suffix: non_empty(caps.get(3).map(|m| m.as_str())),
            params: params_map,
        })
    }

    pub fn with_tree(mut self, tree: impl Into<String>) -> Result<Self, Problem> {
        self.tree = Some(component(tree.into(), &['/', '+', ';', '.'], "media type tree")?);
        Ok(self)
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Result<Self, Problem> {
        self.suffix = Some(component(suffix.into(), &[';'], "media type suffix")?);
        Ok(self)
    }

    /// Add or replace a parameter.
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, Problem> {
        let key = component(key.into(), &['=', ';'], "media type parameter key")?;
        let value = component(value.into(), &['='], "media type parameter value")?;
        self.params.insert(key, value);
        Ok(self)
    }

    pub fn top(&self) -> &str {
        &self.top
    }

    pub fn tree(&self) -> Option<&str> {
        self.tree.as_deref()
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The media type without parameters.
    pub fn lifted(&self) -> Self {
        Self {
            params: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Whether any position holds the wildcard token.
    pub fn has_wildcard(&self) -> bool {
        self.top == WILDCARD
            || self.sub == WILDCARD
            || self.tree.as_deref() == Some(WILDCARD)
            || self.suffix.as_deref() == Some(WILDCARD)
    }

    /// Wildcard-equal positions and compatible parameters.
    ///
    /// Parameters are compatible when no key present on both sides carries
    /// differing values. Keys present on one side only never block.
    pub fn unifies(&self, other: &Self) -> bool {
        eq_wildcard(&self.top, &other.top)
            && eq_wildcard_opt(self.tree.as_deref(), other.tree.as_deref())
            && eq_wildcard(&self.sub, &other.sub)
            && eq_wildcard_opt(self.suffix.as_deref(), other.suffix.as_deref())
            && params_compatible(&self.params, &other.params)
    }

    /// Resolve wildcards against `other` and intersect the parameters.
    ///
    /// Only entries present and equal on both sides survive the
    /// intersection.
    pub fn unify(&self, other: &Self) -> Result<Self, Problem> {
        if !self.unifies(other) {
            return Err(Problem::UnificationMismatch {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        let params = self
            .params
            .iter()
            .filter(|(key, value)| other.params.get(*key) == Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self {
            top: resolve_wildcard(&self.top, &other.top).to_string(),
            tree: resolve_wildcard_opt(self.tree.as_deref(), other.tree.as_deref())
                .map(str::to_string),
            sub: resolve_wildcard(&self.sub, &other.sub).to_string(),
            suffix: resolve_wildcard_opt(self.suffix.as_deref(), other.suffix.as_deref())
                .map(str::to_string),
            params,
        })
    }

    /// Number of parameter keys shared with `other` at equal values.
    pub fn shared_params(&self, other: &Self) -> usize {
        self.params
            .iter()
            .filter(|(key, value)| other.params.get(*key) == Some(*value))
            .count()
    }
}

/// Position-wise wildcard equality.
pub fn eq_wildcard(a: &str, b: &str) -> bool {
    a == WILDCARD || b == WILDCARD || a == b
}

fn eq_wildcard_opt(a: Option<&str>, b: Option<&str>) -> bool {
    a == Some(WILDCARD) || b == Some(WILDCARD) || a == b
}

fn resolve_wildcard<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a == WILDCARD { b } else { a }
}

fn resolve_wildcard_opt<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    if a == Some(WILDCARD) { b } else { a }
}

fn params_compatible(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
    a.iter()
        .all(|(key, value)| b.get(key).is_none_or(|other| other == value))
}

fn component(value: String, forbidden: &[char], expected: &str) -> Result<String, Problem> {
    if value.is_empty() || value.contains(char::is_whitespace) || value.contains(forbidden) {
        return Err(Problem::parse(value, expected));
    }
    Ok(value)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_params(raw: &str) -> Option<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for token in raw.split_whitespace() {
        let (key, value) = token.split_once('=')?;
        if key.is_empty() || value.is_empty() || value.contains('=') {
            return None;
        }
        if params.insert(key.to_string(), value.to_string()).is_some() {
            return None;
        }
    }
    Some(params)
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.top)?;
        if let Some(tree) = &self.tree {
            write!(f, "{tree}.")?;
        }
        write!(f, "{}", self.sub)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "+{suffix}")?;
        }
        if !self.params.is_empty() {
            let joined = self
                .params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            write!(f, "; {joined}")?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = Problem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Problem::parse(s, GRAMMAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mt(s: &str) -> MediaType {
        s.parse().unwrap()
    }

    #[test]
    fn parses_all_components() {
        let m = mt("application/vnd.api+json; charset=UTF-8 q=1");
        assert_eq!(m.top(), "application");
        assert_eq!(m.tree(), Some("vnd"));
        assert_eq!(m.sub(), "api");
        assert_eq!(m.suffix(), Some("json"));
        assert_eq!(m.param("charset"), Some("UTF-8"));
        assert_eq!(m.param("q"), Some("1"));
    }

    #[test]
    fn empty_optionals_are_absent() {
        let m = mt("text/html;");
        assert_eq!(m.tree(), None);
        assert_eq!(m.suffix(), None);
        assert!(m.params().is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "text",
            "/html",
            "text/",
            "text/html; charset",
            "text/html; a=1 a=2",
        ] {
            assert!(MediaType::parse(input).is_none(), "accepted {input:?}");
        }
        let err = "text".parse::<MediaType>().unwrap_err();
        assert!(matches!(err, Problem::Parse { .. }));
    }

    #[test]
    fn display_round_trips() {
        for input in [
            "text/html",
            "application/vnd.api+json",
            "app/int; even=true space=positive",
            "image/svg+xml; charset=UTF-8",
        ] {
            let m = mt(input);
            assert_eq!(mt(&m.to_string()), m);
        }
        insta::assert_snapshot!(
            mt("app/int; space=positive even=true").to_string(),
            @"app/int; even=true space=positive"
        );
    }

    #[test]
    fn builders_produce_parseable_values() {
        let built = MediaType::new("application", "api")
            .and_then(|m| m.with_tree("vnd"))
            .and_then(|m| m.with_suffix("json"))
            .and_then(|m| m.with_param("charset", "UTF-8"))
            .unwrap();
        assert_eq!(built, mt("application/vnd.api+json; charset=UTF-8"));
        assert_eq!(mt(&built.to_string()), built);
    }

    #[test]
    fn builders_reject_what_parse_would_split() {
        assert!(matches!(
            MediaType::new("a", "b.c"),
            Err(Problem::Parse { .. })
        ));
        assert!(MediaType::new("", "html").is_err());
        assert!(MediaType::new("text", "").is_err());
        assert!(MediaType::new("text/x", "html").is_err());
        let base = MediaType::new("text", "html").unwrap();
        assert!(base.clone().with_tree("").is_err());
        assert!(base.clone().with_tree("a.b").is_err());
        assert!(base.clone().with_suffix("x;y").is_err());
        assert!(base.clone().with_param("q", "a b").is_err());
        assert!(base.with_param("k=v", "1").is_err());
    }

    #[test]
    fn extended_sub_constructor() {
        let m = MediaType::from_extended_sub("application", "vnd.ms+xml", [("charset", "UTF-8")])
            .unwrap();
        assert_eq!(m, mt("application/vnd.ms+xml; charset=UTF-8"));
        assert!(MediaType::from_extended_sub("text", "", Vec::<(String, String)>::new()).is_none());
    }

    #[test]
    fn wildcard_unification_is_symmetric() {
        let types = [
            mt("text/html"),
            mt("text/*"),
            mt("*/*"),
            mt("text/plain; charset=UTF-8"),
            mt("text/plain; charset=ASCII"),
            mt("application/vnd.api+json"),
            mt("application/*.api+*"),
        ];
        for a in &types {
            for b in &types {
                assert_eq!(a.unifies(b), b.unifies(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn unify_intersects_parameters() {
        let a = mt("app/int; space=positive");
        let b = mt("app/int; space=positive even=true");
        assert_eq!(a.unify(&b).unwrap(), mt("app/int; space=positive"));
    }

    #[test]
    fn unify_resolves_wildcards() {
        let a = mt("text/*");
        let b = mt("text/html; charset=UTF-8");
        assert_eq!(a.unify(&b).unwrap(), mt("text/html"));
        assert_eq!(b.unify(&a).unwrap(), mt("text/html"));
    }

    #[test]
    fn conflicting_parameters_do_not_unify() {
        let a = mt("app/int; space=negative even=true");
        let b = mt("app/int; space=positive");
        assert!(!a.unifies(&b));
        assert!(matches!(
            a.unify(&b),
            Err(Problem::UnificationMismatch { .. })
        ));
    }

    #[test]
    fn lifted_drops_parameters() {
        assert_eq!(mt("text/html; charset=UTF-8").lifted(), mt("text/html"));
    }
}
