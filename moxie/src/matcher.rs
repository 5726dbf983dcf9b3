// vim: tw=80
//! Argument matchers.
//!
//! A [`Matcher`] is a predicate over one argument value.  Matchers compose
//! with [`and`], [`or`] and [`not`], inspect the shape of arrays,
//! collections and maps, and may [`capture`] the values they accept.
//!
//! Evaluation happens in two phases.  [`Matcher::matches`] is a pure dry
//! run that the dispatcher may call on many candidate expectations.  Only
//! once an expectation has been selected does the dispatcher call
//! `commit`, which replays the accepting path and fires the captures along
//! it, and nothing else.
//!
//! # Examples
//! ```
//! # use moxie::*;
//! # use moxie::matcher::*;
//! let m = and([gt(1), lt(10)]);
//! assert!(m.matches(&Value::from(5)));
//! assert!(!m.matches(&Value::from(10)));
//! assert_eq!("and(gt(1), lt(10))", m.to_string());
//! ```

use std::{
    fmt::{self, Display},
    sync::{Arc, Mutex, PoisonError}
};

use predicates::{
    Predicate,
    reflection::PredicateReflection
};
use predicates_tree::CaseTreeExt;

use crate::{Error, Kind, Result, Value};

/// Shape constraints for arrays and collections.
#[derive(Clone, Default)]
pub struct SeqShape {
    /// Matched against the number of elements, as a `Value::UInt`.
    pub len: Option<Box<Matcher>>,
    /// Positional matchers.  Implies equal length.
    pub elements: Option<Vec<Matcher>>,
    /// Every one of these must accept at least one element.
    pub contains: Vec<Matcher>,
}

impl SeqShape {
    fn matches(&self, items: &[Value]) -> bool {
        if let Some(len) = &self.len {
            if !len.matches(&Value::from(items.len())) {
                return false;
            }
        }
        if let Some(elements) = &self.elements {
            if elements.len() != items.len() ||
                !elements.iter().zip(items).all(|(m, v)| m.matches(v))
            {
                return false;
            }
        }
        self.contains.iter()
            .all(|m| items.iter().any(|v| m.matches(v)))
    }

    fn commit(&self, items: &[Value]) {
        if let Some(len) = &self.len {
            len.commit(&Value::from(items.len()));
        }
        if let Some(elements) = &self.elements {
            for (m, v) in elements.iter().zip(items) {
                m.commit(v);
            }
        }
        for m in &self.contains {
            if let Some(v) = items.iter().find(|v| m.matches(v)) {
                m.commit(v);
            }
        }
    }
}

impl Display for SeqShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(len) = &self.len {
            parts.push(format!("len({len})"));
        }
        if let Some(elements) = &self.elements {
            parts.push(format!("[{}]", join(elements)));
        }
        if !self.contains.is_empty() {
            parts.push(format!("with({})", join(&self.contains)));
        }
        f.write_str(&parts.join(", "))
    }
}

/// Shape constraints for maps.
#[derive(Clone, Default)]
pub struct MapShape {
    /// Matched against the number of entries, as a `Value::UInt`.
    pub len: Option<Box<Matcher>>,
    pub key: Option<Box<Matcher>>,
    pub value: Option<Box<Matcher>>,
}

impl MapShape {
    fn entry_matches(&self, k: &Value, v: &Value) -> bool {
        self.key.as_ref().map_or(true, |m| m.matches(k)) &&
            self.value.as_ref().map_or(true, |m| m.matches(v))
    }

    fn matches(&self, entries: &[(Value, Value)]) -> bool {
        if let Some(len) = &self.len {
            if !len.matches(&Value::from(entries.len())) {
                return false;
            }
        }
        if self.key.is_none() && self.value.is_none() {
            return true;
        }
        entries.iter().any(|(k, v)| self.entry_matches(k, v))
    }

    fn commit(&self, entries: &[(Value, Value)]) {
        if let Some(len) = &self.len {
            len.commit(&Value::from(entries.len()));
        }
        if self.key.is_none() && self.value.is_none() {
            return;
        }
        if let Some((k, v)) = entries.iter()
            .find(|(k, v)| self.entry_matches(k, v))
        {
            if let Some(m) = &self.key {
                m.commit(k);
            }
            if let Some(m) = &self.value {
                m.commit(v);
            }
        }
    }
}

impl Display for MapShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(len) = &self.len {
            parts.push(format!("len({len})"));
        }
        match (&self.key, &self.value) {
            (Some(k), Some(v)) => parts.push(format!("entry({k}, {v})")),
            (Some(k), None) => parts.push(format!("key({k})")),
            (None, Some(v)) => parts.push(format!("value({v})")),
            (None, None) => ()
        }
        f.write_str(&parts.join(", "))
    }
}

/// A shared sink for the values accepted by [`capture`] matchers.
///
/// Cloning a `Captor` yields another handle to the same sink.
#[derive(Clone, Debug, Default)]
pub struct Captor(Arc<Mutex<Vec<Value>>>);

impl Captor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured value, oldest first.
    pub fn values(&self) -> Vec<Value> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The most recently captured value.
    pub fn last(&self) -> Option<Value> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, v: Value) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(v);
    }
}

/// A predicate over one argument value.
#[derive(Clone)]
pub enum Matcher {
    /// Accepts everything.
    Any,
    Eq(Value),
    Not(Box<Matcher>),
    /// Accepts if every child does.  Children are evaluated left to right.
    And(Vec<Matcher>),
    /// Accepts if any child does.  Children are evaluated left to right.
    Or(Vec<Matcher>),
    /// Accepts ordered values within every given bound.  Unordered values
    /// are rejected.
    Range {
        lt: Option<Value>,
        leq: Option<Value>,
        gt: Option<Value>,
        geq: Option<Value>,
    },
    /// Escape hatch for custom logic.
    Predicate(Arc<dyn Predicate<Value> + Send + Sync>),
    /// Accepts everything, and records the value once its expectation is
    /// selected.
    Capture(Captor),
    /// Applies to `Value::Array`.
    Array(SeqShape),
    /// Applies to `Value::List`.
    Collection(SeqShape),
    Map(MapShape),
}

impl Matcher {
    /// Dry-run evaluation.  Never fires any capture.
    pub fn matches(&self, v: &Value) -> bool {
        match self {
            Matcher::Any | Matcher::Capture(_) => true,
            Matcher::Eq(x) => x == v,
            Matcher::Not(m) => !m.matches(v),
            Matcher::And(ms) => ms.iter().all(|m| m.matches(v)),
            Matcher::Or(ms) => ms.iter().any(|m| m.matches(v)),
            Matcher::Range{lt, leq, gt, geq} => {
                use std::cmp::Ordering::*;
                let cmp = |bound: &Option<Value>, ok: &[std::cmp::Ordering]| {
                    bound.as_ref().map_or(true, |b| {
                        v.partial_cmp(b).is_some_and(|o| ok.contains(&o))
                    })
                };
                cmp(lt, &[Less]) && cmp(leq, &[Less, Equal]) &&
                    cmp(gt, &[Greater]) && cmp(geq, &[Greater, Equal])
            },
            Matcher::Predicate(p) => p.eval(v),
            Matcher::Array(s) => matches!(v, Value::Array(i) if s.matches(i)),
            Matcher::Collection(s) =>
                matches!(v, Value::List(i) if s.matches(i)),
            Matcher::Map(s) => matches!(v, Value::Map(e) if s.matches(e)),
        }
    }

    /// Replay the accepting evaluation path and fire its captures.
    ///
    /// Must only be called after `matches` returned true for the same value.
    pub(crate) fn commit(&self, v: &Value) {
        match self {
            Matcher::Capture(c) => c.push(v.clone()),
            Matcher::And(ms) => {
                for m in ms {
                    m.commit(v);
                }
            },
            Matcher::Or(ms) => {
                if let Some(m) = ms.iter().find(|m| m.matches(v)) {
                    m.commit(v);
                }
            },
            Matcher::Array(s) => {
                if let Value::Array(items) = v {
                    s.commit(items);
                }
            },
            Matcher::Collection(s) => {
                if let Value::List(items) = v {
                    s.commit(items);
                }
            },
            Matcher::Map(s) => {
                if let Value::Map(entries) = v {
                    s.commit(entries);
                }
            },
            // A Not only accepts when its child rejected
            Matcher::Not(_) | Matcher::Any | Matcher::Eq(_) |
                Matcher::Range{..} | Matcher::Predicate(_) => ()
        }
    }

    /// Describe why this matcher rejects `v`.
    pub fn explain(&self, v: &Value) -> String {
        match self {
            Matcher::Predicate(p) => match p.find_case(false, v) {
                Some(case) => case.tree().to_string(),
                None => format!("{self} accepted {v}")
            },
            Matcher::And(ms) => match ms.iter().find(|m| !m.matches(v)) {
                Some(m) => m.explain(v),
                None => format!("{self} accepted {v}")
            },
            _ if self.matches(v) => format!("{self} accepted {v}"),
            _ => format!("{v} did not satisfy {self}")
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({self})")
    }
}

fn join(ms: &[Matcher]) -> String {
    ms.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("<anything>"),
            Matcher::Eq(v) => write!(f, "eq({v})"),
            Matcher::Not(m) => write!(f, "not({m})"),
            Matcher::And(ms) => write!(f, "and({})", join(ms)),
            Matcher::Or(ms) => write!(f, "or({})", join(ms)),
            Matcher::Range{lt, leq, gt, geq} => {
                let parts = [("gt", gt), ("geq", geq), ("lt", lt), ("leq", leq)]
                    .into_iter()
                    .filter_map(|(name, b)| {
                        b.as_ref().map(|b| format!("{name}({b})"))
                    }).collect::<Vec<_>>();
                if parts.len() == 1 {
                    f.write_str(&parts[0])
                } else {
                    write!(f, "range({})", parts.join(", "))
                }
            },
            Matcher::Predicate(p) => write!(f, "{p}"),
            Matcher::Capture(_) => f.write_str("<captured>"),
            Matcher::Array(s) => write!(f, "array({s})"),
            Matcher::Collection(s) => write!(f, "collection({s})"),
            Matcher::Map(s) => write!(f, "map({s})"),
        }
    }
}

/// A predicate with a fixed description, for the closure-based constructors
/// below.
struct Described<F> {
    desc: String,
    f: F
}

impl<F> Display for Described<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.desc)
    }
}

impl<F> PredicateReflection for Described<F> {}

impl<F> Predicate<Value> for Described<F>
    where F: Fn(&Value) -> bool
{
    fn eval(&self, v: &Value) -> bool {
        (self.f)(v)
    }
}

fn described<F>(desc: String, f: F) -> Matcher
    where F: Fn(&Value) -> bool + Send + Sync + 'static
{
    Matcher::Predicate(Arc::new(Described{desc, f}))
}

/// Adapts a string predicate from the `predicates` crate to `Value`s.
/// Non-string values are rejected.
struct StrPredicate<P>(P);

impl<P: Display> Display for StrPredicate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<P: Predicate<str>> PredicateReflection for StrPredicate<P> {}

impl<P: Predicate<str>> Predicate<Value> for StrPredicate<P> {
    fn eval(&self, v: &Value) -> bool {
        v.as_str().is_some_and(|s| self.0.eval(s))
    }
}

/// Accept anything.
pub fn any() -> Matcher {
    Matcher::Any
}

/// Accept values equal to `v`.
pub fn eq<V: Into<Value>>(v: V) -> Matcher {
    Matcher::Eq(v.into())
}

pub fn ne<V: Into<Value>>(v: V) -> Matcher {
    not(eq(v))
}

pub fn not(m: Matcher) -> Matcher {
    Matcher::Not(Box::new(m))
}

pub fn and<I: IntoIterator<Item=Matcher>>(ms: I) -> Matcher {
    Matcher::And(ms.into_iter().collect())
}

pub fn or<I: IntoIterator<Item=Matcher>>(ms: I) -> Matcher {
    Matcher::Or(ms.into_iter().collect())
}

fn range(lt: Option<Value>, leq: Option<Value>, gt: Option<Value>,
         geq: Option<Value>) -> Matcher
{
    Matcher::Range{lt, leq, gt, geq}
}

pub fn lt<V: Into<Value>>(v: V) -> Matcher {
    range(Some(v.into()), None, None, None)
}

pub fn leq<V: Into<Value>>(v: V) -> Matcher {
    range(None, Some(v.into()), None, None)
}

pub fn gt<V: Into<Value>>(v: V) -> Matcher {
    range(None, None, Some(v.into()), None)
}

pub fn geq<V: Into<Value>>(v: V) -> Matcher {
    range(None, None, None, Some(v.into()))
}

/// Accept `lo <= v <= hi`.
pub fn between<L: Into<Value>, H: Into<Value>>(lo: L, hi: H) -> Matcher {
    range(None, Some(hi.into()), None, Some(lo.into()))
}

/// Accept numbers within `delta` of `x`.
pub fn close_to(x: f64, delta: f64) -> Matcher {
    between(x - delta, x + delta)
}

pub fn is_null() -> Matcher {
    eq(Value::Null)
}

pub fn not_null() -> Matcher {
    not(is_null())
}

/// Accept non-null values of the given kind.
pub fn kind_of(kind: Kind) -> Matcher {
    described(format!("kind_of({kind:?})"),
              move |v| !v.is_null() && kind.accepts(v))
}

/// Accept whatever the closure accepts.
pub fn function<F>(f: F) -> Matcher
    where F: Fn(&Value) -> bool + Send + Sync + 'static
{
    Matcher::Predicate(Arc::new(predicates::function::function(f)))
}

/// Accept whatever any [`Predicate`] over `Value` accepts.
pub fn predicate<P>(p: P) -> Matcher
    where P: Predicate<Value> + Send + Sync + 'static
{
    Matcher::Predicate(Arc::new(p))
}

/// Accept strings that a string predicate accepts, like
/// `predicates::str::contains("foo")`.
pub fn str_pred<P>(p: P) -> Matcher
    where P: Predicate<str> + Send + Sync + 'static
{
    Matcher::Predicate(Arc::new(StrPredicate(p)))
}

pub fn starts_with(prefix: &str) -> Matcher {
    str_pred(predicates::str::starts_with(prefix))
}

pub fn ends_with(suffix: &str) -> Matcher {
    str_pred(predicates::str::ends_with(suffix))
}

pub fn contains_str(needle: &str) -> Matcher {
    str_pred(predicates::str::contains(needle))
}

pub fn eq_ignore_case(s: &str) -> Matcher {
    let expected = s.to_lowercase();
    described(format!("eq_ignore_case({s:?})"), move |v| {
        v.as_str().is_some_and(|a| a.to_lowercase() == expected)
    })
}

/// Accept strings matching a regular expression.
///
/// # Errors
///
/// [`Error::Configuration`] if the pattern does not compile.
pub fn matches_regex(pattern: &str) -> Result<Matcher> {
    predicates::str::is_match(pattern)
        .map(str_pred)
        .map_err(|e| Error::config(format!("bad regex {pattern:?}: {e}")))
}

/// Accept anything, appending it to `captor` whenever the expectation that
/// owns this matcher is selected.
pub fn capture(captor: &Captor) -> Matcher {
    Matcher::Capture(captor.clone())
}

/// Accept arrays positionally equal to `values`, with the same length.
pub fn ary_eq<I, V>(values: I) -> Matcher
    where I: IntoIterator<Item=V>, V: Into<Value>
{
    array(values.into_iter().map(eq))
}

/// Accept arrays whose elements satisfy `ms`, position by position.
pub fn array<I: IntoIterator<Item=Matcher>>(ms: I) -> Matcher {
    Matcher::Array(SeqShape {
        elements: Some(ms.into_iter().collect()),
        ..SeqShape::default()
    })
}

pub fn array_with_len(len: Matcher) -> Matcher {
    Matcher::Array(SeqShape{len: Some(Box::new(len)), ..SeqShape::default()})
}

/// Accept arrays with at least one element satisfying `m`.
pub fn array_with(m: Matcher) -> Matcher {
    array_with_all([m])
}

/// Accept arrays where each of `ms` is satisfied by at least one element.
pub fn array_with_all<I: IntoIterator<Item=Matcher>>(ms: I) -> Matcher {
    Matcher::Array(SeqShape {
        contains: ms.into_iter().collect(),
        ..SeqShape::default()
    })
}

pub fn collection_with_len(len: Matcher) -> Matcher {
    Matcher::Collection(SeqShape {
        len: Some(Box::new(len)),
        ..SeqShape::default()
    })
}

pub fn collection_with(m: Matcher) -> Matcher {
    collection_with_all([m])
}

pub fn collection_with_all<I: IntoIterator<Item=Matcher>>(ms: I) -> Matcher {
    Matcher::Collection(SeqShape {
        contains: ms.into_iter().collect(),
        ..SeqShape::default()
    })
}

pub fn map_with_len(len: Matcher) -> Matcher {
    Matcher::Map(MapShape{len: Some(Box::new(len)), ..MapShape::default()})
}

pub fn map_with_key(key: Matcher) -> Matcher {
    Matcher::Map(MapShape{key: Some(Box::new(key)), ..MapShape::default()})
}

pub fn map_with_value(value: Matcher) -> Matcher {
    Matcher::Map(MapShape {
        value: Some(Box::new(value)),
        ..MapShape::default()
    })
}

/// Accept maps with at least one entry satisfying both matchers.
pub fn map_with_entry(key: Matcher, value: Matcher) -> Matcher {
    Matcher::Map(MapShape {
        len: None,
        key: Some(Box::new(key)),
        value: Some(Box::new(value)),
    })
}

#[cfg(test)]
mod t {
    use super::*;

    fn v<T: Into<Value>>(t: T) -> Value {
        t.into()
    }

    #[test]
    fn dry_run_never_captures() {
        let c = Captor::new();
        let m = and([capture(&c), eq(5)]);
        assert!(m.matches(&v(5)));
        assert!(!m.matches(&v(6)));
        assert!(c.is_empty());
        m.commit(&v(5));
        assert_eq!(vec![v(5)], c.values());
    }

    #[test]
    fn or_commits_only_first_accepting_branch() {
        let c0 = Captor::new();
        let c1 = Captor::new();
        let m = or([and([eq(1), capture(&c0)]), capture(&c1)]);
        assert!(m.matches(&v(2)));
        m.commit(&v(2));
        assert!(c0.is_empty());
        assert_eq!(1, c1.len());

        m.commit(&v(1));
        assert_eq!(Some(v(1)), c0.last());
        assert_eq!(1, c1.len());
    }

    #[test]
    fn not_never_commits() {
        let c = Captor::new();
        let m = not(and([capture(&c), eq(3)]));
        assert!(m.matches(&v(4)));
        m.commit(&v(4));
        assert!(c.is_empty());
    }

    #[test]
    fn range_across_numeric_variants() {
        let m = between(1, 3);
        assert!(m.matches(&v(1u8)));
        assert!(m.matches(&v(2.5)));
        assert!(m.matches(&v(3i64)));
        assert!(!m.matches(&v(3.01)));
        assert!(!m.matches(&v("2")));
        assert!(lt("b").matches(&v("a")));
    }

    #[test]
    fn ary_eq_requires_length_and_null_equality() {
        let m = ary_eq([Value::from(1), Value::Null]);
        assert!(m.matches(&Value::array([Value::from(1), Value::Null])));
        assert!(!m.matches(&Value::array([Value::from(1)])));
        assert!(!m.matches(&Value::array([1, 2])));
        // Lists are not arrays
        assert!(!m.matches(&Value::list([Value::from(1), Value::Null])));
    }

    #[test]
    fn with_all_is_existential_per_matcher() {
        let m = array_with_all([eq(3), eq(1)]);
        assert!(m.matches(&Value::array([1, 2, 3])));
        assert!(!m.matches(&Value::array([1, 2])));
        // One element may satisfy several matchers
        assert!(array_with_all([gt(0), lt(2)]).matches(&Value::array([1])));
    }

    #[test]
    fn contains_commits_first_accepting_element() {
        let c = Captor::new();
        let m = collection_with(and([gt(1), capture(&c)]));
        let list = Value::list([1, 2, 3]);
        assert!(m.matches(&list));
        m.commit(&list);
        assert_eq!(vec![v(2)], c.values());
    }

    #[test]
    fn map_shapes() {
        let map = Value::map([("a", 1), ("b", 2)]);
        assert!(map_with_key(eq("a")).matches(&map));
        assert!(map_with_value(eq(2)).matches(&map));
        assert!(map_with_entry(eq("b"), eq(2)).matches(&map));
        assert!(!map_with_entry(eq("a"), eq(2)).matches(&map));
        assert!(map_with_len(eq(2)).matches(&map));
        assert!(!map_with_len(eq(3)).matches(&map));
    }

    #[test]
    fn string_predicates() {
        assert!(starts_with("foo").matches(&v("foobar")));
        assert!(!starts_with("foo").matches(&v(42)));
        assert!(eq_ignore_case("HeLLo").matches(&v("hello")));
        assert!(matches_regex("^a+b$").unwrap().matches(&v("aaab")));
        assert!(matches!(matches_regex("("), Err(Error::Configuration(_))));
    }

    #[test]
    fn explain_predicate_uses_case_tree() {
        let m = function(|v: &Value| v.as_i64() == Some(1));
        assert!(!m.explain(&v(2)).is_empty());
        assert_eq!("2 did not satisfy eq(1)", eq(1).explain(&v(2)));
    }

    #[test]
    fn display() {
        assert_eq!("not(eq(\"x\"))", ne("x").to_string());
        assert_eq!("range(geq(1), leq(3))", between(1, 3).to_string());
        assert_eq!("array([eq(1), eq(2)])", ary_eq([1, 2]).to_string());
        assert_eq!("kind_of(Str)", kind_of(Kind::Str).to_string());
    }
}
