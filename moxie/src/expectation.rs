// vim: tw=80
//! Declared expectations and the fluent builder that creates them.

use std::{
    fmt,
    sync::Arc
};

use tracing::trace;

use crate::{
    behavior::BehaviorQueue,
    Behavior,
    Delegate,
    Error,
    ExpectationId,
    GroupId,
    Invocation,
    Matcher,
    MockId,
    Outcome,
    Result,
    Session,
    Signature,
    Times,
    Value,
    matcher
};

type ArgsPredicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// One declared rule, as held by the session.
pub(crate) struct Expectation {
    pub(crate) id: ExpectationId,
    pub(crate) mock: MockId,
    pub(crate) signature: Signature,
    pub(crate) matchers: Vec<Matcher>,
    withf: Option<ArgsPredicate>,
    pub(crate) times: Times,
    pub(crate) consumed: usize,
    pub(crate) groups: Vec<GroupId>,
    pub(crate) at_any_time: bool,
    pub(crate) behaviors: BehaviorQueue,
}

impl Expectation {
    /// Dry run: would this expectation accept `inv`, ignoring cardinality
    /// and ordering?
    pub(crate) fn accepts(&self, inv: &Invocation) -> bool {
        self.targets(inv) && self.args_match(&inv.args)
    }

    /// Same mock and same member?
    pub(crate) fn targets(&self, inv: &Invocation) -> bool {
        self.mock == inv.mock && self.signature == inv.signature
    }

    fn args_match(&self, args: &[Value]) -> bool {
        self.matchers.len() == args.len() &&
            self.matchers.iter().zip(args).all(|(m, a)| m.matches(a)) &&
            self.withf.as_ref().map_or(true, |f| f(args))
    }

    /// Fire the captures of the accepting evaluation path.
    pub(crate) fn commit(&self, args: &[Value]) {
        for (m, a) in self.matchers.iter().zip(args) {
            m.commit(a);
        }
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.times.is_satisfied(self.consumed)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.times.is_exhausted(self.consumed)
    }

    /// Why didn't this expectation accept `args`?
    pub(crate) fn explain(&self, args: &[Value]) -> String {
        if self.matchers.len() != args.len() {
            return format!("expected {} arguments but got {}",
                           self.matchers.len(), args.len());
        }
        for (i, (m, a)) in self.matchers.iter().zip(args).enumerate() {
            if !m.matches(a) {
                return format!("argument {i}: {}", m.explain(a));
            }
        }
        String::from("argument predicate rejected the call")
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expectation {} {}::{}(", self.id, self.signature.owner(),
               self.signature.name())?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str(")")
    }
}

/// Fluent configuration of one expectation, created by
/// [`Session::expect`] or [`Session::stub`].
///
/// Misconfiguration is reported by [`declare`](#method.declare), which must
/// be called to register the expectation.
#[must_use = "an expectation has no effect until it is declared"]
pub struct ExpectationBuilder {
    session: Session,
    mock: MockId,
    signature: Signature,
    matchers: Option<Vec<Matcher>>,
    withf: Option<ArgsPredicate>,
    times: Option<Times>,
    groups: Vec<GroupId>,
    at_any_time: bool,
    stub: bool,
    behaviors: BehaviorQueue,
    error: Option<Error>,
}

impl ExpectationBuilder {
    pub(crate) fn new(session: Session, mock: MockId, signature: Signature,
                      stub: bool) -> Self
    {
        ExpectationBuilder {
            session,
            mock,
            signature,
            matchers: None,
            withf: None,
            times: None,
            groups: Vec::new(),
            at_any_time: false,
            stub,
            behaviors: BehaviorQueue::default(),
            error: None
        }
    }

    fn fail(&mut self, msg: String) {
        self.error.get_or_insert(Error::Configuration(msg));
    }

    /// Set positional argument matchers, one per parameter.  Without them
    /// any arguments are accepted.
    pub fn with<I: IntoIterator<Item=Matcher>>(mut self, matchers: I) -> Self
    {
        if self.matchers.is_some() {
            self.fail(format!("arguments already specified for {}",
                              self.signature));
        }
        self.matchers = Some(matchers.into_iter().collect());
        self
    }

    /// Shorthand for [`with`](#method.with) using an equality matcher for
    /// every argument.
    pub fn with_args<I, V>(self, args: I) -> Self
        where I: IntoIterator<Item=V>, V: Into<Value>
    {
        self.with(args.into_iter().map(matcher::eq))
    }

    /// Add a predicate over the whole argument list, evaluated after the
    /// positional matchers.
    pub fn withf<F>(mut self, f: F) -> Self
        where F: Fn(&[Value]) -> bool + Send + Sync + 'static
    {
        if self.withf.is_some() {
            self.fail(format!("argument predicate already specified for {}",
                              self.signature));
        }
        self.withf = Some(Arc::new(f));
        self
    }

    /// Set the cardinality.  Defaults to [`Times::at_least_once`], or to
    /// [`Times::any`] for stubs.
    pub fn times(mut self, times: Times) -> Self {
        if self.times.is_some() {
            self.fail(format!("already specified number of times for {}",
                              self.signature));
        }
        self.times = Some(times);
        self
    }

    /// Like [`times`](#method.times) with [`Times::between`], deferring a
    /// bad range to [`declare`](#method.declare).
    pub fn times_between(mut self, min: usize, max: usize) -> Self {
        match Times::between(min, max) {
            Ok(t) => self.times(t),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    pub fn never(self) -> Self {
        self.times(Times::never())
    }

    pub fn once(self) -> Self {
        self.times(Times::once())
    }

    pub fn any_times(self) -> Self {
        self.times(Times::any())
    }

    /// Join a group.  An expectation may belong to several groups.
    pub fn in_group(mut self, group: GroupId) -> Self {
        if self.groups.contains(&group) {
            self.fail(format!("already in group {group:?}"));
        }
        self.groups.push(group);
        self
    }

    /// Exempt this expectation from the ordering of its groups and of its
    /// mock.
    pub fn at_any_time(mut self) -> Self {
        if self.at_any_time {
            self.fail(format!("at_any_time already specified for {}",
                              self.signature));
        }
        self.at_any_time = true;
        self
    }

    /// Append a behavior to the queue.
    pub fn with_behavior(mut self, b: Behavior) -> Self {
        self.behaviors.push(b);
        self
    }

    /// Return a constant value.
    pub fn returning_value<V: Into<Value>>(self, v: V) -> Self {
        self.with_behavior(Behavior::Return(v.into()))
    }

    /// Alias for [`returning_value`](#method.returning_value).
    pub fn return_const<V: Into<Value>>(self, v: V) -> Self {
        self.returning_value(v)
    }

    pub fn throwing<V: Into<Value>>(self, e: V) -> Self {
        self.with_behavior(Behavior::Throw(e.into()))
    }

    /// Forward the call to a real object.
    pub fn delegate_to<D: Delegate + 'static>(self, d: D) -> Self {
        self.with_behavior(Behavior::DelegateTo(Arc::new(d)))
    }

    /// Compute the return value from the arguments.
    ///
    /// The closure may call back into the session, even through this same
    /// expectation.
    pub fn returning<F>(self, f: F) -> Self
        where F: Fn(&[Value]) -> Value + Send + Sync + 'static
    {
        self.with_behavior(Behavior::handler(move |args| {
            Outcome::Return(f(args))
        }))
    }

    /// Like [`returning`](#method.returning), but the closure may keep
    /// state.  A recursive call into the same closure fails with
    /// [`Error::Configuration`].
    pub fn returning_mut<F>(self, mut f: F) -> Self
        where F: FnMut(&[Value]) -> Value + Send + 'static
    {
        self.with_behavior(Behavior::handler_mut(move |args| {
            Outcome::Return(f(args))
        }))
    }

    /// Single-threaded version of [`returning_mut`](#method.returning_mut).
    /// Can be used when the closure isn't `Send`.
    ///
    /// It is a runtime error to call the mock method from a different thread
    /// than the one that originally called this method.
    pub fn returning_st<F>(self, mut f: F) -> Self
        where F: FnMut(&[Value]) -> Value + 'static
    {
        self.with_behavior(Behavior::handler_st(move |args| {
            Outcome::Return(f(args))
        }))
    }

    /// Compute the whole outcome from the arguments.
    pub fn handle_with<F>(self, f: F) -> Self
        where F: Fn(&[Value]) -> Outcome + Send + Sync + 'static
    {
        self.with_behavior(Behavior::handler(f))
    }

    pub fn handle_with_mut<F>(self, f: F) -> Self
        where F: FnMut(&[Value]) -> Outcome + Send + 'static
    {
        self.with_behavior(Behavior::handler_mut(f))
    }

    /// Ask the interception layer to run the real implementation.
    pub fn call_original(self) -> Self {
        self.with_behavior(Behavior::CallOriginal)
    }

    /// Return each value in turn, one per invocation.
    pub fn returning_consecutively<I, V>(self, values: I) -> Self
        where I: IntoIterator<Item=V>, V: Into<Value>
    {
        values.into_iter().fold(self, |b, v| b.returning_value(v))
    }

    /// Throw each value in turn, one per invocation.
    pub fn throwing_consecutively<I, V>(self, values: I) -> Self
        where I: IntoIterator<Item=V>, V: Into<Value>
    {
        values.into_iter().fold(self, |b, v| b.throwing(v))
    }

    /// Validate the configuration and register the expectation.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] on any misconfiguration.  Nothing is
    /// registered in that case.
    pub fn declare(self) -> Result<ExpectationId> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let arity = self.signature.arity();
        let matchers = match self.matchers {
            Some(m) if m.len() != arity => {
                return Err(Error::config(format!(
                    "{} takes {arity} arguments but {} matchers were given",
                    self.signature, m.len())));
            },
            Some(m) => m,
            None => vec![Matcher::Any; arity]
        };
        let times = match (self.times, self.stub) {
            (Some(t), _) => t,
            (None, true) => Times::any(),
            (None, false) => Times::default()
        };
        self.behaviors.validate(&self.signature, &times)?;

        let mut state = self.session.lock();
        let mock_group = state.mock_info(self.mock)?.group;
        let mut groups = self.groups;
        for g in &groups {
            state.group_info(*g)?;
        }
        if let Some(g) = mock_group {
            if !groups.contains(&g) {
                groups.push(g);
            }
        }
        let id = state.next_expectation_id();
        for g in &groups {
            state.groups[g.0].add(id);
        }
        trace!(expectation = %id, signature = %self.signature, %times,
               "declared");
        state.expectations.insert(id, Expectation {
            id,
            mock: self.mock,
            signature: self.signature,
            matchers,
            withf: self.withf,
            times,
            consumed: 0,
            groups,
            at_any_time: self.at_any_time || self.stub,
            behaviors: self.behaviors
        });
        Ok(id)
    }
}
