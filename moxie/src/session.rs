// vim: tw=80
//! The engine context that owns every mock, group, expectation and record.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId}
};

use tracing::{debug, trace};

use crate::{
    Behavior,
    Check,
    Delegate,
    Error,
    ExpectationBuilder,
    ExpectationId,
    GroupId,
    GroupOptions,
    Invocation,
    InvocationRecord,
    MockId,
    Outcome,
    RecordedOutcome,
    Result,
    Signature,
    Times,
    Value,
    dispatch::{self, Selection},
    expectation::Expectation,
    group::Group,
    invocation::InvocationLog,
    verify
};

/// Per-mock dispatch policy.
///
/// Options are combined with [`merge`](#method.merge).  Unset options take
/// their defaults: strict, non-partial and unordered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MockOptions {
    strict: Option<bool>,
    partial: Option<bool>,
    ordered: Option<bool>,
}

impl MockOptions {
    /// Unmatched calls fail.
    pub const fn strict() -> Self {
        MockOptions{strict: Some(true), partial: None, ordered: None}
    }

    /// Unmatched calls return a default value.
    pub const fn permissive() -> Self {
        MockOptions{strict: Some(false), partial: None, ordered: None}
    }

    /// Unmatched calls made to permissive mocks run the real implementation
    /// when the member has one.
    pub const fn partial() -> Self {
        MockOptions{strict: None, partial: Some(true), ordered: None}
    }

    /// Every expectation on the mock must be invoked in declaration order.
    pub const fn ordered() -> Self {
        MockOptions{strict: None, partial: None, ordered: Some(true)}
    }

    pub const fn unordered() -> Self {
        MockOptions{strict: None, partial: None, ordered: Some(false)}
    }

    /// Combine two sets of options.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if they disagree about any setting.
    pub fn merge(self, other: MockOptions) -> Result<Self> {
        fn one(name: &str, a: Option<bool>, b: Option<bool>)
            -> Result<Option<bool>>
        {
            match (a, b) {
                (Some(x), Some(y)) if x != y => Err(Error::config(format!(
                    "contradictory mock options: {name} both set and unset"))),
                _ => Ok(a.or(b))
            }
        }
        Ok(MockOptions {
            strict: one("strict", self.strict, other.strict)?,
            partial: one("partial", self.partial, other.partial)?,
            ordered: one("ordered", self.ordered, other.ordered)?,
        })
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    pub fn is_partial(&self) -> bool {
        self.partial.unwrap_or(false)
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered.unwrap_or(false)
    }
}

/// Which mocks or groups an operation applies to.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Scope {
    #[default]
    All,
    Mocks(Vec<MockId>),
    /// Every member expectation of these groups.
    Groups(Vec<GroupId>),
}

impl From<MockId> for Scope {
    fn from(id: MockId) -> Self {
        Scope::Mocks(vec![id])
    }
}

impl From<GroupId> for Scope {
    fn from(id: GroupId) -> Self {
        Scope::Groups(vec![id])
    }
}

impl From<Vec<MockId>> for Scope {
    fn from(ids: Vec<MockId>) -> Self {
        Scope::Mocks(ids)
    }
}

impl From<Vec<GroupId>> for Scope {
    fn from(ids: Vec<GroupId>) -> Self {
        Scope::Groups(ids)
    }
}

impl Scope {
    pub(crate) fn covers(&self, e: &Expectation) -> bool {
        match self {
            Scope::All => true,
            Scope::Mocks(ms) => ms.contains(&e.mock),
            Scope::Groups(gs) => e.groups.iter().any(|g| gs.contains(g)),
        }
    }

    pub(crate) fn covers_record(&self, r: &InvocationRecord,
                                exps: &BTreeMap<ExpectationId, Expectation>)
        -> bool
    {
        match self {
            Scope::All => true,
            Scope::Mocks(ms) => ms.contains(&r.mock),
            Scope::Groups(_) => r.matched
                .and_then(|id| exps.get(&id))
                .is_some_and(|e| self.covers(e)),
        }
    }

    pub(crate) fn covers_group(&self, g: &Group, state: &State) -> bool {
        match self {
            Scope::All => true,
            Scope::Groups(gs) => gs.contains(&g.id),
            Scope::Mocks(ms) => {
                state.mocks.iter()
                    .any(|m| m.group == Some(g.id) && ms.contains(&m.id)) ||
                g.members().iter()
                    .filter_map(|id| state.expectations.get(id))
                    .any(|e| ms.contains(&e.mock))
            }
        }
    }
}

pub(crate) struct MockInfo {
    pub(crate) id: MockId,
    pub(crate) name: String,
    pub(crate) options: MockOptions,
    /// Class mocks are keyed by owner, and shared by every caller.
    class: bool,
    /// Implicit group of an ordered mock.
    pub(crate) group: Option<GroupId>,
    /// The real object behind a spy.
    spy: Option<Arc<dyn Delegate>>,
}

impl MockInfo {
    /// What a call does when no behavior was declared for it: forward to
    /// the spied object, run the original method of a partial mock, or
    /// return the default value.
    pub(crate) fn default_behavior(&self, signature: &Signature) -> Behavior
    {
        if let Some(d) = &self.spy {
            Behavior::DelegateTo(d.clone())
        } else if self.options.is_partial() && signature.supports_original() {
            Behavior::CallOriginal
        } else {
            Behavior::Return(signature.default_return())
        }
    }
}

/// The first unexpected invocation seen off the owning thread since the last
/// verify or reset.  Later ones are only counted.
#[derive(Debug, Default)]
pub(crate) struct Background {
    first: Option<String>,
    suppressed: usize,
}

impl Background {
    /// Returns false if an earlier failure is already pending.
    pub(crate) fn record(&mut self, msg: String) -> bool {
        if self.first.is_none() {
            self.first = Some(msg);
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Read and clear.
    pub(crate) fn take(&mut self) -> Option<(String, usize)> {
        let suppressed = std::mem::take(&mut self.suppressed);
        self.first.take().map(|msg| (msg, suppressed))
    }
}

/// Everything guarded by the session lock.
#[derive(Default)]
pub(crate) struct State {
    pub(crate) mocks: Vec<MockInfo>,
    pub(crate) groups: Vec<Group>,
    pub(crate) expectations: BTreeMap<ExpectationId, Expectation>,
    next_expectation: usize,
    pub(crate) log: InvocationLog,
    pub(crate) background: Background,
}

impl State {
    pub(crate) fn mock_info(&self, id: MockId) -> Result<&MockInfo> {
        self.mocks.get(id.0)
            .ok_or_else(|| Error::config(format!("unknown mock {id:?}")))
    }

    pub(crate) fn group_info(&self, id: GroupId) -> Result<&Group> {
        self.groups.get(id.0)
            .ok_or_else(|| Error::config(format!("unknown group {id:?}")))
    }

    pub(crate) fn mock_name(&self, id: MockId) -> &str {
        self.mocks.get(id.0).map_or("<unknown>", |m| m.name.as_str())
    }

    pub(crate) fn next_expectation_id(&mut self) -> ExpectationId {
        let id = ExpectationId(self.next_expectation);
        self.next_expectation += 1;
        id
    }

    fn add_group(&mut self, name: String, options: GroupOptions) -> GroupId {
        let id = GroupId(self.groups.len());
        trace!(group = ?id, name = %name, ordered = options.ordered,
               "new group");
        self.groups.push(Group::new(id, name, options));
        id
    }

    fn add_mock(&mut self, name: String, options: MockOptions, class: bool,
                spy: Option<Arc<dyn Delegate>>) -> MockId
    {
        let id = MockId(self.mocks.len());
        let group = options.is_ordered()
            .then(|| self.add_group(name.clone(), GroupOptions::ordered()));
        trace!(mock = ?id, name = %name, ?options, spy = spy.is_some(),
               "new mock");
        self.mocks.push(MockInfo{id, name, options, class, group, spy});
        id
    }

    /// Replace a mock's options, creating or dropping its implicit group.
    fn rearm(&mut self, id: MockId, options: MockOptions) -> Result<()> {
        let m = self.mock_info(id)?;
        let group = match (options.is_ordered(), m.group) {
            (true, None) => {
                let name = m.name.clone();
                Some(self.add_group(name, GroupOptions::ordered()))
            },
            (true, g) => g,
            (false, _) => None
        };
        let m = &mut self.mocks[id.0];
        trace!(mock = ?id, name = %m.name, ?options, "new options");
        m.options = options;
        m.group = group;
        Ok(())
    }
}

struct Inner {
    owner: ThreadId,
    state: Mutex<State>,
}

/// One logical test context.
///
/// A `Session` is a cheap handle that may be cloned and shared with every
/// thread the code under test spawns.  The thread that created it is its
/// owner: unexpected invocations on that thread fail immediately, while
/// those on other threads are deferred until the next
/// [`verify`](#method.verify).
///
/// # Examples
/// ```
/// # use moxie::*;
/// let session = Session::new();
/// let list = session.mock("list");
/// let add = Signature::new("List", "add").param(Kind::Str)
///     .returns(Kind::Bool);
/// session.expect(list, add.clone())
///     .with_args(["foo"])
///     .returning_value(true)
///     .declare()
///     .unwrap();
/// assert_eq!(Outcome::Return(Value::from(true)),
///            session.call(list, &add, &[Value::from("foo")]).unwrap());
/// session.verify(Scope::All).unwrap();
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            inner: Arc::new(Inner {
                owner: thread::current().id(),
                state: Mutex::new(State::default())
            })
        }
    }

    /// Every critical section leaves the state consistent, so a lock
    /// poisoned by a panicking handler is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The thread whose unexpected invocations fail synchronously.
    pub fn owner(&self) -> ThreadId {
        self.inner.owner
    }

    fn on_owner(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// Create a strict, unordered mock.
    pub fn mock(&self, name: &str) -> MockId {
        self.mock_with(name, MockOptions::default())
    }

    pub fn mock_with(&self, name: &str, options: MockOptions) -> MockId {
        self.lock().add_mock(name.to_owned(), options, false, None)
    }

    /// Create a mock wrapping a real object.  Calls that no declared
    /// behavior handles are forwarded to `delegate`, once each.  The mock is
    /// otherwise like any other: strict by default, and checkable.
    pub fn spy<D>(&self, name: &str, delegate: D, options: MockOptions)
        -> MockId
        where D: Delegate + 'static
    {
        self.lock().add_mock(name.to_owned(), options, false,
                             Some(Arc::new(delegate)))
    }

    /// The mock for the static members of `owner`.  Every call with the same
    /// owner yields the same mock.
    pub fn class_mock(&self, owner: &str) -> MockId {
        self.class_mock_with(owner, MockOptions::default())
    }

    /// Like [`class_mock`](#method.class_mock).  The options only apply when
    /// the class mock is first created.
    pub fn class_mock_with(&self, owner: &str, options: MockOptions)
        -> MockId
    {
        let mut state = self.lock();
        if let Some(m) = state.mocks.iter().find(|m| m.class && m.name == owner)
        {
            return m.id;
        }
        state.add_mock(owner.to_owned(), options, true, None)
    }

    pub fn mock_name(&self, id: MockId) -> Option<String> {
        self.lock().mocks.get(id.0).map(|m| m.name.clone())
    }

    /// Create an ordered group.
    pub fn group(&self, name: &str) -> GroupId {
        self.group_with(name, GroupOptions::default())
    }

    pub fn group_with(&self, name: &str, options: GroupOptions) -> GroupId {
        self.lock().add_group(name.to_owned(), options)
    }

    /// Bound the summed consumption of every member of an ordered group.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the group is unordered or already has a
    /// bound.
    pub fn group_times(&self, group: GroupId, times: Times) -> Result<()> {
        let mut state = self.lock();
        state.group_info(group)?;
        let g = &mut state.groups[group.0];
        if !g.ordered {
            return Err(Error::config(format!(
                "group {:?} is unordered; only ordered groups may have a \
                 number of times", g.name)));
        }
        if g.times.is_some() {
            return Err(Error::config(format!(
                "already specified number of times for group {:?}", g.name)));
        }
        g.times = Some(times);
        Ok(())
    }

    /// Start declaring an expectation.  It must be invoked at least once
    /// unless configured otherwise.
    pub fn expect(&self, mock: MockId, signature: Signature)
        -> ExpectationBuilder
    {
        ExpectationBuilder::new(self.clone(), mock, signature, false)
    }

    /// Start declaring an expectation that may be invoked any number of
    /// times, in any order.
    pub fn stub(&self, mock: MockId, signature: Signature)
        -> ExpectationBuilder
    {
        ExpectationBuilder::new(self.clone(), mock, signature, true)
    }

    /// Route one invocation to its expectation and run the selected
    /// behavior.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedInvocation`] if a strict mock has no eligible
    /// expectation and the call was made on the owning thread, or
    /// [`Error::Configuration`] if a stateful handler was re-entered.
    pub fn dispatch(&self, inv: Invocation) -> Result<Outcome> {
        let selection = {
            let mut state = self.lock();
            dispatch::select(&mut state, &inv, self.inner.owner)
        };
        match selection {
            Selection::Run{seq, behavior} => {
                let r = behavior.run(&inv.signature, &inv.args);
                let recorded = match &r {
                    Ok(outcome) => outcome.into(),
                    Err(e) => RecordedOutcome::Failed(e.message().to_owned())
                };
                self.lock().log.complete(seq, recorded);
                r
            },
            Selection::Fallback(outcome) => Ok(outcome),
            Selection::Failed(e) => Err(e),
        }
    }

    /// Convenience wrapper around [`dispatch`](#method.dispatch) for a call
    /// on the current thread.
    pub fn call(&self, mock: MockId, signature: &Signature, args: &[Value])
        -> Result<Outcome>
    {
        self.dispatch(Invocation::new(mock, signature.clone(),
                                      args.iter().cloned()))
    }

    /// Check that every expectation in scope was invoked often enough, and
    /// surface any failure deferred from another thread.
    ///
    /// Verification does not change the expectations, so it may be repeated.
    /// A deferred failure is only surfaced, and cleared, by a verify running
    /// on the owning thread.
    ///
    /// # Errors
    ///
    /// [`Error::FailedVerification`] describing every failure found.
    pub fn verify<S: Into<Scope>>(&self, scope: S) -> Result<()> {
        let scope = scope.into();
        let r = verify::verify(&mut self.lock(), &scope, self.on_owner());
        debug!(?scope, ok = r.is_ok(), "verify");
        r
    }

    /// Verify, and reset the scope if verification passed.
    pub fn verify_and_reset<S: Into<Scope>>(&self, scope: S) -> Result<()> {
        let scope = scope.into();
        let mut state = self.lock();
        verify::verify(&mut state, &scope, self.on_owner())?;
        verify::reset(&mut state, &scope);
        Ok(())
    }

    /// Verify one mock, and if that passed, reset it with new options.
    pub fn verify_and_reset_with(&self, mock: MockId, options: MockOptions)
        -> Result<()>
    {
        let scope = Scope::from(mock);
        let mut state = self.lock();
        state.mock_info(mock)?;
        verify::verify(&mut state, &scope, self.on_owner())?;
        verify::reset(&mut state, &scope);
        state.rearm(mock, options)
    }

    /// Forget the scope's expectations and invocations, rewind the groups
    /// they belong to, and clear any deferred failure.
    pub fn reset<S: Into<Scope>>(&self, scope: S) {
        let scope = scope.into();
        verify::reset(&mut self.lock(), &scope);
        debug!(?scope, "reset");
    }

    /// Reset one mock and replace its options, for example to turn a strict
    /// mock permissive.  Making a mock ordered gives it a fresh implicit
    /// group.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the mock is unknown.
    pub fn reset_with(&self, mock: MockId, options: MockOptions) -> Result<()>
    {
        let mut state = self.lock();
        state.mock_info(mock)?;
        verify::reset(&mut state, &Scope::from(mock));
        debug!(?mock, ?options, "reset with new options");
        state.rearm(mock, options)
    }

    /// Start a post-hoc query over the invocations of `mock`.
    pub fn check(&self, mock: MockId) -> Check {
        Check::new(self.clone(), mock)
    }

    /// # Errors
    ///
    /// [`Error::UncheckedInvocation`] if any invocation in scope was not
    /// accounted for by a successful check.
    pub fn check_nothing_else_happened<S: Into<Scope>>(&self, scope: S)
        -> Result<()>
    {
        verify::nothing_else(&self.lock(), &scope.into(), false)
    }

    /// Like
    /// [`check_nothing_else_happened`](#method.check_nothing_else_happened),
    /// but ignores invocations that an expectation accepted.
    pub fn check_nothing_else_unexpected_happened<S: Into<Scope>>(&self,
                                                                 scope: S)
        -> Result<()>
    {
        verify::nothing_else(&self.lock(), &scope.into(), true)
    }

    /// A snapshot of the recorded invocations in scope, oldest first.
    pub fn invocations<S: Into<Scope>>(&self, scope: S)
        -> Vec<InvocationRecord>
    {
        let scope = scope.into();
        let state = self.lock();
        state.log.iter()
            .filter(|r| scope.covers_record(r, &state.expectations))
            .cloned()
            .collect()
    }

    /// How many invocations an expectation has accepted, or `None` if it was
    /// reset.
    pub fn consumed(&self, id: ExpectationId) -> Option<usize> {
        self.lock().expectations.get(&id).map(|e| e.consumed)
    }
}
