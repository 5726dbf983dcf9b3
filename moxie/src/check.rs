// vim: tw=80
//! Post-hoc queries over the invocation log.

use tracing::debug;

use crate::{
    Error,
    GroupId,
    Matcher,
    MockId,
    Result,
    Session,
    Signature,
    Times
};

/// A query counting the recorded invocations of one member of one mock,
/// created by [`Session::check`].
///
/// The count must lie within the cardinality, which defaults to
/// [`Times::once`].  Every invocation counted by a successful check is marked
/// as consulted, for the benefit of
/// [`check_nothing_else_happened`](Session::check_nothing_else_happened).
///
/// # Examples
/// ```
/// # use moxie::*;
/// # use moxie::matcher::*;
/// let session = Session::new();
/// let log = session.mock_with("log", MockOptions::permissive());
/// let write = Signature::new("Log", "write").param(Kind::Str);
/// session.call(log, &write, &[Value::from("hello")]).unwrap();
///
/// session.check(log).on(&write, &[starts_with("he")]).unwrap();
/// session.check(log).did_not().on(&write, &[eq("bye")]).unwrap();
/// session.check_nothing_else_happened(Scope::All).unwrap();
/// ```
#[must_use = "a check does nothing until `on` is called"]
pub struct Check {
    session: Session,
    mock: MockId,
    negated: bool,
    unexpectedly: bool,
    times: Option<Times>,
    groups: Vec<GroupId>,
    returned: Option<Matcher>,
    threw: Option<Matcher>,
    error: Option<Error>,
}

impl Check {
    pub(crate) fn new(session: Session, mock: MockId) -> Self {
        Check {
            session,
            mock,
            negated: false,
            unexpectedly: false,
            times: None,
            groups: Vec::new(),
            returned: None,
            threw: None,
            error: None
        }
    }

    fn fail(&mut self, msg: &str) {
        self.error.get_or_insert_with(|| Error::config(msg));
    }

    /// Invert the check: it passes when the count is outside the
    /// cardinality.
    pub fn did_not(mut self) -> Self {
        if self.negated {
            self.fail("no double negatives!");
        }
        self.negated = true;
        self
    }

    /// Only count invocations that no expectation accepted.
    pub fn unexpectedly(mut self) -> Self {
        if self.unexpectedly {
            self.fail("unexpectedly() was already specified");
        }
        self.unexpectedly = true;
        self
    }

    pub fn times(mut self, times: Times) -> Self {
        if self.times.is_some() {
            self.fail("already specified number of times");
        }
        self.times = Some(times);
        self
    }

    pub fn never(self) -> Self {
        self.times(Times::never())
    }

    pub fn once(self) -> Self {
        self.times(Times::once())
    }

    pub fn at_least_once(self) -> Self {
        self.times(Times::at_least_once())
    }

    pub fn any_times(self) -> Self {
        self.times(Times::any())
    }

    /// Only count invocations whose return value `m` accepts.
    pub fn returned(mut self, m: Matcher) -> Self {
        if self.returned.is_some() {
            self.fail("returned() was already specified");
        }
        self.returned = Some(m);
        self
    }

    /// Only count invocations whose thrown value `m` accepts.
    pub fn threw(mut self, m: Matcher) -> Self {
        if self.threw.is_some() {
            self.fail("threw() was already specified");
        }
        self.threw = Some(m);
        self
    }

    /// Order this check after the previous successful checks in `group`.
    /// The group must be ordered.
    pub fn in_group(mut self, group: GroupId) -> Self {
        if !self.groups.is_empty() {
            self.fail("group(s) already specified for this check");
        }
        self.groups.push(group);
        self
    }

    /// Run the check against invocations of `signature` whose arguments are
    /// accepted by `matchers`.  An empty matcher list accepts any arguments.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the check was misconfigured, or
    /// [`Error::FailedCheck`] if the count is wrong.
    pub fn on(self, signature: &Signature, matchers: &[Matcher]) -> Result<()>
    {
        if let Some(e) = self.error {
            return Err(e);
        }
        if !matchers.is_empty() && matchers.len() != signature.arity() {
            return Err(Error::config(format!(
                "{signature} takes {} arguments but {} matchers were given",
                signature.arity(), matchers.len())));
        }
        let times = self.times.unwrap_or(Times::once());

        let mut state = self.session.lock();
        let mut cursor = 0;
        for g in &self.groups {
            let group = state.group_info(*g)?;
            if !group.ordered {
                return Err(Error::config(format!(
                    "must perform checks using ordered groups; {:?} is \
                     unordered", group.name)));
            }
            cursor = cursor.max(group.check_cursor);
        }

        let hits = state.log.iter()
            .filter(|r| r.seq >= cursor)
            .filter(|r| r.mock == self.mock && r.signature == *signature)
            .filter(|r| matchers.is_empty() ||
                (r.args.len() == matchers.len() &&
                 matchers.iter().zip(&r.args).all(|(m, a)| m.matches(a))))
            .filter(|r| !self.unexpectedly || r.matched.is_none())
            .filter(|r| self.threw.as_ref().map_or(true, |m| {
                r.outcome.thrown().is_some_and(|v| m.matches(v))
            }))
            .filter(|r| self.returned.as_ref().map_or(true, |m| {
                r.outcome.returned().is_some_and(|v| m.matches(v))
            }))
            .map(|r| r.seq)
            .collect::<Vec<_>>();

        let count = hits.len();
        let satisfied = times.allows(count);
        debug!(mock = state.mock_name(self.mock), %signature, count,
               negated = self.negated, satisfied, "check");
        if self.negated {
            if satisfied {
                return Err(Error::FailedCheck(format!(
                    "check matched {count} invocation(s) of {}.{} but was \
                     expected not to match {times} times",
                    state.mock_name(self.mock), signature.name())));
            }
            return Ok(());
        }
        if !satisfied {
            return Err(Error::FailedCheck(format!(
                "check failed to match the correct number of method \
                 invocations: {}.{} matched {count} but expected {times} \
                 times", state.mock_name(self.mock), signature.name())));
        }
        for r in state.log.iter().filter(|r| hits.contains(&r.seq)) {
            for (m, a) in matchers.iter().zip(&r.args) {
                m.commit(a);
            }
        }
        state.log.mark_consulted(&hits);
        if let Some(last) = hits.last() {
            for g in &self.groups {
                state.groups[g.0].check_cursor = last + 1;
            }
        }
        Ok(())
    }
}
