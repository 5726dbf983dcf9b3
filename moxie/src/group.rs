// vim: tw=80
//! Ordering and aggregate-count constraints across expectations.
//!
//! An ordered group keeps a cursor pointing at the member that is expected
//! next.  A call may only be dispatched to the cursor member, or to a later
//! member when every member in between is already satisfied.  Dispatching to
//! a member moves the cursor onto it, and once that member is exhausted the
//! cursor moves past it.  Members declared [`at_any_time`] are exempt from
//! ordering, but still count toward the group's total.
//!
//! [`at_any_time`]: crate::ExpectationBuilder::at_any_time

use std::collections::BTreeMap;

use crate::{
    expectation::Expectation,
    ExpectationId,
    GroupId,
    Times
};

/// Options for a new group.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupOptions {
    /// Must members be invoked in declaration order?
    pub ordered: bool,
}

impl GroupOptions {
    pub const fn ordered() -> Self {
        GroupOptions{ordered: true}
    }

    pub const fn unordered() -> Self {
        GroupOptions{ordered: false}
    }
}

impl Default for GroupOptions {
    fn default() -> Self {
        GroupOptions::ordered()
    }
}

#[derive(Debug)]
pub(crate) struct Group {
    pub(crate) id: GroupId,
    pub(crate) name: String,
    pub(crate) ordered: bool,
    /// Member expectations in declaration order.
    members: Vec<ExpectationId>,
    /// Bound on the summed consumption of every member.
    pub(crate) times: Option<Times>,
    /// Index into `members` of the member expected next.
    cursor: usize,
    /// Sequence number of the first invocation that group-scoped checks
    /// still consider.
    pub(crate) check_cursor: u64,
}

type Expectations = BTreeMap<ExpectationId, Expectation>;

impl Group {
    pub(crate) fn new(id: GroupId, name: String, options: GroupOptions)
        -> Self
    {
        Group {
            id,
            name,
            ordered: options.ordered,
            members: Vec::new(),
            times: None,
            cursor: 0,
            check_cursor: 0
        }
    }

    pub(crate) fn add(&mut self, id: ExpectationId) {
        self.members.push(id);
    }

    pub(crate) fn contains(&self, id: ExpectationId) -> bool {
        self.members.contains(&id)
    }

    pub(crate) fn members(&self) -> &[ExpectationId] {
        &self.members
    }

    /// Summed consumption of every member.
    pub(crate) fn total(&self, exps: &Expectations) -> usize {
        self.members.iter()
            .filter_map(|id| exps.get(id))
            .map(|e| e.consumed)
            .sum()
    }

    /// Is the group already at its overall limit?
    pub(crate) fn is_exhausted(&self, exps: &Expectations) -> bool {
        self.times.is_some_and(|t| t.is_exhausted(self.total(exps)))
    }

    /// May the next call be dispatched to member `id`?
    pub(crate) fn admits(&self, id: ExpectationId, exps: &Expectations)
        -> bool
    {
        if self.is_exhausted(exps) {
            return false;
        }
        if !self.ordered || exps.get(&id).is_some_and(|e| e.at_any_time) {
            return true;
        }
        let Some(p) = self.position(id) else {
            return false;
        };
        p >= self.cursor &&
            self.members[self.cursor..p].iter()
                .filter_map(|m| exps.get(m))
                .all(|e| e.at_any_time || e.is_satisfied())
    }

    /// Update the cursor after member `id` was selected.
    pub(crate) fn advance(&mut self, id: ExpectationId, exps: &Expectations) {
        if !self.ordered || exps.get(&id).is_some_and(|e| e.at_any_time) {
            return;
        }
        if let Some(p) = self.position(id) {
            self.cursor = p;
        }
        while let Some(e) = self.members.get(self.cursor)
            .and_then(|m| exps.get(m))
        {
            if e.at_any_time || e.is_exhausted() {
                self.cursor += 1;
            } else {
                break;
            }
        }
    }

    /// Forget the given members and start over.
    pub(crate) fn reset(&mut self, removed: &[ExpectationId]) {
        self.members.retain(|m| !removed.contains(m));
        self.cursor = 0;
        self.check_cursor = 0;
    }

    /// A message describing why the group total is out of bounds, if it is.
    pub(crate) fn failure(&self, exps: &Expectations) -> Option<String> {
        let times = self.times?;
        let total = self.total(exps);
        if times.allows(total) {
            None
        } else {
            Some(format!("group {:?}: invoked {total} of {times} times",
                         self.name))
        }
    }

    fn position(&self, id: ExpectationId) -> Option<usize> {
        self.members.iter().position(|m| *m == id)
    }
}
