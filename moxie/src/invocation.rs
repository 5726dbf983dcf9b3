// vim: tw=80
//! Invocation events and the log that records them.

use std::{
    fmt,
    thread::{self, ThreadId}
};

use crate::{ExpectationId, MockId, Outcome, Signature, Value};

/// One real call, normalized by the interception layer.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub mock: MockId,
    pub signature: Signature,
    pub args: Vec<Value>,
    /// The calling thread.  Defaults to the current thread.
    pub thread: ThreadId,
}

impl Invocation {
    pub fn new<I>(mock: MockId, signature: Signature, args: I) -> Self
        where I: IntoIterator<Item=Value>
    {
        Invocation {
            mock,
            signature,
            args: args.into_iter().collect(),
            thread: thread::current().id()
        }
    }

    /// Attribute the call to another thread.
    pub fn on_thread(mut self, thread: ThreadId) -> Self {
        self.thread = thread;
        self
    }
}

/// How a recorded invocation ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedOutcome {
    /// The selected behavior is still running.
    Pending,
    Returned(Value),
    Threw(Value),
    CalledOriginal,
    /// A strict mock rejected the call.
    Unexpected(String),
    /// The selected behavior could not run.
    Failed(String),
}

impl RecordedOutcome {
    pub fn returned(&self) -> Option<&Value> {
        match self {
            RecordedOutcome::Returned(v) => Some(v),
            _ => None
        }
    }

    pub fn thrown(&self) -> Option<&Value> {
        match self {
            RecordedOutcome::Threw(v) => Some(v),
            _ => None
        }
    }
}

impl From<&Outcome> for RecordedOutcome {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Return(v) => RecordedOutcome::Returned(v.clone()),
            Outcome::Throw(e) => RecordedOutcome::Threw(e.clone()),
            Outcome::CallOriginal => RecordedOutcome::CalledOriginal,
        }
    }
}

/// The log entry for one invocation.
#[derive(Clone, Debug)]
pub struct InvocationRecord {
    /// Monotonic within a session.
    pub seq: u64,
    pub mock: MockId,
    pub signature: Signature,
    pub args: Vec<Value>,
    pub thread: ThreadId,
    pub outcome: RecordedOutcome,
    /// The expectation that accepted the call, if any.
    pub matched: Option<ExpectationId>,
    /// Set once a successful `check` has accounted for this invocation.
    pub consulted: bool,
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.signature.name())?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{a}")?;
        }
        f.write_str(")")?;
        match &self.outcome {
            RecordedOutcome::Pending => Ok(()),
            RecordedOutcome::Returned(v) => write!(f, " -> {v}"),
            RecordedOutcome::Threw(e) => write!(f, " threw {e}"),
            RecordedOutcome::CalledOriginal => f.write_str(" -> <original>"),
            RecordedOutcome::Unexpected(_) => f.write_str(" -> <unexpected>"),
            RecordedOutcome::Failed(_) => f.write_str(" -> <failed>"),
        }
    }
}

/// Append-only record of every call made to the session's mocks.
///
/// Only [`reset`](crate::Session::reset) removes records.  The log is
/// protected by the session lock.
#[derive(Debug, Default)]
pub(crate) struct InvocationLog {
    records: Vec<InvocationRecord>,
    next_seq: u64,
}

impl InvocationLog {
    pub(crate) fn append(&mut self, inv: &Invocation,
                         matched: Option<ExpectationId>,
                         outcome: RecordedOutcome) -> u64
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push(InvocationRecord {
            seq,
            mock: inv.mock,
            signature: inv.signature.clone(),
            args: inv.args.clone(),
            thread: inv.thread,
            outcome,
            matched,
            consulted: false
        });
        seq
    }

    fn position(&self, seq: u64) -> Option<usize> {
        self.records.binary_search_by_key(&seq, |r| r.seq).ok()
    }

    /// Fill in the outcome of a record that was appended as `Pending`.  A
    /// record removed by a concurrent reset is silently ignored.
    pub(crate) fn complete(&mut self, seq: u64, outcome: RecordedOutcome) {
        if let Some(i) = self.position(seq) {
            self.records[i].outcome = outcome;
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item=&InvocationRecord> {
        self.records.iter()
    }

    pub(crate) fn mark_consulted(&mut self, seqs: &[u64]) {
        for seq in seqs {
            if let Some(i) = self.position(*seq) {
                self.records[i].consulted = true;
            }
        }
    }

    pub(crate) fn retain<F>(&mut self, f: F)
        where F: FnMut(&InvocationRecord) -> bool
    {
        self.records.retain(f);
    }
}
