// vim: tw=80
//! Routing one invocation to the expectation that should handle it.
//!
//! Selection happens in a single critical section: filter by mock and
//! signature, dry-run the argument matchers, drop exhausted candidates, drop
//! candidates that their groups don't admit yet, and take the earliest
//! declared of whatever remains.  The winner's captures, count, group cursors
//! and log record are all updated before the lock is released.  Only the
//! behavior itself runs afterwards.

use std::{fmt::Write, thread::ThreadId};

use tracing::{debug, warn};

use crate::{
    Behavior,
    Error,
    ExpectationId,
    Invocation,
    Outcome,
    invocation::RecordedOutcome,
    session::State
};

pub(crate) enum Selection {
    /// Run `behavior` outside the lock, then complete record `seq`.  The
    /// behavior is either the selected expectation's or, for a permissive
    /// mock, the mock's default.
    Run {
        seq: u64,
        behavior: Behavior,
    },
    /// A call rejected off the owning thread, already recorded, still
    /// returns normally.
    Fallback(Outcome),
    /// A strict mock rejected a call on the owning thread.
    Failed(Error),
}

fn describe_call(state: &State, inv: &Invocation) -> String {
    let mut s = format!("{}.{}(", state.mock_name(inv.mock),
                        inv.signature.name());
    for (i, a) in inv.args.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        let _ = write!(s, "{a}");
    }
    s.push(')');
    s
}

pub(crate) fn select(state: &mut State, inv: &Invocation, owner: ThreadId)
    -> Selection
{
    let (options, fallback) = match state.mock_info(inv.mock) {
        Ok(m) => (m.options, m.default_behavior(&inv.signature)),
        Err(e) => return Selection::Failed(e)
    };

    let mut exhausted = None;
    let mut out_of_order = None;
    let mut chosen = None;
    for (id, e) in &state.expectations {
        if !e.accepts(inv) {
            continue;
        }
        if e.is_exhausted() {
            exhausted.get_or_insert(*id);
            continue;
        }
        if !e.groups.iter()
            .all(|g| state.groups[g.0].admits(*id, &state.expectations))
        {
            out_of_order.get_or_insert(*id);
            continue;
        }
        chosen = Some(*id);
        break;
    }

    if let Some(id) = chosen {
        return commit(state, inv, id, fallback);
    }

    let call = describe_call(state, inv);
    if !options.is_strict() {
        debug!(%call, behavior = ?fallback, "permissive fallback");
        let seq = state.log.append(inv, None, RecordedOutcome::Pending);
        return Selection::Run{seq, behavior: fallback};
    }

    let reason = unmatched_reason(state, inv, &call, exhausted, out_of_order);

    state.log.append(inv, None, RecordedOutcome::Unexpected(reason.clone()));
    if inv.thread == owner {
        debug!(%call, "unexpected invocation");
        Selection::Failed(Error::UnexpectedInvocation(reason))
    } else {
        let msg = format!("on thread {:?}: {reason}", inv.thread);
        if state.background.record(msg) {
            warn!(%call, thread = ?inv.thread,
                  "unexpected invocation on a background thread; deferred \
                   until the next verify");
        } else {
            warn!(%call, thread = ?inv.thread,
                  "unexpected invocation on a background thread suppressed; \
                   an earlier one is already pending");
        }
        let default = inv.signature.default_return();
        Selection::Fallback(Outcome::Return(default))
    }
}

/// Apply every effect of selecting expectation `id`.
fn commit(state: &mut State, inv: &Invocation, id: ExpectationId,
          fallback: Behavior) -> Selection
{
    let Some(e) = state.expectations.get_mut(&id) else {
        return Selection::Failed(Error::config(format!(
            "expectation {id} disappeared")));
    };
    e.commit(&inv.args);
    e.consumed += 1;
    let consumed = e.consumed;
    let behavior = e.behaviors.pop(fallback);
    let group_ids = e.groups.clone();
    for g in group_ids {
        // Split the borrow: the group is updated from the expectation set.
        let State{groups, expectations, ..} = &mut *state;
        groups[g.0].advance(id, expectations);
    }
    let seq = state.log.append(inv, Some(id), RecordedOutcome::Pending);
    debug!(call = %describe_call(state, inv), expectation = %id, consumed,
           ?behavior, "dispatched");
    Selection::Run{seq, behavior}
}

fn unmatched_reason(state: &State, inv: &Invocation, call: &str,
                    exhausted: Option<ExpectationId>,
                    out_of_order: Option<ExpectationId>) -> String
{
    if let Some(e) = out_of_order.and_then(|id| state.expectations.get(&id)) {
        let blocking = e.groups.iter()
            .filter_map(|g| state.groups.get(g.0))
            .filter(|g| !g.admits(e.id, &state.expectations))
            .collect::<Vec<_>>();
        let names = blocking.iter()
            .map(|g| format!("{:?}", g.name))
            .collect::<Vec<_>>()
            .join(", ");
        if blocking.iter().all(|g| g.is_exhausted(&state.expectations)) {
            return format!("{call} was invoked too many times for group \
                            {names}; it matched {e}");
        }
        return format!("{call} is out of order in group {names}; it \
                        matched {e}");
    }
    if let Some(e) = exhausted.and_then(|id| state.expectations.get(&id)) {
        return format!("{call} was invoked too many times; {e} expected {} \
                        times and was already invoked {}",
                       e.times, e.consumed);
    }
    let mut msg = format!("No matching expectation found for {call}");
    for e in state.expectations.values().filter(|e| e.targets(inv)) {
        let _ = write!(msg, "\n  {e}: {}", e.explain(&inv.args));
    }
    msg
}
