// vim: tw=80
//! Post-hoc verification of expectations, groups and the invocation log.

use tracing::debug;

use crate::{
    Error,
    ExpectationId,
    Result,
    Scope,
    session::State
};

/// Report every expectation invoked too few times and every group whose
/// total is out of bounds.  On the owning thread, a failure deferred from a
/// background thread takes precedence, and is cleared by being reported.
pub(crate) fn verify(state: &mut State, scope: &Scope, on_owner: bool)
    -> Result<()>
{
    if let Some((msg, suppressed)) = on_owner
        .then(|| state.background.take())
        .flatten()
    {
        debug!(suppressed, "surfacing background failure");
        return Err(Error::FailedVerification(format!(
            "unexpected invocation {msg}")));
    }
    let state = &*state;

    let mut failures = state.expectations.values()
        .filter(|e| scope.covers(e) && !e.is_satisfied())
        .map(|e| format!("{e}: invoked {} of {} times", e.consumed, e.times))
        .collect::<Vec<_>>();
    failures.extend(state.groups.iter()
        .filter(|g| scope.covers_group(g, state))
        .filter_map(|g| g.failure(&state.expectations)));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::FailedVerification(failures.join("\n")))
    }
}

/// Drop the scope's expectations and records, and rewind its groups.
pub(crate) fn reset(state: &mut State, scope: &Scope) {
    let removed = state.expectations.values()
        .filter(|e| scope.covers(e))
        .map(|e| e.id)
        .collect::<Vec<ExpectationId>>();
    let view = &*state;
    let rewind = view.groups.iter()
        .filter(|g| scope.covers_group(g, view))
        .map(|g| g.id)
        .collect::<Vec<_>>();

    let State{log, expectations, ..} = &mut *state;
    log.retain(|r| !scope.covers_record(r, expectations));
    for id in &removed {
        expectations.remove(id);
    }
    for g in &mut state.groups {
        if rewind.contains(&g.id) || removed.iter().any(|id| g.contains(*id))
        {
            g.reset(&removed);
        }
    }
    state.background = Default::default();
}

/// The "nothing else happened" family: fail if any invocation in scope was
/// not accounted for by a check.  With `unexpected_only`, invocations that
/// an expectation accepted are ignored as well.
pub(crate) fn nothing_else(state: &State, scope: &Scope,
                           unexpected_only: bool) -> Result<()>
{
    let unchecked = state.log.iter()
        .filter(|r| scope.covers_record(r, &state.expectations))
        .filter(|r| !r.consulted)
        .filter(|r| !unexpected_only || r.matched.is_none())
        .map(|r| format!("{}.{r}", state.mock_name(r.mock)))
        .collect::<Vec<_>>();
    debug!(unchecked = unchecked.len(), unexpected_only, "nothing else");
    if unchecked.is_empty() {
        return Ok(());
    }
    let what = if unexpected_only {
        "unchecked and unexpected invocation(s) detected"
    } else {
        "unchecked invocation(s) detected"
    };
    Err(Error::UncheckedInvocation(format!("{what}:\n  {}",
                                           unchecked.join("\n  "))))
}
