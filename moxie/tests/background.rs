// vim: tw=80
//! Unexpected invocations made off the owning thread.
#![deny(warnings)]

use std::thread;

use moxie::*;

static_assertions::assert_impl_all!(Session: Send, Sync, Clone);

fn poll() -> Signature {
    Signature::new("Source", "poll").returns(Kind::Int)
}

/// Call `poll` on a fresh thread, returning what it returned.
fn poll_in_background(session: &Session, mock: MockId) -> Result<Outcome> {
    let s = session.clone();
    thread::spawn(move || s.call(mock, &poll(), &[]))
        .join()
        .unwrap()
}

#[test]
fn owning_thread_fails_synchronously() {
    let session = Session::new();
    let src = session.mock("src");
    let e = session.call(src, &poll(), &[]).unwrap_err();
    assert!(matches!(e, Error::UnexpectedInvocation(_)));
    session.verify(Scope::All).unwrap();
}

#[test]
fn deferred_until_verify() {
    let session = Session::new();
    let src = session.mock("src");
    let r = poll_in_background(&session, src).unwrap();
    assert_eq!(Outcome::Return(Value::from(0)), r);
    let e = session.verify(Scope::All).unwrap_err();
    assert!(matches!(e, Error::FailedVerification(_)));
    assert!(e.message().starts_with("unexpected invocation on thread"),
        "{e}");
    assert!(e.message().contains("src.poll()"), "{e}");
}

/// Verify reads and clears the deferred failure.
#[test]
fn reported_once() {
    let session = Session::new();
    let src = session.mock("src");
    poll_in_background(&session, src).unwrap();
    assert!(session.verify(Scope::All).is_err());
    session.verify(Scope::All).unwrap();
}

/// Only the first deferred failure is surfaced.
#[test]
fn later_failures_are_suppressed() {
    let session = Session::new();
    let src = session.mock("src");
    poll_in_background(&session, src).unwrap();
    poll_in_background(&session, src).unwrap();
    assert!(session.verify(Scope::All).is_err());
    session.verify(Scope::All).unwrap();
    // Both calls are still in the log
    let records = session.invocations(src);
    assert_eq!(2, records.len());
    assert!(records.iter()
        .all(|r| matches!(r.outcome, RecordedOutcome::Unexpected(_))));
}

#[test]
fn surfaced_by_any_scope() {
    let session = Session::new();
    let src = session.mock("src");
    let other = session.mock("other");
    poll_in_background(&session, src).unwrap();
    assert!(session.verify(other).is_err());
}

/// A verify on another thread leaves the deferred failure pending.
#[test]
fn surfaced_only_on_owning_thread() {
    let session = Session::new();
    let src = session.mock("src");
    poll_in_background(&session, src).unwrap();
    let s = session.clone();
    thread::spawn(move || s.verify(Scope::All))
        .join()
        .unwrap()
        .unwrap();
    assert!(session.verify(Scope::All).is_err());
}

#[test]
fn cleared_by_reset() {
    let session = Session::new();
    let src = session.mock("src");
    poll_in_background(&session, src).unwrap();
    session.reset(Scope::All);
    session.verify(Scope::All).unwrap();
}

#[test]
fn attributed_thread() {
    let session = Session::new();
    let src = session.mock("src");
    let elsewhere = thread::spawn(|| thread::current().id()).join().unwrap();
    let inv = Invocation::new(src, poll(), Vec::new()).on_thread(elsewhere);
    assert_eq!(Outcome::Return(Value::from(0)),
               session.dispatch(inv).unwrap());
    assert_eq!(elsewhere, session.invocations(src)[0].thread);
    assert!(session.verify(src).is_err());
}

#[test]
fn matched_calls_from_many_threads() {
    let session = Session::new();
    let src = session.mock("src");
    let id = session.expect(src, poll())
        .times(Times::exactly(8))
        .returning_value(1)
        .declare()
        .unwrap();
    let handles = (0..8).map(|_| {
        let s = session.clone();
        thread::spawn(move || s.call(src, &poll(), &[]))
    }).collect::<Vec<_>>();
    for h in handles {
        assert_eq!(Outcome::Return(Value::from(1)), h.join().unwrap().unwrap());
    }
    assert_eq!(Some(8), session.consumed(id));
    let mut seqs = session.invocations(src)
        .iter()
        .map(|r| r.seq)
        .collect::<Vec<_>>();
    seqs.dedup();
    assert_eq!(8, seqs.len());
    session.verify(Scope::All).unwrap();
}
