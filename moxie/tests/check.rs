// vim: tw=80
//! Post-hoc checks over the invocation log.
#![deny(warnings)]

use moxie::*;
use moxie::matcher::*;

fn send() -> Signature {
    Signature::new("Mailer", "send").param(Kind::Str).returns(Kind::Bool)
}

fn flush() -> Signature {
    Signature::new("Mailer", "flush")
}

fn s(x: &str) -> [Value; 1] {
    [Value::from(x)]
}

/// A permissive mock that has seen `send("a")`, `send("b")`, `flush()`.
fn mailer() -> (Session, MockId) {
    let session = Session::new();
    let m = session.mock_with("mailer", MockOptions::permissive());
    session.call(m, &send(), &s("a")).unwrap();
    session.call(m, &send(), &s("b")).unwrap();
    session.call(m, &flush(), &[]).unwrap();
    (session, m)
}

#[test]
fn once() {
    let (session, m) = mailer();
    session.check(m).on(&send(), &[eq("a")]).unwrap();
    session.check(m).once().on(&flush(), &[]).unwrap();
}

#[test]
fn wrong_count() {
    let (session, m) = mailer();
    let e = session.check(m).on(&send(), &[any()]).unwrap_err();
    assert!(matches!(e, Error::FailedCheck(_)));
    assert!(e.message().contains("mailer.send matched 2 but expected exactly \
                                  1 times"), "{e}");
    session.check(m).times(Times::exactly(2)).on(&send(), &[any()]).unwrap();
}

#[test]
fn empty_matchers_accept_any_arguments() {
    let (session, m) = mailer();
    session.check(m).times(Times::exactly(2)).on(&send(), &[]).unwrap();
}

#[test]
fn arity_mismatch() {
    let (session, m) = mailer();
    let e = session.check(m).on(&send(), &[any(), any()]).unwrap_err();
    assert!(matches!(e, Error::Configuration(_)));
}

#[test]
fn did_not() {
    let (session, m) = mailer();
    session.check(m).did_not().on(&send(), &[eq("c")]).unwrap();
    let e = session.check(m).did_not().on(&send(), &[eq("a")]).unwrap_err();
    assert!(matches!(e, Error::FailedCheck(_)));
}

#[test]
fn no_double_negatives() {
    let (session, m) = mailer();
    let e = session.check(m).did_not().did_not().on(&flush(), &[]).unwrap_err();
    assert_eq!("no double negatives!", e.message());
}

#[test]
fn returned_and_threw() {
    let session = Session::new();
    let m = session.mock("mailer");
    session.expect(m, send())
        .with_args(["ok"])
        .returning_value(true)
        .declare()
        .unwrap();
    session.expect(m, send())
        .with_args(["bad"])
        .throwing("refused")
        .declare()
        .unwrap();
    session.call(m, &send(), &s("ok")).unwrap();
    session.call(m, &send(), &s("bad")).unwrap();
    session.check(m).returned(eq(true)).on(&send(), &[]).unwrap();
    session.check(m).threw(starts_with("ref")).on(&send(), &[]).unwrap();
    session.check(m).never().returned(eq(false)).on(&send(), &[]).unwrap();
}

#[test]
fn unexpectedly() {
    let session = Session::new();
    let m = session.mock("mailer");
    session.expect(m, send()).with_args(["a"]).declare().unwrap();
    session.call(m, &send(), &s("a")).unwrap();
    session.call(m, &send(), &s("b")).unwrap_err();
    session.check(m).unexpectedly().on(&send(), &[any()]).unwrap();
    session.check(m).unexpectedly().did_not().on(&send(), &[eq("a")]).unwrap();
}

mod in_group {
    use super::*;

    #[test]
    fn in_order() {
        let (session, m) = mailer();
        let g = session.group("g");
        session.check(m).in_group(g).on(&send(), &[eq("a")]).unwrap();
        session.check(m).in_group(g).on(&send(), &[eq("b")]).unwrap();
        session.check(m).in_group(g).on(&flush(), &[]).unwrap();
    }

    #[test]
    fn out_of_order() {
        let (session, m) = mailer();
        let g = session.group("g");
        session.check(m).in_group(g).on(&flush(), &[]).unwrap();
        let e = session.check(m)
            .in_group(g)
            .on(&send(), &[eq("a")])
            .unwrap_err();
        assert!(matches!(e, Error::FailedCheck(_)));
    }

    /// A check outside of the group doesn't move its cursor.
    #[test]
    fn ungrouped_check_is_unordered() {
        let (session, m) = mailer();
        let g = session.group("g");
        session.check(m).on(&flush(), &[]).unwrap();
        session.check(m).in_group(g).on(&send(), &[eq("a")]).unwrap();
    }

    #[test]
    fn group_already_specified() {
        let (session, m) = mailer();
        let g = session.group("g");
        let h = session.group("h");
        let e = session.check(m)
            .in_group(g)
            .in_group(h)
            .on(&flush(), &[])
            .unwrap_err();
        assert!(matches!(e, Error::Configuration(_)));
        assert!(e.message().contains("already specified"), "{e}");
        // Nothing was consulted
        assert!(session.check_nothing_else_happened(m).is_err());
    }

    #[test]
    fn unordered_group() {
        let (session, m) = mailer();
        let g = session.group_with("g", GroupOptions::unordered());
        let e = session.check(m).in_group(g).on(&flush(), &[]).unwrap_err();
        assert!(matches!(e, Error::Configuration(_)));
    }
}

mod nothing_else {
    use super::*;

    #[test]
    fn all_checked() {
        let (session, m) = mailer();
        session.check(m).times(Times::exactly(2)).on(&send(), &[]).unwrap();
        assert!(session.check_nothing_else_happened(m).is_err());
        session.check(m).on(&flush(), &[]).unwrap();
        session.check_nothing_else_happened(m).unwrap();
    }

    #[test]
    fn leftover() {
        let (session, m) = mailer();
        session.check(m).on(&send(), &[eq("a")]).unwrap();
        let e = session.check_nothing_else_happened(Scope::All).unwrap_err();
        assert!(matches!(e, Error::UncheckedInvocation(_)));
        let msg = e.message();
        assert!(msg.starts_with("unchecked invocation(s) detected"), "{msg}");
        assert!(msg.contains("mailer.send(\"b\")"), "{msg}");
        assert!(!msg.contains("mailer.send(\"a\")"), "{msg}");
    }

    /// A failed check consults nothing.
    #[test]
    fn failed_check_does_not_consult() {
        let (session, m) = mailer();
        session.check(m).on(&send(), &[]).unwrap_err();
        session.check(m).on(&flush(), &[]).unwrap();
        let e = session.check_nothing_else_happened(m).unwrap_err();
        assert!(e.message().contains("mailer.send(\"a\")"));
    }

    #[test]
    fn unexpected_only() {
        let session = Session::new();
        let m = session.mock("mailer");
        session.stub(m, flush()).declare().unwrap();
        session.call(m, &flush(), &[]).unwrap();
        session.check_nothing_else_unexpected_happened(m).unwrap();
        session.call(m, &send(), &s("x")).unwrap_err();
        let e = session.check_nothing_else_unexpected_happened(m)
            .unwrap_err();
        assert!(e.message()
            .starts_with("unchecked and unexpected invocation(s) detected"));
        session.check(m).unexpectedly().on(&send(), &[]).unwrap();
        session.check_nothing_else_unexpected_happened(m).unwrap();
        // The stubbed flush was never checked.
        assert!(session.check_nothing_else_happened(m).is_err());
    }

    #[test]
    fn scoped_to_mock() {
        let (session, m) = mailer();
        let other = session.mock_with("other", MockOptions::permissive());
        session.call(other, &flush(), &[]).unwrap();
        session.check(other).on(&flush(), &[]).unwrap();
        session.check_nothing_else_happened(other).unwrap();
        assert!(session.check_nothing_else_happened(m).is_err());
    }
}
