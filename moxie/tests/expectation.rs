// vim: tw=80
//! Declaring expectations and their behaviors.
#![deny(warnings)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering}
};

use moxie::*;
use moxie::matcher::*;

fn next() -> Signature {
    Signature::new("Iter", "next").returns(Kind::Int)
}

fn get() -> Signature {
    Signature::new("Map", "get").param(Kind::Str).returns(Kind::Option)
}

fn ret(v: impl Into<Value>) -> Outcome {
    Outcome::Return(v.into())
}

#[test]
fn consecutive_matching_count() {
    let session = Session::new();
    let it = session.mock("it");
    session.expect(it, next())
        .times(Times::exactly(2))
        .returning_value(1)
        .returning_value(2)
        .declare()
        .unwrap();
    assert_eq!(ret(1), session.call(it, &next(), &[]).unwrap());
    assert_eq!(ret(2), session.call(it, &next(), &[]).unwrap());
    session.verify(Scope::All).unwrap();
}

#[test]
fn consecutive_too_few() {
    let session = Session::new();
    let it = session.mock("it");
    let e = session.expect(it, next())
        .times(Times::exactly(4))
        .returning_consecutively([1, 2, 3])
        .declare()
        .unwrap_err();
    assert!(matches!(e, Error::Configuration(_)));
    assert!(e.message().contains("not enough consecutive behaviors"));
}

#[test]
fn consecutive_too_many() {
    let session = Session::new();
    let it = session.mock("it");
    let e = session.expect(it, next())
        .times(Times::exactly(4))
        .returning_consecutively([1, 2, 3, 4, 5])
        .declare()
        .unwrap_err();
    assert!(matches!(e, Error::Configuration(_)));
    assert!(e.message().contains("more consecutive behaviors"));
}

/// A rejected declaration registers nothing.
#[test]
fn rejected_declaration_is_not_registered() {
    let session = Session::new();
    let it = session.mock("it");
    session.expect(it, next())
        .times(Times::exactly(4))
        .returning_consecutively([1, 2, 3])
        .declare()
        .unwrap_err();
    session.verify(Scope::All).unwrap();
    assert!(session.call(it, &next(), &[]).is_err());
}

#[test]
fn last_behavior_repeats() {
    let session = Session::new();
    let it = session.mock("it");
    session.expect(it, next())
        .returning_consecutively([7, 8])
        .declare()
        .unwrap();
    assert_eq!(ret(7), session.call(it, &next(), &[]).unwrap());
    for _ in 0..3 {
        assert_eq!(ret(8), session.call(it, &next(), &[]).unwrap());
    }
}

#[test]
fn default_return_value() {
    let session = Session::new();
    let m = session.mock("m");
    session.expect(m, get()).declare().unwrap();
    session.expect(m, next()).declare().unwrap();
    let k = [Value::from("k")];
    assert_eq!(ret(Value::Null), session.call(m, &get(), &k).unwrap());
    assert_eq!(ret(0), session.call(m, &next(), &[]).unwrap());
}

#[test]
fn throwing() {
    let session = Session::new();
    let m = session.mock("m");
    session.expect(m, get())
        .throwing("no such key")
        .declare()
        .unwrap();
    let k = [Value::from("k")];
    assert_eq!(Outcome::Throw(Value::from("no such key")),
               session.call(m, &get(), &k).unwrap());
}

#[test]
fn throwing_consecutively_then_return() {
    let session = Session::new();
    let m = session.mock("m");
    session.expect(m, next())
        .times(Times::exactly(3))
        .throwing_consecutively(["busy", "busy"])
        .returning_value(5)
        .declare()
        .unwrap();
    let busy = Outcome::Throw(Value::from("busy"));
    assert_eq!(busy, session.call(m, &next(), &[]).unwrap());
    assert_eq!(busy, session.call(m, &next(), &[]).unwrap());
    assert_eq!(ret(5), session.call(m, &next(), &[]).unwrap());
}

#[test]
fn returning_closure() {
    let session = Session::new();
    let m = session.mock("m");
    let mut n = 0;
    session.expect(m, next())
        .returning_mut(move |_| {
            n += 10;
            Value::from(n)
        }).declare()
        .unwrap();
    assert_eq!(ret(10), session.call(m, &next(), &[]).unwrap());
    assert_eq!(ret(20), session.call(m, &next(), &[]).unwrap());
}

#[test]
fn returning_st() {
    let session = Session::new();
    let m = session.mock("m");
    // Rc is neither Send nor Sync
    let counter = std::rc::Rc::new(std::cell::Cell::new(0i64));
    let c = counter.clone();
    session.expect(m, next())
        .returning_st(move |_| {
            c.set(c.get() + 1);
            Value::from(c.get())
        }).declare()
        .unwrap();
    assert_eq!(ret(1), session.call(m, &next(), &[]).unwrap());
    assert_eq!(1, counter.get());
}

#[test]
fn handle_with() {
    let session = Session::new();
    let m = session.mock("m");
    session.expect(m, get())
        .handle_with(|args| match args[0].as_str() {
            Some("present") => Outcome::Return(Value::from(1)),
            _ => Outcome::Throw(Value::from("missing"))
        }).declare()
        .unwrap();
    assert_eq!(ret(1),
               session.call(m, &get(), &[Value::from("present")]).unwrap());
    assert_eq!(Outcome::Throw(Value::from("missing")),
               session.call(m, &get(), &[Value::from("absent")]).unwrap());
}

#[test]
fn delegate_to() {
    let session = Session::new();
    let m = session.mock("m");
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    session.expect(m, get())
        .delegate_to(move |sig: &Signature, args: &[Value]| {
            c.fetch_add(1, Ordering::Relaxed);
            assert_eq!("get", sig.name());
            Outcome::Return(Value::from(format!("real {}", args[0])))
        }).declare()
        .unwrap();
    assert_eq!(ret("real \"k\""),
               session.call(m, &get(), &[Value::from("k")]).unwrap());
    assert_eq!(1, calls.load(Ordering::Relaxed));
}

/// Handlers run outside the session lock, so they may use the session.
#[test]
fn handler_reenters_session() {
    let session = Session::new();
    let m = session.mock("m");
    let s2 = session.clone();
    session.expect(m, next())
        .once()
        .returning(move |_| {
            Value::from(s2.invocations(Scope::All).len())
        }).declare()
        .unwrap();
    assert_eq!(ret(1u64), session.call(m, &next(), &[]).unwrap());
}

fn fact() -> Signature {
    Signature::new("Math", "fact").param(Kind::Int).returns(Kind::Int)
}

/// A handler may call its own mock recursively.
#[test]
fn recursive_handler() {
    let session = Session::new();
    let m = session.mock("math");
    let s2 = session.clone();
    session.expect(m, fact())
        .any_times()
        .returning(move |args| {
            let n = args[0].as_i64().unwrap();
            if n <= 1 {
                return Value::from(1);
            }
            match s2.call(m, &fact(), &[Value::from(n - 1)]) {
                Ok(Outcome::Return(v)) => Value::from(n * v.as_i64().unwrap()),
                other => panic!("{other:?}")
            }
        }).declare()
        .unwrap();
    assert_eq!(ret(6), session.call(m, &fact(), &[Value::from(3)]).unwrap());
    let records = session.invocations(m);
    assert_eq!(3, records.len());
    assert_eq!(RecordedOutcome::Returned(Value::from(6)), records[0].outcome);
    assert_eq!(RecordedOutcome::Returned(Value::from(1)), records[2].outcome);
}

/// A stateful handler can't wait for itself, so a recursive call fails.
#[test]
fn recursive_mut_handler() {
    let session = Session::new();
    let m = session.mock("math");
    let s2 = session.clone();
    let mut depth = 0;
    session.expect(m, fact())
        .any_times()
        .returning_mut(move |args| {
            depth += 1;
            let e = s2.call(m, &fact(), args).unwrap_err();
            assert!(matches!(e, Error::Configuration(_)), "{e}");
            Value::from(depth)
        }).declare()
        .unwrap();
    assert_eq!(ret(1), session.call(m, &fact(), &[Value::from(3)]).unwrap());
    assert_eq!(ret(2), session.call(m, &fact(), &[Value::from(3)]).unwrap());
    let records = session.invocations(m);
    assert_eq!(4, records.len());
    assert!(matches!(records[1].outcome, RecordedOutcome::Failed(_)));
}

#[test]
fn handle_with_mut() {
    let session = Session::new();
    let m = session.mock("m");
    let mut seen = Vec::new();
    session.expect(m, get())
        .handle_with_mut(move |args| {
            seen.push(args[0].clone());
            Outcome::Return(Value::from(seen.len()))
        }).declare()
        .unwrap();
    session.call(m, &get(), &[Value::from("a")]).unwrap();
    assert_eq!(ret(2usize),
               session.call(m, &get(), &[Value::from("b")]).unwrap());
}

#[test]
fn recorded_outcome_is_filled_in() {
    let session = Session::new();
    let m = session.mock("m");
    session.expect(m, next()).returning_value(3).declare().unwrap();
    session.call(m, &next(), &[]).unwrap();
    let records = session.invocations(m);
    assert_eq!(1, records.len());
    assert_eq!(RecordedOutcome::Returned(Value::from(3)), records[0].outcome);
}

mod configuration {
    use super::*;

    #[test]
    fn arity_mismatch() {
        let session = Session::new();
        let m = session.mock("m");
        let e = session.expect(m, get())
            .with([eq("a"), eq("b")])
            .declare()
            .unwrap_err();
        assert!(e.message().contains("takes 1 arguments but 2 matchers"),
            "{e}");
    }

    #[test]
    fn incompatible_return_kind() {
        let session = Session::new();
        let m = session.mock("m");
        let e = session.expect(m, next())
            .returning_value("not a number")
            .declare()
            .unwrap_err();
        assert!(e.message().contains("incompatible result type"));
    }

    #[test]
    fn call_original_needs_capability() {
        let session = Session::new();
        let m = session.mock("m");
        let e = session.expect(m, next())
            .call_original()
            .declare()
            .unwrap_err();
        assert!(matches!(e, Error::Configuration(_)));
        session.expect(m, next().with_original())
            .call_original()
            .declare()
            .unwrap();
        assert_eq!(Outcome::CallOriginal,
                   session.call(m, &next(), &[]).unwrap());
    }

    #[test]
    fn with_twice() {
        let session = Session::new();
        let m = session.mock("m");
        let e = session.expect(m, get())
            .with([any()])
            .with_args(["x"])
            .declare()
            .unwrap_err();
        assert!(e.message().contains("arguments already specified"));
    }

    #[test]
    fn at_any_time_twice() {
        let session = Session::new();
        let m = session.mock("m");
        let e = session.expect(m, next())
            .at_any_time()
            .at_any_time()
            .declare()
            .unwrap_err();
        assert!(matches!(e, Error::Configuration(_)));
    }

    #[test]
    fn unknown_group() {
        let session = Session::new();
        let other = Session::new();
        let g = other.group("g");
        let m = session.mock("m");
        let e = session.expect(m, next()).in_group(g).declare().unwrap_err();
        assert!(e.message().contains("unknown group"));
    }
}
