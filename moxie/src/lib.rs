// vim: tw=80
//! An expectation and verification engine for test doubles.
//!
//! Moxie holds the bookkeeping side of mocking: which calls a test expects,
//! in what order, how often, and what each one should do.  Some interception
//! layer (a hand-written trait impl, a macro, a proxy) turns every real call
//! into an [`Invocation`] and hands it to a [`Session`], which picks the
//! expectation that should handle it and tells the layer what to do with an
//! [`Outcome`].  Afterwards the test asks the session to [`verify`] that
//! everything it expected really happened, or asks it ad hoc questions with
//! [`check`].
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Return values`](#return-values)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Call counts`](#call-counts)
//! * [`Groups`](#groups)
//! * [`Checks`](#checks)
//! * [`Permissive and partial mocks`](#permissive-and-partial-mocks)
//! * [`Threads`](#threads)
//!
//! ## Getting started
//!
//! Route the methods of a stand-in type to [`Session::call`], then declare
//! expectations on the session.
//! ```
//! use moxie::*;
//! use moxie::matcher::*;
//!
//! trait Calculator {
//!     fn add(&self, x: i64, y: i64) -> i64;
//! }
//!
//! fn add_sig() -> Signature {
//!     Signature::new("Calculator", "add")
//!         .params([Kind::Int, Kind::Int])
//!         .returns(Kind::Int)
//! }
//!
//! struct MockCalculator {
//!     session: Session,
//!     id: MockId
//! }
//!
//! impl Calculator for MockCalculator {
//!     fn add(&self, x: i64, y: i64) -> i64 {
//!         let args = [Value::from(x), Value::from(y)];
//!         match self.session.call(self.id, &add_sig(), &args) {
//!             Ok(Outcome::Return(v)) => v.as_i64().unwrap(),
//!             other => panic!("{other:?}")
//!         }
//!     }
//! }
//!
//! let session = Session::new();
//! let mock = MockCalculator{session: session.clone(),
//!                           id: session.mock("calc")};
//! session.expect(mock.id, add_sig())
//!     .with([eq(2), any()])
//!     .returning(|args| Value::from(args[0].as_i64().unwrap() +
//!                                   args[1].as_i64().unwrap()))
//!     .declare()
//!     .unwrap();
//! assert_eq!(5, mock.add(2, 3));
//! session.verify(Scope::All).unwrap();
//! ```
//!
//! ## Return values
//!
//! An expectation holds a queue of behaviors.  Each selected call consumes
//! one, and the last one repeats.  Without any behavior the call returns
//! the default value of the signature's return [`Kind`].
//! ```
//! # use moxie::*;
//! let session = Session::new();
//! let it = session.mock("iterator");
//! let next = Signature::new("Iter", "next").returns(Kind::Option);
//! session.expect(it, next.clone())
//!     .times(Times::exactly(3))
//!     .returning_consecutively([Value::from(1), Value::from(2), Value::Null])
//!     .declare()
//!     .unwrap();
//! for want in [Value::from(1), Value::from(2), Value::Null] {
//!     let outcome = session.call(it, &next, &[]).unwrap();
//!     assert_eq!(Outcome::Return(want), outcome);
//! }
//! ```
//!
//! A list of consecutive behaviors must agree with the call count; a
//! mismatch is reported by [`declare`](ExpectationBuilder::declare).
//!
//! ## Matching arguments
//!
//! Each argument is checked by one [`Matcher`].  The [`matcher`] module has
//! constructors for equality, ranges, strings, shapes of arrays and maps,
//! and combinators.  A [`Captor`] records the arguments of the calls its
//! expectation actually handled.
//! ```
//! # use moxie::*;
//! # use moxie::matcher::*;
//! let session = Session::new();
//! let db = session.mock("db");
//! let put = Signature::new("Db", "put").params([Kind::Str, Kind::Int]);
//! let keys = Captor::new();
//! session.expect(db, put.clone())
//!     .with([and([starts_with("user:"), capture(&keys)]), gt(0)])
//!     .declare()
//!     .unwrap();
//! session.call(db, &put, &[Value::from("user:7"), Value::from(3)]).unwrap();
//! assert_eq!(vec![Value::from("user:7")], keys.values());
//! ```
//!
//! When several expectations accept a call, the earliest declared one that
//! is neither exhausted nor blocked by ordering wins.
//!
//! ## Call counts
//!
//! By default an expectation must be called at least once.  Use
//! [`times`](ExpectationBuilder::times) with a [`Times`] to change that, or
//! declare a [`stub`](Session::stub), which may be called any number of
//! times in any order.  Calls beyond the maximum are unexpected.
//! ```
//! # use moxie::*;
//! let session = Session::new();
//! let bell = session.mock("bell");
//! let ring = Signature::new("Bell", "ring");
//! session.expect(bell, ring.clone())
//!     .times(Times::at_least(2))
//!     .declare()
//!     .unwrap();
//! session.call(bell, &ring, &[]).unwrap();
//! let e = session.verify(Scope::All).unwrap_err();
//! assert!(e.message().contains("invoked 1 of at least 2 times"));
//! ```
//!
//! ## Groups
//!
//! An ordered group requires its members to be called in declaration order,
//! even across different mocks.  An ordered group may also bound the total
//! number of calls to all of its members with [`Session::group_times`].  An
//! unordered group only gathers expectations into a scope for [`verify`] and
//! [`reset`](Session::reset).
//! ```
//! # use moxie::*;
//! let session = Session::new();
//! let file = session.mock("file");
//! let open = Signature::new("File", "open");
//! let close = Signature::new("File", "close");
//! let g = session.group("lifecycle");
//! for sig in [&open, &close] {
//!     session.expect(file, sig.clone()).once().in_group(g).declare().unwrap();
//! }
//! assert!(matches!(session.call(file, &close, &[]),
//!                  Err(Error::UnexpectedInvocation(_))));
//! session.call(file, &open, &[]).unwrap();
//! session.call(file, &close, &[]).unwrap();
//! session.verify(g).unwrap();
//! ```
//!
//! ## Checks
//!
//! Instead of declaring everything up front, a test may let a permissive
//! mock record its calls and then [`check`] them afterwards.
//! [`check_nothing_else_happened`](Session::check_nothing_else_happened)
//! fails if any call was never accounted for.
//!
//! ## Permissive and partial mocks
//!
//! A strict mock (the default) fails on any call it has no expectation for.
//! A [`permissive`](MockOptions::permissive) mock returns a default value
//! instead, and a permissive [`partial`](MockOptions::partial) mock asks the
//! interception layer to run the real implementation, if the signature
//! declares one with [`with_original`](Signature::with_original).  A
//! partial mock also does so for expectations that declare no behavior.
//!
//! A [`spy`](Session::spy) wraps a real object.  Whatever no declared
//! behavior handles is forwarded to it.
//!
//! [`reset_with`](Session::reset_with) changes a mock's options between
//! phases of a test, for example to make a strict mock permissive.
//!
//! ## Threads
//!
//! A [`Session`] is `Send` and `Sync`, and may be shared with every thread
//! the code under test spawns.  An unexpected call on the session's owning
//! thread fails immediately.  On any other thread it returns a default value
//! and the failure is deferred until the next [`verify`] on the owning
//! thread.  Only the first
//! deferred failure is reported; later ones in the same window are logged
//! and dropped.
//!
//! [`check`]: Session::check
//! [`verify`]: Session::verify

mod behavior;
mod check;
mod dispatch;
mod error;
mod expectation;
mod group;
mod invocation;
pub mod matcher;
mod session;
mod signature;
mod times;
mod value;
mod verify;

pub use behavior::{Behavior, Delegate, MutHandler, Outcome};
pub use check::Check;
pub use error::{Error, Result};
pub use expectation::ExpectationBuilder;
pub use group::GroupOptions;
pub use invocation::{Invocation, InvocationRecord, RecordedOutcome};
pub use matcher::{Captor, Matcher};
pub use predicates::prelude::Predicate;
pub use session::{MockOptions, Scope, Session};
pub use signature::{ExpectationId, GroupId, Kind, MockId, Signature};
pub use times::Times;
pub use value::{AnyValue, Value};
