// vim: tw=80
//! What happens when an expectation is selected.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, ThreadId}
};

use fragile::Fragile;

use crate::{Error, Result, Signature, Times, Value};

/// The result of dispatching one invocation, handed back to the
/// interception layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The mocked method should return this value.
    Return(Value),
    /// The mocked method should fail with this value.
    Throw(Value),
    /// The interception layer should run the real implementation.  The
    /// engine never does so itself.
    CallOriginal,
}

/// A real object that can stand in for a mock.  Delegation forwards the
/// invocation, as is, to the delegate.
pub trait Delegate: Send + Sync {
    fn invoke(&self, signature: &Signature, args: &[Value]) -> Outcome;
}

impl<F> Delegate for F
    where F: Fn(&Signature, &[Value]) -> Outcome + Send + Sync
{
    fn invoke(&self, signature: &Signature, args: &[Value]) -> Outcome {
        self(signature, args)
    }
}

type HandlerFn = dyn Fn(&[Value]) -> Outcome + Send + Sync;
type HandlerMutFn = Box<dyn FnMut(&[Value]) -> Outcome + Send>;

/// A stateful handler.
///
/// An `FnMut` can't run twice at once.  Calls from other threads wait for
/// it, but a recursive call from inside the handler itself fails instead.
pub struct MutHandler {
    f: Mutex<HandlerMutFn>,
    running_on: Mutex<Option<ThreadId>>,
}

/// Clears `running_on` even if the handler panics.
struct Running<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl MutHandler {
    fn call(&self, signature: &Signature, args: &[Value])
        -> Result<Outcome>
    {
        let me = thread::current().id();
        let busy = *self.running_on.lock()
            .unwrap_or_else(PoisonError::into_inner) == Some(me);
        if busy {
            return Err(Error::config(format!(
                "{signature} was called recursively from its own FnMut \
                 handler; use a Fn handler instead")));
        }
        let mut f = self.f.lock().unwrap_or_else(PoisonError::into_inner);
        *self.running_on.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(me);
        let _running = Running(&self.running_on);
        Ok((*f)(args))
    }
}

/// One entry of an expectation's behavior queue.
#[derive(Clone)]
pub enum Behavior {
    Return(Value),
    Throw(Value),
    DelegateTo(Arc<dyn Delegate>),
    /// A closure computing the outcome from the actual arguments.  It is
    /// called without any lock held, so it may call back into the session,
    /// even recursively through the same mock.
    Handler(Arc<HandlerFn>),
    /// Like `Handler`, but stateful.
    HandlerMut(Arc<MutHandler>),
    CallOriginal,
}

impl Behavior {
    pub fn handler<F>(f: F) -> Self
        where F: Fn(&[Value]) -> Outcome + Send + Sync + 'static
    {
        Behavior::Handler(Arc::new(f))
    }

    pub fn handler_mut<F>(f: F) -> Self
        where F: FnMut(&[Value]) -> Outcome + Send + 'static
    {
        Behavior::HandlerMut(Arc::new(MutHandler {
            f: Mutex::new(Box::new(f)),
            running_on: Mutex::new(None)
        }))
    }

    /// Single-threaded version of [`handler_mut`](#method.handler_mut).  Can
    /// be used when the closure isn't `Send`.
    ///
    /// It is a runtime error (a panic) for the handler to be run on a
    /// different thread than the one that created it.
    pub fn handler_st<F>(f: F) -> Self
        where F: FnMut(&[Value]) -> Outcome + 'static
    {
        let mut fragile = Fragile::new(f);
        Behavior::handler_mut(move |args: &[Value]| {
            (fragile.get_mut())(args)
        })
    }

    /// Check that this behavior suits the member it is declared for.
    pub(crate) fn validate(&self, signature: &Signature) -> Result<()> {
        match self {
            Behavior::Return(v) if !signature.return_kind().accepts(v) => {
                Err(Error::config(format!(
                    "incompatible result type for {signature}: {v}")))
            },
            Behavior::CallOriginal if !signature.supports_original() => {
                Err(Error::config(format!(
                    "{signature} cannot call its original method")))
            },
            _ => Ok(())
        }
    }

    /// Produce the outcome.  Must be called outside of the session lock.
    ///
    /// Fails only when a stateful handler is re-entered.
    pub(crate) fn run(self, signature: &Signature, args: &[Value])
        -> Result<Outcome>
    {
        Ok(match self {
            Behavior::Return(v) => Outcome::Return(v),
            Behavior::Throw(e) => Outcome::Throw(e),
            Behavior::DelegateTo(d) => d.invoke(signature, args),
            Behavior::Handler(h) => (*h)(args),
            Behavior::HandlerMut(h) => return h.call(signature, args),
            Behavior::CallOriginal => Outcome::CallOriginal,
        })
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Return(v) => write!(f, "Return({v})"),
            Behavior::Throw(e) => write!(f, "Throw({e})"),
            Behavior::DelegateTo(_) => f.write_str("DelegateTo"),
            Behavior::Handler(_) => f.write_str("Handler"),
            Behavior::HandlerMut(_) => f.write_str("HandlerMut"),
            Behavior::CallOriginal => f.write_str("CallOriginal"),
        }
    }
}

/// The ordered behaviors of one expectation.
///
/// Behaviors are consumed one per selected invocation, in declaration order.
/// Once only the last one remains, it repeats forever.  An empty queue
/// yields the mock's default behavior.
#[derive(Clone, Debug, Default)]
pub(crate) struct BehaviorQueue {
    behaviors: Vec<Behavior>,
    next: usize,
}

impl BehaviorQueue {
    pub(crate) fn push(&mut self, b: Behavior) {
        self.behaviors.push(b);
    }

    /// The behavior for the next selected invocation, or `fallback` if none
    /// was declared.
    pub(crate) fn pop(&mut self, fallback: Behavior) -> Behavior {
        let Some(last) = self.behaviors.len().checked_sub(1) else {
            return fallback;
        };
        let i = self.next.min(last);
        if self.next < last {
            self.next += 1;
        }
        self.behaviors[i].clone()
    }

    /// Declaration-time checks: every behavior must suit the signature, and
    /// a list of consecutive behaviors must agree with the cardinality.
    pub(crate) fn validate(&self, signature: &Signature, times: &Times)
        -> Result<()>
    {
        for b in &self.behaviors {
            b.validate(signature)?;
        }
        let n = self.behaviors.len();
        if n < 2 {
            return Ok(());
        }
        if n < times.min() {
            return Err(Error::config(format!(
                "not enough consecutive behaviors for {signature}: {n} \
                 declared but it is expected {times} times")));
        }
        if times.max().is_some_and(|max| n > max) {
            return Err(Error::config(format!(
                "more consecutive behaviors than invocations for \
                 {signature}: {n} declared but it is expected {times} times"
            )));
        }
        Ok(())
    }
}
