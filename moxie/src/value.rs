// vim: tw=80
//! Dynamic values that cross the interception port.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
    sync::Arc
};

use downcast::{downcast, Any};

use crate::Kind;

/// Any user type that can travel inside a [`Value::Object`].
///
/// Implemented automatically for every `'static` type that is `Debug`,
/// `Send` and `Sync`.  Use [`downcast_ref`](#method.downcast_ref) to get the
/// concrete type back.
pub trait AnyValue: Any + fmt::Debug + Send + Sync {}
downcast!(dyn AnyValue);

impl<T> AnyValue for T where T: fmt::Debug + Send + Sync + 'static {}

/// An argument, return value or thrown value of a mocked call.
///
/// Integer variants compare equal across signedness when their numeric
/// values are equal.  Objects compare by identity.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    /// A fixed-length sequence, like a Rust array or slice.
    Array(Vec<Value>),
    /// A growable collection, like a `Vec` or a set.
    List(Vec<Value>),
    /// Key/value pairs in insertion order.  Equality ignores the order.
    Map(Vec<(Value, Value)>),
    Object(Arc<dyn AnyValue>),
}

impl Value {
    pub fn array<I, T>(items: I) -> Self
        where I: IntoIterator<Item=T>, T: Into<Value>
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn list<I, T>(items: I) -> Self
        where I: IntoIterator<Item=T>, T: Into<Value>
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
        where I: IntoIterator<Item=(K, V)>, K: Into<Value>, V: Into<Value>
    {
        Value::Map(entries.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }

    /// Wrap an arbitrary user value.  Two objects are equal only if they
    /// share the same allocation.
    pub fn object<T: AnyValue>(t: T) -> Self {
        Value::Object(Arc::new(t))
    }

    /// Borrow the concrete type inside an `Object`, if it is a `T`.
    pub fn downcast_ref<T: AnyValue>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.downcast_ref::<T>().ok(),
            _ => None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            Value::UInt(u) => i64::try_from(u).ok(),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None
        }
    }

    /// The kind this value naturally belongs to.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Option,
            Value::Unit => Kind::Unit,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::UInt(_) => Kind::UInt,
            Value::Float(_) => Kind::Float,
            Value::Char(_) => Kind::Char,
            Value::Str(_) => Kind::Str,
            Value::Array(_) => Kind::Array,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Object(_) => Kind::Object,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) | (Unit, Unit) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Int(a), UInt(b)) | (UInt(b), Int(a)) =>
                i128::from(*a) == i128::from(*b),
            (Float(a), Float(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) | (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => same_entries(a, b),
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            _ => false
        }
    }
}

/// Do two entry lists hold the same entries, in any order?
fn same_entries(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|entry| {
        let found = b.iter().zip(used.iter_mut())
            .find(|(other, used)| !**used && *other == entry);
        match found {
            Some((_, used)) => {
                *used = true;
                true
            },
            None => false
        }
    })
}

impl PartialOrd for Value {
    /// Numbers order across all numeric variants; strings and chars order
    /// among themselves.  Everything else is unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(_) | UInt(_), Int(_) | UInt(_)) =>
                Some(self.as_i128()?.cmp(&other.as_i128()?)),
            (Int(_) | UInt(_) | Float(_), Int(_) | UInt(_) | Float(_)) =>
                self.as_f64()?.partial_cmp(&other.as_f64()?),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (Char(a), Char(b)) => Some(a.cmp(b)),
            _ => None
        }
    }
}

impl Value {
    fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int(i) => Some(i128::from(i)),
            Value::UInt(u) => Some(i128::from(u)),
            _ => None
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::UInt(u) => Some(u as f64),
            Value::Float(f) => Some(f),
            _ => None
        }
    }
}

fn fmt_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value],
           close: &str) -> fmt::Result
{
    f.write_str(open)?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    f.write_str(close)
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(v) => fmt_seq(f, "[", v, "]"),
            Value::List(v) => fmt_seq(f, "<", v, ">"),
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Object(o) => write!(f, "{o:?}"),
        }
    }
}

macro_rules! from_int {
    ($variant:ident, $wide:ty, $($t:ty)*) => {
        $(
            impl From<$t> for Value {
                fn from(x: $t) -> Self {
                    Value::$variant(<$wide>::from(x))
                }
            }
        )*
    }
}

from_int!{Int, i64, i8 i16 i32 i64}
from_int!{UInt, u64, u8 u16 u32 u64}

impl From<usize> for Value {
    fn from(x: usize) -> Self {
        // usize is at most 64 bits on every supported target
        Value::UInt(x as u64)
    }
}

impl From<isize> for Value {
    fn from(x: isize) -> Self {
        Value::Int(x as i64)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Value::Null, Into::into)
    }
}
