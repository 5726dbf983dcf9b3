// vim: tw=80
//! Identity of callable members, and of the things the engine tracks.

use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    sync::Arc
};

use crate::Value;

/// The kind of a parameter or return value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    Unit,
    Bool,
    Int,
    UInt,
    Float,
    Char,
    Str,
    Array,
    List,
    Map,
    /// A nullable value of any other kind.
    Option,
    /// An opaque user type.  Accepts any value.
    Object,
}

impl Kind {
    /// The value returned when a permissive mock has nothing better to say:
    /// null, zero, false, or empty.
    pub fn default_value(self) -> Value {
        match self {
            Kind::Unit => Value::Unit,
            Kind::Bool => Value::Bool(false),
            Kind::Int => Value::Int(0),
            Kind::UInt => Value::UInt(0),
            Kind::Float => Value::Float(0.0),
            Kind::Char => Value::Char('\0'),
            Kind::Str => Value::Str(String::new()),
            Kind::Array => Value::Array(Vec::new()),
            Kind::List => Value::List(Vec::new()),
            Kind::Map => Value::Map(Vec::new()),
            Kind::Option | Kind::Object => Value::Null,
        }
    }

    /// Could a member declared to return this kind return `v`?
    pub fn accepts(self, v: &Value) -> bool {
        match (self, v) {
            (Kind::Object | Kind::Option, _) => true,
            (Kind::Int | Kind::UInt, Value::Int(_) | Value::UInt(_)) => true,
            (k, v) => k == v.kind()
        }
    }
}

/// Identity of a callable member: owning type, member name, parameter kinds
/// and return kind.
///
/// Used as a coarse filter before any argument matcher runs.  Equality
/// ignores the original-implementation capability.
#[derive(Clone, Debug)]
pub struct Signature {
    owner: Arc<str>,
    name: Arc<str>,
    params: Vec<Kind>,
    returns: Kind,
    original: bool,
}

impl Signature {
    /// A member taking no arguments and returning `()`.
    pub fn new(owner: &str, name: &str) -> Self {
        Signature {
            owner: Arc::from(owner),
            name: Arc::from(name),
            params: Vec::new(),
            returns: Kind::Unit,
            original: false
        }
    }

    /// Append a parameter.
    pub fn param(mut self, kind: Kind) -> Self {
        self.params.push(kind);
        self
    }

    /// Append several parameters.
    pub fn params<I: IntoIterator<Item=Kind>>(mut self, kinds: I) -> Self {
        self.params.extend(kinds);
        self
    }

    pub fn returns(mut self, kind: Kind) -> Self {
        self.returns = kind;
        self
    }

    /// Declare that the interception layer can call the real implementation
    /// of this member.  Required by
    /// [`call_original`](crate::ExpectationBuilder::call_original) and by
    /// the fallback of partial mocks.
    pub fn with_original(mut self) -> Self {
        self.original = true;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_kinds(&self) -> &[Kind] {
        &self.params
    }

    pub fn return_kind(&self) -> Kind {
        self.returns
    }

    pub fn supports_original(&self) -> bool {
        self.original
    }

    /// The value a call to this member yields when nothing else applies.
    pub fn default_return(&self) -> Value {
        self.returns.default_value()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name &&
            self.params == other.params && self.returns == other.returns
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
        self.params.hash(state);
        self.returns.hash(state);
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.owner, self.name)?;
        for (i, k) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k:?}")?;
        }
        write!(f, ") -> {:?}", self.returns)
    }
}

/// Identifies one mock object (or one mocked class) within a
/// [`Session`](crate::Session).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MockId(pub(crate) usize);

/// Identifies one [`Group`](crate::Session::group) within a session.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupId(pub(crate) usize);

/// Identifies one declared expectation.  Also its declaration order: lower
/// ids were declared earlier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExpectationId(pub(crate) usize);

impl Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
