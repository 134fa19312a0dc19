//! Runtime value representation for the facevm machine.
//!
//! Values are the only unit of storage: constants, locals and operands
//! are all `Value`s.

use std::fmt;
use std::rc::Rc;

use crate::kind::Kind;
use crate::method::MethodDescriptor;

/// A tagged value. The variant is the kind; the payload is only reachable
/// by matching on it.
///
/// Strings and methods are reference counted, so copying a value onto
/// the operand stack shares the payload instead of duplicating it.
#[derive(Debug, Clone)]
pub enum Value {
    Byte(i8),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Rc<str>),
    Reference(u32),
    Method(Rc<MethodDescriptor>),
}

// Floats compare by bit pattern so that Value can be Eq. No opcode
// produces floats yet; this only matters for tests and tooling.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Method(a), Value::Method(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Returns the kind tag for this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Byte(_) => Kind::Byte,
            Value::Integer(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::Long(_) => Kind::Long,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Reference(_) => Kind::Reference,
            Value::Method(_) => Kind::Method,
        }
    }

    /// A value of `kind` with its default payload.
    ///
    /// Used to tag freshly opened locals. Methods have no default.
    pub fn zeroed(kind: Kind) -> Option<Value> {
        match kind {
            Kind::Byte => Some(Value::Byte(0)),
            Kind::Integer => Some(Value::Integer(0)),
            Kind::Float => Some(Value::Float(0.0)),
            Kind::Long => Some(Value::Long(0)),
            Kind::Double => Some(Value::Double(0.0)),
            Kind::String => Some(Value::String(Rc::from(""))),
            Kind::Reference => Some(Value::Reference(0)),
            Kind::Method => None,
        }
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn method(descriptor: MethodDescriptor) -> Value {
        Value::Method(Rc::new(descriptor))
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&Rc<MethodDescriptor>> {
        match self {
            Value::Method(m) => Some(m),
            _ => None,
        }
    }
}

/// Debug rendering in `{ type: int, value: 5 }` form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Value::Byte(n) => write!(f, "{{ type: {kind}, value: {n} }}"),
            Value::Integer(n) => write!(f, "{{ type: {kind}, value: {n} }}"),
            Value::Float(x) => write!(f, "{{ type: {kind}, value: {x} }}"),
            Value::Long(n) => write!(f, "{{ type: {kind}, value: {n} }}"),
            Value::Double(x) => write!(f, "{{ type: {kind}, value: {x} }}"),
            Value::String(s) => write!(f, "{{ type: {kind}, value: {s:?} }}"),
            Value::Reference(r) => write!(f, "{{ type: {kind}, value: {r:#x} }}"),
            Value::Method(m) => write!(f, "{{ type: {kind}, value: {:?} }}", m.name),
        }
    }
}
