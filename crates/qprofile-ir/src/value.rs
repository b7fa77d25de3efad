//! Value, block and operand types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an SSA value.
///
/// Value ids are unique across the whole [`Module`](crate::Module), so a
/// single table can track values from every function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl From<u32> for ValueId {
    fn from(id: u32) -> Self {
        ValueId(id)
    }
}

/// Identifier of a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Type of a value or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// No value.
    #[default]
    Void,
    /// Opaque qubit pointer.
    Qubit,
    /// Opaque measurement result pointer.
    Result,
    /// Opaque array pointer.
    Array,
    /// 64-bit integer.
    Int,
    /// 1-bit boolean.
    Bool,
    /// 64-bit float.
    Double,
}

impl Type {
    /// Whether values of this type address a resource pool.
    pub fn is_resource(self) -> bool {
        matches!(self, Type::Qubit | Type::Result)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Void => "void",
            Type::Qubit => "qubit",
            Type::Result => "result",
            Type::Array => "array",
            Type::Int => "i64",
            Type::Bool => "i1",
            Type::Double => "double",
        };
        f.write_str(s)
    }
}

/// An instruction operand.
///
/// `Qubit` and `Result` are compile-time-constant addresses, the form a
/// profile-compliant program uses in place of dynamically acquired values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    /// Reference to an SSA value.
    Value(ValueId),
    /// Static qubit address.
    Qubit(u64),
    /// Static result address.
    Result(u64),
    /// Integer constant.
    Int(i64),
    /// Boolean constant.
    Bool(bool),
    /// Floating point constant.
    Double(f64),
    /// Null pointer.
    Null,
}

impl Operand {
    /// Get the referenced value, if this operand is one.
    #[inline]
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the integer constant, if this operand is one.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this operand is a constant (not an SSA value).
    #[inline]
    pub fn is_constant(&self) -> bool {
        !matches!(self, Operand::Value(_))
    }
}

impl From<ValueId> for Operand {
    fn from(v: ValueId) -> Self {
        Operand::Value(v)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{v}"),
            Operand::Qubit(q) => write!(f, "qubit {q}"),
            Operand::Result(r) => write!(f, "result {r}"),
            Operand::Int(i) => write!(f, "{i}"),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Double(d) => write!(f, "{d}"),
            Operand::Null => f.write_str("null"),
        }
    }
}
