//! IR Type Definitions
//!
//! Types, binary operators and comparison conditions of the Syl IR. The
//! source language only has 32-bit integers, so the lattice is small: `i32`,
//! `i1` (comparison results), `void`, row-major arrays of `i32`, and
//! pointers to any of those.

use std::fmt;

/// Types in the IR
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    /// 32-bit signed integer
    Int,
    /// 1-bit comparison result
    Bool,
    Void,
    /// Row-major multi-dimensional array of `i32`
    Array { dims: Vec<u32> },
    /// Pointer to another type; allocations and globals produce these
    Ptr(Box<IrType>),
}

impl IrType {
    /// Wrap in one level of pointer. An allocation of data type `T` has
    /// value type `T*`.
    pub fn ptr_to(self) -> IrType {
        IrType::Ptr(Box::new(self))
    }

    /// Strip one level of pointer, if present.
    pub fn deref(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    /// Array dimensions, looking through at most one pointer level. Scalars
    /// and plain pointers report no dimensions.
    pub fn array_dims(&self) -> &[u32] {
        match self {
            IrType::Array { dims } => dims,
            IrType::Ptr(inner) => match inner.as_ref() {
                IrType::Array { dims } => dims,
                _ => &[],
            },
            _ => &[],
        }
    }

    /// Total element count of an array type (1 for scalars).
    pub fn total_elems(&self) -> u32 {
        match self {
            IrType::Array { dims } => dims.iter().product(),
            _ => 1,
        }
    }

    /// A scalar local variable: not an array, not a pointer. Only these are
    /// candidates for liveness tracking and register allocation.
    pub fn is_scalar(&self) -> bool {
        matches!(self, IrType::Int | IrType::Bool)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Int => write!(f, "i32"),
            IrType::Bool => write!(f, "i1"),
            IrType::Void => write!(f, "void"),
            IrType::Array { dims } => {
                for dim in dims {
                    write!(f, "[{} x ", dim)?;
                }
                write!(f, "i32")?;
                for _ in dims {
                    write!(f, "]")?;
                }
                Ok(())
            }
            IrType::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Truncating signed division
    Sdiv,
    /// Signed remainder
    Srem,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Add => write!(f, "add"),
            BinOp::Sub => write!(f, "sub"),
            BinOp::Mul => write!(f, "mul"),
            BinOp::Sdiv => write!(f, "sdiv"),
            BinOp::Srem => write!(f, "srem"),
        }
    }
}

/// Signed comparison conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpCond {
    Eq,
    Ne,
    Slt,
    Sgt,
    Sle,
    Sge,
}

impl fmt::Display for CmpCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpCond::Eq => write!(f, "eq"),
            CmpCond::Ne => write!(f, "ne"),
            CmpCond::Slt => write!(f, "slt"),
            CmpCond::Sgt => write!(f, "sgt"),
            CmpCond::Sle => write!(f, "sle"),
            CmpCond::Sge => write!(f, "sge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(IrType::Int.to_string(), "i32");
        assert_eq!(IrType::Int.ptr_to().to_string(), "i32*");
        let arr = IrType::Array { dims: vec![3, 4] };
        assert_eq!(arr.to_string(), "[3 x [4 x i32]]");
        assert_eq!(arr.clone().ptr_to().to_string(), "[3 x [4 x i32]]*");
    }

    #[test]
    fn test_total_elems() {
        assert_eq!(IrType::Array { dims: vec![3, 4] }.total_elems(), 12);
        assert_eq!(IrType::Array { dims: vec![7] }.total_elems(), 7);
        assert_eq!(IrType::Int.total_elems(), 1);
    }

    #[test]
    fn test_scalar_classification() {
        assert!(IrType::Int.is_scalar());
        assert!(!IrType::Int.ptr_to().is_scalar());
        assert!(!IrType::Array { dims: vec![2] }.is_scalar());
    }

    #[test]
    fn test_array_dims_through_pointer() {
        let ty = IrType::Array { dims: vec![3, 4] }.ptr_to();
        assert_eq!(ty.array_dims(), &[3, 4]);
        assert_eq!(IrType::Int.ptr_to().array_dims(), &[] as &[u32]);
    }
}
