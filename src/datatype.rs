/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Datatypes: the fixed catalogue of base types, derived contiguous types,
//! and the [`Element`] trait binding Rust element types to their wire
//! encoding. All fixed-width encodings are big-endian; booleans occupy one
//! byte; the generic element type serializes each element with bincode
//! behind a length prefix.

use std::cmp::Ordering;
use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::error::Result;
use crate::op::Op;

/// The nine base types every message payload is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    /// Unsigned 8-bit byte (wire width 1).
    Byte,
    /// UTF-16 code unit, carried as `u16` (wire width 2).
    Char,
    /// Signed 16-bit integer (wire width 2).
    Short,
    /// Boolean, one byte on the wire.
    Boolean,
    /// Signed 32-bit integer (wire width 4).
    Int,
    /// Signed 64-bit integer (wire width 8).
    Long,
    /// IEEE-754 single (wire width 4).
    Float,
    /// IEEE-754 double (wire width 8).
    Double,
    /// Generic serializable element; variable wire width, accounted as 1.
    Element,
}

impl BaseType {
    /// Wire width of one element, in bytes. The generic element type has no
    /// fixed width and is accounted as 1, so byte-size arithmetic stays
    /// defined everywhere.
    pub fn byte_size(&self) -> usize {
        match self {
            BaseType::Byte | BaseType::Boolean | BaseType::Element => 1,
            BaseType::Char | BaseType::Short => 2,
            BaseType::Int | BaseType::Float => 4,
            BaseType::Long | BaseType::Double => 8,
        }
    }
}

/// A datatype: a base type plus a displacement pattern. Built-in types have
/// a single zero displacement; `contiguous(n)` repeats the pattern `n` times
/// shifted by the extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datatype {
    base: BaseType,
    lb: i32,
    ub: i32,
    displacements: Vec<i32>,
}

impl Datatype {
    fn base_type(base: BaseType) -> Self {
        Datatype {
            base,
            lb: 0,
            ub: 0,
            displacements: vec![0],
        }
    }

    /// The base type all displacements refer to.
    pub fn base(&self) -> BaseType {
        self.base
    }

    /// Span from lower to upper bound, in base elements. One logical element
    /// of this datatype occupies `extent()` slots of the element array.
    pub fn extent(&self) -> usize {
        (self.ub - self.lb + 1) as usize
    }

    /// Number of significant displacements.
    pub fn size(&self) -> usize {
        self.displacements.len()
    }

    /// Wire width of one base element.
    pub fn byte_size(&self) -> usize {
        self.base.byte_size()
    }

    /// Derive a new type repeating this one `count` times, each repetition
    /// displaced by one extent.
    pub fn contiguous(&self, count: usize) -> Result<Datatype> {
        if count == 0 {
            return Err(Error::InvalidArgument(
                "contiguous repetition count must be positive".into(),
            ));
        }
        let ext = self.extent() as i32;
        let mut displacements = Vec::with_capacity(count * self.displacements.len());
        for i in 0..count as i32 {
            for &d in &self.displacements {
                displacements.push(d + i * ext);
            }
        }
        let lb = displacements.iter().copied().min().unwrap_or(0);
        let ub = displacements.iter().copied().max().unwrap_or(0);
        Ok(Datatype {
            base: self.base,
            lb,
            ub,
            displacements,
        })
    }

    /// Indexed type constructor. Present for API compatibility; not
    /// implemented.
    pub fn indexed(&self, _blocklengths: &[usize], _displacements: &[i32]) -> Result<Datatype> {
        Err(Error::Unsupported("indexed datatype constructor"))
    }

    /// Struct type constructor. Present for API compatibility; not
    /// implemented.
    pub fn structured(
        _blocklengths: &[usize],
        _displacements: &[i32],
        _types: &[Datatype],
    ) -> Result<Datatype> {
        Err(Error::Unsupported("struct datatype constructor"))
    }

    /// Check that `T` is the element type this datatype describes.
    pub(crate) fn check<T: Element>(&self) -> Result<()> {
        if self.base == T::BASE {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: self.base,
                got: T::BASE,
            })
        }
    }
}

/// Unsigned byte.
pub static BYTE: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Byte));
/// UTF-16 code unit.
pub static CHAR: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Char));
/// Signed 16-bit integer.
pub static SHORT: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Short));
/// Boolean.
pub static BOOLEAN: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Boolean));
/// Signed 32-bit integer.
pub static INT: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Int));
/// Signed 64-bit integer.
pub static LONG: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Long));
/// IEEE-754 single.
pub static FLOAT: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Float));
/// IEEE-754 double.
pub static DOUBLE: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Double));
/// Generic serializable element.
pub static ELEMENT: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Element));
/// Raw packed bytes, as produced by `Communicator::pack`.
pub static PACKED: LazyLock<Datatype> = LazyLock::new(|| Datatype::base_type(BaseType::Byte));

/// (value, location) pair of shorts, for `MaxLoc`/`MinLoc`.
pub static SHORT2: LazyLock<Datatype> =
    LazyLock::new(|| SHORT.contiguous(2).expect("builtin pair type"));
/// (value, location) pair of ints.
pub static INT2: LazyLock<Datatype> =
    LazyLock::new(|| INT.contiguous(2).expect("builtin pair type"));
/// (value, location) pair of longs.
pub static LONG2: LazyLock<Datatype> =
    LazyLock::new(|| LONG.contiguous(2).expect("builtin pair type"));
/// (value, location) pair of floats.
pub static FLOAT2: LazyLock<Datatype> =
    LazyLock::new(|| FLOAT.contiguous(2).expect("builtin pair type"));
/// (value, location) pair of doubles.
pub static DOUBLE2: LazyLock<Datatype> =
    LazyLock::new(|| DOUBLE.contiguous(2).expect("builtin pair type"));

/// An element type that can cross the wire. Implementations fix the base
/// type, the byte codec, and (where defined) reduction arithmetic and
/// ordering.
pub trait Element: Clone + Default + Send + Sync + 'static {
    /// The base type this Rust type maps to.
    const BASE: BaseType;

    /// Append this element's wire encoding to `out`.
    fn put(&self, out: &mut Vec<u8>);

    /// Decode one element from `src` at `*pos`, advancing `*pos`. Returns
    /// [`Error::BufferExhausted`] when fewer bytes remain than one element
    /// needs.
    fn take(src: &[u8], pos: &mut usize) -> Result<Self>;

    /// `lhs ⊕ rhs` under a builtin operator. Types without arithmetic reject
    /// the operator.
    fn combine(op: Op, lhs: &Self, rhs: &Self) -> Result<Self> {
        let _ = (lhs, rhs);
        Err(Error::UnsupportedOp {
            op: op.name(),
            base: Self::BASE,
        })
    }

    /// Total order used by `Max`/`Min`/`MaxLoc`/`MinLoc`. Types without an
    /// order reject it.
    fn order(lhs: &Self, rhs: &Self) -> Result<Ordering> {
        let _ = (lhs, rhs);
        Err(Error::UnsupportedOp {
            op: "ordering",
            base: Self::BASE,
        })
    }
}

macro_rules! int_element {
    ($t:ty, $base:expr) => {
        impl Element for $t {
            const BASE: BaseType = $base;

            fn put(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn take(src: &[u8], pos: &mut usize) -> Result<Self> {
                const N: usize = std::mem::size_of::<$t>();
                let end = pos.checked_add(N).ok_or(Error::BufferExhausted)?;
                if end > src.len() {
                    return Err(Error::BufferExhausted);
                }
                let mut bytes = [0u8; N];
                bytes.copy_from_slice(&src[*pos..end]);
                *pos = end;
                Ok(<$t>::from_be_bytes(bytes))
            }

            fn combine(op: Op, lhs: &Self, rhs: &Self) -> Result<Self> {
                let (a, b) = (*lhs, *rhs);
                Ok(match op {
                    Op::Max => a.max(b),
                    Op::Min => a.min(b),
                    Op::Sum => a.wrapping_add(b),
                    Op::Prod => a.wrapping_mul(b),
                    Op::Land => ((a != 0) && (b != 0)) as $t,
                    Op::Lor => ((a != 0) || (b != 0)) as $t,
                    Op::Lxor => ((a != 0) != (b != 0)) as $t,
                    Op::Band => a & b,
                    Op::Bor => a | b,
                    Op::Bxor => a ^ b,
                    Op::MaxLoc | Op::MinLoc => {
                        return Err(Error::UnsupportedOp {
                            op: op.name(),
                            base: Self::BASE,
                        });
                    }
                })
            }

            fn order(lhs: &Self, rhs: &Self) -> Result<Ordering> {
                Ok(lhs.cmp(rhs))
            }
        }
    };
}

macro_rules! float_element {
    ($t:ty, $base:expr) => {
        impl Element for $t {
            const BASE: BaseType = $base;

            fn put(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn take(src: &[u8], pos: &mut usize) -> Result<Self> {
                const N: usize = std::mem::size_of::<$t>();
                let end = pos.checked_add(N).ok_or(Error::BufferExhausted)?;
                if end > src.len() {
                    return Err(Error::BufferExhausted);
                }
                let mut bytes = [0u8; N];
                bytes.copy_from_slice(&src[*pos..end]);
                *pos = end;
                Ok(<$t>::from_be_bytes(bytes))
            }

            fn combine(op: Op, lhs: &Self, rhs: &Self) -> Result<Self> {
                Ok(match op {
                    Op::Max => match lhs.total_cmp(rhs) {
                        Ordering::Less => *rhs,
                        _ => *lhs,
                    },
                    Op::Min => match lhs.total_cmp(rhs) {
                        Ordering::Greater => *rhs,
                        _ => *lhs,
                    },
                    Op::Sum => lhs + rhs,
                    Op::Prod => lhs * rhs,
                    _ => {
                        return Err(Error::UnsupportedOp {
                            op: op.name(),
                            base: Self::BASE,
                        });
                    }
                })
            }

            fn order(lhs: &Self, rhs: &Self) -> Result<Ordering> {
                Ok(lhs.total_cmp(rhs))
            }
        }
    };
}

int_element!(u8, BaseType::Byte);
int_element!(u16, BaseType::Char);
int_element!(i16, BaseType::Short);
int_element!(i32, BaseType::Int);
int_element!(i64, BaseType::Long);
float_element!(f32, BaseType::Float);
float_element!(f64, BaseType::Double);

impl Element for bool {
    const BASE: BaseType = BaseType::Boolean;

    fn put(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn take(src: &[u8], pos: &mut usize) -> Result<Self> {
        let byte = *src.get(*pos).ok_or(Error::BufferExhausted)?;
        *pos += 1;
        Ok(byte != 0)
    }

    fn combine(op: Op, lhs: &Self, rhs: &Self) -> Result<Self> {
        let (a, b) = (*lhs, *rhs);
        Ok(match op {
            Op::Land | Op::Band => a && b,
            Op::Lor | Op::Bor => a || b,
            Op::Lxor | Op::Bxor => a != b,
            _ => {
                return Err(Error::UnsupportedOp {
                    op: op.name(),
                    base: Self::BASE,
                });
            }
        })
    }
}

/// A generic serializable element, carried as bincode behind a 32-bit
/// big-endian length prefix. Reduction arithmetic is not defined for it;
/// user operators supply their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obj<T>(pub T);

impl<T> Element for Obj<T>
where
    T: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static,
{
    const BASE: BaseType = BaseType::Element;

    fn put(&self, out: &mut Vec<u8>) {
        // Serialization of a value that already round-tripped through the
        // user's type cannot fail in bincode's default config except on
        // unrepresentable lengths; map that to a zero-length cell which the
        // decoder rejects.
        match bincode::serialize(&self.0) {
            Ok(body) => {
                out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                out.extend_from_slice(&body);
            }
            Err(_) => out.extend_from_slice(&0u32.to_be_bytes()),
        }
    }

    fn take(src: &[u8], pos: &mut usize) -> Result<Self> {
        let len = u32::take(src, pos)? as usize;
        let end = pos.checked_add(len).ok_or(Error::BufferExhausted)?;
        if end > src.len() {
            return Err(Error::BufferExhausted);
        }
        let value: T = bincode::deserialize(&src[*pos..end])?;
        *pos = end;
        Ok(Obj(value))
    }
}

// Length prefixes for `Obj` cells decode through the same trait machinery.
int_element!(u32, BaseType::Int);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_widths() {
        assert_eq!(BYTE.byte_size(), 1);
        assert_eq!(CHAR.byte_size(), 2);
        assert_eq!(SHORT.byte_size(), 2);
        assert_eq!(BOOLEAN.byte_size(), 1);
        assert_eq!(INT.byte_size(), 4);
        assert_eq!(LONG.byte_size(), 8);
        assert_eq!(FLOAT.byte_size(), 4);
        assert_eq!(DOUBLE.byte_size(), 8);
        assert_eq!(ELEMENT.byte_size(), 1);
    }

    #[test]
    fn contiguous_repeats_the_pattern() {
        let t = INT.contiguous(3).unwrap();
        assert_eq!(t.extent(), 3);
        assert_eq!(t.size(), 3);
        let tt = t.contiguous(2).unwrap();
        assert_eq!(tt.extent(), 6);
        assert_eq!(tt.size(), 6);
        assert!(INT.contiguous(0).is_err());
    }

    #[test]
    fn pair_types_have_extent_two() {
        assert_eq!(INT2.extent(), 2);
        assert_eq!(DOUBLE2.extent(), 2);
        assert_eq!(INT2.base(), BaseType::Int);
    }

    #[test]
    fn derived_constructors_are_stubs() {
        assert!(INT.indexed(&[1], &[0]).is_err());
        assert!(Datatype::structured(&[1], &[0], &[INT.clone()]).is_err());
    }

    #[test]
    fn fixed_width_codec_is_big_endian() {
        let mut out = Vec::new();
        0x0102_0304i32.put(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);
        let mut pos = 0;
        assert_eq!(i32::take(&out, &mut pos).unwrap(), 0x0102_0304);
        assert_eq!(pos, 4);
        assert!(i32::take(&out, &mut pos).is_err());
    }

    #[test]
    fn obj_codec_round_trips() {
        let mut out = Vec::new();
        Obj("hello".to_string()).put(&mut out);
        Obj("world".to_string()).put(&mut out);
        let mut pos = 0;
        assert_eq!(Obj::<String>::take(&out, &mut pos).unwrap().0, "hello");
        assert_eq!(Obj::<String>::take(&out, &mut pos).unwrap().0, "world");
        assert_eq!(pos, out.len());
    }

    #[test]
    fn combine_rejects_undefined_arithmetic() {
        assert!(f64::combine(Op::Band, &1.0, &2.0).is_err());
        assert!(bool::combine(Op::Sum, &true, &false).is_err());
        assert_eq!(i32::combine(Op::Sum, &2, &3).unwrap(), 5);
        assert_eq!(bool::combine(Op::Lxor, &true, &false).unwrap(), true);
    }
}
