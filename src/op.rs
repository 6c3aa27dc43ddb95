/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reduction operators. The builtins are a closed enum; user-defined
//! operators implement [`ReduceOp`] directly.

use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::error::Error;
use crate::error::Result;

/// The twelve builtin reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Element-wise maximum.
    Max,
    /// Element-wise minimum.
    Min,
    /// Element-wise sum (wrapping for integers).
    Sum,
    /// Element-wise product (wrapping for integers).
    Prod,
    /// Logical and (non-zero is true).
    Land,
    /// Bitwise and.
    Band,
    /// Logical or.
    Lor,
    /// Bitwise or.
    Bor,
    /// Logical exclusive or.
    Lxor,
    /// Bitwise exclusive or.
    Bxor,
    /// Maximum of the first slot of each pair, carrying the whole pair;
    /// requires a datatype of extent at least 2 (e.g. `INT2`).
    MaxLoc,
    /// Minimum-with-location counterpart of `MaxLoc`.
    MinLoc,
}

impl Op {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Op::Max => "max",
            Op::Min => "min",
            Op::Sum => "sum",
            Op::Prod => "prod",
            Op::Land => "land",
            Op::Band => "band",
            Op::Lor => "lor",
            Op::Bor => "bor",
            Op::Lxor => "lxor",
            Op::Bxor => "bxor",
            Op::MaxLoc => "maxloc",
            Op::MinLoc => "minloc",
        }
    }
}

/// A reduction operator over element type `T`.
///
/// `apply` computes `dst = src ⊕ dst`, element by element: `src` is the LEFT
/// operand. Reduction trees preserve rank order through this convention, so
/// non-commutative user operators combine contributions in rank order.
pub trait ReduceOp<T>: Send + Sync {
    /// Whether the operator commutes. Builtins all do; non-commutative user
    /// operators still see operands in rank order.
    fn commutative(&self) -> bool;

    /// Fold `count` logical elements of `dtype` from `src` into `dst`.
    /// Slices hold `count * dtype.extent()` base elements.
    fn apply(&self, src: &[T], dst: &mut [T], count: usize, dtype: &Datatype) -> Result<()>;
}

impl<T: Element> ReduceOp<T> for Op {
    fn commutative(&self) -> bool {
        true
    }

    fn apply(&self, src: &[T], dst: &mut [T], count: usize, dtype: &Datatype) -> Result<()> {
        let ext = dtype.extent();
        let total = count * ext;
        if src.len() < total || dst.len() < total {
            return Err(Error::InvalidArgument(format!(
                "reduction over {} elements of extent {} needs {} slots, got {}/{}",
                count,
                ext,
                total,
                src.len(),
                dst.len()
            )));
        }
        match self {
            Op::MaxLoc | Op::MinLoc => {
                if ext < 2 {
                    return Err(Error::InvalidArgument(
                        "maxloc/minloc need a pair datatype of extent >= 2".into(),
                    ));
                }
                for i in 0..count {
                    let at = i * ext;
                    let value = T::order(&src[at], &dst[at])?;
                    let take_src = match (self, value) {
                        (Op::MaxLoc, std::cmp::Ordering::Greater) => true,
                        (Op::MinLoc, std::cmp::Ordering::Less) => true,
                        // On equal values, the pair with the smaller
                        // location wins.
                        (_, std::cmp::Ordering::Equal) => {
                            T::order(&src[at + 1], &dst[at + 1])? == std::cmp::Ordering::Less
                        }
                        _ => false,
                    };
                    if take_src {
                        dst[at..at + ext].clone_from_slice(&src[at..at + ext]);
                    }
                }
            }
            op => {
                for k in 0..total {
                    dst[k] = T::combine(*op, &src[k], &dst[k])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::INT;
    use crate::datatype::INT2;

    #[test]
    fn sum_folds_src_into_dst() {
        let src = [1i32, 2, 3];
        let mut dst = [10i32, 20, 30];
        Op::Sum.apply(&src, &mut dst, 3, &INT).unwrap();
        assert_eq!(dst, [11, 22, 33]);
    }

    #[test]
    fn maxloc_compares_first_slot_and_carries_the_pair() {
        // (value, location) pairs.
        let src = [5i32, 0, 1, 0, 7, 0];
        let mut dst = [3i32, 1, 9, 1, 7, 1];
        Op::MaxLoc.apply(&src, &mut dst, 3, &INT2).unwrap();
        // First pair: src wins. Second: dst wins. Third: tie, smaller
        // location wins.
        assert_eq!(dst, [5, 0, 9, 1, 7, 0]);
    }

    #[test]
    fn maxloc_requires_a_pair_type() {
        let src = [1i32];
        let mut dst = [2i32];
        assert!(Op::MaxLoc.apply(&src, &mut dst, 1, &INT).is_err());
    }

    #[test]
    fn short_slices_are_rejected() {
        let src = [1i32];
        let mut dst = [2i32];
        assert!(Op::Sum.apply(&src, &mut dst, 2, &INT).is_err());
    }
}
