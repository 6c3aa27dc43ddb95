/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Process identities and ordered process groups. A group is an immutable
//! ordered set; a member's position is its rank. All set operations return
//! new groups and preserve first-operand order.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// Opaque identity of a process, assigned at bootstrap. Stable for the
/// lifetime of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

/// Outcome of comparing two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRelation {
    /// Same members in the same order.
    Ident,
    /// Same members, different order.
    Similar,
    /// Different membership.
    Unequal,
}

/// An immutable ordered set of process identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    members: Vec<ProcessId>,
}

impl Group {
    /// Build a group from an ordered member list. Duplicates keep their
    /// first occurrence.
    pub fn new(members: Vec<ProcessId>) -> Self {
        let mut unique = Vec::with_capacity(members.len());
        for id in members {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Group { members: unique }
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Rank of `id` within this group, if it is a member.
    pub fn rank_of(&self, id: ProcessId) -> Option<usize> {
        self.members.iter().position(|m| *m == id)
    }

    /// Member at `rank`.
    pub fn member(&self, rank: usize) -> Option<ProcessId> {
        self.members.get(rank).copied()
    }

    /// The ordered member list.
    pub fn members(&self) -> &[ProcessId] {
        &self.members
    }

    /// All of `self` in order, then members of `other` not already present,
    /// in `other`'s order.
    pub fn union(&self, other: &Group) -> Group {
        let mut members = self.members.clone();
        for id in &other.members {
            if !members.contains(id) {
                members.push(*id);
            }
        }
        Group { members }
    }

    /// Members of `self`, in `self`'s order, that are also in `other`.
    pub fn intersection(&self, other: &Group) -> Group {
        Group {
            members: self
                .members
                .iter()
                .copied()
                .filter(|id| other.members.contains(id))
                .collect(),
        }
    }

    /// Members of `self`, in `self`'s order, that are not in `other`.
    pub fn difference(&self, other: &Group) -> Group {
        Group {
            members: self
                .members
                .iter()
                .copied()
                .filter(|id| !other.members.contains(id))
                .collect(),
        }
    }

    /// New group of the members at `ranks`, in the listed order.
    pub fn incl(&self, ranks: &[usize]) -> Result<Group> {
        let mut members = Vec::with_capacity(ranks.len());
        for &rank in ranks {
            members.push(self.member(rank).ok_or(Error::InvalidRank {
                rank: rank as i32,
                size: self.size(),
            })?);
        }
        Ok(Group::new(members))
    }

    /// New group without the members at `ranks`, preserving order.
    pub fn excl(&self, ranks: &[usize]) -> Result<Group> {
        for &rank in ranks {
            if rank >= self.size() {
                return Err(Error::InvalidRank {
                    rank: rank as i32,
                    size: self.size(),
                });
            }
        }
        Ok(Group {
            members: self
                .members
                .iter()
                .enumerate()
                .filter(|(rank, _)| !ranks.contains(rank))
                .map(|(_, id)| *id)
                .collect(),
        })
    }

    /// `incl` over `(first, last, stride)` ranges. Strides may be negative;
    /// zero strides are rejected.
    pub fn range_incl(&self, ranges: &[(i32, i32, i32)]) -> Result<Group> {
        Ok(Group::new(
            self.expand_ranges(ranges)?
                .into_iter()
                .map(|rank| self.members[rank])
                .collect(),
        ))
    }

    /// `excl` over `(first, last, stride)` ranges.
    pub fn range_excl(&self, ranges: &[(i32, i32, i32)]) -> Result<Group> {
        let excluded = self.expand_ranges(ranges)?;
        Ok(Group {
            members: self
                .members
                .iter()
                .enumerate()
                .filter(|(rank, _)| !excluded.contains(rank))
                .map(|(_, id)| *id)
                .collect(),
        })
    }

    fn expand_ranges(&self, ranges: &[(i32, i32, i32)]) -> Result<Vec<usize>> {
        let mut ranks = Vec::new();
        for &(first, last, stride) in ranges {
            if stride == 0 {
                return Err(Error::InvalidArgument("range stride must be non-zero".into()));
            }
            let mut rank = first;
            while (stride > 0 && rank <= last) || (stride < 0 && rank >= last) {
                if rank < 0 || rank as usize >= self.size() {
                    return Err(Error::InvalidRank {
                        rank,
                        size: self.size(),
                    });
                }
                ranks.push(rank as usize);
                rank += stride;
            }
        }
        Ok(ranks)
    }

    /// Relate two groups: identical order, same membership, or neither.
    pub fn compare(a: &Group, b: &Group) -> GroupRelation {
        if a.members == b.members {
            GroupRelation::Ident
        } else if a.size() == b.size() && a.members.iter().all(|id| b.members.contains(id)) {
            GroupRelation::Similar
        } else {
            GroupRelation::Unequal
        }
    }

    /// For each rank of `self` in `ranks`, the corresponding rank in
    /// `other`, or `None` where the member is absent there.
    pub fn translate_ranks(&self, other: &Group, ranks: &[usize]) -> Result<Vec<Option<usize>>> {
        ranks
            .iter()
            .map(|&rank| {
                let id = self.member(rank).ok_or(Error::InvalidRank {
                    rank: rank as i32,
                    size: self.size(),
                })?;
                Ok(other.rank_of(id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(ids: &[u64]) -> Group {
        Group::new(ids.iter().map(|&i| ProcessId(i)).collect())
    }

    #[test]
    fn ranks_follow_member_order() {
        let g = group(&[5, 3, 9]);
        assert_eq!(g.size(), 3);
        assert_eq!(g.rank_of(ProcessId(3)), Some(1));
        assert_eq!(g.member(2), Some(ProcessId(9)));
        assert_eq!(g.rank_of(ProcessId(1)), None);
    }

    #[test]
    fn algebra_preserves_first_operand_order() {
        let a = group(&[1, 2, 3]);
        let b = group(&[3, 4]);
        assert_eq!(a.union(&b), group(&[1, 2, 3, 4]));
        assert_eq!(a.intersection(&b), group(&[3]));
        assert_eq!(a.difference(&b), group(&[1, 2]));
    }

    #[test]
    fn incl_excl() {
        let g = group(&[10, 11, 12, 13]);
        assert_eq!(g.incl(&[2, 0]).unwrap(), group(&[12, 10]));
        assert_eq!(g.excl(&[1, 3]).unwrap(), group(&[10, 12]));
        assert!(g.incl(&[4]).is_err());
        assert!(g.excl(&[4]).is_err());
    }

    #[test]
    fn ranges() {
        let g = group(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(g.range_incl(&[(0, 4, 2)]).unwrap(), group(&[0, 2, 4]));
        assert_eq!(g.range_incl(&[(4, 0, -2)]).unwrap(), group(&[4, 2, 0]));
        assert_eq!(g.range_excl(&[(1, 5, 2)]).unwrap(), group(&[0, 2, 4]));
        assert!(g.range_incl(&[(0, 2, 0)]).is_err());
        assert!(g.range_incl(&[(0, 6, 1)]).is_err());
    }

    #[test]
    fn compare_relations() {
        let a = group(&[1, 2, 3]);
        assert_eq!(Group::compare(&a, &group(&[1, 2, 3])), GroupRelation::Ident);
        assert_eq!(Group::compare(&a, &group(&[3, 1, 2])), GroupRelation::Similar);
        assert_eq!(Group::compare(&a, &group(&[1, 2])), GroupRelation::Unequal);
        assert_eq!(Group::compare(&a, &group(&[1, 2, 4])), GroupRelation::Unequal);
    }

    #[test]
    fn translate() {
        let a = group(&[1, 2, 3]);
        let b = group(&[3, 1]);
        assert_eq!(
            a.translate_ranks(&b, &[0, 1, 2]).unwrap(),
            vec![Some(1), None, Some(0)]
        );
        assert!(a.translate_ranks(&b, &[3]).is_err());
    }
}
