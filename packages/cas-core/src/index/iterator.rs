//! Bidirectional cursor over the members of one index.

use std::cmp::Ordering;

use super::comparator::{IndexComparator, KeySource};
use super::IndexKind;
use crate::error::CasError;
use crate::heap::Addr;

/// Cursor over an index in comparator order.
///
/// The cursor borrows the index, so the index cannot change while the
/// cursor is alive. Use [`super::FsIndex::to_vec`] to take a snapshot when
/// the index must be modified during traversal.
///
/// As a std [`Iterator`], `next()` yields the current member and advances.
#[derive(Clone)]
pub struct FsIterator<'a> {
    members: &'a [Addr],
    comparator: &'a IndexComparator,
    kind: IndexKind,
    src: KeySource<'a>,
    filter: Option<(u32, u32)>,
    pos: Option<usize>,
}

impl<'a> FsIterator<'a> {
    pub(crate) fn new(
        members: &'a [Addr],
        comparator: &'a IndexComparator,
        kind: IndexKind,
        src: KeySource<'a>,
        filter: Option<(u32, u32)>,
    ) -> Self {
        Self {
            members,
            comparator,
            kind,
            src,
            filter,
            pos: None,
        }
    }

    fn visible(&self, i: usize) -> bool {
        match self.filter {
            None => true,
            Some((first, last)) => self
                .src
                .type_of(self.members[i])
                .map(|t| {
                    let pre = self.src.ts.pre_order(t);
                    first <= pre && pre <= last
                })
                .unwrap_or(false),
        }
    }

    /// First visible position at or after `from`.
    fn seek_forward(&self, from: usize) -> Option<usize> {
        (from..self.members.len()).find(|i| self.visible(*i))
    }

    /// Last visible position at or before `from`.
    fn seek_backward(&self, from: usize) -> Option<usize> {
        (0..=from).rev().find(|i| self.visible(*i))
    }

    /// Positions on the first member; invalid if the index is empty.
    pub fn move_to_first(&mut self) {
        self.pos = self.seek_forward(0);
    }

    /// Positions on the last member; invalid if the index is empty.
    pub fn move_to_last(&mut self) {
        self.pos = match self.members.len() {
            0 => None,
            n => self.seek_backward(n - 1),
        };
    }

    /// Advances; moving past the last member invalidates the cursor.
    ///
    /// No-op on an invalid cursor.
    pub fn move_to_next(&mut self) {
        if let Some(p) = self.pos {
            self.pos = self.seek_forward(p + 1);
        }
    }

    /// Steps back; moving before the first member invalidates the cursor.
    ///
    /// No-op on an invalid cursor.
    pub fn move_to_previous(&mut self) {
        if let Some(p) = self.pos {
            self.pos = match p {
                0 => None,
                _ => self.seek_backward(p - 1),
            };
        }
    }

    pub fn is_valid(&self) -> bool {
        self.pos.is_some()
    }

    /// Member at the cursor.
    ///
    /// # Returns
    /// `Err(CasError::IteratorInvalidState)` if the cursor is invalid.
    pub fn get(&self) -> Result<Addr, CasError> {
        self.pos
            .map(|p| self.members[p])
            .ok_or(CasError::IteratorInvalidState)
    }

    /// Positions on the first member not less than `target` under the comparator.
    ///
    /// Bag indexes have no order, so the cursor lands on `target` itself or
    /// becomes invalid. A `target` that is not a record of a type covered by
    /// the index invalidates the cursor.
    pub fn move_to(&mut self, target: Addr) {
        let compatible = self.src.heap.contains(target.cell())
            && self
                .src
                .type_of(target)
                .is_some_and(|t| self.src.ts.is_subtype(t, self.comparator.type_code()));
        if !compatible {
            self.pos = None;
            return;
        }
        self.pos = match self.kind {
            IndexKind::Bag => self
                .members
                .iter()
                .position(|m| *m == target)
                .filter(|i| self.visible(*i)),
            IndexKind::Sorted | IndexKind::Set => {
                let start = self.members.partition_point(|m| {
                    self.comparator.compare(&self.src, *m, target) == Ordering::Less
                });
                self.seek_forward(start)
            }
        };
    }

    /// Independent cursor at the same position.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

impl Iterator for FsIterator<'_> {
    type Item = Addr;

    fn next(&mut self) -> Option<Addr> {
        let current = self.pos.map(|p| self.members[p])?;
        self.move_to_next();
        Some(current)
    }
}
