//! Named indexes over the heap of one CAS.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::comparator::{IndexComparator, KeySource};
use super::iterator::FsIterator;
use super::IndexKind;
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{names, TypeCode, TypeSystem};

/// Definition of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Unique label
    pub label: String,
    /// Index kind
    pub kind: IndexKind,
    /// Comparator; its type is the base type of the index
    pub comparator: IndexComparator,
}

impl IndexDefinition {
    pub fn new(label: impl Into<String>, kind: IndexKind, comparator: IndexComparator) -> Self {
        Self {
            label: label.into(),
            kind,
            comparator,
        }
    }

    /// Base type of the index.
    pub fn type_code(&self) -> TypeCode {
        self.comparator.type_code()
    }
}

/// Members of one index.
#[derive(Debug, Clone)]
pub(crate) struct IndexStore {
    pub(crate) def: IndexDefinition,
    pub(crate) members: Vec<Addr>,
}

impl IndexStore {
    fn insert(&mut self, src: &KeySource<'_>, addr: Addr) -> bool {
        let cmp = &self.def.comparator;
        match self.def.kind {
            IndexKind::Bag => {
                self.members.push(addr);
                true
            }
            IndexKind::Sorted => {
                // Appending in order is the common case when annotating left to right.
                if let Some(last) = self.members.last() {
                    if cmp.compare_total(src, *last, addr) == Ordering::Less {
                        self.members.push(addr);
                        return true;
                    }
                }
                match self
                    .members
                    .binary_search_by(|m| cmp.compare_total(src, *m, addr))
                {
                    Ok(_) => false,
                    Err(pos) => {
                        self.members.insert(pos, addr);
                        true
                    }
                }
            }
            IndexKind::Set => {
                match self
                    .members
                    .binary_search_by(|m| cmp.compare(src, *m, addr))
                {
                    Ok(_) => false,
                    Err(pos) => {
                        self.members.insert(pos, addr);
                        true
                    }
                }
            }
        }
    }

    fn remove(&mut self, src: &KeySource<'_>, addr: Addr) -> bool {
        let cmp = &self.def.comparator;
        let found = match self.def.kind {
            IndexKind::Bag => self.members.iter().position(|m| *m == addr),
            IndexKind::Sorted => self
                .members
                .binary_search_by(|m| cmp.compare_total(src, *m, addr))
                .ok(),
            IndexKind::Set => self
                .members
                .binary_search_by(|m| cmp.compare(src, *m, addr))
                .ok()
                .filter(|pos| self.members[*pos] == addr),
        };
        // Keys changed while indexed leave the member out of place; fall back to a scan.
        let found = found.or_else(|| {
            if self.def.kind == IndexKind::Bag {
                None
            } else {
                self.members.iter().position(|m| *m == addr)
            }
        });
        match found {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Sorted members whose keys changed while indexed are only found by a scan.
    fn kind_allows_scan(&self) -> bool {
        self.def.kind == IndexKind::Sorted
    }

    fn position_of(&self, src: &KeySource<'_>, addr: Addr) -> Option<usize> {
        let cmp = &self.def.comparator;
        match self.def.kind {
            IndexKind::Bag => self.members.iter().position(|m| *m == addr),
            IndexKind::Sorted => self
                .members
                .binary_search_by(|m| cmp.compare_total(src, *m, addr))
                .ok(),
            IndexKind::Set => self
                .members
                .binary_search_by(|m| cmp.compare(src, *m, addr))
                .ok(),
        }
    }
}

/// Collection of named indexes plus a per-type bag of every indexed FS.
///
/// Definitions may only be added before [`IndexRepository::commit`];
/// membership may only change after it.
#[derive(Debug, Clone)]
pub struct IndexRepository {
    ts: Arc<TypeSystem>,
    indexes: Vec<IndexStore>,
    labels: HashMap<String, usize>,
    type_bags: Vec<Vec<Addr>>,
    /// Entries per address in `type_bags`
    memberships: HashMap<Addr, usize>,
    committed: bool,
}

impl IndexRepository {
    /// Creates an uncommitted repository holding the built-in annotation index.
    pub fn new(ts: Arc<TypeSystem>) -> Self {
        let annotation = IndexDefinition::new(
            names::ANNOTATION_INDEX,
            IndexKind::Sorted,
            IndexComparator::annotation_default(&ts),
        );
        let type_count = ts.type_count();
        let mut repo = Self {
            ts,
            indexes: Vec::new(),
            labels: HashMap::new(),
            type_bags: vec![Vec::new(); type_count],
            memberships: HashMap::new(),
            committed: false,
        };
        repo.labels.insert(annotation.label.clone(), 0);
        repo.indexes.push(IndexStore {
            def: annotation,
            members: Vec::new(),
        });
        repo
    }

    /// Defines a new index.
    ///
    /// # Arguments
    /// * `comparator` - Ordering and base type of the index
    /// * `label` - Unique index label
    /// * `kind` - Sorted, set or bag
    ///
    /// # Returns
    /// `Ok(false)` if the label is already used, `Err` if the repository is
    /// committed or the comparator is invalid for its type.
    pub fn create_index(
        &mut self,
        comparator: IndexComparator,
        label: &str,
        kind: IndexKind,
    ) -> Result<bool, CasError> {
        if self.committed {
            return Err(CasError::IndexRepositoryCommitted);
        }
        if self.labels.contains_key(label) {
            return Ok(false);
        }
        comparator.validate(&self.ts, label)?;
        self.labels.insert(label.to_string(), self.indexes.len());
        self.indexes.push(IndexStore {
            def: IndexDefinition::new(label, kind, comparator),
            members: Vec::new(),
        });
        Ok(true)
    }

    /// Defines an index from a prepared definition.
    pub fn add_definition(&mut self, def: &IndexDefinition) -> Result<bool, CasError> {
        self.create_index(def.comparator.clone(), &def.label, def.kind)
    }

    /// Freezes the index definitions.
    pub fn commit(&mut self) -> Result<(), CasError> {
        if self.committed {
            return Err(CasError::IndexRepositoryCommitted);
        }
        self.committed = true;
        tracing::debug!("Committed index repository with {} indexes", self.indexes.len());
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Index definitions in creation order.
    pub fn definitions(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.iter().map(|store| &store.def)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.indexes.iter().map(|store| store.def.label.as_str())
    }

    pub(crate) fn store(&self, label: &str) -> Result<&IndexStore, CasError> {
        self.labels
            .get(label)
            .map(|i| &self.indexes[*i])
            .ok_or_else(|| CasError::IndexNotFound(label.to_string()))
    }

    /// Adds `addr` of runtime type `t` to every index over a supertype of `t`.
    pub(crate) fn add(&mut self, src: &KeySource<'_>, addr: Addr, t: TypeCode) -> Result<(), CasError> {
        if !self.committed {
            return Err(CasError::IndexRepositoryNotCommitted);
        }
        let mut in_bag = false;
        for store in &mut self.indexes {
            if self.ts.is_subtype(t, store.def.type_code()) {
                store.insert(src, addr);
                in_bag |= store.def.kind == IndexKind::Bag;
            }
        }
        // Only bag indexes hold an FS more than once.
        let count = self.memberships.entry(addr).or_insert(0);
        if *count == 0 || in_bag {
            *count += 1;
            self.type_bags[t.index()].push(addr);
        }
        Ok(())
    }

    /// Detaches `addr` from every index; heap storage is untouched.
    ///
    /// # Returns
    /// `true` if the FS was a member of at least one index.
    pub(crate) fn remove(
        &mut self,
        src: &KeySource<'_>,
        addr: Addr,
        t: TypeCode,
    ) -> Result<bool, CasError> {
        if !self.committed {
            return Err(CasError::IndexRepositoryNotCommitted);
        }
        let mut removed = false;
        for store in &mut self.indexes {
            if self.ts.is_subtype(t, store.def.type_code()) {
                removed |= store.remove(src, addr);
            }
        }
        if let Some(count) = self.memberships.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.memberships.remove(&addr);
            }
            let bag = &mut self.type_bags[t.index()];
            if let Some(pos) = bag.iter().position(|m| *m == addr) {
                bag.remove(pos);
            }
            removed = true;
        }
        Ok(removed)
    }

    /// Returns `true` if `addr` is indexed.
    pub(crate) fn contains(&self, addr: Addr) -> bool {
        self.memberships.contains_key(&addr)
    }

    /// Every indexed FS of type `t` or a subtype, grouped by exact type in pre-order.
    pub(crate) fn all_indexed(&self, t: TypeCode) -> impl Iterator<Item = Addr> + '_ {
        let (first, last) = self.ts.subtype_range(t);
        self.ts.preorder()[first as usize..=last as usize]
            .iter()
            .flat_map(move |sub| self.type_bags[sub.index()].iter().copied())
    }

    /// Number of indexed FS, counting repeats held by bag indexes.
    pub(crate) fn indexed_count(&self) -> usize {
        self.type_bags.iter().map(Vec::len).sum()
    }

    /// Drops all memberships, keeping definitions.
    ///
    /// With `release` set, member storage is freed as well.
    pub(crate) fn flush(&mut self, release: bool) {
        for store in &mut self.indexes {
            if release {
                store.members = Vec::new();
            } else {
                store.members.clear();
            }
        }
        for bag in &mut self.type_bags {
            if release {
                *bag = Vec::new();
            } else {
                bag.clear();
            }
        }
        if release {
            self.memberships = HashMap::new();
        } else {
            self.memberships.clear();
        }
    }
}

/// Read-only view of one index, optionally restricted to a subtype.
#[derive(Clone)]
pub struct FsIndex<'a> {
    store: &'a IndexStore,
    src: KeySource<'a>,
    subtype: Option<TypeCode>,
}

impl<'a> FsIndex<'a> {
    pub(crate) fn new(store: &'a IndexStore, src: KeySource<'a>, subtype: Option<TypeCode>) -> Self {
        Self {
            store,
            src,
            subtype,
        }
    }

    pub fn label(&self) -> &str {
        &self.store.def.label
    }

    pub fn kind(&self) -> IndexKind {
        self.store.def.kind
    }

    /// Type this view iterates: the requested subtype or the index base type.
    pub fn type_code(&self) -> TypeCode {
        self.subtype.unwrap_or_else(|| self.store.def.type_code())
    }

    pub fn comparator(&self) -> &IndexComparator {
        &self.store.def.comparator
    }

    fn filter(&self) -> Option<(u32, u32)> {
        self.subtype.map(|t| self.src.ts.subtype_range(t))
    }

    fn matches(&self, addr: Addr) -> bool {
        match self.filter() {
            None => true,
            Some((first, last)) => self
                .src
                .type_of(addr)
                .map(|t| {
                    let pre = self.src.ts.pre_order(t);
                    first <= pre && pre <= last
                })
                .unwrap_or(false),
        }
    }

    /// Number of members visible through this view.
    ///
    /// Constant time for a full view; a subtype view scans all members.
    pub fn size(&self) -> usize {
        match self.subtype {
            None => self.store.members.len(),
            Some(_) => self
                .store
                .members
                .iter()
                .filter(|m| self.matches(**m))
                .count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns `true` if this exact FS is a visible member.
    pub fn contains(&self, addr: Addr) -> bool {
        if !self.compatible(addr) || !self.matches(addr) {
            return false;
        }
        match self.store.position_of(&self.src, addr) {
            Some(pos) if self.store.members[pos] == addr => true,
            _ => self.store.kind_allows_scan() && self.store.members.contains(&addr),
        }
    }

    /// Returns the member comparator-equal to `addr`, if any.
    ///
    /// For a set index this is the retained representative.
    pub fn find(&self, addr: Addr) -> Option<Addr> {
        if !self.compatible(addr) {
            return None;
        }
        let cmp = &self.store.def.comparator;
        match self.store.def.kind {
            IndexKind::Bag => self.store.members.iter().copied().find(|m| *m == addr),
            IndexKind::Sorted | IndexKind::Set => {
                let start = self
                    .store
                    .members
                    .partition_point(|m| cmp.compare(&self.src, *m, addr) == Ordering::Less);
                self.store.members[start..]
                    .iter()
                    .copied()
                    .take_while(|m| cmp.compare(&self.src, *m, addr) == Ordering::Equal)
                    .find(|m| self.matches(*m))
            }
        }
    }

    fn compatible(&self, addr: Addr) -> bool {
        self.src.heap.contains(addr.cell())
            && self
                .src
                .type_of(addr)
                .is_some_and(|t| self.src.ts.is_subtype(t, self.store.def.type_code()))
    }

    /// Iterator positioned on the first member.
    pub fn iter(&self) -> FsIterator<'a> {
        let mut it = FsIterator::new(
            &self.store.members,
            &self.store.def.comparator,
            self.store.def.kind,
            self.src,
            self.filter(),
        );
        it.move_to_first();
        it
    }

    /// Copies the visible members in iteration order.
    ///
    /// The copy is unaffected by later index changes.
    pub fn to_vec(&self) -> Vec<Addr> {
        self.iter().collect()
    }
}
