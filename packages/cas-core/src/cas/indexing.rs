use super::Cas;
use crate::error::CasError;
use crate::heap::Addr;
use crate::index::{FsIndex, KeySource};
use crate::types::{names, TypeCode};

impl Cas {
    /// Adds a feature structure to every index over its type or a supertype.
    ///
    /// Key features must not change while the feature structure is indexed.
    pub fn add_fs(&mut self, addr: Addr) -> Result<(), CasError> {
        let t = self.type_of(addr)?;
        let src = KeySource {
            ts: self.ts.as_ref(),
            heap: &self.heap,
            strings: &self.strings,
            longs: &self.longs,
        };
        self.indexes.add(&src, addr, t)
    }

    /// Removes a feature structure from all indexes. Heap storage is kept.
    ///
    /// # Returns
    /// `true` if the feature structure was indexed.
    pub fn remove_fs(&mut self, addr: Addr) -> Result<bool, CasError> {
        let t = self.type_of(addr)?;
        let src = KeySource {
            ts: self.ts.as_ref(),
            heap: &self.heap,
            strings: &self.strings,
            longs: &self.longs,
        };
        self.indexes.remove(&src, addr, t)
    }

    /// Returns `true` if the feature structure is a member of the indexes.
    pub fn is_indexed(&self, addr: Addr) -> bool {
        self.type_of(addr).is_ok() && self.indexes.contains(addr)
    }

    /// Index by label.
    pub fn index(&self, label: &str) -> Result<FsIndex<'_>, CasError> {
        let store = self.indexes.store(label)?;
        Ok(FsIndex::new(store, self.key_source(), None))
    }

    /// Index by label, restricted to `t` and its subtypes.
    ///
    /// # Returns
    /// `Err(CasError::InvalidIndexDefinition)` if `t` is not a subtype of
    /// the index type.
    pub fn index_for_type(&self, label: &str, t: TypeCode) -> Result<FsIndex<'_>, CasError> {
        let store = self.indexes.store(label)?;
        let base = store.def.type_code();
        if !self.ts.is_subtype(t, base) {
            return Err(CasError::InvalidIndexDefinition {
                label: label.to_string(),
                message: format!(
                    "'{}' is not a subtype of '{}'",
                    self.ts.type_name(t),
                    self.ts.type_name(base)
                ),
            });
        }
        Ok(FsIndex::new(store, self.key_source(), Some(t)))
    }

    /// The built-in annotation index.
    pub fn annotation_index(&self) -> Result<FsIndex<'_>, CasError> {
        self.index(names::ANNOTATION_INDEX)
    }

    /// Every indexed feature structure of type `t` or a subtype, grouped by type.
    pub fn all_indexed_fs(&self, t: TypeCode) -> impl Iterator<Item = Addr> + '_ {
        self.indexes.all_indexed(t)
    }

    /// Number of indexed feature structures, counting repeats held by bag indexes.
    pub fn indexed_count(&self) -> usize {
        self.indexes.indexed_count()
    }
}
