//! Main heap of `i32` cells.

use crate::error::CasError;

/// Largest heap size addressable by a reference slot.
const MAX_HEAP_SIZE: usize = i32::MAX as usize;

/// Growable array of `i32` cells with a bump allocation pointer.
///
/// The backing vector is always fully initialised; its length is the heap
/// size and `pos` is the first free cell. Cell 0 is reserved for null.
#[derive(Debug, Clone)]
pub struct Heap {
    cells: Vec<i32>,
    pos: usize,
    initial_size: usize,
}

impl Heap {
    /// Creates a heap with `initial_size` cells.
    ///
    /// # Panics
    /// Panics if `initial_size` is less than 2.
    pub fn new(initial_size: usize) -> Self {
        assert!(initial_size >= 2, "initial_size must be >= 2");
        Self {
            cells: vec![0; initial_size],
            pos: 1,
            initial_size,
        }
    }

    /// Current heap size in cells (allocated capacity).
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells in use, including the reserved null cell.
    pub fn used(&self) -> usize {
        self.pos
    }

    /// Size the heap was created with and shrinks back to.
    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    /// Returns `true` if `cell` lies within the allocated region.
    pub fn contains(&self, cell: usize) -> bool {
        cell >= 1 && cell < self.pos
    }

    /// Reserves `len` zeroed cells and returns the first one.
    ///
    /// # Returns
    /// `Err(CasError::HeapExhausted)` if the heap would exceed the addressable size.
    pub fn alloc(&mut self, len: usize) -> Result<usize, CasError> {
        let required = self
            .pos
            .checked_add(len)
            .filter(|r| *r <= MAX_HEAP_SIZE)
            .ok_or(CasError::HeapExhausted {
                requested: self.pos.saturating_add(len),
            })?;
        if required > self.cells.len() {
            self.grow(required);
        }
        let start = self.pos;
        self.pos = required;
        Ok(start)
    }

    /// Grows geometrically so that at least `required` cells exist.
    fn grow(&mut self, required: usize) {
        let doubled = self.cells.len().max(1).saturating_mul(2);
        let new_size = doubled.max(required).min(MAX_HEAP_SIZE);
        tracing::debug!("Growing heap from {} to {} cells", self.cells.len(), new_size);
        self.cells.resize(new_size, 0);
    }

    #[inline]
    pub fn get(&self, cell: usize) -> i32 {
        self.cells[cell]
    }

    #[inline]
    pub fn set(&mut self, cell: usize, value: i32) {
        self.cells[cell] = value;
    }

    pub fn slice(&self, start: usize, len: usize) -> &[i32] {
        &self.cells[start..start + len]
    }

    pub fn slice_mut(&mut self, start: usize, len: usize) -> &mut [i32] {
        &mut self.cells[start..start + len]
    }

    /// Empties the heap.
    ///
    /// If the heap grew beyond `reset_threshold` cells, the backing storage
    /// is replaced by a fresh buffer of the initial size. Otherwise the used
    /// cells are zeroed and the storage is kept for the next cycle.
    ///
    /// # Returns
    /// `true` if the storage was shrunk.
    pub fn reset(&mut self, reset_threshold: usize) -> bool {
        let shrink = self.cells.len() > reset_threshold;
        if shrink {
            tracing::debug!(
                "Heap size {} exceeds reset threshold {}, shrinking to {}",
                self.cells.len(),
                reset_threshold,
                self.initial_size
            );
            self.cells = vec![0; self.initial_size];
        } else {
            self.cells[..self.pos].fill(0);
        }
        self.pos = 1;
        shrink
    }
}
