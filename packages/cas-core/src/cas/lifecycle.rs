use super::Cas;

impl Cas {
    /// Empties the CAS for the next document.
    ///
    /// Drops every feature structure, index membership and the Sofa, and
    /// keeps index definitions and the type system. Heaps that grew beyond
    /// `reset_heap_size` are shrunk back to their initial size; smaller heaps
    /// keep their storage.
    pub fn reset(&mut self) {
        let threshold = self.config.reset_heap_size;
        let used = self.heap.used();
        let shrunk = self.heap.reset(threshold);
        self.strings.reset(threshold);
        self.bytes.reset(threshold);
        self.shorts.reset(threshold);
        self.longs.reset(threshold);
        self.indexes.flush(shrunk);
        self.sofa = None;
        tracing::debug!(
            "Reset CAS: {} cells were in use, heap size now {}{}",
            used,
            self.heap.size(),
            if shrunk { " (shrunk)" } else { "" }
        );
    }

    /// Returns `true` if nothing has been allocated since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.heap.used() == 1
    }
}
