//! Auxiliary heaps for strings and for values that do not fit a main heap cell.

/// Append-only heap of `Copy` values.
///
/// Index 0 always holds `T::default()` so that a zeroed slot reads as the
/// default value.
#[derive(Debug, Clone)]
pub struct AuxHeap<T: Copy + Default> {
    data: Vec<T>,
    initial_capacity: usize,
}

impl<T: Copy + Default> AuxHeap<T> {
    pub fn new(initial_capacity: usize) -> Self {
        let mut data = Vec::with_capacity(initial_capacity.max(1));
        data.push(T::default());
        Self {
            data,
            initial_capacity: initial_capacity.max(1),
        }
    }

    /// Appends a value and returns its index.
    pub fn push(&mut self, value: T) -> usize {
        self.data.push(value);
        self.data.len() - 1
    }

    /// Appends `len` default values and returns the index of the first.
    pub fn alloc(&mut self, len: usize) -> usize {
        let start = self.data.len();
        self.data.resize(start + len, T::default());
        start
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    pub fn slice(&self, start: usize, len: usize) -> &[T] {
        &self.data[start..start + len]
    }

    /// Number of stored values, including the reserved default.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: the reserved default occupies index 0.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Empties the heap, releasing storage beyond `reset_threshold` elements.
    pub fn reset(&mut self, reset_threshold: usize) {
        if self.data.capacity() > reset_threshold {
            self.data = Vec::with_capacity(self.initial_capacity);
        } else {
            self.data.clear();
        }
        self.data.push(T::default());
    }
}

/// Heap of strings; index 0 is the null string.
#[derive(Debug, Clone)]
pub struct StringHeap {
    strings: Vec<Option<String>>,
    initial_capacity: usize,
}

impl StringHeap {
    pub fn new(initial_capacity: usize) -> Self {
        let mut strings = Vec::with_capacity(initial_capacity.max(1));
        strings.push(None);
        Self {
            strings,
            initial_capacity: initial_capacity.max(1),
        }
    }

    /// Stores a string and returns its index; `None` maps to 0.
    pub fn add(&mut self, value: Option<&str>) -> usize {
        match value {
            Some(s) => {
                self.strings.push(Some(s.to_string()));
                self.strings.len() - 1
            }
            None => 0,
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).and_then(|s| s.as_deref())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.strings.capacity()
    }

    /// Drops all strings, releasing storage beyond `reset_threshold` entries.
    pub fn reset(&mut self, reset_threshold: usize) {
        if self.strings.capacity() > reset_threshold {
            self.strings = Vec::with_capacity(self.initial_capacity);
        } else {
            self.strings.clear();
        }
        self.strings.push(None);
    }
}
