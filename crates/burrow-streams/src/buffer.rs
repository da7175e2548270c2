//! Growable read buffer with look-back.
//!
//! Data between the start of the storage and `read_pos` has already been
//! handed out but is kept so a stream can step back into it. The window is
//! lost when the buffer has to compact to make room for new data.

/// Buffer backing a [`crate::BufferedStream`].
#[derive(Debug)]
pub struct StreamBuffer<T> {
    data: Vec<T>,
    read_pos: usize,
    avail: usize,
}

impl<T: Copy + Default> StreamBuffer<T> {
    /// Create a buffer with `capacity` slots allocated up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity],
            read_pos: 0,
            avail: 0,
        }
    }

    /// Number of allocated slots.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Elements written but not yet read.
    pub fn avail(&self) -> usize {
        self.avail
    }

    /// Elements before the read position that can still be revisited.
    pub fn look_back(&self) -> usize {
        self.read_pos
    }

    /// Grow the allocation to at least `size` slots.
    pub fn set_min_size(&mut self, size: usize) {
        if self.data.len() < size {
            self.data.resize(size, T::default());
        }
    }

    /// Grow so that `n` elements past the read position fit without
    /// compaction, which keeps the current look-back window alive while
    /// they are read.
    pub fn reserve_ahead(&mut self, n: usize) {
        self.set_min_size(self.read_pos.saturating_add(n));
    }

    /// Make room for at least `needed` more elements after the unread data.
    ///
    /// Returns the number of writable slots. Unread data is moved to the
    /// front when the tail is too short, which drops the look-back window.
    pub fn make_space(&mut self, needed: usize) -> usize {
        let mut space = self.data.len() - self.read_pos - self.avail;
        if space >= needed {
            return space;
        }

        if self.avail > 0 {
            if self.read_pos != 0 {
                self.data
                    .copy_within(self.read_pos..self.read_pos + self.avail, 0);
                space += self.read_pos;
                self.read_pos = 0;
            }
        } else {
            self.read_pos = 0;
            space = self.data.len();
        }
        if space >= needed {
            return space;
        }

        let grow = needed - space;
        self.data.resize(self.data.len() + grow, T::default());
        needed
    }

    /// Writable slots after the unread data, limited to `space`.
    pub fn spare_mut(&mut self, space: usize) -> &mut [T] {
        let start = self.read_pos + self.avail;
        let end = (start + space).min(self.data.len());
        &mut self.data[start..end]
    }

    /// Mark `n` freshly written elements as available.
    pub fn commit(&mut self, n: usize) {
        self.avail += n;
    }

    /// Consume up to `max` elements (`0` for all), returning their range.
    pub fn take(&mut self, max: usize) -> std::ops::Range<usize> {
        let n = if max == 0 { self.avail } else { max.min(self.avail) };
        let start = self.read_pos;
        self.read_pos += n;
        self.avail -= n;
        start..start + n
    }

    /// Elements in `range` of the backing storage.
    pub fn slice(&self, range: std::ops::Range<usize>) -> &[T] {
        &self.data[range]
    }

    /// Step back by `d` elements (negative steps forward).
    ///
    /// Fails without changes when the target lies outside the retained data.
    pub fn rewind(&mut self, d: i64) -> bool {
        let reachable_back = self.read_pos as i64;
        if d > reachable_back || -d > self.avail as i64 {
            return false;
        }
        if d >= 0 {
            let d = d as usize;
            self.read_pos -= d;
            self.avail += d;
        } else {
            let d = (-d) as usize;
            self.read_pos += d;
            self.avail -= d;
        }
        true
    }
}
