use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::mem;

/// Element capacity used when the construction hint is 0.
const DEFAULT_CAPACITY: usize = 16;

/// Cleanup callback invoked with an element's bytes at the moment the element
/// is permanently destroyed: on [`StrideVec::replace`], [`StrideVec::remove`],
/// [`StrideVec::clear`], or drop of the vector.
///
/// Never invoked when [`StrideVec::sort_by`] relocates elements.
pub type CleanupFn = Box<dyn FnMut(&mut [u8])>;

/// A growable sequence of fixed-width byte elements stored at a constant
/// stride in one contiguous buffer.
///
/// The element width is fixed at construction; every element occupies exactly
/// that many bytes and the vector never interprets them. An optional cleanup
/// callback observes an element's bytes when the element is destroyed, with
/// the same ownership contract as [`ByteMap`]: replacement and removal destroy
/// the outgoing element, reordering destroys nothing.
///
/// Out-of-range indices passed to [`insert`], [`replace`], and [`remove`] are
/// programmer errors and panic; [`get`] returns `None` for them instead, since
/// probing past the end is an ordinary absence.
///
/// [`ByteMap`]: crate::ByteMap
/// [`insert`]: StrideVec::insert
/// [`replace`]: StrideVec::replace
/// [`remove`]: StrideVec::remove
/// [`get`]: StrideVec::get
///
/// ## Example
///
/// ```rust
/// use chain_map::StrideVec;
///
/// let mut scores = StrideVec::new(8);
/// for n in [30u64, 10, 20] {
///     scores.push(&n.to_ne_bytes());
/// }
///
/// scores.sort_by(|a, b| a.cmp(b));
/// let ordered: Vec<u64> = scores
///     .iter()
///     .map(|e| u64::from_ne_bytes(e.try_into().unwrap()))
///     .collect();
/// assert_eq!(ordered, vec![10, 20, 30]);
/// ```
pub struct StrideVec {
    data: Vec<u8>,
    elem_size: usize,
    cleanup: Option<CleanupFn>,
}

impl StrideVec {
    /// Creates an empty vector for elements of `elem_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `elem_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let vec = StrideVec::new(4);
    /// assert!(vec.is_empty());
    /// assert_eq!(vec.elem_size(), 4);
    /// ```
    pub fn new(elem_size: usize) -> Self {
        Self::with_capacity(elem_size, 0)
    }

    /// Creates an empty vector with room for `capacity_hint` elements before
    /// the first buffer growth.
    ///
    /// A hint of 0 selects a built-in default (16). The hint affects only the
    /// initial allocation; the vector grows as needed either way.
    ///
    /// # Panics
    ///
    /// Panics if `elem_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::with_capacity(2, 100);
    /// vec.push(&[1, 2]);
    /// assert_eq!(vec.len(), 1);
    /// ```
    pub fn with_capacity(elem_size: usize, capacity_hint: usize) -> Self {
        assert!(elem_size > 0, "element size must be nonzero");
        let capacity = if capacity_hint == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity_hint
        };

        Self {
            data: Vec::with_capacity(capacity.saturating_mul(elem_size)),
            elem_size,
            cleanup: None,
        }
    }

    /// Creates an empty vector with a cleanup callback.
    ///
    /// The callback runs exactly once per element at the moment the element
    /// is destroyed: on [`replace`] (with the outgoing bytes), on [`remove`],
    /// on [`clear`], and on drop of the vector. Reordering via [`sort_by`]
    /// never runs it.
    ///
    /// A callback that panics still counts as its element's one invocation;
    /// a panic during [`clear`] or drop discards the elements not yet visited
    /// without running cleanup on them. No element is handed to the callback
    /// twice.
    ///
    /// [`replace`]: StrideVec::replace
    /// [`remove`]: StrideVec::remove
    /// [`clear`]: StrideVec::clear
    /// [`sort_by`]: StrideVec::sort_by
    ///
    /// # Panics
    ///
    /// Panics if `elem_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::with_cleanup(
    ///     1,
    ///     0,
    ///     Box::new(|elem| println!("releasing {elem:?}")),
    /// );
    /// vec.push(&[7]);
    /// vec.remove(0); // prints "releasing [7]"
    /// ```
    pub fn with_cleanup(elem_size: usize, capacity_hint: usize, cleanup: CleanupFn) -> Self {
        let mut vec = Self::with_capacity(elem_size, capacity_hint);
        vec.cleanup = Some(cleanup);
        vec
    }

    /// Returns the number of elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(2);
    /// assert_eq!(vec.len(), 0);
    /// vec.push(&[1, 2]);
    /// assert_eq!(vec.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.data.len() / self.elem_size
    }

    /// Returns `true` if the vector contains no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the fixed byte width of every element.
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    #[inline(always)]
    fn offset(&self, index: usize) -> usize {
        index * self.elem_size
    }

    /// Borrows element `index`. Callers check bounds first.
    fn elem(&self, index: usize) -> &[u8] {
        &self.data[self.offset(index)..self.offset(index + 1)]
    }

    /// Appends an element at the end.
    ///
    /// # Panics
    ///
    /// Panics if `elem.len()` differs from the vector's element size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(3);
    /// vec.push(&[1, 2, 3]);
    /// assert_eq!(vec.get(0), Some(&[1, 2, 3][..]));
    /// ```
    pub fn push(&mut self, elem: &[u8]) {
        assert_eq!(elem.len(), self.elem_size, "element width mismatch");
        self.data.extend_from_slice(elem);
    }

    /// Inserts an element at `index`, shifting everything at and after it one
    /// position toward the end.
    ///
    /// `index` may equal [`len`], in which case this is a tail append.
    ///
    /// [`len`]: StrideVec::len
    ///
    /// # Panics
    ///
    /// Panics if `elem.len()` differs from the element size, or if
    /// `index > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// vec.push(&[b'a']);
    /// vec.push(&[b'c']);
    /// vec.insert(1, &[b'b']);
    ///
    /// let all: Vec<u8> = vec.iter().map(|e| e[0]).collect();
    /// assert_eq!(all, b"abc");
    /// ```
    pub fn insert(&mut self, index: usize, elem: &[u8]) {
        assert_eq!(elem.len(), self.elem_size, "element width mismatch");
        assert!(index <= self.len(), "index out of range");

        // Append, then rotate the new element back into place.
        self.data.extend_from_slice(elem);
        let offset = self.offset(index);
        self.data[offset..].rotate_right(self.elem_size);
    }

    /// Overwrites the element at `index` with new bytes.
    ///
    /// The outgoing element is destroyed: its bytes are handed to the cleanup
    /// callback (if any) once the replacement is in place. This is the
    /// one-slot analogue of remove-then-insert, without the shifting.
    ///
    /// # Panics
    ///
    /// Panics if `elem.len()` differs from the element size, or if
    /// `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(2);
    /// vec.push(&[1, 1]);
    /// vec.replace(0, &[2, 2]);
    /// assert_eq!(vec.get(0), Some(&[2, 2][..]));
    /// assert_eq!(vec.len(), 1);
    /// ```
    pub fn replace(&mut self, index: usize, elem: &[u8]) {
        assert_eq!(elem.len(), self.elem_size, "element width mismatch");
        assert!(index < self.len(), "index out of range");

        let offset = self.offset(index);
        let slot = &mut self.data[offset..offset + elem.len()];
        let mut outgoing = slot.to_vec();
        slot.copy_from_slice(elem);
        // The slot already holds the replacement, so a panicking callback
        // leaves only live elements in the buffer.
        if let Some(cleanup) = &mut self.cleanup {
            cleanup(&mut outgoing);
        }
    }

    /// Removes the element at `index`, shifting everything after it one
    /// position toward the front.
    ///
    /// The element's bytes are detached from the buffer and handed to the
    /// cleanup callback (if any).
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// vec.push(&[1]);
    /// vec.push(&[2]);
    /// vec.push(&[3]);
    ///
    /// vec.remove(1);
    /// let all: Vec<u8> = vec.iter().map(|e| e[0]).collect();
    /// assert_eq!(all, vec![1, 3]);
    /// ```
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.len(), "index out of range");

        let offset = self.offset(index);
        // Detached before the callback runs: a destroyed element never stays
        // reachable, even when the callback panics.
        let mut outgoing: Vec<u8> = self.data.drain(offset..offset + self.elem_size).collect();
        if let Some(cleanup) = &mut self.cleanup {
            cleanup(&mut outgoing);
        }
    }

    /// Returns the bytes of element `index`, or `None` past the end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(2);
    /// vec.push(&[5, 6]);
    /// assert_eq!(vec.get(0), Some(&[5, 6][..]));
    /// assert_eq!(vec.get(1), None);
    /// ```
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if index < self.len() {
            Some(self.elem(index))
        } else {
            None
        }
    }

    /// Returns a mutable view of element `index`, or `None` past the end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(2);
    /// vec.push(&[0, 0]);
    /// vec.get_mut(0).unwrap().copy_from_slice(&[9, 9]);
    /// assert_eq!(vec.get(0), Some(&[9, 9][..]));
    /// ```
    pub fn get_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index < self.len() {
            let offset = self.offset(index);
            Some(&mut self.data[offset..offset + self.elem_size])
        } else {
            None
        }
    }

    /// Sorts the elements with a caller-supplied comparator over whole
    /// element byte slices.
    ///
    /// The sort is stable. Elements are relocated, never destroyed, so the
    /// cleanup callback does not run.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// for byte in [3u8, 1, 2] {
    ///     vec.push(&[byte]);
    /// }
    /// vec.sort_by(|a, b| a.cmp(b));
    ///
    /// let all: Vec<u8> = vec.iter().map(|e| e[0]).collect();
    /// assert_eq!(all, vec![1, 2, 3]);
    /// ```
    pub fn sort_by<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        let elem_size = self.elem_size;
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            cmp(
                &self.data[a * elem_size..(a + 1) * elem_size],
                &self.data[b * elem_size..(b + 1) * elem_size],
            )
        });

        let mut sorted = Vec::with_capacity(self.data.len());
        for index in order {
            sorted.extend_from_slice(&self.data[index * elem_size..(index + 1) * elem_size]);
        }
        self.data = sorted;
    }

    /// Binary-searches sorted contents with a comparator, following the
    /// standard slice contract.
    ///
    /// The comparator reports whether its argument orders `Less`, `Equal`, or
    /// `Greater` than the sought element. On a hit, returns `Ok` with the
    /// matching index (any one of them, if several compare equal); on a miss,
    /// `Err` with the index at which a matching element could be inserted to
    /// keep the contents sorted. The result is unspecified if the contents are
    /// not sorted with respect to the comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// for byte in [10u8, 20, 30] {
    ///     vec.push(&[byte]);
    /// }
    ///
    /// assert_eq!(vec.binary_search_by(|e| e[0].cmp(&20)), Ok(1));
    /// assert_eq!(vec.binary_search_by(|e| e[0].cmp(&25)), Err(2));
    /// ```
    pub fn binary_search_by<F>(&self, mut f: F) -> Result<usize, usize>
    where
        F: FnMut(&[u8]) -> Ordering,
    {
        let mut left = 0;
        let mut right = self.len();
        while left < right {
            let mid = left + (right - left) / 2;
            match f(self.elem(mid)) {
                Ordering::Less => left = mid + 1,
                Ordering::Greater => right = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(left)
    }

    /// Returns the index of the first element satisfying the predicate, or
    /// `None`. Linear scan from the front.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// for byte in [4u8, 7, 7] {
    ///     vec.push(&[byte]);
    /// }
    /// assert_eq!(vec.position_by(|e| e[0] == 7), Some(1));
    /// assert_eq!(vec.position_by(|e| e[0] == 9), None);
    /// ```
    pub fn position_by<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.iter().position(pred)
    }

    /// Returns a borrowing iterator over the elements, front to back.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(2);
    /// vec.push(&[1, 2]);
    /// vec.push(&[3, 4]);
    ///
    /// let flat: Vec<u8> = vec.iter().flatten().copied().collect();
    /// assert_eq!(flat, vec![1, 2, 3, 4]);
    /// ```
    pub fn iter(&self) -> Elems<'_> {
        Elems {
            inner: self.data.chunks_exact(self.elem_size),
        }
    }

    /// Destroys every element, invoking the cleanup callback once per
    /// element, and leaves the vector empty but usable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::StrideVec;
    ///
    /// let mut vec = StrideVec::new(1);
    /// vec.push(&[1]);
    /// vec.clear();
    /// assert!(vec.is_empty());
    /// vec.push(&[2]); // still usable
    /// assert_eq!(vec.len(), 1);
    /// ```
    pub fn clear(&mut self) {
        // The whole buffer is detached up front: an element under destruction
        // is never reachable from the vector, even while a panicking callback
        // unwinds.
        let mut detached = mem::take(&mut self.data);
        if let Some(cleanup) = &mut self.cleanup {
            for elem in detached.chunks_exact_mut(self.elem_size) {
                cleanup(elem);
            }
        }
    }
}

impl Drop for StrideVec {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Debug for StrideVec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A borrowing iterator over the elements of a [`StrideVec`].
///
/// Created by [`StrideVec::iter`]. Yields each element's bytes, front to
/// back.
pub struct Elems<'a> {
    inner: core::slice::ChunksExact<'a, u8>,
}

impl<'a> Iterator for Elems<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Elems<'_> {}
