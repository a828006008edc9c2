use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use alloc::vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::fmt::Write as _;
use core::ptr::NonNull;

/// Bucket count used when the construction hint is 0.
const DEFAULT_BUCKETS: usize = 1023;

/// Multiplier for the key hash.
///
/// Any odd constant with decent mixing works here; the choice affects
/// collision spread, never correctness. What matters is that the hash is
/// deterministic for a given key and bucket count, because `first`/`next`
/// re-derive a key's chain position by hashing it again.
const HASH_MULTIPLIER: u64 = 2_630_849_305;

/// Multiplicative accumulation over the key bytes, reduced to a bucket index.
///
/// Case-sensitive and bitwise: every byte participates as-is, so non-UTF-8
/// keys hash fine.
#[inline(always)]
fn bucket_index(key: &[u8], bucket_count: usize) -> usize {
    let mut code: u64 = 0;
    for &byte in key {
        code = code.wrapping_mul(HASH_MULTIPLIER).wrapping_add(u64::from(byte));
    }
    (code % bucket_count as u64) as usize
}

/// Cleanup callback invoked with a value's bytes at the moment its cell is
/// permanently destroyed (removal, [`ByteMap::clear`], or drop of the map).
///
/// Never invoked when a `put` overwrites an existing value in place.
pub type CleanupFn = Box<dyn FnMut(&mut [u8])>;

/// Computed layout of one packed cell allocation.
///
/// A cell is a single raw block holding, in order: the chain link
/// (`Option<RawCell>`), the key bytes with their trailing NUL, and the
/// fixed-width value bytes. Offsets are derived with `Layout::extend` so that
/// allocation and deallocation agree exactly.
struct CellLayout {
    layout: Layout,
    key_offset: usize,
    value_offset: usize,
}

impl CellLayout {
    fn new(key_len: usize, value_size: usize) -> Self {
        let link = Layout::new::<Option<RawCell>>();
        let key = Layout::array::<u8>(key_len + 1).expect("allocation size overflow");
        let value = Layout::array::<u8>(value_size).expect("allocation size overflow");

        let (layout, key_offset) = link.extend(key).expect("allocation size overflow");
        let (layout, value_offset) = layout.extend(value).expect("allocation size overflow");

        // Byte arrays have alignment 1, so the key starts right after the
        // link and the value right after the NUL. `RawCell::key_offset` and
        // the value accessors recompute these without a `CellLayout`.
        debug_assert_eq!(key_offset, RawCell::key_offset());
        debug_assert_eq!(value_offset, key_offset + key_len + 1);

        CellLayout {
            layout,
            key_offset,
            value_offset,
        }
    }
}

/// Pointer to one packed cell allocation.
///
/// `repr(transparent)` over `NonNull` keeps `Option<RawCell>` pointer-sized
/// with the none-niche, which the cell header layout depends on.
#[derive(Clone, Copy)]
#[repr(transparent)]
struct RawCell {
    ptr: NonNull<u8>,
}

impl RawCell {
    /// Byte offset of the key region within a cell allocation.
    #[inline(always)]
    fn key_offset() -> usize {
        core::mem::size_of::<Option<RawCell>>()
    }

    /// Allocates and initializes a cell for `key` and `value`, with no chain
    /// successor. `key` must already be checked to contain no NUL byte.
    fn alloc(key: &[u8], value: &[u8]) -> RawCell {
        let layout = CellLayout::new(key.len(), value.len());

        // SAFETY: The layout has nonzero size (the chain link alone occupies
        // a pointer). A null return is allocation failure, which is
        // unrecoverable here.
        let ptr = unsafe {
            let raw = alloc::alloc::alloc(layout.layout);
            if raw.is_null() {
                handle_alloc_error(layout.layout);
            }
            NonNull::new_unchecked(raw)
        };

        let cell = RawCell { ptr };
        // SAFETY: `ptr` is a fresh allocation of `layout`, so the link slot,
        // key region, and value region are all in bounds, properly aligned,
        // and non-overlapping.
        unsafe {
            cell.ptr.as_ptr().cast::<Option<RawCell>>().write(None);

            let key_ptr = cell.ptr.as_ptr().add(layout.key_offset);
            core::ptr::copy_nonoverlapping(key.as_ptr(), key_ptr, key.len());
            key_ptr.add(key.len()).write(0);

            core::ptr::copy_nonoverlapping(
                value.as_ptr(),
                cell.ptr.as_ptr().add(layout.value_offset),
                value.len(),
            );
        }

        cell
    }

    /// Releases the cell's backing allocation.
    ///
    /// # Safety
    ///
    /// The cell must have been produced by [`RawCell::alloc`] with a value of
    /// `value_size` bytes, must not have been deallocated already, and must
    /// not be reachable from any bucket afterwards.
    unsafe fn dealloc(self, value_size: usize) {
        // SAFETY: The caller guarantees the cell is live, so the key region
        // is initialized and NUL-terminated and the recomputed layout matches
        // the one used at allocation.
        unsafe {
            let layout = CellLayout::new(self.key_len(), value_size);
            alloc::alloc::dealloc(self.ptr.as_ptr(), layout.layout);
        }
    }

    /// Returns the chain successor stored in the cell header.
    ///
    /// # Safety
    ///
    /// The cell must be live (allocated and not yet deallocated).
    #[inline(always)]
    unsafe fn next(self) -> Option<RawCell> {
        // SAFETY: A live cell's header is initialized and properly aligned.
        unsafe { self.ptr.as_ptr().cast::<Option<RawCell>>().read() }
    }

    /// Stores a new chain successor in the cell header.
    ///
    /// # Safety
    ///
    /// The cell must be live.
    #[inline(always)]
    unsafe fn set_next(self, next: Option<RawCell>) {
        // SAFETY: A live cell's header is in bounds and properly aligned.
        unsafe { self.ptr.as_ptr().cast::<Option<RawCell>>().write(next) }
    }

    /// Length of the stored key in bytes, excluding the trailing NUL.
    ///
    /// The allocation stores no length field; the key length is recovered by
    /// scanning for the NUL, and the value region is addressed relative to
    /// it.
    ///
    /// # Safety
    ///
    /// The cell must be live.
    #[inline(always)]
    unsafe fn key_len(self) -> usize {
        let mut len = 0;
        // SAFETY: A live cell's key region is initialized and NUL-terminated,
        // so the scan terminates within the allocation.
        unsafe {
            let key_ptr = self.ptr.as_ptr().add(Self::key_offset());
            while key_ptr.add(len).read() != 0 {
                len += 1;
            }
        }
        len
    }

    /// Borrows the stored key, without the trailing NUL.
    ///
    /// # Safety
    ///
    /// The cell must be live, and the caller must bound `'a` by a borrow of
    /// the owning map (no cell outlives its map).
    #[inline(always)]
    unsafe fn key<'a>(self) -> &'a [u8] {
        // SAFETY: The key region holds `key_len` initialized bytes and is
        // never mutated after allocation.
        unsafe {
            core::slice::from_raw_parts(self.ptr.as_ptr().add(Self::key_offset()), self.key_len())
        }
    }

    /// Borrows the value region.
    ///
    /// # Safety
    ///
    /// The cell must be live and must have been allocated for `value_size`
    /// value bytes. The caller bounds `'a` by a borrow of the owning map and
    /// must not hold an aliasing mutable borrow of this region.
    #[inline(always)]
    unsafe fn value<'a>(self, value_size: usize) -> &'a [u8] {
        // SAFETY: The value region begins one byte past the key's NUL and
        // spans exactly `value_size` initialized bytes.
        unsafe {
            let offset = Self::key_offset() + self.key_len() + 1;
            core::slice::from_raw_parts(self.ptr.as_ptr().add(offset), value_size)
        }
    }

    /// Mutably borrows the value region.
    ///
    /// # Safety
    ///
    /// As for [`RawCell::value`], and the borrow must be unique for its
    /// lifetime.
    #[inline(always)]
    unsafe fn value_mut<'a>(self, value_size: usize) -> &'a mut [u8] {
        // SAFETY: Same bounds as `value`; exclusivity is the caller's
        // obligation.
        unsafe {
            let offset = Self::key_offset() + self.key_len() + 1;
            core::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), value_size)
        }
    }
}

/// A hash map from byte-string keys to fixed-width byte values, built on
/// separate chaining over packed cells.
///
/// Every entry lives in a single heap allocation (a "cell") holding the chain
/// link, the key bytes, and the value bytes contiguously. Buckets are a
/// fixed-length array of chain heads: the bucket count is chosen at
/// construction and never changes, so heavily loaded maps degrade gracefully
/// into longer chains instead of rehashing.
///
/// Keys are arbitrary byte strings without interior NUL bytes (an empty key
/// is fine). Values are opaque: the map stores exactly `value_size` bytes per
/// entry and never interprets them. An optional cleanup callback observes a
/// value's bytes when its cell is destroyed, which lets callers store
/// encodings of owned resources; see [`ByteMap::put`] for the one sharp edge
/// in that contract.
///
/// The map is single-threaded and is neither `Send` nor `Sync`; callers that
/// need cross-thread access must provide external exclusion.
///
/// ## Iteration
///
/// Two equivalent surfaces visit entries in ascending bucket order, then
/// insertion order within a bucket:
///
/// - the stateless [`first`]/[`next`] protocol, which re-derives the position
///   from the previous key on every step and so needs no iterator object;
/// - the borrowing iterators [`iter`], [`keys`], and [`values`].
///
/// Neither order survives structural mutation (`put` of a new key or
/// `remove`); with the borrowing iterators the borrow checker enforces this,
/// with `first`/`next` it is the caller's responsibility.
///
/// [`first`]: ByteMap::first
/// [`next`]: ByteMap::next
/// [`iter`]: ByteMap::iter
/// [`keys`]: ByteMap::keys
/// [`values`]: ByteMap::values
///
/// ## Example
///
/// ```rust
/// use chain_map::ByteMap;
///
/// let mut lengths = ByteMap::new(4);
/// for word in ["apple", "pear", "banana"] {
///     lengths.put(word.as_bytes(), &(word.len() as u32).to_ne_bytes());
/// }
///
/// assert_eq!(lengths.len(), 3);
/// assert_eq!(lengths.get(b"pear"), Some(&4u32.to_ne_bytes()[..]));
///
/// lengths.remove(b"apple");
/// assert_eq!(lengths.get(b"apple"), None);
/// assert_eq!(lengths.keys().count(), 2);
/// ```
pub struct ByteMap {
    buckets: Box<[Option<RawCell>]>,
    value_size: usize,
    len: usize,
    cleanup: Option<CleanupFn>,
}

impl ByteMap {
    /// Creates a map for values of `value_size` bytes with the default bucket
    /// count.
    ///
    /// # Panics
    ///
    /// Panics if `value_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let map = ByteMap::new(8);
    /// assert!(map.is_empty());
    /// assert_eq!(map.value_size(), 8);
    /// ```
    pub fn new(value_size: usize) -> Self {
        Self::with_buckets(value_size, 0)
    }

    /// Creates a map with an explicit bucket count.
    ///
    /// A `bucket_hint` of 0 selects the built-in default (1023); any other
    /// value is used verbatim and stays fixed for the life of the map. Small
    /// hints are legal and simply produce longer chains.
    ///
    /// # Panics
    ///
    /// Panics if `value_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let map = ByteMap::with_buckets(4, 8);
    /// assert_eq!(map.bucket_count(), 8);
    ///
    /// let map = ByteMap::with_buckets(4, 0);
    /// assert_eq!(map.bucket_count(), 1023);
    /// ```
    pub fn with_buckets(value_size: usize, bucket_hint: usize) -> Self {
        assert!(value_size > 0, "value size must be nonzero");
        let bucket_count = if bucket_hint == 0 {
            DEFAULT_BUCKETS
        } else {
            bucket_hint
        };

        Self {
            buckets: vec![None; bucket_count].into_boxed_slice(),
            value_size,
            len: 0,
            cleanup: None,
        }
    }

    /// Creates a map with an explicit bucket count and a cleanup callback.
    ///
    /// The callback runs exactly once per entry, with that entry's final
    /// value bytes, at the moment the entry's cell is destroyed: on
    /// [`remove`], on [`clear`], and on drop of the map. It does **not** run
    /// when a `put` overwrites an existing value.
    ///
    /// A callback that panics still counts as its entry's one invocation: the
    /// entry is gone by the time the callback runs, and the remaining entries
    /// stay live for a later [`clear`] or drop. No entry is handed to the
    /// callback twice.
    ///
    /// [`remove`]: ByteMap::remove
    /// [`clear`]: ByteMap::clear
    ///
    /// # Panics
    ///
    /// Panics if `value_size` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::with_cleanup(
    ///     1,
    ///     0,
    ///     Box::new(|value| println!("releasing {value:?}")),
    /// );
    /// map.put(b"k", &[7]);
    /// map.remove(b"k"); // prints "releasing [7]"
    /// ```
    pub fn with_cleanup(value_size: usize, bucket_hint: usize, cleanup: CleanupFn) -> Self {
        let mut map = Self::with_buckets(value_size, bucket_hint);
        map.cleanup = Some(cleanup);
        map
    }

    /// Returns the number of live entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// assert_eq!(map.len(), 0);
    /// map.put(b"a", &[1]);
    /// map.put(b"a", &[2]); // overwrite, not a new entry
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let map = ByteMap::new(1);
    /// assert!(map.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the fixed byte width of every stored value.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Returns the fixed number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline(always)]
    fn bucket_for(&self, key: &[u8]) -> usize {
        bucket_index(key, self.buckets.len())
    }

    /// Finds the live cell holding `key`, scanning only its home chain.
    fn find_cell(&self, key: &[u8]) -> Option<RawCell> {
        let mut cursor = self.buckets[self.bucket_for(key)];
        while let Some(cell) = cursor {
            // SAFETY: Cells reachable from a bucket are live until unlinked.
            unsafe {
                if cell.key() == key {
                    return Some(cell);
                }
                cursor = cell.next();
            }
        }
        None
    }

    /// Head cell of the first non-empty bucket at or after `start`, with its
    /// bucket index.
    fn first_entry_from(&self, start: usize) -> Option<(usize, RawCell)> {
        self.buckets
            .get(start..)?
            .iter()
            .enumerate()
            .find_map(|(offset, &head)| head.map(|cell| (start + offset, cell)))
    }

    /// Inserts `key` → `value`, or overwrites the value of an existing key in
    /// place.
    ///
    /// A new key is appended at the tail of its bucket's chain, so the
    /// relative iteration order of keys that are never removed is stable. An
    /// existing key keeps its cell and its chain position; only the value
    /// bytes change.
    ///
    /// Overwriting does **not** invoke the cleanup callback on the superseded
    /// bytes. If values encode owned resources, the caller must release the
    /// previous resource before re-`put`ing the same key, or accept the leak.
    /// This is deliberate API surface, not an oversight: the callback marks
    /// destruction of a cell, and an overwrite destroys nothing.
    ///
    /// # Panics
    ///
    /// Panics if `value.len()` differs from the map's value size, or if `key`
    /// contains a NUL byte (the packed cell stores keys NUL-terminated).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(2);
    /// map.put(b"k", &[1, 2]);
    /// map.put(b"k", &[3, 4]);
    /// assert_eq!(map.get(b"k"), Some(&[3, 4][..]));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        assert_eq!(value.len(), self.value_size, "value width mismatch");
        assert!(!key.contains(&0), "key contains a NUL byte");

        let bucket = self.bucket_for(key);
        let Some(head) = self.buckets[bucket] else {
            self.buckets[bucket] = Some(RawCell::alloc(key, value));
            self.len += 1;
            return;
        };

        let mut tail = head;
        loop {
            // SAFETY: `tail` came from a bucket slot or a live cell's link,
            // so it is live; the mutable value borrow below is unique because
            // we hold `&mut self`.
            unsafe {
                if tail.key() == key {
                    tail.value_mut(self.value_size).copy_from_slice(value);
                    return;
                }
                match tail.next() {
                    Some(cell) => tail = cell,
                    None => break,
                }
            }
        }

        let cell = RawCell::alloc(key, value);
        // SAFETY: `tail` is the live last cell of the chain.
        unsafe { tail.set_next(Some(cell)) };
        self.len += 1;
    }

    /// Returns the value bytes stored for `key`, or `None` if absent.
    ///
    /// Lookups never mutate the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(4);
    /// map.put(b"pear", &4u32.to_ne_bytes());
    ///
    /// assert_eq!(map.get(b"pear"), Some(&4u32.to_ne_bytes()[..]));
    /// assert_eq!(map.get(b"nonexistent"), None);
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let cell = self.find_cell(key)?;
        // SAFETY: `cell` is live and the borrow is bounded by `&self`, which
        // keeps the map, and therefore the cell, alive and unmodified.
        Some(unsafe { cell.value(self.value_size) })
    }

    /// Returns a mutable view of the value bytes stored for `key`.
    ///
    /// This is the in-place update path: counters and similar values can be
    /// decoded, modified, and re-encoded without touching the map structure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut counts = ByteMap::new(8);
    /// counts.put(b"word", &0u64.to_ne_bytes());
    ///
    /// let slot = counts.get_mut(b"word").unwrap();
    /// let n = u64::from_ne_bytes(slot[..].try_into().unwrap());
    /// slot.copy_from_slice(&(n + 1).to_ne_bytes());
    ///
    /// assert_eq!(counts.get(b"word"), Some(&1u64.to_ne_bytes()[..]));
    /// ```
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut [u8]> {
        let cell = self.find_cell(key)?;
        // SAFETY: As for `get`; the `&mut self` receiver makes this borrow
        // the only live one into the map.
        Some(unsafe { cell.value_mut(self.value_size) })
    }

    /// Returns `true` if the map holds an entry for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"here", &[0]);
    /// assert!(map.contains_key(b"here"));
    /// assert!(!map.contains_key(b"gone"));
    /// ```
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find_cell(key).is_some()
    }

    /// Removes the entry for `key`, if present.
    ///
    /// The cell is unlinked from its chain, the cleanup callback (if any)
    /// runs once with the value bytes, and the allocation is released.
    /// Removing an absent key is a silent no-op that returns `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"k", &[9]);
    ///
    /// assert!(map.remove(b"k"));
    /// assert!(!map.remove(b"k")); // already gone: no-op
    /// assert_eq!(map.len(), 0);
    /// ```
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let bucket = self.bucket_for(key);
        let Some(head) = self.buckets[bucket] else {
            return false;
        };

        // SAFETY: Chain cells are live until unlinked; each relink below
        // happens before the unlinked cell is destroyed.
        unsafe {
            if head.key() == key {
                self.buckets[bucket] = head.next();
                self.destroy_cell(head);
                return true;
            }

            let mut prev = head;
            while let Some(cell) = prev.next() {
                if cell.key() == key {
                    prev.set_next(cell.next());
                    self.destroy_cell(cell);
                    return true;
                }
                prev = cell;
            }
        }

        false
    }

    /// Runs the cleanup callback on the cell's value, then frees it.
    ///
    /// # Safety
    ///
    /// The cell must be live and already unlinked from every bucket chain.
    unsafe fn destroy_cell(&mut self, cell: RawCell) {
        // The cell is already unreachable, so it leaves the count before the
        // callback runs; `len` equals the reachable cells even while a
        // panicking callback unwinds.
        self.len -= 1;
        // SAFETY: The caller guarantees the cell is live and unreachable, so
        // the mutable value borrow is unique and the deallocation is final.
        unsafe {
            if let Some(cleanup) = &mut self.cleanup {
                cleanup(cell.value_mut(self.value_size));
            }
            cell.dealloc(self.value_size);
        }
    }

    /// Destroys every entry, invoking the cleanup callback once per entry,
    /// and leaves the map empty but usable.
    ///
    /// The bucket array is retained.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"a", &[1]);
    /// map.put(b"b", &[2]);
    ///
    /// map.clear();
    /// assert!(map.is_empty());
    /// map.put(b"a", &[3]); // still usable
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn clear(&mut self) {
        for bucket in 0..self.buckets.len() {
            while let Some(cell) = self.buckets[bucket] {
                // SAFETY: The head is live, and relinking the bucket to its
                // successor first makes the head unreachable while the rest
                // of the chain stays reachable; an interrupted clear leaves
                // every surviving cell live and linked.
                unsafe {
                    self.buckets[bucket] = cell.next();
                    self.destroy_cell(cell);
                }
            }
        }
        debug_assert_eq!(self.len, 0);
    }

    /// Returns the first key in visitation order, or `None` if the map is
    /// empty.
    ///
    /// Visitation order is ascending bucket index, then chain (insertion)
    /// order within a bucket. Together with [`next`] this forms a stateless,
    /// restartable traversal:
    ///
    /// [`next`]: ByteMap::next
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"a", &[0]);
    /// map.put(b"b", &[0]);
    ///
    /// let mut seen = 0;
    /// let mut key = map.first().map(<[u8]>::to_vec);
    /// while let Some(current) = key {
    ///     seen += 1;
    ///     key = map.next(&current).map(<[u8]>::to_vec);
    /// }
    /// assert_eq!(seen, map.len());
    /// ```
    pub fn first(&self) -> Option<&[u8]> {
        let (_, cell) = self.first_entry_from(0)?;
        // SAFETY: `cell` is live; the borrow is bounded by `&self`.
        Some(unsafe { cell.key() })
    }

    /// Returns the key following `prev` in visitation order, or `None` when
    /// the traversal is exhausted.
    ///
    /// No cursor state is kept: the position is recomputed by hashing `prev`
    /// and re-scanning its chain, which costs O(chain length) per step. If
    /// `prev`'s cell has a chain successor that successor's key is returned;
    /// otherwise the head key of the next non-empty bucket.
    ///
    /// The sequence produced by `first`/`next` is exactly the sequence
    /// [`keys`] produces, as long as the map is not structurally mutated
    /// between calls.
    ///
    /// [`keys`]: ByteMap::keys
    ///
    /// # Panics
    ///
    /// Panics if `prev` is not a key in the map.
    pub fn next(&self, prev: &[u8]) -> Option<&[u8]> {
        let bucket = self.bucket_for(prev);

        let mut cursor = self.buckets[bucket];
        let cell = loop {
            let cell = cursor.expect("`next` called with a key not in the map");
            // SAFETY: Chain cells are live; borrows are bounded by `&self`.
            unsafe {
                if cell.key() == prev {
                    break cell;
                }
                cursor = cell.next();
            }
        };

        // SAFETY: `cell` and its successor (if any) are live.
        if let Some(successor) = unsafe { cell.next() } {
            return Some(unsafe { successor.key() });
        }

        let (_, head) = self.first_entry_from(bucket + 1)?;
        // SAFETY: `head` is live; the borrow is bounded by `&self`.
        Some(unsafe { head.key() })
    }

    /// Returns a borrowing iterator over `(key, value)` pairs in visitation
    /// order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"x", &[1]);
    /// map.put(b"y", &[2]);
    ///
    /// let total: u32 = map.iter().map(|(_, value)| u32::from(value[0])).sum();
    /// assert_eq!(total, 3);
    /// ```
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            map: self,
            next: self.first_entry_from(0),
        }
    }

    /// Returns a borrowing iterator over keys in visitation order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_map::ByteMap;
    ///
    /// let mut map = ByteMap::new(1);
    /// map.put(b"x", &[1]);
    ///
    /// assert_eq!(map.keys().collect::<Vec<_>>(), vec![&b"x"[..]]);
    /// ```
    pub fn keys(&self) -> Keys<'_> {
        Keys { inner: self.iter() }
    }

    /// Returns a borrowing iterator over value regions in visitation order.
    pub fn values(&self) -> Values<'_> {
        Values { inner: self.iter() }
    }

    /// Computes per-bucket chain statistics by walking every chain.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn chain_stats(&self) -> ChainStats {
        let mut occupied_buckets = 0;
        let mut max_chain = 0;
        let mut cell_bytes = 0;

        for &head in self.buckets.iter() {
            let mut chain = 0;
            let mut cursor = head;
            while let Some(cell) = cursor {
                chain += 1;
                // SAFETY: Reachable cells are live.
                unsafe {
                    cell_bytes += CellLayout::new(cell.key_len(), self.value_size).layout.size();
                    cursor = cell.next();
                }
            }
            if chain > 0 {
                occupied_buckets += 1;
            }
            max_chain = max_chain.max(chain);
        }

        ChainStats {
            entries: self.len,
            buckets: self.buckets.len(),
            occupied_buckets,
            max_chain,
            cell_bytes,
        }
    }
}

impl Drop for ByteMap {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Debug for ByteMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(&KeyDebug(key), &value);
        }
        map.finish()
    }
}

/// Renders a key as an escaped byte-string literal instead of a number list.
struct KeyDebug<'a>(&'a [u8]);

impl Debug for KeyDebug<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("b\"")?;
        for &byte in self.0 {
            for escaped in core::ascii::escape_default(byte) {
                f.write_char(escaped as char)?;
            }
        }
        f.write_str("\"")
    }
}

/// Chain-shape statistics for a [`ByteMap`].
///
/// With a fixed bucket count there is no rehashing; this is the observability
/// hook for spotting maps that have degraded into long chains.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct ChainStats {
    /// Number of live entries.
    pub entries: usize,
    /// Fixed bucket count.
    pub buckets: usize,
    /// Buckets holding at least one cell.
    pub occupied_buckets: usize,
    /// Length of the longest chain.
    pub max_chain: usize,
    /// Total bytes allocated for cells (links, keys, NULs, and values).
    pub cell_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl ChainStats {
    /// Pretty-prints the statistics to stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== ByteMap chain statistics ===");
        println!(
            "Entries: {} across {} buckets ({} occupied)",
            self.entries, self.buckets, self.occupied_buckets
        );
        println!("Longest chain: {}", self.max_chain);
        println!(
            "Mean chain (occupied buckets): {:.2}",
            if self.occupied_buckets == 0 {
                0.0
            } else {
                self.entries as f64 / self.occupied_buckets as f64
            }
        );
        println!("Cell memory: {} bytes", self.cell_bytes);
    }
}

/// A borrowing iterator over the `(key, value)` pairs of a [`ByteMap`].
///
/// Created by [`ByteMap::iter`]. Yields entries in visitation order:
/// ascending bucket index, then chain order within a bucket.
pub struct Iter<'a> {
    map: &'a ByteMap,
    next: Option<(usize, RawCell)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (bucket, cell) = self.next?;
        // SAFETY: Cells reachable from buckets are live; the returned borrows
        // are bounded by the map borrow the iterator holds, which also rules
        // out structural mutation while they live.
        unsafe {
            self.next = match cell.next() {
                Some(successor) => Some((bucket, successor)),
                None => self.map.first_entry_from(bucket + 1),
            };
            Some((cell.key(), cell.value(self.map.value_size)))
        }
    }
}

/// A borrowing iterator over the keys of a [`ByteMap`].
///
/// Created by [`ByteMap::keys`].
pub struct Keys<'a> {
    inner: Iter<'a>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// A borrowing iterator over the value regions of a [`ByteMap`].
///
/// Created by [`ByteMap::values`].
pub struct Values<'a> {
    inner: Iter<'a>,
}

impl<'a> Iterator for Values<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}
