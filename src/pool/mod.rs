//! The shared buffer pool that backs every read stream.
//!
//! Reads are served out of large pooled allocations instead of one
//! allocation per chunk. A pool handle ([`BufferPool`]) owns one active
//! slab at a time plus a stack of retired partial slabs:
//!
//! - [`BufferPool::reserve`] carves the next free region out of the active
//!   slab, optimistically sized to the requested read. When the slab has
//!   less than [`MIN_POOL_SPACE`] free, it is retired and replaced, reusing
//!   the most recently retired fragment when one is available.
//! - [`BufferPool::reconcile`] settles a reservation against the bytes a
//!   read actually produced. The filled prefix becomes an immutable,
//!   zero-copy [`Bytes`] chunk. The unfilled tail is rewound into the slab
//!   when the reservation is still the newest one there, retired as a
//!   fragment when it is large enough to serve future reads, and silently
//!   dropped otherwise.
//!
//! Chunks hold reference-counted views into their slab, so a retired slab
//! stays alive exactly as long as any chunk still points into it. Handles
//! are cheap clones of the same pool; [`BufferPool::global`] returns the
//! process-wide default used by streams that were not given a pool
//! explicitly.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Minimum free space a slab must have to serve another reservation, and
/// the smallest leftover tail worth retiring as a fragment.
pub const MIN_POOL_SPACE: usize = 128;

// Process-wide default pool.
static GLOBAL_POOL: LazyLock<BufferPool> = LazyLock::new(BufferPool::new);

/// Counters describing pool activity.
///
/// Obtained from [`BufferPool::stats`]; all counters are cumulative for
/// the lifetime of the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fresh slabs allocated.
    pub pools_allocated: u64,
    /// Retired fragments promoted back to the active slab.
    pub fragments_reused: u64,
    /// Leftover tails retired as fragments.
    pub fragments_retired: u64,
    /// Reservations handed out.
    pub reservations: u64,
    /// Leftover bytes rewound into the active slab.
    pub bytes_rewound: u64,
    /// Leftover bytes dropped because they fell below [`MIN_POOL_SPACE`].
    pub bytes_discarded: u64,
}

/// The active slab. `free` is the unreserved suffix of the allocation and
/// always begins exactly where the reserved prefix (of length `used`) ends.
#[derive(Debug)]
struct ActiveSlab {
    free: BytesMut,
    used: usize,
}

impl ActiveSlab {
    fn free_space(&self) -> usize {
        self.free.len()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    active: Option<ActiveSlab>,
    /// Retired partial slabs, reused in LIFO order.
    fragments: Vec<BytesMut>,
    /// Bumped each time the active slab is replaced. A reservation can only
    /// rewind into the slab it was carved from.
    generation: u64,
    stats: PoolStats,
}

/// A writable region carved out of the pool by [`BufferPool::reserve`].
///
/// The reservation owns its bytes exclusively until it is settled with
/// [`BufferPool::reconcile`]; concurrent reservations never alias. Fill it
/// through [`AsMut<[u8]>`].
#[derive(Debug)]
pub struct Reservation {
    mem: BytesMut,
    start: usize,
    generation: u64,
}

impl Reservation {
    /// Number of bytes reserved.
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    /// Whether the reservation is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// Offset of this reservation within its slab.
    pub fn start(&self) -> usize {
        self.start
    }
}

impl AsRef<[u8]> for Reservation {
    fn as_ref(&self) -> &[u8] {
        &self.mem
    }
}

impl AsMut<[u8]> for Reservation {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }
}

/// A cloneable handle to a shared buffer pool.
///
/// All clones operate on the same slab and fragment stack. The pool is
/// safe to share across threads; each operation takes a short internal
/// lock.
///
/// # Example
///
/// ```
/// use poolstream::BufferPool;
///
/// let pool = BufferPool::new();
///
/// let mut reservation = pool.reserve(5, 4096);
/// reservation.as_mut().copy_from_slice(b"hello");
///
/// // The read only produced 4 of the 5 reserved bytes
/// let chunk = pool.reconcile(reservation, 4);
/// assert_eq!(&chunk[..], b"hell");
///
/// // The unfilled byte went back to the slab
/// assert_eq!(pool.stats().bytes_rewound, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    inner: Arc<Mutex<PoolState>>,
}

impl BufferPool {
    /// Creates an empty pool. The first reservation allocates a slab.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolState::default())),
        }
    }

    /// Returns a handle to the process-wide default pool.
    pub fn global() -> Self {
        GLOBAL_POOL.clone()
    }

    /// Reserves up to `len` bytes of contiguous writable memory.
    ///
    /// `pool_size` is the slab size to allocate if the active slab has to
    /// be replaced. The reservation is clipped to the slab's free space,
    /// so it may be shorter than `len`.
    pub fn reserve(&self, len: usize, pool_size: usize) -> Reservation {
        let mut state = self.lock();
        let state = &mut *state;

        let mut active = match state.active.take() {
            Some(active) if active.free_space() >= MIN_POOL_SPACE => active,
            _ => {
                // Not enough room left: retire the slab and start a new
                // one, preferring the most recently retired fragment.
                let free = match state.fragments.pop() {
                    Some(fragment) => {
                        state.stats.fragments_reused += 1;
                        trace!("reusing {}-byte fragment as the active slab", fragment.len());
                        fragment
                    }
                    None => {
                        state.stats.pools_allocated += 1;
                        trace!("allocating a fresh {}-byte slab", pool_size);
                        BytesMut::zeroed(pool_size)
                    }
                };
                state.generation += 1;
                ActiveSlab { free, used: 0 }
            }
        };

        let to_read = len.min(active.free_space());
        let mem = active.free.split_to(to_read);
        let start = active.used;
        active.used += to_read;

        state.stats.reservations += 1;
        let generation = state.generation;
        state.active = Some(active);

        Reservation {
            mem,
            start,
            generation,
        }
    }

    /// Settles a reservation against the `filled` bytes a read produced.
    ///
    /// Returns the filled prefix as a zero-copy chunk; the chunk is empty
    /// when `filled` is zero. The unfilled tail is rewound into the slab
    /// if this reservation is still the newest one there, retired as a
    /// fragment if it is larger than [`MIN_POOL_SPACE`], and dropped
    /// otherwise.
    pub fn reconcile(&self, mut reservation: Reservation, filled: usize) -> Bytes {
        let reserved = reservation.len();
        debug_assert!(
            filled <= reserved,
            "filled {} bytes of a {}-byte reservation",
            filled,
            reserved
        );
        let filled = filled.min(reserved);

        let leftover = reservation.mem.split_off(filled);
        if !leftover.is_empty() {
            self.recycle(reservation.start + reserved, reservation.generation, leftover);
        }
        reservation.mem.freeze()
    }

    /// Returns the unfilled tail of a reservation to the pool.
    fn recycle(&self, reserved_end: usize, generation: u64, leftover: BytesMut) {
        let mut state = self.lock();
        let state = &mut *state;

        match &mut state.active {
            Some(active) if generation == state.generation && reserved_end == active.used => {
                // Newest reservation in the current slab: rewind, so the
                // next reservation starts where the filled bytes end. The
                // tail ends exactly where `free` begins, keeping the merge
                // a pointer adjustment.
                state.stats.bytes_rewound += leftover.len() as u64;
                active.used -= leftover.len();
                let mut joined = leftover;
                joined.unsplit(std::mem::take(&mut active.free));
                active.free = joined;
            }
            _ if leftover.len() > MIN_POOL_SPACE => {
                state.stats.fragments_retired += 1;
                trace!("retiring a {}-byte tail as a fragment", leftover.len());
                state.fragments.push(leftover);
            }
            _ => {
                // Too small to serve a future read; the slab space is
                // reclaimed when the last chunk into it drops.
                state.stats.bytes_discarded += leftover.len() as u64;
            }
        }
    }

    /// Returns a snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    /// Free bytes remaining in the active slab.
    pub fn free_space(&self) -> usize {
        self.lock().active.as_ref().map_or(0, ActiveSlab::free_space)
    }

    /// Number of retired fragments waiting for reuse.
    pub fn fragment_count(&self) -> usize {
        self.lock().fragments.len()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panicking holder cannot leave the state half-updated, so a
        // poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
