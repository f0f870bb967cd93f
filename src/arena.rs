//! Bump arena over one contiguous byte region.
//!
//! Allocations are 4-byte aligned offsets into the region. Growing doubles the
//! capacity and may move the region; [`Arena::grow`] reports the signed distance
//! the base address moved so that structures holding absolute addresses into the
//! region (see [`Arena::address_of`]) can relocate them. [`Arena::reset`] rewinds
//! the cursor without giving back the backing storage.

use crate::error::{MetricsError, Result};

pub const ALIGN: usize = 4;

/// Offset of an allocation inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    offset: usize,
    len: usize,
}

impl Handle {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Returned by [`Arena::alloc`] when the request does not fit; the caller grows and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub requested: usize,
    pub available: usize,
}

pub struct Arena {
    region: Vec<u8>,
    next: usize,
    growths: u32,
}

fn align_up(n: usize) -> Option<usize> {
    Some(n.checked_add(ALIGN - 1)? & !(ALIGN - 1))
}

impl Arena {
    pub fn new(initial_capacity: usize) -> Result<Self> {
        let capacity = align_up(initial_capacity.max(ALIGN)).ok_or(MetricsError::ArenaGrowth {
            requested: initial_capacity,
        })?;
        let mut region = Vec::new();
        region
            .try_reserve_exact(capacity)
            .map_err(|_| MetricsError::ArenaGrowth { requested: capacity })?;
        region.resize(capacity, 0);
        Ok(Self {
            region,
            next: 0,
            growths: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    pub fn used(&self) -> usize {
        self.next
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.next
    }

    /// Number of times the region has been grown since creation.
    pub fn growths(&self) -> u32 {
        self.growths
    }

    pub fn alloc(&mut self, size: usize) -> std::result::Result<Handle, Exhausted> {
        let rounded = align_up(size).unwrap_or(usize::MAX);
        if rounded > self.available() {
            return Err(Exhausted {
                requested: size,
                available: self.available(),
            });
        }
        let handle = Handle {
            offset: self.next,
            len: size,
        };
        self.next += rounded;
        Ok(handle)
    }

    /// Doubles the capacity. Returns `new_base - old_base`, zero when the region
    /// was extended in place. Every absolute address previously obtained from
    /// [`Arena::address_of`] is stale until the caller adds the returned delta.
    pub fn grow(&mut self) -> Result<isize> {
        let old_base = self.base_addr();
        let old_capacity = self.capacity();
        let new_capacity = old_capacity
            .checked_mul(2)
            .ok_or(MetricsError::ArenaGrowth {
                requested: usize::MAX,
            })?;
        self.region
            .try_reserve_exact(new_capacity - old_capacity)
            .map_err(|_| MetricsError::ArenaGrowth {
                requested: new_capacity,
            })?;
        self.region.resize(new_capacity, 0);
        self.growths += 1;
        let new_base = self.base_addr();
        Ok(new_base as isize - old_base as isize)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn bytes(&self, handle: Handle) -> &[u8] {
        &self.region[handle.offset..handle.offset + handle.len]
    }

    pub fn bytes_mut(&mut self, handle: Handle) -> &mut [u8] {
        &mut self.region[handle.offset..handle.offset + handle.len]
    }

    pub fn base_addr(&self) -> usize {
        self.region.as_ptr() as usize
    }

    /// Absolute address of an allocation. Valid until the next [`Arena::grow`].
    pub fn address_of(&self, handle: Handle) -> usize {
        self.base_addr() + handle.offset
    }

    /// Maps an absolute address back to a handle of `len` bytes, if it points
    /// into the allocated part of the region.
    pub fn handle_at(&self, addr: usize, len: usize) -> Option<Handle> {
        let offset = addr.checked_sub(self.base_addr())?;
        if offset % ALIGN != 0 || offset + len > self.next {
            return None;
        }
        Some(Handle { offset, len })
    }
}
