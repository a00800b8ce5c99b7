//! Backing storage for trace buffers.
//!
//! Trace values either live on the heap or in a [`MemoryMapStorage`] arena. Callers choose
//! with an `Option<&MemoryMapStorage>`, `None` meaning plain RAM. Either way the resulting
//! [`DoubleBuffer`] is immutable, so a trace that has been handed out never changes under
//! its readers.
use std::fmt::Debug;
use std::io;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memmap2::{Mmap, MmapMut};
use tracing::trace;

use crate::error::TraceError;

#[derive(Debug, Default)]
struct ArenaCounters {
    regions: AtomicUsize,
    bytes: AtomicUsize,
}

/// A handle to a memory-mapped arena that trace buffers can be stored in to keep
/// large feature lists out of the process heap.
///
/// Every stored buffer receives its own anonymous mapping, so two live traces never
/// share a region. Cloning the handle shares the arena's accounting.
#[derive(Debug, Clone, Default)]
pub struct MemoryMapStorage {
    counters: Arc<ArenaCounters>,
}

impl MemoryMapStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of regions mapped through this arena so far
    pub fn region_count(&self) -> usize {
        self.counters.regions.load(Ordering::Relaxed)
    }

    /// The number of bytes mapped through this arena so far
    pub fn mapped_bytes(&self) -> usize {
        self.counters.bytes.load(Ordering::Relaxed)
    }

    fn store(&self, values: &[f64]) -> io::Result<Mmap> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let mut region = MmapMut::map_anon(bytes.len())?;
        region.copy_from_slice(bytes);
        let region = region.make_read_only()?;
        if bytemuck::try_cast_slice::<u8, f64>(&region[..]).is_err() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "mapped region is not aligned for f64 values",
            ));
        }
        self.counters.regions.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes.fetch_add(bytes.len(), Ordering::Relaxed);
        trace!("Mapped {} values ({} bytes)", values.len(), bytes.len());
        Ok(region)
    }
}

#[derive(Clone)]
enum BufferInner {
    Heap(Arc<[f64]>),
    Mapped(Arc<Mmap>),
}

/// An immutable, cheaply clonable buffer of `f64` values.
#[derive(Clone)]
pub struct DoubleBuffer {
    inner: BufferInner,
}

impl DoubleBuffer {
    /// Whether this buffer lives in a memory-mapped region
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, BufferInner::Mapped(_))
    }

    pub fn as_slice(&self) -> &[f64] {
        match &self.inner {
            BufferInner::Heap(values) => &values[..],
            // The alignment of every mapped region was checked when it was stored
            BufferInner::Mapped(region) => bytemuck::cast_slice(&region[..]),
        }
    }

    /// Buffers are identical if they are backed by the same allocation
    pub fn same_buffer(&self, other: &Self) -> bool {
        std::ptr::eq(self.as_slice(), other.as_slice())
    }
}

impl Deref for DoubleBuffer {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[f64]> for DoubleBuffer {
    fn as_ref(&self) -> &[f64] {
        self.as_slice()
    }
}

impl Debug for DoubleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("mapped", &self.is_mapped())
            .field("values", &self.as_slice())
            .finish()
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Vec::new().into()
    }
}

impl From<Vec<f64>> for DoubleBuffer {
    fn from(value: Vec<f64>) -> Self {
        Self {
            inner: BufferInner::Heap(value.into()),
        }
    }
}

/// Store `values` in `storage`, or on the heap if `storage` is `None`.
///
/// Empty buffers are always kept on the heap, there is nothing to map.
pub fn store_values(
    storage: Option<&MemoryMapStorage>,
    values: Vec<f64>,
) -> Result<DoubleBuffer, TraceError> {
    match storage {
        Some(arena) if !values.is_empty() => {
            let region = arena.store(&values)?;
            Ok(DoubleBuffer {
                inner: BufferInner::Mapped(Arc::new(region)),
            })
        }
        _ => Ok(values.into()),
    }
}
