//! Line-aligned byte range cache in front of a [`Driver`].
//!
//! Every request is expressed in logical offsets. The container's base address
//! is added first, then the absolute range is split into fixed-size lines keyed
//! by their aligned start. A line is fetched from the driver once, stored
//! immutably, and sliced for every later request that overlaps it.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::{Bytes, BytesMut};
use tessera_object_storage::Driver;

use crate::error::{TesseraError, TesseraResult};

/// A single byte range request against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub offset: u64,
    pub length: u64,
    pub use_cache: bool,
    pub prefetch: bool,
}

impl ReadRequest {
    pub fn cached(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            use_cache: true,
            prefetch: false,
        }
    }

    pub fn direct(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            use_cache: false,
            prefetch: false,
        }
    }

    pub fn prefetch(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            use_cache: false,
            prefetch: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub line_size: u64,
    /// Byte budget for cached lines, `None` for unbounded.
    pub capacity: Option<u64>,
    pub verbose: bool,
}

/// Point-in-time counters of a [`RangeCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub line_fetches: u64,
    pub prefetch_fetches: u64,
    pub direct_reads: u64,
}

impl CacheStats {
    /// Number of requests that reached the driver.
    pub fn backend_requests(&self) -> u64 {
        self.line_fetches + self.prefetch_fetches + self.direct_reads
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    line_fetches: AtomicU64,
    prefetch_fetches: AtomicU64,
    direct_reads: AtomicU64,
}

pub struct RangeCache {
    driver: Arc<dyn Driver>,
    line_size: u64,
    line_mask: u64,
    base_address: AtomicU64,
    lines: moka::future::Cache<u64, Bytes>,
    counters: Counters,
    verbose: bool,
}

impl std::fmt::Debug for RangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeCache")
            .field("driver", &self.driver)
            .field("line_size", &self.line_size)
            .field("base_address", &self.base_address())
            .field("stats", &self.stats())
            .finish()
    }
}

impl RangeCache {
    /// # Errors
    /// Returns [`TesseraError::InvalidArgument`] when the line size is not a
    /// non-zero power of two.
    pub fn new(driver: Arc<dyn Driver>, options: CacheOptions) -> TesseraResult<Self> {
        let line_size = options.line_size;
        if !line_size.is_power_of_two() || usize::try_from(line_size).is_err() {
            return Err(TesseraError::InvalidArgument(format!(
                "cache line size must be a power of two, got {line_size}"
            )));
        }

        let mut builder = moka::future::Cache::<u64, Bytes>::builder()
            .weigher(|_, line: &Bytes| u32::try_from(line.len()).unwrap_or(u32::MAX));
        if let Some(capacity) = options.capacity {
            builder = builder.max_capacity(capacity);
        }

        Ok(Self {
            driver,
            line_size,
            line_mask: !(line_size - 1),
            base_address: AtomicU64::new(0),
            lines: builder.build(),
            counters: Counters::default(),
            verbose: options.verbose,
        })
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    pub fn base_address(&self) -> u64 {
        self.base_address.load(Ordering::Acquire)
    }

    /// Offset of the container inside the backend resource.
    pub fn set_base_address(&self, base_address: u64) {
        self.base_address.store(base_address, Ordering::Release);
    }

    /// Length of the backend resource in bytes.
    pub fn resource_len(&self) -> u64 {
        self.driver.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            line_fetches: self.counters.line_fetches.load(Ordering::Relaxed),
            prefetch_fetches: self.counters.prefetch_fetches.load(Ordering::Relaxed),
            direct_reads: self.counters.direct_reads.load(Ordering::Relaxed),
        }
    }

    /// Whether the line holding logical offset `pos` is currently cached.
    pub async fn contains(&self, pos: u64) -> bool {
        match self.absolute(pos, 0) {
            Ok(start) => self.lines.contains_key(&(start & self.line_mask)),
            Err(_) => false,
        }
    }

    /// Dispatches a [`ReadRequest`]. Prefetch requests return `None`.
    pub async fn io_request(&self, request: ReadRequest) -> TesseraResult<Option<Bytes>> {
        if request.prefetch {
            self.prefetch(request.offset, request.length).await?;
            Ok(None)
        } else if request.use_cache {
            self.read(request.offset, request.length).await.map(Some)
        } else {
            self.read_direct(request.offset, request.length)
                .await
                .map(Some)
        }
    }

    /// Reads `size` bytes at logical offset `pos`, going through the line cache.
    ///
    /// A request spanning `n` lines costs at most `n` driver calls and none when
    /// every line is already cached.
    pub async fn read(&self, pos: u64, size: u64) -> TesseraResult<Bytes> {
        let start = self.absolute(pos, size)?;
        if self.verbose {
            tracing::trace!("cached read of {} bytes at {:#x}", size, start);
        }

        let mut blocks = Vec::new();
        let mut cursor = start;
        let mut remaining = size;
        while remaining > 0 {
            let line_start = cursor & self.line_mask;
            let line = self.line(line_start).await?;

            let start_index = cursor - line_start;
            let stop_index = (start_index + remaining).min(self.line_size);
            blocks.push(line.slice(start_index as usize..stop_index as usize));

            let read = stop_index - start_index;
            remaining -= read;
            cursor += read;
        }

        match blocks.len() {
            0 => Ok(Bytes::new()),
            1 => Ok(blocks.swap_remove(0)),
            _ => {
                let mut joined = BytesMut::with_capacity(size as usize);
                for block in &blocks {
                    joined.extend_from_slice(block);
                }
                Ok(joined.freeze())
            }
        }
    }

    /// Primes the lines covering `[pos, pos + size)` with one driver call.
    ///
    /// The size is rounded up to whole lines and the block starts at the line
    /// holding `pos`. Nothing is returned.
    pub async fn prefetch(&self, pos: u64, size: u64) -> TesseraResult<()> {
        if size == 0 {
            return Ok(());
        }
        let start = self.absolute(pos, 0)?;
        let line_start = start & self.line_mask;
        let len = self.resource_len();
        if line_start >= len {
            return Err(TesseraError::OutOfBounds {
                offset: start,
                size,
                len,
            });
        }

        let padding = (self.line_size - size % self.line_size) % self.line_size;
        let block_size = size
            .checked_add(padding)
            .ok_or(TesseraError::OutOfBounds {
                offset: start,
                size,
                len,
            })?
            .min(len - line_start);

        if self.verbose {
            tracing::trace!("prefetch of {} bytes at {:#x}", block_size, line_start);
        }
        self.counters.prefetch_fetches.fetch_add(1, Ordering::Relaxed);
        let block = self
            .driver
            .read(line_start, block_size)
            .await
            .map_err(TesseraError::from)?;

        let mut index = 0u64;
        while index < block_size {
            let end = (index + self.line_size).min(block_size);
            self.lines
                .insert(line_start + index, block.slice(index as usize..end as usize))
                .await;
            index += self.line_size;
        }
        Ok(())
    }

    /// Reads straight from the driver without touching the cache.
    pub async fn read_direct(&self, pos: u64, size: u64) -> TesseraResult<Bytes> {
        let start = self.absolute(pos, size)?;
        if self.verbose {
            tracing::trace!("direct read of {} bytes at {:#x}", size, start);
        }
        self.counters.direct_reads.fetch_add(1, Ordering::Relaxed);
        self.driver
            .read(start, size)
            .await
            .map_err(TesseraError::from)
    }

    /// Returns the cached line starting at `line_start`, fetching it on a miss.
    ///
    /// Concurrent misses on the same line share one driver call.
    async fn line(&self, line_start: u64) -> TesseraResult<Bytes> {
        if let Some(line) = self.lines.get(&line_start).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(line);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let length = self.line_size.min(self.resource_len() - line_start);
        self.lines
            .try_get_with(line_start, async {
                self.counters.line_fetches.fetch_add(1, Ordering::Relaxed);
                self.driver.read(line_start, length).await
            })
            .await
            .map_err(TesseraError::Backend)
    }

    /// Translates a logical range into an absolute offset, checking that the
    /// range lies inside the resource.
    fn absolute(&self, pos: u64, size: u64) -> TesseraResult<u64> {
        let len = self.resource_len();
        let start = pos.checked_add(self.base_address());
        match start {
            Some(start) if start.checked_add(size).is_some_and(|end| end <= len) => Ok(start),
            _ => Err(TesseraError::OutOfBounds {
                offset: pos.saturating_add(self.base_address()),
                size,
                len,
            }),
        }
    }
}
