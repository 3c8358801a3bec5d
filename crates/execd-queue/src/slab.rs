use tracing::warn;

/// A single size class: a fixed buffer size plus a freelist of previously
/// allocated, now-returned buffers of exactly that size.
struct SizeClass {
    size: usize,
    free: Vec<Box<[u8]>>,
    in_use: usize,
    total_allocated: usize,
}

/// Size-classed buffer allocator.
///
/// Configured once at startup from `(class_size, initial_count)` pairs
/// (see the default table). `alloc` always returns a buffer from the
/// smallest configured class that fits the request, growing that class's
/// pool on demand past its initial seed count; it only returns `None` when
/// the process is genuinely out of memory. `free` returns a buffer to its
/// class's freelist for reuse.
pub struct Slab {
    classes: Vec<SizeClass>,
}

/// `(class_size, initial_count)` pairs mirroring the historical pool sizing.
pub const DEFAULT_SIZE_CLASSES: &[(usize, usize)] = &[
    (8, 1),
    (16, 1),
    (32, 1),
    (64, 1),
    (128, 1),
    (256, 4096),
    (512, 1),
    (1024, 1),
    (2048, 1),
    (4096, 4096),
    (8192, 1),
    (16384, 1),
    (32768, 1),
    (65536, 1),
];

impl Slab {
    pub fn new(configured: &[(usize, usize)]) -> Self {
        let mut classes: Vec<SizeClass> = configured
            .iter()
            .map(|&(size, initial_count)| {
                let free = (0..initial_count)
                    .map(|_| vec![0u8; size].into_boxed_slice())
                    .collect::<Vec<_>>();
                SizeClass { size, free, in_use: 0, total_allocated: initial_count }
            })
            .collect();
        classes.sort_by_key(|c| c.size);
        Self { classes }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SIZE_CLASSES)
    }

    /// Returns a zeroed buffer of at least `size` bytes, or `None` if no
    /// configured class is large enough or the allocator is out of memory.
    pub fn alloc(&mut self, size: usize) -> Option<Box<[u8]>> {
        let class = self.classes.iter_mut().find(|c| c.size >= size)?;
        let buf = match class.free.pop() {
            Some(buf) => buf,
            None => {
                let mut v = Vec::new();
                v.try_reserve_exact(class.size)
                    .inspect_err(|e| warn!(size = class.size, %e, "slab growth failed"))
                    .ok()?;
                v.resize(class.size, 0);
                class.total_allocated += 1;
                v.into_boxed_slice()
            }
        };
        class.in_use += 1;
        Some(buf)
    }

    /// Returns `buf` to the freelist of the class matching its length.
    /// A buffer not originally produced by `alloc` (wrong length) is
    /// dropped rather than accepted into a freelist it doesn't belong to.
    pub fn free(&mut self, buf: Box<[u8]>) {
        let Some(class) = self.classes.iter_mut().find(|c| c.size == buf.len()) else {
            warn!(len = buf.len(), "freed buffer doesn't match any size class, dropping");
            return;
        };
        class.in_use = class.in_use.saturating_sub(1);
        class.free.push(buf);
    }

    /// Per-class `(size, in_use, available, bytes_allocated)`, in ascending
    /// size order. `bytes_allocated` is `total_allocated * size`, the total
    /// footprint of every buffer this class has ever handed out (whether
    /// currently in use or sitting in the freelist). Used by the SIGINT
    /// handler to print pool statistics before exit.
    pub fn stats(&self) -> Vec<(usize, usize, usize, usize)> {
        self.classes
            .iter()
            .map(|c| (c.size, c.in_use, c.free.len(), c.total_allocated * c.size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_picks_smallest_fitting_class() {
        let mut slab = Slab::new(&[(64, 2), (256, 2)]);
        let buf = slab.alloc(10).unwrap();
        assert_eq!(buf.len(), 64);
    }

    #[test]
    fn alloc_too_large_returns_none() {
        let mut slab = Slab::new(&[(64, 1)]);
        assert!(slab.alloc(65).is_none());
    }

    #[test]
    fn free_returns_buffer_to_freelist_for_reuse() {
        let mut slab = Slab::new(&[(64, 1)]);
        let buf = slab.alloc(64).unwrap();
        assert_eq!(slab.stats()[0], (64, 1, 0, 64));
        slab.free(buf);
        assert_eq!(slab.stats()[0], (64, 0, 1, 64));
    }

    #[test]
    fn alloc_grows_past_initial_count() {
        let mut slab = Slab::new(&[(64, 0)]);
        let buf = slab.alloc(32).unwrap();
        assert_eq!(buf.len(), 64);
        assert_eq!(slab.stats()[0].1, 1);
    }
}
