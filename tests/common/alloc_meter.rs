use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Heap usage observed while running one closure.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocStats {
    /// Peak bytes above the level at the start of the run.
    pub peak_extra_bytes: usize,
    /// Allocations and reallocations performed.
    pub allocations: usize,
}

/// System allocator wrapper tracking live bytes, peak and call count.
pub struct AllocMeter {
    live: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl AllocMeter {
    pub const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Run `op` and report the heap it needed. Keep one metered test per
    /// binary; parallel tests would pollute the counters.
    pub fn measure<T>(&self, op: impl FnOnce() -> T) -> (T, AllocStats) {
        let baseline = self.live.load(Ordering::SeqCst);
        self.peak.store(baseline, Ordering::SeqCst);
        let calls_before = self.calls.load(Ordering::SeqCst);
        let out = op();
        let stats = AllocStats {
            peak_extra_bytes: self.peak.load(Ordering::SeqCst).saturating_sub(baseline),
            allocations: self.calls.load(Ordering::SeqCst) - calls_before,
        };
        (out, stats)
    }

    fn grow(&self, bytes: usize) {
        let now = self.live.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn shrink(&self, bytes: usize) {
        let _ = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                Some(live.saturating_sub(bytes))
            });
    }
}

unsafe impl GlobalAlloc for AllocMeter {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            self.grow(layout.size());
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        self.shrink(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.grow(layout.size());
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                self.grow(new_size - layout.size());
            } else {
                self.shrink(layout.size() - new_size);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        new_ptr
    }
}
