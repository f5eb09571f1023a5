use std::ops::Range;

/// Hands out thumbnail work in small slices so a single-threaded event loop
/// can yield between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailBatcher {
    next: u32,
    page_count: u32,
    batch_size: u32,
}

impl ThumbnailBatcher {
    pub fn new(page_count: u32, batch_size: usize) -> Self {
        let batch_size = u32::try_from(batch_size).unwrap_or(u32::MAX).max(1);
        Self { next: 0, page_count, batch_size }
    }

    pub fn next_batch(&mut self) -> Option<Range<u32>> {
        if self.is_done() {
            return None;
        }

        let end = self.next.saturating_add(self.batch_size).min(self.page_count);
        let batch = self.next..end;
        self.next = end;
        Some(batch)
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.page_count
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }
}
