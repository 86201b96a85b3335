//! Windowed rendering over long message sequences.
//!
//! Only the slice of the sequence intersecting the viewport (plus a buffer
//! margin) is rendered; the window is recomputed on every scroll event and
//! a render is skipped when the bounds did not move.

/// Half-open index range `[start, end)` into the message sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: usize,
    pub end: usize,
}

impl WindowBounds {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compute the rendered window for the current scroll position.
///
/// `start = floor(scroll_offset / item_height)` clamped into the sequence,
/// `end = min(start + visible + buffer, total_count)`. The window always
/// covers every index that is visually on screen.
pub fn compute_window(
    scroll_offset: u32,
    container_height: u32,
    item_height: u32,
    total_count: usize,
    buffer_size: usize,
) -> WindowBounds {
    if item_height == 0 || total_count == 0 {
        return WindowBounds { start: 0, end: 0 };
    }

    let start = ((scroll_offset / item_height) as usize).min(total_count.saturating_sub(1));
    let visible = container_height.div_ceil(item_height) as usize;
    let end = (start + visible + buffer_size).min(total_count);

    WindowBounds { start, end }
}

/// Per-view tracker that skips redundant recomputation.
#[derive(Debug)]
pub struct ScrollWindow {
    item_height: u32,
    buffer_size: usize,
    last: Option<WindowBounds>,
}

impl ScrollWindow {
    pub fn new(item_height: u32, buffer_size: usize) -> Self {
        Self {
            item_height,
            buffer_size,
            last: None,
        }
    }

    /// Recompute for a scroll event. Returns `Some(bounds)` when the window
    /// moved and the view must re-render, `None` when nothing changed.
    pub fn update(
        &mut self,
        scroll_offset: u32,
        container_height: u32,
        total_count: usize,
    ) -> Option<WindowBounds> {
        let bounds = compute_window(
            scroll_offset,
            container_height,
            self.item_height,
            total_count,
            self.buffer_size,
        );
        if self.last == Some(bounds) {
            return None;
        }
        self.last = Some(bounds);
        Some(bounds)
    }

    pub fn bounds(&self) -> Option<WindowBounds> {
        self.last
    }
}
