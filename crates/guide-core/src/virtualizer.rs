//! Window manager: decides which channel rows are materialized.
//!
//! Given N rows of fixed height, only `[start, end)` around the viewport
//! (plus overscan) is ever turned into row descriptors. The reported total
//! height is always `N * row_height` so scrollbars stay proportional.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderWindow {
    pub start: usize,
    pub end: usize,
    /// Vertical offset of the materialized block: `start * row_height`.
    pub offset_y: f64,
    pub total_height: f64,
}

impl RenderWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowState {
    /// No rows at all; the renderer shows its empty-state panel.
    Empty,
    Window(RenderWindow),
}

impl WindowState {
    pub fn window(&self) -> Option<&RenderWindow> {
        match self {
            Self::Empty => None,
            Self::Window(w) => Some(w),
        }
    }
}

/// Pure windowing math.
///
/// `start = max(0, floor(top / h) - overscan)`,
/// `end = min(n, ceil((top + viewport) / h) + overscan)`, both clamped so
/// `0 <= start <= end <= n` for any input.
pub fn compute_window(
    n: usize,
    row_height: f64,
    overscan: usize,
    scroll_top: f64,
    viewport_height: f64,
) -> WindowState {
    if n == 0 {
        return WindowState::Empty;
    }
    let h = if row_height > 0.0 { row_height } else { 1.0 };
    let top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };
    let viewport = if viewport_height.is_finite() { viewport_height.max(0.0) } else { 0.0 };

    let first_visible = (top / h).floor() as usize;
    let last_visible = ((top + viewport) / h).ceil() as usize;

    let end = last_visible.saturating_add(overscan).min(n);
    let start = first_visible.saturating_sub(overscan).min(end);

    WindowState::Window(RenderWindow {
        start,
        end,
        offset_y: start as f64 * h,
        total_height: n as f64 * h,
    })
}

#[derive(Debug, Clone)]
pub struct Virtualizer {
    row_height: f64,
    overscan: usize,
    scroll_top: f64,
    viewport_height: f64,
    len: usize,
    state: WindowState,
}

impl Virtualizer {
    pub fn new(row_height: f64, overscan: usize) -> Self {
        Self {
            row_height: if row_height > 0.0 { row_height } else { 1.0 },
            overscan,
            scroll_top: 0.0,
            viewport_height: 0.0,
            len: 0,
            state: WindowState::Empty,
        }
    }

    fn recompute(&mut self) -> &WindowState {
        self.state = compute_window(
            self.len,
            self.row_height,
            self.overscan,
            self.scroll_top,
            self.viewport_height,
        );
        if let WindowState::Window(w) = &self.state {
            trace!("[window] rows {}..{} of {}", w.start, w.end, self.len);
        }
        &self.state
    }

    fn max_scroll(&self) -> f64 {
        (self.len as f64 * self.row_height - self.viewport_height).max(0.0)
    }

    /// Scroll event.
    pub fn scroll_to(&mut self, scroll_top: f64) -> &WindowState {
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll());
        self.recompute()
    }

    pub fn scroll_by(&mut self, delta: f64) -> &WindowState {
        self.scroll_to(self.scroll_top + delta)
    }

    /// Resize event.
    pub fn set_viewport(&mut self, viewport_height: f64) -> &WindowState {
        self.viewport_height = viewport_height.max(0.0);
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
        self.recompute()
    }

    /// The visible list changed. Scrolls back to the top unless the caller
    /// asks to keep its position.
    pub fn set_len(&mut self, len: usize, preserve_scroll: bool) -> &WindowState {
        self.len = len;
        if preserve_scroll {
            self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
        } else {
            self.scroll_top = 0.0;
        }
        self.recompute()
    }

    /// Adjust `scroll_top` the minimum needed to bring `index` into view.
    pub fn reveal(&mut self, index: usize) -> &WindowState {
        if index >= self.len {
            return &self.state;
        }
        let top = index as f64 * self.row_height;
        let bottom = top + self.row_height;
        if top < self.scroll_top {
            self.scroll_to(top)
        } else if bottom > self.scroll_top + self.viewport_height {
            self.scroll_to(bottom - self.viewport_height)
        } else {
            &self.state
        }
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows a viewport can touch when it is not row-aligned.
    pub fn viewport_rows(&self) -> usize {
        (self.viewport_height / self.row_height).ceil() as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_signals_empty_state() {
        assert_eq!(compute_window(0, 40.0, 5, 0.0, 600.0), WindowState::Empty);
        let mut v = Virtualizer::new(40.0, 5);
        assert_eq!(*v.set_viewport(600.0), WindowState::Empty);
    }

    #[test]
    fn test_window_formula() {
        // rows 25..40 visible, overscan 5 -> 20..45
        let state = compute_window(1000, 40.0, 5, 1000.0, 600.0);
        let w = state.window().unwrap();
        assert_eq!((w.start, w.end), (20, 45));
        assert_eq!(w.offset_y, 800.0);
        assert_eq!(w.total_height, 40_000.0);
    }

    #[test]
    fn test_window_clamped_at_edges() {
        let w = *compute_window(10, 40.0, 5, 0.0, 600.0).window().unwrap();
        assert_eq!((w.start, w.end), (0, 10));

        let w = *compute_window(10, 40.0, 2, 10_000.0, 600.0).window().unwrap();
        assert!(w.start <= w.end && w.end <= 10);

        let w = *compute_window(10, 40.0, 2, f64::NAN, -5.0).window().unwrap();
        assert_eq!(w.start, 0);
    }

    #[test]
    fn test_bounds_hold_for_all_scroll_positions() {
        let n = 237;
        let (h, overscan, viewport) = (33.0, 3, 410.0);
        let mut v = Virtualizer::new(h, overscan);
        v.set_len(n, false);
        v.set_viewport(viewport);
        let max_rows = v.viewport_rows() + 2 * overscan;

        let mut top = -100.0;
        while top < n as f64 * h + 500.0 {
            if let WindowState::Window(w) = compute_window(n, h, overscan, top, viewport) {
                assert!(w.start <= w.end, "top={}", top);
                assert!(w.end <= n, "top={}", top);
                assert!(w.end - w.start <= max_rows, "top={} len={}", top, w.len());
            }
            top += 7.3;
        }
    }

    #[test]
    fn test_list_change_resets_to_top_unless_preserved() {
        let mut v = Virtualizer::new(10.0, 0);
        v.set_len(100, false);
        v.set_viewport(50.0);
        v.scroll_to(300.0);
        assert_eq!(v.state().window().unwrap().start, 30);

        v.set_len(120, true);
        assert_eq!(v.scroll_top(), 300.0);

        v.set_len(120, false);
        assert_eq!(v.scroll_top(), 0.0);
        assert_eq!(v.state().window().unwrap().start, 0);
    }

    #[test]
    fn test_scroll_clamped_to_content() {
        let mut v = Virtualizer::new(10.0, 0);
        v.set_len(20, false);
        v.set_viewport(50.0);
        v.scroll_to(10_000.0);
        assert_eq!(v.scroll_top(), 150.0);
        let w = v.state().window().unwrap();
        assert_eq!((w.start, w.end), (15, 20));
    }

    #[test]
    fn test_reveal_scrolls_minimally() {
        let mut v = Virtualizer::new(10.0, 0);
        v.set_len(100, false);
        v.set_viewport(50.0);
        v.reveal(9);
        assert_eq!(v.scroll_top(), 50.0);
        v.reveal(7);
        assert_eq!(v.scroll_top(), 50.0);
        v.reveal(2);
        assert_eq!(v.scroll_top(), 20.0);
    }
}
