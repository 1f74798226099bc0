use serde::{Deserialize, Serialize};

/// An (anchor, focus) pair of positions in one flow coordinate space.
///
/// Direction is significant: a range whose focus precedes its anchor was
/// made backwards (shift+left, backward delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRange {
    pub anchor: usize,
    pub focus: usize,
}

impl FlowRange {
    pub fn new(anchor: usize, focus: usize) -> Self {
        Self { anchor, focus }
    }

    pub fn at(position: usize) -> Self {
        Self::new(position, position)
    }

    pub fn first(&self) -> usize {
        self.anchor.min(self.focus)
    }

    pub fn last(&self) -> usize {
        self.anchor.max(self.focus)
    }

    pub fn size(&self) -> usize {
        self.last() - self.first()
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self) -> bool {
        self.focus < self.anchor
    }

    pub fn reverse(&self) -> Self {
        Self::new(self.focus, self.anchor)
    }

    /// Same span, ordered first to last
    pub fn normalized(&self) -> Self {
        Self::new(self.first(), self.last())
    }

    /// True when the ranges share at least one position unit
    pub fn intersects(&self, other: &FlowRange) -> bool {
        self.first() < other.last() && other.first() < self.last()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.first() <= position && position < self.last()
    }

    /// Clamp both ends to `[0, size]`
    pub fn clamp(&self, size: usize) -> Self {
        Self::new(self.anchor.min(size), self.focus.min(size))
    }

    /// Apply a position mapping to both ends, keeping direction
    pub fn map(&self, f: impl Fn(usize) -> usize) -> Self {
        Self::new(f(self.anchor), f(self.focus))
    }
}
