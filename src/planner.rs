//! Tile planning: turns content and viewport heights into the scroll offsets
//! that cover the content exactly once.

/// One planned capture position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTile {
    pub index: usize,
    /// Scroll offset in CSS pixels
    pub offset: u32,
    /// Rows of real content below `offset`, at most one viewport
    pub content_height: u32,
}

impl PlannedTile {
    pub fn is_partial(&self, viewport_height: u32) -> bool {
        self.content_height < viewport_height
    }
}

/// Strictly increasing scroll offsets starting at 0 and ending at
/// `max(0, total_height - viewport_height)`.
///
/// ```rust
/// use stitchshot::TilePlan;
///
/// let plan = TilePlan::new(2000, 800);
/// assert_eq!(plan.offsets(), &[0, 800, 1200]);
///
/// let short = TilePlan::new(500, 800);
/// assert_eq!(short.offsets(), &[0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    offsets: Vec<u32>,
    total_height: u32,
    viewport_height: u32,
}

impl TilePlan {
    /// Heights of 0 are treated as 1.
    pub fn new(total_height: u32, viewport_height: u32) -> Self {
        let total_height = total_height.max(1);
        let viewport_height = viewport_height.max(1);

        let tile_count = total_height.div_ceil(viewport_height).max(1);
        let last_offset = total_height.saturating_sub(viewport_height);

        let mut offsets: Vec<u32> = Vec::with_capacity(tile_count as usize);
        for i in 0..tile_count {
            // The last tile is pinned to the bottom edge so it ends exactly on the content.
            let offset = if i == tile_count - 1 {
                last_offset
            } else {
                i * viewport_height
            };
            if offsets.last().map_or(true, |&prev| offset > prev) {
                offsets.push(offset);
            }
        }

        Self {
            offsets,
            total_height,
            viewport_height,
        }
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn total_height(&self) -> u32 {
        self.total_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn tiles(&self) -> impl Iterator<Item = PlannedTile> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .map(move |(index, &offset)| PlannedTile {
                index,
                offset,
                content_height: self
                    .viewport_height
                    .min(self.total_height.saturating_sub(offset)),
            })
    }
}
