// panedash-core/src/layout.rs
use ratatui::layout::{Constraint, Layout, Rect};

/// Equal-cell grid that places widgets row by row.
///
/// The last row stretches its cells when it holds fewer widgets than
/// there are columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    columns: u16,
}

impl Grid {
    pub fn new(columns: u16) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    /// Areas for `count` widgets, in widget order
    pub fn areas(&self, area: Rect, count: usize) -> Vec<Rect> {
        if count == 0 {
            return Vec::new();
        }

        let columns = self.columns as usize;
        let rows = count.div_ceil(columns);
        let row_areas = Layout::vertical(vec![Constraint::Ratio(1, rows as u32); rows]).split(area);

        let mut result = Vec::with_capacity(count);
        for (row, row_area) in row_areas.iter().enumerate() {
            let cells = (count - row * columns).min(columns);
            let cell_areas =
                Layout::horizontal(vec![Constraint::Ratio(1, cells as u32); cells]).split(*row_area);
            result.extend(cell_areas.iter().copied());
        }
        result
    }
}
