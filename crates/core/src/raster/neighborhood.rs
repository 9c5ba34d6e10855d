//! Search windows and D8 direction codes

/// Square window of `radius` cells on each side of a center cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareWindow {
    pub radius: usize,
}

impl SquareWindow {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// In-grid cells of the window centered on (row, col), row-major
    pub fn cells_around(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        let r = self.radius as isize;
        (-r..=r)
            .flat_map(move |dr| (-r..=r).map(move |dc| (dr, dc)))
            .filter_map(move |(dr, dc)| d8::offset(row, col, dr, dc, rows, cols))
    }
}

/// D8 flow directions.
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// `0` = no outflow (no-data or unresolved pit). Codes also give the
/// tie-break priority for equal drops: E, NE, N, NW, W, SW, S, SE.
pub mod d8 {
    /// Code for cells with no outflow
    pub const NO_FLOW: u8 = 0;

    /// Direction offsets: (row_offset, col_offset), indexed by code - 1
    pub const OFFSETS: [(isize, isize); 8] = [
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Direction code (1-8) for neighbor index 0-7
    pub fn code(index: usize) -> u8 {
        (index + 1) as u8
    }

    /// Offset for a direction code, `None` for 0 or an invalid code
    pub fn offset_of(dir: u8) -> Option<(isize, isize)> {
        match dir {
            1..=8 => Some(OFFSETS[(dir - 1) as usize]),
            _ => None,
        }
    }

    /// The direction pointing back at the sender
    pub fn opposite(dir: u8) -> u8 {
        if dir == NO_FLOW {
            NO_FLOW
        } else {
            ((dir - 1 + 4) % 8) + 1
        }
    }

    /// Whether the code is a diagonal move
    pub fn is_diagonal(dir: u8) -> bool {
        matches!(dir, 2 | 4 | 6 | 8)
    }

    /// Metric length of one step in direction `dir` on a grid with the
    /// given cell width (east-west) and height (north-south).
    pub fn step_length(dir: u8, cell_width: f64, cell_height: f64) -> f64 {
        match dir {
            1 | 5 => cell_width,
            3 | 7 => cell_height,
            2 | 4 | 6 | 8 => cell_width.hypot(cell_height),
            _ => 0.0,
        }
    }

    /// (row + dr, col + dc) when it lies inside a rows x cols grid
    pub fn offset(
        row: usize,
        col: usize,
        dr: isize,
        dc: isize,
        rows: usize,
        cols: usize,
    ) -> Option<(usize, usize)> {
        let nr = row.checked_add_signed(dr)?;
        let nc = col.checked_add_signed(dc)?;
        (nr < rows && nc < cols).then_some((nr, nc))
    }

    /// The cell that (row, col) drains into, if it is inside the grid
    pub fn target(row: usize, col: usize, dir: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = offset_of(dir)?;
        offset(row, col, dr, dc, rows, cols)
    }

    /// In-grid neighbors of (row, col) in direction order, with their code
    pub fn neighbors(
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (u8, usize, usize)> {
        OFFSETS.iter().enumerate().filter_map(move |(idx, &(dr, dc))| {
            offset(row, col, dr, dc, rows, cols).map(|(nr, nc)| (code(idx), nr, nc))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_size() {
        assert_eq!(SquareWindow::new(5).cells_around(20, 20, 50, 50).count(), 121);
        assert_eq!(SquareWindow::new(0).cells_around(3, 3, 5, 5).collect::<Vec<_>>(), vec![(3, 3)]);
    }

    #[test]
    fn test_cells_around_clips_to_grid() {
        let cells: Vec<_> = SquareWindow::new(1).cells_around(0, 0, 10, 10).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_d8_opposite() {
        assert_eq!(d8::opposite(1), 5); // E -> W
        assert_eq!(d8::opposite(3), 7); // N -> S
        assert_eq!(d8::opposite(2), 6); // NE -> SW
        assert_eq!(d8::opposite(8), 4); // SE -> NW
        assert_eq!(d8::opposite(0), 0);
    }

    #[test]
    fn test_d8_target() {
        assert_eq!(d8::target(1, 1, 1, 3, 3), Some((1, 2)));
        assert_eq!(d8::target(0, 0, 3, 3, 3), None);
        assert_eq!(d8::target(2, 2, 8, 3, 3), None);
        assert_eq!(d8::target(1, 1, 0, 3, 3), None);
    }

    #[test]
    fn test_d8_step_length() {
        assert_eq!(d8::step_length(1, 10.0, 20.0), 10.0);
        assert_eq!(d8::step_length(7, 10.0, 20.0), 20.0);
        assert!((d8::step_length(2, 10.0, 10.0) - 10.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
    }
}
