use std::fmt;

use serde::{Deserialize, Serialize};

pub const BOARD_CELLS: usize = 9;

const ROW_DIVIDER: &str = "\n---------\n";

/// One of the two players' symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Marker {
    X,
    O,
}

impl Marker {
    pub fn opponent(self) -> Marker {
        match self {
            Marker::X => Marker::O,
            Marker::O => Marker::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Marker::X => "X",
            Marker::O => "O",
        }
    }

    /// Exact, case-sensitive parse: only "X" and "O" are markers.
    pub fn parse(s: &str) -> Option<Marker> {
        match s {
            "X" => Some(Marker::X),
            "O" => Some(Marker::O),
            _ => None,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named board cell. Discriminants are the row-major board indices, so the
/// name <-> index mapping is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft = 0,
    TopCenter = 1,
    TopRight = 2,
    MiddleLeft = 3,
    Center = 4,
    MiddleRight = 5,
    BottomLeft = 6,
    BottomCenter = 7,
    BottomRight = 8,
}

impl Position {
    /// All positions in index order.
    pub const ALL: [Position; BOARD_CELLS] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::MiddleLeft,
        Position::Center,
        Position::MiddleRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Position> {
        Self::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Position::TopLeft => "top-left",
            Position::TopCenter => "top-center",
            Position::TopRight => "top-right",
            Position::MiddleLeft => "middle-left",
            Position::Center => "center",
            Position::MiddleRight => "middle-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomCenter => "bottom-center",
            Position::BottomRight => "bottom-right",
        }
    }

    /// Exact name lookup. Callers normalise (trim, lowercase) first.
    pub fn from_name(name: &str) -> Option<Position> {
        Self::ALL.into_iter().find(|pos| pos.name() == name)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 3x3 board in row-major order. `None` is an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [Option<Marker>; BOARD_CELLS],
}

impl Board {
    pub fn new(cells: [Option<Marker>; BOARD_CELLS]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, pos: Position) -> Option<Marker> {
        self.cells[pos.index()]
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.cell(pos).is_none()
    }

    /// Empty positions in ascending index order.
    pub fn empty_positions(&self) -> Vec<Position> {
        Position::ALL
            .into_iter()
            .filter(|pos| self.is_empty_at(*pos))
            .collect()
    }

    /// Lowest-indexed empty cell.
    pub fn first_empty(&self) -> Option<Position> {
        Position::ALL.into_iter().find(|pos| self.is_empty_at(*pos))
    }

    /// Renders the board as three `a | b | c` rows separated by a divider,
    /// with `.` for empty cells.
    pub fn render(&self) -> String {
        let rows: Vec<String> = self
            .cells
            .chunks(3)
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map_or(".", Marker::as_str))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect();
        rows.join(ROW_DIVIDER)
    }
}
