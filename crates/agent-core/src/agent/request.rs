use crate::board::{BOARD_CELLS, Board, Marker, Position};

/// Caller mistakes. These surface as client errors and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Board must have 9 cells")]
    BoardLength(usize),
    #[error("Player must be X or O")]
    InvalidPlayer(String),
    #[error("Board cells must be X, O, or null")]
    InvalidCell { index: usize, value: String },
    #[error("No empty cells")]
    NoEmptyCells,
}

/// A validated move request.
///
/// Construction guarantees the board has at least one empty cell, so a
/// fallback move is always available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    board: Board,
    player: Marker,
    instructions: String,
    fallback: Position,
}

impl MoveRequest {
    pub fn new(
        board: Board,
        player: Marker,
        instructions: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let fallback = board.first_empty().ok_or(RequestError::NoEmptyCells)?;
        Ok(Self {
            board,
            player,
            instructions: instructions.into(),
            fallback,
        })
    }

    /// Validates the loosely typed request body fields.
    ///
    /// Checks run in order: board length, player marker, cell values, then
    /// at least one empty cell.
    pub fn from_wire(
        cells: &[Option<String>],
        player: &str,
        instructions: impl Into<String>,
    ) -> Result<Self, RequestError> {
        if cells.len() != BOARD_CELLS {
            return Err(RequestError::BoardLength(cells.len()));
        }
        let player =
            Marker::parse(player).ok_or_else(|| RequestError::InvalidPlayer(player.to_string()))?;

        let mut board = [None; BOARD_CELLS];
        for (index, cell) in cells.iter().enumerate() {
            board[index] = match cell.as_deref() {
                None => None,
                Some(value) => Some(Marker::parse(value).ok_or_else(|| {
                    RequestError::InvalidCell {
                        index,
                        value: value.to_string(),
                    }
                })?),
            };
        }

        Self::new(Board::new(board), player, instructions)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn player(&self) -> Marker {
        self.player
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Lowest-indexed empty cell of the request board.
    pub fn fallback(&self) -> Position {
        self.fallback
    }

    pub fn is_legal(&self, pos: Position) -> bool {
        self.board.is_empty_at(pos)
    }
}

/// The answer to a move request. `position` is always empty on the request board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDecision {
    pub position: Position,
    pub thinking: String,
}

impl MoveDecision {
    pub fn index(&self) -> usize {
        self.position.index()
    }
}
