use crate::board::{Board, Marker, Position};

/// System message sent ahead of every move prompt.
pub const SYSTEM_PROMPT: &str =
    "You are a tic-tac-toe playing agent. Always respond with valid JSON only.";

/// Used when the coach's instructions are empty or whitespace.
pub const DEFAULT_INSTRUCTIONS: &str = "No specific instructions — play your best.";

const MOVE_DIRECTIVE: &str = "Think step by step about the best move. Consider:
1. Can you win immediately?
2. Do you need to block the opponent from winning?
3. What strategic position is best given your coach's instructions?

Respond with ONLY valid JSON in this exact format:
{\"thinking\": \"your reasoning here (2-3 sentences)\", \"move\": \"position-name\"}

The move MUST be one of the available positions listed above. Do not pick an occupied cell.";

/// Grid of all position names, columns padded to the widest name.
pub fn position_legend() -> String {
    let mut widths = [0usize; 3];
    for pos in Position::ALL {
        let col = pos.index() % 3;
        widths[col] = widths[col].max(pos.name().len());
    }

    Position::ALL
        .chunks(3)
        .map(|row| {
            format!(
                "{:<w0$} | {:<w1$} | {}",
                row[0].name(),
                row[1].name(),
                row[2].name(),
                w0 = widths[0],
                w1 = widths[1],
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the user prompt for one move. Pure function of its inputs.
pub fn build_move_prompt(board: &Board, player: Marker, instructions: &str) -> String {
    let available = board
        .empty_positions()
        .iter()
        .map(|pos| pos.name())
        .collect::<Vec<_>>()
        .join(", ");
    let instructions = if instructions.trim().is_empty() {
        DEFAULT_INSTRUCTIONS
    } else {
        instructions
    };

    format!(
        "You are an AI agent playing Tic-Tac-Toe as \"{player}\" against opponent \"{opponent}\".\n\n\
         Current board:\n{board}\n\n\
         Position names (3x3 grid):\n{legend}\n\n\
         Available positions: {available}\n\n\
         Your coach's instructions: {instructions}\n\n\
         {MOVE_DIRECTIVE}",
        opponent = player.opponent(),
        board = board.render(),
        legend = position_legend(),
    )
}
