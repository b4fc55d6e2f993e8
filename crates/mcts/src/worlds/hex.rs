//! Hex on an n-by-n parallelogram.
//!
//! Black owns the top and bottom edges, white the left and right. Each cell
//! touches six neighbors: the four orthogonal ones plus the two skew
//! diagonals `(r-1, c+1)` and `(r+1, c-1)`. Hex admits no draws, so every
//! game ends with exactly one connected side.

use std::fmt;

use lockstep_core::{empty_transition, Observation, Result, Transition, World, WorldError};
use ndarray::{Array1, Array2};

const NEIGHBORS: [(i32, i32); 6] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, 1), (1, -1)];

/// Contents of one board cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Black,
    White,
}

/// Hex world parameterized by board size. Seat 0 plays black and moves
/// first; actions are flat cell indices in row-major order.
#[derive(Clone, Debug)]
pub struct Hex {
    size: usize,
}

/// One hex position: board contents and the seat to move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexState {
    board: Vec<Cell>,
    size: usize,
    to_move: usize,
}

impl Hex {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn fresh(&self) -> HexState {
        HexState {
            board: vec![Cell::Empty; self.size * self.size],
            size: self.size,
            to_move: 0,
        }
    }

    /// Parse a position like `"bwb/wbw/..."`. Rows are separated by `/` or
    /// newlines; cells are `b`, `w` and `.`. The seat to move is inferred
    /// from the stone parity: black moves first.
    ///
    /// # Errors
    /// `InvalidBoard` if the board is not square or the stone counts are
    /// impossible, `UnknownCell` for an unrecognized character.
    pub fn from_string(text: &str) -> Result<(Hex, HexState)> {
        let rows: Vec<&str> = text
            .trim()
            .split(|c| c == '/' || c == '\n')
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .collect();
        let size = rows.len();
        if size == 0 {
            return Err(WorldError::InvalidBoard("empty board".into()));
        }
        let mut board = Vec::with_capacity(size * size);
        for row in &rows {
            if row.chars().count() != size {
                return Err(WorldError::InvalidBoard(format!(
                    "row {row:?} does not match board size {size}"
                )));
            }
            for cell in row.chars() {
                board.push(match cell {
                    '.' => Cell::Empty,
                    'b' => Cell::Black,
                    'w' => Cell::White,
                    other => return Err(WorldError::UnknownCell(other)),
                });
            }
        }
        let blacks = board.iter().filter(|&&c| c == Cell::Black).count();
        let whites = board.iter().filter(|&&c| c == Cell::White).count();
        let to_move = if blacks == whites {
            0
        } else if blacks == whites + 1 {
            1
        } else {
            return Err(WorldError::InvalidBoard(format!(
                "impossible stone counts: {blacks} black, {whites} white"
            )));
        };
        let state = HexState {
            board,
            size,
            to_move,
        };
        Ok((Hex::new(size), state))
    }
}

impl HexState {
    fn at(&self, row: usize, col: usize) -> Cell {
        self.board[row * self.size + col]
    }

    /// Whether `cell`'s stones connect its two edges: rows 0 and `size - 1`
    /// for black, columns 0 and `size - 1` for white.
    fn connected(&self, cell: Cell) -> bool {
        let size = self.size;
        let mut seen = vec![false; size * size];
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for i in 0..size {
            let (row, col) = if cell == Cell::Black { (0, i) } else { (i, 0) };
            if self.at(row, col) == cell {
                seen[row * size + col] = true;
                stack.push((row, col));
            }
        }
        while let Some((row, col)) = stack.pop() {
            if (cell == Cell::Black && row == size - 1)
                || (cell == Cell::White && col == size - 1)
            {
                return true;
            }
            for (dr, dc) in NEIGHBORS {
                let (r, c) = (row as i32 + dr, col as i32 + dc);
                if r < 0 || c < 0 || r >= size as i32 || c >= size as i32 {
                    continue;
                }
                let (r, c) = (r as usize, c as usize);
                if self.at(r, c) == cell && !seen[r * size + c] {
                    seen[r * size + c] = true;
                    stack.push((r, c));
                }
            }
        }
        false
    }
}

impl fmt::Display for HexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            if row > 0 {
                f.write_str("/")?;
            }
            for col in 0..self.size {
                f.write_str(match self.at(row, col) {
                    Cell::Empty => ".",
                    Cell::Black => "b",
                    Cell::White => "w",
                })?;
            }
        }
        Ok(())
    }
}

impl World for Hex {
    type State = HexState;

    fn n_seats(&self) -> usize {
        2
    }

    fn n_actions(&self) -> usize {
        self.size * self.size
    }

    fn reset(&self, n_envs: usize) -> Vec<HexState> {
        (0..n_envs).map(|_| self.fresh()).collect()
    }

    fn observe(&self, states: &[HexState]) -> Observation {
        let n_envs = states.len();
        let mut valid = Array2::from_elem((n_envs, self.n_actions()), false);
        let mut seats = Array1::zeros(n_envs);
        for (env, state) in states.iter().enumerate() {
            for (i, &cell) in state.board.iter().enumerate() {
                if cell == Cell::Empty {
                    valid[[env, i]] = true;
                }
            }
            seats[env] = state.to_move;
        }
        Observation { valid, seats }
    }

    fn step(&self, states: &mut [HexState], actions: &[usize]) -> Transition {
        let mut transition = empty_transition(states.len(), 2);
        for (env, state) in states.iter_mut().enumerate() {
            let stone = if state.to_move == 0 {
                Cell::Black
            } else {
                Cell::White
            };
            debug_assert_eq!(state.board[actions[env]], Cell::Empty);
            state.board[actions[env]] = stone;
            // Only the stone just placed can newly connect its edges.
            if state.connected(stone) {
                transition.terminal[env] = true;
                let (black, white) = if stone == Cell::Black {
                    (1.0, -1.0)
                } else {
                    (-1.0, 1.0)
                };
                transition.rewards[[env, 0]] = black;
                transition.rewards[[env, 1]] = white;
                *state = self.fresh();
            } else {
                state.to_move = 1 - state.to_move;
            }
        }
        transition
    }
}
