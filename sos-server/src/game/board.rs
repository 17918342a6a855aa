//! SOS-triple detection and hint search, ported from `check_for_sos_triple`
//! and `find_good_place`.

use sos_shared::{AccountId, Letter};

/// All 8 compass directions as `(row, column)` deltas, grouped so that index
/// `i` and index `i + 4` are opposite directions along the same axis.
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, 0),
    (0, 1),
    (-1, 1),
    (-1, -1),
    (1, 0),
    (0, -1),
    (1, -1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub owner: AccountId,
    pub letter: Letter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleMode {
    /// Report whether a move would score, without mutating the board.
    DryRun,
    /// Rewrite ownership of every scoring triple's far cells.
    Apply,
}

#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    cells: Vec<Vec<Option<Cell>>>,
    occupied: usize,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![vec![None; size]; size],
            occupied: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn occupied_cells(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.size * self.size
    }

    pub fn is_empty_at(&self, row: usize, column: usize) -> bool {
        self.cells[row][column].is_none()
    }

    fn in_bounds(&self, row: i32, column: i32) -> bool {
        row >= 0 && column >= 0 && (row as usize) < self.size && (column as usize) < self.size
    }

    fn get(&self, row: i32, column: i32) -> Option<Cell> {
        if !self.in_bounds(row, column) {
            return None;
        }
        self.cells[row as usize][column as usize]
    }

    fn set_owner(&mut self, row: i32, column: i32, owner: AccountId) {
        if let Some(cell) = self.cells[row as usize][column as usize].as_mut() {
            cell.owner = owner;
        }
    }

    /// Writes a letter into a cell owned by `account`. Caller must have
    /// already confirmed the cell is empty; letters are write-once.
    pub fn place(&mut self, row: usize, column: usize, letter: Letter, account: AccountId) {
        self.cells[row][column] = Some(Cell {
            owner: account,
            letter,
        });
        self.occupied += 1;
    }

    /// Detects and, in `Apply` mode, scores every SOS triple formed by a
    /// letter just placed at `(row, column)`. Returns the number of triples
    /// found. Deliberately does not deduplicate across directions: a single
    /// move can legitimately score more than once.
    pub fn check_triples(
        &mut self,
        row: usize,
        column: usize,
        letter: Letter,
        account: AccountId,
        mode: TripleMode,
    ) -> u32 {
        let origin = (row as i32, column as i32);
        let mut triples = 0;

        match letter {
            Letter::S => {
                for &(dr, dc) in &DIRECTIONS {
                    let mid = (origin.0 + dr, origin.1 + dc);
                    let far = (origin.0 + 2 * dr, origin.1 + 2 * dc);

                    let mid_cell = self.get(mid.0, mid.1);
                    let far_cell = self.get(far.0, far.1);

                    if matches!(mid_cell, Some(c) if c.letter == Letter::O)
                        && matches!(far_cell, Some(c) if c.letter == Letter::S)
                    {
                        triples += 1;
                        if mode == TripleMode::Apply {
                            self.set_owner(mid.0, mid.1, account);
                            self.set_owner(far.0, far.1, account);
                        }
                    }
                }
            }
            Letter::O => {
                for &(dr, dc) in &DIRECTIONS[..4] {
                    let a = (origin.0 + dr, origin.1 + dc);
                    let b = (origin.0 - dr, origin.1 - dc);

                    let a_cell = self.get(a.0, a.1);
                    let b_cell = self.get(b.0, b.1);

                    if matches!(a_cell, Some(c) if c.letter == Letter::S)
                        && matches!(b_cell, Some(c) if c.letter == Letter::S)
                    {
                        triples += 1;
                        if mode == TripleMode::Apply {
                            self.set_owner(a.0, a.1, account);
                            self.set_owner(b.0, b.1, account);
                        }
                    }
                }
            }
        }

        triples
    }

    /// Row-major scan for the first empty cell where placing `S` then `O`
    /// would score at least one triple.
    pub fn find_good_place(&mut self, account: AccountId) -> Option<(usize, usize, Letter)> {
        for row in 0..self.size {
            for column in 0..self.size {
                if !self.is_empty_at(row, column) {
                    continue;
                }

                for &letter in &[Letter::S, Letter::O] {
                    self.place(row, column, letter, account);
                    let scored = self.check_triples(row, column, letter, account, TripleMode::DryRun);
                    self.undo_place(row, column);

                    if scored > 0 {
                        return Some((row, column, letter));
                    }
                }
            }
        }
        None
    }

    fn undo_place(&mut self, row: usize, column: usize) {
        self.cells[row][column] = None;
        self.occupied -= 1;
    }

    /// Renders the board for `game_runner_board_status`: each cell is
    /// `(color, letter-or-empty)`, colors resolved from `colors_by_owner`.
    pub fn render(
        &self,
        colors_by_owner: impl Fn(AccountId) -> String,
    ) -> Vec<Vec<(String, String)>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Some(cell) => (colors_by_owner(cell.owner), cell.letter.to_string()),
                        None => (String::new(), String::new()),
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(id: i64) -> AccountId {
        AccountId::new(id)
    }

    #[test]
    fn horizontal_sos_scores_one_triple_on_the_closing_move() {
        let mut board = Board::new(3);
        let player = acc(1);

        board.place(0, 0, Letter::S, player);
        board.place(0, 1, Letter::O, player);

        board.place(0, 2, Letter::S, player);
        let scored = board.check_triples(0, 2, Letter::S, player, TripleMode::Apply);

        assert_eq!(scored, 1);
        assert_eq!(board.get(0, 1).unwrap().owner, player);
        assert_eq!(board.get(0, 0).unwrap().owner, player);
    }

    #[test]
    fn a_single_move_can_score_more_than_one_triple() {
        // S O S
        // . S .
        // S O S  -- filling the middle O between the two rows of S O S
        let mut board = Board::new(3);
        let player = acc(1);

        board.place(0, 0, Letter::S, player);
        board.place(0, 2, Letter::S, player);
        board.place(2, 0, Letter::S, player);
        board.place(2, 2, Letter::S, player);
        board.place(1, 1, Letter::S, player);

        board.place(0, 1, Letter::O, player);
        let scored_top = board.check_triples(0, 1, Letter::O, player, TripleMode::Apply);
        assert_eq!(scored_top, 1);

        board.place(2, 1, Letter::O, player);
        let scored_bottom = board.check_triples(2, 1, Letter::O, player, TripleMode::Apply);
        assert_eq!(scored_bottom, 1);
    }

    #[test]
    fn find_good_place_returns_none_on_a_board_with_no_scoring_move() {
        let mut board = Board::new(3);
        assert_eq!(board.find_good_place(acc(1)), None);
    }

    #[test]
    fn find_good_place_finds_the_closing_cell_of_a_pending_triple() {
        let mut board = Board::new(3);
        let player = acc(1);
        board.place(0, 0, Letter::S, player);
        board.place(0, 1, Letter::O, player);

        let hint = board.find_good_place(player);
        assert_eq!(hint, Some((0, 2, Letter::S)));
        // the dry run must not have left any trace on the board
        assert!(board.is_empty_at(0, 2));
    }
}
