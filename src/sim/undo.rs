/// Undo history: a bounded stack of reversible move records.
///
/// A record is pushed when a move is accepted (not when its tween ends).
/// When the stack is full the oldest record is evicted. Undone records move
/// to a redo stack, which any fresh move clears.

use std::collections::VecDeque;

use crate::domain::entity::Direction;
use crate::domain::grid::GridPos;
use crate::domain::rules::{BoxPush, MovePlan};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UndoRecord {
    pub player_from: GridPos,
    pub direction: Direction,
    pub pushed_box: Option<BoxPush>,
}

impl UndoRecord {
    pub fn player_to(&self) -> GridPos {
        self.direction.step(self.player_from)
    }
}

impl From<&MovePlan> for UndoRecord {
    fn from(plan: &MovePlan) -> Self {
        UndoRecord {
            player_from: plan.player_from,
            direction: plan.direction,
            pushed_box: plan.push,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UndoHistory {
    capacity: usize,
    undo: VecDeque<UndoRecord>,
    redo: Vec<UndoRecord>,
}

impl UndoHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        UndoHistory {
            capacity,
            undo: VecDeque::with_capacity(capacity),
            redo: vec![],
        }
    }

    /// Record a new move. Clears the redo stack.
    pub fn push(&mut self, record: UndoRecord) {
        self.redo.clear();
        self.push_keep_redo(record);
    }

    fn push_keep_redo(&mut self, record: UndoRecord) {
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(record);
    }

    pub fn pop(&mut self) -> Option<UndoRecord> {
        self.undo.pop_back()
    }

    /// Pop for undo: the record becomes redoable.
    pub fn pop_for_undo(&mut self) -> Option<UndoRecord> {
        let rec = self.undo.pop_back()?;
        if self.redo.len() == self.capacity {
            self.redo.remove(0);
        }
        self.redo.push(rec);
        Some(rec)
    }

    /// Pop for redo: the record returns to the undo stack.
    pub fn pop_for_redo(&mut self) -> Option<UndoRecord> {
        let rec = self.redo.pop()?;
        self.push_keep_redo(rec);
        Some(rec)
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(x: i32) -> UndoRecord {
        UndoRecord { player_from: GridPos::new(x, 0), direction: Direction::Right, pushed_box: None }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut h = UndoHistory::new(3);
        for x in 0..5 {
            h.push(rec(x));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.pop(), Some(rec(4)));
        assert_eq!(h.pop(), Some(rec(3)));
        assert_eq!(h.pop(), Some(rec(2)));
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut h = UndoHistory::new(10);
        h.push(rec(0));
        h.push(rec(1));
        assert_eq!(h.pop_for_undo(), Some(rec(1)));
        assert_eq!(h.redo_len(), 1);
        assert_eq!(h.pop_for_redo(), Some(rec(1)));
        assert_eq!(h.len(), 2);
        assert_eq!(h.pop_for_redo(), None);
    }

    #[test]
    fn new_move_clears_redo() {
        let mut h = UndoHistory::new(10);
        h.push(rec(0));
        h.pop_for_undo();
        h.push(rec(5));
        assert_eq!(h.redo_len(), 0);
    }

    #[test]
    fn player_to_follows_direction() {
        assert_eq!(rec(2).player_to(), GridPos::new(3, 0));
    }
}
