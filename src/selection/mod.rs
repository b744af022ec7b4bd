//! # Selection and Pin State
//!
//! Two independent index sets driven by user gestures: the brushed
//! *selection*, replaced wholesale on every brush, and the *pin*, a frozen
//! snapshot of the selection taken on request. The four transitions below are
//! the only way either set changes.

use std::collections::BTreeSet;

/// A set of original record indices.
pub type IndexSet = BTreeSet<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Brush(IndexSet),
    Pin,
    ClearPin,
    ClearSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: IndexSet,
    pinned: IndexSet,
    selection_revision: u64,
    pin_revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection with `indices`; an empty set means no selection.
    pub fn brush<I>(&mut self, indices: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.selected = indices.into_iter().collect();
        self.selection_revision += 1;
        log::trace!("Brushed {} records", self.selected.len());
    }

    /// Snapshots the current selection into the pin.
    pub fn pin(&mut self) {
        self.pinned = self.selected.clone();
        self.pin_revision += 1;
        log::trace!("Pinned {} records", self.pinned.len());
    }

    pub fn clear_pin(&mut self) {
        self.pinned.clear();
        self.pin_revision += 1;
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.selection_revision += 1;
    }

    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Brush(indices) => self.brush(indices),
            Transition::Pin => self.pin(),
            Transition::ClearPin => self.clear_pin(),
            Transition::ClearSelection => self.clear_selection(),
        }
    }

    pub fn selected(&self) -> &IndexSet {
        &self.selected
    }

    pub fn pinned(&self) -> &IndexSet {
        &self.pinned
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn has_pin(&self) -> bool {
        !self.pinned.is_empty()
    }

    /// Bumped by every transition that writes the selection.
    pub fn selection_revision(&self) -> u64 {
        self.selection_revision
    }

    /// Bumped by every transition that writes the pin.
    pub fn pin_revision(&self) -> u64 {
        self.pin_revision
    }
}
