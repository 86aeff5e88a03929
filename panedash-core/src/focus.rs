// panedash-core/src/focus.rs
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::Widget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Unfocused,
    /// Index into the generation's widget list
    Focused(usize),
}

/// Tracks which widget owns keyboard input.
///
/// Navigation only visits focusable widgets. Every transition clears the
/// highlight on the previous widget and sets it on the new one while the
/// state lock is held, so the indicator never disagrees with the state.
pub struct FocusTracker {
    widgets: Vec<Arc<dyn Widget>>,
    focusables: Vec<usize>,
    shortcuts: bool,
    state: Mutex<FocusState>,
}

impl FocusTracker {
    pub fn new(widgets: Vec<Arc<dyn Widget>>, shortcuts: bool) -> Self {
        let focusables = widgets
            .iter()
            .enumerate()
            .filter(|(_, widget)| widget.focusable())
            .map(|(idx, _)| idx)
            .collect();

        Self {
            widgets,
            focusables,
            shortcuts,
            state: Mutex::new(FocusState::Unfocused),
        }
    }

    pub fn state(&self) -> FocusState {
        *self.lock()
    }

    pub fn is_focused(&self) -> bool {
        matches!(self.state(), FocusState::Focused(_))
    }

    pub fn focused_widget(&self) -> Option<Arc<dyn Widget>> {
        match self.state() {
            FocusState::Focused(idx) => self.widgets.get(idx).cloned(),
            FocusState::Unfocused => None,
        }
    }

    pub fn focusable_count(&self) -> usize {
        self.focusables.len()
    }

    /// Focus the next focusable widget, wrapping around
    pub fn next(&self) {
        if self.focusables.is_empty() {
            return;
        }

        let mut state = self.lock();
        let position = match self.position(*state) {
            Some(pos) => (pos + 1) % self.focusables.len(),
            None => 0,
        };
        self.transition(&mut state, FocusState::Focused(self.focusables[position]));
    }

    /// Focus the previous focusable widget, wrapping around
    pub fn prev(&self) {
        if self.focusables.is_empty() {
            return;
        }

        let mut state = self.lock();
        let len = self.focusables.len();
        let position = match self.position(*state) {
            Some(pos) => (pos + len - 1) % len,
            None => len - 1,
        };
        self.transition(&mut state, FocusState::Focused(self.focusables[position]));
    }

    /// Jump to the focusable widget that declares `key`.
    ///
    /// Returns false, leaving the state untouched, when no widget claims the
    /// key so the caller can treat it as a global command.
    pub fn focus_on(&self, key: char) -> bool {
        if !self.shortcuts {
            return false;
        }

        let target = self
            .focusables
            .iter()
            .copied()
            .find(|&idx| self.widgets[idx].focus_char() == Some(key));

        match target {
            Some(idx) => {
                let mut state = self.lock();
                self.transition(&mut state, FocusState::Focused(idx));
                true
            }
            None => false,
        }
    }

    /// Drop focus entirely
    pub fn none(&self) {
        let mut state = self.lock();
        self.transition(&mut state, FocusState::Unfocused);
    }

    fn position(&self, state: FocusState) -> Option<usize> {
        match state {
            FocusState::Focused(idx) => self.focusables.iter().position(|&i| i == idx),
            FocusState::Unfocused => None,
        }
    }

    fn transition(&self, state: &mut MutexGuard<'_, FocusState>, next: FocusState) {
        if let FocusState::Focused(old) = **state {
            self.widgets[old].set_focused(false);
        }
        if let FocusState::Focused(new) = next {
            self.widgets[new].set_focused(true);
        }
        **state = next;
    }

    fn lock(&self) -> MutexGuard<'_, FocusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
