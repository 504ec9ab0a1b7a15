//! Per-cache slot table.
//!
//! Every fragment a cache produces gets a slot. The slot records whether the
//! fragment is idle, active, or destroyed, and a generation that changes each
//! time the slot is reused so stale tags are rejected.

use alloc::vec::Vec;

use crate::error::AllocResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Idle,
    Active,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    idle: u32,
    active: u32,
}

impl SlotTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            idle: 0,
            active: 0,
        }
    }

    pub(crate) fn idle_count(&self) -> u32 {
        self.idle
    }

    pub(crate) fn active_count(&self) -> u32 {
        self.active
    }

    /// Live fragments, idle or active
    pub(crate) fn live_count(&self) -> u32 {
        self.idle + self.active
    }

    /// Claim a slot for a newly produced fragment, reusing destroyed ones.
    pub(crate) fn claim(&mut self, state: SlotState) -> AllocResult<(u32, u32)> {
        debug_assert_ne!(state, SlotState::Destroyed);

        let (index, generation) = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = state;
            (index, slot.generation)
        } else {
            self.slots.try_reserve(1)?;
            // Reserve the free-list entry now so retire never allocates
            self.free.try_reserve(self.slots.len() + 1 - self.free.len())?;
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                state,
            });
            (index, 0)
        };

        self.bump(state, 1);
        Ok((index, generation))
    }

    /// Move a slot from `from` to `to`; false if the slot is not in `from`
    /// or the generation is stale.
    pub(crate) fn transition(
        &mut self,
        index: u32,
        generation: u32,
        from: SlotState,
        to: SlotState,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        if slot.generation != generation || slot.state != from {
            return false;
        }
        slot.state = to;

        self.bump(from, -1);
        if to == SlotState::Destroyed {
            self.free.push(index);
        } else {
            self.bump(to, 1);
        }
        true
    }

    /// Mark a live slot destroyed; false if the tag is stale
    pub(crate) fn retire(&mut self, index: u32, generation: u32) -> bool {
        let from = match self.state_of(index, generation) {
            Some(state @ (SlotState::Idle | SlotState::Active)) => state,
            _ => return false,
        };
        self.transition(index, generation, from, SlotState::Destroyed)
    }

    pub(crate) fn state_of(&self, index: u32, generation: u32) -> Option<SlotState> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .map(|slot| slot.state)
    }

    fn bump(&mut self, state: SlotState, delta: i32) {
        let counter = match state {
            SlotState::Idle => &mut self.idle,
            SlotState::Active => &mut self.active,
            SlotState::Destroyed => return,
        };
        *counter = counter.wrapping_add_signed(delta);
    }
}
