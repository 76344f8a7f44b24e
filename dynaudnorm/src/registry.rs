// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Generation-checked handle registry.
//!
//! Native engine instances are never handed out as raw pointers. Instead the
//! owning [`crate::NormalizerApi`] stores them in a [`Registry`] and callers get
//! an [`EngineHandle`]: a slot index plus the generation the slot had when the
//! value was inserted. Removing a value bumps the slot's generation, so any copy
//! of the old handle is rejected from then on, including a second destroy.

use crate::{Error, Result};

/// Copyable reference to a value stored in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle {
    index: u32,
    generation: u32,
}

impl EngineHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot map whose handles go stale once their value is removed.
///
/// Freed slots are reused, each reuse under a new generation.
#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    what: &'static str,
}

impl<T> Registry<T> {
    /// Creates an empty registry. `what` names the stored values in errors.
    pub fn new(what: &'static str) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            what,
        }
    }

    /// Stores `value` and returns a fresh handle to it.
    pub fn insert(&mut self, value: T) -> EngineHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return EngineHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        EngineHandle {
            index,
            generation: 0,
        }
    }

    /// Returns the value behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the handle is unknown or stale.
    pub fn get(&self, handle: EngineHandle) -> Result<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(Error::NotInitialized(self.what))
    }

    /// Removes and returns the value behind `handle`, invalidating every copy of it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the handle is unknown or stale.
    pub fn remove(&mut self, handle: EngineHandle) -> Result<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(Error::NotInitialized(self.what))?;
        let value = slot.value.take().ok_or(Error::NotInitialized(self.what))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(value)
    }

    /// Returns `true` if `handle` still refers to a live value.
    pub fn contains(&self, handle: EngineHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every live value, returning them in slot order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                values.push(value);
            }
        }
        values
    }
}
