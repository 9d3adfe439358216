// SPDX-License-Identifier: MIT

use crate::errors::*;
use crate::{AtomGroup, Hid};

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    object: T,
    refs: u32,
}

/// Slot map from [`Hid`] to `T` with a reference count per entry.
#[derive(Debug)]
pub struct Registry<T> {
    group: AtomGroup,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Registry<T> {
    pub fn new(group: AtomGroup) -> Self {
        Self { group, slots: Vec::new(), free: Vec::new(), len: 0 }
    }

    pub fn group(&self) -> AtomGroup {
        self.group
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `object` with a reference count of one.
    pub fn register(&mut self, object: T) -> AtomResult<Hid> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() > u32::MAX as usize {
                    return Err(AtomError::Exhausted(self.group));
                }
                self.slots.push(Slot { generation: 1, entry: None });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.entry = Some(Entry { object, refs: 1 });
        self.len += 1;
        let id = Hid::new(self.group, slot.generation, index as u32);
        log::trace!("registered {id}");
        Ok(id)
    }

    fn entry(&self, id: Hid) -> AtomResult<&Entry<T>> {
        self.check_group(id)?;
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.entry.as_ref())
            .ok_or(AtomError::BadId(id))
    }

    fn entry_mut(&mut self, id: Hid) -> AtomResult<&mut Entry<T>> {
        self.check_group(id)?;
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.entry.as_mut())
            .ok_or(AtomError::BadId(id))
    }

    fn check_group(&self, id: Hid) -> AtomResult {
        if id.is(self.group) {
            Ok(())
        } else {
            Err(AtomError::WrongGroup { expected: self.group, found: id })
        }
    }

    pub fn contains(&self, id: Hid) -> bool {
        self.entry(id).is_ok()
    }

    pub fn get(&self, id: Hid) -> AtomResult<&T> {
        self.entry(id).map(|e| &e.object)
    }

    pub fn get_mut(&mut self, id: Hid) -> AtomResult<&mut T> {
        self.entry_mut(id).map(|e| &mut e.object)
    }

    pub fn ref_count(&self, id: Hid) -> AtomResult<u32> {
        self.entry(id).map(|e| e.refs)
    }

    /// Adds a reference; returns the new count.
    pub fn inc_ref(&mut self, id: Hid) -> AtomResult<u32> {
        let e = self.entry_mut(id)?;
        e.refs += 1;
        Ok(e.refs)
    }

    /// Drops a reference. Returns the object once the count reaches zero.
    pub fn dec_ref(&mut self, id: Hid) -> AtomResult<Option<T>> {
        let e = self.entry_mut(id)?;
        e.refs -= 1;
        if e.refs > 0 {
            return Ok(None);
        }
        self.remove(id).map(Some)
    }

    /// Unregisters `id` whatever its reference count.
    pub fn remove(&mut self, id: Hid) -> AtomResult<T> {
        self.entry(id)?;
        let slot = &mut self.slots[id.index()];
        let entry = slot.entry.take().ok_or(AtomError::BadId(id))?;
        slot.generation = match (slot.generation + 1) & 0x00FF_FFFF {
            0 => 1,
            g => g,
        };
        self.free.push(id.index());
        self.len -= 1;
        log::trace!("removed {id}");
        Ok(entry.object)
    }

    /// Rebinds `id` to `object`, keeping its reference count. Returns the old object.
    pub fn substitute(&mut self, id: Hid, object: T) -> AtomResult<T> {
        let e = self.entry_mut(id)?;
        Ok(core::mem::replace(&mut e.object, object))
    }

    /// First handle whose object satisfies `pred`.
    pub fn search(&self, mut pred: impl FnMut(Hid, &T) -> bool) -> Option<Hid> {
        self.iter().find(|(id, obj)| pred(*id, obj)).map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hid, &T)> + '_ {
        let group = self.group;
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            s.entry
                .as_ref()
                .map(|e| (Hid::new(group, s.generation, i as u32), &e.object))
        })
    }

    pub fn ids(&self) -> Vec<Hid> {
        self.iter().map(|(id, _)| id).collect()
    }
}
