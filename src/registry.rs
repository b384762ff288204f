//! The event registry (§4.1): three disjoint mappings, each behind its own lock, each
//! keyed by a stable identity. The distilled spec's source keys the per-instruction
//! mappings by the record's heap address; here we use a generational arena index
//! instead (§9's design note), so the token that travels to the host as opaque
//! user-data can never alias a record it no longer names.

use parking_lot::{Mutex, MutexGuard};

/// A token identifying one slot in an [`Arena`]. Opaque to callers; carries no
/// meaning beyond "the same record that was inserted, or nothing."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

struct ArenaInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

/// A generational arena behind a single lock. `insert` never fails (it grows the
/// backing `Vec`); `update_and_maybe_take` is the one primitive the assembly logic
/// needs: look at the record, decide if it is now complete, and if so remove and
/// return it, all under the same lock acquisition so a late-arriving callback for the
/// same token can never observe a half-removed record.
pub struct Arena<T> {
    inner: Mutex<ArenaInner<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena {
            inner: Mutex::new(ArenaInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, value: T) -> EventToken {
        let mut inner = self.inner.lock();
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.value = Some(value);
            EventToken {
                index,
                generation: slot.generation,
            }
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            EventToken {
                index,
                generation: 0,
            }
        }
    }

    /// Removes and returns the record unconditionally, if `token` still resolves to a
    /// live record. Used by teardown and by the rare "discard without submitting"
    /// paths (e.g. a stale syscall entry evicted by a fresh enter).
    pub fn remove(&self, token: EventToken) -> Option<T> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(token.index as usize)?;
        if slot.generation != token.generation {
            return None;
        }
        let value = slot.value.take();
        if value.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            inner.free.push(token.index);
        }
        value
    }

    /// Looks up `token`. If found, calls `f` with a mutable reference to the record.
    /// If `f` returns `true` ("this record is now complete"), the record is removed
    /// and returned. Otherwise the record stays in the arena and `None` is returned.
    /// A miss (unknown or already-removed token) is not an error: `f` is simply never
    /// called and `None` comes back, which is exactly the "already submitted or never
    /// existed" contract from §4.1.
    pub fn update_and_maybe_take(
        &self,
        token: EventToken,
        f: impl FnOnce(&mut T) -> bool,
    ) -> Option<T> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(token.index as usize)?;
        if slot.generation != token.generation {
            return None;
        }
        let value = slot.value.as_mut()?;
        if !f(value) {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(token.index);
        value
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.iter().filter(|s| s.value.is_some()).count()
    }
}

/// Per-vCPU storage for the syscall mapping (§4.1, §9): one slot per vCPU index,
/// indexed directly rather than hashed, since vCPU indices are small and dense.
pub struct PerVcpuSlots<T> {
    slots: Mutex<Vec<Option<T>>>,
}

impl<T> Default for PerVcpuSlots<T> {
    fn default() -> Self {
        PerVcpuSlots {
            slots: Mutex::new(Vec::new()),
        }
    }
}

impl<T> PerVcpuSlots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self, vcpu: u32) -> MutexGuard<'_, Vec<Option<T>>> {
        let mut guard = self.slots.lock();
        let needed = vcpu as usize + 1;
        if guard.len() < needed {
            guard.resize_with(needed, || None);
        }
        guard
    }

    /// Installs `value` for `vcpu`, evicting (and returning) any prior entry. This is
    /// invariant 6: at most one live entry per vCPU.
    pub fn replace(&self, vcpu: u32, value: T) -> Option<T> {
        let mut guard = self.locked(vcpu);
        guard[vcpu as usize].replace(value)
    }

    /// Removes whatever is installed for `vcpu` unconditionally, without running any
    /// predicate.
    pub fn take(&self, vcpu: u32) -> Option<T> {
        let mut guard = self.locked(vcpu);
        guard.get_mut(vcpu as usize).and_then(|slot| slot.take())
    }

    /// Destructively takes whatever is installed for `vcpu`, if anything, and
    /// classifies it against `matches`. A syscall-return callback always resolves the
    /// enter one way or another: either it matches (submit it) or it doesn't (discard
    /// it and log). There is no "leave it in place" outcome, unlike
    /// [`Arena::update_and_maybe_take`].
    pub fn take_matching(
        &self,
        vcpu: u32,
        matches: impl FnOnce(&T) -> bool,
    ) -> VcpuTakeOutcome<T> {
        match self.take(vcpu) {
            None => VcpuTakeOutcome::Empty,
            Some(value) => {
                if matches(&value) {
                    VcpuTakeOutcome::Matched(value)
                } else {
                    VcpuTakeOutcome::Mismatched(value)
                }
            }
        }
    }
}

/// Outcome of [`PerVcpuSlots::take_matching`].
pub enum VcpuTakeOutcome<T> {
    /// The installed record matched; the caller should finish assembling it and submit.
    Matched(T),
    /// A record was installed but did not match; it has already been removed.
    Mismatched(T),
    /// Nothing was installed for this vCPU.
    Empty,
}
