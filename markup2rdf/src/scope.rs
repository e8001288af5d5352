//! Pooled storage for lexical scopes.
//!
//! Scopes and namespace frames live in an [`Arena`] of reusable slots;
//! a released slot goes onto a free stack and is handed out again,
//! keeping whatever capacity its buffers had grown to.

/// State that can be cleared for reuse without giving up its allocations.
pub(crate) trait Recycle: Default {
    fn recycle(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(usize);

pub(crate) struct Arena<T> {
    slots: Vec<T>,
    free: Vec<SlotId>,
}

impl<T: Recycle> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> SlotId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(T::default());
                SlotId(self.slots.len() - 1)
            }
        }
    }

    pub fn release(&mut self, id: SlotId) {
        debug_assert!(!self.free.contains(&id), "slot released twice");
        self.slots[id.0].recycle();
        self.free.push(id);
    }

    pub fn get(&self, id: SlotId) -> &T {
        &self.slots[id.0]
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut T {
        &mut self.slots[id.0]
    }

    /// Number of slots currently handed out.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn pair_mut(&mut self, a: SlotId, b: SlotId) -> (&mut T, &mut T) {
        assert_ne!(a, b);
        if a.0 < b.0 {
            let (lo, hi) = self.slots.split_at_mut(b.0);
            (&mut lo[a.0], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(a.0);
            (&mut hi[0], &mut lo[b.0])
        }
    }
}

/// A stack of scopes over an [`Arena`]. The root scope is created with
/// the stack and is never popped; every other scope's parent is the
/// entry below it.
pub(crate) struct ScopeStack<T> {
    arena: Arena<T>,
    stack: Vec<SlotId>,
}

impl<T: Recycle> ScopeStack<T> {
    pub fn new(init_root: impl FnOnce(&mut T)) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc();
        init_root(arena.get_mut(root));
        Self {
            arena,
            stack: vec![root],
        }
    }

    /// Pushes a fresh scope and returns it for initialisation.
    pub fn push(&mut self) -> &mut T {
        let id = self.arena.alloc();
        self.stack.push(id);
        debug_assert_eq!(self.arena.live(), self.stack.len());
        self.arena.get_mut(id)
    }

    pub fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "the root scope cannot be popped");
        if self.stack.len() > 1 {
            if let Some(id) = self.stack.pop() {
                self.arena.release(id);
            }
        }
        debug_assert_eq!(self.arena.live(), self.stack.len());
    }

    /// Number of scopes on the stack, including the root.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> &T {
        self.at(self.stack.len() - 1)
    }

    pub fn top_mut(&mut self) -> &mut T {
        self.at_mut(self.stack.len() - 1)
    }

    pub fn parent(&self) -> Option<&T> {
        let depth = self.stack.len().checked_sub(2)?;
        Some(self.at(depth))
    }

    /// The scope at `depth`, counting the root as 0.
    pub fn at(&self, depth: usize) -> &T {
        self.arena.get(self.stack[depth])
    }

    pub fn at_mut(&mut self, depth: usize) -> &mut T {
        self.arena.get_mut(self.stack[depth])
    }

    /// The innermost scope and its parent, both mutably.
    pub fn top_and_parent_mut(&mut self) -> Option<(&mut T, &mut T)> {
        let (inner, outer) = match self.stack.as_slice() {
            [.., outer, inner] => (*inner, *outer),
            _ => return None,
        };
        Some(self.arena.pair_mut(inner, outer))
    }

    /// Scopes from the innermost outwards.
    pub fn ancestors(&self) -> impl Iterator<Item = &T> {
        self.stack.iter().rev().map(|id| self.arena.get(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u32,
        buffer: Vec<u32>,
    }

    impl Recycle for Counter {
        fn recycle(&mut self) {
            self.value = 0;
            self.buffer.clear();
        }
    }

    #[test]
    fn released_slots_are_reused_and_cleared() {
        let mut arena = Arena::<Counter>::new();
        let a = arena.alloc();
        arena.get_mut(a).value = 7;
        arena.get_mut(a).buffer.extend([1, 2, 3]);
        arena.release(a);

        let b = arena.alloc();
        assert_eq!(a, b);
        assert_eq!(arena.get(b).value, 0);
        assert!(arena.get(b).buffer.is_empty());
        assert!(arena.get(b).buffer.capacity() >= 3);
        assert_eq!(arena.live(), 1);
    }

    #[test]
    fn stack_tracks_parents() {
        let mut stack = ScopeStack::<Counter>::new(|root| root.value = 1);
        stack.push().value = 2;
        stack.push().value = 3;
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.parent().map(|p| p.value), Some(2));
        assert_eq!(
            stack.ancestors().map(|c| c.value).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );

        let (inner, outer) = stack.top_and_parent_mut().unwrap();
        inner.value += 10;
        outer.value += 20;
        assert_eq!(stack.top().value, 13);
        assert_eq!(stack.at(1).value, 22);

        stack.pop();
        stack.pop();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top().value, 1);
        assert!(stack.top_and_parent_mut().is_none());
    }

    #[test]
    fn popped_scope_slot_is_recycled_for_next_push() {
        let mut stack = ScopeStack::<Counter>::new(|_| ());
        stack.push().buffer.push(5);
        stack.pop();
        let reused = stack.push();
        assert!(reused.buffer.is_empty());
        assert_eq!(reused.value, 0);
    }
}
