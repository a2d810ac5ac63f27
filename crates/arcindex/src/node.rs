//! Slab-backed doubly linked list shared by the clock cache and the recency tracker.
//!
//! Nodes live in a `Vec` of slots addressed by index; freed slots are
//! recycled through a free list. Every slot carries a generation that is
//! bumped when its node is freed, so a `(slot, generation)` pair names one
//! node for its whole lifetime even after the slot is reused.

/// Element of the ordering.
///
/// `S` is the stored key: the key itself in strong mode, a non-owning
/// [`WeakKey`](crate::reclaim::WeakKey) in weak mode. `P` is the payload:
/// the cached value, or `()` when only keys are tracked.
#[derive(Debug)]
pub(crate) struct Node<S, P> {
    pub(crate) key: S,
    pub(crate) payload: P,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<S, P> {
    generation: u64,
    node: Option<Node<S, P>>,
}

/// Doubly linked list from `head` to `tail`
#[derive(Debug)]
pub(crate) struct NodeList<S, P> {
    slots: Vec<Slot<S, P>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    len: usize,
}

impl<S, P> NodeList<S, P> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    pub(crate) fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&Node<S, P>> {
        self.slots.get(idx)?.node.as_ref()
    }

    /// Generation of the node currently occupying `idx`
    pub(crate) fn generation(&self, idx: usize) -> u64 {
        self.slots.get(idx).map_or(0, |slot| slot.generation)
    }

    /// Whether `(idx, generation)` still names a linked node
    pub(crate) fn is_current(&self, idx: usize, generation: u64) -> bool {
        self.slots
            .get(idx)
            .is_some_and(|slot| slot.generation == generation && slot.node.is_some())
    }

    pub(crate) fn next_of(&self, idx: usize) -> Option<usize> {
        self.get(idx)?.next
    }

    /// Link a new node at the head
    pub(crate) fn push_front(&mut self, key: S, payload: P) -> usize {
        let idx = self.alloc(key, payload, None, self.head);
        match self.head {
            Some(head_idx) => self.set_prev(head_idx, Some(idx)),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        idx
    }

    /// Link a new node at the tail
    pub(crate) fn push_back(&mut self, key: S, payload: P) -> usize {
        let idx = self.alloc(key, payload, self.tail, None);
        match self.tail {
            Some(tail_idx) => self.set_next(tail_idx, Some(idx)),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        idx
    }

    /// Link a new node immediately before the linked node `at`
    pub(crate) fn insert_before(&mut self, at: usize, key: S, payload: P) -> usize {
        let prev = match self.get(at) {
            Some(node) => node.prev,
            None => return self.push_back(key, payload),
        };
        let idx = self.alloc(key, payload, prev, Some(at));
        self.set_prev(at, Some(idx));
        match prev {
            Some(prev_idx) => self.set_next(prev_idx, Some(idx)),
            None => self.head = Some(idx),
        }
        idx
    }

    pub(crate) fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) || self.get(idx).is_none() {
            return;
        }

        self.unlink(idx);

        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head_idx) => self.set_prev(head_idx, Some(idx)),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    /// Unlink and free the node at `idx`
    pub(crate) fn remove(&mut self, idx: usize) -> Option<Node<S, P>> {
        self.get(idx)?;
        self.unlink(idx);
        let slot = &mut self.slots[idx];
        let node = slot.node.take()?;
        slot.generation += 1;
        self.free_list.push(idx);
        self.len -= 1;
        Some(node)
    }

    /// Free every node, returning `(slot, generation, node)` in list order.
    ///
    /// Slots are retired rather than dropped so that outstanding
    /// `(slot, generation)` pairs stay unambiguous.
    pub(crate) fn drain(&mut self) -> Vec<(usize, u64, Node<S, P>)> {
        let mut nodes = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let slot = &mut self.slots[idx];
            let Some(node) = slot.node.take() else {
                break;
            };
            let generation = slot.generation;
            slot.generation += 1;
            self.free_list.push(idx);
            cursor = node.next;
            nodes.push((idx, generation, node));
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
        nodes
    }

    /// Indices and nodes from head to tail
    pub(crate) fn iter(&self) -> Iter<'_, S, P> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn alloc(&mut self, key: S, payload: P, prev: Option<usize>, next: Option<usize>) -> usize {
        let node = Node {
            key,
            payload,
            prev,
            next,
        };
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx].node = Some(node);
            idx
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        }
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<S, P>> {
        self.slots.get_mut(idx)?.node.as_mut()
    }

    fn set_prev(&mut self, idx: usize, prev: Option<usize>) {
        if let Some(node) = self.node_mut(idx) {
            node.prev = prev;
        }
    }

    fn set_next(&mut self, idx: usize, next: Option<usize>) {
        if let Some(node) = self.node_mut(idx) {
            node.next = next;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.get(idx) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => self.set_next(prev_idx, next),
            None => self.head = next,
        }

        match next {
            Some(next_idx) => self.set_prev(next_idx, prev),
            None => self.tail = prev,
        }
    }
}

pub(crate) struct Iter<'a, S, P> {
    list: &'a NodeList<S, P>,
    cursor: Option<usize>,
}

impl<'a, S, P> Iterator for Iter<'a, S, P> {
    type Item = (usize, &'a Node<S, P>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.list.get(idx)?;
        self.cursor = node.next;
        Some((idx, node))
    }
}
