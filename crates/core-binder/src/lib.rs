//! Binder (multi-group key-chord trie) and bind resolver (byte-stream →
//! binding events).
//!
//! Node storage is a fixed-capacity, append-only `Vec<Node>` with index
//! links instead of the original's pointer-chased nodes, so indices stay
//! stable across insertion and the whole trie is one contiguous
//! allocation (spec §9 Design Notes: "Trie storage").

pub mod chord;

use tracing::{debug, trace};

/// Sentinel index meaning "absent", index 0 is never a real node.
const NONE: u32 = 0;

/// Longest active (unclaimed) chord the resolver will buffer before giving
/// up and discarding it as an input-overflow condition (spec §7).
const MAX_CHORD_LEN: usize = 64;

pub const DEFAULT_GROUP: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub key: u8,
    pub id: u8,
    pub module: u8,
    pub depth: u8,
    pub child: u32,
    pub next: u32,
    pub is_group: bool,
    pub bound: bool,
}

impl Node {
    fn sentinel() -> Self {
        Self {
            key: 0,
            id: 0,
            module: 0,
            depth: 0,
            child: NONE,
            next: NONE,
            is_group: false,
            bound: false,
        }
    }

    fn group_root(depth_zero: bool) -> Self {
        let mut n = Self::sentinel();
        n.is_group = true;
        if depth_zero {
            n.depth = 0;
        }
        n
    }
}

/// Multi-group prefix trie mapping chord byte sequences to `(module, id)`.
pub struct Binder {
    nodes: Vec<Node>,
    group_roots: Vec<u32>,
    group_names: Vec<String>,
    capacity: usize,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl Binder {
    pub fn new(capacity: usize) -> Self {
        let mut b = Self {
            nodes: vec![Node::sentinel()],
            group_roots: Vec::new(),
            group_names: Vec::new(),
            capacity,
        };
        let default_root = b.create_group("default");
        debug_assert_eq!(default_root, DEFAULT_GROUP);
        b
    }

    /// Creates a new bind group (an alternate trie root), returning its id,
    /// or `0` if node capacity is exhausted.
    pub fn create_group(&mut self, name: &str) -> u8 {
        if self.group_roots.len() >= u8::MAX as usize || self.nodes.len() >= self.capacity {
            return 0;
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(Node::group_root(true));
        self.group_roots.push(idx);
        self.group_names.push(name.to_string());
        self.group_roots.len() as u8
    }

    pub fn get_group(&self, name: &str) -> Option<u8> {
        self.group_names
            .iter()
            .position(|n| n == name)
            .map(|i| (i + 1) as u8)
    }

    fn group_root_index(&self, group: u8) -> Option<u32> {
        if group == 0 {
            return None;
        }
        self.group_roots.get(group as usize - 1).copied()
    }

    /// Inserts `chord` (parsed per [`chord::parse`]) into `group`, bound to
    /// `(module, id)`. Returns `false` on an unparsable chord, a duplicate
    /// exact binding, or node-capacity exhaustion, never panics and never
    /// propagates an error past this boundary (spec §7).
    pub fn bind(&mut self, group: u8, chord_text: &str, id: u8, module: u8) -> bool {
        let bytes = match chord::parse(chord_text) {
            Ok(b) => b,
            Err(e) => {
                debug!(target: "binder", chord = chord_text, error = %e, "malformed_chord");
                return false;
            }
        };
        let Some(root) = self.group_root_index(group) else {
            return false;
        };

        let mut cur = root;
        for (i, &b) in bytes.iter().enumerate() {
            cur = match self.find_exact_child(cur, b) {
                Some(existing) => existing,
                None => {
                    if self.nodes.len() >= self.capacity {
                        debug!(target: "binder", "capacity_exhausted");
                        return false;
                    }
                    let idx = self.nodes.len() as u32;
                    self.nodes.push(Node {
                        key: b,
                        depth: (i + 1) as u8,
                        ..Node::sentinel()
                    });
                    self.link_child(cur, idx);
                    idx
                }
            };
        }

        if self.nodes[cur as usize].bound {
            debug!(target: "binder", chord = chord_text, "duplicate_exact_binding");
            return false;
        }
        let node = &mut self.nodes[cur as usize];
        node.bound = true;
        node.id = id;
        node.module = module;
        true
    }

    /// Binds a wildcard: matches any byte not otherwise claimed at the
    /// group root. A node with `key == 0` is the resolver's wildcard
    /// sentinel (spec §4.2 "Ordering guarantee").
    pub fn bind_wildcard(&mut self, group: u8, id: u8, module: u8) -> bool {
        let Some(root) = self.group_root_index(group) else {
            return false;
        };
        if let Some(existing) = self.find_exact_child(root, 0) {
            if self.nodes[existing as usize].bound {
                return false;
            }
            let node = &mut self.nodes[existing as usize];
            node.bound = true;
            node.id = id;
            node.module = module;
            return true;
        }
        if self.nodes.len() >= self.capacity {
            return false;
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            key: 0,
            id,
            module,
            depth: 1,
            bound: true,
            ..Node::sentinel()
        });
        self.link_child(root, idx);
        true
    }

    fn link_child(&mut self, parent: u32, child: u32) {
        if self.nodes[parent as usize].child == NONE {
            self.nodes[parent as usize].child = child;
            return;
        }
        let mut cur = self.nodes[parent as usize].child;
        loop {
            let next = self.nodes[cur as usize].next;
            if next == NONE {
                self.nodes[cur as usize].next = child;
                return;
            }
            cur = next;
        }
    }

    fn find_exact_child(&self, parent: u32, byte: u8) -> Option<u32> {
        let mut cur = self.nodes[parent as usize].child;
        while cur != NONE {
            if self.nodes[cur as usize].key == byte {
                return Some(cur);
            }
            cur = self.nodes[cur as usize].next;
        }
        None
    }

    /// Finds the best child of `parent` for `byte`: an exact literal match
    /// if one exists, else a wildcard (`key == 0`) edge, else `None`.
    pub fn find_child(&self, parent: u32, byte: u8) -> Option<u32> {
        let mut cur = self.nodes[parent as usize].child;
        let mut wildcard = None;
        while cur != NONE {
            let n = &self.nodes[cur as usize];
            if n.key == byte {
                return Some(cur);
            }
            if n.key == 0 {
                wildcard.get_or_insert(cur);
            }
            cur = n.next;
        }
        wildcard
    }

    pub fn get_node(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn get_module(&self, idx: u32) -> u8 {
        self.nodes[idx as usize].module
    }

    pub fn default_group(&self) -> u8 {
        DEFAULT_GROUP
    }

    fn root_for(&self, group: u8) -> u32 {
        self.group_root_index(group).unwrap_or(NONE)
    }
}

/// A resolved chord: which module owns it, the bound id, and the exact
/// bytes consumed since the last [`BindResolver::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub module: u8,
    pub id: u8,
    pub chord: Vec<u8>,
}

/// Streams bytes into a [`Binder`]'s trie, emitting bindings with
/// greedy-longest-match semantics.
pub struct BindResolver<'b> {
    binder: &'b Binder,
    keys: Vec<u8>,
    tail: usize,
    node_index: u32,
    emit_cursor: Option<u32>,
    group: u8,
    pending_input: bool,
}

impl<'b> BindResolver<'b> {
    pub fn new(binder: &'b Binder) -> Self {
        let group = binder.default_group();
        let node_index = binder.root_for(group);
        Self {
            binder,
            keys: Vec::new(),
            tail: 0,
            node_index,
            emit_cursor: None,
            group,
            pending_input: false,
        }
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn pending_input(&self) -> bool {
        self.pending_input
    }

    pub fn take_pending_input(&mut self) -> bool {
        std::mem::take(&mut self.pending_input)
    }

    /// Appends `byte` and descends the trie. Returns `true` when the
    /// resolver should be drained via [`Self::next`] now, either the
    /// descended node is a dead end (no further children possible) or the
    /// chord buffer is full.
    pub fn step(&mut self, byte: u8) -> bool {
        if self.keys.len() - self.tail >= MAX_CHORD_LEN {
            debug!(target: "binder.resolver", "chord_buffer_overflow");
            self.reset();
            return true;
        }
        self.keys.push(byte);
        match self.binder.find_child(self.node_index, byte) {
            Some(next) => {
                self.node_index = next;
                let node = self.binder.get_node(next);
                trace!(target: "binder.resolver", byte, node = next, bound = node.bound, "advance");
                node.child == NONE || self.keys.len() - self.tail >= MAX_CHORD_LEN
            }
            None => {
                trace!(target: "binder.resolver", byte, "dead_end");
                true
            }
        }
    }

    /// Yields the next binding matching the bytes consumed so far,
    /// continuing from where the previous call to `next` left off. Returns
    /// `None` once the current node's sibling chain is exhausted.
    pub fn next(&mut self) -> Option<Binding> {
        let mut cur = self.emit_cursor.unwrap_or(self.node_index);
        loop {
            if cur == NONE {
                self.emit_cursor = Some(NONE);
                return None;
            }
            let node = *self.binder.get_node(cur);
            let consumed = node.depth as usize;
            let byte_ok = self.tail + consumed <= self.keys.len()
                && (node.key == 0 || node.key == self.keys[self.tail + consumed - 1]);
            let sibling = node.next;
            if node.bound && byte_ok {
                let chord = self.keys[self.tail..self.tail + consumed].to_vec();
                self.emit_cursor = Some(sibling);
                return Some(Binding {
                    module: node.module,
                    id: node.id,
                    chord,
                });
            }
            cur = sibling;
        }
    }

    /// Consumes `binding`'s bytes from the buffer, resets descent to the
    /// current group's root, and marks that any unconsumed suffix must be
    /// re-fed before reading more terminal bytes.
    pub fn claim(&mut self, binding: &Binding) {
        self.tail += binding.chord.len();
        self.node_index = self.binder.root_for(self.group);
        self.emit_cursor = None;
        self.pending_input = self.tail < self.keys.len();
        if self.tail == self.keys.len() {
            self.keys.clear();
            self.tail = 0;
        }
    }

    /// Switches the active bind group, returning the previous one. Used
    /// to implement modal prompts (query/pager bind groups). Fails if `g`
    /// does not name an existing group root.
    pub fn set_group(&mut self, g: u8) -> Option<u8> {
        let root = self.binder.group_root_index(g)?;
        let prev = self.group;
        self.group = g;
        self.node_index = root;
        self.emit_cursor = None;
        self.pending_input = self.tail < self.keys.len();
        Some(prev)
    }

    /// Resets all resolver state except the active group, discarding the
    /// current (unresolvable or overflowed) chord.
    pub fn reset(&mut self) {
        self.keys.clear();
        self.tail = 0;
        self.node_index = self.binder.root_for(self.group);
        self.emit_cursor = None;
        self.pending_input = false;
    }

    /// Remaining unconsumed bytes, for the editor to re-feed after a claim
    /// that left a suffix pending.
    pub fn pending_bytes(&self) -> &[u8] {
        &self.keys[self.tail..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(resolver: &mut BindResolver<'_>, bytes: &[u8]) -> Vec<Binding> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let resolve = resolver.step(bytes[i]);
            i += 1;
            if resolve {
                while let Some(b) = resolver.next() {
                    resolver.claim(&b);
                    out.push(b);
                }
            }
        }
        out
    }

    #[test]
    fn exact_chord_round_trip_yields_bound_id_first() {
        let mut binder = Binder::default();
        assert!(binder.bind(DEFAULT_GROUP, "^C", 1, 0));
        assert!(binder.bind(DEFAULT_GROUP, "\\t", 2, 0));
        let mut resolver = BindResolver::new(&binder);
        let bindings = feed_all(&mut resolver, &[0x03]);
        assert_eq!(bindings.first().unwrap().id, 1);
        assert_eq!(bindings.first().unwrap().chord, vec![0x03]);
    }

    #[test]
    fn binding_chord_equals_bytes_consumed_since_last_claim() {
        let mut binder = Binder::default();
        binder.bind(DEFAULT_GROUP, "ab", 7, 0);
        let mut resolver = BindResolver::new(&binder);
        resolver.step(b'a');
        let resolve = resolver.step(b'b');
        assert!(resolve);
        let binding = resolver.next().unwrap();
        assert_eq!(binding.chord, vec![b'a', b'b']);
        resolver.claim(&binding);
    }

    #[test]
    fn duplicate_exact_binding_rejected() {
        let mut binder = Binder::default();
        assert!(binder.bind(DEFAULT_GROUP, "x", 1, 0));
        assert!(!binder.bind(DEFAULT_GROUP, "x", 2, 0));
    }

    #[test]
    fn shared_prefix_allows_shadowing_longer_chord() {
        let mut binder = Binder::default();
        assert!(binder.bind(DEFAULT_GROUP, "a", 1, 0));
        assert!(binder.bind(DEFAULT_GROUP, "ab", 2, 0));
        let mut resolver = BindResolver::new(&binder);
        let bindings = feed_all(&mut resolver, b"ab");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].id, 2);
        assert_eq!(bindings[0].chord, b"ab".to_vec());
    }

    #[test]
    fn unmatched_byte_falls_through_with_no_binding() {
        let mut binder = Binder::default();
        binder.bind(DEFAULT_GROUP, "x", 1, 0);
        let mut resolver = BindResolver::new(&binder);
        let bindings = feed_all(&mut resolver, b"z");
        assert!(bindings.is_empty());
    }

    #[test]
    fn wildcard_matches_unbound_byte() {
        let mut binder = Binder::default();
        binder.bind(DEFAULT_GROUP, "x", 1, 0);
        binder.bind_wildcard(DEFAULT_GROUP, 99, 0);
        let mut resolver = BindResolver::new(&binder);
        let bindings = feed_all(&mut resolver, b"q");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].id, 99);
    }

    #[test]
    fn group_switch_resolves_against_alternate_subtree() {
        let mut binder = Binder::default();
        let prompt = binder.create_group("prompt");
        binder.bind(DEFAULT_GROUP, "y", 1, 0);
        binder.bind(prompt, "y", 2, 0);
        let mut resolver = BindResolver::new(&binder);
        let prev = resolver.set_group(prompt).unwrap();
        assert_eq!(prev, DEFAULT_GROUP);
        let bindings = feed_all(&mut resolver, b"y");
        assert_eq!(bindings[0].id, 2);
    }

    #[test]
    fn empty_chord_is_rejected_by_bind() {
        let mut binder = Binder::default();
        assert!(!binder.bind(DEFAULT_GROUP, "", 1, 0));
    }

    #[test]
    fn capacity_exhaustion_returns_false() {
        let mut binder = Binder::new(3); // sentinel + default group root leaves 1 slot
        assert!(binder.bind(DEFAULT_GROUP, "a", 1, 0));
        assert!(!binder.bind(DEFAULT_GROUP, "b", 2, 0));
    }

    #[test]
    fn pending_suffix_is_replayed_after_claim() {
        let mut binder = Binder::default();
        binder.bind(DEFAULT_GROUP, "a", 1, 0);
        binder.bind(DEFAULT_GROUP, "ab", 2, 0);
        let mut resolver = BindResolver::new(&binder);
        assert!(!resolver.step(b'a')); // 'a' is bound but "ab" still reachable
        assert!(resolver.step(b'c')); // 'c' is a dead end under the 'a' node
        let binding = resolver.next().expect("shorter chord 'a' still bound");
        assert_eq!(binding.id, 1);
        resolver.claim(&binding);
        assert!(resolver.pending_input());
        assert_eq!(resolver.pending_bytes(), b"c");
    }
}
