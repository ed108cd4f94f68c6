//! # Rowantree: An Ordered Map and Set on an Arena-Allocated Red-Black Tree
//!
//! This crate provides a comparator-driven ordered associative container:
//! a self-balancing binary search tree with red/black rebalancing, exposed
//! through map- and set-style facades.
//!
//! ## Design Overview
//!
//! The tree owns all of its nodes in a single arena (a `Vec` of node
//! slots), and every parent/left/right relation is a [`NodeId`] index into
//! that arena. Slot 0 is reserved for the **sentinel**: one always-black
//! node per tree that simultaneously serves as
//!
//! - the unique "end" position of forward and backward traversal,
//! - the stand-in parent of the root, so rotation code near the root needs
//!   no special cases, and
//! - the "not found" result of lookups (absence is "found the sentinel",
//!   never a null).
//!
//! While the tree is non-empty the sentinel's left and right links mirror
//! the root, which is what makes stepping backwards from the end position
//! land on the largest element. While the tree is empty they point back at
//! the sentinel itself.
//!
//! ### Tree Structure
//!
//! ```text
//!                ┌──────────────┐
//!                │   Sentinel   │  <- slot 0: black, no payload
//!                │ left ─┐ right│     parent of the root, end position
//!                └───────┼──────┘
//!                        ▼
//!                ┌──────────────┐
//!                │  Root (B)    │  <- every node: color + payload +
//!                └──┬────────┬──┘     parent/left/right NodeIds
//!                   ▼        ▼
//!             ┌────────┐ ┌────────┐
//!             │  (R)   │ │  (R)   │
//!             └─┬────┬─┘ └─┬────┬─┘
//!               ▼    ▼     ▼    ▼
//!              ...  ...   ...  ...        <- absent children are slot 0
//! ```
//!
//! The classic red-black invariants hold after every public mutation:
//! the sentinel (and root) are black, no red node touches a red node, and
//! every root-to-leaf path carries the same number of black nodes, keeping
//! the height at most `2 * log2(n + 1)`.
//!
//! ### Identity-Preserving Deletion
//!
//! Removing a node with two children does **not** copy the successor's
//! payload into the removed slot. Instead the two nodes exchange their
//! complete link structure (parent, children, color), so the successor
//! keeps its identity and every [`NodeId`] handle to an untouched element
//! stays valid across the removal. Only handles to the erased node itself
//! are invalidated.
//!
//! ## Basic Usage
//!
//! Most users want the facades:
//!
//! ```
//! use rowantree::{TreeMap, TreeSet};
//!
//! let mut map: TreeMap<&str, i32> = TreeMap::new();
//! map.insert("cherry", 3);
//! map.insert("apple", 1);
//! map.insert("banana", 2);
//!
//! // Iteration is ordered by key.
//! let keys: Vec<&str> = map.keys().copied().collect();
//! assert_eq!(keys, ["apple", "banana", "cherry"]);
//!
//! let mut set: TreeSet<i32> = TreeSet::new();
//! set.insert(3);
//! set.insert(1);
//! assert!(set.contains(&1));
//! assert!(!set.contains(&2));
//! ```
//!
//! The engine itself ([`RbTree`]) is public for callers that want to hold
//! node handles directly:
//!
//! ```
//! use rowantree::RbTree;
//!
//! let mut tree: RbTree<i32> = RbTree::new();
//! let ten = tree.insert(10).unwrap();
//! tree.insert(20).unwrap();
//!
//! assert_eq!(tree.get(ten), Some(&10));
//! assert_eq!(tree.find(&20), tree.successor(ten));
//! assert_eq!(tree.find(&30), tree.end()); // absent: the sentinel handle
//! ```
//!
//! ## Thread Safety
//!
//! The tree is an exclusively-owned resource: every mutation takes
//! `&mut self` and runs to completion, so the borrow checker enforces the
//! single-writer discipline. `RbTree`, [`TreeMap`] and [`TreeSet`] are
//! `Send`/`Sync` exactly when their contents are; wrap them in a lock for
//! shared mutation.

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use smallvec::SmallVec;

pub mod error;
pub mod iter;
pub mod map;
pub mod order;
pub mod set;

pub use error::{Error, Result};
pub use iter::{Entries, EntriesRange, IntoEntries, RawCursor};
pub use map::TreeMap;
pub use order::{Comparator, NaturalOrder, Reverse};
pub use set::TreeSet;

// ---------------------------------------------------------------------------
// Node Identifiers
// ---------------------------------------------------------------------------

/// A handle to a node owned by an [`RbTree`].
///
/// Node ids are indices into the tree's arena. They are stable for the
/// lifetime of the element they were returned for: rebalancing rotations
/// and removals of *other* elements never move a payload between slots.
/// Removing the element itself frees its slot, and a later insertion may
/// reuse the id, so a handle must not be used after its element was erased.
///
/// A `NodeId` is only meaningful for the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// The reserved arena slot for the sentinel. Doubles as the "null" child
/// link and the end-of-traversal position.
pub(crate) const SENTINEL: NodeId = NodeId(0);

impl NodeId {
	#[inline]
	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}
}

// ---------------------------------------------------------------------------
// Node Representation
// ---------------------------------------------------------------------------

/// Node color for red-black balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
	Red,
	Black,
}

/// Which child slot of a parent a node occupies. Keeping the rebalancing
/// code generic over the side halves the number of mirrored cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
	Left,
	Right,
}

impl Side {
	#[inline]
	fn opposite(self) -> Side {
		match self {
			Side::Left => Side::Right,
			Side::Right => Side::Left,
		}
	}
}

/// A single arena slot.
///
/// `entry` is `None` only for the sentinel and for freed slots; every node
/// reachable from the root carries a payload.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
	pub(crate) color: Color,
	pub(crate) parent: NodeId,
	pub(crate) left: NodeId,
	pub(crate) right: NodeId,
	pub(crate) entry: Option<T>,
}

impl<T> Node<T> {
	/// The slot-0 boundary node: black, payload-free, self-linked.
	fn sentinel() -> Node<T> {
		Node {
			color: Color::Black,
			parent: SENTINEL,
			left: SENTINEL,
			right: SENTINEL,
			entry: None,
		}
	}
}

// ---------------------------------------------------------------------------
// Core Tree Structure
// ---------------------------------------------------------------------------

/// A red-black tree storing payloads of type `T`, ordered by a
/// [`Comparator`] supplied at construction.
///
/// This is the engine underneath [`TreeMap`] and [`TreeSet`]. It exposes
/// node handles ([`NodeId`]) rather than key/value views, and it does
/// **not** reject duplicates: a payload equivalent to a stored one is
/// placed to its right by the same comparator rule as any other. Callers
/// that need unique keys check with [`find`](RbTree::find) first, which is
/// exactly what the facades do.
///
/// # Type Parameters
///
/// - `T`: The payload type.
/// - `C`: The comparator. Defaults to [`NaturalOrder`], the payload's own
///   `Ord` ordering.
#[derive(Clone)]
pub struct RbTree<T, C = NaturalOrder> {
	/// All node slots; slot 0 is the sentinel.
	arena: Vec<Node<T>>,
	/// Freed slots awaiting reuse. Stays inline for the small churn the
	/// common workloads produce.
	free: SmallVec<[NodeId; 8]>,
	/// The root node, or the sentinel while the tree is empty.
	root: NodeId,
	/// Number of stored elements.
	len: usize,
	/// The strict-weak-ordering predicate driving every placement.
	comparator: C,
}

impl<T, C: Comparator<T> + Default> RbTree<T, C> {
	/// Creates an empty tree with a default-constructed comparator.
	///
	/// # Example
	///
	/// ```
	/// use rowantree::RbTree;
	///
	/// let tree: RbTree<i32> = RbTree::new();
	/// assert!(tree.is_empty());
	/// ```
	pub fn new() -> Self {
		Self::with_comparator(C::default())
	}
}

impl<T, C: Comparator<T> + Default> Default for RbTree<T, C> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T, C> RbTree<T, C> {
	// -----------------------------------------------------------------------
	// Construction
	// -----------------------------------------------------------------------

	/// Creates an empty tree ordered by `comparator`.
	///
	/// The sentinel slot is allocated immediately, so this constructor does
	/// allocate memory. The comparator is fixed for the tree's lifetime;
	/// see the [`order`] module for the contract it must satisfy.
	pub fn with_comparator(comparator: C) -> Self {
		RbTree {
			arena: vec![Node::sentinel()],
			free: SmallVec::new(),
			root: SENTINEL,
			len: 0,
			comparator,
		}
	}

	/// Returns a reference to the tree's comparator.
	pub fn comparator(&self) -> &C {
		&self.comparator
	}

	// -----------------------------------------------------------------------
	// Size Operations
	// -----------------------------------------------------------------------

	/// Returns the number of stored elements.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns `true` if the tree contains no elements.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Returns the largest number of elements this tree can hold.
	///
	/// The bound is derived from the maximum arena size addressable for
	/// this node layout. Insertions beyond it fail with
	/// [`Error::CapacityExceeded`] rather than aborting.
	pub fn max_len(&self) -> usize {
		Self::slot_limit() - 1
	}

	/// Upper bound on arena slots, including the sentinel slot.
	fn slot_limit() -> usize {
		let node_size = mem::size_of::<Node<T>>().max(1);
		(isize::MAX as usize / node_size).min(u32::MAX as usize)
	}

	// -----------------------------------------------------------------------
	// Arena Access Helpers
	// -----------------------------------------------------------------------

	#[inline]
	fn node(&self, id: NodeId) -> &Node<T> {
		&self.arena[id.index()]
	}

	#[inline]
	fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
		&mut self.arena[id.index()]
	}

	#[inline]
	fn parent(&self, id: NodeId) -> NodeId {
		self.node(id).parent
	}

	#[inline]
	fn child(&self, id: NodeId, side: Side) -> NodeId {
		match side {
			Side::Left => self.node(id).left,
			Side::Right => self.node(id).right,
		}
	}

	#[inline]
	fn set_child(&mut self, id: NodeId, side: Side, child: NodeId) {
		match side {
			Side::Left => self.node_mut(id).left = child,
			Side::Right => self.node_mut(id).right = child,
		}
	}

	#[inline]
	fn is_red(&self, id: NodeId) -> bool {
		self.node(id).color == Color::Red
	}

	#[inline]
	fn is_black(&self, id: NodeId) -> bool {
		self.node(id).color == Color::Black
	}

	/// Which side of its parent `id` hangs from. Only meaningful for nodes
	/// with a real parent.
	#[inline]
	fn side_of(&self, id: NodeId) -> Side {
		if self.node(self.parent(id)).left == id {
			Side::Left
		} else {
			Side::Right
		}
	}

	/// The payload of a reachable node.
	fn payload(&self, id: NodeId) -> &T {
		match self.node(id).entry {
			Some(ref entry) => entry,
			None => unreachable!("payload read from the sentinel or a vacant slot"),
		}
	}

	/// Installs `id` as the root and keeps the sentinel's links mirrored to
	/// it. Passing the sentinel empties the mirror, which is the encoding
	/// for an empty tree.
	fn set_root(&mut self, id: NodeId) {
		self.root = id;
		let sentinel = self.node_mut(SENTINEL);
		sentinel.left = id;
		sentinel.right = id;
	}

	// -----------------------------------------------------------------------
	// Element Access
	// -----------------------------------------------------------------------

	/// Returns the payload behind `id`, or `None` for the end sentinel and
	/// for slots whose element has been removed.
	///
	/// # Example
	///
	/// ```
	/// use rowantree::RbTree;
	///
	/// let mut tree: RbTree<i32> = RbTree::new();
	/// let id = tree.insert(7).unwrap();
	///
	/// assert_eq!(tree.get(id), Some(&7));
	/// assert_eq!(tree.get(tree.end()), None);
	/// ```
	pub fn get(&self, id: NodeId) -> Option<&T> {
		self.arena.get(id.index()).and_then(|node| node.entry.as_ref())
	}

	/// Mutable access to the payload behind `id`.
	///
	/// Mutating a payload in a way that changes its position under the
	/// comparator leaves the tree mis-ordered; the facades only ever hand
	/// out the non-ordering part (a map's value).
	pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
		self.arena.get_mut(id.index()).and_then(|node| node.entry.as_mut())
	}

	// -----------------------------------------------------------------------
	// Boundary Positions
	// -----------------------------------------------------------------------

	/// The end position: the sentinel handle.
	///
	/// Returned by lookups for absent keys, by [`successor`](Self::successor)
	/// past the last element and by [`predecessor`](Self::predecessor)
	/// before the first.
	#[inline]
	pub fn end(&self) -> NodeId {
		SENTINEL
	}

	/// The smallest element, or the sentinel if the tree is empty.
	pub fn first(&self) -> NodeId {
		if self.root == SENTINEL {
			SENTINEL
		} else {
			iter::leftmost_in(&self.arena, self.root)
		}
	}

	/// The largest element, or the sentinel if the tree is empty.
	pub fn last(&self) -> NodeId {
		if self.root == SENTINEL {
			SENTINEL
		} else {
			iter::rightmost_in(&self.arena, self.root)
		}
	}

	/// The in-order successor of `id`; the sentinel past the last element.
	///
	/// Stepping from the sentinel wraps to the first element (the sentinel
	/// mirrors the root on both links), matching the end-position
	/// conventions of the traversal protocol.
	pub fn successor(&self, id: NodeId) -> NodeId {
		iter::successor_in(&self.arena, id)
	}

	/// The in-order predecessor of `id`; the sentinel before the first
	/// element. Stepping back from the sentinel yields the last element.
	pub fn predecessor(&self, id: NodeId) -> NodeId {
		iter::predecessor_in(&self.arena, id)
	}

	// -----------------------------------------------------------------------
	// Search
	// -----------------------------------------------------------------------

	/// Finds a node for which `probe` answers `Equal`.
	///
	/// `probe` is called with stored payloads and reports how each payload
	/// orders relative to the search target (`Less` when the payload sorts
	/// before the target). It must be consistent with the comparator the
	/// tree was built with; the facades derive it from the key part of an
	/// entry, which is how borrowed-key lookups work.
	pub fn find_with<F>(&self, mut probe: F) -> NodeId
	where
		F: FnMut(&T) -> Ordering,
	{
		let mut cursor = self.root;
		while cursor != SENTINEL {
			cursor = match probe(self.payload(cursor)) {
				Ordering::Less => self.node(cursor).right,
				Ordering::Greater => self.node(cursor).left,
				Ordering::Equal => return cursor,
			};
		}
		SENTINEL
	}

	/// The first node for which `probe` answers `Equal` or `Greater`.
	pub fn lower_bound_with<F>(&self, mut probe: F) -> NodeId
	where
		F: FnMut(&T) -> Ordering,
	{
		let mut bound = SENTINEL;
		let mut cursor = self.root;
		while cursor != SENTINEL {
			if probe(self.payload(cursor)) == Ordering::Less {
				cursor = self.node(cursor).right;
			} else {
				bound = cursor;
				cursor = self.node(cursor).left;
			}
		}
		bound
	}

	/// The first node for which `probe` answers `Greater`.
	pub fn upper_bound_with<F>(&self, mut probe: F) -> NodeId
	where
		F: FnMut(&T) -> Ordering,
	{
		let mut bound = SENTINEL;
		let mut cursor = self.root;
		while cursor != SENTINEL {
			if probe(self.payload(cursor)) == Ordering::Greater {
				bound = cursor;
				cursor = self.node(cursor).left;
			} else {
				cursor = self.node(cursor).right;
			}
		}
		bound
	}

	// -----------------------------------------------------------------------
	// Insertion
	// -----------------------------------------------------------------------

	/// Obtains a slot for a new red leaf, preferring the free list over
	/// arena growth.
	fn allocate(&mut self, entry: T, parent: NodeId) -> Result<NodeId> {
		let node = Node {
			color: Color::Red,
			parent,
			left: SENTINEL,
			right: SENTINEL,
			entry: Some(entry),
		};
		if let Some(id) = self.free.pop() {
			self.arena[id.index()] = node;
			return Ok(id);
		}
		if self.arena.len() >= Self::slot_limit() {
			return Err(Error::CapacityExceeded {
				limit: self.max_len(),
			});
		}
		self.arena.try_reserve(1)?;
		let id = NodeId(self.arena.len() as u32);
		self.arena.push(node);
		Ok(id)
	}

	/// Restores the red-black invariants after hanging a new red leaf at
	/// `id`.
	///
	/// The bottom-up case analysis:
	///
	/// 1. `id` is the root: force it black, done.
	/// 2. Black parent: nothing to repair.
	/// 3. Red parent and red uncle: recolor both black and the grandparent
	///    red, then repeat with the grandparent as the node under repair.
	/// 4. Triangle (node and parent are opposite-side children): rotate the
	///    parent to straighten the triangle into a line.
	/// 5. Line: recolor parent black and grandparent red, rotate the
	///    grandparent away from the line.
	///
	/// Only case 3 ascends; everything else terminates, so the pass is
	/// bounded by tree height.
	fn rebalance_after_insert(&mut self, mut id: NodeId) {
		loop {
			let parent = self.parent(id);
			// Case 1: the node reached the root position.
			if parent == SENTINEL {
				self.node_mut(id).color = Color::Black;
				return;
			}
			// Case 2: a black parent absorbs a red child as-is.
			if self.is_black(parent) {
				return;
			}
			// The parent is red, hence not the root, hence the grandparent
			// is a real node.
			let grandparent = self.parent(parent);
			let parent_side = self.side_of(parent);
			let uncle = self.child(grandparent, parent_side.opposite());
			// Case 3: red uncle. Pull the blackness down from the
			// grandparent and continue the repair there.
			if self.is_red(uncle) {
				self.node_mut(parent).color = Color::Black;
				self.node_mut(uncle).color = Color::Black;
				self.node_mut(grandparent).color = Color::Red;
				id = grandparent;
				continue;
			}
			// Case 4: triangle. Rotate the parent so node and parent form
			// a line; the old parent becomes the lower end of the line.
			if self.side_of(id) != parent_side {
				self.rotate(parent, parent_side);
				id = parent;
			}
			// Case 5: line. One rotation at the grandparent finishes.
			let parent = self.parent(id);
			let grandparent = self.parent(parent);
			self.node_mut(parent).color = Color::Black;
			self.node_mut(grandparent).color = Color::Red;
			self.rotate(grandparent, parent_side.opposite());
			return;
		}
	}

	// -----------------------------------------------------------------------
	// Rotations
	// -----------------------------------------------------------------------

	/// Rotates `id` downward in direction `dir`; its child on the opposite
	/// side rises into its place.
	///
	/// `rotate(x, Left)` is the classic left rotation: `x`'s right child
	/// takes `x`'s position and `x` becomes that child's left child, with
	/// the child's inner subtree re-hung on `x`. Rotations are the only
	/// shape-changing operation in the tree; they never detach a node.
	fn rotate(&mut self, id: NodeId, dir: Side) {
		let up = self.child(id, dir.opposite());
		debug_assert!(up != SENTINEL, "rotation needs a child on the rising side");
		let inner = self.child(up, dir);
		let parent = self.parent(id);

		// The rising node's inner subtree switches sides.
		self.set_child(id, dir.opposite(), inner);
		if inner != SENTINEL {
			self.node_mut(inner).parent = id;
		}

		// The rotated node descends under the riser.
		self.set_child(up, dir, id);
		self.node_mut(id).parent = up;

		// The riser takes over the old position, root mirror included.
		self.node_mut(up).parent = parent;
		if parent == SENTINEL {
			self.set_root(up);
		} else if self.node(parent).left == id {
			self.node_mut(parent).left = up;
		} else {
			self.node_mut(parent).right = up;
		}
	}

	// -----------------------------------------------------------------------
	// Removal
	// -----------------------------------------------------------------------

	/// Removes the element behind `id` and returns its payload.
	///
	/// Every other element keeps its handle: a node with a subtree on
	/// either side first exchanges its complete link structure with its
	/// in-order neighbor (never the payloads), so no surviving node ever
	/// changes identity. See the crate docs for why this matters for
	/// cursor stability.
	///
	/// # Panics
	///
	/// Panics if `id` is the end sentinel or a handle whose element was
	/// already removed. Both are caller bugs, not recoverable conditions.
	///
	/// # Example
	///
	/// ```
	/// use rowantree::RbTree;
	///
	/// let mut tree: RbTree<i32> = RbTree::new();
	/// for key in [2, 1, 3] {
	///     tree.insert(key).unwrap();
	/// }
	///
	/// let two = tree.find(&2);
	/// assert_eq!(tree.remove(two), 2);
	/// assert_eq!(tree.find(&2), tree.end());
	/// assert_eq!(tree.len(), 2);
	/// ```
	pub fn remove(&mut self, id: NodeId) -> T {
		assert!(id != SENTINEL, "cannot remove the end position");
		assert!(
			self.node(id).entry.is_some(),
			"cannot remove through a handle to an already-erased node"
		);

		// Phase 1: reduce the target to a leaf. A node with a right
		// subtree trades places with its in-order successor (the leftmost
		// node of that subtree); one with only a left subtree trades with
		// its predecessor. If the chosen neighbor still holds an inward
		// child, that child is a lone red leaf on an all-black sibling
		// path; recoloring it black and rotating it up empties the
		// neighbor without disturbing black heights.
		let left = self.node(id).left;
		let right = self.node(id).right;
		if right != SENTINEL {
			let neighbor = iter::leftmost_in(&self.arena, right);
			let inward = self.node(neighbor).right;
			if inward != SENTINEL {
				self.node_mut(inward).color = Color::Black;
				self.node_mut(neighbor).color = Color::Red;
				self.rotate(neighbor, Side::Left);
			}
			self.exchange_links(id, neighbor);
		} else if left != SENTINEL {
			let neighbor = iter::rightmost_in(&self.arena, left);
			let inward = self.node(neighbor).left;
			if inward != SENTINEL {
				self.node_mut(inward).color = Color::Black;
				self.node_mut(neighbor).color = Color::Red;
				self.rotate(neighbor, Side::Right);
			}
			self.exchange_links(id, neighbor);
		}

		// Phase 2: unlink the now-leaf target. Unlinking a black leaf
		// leaves one path a black node short, which the rebalance repairs.
		let parent = self.parent(id);
		let was_black = self.is_black(id);
		if parent == SENTINEL {
			self.set_root(SENTINEL);
		} else {
			let side = self.side_of(id);
			self.set_child(parent, side, SENTINEL);
			if was_black {
				self.rebalance_after_remove(parent, side);
			}
		}

		self.len -= 1;
		self.release(id)
	}

	/// Exchanges the complete link structure and color of `a` and `b`,
	/// leaving their payloads in place.
	///
	/// Handles the adjacent case (one node the parent of the other) by
	/// redirecting any captured self-reference to the counterpart, the
	/// same way the surrounding nodes are re-pointed afterwards.
	fn exchange_links(&mut self, a: NodeId, b: NodeId) {
		let (a_color, a_parent, a_left, a_right) = {
			let node = self.node(a);
			(node.color, node.parent, node.left, node.right)
		};
		let (b_color, b_parent, b_left, b_right) = {
			let node = self.node(b);
			(node.color, node.parent, node.left, node.right)
		};
		// Capture the attachment sides before any link moves.
		let a_side = (a_parent != SENTINEL).then(|| self.side_of(a));
		let b_side = (b_parent != SENTINEL).then(|| self.side_of(b));

		{
			let node = self.node_mut(a);
			node.color = b_color;
			node.parent = if b_parent == a { b } else { b_parent };
			node.left = if b_left == a { b } else { b_left };
			node.right = if b_right == a { b } else { b_right };
		}
		{
			let node = self.node_mut(b);
			node.color = a_color;
			node.parent = if a_parent == b { a } else { a_parent };
			node.left = if a_left == b { a } else { a_left };
			node.right = if a_right == b { a } else { a_right };
		}

		// Each node has moved into the other's old position; re-point the
		// neighborhood (children's parent links, parent's child link or
		// the root mirror) at the new occupants.
		self.reattach(a, b_side);
		self.reattach(b, a_side);
	}

	/// Makes the neighborhood of `id` consistent with its current links.
	/// `side` is the child slot `id` now occupies in its parent.
	fn reattach(&mut self, id: NodeId, side: Option<Side>) {
		let parent = self.node(id).parent;
		let left = self.node(id).left;
		let right = self.node(id).right;
		if left != SENTINEL {
			self.node_mut(left).parent = id;
		}
		if right != SENTINEL {
			self.node_mut(right).parent = id;
		}
		if parent == SENTINEL {
			self.set_root(id);
		} else {
			match side {
				Some(side) => self.set_child(parent, side, id),
				None => unreachable!("a non-root node must know its side in the parent"),
			}
		}
	}

	/// Restores uniform black height after a black node vanished from the
	/// `side` child position of `parent`.
	///
	/// The sibling-driven case analysis, looped upward until the deficit
	/// is absorbed:
	///
	/// 1. Red sibling: recolor it black and the parent red, rotate the
	///    parent toward the deficit. The new sibling is black; re-examine.
	/// 2. Black sibling with two black children: recolor the sibling red.
	///    A red parent absorbs the deficit by turning black; a black
	///    parent pushes the deficit one level up, repeating the analysis
	///    from there until a red node or the root is reached.
	/// 3. Black sibling with a red near nephew only: rotate the sibling
	///    away from the deficit to surface a red far nephew.
	/// 4. Red far nephew: the sibling takes the parent's color, parent and
	///    far nephew turn black, one rotation at the parent settles the
	///    deficit.
	fn rebalance_after_remove(&mut self, mut parent: NodeId, mut side: Side) {
		loop {
			let sibling = self.child(parent, side.opposite());
			debug_assert!(sibling != SENTINEL, "a black deficit implies a real sibling");

			// Case 1: red sibling.
			if self.is_red(sibling) {
				self.node_mut(sibling).color = Color::Black;
				self.node_mut(parent).color = Color::Red;
				self.rotate(parent, side);
				continue;
			}

			let near = self.child(sibling, side);
			let far = self.child(sibling, side.opposite());

			// Case 2: black sibling, black children.
			if self.is_black(near) && self.is_black(far) {
				self.node_mut(sibling).color = Color::Red;
				if self.is_red(parent) {
					self.node_mut(parent).color = Color::Black;
					return;
				}
				let grandparent = self.parent(parent);
				if grandparent == SENTINEL {
					return;
				}
				side = self.side_of(parent);
				parent = grandparent;
				continue;
			}

			// Case 3: the red nephew sits on the near side.
			if self.is_black(far) {
				self.node_mut(near).color = Color::Black;
				self.node_mut(sibling).color = Color::Red;
				self.rotate(sibling, side.opposite());
				continue;
			}

			// Case 4: red far nephew.
			self.node_mut(sibling).color = self.node(parent).color;
			self.node_mut(parent).color = Color::Black;
			self.node_mut(far).color = Color::Black;
			self.rotate(parent, side);
			return;
		}
	}

	/// Returns a slot to the free list and extracts its payload.
	fn release(&mut self, id: NodeId) -> T {
		let node = self.node_mut(id);
		node.parent = SENTINEL;
		node.left = SENTINEL;
		node.right = SENTINEL;
		node.color = Color::Black;
		let entry = match node.entry.take() {
			Some(entry) => entry,
			None => unreachable!("released slot had no payload"),
		};
		self.free.push(id);
		entry
	}

	// -----------------------------------------------------------------------
	// Whole-Tree Operations
	// -----------------------------------------------------------------------

	/// Removes every element.
	///
	/// All payloads are dropped in one bulk pass (the arena analog of a
	/// post-order teardown); the sentinel survives and the tree is
	/// immediately reusable.
	pub fn clear(&mut self) {
		self.arena.truncate(1);
		self.free.clear();
		self.len = 0;
		self.set_root(SENTINEL);
	}

	/// Exchanges the entire contents of two trees in O(1).
	///
	/// Roots, sentinels, counts and comparators all swap; node handles
	/// issued by either tree now belong to the other.
	pub fn swap(&mut self, other: &mut Self) {
		mem::swap(self, other);
	}

	// -----------------------------------------------------------------------
	// Cursors and Iteration
	// -----------------------------------------------------------------------

	/// A cursor positioned on the first element (the end position if the
	/// tree is empty).
	pub fn cursor_first(&self) -> RawCursor<'_, T, C> {
		RawCursor::new(self, self.first())
	}

	/// A cursor positioned on the last element (the end position if the
	/// tree is empty).
	pub fn cursor_last(&self) -> RawCursor<'_, T, C> {
		RawCursor::new(self, self.last())
	}

	/// A cursor at the end position.
	pub fn cursor_end(&self) -> RawCursor<'_, T, C> {
		RawCursor::new(self, SENTINEL)
	}

	/// A cursor positioned on an arbitrary handle (which may be the end
	/// sentinel).
	pub fn cursor_at(&self, id: NodeId) -> RawCursor<'_, T, C> {
		RawCursor::new(self, id)
	}

	/// An ordered iterator over all payloads.
	///
	/// # Example
	///
	/// ```
	/// use rowantree::RbTree;
	///
	/// let mut tree: RbTree<i32> = RbTree::new();
	/// for key in [3, 1, 2] {
	///     tree.insert(key).unwrap();
	/// }
	///
	/// let ordered: Vec<i32> = tree.entries().copied().collect();
	/// assert_eq!(ordered, [1, 2, 3]);
	/// ```
	pub fn entries(&self) -> Entries<'_, T, C> {
		Entries::new(self)
	}

	/// An ordered iterator handing out mutable payload borrows. Reserved
	/// for the facades, which only expose the non-ordering projection.
	pub(crate) fn entries_mut(&mut self) -> iter::EntriesMut<'_, T, C> {
		iter::EntriesMut::new(self)
	}

	/// An ordered iterator between two positions, `end_exclusive` not
	/// included. Used by the facades' range queries.
	pub(crate) fn entries_between(&self, front: NodeId, end_exclusive: NodeId) -> EntriesRange<'_, T, C> {
		EntriesRange::new(self, front, end_exclusive)
	}

	/// Consumes the tree into an ordered owning iterator.
	pub fn into_entries(self) -> IntoEntries<T> {
		IntoEntries::from_tree(self)
	}

	pub(crate) fn into_arena(self) -> Vec<Node<T>> {
		self.arena
	}

	pub(crate) fn arena(&self) -> &[Node<T>] {
		&self.arena
	}

	pub(crate) fn arena_mut_ptr(&mut self) -> *mut Node<T> {
		self.arena.as_mut_ptr()
	}
}

/// Operations that consult the stored comparator.
impl<T, C: Comparator<T>> RbTree<T, C> {
	// -----------------------------------------------------------------------
	// Comparator-Driven Search and Insertion
	// -----------------------------------------------------------------------

	/// Finds a node equivalent to `probe` under the tree's comparator.
	///
	/// Returns the sentinel handle if no such node exists; callers check
	/// against [`end`](Self::end). If duplicates were inserted, an
	/// arbitrary one of them is returned.
	///
	/// # Example
	///
	/// ```
	/// use rowantree::RbTree;
	///
	/// let mut tree: RbTree<i32> = RbTree::new();
	/// tree.insert(1).unwrap();
	///
	/// assert_ne!(tree.find(&1), tree.end());
	/// assert_eq!(tree.find(&2), tree.end());
	/// ```
	pub fn find(&self, probe: &T) -> NodeId {
		self.find_with(|entry| self.comparator.ordering(entry, probe))
	}

	/// The first node not ordered before `probe` (the sentinel if all
	/// elements are).
	pub fn lower_bound(&self, probe: &T) -> NodeId {
		self.lower_bound_with(|entry| self.comparator.ordering(entry, probe))
	}

	/// The first node ordered strictly after `probe` (the sentinel if none
	/// is).
	pub fn upper_bound(&self, probe: &T) -> NodeId {
		self.upper_bound_with(|entry| self.comparator.ordering(entry, probe))
	}

	/// Inserts `entry` at its comparator-determined position and returns
	/// the new node's handle.
	///
	/// Duplicates are **not** rejected here: an entry equivalent to a
	/// stored one descends right and becomes its in-order neighbor.
	/// Uniqueness is the calling layer's policy (check with
	/// [`find`](Self::find) first), which is what [`TreeMap`] and
	/// [`TreeSet`] do.
	///
	/// # Errors
	///
	/// Fails with [`Error::CapacityExceeded`] past
	/// [`max_len`](Self::max_len) and with [`Error::Alloc`] if the arena
	/// cannot grow. Either way the tree is left exactly as it was: the
	/// slot is acquired before any link is touched.
	pub fn insert(&mut self, entry: T) -> Result<NodeId> {
		// Phase 1: classic binary-search descent to the attachment point.
		let mut parent = SENTINEL;
		let mut side = Side::Left;
		let mut cursor = self.root;
		while cursor != SENTINEL {
			parent = cursor;
			side = if self.comparator.less(&entry, self.payload(cursor)) {
				Side::Left
			} else {
				Side::Right
			};
			cursor = self.child(cursor, side);
		}

		// Phase 2: acquire a slot. Nothing is linked yet, so a failure
		// here leaves the tree untouched.
		let id = self.allocate(entry, parent)?;

		// Phase 3: attach the new red leaf and restore the invariants.
		if parent == SENTINEL {
			self.set_root(id);
		} else {
			self.set_child(parent, side, id);
		}
		self.len += 1;
		self.rebalance_after_insert(id);
		Ok(id)
	}
}

impl<T: fmt::Debug, C> fmt::Debug for RbTree<T, C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(Entries::new(self)).finish()
	}
}

// ===========================================================================
// Invariant Validation
// ===========================================================================

/// Structural validation, used by the test suites after every mutation.
impl<T: fmt::Debug, C: Comparator<T>> RbTree<T, C> {
	/// Validates every structural invariant. Panics with diagnostic info
	/// if any is violated.
	///
	/// # Invariants Checked
	///
	/// 1. The sentinel is black, payload-free, and mirrors the root (or
	///    self-links while the tree is empty).
	/// 2. The root is black and its parent is the sentinel.
	/// 3. No red node has a red parent or a red child.
	/// 4. Every path from a node down to a missing child carries the same
	///    number of black nodes.
	/// 5. In-order traversal never decreases under the comparator.
	/// 6. `len` matches the number of reachable nodes, and the arena's
	///    free-list bookkeeping agrees with it.
	/// 7. Every child's parent link points back at its parent.
	pub fn assert_invariants(&self) {
		let sentinel = self.node(SENTINEL);
		assert_eq!(sentinel.color, Color::Black, "the sentinel must stay black");
		assert!(sentinel.entry.is_none(), "the sentinel must not hold a payload");
		assert_eq!(sentinel.parent, SENTINEL, "the sentinel's parent must be itself");
		assert_eq!(sentinel.left, self.root, "sentinel left link must mirror the root");
		assert_eq!(sentinel.right, self.root, "sentinel right link must mirror the root");

		assert_eq!(
			self.arena.len() - 1 - self.free.len(),
			self.len,
			"arena bookkeeping out of sync with the element count"
		);
		for &id in &self.free {
			assert!(
				self.node(id).entry.is_none(),
				"free slot {:?} still holds a payload",
				id
			);
		}

		if self.root == SENTINEL {
			assert_eq!(self.len, 0, "an empty root with a nonzero count");
			return;
		}

		assert_eq!(
			self.node(self.root).parent,
			SENTINEL,
			"the root's parent must be the sentinel"
		);
		assert_eq!(self.node(self.root).color, Color::Black, "the root must be black");

		let mut count = 0usize;
		self.validate_subtree(self.root, &mut count);
		assert_eq!(count, self.len, "reachable node count does not match len()");

		// In-order traversal must never decrease.
		let mut cursor = self.first();
		let mut prev: Option<&T> = None;
		while cursor != SENTINEL {
			let entry = self.payload(cursor);
			if let Some(prev) = prev {
				assert!(
					!self.comparator.less(entry, prev),
					"in-order traversal decreased: {:?} after {:?}",
					entry,
					prev
				);
			}
			prev = Some(entry);
			cursor = self.successor(cursor);
		}
	}

	/// Validates the subtree under `id`, returning its black height
	/// (counting the missing-child boundary as one black node).
	fn validate_subtree(&self, id: NodeId, count: &mut usize) -> usize {
		if id == SENTINEL {
			return 1;
		}
		*count += 1;

		let node = self.node(id);
		assert!(
			node.entry.is_some(),
			"reachable node {:?} has no payload",
			id
		);
		if node.color == Color::Red {
			assert!(
				self.is_black(node.parent),
				"red node {:?} ({:?}) has a red parent",
				id,
				self.payload(id)
			);
			assert!(
				self.is_black(node.left) && self.is_black(node.right),
				"red node {:?} ({:?}) has a red child",
				id,
				self.payload(id)
			);
		}
		for child in [node.left, node.right] {
			if child != SENTINEL {
				assert_eq!(
					self.node(child).parent,
					id,
					"child {:?} does not point back at its parent {:?}",
					child,
					id
				);
			}
		}

		let left_height = self.validate_subtree(node.left, count);
		let right_height = self.validate_subtree(node.right, count);
		assert_eq!(
			left_height, right_height,
			"black-height mismatch under {:?} ({:?})",
			id,
			self.payload(id)
		);
		left_height + usize::from(node.color == Color::Black)
	}
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
	use super::*;

	fn tree_of(keys: &[i32]) -> RbTree<i32> {
		let mut tree = RbTree::new();
		for &key in keys {
			tree.insert(key).unwrap();
		}
		tree
	}

	fn collect(tree: &RbTree<i32>) -> Vec<i32> {
		tree.entries().copied().collect()
	}

	// -----------------------------------------------------------------------
	// Construction and Boundaries
	// -----------------------------------------------------------------------

	#[test]
	fn new_tree_is_empty() {
		let tree: RbTree<i32> = RbTree::new();
		tree.assert_invariants();
		assert!(tree.is_empty());
		assert_eq!(tree.len(), 0);
		assert_eq!(tree.first(), tree.end());
		assert_eq!(tree.last(), tree.end());
	}

	#[test]
	fn max_len_is_positive_and_stable() {
		let tree: RbTree<i32> = RbTree::new();
		assert!(tree.max_len() > 0);
		let tree_of_larger_nodes: RbTree<[u64; 8]> = RbTree::new();
		assert!(tree_of_larger_nodes.max_len() < tree.max_len());
	}

	#[test]
	fn empty_tree_step_from_end_stays_at_end() {
		let tree: RbTree<i32> = RbTree::new();
		assert_eq!(tree.successor(tree.end()), tree.end());
		assert_eq!(tree.predecessor(tree.end()), tree.end());
	}

	// -----------------------------------------------------------------------
	// Insertion
	// -----------------------------------------------------------------------

	#[test]
	fn single_insert_becomes_black_root() {
		let mut tree: RbTree<i32> = RbTree::new();
		let id = tree.insert(42).unwrap();
		tree.assert_invariants();
		assert_eq!(tree.len(), 1);
		assert_eq!(tree.get(id), Some(&42));
		assert_eq!(tree.first(), id);
		assert_eq!(tree.last(), id);
	}

	#[test]
	fn ascending_inserts_stay_balanced() {
		let tree = tree_of(&(0..256).collect::<Vec<_>>());
		tree.assert_invariants();
		assert_eq!(collect(&tree), (0..256).collect::<Vec<_>>());
	}

	#[test]
	fn descending_inserts_stay_balanced() {
		let tree = tree_of(&(0..256).rev().collect::<Vec<_>>());
		tree.assert_invariants();
		assert_eq!(collect(&tree), (0..256).collect::<Vec<_>>());
	}

	#[test]
	fn zigzag_inserts_exercise_triangle_cases() {
		// Alternating outer/inner insertions force the triangle (case 4)
		// fixups on both sides.
		let tree = tree_of(&[50, 25, 75, 40, 60, 30, 70, 35, 65]);
		tree.assert_invariants();
		assert_eq!(collect(&tree), [25, 30, 35, 40, 50, 60, 65, 70, 75]);
	}

	#[test]
	fn engine_accepts_duplicates() {
		let tree = tree_of(&[5, 5, 5]);
		tree.assert_invariants();
		assert_eq!(tree.len(), 3);
		assert_eq!(collect(&tree), [5, 5, 5]);
	}

	#[test]
	fn insert_returns_handle_to_inserted_node() {
		let mut tree: RbTree<i32> = RbTree::new();
		for key in [10, 20, 30] {
			tree.insert(key).unwrap();
		}
		let id = tree.insert(15).unwrap();
		assert_eq!(tree.get(id), Some(&15));
		tree.assert_invariants();
	}

	// -----------------------------------------------------------------------
	// Search
	// -----------------------------------------------------------------------

	#[test]
	fn find_present_and_absent() {
		let tree = tree_of(&[10, 20, 30]);
		assert_eq!(tree.get(tree.find(&20)), Some(&20));
		assert_eq!(tree.find(&25), tree.end());
		assert_eq!(tree.find(&5), tree.end());
		assert_eq!(tree.find(&35), tree.end());
	}

	#[test]
	fn bounds_bracket_present_and_absent_keys() {
		let tree = tree_of(&[10, 20, 30]);
		assert_eq!(tree.get(tree.lower_bound(&20)), Some(&20));
		assert_eq!(tree.get(tree.upper_bound(&20)), Some(&30));
		assert_eq!(tree.get(tree.lower_bound(&15)), Some(&20));
		assert_eq!(tree.get(tree.upper_bound(&15)), Some(&20));
		assert_eq!(tree.lower_bound(&31), tree.end());
		assert_eq!(tree.upper_bound(&30), tree.end());
		assert_eq!(tree.get(tree.lower_bound(&0)), Some(&10));
	}

	// -----------------------------------------------------------------------
	// Removal
	// -----------------------------------------------------------------------

	#[test]
	fn remove_leaf_root() {
		let mut tree = tree_of(&[1]);
		let id = tree.find(&1);
		assert_eq!(tree.remove(id), 1);
		tree.assert_invariants();
		assert!(tree.is_empty());
	}

	#[test]
	fn remove_node_with_two_children() {
		let mut tree = tree_of(&[50, 25, 75, 10, 30, 60, 90]);
		let id = tree.find(&50);
		assert_eq!(tree.remove(id), 50);
		tree.assert_invariants();
		assert_eq!(collect(&tree), [10, 25, 30, 60, 75, 90]);
	}

	#[test]
	fn remove_all_in_insertion_order() {
		let keys: Vec<i32> = (0..128).collect();
		let mut tree = tree_of(&keys);
		for &key in &keys {
			let id = tree.find(&key);
			assert_eq!(tree.remove(id), key);
			tree.assert_invariants();
		}
		assert!(tree.is_empty());
	}

	#[test]
	fn remove_all_in_reverse_order() {
		let keys: Vec<i32> = (0..128).collect();
		let mut tree = tree_of(&keys);
		for &key in keys.iter().rev() {
			let id = tree.find(&key);
			assert_eq!(tree.remove(id), key);
			tree.assert_invariants();
		}
		assert!(tree.is_empty());
	}

	#[test]
	fn removal_preserves_other_handles() {
		let mut tree = tree_of(&[50, 25, 75, 10, 30, 60, 90]);
		// Hold handles on every survivor, then erase a two-child node.
		let survivors: Vec<(NodeId, i32)> = [10, 25, 30, 60, 75, 90]
			.iter()
			.map(|key| (tree.find(key), *key))
			.collect();
		let target = tree.find(&50);
		tree.remove(target);
		tree.assert_invariants();
		for (id, key) in survivors {
			assert_eq!(tree.get(id), Some(&key), "handle for {key} went stale");
		}
	}

	#[test]
	fn successor_handle_survives_two_child_removal() {
		let mut tree = tree_of(&[50, 25, 75, 60, 90]);
		// 60 is the in-order successor that takes 50's place in the
		// link structure; its identity must not change.
		let successor = tree.find(&60);
		tree.remove(tree.find(&50));
		tree.assert_invariants();
		assert_eq!(tree.get(successor), Some(&60));
	}

	#[test]
	#[should_panic(expected = "cannot remove the end position")]
	fn removing_the_sentinel_panics() {
		let mut tree = tree_of(&[1]);
		let end = tree.end();
		tree.remove(end);
	}

	// -----------------------------------------------------------------------
	// Traversal
	// -----------------------------------------------------------------------

	#[test]
	fn successor_walk_is_sorted() {
		let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);
		let mut cursor = tree.first();
		let mut seen = Vec::new();
		while cursor != tree.end() {
			seen.push(*tree.get(cursor).unwrap());
			cursor = tree.successor(cursor);
		}
		assert_eq!(seen, [1, 3, 4, 5, 7, 8, 9]);
	}

	#[test]
	fn predecessor_from_end_reaches_last() {
		let tree = tree_of(&[5, 3, 8]);
		assert_eq!(tree.predecessor(tree.end()), tree.last());
		assert_eq!(tree.get(tree.last()), Some(&8));
	}

	#[test]
	fn step_round_trips_at_interior_nodes() {
		let tree = tree_of(&(0..64).collect::<Vec<_>>());
		let mut cursor = tree.first();
		while cursor != tree.end() {
			let next = tree.successor(cursor);
			assert_eq!(tree.predecessor(next), cursor);
			cursor = next;
		}
	}

	#[test]
	fn cursor_protocol_matches_step_primitives() {
		let tree = tree_of(&[2, 1, 3]);
		let mut cursor = tree.cursor_first();
		assert_eq!(cursor.get(), Some(&1));
		cursor.move_next();
		assert_eq!(cursor.get(), Some(&2));
		cursor.move_prev();
		assert_eq!(cursor.get(), Some(&1));
		assert_eq!(cursor, tree.cursor_first());
	}

	// -----------------------------------------------------------------------
	// Whole-Tree Operations
	// -----------------------------------------------------------------------

	#[test]
	fn clear_resets_and_allows_reuse() {
		let mut tree = tree_of(&(0..100).collect::<Vec<_>>());
		tree.clear();
		tree.assert_invariants();
		assert!(tree.is_empty());
		tree.insert(7).unwrap();
		tree.assert_invariants();
		assert_eq!(collect(&tree), [7]);
	}

	#[test]
	fn swap_exchanges_contents() {
		let mut a = tree_of(&[1, 2, 3]);
		let mut b = tree_of(&[9]);
		a.swap(&mut b);
		a.assert_invariants();
		b.assert_invariants();
		assert_eq!(collect(&a), [9]);
		assert_eq!(collect(&b), [1, 2, 3]);
	}

	#[test]
	fn freed_slots_are_reused() {
		let mut tree = tree_of(&[1, 2, 3]);
		let before = tree.arena().len();
		tree.remove(tree.find(&2));
		tree.insert(4).unwrap();
		tree.assert_invariants();
		assert_eq!(tree.arena().len(), before);
	}

	#[test]
	fn debug_output_lists_entries_in_order() {
		let tree = tree_of(&[2, 1, 3]);
		assert_eq!(format!("{:?}", tree), "[1, 2, 3]");
	}
}
