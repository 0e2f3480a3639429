//! Integration tests for the `fixed_pool` package.
//!
//! These tests drive the pool the way a node-based container would: one allocation per node,
//! with the container responsible for constructing and destroying the nodes.

use std::ptr::NonNull;

use fixed_pool::{DropPolicy, Error, FixedPool};

/// A minimal singly-linked stack that stores its nodes in a fixed pool.
struct PoolStack<T, const CAPACITY: usize> {
    pool: FixedPool<Node<T>, CAPACITY>,
    head: Option<NonNull<Node<T>>>,
}

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
}

impl<T, const CAPACITY: usize> PoolStack<T, CAPACITY> {
    fn new() -> Self {
        Self {
            pool: FixedPool::builder()
                .drop_policy(DropPolicy::MustNotLeakItems)
                .build()
                .unwrap(),
            head: None,
        }
    }

    /// Pushes a value, returning the address of the node that holds it.
    fn push(&mut self, value: T) -> Result<NonNull<Node<T>>, Error> {
        let node = self.pool.construct(Node {
            value,
            next: self.head,
        })?;

        self.head = Some(node);
        Ok(node)
    }

    /// Pops a value, also returning the address of the node that held it.
    fn pop(&mut self) -> Option<(T, NonNull<Node<T>>)> {
        let node = self.head?;

        // SAFETY: The head node was constructed by `push()` and is owned by the stack.
        let Node { value, next } = unsafe { node.read() };
        self.head = next;

        // SAFETY: The node came from this pool and its contents were moved out above, so
        // returning the storage without dropping is correct.
        unsafe {
            self.pool.deallocate(node.as_ptr(), 1);
        }

        Some((value, node))
    }

    fn peek(&self) -> Option<&T> {
        // SAFETY: The head node is initialized and we hand out a shared reference bound to `self`.
        self.head.map(|node| unsafe { &node.as_ref().value })
    }
}

impl<T, const CAPACITY: usize> Drop for PoolStack<T, CAPACITY> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[test]
fn push_then_pop_reuses_addresses_in_stack_order() {
    let mut stack = PoolStack::<i32, 10>::new();

    let pushed = (0..10)
        .map(|value| stack.push(value).unwrap())
        .collect::<Vec<_>>();

    let mut popped_values = Vec::new();
    let mut popped_addresses = Vec::new();

    for _ in 0..10 {
        assert_eq!(stack.peek().copied(), Some(9 - popped_values.len() as i32));

        let (value, address) = stack.pop().unwrap();
        popped_values.push(value);
        popped_addresses.push(address);
    }

    assert_eq!(popped_values, (0..10).rev().collect::<Vec<_>>());
    assert_eq!(
        popped_addresses,
        pushed.iter().rev().copied().collect::<Vec<_>>()
    );

    // After popping everything, pushing again hands the slots out in stack order.
    let repushed = (0..10)
        .map(|value| stack.push(value).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(repushed, pushed);
}

#[test]
fn container_sees_uniform_failure_when_full() {
    let mut stack = PoolStack::<String, 2>::new();

    stack.push("a".to_string()).unwrap();
    stack.push("b".to_string()).unwrap();

    let error = stack.push("c".to_string()).unwrap_err();
    assert!(error.is_exhausted());

    let (value, _) = stack.pop().unwrap();
    assert_eq!(value, "b");

    stack.push("d".to_string()).unwrap();
    assert_eq!(stack.peek().map(String::as_str), Some("d"));
}

#[test]
fn interleaved_use_never_hands_out_live_storage() {
    let mut stack = PoolStack::<u64, 4>::new();
    let mut live = Vec::new();

    for round in 0_u64..40 {
        if round % 5 < 3 {
            if let Ok(address) = stack.push(round) {
                assert!(!live.contains(&address));
                live.push(address);
            }
        } else if let Some((_, address)) = stack.pop() {
            assert_eq!(live.pop(), Some(address));
        }
    }
}

#[test]
fn container_storage_moves_with_the_pool() {
    let mut stack = PoolStack::<String, 3>::new();
    stack.push("moved".to_string()).unwrap();

    let mut relocated = PoolStack::<String, 3> {
        pool: stack.pool.take(),
        head: stack.head.take(),
    };

    assert!(!stack.pool.is_valid());
    assert!(stack.push("nope".to_string()).unwrap_err().is_exhausted());

    assert_eq!(relocated.peek().map(String::as_str), Some("moved"));
    assert_eq!(relocated.pop().map(|(value, _)| value).as_deref(), Some("moved"));
}

#[test]
fn default_pool_has_full_free_chain() {
    let mut pool = FixedPool::<u8, 16>::new().unwrap();

    assert!(pool.is_valid());
    assert_eq!(pool.capacity(), 16);

    let indexes = (0..16)
        .map(|_| {
            let ptr = pool.allocate(1).unwrap();
            pool.slot_index(ptr).unwrap()
        })
        .collect::<Vec<_>>();

    // A fresh pool hands out slots in ascending index order.
    assert_eq!(indexes, (0..16).collect::<Vec<_>>());
    assert!(pool.is_full());
}
