//! Uses a `FixedPool` as node storage for a tiny linked list: pushes ten numbers, then prints
//! and pops them from the back, showing that node storage is reused in stack order.

use std::ptr::NonNull;

use fixed_pool::FixedPool;

struct Node {
    value: i32,
    previous: Option<NonNull<Node>>,
}

fn main() {
    let mut pool =
        FixedPool::<Node, 10>::new().expect("a pool of ten small nodes must fit in memory");
    let mut back: Option<NonNull<Node>> = None;

    for value in 0..10 {
        let node = pool
            .construct(Node {
                value,
                previous: back,
            })
            .expect("the pool has room for exactly ten nodes");

        println!("push {value} at {node:p}");
        back = Some(node);
    }

    while let Some(node) = back {
        // SAFETY: Every node in the list was constructed above and is still live.
        let Node { value, previous } = unsafe { node.read() };

        println!("pop  {value} at {node:p}");

        // SAFETY: The node came from this pool and its contents were moved out above.
        unsafe {
            pool.deallocate(node.as_ptr(), 1);
        }

        back = previous;
    }

    assert!(pool.is_empty());
}
