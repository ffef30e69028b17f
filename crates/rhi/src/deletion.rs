//! Deferred destruction of grouped resources.
//!
//! Long-lived objects in this crate clean themselves up through `Drop`.
//! The swapchain-dependent subset (framebuffers, per-image buffers,
//! descriptor pools, command buffers) is different: it must be torn down
//! and rebuilt mid-run whenever the window is resized. [`DeletionQueue`]
//! collects destruction closures for that subset as the resources are
//! created and runs them in reverse order on flush, so dependents are
//! always destroyed before their dependencies.
//!
//! # Example
//!
//! ```
//! use prism_rhi::deletion::DeletionQueue;
//!
//! let mut queue = DeletionQueue::new();
//! queue.push(|| println!("destroy framebuffer"));
//! queue.push(|| println!("destroy render pass"));
//!
//! // Prints "destroy render pass" first, then "destroy framebuffer"
//! queue.flush();
//! ```

/// A queue of destruction closures executed in reverse push order.
///
/// Closures are consumed by [`flush`](Self::flush); each runs exactly once.
/// Flushing an empty queue is a no-op, so it is safe to flush defensively
/// before rebuilding resources. Dropping a non-empty queue also runs the
/// pending closures.
#[derive(Default)]
pub struct DeletionQueue {
    deleters: Vec<Box<dyn FnOnce()>>,
}

impl DeletionQueue {
    /// Creates an empty deletion queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a destruction closure.
    ///
    /// Closures pushed later run earlier on flush, mirroring the order
    /// in which dependent resources must be destroyed.
    pub fn push(&mut self, deleter: impl FnOnce() + 'static) {
        self.deleters.push(Box::new(deleter));
    }

    /// Runs all registered closures in reverse push order and empties the queue.
    pub fn flush(&mut self) {
        while let Some(deleter) = self.deleters.pop() {
            deleter();
        }
    }

    /// Returns the number of pending closures.
    pub fn len(&self) -> usize {
        self.deleters.len()
    }

    /// Returns true if no closures are pending.
    pub fn is_empty(&self) -> bool {
        self.deleters.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for DeletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("pending", &self.deleters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_flush_runs_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeletionQueue::new();

        for i in 0..3 {
            let order = order.clone();
            queue.push(move || order.borrow_mut().push(i));
        }

        queue.flush();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_closures_run_exactly_once() {
        let count = Rc::new(RefCell::new(0));
        let mut queue = DeletionQueue::new();

        let c = count.clone();
        queue.push(move || *c.borrow_mut() += 1);

        queue.flush();
        queue.flush();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let mut queue = DeletionQueue::new();
        assert!(queue.is_empty());
        queue.flush();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_empties_the_queue() {
        let mut queue = DeletionQueue::new();
        queue.push(|| {});
        queue.push(|| {});
        assert_eq!(queue.len(), 2);

        queue.flush();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_runs_pending_closures() {
        let count = Rc::new(RefCell::new(0));
        {
            let mut queue = DeletionQueue::new();
            let c = count.clone();
            queue.push(move || *c.borrow_mut() += 1);
        }
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_push_after_flush() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeletionQueue::new();

        let o = order.clone();
        queue.push(move || o.borrow_mut().push("first"));
        queue.flush();

        let o = order.clone();
        queue.push(move || o.borrow_mut().push("second"));
        queue.flush();

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}
