//! The per-thread stack of receivers of methods currently executing.
//!
//! A method body entered with receiver `obj` pushes it for the duration of the
//! call. Restricted attributes of `obj` are accessible while `obj` is anywhere
//! on the stack, so helpers called from a method inherit its access.
use crate::value::ObjectRef;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static OWNERS: RefCell<Vec<ObjectRef>> = const { RefCell::new(Vec::new()) };
}

/// Pops its receiver when dropped.
#[must_use]
pub struct OwnerScope {
    _not_send: PhantomData<*const ()>,
}

pub fn enter(receiver: ObjectRef) -> OwnerScope {
    OWNERS.with(|stack| stack.borrow_mut().push(receiver));
    OwnerScope { _not_send: PhantomData }
}

impl Drop for OwnerScope {
    fn drop(&mut self) {
        let popped = OWNERS.try_with(|stack| stack.borrow_mut().pop());
        drop(popped);
    }
}

/// `true` if some executing method on this thread has `obj` as its receiver.
/// Innermost frames are scanned first.
pub fn is_owner(obj: &ObjectRef) -> bool {
    OWNERS.with(|stack| stack.borrow().iter().rev().any(|owner| owner.ptr_eq(obj)))
}

pub fn depth() -> usize {
    OWNERS.with(|stack| stack.borrow().len())
}
