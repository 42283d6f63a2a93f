//! Raw property operations.
//!
//! All four operations work on the target's own-property table through the
//! descriptor read/define/own-keys primitives of the heap.  None of them goes
//! through the ordinary access path, so getters, setters and hooks carried by
//! the target never fire, and the shield's own handlers can use these as
//! terminal operations without re-entering interception.

use crate::error::ShieldError;
use crate::object_model::{DescriptorPatch, JsValue, ObjectHandle, ObjectHeap, PropertyKey};

mod private {
    pub trait Sealed {}
}

/// Opaque reference to the object a raw operation acts on.  The handle inside
/// is only readable within this crate, so a wrapped value can be a raw target
/// without giving its target away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRef(ObjectHandle);

impl TargetRef {
    pub(crate) fn new(handle: ObjectHandle) -> Self {
        Self(handle)
    }

    pub(crate) fn handle(self) -> ObjectHandle {
        self.0
    }
}

/// Anything raw operations can act on: a plain object handle, or a wrapped
/// value (privileged silent access to its target).
pub trait RawTarget: private::Sealed {
    fn target_ref(&self) -> TargetRef;
}

impl private::Sealed for ObjectHandle {}

impl RawTarget for ObjectHandle {
    fn target_ref(&self) -> TargetRef {
        TargetRef::new(*self)
    }
}

impl<P> private::Sealed for crate::shield::Shielded<P> {}

impl<P> RawTarget for crate::shield::Shielded<P> {
    fn target_ref(&self) -> TargetRef {
        TargetRef::new(self.target_handle())
    }
}

/// Read the value stored in `key`'s own descriptor.
///
/// An accessor property stores no value and reads as `undefined`; its getter
/// is not called.
pub fn raw_get<T: RawTarget + ?Sized>(
    heap: &ObjectHeap,
    target: &T,
    key: &PropertyKey,
) -> Result<JsValue, ShieldError> {
    let handle = target.target_ref().handle();
    match heap.get_own_property_descriptor(handle, key)? {
        Some(desc) => Ok(desc.value().cloned().unwrap_or(JsValue::Undefined)),
        None => Err(ShieldError::MissingProperty { key: key.clone() }),
    }
}

/// Define `key` with a value-only descriptor patch.
///
/// `Ok(false)` when the target is non-extensible and `key` is new, or when a
/// non-configurable descriptor forbids the change.
pub fn raw_set<T: RawTarget + ?Sized>(
    heap: &mut ObjectHeap,
    target: &T,
    key: PropertyKey,
    value: JsValue,
) -> Result<bool, ShieldError> {
    let handle = target.target_ref().handle();
    Ok(heap.define_with_patch(handle, key, &DescriptorPatch::value(value))?)
}

/// Overwrite `key` with `undefined` instead of removing it; a real delete
/// would fire the target's delete hook.
pub fn raw_soft_delete<T: RawTarget + ?Sized>(
    heap: &mut ObjectHeap,
    target: &T,
    key: PropertyKey,
) -> Result<bool, ShieldError> {
    raw_set(heap, target, key, JsValue::Undefined)
}

/// Is `key` among the target's own keys (string and symbol, enumerable or
/// not)?  The prototype chain is not consulted.
pub fn raw_has<T: RawTarget + ?Sized>(
    heap: &ObjectHeap,
    target: &T,
    key: &PropertyKey,
) -> Result<bool, ShieldError> {
    let handle = target.target_ref().handle();
    Ok(heap.own_property_keys(handle)?.contains(key))
}
