//! Interception policies.
//!
//! A policy decides what the four property events on a wrapped value do.
//! [`build_policy`] produces the shielded record whose handlers terminate in
//! the raw operations; [`OrdinaryPolicy`] forwards to the heap's ordinary
//! path instead and so fires whatever hooks and accessors the target carries.

use crate::error::ShieldError;
use crate::object_model::{JsValue, ObjectHandle, ObjectHeap, PropertyKey};
use crate::raw_access::{raw_get, raw_has, raw_set, raw_soft_delete};

pub type GetHandler =
    fn(&mut ObjectHeap, ObjectHandle, &PropertyKey) -> Result<JsValue, ShieldError>;
pub type SetHandler =
    fn(&mut ObjectHeap, ObjectHandle, PropertyKey, JsValue) -> Result<bool, ShieldError>;
pub type DeleteHandler =
    fn(&mut ObjectHeap, ObjectHandle, PropertyKey) -> Result<bool, ShieldError>;
pub type HasHandler = fn(&mut ObjectHeap, ObjectHandle, &PropertyKey) -> Result<bool, ShieldError>;

/// The four handlers a wrapped value dispatches to.
pub trait InterceptionPolicy {
    /// Short name stamped on interception events.
    fn name(&self) -> &'static str;

    fn get(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ShieldError>;

    fn set(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ShieldError>;

    fn delete_property(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
    ) -> Result<bool, ShieldError>;

    fn has(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ShieldError>;
}

/// Immutable handler record.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRecord {
    name: &'static str,
    get: GetHandler,
    set: SetHandler,
    delete_property: DeleteHandler,
    has: HasHandler,
}

impl PolicyRecord {
    pub fn new(
        name: &'static str,
        get: GetHandler,
        set: SetHandler,
        delete_property: DeleteHandler,
        has: HasHandler,
    ) -> Self {
        Self {
            name,
            get,
            set,
            delete_property,
            has,
        }
    }
}

impl InterceptionPolicy for PolicyRecord {
    fn name(&self) -> &'static str {
        self.name
    }

    fn get(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ShieldError> {
        (self.get)(heap, target, key)
    }

    fn set(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ShieldError> {
        (self.set)(heap, target, key, value)
    }

    fn delete_property(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
    ) -> Result<bool, ShieldError> {
        (self.delete_property)(heap, target, key)
    }

    fn has(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ShieldError> {
        (self.has)(heap, target, key)
    }
}

pub const SHIELDED_POLICY_NAME: &str = "shielded";

fn shielded_get(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    key: &PropertyKey,
) -> Result<JsValue, ShieldError> {
    raw_get(heap, &target, key)
}

fn shielded_set(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    key: PropertyKey,
    value: JsValue,
) -> Result<bool, ShieldError> {
    raw_set(heap, &target, key, value)
}

fn shielded_delete(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    key: PropertyKey,
) -> Result<bool, ShieldError> {
    raw_soft_delete(heap, &target, key)
}

fn shielded_has(
    heap: &mut ObjectHeap,
    target: ObjectHandle,
    key: &PropertyKey,
) -> Result<bool, ShieldError> {
    raw_has(heap, &target, key)
}

/// Build a fresh shielded policy record: get→`raw_get`, set→`raw_set`,
/// delete→`raw_soft_delete`, has→`raw_has`.
pub fn build_policy() -> PolicyRecord {
    PolicyRecord::new(
        SHIELDED_POLICY_NAME,
        shielded_get,
        shielded_set,
        shielded_delete,
        shielded_has,
    )
}

/// Pass-through policy over the ordinary access path.  Target hooks,
/// getters and setters fire; delete removes the slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinaryPolicy;

impl InterceptionPolicy for OrdinaryPolicy {
    fn name(&self) -> &'static str {
        "ordinary"
    }

    fn get(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ShieldError> {
        Ok(heap.get_property(target, key)?)
    }

    fn set(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ShieldError> {
        Ok(heap.set_property(target, key, value)?)
    }

    fn delete_property(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: PropertyKey,
    ) -> Result<bool, ShieldError> {
        Ok(heap.delete_property(target, &key)?)
    }

    fn has(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ShieldError> {
        Ok(heap.has_property(target, key)?)
    }
}
