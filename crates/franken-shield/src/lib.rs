#![forbid(unsafe_code)]
//! Property interception shield.
//!
//! Raw property operations that bypass an object's own getters, setters and
//! hooks, and a wrapper that routes every get/set/delete/has on a value
//! through a policy built from those operations.

pub mod config;
pub mod error;
pub mod object_model;
pub mod policy;
pub mod primitive;
pub mod raw_access;
pub mod shield;

pub use config::{ShieldConfig, WriteRejection};
pub use error::ShieldError;
pub use object_model::{JsValue, ObjectHandle, ObjectHeap, PropertyKey};
pub use policy::{InterceptionPolicy, OrdinaryPolicy, PolicyRecord, build_policy};
pub use primitive::{OverlaySource, PrimitiveCategory, classify, clense, resolve, to_object};
pub use raw_access::{RawTarget, raw_get, raw_has, raw_set, raw_soft_delete};
pub use shield::{InterceptionEvent, Shielded, wrap, wrap_with};

/// Namespace of the shield's operations, for hosts that register one
/// operation table instead of importing free functions.
pub enum Shield {}

impl Shield {
    pub fn raw_get<T: RawTarget + ?Sized>(
        heap: &ObjectHeap,
        target: &T,
        key: &PropertyKey,
    ) -> Result<JsValue, ShieldError> {
        raw_get(heap, target, key)
    }

    pub fn raw_set<T: RawTarget + ?Sized>(
        heap: &mut ObjectHeap,
        target: &T,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ShieldError> {
        raw_set(heap, target, key, value)
    }

    pub fn raw_soft_delete<T: RawTarget + ?Sized>(
        heap: &mut ObjectHeap,
        target: &T,
        key: PropertyKey,
    ) -> Result<bool, ShieldError> {
        raw_soft_delete(heap, target, key)
    }

    pub fn raw_has<T: RawTarget + ?Sized>(
        heap: &ObjectHeap,
        target: &T,
        key: &PropertyKey,
    ) -> Result<bool, ShieldError> {
        raw_has(heap, target, key)
    }

    pub fn build_policy() -> PolicyRecord {
        build_policy()
    }

    pub fn wrap(heap: &ObjectHeap, value: &JsValue) -> Result<Shielded, ShieldError> {
        wrap(heap, value)
    }

    pub fn resolve<S: OverlaySource>(heap: &mut ObjectHeap, value: S) -> Result<JsValue, ShieldError> {
        resolve(heap, value)
    }

    pub fn clense<S: OverlaySource>(heap: &mut ObjectHeap, value: S) -> Result<ObjectHandle, ShieldError> {
        clense(heap, value)
    }
}
