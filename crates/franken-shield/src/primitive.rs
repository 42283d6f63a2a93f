//! Primitive templates and cleansing.
//!
//! [`resolve`] maps a value to a fresh zero value of its category;
//! [`clense`] overlays a value's own enumerable properties onto that
//! template, normalising a foreign or wrapped value back toward a plain
//! primitive-derived shape.  Both accept a plain [`JsValue`] or a
//! [`Shielded`] wrapper (see [`OverlaySource`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShieldError;
use crate::object_model::{FunctionBehavior, JsValue, ObjectError, ObjectHandle, ObjectHeap, PropertyKey};
use crate::policy::InterceptionPolicy;
use crate::shield::Shielded;

/// Runtime classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveCategory {
    Null,
    Undefined,
    String,
    Number,
    Boolean,
    Symbol,
    Function,
    Object,
    BigInt,
    /// An object handle the heap cannot resolve.
    Unclassified,
}

impl PrimitiveCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Symbol => "symbol",
            Self::Function => "function",
            Self::Object => "object",
            Self::BigInt => "bigint",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for PrimitiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooked objects classify by their backing object, so a hooked function
/// is a `Function`.
pub fn classify(heap: &ObjectHeap, value: &JsValue) -> PrimitiveCategory {
    match value {
        JsValue::Undefined => PrimitiveCategory::Undefined,
        JsValue::Null => PrimitiveCategory::Null,
        JsValue::Bool(_) => PrimitiveCategory::Boolean,
        JsValue::Number(_) => PrimitiveCategory::Number,
        JsValue::BigInt(_) => PrimitiveCategory::BigInt,
        JsValue::Str(_) => PrimitiveCategory::String,
        JsValue::Symbol(_) => PrimitiveCategory::Symbol,
        JsValue::Object(handle) => match heap.storage(*handle) {
            Ok(o) if o.is_callable() => PrimitiveCategory::Function,
            Ok(_) => PrimitiveCategory::Object,
            Err(_) => PrimitiveCategory::Unclassified,
        },
    }
}

mod private {
    pub trait Sealed {}
}

/// A value [`resolve`] and [`clense`] can normalise.
///
/// A plain value is read through the ordinary access path.  A wrapped value
/// is read through its policy: keys come from the target's own-key table and
/// each value from the policy's `get`, recorded as an interception event.
pub trait OverlaySource: private::Sealed {
    fn category(&self, heap: &ObjectHeap) -> PrimitiveCategory;

    /// Own enumerable entries in own-key order.
    fn enumerable_entries(
        &mut self,
        heap: &mut ObjectHeap,
    ) -> Result<Vec<(PropertyKey, JsValue)>, ShieldError>;
}

impl private::Sealed for &JsValue {}

impl OverlaySource for &JsValue {
    fn category(&self, heap: &ObjectHeap) -> PrimitiveCategory {
        classify(heap, self)
    }

    fn enumerable_entries(
        &mut self,
        heap: &mut ObjectHeap,
    ) -> Result<Vec<(PropertyKey, JsValue)>, ShieldError> {
        match *self {
            JsValue::Str(s) => Ok(s
                .chars()
                .enumerate()
                .map(|(i, c)| (PropertyKey::String(i.to_string()), JsValue::Str(c.to_string())))
                .collect()),
            JsValue::Object(handle) => {
                let keys = enumerable_keys(heap, *handle)?;
                let mut entries = Vec::with_capacity(keys.len());
                for key in keys {
                    let value = heap.get_property(*handle, &key)?;
                    entries.push((key, value));
                }
                Ok(entries)
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl<P: InterceptionPolicy> private::Sealed for &mut Shielded<P> {}

impl<P: InterceptionPolicy> OverlaySource for &mut Shielded<P> {
    fn category(&self, heap: &ObjectHeap) -> PrimitiveCategory {
        classify(heap, &JsValue::Object(self.target_handle()))
    }

    fn enumerable_entries(
        &mut self,
        heap: &mut ObjectHeap,
    ) -> Result<Vec<(PropertyKey, JsValue)>, ShieldError> {
        let keys = enumerable_keys(heap, self.target_handle())?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(heap, &key)?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

/// Enumerable own keys, read from the descriptor table without firing hooks.
fn enumerable_keys(heap: &ObjectHeap, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ShieldError> {
    Ok(heap
        .describe(handle)?
        .into_iter()
        .filter(|(_, desc)| desc.is_enumerable())
        .map(|(key, _)| key)
        .collect())
}

fn template_for(heap: &mut ObjectHeap, category: PrimitiveCategory) -> Result<JsValue, ObjectError> {
    Ok(match category {
        PrimitiveCategory::Null => JsValue::Null,
        PrimitiveCategory::Undefined | PrimitiveCategory::Unclassified => JsValue::Undefined,
        PrimitiveCategory::String => JsValue::Str(String::new()),
        PrimitiveCategory::Number => JsValue::Number(0),
        PrimitiveCategory::Boolean => JsValue::Bool(false),
        PrimitiveCategory::Symbol => JsValue::Symbol(heap.alloc_symbol()?),
        PrimitiveCategory::Function => JsValue::Object(heap.alloc_function(FunctionBehavior::Noop)?),
        PrimitiveCategory::Object => JsValue::Object(heap.alloc_plain()?),
        PrimitiveCategory::BigInt => JsValue::BigInt(0),
    })
}

/// Fresh zero value of `value`'s category.  `null` and `undefined` pass
/// through; an unclassifiable value resolves to `undefined`.  Fails only when
/// the heap cannot allocate the template.
pub fn resolve<S: OverlaySource>(heap: &mut ObjectHeap, value: S) -> Result<JsValue, ShieldError> {
    let category = value.category(heap);
    Ok(template_for(heap, category)?)
}

/// `ToObject`: objects pass through, primitives get a wrapper object.
pub fn to_object(heap: &mut ObjectHeap, value: &JsValue) -> Result<ObjectHandle, ShieldError> {
    match value {
        JsValue::Object(handle) => {
            heap.get(*handle)?;
            Ok(*handle)
        }
        JsValue::Undefined | JsValue::Null => Err(ShieldError::OverlayTarget {
            category: classify(heap, value).as_str(),
        }),
        primitive => Ok(heap.alloc_wrapper(primitive.clone())?),
    }
}

/// Overlay `value`'s own enumerable properties onto its primitive template.
///
/// The result is a new object; `value` is left untouched.  Fails with
/// `OverlayTarget` when the template is `null`/`undefined`.
pub fn clense<S: OverlaySource>(heap: &mut ObjectHeap, mut value: S) -> Result<ObjectHandle, ShieldError> {
    let category = value.category(heap);
    let template = template_for(heap, category)?;
    if template.is_nullish() {
        return Err(ShieldError::OverlayTarget {
            category: category.as_str(),
        });
    }
    let target = to_object(heap, &template)?;
    for (key, v) in value.enumerable_entries(heap)? {
        if !heap.set_property(target, key.clone(), v)? {
            return Err(ShieldError::RejectedWrite {
                key,
                operation: "clense",
            });
        }
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_model::{HookEvent, HookSet, ObjectKind, PropertyDescriptor};
    use crate::shield::wrap;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    fn num(n: i64) -> JsValue {
        JsValue::Number(n)
    }

    fn kind_of(heap: &ObjectHeap, handle: ObjectHandle) -> ObjectKind {
        heap.storage(handle).unwrap().kind.clone()
    }

    // -----------------------------------------------------------------------
    // classify / resolve
    // -----------------------------------------------------------------------

    #[test]
    fn classify_covers_every_value_kind() {
        let mut heap = ObjectHeap::new();
        let f = heap.alloc_function(FunctionBehavior::Noop).unwrap();
        let o = heap.alloc_plain().unwrap();
        let cases = [
            (JsValue::Null, PrimitiveCategory::Null),
            (JsValue::Undefined, PrimitiveCategory::Undefined),
            (JsValue::Str("s".to_string()), PrimitiveCategory::String),
            (num(1), PrimitiveCategory::Number),
            (JsValue::Bool(true), PrimitiveCategory::Boolean),
            (JsValue::Symbol(heap.alloc_symbol().unwrap()), PrimitiveCategory::Symbol),
            (JsValue::Object(f), PrimitiveCategory::Function),
            (JsValue::Object(o), PrimitiveCategory::Object),
            (JsValue::BigInt(9), PrimitiveCategory::BigInt),
            (JsValue::Object(ObjectHandle(77)), PrimitiveCategory::Unclassified),
        ];
        for (value, expected) in cases {
            assert_eq!(classify(&heap, &value), expected, "value {value}");
        }
    }

    #[test]
    fn resolve_passes_null_and_undefined_through() {
        let mut heap = ObjectHeap::new();
        assert_eq!(resolve(&mut heap, &JsValue::Null).unwrap(), JsValue::Null);
        assert_eq!(resolve(&mut heap, &JsValue::Undefined).unwrap(), JsValue::Undefined);
        assert!(heap.is_empty());
    }

    #[test]
    fn resolve_primitives_to_zero_values() {
        let mut heap = ObjectHeap::new();
        let s = resolve(&mut heap, &JsValue::Str("abc".to_string())).unwrap();
        assert_eq!(s, JsValue::Str(String::new()));
        assert_ne!(s, JsValue::Str("abc".to_string()));
        assert_eq!(resolve(&mut heap, &num(42)).unwrap(), num(0));
        assert_eq!(resolve(&mut heap, &JsValue::Bool(true)).unwrap(), JsValue::Bool(false));
        assert_eq!(resolve(&mut heap, &JsValue::BigInt(12)).unwrap(), JsValue::BigInt(0));
    }

    #[test]
    fn resolve_symbol_allocates_fresh_symbol() {
        let mut heap = ObjectHeap::new();
        let original = heap.alloc_symbol().unwrap();
        let resolved = resolve(&mut heap, &JsValue::Symbol(original)).unwrap();
        assert!(matches!(resolved, JsValue::Symbol(id) if id != original));
    }

    #[test]
    fn resolve_objects_allocate_empty_templates() {
        let mut heap = ObjectHeap::new();
        let o = heap.alloc_plain().unwrap();
        heap.set_property(o, key("a"), num(1)).unwrap();
        let f = heap.alloc_function(FunctionBehavior::ReturnConstant(num(3))).unwrap();

        let JsValue::Object(plain) = resolve(&mut heap, &JsValue::Object(o)).unwrap() else {
            panic!("object template expected");
        };
        assert_ne!(plain, o);
        assert!(heap.own_property_keys(plain).unwrap().is_empty());

        let JsValue::Object(func) = resolve(&mut heap, &JsValue::Object(f)).unwrap() else {
            panic!("function template expected");
        };
        assert_eq!(kind_of(&heap, func), ObjectKind::Function(FunctionBehavior::Noop));
        assert_eq!(heap.call(func, &JsValue::Undefined, &[]).unwrap(), JsValue::Undefined);
    }

    #[test]
    fn resolve_unclassified_is_undefined() {
        let mut heap = ObjectHeap::new();
        assert_eq!(
            resolve(&mut heap, &JsValue::Object(ObjectHandle(3))).unwrap(),
            JsValue::Undefined
        );
    }

    #[test]
    fn hooked_function_classifies_and_resolves_as_function() {
        let mut heap = ObjectHeap::new();
        let hook = heap.alloc_function(FunctionBehavior::Noop).unwrap();
        let f = heap.alloc_function(FunctionBehavior::ReturnConstant(num(1))).unwrap();
        let hooked = heap.alloc_hooked(f, HookSet::uniform(hook)).unwrap();

        assert_eq!(classify(&heap, &JsValue::Object(hooked)), PrimitiveCategory::Function);
        let JsValue::Object(template) = resolve(&mut heap, &JsValue::Object(hooked)).unwrap() else {
            panic!("function template expected");
        };
        assert_eq!(kind_of(&heap, template), ObjectKind::Function(FunctionBehavior::Noop));
        assert_eq!(heap.invocation_count(hook).unwrap(), 0);
    }

    #[test]
    fn wrapped_value_classifies_by_its_target() {
        let mut heap = ObjectHeap::new();
        let f = heap.alloc_function(FunctionBehavior::Noop).unwrap();
        let o = heap.alloc_plain().unwrap();
        let mut wrapped_fn = wrap(&heap, &JsValue::Object(f)).unwrap();
        let mut wrapped_obj = wrap(&heap, &JsValue::Object(o)).unwrap();
        assert_eq!((&mut wrapped_fn).category(&heap), PrimitiveCategory::Function);
        assert!(matches!(
            resolve(&mut heap, &mut wrapped_fn).unwrap(),
            JsValue::Object(h) if heap.is_callable(h) && h != f
        ));
        assert_eq!((&mut wrapped_obj).category(&heap), PrimitiveCategory::Object);
    }

    // -----------------------------------------------------------------------
    // clense
    // -----------------------------------------------------------------------

    #[test]
    fn clense_plain_object_copies_enumerable_properties() {
        let mut heap = ObjectHeap::new();
        let o = heap.alloc_plain().unwrap();
        heap.set_property(o, key("a"), num(1)).unwrap();
        heap.set_property(o, key("b"), num(2)).unwrap();
        heap.define_own_property(o, key("hidden"), PropertyDescriptor::data_frozen(num(3)))
            .unwrap();

        let out = clense(&mut heap, &JsValue::Object(o)).unwrap();
        assert_ne!(out, o);
        assert_eq!(kind_of(&heap, out), ObjectKind::Plain);
        assert_eq!(
            heap.describe(out).unwrap(),
            vec![
                (key("a"), PropertyDescriptor::data(num(1))),
                (key("b"), PropertyDescriptor::data(num(2))),
            ]
        );
    }

    #[test]
    fn clense_number_is_zero_wrapper_without_keys() {
        let mut heap = ObjectHeap::new();
        let out = clense(&mut heap, &num(42)).unwrap();
        assert_eq!(kind_of(&heap, out), ObjectKind::PrimitiveWrapper(num(0)));
        assert!(heap.own_property_keys(out).unwrap().is_empty());
    }

    #[test]
    fn clense_string_copies_characters_onto_empty_string_wrapper() {
        let mut heap = ObjectHeap::new();
        let out = clense(&mut heap, &JsValue::Str("ab".to_string())).unwrap();
        assert_eq!(
            kind_of(&heap, out),
            ObjectKind::PrimitiveWrapper(JsValue::Str(String::new()))
        );
        assert_eq!(
            heap.get_property(out, &key("1")).unwrap(),
            JsValue::Str("b".to_string())
        );
        assert_eq!(heap.own_property_keys(out).unwrap(), vec![key("0"), key("1")]);
    }

    #[test]
    fn clense_null_and_undefined_fail() {
        let mut heap = ObjectHeap::new();
        assert_eq!(
            clense(&mut heap, &JsValue::Null).unwrap_err(),
            ShieldError::OverlayTarget { category: "null" }
        );
        let err = clense(&mut heap, &JsValue::Undefined).unwrap_err();
        assert_eq!(err.error_code(), "FE-SHIELD-0004");
    }

    #[test]
    fn clense_unclassified_fails() {
        let mut heap = ObjectHeap::new();
        assert_eq!(
            clense(&mut heap, &JsValue::Object(ObjectHandle(8))).unwrap_err(),
            ShieldError::OverlayTarget {
                category: "unclassified"
            }
        );
    }

    #[test]
    fn clense_reads_enumerable_accessors_through_getter() {
        let mut heap = ObjectHeap::new();
        let getter = heap.alloc_function(FunctionBehavior::ReturnConstant(num(5))).unwrap();
        let o = heap.alloc_plain().unwrap();
        heap.define_own_property(o, key("g"), PropertyDescriptor::accessor(Some(getter), None))
            .unwrap();
        let out = clense(&mut heap, &JsValue::Object(o)).unwrap();
        assert_eq!(heap.get_property(out, &key("g")).unwrap(), num(5));
        assert_eq!(heap.invocation_count(getter).unwrap(), 1);
    }

    #[test]
    fn clense_function_keeps_callability() {
        let mut heap = ObjectHeap::new();
        let f = heap.alloc_function(FunctionBehavior::ReturnConstant(num(3))).unwrap();
        heap.set_property(f, key("meta"), num(1)).unwrap();
        let out = clense(&mut heap, &JsValue::Object(f)).unwrap();
        assert!(heap.is_callable(out));
        assert_eq!(heap.get_property(out, &key("meta")).unwrap(), num(1));
    }

    #[test]
    fn clense_wrapped_value_reads_through_policy() {
        let mut heap = ObjectHeap::new();
        let getter = heap.alloc_function(FunctionBehavior::ReturnConstant(num(5))).unwrap();
        let o = heap.alloc_plain().unwrap();
        heap.set_property(o, key("a"), num(1)).unwrap();
        heap.define_own_property(o, key("g"), PropertyDescriptor::accessor(Some(getter), None))
            .unwrap();
        let mut wrapped = wrap(&heap, &JsValue::Object(o)).unwrap();

        let out = clense(&mut heap, &mut wrapped).unwrap();
        assert_ne!(out, o);
        assert_eq!(heap.get_property(out, &key("a")).unwrap(), num(1));
        // The shielded policy reads the stored value, so the getter stays idle.
        assert_eq!(heap.get_property(out, &key("g")).unwrap(), JsValue::Undefined);
        assert_eq!(heap.invocation_count(getter).unwrap(), 0);
        assert_eq!(wrapped.event_count(HookEvent::Get), 2);
    }

    #[test]
    fn to_object_wraps_primitives_and_passes_objects() {
        let mut heap = ObjectHeap::new();
        let o = heap.alloc_plain().unwrap();
        assert_eq!(to_object(&mut heap, &JsValue::Object(o)).unwrap(), o);
        let w = to_object(&mut heap, &JsValue::Bool(true)).unwrap();
        assert_eq!(kind_of(&heap, w), ObjectKind::PrimitiveWrapper(JsValue::Bool(true)));
        assert!(to_object(&mut heap, &JsValue::Null).is_err());
    }
}
