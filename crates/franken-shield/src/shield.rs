//! Wrapped values.
//!
//! [`Shielded`] binds a policy to a target object.  Every get/set/delete/has
//! on the wrapper goes to the policy, never to the target's own behaviour,
//! and the target handle is not reachable through the wrapper's public API.
//! Each routed event appends a structured [`InterceptionEvent`] to an
//! in-memory buffer the host drains.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ShieldConfig, WriteRejection};
use crate::error::ShieldError;
use crate::object_model::{HookEvent, JsValue, ObjectHandle, ObjectHeap, PropertyKey};
use crate::policy::{InterceptionPolicy, PolicyRecord, build_policy};

pub const SHIELD_COMPONENT: &str = "franken_shield";

/// Structured record of one routed property event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptionEvent {
    pub seq: u64,
    pub trace_id: String,
    pub component: String,
    pub policy: String,
    pub event: HookEvent,
    pub key: String,
    /// `allow`, `reject` (write refused by the target) or `error`.
    pub outcome: String,
    pub error_code: Option<String>,
}

/// A target object bound to an interception policy.
pub struct Shielded<P = PolicyRecord> {
    target: ObjectHandle,
    policy: P,
    config: ShieldConfig,
    events: VecDeque<InterceptionEvent>,
    next_seq: u64,
    dropped_events: u64,
}

/// Wrap `value` with a freshly built shielded policy and default config.
pub fn wrap(heap: &ObjectHeap, value: &JsValue) -> Result<Shielded<PolicyRecord>, ShieldError> {
    wrap_with(heap, value, build_policy(), ShieldConfig::default())
}

/// Wrap `value` with a caller supplied policy and config.
///
/// `value` must be an object that lives in `heap`.
pub fn wrap_with<P: InterceptionPolicy>(
    heap: &ObjectHeap,
    value: &JsValue,
    policy: P,
    config: ShieldConfig,
) -> Result<Shielded<P>, ShieldError> {
    config.validate()?;
    let JsValue::Object(target) = value else {
        return Err(ShieldError::InvalidTarget {
            type_name: value.type_name(),
        });
    };
    if !heap.contains(*target) {
        return Err(ShieldError::InvalidTarget {
            type_name: "detached object",
        });
    }
    Ok(Shielded {
        target: *target,
        policy,
        config,
        events: VecDeque::new(),
        next_seq: 0,
        dropped_events: 0,
    })
}

impl<P> Shielded<P> {
    pub(crate) fn target_handle(&self) -> ObjectHandle {
        self.target
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> &VecDeque<InterceptionEvent> {
        &self.events
    }

    /// Number of buffered events of one kind.
    pub fn event_count(&self, event: HookEvent) -> usize {
        self.events.iter().filter(|e| e.event == event).count()
    }

    pub fn drain_events(&mut self) -> Vec<InterceptionEvent> {
        self.events.drain(..).collect()
    }

    /// Events discarded because the buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }
}

impl<P: InterceptionPolicy> Shielded<P> {
    pub fn get(&mut self, heap: &mut ObjectHeap, key: &PropertyKey) -> Result<JsValue, ShieldError> {
        let result = self.policy.get(heap, self.target, key);
        self.record(HookEvent::Get, key, result.as_ref().map(|_| true));
        result
    }

    /// A write the target refuses is `Ok(false)`, or `RejectedWrite` when the
    /// config says to throw.
    pub fn set(
        &mut self,
        heap: &mut ObjectHeap,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ShieldError> {
        let result = self.policy.set(heap, self.target, key.clone(), value);
        self.record(HookEvent::Set, &key, result.as_ref().copied());
        self.reject_or_pass(result, key, "set")
    }

    pub fn delete_property(
        &mut self,
        heap: &mut ObjectHeap,
        key: PropertyKey,
    ) -> Result<bool, ShieldError> {
        let result = self.policy.delete_property(heap, self.target, key.clone());
        self.record(HookEvent::DeleteProperty, &key, result.as_ref().copied());
        self.reject_or_pass(result, key, "delete_property")
    }

    pub fn has(&mut self, heap: &mut ObjectHeap, key: &PropertyKey) -> Result<bool, ShieldError> {
        let result = self.policy.has(heap, self.target, key);
        self.record(HookEvent::Has, key, result.as_ref().map(|_| true));
        result
    }

    fn reject_or_pass(
        &self,
        result: Result<bool, ShieldError>,
        key: PropertyKey,
        operation: &'static str,
    ) -> Result<bool, ShieldError> {
        match (result, self.config.write_rejection) {
            (Ok(false), WriteRejection::Throw) => Err(ShieldError::RejectedWrite { key, operation }),
            (other, _) => other,
        }
    }

    fn record(&mut self, event: HookEvent, key: &PropertyKey, outcome: Result<bool, &ShieldError>) {
        if !self.config.record_events {
            return;
        }
        let (outcome, error_code) = match outcome {
            Ok(true) => ("allow", None),
            Ok(false) => ("reject", None),
            Err(e) => ("error", Some(e.error_code().to_string())),
        };
        if self.events.len() >= self.config.max_events {
            self.events.pop_front();
            self.dropped_events += 1;
        }
        self.events.push_back(InterceptionEvent {
            seq: self.next_seq,
            trace_id: self.config.trace_id.clone(),
            component: SHIELD_COMPONENT.to_string(),
            policy: self.policy.name().to_string(),
            event,
            key: key.to_string(),
            outcome: outcome.to_string(),
            error_code,
        });
        self.next_seq += 1;
    }
}

impl<P: InterceptionPolicy> fmt::Debug for Shielded<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shielded")
            .field("policy", &self.policy.name())
            .field("buffered_events", &self.events.len())
            .field("dropped_events", &self.dropped_events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_model::{FunctionBehavior, HookSet, PropertyDescriptor};
    use crate::policy::OrdinaryPolicy;
    use crate::raw_access::{raw_get, raw_has, raw_set};

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    fn num(n: i64) -> JsValue {
        JsValue::Number(n)
    }

    // -----------------------------------------------------------------------
    // wrap preconditions
    // -----------------------------------------------------------------------

    #[test]
    fn wrap_rejects_primitives() {
        let heap = ObjectHeap::new();
        for value in [
            num(5),
            JsValue::Str("x".to_string()),
            JsValue::Bool(true),
            JsValue::Null,
            JsValue::Undefined,
            JsValue::BigInt(1),
        ] {
            let err = wrap(&heap, &value).unwrap_err();
            assert_eq!(err.error_code(), "FE-SHIELD-0002", "value {value}");
        }
        assert_eq!(
            wrap(&heap, &num(5)).unwrap_err(),
            ShieldError::InvalidTarget { type_name: "number" }
        );
    }

    #[test]
    fn wrap_rejects_detached_handle() {
        let heap = ObjectHeap::new();
        assert_eq!(
            wrap(&heap, &JsValue::Object(ObjectHandle(0))).unwrap_err(),
            ShieldError::InvalidTarget {
                type_name: "detached object"
            }
        );
    }

    #[test]
    fn wrap_with_rejects_invalid_config() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let config = ShieldConfig {
            max_events: 0,
            ..ShieldConfig::default()
        };
        assert!(matches!(
            wrap_with(&heap, &JsValue::Object(obj), build_policy(), config),
            Err(ShieldError::InvalidConfig { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // routing
    // -----------------------------------------------------------------------

    #[test]
    fn round_trip_through_wrapper_matches_raw() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let mut shielded = wrap(&heap, &JsValue::Object(obj)).unwrap();

        assert!(shielded.set(&mut heap, key("a"), num(1)).unwrap());
        assert_eq!(shielded.get(&mut heap, &key("a")).unwrap(), num(1));
        assert_eq!(raw_get(&heap, &obj, &key("a")).unwrap(), num(1));
        assert!(shielded.has(&mut heap, &key("a")).unwrap());
        assert!(shielded.delete_property(&mut heap, key("a")).unwrap());
        assert!(raw_has(&heap, &obj, &key("a")).unwrap());
        assert_eq!(shielded.get(&mut heap, &key("a")).unwrap(), JsValue::Undefined);
    }

    #[test]
    fn wrapper_fires_no_target_hooks_or_accessors() {
        let mut heap = ObjectHeap::new();
        let hook = heap.alloc_function(FunctionBehavior::Noop).unwrap();
        let getter = heap.alloc_function(FunctionBehavior::ReturnConstant(num(1))).unwrap();
        let backing = heap.alloc_plain().unwrap();
        heap.define_own_property(backing, key("g"), PropertyDescriptor::accessor(Some(getter), None))
            .unwrap();
        let hooked = heap.alloc_hooked(backing, HookSet::uniform(hook)).unwrap();
        let mut shielded = wrap(&heap, &JsValue::Object(hooked)).unwrap();

        shielded.get(&mut heap, &key("g")).unwrap();
        shielded.set(&mut heap, key("x"), num(2)).unwrap();
        shielded.has(&mut heap, &key("x")).unwrap();
        shielded.delete_property(&mut heap, key("x")).unwrap();

        assert_eq!(heap.invocation_count(hook).unwrap(), 0);
        assert_eq!(heap.invocation_count(getter).unwrap(), 0);
    }

    #[test]
    fn missing_property_passes_through_and_is_recorded() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let mut shielded = wrap(&heap, &JsValue::Object(obj)).unwrap();
        let err = shielded.get(&mut heap, &key("nope")).unwrap_err();
        assert_eq!(err, ShieldError::MissingProperty { key: key("nope") });
        let event = &shielded.events()[0];
        assert_eq!(event.outcome, "error");
        assert_eq!(event.error_code.as_deref(), Some("FE-SHIELD-0001"));
    }

    #[test]
    fn rejected_write_returns_false_by_default() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        heap.prevent_extensions(obj).unwrap();
        let mut shielded = wrap(&heap, &JsValue::Object(obj)).unwrap();
        assert!(!shielded.set(&mut heap, key("a"), num(1)).unwrap());
        assert_eq!(shielded.events()[0].outcome, "reject");
    }

    #[test]
    fn rejected_write_throws_when_configured() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        heap.define_own_property(obj, key("frozen"), PropertyDescriptor::data_frozen(num(1)))
            .unwrap();
        let config = ShieldConfig::default().with_write_rejection(WriteRejection::Throw);
        let mut shielded = wrap_with(&heap, &JsValue::Object(obj), build_policy(), config).unwrap();

        assert_eq!(
            shielded.set(&mut heap, key("frozen"), num(2)).unwrap_err(),
            ShieldError::RejectedWrite {
                key: key("frozen"),
                operation: "set"
            }
        );
        assert_eq!(
            shielded.delete_property(&mut heap, key("frozen")).unwrap_err(),
            ShieldError::RejectedWrite {
                key: key("frozen"),
                operation: "delete_property"
            }
        );
        // Accepted writes are unaffected.
        assert!(shielded.set(&mut heap, key("other"), num(3)).unwrap());
    }

    // -----------------------------------------------------------------------
    // events
    // -----------------------------------------------------------------------

    #[test]
    fn events_carry_sequence_and_trace() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let config = ShieldConfig::default().with_trace_id("trace-7");
        let mut shielded = wrap_with(&heap, &JsValue::Object(obj), build_policy(), config).unwrap();
        shielded.set(&mut heap, key("a"), num(1)).unwrap();
        shielded.has(&mut heap, &key("a")).unwrap();

        let events = shielded.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 0);
        assert_eq!(events[1].seq, 1);
        assert_eq!(events[0].event, HookEvent::Set);
        assert_eq!(events[1].event, HookEvent::Has);
        assert!(events.iter().all(|e| e.trace_id == "trace-7"));
        assert!(events.iter().all(|e| e.component == SHIELD_COMPONENT));
        assert!(events.iter().all(|e| e.policy == "shielded"));
        assert!(shielded.events().is_empty());
    }

    #[test]
    fn event_buffer_drops_oldest_when_full() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let config = ShieldConfig {
            max_events: 2,
            ..ShieldConfig::default()
        };
        let mut shielded = wrap_with(&heap, &JsValue::Object(obj), build_policy(), config).unwrap();
        for n in 0..5 {
            shielded.set(&mut heap, key("a"), num(n)).unwrap();
        }
        assert_eq!(shielded.events().len(), 2);
        assert_eq!(shielded.dropped_events(), 3);
        assert_eq!(shielded.events()[0].seq, 3);
    }

    #[test]
    fn recording_can_be_disabled() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let config = ShieldConfig {
            record_events: false,
            ..ShieldConfig::default()
        };
        let mut shielded = wrap_with(&heap, &JsValue::Object(obj), build_policy(), config).unwrap();
        shielded.set(&mut heap, key("a"), num(1)).unwrap();
        assert!(shielded.events().is_empty());
    }

    #[test]
    fn raw_set_against_wrapper_is_silent() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let mut shielded = wrap_with(&heap, &JsValue::Object(obj), OrdinaryPolicy, ShieldConfig::default())
            .unwrap();
        shielded.set(&mut heap, key("a"), num(1)).unwrap();
        assert!(raw_set(&mut heap, &shielded, key("asd"), num(4)).unwrap());
        assert_eq!(shielded.events().len(), 1);
        assert_eq!(raw_get(&heap, &obj, &key("asd")).unwrap(), num(4));
        assert_eq!(shielded.get(&mut heap, &key("asd")).unwrap(), num(4));
    }

    #[test]
    fn debug_output_hides_target() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain().unwrap();
        let shielded = wrap(&heap, &JsValue::Object(obj)).unwrap();
        let rendered = format!("{shielded:?}");
        assert!(rendered.contains("shielded"));
        assert!(!rendered.contains("target"));
    }

    #[test]
    fn interception_event_serde_round_trip() {
        let event = InterceptionEvent {
            seq: 4,
            trace_id: "t".to_string(),
            component: SHIELD_COMPONENT.to_string(),
            policy: "shielded".to_string(),
            event: HookEvent::DeleteProperty,
            key: "a".to_string(),
            outcome: "allow".to_string(),
            error_code: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"delete_property\""));
        let back: InterceptionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
