//! Host object model the shield operates on: property descriptors, hooked
//! objects, and native functions with observable invocation counts.
//!
//! The model supplies the reflection primitives the interception layer sits
//! on:
//!
//! - **Property descriptors**: data vs accessor, configurable/enumerable/writable
//! - **Descriptor patches**: partial descriptors as accepted by a define
//! - **Hooked objects**: get/set/deleteProperty/has hooks that fire on the
//!   ordinary access path before reaching backing storage
//! - **Native functions**: deterministic behaviours with an invocation counter
//! - **Ordinary access path**: `get_property` / `set_property` /
//!   `delete_property` / `has_property`, which fire accessors and hooks
//!
//! Everything that fires a getter, setter or hook goes through
//! [`ObjectHeap::call`], so a bypassed hook is observable as a zero count.
//!
//! `BTreeMap`/`BTreeSet` for deterministic ordering.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Serialize/deserialize `BTreeMap<PropertyKey, PropertyDescriptor>` as a
/// sorted sequence of `[key, descriptor]` pairs.  serde_json requires string
/// keys for JSON maps but `PropertyKey` is an enum.
mod properties_as_seq {
    use super::{BTreeMap, PropertyDescriptor, PropertyKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<PropertyKey, PropertyDescriptor>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&PropertyKey, &PropertyDescriptor)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PropertyKey, PropertyDescriptor>, D::Error> {
        let pairs: Vec<(PropertyKey, PropertyDescriptor)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// PropertyKey: string or symbol
// ---------------------------------------------------------------------------

/// Unique symbol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// A property key: either a string or a symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    /// String key.
    String(String),
    /// Symbol key.
    Symbol(SymbolId),
}

impl PropertyKey {
    /// The key as a runtime value (what hooks receive as their key argument).
    pub fn to_value(&self) -> JsValue {
        match self {
            Self::String(s) => JsValue::Str(s.clone()),
            Self::Symbol(id) => JsValue::Symbol(*id),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<SymbolId> for PropertyKey {
    fn from(id: SymbolId) -> Self {
        Self::Symbol(id)
    }
}

// ---------------------------------------------------------------------------
// ObjectHandle / JsValue
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object on the managed heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

/// Runtime value.
///
/// Functions are objects whose kind is [`ObjectKind::Function`]; telling them
/// apart from plain objects needs the heap (see [`ObjectHeap::type_of`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(i64),
    BigInt(i128),
    Str(String),
    Symbol(SymbolId),
    Object(ObjectHandle),
}

impl JsValue {
    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// `typeof` without heap access; callable objects report `"object"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
        }
    }

    /// SameValue comparison.
    pub fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::BigInt(n) => write!(f, "{n}n"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
            Self::Object(h) => write!(f, "[object#{}]", h.0),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// Complete property descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyDescriptor {
    /// Data descriptor: has `value` and `writable`.
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Accessor descriptor: has `get` and/or `set`.
    Accessor {
        get: Option<ObjectHandle>,
        set: Option<ObjectHandle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Create a default data descriptor (writable, enumerable, configurable).
    pub fn data(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Create a non-writable, non-enumerable, non-configurable data descriptor.
    pub fn data_frozen(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    /// Create an enumerable, configurable accessor descriptor.
    pub fn accessor(get: Option<ObjectHandle>, set: Option<ObjectHandle>) -> Self {
        Self::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Get the value if this is a data descriptor.
    pub fn value(&self) -> Option<&JsValue> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Is this a data descriptor with writable=true?
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }

    pub fn set_non_configurable(&mut self) {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => {
                *configurable = false;
            }
        }
    }

    /// No-op for accessors.
    pub fn set_non_writable(&mut self) {
        if let Self::Data { writable, .. } = self {
            *writable = false;
        }
    }
}

// ---------------------------------------------------------------------------
// DescriptorPatch: partial data descriptor
// ---------------------------------------------------------------------------

/// A partial data descriptor: absent fields keep the existing attribute, or
/// take the creation default when the property is new.
///
/// Creation defaults: `undefined` value, writable, non-enumerable,
/// configurable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPatch {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl DescriptorPatch {
    /// Patch that only carries a value.
    pub fn value(value: JsValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Resolve this patch against the current descriptor (or `None` for a
    /// new property) into a complete descriptor.
    pub fn resolve(&self, current: Option<&PropertyDescriptor>) -> PropertyDescriptor {
        match current {
            Some(PropertyDescriptor::Data {
                value,
                writable,
                enumerable,
                configurable,
            }) => PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or_else(|| value.clone()),
                writable: self.writable.unwrap_or(*writable),
                enumerable: self.enumerable.unwrap_or(*enumerable),
                configurable: self.configurable.unwrap_or(*configurable),
            },
            // Data patch over an accessor converts it to a data property.
            Some(PropertyDescriptor::Accessor {
                enumerable,
                configurable,
                ..
            }) => PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or(JsValue::Undefined),
                writable: self.writable.unwrap_or(true),
                enumerable: self.enumerable.unwrap_or(*enumerable),
                configurable: self.configurable.unwrap_or(*configurable),
            },
            None => PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or(JsValue::Undefined),
                writable: self.writable.unwrap_or(true),
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(true),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectError
// ---------------------------------------------------------------------------

/// Errors from object model operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectError {
    /// Host TypeError.
    TypeError(String),
    /// Object not found in the heap.
    ObjectNotFound(ObjectHandle),
    /// Callee is not a function object.
    NotCallable(ObjectHandle),
    /// Hooked-object target chain loops back on itself.
    HookCycleDetected,
    /// Hooked-object target chain exceeds the maximum depth.
    HookChainTooDeep { depth: u32, max: u32 },
    /// Prototype chain cycle detected.
    PrototypeCycleDetected,
    /// Maximum prototype chain depth exceeded.
    PrototypeChainTooDeep { depth: u32, max: u32 },
    /// Every object handle is taken.
    HeapExhausted,
    /// Every symbol id is taken.
    SymbolSpaceExhausted,
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Self::ObjectNotFound(h) => write!(f, "object#{} not found", h.0),
            Self::NotCallable(h) => write!(f, "TypeError: object#{} is not a function", h.0),
            Self::HookCycleDetected => write!(f, "TypeError: hook target chain cycle detected"),
            Self::HookChainTooDeep { depth, max } => {
                write!(f, "TypeError: hook target chain depth {depth} exceeds max {max}")
            }
            Self::PrototypeCycleDetected => write!(f, "TypeError: prototype chain cycle detected"),
            Self::PrototypeChainTooDeep { depth, max } => {
                write!(
                    f,
                    "TypeError: prototype chain depth {depth} exceeds max {max}"
                )
            }
            Self::HeapExhausted => write!(f, "RangeError: object heap exhausted"),
            Self::SymbolSpaceExhausted => write!(f, "RangeError: symbol ids exhausted"),
        }
    }
}

impl std::error::Error for ObjectError {}

/// Canonical array index: decimal digits with no sign or leading zero, below
/// 2^32 - 1.  `"01"` and `"+2"` are ordinary string keys.
fn array_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    s.parse::<u32>().ok().filter(|n| *n < u32::MAX)
}

// ---------------------------------------------------------------------------
// Function behaviours and object kinds
// ---------------------------------------------------------------------------

/// Maximum prototype chain depth to prevent infinite loops.
const MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

/// Maximum number of hooked objects stacked over one backing object.
const MAX_HOOK_CHAIN_DEPTH: u32 = 64;

/// What a native function does when called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionBehavior {
    /// Returns `undefined`.
    Noop,
    /// Returns a fixed value (getters, `toString` overrides).
    ReturnConstant(JsValue),
    /// Stores its first argument into `this` under the given key through the
    /// define path (setters with a backing slot).
    StoreInto(PropertyKey),
}

/// Internal kind of an ordinary object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Plain,
    Function(FunctionBehavior),
    /// Object wrapper around a primitive (`ToObject` result).
    PrimitiveWrapper(JsValue),
}

// ---------------------------------------------------------------------------
// OrdinaryObject
// ---------------------------------------------------------------------------

/// An ordinary object with internal slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinaryObject {
    /// `[[Prototype]]` internal slot (None means end of chain).
    pub prototype: Option<ObjectHandle>,
    /// `[[Extensible]]` internal slot.
    pub extensible: bool,
    /// Own properties with descriptors, keyed by PropertyKey.
    #[serde(with = "properties_as_seq")]
    pub properties: BTreeMap<PropertyKey, PropertyDescriptor>,
    pub kind: ObjectKind,
    /// Number of times this object was called as a function.
    pub invocations: u64,
}

impl Default for OrdinaryObject {
    fn default() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: BTreeMap::new(),
            kind: ObjectKind::Plain,
            invocations: 0,
        }
    }
}

impl OrdinaryObject {
    /// Create a new ordinary object with the given prototype.
    pub fn with_prototype(proto: Option<ObjectHandle>) -> Self {
        Self {
            prototype: proto,
            ..Self::default()
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// `[[GetOwnProperty]](P)`.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// `[[DefineOwnProperty]](P, Desc)`: define or update a property.
    ///
    /// Returns `false` if rejected by extensibility or a non-configurable
    /// conflict.
    pub fn define_own_property(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        if let Some(current) = self.properties.get(&key) {
            if !current.is_configurable() {
                if desc.is_configurable() {
                    return false;
                }
                if desc.is_enumerable() != current.is_enumerable() {
                    return false;
                }
                // Cannot change data↔accessor type.
                if current.is_data() != desc.is_data() {
                    return false;
                }
                if let (
                    PropertyDescriptor::Data {
                        writable: current_w,
                        value: current_v,
                        ..
                    },
                    PropertyDescriptor::Data {
                        writable: new_w,
                        value: new_v,
                        ..
                    },
                ) = (current, &desc)
                    && !current_w
                    && (*new_w || !current_v.same_value(new_v))
                {
                    return false;
                }
                if let (
                    PropertyDescriptor::Accessor {
                        get: cur_get,
                        set: cur_set,
                        ..
                    },
                    PropertyDescriptor::Accessor {
                        get: new_get,
                        set: new_set,
                        ..
                    },
                ) = (current, &desc)
                    && (cur_get != new_get || cur_set != new_set)
                {
                    return false;
                }
            }
            self.properties.insert(key, desc);
            true
        } else {
            if !self.extensible {
                return false;
            }
            self.properties.insert(key, desc);
            true
        }
    }

    /// Define through a partial descriptor.
    pub fn define_with_patch(&mut self, key: PropertyKey, patch: &DescriptorPatch) -> bool {
        let desc = patch.resolve(self.properties.get(&key));
        self.define_own_property(key, desc)
    }

    /// `[[Delete]](P)`: returns `false` if non-configurable.
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.properties.get(key) {
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                self.properties.remove(key);
                true
            }
            None => true,
        }
    }

    /// `[[OwnPropertyKeys]]()`: integer indices (numeric order), then string
    /// keys, then symbol keys.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut int_keys: Vec<(u32, PropertyKey)> = Vec::new();
        let mut str_keys: Vec<PropertyKey> = Vec::new();
        let mut sym_keys: Vec<PropertyKey> = Vec::new();

        for key in self.properties.keys() {
            match key {
                PropertyKey::String(s) => {
                    if let Some(n) = array_index(s) {
                        int_keys.push((n, key.clone()));
                    } else {
                        str_keys.push(key.clone());
                    }
                }
                PropertyKey::Symbol(_) => sym_keys.push(key.clone()),
            }
        }

        int_keys.sort_by_key(|(n, _)| *n);
        let mut result: Vec<PropertyKey> = int_keys.into_iter().map(|(_, k)| k).collect();
        result.extend(str_keys);
        result.extend(sym_keys);
        result
    }

    pub fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    /// All own properties non-configurable, data properties non-writable.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
            desc.set_non_writable();
        }
    }

    /// All own properties non-configurable; writability unchanged.
    pub fn seal(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
        }
    }
}

// ---------------------------------------------------------------------------
// HookedObject: object carrying its own interception hooks
// ---------------------------------------------------------------------------

/// The four observable property events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    Get,
    Set,
    DeleteProperty,
    Has,
}

impl HookEvent {
    pub const ALL: [Self; 4] = [Self::Get, Self::Set, Self::DeleteProperty, Self::Has];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::DeleteProperty => "delete_property",
            Self::Has => "has",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook functions attached to a hooked object. Absent hooks are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSet {
    pub get: Option<ObjectHandle>,
    pub set: Option<ObjectHandle>,
    pub delete_property: Option<ObjectHandle>,
    pub has: Option<ObjectHandle>,
}

impl HookSet {
    /// Same hook function for all four events.
    pub fn uniform(hook: ObjectHandle) -> Self {
        Self {
            get: Some(hook),
            set: Some(hook),
            delete_property: Some(hook),
            has: Some(hook),
        }
    }

    pub fn for_event(&self, event: HookEvent) -> Option<ObjectHandle> {
        match event {
            HookEvent::Get => self.get,
            HookEvent::Set => self.set,
            HookEvent::DeleteProperty => self.delete_property,
            HookEvent::Has => self.has,
        }
    }
}

/// An object whose ordinary get/set/delete/has fire hooks before the event
/// reaches `target`'s storage.  Hooks observe; they do not replace the
/// underlying operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookedObject {
    pub target: ObjectHandle,
    pub hooks: HookSet,
}

/// A managed object: either ordinary or hooked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagedObject {
    Ordinary(OrdinaryObject),
    Hooked(HookedObject),
}

impl ManagedObject {
    pub fn as_ordinary(&self) -> Option<&OrdinaryObject> {
        match self {
            Self::Ordinary(o) => Some(o),
            Self::Hooked(_) => None,
        }
    }

    pub fn as_ordinary_mut(&mut self) -> Option<&mut OrdinaryObject> {
        match self {
            Self::Ordinary(o) => Some(o),
            Self::Hooked(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectHeap: the managed object store
// ---------------------------------------------------------------------------

/// The object heap: arena of managed objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectHeap {
    objects: Vec<ManagedObject>,
    next_symbol: u32,
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            next_symbol: 1,
        }
    }

    fn push(&mut self, object: ManagedObject) -> Result<ObjectHandle, ObjectError> {
        let index = u32::try_from(self.objects.len()).map_err(|_| ObjectError::HeapExhausted)?;
        self.objects.push(object);
        Ok(ObjectHandle(index))
    }

    /// Allocate a new ordinary object with the given prototype.
    pub fn alloc(&mut self, proto: Option<ObjectHandle>) -> Result<ObjectHandle, ObjectError> {
        self.push(ManagedObject::Ordinary(OrdinaryObject::with_prototype(
            proto,
        )))
    }

    pub fn alloc_plain(&mut self) -> Result<ObjectHandle, ObjectError> {
        self.alloc(None)
    }

    /// Allocate a native function object.
    pub fn alloc_function(&mut self, behavior: FunctionBehavior) -> Result<ObjectHandle, ObjectError> {
        self.push(ManagedObject::Ordinary(OrdinaryObject {
            kind: ObjectKind::Function(behavior),
            ..OrdinaryObject::default()
        }))
    }

    /// Allocate an object wrapper around a primitive.
    pub fn alloc_wrapper(&mut self, primitive: JsValue) -> Result<ObjectHandle, ObjectError> {
        self.push(ManagedObject::Ordinary(OrdinaryObject {
            kind: ObjectKind::PrimitiveWrapper(primitive),
            ..OrdinaryObject::default()
        }))
    }

    /// Allocate a hooked object over an existing target.
    pub fn alloc_hooked(
        &mut self,
        target: ObjectHandle,
        hooks: HookSet,
    ) -> Result<ObjectHandle, ObjectError> {
        self.get(target)?;
        for hook in HookEvent::ALL.into_iter().filter_map(|e| hooks.for_event(e)) {
            if !self.is_callable(hook) {
                return Err(ObjectError::NotCallable(hook));
            }
        }
        self.push(ManagedObject::Hooked(HookedObject { target, hooks }))
    }

    /// Allocate a new unique symbol id.
    pub fn alloc_symbol(&mut self) -> Result<SymbolId, ObjectError> {
        let id = SymbolId(self.next_symbol);
        self.next_symbol = self
            .next_symbol
            .checked_add(1)
            .ok_or(ObjectError::SymbolSpaceExhausted)?;
        Ok(id)
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&ManagedObject, ObjectError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut ManagedObject, ObjectError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        (handle.0 as usize) < self.objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// A hooked object is callable when its backing object is.
    pub fn is_callable(&self, handle: ObjectHandle) -> bool {
        self.storage(handle).is_ok_and(OrdinaryObject::is_callable)
    }

    /// `typeof value`, distinguishing callable objects (hooked or not).
    pub fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Object(h) if self.is_callable(*h) => "function",
            other => other.type_name(),
        }
    }

    /// How many times `handle` (or the function behind it) has been called.
    pub fn invocation_count(&self, handle: ObjectHandle) -> Result<u64, ObjectError> {
        Ok(self.storage(handle)?.invocations)
    }

    // -- Backing storage (hook-free) ----------------------------------------

    /// Follow hooked targets down to the ordinary object holding the own
    /// properties of `handle`.  Fires nothing.
    pub fn storage_handle(&self, handle: ObjectHandle) -> Result<ObjectHandle, ObjectError> {
        let mut current = handle;
        let mut visited = BTreeSet::new();
        for _ in 0..=MAX_HOOK_CHAIN_DEPTH {
            if !visited.insert(current) {
                return Err(ObjectError::HookCycleDetected);
            }
            match self.get(current)? {
                ManagedObject::Ordinary(_) => return Ok(current),
                ManagedObject::Hooked(h) => current = h.target,
            }
        }
        Err(ObjectError::HookChainTooDeep {
            depth: MAX_HOOK_CHAIN_DEPTH + 1,
            max: MAX_HOOK_CHAIN_DEPTH,
        })
    }

    pub fn storage(&self, handle: ObjectHandle) -> Result<&OrdinaryObject, ObjectError> {
        let backing = self.storage_handle(handle)?;
        self.get(backing)?
            .as_ordinary()
            .ok_or(ObjectError::ObjectNotFound(backing))
    }

    pub fn storage_mut(&mut self, handle: ObjectHandle) -> Result<&mut OrdinaryObject, ObjectError> {
        let backing = self.storage_handle(handle)?;
        self.get_mut(backing)?
            .as_ordinary_mut()
            .ok_or(ObjectError::ObjectNotFound(backing))
    }

    pub fn get_own_property_descriptor(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        Ok(self.storage(handle)?.get_own_property(key).cloned())
    }

    pub fn define_own_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        Ok(self.storage_mut(handle)?.define_own_property(key, desc))
    }

    pub fn define_with_patch(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        patch: &DescriptorPatch,
    ) -> Result<bool, ObjectError> {
        Ok(self.storage_mut(handle)?.define_with_patch(key, patch))
    }

    pub fn own_property_keys(&self, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ObjectError> {
        Ok(self.storage(handle)?.own_property_keys())
    }

    /// Own properties in own-key order, descriptors included.
    pub fn describe(
        &self,
        handle: ObjectHandle,
    ) -> Result<Vec<(PropertyKey, PropertyDescriptor)>, ObjectError> {
        let storage = self.storage(handle)?;
        Ok(storage
            .own_property_keys()
            .into_iter()
            .filter_map(|k| storage.properties.get(&k).cloned().map(|d| (k, d)))
            .collect())
    }

    pub fn prevent_extensions(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.storage_mut(handle)?.prevent_extensions();
        Ok(())
    }

    pub fn freeze(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.storage_mut(handle)?.freeze();
        Ok(())
    }

    pub fn seal(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.storage_mut(handle)?.seal();
        Ok(())
    }

    // -- Calls ----------------------------------------------------------------

    /// Call a native function object, counting the invocation.  A hooked
    /// function calls through to its backing function; no hook fires.
    pub fn call(
        &mut self,
        func: ObjectHandle,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, ObjectError> {
        let callee = self.storage_mut(func)?;
        let ObjectKind::Function(behavior) = &callee.kind else {
            return Err(ObjectError::NotCallable(func));
        };
        let behavior = behavior.clone();
        callee.invocations += 1;

        match behavior {
            FunctionBehavior::Noop => Ok(JsValue::Undefined),
            FunctionBehavior::ReturnConstant(value) => Ok(value),
            FunctionBehavior::StoreInto(key) => {
                let JsValue::Object(receiver) = this else {
                    return Err(ObjectError::TypeError(
                        "setter receiver is not an object".to_string(),
                    ));
                };
                let value = args.first().cloned().unwrap_or(JsValue::Undefined);
                self.define_with_patch(*receiver, key, &DescriptorPatch::value(value))?;
                Ok(JsValue::Undefined)
            }
        }
    }

    /// Fire the `event` hooks of every hooked object between `handle` and its
    /// backing storage, outermost first.  Returns the storage handle.
    fn fire_hooks(
        &mut self,
        handle: ObjectHandle,
        event: HookEvent,
        key: &PropertyKey,
        value: Option<&JsValue>,
    ) -> Result<ObjectHandle, ObjectError> {
        let mut pending: Vec<(ObjectHandle, ObjectHandle, ObjectHandle)> = Vec::new();
        let mut current = handle;
        let mut depth: u32 = 0;
        while let ManagedObject::Hooked(h) = self.get(current)? {
            if depth >= MAX_HOOK_CHAIN_DEPTH {
                return Err(ObjectError::HookChainTooDeep {
                    depth,
                    max: MAX_HOOK_CHAIN_DEPTH,
                });
            }
            if let Some(hook) = h.hooks.for_event(event) {
                pending.push((hook, current, h.target));
            }
            current = h.target;
            depth += 1;
        }

        for (hook, hooked, target) in pending {
            let mut args = vec![JsValue::Object(target), key.to_value()];
            if let Some(v) = value {
                args.push(v.clone());
            }
            self.call(hook, &JsValue::Object(hooked), &args)?;
        }
        Ok(current)
    }

    // -- Ordinary access path (fires hooks and accessors) -------------------

    /// `[[Get]](O, P)`: fires `get` hooks, walks the prototype chain and
    /// invokes getters with `handle` as the receiver.
    pub fn get_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ObjectError> {
        let receiver = JsValue::Object(handle);
        let storage = self.fire_hooks(handle, HookEvent::Get, key, None)?;

        let mut current = Some(storage);
        let mut depth: u32 = 0;
        let mut visited = BTreeSet::new();
        while let Some(h) = current {
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(ObjectError::PrototypeChainTooDeep {
                    depth,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            if !visited.insert(h) {
                return Err(ObjectError::PrototypeCycleDetected);
            }

            let object = self.storage(h)?;
            match object.get_own_property(key).cloned() {
                Some(PropertyDescriptor::Data { value, .. }) => return Ok(value),
                Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => {
                    return self.call(getter, &receiver, &[]);
                }
                Some(PropertyDescriptor::Accessor { get: None, .. }) => {
                    return Ok(JsValue::Undefined);
                }
                None => current = object.prototype,
            }
            depth += 1;
        }

        Ok(JsValue::Undefined)
    }

    /// `[[Set]](O, P, V)`: fires `set` hooks, then writes the own property
    /// (invoking an own setter if there is one).
    pub fn set_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ObjectError> {
        let storage = self.fire_hooks(handle, HookEvent::Set, &key, Some(&value))?;
        let current = self.storage(storage)?.get_own_property(&key).cloned();
        match current {
            Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
                self.call(setter, &JsValue::Object(handle), &[value])?;
                Ok(true)
            }
            Some(PropertyDescriptor::Accessor { set: None, .. })
            | Some(PropertyDescriptor::Data {
                writable: false, ..
            }) => Ok(false),
            Some(PropertyDescriptor::Data { .. }) => {
                let object = self.storage_mut(storage)?;
                if let Some(PropertyDescriptor::Data { value: slot, .. }) =
                    object.properties.get_mut(&key)
                {
                    *slot = value;
                }
                Ok(true)
            }
            None => {
                let object = self.storage_mut(storage)?;
                if !object.extensible {
                    return Ok(false);
                }
                object.properties.insert(key, PropertyDescriptor::data(value));
                Ok(true)
            }
        }
    }

    /// `[[HasProperty]](O, P)`: fires `has` hooks, walks the prototype chain.
    pub fn has_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        let storage = self.fire_hooks(handle, HookEvent::Has, key, None)?;

        let mut current = Some(storage);
        let mut depth: u32 = 0;
        let mut visited = BTreeSet::new();
        while let Some(h) = current {
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(ObjectError::PrototypeChainTooDeep {
                    depth,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            if !visited.insert(h) {
                return Err(ObjectError::PrototypeCycleDetected);
            }
            let object = self.storage(h)?;
            if object.has_own_property(key) {
                return Ok(true);
            }
            current = object.prototype;
            depth += 1;
        }
        Ok(false)
    }

    /// `[[Delete]](O, P)`: fires `deleteProperty` hooks, removes the slot.
    pub fn delete_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        let storage = self.fire_hooks(handle, HookEvent::DeleteProperty, key, None)?;
        Ok(self.storage_mut(storage)?.delete(key))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
