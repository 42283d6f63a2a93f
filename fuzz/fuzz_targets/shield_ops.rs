#![no_main]

use frankenengine_shield::object_model::{
    FunctionBehavior, HookSet, ObjectHandle, PropertyDescriptor,
};
use frankenengine_shield::{
    JsValue, ObjectHeap, PropertyKey, ShieldConfig, WriteRejection, build_policy, clense, raw_get,
    raw_has, raw_set, raw_soft_delete, resolve, wrap_with,
};
use libfuzzer_sys::fuzz_target;

const MAX_STEPS: usize = 128;
const KEY_SPACE: u8 = 6;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    run_shield_program(data);
});

fn run_shield_program(data: &[u8]) {
    let mut heap = ObjectHeap::new();
    let (Ok(hook), Ok(getter), Ok(setter), Ok(backing)) = (
        heap.alloc_function(FunctionBehavior::Noop),
        heap.alloc_function(FunctionBehavior::ReturnConstant(JsValue::Number(1))),
        heap.alloc_function(FunctionBehavior::StoreInto("slot".into())),
        heap.alloc_plain(),
    ) else {
        return;
    };
    let _ = heap.define_own_property(
        backing,
        "acc".into(),
        PropertyDescriptor::accessor(Some(getter), Some(setter)),
    );
    let Ok(target) = heap.alloc_hooked(backing, HookSet::uniform(hook)) else {
        return;
    };

    let config = ShieldConfig {
        write_rejection: if byte(data, 0) % 2 == 0 {
            WriteRejection::ReturnFalse
        } else {
            WriteRejection::Throw
        },
        max_events: 1 + usize::from(byte(data, 1) % 32),
        ..ShieldConfig::default()
    };
    let Ok(mut shielded) = wrap_with(&heap, &JsValue::Object(target), build_policy(), config)
    else {
        return;
    };

    let mut cursor = 2usize;
    for _ in 0..MAX_STEPS {
        let opcode = byte(data, cursor);
        let key = key_for(byte(data, cursor.saturating_add(1)));
        let value = JsValue::Number(i64::from(byte(data, cursor.saturating_add(2))));
        cursor = cursor.saturating_add(3);

        match opcode % 10 {
            0 => {
                let _ = shielded.get(&mut heap, &key);
            }
            1 => {
                let _ = shielded.set(&mut heap, key, value);
            }
            2 => {
                let _ = shielded.delete_property(&mut heap, key);
            }
            3 => {
                let _ = shielded.has(&mut heap, &key);
            }
            4 => {
                let _ = raw_set(&mut heap, &target, key, value);
            }
            5 => {
                let _ = raw_soft_delete(&mut heap, &shielded, key);
            }
            6 => {
                if let Ok(true) = raw_has(&heap, &target, &key) {
                    assert!(raw_get(&heap, &target, &key).is_ok());
                }
            }
            7 => {
                if opcode & 0x10 == 0 {
                    let _ = heap.prevent_extensions(target);
                } else {
                    let _ = heap.freeze(target);
                }
            }
            8 => {
                let _ = resolve(&mut heap, &mut shielded);
                if opcode & 0x10 == 0 {
                    let _ = clense(&mut heap, &mut shielded);
                } else {
                    // Handles below the hooked target: cleansing a plain value
                    // reads through the ordinary path and would fire its hooks.
                    let _ = clense(&mut heap, &JsValue::Object(ObjectHandle(u32::from(opcode) % 4)));
                }
            }
            _ => {
                let _ = shielded.drain_events();
            }
        }

        assert!(shielded.events().len() <= shielded.config().max_events);
    }

    // Nothing the shield or the raw path does may fire target hooks or accessors.
    assert_eq!(heap.invocation_count(hook).ok(), Some(0));
    assert_eq!(heap.invocation_count(setter).ok(), Some(0));
}

fn key_for(selector: u8) -> PropertyKey {
    match selector % KEY_SPACE {
        0 => "acc".into(),
        1 => "slot".into(),
        n => PropertyKey::String(format!("k{n}")),
    }
}

fn byte(data: &[u8], index: usize) -> u8 {
    if data.is_empty() {
        return 0;
    }
    data[index % data.len()]
}
