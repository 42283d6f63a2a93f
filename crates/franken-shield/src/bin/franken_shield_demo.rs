use std::fs;

use frankenengine_shield::object_model::{FunctionBehavior, PropertyDescriptor};
use frankenengine_shield::{
    InterceptionEvent, JsValue, ObjectHandle, ObjectHeap, OrdinaryPolicy, PropertyKey,
    ShieldConfig, raw_set, wrap_with,
};
use serde::Serialize;

fn main() {
    if let Err(error) = run(std::env::args().skip(1).collect()) {
        eprintln!("{error}");
        std::process::exit(2);
    }
}

fn usage() -> String {
    [
        "franken_shield_demo usage:",
        "  franken_shield_demo [--config <path>] [--summary]",
    ]
    .join("\n")
}

#[derive(Debug, Serialize)]
struct DemoReport {
    events: Vec<InterceptionEvent>,
    before_silent_write: Vec<(PropertyKey, PropertyDescriptor)>,
    silent_write_accepted: bool,
    after_silent_write: Vec<(PropertyKey, PropertyDescriptor)>,
}

fn run(args: Vec<String>) -> Result<(), String> {
    let mut config_path: Option<&str> = None;
    let mut summary = false;

    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(value.as_str());
            }
            "--summary" => summary = true,
            "help" | "--help" | "-h" => {
                println!("{}", usage());
                return Ok(());
            }
            flag => return Err(format!("unknown flag: {flag}\n\n{}", usage())),
        }
        index += 1;
    }

    let config = match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|error| format!("failed to read config {path}: {error}"))?;
            ShieldConfig::from_json_str(&raw).map_err(|error| error.to_string())?
        }
        None => ShieldConfig::default(),
    };

    let report = replay(config).map_err(|error| error.to_string())?;

    if summary {
        for event in &report.events {
            println!("{} {} -> {}", event.event, event.key, event.outcome);
        }
        println!("silent write accepted: {}", report.silent_write_accepted);
        println!("{}", render_snapshot(&report.after_silent_write));
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|error| format!("failed to encode demo report: {error}"))?
        );
    }
    Ok(())
}

/// A naive pass-through wrapper logs three writes; a privileged raw write
/// through the same wrapper then lands without being logged.
fn replay(config: ShieldConfig) -> Result<DemoReport, frankenengine_shield::ShieldError> {
    let mut heap = ObjectHeap::new();
    let target = target_with_to_string(&mut heap)?;

    let mut wrapped = wrap_with(&heap, &JsValue::Object(target), OrdinaryPolicy, config)?;
    for n in 1..=3 {
        wrapped.set(&mut heap, "a".into(), JsValue::Number(n))?;
    }
    let before_silent_write = heap.describe(target)?;

    let silent_write_accepted = raw_set(&mut heap, &wrapped, "asd".into(), JsValue::Number(4))?;
    let after_silent_write = heap.describe(target)?;

    Ok(DemoReport {
        events: wrapped.drain_events(),
        before_silent_write,
        silent_write_accepted,
        after_silent_write,
    })
}

fn target_with_to_string(
    heap: &mut ObjectHeap,
) -> Result<ObjectHandle, frankenengine_shield::ShieldError> {
    let to_string =
        heap.alloc_function(FunctionBehavior::ReturnConstant(JsValue::Str(String::new())))?;
    let target = heap.alloc_plain()?;
    heap.define_own_property(
        target,
        "toString".into(),
        PropertyDescriptor::data(JsValue::Object(to_string)),
    )?;
    Ok(target)
}

fn render_snapshot(properties: &[(PropertyKey, PropertyDescriptor)]) -> String {
    let fields: Vec<String> = properties
        .iter()
        .map(|(key, desc)| match desc.value() {
            Some(value) => format!("{key}: {value}"),
            None => format!("{key}: [accessor]"),
        })
        .collect();
    format!("{{ {} }}", fields.join(", "))
}
