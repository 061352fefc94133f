use serde::Serialize;
use serde_json::Value;

/// Inline payloads longer than this are replaced in debug output.
const MAX_LOGGED_DATA_CHARS: usize = 64;

pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_value(value)
        .map(elide_inline_data)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

/// Replace base64 `data` fields so image bytes never reach the log.
fn elide_inline_data(mut value: Value) -> Value {
    elide_in_place(&mut value);
    value
}

fn elide_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                match field {
                    Value::String(s) if key == "data" && s.len() > MAX_LOGGED_DATA_CHARS => {
                        *field = Value::String(format!("<{} base64 chars>", s.len()));
                    }
                    _ => elide_in_place(field),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(elide_in_place),
        _ => {}
    }
}
