//! Property access, built-in methods and global objects available to routines.

use super::interp::Interpreter;
use super::value::{format_number, Array, Value};
use crate::constants::{MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};
use crate::error::ScriptError;

type BResult = Result<Value, ScriptError>;

fn type_error(message: String) -> ScriptError {
    ScriptError::runtime(format!("TypeError: {message}"))
}

fn read_nullish(receiver: &Value, name: &str) -> ScriptError {
    type_error(format!(
        "Cannot read properties of {} (reading '{name}')",
        receiver.to_display_string()
    ))
}

fn invalid_string_length() -> ScriptError {
    ScriptError::runtime("RangeError: Invalid string length")
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// Resolves a possibly negative relative index against `len`, clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|i| i.to_string() == key)
}

pub fn get_property(receiver: &Value, name: &str) -> BResult {
    match receiver {
        Value::Undefined | Value::Null => Err(read_nullish(receiver, name)),
        Value::Object(map) => Ok(map.borrow().get(name).cloned().unwrap_or_default()),
        Value::Array(items) => {
            let items = items.borrow();
            if name == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(array_index(name).and_then(|i| items.get(i).cloned()).unwrap_or_default())
        }
        Value::String(s) => {
            if name == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            Ok(array_index(name)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default())
        }
        _ => Ok(Value::Undefined),
    }
}

pub fn get_index(receiver: &Value, index: &Value) -> BResult {
    let key = match index {
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    };
    get_property(receiver, &key)
}

pub fn set_property(receiver: &Value, name: &str, value: Value) -> Result<(), ScriptError> {
    match receiver {
        Value::Object(map) => {
            map.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let Some(i) = array_index(name) else {
                return Ok(());
            };
            let mut items = items.borrow_mut();
            if i >= items.len() {
                if i >= MAX_ARRAY_LENGTH {
                    return Err(ScriptError::runtime("RangeError: Invalid array length"));
                }
                items.resize(i + 1, Value::Undefined);
            }
            items[i] = value;
            Ok(())
        }
        Value::Undefined | Value::Null => Err(type_error(format!(
            "Cannot set properties of {} (setting '{name}')",
            receiver.to_display_string()
        ))),
        _ => Ok(()),
    }
}

pub fn set_index(receiver: &Value, index: &Value, value: Value) -> Result<(), ScriptError> {
    let key = match index {
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    };
    set_property(receiver, &key, value)
}

/// Items visited by `for (x of value)`.
pub fn iterate(value: &Value) -> Result<Vec<Value>, ScriptError> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(type_error(format!("{} is not iterable", other.to_display_string()))),
    }
}

/// Keys visited by `for (k in value)`.
pub fn keys(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(map) => map.borrow().keys().map(|k| Value::from(k.as_str())).collect(),
        Value::Array(items) => {
            (0..items.borrow().len()).map(|i| Value::String(i.to_string())).collect()
        }
        Value::String(s) => (0..s.chars().count()).map(|i| Value::String(i.to_string())).collect(),
        _ => Vec::new(),
    }
}

pub fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> BResult {
    match receiver {
        Value::Undefined | Value::Null => Err(read_nullish(receiver, name)),
        Value::Object(map) => {
            let member = map.borrow().get(name).cloned();
            match member {
                Some(function @ Value::Function(_)) => interp.call(&function, args),
                _ => Err(type_error(format!("{name} is not a function"))),
            }
        }
        Value::Array(array) => array_method(interp, receiver, array, name, args),
        Value::String(s) => string_method(s, name, args),
        Value::Number(n) => number_method(*n, name, args),
        Value::Bool(b) if name == "toString" => Ok(Value::from(b.to_string())),
        _ => Err(type_error(format!("{name} is not a function"))),
    }
}

fn array_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    array: &Array,
    name: &str,
    args: &[Value],
) -> BResult {
    // Callbacks may mutate the array, so they iterate over a snapshot.
    let items = array.borrow().clone();
    let callback = arg(args, 0);
    let each = |interp: &mut Interpreter<'_>, i: usize, item: &Value| {
        interp.call(&callback, &[item.clone(), Value::Number(i as f64), receiver.clone()])
    };

    match name {
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                each(interp, i, item)?;
            }
            Ok(Value::Undefined)
        }
        "map" => {
            let mut mapped = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                mapped.push(each(interp, i, item)?);
            }
            Ok(Value::array(mapped))
        }
        "filter" => {
            let mut kept = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if each(interp, i, item)?.truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::array(kept))
        }
        "find" | "findIndex" | "some" | "every" => {
            for (i, item) in items.iter().enumerate() {
                let hit = each(interp, i, item)?.truthy();
                match (name, hit) {
                    ("find", true) => return Ok(item.clone()),
                    ("findIndex", true) => return Ok(Value::Number(i as f64)),
                    ("some", true) => return Ok(Value::Bool(true)),
                    ("every", false) => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            Ok(match name {
                "find" => Value::Undefined,
                "findIndex" => Value::Number(-1.0),
                "some" => Value::Bool(false),
                _ => Value::Bool(true),
            })
        }
        "reduce" => {
            let mut iter = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(type_error(
                            "Reduce of empty array with no initial value".to_string(),
                        ))
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call(
                    &callback,
                    &[acc, item.clone(), Value::Number(i as f64), receiver.clone()],
                )?;
            }
            Ok(acc)
        }
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(sep) => sep.to_display_string(),
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "includes" => {
            let needle = arg(args, 0);
            Ok(Value::Bool(items.iter().any(|v| v.strict_eq(&needle))))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let position = items.iter().position(|v| v.strict_eq(&needle));
            Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
        }
        "push" => {
            let mut array = array.borrow_mut();
            array.extend(args.iter().cloned());
            Ok(Value::Number(array.len() as f64))
        }
        "pop" => Ok(array.borrow_mut().pop().unwrap_or_default()),
        "slice" => {
            let len = items.len();
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            Ok(Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
        }
        "reverse" => {
            array.borrow_mut().reverse();
            Ok(receiver.clone())
        }
        "concat" => {
            let mut joined = items;
            for extra in args {
                match extra {
                    Value::Array(more) => joined.extend(more.borrow().iter().cloned()),
                    other => joined.push(other.clone()),
                }
            }
            Ok(Value::array(joined))
        }
        "toString" => Ok(Value::String(receiver.to_display_string())),
        _ => Err(type_error(format!("array.{name} is not a function"))),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> BResult {
    let text_arg = |i: usize| arg(args, i).to_display_string();
    let chars: Vec<char> = s.chars().collect();

    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "includes" => Value::Bool(s.contains(&text_arg(0))),
        "startsWith" => Value::Bool(s.starts_with(&text_arg(0))),
        "endsWith" => Value::Bool(s.ends_with(&text_arg(0))),
        "indexOf" => {
            let needle = text_arg(0);
            Value::Number(s.find(&needle).map_or(-1.0, |byte| s[..byte].chars().count() as f64))
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::array(vec![Value::from(s)]),
            Some(sep) => {
                let sep = sep.to_display_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    chars.iter().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::from).collect()
                };
                Value::array(parts)
            }
        },
        "replace" => Value::String(s.replacen(&text_arg(0), &text_arg(1), 1)),
        "replaceAll" => Value::String(s.replace(&text_arg(0), &text_arg(1))),
        "slice" | "substring" => {
            let len = chars.len();
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            let (start, end) = if name == "substring" && start > end {
                (end, start)
            } else {
                (start, end.max(start))
            };
            Value::String(chars[start..end].iter().collect())
        }
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0 } else { i as usize };
            Value::String(chars.get(i).map(|c| c.to_string()).unwrap_or_default())
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            if !(count >= 0.0) || count.is_infinite() {
                return Err(ScriptError::runtime(format!(
                    "RangeError: Invalid count value: {}",
                    format_number(count)
                )));
            }
            let count = count as usize;
            if s.is_empty() || count == 0 {
                Value::from("")
            } else if s.len().checked_mul(count).filter(|&len| len <= MAX_STRING_LENGTH).is_none() {
                return Err(invalid_string_length());
            } else {
                Value::String(s.repeat(count))
            }
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target as usize };
            let filler = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(f) => f.to_display_string(),
            };
            if target <= chars.len() || filler.is_empty() {
                Value::from(s)
            } else if target > MAX_STRING_LENGTH {
                return Err(invalid_string_length());
            } else {
                let pad: String = filler.chars().cycle().take(target - chars.len()).collect();
                if name == "padStart" {
                    Value::String(pad + s)
                } else {
                    Value::String(format!("{s}{pad}"))
                }
            }
        }
        "toString" => Value::from(s),
        _ => return Err(type_error(format!("string.{name} is not a function"))),
    };
    Ok(value)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> BResult {
    match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            if !(0..=100).contains(&digits) {
                return Err(ScriptError::runtime(
                    "RangeError: toFixed() digits argument must be between 0 and 100",
                ));
            }
            Ok(Value::String(format!("{n:.digits$}")))
        }
        "toString" => Ok(Value::String(format_number(n))),
        _ => Err(type_error(format!("number.{name} is not a function"))),
    }
}

fn math(name: &str, f: fn(f64) -> f64) -> (&str, Value) {
    (name, Value::native(name, move |_, args| Ok(Value::Number(f(arg(args, 0).to_number())))))
}

/// Global names resolvable from routines when not shadowed by data or locals.
pub fn global(name: &str) -> Option<Value> {
    let value = match name {
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        "String" => Value::native("String", |_, args| {
            Ok(Value::String(args.first().map(Value::to_display_string).unwrap_or_default()))
        }),
        "Number" => Value::native("Number", |_, args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
        "Boolean" => Value::native("Boolean", |_, args| Ok(Value::Bool(arg(args, 0).truthy()))),
        "parseInt" => Value::native("parseInt", |_, args| {
            let text = arg(args, 0).to_display_string();
            let text = text.trim();
            let end = text
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map_or(text.len(), |(i, _)| i);
            Ok(Value::Number(text[..end].parse::<f64>().unwrap_or(f64::NAN)))
        }),
        "parseFloat" => Value::native("parseFloat", |_, args| {
            Ok(Value::Number(arg(args, 0).to_display_string().trim().parse().unwrap_or(f64::NAN)))
        }),
        "isNaN" => Value::native("isNaN", |_, args| {
            Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
        }),
        "JSON" => Value::object([
            (
                "stringify",
                Value::native("stringify", |_, args| {
                    Ok(match arg(args, 0).to_json() {
                        Some(json) => Value::String(json.to_string()),
                        None => Value::Undefined,
                    })
                }),
            ),
            (
                "parse",
                Value::native("parse", |_, args| {
                    let text = arg(args, 0).to_display_string();
                    serde_json::from_str::<serde_json::Value>(&text)
                        .map(|json| Value::from_json(&json))
                        .map_err(|e| ScriptError::runtime(format!("SyntaxError: {e}")))
                }),
            ),
        ]),
        "Object" => Value::object([
            (
                "keys",
                Value::native("keys", |_, args| Ok(Value::array(keys(&arg(args, 0))))),
            ),
            (
                "values",
                Value::native("values", |_, args| {
                    let target = arg(args, 0);
                    let values = keys(&target)
                        .iter()
                        .map(|k| get_index(&target, k))
                        .collect::<Result<_, _>>()?;
                    Ok(Value::array(values))
                }),
            ),
            (
                "entries",
                Value::native("entries", |_, args| {
                    let target = arg(args, 0);
                    let entries = keys(&target)
                        .into_iter()
                        .map(|k| Ok(Value::array(vec![k.clone(), get_index(&target, &k)?])))
                        .collect::<Result<_, ScriptError>>()?;
                    Ok(Value::array(entries))
                }),
            ),
        ]),
        "Array" => Value::object([(
            "isArray",
            Value::native("isArray", |_, args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
            }),
        )]),
        "Math" => Value::object([
            math("floor", f64::floor),
            math("ceil", f64::ceil),
            math("round", |n| (n + 0.5).floor()),
            math("abs", f64::abs),
            math("sqrt", f64::sqrt),
            math("trunc", f64::trunc),
            (
                "min",
                Value::native("min", |_, args| {
                    let min = args.iter().map(Value::to_number).fold(f64::INFINITY, f64::min);
                    Ok(Value::Number(min))
                }),
            ),
            (
                "max",
                Value::native("max", |_, args| {
                    Ok(Value::Number(
                        args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, f64::max),
                    ))
                }),
            ),
            (
                "pow",
                Value::native("pow", |_, args| {
                    Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
                }),
            ),
        ]),
        _ => return None,
    };
    Some(value)
}
