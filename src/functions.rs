// Built-in function implementations
// Math, string, type and array families plus the native-function type for registrations

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::utils::{format_number, parse_float_prefix, parse_int_prefix, round_half_away, string_to_number};
use crate::value::Value;

/// Function errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("{function} requires an array, got {got}")]
    ExpectedArray { function: String, got: String },

    #[error("Argument error: {0}")]
    ArgumentError(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// Host function registered on an evaluator instance
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// The fixed built-in table. Names here cannot be overridden by registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // math
    Abs,
    Ceil,
    Floor,
    Round,
    Min,
    Max,
    Pow,
    Sqrt,
    Add,
    Multiply,

    // string (Length, Includes, IndexOf, LastIndexOf and Slice also accept arrays)
    Concat,
    Substring,
    ToLowerCase,
    ToUpperCase,
    Trim,
    Length,
    StartsWith,
    EndsWith,
    Includes,
    ReplaceAll,
    IndexOf,
    LastIndexOf,
    Slice,
    ParseInt,
    ParseFloat,
    ToFixed,

    // type
    ToString,
    ToNumber,
    ToBoolean,
    IsNull,
    IsUndefined,
    IsNumber,
    IsString,
    IsArray,
    IsObject,

    // array
    Map,
    Filter,
    Find,
    Reduce,
    Some,
    Every,
    Sort,
    Reverse,
    Flat,
    FlatMap,
    Push,
    Pop,
    Shift,
    Unshift,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Abs,
        Builtin::Ceil,
        Builtin::Floor,
        Builtin::Round,
        Builtin::Min,
        Builtin::Max,
        Builtin::Pow,
        Builtin::Sqrt,
        Builtin::Add,
        Builtin::Multiply,
        Builtin::Concat,
        Builtin::Substring,
        Builtin::ToLowerCase,
        Builtin::ToUpperCase,
        Builtin::Trim,
        Builtin::Length,
        Builtin::StartsWith,
        Builtin::EndsWith,
        Builtin::Includes,
        Builtin::ReplaceAll,
        Builtin::IndexOf,
        Builtin::LastIndexOf,
        Builtin::Slice,
        Builtin::ParseInt,
        Builtin::ParseFloat,
        Builtin::ToFixed,
        Builtin::ToString,
        Builtin::ToNumber,
        Builtin::ToBoolean,
        Builtin::IsNull,
        Builtin::IsUndefined,
        Builtin::IsNumber,
        Builtin::IsString,
        Builtin::IsArray,
        Builtin::IsObject,
        Builtin::Map,
        Builtin::Filter,
        Builtin::Find,
        Builtin::Reduce,
        Builtin::Some,
        Builtin::Every,
        Builtin::Sort,
        Builtin::Reverse,
        Builtin::Flat,
        Builtin::FlatMap,
        Builtin::Push,
        Builtin::Pop,
        Builtin::Shift,
        Builtin::Unshift,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Ceil => "ceil",
            Builtin::Floor => "floor",
            Builtin::Round => "round",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Pow => "pow",
            Builtin::Sqrt => "sqrt",
            Builtin::Add => "add",
            Builtin::Multiply => "multiply",
            Builtin::Concat => "concat",
            Builtin::Substring => "substring",
            Builtin::ToLowerCase => "toLowerCase",
            Builtin::ToUpperCase => "toUpperCase",
            Builtin::Trim => "trim",
            Builtin::Length => "length",
            Builtin::StartsWith => "startsWith",
            Builtin::EndsWith => "endsWith",
            Builtin::Includes => "includes",
            Builtin::ReplaceAll => "replaceAll",
            Builtin::IndexOf => "indexOf",
            Builtin::LastIndexOf => "lastIndexOf",
            Builtin::Slice => "slice",
            Builtin::ParseInt => "parseInt",
            Builtin::ParseFloat => "parseFloat",
            Builtin::ToFixed => "toFixed",
            Builtin::ToString => "toString",
            Builtin::ToNumber => "toNumber",
            Builtin::ToBoolean => "toBoolean",
            Builtin::IsNull => "isNull",
            Builtin::IsUndefined => "isUndefined",
            Builtin::IsNumber => "isNumber",
            Builtin::IsString => "isString",
            Builtin::IsArray => "isArray",
            Builtin::IsObject => "isObject",
            Builtin::Map => "map",
            Builtin::Filter => "filter",
            Builtin::Find => "find",
            Builtin::Reduce => "reduce",
            Builtin::Some => "some",
            Builtin::Every => "every",
            Builtin::Sort => "sort",
            Builtin::Reverse => "reverse",
            Builtin::Flat => "flat",
            Builtin::FlatMap => "flatMap",
            Builtin::Push => "push",
            Builtin::Pop => "pop",
            Builtin::Shift => "shift",
            Builtin::Unshift => "unshift",
        }
    }

    /// Whether the builtin invokes a function argument
    pub fn takes_callback(self) -> bool {
        matches!(
            self,
            Builtin::Map
                | Builtin::Filter
                | Builtin::Find
                | Builtin::Reduce
                | Builtin::Some
                | Builtin::Every
                | Builtin::Sort
                | Builtin::FlatMap
        )
    }
}

pub fn is_builtin(name: &str) -> bool {
    Builtin::from_name(name).is_some()
}

// ── Coercions ────────────────────────────────────────────────────────────────

/// JavaScript `Number(value)` conversion
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Undefined | Value::Object(_) | Value::Function(_) => f64::NAN,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Array(arr) => match arr.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
    }
}

/// Integer argument for positions and counts; NaN becomes 0
fn to_integer(value: &Value) -> f64 {
    let n = to_number(value);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Undefined)
}

fn expect_array<'a>(function: Builtin, value: &'a Value) -> Result<&'a Vec<Value>, FunctionError> {
    value.as_array().ok_or_else(|| FunctionError::ExpectedArray {
        function: function.name().to_string(),
        got: value.type_name().to_string(),
    })
}

/// Resolve a possibly negative relative position against `len` (slice semantics)
fn relative_index(relative: f64, len: usize) -> usize {
    if relative < 0.0 {
        (len as f64 + relative).max(0.0) as usize
    } else {
        relative.min(len as f64) as usize
    }
}

/// Built-in numeric functions
pub mod math {
    use super::*;

    pub fn abs(x: &Value) -> Value {
        Value::Number(to_number(x).abs())
    }

    pub fn ceil(x: &Value) -> Value {
        Value::Number(to_number(x).ceil())
    }

    pub fn floor(x: &Value) -> Value {
        Value::Number(to_number(x).floor())
    }

    /// Half away from zero: `round(2.5) == 3`, `round(-2.5) == -3`
    pub fn round(x: &Value) -> Value {
        Value::Number(round_half_away(to_number(x)))
    }

    pub fn sqrt(x: &Value) -> Value {
        Value::Number(to_number(x).sqrt())
    }

    pub fn pow(base: &Value, exponent: &Value) -> Value {
        Value::Number(to_number(base).powf(to_number(exponent)))
    }

    /// `min()` with no arguments is `Infinity`; any NaN argument gives NaN
    pub fn min(args: &[Value]) -> Value {
        let result = args.iter().map(to_number).try_fold(f64::INFINITY, |acc, n| {
            if n.is_nan() {
                None
            } else {
                Some(acc.min(n))
            }
        });
        Value::Number(result.unwrap_or(f64::NAN))
    }

    pub fn max(args: &[Value]) -> Value {
        let result = args.iter().map(to_number).try_fold(f64::NEG_INFINITY, |acc, n| {
            if n.is_nan() {
                None
            } else {
                Some(acc.max(n))
            }
        });
        Value::Number(result.unwrap_or(f64::NAN))
    }

    pub fn add(args: &[Value]) -> Value {
        Value::Number(args.iter().map(to_number).sum())
    }

    pub fn multiply(args: &[Value]) -> Value {
        Value::Number(args.iter().map(to_number).product())
    }
}

/// Built-in string functions
///
/// Positions are counted in chars.
pub mod string {
    use super::*;

    pub fn concat(args: &[Value]) -> Value {
        let joined: String = args.iter().map(Value::to_display_string).collect();
        Value::from(joined)
    }

    /// `substring(s, start, end?)`: negative positions clamp to 0 and the
    /// bounds are swapped when `start > end`
    pub fn substring(s: &Value, start: &Value, end: &Value) -> Value {
        let chars: Vec<char> = s.to_display_string().chars().collect();
        let len = chars.len() as f64;
        let clamp = |v: f64| v.max(0.0).min(len) as usize;
        let from = clamp(to_integer(start));
        let to = if end.is_undefined() {
            chars.len()
        } else {
            clamp(to_integer(end))
        };
        let (from, to) = if from > to { (to, from) } else { (from, to) };
        Value::from(chars[from..to].iter().collect::<String>())
    }

    pub fn to_lower_case(s: &Value) -> Value {
        Value::from(s.to_display_string().to_lowercase())
    }

    pub fn to_upper_case(s: &Value) -> Value {
        Value::from(s.to_display_string().to_uppercase())
    }

    pub fn trim(s: &Value) -> Value {
        Value::from(s.to_display_string().trim())
    }

    /// Char count of a string or element count of an array
    pub fn length(value: &Value) -> Result<Value, FunctionError> {
        match value {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(arr) => Ok(Value::from(arr.len())),
            other => Err(FunctionError::TypeError(format!(
                "length requires a string or an array, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn starts_with(s: &Value, prefix: &Value) -> Value {
        Value::Bool(s.to_display_string().starts_with(&prefix.to_display_string()))
    }

    pub fn ends_with(s: &Value, suffix: &Value) -> Value {
        Value::Bool(s.to_display_string().ends_with(&suffix.to_display_string()))
    }

    pub fn replace_all(s: &Value, search: &Value, replacement: &Value) -> Value {
        let s = s.to_display_string();
        let search = search.to_display_string();
        let replacement = replacement.to_display_string();
        if search.is_empty() {
            // every gap between chars is a match, as in JavaScript
            let mut result = replacement.clone();
            for ch in s.chars() {
                result.push(ch);
                result.push_str(&replacement);
            }
            return Value::from(result);
        }
        Value::from(s.replace(&search, &replacement))
    }

    /// First char position of `search` at or after `from`, -1 if absent
    pub fn index_of(s: &str, search: &str, from: f64) -> Value {
        let hay: Vec<char> = s.chars().collect();
        let needle: Vec<char> = search.chars().collect();
        let start = from.max(0.0).min(hay.len() as f64) as usize;
        let found = (start..=hay.len())
            .find(|&i| hay.len() - i >= needle.len() && hay[i..i + needle.len()] == needle[..]);
        Value::Number(found.map_or(-1.0, |i| i as f64))
    }

    /// Last char position of `search`, -1 if absent
    pub fn last_index_of(s: &str, search: &str) -> Value {
        let hay: Vec<char> = s.chars().collect();
        let needle: Vec<char> = search.chars().collect();
        if needle.len() > hay.len() {
            return Value::Number(-1.0);
        }
        let found = (0..=hay.len() - needle.len())
            .rev()
            .find(|&i| hay[i..i + needle.len()] == needle[..]);
        Value::Number(found.map_or(-1.0, |i| i as f64))
    }

    pub fn slice(s: &str, start: &Value, end: &Value) -> Value {
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        let from = relative_index(to_integer(start), len);
        let to = if end.is_undefined() {
            len
        } else {
            relative_index(to_integer(end), len)
        };
        if from >= to {
            return Value::from("");
        }
        Value::from(chars[from..to].iter().collect::<String>())
    }

    /// `parseInt(s, radix?)`: without a radix a `0x` prefix selects base 16
    pub fn parse_int(s: &Value, radix: &Value) -> Value {
        let text = s.to_display_string();
        let radix = match to_integer(radix) as u32 {
            0 => {
                let unsigned = text.trim_start().trim_start_matches(['+', '-']);
                if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
                    16
                } else {
                    10
                }
            }
            r => r,
        };
        Value::Number(parse_int_prefix(&text, radix))
    }

    pub fn parse_float(s: &Value) -> Value {
        Value::Number(parse_float_prefix(&s.to_display_string()))
    }

    /// Fixed-point formatting, rounding half away from zero
    pub fn to_fixed(n: &Value, digits: &Value) -> Result<Value, FunctionError> {
        let digits = to_integer(digits);
        if !(0.0..=100.0).contains(&digits) {
            return Err(FunctionError::ArgumentError(
                "toFixed() digits argument must be between 0 and 100".to_string(),
            ));
        }
        let digits = digits as usize;
        let n = to_number(n);
        if !n.is_finite() {
            return Ok(Value::from(format_number(n)));
        }
        if n.abs() >= 1e21 {
            return Ok(Value::from(format_number(n)));
        }
        let scaled = n * 10f64.powi(digits as i32);
        let rounded = if scaled.is_finite() {
            round_half_away(scaled) / 10f64.powi(digits as i32)
        } else {
            n
        };
        Ok(Value::from(format!("{:.*}", digits, rounded)))
    }
}

/// Built-in type conversion and inspection functions
pub mod types {
    use super::*;

    pub fn to_string(value: &Value) -> Value {
        Value::from(value.to_display_string())
    }

    pub fn to_number(value: &Value) -> Value {
        Value::Number(super::to_number(value))
    }

    /// Only `0`, `""` and `false` convert to `false`
    pub fn to_boolean(value: &Value) -> Value {
        let falsy = match value {
            Value::Number(n) => *n == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bool(b) => !*b,
            _ => false,
        };
        Value::Bool(!falsy)
    }

    pub fn is_null(value: &Value) -> Value {
        Value::Bool(value.is_null())
    }

    pub fn is_undefined(value: &Value) -> Value {
        Value::Bool(value.is_undefined())
    }

    pub fn is_number(value: &Value) -> Value {
        Value::Bool(value.is_number())
    }

    pub fn is_string(value: &Value) -> Value {
        Value::Bool(value.is_string())
    }

    pub fn is_array(value: &Value) -> Value {
        Value::Bool(value.is_array())
    }

    pub fn is_object(value: &Value) -> Value {
        Value::Bool(value.is_object())
    }
}

/// Built-in array functions
///
/// None of these mutate their input; callbacks receive `(element, index, array)`.
pub mod array {
    use super::*;

    pub fn map<E: From<FunctionError>>(
        array: &Value,
        mut f: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Map, array)?;
        let mut result = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            result.push(f(&[item.clone(), Value::from(i), array.clone()])?);
        }
        Ok(Value::array(result))
    }

    pub fn filter<E: From<FunctionError>>(
        array: &Value,
        mut predicate: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Filter, array)?;
        let mut result = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if predicate(&[item.clone(), Value::from(i), array.clone()])?.is_truthy() {
                result.push(item.clone());
            }
        }
        Ok(Value::array(result))
    }

    /// First matching element, `undefined` when nothing matches
    pub fn find<E: From<FunctionError>>(
        array: &Value,
        mut predicate: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Find, array)?;
        for (i, item) in items.iter().enumerate() {
            if predicate(&[item.clone(), Value::from(i), array.clone()])?.is_truthy() {
                return Ok(item.clone());
            }
        }
        Ok(Value::Undefined)
    }

    /// Left fold with `(acc, element, index, array)`; without `initial` the
    /// first element seeds the accumulator
    pub fn reduce<E: From<FunctionError>>(
        array: &Value,
        mut reducer: impl FnMut(&[Value]) -> Result<Value, E>,
        initial: Option<&Value>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Reduce, array)?;
        let (mut acc, start) = match initial {
            Some(init) => (init.clone(), 0),
            None => match items.first() {
                Some(first) => (first.clone(), 1),
                None => {
                    return Err(FunctionError::TypeError(
                        "reduce of empty array with no initial value".to_string(),
                    )
                    .into())
                }
            },
        };
        for (i, item) in items.iter().enumerate().skip(start) {
            acc = reducer(&[acc, item.clone(), Value::from(i), array.clone()])?;
        }
        Ok(acc)
    }

    pub fn some<E: From<FunctionError>>(
        array: &Value,
        mut predicate: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Some, array)?;
        for (i, item) in items.iter().enumerate() {
            if predicate(&[item.clone(), Value::from(i), array.clone()])?.is_truthy() {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }

    pub fn every<E: From<FunctionError>>(
        array: &Value,
        mut predicate: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Every, array)?;
        for (i, item) in items.iter().enumerate() {
            if !predicate(&[item.clone(), Value::from(i), array.clone()])?.is_truthy() {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }

    /// Default ordering: numeric when both sides are numbers, otherwise by
    /// string form
    pub fn default_compare(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            _ => a.to_display_string().cmp(&b.to_display_string()),
        }
    }

    /// Stable sort. A comparator returns a number: negative sorts `a` first.
    pub fn sort<E: From<FunctionError>>(
        array: &Value,
        comparator: Option<&mut dyn FnMut(&[Value]) -> Result<Value, E>>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::Sort, array)?;
        let sorted = match comparator {
            None => {
                let mut items = items.clone();
                items.sort_by(default_compare);
                items
            }
            Some(cmp) => merge_sort::<E>(items.clone(), &mut |a: &Value, b: &Value| {
                let n = to_number(&cmp(&[a.clone(), b.clone()])?);
                Ok(if n > 0.0 {
                    Ordering::Greater
                } else if n < 0.0 {
                    Ordering::Less
                } else {
                    Ordering::Equal
                })
            })?,
        };
        Ok(Value::array(sorted))
    }

    // A user comparator need not be a total order, so this avoids slice::sort_by
    fn merge_sort<E>(
        mut items: Vec<Value>,
        cmp: &mut dyn FnMut(&Value, &Value) -> Result<Ordering, E>,
    ) -> Result<Vec<Value>, E> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let left = merge_sort(items, cmp)?;
        let right = merge_sort(right, cmp)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
            if cmp(l, r)? == Ordering::Greater {
                merged.extend(right.next());
            } else {
                merged.extend(left.next());
            }
        }
        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }

    pub fn reverse(array: &Value) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Reverse, array)?;
        Ok(Value::array(items.iter().rev().cloned().collect()))
    }

    /// Flatten nested arrays up to `depth` levels (default 1)
    pub fn flat(array: &Value, depth: &Value) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Flat, array)?;
        let depth = if depth.is_undefined() {
            1.0
        } else {
            to_integer(depth)
        };
        let mut result = Vec::new();
        flatten_into(items, depth, &mut result);
        Ok(Value::array(result))
    }

    fn flatten_into(items: &[Value], depth: f64, out: &mut Vec<Value>) {
        for item in items {
            match item {
                Value::Array(inner) if depth >= 1.0 => flatten_into(inner, depth - 1.0, out),
                other => out.push(other.clone()),
            }
        }
    }

    /// Map, then splice array results in one level deep
    pub fn flat_map<E: From<FunctionError>>(
        array: &Value,
        mut f: impl FnMut(&[Value]) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let items = expect_array(Builtin::FlatMap, array)?;
        let mut result = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match f(&[item.clone(), Value::from(i), array.clone()])? {
                Value::Array(inner) => result.extend(inner.iter().cloned()),
                other => result.push(other),
            }
        }
        Ok(Value::array(result))
    }

    /// New array with `values` appended
    pub fn push(array: &Value, values: &[Value]) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Push, array)?;
        let mut result = items.clone();
        result.extend_from_slice(values);
        Ok(Value::array(result))
    }

    /// New array without the last element
    pub fn pop(array: &Value) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Pop, array)?;
        let end = items.len().saturating_sub(1);
        Ok(Value::array(items[..end].to_vec()))
    }

    /// New array without the first element
    pub fn shift(array: &Value) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Shift, array)?;
        Ok(Value::array(items.iter().skip(1).cloned().collect()))
    }

    /// New array with `values` prepended
    pub fn unshift(array: &Value, values: &[Value]) -> Result<Value, FunctionError> {
        let items = expect_array(Builtin::Unshift, array)?;
        let mut result = values.to_vec();
        result.extend(items.iter().cloned());
        Ok(Value::array(result))
    }

    pub fn slice(items: &[Value], start: &Value, end: &Value) -> Value {
        let len = items.len();
        let from = relative_index(to_integer(start), len);
        let to = if end.is_undefined() {
            len
        } else {
            relative_index(to_integer(end), len)
        };
        if from >= to {
            return Value::array(Vec::new());
        }
        Value::array(items[from..to].to_vec())
    }

    /// SameValueZero membership (NaN is found)
    pub fn includes(items: &[Value], needle: &Value) -> Value {
        let found = items.iter().any(|item| match (item, needle) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => item == needle,
        });
        Value::Bool(found)
    }

    pub fn index_of(items: &[Value], needle: &Value) -> Value {
        let found = items.iter().position(|item| item == needle);
        Value::Number(found.map_or(-1.0, |i| i as f64))
    }

    pub fn last_index_of(items: &[Value], needle: &Value) -> Value {
        let found = items.iter().rposition(|item| item == needle);
        Value::Number(found.map_or(-1.0, |i| i as f64))
    }
}

/// Dispatch the builtins that take no function argument.
///
/// Callback-taking array builtins are routed through the evaluator, which
/// owns the function table their callbacks resolve against.
pub fn call_simple(builtin: Builtin, args: &[Value]) -> Result<Value, FunctionError> {
    let a0 = arg(args, 0);
    let a1 = arg(args, 1);
    let a2 = arg(args, 2);

    let value = match builtin {
        Builtin::Abs => math::abs(a0),
        Builtin::Ceil => math::ceil(a0),
        Builtin::Floor => math::floor(a0),
        Builtin::Round => math::round(a0),
        Builtin::Min => math::min(args),
        Builtin::Max => math::max(args),
        Builtin::Pow => math::pow(a0, a1),
        Builtin::Sqrt => math::sqrt(a0),
        Builtin::Add => math::add(args),
        Builtin::Multiply => math::multiply(args),

        Builtin::Concat => string::concat(args),
        Builtin::Substring => string::substring(a0, a1, a2),
        Builtin::ToLowerCase => string::to_lower_case(a0),
        Builtin::ToUpperCase => string::to_upper_case(a0),
        Builtin::Trim => string::trim(a0),
        Builtin::Length => string::length(a0)?,
        Builtin::StartsWith => string::starts_with(a0, a1),
        Builtin::EndsWith => string::ends_with(a0, a1),
        Builtin::Includes => match a0 {
            Value::Array(items) => array::includes(items, a1),
            other => Value::Bool(other.to_display_string().contains(&a1.to_display_string())),
        },
        Builtin::ReplaceAll => string::replace_all(a0, a1, a2),
        Builtin::IndexOf => match a0 {
            Value::Array(items) => array::index_of(items, a1),
            other => string::index_of(&other.to_display_string(), &a1.to_display_string(), to_integer(a2)),
        },
        Builtin::LastIndexOf => match a0 {
            Value::Array(items) => array::last_index_of(items, a1),
            other => string::last_index_of(&other.to_display_string(), &a1.to_display_string()),
        },
        Builtin::Slice => match a0 {
            Value::Array(items) => array::slice(items, a1, a2),
            other => string::slice(&other.to_display_string(), a1, a2),
        },
        Builtin::ParseInt => string::parse_int(a0, a1),
        Builtin::ParseFloat => string::parse_float(a0),
        Builtin::ToFixed => string::to_fixed(a0, a1)?,

        Builtin::ToString => types::to_string(a0),
        Builtin::ToNumber => types::to_number(a0),
        Builtin::ToBoolean => types::to_boolean(a0),
        Builtin::IsNull => types::is_null(a0),
        Builtin::IsUndefined => types::is_undefined(a0),
        Builtin::IsNumber => types::is_number(a0),
        Builtin::IsString => types::is_string(a0),
        Builtin::IsArray => types::is_array(a0),
        Builtin::IsObject => types::is_object(a0),

        Builtin::Reverse => array::reverse(a0)?,
        Builtin::Flat => array::flat(a0, a1)?,
        Builtin::Push => array::push(a0, args.get(1..).unwrap_or(&[]))?,
        Builtin::Pop => array::pop(a0)?,
        Builtin::Shift => array::shift(a0)?,
        Builtin::Unshift => array::unshift(a0, args.get(1..).unwrap_or(&[]))?,

        Builtin::Map
        | Builtin::Filter
        | Builtin::Find
        | Builtin::Reduce
        | Builtin::Some
        | Builtin::Every
        | Builtin::Sort
        | Builtin::FlatMap => {
            return Err(FunctionError::RuntimeError(format!(
                "{} requires a function argument",
                builtin.name()
            )))
        }
    };

    Ok(value)
}
