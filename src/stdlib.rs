use indexmap::IndexMap;

use crate::{
    diagnostics::Exception,
    gc::GcGeneration,
    runtime::Interpreter,
    value::Value,
};

/// Installs the `std` object into the interpreter's global scope. The
/// bindings go through the same embedding hooks available to hosts:
/// `define_global` for the root and `native_function` for the leaves.
pub fn install(interpreter: &Interpreter) {
    let mut io = IndexMap::new();
    io.insert("print".into(), native("print", None, io_print));
    io.insert("println".into(), native("println", None, io_println));
    io.insert("dbg".into(), native("dbg", Some(1), io_dbg));

    let mut string = IndexMap::new();
    string.insert("len".into(), native("len", Some(1), string_len));
    string.insert("sub".into(), native("sub", Some(3), string_sub));
    string.insert("find".into(), native("find", Some(2), string_find));
    string.insert("to_upper".into(), native("to_upper", Some(1), string_to_upper));
    string.insert("to_lower".into(), native("to_lower", Some(1), string_to_lower));
    string.insert("trim".into(), native("trim", Some(1), string_trim));

    let mut array = IndexMap::new();
    array.insert("len".into(), native("len", Some(1), array_len));
    array.insert("push".into(), native("push", Some(2), array_push));
    array.insert("pop".into(), native("pop", Some(1), array_pop));
    array.insert("insert".into(), native("insert", Some(3), array_insert));
    array.insert("erase".into(), native("erase", Some(2), array_erase));
    array.insert("slice".into(), native("slice", Some(3), array_slice));

    let mut math = IndexMap::new();
    math.insert("pi".into(), Value::Real(std::f64::consts::PI));
    math.insert("e".into(), Value::Real(std::f64::consts::E));
    math.insert("abs".into(), native("abs", Some(1), math_abs));
    math.insert("floor".into(), native("floor", Some(1), math_floor));
    math.insert("ceil".into(), native("ceil", Some(1), math_ceil));
    math.insert("round".into(), native("round", Some(1), math_round));
    math.insert("sqrt".into(), native("sqrt", Some(1), math_sqrt));
    math.insert("pow".into(), native("pow", Some(2), math_pow));

    let mut json = IndexMap::new();
    json.insert("format".into(), native("format", Some(1), json_format));
    json.insert("parse".into(), native("parse", Some(1), json_parse));

    let mut gc = IndexMap::new();
    {
        let handle = interpreter.gc_handle().clone();
        gc.insert(
            "collect".into(),
            Interpreter::native_function("collect", None, move |args| {
                let limit = match args {
                    [] => GcGeneration::Oldest,
                    [value] => generation_from(value)?,
                    _ => {
                        return Err(Exception::from_native(
                            "`collect` expects at most one argument",
                        ));
                    }
                };
                Ok(Value::Integer(handle.collect(limit) as i64))
            }),
        );
    }
    {
        let handle = interpreter.gc_handle().clone();
        gc.insert(
            "threshold".into(),
            Interpreter::native_function("threshold", Some(1), move |args| {
                let gen = generation_from(&args[0])?;
                Ok(Value::Integer(handle.threshold(gen) as i64))
            }),
        );
    }
    {
        let handle = interpreter.gc_handle().clone();
        gc.insert(
            "set_threshold".into(),
            Interpreter::native_function("set_threshold", Some(2), move |args| {
                let gen = generation_from(&args[0])?;
                let threshold = expect_integer(&args[1])?;
                if threshold < 0 {
                    return Err(Exception::from_native("threshold must be non-negative"));
                }
                handle.set_threshold(gen, threshold as usize);
                Ok(Value::Null)
            }),
        );
    }

    let mut system = IndexMap::new();
    {
        let prng = interpreter.prng_handle();
        system.insert(
            "random".into(),
            Interpreter::native_function("random", Some(0), move |_| {
                use rand::Rng;
                Ok(Value::Integer(prng.borrow_mut().gen::<u32>() as i64))
            }),
        );
    }
    system.insert("env".into(), native("env", Some(1), system_env));

    let mut std_object = IndexMap::new();
    std_object.insert("io".into(), Value::Object(io));
    std_object.insert("string".into(), Value::Object(string));
    std_object.insert("array".into(), Value::Object(array));
    std_object.insert("math".into(), Value::Object(math));
    std_object.insert("json".into(), Value::Object(json));
    std_object.insert("gc".into(), Value::Object(gc));
    std_object.insert("system".into(), Value::Object(system));

    interpreter.define_global("std", Value::Object(std_object), true);
}

fn native(
    name: &str,
    arity: Option<usize>,
    call: fn(&[Value]) -> Result<Value, Exception>,
) -> Value {
    Interpreter::native_function(name, arity, call)
}

fn expect_string(value: &Value) -> Result<&str, Exception> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Exception::from_native(format!(
            "expected string, found {}",
            other.type_name()
        ))),
    }
}

fn expect_array(value: &Value) -> Result<&Vec<Value>, Exception> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(Exception::from_native(format!(
            "expected array, found {}",
            other.type_name()
        ))),
    }
}

fn expect_integer(value: &Value) -> Result<i64, Exception> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(Exception::from_native(format!(
            "expected integer, found {}",
            other.type_name()
        ))),
    }
}

fn generation_from(value: &Value) -> Result<GcGeneration, Exception> {
    match expect_integer(value)? {
        0 => Ok(GcGeneration::Newest),
        1 => Ok(GcGeneration::Middle),
        2 => Ok(GcGeneration::Oldest),
        other => Err(Exception::from_native(format!(
            "no such GC generation: {other}"
        ))),
    }
}

// Clamps `[start, start + length)` to an array or string of `len`
// elements, with negative starts wrapping from the end.
fn clamp_range(len: usize, start: i64, length: i64) -> (usize, usize) {
    let len = len as i64;
    let mut start = start;
    if start < 0 {
        start += len;
    }
    let start = start.clamp(0, len);
    let end = (start + length.max(0)).clamp(start, len);
    (start as usize, end as usize)
}

fn io_print(args: &[Value]) -> Result<Value, Exception> {
    for value in args {
        print!("{value}");
    }
    Ok(Value::Null)
}

fn io_println(args: &[Value]) -> Result<Value, Exception> {
    for value in args {
        print!("{value}");
    }
    println!();
    Ok(Value::Null)
}

fn io_dbg(args: &[Value]) -> Result<Value, Exception> {
    eprintln!("{:?}", args[0]);
    Ok(args[0].clone())
}

fn string_len(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Integer(expect_string(&args[0])?.len() as i64))
}

fn string_sub(args: &[Value]) -> Result<Value, Exception> {
    let text = expect_string(&args[0])?;
    let (start, end) = clamp_range(
        text.len(),
        expect_integer(&args[1])?,
        expect_integer(&args[2])?,
    );
    match text.get(start..end) {
        Some(slice) => Ok(Value::String(slice.to_string())),
        None => Err(Exception::from_native("substring splits a character")),
    }
}

fn string_find(args: &[Value]) -> Result<Value, Exception> {
    let text = expect_string(&args[0])?;
    let pattern = expect_string(&args[1])?;
    Ok(match text.find(pattern) {
        Some(index) => Value::Integer(index as i64),
        None => Value::Null,
    })
}

fn string_to_upper(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::String(expect_string(&args[0])?.to_uppercase()))
}

fn string_to_lower(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::String(expect_string(&args[0])?.to_lowercase()))
}

fn string_trim(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::String(expect_string(&args[0])?.trim().to_string()))
}

fn array_len(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Integer(expect_array(&args[0])?.len() as i64))
}

fn array_push(args: &[Value]) -> Result<Value, Exception> {
    let mut elements = expect_array(&args[0])?.clone();
    elements.push(args[1].clone());
    Ok(Value::Array(elements))
}

fn array_pop(args: &[Value]) -> Result<Value, Exception> {
    let mut elements = expect_array(&args[0])?.clone();
    let value = elements.pop().unwrap_or(Value::Null);
    let mut result = IndexMap::new();
    result.insert("array".to_string(), Value::Array(elements));
    result.insert("value".to_string(), value);
    Ok(Value::Object(result))
}

fn array_insert(args: &[Value]) -> Result<Value, Exception> {
    let mut elements = expect_array(&args[0])?.clone();
    let (index, _) = clamp_range(elements.len(), expect_integer(&args[1])?, 0);
    elements.insert(index, args[2].clone());
    Ok(Value::Array(elements))
}

fn array_erase(args: &[Value]) -> Result<Value, Exception> {
    let mut elements = expect_array(&args[0])?.clone();
    let (index, _) = clamp_range(elements.len(), expect_integer(&args[1])?, 0);
    if index < elements.len() {
        elements.remove(index);
    }
    Ok(Value::Array(elements))
}

fn array_slice(args: &[Value]) -> Result<Value, Exception> {
    let elements = expect_array(&args[0])?;
    let (start, end) = clamp_range(
        elements.len(),
        expect_integer(&args[1])?,
        expect_integer(&args[2])?,
    );
    Ok(Value::Array(elements[start..end].to_vec()))
}

fn math_abs(args: &[Value]) -> Result<Value, Exception> {
    match &args[0] {
        Value::Integer(n) => Ok(Value::Integer(n.wrapping_abs())),
        Value::Real(r) => Ok(Value::Real(r.abs())),
        other => Err(Exception::from_native(format!(
            "expected number, found {}",
            other.type_name()
        ))),
    }
}

fn to_real(value: &Value) -> Result<f64, Exception> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Real(r) => Ok(*r),
        other => Err(Exception::from_native(format!(
            "expected number, found {}",
            other.type_name()
        ))),
    }
}

fn math_floor(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Real(to_real(&args[0])?.floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Real(to_real(&args[0])?.ceil()))
}

fn math_round(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Real(to_real(&args[0])?.round()))
}

fn math_sqrt(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Real(to_real(&args[0])?.sqrt()))
}

fn math_pow(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::Real(to_real(&args[0])?.powf(to_real(&args[1])?)))
}

fn json_format(args: &[Value]) -> Result<Value, Exception> {
    Ok(Value::String(args[0].to_json()))
}

fn json_parse(args: &[Value]) -> Result<Value, Exception> {
    Value::from_json(expect_string(&args[0])?)
}

fn system_env(args: &[Value]) -> Result<Value, Exception> {
    Ok(match std::env::var(expect_string(&args[0])?) {
        Ok(value) => Value::String(value),
        Err(_) => Value::Null,
    })
}
