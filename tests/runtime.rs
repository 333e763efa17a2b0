use std::{cell::RefCell, rc::Rc};

use asteria::{AsteriaError, Interpreter, Value};

fn eval(source: &str) -> Value {
    let interpreter = Interpreter::new();
    interpreter
        .eval_string(source)
        .expect("evaluation should succeed")
}

fn eval_err(source: &str) -> String {
    let interpreter = Interpreter::new();
    match interpreter.eval_string(source) {
        Ok(value) => panic!("expected an error, received {value}"),
        Err(AsteriaError::Runtime(exception)) => format!("{}", exception.value()),
        Err(other) => panic!("expected a runtime exception, received {other}"),
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Integer(n) => *n,
        other => panic!("expected integer, found {other:?}"),
    }
}

fn expect_string(value: &Value) -> &str {
    match value {
        Value::String(s) => s,
        other => panic!("expected string, found {other:?}"),
    }
}

/// Installs a `log` global that records every value passed to it.
fn with_log() -> (Interpreter, Rc<RefCell<Vec<Value>>>) {
    let interpreter = Interpreter::new();
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let sink = buffer.clone();
    let log = Interpreter::native_function("log", Some(1), move |args| {
        sink.borrow_mut().push(args[0].clone());
        Ok(args[0].clone())
    });
    interpreter.define_global("log", log, true);
    (interpreter, buffer)
}

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(expect_int(&eval("return 2 + 2;")), 4);
    assert_eq!(expect_int(&eval("return (1 + 2) * 3 % 4;")), 1);
    assert_eq!(eval("return 1 + 0.5;"), Value::Real(1.5));
}

#[test]
fn integer_arithmetic_wraps() {
    let value = eval("return 0x7FFF`FFFF`FFFF`FFFF + 1;");
    assert_eq!(expect_int(&value), i64::MIN);
}

#[test]
fn integer_division_by_zero_throws() {
    let message = eval_err("return 1 / 0;");
    assert!(message.contains("DivisionByZero"), "{message}");
    assert_eq!(eval("return 1.0 / 0;"), Value::Real(f64::INFINITY));
}

#[test]
fn arithmetic_left_shift_is_checked() {
    assert_eq!(expect_int(&eval("return 1 << 3;")), 8);
    let message = eval_err("return 0x4000`0000`0000`0000 << 1;");
    assert!(message.contains("IntegerOverflow"), "{message}");
    assert_eq!(expect_int(&eval("return -8 >> 1;")), -4);
    assert_eq!(expect_int(&eval("return -8 >>> 62;")), 3);
    assert_eq!(expect_int(&eval("return 1 <<< 70;")), 0);
}

#[test]
fn string_and_container_addition() {
    assert_eq!(
        expect_string(&eval(r#"return "foo" + "bar";"#)),
        "foobar"
    );
    assert_eq!(
        eval("return [1] + [2, 3];"),
        Value::Array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3)
        ])
    );
    // Object merge is right-biased.
    let value = eval(r#"return { a: 1, b: 2 } + { b: 9, c: 3 };"#);
    let Value::Object(map) = value else {
        panic!("expected object");
    };
    assert_eq!(map.get("b"), Some(&Value::Integer(9)));
    assert_eq!(
        map.keys().cloned().collect::<Vec<_>>(),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn spaceship_reports_unordered_for_nan() {
    assert_eq!(expect_int(&eval("return 1 <=> 2;")), -1);
    assert_eq!(expect_int(&eval("return 2 <=> 2;")), 0);
    assert_eq!(expect_string(&eval("return nan <=> 1;")), "unordered");
}

#[test]
fn nested_closure_typeof_sees_the_outer_function() {
    let value = eval(
        r#"
        func three() {
          func two() {
            func one() {
              return typeof two;
            }
            return one();
          }
          return two();
        }
        return three();
        "#,
    );
    assert_eq!(expect_string(&value), "function");
}

#[test]
fn closures_share_captured_variables() {
    let value = eval(
        r#"
        func counter() {
          var n = 0;
          return func() { n += 1; return n; };
        }
        var tick = counter();
        tick();
        tick();
        return tick();
        "#,
    );
    assert_eq!(expect_int(&value), 3);
}

#[test]
fn this_binds_to_the_receiver() {
    let value = eval(
        r#"
        var obj = { x: 42, get: func() { return this.x; } };
        return obj.get();
        "#,
    );
    assert_eq!(expect_int(&value), 42);

    // A bare call leaves `this` null.
    let value = eval(
        r#"
        func bare() { return typeof this; }
        return bare();
        "#,
    );
    assert_eq!(expect_string(&value), "null");
}

#[test]
fn evaluation_order_is_left_to_right() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string("var a = [log(1), log(2) + log(3), log(4)]; return a;")
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![1, 2, 3, 4]);

    buffer.borrow_mut().clear();
    interpreter
        .eval_string("func f(x, y) { return x - y; } return f(log(5), log(6));")
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![5, 6]);
}

#[test]
fn short_circuits_skip_the_untaken_arm() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string(
            r#"
            false && log(1);
            true || log(2);
            0 ?? log(3);
            null ?? log(4);
            true && log(5);
            return null;
            "#,
        )
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![4, 5]);
}

#[test]
fn ternary_evaluates_one_arm() {
    let (interpreter, buffer) = with_log();
    let value = interpreter
        .eval_string("return true ? log(1) : log(2);")
        .unwrap();
    assert_eq!(expect_int(&value), 1);
    assert_eq!(buffer.borrow().len(), 1);
}

#[test]
fn compound_assignment_opens_the_lvalue_once() {
    let (interpreter, buffer) = with_log();
    let value = interpreter
        .eval_string(
            r#"
            var a = [1, 2, 3];
            a[log(1)] += 10;
            return a[1];
            "#,
        )
        .unwrap();
    assert_eq!(expect_int(&value), 12);
    assert_eq!(buffer.borrow().len(), 1);
}

#[test]
fn defers_run_lifo_on_throw() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string(
            r#"
            try {
              defer log(1);
              defer log(2);
              throw "x";
            } catch(e) {
              log(e);
            }
            return null;
            "#,
        )
        .unwrap();
    let logged = buffer.borrow();
    assert_eq!(logged.len(), 3);
    assert_eq!(expect_int(&logged[0]), 2);
    assert_eq!(expect_int(&logged[1]), 1);
    assert_eq!(expect_string(&logged[2]), "x");
}

#[test]
fn defers_run_on_normal_exit_and_per_block() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string(
            r#"
            {
              defer log(1);
              {
                defer log(2);
                log(3);
              }
              log(4);
            }
            return null;
            "#,
        )
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![3, 2, 4, 1]);
}

#[test]
fn deferred_return_wins_over_inflight_exception() {
    let value = eval(
        r#"
        func f() {
          defer return 42;
          throw "boom";
        }
        return f();
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn negative_indices_wrap_on_write() {
    let value = eval(
        r#"
        var a = [10, 20, 30];
        a[-1] = 99;
        return a;
        "#,
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Integer(10),
            Value::Integer(20),
            Value::Integer(99)
        ])
    );
}

#[test]
fn still_negative_indices_prepend_null_fillers() {
    let value = eval(
        r#"
        var a = [10, 20, 30];
        a[-1] = 99;
        a[-10] = 7;
        return a;
        "#,
    );
    let Value::Array(elements) = value else {
        panic!("expected array");
    };
    assert_eq!(elements.len(), 10);
    assert_eq!(elements[0], Value::Integer(7));
    for element in &elements[1..7] {
        assert_eq!(*element, Value::Null);
    }
    assert_eq!(elements[7], Value::Integer(10));
    assert_eq!(elements[8], Value::Integer(20));
    assert_eq!(elements[9], Value::Integer(99));
}

#[test]
fn out_of_range_reads_yield_null() {
    assert_eq!(eval("var a = [1]; return a[5];"), Value::Null);
    assert_eq!(eval("var a = [1]; return a[-9];"), Value::Null);
    assert_eq!(eval("var o = { a: 1 }; return o.b;"), Value::Null);
}

#[test]
fn tail_recursion_runs_in_constant_native_stack() {
    let value = eval(
        r#"
        func spin(n) {
          if(n == 0) {
            return "done";
          }
          return spin(n - 1);
        }
        return spin(1000000);
        "#,
    );
    assert_eq!(expect_string(&value), "done");
}

#[test]
fn mutual_tail_recursion_also_bounds_the_stack() {
    let value = eval(
        r#"
        func even(n) {
          if(n == 0) { return true; }
          return odd(n - 1);
        }
        func odd(n) {
          if(n == 0) { return false; }
          return even(n - 1);
        }
        return even(100000);
        "#,
    );
    assert_eq!(value, Value::Boolean(true));
}

#[test]
fn switch_falls_through_until_break() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string(
            r#"
            switch(2) {
            case 1:
              log(1);
            case 2:
              log(2);
            case 3:
              log(3);
              break;
            default:
              log(99);
            }
            return null;
            "#,
        )
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![2, 3]);
}

#[test]
fn switch_default_is_position_independent() {
    let (interpreter, buffer) = with_log();
    interpreter
        .eval_string(
            r#"
            switch(7) {
            default:
              log(1);
            case 2:
              log(2);
              break;
            }
            return null;
            "#,
        )
        .unwrap();
    let logged: Vec<i64> = buffer.borrow().iter().map(expect_int).collect();
    assert_eq!(logged, vec![1, 2]);
}

#[test]
fn loops_support_break_continue_and_targets() {
    let value = eval(
        r#"
        var total = 0;
        for(var i = 0; i < 10; ++i) {
          if(i % 2 == 0) { continue; }
          if(i == 7) { break; }
          total += i;
        }
        return total;
        "#,
    );
    assert_eq!(expect_int(&value), 1 + 3 + 5);

    // A targeted `break while` passes through the enclosing `for` loop.
    let value = eval(
        r#"
        var n = 0;
        while(true) {
          n += 1;
          for(var i = 0; i < 10; ++i) {
            if(n >= 5) { break while; }
          }
        }
        return n;
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn for_each_iterates_arrays_and_objects_in_order() {
    let value = eval(
        r#"
        var keys = "";
        var total = 0;
        for(each k, v : { one: 1, two: 2, three: 3 }) {
          keys += k;
          total += v;
        }
        for(each i, v : [10, 20]) {
          total += i * v;
        }
        return keys + ":" + std.json.format(total);
        "#,
    );
    assert_eq!(expect_string(&value), "onetwothree:26");
}

#[test]
fn try_catch_rebinds_the_thrown_value() {
    let value = eval(
        r#"
        try {
          throw { code: 42 };
        } catch(e) {
          return e.code;
        }
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn uncaught_exceptions_carry_a_backtrace() {
    let interpreter = Interpreter::new();
    let program = interpreter
        .load_string(
            r#"
            func inner() { throw "bad"; }
            func outer() { return inner() + 1; }
            return outer();
            "#,
            "trace.ast",
        )
        .unwrap();
    let exception = interpreter.execute(&program, Vec::new()).unwrap_err();
    assert_eq!(exception.value(), &Value::String("bad".into()));
    let kinds: Vec<asteria::FrameKind> =
        exception.frames().iter().map(|frame| frame.kind).collect();
    assert_eq!(kinds[0], asteria::FrameKind::Throw);
    assert!(kinds.contains(&asteria::FrameKind::Func));
    assert!(exception.frames().iter().any(|f| f.file == "trace.ast"));
}

#[test]
fn assignment_to_a_constant_is_a_type_error() {
    let message = eval_err("const c = 1; c = 2; return c;");
    assert!(message.contains("TypeError"), "{message}");
}

#[test]
fn assert_failures_throw() {
    let message = eval_err(r#"assert 1 == 2 : "math is broken";"#);
    assert!(message.contains("Assertion"), "{message}");
    assert!(message.contains("math is broken"), "{message}");
    assert_eq!(eval("assert true; return 1;"), Value::Integer(1));
}

#[test]
fn unset_removes_elements_and_yields_them() {
    let value = eval(
        r#"
        var o = { a: 1, b: 2 };
        var removed = unset o.a;
        return [removed, lengthof o, o.b];
        "#,
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Integer(1),
            Value::Integer(1),
            Value::Integer(2)
        ])
    );
}

#[test]
fn typeof_and_lengthof() {
    assert_eq!(expect_string(&eval("return typeof null;")), "null");
    assert_eq!(expect_string(&eval("return typeof 1.5;")), "real");
    assert_eq!(expect_string(&eval("return typeof \"s\";")), "string");
    assert_eq!(expect_string(&eval("return typeof [];")), "array");
    assert_eq!(expect_string(&eval("return typeof {};")), "object");
    assert_eq!(expect_int(&eval("return lengthof [1, 2, 3];")), 3);
    assert_eq!(expect_int(&eval("return lengthof \"abc\";")), 3);
    assert_eq!(eval("return lengthof null;"), Value::Null);
}

#[test]
fn increments_have_value_semantics() {
    let value = eval(
        r#"
        var i = 5;
        var post = i++;
        var pre = ++i;
        return [i, post, pre];
        "#,
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Integer(7),
            Value::Integer(5),
            Value::Integer(7)
        ])
    );
}

#[test]
fn script_arguments_are_bound_as_an_array() {
    let interpreter = Interpreter::new();
    let program = interpreter
        .load_string("return args[0] + args[1];", "args.ast")
        .unwrap();
    let value = interpreter
        .execute(&program, vec![Value::Integer(40), Value::Integer(2)])
        .unwrap();
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn script_locals_die_with_the_script() {
    let interpreter = Interpreter::new();
    interpreter.eval_string("var leak = 1; return leak;").unwrap();
    // A later snippet cannot see the previous script's locals.
    let err = interpreter.eval_string("return leak;").unwrap_err();
    let AsteriaError::Runtime(exception) = err else {
        panic!("expected a runtime exception");
    };
    assert!(format!("{}", exception.value()).contains("undeclared"));
}

#[test]
fn json_round_trips_through_std() {
    let value = eval(
        r#"
        var v = { a: [1, 2.5, "x"], b: { c: null, d: true } };
        return std.json.parse(std.json.format(v)) == null ? "bad" : std.json.format(v);
        "#,
    );
    assert_eq!(
        expect_string(&value),
        r#"{"a":[1,2.5,"x"],"b":{"c":null,"d":true}}"#
    );
}

#[test]
fn json_round_trip_preserves_values() {
    let mut map = indexmap_object();
    map.insert("n".into(), Value::Integer(7));
    map.insert("r".into(), Value::Real(2.5));
    map.insert("s".into(), Value::String("hi".into()));
    map.insert(
        "a".into(),
        Value::Array(vec![Value::Null, Value::Boolean(false)]),
    );
    let original = Value::Object(map);
    let round_tripped = Value::from_json(&original.to_json()).unwrap();
    assert_eq!(round_tripped, original);
}

fn indexmap_object() -> indexmap::IndexMap<String, Value> {
    indexmap::IndexMap::new()
}

#[test]
fn std_helpers_work() {
    assert_eq!(expect_int(&eval(r#"return std.string.len("hello");"#)), 5);
    assert_eq!(
        expect_string(&eval(r#"return std.string.sub("hello", 1, 3);"#)),
        "ell"
    );
    assert_eq!(expect_int(&eval("return std.array.len([1, 2]);")), 2);
    assert_eq!(
        eval("return std.array.push([1], 2);"),
        Value::Array(vec![Value::Integer(1), Value::Integer(2)])
    );
    assert_eq!(eval("return std.math.abs(-3);"), Value::Integer(3));
    assert_eq!(eval("return std.math.sqrt(49);"), Value::Real(7.0));
}

#[test]
fn keyword_as_identifier_option_is_honored() {
    let interpreter = Interpreter::with_options(asteria::ParserOptions {
        keyword_as_identifier: true,
        ..Default::default()
    });
    // `each` stops being a keyword, so it works as a plain name.
    let program = interpreter
        .load_string("each = 3; each;", "opt.ast")
        .unwrap();
    assert_eq!(
        interpreter.execute(&program, Vec::new()).unwrap(),
        Value::Null
    );
}

#[test]
fn excess_arguments_are_dropped_and_missing_bind_null() {
    let value = eval(
        r#"
        func f(a, b) { return [a, typeof b]; }
        return f(1, 2, 3) + f(9);
        "#,
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Integer(1),
            Value::String("integer".into()),
            Value::Integer(9),
            Value::String("null".into())
        ])
    );
}
