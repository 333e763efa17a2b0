use asteria::{GcGeneration, Interpreter, Value};

const GENERATIONS: [GcGeneration; 3] = [
    GcGeneration::Newest,
    GcGeneration::Middle,
    GcGeneration::Oldest,
];

fn total_tracked(interpreter: &Interpreter) -> usize {
    GENERATIONS
        .iter()
        .map(|gen| interpreter.count_tracked_variables(*gen))
        .sum()
}

/// Raises every threshold so no automatic collection interferes with the
/// counts a test observes.
fn quiet_interpreter() -> Interpreter {
    let interpreter = Interpreter::new();
    for gen in GENERATIONS {
        interpreter.set_gc_threshold(gen, usize::MAX);
    }
    interpreter
}

#[test]
fn thresholds_are_tunable() {
    let interpreter = Interpreter::new();
    assert_eq!(interpreter.gc_threshold(GcGeneration::Newest), 10);
    assert_eq!(interpreter.gc_threshold(GcGeneration::Middle), 70);
    assert_eq!(interpreter.gc_threshold(GcGeneration::Oldest), 500);
    interpreter.set_gc_threshold(GcGeneration::Newest, 3);
    assert_eq!(interpreter.gc_threshold(GcGeneration::Newest), 3);
}

#[test]
fn dead_script_variables_are_reclaimed() {
    let interpreter = quiet_interpreter();
    interpreter
        .eval_string(
            r#"
            var a = [];
            var b = [];
            a[0] = b;
            b[0] = a;
            a = null;
            b = null;
            return null;
            "#,
        )
        .unwrap();
    let before = total_tracked(&interpreter);
    let reclaimed = interpreter.collect(GcGeneration::Oldest);
    assert!(reclaimed >= 2, "reclaimed {reclaimed}");
    assert!(total_tracked(&interpreter) < before);
}

#[test]
fn closure_self_cycles_are_collected() {
    let interpreter = quiet_interpreter();
    interpreter
        .eval_string(
            r#"
            var f = null;
            f = func() { return f; };
            return null;
            "#,
        )
        .unwrap();
    // `f` holds a closure whose capture table holds `f` again; reference
    // counting alone cannot reclaim the pair.
    let reclaimed = interpreter.collect(GcGeneration::Oldest);
    assert!(reclaimed >= 1, "reclaimed {reclaimed}");
}

#[test]
fn collection_conserves_tracked_plus_pooled() {
    let interpreter = quiet_interpreter();
    interpreter
        .eval_string("var a = [1]; var b = [2]; var c = a; return null;")
        .unwrap();
    let tracked_before = total_tracked(&interpreter);
    let pooled_before = interpreter.count_pooled_variables();
    assert_eq!(pooled_before, 0);

    let reclaimed = interpreter.collect(GcGeneration::Oldest);
    let tracked_after = total_tracked(&interpreter);
    let pooled_after = interpreter.count_pooled_variables();
    assert_eq!(
        tracked_after + pooled_after,
        tracked_before + pooled_before - reclaimed
    );
}

#[test]
fn host_held_variables_survive_collection() {
    let interpreter = quiet_interpreter();
    let handle = interpreter.create_variable(GcGeneration::Newest);
    handle.initialize(Value::Integer(7), false);

    interpreter.collect(GcGeneration::Oldest);
    assert!(handle.is_initialized());
    assert_eq!(*handle.value(), Value::Integer(7));
    assert!(interpreter.count_tracked_variables(GcGeneration::Oldest) >= 1);
}

#[test]
fn globals_survive_collection() {
    let interpreter = quiet_interpreter();
    interpreter.define_global("keep", Value::Integer(5), false);
    interpreter.collect(GcGeneration::Oldest);
    let value = interpreter.eval_string("return keep;").unwrap();
    assert_eq!(value, Value::Integer(5));
}

#[test]
fn automatic_collection_pools_and_reuses_cells() {
    let interpreter = Interpreter::new();
    interpreter.set_gc_threshold(GcGeneration::Newest, 4);
    // Dropping each handle right away leaves pure garbage behind; the
    // allocation that crosses the threshold sweeps it into the pool.
    for _ in 0..16 {
        let handle = interpreter.create_variable(GcGeneration::Newest);
        handle.initialize(Value::Integer(1), false);
    }
    assert!(interpreter.count_pooled_variables() > 0);
}

#[test]
fn survivors_are_promoted_to_older_generations() {
    let interpreter = quiet_interpreter();
    let keep = interpreter.create_variable(GcGeneration::Newest);
    keep.initialize(Value::Integer(1), false);
    assert_eq!(interpreter.count_tracked_variables(GcGeneration::Newest), 1);

    // Only the newest generation is collected; the live cell moves up.
    interpreter.collect(GcGeneration::Newest);
    assert_eq!(interpreter.count_tracked_variables(GcGeneration::Newest), 0);
    assert!(interpreter.count_tracked_variables(GcGeneration::Middle) >= 1);
    assert!(keep.is_initialized());
}

#[test]
fn finalize_wipes_everything() {
    let interpreter = quiet_interpreter();
    interpreter
        .eval_string("var a = [1, 2, 3]; return null;")
        .unwrap();
    let tracked = total_tracked(&interpreter);
    assert!(tracked > 0);
    let finalized = interpreter.gc_finalize();
    assert!(finalized >= tracked);
    assert_eq!(total_tracked(&interpreter), 0);
    assert_eq!(interpreter.count_pooled_variables(), 0);
}

#[test]
fn gc_is_reachable_from_scripts() {
    let interpreter = quiet_interpreter();
    let value = interpreter
        .eval_string(
            r#"
            var junk = [[]];
            junk = null;
            return std.gc.collect(2) >= 0;
            "#,
        )
        .unwrap();
    assert_eq!(value, Value::Boolean(true));
}
