use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    air::{self, AirNode, AirSwitchClause, FnPrototype},
    ast::{BinaryOp, BreakTarget, ContinueTarget, ShortCircuitOp, UnaryOp},
    avmc::{AirStatus, AvmcQueue},
    context::{Scope, ScopeRef},
    diagnostics::{AsteriaError, Exception, ParserError, SourceLocation},
    gc::{GarbageCollector, GcGeneration},
    lexer::ParserOptions,
    parser,
    reference::{Modifier, PtcDescriptor, RefRoot, Reference},
    value::{Closure, Compare, FunctionValue, NativeFunction, Value},
};

/// A loaded, lowered program, ready to execute any number of times. The
/// body runs as a function body: script-level variables die when it
/// returns.
pub struct Program {
    file: Rc<str>,
    body: Rc<AvmcQueue>,
}

impl Program {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn body(&self) -> &Rc<AvmcQueue> {
        &self.body
    }
}

/// One executing function frame: the current scope, the reference stack
/// the expression nodes operate on, and a stack of per-block defer lists.
struct Frame {
    scope: ScopeRef,
    stack: Vec<Reference>,
    defers: Vec<Vec<(SourceLocation, Rc<AvmcQueue>)>>,
    result: Option<Reference>,
    file: Rc<str>,
}

impl Frame {
    fn new(scope: ScopeRef, file: Rc<str>) -> Self {
        Self {
            scope,
            stack: Vec::new(),
            defers: Vec::new(),
            result: None,
            file,
        }
    }

    fn pop(&mut self) -> Result<Reference, Exception> {
        self.stack
            .pop()
            .ok_or_else(|| Exception::from_native("evaluation stack underflow"))
    }

    fn pop_value(&mut self) -> Result<Value, Exception> {
        self.pop()?.read()
    }

    fn top(&self) -> Result<&Reference, Exception> {
        self.stack
            .last()
            .ok_or_else(|| Exception::from_native("evaluation stack underflow"))
    }

    fn has_pending_defers(&self) -> bool {
        self.defers.iter().any(|level| !level.is_empty())
    }
}

/// One interpreter instance: the global scope, the garbage collector that
/// owns every Variable, and the PRNG. Instances are independent and
/// single-threaded; nothing here is shared between them.
pub struct Interpreter {
    globals: ScopeRef,
    gc: Rc<GarbageCollector>,
    prng: Rc<RefCell<SmallRng>>,
    options: ParserOptions,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let interpreter = Self {
            globals: Scope::new(),
            gc: Rc::new(GarbageCollector::new()),
            prng: Rc::new(RefCell::new(SmallRng::from_entropy())),
            options,
        };
        crate::stdlib::install(&interpreter);
        interpreter
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    // ---- loading ----

    pub fn load_string(&self, source: &str, filename: &str) -> Result<Program, ParserError> {
        let statements = parser::parse_program(source, &self.options)?;
        let file: Rc<str> = Rc::from(filename);
        let body = air::lower_program(&statements, &file);
        Ok(Program { file, body })
    }

    pub fn load_file(&self, path: impl AsRef<std::path::Path>) -> Result<Program, AsteriaError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let tokens = crate::lexer::tokenize_bytes(&bytes, &self.options)?;
        let statements = parser::parse_tokens(tokens)?;
        let file: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
        let body = air::lower_program(&statements, &file);
        Ok(Program { file, body })
    }

    /// Loads and runs a source snippet in one step.
    pub fn eval_string(&self, source: &str) -> crate::diagnostics::Result<Value> {
        let program = self.load_string(source, "<eval>")?;
        Ok(self.execute(&program, Vec::new())?)
    }

    // ---- embedding hooks ----

    /// Defines or replaces a global binding backed by a fresh Variable.
    pub fn define_global(&self, name: &str, value: Value, immutable: bool) {
        let variable = self.gc.create_variable(GcGeneration::Oldest);
        variable.initialize(value, immutable);
        self.globals
            .borrow_mut()
            .define(name, Reference::variable(variable));
    }

    /// Resolves a global binding, creating a null-initialized variable in
    /// the global scope when the name does not exist yet.
    pub fn open_named_reference(&self, name: &str) -> Reference {
        if let Some(reference) = Scope::lookup(&self.globals, name) {
            return reference;
        }
        let variable = self.gc.create_variable(GcGeneration::Oldest);
        variable.initialize(Value::Null, false);
        let reference = Reference::variable(variable);
        self.globals.borrow_mut().define(name, reference.clone());
        reference
    }

    /// Creates a fresh tracked Variable; the std-lib bindings allocate
    /// through this.
    pub fn create_variable(&self, gen_hint: GcGeneration) -> crate::variable::VarHandle {
        self.gc.create_variable(gen_hint)
    }

    /// Builds an AIR-backed function value from parts, as the std-lib
    /// installer does for script-visible helpers.
    pub fn create_function(
        name: &str,
        params: Vec<String>,
        body: Rc<AvmcQueue>,
        captured: IndexMap<String, Reference>,
    ) -> Value {
        let signature = format!("{}({})", name, params.join(", "));
        let prototype = Rc::new(FnPrototype {
            name: signature,
            file: Rc::from("<native code>"),
            free_names: captured.keys().cloned().collect(),
            params,
            body,
            sloc: SourceLocation::default(),
        });
        Value::Function(FunctionValue::Air(Rc::new(Closure::new(
            prototype, captured,
        ))))
    }

    /// Wraps a host closure as a callable value.
    pub fn native_function(
        name: &str,
        arity: Option<usize>,
        call: impl Fn(&[Value]) -> Result<Value, Exception> + 'static,
    ) -> Value {
        Value::Function(FunctionValue::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            arity,
            call: Box::new(call),
        })))
    }

    pub fn random_u32(&self) -> u32 {
        self.prng.borrow_mut().gen()
    }

    pub(crate) fn prng_handle(&self) -> Rc<RefCell<SmallRng>> {
        self.prng.clone()
    }

    // ---- GC tuning ----

    pub fn gc_handle(&self) -> &Rc<GarbageCollector> {
        &self.gc
    }

    pub fn set_gc_threshold(&self, gen: GcGeneration, threshold: usize) {
        self.gc.set_threshold(gen, threshold);
    }

    pub fn gc_threshold(&self, gen: GcGeneration) -> usize {
        self.gc.threshold(gen)
    }

    pub fn collect(&self, gen_limit: GcGeneration) -> usize {
        self.gc.collect(gen_limit)
    }

    pub fn gc_finalize(&self) -> usize {
        self.gc.finalize()
    }

    pub fn count_tracked_variables(&self, gen: GcGeneration) -> usize {
        self.gc.count_tracked(gen)
    }

    pub fn count_pooled_variables(&self) -> usize {
        self.gc.count_pooled()
    }

    // ---- execution ----

    /// Runs a loaded program. `args` is bound as an immutable array named
    /// `args`; the result is the value of the program's `return`
    /// statement, or null when it runs off the end.
    pub fn execute(&self, program: &Program, args: Vec<Value>) -> Result<Value, Exception> {
        let scope = Scope::with_parent(self.globals.clone());
        {
            let variable = self.gc.create_variable(GcGeneration::Newest);
            variable.initialize(Value::Array(args), true);
            let mut scope = scope.borrow_mut();
            scope.define("args", Reference::variable(variable));
            scope.define("this", Reference::temporary(Value::Null));
        }
        let mut frame = Frame::new(scope, program.file.clone());
        let status = self.execute_block(&program.body, &mut frame)?;
        let mut result = match status {
            AirStatus::ReturnRef => frame.result.take().unwrap_or_else(Reference::void),
            _ => Reference::void(),
        };
        if let Some(descriptor) = result.take_pending_tail_call() {
            result = self.invoke_function(
                descriptor.target.clone(),
                descriptor.this_ref.clone(),
                descriptor.args.clone(),
            )?;
        }
        result.read()
    }

    fn execute_queue(&self, queue: &AvmcQueue, frame: &mut Frame) -> Result<AirStatus, Exception> {
        for node in queue.nodes() {
            match self.execute_node(node, frame)? {
                AirStatus::Next => {}
                status => return Ok(status),
            }
        }
        Ok(AirStatus::Next)
    }

    /// Executes a queue as a block: a child scope and a fresh defer level
    /// are acquired on entry and released on every exit path, with the
    /// deferred fragments running LIFO before control transfers.
    fn execute_block(&self, body: &AvmcQueue, frame: &mut Frame) -> Result<AirStatus, Exception> {
        let parent = frame.scope.clone();
        frame.scope = Scope::with_parent(parent.clone());
        self.hoist_functions(body, frame);
        frame.defers.push(Vec::new());
        let outcome = self.execute_queue(body, frame);
        let deferred = frame.defers.pop().expect("defer level must exist");
        let outcome = self.run_defers(deferred, outcome, frame);
        frame.scope = parent;
        outcome
    }

    /// Runs deferred fragments in reverse order. A defer that completes
    /// normally leaves the pending outcome alone; one that returns,
    /// breaks, or continues overrides it; one that throws replaces the
    /// in-flight exception and unwinding continues.
    fn run_defers(
        &self,
        deferred: Vec<(SourceLocation, Rc<AvmcQueue>)>,
        mut outcome: Result<AirStatus, Exception>,
        frame: &mut Frame,
    ) -> Result<AirStatus, Exception> {
        for (_sloc, queue) in deferred.into_iter().rev() {
            let depth = frame.stack.len();
            let result = self.execute_queue(&queue, frame);
            frame.stack.truncate(depth);
            match result {
                Ok(AirStatus::Next) => {}
                Ok(status) => outcome = Ok(status),
                Err(replacement) => outcome = Err(replacement),
            }
        }
        outcome
    }

    fn execute_node(&self, node: &AirNode, frame: &mut Frame) -> Result<AirStatus, Exception> {
        match node {
            AirNode::ClearStack => {
                frame.stack.clear();
                Ok(AirStatus::Next)
            }
            AirNode::PushLiteral(value) => {
                frame.stack.push(Reference::temporary(value.clone()));
                Ok(AirStatus::Next)
            }
            AirNode::PushNamed { name, sloc } => match Scope::lookup(&frame.scope, name) {
                Some(reference) => {
                    frame.stack.push(reference);
                    Ok(AirStatus::Next)
                }
                None => Err(Exception::key_error(
                    &frame.file,
                    sloc.line,
                    format!("undeclared identifier `{name}`"),
                )),
            },
            AirNode::PushThis { sloc } => match Scope::lookup(&frame.scope, "this") {
                Some(reference) => {
                    frame.stack.push(reference);
                    Ok(AirStatus::Next)
                }
                None => Err(Exception::key_error(
                    &frame.file,
                    sloc.line,
                    "`this` is not bound here",
                )),
            },
            AirNode::MakeArray { count } => {
                let mut elements = Vec::with_capacity(*count);
                for _ in 0..*count {
                    elements.push(frame.pop_value()?);
                }
                elements.reverse();
                frame
                    .stack
                    .push(Reference::temporary(Value::Array(elements)));
                Ok(AirStatus::Next)
            }
            AirNode::MakeObject { keys } => {
                let mut values = Vec::with_capacity(keys.len());
                for _ in 0..keys.len() {
                    values.push(frame.pop_value()?);
                }
                values.reverse();
                let map: IndexMap<String, Value> =
                    keys.iter().cloned().zip(values).collect();
                frame.stack.push(Reference::temporary(Value::Object(map)));
                Ok(AirStatus::Next)
            }
            AirNode::MakeClosure { prototype } => {
                let closure = self.instantiate_closure(prototype, &frame.scope);
                frame
                    .stack
                    .push(Reference::temporary(Value::Function(FunctionValue::Air(
                        closure,
                    ))));
                Ok(AirStatus::Next)
            }
            AirNode::DeclareVar {
                name,
                immutable,
                has_init,
            } => {
                let value = if *has_init {
                    frame.pop_value()?
                } else {
                    Value::Null
                };
                let variable = self.gc.create_variable(GcGeneration::Newest);
                variable.initialize(value, *immutable);
                frame
                    .scope
                    .borrow_mut()
                    .define(name.clone(), Reference::variable(variable));
                Ok(AirStatus::Next)
            }
            AirNode::DefineFunction { name, prototype } => {
                // The binding is normally hoisted at block entry; a defer
                // fragment executes outside a block and binds here.
                let hoisted = match frame.scope.borrow().get_here(name).map(|r| r.root().clone()) {
                    Some(RefRoot::Variable(variable)) => Some(variable),
                    _ => None,
                };
                let variable = match hoisted {
                    Some(variable) => variable,
                    None => {
                        let variable = self.gc.create_variable(GcGeneration::Newest);
                        variable.initialize(Value::Null, false);
                        frame
                            .scope
                            .borrow_mut()
                            .define(name.clone(), Reference::variable(variable.clone()));
                        variable
                    }
                };
                let closure = self.instantiate_closure(prototype, &frame.scope);
                variable.initialize(Value::Function(FunctionValue::Air(closure)), true);
                Ok(AirStatus::Next)
            }
            AirNode::UnaryOp { op, sloc } => {
                let value = frame.pop_value()?;
                let result = self.apply_unary(*op, value, &frame.file, sloc.line)?;
                frame.stack.push(Reference::temporary(result));
                Ok(AirStatus::Next)
            }
            AirNode::BinaryOp { op, sloc } => {
                let rhs = frame.pop_value()?;
                let lhs = frame.pop_value()?;
                let result = self.apply_binary(*op, lhs, rhs, &frame.file, sloc.line)?;
                frame.stack.push(Reference::temporary(result));
                Ok(AirStatus::Next)
            }
            AirNode::Assign { .. } => {
                let value = frame.pop_value()?;
                let target = frame.pop()?;
                target.write(value)?;
                frame.stack.push(target);
                Ok(AirStatus::Next)
            }
            AirNode::AssignNamed { name, .. } => {
                let value = frame.pop_value()?;
                match Scope::lookup(&frame.scope, name) {
                    Some(reference) => {
                        reference.write(value)?;
                        frame.stack.push(reference);
                    }
                    None => {
                        // Assignment to an unknown name creates the
                        // binding in the innermost scope.
                        let variable = self.gc.create_variable(GcGeneration::Newest);
                        variable.initialize(value, false);
                        let reference = Reference::variable(variable);
                        frame
                            .scope
                            .borrow_mut()
                            .define(name.clone(), reference.clone());
                        frame.stack.push(reference);
                    }
                }
                Ok(AirStatus::Next)
            }
            AirNode::CompoundAssign { op, sloc } => {
                let rhs = frame.pop_value()?;
                let target = frame.top()?.clone();
                let op = *op;
                let file = frame.file.clone();
                let line = sloc.line;
                target.modify(|leaf| {
                    let result = self.apply_binary(op, leaf.clone(), rhs, &file, line)?;
                    *leaf = result;
                    Ok(Value::Null)
                })?;
                Ok(AirStatus::Next)
            }
            AirNode::IncDec {
                increment,
                postfix,
                sloc,
            } => {
                let target = frame.top()?.clone();
                let increment = *increment;
                let file = frame.file.clone();
                let line = sloc.line;
                let old = target.modify(|leaf| {
                    let old = leaf.clone();
                    *leaf = match &old {
                        Value::Integer(n) => {
                            Value::Integer(if increment {
                                n.wrapping_add(1)
                            } else {
                                n.wrapping_sub(1)
                            })
                        }
                        Value::Real(r) => Value::Real(if increment { r + 1.0 } else { r - 1.0 }),
                        other => {
                            return Err(Exception::type_error(
                                &file,
                                line,
                                format!(
                                    "increment/decrement applied to {}",
                                    other.type_name()
                                ),
                            ));
                        }
                    };
                    Ok(old)
                })?;
                if *postfix {
                    frame.pop()?;
                    frame.stack.push(Reference::temporary(old));
                }
                Ok(AirStatus::Next)
            }
            AirNode::Unset { .. } => {
                let target = frame.pop()?;
                let removed = target.unset()?;
                frame.stack.push(Reference::temporary(removed));
                Ok(AirStatus::Next)
            }
            AirNode::ShortCircuit { op, rest } => {
                let lhs = frame.pop_value()?;
                let take_rest = match op {
                    ShortCircuitOp::And => lhs.is_truthy(),
                    ShortCircuitOp::Or => !lhs.is_truthy(),
                    ShortCircuitOp::Coalesce => lhs.is_null(),
                };
                if take_rest {
                    self.execute_queue(rest, frame)?;
                } else {
                    frame.stack.push(Reference::temporary(lhs));
                }
                Ok(AirStatus::Next)
            }
            AirNode::ShortCircuitAssign { op, rest, .. } => {
                let target = frame.top()?.clone();
                let current = target.read()?;
                let take_rest = match op {
                    ShortCircuitOp::And => current.is_truthy(),
                    ShortCircuitOp::Or => !current.is_truthy(),
                    ShortCircuitOp::Coalesce => current.is_null(),
                };
                if take_rest {
                    self.execute_queue(rest, frame)?;
                    let value = frame.pop_value()?;
                    target.write(value)?;
                }
                Ok(AirStatus::Next)
            }
            AirNode::Ternary {
                branch_true,
                branch_false,
            } => {
                let cond = frame.pop_value()?;
                if cond.is_truthy() {
                    self.execute_queue(branch_true, frame)?;
                } else {
                    self.execute_queue(branch_false, frame)?;
                }
                Ok(AirStatus::Next)
            }
            AirNode::Subscript { sloc } => {
                let index = frame.pop_value()?;
                let mut target = frame.pop()?;
                match index {
                    Value::Integer(i) => target.push_modifier(Modifier::ArrayIndex(i)),
                    Value::String(key) => target.push_modifier(Modifier::ObjectKey(key)),
                    other => {
                        return Err(Exception::type_error(
                            &frame.file,
                            sloc.line,
                            format!("subscript must be integer or string, not {}", other.type_name()),
                        ));
                    }
                }
                frame.stack.push(target);
                Ok(AirStatus::Next)
            }
            AirNode::Member { key, .. } => {
                let mut target = frame.pop()?;
                target.push_modifier(Modifier::ObjectKey(key.clone()));
                frame.stack.push(target);
                Ok(AirStatus::Next)
            }
            AirNode::FunctionCall { nargs, tail, sloc } => {
                let mut args = Vec::with_capacity(*nargs);
                for _ in 0..*nargs {
                    args.push(frame.pop_value()?);
                }
                args.reverse();
                let callee = frame.pop()?;
                // The receiver is the reference the callee was looked up
                // on, so methods can mutate it in place.
                let this_ref = match callee.split_last_modifier() {
                    Some((parent, _)) => parent,
                    None => Reference::temporary(Value::Null),
                };
                let target = match callee.read()? {
                    Value::Function(function) => function,
                    other => {
                        return Err(Exception::type_error(
                            &frame.file,
                            sloc.line,
                            format!("attempt to call a value of type {}", other.type_name()),
                        ));
                    }
                };
                if *tail && !frame.has_pending_defers() {
                    frame.stack.push(Reference::pending_tail_call(PtcDescriptor {
                        target,
                        this_ref,
                        args,
                        file: frame.file.to_string(),
                        line: sloc.line,
                    }));
                    return Ok(AirStatus::Next);
                }
                let result = self.invoke_function(target, this_ref, args)?;
                frame.stack.push(result);
                Ok(AirStatus::Next)
            }
            AirNode::ExecuteBlock { body } => self.execute_block(body, frame),
            AirNode::IfStatement {
                branch_true,
                branch_false,
            } => {
                let cond = frame.pop_value()?;
                if cond.is_truthy() {
                    self.execute_block(branch_true, frame)
                } else {
                    self.execute_block(branch_false, frame)
                }
            }
            AirNode::SwitchStatement { clauses, .. } => self.execute_switch(clauses, frame),
            AirNode::WhileStatement { cond, body } => {
                loop {
                    if !self.evaluate_condition(cond, frame)? {
                        break;
                    }
                    match self.execute_block(body, frame)? {
                        AirStatus::Next => {}
                        AirStatus::ContinueUnspec | AirStatus::ContinueWhile => continue,
                        AirStatus::BreakUnspec | AirStatus::BreakWhile => break,
                        status => return Ok(status),
                    }
                }
                Ok(AirStatus::Next)
            }
            AirNode::DoWhileStatement { body, cond } => {
                loop {
                    match self.execute_block(body, frame)? {
                        AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueWhile => {}
                        AirStatus::BreakUnspec | AirStatus::BreakWhile => break,
                        status => return Ok(status),
                    }
                    if !self.evaluate_condition(cond, frame)? {
                        break;
                    }
                }
                Ok(AirStatus::Next)
            }
            AirNode::ForStatement {
                init,
                cond,
                step,
                body,
            } => {
                let parent = frame.scope.clone();
                frame.scope = Scope::with_parent(parent.clone());
                let outcome = self.run_for(init, cond.as_deref(), step.as_deref(), body, frame);
                frame.scope = parent;
                outcome
            }
            AirNode::ForEachStatement {
                key,
                value,
                range,
                body,
                sloc,
            } => {
                let depth = frame.stack.len();
                self.execute_queue(range, frame)?;
                let range_value = frame.pop_value()?;
                frame.stack.truncate(depth);
                self.run_for_each(key.as_deref(), value, range_value, body, frame, sloc)
            }
            AirNode::BreakStatement(target) => Ok(match target {
                BreakTarget::Unspec => AirStatus::BreakUnspec,
                BreakTarget::Switch => AirStatus::BreakSwitch,
                BreakTarget::While => AirStatus::BreakWhile,
                BreakTarget::For => AirStatus::BreakFor,
            }),
            AirNode::ContinueStatement(target) => Ok(match target {
                ContinueTarget::Unspec => AirStatus::ContinueUnspec,
                ContinueTarget::While => AirStatus::ContinueWhile,
                ContinueTarget::For => AirStatus::ContinueFor,
            }),
            AirNode::ThrowStatement { sloc } => {
                let value = frame.pop_value()?;
                Err(Exception::new(frame.file.as_ref(), sloc.line, value))
            }
            AirNode::ReturnStatement { has_value } => {
                if *has_value {
                    let result = frame.pop()?;
                    frame.result = Some(result);
                    Ok(AirStatus::ReturnRef)
                } else {
                    frame.result = None;
                    Ok(AirStatus::ReturnVoid)
                }
            }
            AirNode::TryStatement {
                body,
                name,
                handler,
                sloc,
            } => match self.execute_block(body, frame) {
                Ok(status) => Ok(status),
                Err(mut exception) => {
                    exception.push_frame_catch(frame.file.as_ref(), sloc.line);
                    let parent = frame.scope.clone();
                    frame.scope = Scope::with_parent(parent.clone());
                    let variable = self.gc.create_variable(GcGeneration::Newest);
                    variable.initialize(exception.value().clone(), false);
                    frame
                        .scope
                        .borrow_mut()
                        .define(name.clone(), Reference::variable(variable));
                    let outcome = self.execute_block(handler, frame);
                    frame.scope = parent;
                    outcome
                }
            },
            AirNode::DeferStatement { body, sloc } => {
                match frame.defers.last_mut() {
                    Some(level) => level.push((*sloc, body.clone())),
                    None => {
                        return Err(Exception::from_native(
                            "defer statement outside of any block",
                        ));
                    }
                }
                Ok(AirStatus::Next)
            }
            AirNode::AssertStatement { message, sloc } => {
                let cond = frame.pop_value()?;
                if cond.is_truthy() {
                    Ok(AirStatus::Next)
                } else {
                    let text = message.clone().unwrap_or_else(|| "assertion failure".into());
                    Err(Exception::assertion(frame.file.as_ref(), sloc.line, text))
                }
            }
        }
    }

    /// Creates null-initialized bindings for every `func` declaration at
    /// the top level of a block, so functions defined later in the block
    /// (including mutually recursive pairs) are capturable from the start.
    fn hoist_functions(&self, body: &AvmcQueue, frame: &mut Frame) {
        for node in body.nodes() {
            if let AirNode::DefineFunction { name, .. } = node {
                let variable = self.gc.create_variable(GcGeneration::Newest);
                variable.initialize(Value::Null, false);
                frame
                    .scope
                    .borrow_mut()
                    .define(name.clone(), Reference::variable(variable));
            }
        }
    }

    fn evaluate_condition(&self, cond: &AvmcQueue, frame: &mut Frame) -> Result<bool, Exception> {
        let depth = frame.stack.len();
        self.execute_queue(cond, frame)?;
        let value = frame.pop_value()?;
        frame.stack.truncate(depth);
        Ok(value.is_truthy())
    }

    fn run_for(
        &self,
        init: &AvmcQueue,
        cond: Option<&AvmcQueue>,
        step: Option<&AvmcQueue>,
        body: &AvmcQueue,
        frame: &mut Frame,
    ) -> Result<AirStatus, Exception> {
        self.execute_queue(init, frame)?;
        loop {
            let proceed = match cond {
                Some(cond) => self.evaluate_condition(cond, frame)?,
                None => true,
            };
            if !proceed {
                break;
            }
            match self.execute_block(body, frame)? {
                AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueFor => {}
                AirStatus::BreakUnspec | AirStatus::BreakFor => break,
                status => return Ok(status),
            }
            if let Some(step) = step {
                let depth = frame.stack.len();
                self.execute_queue(step, frame)?;
                frame.stack.truncate(depth);
            }
        }
        Ok(AirStatus::Next)
    }

    fn run_for_each(
        &self,
        key: Option<&str>,
        value_name: &str,
        range: Value,
        body: &AvmcQueue,
        frame: &mut Frame,
        sloc: &SourceLocation,
    ) -> Result<AirStatus, Exception> {
        let pairs: Vec<(Value, Value)> = match range {
            Value::Array(elements) => elements
                .into_iter()
                .enumerate()
                .map(|(index, element)| (Value::Integer(index as i64), element))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
            other => {
                return Err(Exception::type_error(
                    &frame.file,
                    sloc.line,
                    format!("`for each` cannot iterate over {}", other.type_name()),
                ));
            }
        };
        for (key_value, element) in pairs {
            let parent = frame.scope.clone();
            frame.scope = Scope::with_parent(parent.clone());
            if let Some(key_name) = key {
                let variable = self.gc.create_variable(GcGeneration::Newest);
                variable.initialize(key_value, true);
                frame
                    .scope
                    .borrow_mut()
                    .define(key_name, Reference::variable(variable));
            }
            let variable = self.gc.create_variable(GcGeneration::Newest);
            variable.initialize(element, false);
            frame
                .scope
                .borrow_mut()
                .define(value_name, Reference::variable(variable));
            let status = self.execute_block(body, frame);
            frame.scope = parent;
            match status? {
                AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueFor => {}
                AirStatus::BreakUnspec | AirStatus::BreakFor => break,
                status => return Ok(status),
            }
        }
        Ok(AirStatus::Next)
    }

    fn execute_switch(
        &self,
        clauses: &[AirSwitchClause],
        frame: &mut Frame,
    ) -> Result<AirStatus, Exception> {
        let subject = frame.pop_value()?;
        let mut entry: Option<usize> = None;
        let mut default: Option<usize> = None;
        for (index, clause) in clauses.iter().enumerate() {
            match &clause.label {
                Some(label) => {
                    let depth = frame.stack.len();
                    self.execute_queue(label, frame)?;
                    let candidate = frame.pop_value()?;
                    frame.stack.truncate(depth);
                    if subject.compare(&candidate) == Compare::Equal {
                        entry = Some(index);
                        break;
                    }
                }
                None => {
                    if default.is_none() {
                        default = Some(index);
                    }
                }
            }
        }
        let Some(entry) = entry.or(default) else {
            return Ok(AirStatus::Next);
        };
        // Control enters at the matching clause and falls through until a
        // break transfers out.
        for clause in &clauses[entry..] {
            match self.execute_block(&clause.body, frame)? {
                AirStatus::Next => {}
                AirStatus::BreakUnspec | AirStatus::BreakSwitch => return Ok(AirStatus::Next),
                status => return Ok(status),
            }
        }
        Ok(AirStatus::Next)
    }

    fn instantiate_closure(&self, prototype: &Rc<FnPrototype>, scope: &ScopeRef) -> Rc<Closure> {
        let mut captured: IndexMap<String, Reference> = IndexMap::new();
        for name in &prototype.free_names {
            if let Some(reference) = Scope::lookup(scope, name) {
                captured.insert(name.clone(), reference);
            }
        }
        Rc::new(Closure::new(prototype.clone(), captured))
    }

    /// The call driver. Pending tail calls returned by the callee are
    /// unwound here, in this frame, so tail recursion runs at constant
    /// native stack depth.
    pub(crate) fn invoke_function(
        &self,
        target: FunctionValue,
        this_ref: Reference,
        args: Vec<Value>,
    ) -> Result<Reference, Exception> {
        let mut target = target;
        let mut this_ref = this_ref;
        let mut args = args;
        loop {
            match &target {
                FunctionValue::Native(native) => {
                    let native = native.clone();
                    return native.invoke(&args).map(Reference::temporary).map_err(
                        |mut exception| {
                            exception.push_frame_native(&native.name);
                            exception
                        },
                    );
                }
                FunctionValue::Air(closure) => {
                    let closure = closure.clone();
                    let mut result = self.invoke_closure(&closure, this_ref, args)?;
                    match result.take_pending_tail_call() {
                        Some(descriptor) => {
                            target = descriptor.target.clone();
                            this_ref = descriptor.this_ref.clone();
                            args = descriptor.args.clone();
                        }
                        None => return Ok(result),
                    }
                }
            }
        }
    }

    /// Executes one script function body: parameters and `this` bind in a
    /// fresh function scope whose parent is the closure's captured
    /// environment (not the caller), with unresolved names falling through
    /// to the global scope.
    fn invoke_closure(
        &self,
        closure: &Rc<Closure>,
        this_ref: Reference,
        args: Vec<Value>,
    ) -> Result<Reference, Exception> {
        let prototype = &closure.prototype;
        let capture_scope = Scope::from_bindings(
            Some(self.globals.clone()),
            closure.captured.borrow().clone(),
        );
        let scope = Scope::with_parent(capture_scope);
        {
            let mut args = args.into_iter();
            let mut scope = scope.borrow_mut();
            for param in &prototype.params {
                let value = args.next().unwrap_or(Value::Null);
                let variable = self.gc.create_variable(GcGeneration::Newest);
                variable.initialize(value, false);
                scope.define(param.clone(), Reference::variable(variable));
            }
            // Excess arguments were evaluated by the caller and dropped.
            scope.define("this", this_ref);
        }
        let mut frame = Frame::new(scope, prototype.file.clone());
        let status = match self.execute_block(&prototype.body, &mut frame) {
            Ok(status) => status,
            Err(mut exception) => {
                exception.push_frame_func(
                    prototype.file.as_ref(),
                    prototype.sloc.line,
                    &prototype.name,
                );
                return Err(exception);
            }
        };
        match status {
            AirStatus::ReturnRef => Ok(frame.result.take().unwrap_or_else(Reference::void)),
            AirStatus::ReturnVoid | AirStatus::Next => Ok(Reference::void()),
            _ => Err(Exception::from_native(
                "loop control flow escaped the function body",
            )),
        }
    }

    fn apply_unary(
        &self,
        op: UnaryOp,
        value: Value,
        file: &str,
        line: u32,
    ) -> Result<Value, Exception> {
        match op {
            UnaryOp::Pos => match value {
                Value::Integer(_) | Value::Real(_) => Ok(value),
                other => Err(Exception::type_error(
                    file,
                    line,
                    format!("unary `+` applied to {}", other.type_name()),
                )),
            },
            UnaryOp::Neg => match value {
                Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
                Value::Real(r) => Ok(Value::Real(-r)),
                other => Err(Exception::type_error(
                    file,
                    line,
                    format!("unary `-` applied to {}", other.type_name()),
                )),
            },
            UnaryOp::NotLogical => Ok(Value::Boolean(!value.is_truthy())),
            UnaryOp::NotBitwise => match value {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                Value::Integer(n) => Ok(Value::Integer(!n)),
                other => Err(Exception::type_error(
                    file,
                    line,
                    format!("unary `~` applied to {}", other.type_name()),
                )),
            },
            UnaryOp::Typeof => Ok(Value::String(value.type_name().to_string())),
            UnaryOp::Lengthof => match value {
                Value::Null => Ok(Value::Null),
                Value::String(s) => Ok(Value::Integer(s.len() as i64)),
                Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
                Value::Object(map) => Ok(Value::Integer(map.len() as i64)),
                other => Err(Exception::type_error(
                    file,
                    line,
                    format!("`lengthof` applied to {}", other.type_name()),
                )),
            },
        }
    }

    fn apply_binary(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        file: &str,
        line: u32,
    ) -> Result<Value, Exception> {
        use BinaryOp::*;
        let mismatch = |op: &str, lhs: &Value, rhs: &Value| {
            Exception::type_error(
                file,
                line,
                format!(
                    "`{}` cannot be applied to {} and {}",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                ),
            )
        };
        match op {
            Add => match (lhs, rhs) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_add(b))),
                (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(a as f64 + b)),
                (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a + b as f64)),
                (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a | b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (Value::Array(mut a), Value::Array(b)) => {
                    a.extend(b);
                    Ok(Value::Array(a))
                }
                (Value::Object(mut a), Value::Object(b)) => {
                    // Right-biased merge.
                    for (key, value) in b {
                        a.insert(key, value);
                    }
                    Ok(Value::Object(a))
                }
                (lhs, rhs) => Err(mismatch("+", &lhs, &rhs)),
            },
            Sub => match (lhs, rhs) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_sub(b))),
                (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(a as f64 - b)),
                (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a - b as f64)),
                (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a - b)),
                (lhs, rhs) => Err(mismatch("-", &lhs, &rhs)),
            },
            Mul => match (lhs, rhs) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_mul(b))),
                (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(a as f64 * b)),
                (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a * b as f64)),
                (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a * b)),
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a & b)),
                (Value::String(s), Value::Integer(n)) | (Value::Integer(n), Value::String(s)) => {
                    repeat_string(s, n, file, line)
                }
                (Value::Array(elements), Value::Integer(n))
                | (Value::Integer(n), Value::Array(elements)) => {
                    repeat_array(elements, n, file, line)
                }
                (lhs, rhs) => Err(mismatch("*", &lhs, &rhs)),
            },
            Div => match (lhs, rhs) {
                (Value::Integer(_), Value::Integer(0)) => {
                    Err(Exception::division_by_zero(file, line))
                }
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_div(b))),
                (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(a as f64 / b)),
                (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a / b as f64)),
                (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a / b)),
                (lhs, rhs) => Err(mismatch("/", &lhs, &rhs)),
            },
            Mod => match (lhs, rhs) {
                (Value::Integer(_), Value::Integer(0)) => {
                    Err(Exception::division_by_zero(file, line))
                }
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(b))),
                (Value::Integer(a), Value::Real(b)) => Ok(Value::Real((a as f64) % b)),
                (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a % b as f64)),
                (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a % b)),
                (lhs, rhs) => Err(mismatch("%", &lhs, &rhs)),
            },
            ShiftLeftLogical | ShiftRightLogical | ShiftLeftArith | ShiftRightArith => {
                let (Value::Integer(a), Value::Integer(b)) = (&lhs, &rhs) else {
                    return Err(mismatch("shift", &lhs, &rhs));
                };
                let (a, b) = (*a, *b);
                if b < 0 {
                    return Err(Exception::type_error(file, line, "negative shift count"));
                }
                match op {
                    ShiftLeftLogical => Ok(Value::Integer(if b >= 64 {
                        0
                    } else {
                        ((a as u64) << b) as i64
                    })),
                    ShiftRightLogical => Ok(Value::Integer(if b >= 64 {
                        0
                    } else {
                        ((a as u64) >> b) as i64
                    })),
                    ShiftLeftArith => {
                        // Checked: shifting out a bit unequal to the sign
                        // bit loses significance.
                        if b >= 64 {
                            if a == 0 {
                                Ok(Value::Integer(0))
                            } else {
                                Err(Exception::integer_overflow(
                                    file,
                                    line,
                                    "arithmetic left shift overflows",
                                ))
                            }
                        } else {
                            let result = a.wrapping_shl(b as u32);
                            if result.wrapping_shr(b as u32) == a {
                                Ok(Value::Integer(result))
                            } else {
                                Err(Exception::integer_overflow(
                                    file,
                                    line,
                                    "arithmetic left shift overflows",
                                ))
                            }
                        }
                    }
                    ShiftRightArith => Ok(Value::Integer(if b >= 64 { a >> 63 } else { a >> b })),
                    _ => unreachable!(),
                }
            }
            AndBitwise => match (lhs, rhs) {
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a & b)),
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a & b)),
                (lhs, rhs) => Err(mismatch("&", &lhs, &rhs)),
            },
            OrBitwise => match (lhs, rhs) {
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a | b)),
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a | b)),
                (lhs, rhs) => Err(mismatch("|", &lhs, &rhs)),
            },
            XorBitwise => match (lhs, rhs) {
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a ^ b)),
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a ^ b)),
                (lhs, rhs) => Err(mismatch("^", &lhs, &rhs)),
            },
            CmpEq => Ok(Value::Boolean(lhs.compare(&rhs) == Compare::Equal)),
            CmpNe => Ok(Value::Boolean(lhs.compare(&rhs) != Compare::Equal)),
            CmpLt | CmpLte | CmpGt | CmpGte => {
                let ordering = lhs.compare(&rhs);
                if ordering == Compare::Unordered {
                    return Err(Exception::type_error(
                        file,
                        line,
                        format!(
                            "{} and {} are not comparable",
                            lhs.type_name(),
                            rhs.type_name()
                        ),
                    ));
                }
                Ok(Value::Boolean(match op {
                    CmpLt => ordering == Compare::Less,
                    CmpLte => ordering != Compare::Greater,
                    CmpGt => ordering == Compare::Greater,
                    CmpGte => ordering != Compare::Less,
                    _ => unreachable!(),
                }))
            }
            Spaceship => Ok(match lhs.compare(&rhs) {
                Compare::Less => Value::Integer(-1),
                Compare::Equal => Value::Integer(0),
                Compare::Greater => Value::Integer(1),
                Compare::Unordered => Value::String("unordered".to_string()),
            }),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Break cycles so Variables cannot outlive the collector.
        self.gc.finalize();
    }
}

fn repeat_string(s: String, n: i64, file: &str, line: u32) -> Result<Value, Exception> {
    if n < 0 {
        return Err(Exception::type_error(file, line, "negative repetition count"));
    }
    Ok(Value::String(s.repeat(n as usize)))
}

fn repeat_array(elements: Vec<Value>, n: i64, file: &str, line: u32) -> Result<Value, Exception> {
    if n < 0 {
        return Err(Exception::type_error(file, line, "negative repetition count"));
    }
    let mut result = Vec::with_capacity(elements.len() * n as usize);
    for _ in 0..n {
        result.extend(elements.iter().cloned());
    }
    Ok(Value::Array(result))
}
