use std::{collections::HashSet, rc::Rc};

use indexmap::IndexSet;

use crate::{
    ast::{
        BinaryOp, BreakTarget, ContinueTarget, Expr, ExprKind, Literal, ShortCircuitOp, Stmt,
        StmtKind, UnaryOp,
    },
    avmc::AvmcQueue,
    diagnostics::SourceLocation,
    value::Value,
    variable::VarHandle,
};

/// The shared, immutable part of a script function: produced once at
/// lowering time and instantiated into closures at run time. `free_names`
/// lists the identifiers the body references but does not declare; closure
/// instantiation captures their references from the enclosing scope.
pub struct FnPrototype {
    pub name: String,
    pub file: Rc<str>,
    pub params: Vec<String>,
    pub body: Rc<AvmcQueue>,
    pub free_names: Vec<String>,
    pub sloc: SourceLocation,
}

#[derive(Clone)]
pub struct AirSwitchClause {
    /// `None` marks the `default` clause.
    pub label: Option<Rc<AvmcQueue>>,
    pub body: Rc<AvmcQueue>,
}

/// One lowered instruction. Expression nodes manipulate the frame's
/// reference stack; statement nodes carry their sub-queues inline.
#[derive(Clone)]
pub enum AirNode {
    /// Discards the temporaries of the finished statement.
    ClearStack,
    PushLiteral(Value),
    PushNamed {
        name: String,
        sloc: SourceLocation,
    },
    PushThis {
        sloc: SourceLocation,
    },
    /// Pops `count` element values and pushes the array.
    MakeArray {
        count: usize,
    },
    /// Pops one value per key (evaluated in source order) and pushes the
    /// object.
    MakeObject {
        keys: Vec<String>,
    },
    /// Instantiates a closure, capturing the prototype's free names from
    /// the current scope.
    MakeClosure {
        prototype: Rc<FnPrototype>,
    },
    /// Declares a variable in the current scope; the initializer, if any,
    /// is on the stack.
    DeclareVar {
        name: String,
        immutable: bool,
        has_init: bool,
    },
    /// `func` declarations bind their name before the closure is made, so
    /// the body can capture itself for recursion.
    DefineFunction {
        name: String,
        prototype: Rc<FnPrototype>,
    },
    UnaryOp {
        op: UnaryOp,
        sloc: SourceLocation,
    },
    BinaryOp {
        op: BinaryOp,
        sloc: SourceLocation,
    },
    /// Plain assignment through an arbitrary reference path.
    Assign {
        sloc: SourceLocation,
    },
    /// Plain assignment to a bare name; creates the binding in the
    /// innermost scope when the name does not resolve upward.
    AssignNamed {
        name: String,
        sloc: SourceLocation,
    },
    /// Compound assignment; the lvalue below the rhs value is opened
    /// exactly once.
    CompoundAssign {
        op: BinaryOp,
        sloc: SourceLocation,
    },
    IncDec {
        increment: bool,
        postfix: bool,
        sloc: SourceLocation,
    },
    Unset {
        sloc: SourceLocation,
    },
    /// Evaluates `rest` only when the left operand does not decide the
    /// result.
    ShortCircuit {
        op: ShortCircuitOp,
        rest: Rc<AvmcQueue>,
    },
    ShortCircuitAssign {
        op: ShortCircuitOp,
        rest: Rc<AvmcQueue>,
        sloc: SourceLocation,
    },
    Ternary {
        branch_true: Rc<AvmcQueue>,
        branch_false: Rc<AvmcQueue>,
    },
    /// Pops the index and appends the matching modifier to the reference
    /// below it.
    Subscript {
        sloc: SourceLocation,
    },
    Member {
        key: String,
        sloc: SourceLocation,
    },
    FunctionCall {
        nargs: usize,
        tail: bool,
        sloc: SourceLocation,
    },
    ExecuteBlock {
        body: Rc<AvmcQueue>,
    },
    IfStatement {
        branch_true: Rc<AvmcQueue>,
        branch_false: Rc<AvmcQueue>,
    },
    SwitchStatement {
        clauses: Vec<AirSwitchClause>,
        sloc: SourceLocation,
    },
    WhileStatement {
        cond: Rc<AvmcQueue>,
        body: Rc<AvmcQueue>,
    },
    DoWhileStatement {
        body: Rc<AvmcQueue>,
        cond: Rc<AvmcQueue>,
    },
    ForStatement {
        init: Rc<AvmcQueue>,
        cond: Option<Rc<AvmcQueue>>,
        step: Option<Rc<AvmcQueue>>,
        body: Rc<AvmcQueue>,
    },
    ForEachStatement {
        key: Option<String>,
        value: String,
        range: Rc<AvmcQueue>,
        body: Rc<AvmcQueue>,
        sloc: SourceLocation,
    },
    BreakStatement(BreakTarget),
    ContinueStatement(ContinueTarget),
    ThrowStatement {
        sloc: SourceLocation,
    },
    ReturnStatement {
        has_value: bool,
    },
    TryStatement {
        body: Rc<AvmcQueue>,
        name: String,
        handler: Rc<AvmcQueue>,
        sloc: SourceLocation,
    },
    /// Pushes the deferred queue onto the enclosing block's defer stack.
    DeferStatement {
        body: Rc<AvmcQueue>,
        sloc: SourceLocation,
    },
    AssertStatement {
        message: Option<String>,
        sloc: SourceLocation,
    },
}

impl AirNode {
    pub fn enumerate_variables(&self, seen: &mut HashSet<usize>, out: &mut Vec<VarHandle>) {
        match self {
            AirNode::PushLiteral(value) => value.enumerate_variables(seen, out),
            AirNode::MakeClosure { prototype } | AirNode::DefineFunction { prototype, .. } => {
                prototype.body.enumerate_variables(seen, out);
            }
            AirNode::ShortCircuit { rest, .. } | AirNode::ShortCircuitAssign { rest, .. } => {
                rest.enumerate_variables(seen, out);
            }
            AirNode::Ternary {
                branch_true,
                branch_false,
            } => {
                branch_true.enumerate_variables(seen, out);
                branch_false.enumerate_variables(seen, out);
            }
            AirNode::ExecuteBlock { body } | AirNode::DeferStatement { body, .. } => {
                body.enumerate_variables(seen, out);
            }
            AirNode::IfStatement {
                branch_true,
                branch_false,
            } => {
                branch_true.enumerate_variables(seen, out);
                branch_false.enumerate_variables(seen, out);
            }
            AirNode::SwitchStatement { clauses, .. } => {
                for clause in clauses {
                    if let Some(label) = &clause.label {
                        label.enumerate_variables(seen, out);
                    }
                    clause.body.enumerate_variables(seen, out);
                }
            }
            AirNode::WhileStatement { cond, body } => {
                cond.enumerate_variables(seen, out);
                body.enumerate_variables(seen, out);
            }
            AirNode::DoWhileStatement { body, cond } => {
                body.enumerate_variables(seen, out);
                cond.enumerate_variables(seen, out);
            }
            AirNode::ForStatement {
                init,
                cond,
                step,
                body,
            } => {
                init.enumerate_variables(seen, out);
                if let Some(cond) = cond {
                    cond.enumerate_variables(seen, out);
                }
                if let Some(step) = step {
                    step.enumerate_variables(seen, out);
                }
                body.enumerate_variables(seen, out);
            }
            AirNode::ForEachStatement { range, body, .. } => {
                range.enumerate_variables(seen, out);
                body.enumerate_variables(seen, out);
            }
            AirNode::TryStatement { body, handler, .. } => {
                body.enumerate_variables(seen, out);
                handler.enumerate_variables(seen, out);
            }
            _ => {}
        }
    }
}

/// Lowers a whole program body into its executable queue.
pub fn lower_program(statements: &[Stmt], file: &Rc<str>) -> Rc<AvmcQueue> {
    Rc::new(lower_block(statements, file))
}

fn lower_block(statements: &[Stmt], file: &Rc<str>) -> AvmcQueue {
    let mut queue = AvmcQueue::new();
    for statement in statements {
        lower_stmt(statement, &mut queue, file);
    }
    queue
}

fn lower_stmt(statement: &Stmt, out: &mut AvmcQueue, file: &Rc<str>) {
    out.push(AirNode::ClearStack);
    match &statement.kind {
        StmtKind::Vars { immutable, decls } => {
            for (name, initializer) in decls {
                match initializer {
                    Some(expr) => {
                        lower_expr(expr, out, false, file);
                        out.push(AirNode::DeclareVar {
                            name: name.clone(),
                            immutable: *immutable,
                            has_init: true,
                        });
                    }
                    None => out.push(AirNode::DeclareVar {
                        name: name.clone(),
                        immutable: *immutable,
                        has_init: false,
                    }),
                }
            }
        }
        StmtKind::Func { name, params, body } => {
            let prototype = make_prototype(name, params, body, statement.sloc, file);
            out.push(AirNode::DefineFunction {
                name: name.clone(),
                prototype,
            });
        }
        StmtKind::Block(statements) => {
            out.push(AirNode::ExecuteBlock {
                body: Rc::new(lower_block(statements, file)),
            });
        }
        StmtKind::If {
            cond,
            branch_true,
            branch_false,
        } => {
            lower_expr(cond, out, false, file);
            out.push(AirNode::IfStatement {
                branch_true: Rc::new(lower_block(branch_true, file)),
                branch_false: Rc::new(
                    branch_false
                        .as_deref()
                        .map(|stmts| lower_block(stmts, file))
                        .unwrap_or_default(),
                ),
            });
        }
        StmtKind::Switch { subject, clauses } => {
            lower_expr(subject, out, false, file);
            let clauses = clauses
                .iter()
                .map(|clause| AirSwitchClause {
                    label: clause.label.as_ref().map(|label| {
                        let mut queue = AvmcQueue::new();
                        lower_expr(label, &mut queue, false, file);
                        Rc::new(queue)
                    }),
                    body: Rc::new(lower_block(&clause.body, file)),
                })
                .collect();
            out.push(AirNode::SwitchStatement {
                clauses,
                sloc: statement.sloc,
            });
        }
        StmtKind::While { cond, body } => {
            let mut cond_queue = AvmcQueue::new();
            lower_expr(cond, &mut cond_queue, false, file);
            out.push(AirNode::WhileStatement {
                cond: Rc::new(cond_queue),
                body: Rc::new(lower_block(body, file)),
            });
        }
        StmtKind::DoWhile { body, cond } => {
            let mut cond_queue = AvmcQueue::new();
            lower_expr(cond, &mut cond_queue, false, file);
            out.push(AirNode::DoWhileStatement {
                body: Rc::new(lower_block(body, file)),
                cond: Rc::new(cond_queue),
            });
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            let init_queue = match init {
                Some(statement) => {
                    let mut queue = AvmcQueue::new();
                    lower_stmt(statement, &mut queue, file);
                    queue
                }
                None => AvmcQueue::new(),
            };
            let cond_queue = cond.as_ref().map(|expr| {
                let mut queue = AvmcQueue::new();
                lower_expr(expr, &mut queue, false, file);
                Rc::new(queue)
            });
            let step_queue = step.as_ref().map(|expr| {
                let mut queue = AvmcQueue::new();
                lower_expr(expr, &mut queue, false, file);
                Rc::new(queue)
            });
            out.push(AirNode::ForStatement {
                init: Rc::new(init_queue),
                cond: cond_queue,
                step: step_queue,
                body: Rc::new(lower_block(body, file)),
            });
        }
        StmtKind::ForEach {
            key,
            value,
            range,
            body,
        } => {
            let mut range_queue = AvmcQueue::new();
            lower_expr(range, &mut range_queue, false, file);
            out.push(AirNode::ForEachStatement {
                key: key.clone(),
                value: value.clone(),
                range: Rc::new(range_queue),
                body: Rc::new(lower_block(body, file)),
                sloc: statement.sloc,
            });
        }
        StmtKind::Break(target) => out.push(AirNode::BreakStatement(*target)),
        StmtKind::Continue(target) => out.push(AirNode::ContinueStatement(*target)),
        StmtKind::Throw(expr) => {
            lower_expr(expr, out, false, file);
            out.push(AirNode::ThrowStatement {
                sloc: statement.sloc,
            });
        }
        StmtKind::Return(value) => match value {
            Some(expr) => {
                lower_expr(expr, out, true, file);
                out.push(AirNode::ReturnStatement { has_value: true });
            }
            None => out.push(AirNode::ReturnStatement { has_value: false }),
        },
        StmtKind::TryCatch {
            body,
            name,
            handler,
        } => {
            out.push(AirNode::TryStatement {
                body: Rc::new(lower_block(body, file)),
                name: name.clone(),
                handler: Rc::new(lower_block(handler, file)),
                sloc: statement.sloc,
            });
        }
        StmtKind::Defer(body) => {
            let mut queue = AvmcQueue::new();
            lower_stmt(body, &mut queue, file);
            out.push(AirNode::DeferStatement {
                body: Rc::new(queue),
                sloc: statement.sloc,
            });
        }
        StmtKind::Assert { cond, message } => {
            lower_expr(cond, out, false, file);
            out.push(AirNode::AssertStatement {
                message: message.clone(),
                sloc: statement.sloc,
            });
        }
        StmtKind::Expr(expr) => {
            lower_expr(expr, out, false, file);
        }
    }
}

/// Lowers one expression. `tail` is set when the expression's value
/// becomes the function's return value directly; a call in that position
/// is allowed to produce a pending tail call instead of recursing.
fn lower_expr(expr: &Expr, out: &mut AvmcQueue, tail: bool, file: &Rc<str>) {
    match &expr.kind {
        ExprKind::Literal(literal) => {
            out.push(AirNode::PushLiteral(lower_literal(literal)));
        }
        ExprKind::Named(name) => out.push(AirNode::PushNamed {
            name: name.clone(),
            sloc: expr.sloc,
        }),
        ExprKind::This => out.push(AirNode::PushThis { sloc: expr.sloc }),
        ExprKind::Unary { op, expr: operand } => {
            lower_expr(operand, out, false, file);
            out.push(AirNode::UnaryOp {
                op: *op,
                sloc: expr.sloc,
            });
        }
        ExprKind::Binary { op, lhs, rhs } => {
            lower_expr(lhs, out, false, file);
            lower_expr(rhs, out, false, file);
            out.push(AirNode::BinaryOp {
                op: *op,
                sloc: expr.sloc,
            });
        }
        ExprKind::ShortCircuit { op, lhs, rhs } => {
            lower_expr(lhs, out, false, file);
            let mut rest = AvmcQueue::new();
            lower_expr(rhs, &mut rest, false, file);
            out.push(AirNode::ShortCircuit {
                op: *op,
                rest: Rc::new(rest),
            });
        }
        ExprKind::Ternary {
            cond,
            branch_true,
            branch_false,
        } => {
            lower_expr(cond, out, false, file);
            let mut true_queue = AvmcQueue::new();
            lower_expr(branch_true, &mut true_queue, tail, file);
            let mut false_queue = AvmcQueue::new();
            lower_expr(branch_false, &mut false_queue, tail, file);
            out.push(AirNode::Ternary {
                branch_true: Rc::new(true_queue),
                branch_false: Rc::new(false_queue),
            });
        }
        ExprKind::Assign { target, value } => {
            if let ExprKind::Named(name) = &target.kind {
                lower_expr(value, out, false, file);
                out.push(AirNode::AssignNamed {
                    name: name.clone(),
                    sloc: expr.sloc,
                });
            } else {
                lower_expr(target, out, false, file);
                lower_expr(value, out, false, file);
                out.push(AirNode::Assign { sloc: expr.sloc });
            }
        }
        ExprKind::CompoundAssign { op, target, value } => {
            lower_expr(target, out, false, file);
            lower_expr(value, out, false, file);
            out.push(AirNode::CompoundAssign {
                op: *op,
                sloc: expr.sloc,
            });
        }
        ExprKind::ShortCircuitAssign { op, target, value } => {
            lower_expr(target, out, false, file);
            let mut rest = AvmcQueue::new();
            lower_expr(value, &mut rest, false, file);
            out.push(AirNode::ShortCircuitAssign {
                op: *op,
                rest: Rc::new(rest),
                sloc: expr.sloc,
            });
        }
        ExprKind::PrefixIncDec { increment, target } => {
            lower_expr(target, out, false, file);
            out.push(AirNode::IncDec {
                increment: *increment,
                postfix: false,
                sloc: expr.sloc,
            });
        }
        ExprKind::PostfixIncDec { increment, target } => {
            lower_expr(target, out, false, file);
            out.push(AirNode::IncDec {
                increment: *increment,
                postfix: true,
                sloc: expr.sloc,
            });
        }
        ExprKind::Unset(target) => {
            lower_expr(target, out, false, file);
            out.push(AirNode::Unset { sloc: expr.sloc });
        }
        ExprKind::Call { callee, args } => {
            lower_expr(callee, out, false, file);
            for arg in args {
                lower_expr(arg, out, false, file);
            }
            out.push(AirNode::FunctionCall {
                nargs: args.len(),
                tail,
                sloc: expr.sloc,
            });
        }
        ExprKind::Subscript { target, index } => {
            lower_expr(target, out, false, file);
            lower_expr(index, out, false, file);
            out.push(AirNode::Subscript { sloc: expr.sloc });
        }
        ExprKind::Member { target, key } => {
            lower_expr(target, out, false, file);
            out.push(AirNode::Member {
                key: key.clone(),
                sloc: expr.sloc,
            });
        }
        ExprKind::ArrayLiteral(elements) => {
            for element in elements {
                lower_expr(element, out, false, file);
            }
            out.push(AirNode::MakeArray {
                count: elements.len(),
            });
        }
        ExprKind::ObjectLiteral(entries) => {
            for (_, value) in entries {
                lower_expr(value, out, false, file);
            }
            out.push(AirNode::MakeObject {
                keys: entries.iter().map(|(key, _)| key.clone()).collect(),
            });
        }
        ExprKind::Closure { params, body } => {
            let prototype = make_prototype("<closure>", params, body, expr.sloc, file);
            out.push(AirNode::MakeClosure { prototype });
        }
    }
}

fn lower_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Integer(n) => Value::Integer(*n),
        Literal::Real(r) => Value::Real(*r),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn make_prototype(
    name: &str,
    params: &[String],
    body: &[Stmt],
    sloc: SourceLocation,
    file: &Rc<str>,
) -> Rc<FnPrototype> {
    let signature = format!("{}({})", name, params.join(", "));
    Rc::new(FnPrototype {
        name: signature,
        file: file.clone(),
        params: params.to_vec(),
        body: Rc::new(lower_block(body, file)),
        free_names: collect_free_names(params, body),
        sloc,
    })
}

/// Computes the identifiers a function body references but does not
/// declare anywhere inside it. Declarations are treated with function
/// scope granularity, which over-captures a name declared in a later
/// block but never captures a local.
fn collect_free_names(params: &[String], body: &[Stmt]) -> Vec<String> {
    let mut declared: HashSet<String> = params.iter().cloned().collect();
    collect_declared(body, &mut declared);
    let mut used: IndexSet<String> = IndexSet::new();
    collect_used_stmts(body, &mut used);
    used.into_iter()
        .filter(|name| !declared.contains(name))
        .collect()
}

fn collect_declared(statements: &[Stmt], declared: &mut HashSet<String>) {
    for statement in statements {
        match &statement.kind {
            StmtKind::Vars { decls, .. } => {
                for (name, _) in decls {
                    declared.insert(name.clone());
                }
            }
            StmtKind::Func { name, .. } => {
                declared.insert(name.clone());
            }
            StmtKind::Block(body) => collect_declared(body, declared),
            StmtKind::If {
                branch_true,
                branch_false,
                ..
            } => {
                collect_declared(branch_true, declared);
                if let Some(branch) = branch_false {
                    collect_declared(branch, declared);
                }
            }
            StmtKind::Switch { clauses, .. } => {
                for clause in clauses {
                    collect_declared(&clause.body, declared);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                collect_declared(body, declared);
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_declared(std::slice::from_ref(init), declared);
                }
                collect_declared(body, declared);
            }
            StmtKind::ForEach {
                key, value, body, ..
            } => {
                if let Some(key) = key {
                    declared.insert(key.clone());
                }
                declared.insert(value.clone());
                collect_declared(body, declared);
            }
            StmtKind::TryCatch {
                body,
                name,
                handler,
            } => {
                collect_declared(body, declared);
                declared.insert(name.clone());
                collect_declared(handler, declared);
            }
            StmtKind::Defer(body) => {
                collect_declared(std::slice::from_ref(body), declared);
            }
            _ => {}
        }
    }
}

fn collect_used_stmts(statements: &[Stmt], used: &mut IndexSet<String>) {
    for statement in statements {
        match &statement.kind {
            StmtKind::Vars { decls, .. } => {
                for (_, initializer) in decls {
                    if let Some(expr) = initializer {
                        collect_used_expr(expr, used);
                    }
                }
            }
            StmtKind::Func { params, body, .. } => {
                used.extend(collect_free_names(params, body));
            }
            StmtKind::Block(body) => collect_used_stmts(body, used),
            StmtKind::If {
                cond,
                branch_true,
                branch_false,
            } => {
                collect_used_expr(cond, used);
                collect_used_stmts(branch_true, used);
                if let Some(branch) = branch_false {
                    collect_used_stmts(branch, used);
                }
            }
            StmtKind::Switch { subject, clauses } => {
                collect_used_expr(subject, used);
                for clause in clauses {
                    if let Some(label) = &clause.label {
                        collect_used_expr(label, used);
                    }
                    collect_used_stmts(&clause.body, used);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                collect_used_expr(cond, used);
                collect_used_stmts(body, used);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    collect_used_stmts(std::slice::from_ref(init), used);
                }
                if let Some(cond) = cond {
                    collect_used_expr(cond, used);
                }
                if let Some(step) = step {
                    collect_used_expr(step, used);
                }
                collect_used_stmts(body, used);
            }
            StmtKind::ForEach { range, body, .. } => {
                collect_used_expr(range, used);
                collect_used_stmts(body, used);
            }
            StmtKind::Throw(expr) | StmtKind::Expr(expr) => {
                collect_used_expr(expr, used);
            }
            StmtKind::Defer(body) => {
                collect_used_stmts(std::slice::from_ref(body), used);
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    collect_used_expr(expr, used);
                }
            }
            StmtKind::TryCatch { body, handler, .. } => {
                collect_used_stmts(body, used);
                collect_used_stmts(handler, used);
            }
            StmtKind::Assert { cond, .. } => collect_used_expr(cond, used),
            StmtKind::Break(_) | StmtKind::Continue(_) => {}
        }
    }
}

fn collect_used_expr(expr: &Expr, used: &mut IndexSet<String>) {
    match &expr.kind {
        ExprKind::Named(name) => {
            used.insert(name.clone());
        }
        ExprKind::Closure { params, body } => {
            used.extend(collect_free_names(params, body));
        }
        ExprKind::Unary { expr, .. } | ExprKind::Unset(expr) => collect_used_expr(expr, used),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::ShortCircuit { lhs, rhs, .. } => {
            collect_used_expr(lhs, used);
            collect_used_expr(rhs, used);
        }
        ExprKind::Ternary {
            cond,
            branch_true,
            branch_false,
        } => {
            collect_used_expr(cond, used);
            collect_used_expr(branch_true, used);
            collect_used_expr(branch_false, used);
        }
        ExprKind::Assign { target, value }
        | ExprKind::CompoundAssign { target, value, .. }
        | ExprKind::ShortCircuitAssign { target, value, .. } => {
            collect_used_expr(target, used);
            collect_used_expr(value, used);
        }
        ExprKind::PrefixIncDec { target, .. } | ExprKind::PostfixIncDec { target, .. } => {
            collect_used_expr(target, used);
        }
        ExprKind::Call { callee, args } => {
            collect_used_expr(callee, used);
            for arg in args {
                collect_used_expr(arg, used);
            }
        }
        ExprKind::Subscript { target, index } => {
            collect_used_expr(target, used);
            collect_used_expr(index, used);
        }
        ExprKind::Member { target, .. } => collect_used_expr(target, used),
        ExprKind::ArrayLiteral(elements) => {
            for element in elements {
                collect_used_expr(element, used);
            }
        }
        ExprKind::ObjectLiteral(entries) => {
            for (_, value) in entries {
                collect_used_expr(value, used);
            }
        }
        ExprKind::Literal(_) | ExprKind::This => {}
    }
}
