//! The compile layer: AST → thunks.
//!
//! Each AST node is translated once into an `Rc` closure; running a loop
//! body re-executes pre-built closures rather than walking the AST again.
//! Compile-time work includes pre-building sub-thunks, extracting operator
//! tags, decomposing assignment targets into lvalues, collecting hoisted
//! `var`/function declarations per function body, threading labels to the
//! loops they name, and rejecting misplaced `break`/`continue`/`return`.
//!
//! Thunks return [`ExecResult`]: expression thunks yield a [`Value`],
//! statement thunks an `Option<Value>` (`None` is the empty completion),
//! and every non-local transfer travels in the `Err` arm.

use std::{mem, rc::Rc};

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    ast::{
        AssignOp, Block, Expr, ExprNode, ForTarget, Ident, LitValue, LogicalOp, Program, PropertyKind, Stmt, StmtNode,
        SwitchCase, UnaryOp, UpdateOp, VariableDeclaration, VariableDeclarator,
    },
    flow::{ExecResult, Flow},
    function::{JsFunction, make_function_value},
    machine::Machine,
    scope::Scope,
    value::{self, Property, Value, to_js_string},
};

/// A compiled expression.
pub(crate) type ExprThunk = Rc<dyn Fn(&mut Machine) -> ExecResult<Value>>;
/// A compiled statement. `Ok(None)` is the empty completion.
pub(crate) type StmtThunk = Rc<dyn Fn(&mut Machine) -> ExecResult<Option<Value>>>;
/// Builds a function value in the machine's current scope; used both for
/// function expressions and for hoisted function declarations.
pub(crate) type FuncTemplate = Rc<dyn Fn(&mut Machine) -> Value>;

/// Declarations hoisted to the top of one function body (or the program).
///
/// Installed into the activation frame on every call: `var` names bind to
/// `undefined` unless already bound, function declarations overwrite only
/// `undefined` slots.
#[derive(Default)]
pub(crate) struct HoistSet {
    vars: Vec<Rc<str>>,
    funcs: Vec<(Rc<str>, FuncTemplate)>,
    seen_vars: AHashSet<Rc<str>>,
}

impl HoistSet {
    /// Adds a hoisted `var` name; repeated declarations of the same name
    /// collapse into one slot.
    fn add_var(&mut self, name: &Rc<str>) {
        if self.seen_vars.insert(Rc::clone(name)) {
            self.vars.push(Rc::clone(name));
        }
    }
}

/// Installs a hoist set into the machine's current scope frame.
pub(crate) fn install_hoist(machine: &mut Machine, hoist: &HoistSet) {
    for name in &hoist.vars {
        machine.scope.declare_if_absent(name);
    }
    for (name, template) in &hoist.funcs {
        let function = template(machine);
        machine.scope.declare_function(name, function);
    }
}

/// A compilation failure, positioned by byte offset into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompileError {
    pub message: String,
    pub offset: usize,
}

impl CompileError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

type Compiled<T> = Result<T, CompileError>;

/// Compiles a program into its top-level thunk.
///
/// The thunk installs the program's hoisted declarations into the current
/// (root) scope, then runs the statements, recording each non-empty
/// statement value through the machine's last-value slot.
pub(crate) fn compile_program(program: &Program, source: &str) -> Compiled<StmtThunk> {
    let mut compiler = Compiler::new(source);
    let stmts = compiler.compile_stmts(&program.body)?;
    let hoist = Rc::new(mem::take(&mut compiler.hoist));
    Ok(Rc::new(move |m| {
        install_hoist(m, &hoist);
        run_sequence(m, &stmts)
    }))
}

/// Runs a statement list, recording non-empty values and propagating any
/// signal unchanged. Shared by program, block and function bodies.
fn run_sequence(machine: &mut Machine, stmts: &[StmtThunk]) -> ExecResult<Option<Value>> {
    let mut last = None;
    for stmt in stmts {
        if let Some(value) = stmt(machine)? {
            machine.record(&value);
            last = Some(value);
        }
    }
    Ok(last)
}

/// An assignment target decomposed at compile time.
enum Lvalue {
    Ident(Rc<str>),
    Member { object: ExprThunk, key: PropKey },
}

enum PropKey {
    Static(Rc<str>),
    Computed(ExprThunk),
}

/// An lvalue with its receiver and key evaluated, so a compound
/// assignment or update reads and writes the same (owner, key) pair.
enum Place {
    Ident(Rc<str>),
    Member { object: Value, key: Rc<str> },
}

impl Lvalue {
    fn resolve(&self, machine: &mut Machine) -> ExecResult<Place> {
        match self {
            Self::Ident(name) => Ok(Place::Ident(Rc::clone(name))),
            Self::Member { object, key } => {
                let object = object(machine)?;
                let key = match key {
                    PropKey::Static(name) => Rc::clone(name),
                    PropKey::Computed(thunk) => Rc::from(to_js_string(&thunk(machine)?)),
                };
                Ok(Place::Member { object, key })
            }
        }
    }
}

impl Place {
    fn read(&self, machine: &mut Machine) -> ExecResult<Value> {
        match self {
            Self::Ident(name) => Ok(machine.scope.lookup(name).unwrap_or(Value::Undefined)),
            Self::Member { object, key } => machine.get_property(object, key),
        }
    }

    fn write(&self, machine: &mut Machine, value: Value) -> ExecResult<()> {
        match self {
            Self::Ident(name) => {
                machine.scope.assign(name, value);
                Ok(())
            }
            Self::Member { object, key } => machine.set_property(object, key, value),
        }
    }

    fn delete(&self, machine: &mut Machine) -> ExecResult<Value> {
        match self {
            Self::Ident(name) => Ok(Value::Bool(machine.scope.delete(name))),
            Self::Member { object, key } => machine.delete_property(object, key),
        }
    }
}

struct Compiler {
    source: Rc<str>,
    /// Hoist accumulator for the function body being compiled.
    hoist: HoistSet,
    /// Labels in scope, for `break label` legality.
    labels: Vec<Rc<str>>,
    /// Labels attached directly to loops, for `continue label` legality.
    loop_labels: Vec<Rc<str>>,
    /// Nesting depth of constructs `break` can target (loops, switch).
    breakable: u32,
    /// Nesting depth of loops, for `continue` legality.
    loops: u32,
    /// Nesting depth of function bodies, for `return` legality.
    functions: u32,
}

impl Compiler {
    fn new(source: &str) -> Self {
        Self {
            source: Rc::from(source),
            hoist: HoistSet::default(),
            labels: Vec::new(),
            loop_labels: Vec::new(),
            breakable: 0,
            loops: 0,
            functions: 0,
        }
    }

    fn compile_stmts(&mut self, stmts: &[StmtNode]) -> Compiled<Vec<StmtThunk>> {
        stmts.iter().map(|stmt| self.compile_stmt(stmt)).collect()
    }

    fn compile_stmt(&mut self, node: &StmtNode) -> Compiled<StmtThunk> {
        self.compile_stmt_labeled(node, None)
    }

    /// Compiles a statement. `label` is the name of the directly enclosing
    /// labeled statement, which loops capture so they can swallow their
    /// own `continue label` signals.
    fn compile_stmt_labeled(&mut self, node: &StmtNode, label: Option<Rc<str>>) -> Compiled<StmtThunk> {
        match &node.stmt {
            Stmt::Expression { expression } => {
                let expr = self.compile_expr(expression)?;
                Ok(Rc::new(move |m| expr(m).map(Some)))
            }
            Stmt::Empty | Stmt::Debugger => Ok(Rc::new(|_| Ok(None))),
            Stmt::Block { body } => {
                let stmts = self.compile_stmts(body)?;
                Ok(Rc::new(move |m| run_sequence(m, &stmts)))
            }
            Stmt::Variable { declarations, .. } => self.compile_var_declaration(declarations),
            Stmt::FunctionDecl { id, params, body } => {
                let Some(id) = id else {
                    return Err(CompileError::new("function declaration requires a name", node.start));
                };
                let name: Rc<str> = Rc::from(id.name.as_str());
                let template = self.compile_function(params, body, node.start, node.end, Rc::clone(&name), false)?;
                self.hoist.funcs.push((name, template));
                // Installed at frame entry; the statement itself is a no-op.
                Ok(Rc::new(|_| Ok(None)))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                let test = self.compile_expr(test)?;
                let consequent = self.compile_stmt(consequent)?;
                let alternate = alternate.as_ref().map(|alt| self.compile_stmt(alt)).transpose()?;
                Ok(Rc::new(move |m| {
                    if test(m)?.truthy() {
                        consequent(m)
                    } else if let Some(alternate) = &alternate {
                        alternate(m)
                    } else {
                        Ok(None)
                    }
                }))
            }
            Stmt::While { test, body } => {
                let test = Some(self.compile_expr(test)?);
                let body = self.compile_loop_body(body)?;
                Ok(make_loop(None, test, None, body, label, true))
            }
            Stmt::DoWhile { body, test } => {
                let test = Some(self.compile_expr(test)?);
                let body = self.compile_loop_body(body)?;
                Ok(make_loop(None, test, None, body, label, false))
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let init = init.as_ref().map(|init| self.compile_for_init(init)).transpose()?;
                let test = test.as_ref().map(|test| self.compile_expr(test)).transpose()?;
                let update = update.as_ref().map(|update| self.compile_expr(update)).transpose()?;
                let body = self.compile_loop_body(body)?;
                Ok(make_loop(init, test, update, body, label, true))
            }
            Stmt::ForIn { left, right, body } => self.compile_for_in(left, right, body, label),
            Stmt::Break { label: target } => {
                let signal = match target {
                    Some(ident) => {
                        let name: Rc<str> = Rc::from(ident.name.as_str());
                        if !self.labels.contains(&name) {
                            return Err(CompileError::new(format!("undefined label '{name}'"), node.start));
                        }
                        Flow::BreakLabel(name)
                    }
                    None => {
                        if self.breakable == 0 {
                            return Err(CompileError::new("illegal break statement", node.start));
                        }
                        Flow::Break
                    }
                };
                Ok(Rc::new(move |_| Err(signal.clone())))
            }
            Stmt::Continue { label: target } => {
                let signal = match target {
                    Some(ident) => {
                        let name: Rc<str> = Rc::from(ident.name.as_str());
                        if !self.loop_labels.contains(&name) {
                            return Err(CompileError::new(format!("undefined label '{name}'"), node.start));
                        }
                        Flow::ContinueLabel(name)
                    }
                    None => {
                        if self.loops == 0 {
                            return Err(CompileError::new("illegal continue statement", node.start));
                        }
                        Flow::Continue
                    }
                };
                Ok(Rc::new(move |_| Err(signal.clone())))
            }
            Stmt::Return { argument } => {
                if self.functions == 0 {
                    return Err(CompileError::new("return outside of function", node.start));
                }
                let argument = argument.as_ref().map(|arg| self.compile_expr(arg)).transpose()?;
                Ok(Rc::new(move |m| {
                    let value = match &argument {
                        Some(arg) => arg(m)?,
                        None => Value::Undefined,
                    };
                    Err(Flow::Return(value))
                }))
            }
            Stmt::Throw { argument } => {
                let argument = self.compile_expr(argument)?;
                Ok(Rc::new(move |m| {
                    let value = argument(m)?;
                    m.tracer.on_throw(&to_js_string(&value));
                    Err(Flow::Throw(value))
                }))
            }
            Stmt::With { object, body } => {
                let object = self.compile_expr(object)?;
                let body = self.compile_stmt(body)?;
                Ok(Rc::new(move |m| {
                    let target = object(m)?;
                    if target.as_object().is_none() {
                        return Err(Flow::type_error("with requires an object".to_owned()));
                    }
                    // Shallow overlay: enumerable properties are copied
                    // into a fresh child scope at entry.
                    let overlay = Scope::child(&m.scope, "with");
                    for key in m.enumerate(&target) {
                        let value = m.get_property(&target, &key)?;
                        overlay.declare(key, value);
                    }
                    let saved = mem::replace(&mut m.scope, overlay);
                    let result = body(m);
                    m.scope = saved;
                    result
                }))
            }
            Stmt::Labeled { label: name, body } => self.compile_labeled(name, body, node.start),
            Stmt::Switch { discriminant, cases } => self.compile_switch(discriminant, cases, node.start),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => self.compile_try(block, handler.as_ref(), finalizer.as_ref()),
        }
    }

    /// Compiles a loop body, tracking `break`/`continue` legality.
    fn compile_loop_body(&mut self, body: &StmtNode) -> Compiled<StmtThunk> {
        self.breakable += 1;
        self.loops += 1;
        let thunk = self.compile_stmt(body);
        self.loops -= 1;
        self.breakable -= 1;
        thunk
    }

    fn compile_for_init(&mut self, init: &ForTarget) -> Compiled<StmtThunk> {
        match init {
            ForTarget::Declaration(decl) => self.compile_var_declaration(&decl.declarations),
            ForTarget::Expression(expr) => {
                let expr = self.compile_expr(expr)?;
                Ok(Rc::new(move |m| expr(m).map(Some)))
            }
        }
    }

    /// Hoists each declared name and queues a synthetic assignment for
    /// each initializer. A declaration without initializers is a no-op at
    /// run time.
    fn compile_var_declaration(&mut self, declarations: &[VariableDeclarator]) -> Compiled<StmtThunk> {
        let mut assigns: Vec<(Rc<str>, ExprThunk)> = Vec::new();
        for declarator in declarations {
            let name = self.declarator_name(declarator)?;
            if let Some(init) = &declarator.init {
                let init = self.compile_expr_named(init, Some(Rc::clone(&name)))?;
                assigns.push((name, init));
            }
        }
        Ok(Rc::new(move |m| {
            for (name, init) in &assigns {
                let value = init(m)?;
                m.scope.assign(name, value);
            }
            Ok(None)
        }))
    }

    /// Validates a declarator id and hoists it.
    fn declarator_name(&mut self, declarator: &VariableDeclarator) -> Compiled<Rc<str>> {
        let Expr::Identifier { name } = &declarator.id.expr else {
            return Err(CompileError::new(
                "unsupported declarator pattern",
                declarator.id.start,
            ));
        };
        let name: Rc<str> = Rc::from(name.as_str());
        self.hoist.add_var(&name);
        Ok(name)
    }

    fn compile_for_in(
        &mut self,
        left: &ForTarget,
        right: &ExprNode,
        body: &StmtNode,
        label: Option<Rc<str>>,
    ) -> Compiled<StmtThunk> {
        // A declared target is pre-run to hoist (and apply any
        // initializer); the binding itself then acts as the assignment
        // target for each enumerated key.
        let (init, target) = match left {
            ForTarget::Declaration(decl) => {
                let VariableDeclaration { declarations, .. } = decl;
                let [declarator] = declarations.as_slice() else {
                    return Err(CompileError::new("for-in needs a single declared binding", decl.start));
                };
                let init = self.compile_var_declaration(declarations)?;
                let name = match &declarator.id.expr {
                    Expr::Identifier { name } => Rc::from(name.as_str()),
                    _ => {
                        return Err(CompileError::new("unsupported declarator pattern", declarator.id.start));
                    }
                };
                (Some(init), Lvalue::Ident(name))
            }
            ForTarget::Expression(expr) => (None, self.compile_lvalue(expr)?),
        };
        let right = self.compile_expr(right)?;
        let body = self.compile_loop_body(body)?;
        Ok(Rc::new(move |m| {
            if let Some(init) = &init {
                init(m)?;
            }
            let object = right(m)?;
            let keys = m.enumerate(&object);
            let mut result = None;
            for key in keys {
                m.step()?;
                let place = target.resolve(m)?;
                place.write(m, Value::String(key))?;
                match run_loop_body(m, &body, label.as_ref(), &mut result)? {
                    LoopStep::Continue => {}
                    LoopStep::Break => break,
                }
            }
            Ok(result)
        }))
    }

    fn compile_labeled(&mut self, name: &Ident, body: &StmtNode, offset: usize) -> Compiled<StmtThunk> {
        let label: Rc<str> = Rc::from(name.name.as_str());
        if self.labels.contains(&label) {
            return Err(CompileError::new(format!("label '{label}' already declared"), offset));
        }
        self.labels.push(Rc::clone(&label));
        let labels_loop = matches!(
            body.stmt,
            Stmt::For { .. } | Stmt::ForIn { .. } | Stmt::While { .. } | Stmt::DoWhile { .. }
        );
        if labels_loop {
            self.loop_labels.push(Rc::clone(&label));
        }
        let body = self.compile_stmt_labeled(body, Some(Rc::clone(&label)));
        if labels_loop {
            self.loop_labels.pop();
        }
        self.labels.pop();
        let body = body?;
        Ok(Rc::new(move |m| match body(m) {
            Err(Flow::BreakLabel(name)) if name == label => Ok(Some(Value::Undefined)),
            other => other,
        }))
    }

    fn compile_switch(&mut self, discriminant: &ExprNode, cases: &[SwitchCase], offset: usize) -> Compiled<StmtThunk> {
        struct CompiledCase {
            /// `None` marks the `default` clause, which never matches the
            /// discriminant during the scan.
            test: Option<ExprThunk>,
            body: Vec<StmtThunk>,
        }

        // A second `default` clause is a syntax error, as in the grammar;
        // the bundled parser rejects it too, but ESTree input arrives
        // unchecked.
        let mut default_index = None;
        for (index, case) in cases.iter().enumerate() {
            if case.test.is_none() {
                if default_index.is_some() {
                    return Err(CompileError::new("more than one default clause in switch", offset));
                }
                default_index = Some(index);
            }
        }

        let discriminant = self.compile_expr(discriminant)?;
        self.breakable += 1;
        let compiled: Compiled<Vec<CompiledCase>> = cases
            .iter()
            .map(|case| {
                Ok(CompiledCase {
                    test: case.test.as_ref().map(|test| self.compile_expr(test)).transpose()?,
                    body: self.compile_stmts(&case.consequent)?,
                })
            })
            .collect();
        self.breakable -= 1;
        let cases = compiled?;

        Ok(Rc::new(move |m| {
            let value = discriminant(m)?;
            let mut matched = false;
            let mut result = None;
            for case in &cases {
                if !matched {
                    let Some(test) = &case.test else { continue };
                    if !value::strict_eq(&test(m)?, &value) {
                        continue;
                    }
                    matched = true;
                }
                if !run_switch_body(m, &case.body, &mut result)? {
                    return Ok(result);
                }
            }
            // No case matched: reaching `default` behaves like a match at
            // its position, falling through every later case body.
            if !matched && let Some(start) = default_index {
                for case in &cases[start..] {
                    if !run_switch_body(m, &case.body, &mut result)? {
                        return Ok(result);
                    }
                }
            }
            Ok(result)
        }))
    }

    fn compile_try(
        &mut self,
        block: &Block,
        handler: Option<&crate::ast::CatchClause>,
        finalizer: Option<&Block>,
    ) -> Compiled<StmtThunk> {
        let try_stmts = self.compile_stmts(&block.body)?;
        let handler = handler
            .map(|clause| {
                let Expr::Identifier { name } = &clause.param.expr else {
                    return Err(CompileError::new("unsupported catch parameter", clause.param.start));
                };
                let param: Rc<str> = Rc::from(name.as_str());
                let body = self.compile_stmts(&clause.body.body)?;
                Ok((param, body))
            })
            .transpose()?;
        let finalizer = finalizer.map(|block| self.compile_stmts(&block.body)).transpose()?;

        Ok(Rc::new(move |m| {
            let mut outcome = run_sequence(m, &try_stmts);
            if matches!(outcome, Err(Flow::Resource(_))) {
                return outcome;
            }
            if let Err(Flow::Throw(thrown)) = &outcome
                && let Some((param, body)) = &handler
            {
                // Transactional binding of the catch parameter in the
                // current scope: the previous binding (if any) comes back
                // once the handler is done.
                let thrown = thrown.clone();
                let scope = Rc::clone(&m.scope);
                let saved = scope.save_binding(param);
                scope.declare(Rc::clone(param), thrown);
                let caught = run_sequence(m, body);
                scope.restore_binding(param, saved);
                if matches!(caught, Err(Flow::Resource(_))) {
                    return caught;
                }
                outcome = caught;
            }
            if let Some(body) = &finalizer {
                // A finally that completes normally is invisible; any
                // signal it produces supersedes the tentative outcome.
                run_sequence(m, body)?;
            }
            outcome
        }))
    }

    fn compile_expr(&mut self, node: &ExprNode) -> Compiled<ExprThunk> {
        self.compile_expr_named(node, None)
    }

    /// Compiles an expression. `hint` carries the identifier name an
    /// anonymous function expression on the right of `name = function(){}`
    /// (or `var name = function(){}`) inherits.
    fn compile_expr_named(&mut self, node: &ExprNode, hint: Option<Rc<str>>) -> Compiled<ExprThunk> {
        match &node.expr {
            Expr::Identifier { name } => {
                let name: Rc<str> = Rc::from(name.as_str());
                Ok(Rc::new(move |m| {
                    Ok(m.scope.lookup(&name).unwrap_or(Value::Undefined))
                }))
            }
            Expr::Literal { value, .. } => {
                let value = match value {
                    LitValue::Null => Value::Null,
                    LitValue::Bool(b) => Value::Bool(*b),
                    LitValue::Number(n) => Value::Number(*n),
                    LitValue::String(s) => Value::string(s.as_str()),
                };
                Ok(Rc::new(move |_| Ok(value.clone())))
            }
            Expr::This => Ok(Rc::new(|m| Ok(m.context.clone()))),
            Expr::Array { elements } => {
                let elements: Compiled<Vec<Option<ExprThunk>>> = elements
                    .iter()
                    .map(|element| element.as_ref().map(|e| self.compile_expr(e)).transpose())
                    .collect();
                let elements = elements?;
                Ok(Rc::new(move |m| {
                    let mut values = Vec::with_capacity(elements.len());
                    for element in &elements {
                        values.push(match element {
                            Some(thunk) => thunk(m)?,
                            None => Value::Undefined,
                        });
                    }
                    Ok(Value::new_array(values))
                }))
            }
            Expr::Object { properties } => self.compile_object_literal(properties),
            Expr::Function { id, params, body } => {
                let name: Rc<str> = match (id, hint) {
                    (Some(id), _) => Rc::from(id.name.as_str()),
                    (None, Some(hint)) => hint,
                    (None, None) => Rc::from(""),
                };
                let template = self.compile_function(params, body, node.start, node.end, name, id.is_some())?;
                Ok(Rc::new(move |m| Ok(template(m))))
            }
            Expr::Unary { operator, argument } => self.compile_unary(*operator, argument),
            Expr::Update {
                operator,
                argument,
                prefix,
            } => {
                let target = self.compile_lvalue(argument)?;
                let delta = match operator {
                    UpdateOp::Incr => 1.0,
                    UpdateOp::Decr => -1.0,
                };
                let prefix = *prefix;
                Ok(Rc::new(move |m| {
                    let place = target.resolve(m)?;
                    let old = value::to_number(&place.read(m)?);
                    let new = old + delta;
                    place.write(m, Value::Number(new))?;
                    Ok(Value::Number(if prefix { new } else { old }))
                }))
            }
            Expr::Binary { operator, left, right } => {
                let op = *operator;
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                Ok(Rc::new(move |m| {
                    let left = left(m)?;
                    let right = right(m)?;
                    value::binary_op(op, &left, &right)
                }))
            }
            Expr::Logical { operator, left, right } => {
                let op = *operator;
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                Ok(Rc::new(move |m| {
                    let value = left(m)?;
                    let short_circuit = match op {
                        LogicalOp::And => !value.truthy(),
                        LogicalOp::Or => value.truthy(),
                    };
                    if short_circuit { Ok(value) } else { right(m) }
                }))
            }
            Expr::Assignment { operator, left, right } => self.compile_assignment(*operator, left, right),
            Expr::Member {
                object,
                property,
                computed,
            } => {
                let object = self.compile_expr(object)?;
                let key = self.compile_prop_key(property, *computed)?;
                Ok(Rc::new(move |m| {
                    let object = object(m)?;
                    let key = resolve_key(m, &key)?;
                    m.get_property(&object, &key)
                }))
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.compile_expr(test)?;
                let consequent = self.compile_expr(consequent)?;
                let alternate = self.compile_expr(alternate)?;
                Ok(Rc::new(move |m| {
                    if test(m)?.truthy() { consequent(m) } else { alternate(m) }
                }))
            }
            Expr::Call { callee, arguments } => self.compile_call(callee, arguments),
            Expr::New { callee, arguments } => {
                let callee = self.compile_expr(callee)?;
                let arguments = self.compile_exprs(arguments)?;
                Ok(Rc::new(move |m| {
                    let callee = callee(m)?;
                    let args = eval_args(m, &arguments)?;
                    m.construct(&callee, &args)
                }))
            }
            Expr::Sequence { expressions } => {
                let expressions = self.compile_exprs(expressions)?;
                Ok(Rc::new(move |m| {
                    let mut last = Value::Undefined;
                    for expression in &expressions {
                        last = expression(m)?;
                    }
                    Ok(last)
                }))
            }
        }
    }

    fn compile_exprs(&mut self, nodes: &[ExprNode]) -> Compiled<Vec<ExprThunk>> {
        nodes.iter().map(|node| self.compile_expr(node)).collect()
    }

    fn compile_unary(&mut self, operator: UnaryOp, argument: &ExprNode) -> Compiled<ExprThunk> {
        if operator == UnaryOp::Delete {
            // `delete` operates on the decomposed lvalue, not a value.
            return match &argument.expr {
                Expr::Identifier { .. } | Expr::Member { .. } => {
                    let target = self.compile_lvalue(argument)?;
                    Ok(Rc::new(move |m| {
                        let place = target.resolve(m)?;
                        place.delete(m)
                    }))
                }
                _ => {
                    let argument = self.compile_expr(argument)?;
                    Ok(Rc::new(move |m| {
                        argument(m)?;
                        Ok(Value::Bool(true))
                    }))
                }
            };
        }
        let argument = self.compile_expr(argument)?;
        Ok(Rc::new(move |m| {
            let value = argument(m)?;
            Ok(match operator {
                UnaryOp::Neg => Value::Number(-value::to_number(&value)),
                UnaryOp::Pos => Value::Number(value::to_number(&value)),
                UnaryOp::Not => Value::Bool(!value.truthy()),
                UnaryOp::BitNot => Value::Number(f64::from(!value::to_int32(&value))),
                UnaryOp::TypeOf => Value::string(value.type_of()),
                UnaryOp::Void => Value::Undefined,
                UnaryOp::Delete => unreachable!("delete handled above"),
            })
        }))
    }

    fn compile_assignment(&mut self, operator: AssignOp, left: &ExprNode, right: &ExprNode) -> Compiled<ExprThunk> {
        let target = self.compile_lvalue(left)?;
        let hint = match (&operator, &left.expr) {
            (AssignOp::Assign, Expr::Identifier { name }) => Some(Rc::from(name.as_str())),
            _ => None,
        };
        let right = self.compile_expr_named(right, hint)?;
        match operator.binary_op() {
            None => Ok(Rc::new(move |m| {
                let place = target.resolve(m)?;
                let value = right(m)?;
                place.write(m, value.clone())?;
                Ok(value)
            })),
            Some(op) => Ok(Rc::new(move |m| {
                let place = target.resolve(m)?;
                let old = place.read(m)?;
                let operand = right(m)?;
                let value = value::binary_op(op, &old, &operand)?;
                place.write(m, value.clone())?;
                Ok(value)
            })),
        }
    }

    fn compile_call(&mut self, callee: &ExprNode, arguments: &[ExprNode]) -> Compiled<ExprThunk> {
        let arguments = self.compile_exprs(arguments)?;
        // A member callee is a method call: `this` is the receiver. Any
        // other callee runs with the root context.
        if let Expr::Member {
            object,
            property,
            computed,
        } = &callee.expr
        {
            let object = self.compile_expr(object)?;
            let key = self.compile_prop_key(property, *computed)?;
            return Ok(Rc::new(move |m| {
                let receiver = object(m)?;
                let key = resolve_key(m, &key)?;
                let callee = m.get_property(&receiver, &key)?;
                let args = eval_args(m, &arguments)?;
                m.call(&callee, receiver, &args)
            }));
        }
        let callee = self.compile_expr(callee)?;
        Ok(Rc::new(move |m| {
            let callee = callee(m)?;
            let args = eval_args(m, &arguments)?;
            let this = m.root_context.clone();
            m.call(&callee, this, &args)
        }))
    }

    fn compile_object_literal(&mut self, properties: &[crate::ast::Property]) -> Compiled<ExprThunk> {
        struct Entry {
            key: Rc<str>,
            init: Option<ExprThunk>,
            get: Option<ExprThunk>,
            set: Option<ExprThunk>,
        }

        // Properties are grouped by key: a later `init` overwrites an
        // earlier one, accessors accumulate per key.
        let mut entries: Vec<Entry> = Vec::new();
        for property in properties {
            let key: Rc<str> = match &property.key.expr {
                Expr::Identifier { name } => Rc::from(name.as_str()),
                Expr::Literal { value, .. } => match value {
                    LitValue::String(s) => Rc::from(s.as_str()),
                    LitValue::Number(n) => Rc::from(value::number_to_string(*n)),
                    LitValue::Bool(b) => Rc::from(b.to_string()),
                    LitValue::Null => Rc::from("null"),
                },
                _ => {
                    return Err(CompileError::new("unsupported property key", property.key.start));
                }
            };
            let thunk = self.compile_expr_named(&property.value, Some(Rc::clone(&key)))?;
            let entry = match entries.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => entry,
                None => {
                    entries.push(Entry {
                        key,
                        init: None,
                        get: None,
                        set: None,
                    });
                    entries.last_mut().expect("entry just pushed")
                }
            };
            match property.kind {
                PropertyKind::Init => entry.init = Some(thunk),
                PropertyKind::Get => entry.get = Some(thunk),
                PropertyKind::Set => entry.set = Some(thunk),
            }
        }

        Ok(Rc::new(move |m| {
            let object = Value::new_object();
            let obj = object.as_object().expect("fresh object").clone();
            for entry in &entries {
                if entry.get.is_some() || entry.set.is_some() {
                    let get = entry.get.as_ref().map(|g| g(m)).transpose()?;
                    let set = entry.set.as_ref().map(|s| s(m)).transpose()?;
                    let property = Property {
                        value: Value::Undefined,
                        get,
                        set,
                        enumerable: true,
                        configurable: true,
                    };
                    obj.borrow_mut().properties.insert(Rc::clone(&entry.key), property);
                } else if let Some(init) = &entry.init {
                    let value = init(m)?;
                    obj.borrow_mut().set(Rc::clone(&entry.key), value);
                }
            }
            Ok(object)
        }))
    }

    fn compile_prop_key(&mut self, property: &ExprNode, computed: bool) -> Compiled<PropKey> {
        if computed {
            return Ok(PropKey::Computed(self.compile_expr(property)?));
        }
        match &property.expr {
            Expr::Identifier { name } => Ok(PropKey::Static(Rc::from(name.as_str()))),
            Expr::Literal { value: LitValue::String(s), .. } => Ok(PropKey::Static(Rc::from(s.as_str()))),
            Expr::Literal {
                value: LitValue::Number(n),
                ..
            } => Ok(PropKey::Static(Rc::from(value::number_to_string(*n)))),
            _ => Err(CompileError::new("unsupported property accessor", property.start)),
        }
    }

    fn compile_lvalue(&mut self, node: &ExprNode) -> Compiled<Lvalue> {
        match &node.expr {
            Expr::Identifier { name } => Ok(Lvalue::Ident(Rc::from(name.as_str()))),
            Expr::Member {
                object,
                property,
                computed,
            } => Ok(Lvalue::Member {
                object: self.compile_expr(object)?,
                key: self.compile_prop_key(property, *computed)?,
            }),
            _ => Err(CompileError::new("invalid assignment target", node.start)),
        }
    }

    /// Compiles a function body into a template that, when run, closes
    /// over the machine's current scope and yields the function value.
    /// `self_binding` is set for named function expressions, whose own
    /// name is visible inside the body.
    fn compile_function(
        &mut self,
        params: &[ExprNode],
        body: &Block,
        start: usize,
        end: usize,
        name: Rc<str>,
        self_binding: bool,
    ) -> Compiled<FuncTemplate> {
        let params: Compiled<Vec<Rc<str>>> = params
            .iter()
            .map(|param| match &param.expr {
                Expr::Identifier { name } => Ok(Rc::from(name.as_str())),
                _ => Err(CompileError::new("unsupported parameter pattern", param.start)),
            })
            .collect();
        let params: Rc<[Rc<str>]> = params?.into();

        // The body compiles in its own hoist/label/loop context; labels
        // and loops do not cross function boundaries.
        let saved_hoist = mem::take(&mut self.hoist);
        let saved_labels = mem::take(&mut self.labels);
        let saved_loop_labels = mem::take(&mut self.loop_labels);
        let saved_breakable = mem::replace(&mut self.breakable, 0);
        let saved_loops = mem::replace(&mut self.loops, 0);
        self.functions += 1;
        let body = self.compile_stmts(&body.body);
        self.functions -= 1;
        let hoist = Rc::new(mem::replace(&mut self.hoist, saved_hoist));
        self.labels = saved_labels;
        self.loop_labels = saved_loop_labels;
        self.breakable = saved_breakable;
        self.loops = saved_loops;
        let body = body?;

        let body: StmtThunk = Rc::new(move |m| run_sequence(m, &body));
        let source = Rc::clone(&self.source);
        Ok(Rc::new(move |m: &mut Machine| {
            make_function_value(JsFunction {
                name: Rc::clone(&name),
                params: Rc::clone(&params),
                body: Rc::clone(&body),
                scope: Rc::clone(&m.scope),
                hoist: Rc::clone(&hoist),
                source: Rc::clone(&source),
                start,
                end,
                self_binding,
            })
        }))
    }
}

fn resolve_key(machine: &mut Machine, key: &PropKey) -> ExecResult<Rc<str>> {
    match key {
        PropKey::Static(name) => Ok(Rc::clone(name)),
        PropKey::Computed(thunk) => Ok(Rc::from(to_js_string(&thunk(machine)?))),
    }
}

fn eval_args(machine: &mut Machine, thunks: &[ExprThunk]) -> ExecResult<SmallVec<[Value; 8]>> {
    let mut args = SmallVec::with_capacity(thunks.len());
    for thunk in thunks {
        args.push(thunk(machine)?);
    }
    Ok(args)
}

enum LoopStep {
    Continue,
    Break,
}

/// Interprets one body result for the loop engines: empty and `continue`
/// results keep looping, `break` exits, a matching labeled `continue` is
/// swallowed, plain values become the loop result, everything else
/// propagates to the caller.
fn run_loop_body(
    machine: &mut Machine,
    body: &StmtThunk,
    label: Option<&Rc<str>>,
    result: &mut Option<Value>,
) -> ExecResult<LoopStep> {
    match body(machine) {
        Ok(None) => Ok(LoopStep::Continue),
        Ok(Some(value)) => {
            *result = Some(value);
            Ok(LoopStep::Continue)
        }
        Err(Flow::Break) => Ok(LoopStep::Break),
        Err(Flow::Continue) => Ok(LoopStep::Continue),
        Err(Flow::ContinueLabel(name)) if label == Some(&name) => Ok(LoopStep::Continue),
        Err(signal) => Err(signal),
    }
}

/// The unified loop engine behind `for`, `while` and `do-while`.
///
/// `check_first` is false for `do-while`, which runs its body once before
/// the first test.
fn make_loop(
    init: Option<StmtThunk>,
    test: Option<ExprThunk>,
    update: Option<ExprThunk>,
    body: StmtThunk,
    label: Option<Rc<str>>,
    check_first: bool,
) -> StmtThunk {
    Rc::new(move |m| {
        if let Some(init) = &init {
            init(m)?;
        }
        let mut result = None;
        let mut first = true;
        loop {
            if (check_first || !first)
                && let Some(test) = &test
                && !test(m)?.truthy()
            {
                break;
            }
            first = false;
            m.step()?;
            match run_loop_body(m, &body, label.as_ref(), &mut result)? {
                LoopStep::Continue => {}
                LoopStep::Break => break,
            }
            if let Some(update) = &update {
                update(m)?;
            }
        }
        Ok(result)
    })
}

/// Runs one switch case body. Returns `Ok(false)` when a `break` or
/// `continue` was swallowed at the switch boundary and scanning should
/// stop; labeled signals, `return` and `throw` propagate.
fn run_switch_body(machine: &mut Machine, stmts: &[StmtThunk], result: &mut Option<Value>) -> ExecResult<bool> {
    match run_sequence(machine, stmts) {
        Ok(Some(value)) => {
            *result = Some(value);
            Ok(true)
        }
        Ok(None) => Ok(true),
        Err(Flow::Break | Flow::Continue) => Ok(false),
        Err(signal) => Err(signal),
    }
}
