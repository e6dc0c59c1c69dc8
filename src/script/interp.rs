//! Tree-walking evaluator for parsed routines.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::trace;

use super::ast::*;
use super::builtins;
use super::value::{Function, Value};
use crate::error::ScriptError;

/// Nested closure calls beyond this depth fail instead of overflowing the stack.
const MAX_CALL_DEPTH: usize = 64;

/// Lets helpers render another template through the engine that is running
/// the current routine.
pub trait RenderHost {
    fn render_nested(
        &self,
        template: &str,
        data: &Value,
        depth: usize,
    ) -> Result<String, ScriptError>;
}

struct Binding {
    value: Value,
    mutable: bool,
}

enum FrameKind {
    Vars(RefCell<HashMap<String, Binding>>),
    With { object: Value, strict: bool },
}

struct Frame {
    kind: FrameKind,
    parent: Option<Scope>,
}

/// A lexical scope chain. Closures capture the chain they were created in.
#[derive(Clone)]
pub struct Scope(Rc<Frame>);

impl Scope {
    fn vars(parent: Option<&Scope>) -> Self {
        Scope(Rc::new(Frame {
            kind: FrameKind::Vars(RefCell::new(HashMap::new())),
            parent: parent.cloned(),
        }))
    }

    fn child(&self) -> Self {
        Scope::vars(Some(self))
    }

    fn with_object(&self, object: Value, strict: bool) -> Self {
        Scope(Rc::new(Frame {
            kind: FrameKind::With { object, strict },
            parent: Some(self.clone()),
        }))
    }

    fn declare(&self, name: &str, value: Value, mutable: bool) {
        if let FrameKind::Vars(vars) = &self.0.kind {
            vars.borrow_mut().insert(name.to_string(), Binding { value, mutable });
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(&*self.0), |frame| frame.parent.as_ref().map(|s| &*s.0))
    }

    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        let mut strict = false;
        for frame in self.frames() {
            match &frame.kind {
                FrameKind::Vars(vars) => {
                    if let Some(binding) = vars.borrow().get(name) {
                        return Ok(binding.value.clone());
                    }
                }
                FrameKind::With { object, strict: guarded } => {
                    if let Value::Object(map) = object {
                        if let Some(value) = map.borrow().get(name) {
                            return Ok(value.clone());
                        }
                    }
                    strict |= *guarded;
                }
            }
        }

        if strict {
            return Err(ScriptError::runtime(format!("Variable \"{name}\" is not defined")));
        }
        builtins::global(name)
            .ok_or_else(|| ScriptError::runtime(format!("ReferenceError: {name} is not defined")))
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), ScriptError> {
        for frame in self.frames() {
            match &frame.kind {
                FrameKind::Vars(vars) => {
                    if let Some(binding) = vars.borrow_mut().get_mut(name) {
                        if !binding.mutable {
                            return Err(ScriptError::runtime(
                                "TypeError: Assignment to constant variable.",
                            ));
                        }
                        binding.value = value;
                        return Ok(());
                    }
                }
                FrameKind::With { object: Value::Object(map), .. } => {
                    let mut map = map.borrow_mut();
                    if let Some(slot) = map.get_mut(name) {
                        *slot = value;
                        return Ok(());
                    }
                }
                FrameKind::With { .. } => {}
            }
        }
        Err(ScriptError::runtime(format!("ReferenceError: {name} is not defined")))
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Executes routines. One interpreter is created per invocation.
pub struct Interpreter<'h> {
    host: Option<&'h dyn RenderHost>,
    data: Value,
    depth: usize,
    call_depth: usize,
}

impl<'h> Interpreter<'h> {
    pub fn new(data: Value) -> Self {
        Self { host: None, data, depth: 0, call_depth: 0 }
    }

    pub fn with_host(mut self, host: &'h dyn RenderHost, depth: usize) -> Self {
        self.host = Some(host);
        self.depth = depth;
        self
    }

    pub fn host(&self) -> Option<&'h dyn RenderHost> {
        self.host
    }

    /// The data object the routine was invoked with.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Nesting level of the routine: 0 for a top-level render.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Runs `program` with positional `args`; missing arguments are `undefined`.
    pub fn run(&mut self, program: &Program, args: Vec<Value>) -> Result<Value, ScriptError> {
        let root = Scope::vars(None);
        let mut args = args.into_iter();
        for param in &program.params {
            root.declare(param, args.next().unwrap_or_default(), true);
        }
        trace!("running routine with {} parameter(s)", program.params.len());

        match self.exec_block(&program.body, &root)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    /// Calls a function value with `args`.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
        let Value::Function(function) = callee else {
            return Err(ScriptError::runtime(format!(
                "TypeError: {} is not a function",
                callee.to_display_string()
            )));
        };

        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::runtime("RangeError: Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        let result = match function {
            Function::Native { func, .. } => func(self, args),
            Function::Closure { def, scope } => {
                let frame = scope.child();
                for (i, param) in def.params.iter().enumerate() {
                    frame.declare(param, args.get(i).cloned().unwrap_or_default(), true);
                }
                match &def.body {
                    FunctionBody::Expr(expr) => self.eval(expr, &frame),
                    FunctionBody::Block(body) => match self.exec_stmts(body, &frame) {
                        Ok(Flow::Return(value)) => Ok(value),
                        Ok(_) => Ok(Value::Undefined),
                        Err(err) => Err(err),
                    },
                }
            }
        };
        self.call_depth -= 1;
        result
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], scope: &Scope) -> Result<Flow, ScriptError> {
        self.exec_stmts(body, &scope.child())
    }

    fn exec_stmts(&mut self, body: &[Stmt], scope: &Scope) -> Result<Flow, ScriptError> {
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl { kind, bindings } => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value, *kind != DeclKind::Const);
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::If { test, consequent, alternate } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::ForEach { head, decl, binding, iterable, body } => {
                let iterable = self.eval(iterable, scope)?;
                let items = match head {
                    ForHead::Of => builtins::iterate(&iterable)?,
                    ForHead::In => builtins::keys(&iterable),
                };
                for item in items {
                    let frame = scope.child();
                    match decl {
                        Some(kind) => frame.declare(binding, item, *kind != DeclKind::Const),
                        None => frame.assign(binding, item)?,
                    }
                    match self.exec(body, &frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { init, test, update, body } => {
                let frame = scope.child();
                if let Some(init) = init {
                    self.exec(init, &frame)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &frame)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &frame)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => {
                let thrown = self.eval(expr, scope)?;
                let message = match &thrown {
                    Value::Object(map) => map
                        .borrow()
                        .get("message")
                        .map(Value::to_display_string)
                        .unwrap_or_else(|| thrown.to_display_string()),
                    other => other.to_display_string(),
                };
                Err(ScriptError::Runtime(message))
            }
            Stmt::With { object, strict, body } => {
                let object = self.eval(object, scope)?;
                let frame = scope.with_object(object, *strict);
                self.exec_block(body, &frame)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ScriptError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => scope.lookup(name),
            Expr::Array(items) => {
                let items =
                    items.iter().map(|item| self.eval(item, scope)).collect::<Result<_, _>>()?;
                Ok(Value::array(items))
            }
            Expr::Object(entries) => {
                let mut evaluated = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    evaluated.push((key.clone(), self.eval(value, scope)?));
                }
                Ok(Value::object(evaluated))
            }
            Expr::Member { object, property, optional } => {
                let object = self.eval(object, scope)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                builtins::get_property(&object, property)
            }
            Expr::Index { object, index, optional } => {
                let object = self.eval(object, scope)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let index = self.eval(index, scope)?;
                builtins::get_index(&object, &index)
            }
            Expr::Call { callee, args, optional } => self.eval_call(callee, args, *optional, scope),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::from(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional { test, consequent, alternate } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(bin) => {
                        let current = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(*bin, &current, &rhs)
                    }
                };
                self.assign_to(target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Update { increment, prefix, target } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Arrow(def) => {
                Ok(Value::Function(Function::Closure { def: def.clone(), scope: scope.clone() }))
            }
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        optional: bool,
        scope: &Scope,
    ) -> Result<Value, ScriptError> {
        let method = match callee {
            Expr::Member { object, property, optional: optional_member } => {
                let receiver = self.eval(object, scope)?;
                if *optional_member && receiver.is_nullish() {
                    return Ok(Value::Undefined);
                }
                Some((receiver, property.clone()))
            }
            Expr::Index { object, index, optional: optional_member } => {
                let receiver = self.eval(object, scope)?;
                if *optional_member && receiver.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.eval(index, scope)?.to_display_string();
                Some((receiver, key))
            }
            _ => None,
        };

        match method {
            Some((receiver, name)) => {
                let args = self.eval_args(args, scope)?;
                builtins::call_method(self, &receiver, &name, &args)
            }
            None => {
                let function = self.eval(callee, scope)?;
                if optional && function.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let args = self.eval_args(args, scope)?;
                self.call(&function, &args)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Scope) -> Result<Vec<Value>, ScriptError> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    fn assign_to(&mut self, target: &Expr, value: Value, scope: &Scope) -> Result<(), ScriptError> {
        match target {
            Expr::Ident(name) => scope.assign(name, value),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, scope)?;
                builtins::set_property(&object, property, value)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                builtins::set_index(&object, &index, value)
            }
            _ => Err(ScriptError::runtime("SyntaxError: Invalid left-hand side in assignment")),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (l, r) = (left.primitive(), right.primitive());
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                let mut out = l.to_display_string();
                out.push_str(&r.to_display_string());
                Value::String(out)
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Value::Bool(compare(op, left, right))
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let (l, r) = (left.primitive(), right.primitive());
    if let (Value::String(a), Value::String(b)) = (&l, &r) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (l.to_number(), r.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_program;
    use serde_json::json;

    fn run(source: &str, data: serde_json::Value) -> Result<Value, ScriptError> {
        let program = parse_program(vec!["data".to_string()], source)?;
        let data = Value::from_json(&data);
        Interpreter::new(data.clone()).run(&program, vec![data])
    }

    fn run_ok(source: &str, data: serde_json::Value) -> serde_json::Value {
        run(source, data).unwrap().to_json().unwrap()
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(run_ok("return 1 + 2 * 3", json!({})), json!(7));
        assert_eq!(run_ok("return 'a' + 1 + 2", json!({})), json!("a12"));
        assert_eq!(run_ok("return 7 % 4 - 1", json!({})), json!(2));
    }

    #[test]
    fn with_resolves_data_members() {
        assert_eq!(
            run_ok("with (data) { return name + '!' }", json!({ "name": "Ann" })),
            json!("Ann!")
        );
    }

    #[test]
    fn unknown_identifier_is_a_reference_error() {
        let err = run("with (data) { return missing }", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: missing is not defined");
    }

    #[test]
    fn strict_scope_reports_variable_not_defined() {
        let err = run("strict (data) { return missing }", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Variable \"missing\" is not defined");
    }

    #[test]
    fn strict_scope_hides_builtin_globals() {
        assert!(run("with (data) { return Math.max(1, 2) }", json!({})).is_ok());
        assert!(run("strict (data) { return Math.max(1, 2) }", json!({})).is_err());
    }

    #[test]
    fn closures_capture_and_mutate_outer_bindings() {
        let source = "let total = 0;\n[1, 2, 3].forEach(n => { total += n })\nreturn total";
        assert_eq!(run_ok(source, json!({})), json!(6));
    }

    #[test]
    fn loops_support_break_and_continue() {
        let source = concat!(
            "let out = ''\nfor (let i = 0; i < 10; i++) {\n",
            "if (i % 2) continue\nif (i > 6) break\nout += i\n}\nreturn out",
        );
        assert_eq!(run_ok(source, json!({})), json!("0246"));
    }

    #[test]
    fn for_of_and_for_in() {
        let source = concat!(
            "let out = []\nfor (const x of data.xs) out.push(x * 2)\n",
            "for (let k in data.o) out.push(k)\nreturn out",
        );
        assert_eq!(run_ok(source, json!({ "xs": [1, 2], "o": { "a": 1 } })), json!([2, 4, "a"]));
    }

    #[test]
    fn const_cannot_be_reassigned() {
        let err = run("const a = 1\na = 2", json!({})).unwrap_err();
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn throw_raises_runtime_error() {
        let err = run("throw 'boom'", json!({})).unwrap_err();
        assert_eq!(err, ScriptError::Runtime("boom".to_string()));
    }

    #[test]
    fn optional_chaining_and_nullish_default() {
        assert_eq!(run_ok("return data.user?.name ?? 'guest'", json!({})), json!("guest"));
        let err = run("return data.user.name", json!({})).unwrap_err();
        assert!(err.to_string().contains("Cannot read properties of undefined"));
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let source = "let f = null\nf = () => f()\nreturn f()";
        let err = run(source, json!({})).unwrap_err();
        assert!(err.to_string().contains("Maximum call stack"));
    }
}
