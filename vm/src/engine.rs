use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use parser::{parse_str, List};

use crate::compiler::{compile_program, CompileContext, Program, Symbol};
use crate::error::{Unwind, VmResult};
use crate::limits::{DEFAULT_FILENAME, DEFAULT_FIRST_ROW};
use crate::object::Native;
use crate::value::Value;
use crate::vm::{native, FrameId, Outcome, Suspension, Vm};

/// Everything a host needs to run scripts: the root compile scope and the VM whose root frame
/// holds the matching values. Names registered here are visible to every program compiled
/// afterwards.
pub struct Engine {
    root: CompileContext<'static>,
    vm: Vm,
}

impl Engine {
    /// An engine with `print`, `give`, `yield` and `defs`. `print` writes to `stdout`.
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let mut engine = Engine {
            root: CompileContext::new(),
            vm: Vm::new(),
        };

        engine.register("print", native::print(stdout));
        engine.register("give", native::give);
        engine.register("yield", native::suspend);
        engine.register("defs", native::defs);
        engine
    }

    /// Adds a host function under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Vm, FrameId, &[Value]) -> Result<Value, Unwind> + 'static,
    {
        self.root.define(name, Symbol::Builtin);
        let native = Native::new(name, Box::new(func));
        self.vm
            .define(FrameId::ROOT, name, Value::Callable(Rc::new(native)));
    }

    /// Calls a root binding right away.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> VmResult<Outcome> {
        self.vm.invoke(name, args)
    }

    pub fn compile(&self, src: &str) -> VmResult<Program> {
        self.compile_named(src, DEFAULT_FILENAME)
    }

    pub fn compile_named(&self, src: &str, file: &str) -> VmResult<Program> {
        let ast = parse_str(src, file, DEFAULT_FIRST_ROW)?;
        self.compile_ast(&ast)
    }

    /// Compiles an already parsed (or host built) program in a scope of its own.
    pub fn compile_ast(&self, ast: &List) -> VmResult<Program> {
        let mut ctx = CompileContext::with(&self.root);
        compile_program(&mut ctx, ast)
    }

    pub fn run(&mut self, program: &Program) -> VmResult<Outcome> {
        self.vm.run(program)
    }

    pub fn eval(&mut self, src: &str) -> VmResult<Outcome> {
        let program = self.compile(src)?;
        self.run(&program)
    }

    pub fn resume(&mut self, suspension: Suspension) -> VmResult<Outcome> {
        self.vm.resume(suspension)
    }

    /// Names in the root scope, sorted.
    pub fn builtin_names(&self) -> Vec<&str> {
        self.root.names()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crash_core::SrcLoc;
    use parser::{Expr, List, Prim};
    use pretty_assertions::assert_eq;

    use crate::engine::Engine;
    use crate::error::{Error, Unwind};
    use crate::value::Value;
    use crate::vm::{Outcome, Suspension};

    type Output = Rc<RefCell<Vec<u8>>>;

    fn engine() -> (Engine, Output) {
        let out: Output = Rc::default();
        (Engine::new(out.clone()), out)
    }

    fn text(out: &Output) -> String {
        String::from_utf8(out.borrow().clone()).unwrap()
    }

    fn eval(src: &str) -> Value {
        let (mut engine, _) = engine();
        complete(engine.eval(src).unwrap())
    }

    fn complete(outcome: Outcome) -> Value {
        match outcome {
            Outcome::Complete(value) => value,
            Outcome::Suspended(suspension) => panic!("unexpected {:?}", suspension),
        }
    }

    fn suspended(outcome: Outcome) -> Suspension {
        match outcome {
            Outcome::Suspended(suspension) => suspension,
            Outcome::Complete(value) => panic!("expected a suspension, got {:?}", value),
        }
    }

    #[test]
    fn test_sequencing_keeps_last_value() {
        assert_eq!(eval("'foo'; 'bar'"), Value::from("bar"));
        assert_eq!(eval(""), Value::Null);
        assert_eq!(eval("1.5"), Value::Float(1.5));
    }

    #[test]
    fn test_if() {
        let tests = [
            ("if 1 { 'true' }", Value::from("true")),
            ("if 0 { 'true' }", Value::Null),
            ("if 1 {'true'} else {'false'}", Value::from("true")),
            ("if 0 {'true'} else {'false'}", Value::from("false")),
            ("if 0.0 'true' else 'false'", Value::from("false")),
            ("if 'text' 'true' else 'false'", Value::from("true")),
            ("x := 0; if x 'true' else 'false'", Value::from("false")),
        ];

        for (src, expected) in tests {
            assert_eq!(eval(src), expected, "{}", src);
        }
    }

    #[test]
    fn test_variables() {
        assert_eq!(eval("x := 100; x"), Value::Int(100));
        assert_eq!(eval("x : int; x"), Value::Null);
        assert_eq!(eval("x := 1; x := 'again'; x"), Value::from("again"));

        // Blocks see the names of the frames below them, their own definitions stay inside.
        assert_eq!(eval("x := 1; (x)"), Value::Int(1));
        assert_eq!(eval("x := 1; (x := 2); x"), Value::Int(1));
        assert_eq!(eval("x := (y := 3; give y); x"), Value::Int(3));
    }

    #[test]
    fn test_print() {
        let (mut engine, out) = engine();
        let value = complete(engine.eval("print 'a' 1 2.5 (give) {}; print").unwrap());

        assert_eq!(value, Value::Null);
        assert_eq!(text(&out), "a\n1\n2.5\nnull\n<function block>\n");
    }

    #[test]
    fn test_give() {
        assert_eq!(eval("give 'a' 'b'"), Value::from("a"));
        assert_eq!(eval("give"), Value::Null);
    }

    #[test]
    fn test_static_lists_are_deferred() {
        let (mut engine, out) = engine();
        let src = "b := {print 'ran'; 5}; print 'before'; b; b";
        let value = complete(engine.eval(src).unwrap());

        assert_eq!(value, Value::Int(5));
        assert_eq!(text(&out), "before\nran\nran\n");
    }

    #[test]
    fn test_functions() {
        let (mut engine, out) = engine();
        let src = "
            func greet(who : str) { print who; give 'done' };
            greet 'world';
            add := func (a : int, b : int) : int { give b };
            add 1 2
        ";
        let value = complete(engine.eval(src).unwrap());

        assert_eq!(value, Value::Int(2));
        assert_eq!(text(&out), "world\n");
    }

    #[test]
    fn test_function_value() {
        assert_eq!(eval("func named() {}").to_string(), "<function named>");
        assert_eq!(eval("f := func () {}; give f").to_string(), "<function anonymous>");
        assert_eq!(eval("give print").to_string(), "<function print>");
    }

    // Parameters are written into the caller's bindings, there is no private frame for them.
    #[test]
    fn test_parameters_bind_into_calling_scope() {
        let src = "
            d := defs;
            f := func (a : int, b : int) { 'body' };
            f 7;
            d
        ";
        let defs = match eval(src) {
            Value::Defs(defs) => defs,
            value => panic!("unexpected {:?}", value),
        };

        let defs = defs.borrow();
        assert_eq!(defs.get("a"), Some(&Value::Int(7)));
        assert_eq!(defs.get("b"), Some(&Value::Null));
        assert_eq!(eval("d := defs; f := func (a : int) {}; f 'x'; d.a"), Value::from("x"));
    }

    #[test]
    fn test_field_calls() {
        assert_eq!(eval("d := defs; func g(v : str) { give v }; d.g 'x' 'y'"), Value::from("x"));
        assert_eq!(eval("d := defs; d.missing"), Value::Null);
        assert_eq!(
            eval("d := defs; d.d").to_string(),
            eval("d := defs; d").to_string()
        );
        assert_eq!(eval("x := 1; d := defs; d").to_string(), "{d: {...}, x: 1}");
    }

    #[test]
    fn test_if_condition_reads_fields() {
        let tests = [
            ("d := defs; x := 1; if d.x { 'a' } else { 'b' }", Value::from("a")),
            ("d := defs; x := 0; if d.x { 'a' } else { 'b' }", Value::from("b")),
            ("d := defs; if d.missing 'a' else 'b'", Value::from("b")),
        ];

        for (src, expected) in tests {
            assert_eq!(eval(src), expected, "{}", src);
        }

        let (mut engine, _) = engine();
        let err = engine.eval("s := 'text'; if s.x { 'a' }").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:17: runtime error: cannot read field 'x' of string");
    }

    #[test]
    fn test_benchmark_script() {
        let (mut engine, _) = engine();
        let program = engine.compile(include_str!("../../data/calls.crash")).unwrap();
        assert_eq!(complete(engine.run(&program).unwrap()), Value::from("done"));
    }

    #[test]
    fn test_yield_and_resume() {
        let (mut engine, out) = engine();
        let program = engine.compile("print 'one'; yield; print 'two'; 'done'").unwrap();

        let suspension = suspended(engine.run(&program).unwrap());
        assert_eq!(suspension.depth(), 1);
        assert_eq!(text(&out), "one\n");

        assert_eq!(complete(engine.resume(suspension).unwrap()), Value::from("done"));
        assert_eq!(text(&out), "one\ntwo\n");
    }

    #[test]
    fn test_resume_runs_remaining_steps_once() {
        let (mut engine, _) = engine();
        let suspension = suspended(engine.eval("1; yield; 2").unwrap());
        assert_eq!(complete(engine.resume(suspension).unwrap()), Value::Int(2));

        let suspension = suspended(engine.eval("1; yield").unwrap());
        assert_eq!(complete(engine.resume(suspension).unwrap()), Value::Null);
    }

    #[test]
    fn test_yield_inside_arguments() {
        let (mut engine, out) = engine();
        let outcome = engine.eval("print 'a' (yield; 'b') 'c'; 'end'").unwrap();

        let suspension = suspended(outcome);
        assert_eq!(suspension.depth(), 3);
        assert_eq!(text(&out), "");

        assert_eq!(complete(engine.resume(suspension).unwrap()), Value::from("end"));
        assert_eq!(text(&out), "a\nb\nc\n");
    }

    #[test]
    fn test_yield_inside_function() {
        let (mut engine, out) = engine();
        let src = "
            f := func (n : int) { print 'in'; yield; print n; give 'out' };
            print (f 'arg');
            'end'
        ";

        let suspension = suspended(engine.eval(src).unwrap());
        assert_eq!(text(&out), "in\n");

        assert_eq!(complete(engine.resume(suspension).unwrap()), Value::from("end"));
        assert_eq!(text(&out), "in\narg\nout\n");
    }

    #[test]
    fn test_yield_twice() {
        let (mut engine, out) = engine();
        let first = suspended(engine.eval("yield; print 'a'; if 1 { yield; print 'b' }; 'c'").unwrap());

        let second = suspended(engine.resume(first).unwrap());
        assert_eq!(text(&out), "a\n");

        assert_eq!(complete(engine.resume(second).unwrap()), Value::from("c"));
        assert_eq!(text(&out), "a\nb\n");
    }

    #[test]
    fn test_engine_is_reusable_while_suspended() {
        let (mut engine, out) = engine();
        let suspension = suspended(engine.eval("yield; print 'later'").unwrap());

        assert_eq!(complete(engine.eval("give 'meanwhile'").unwrap()), Value::from("meanwhile"));
        complete(engine.resume(suspension).unwrap());
        assert_eq!(text(&out), "later\n");
    }

    #[test]
    fn test_runtime_errors() {
        let (mut engine, _) = engine();

        let err = engine.eval("x := 1; x 2").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:8: runtime error: value '1' is not callable");

        let err = engine.eval("x := 'text'; x.field").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:14: runtime error: cannot read field 'field' of string");

        let err = engine.eval("f := func () { f }; f").unwrap_err();
        assert!(matches!(err, Error::Runtime { ref msg, .. } if msg == "stack overflow"));

        // A failed run leaves nothing behind.
        assert_eq!(complete(engine.eval("give 'fine'").unwrap()), Value::from("fine"));
    }

    #[test]
    fn test_compile_and_parse_errors() {
        let (mut engine, _) = engine();

        let err = engine.eval("print y").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:6: compile error: undefined name 'y'");

        let err = engine.eval("for ;; {}").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:0: compile error: bad node type: for");

        let err = engine.compile_named("{", "script.crash").err().unwrap();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.to_string(), "script.crash:1:1: syntax error: expected '}', got <EOF>");
    }

    #[test]
    fn test_programs_compile_in_their_own_scope() {
        let (mut engine, _) = engine();
        complete(engine.eval("x := 1").unwrap());

        let err = engine.eval("x").unwrap_err();
        assert_eq!(err.to_string(), "<input>:1:0: compile error: undefined name 'x'");
    }

    #[test]
    fn test_host_functions() {
        let (mut engine, out) = engine();
        let headers = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&headers);
        engine.register("header", move |_, _, args| {
            seen.borrow_mut().extend(args.iter().map(|arg| arg.to_string()));
            Ok(Value::Null)
        });
        engine.register("fail", |vm, _, _| Err(vm.error(format_args!("host failure"))));

        complete(engine.eval("header 'Title' 2; print 'body'").unwrap());
        assert_eq!(*headers.borrow(), vec![String::from("Title"), String::from("2")]);
        assert_eq!(text(&out), "body\n");

        complete(engine.call("header", vec![Value::from("direct")]).unwrap());
        assert_eq!(headers.borrow().len(), 3);
        assert_eq!(complete(engine.call("give", vec![Value::Int(4)]).unwrap()), Value::Int(4));

        let err = engine.eval("\n  fail").unwrap_err();
        assert_eq!(err.to_string(), "<input>:2:2: runtime error: host failure");

        assert_eq!(engine.builtin_names(), vec!["defs", "fail", "give", "header", "print", "yield"]);
    }

    #[test]
    fn test_host_function_can_suspend() {
        let (mut engine, out) = engine();
        engine.register("wait", |_, _, _| Err(Unwind::Yield));

        let suspension = suspended(engine.eval("print 'a'; wait; print 'b'").unwrap());
        assert_eq!(text(&out), "a\n");
        complete(engine.resume(suspension).unwrap());
        assert_eq!(text(&out), "a\nb\n");
    }

    #[test]
    fn test_prim_literals() {
        let (mut engine, _) = engine();
        let loc = SrcLoc::new("host", 1, 0);
        let ast = List {
            loc: loc.clone(),
            items: vec![Expr::prim(loc, Prim::new(Value::from("from host")))],
        };

        let program = engine.compile_ast(&ast).unwrap();
        assert_eq!(complete(engine.run(&program).unwrap()), Value::from("from host"));
        assert_eq!(complete(engine.run(&program).unwrap()), Value::from("from host"));
    }
}
