use std::rc::Rc;

use crash_core::SrcLoc;
use parser::{Expr, ExprVisitor, FuncDef, Ident, List, Prim, VarDef};
use tracing::{debug, instrument};

use crate::error::{Error, Unwind, VmResult};
use crate::object::{DeferredBlock, Function};
use crate::value::Value;
use crate::vm::{FrameId, Vm};

pub use context::{CompileContext, Symbol};

mod context;

/// A lowered expression: run it against a frame to get its value.
pub type Compiled = Rc<dyn Fn(&mut Vm, FrameId) -> Result<Value, Unwind>>;

/// The steps of a list, in order. Frames run blocks step by step so they can be resumed.
pub type Block = Rc<[Compiled]>;

// Pins down the closure signature, so the closures below don't need their parameters spelled out.
fn step<F>(f: F) -> Compiled
where
    F: Fn(&mut Vm, FrameId) -> Result<Value, Unwind> + 'static,
{
    Rc::new(f)
}

fn constant(value: Value) -> Compiled {
    step(move |_, _| Ok(value.clone()))
}

/// A compiled top-level list, ready to run any number of times.
#[derive(Clone)]
pub struct Program {
    loc: SrcLoc,
    block: Block,
}

impl Program {
    pub fn loc(&self) -> &SrcLoc {
        &self.loc
    }

    pub(crate) fn block(&self) -> Block {
        Rc::clone(&self.block)
    }
}

/// Lowers a parsed program. Names the program defines go into `ctx`.
#[instrument(level = "debug", skip_all, fields(loc = %program.loc))]
pub fn compile_program(ctx: &mut CompileContext, program: &List) -> VmResult<Program> {
    let block = Compiler::new(ctx).block(program)?;
    debug!(steps = block.len(), "compiled");
    Ok(Program {
        loc: program.loc.clone(),
        block,
    })
}

/// Turns expressions into closures. Names are checked against the compile-time scope here,
/// runtime lookups only ever walk the frame chain.
pub struct Compiler<'c, 'p> {
    ctx: &'c mut CompileContext<'p>,
}

impl<'c, 'p> Compiler<'c, 'p> {
    pub fn new(ctx: &'c mut CompileContext<'p>) -> Self {
        Compiler { ctx }
    }

    pub fn compile(&mut self, expr: &Expr) -> VmResult<Compiled> {
        self.visit_expr(expr)
    }

    fn block(&mut self, list: &List) -> VmResult<Block> {
        let steps = list
            .items
            .iter()
            .map(|item| self.visit_expr(item))
            .collect::<VmResult<Vec<_>>>()?;
        Ok(steps.into())
    }

    // Lists evaluated in place get a frame of their own on top of the current one.
    fn run_in_place(&mut self, list: &List) -> VmResult<Compiled> {
        let block = self.block(list)?;
        Ok(step(move |vm, env| vm.run_block(env, Rc::clone(&block))))
    }
}

impl<'c, 'p> ExprVisitor for Compiler<'c, 'p> {
    type Item = Compiled;
    type Error = Error;

    fn visit_var_ref(&mut self, name: &Ident) -> VmResult<Compiled> {
        if self.ctx.resolve(&name.text).is_none() {
            return Err(Error::compile(
                &name.loc,
                format_args!("undefined name '{}'", name.text),
            ));
        }

        // Known to exist at compile time, but the frame that defines it may never have run.
        let name = name.text.clone();
        Ok(step(move |vm, env| {
            Ok(vm.lookup(env, &name).unwrap_or(Value::Null))
        }))
    }

    fn visit_field_ref(&mut self, loc: &SrcLoc, primary: &Expr, field: &Ident) -> VmResult<Compiled> {
        let primary = self.visit_expr(primary)?;
        let loc = loc.clone();
        let field = field.text.clone();

        Ok(step(move |vm, env| match primary(vm, env)? {
            Value::Defs(defs) => {
                let value = defs.borrow().get(&field).cloned();
                Ok(value.unwrap_or(Value::Null))
            }
            value => Err(Error::runtime(
                &loc,
                format_args!("cannot read field '{}' of {}", field, value.type_name()),
            )
            .into()),
        }))
    }

    fn visit_func_call(&mut self, loc: &SrcLoc, target: &Expr, args: &[Expr]) -> VmResult<Compiled> {
        let target = self.visit_expr(target)?;
        let args: Block = args
            .iter()
            .map(|arg| self.visit_expr(arg))
            .collect::<VmResult<Vec<_>>>()?
            .into();
        let loc = loc.clone();

        Ok(step(move |vm, env| {
            let callee = target(vm, env)?;
            vm.call_with_args(env, callee, Rc::clone(&args), &loc)
        }))
    }

    fn visit_list(&mut self, list: &List) -> VmResult<Compiled> {
        self.run_in_place(list)
    }

    // Compiled once, the block value is shared by every evaluation of the literal.
    fn visit_static_list(&mut self, list: &List) -> VmResult<Compiled> {
        let block = self.block(list)?;
        Ok(constant(Value::Callable(Rc::new(DeferredBlock::new(block)))))
    }

    fn visit_dynamic_list(&mut self, list: &List) -> VmResult<Compiled> {
        self.run_in_place(list)
    }

    fn visit_string(&mut self, _: &SrcLoc, value: &str) -> VmResult<Compiled> {
        Ok(constant(Value::from(value)))
    }

    fn visit_integer(&mut self, _: &SrcLoc, value: i64) -> VmResult<Compiled> {
        Ok(constant(Value::Int(value)))
    }

    fn visit_float(&mut self, _: &SrcLoc, value: f64) -> VmResult<Compiled> {
        Ok(constant(Value::Float(value)))
    }

    fn visit_prim(&mut self, loc: &SrcLoc, value: &Prim) -> VmResult<Compiled> {
        match value.downcast_ref::<Value>() {
            Some(value) => Ok(constant(value.clone())),
            None => Err(Error::compile(loc, format_args!("unsupported primitive value"))),
        }
    }

    fn visit_if(
        &mut self,
        _: &SrcLoc,
        cond: &Expr,
        on_true: &List,
        on_false: Option<&List>,
    ) -> VmResult<Compiled> {
        let cond = self.visit_expr(cond)?;
        let on_true = self.block(on_true)?;
        let on_false = on_false.map(|list| self.block(list)).transpose()?;

        Ok(step(move |vm, env| {
            if cond(vm, env)?.is_truthy() {
                return vm.run_block(env, Rc::clone(&on_true));
            }

            match &on_false {
                Some(block) => vm.run_block(env, Rc::clone(block)),
                None => Ok(Value::Null),
            }
        }))
    }

    fn visit_for(
        &mut self,
        loc: &SrcLoc,
        _: Option<&Expr>,
        _: Option<&Expr>,
        _: Option<&Expr>,
        _: Option<&List>,
    ) -> VmResult<Compiled> {
        Err(Error::compile(loc, format_args!("bad node type: for")))
    }

    fn visit_var_def(&mut self, def: &VarDef) -> VmResult<Compiled> {
        // Defined before the initializer is compiled, so the initializer may refer to it.
        self.ctx.define(&def.name.text, Symbol::Variable);

        let init = def.init.as_deref().map(|init| self.visit_expr(init)).transpose()?;
        let name = def.name.text.clone();

        Ok(step(move |vm, env| {
            let value = match &init {
                Some(init) => init(vm, env)?,
                None => Value::Null,
            };
            vm.define(env, &name, value.clone());
            Ok(value)
        }))
    }

    fn visit_func_def(&mut self, def: &FuncDef) -> VmResult<Compiled> {
        let name = def.name.as_ref().map(|name| name.text.clone());
        if let Some(name) = &name {
            self.ctx.define(name, Symbol::Function);
        }

        let mut scope = CompileContext::with(&*self.ctx);
        let params: Vec<String> = def.params.iter().map(|param| param.name.text.clone()).collect();
        for param in &params {
            scope.define(param, Symbol::Parameter);
        }
        let body = Compiler::new(&mut scope).block(&def.body)?;

        let function = Value::Callable(Rc::new(Function::new(name.clone(), params, body)));
        Ok(step(move |vm, env| {
            if let Some(name) = &name {
                vm.define(env, name, function.clone());
            }
            Ok(function.clone())
        }))
    }
}
