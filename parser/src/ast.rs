use std::any::Any;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use crash_core::{SrcLoc, Token};

// Nodes are built once by the parser and never mutated afterwards. Every node carries the
// location it was parsed from so later stages can report errors against the source.

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub loc: SrcLoc,
    pub text: String,
}

impl Ident {
    pub fn new(loc: SrcLoc, text: impl Into<String>) -> Self {
        Ident {
            loc,
            text: text.into(),
        }
    }
}

impl From<Token> for Ident {
    fn from(token: Token) -> Self {
        Ident {
            loc: token.loc,
            text: token.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Nominal(Ident),
}

impl TypeSpec {
    pub fn loc(&self) -> &SrcLoc {
        match self {
            TypeSpec::Nominal(name) => &name.loc,
        }
    }
}

/// An ordered sequence of expressions. The same shape backs the program itself, `{}` blocks and
/// `()` lists; what differs is how each is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub loc: SrcLoc,
    pub items: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub loc: SrcLoc,
    pub name: Ident,
    pub ty: Option<TypeSpec>,
    pub init: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub loc: SrcLoc,
    pub name: Option<Ident>,
    pub params: Vec<VarDef>,
    pub ret: Option<TypeSpec>,
    pub body: List,
}

/// An opaque value supplied by the host. The parser never produces one.
#[derive(Clone)]
pub struct Prim(pub Rc<dyn Any>);

impl Prim {
    pub fn new<T: Any>(value: T) -> Self {
        Prim(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Debug for Prim {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Prim({:p})", Rc::as_ptr(&self.0))
    }
}

impl PartialEq for Prim {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    VarRef {
        name: Ident,
    },
    FieldRef {
        loc: SrcLoc,
        primary: Box<Expr>,
        field: Ident,
    },
    FuncCall {
        loc: SrcLoc,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    List(List),
    // Deferred block, passed around unevaluated and run on demand.
    StaticList(List),
    // Evaluated in place, like a parenthesised expression.
    DynamicList(List),
    StringLiteral {
        loc: SrcLoc,
        value: String,
    },
    IntegerLiteral {
        loc: SrcLoc,
        value: i64,
    },
    FloatLiteral {
        loc: SrcLoc,
        value: f64,
    },
    PrimLiteral {
        loc: SrcLoc,
        value: Prim,
    },
    If {
        loc: SrcLoc,
        cond: Box<Expr>,
        on_true: List,
        on_false: Option<List>,
    },
    For {
        loc: SrcLoc,
        init: Option<Box<Expr>>,
        cond: Option<Box<Expr>>,
        after: Option<Box<Expr>>,
        block: Option<List>,
    },
    VarDef(VarDef),
    FuncDef(FuncDef),
}

pub trait ExprVisitor {
    type Item;
    type Error;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Item, Self::Error> {
        match expr {
            Expr::VarRef { name } => self.visit_var_ref(name),
            Expr::FieldRef {
                loc,
                primary,
                field,
            } => self.visit_field_ref(loc, primary, field),
            Expr::FuncCall { loc, target, args } => self.visit_func_call(loc, target, args),
            Expr::List(list) => self.visit_list(list),
            Expr::StaticList(list) => self.visit_static_list(list),
            Expr::DynamicList(list) => self.visit_dynamic_list(list),
            Expr::StringLiteral { loc, value } => self.visit_string(loc, value),
            Expr::IntegerLiteral { loc, value } => self.visit_integer(loc, *value),
            Expr::FloatLiteral { loc, value } => self.visit_float(loc, *value),
            Expr::PrimLiteral { loc, value } => self.visit_prim(loc, value),
            Expr::If {
                loc,
                cond,
                on_true,
                on_false,
            } => self.visit_if(loc, cond, on_true, on_false.as_ref()),
            Expr::For {
                loc,
                init,
                cond,
                after,
                block,
            } => self.visit_for(
                loc,
                init.as_deref(),
                cond.as_deref(),
                after.as_deref(),
                block.as_ref(),
            ),
            Expr::VarDef(def) => self.visit_var_def(def),
            Expr::FuncDef(def) => self.visit_func_def(def),
        }
    }

    fn visit_var_ref(&mut self, name: &Ident) -> Result<Self::Item, Self::Error>;
    fn visit_field_ref(
        &mut self,
        loc: &SrcLoc,
        primary: &Expr,
        field: &Ident,
    ) -> Result<Self::Item, Self::Error>;
    fn visit_func_call(
        &mut self,
        loc: &SrcLoc,
        target: &Expr,
        args: &[Expr],
    ) -> Result<Self::Item, Self::Error>;
    fn visit_list(&mut self, list: &List) -> Result<Self::Item, Self::Error>;
    fn visit_static_list(&mut self, list: &List) -> Result<Self::Item, Self::Error>;
    fn visit_dynamic_list(&mut self, list: &List) -> Result<Self::Item, Self::Error>;
    fn visit_string(&mut self, loc: &SrcLoc, value: &str) -> Result<Self::Item, Self::Error>;
    fn visit_integer(&mut self, loc: &SrcLoc, value: i64) -> Result<Self::Item, Self::Error>;
    fn visit_float(&mut self, loc: &SrcLoc, value: f64) -> Result<Self::Item, Self::Error>;
    fn visit_prim(&mut self, loc: &SrcLoc, value: &Prim) -> Result<Self::Item, Self::Error>;
    fn visit_if(
        &mut self,
        loc: &SrcLoc,
        cond: &Expr,
        on_true: &List,
        on_false: Option<&List>,
    ) -> Result<Self::Item, Self::Error>;
    fn visit_for(
        &mut self,
        loc: &SrcLoc,
        init: Option<&Expr>,
        cond: Option<&Expr>,
        after: Option<&Expr>,
        block: Option<&List>,
    ) -> Result<Self::Item, Self::Error>;
    fn visit_var_def(&mut self, def: &VarDef) -> Result<Self::Item, Self::Error>;
    fn visit_func_def(&mut self, def: &FuncDef) -> Result<Self::Item, Self::Error>;
}

impl Expr {
    // Creator methods, mostly so tests and hosts can build trees without spelling out every field.
    pub fn var_ref(name: Ident) -> Self {
        Expr::VarRef { name }
    }

    pub fn field_ref(loc: SrcLoc, primary: Expr, field: Ident) -> Self {
        Expr::FieldRef {
            loc,
            primary: Box::new(primary),
            field,
        }
    }

    pub fn call(loc: SrcLoc, target: Expr, args: Vec<Expr>) -> Self {
        Expr::FuncCall {
            loc,
            target: Box::new(target),
            args,
        }
    }

    pub fn string(loc: SrcLoc, value: impl Into<String>) -> Self {
        Expr::StringLiteral {
            loc,
            value: value.into(),
        }
    }

    pub fn integer(loc: SrcLoc, value: i64) -> Self {
        Expr::IntegerLiteral { loc, value }
    }

    pub fn float(loc: SrcLoc, value: f64) -> Self {
        Expr::FloatLiteral { loc, value }
    }

    pub fn prim(loc: SrcLoc, value: Prim) -> Self {
        Expr::PrimLiteral { loc, value }
    }

    pub fn if_(loc: SrcLoc, cond: Expr, on_true: List, on_false: Option<List>) -> Self {
        Expr::If {
            loc,
            cond: Box::new(cond),
            on_true,
            on_false,
        }
    }

    pub fn for_(
        loc: SrcLoc,
        init: Option<Expr>,
        cond: Option<Expr>,
        after: Option<Expr>,
        block: Option<List>,
    ) -> Self {
        Expr::For {
            loc,
            init: init.map(Box::new),
            cond: cond.map(Box::new),
            after: after.map(Box::new),
            block,
        }
    }

    pub fn var_def(loc: SrcLoc, name: Ident, ty: Option<TypeSpec>, init: Option<Expr>) -> Self {
        Expr::VarDef(VarDef {
            loc,
            name,
            ty,
            init: init.map(Box::new),
        })
    }

    pub fn loc(&self) -> &SrcLoc {
        match self {
            Expr::VarRef { name } => &name.loc,
            Expr::List(list) | Expr::StaticList(list) | Expr::DynamicList(list) => &list.loc,
            Expr::VarDef(def) => &def.loc,
            Expr::FuncDef(def) => &def.loc,
            Expr::FieldRef { loc, .. }
            | Expr::FuncCall { loc, .. }
            | Expr::StringLiteral { loc, .. }
            | Expr::IntegerLiteral { loc, .. }
            | Expr::FloatLiteral { loc, .. }
            | Expr::PrimLiteral { loc, .. }
            | Expr::If { loc, .. }
            | Expr::For { loc, .. } => loc,
        }
    }
}

// The canonical text form. Lists print every item followed by a semicolon, so parsing the
// output of a parsed program gives back the same tree.

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Display for TypeSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Nominal(name) => write!(f, "{}", name),
        }
    }
}

impl Display for List {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            write!(f, "{};", item)?;
        }
        Ok(())
    }
}

impl Display for VarDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} :", self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, " {}", ty)?;
            if self.init.is_some() {
                write!(f, " ")?;
            }
        }
        if let Some(init) = &self.init {
            write!(f, "= {}", init)?;
        }
        Ok(())
    }
}

impl Display for FuncDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "func")?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }

        write!(f, "(")?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;

        if let Some(ret) = &self.ret {
            write!(f, " : {}", ret)?;
        }
        write!(f, " {{{}}}", self.body)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::VarRef { name } => write!(f, "{}", name),
            Expr::FieldRef { primary, field, .. } => write!(f, "{}.{}", primary, field),
            Expr::FuncCall { target, args, .. } => {
                write!(f, "{}", target)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Expr::List(list) => write!(f, "{}", list),
            Expr::StaticList(list) => write!(f, "{{{}}}", list),
            Expr::DynamicList(list) => write!(f, "({})", list),
            Expr::StringLiteral { value, .. } => {
                write!(f, "'")?;
                for c in value.chars() {
                    match c {
                        '\'' | '\\' => write!(f, "\\{}", c)?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
            Expr::IntegerLiteral { value, .. } => write!(f, "{}", value),
            Expr::FloatLiteral { value, .. } => write!(f, "{:?}", value),
            Expr::PrimLiteral { .. } => write!(f, "<prim>"),
            Expr::If {
                cond,
                on_true,
                on_false,
                ..
            } => {
                write!(f, "if {} {{{}}}", cond, on_true)?;
                if let Some(on_false) = on_false {
                    write!(f, " else {{{}}}", on_false)?;
                }
                Ok(())
            }
            Expr::For {
                init,
                cond,
                after,
                block,
                ..
            } => {
                write!(f, "for")?;
                for part in [init, cond, after].into_iter().flatten() {
                    write!(f, " {}", part)?;
                }
                if let Some(block) = block {
                    write!(f, " {{{}}}", block)?;
                }
                Ok(())
            }
            Expr::VarDef(def) => write!(f, "{}", def),
            Expr::FuncDef(def) => write!(f, "{}", def),
        }
    }
}
