use ahash::AHashMap;

/// What a name resolved to at compile time. Only existence matters to the generated code, the
/// kind is kept for diagnostics and tooling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Symbol {
    Builtin,
    Variable,
    Parameter,
    Function,
}

/// Compile-time scope. A context is created for the root, for every program compiled against it
/// and for every function body. The enclosing scope is only ever read.
#[derive(Debug, Default)]
pub struct CompileContext<'p> {
    symbols: AHashMap<String, Symbol>,
    enclosing: Option<&'p CompileContext<'p>>,
}

impl<'p> CompileContext<'p> {
    pub fn new() -> Self {
        CompileContext {
            symbols: AHashMap::new(),
            enclosing: None,
        }
    }

    pub fn with(enclosing: &'p CompileContext<'p>) -> Self {
        CompileContext {
            symbols: AHashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, symbol: Symbol) {
        self.symbols.insert(String::from(name), symbol);
    }

    // Innermost definition wins.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        match self.symbols.get(name) {
            Some(symbol) => Some(*symbol),
            None => self.enclosing.and_then(|enclosing| enclosing.resolve(name)),
        }
    }

    /// Names defined directly in this scope, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.symbols.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
