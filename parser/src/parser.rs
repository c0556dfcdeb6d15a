use crash_core::{Lexer, SrcLoc, Token, Type};
use tracing::{debug, instrument};

use crate::ast::{Expr, FuncDef, Ident, List, TypeSpec, VarDef};
use crate::error::Error;

// Helper alias for shorter return types
type ExprResult = Result<Expr, Error>;
type ListResult = Result<List, Error>;

// Statements and expressions nested deeper than this are refused, before the host stack runs out.
pub(crate) const PARSER_MAX_DEPTH: usize = 128;

/// Recursive-descent parser over a lexer. Lookahead is done by pulling tokens and pushing them back,
/// the pushback stack is unbounded.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pushback: Vec<Token>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Parser {
            lexer,
            pushback: Vec::new(),
            depth: 0,
        }
    }

    /// Parses a whole program. The resulting list is located at the first token.
    pub fn parse(&mut self) -> ListResult {
        let first = self.next()?;
        let loc = first.loc.clone();
        self.put_back(first);

        let program = self.list(loc)?;
        self.consume(Type::Eof, "expected end of input")?;
        Ok(program)
    }

    // Statements up to (not including) the next terminator. Bare semicolons are dropped.
    fn list(&mut self, loc: SrcLoc) -> ListResult {
        let mut items = Vec::new();
        loop {
            let token = self.next()?;
            if token.is_terminator() {
                self.put_back(token);
                break;
            }

            self.put_back(token);
            if let Some(item) = self.statement()? {
                items.push(item);
            }
        }

        Ok(List { loc, items })
    }

    // A list that must be closed by `close`, the opening token is already consumed.
    fn enclosed(&mut self, loc: SrcLoc, close: Type, msg: &str) -> ListResult {
        let list = self.list(loc)?;
        self.consume(close, msg)?;
        Ok(list)
    }

    fn statement(&mut self) -> Result<Option<Expr>, Error> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Option<Expr>, Error> {
        let token = self.next()?;
        if token.is(Type::SemiColon) {
            return Ok(None);
        }

        let stmt = if token.is_ident("if") {
            self.if_stmt(token)?
        } else if token.is_ident("for") {
            self.for_stmt(token)?
        } else {
            self.put_back(token);
            self.expr(true)?
        };
        Ok(Some(stmt))
    }

    // With `long` set (statement level) an identifier swallows the expressions after it as call
    // arguments, and `.field args` suffixes are applied. Arguments themselves are parsed short, so
    // `foo a b` is a call of foo with two arguments and not `foo (a b)`.
    fn expr(&mut self, long: bool) -> ExprResult {
        self.nested(|parser| parser.expr_inner(long))
    }

    fn expr_inner(&mut self, long: bool) -> ExprResult {
        let token = self.next()?;

        if token.is(Type::Identifier) {
            if token.is_ident("func") {
                return self.func_def(token);
            }

            let after = self.next()?;
            if after.is(Type::Colon) {
                return self.var_def(token, long);
            }
            self.put_back(after);

            let loc = token.loc.clone();
            let name = Expr::var_ref(Ident::from(token));
            if !long {
                return Ok(name);
            }

            let (args, closed) = self.arg_list()?;
            let call = Expr::call(loc, name, args);
            return if closed {
                Ok(call)
            } else {
                self.field_calls(call)
            };
        }

        let primary = self.primary(token)?;
        if long {
            self.field_calls(primary)
        } else {
            Ok(primary)
        }
    }

    fn primary(&mut self, token: Token) -> ExprResult {
        let loc = token.loc.clone();
        let expr = match token.ty {
            Type::Str => Expr::string(loc, unescape(&token.text)),
            Type::Int => Expr::integer(loc, integer(&token)?),
            Type::Float => {
                let value = token
                    .text
                    .parse::<f64>()
                    .map_err(|_| invalid_literal(&token))?;
                Expr::float(loc, value)
            }
            Type::LeftParen => {
                Expr::DynamicList(self.enclosed(loc, Type::RightParen, "expected ')'")?)
            }
            Type::LeftBrace => {
                Expr::StaticList(self.enclosed(loc, Type::RightBrace, "expected '}'")?)
            }
            _ => return Err(Error::syntax(&token, "expected expression")),
        };
        Ok(expr)
    }

    // `.field args` suffixes. A suffix whose argument list ate a semicolon ends the chain.
    fn field_calls(&mut self, mut expr: Expr) -> ExprResult {
        while let Some(dot) = self.match_one(Type::Dot)? {
            let field = self.consume(Type::Identifier, "expected field name after '.'")?;
            let target = Expr::field_ref(dot.loc.clone(), expr, Ident::from(field));

            let (args, closed) = self.arg_list()?;
            expr = Expr::call(dot.loc, target, args);
            if closed {
                break;
            }
        }

        Ok(expr)
    }

    // Plain `.field` reads after a short expression. No argument list follows them, so a block
    // after an `if` condition stays the branch.
    fn field_reads(&mut self, mut expr: Expr) -> ExprResult {
        while let Some(dot) = self.match_one(Type::Dot)? {
            let field = self.consume(Type::Identifier, "expected field name after '.'")?;
            let target = Expr::field_ref(dot.loc.clone(), expr, Ident::from(field));
            expr = Expr::call(dot.loc, target, Vec::new());
        }

        Ok(expr)
    }

    // Conditions of `if` and the clauses of `for`.
    fn condition(&mut self) -> ExprResult {
        let expr = self.expr(false)?;
        self.field_reads(expr)
    }

    // Arguments run until a semicolon (consumed) or a terminator or dot (left in the stream). The
    // flag tells whether the semicolon was consumed.
    fn arg_list(&mut self) -> Result<(Vec<Expr>, bool), Error> {
        let mut args = Vec::new();
        loop {
            let token = self.next()?;
            if token.is(Type::SemiColon) {
                return Ok((args, true));
            }

            let ends = token.is_terminator() || token.is(Type::Dot);
            self.put_back(token);
            if ends {
                return Ok((args, false));
            }

            args.push(self.expr(false)?);
        }
    }

    // The initializer is parsed as long as the definition itself, so a definition inside an
    // argument list can't swallow the arguments after it.
    fn var_def(&mut self, name: Token, long: bool) -> ExprResult {
        let mut token = self.next()?;

        let mut ty = None;
        if token.is(Type::Identifier) {
            ty = Some(TypeSpec::Nominal(Ident::from(token)));
            token = self.next()?;
        }

        let mut init = None;
        if token.is(Type::Assign) {
            init = Some(self.expr(long)?);
        } else {
            self.put_back(token);
        }

        Ok(Expr::var_def(name.loc.clone(), Ident::from(name), ty, init))
    }

    fn func_def(&mut self, keyword: Token) -> ExprResult {
        let name = self.match_one(Type::Identifier)?.map(Ident::from);
        self.consume(Type::LeftParen, "expected '(' before parameters")?;

        let mut params = Vec::new();
        if self.match_one(Type::RightParen)?.is_none() {
            loop {
                let param = self.consume(Type::Identifier, "expected parameter name")?;
                self.consume(Type::Colon, "expected ':' after parameter name")?;
                let ty = self.type_spec()?;

                params.push(VarDef {
                    loc: param.loc.clone(),
                    name: Ident::from(param),
                    ty: Some(ty),
                    init: None,
                });

                let token = self.next()?;
                match token.ty {
                    Type::Comma => continue,
                    Type::RightParen => break,
                    _ => return Err(Error::syntax(&token, "expected ',' or ')' after parameter")),
                }
            }
        }

        let ret = match self.match_one(Type::Colon)? {
            Some(_) => Some(self.type_spec()?),
            None => None,
        };

        let open = self.consume(Type::LeftBrace, "expected '{' before function body")?;
        let body = self.enclosed(open.loc, Type::RightBrace, "expected '}' after function body")?;

        Ok(Expr::FuncDef(FuncDef {
            loc: keyword.loc,
            name,
            params,
            ret,
            body,
        }))
    }

    fn type_spec(&mut self) -> Result<TypeSpec, Error> {
        let name = self.consume(Type::Identifier, "expected type name")?;
        Ok(TypeSpec::Nominal(Ident::from(name)))
    }

    fn if_stmt(&mut self, keyword: Token) -> ExprResult {
        let cond = self.condition()?;
        let on_true = self.branch()?;

        let token = self.next()?;
        let on_false = if token.is_ident("else") {
            Some(self.branch()?)
        } else {
            self.put_back(token);
            None
        };

        Ok(Expr::if_(keyword.loc, cond, on_true, on_false))
    }

    // Either a braced block or a single statement, which gets wrapped into a block of its own.
    fn branch(&mut self) -> ListResult {
        let token = self.next()?;
        if token.is(Type::LeftBrace) {
            return self.enclosed(token.loc, Type::RightBrace, "expected '}'");
        }

        let loc = token.loc.clone();
        self.put_back(token);
        let items = self.statement()?.into_iter().collect();
        Ok(List { loc, items })
    }

    fn for_stmt(&mut self, keyword: Token) -> ExprResult {
        let init = self.clause(true)?;
        let cond = self.clause(true)?;
        let after = self.clause(false)?;

        let block = match self.match_one(Type::LeftBrace)? {
            Some(open) => Some(self.enclosed(open.loc, Type::RightBrace, "expected '}'")?),
            None => None,
        };

        Ok(Expr::for_(keyword.loc, init, cond, after, block))
    }

    // An optional short expression. Clauses before the block are closed by a semicolon.
    fn clause(&mut self, terminated: bool) -> Result<Option<Expr>, Error> {
        let token = self.next()?;
        let absent = token.is_terminator() || token.is(Type::LeftBrace) || token.is(Type::SemiColon);
        self.put_back(token);

        let expr = if absent { None } else { Some(self.condition()?) };
        if terminated {
            self.consume(Type::SemiColon, "expected ';' after for clause")?;
        }
        Ok(expr)
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth == PARSER_MAX_DEPTH {
            let token = self.next()?;
            return Err(Error::syntax(&token, "nesting too deep"));
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn next(&mut self) -> Result<Token, Error> {
        match self.pushback.pop() {
            Some(token) => Ok(token),
            None => Ok(self.lexer.next_token()?),
        }
    }

    fn put_back(&mut self, token: Token) {
        self.pushback.push(token);
    }

    fn match_one(&mut self, ty: Type) -> Result<Option<Token>, Error> {
        let token = self.next()?;
        if token.is(ty) {
            Ok(Some(token))
        } else {
            self.put_back(token);
            Ok(None)
        }
    }

    fn consume(&mut self, ty: Type, msg: &str) -> Result<Token, Error> {
        let token = self.next()?;
        if token.is(ty) {
            Ok(token)
        } else {
            Err(Error::syntax(&token, msg))
        }
    }
}

/// Parses `text` as a program. `file` and `row` are where locations start counting from.
#[instrument(level = "debug", skip(text))]
pub fn parse_str(text: &str, file: &str, row: usize) -> Result<List, Error> {
    let program = Parser::new(Lexer::new(text, file, row)).parse()?;
    debug!(statements = program.items.len(), "parsed");
    Ok(program)
}

fn invalid_literal(token: &Token) -> Error {
    Error::InvalidLiteral {
        loc: token.loc.clone(),
        text: token.text.clone(),
    }
}

fn integer(token: &Token) -> Result<i64, Error> {
    let text = token.text.as_str();
    let (digits, radix) = match text.get(..2) {
        Some("0x") => (&text[2..], 16),
        Some("0o") => (&text[2..], 8),
        Some("0b") => (&text[2..], 2),
        _ => (text, 10),
    };

    i64::from_str_radix(digits, radix).map_err(|_| invalid_literal(token))
}

// Strips the quotes and resolves backslash escapes. Unknown escapes stand for the escaped
// character itself.
fn unescape(text: &str) -> String {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text);

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }
    value
}
