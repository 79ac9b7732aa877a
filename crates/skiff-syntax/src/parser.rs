use skiff_common::error::{Error, ErrorS, ParseError};
use skiff_common::types::{Span, Spanned};

use crate::ast::{
    Expr, ExprAssign, ExprCall, ExprGet, ExprInfix, ExprLambda, ExprLiteral, ExprPrefix, ExprS,
    ExprSet, ExprTernary, ExprVar, OpInfix, OpPrefix, Program, Stmt, StmtBlock, StmtClass,
    StmtExpr, StmtFor, StmtFun, StmtIf, StmtPrint, StmtReturn, StmtS, StmtVar, StmtWhile, Var,
};
use crate::lexer::Token;

const MAX_ARGS: usize = 255;
const MAX_PARAMS: usize = 255;

/// Recursive-descent parser over the lexed token vector. Errors are
/// collected: a broken statement is abandoned, the parser synchronizes to
/// the next statement boundary and keeps going, and the program is only
/// returned when no diagnostics were recorded.
pub struct Parser {
    tokens: Vec<Spanned<Token>>,
    current: usize,
    errors: Vec<ErrorS>,
    eof: Span,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Token>>, source_len: usize) -> Self {
        Self { tokens, current: 0, errors: Vec::new(), eof: source_len..source_len }
    }

    pub fn parse(mut self) -> Result<Program, Vec<ErrorS>> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        if self.errors.is_empty() {
            Ok(Program { stmts })
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) -> Option<StmtS> {
        let result = match self.peek() {
            Some(Token::Class) => self.class_declaration(),
            Some(Token::Fun) if matches!(self.peek_next(), Some(Token::Identifier(_))) => {
                self.fun_declaration()
            }
            Some(Token::Var) => self.var_declaration(),
            _ => self.statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.errors.push(err);
                self.synchronize();
                None
            }
        }
    }

    /// Skips tokens until just past a `;` or up to a token that can begin
    /// a declaration, so that one syntax error does not cascade.
    fn synchronize(&mut self) {
        while let Some((token, _)) = self.tokens.get(self.current) {
            match token {
                Token::Semicolon => {
                    self.current += 1;
                    return;
                }
                Token::Class
                | Token::Fun
                | Token::Var
                | Token::For
                | Token::If
                | Token::While
                | Token::Print
                | Token::Return => return,
                _ => self.current += 1,
            }
        }
    }

    fn class_declaration(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let (name, _) = self.eat_identifier("class name")?;
        self.eat(Token::LtBrace, "'{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            methods.push(self.function("method name", "'(' after method name")?);
        }
        let end = self.eat(Token::RtBrace, "'}' after class body")?;
        Ok((Stmt::Class(StmtClass { name, methods }), start..end.end))
    }

    fn fun_declaration(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let (fun, span) = self.function("function name", "'(' after function name")?;
        Ok((Stmt::Fun(Box::new(fun)), start..span.end))
    }

    fn function(
        &mut self,
        name_msg: &'static str,
        paren_msg: &'static str,
    ) -> Result<Spanned<StmtFun>, ErrorS> {
        let (name, name_span) = self.eat_identifier(name_msg)?;
        let params = self.params(paren_msg)?;
        self.eat(Token::LtBrace, "'{' before body")?;
        let (body, end) = self.block_raw()?;
        Ok((StmtFun { name, params, body }, name_span.start..end.end))
    }

    fn params(&mut self, paren_msg: &'static str) -> Result<Vec<String>, ErrorS> {
        self.eat(Token::LtParen, paren_msg)?;
        let mut params = Vec::new();
        if !self.check(&Token::RtParen) {
            loop {
                if params.len() == MAX_PARAMS {
                    self.errors.push((Error::Parse(ParseError::TooManyParams), self.peek_span()));
                }
                let (param, _) = self.eat_identifier("parameter name")?;
                params.push(param);
                if !self.advance_if(&Token::Comma) {
                    break;
                }
            }
        }
        self.eat(Token::RtParen, "')' after parameters")?;
        Ok(params)
    }

    fn var_declaration(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let (name, _) = self.eat_identifier("variable name")?;
        let value =
            if self.advance_if(&Token::Equal) { Some(self.expression()?) } else { None };
        let end = self.eat(Token::Semicolon, "';' after variable declaration")?;
        Ok((Stmt::Var(StmtVar { name, value }), start..end.end))
    }

    fn statement(&mut self) -> Result<StmtS, ErrorS> {
        match self.peek() {
            Some(Token::Break) => self.break_statement(),
            Some(Token::Continue) => self.continue_statement(),
            Some(Token::For) => self.for_statement(),
            Some(Token::If) => self.if_statement(),
            Some(Token::LtBrace) => self.block_statement(),
            Some(Token::Print) => self.print_statement(),
            Some(Token::Return) => self.return_statement(),
            Some(Token::While) => self.while_statement(),
            _ => self.expr_statement(),
        }
    }

    fn break_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let end = self.eat(Token::Semicolon, "';' after 'break'")?;
        Ok((Stmt::Break, start..end.end))
    }

    fn continue_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let end = self.eat(Token::Semicolon, "';' after 'continue'")?;
        Ok((Stmt::Continue, start..end.end))
    }

    fn for_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        self.eat(Token::LtParen, "'(' after 'for'")?;

        let init = if self.advance_if(&Token::Semicolon) {
            None
        } else if self.check(&Token::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expr_statement()?)
        };

        let cond = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
        self.eat(Token::Semicolon, "';' after loop condition")?;

        let incr = if self.check(&Token::RtParen) { None } else { Some(self.expression()?) };
        self.eat(Token::RtParen, "')' after for clauses")?;

        let body = self.statement()?;
        let span = start..body.1.end;
        Ok((Stmt::For(Box::new(StmtFor { init, cond, incr, body })), span))
    }

    fn if_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        self.eat(Token::LtParen, "'(' after 'if'")?;
        let cond = self.expression()?;
        self.eat(Token::RtParen, "')' after condition")?;
        let then = self.statement()?;
        let else_ =
            if self.advance_if(&Token::Else) { Some(self.statement()?) } else { None };
        let end = else_.as_ref().map(|(_, span)| span.end).unwrap_or(then.1.end);
        Ok((Stmt::If(Box::new(StmtIf { cond, then, else_ })), start..end))
    }

    fn block_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let (block, end) = self.block_raw()?;
        Ok((Stmt::Block(block), start..end.end))
    }

    /// Parses declarations up to the closing `}`; the opening `{` has
    /// already been consumed by the caller.
    fn block_raw(&mut self) -> Result<(StmtBlock, Span), ErrorS> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        let end = self.eat(Token::RtBrace, "'}' after block")?;
        Ok((StmtBlock { stmts }, end))
    }

    fn print_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let value = self.expression()?;
        let end = self.eat(Token::Semicolon, "';' after value")?;
        Ok((Stmt::Print(StmtPrint { value }), start..end.end))
    }

    fn return_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        let value = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
        let end = self.eat(Token::Semicolon, "';' after return value")?;
        Ok((Stmt::Return(StmtReturn { value }), start..end.end))
    }

    fn while_statement(&mut self) -> Result<StmtS, ErrorS> {
        let start = self.advance_span().start;
        self.eat(Token::LtParen, "'(' after 'while'")?;
        let cond = self.expression()?;
        self.eat(Token::RtParen, "')' after condition")?;
        let body = self.statement()?;
        let span = start..body.1.end;
        Ok((Stmt::While(Box::new(StmtWhile { cond, body })), span))
    }

    fn expr_statement(&mut self) -> Result<StmtS, ErrorS> {
        let value = self.expression()?;
        let start = value.1.start;
        let end = self.eat(Token::Semicolon, "';' after expression")?;
        Ok((Stmt::Expr(StmtExpr { value }), start..end.end))
    }

    fn expression(&mut self) -> Result<ExprS, ErrorS> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprS, ErrorS> {
        let expr = self.logic_or()?;
        if self.check(&Token::Equal) {
            let equal_span = self.advance_span();
            let value = self.assignment()?;
            let span = expr.1.start..value.1.end;
            return match expr.0 {
                // `this` reads like a variable but is not a binding slot.
                Expr::Var(var) if var.var.name != "this" => {
                    Ok((Expr::Assign(Box::new(ExprAssign { var: var.var, value })), span))
                }
                Expr::Get(get) => {
                    let get = *get;
                    Ok((
                        Expr::Set(Box::new(ExprSet {
                            object: get.object,
                            name: get.name,
                            value,
                        })),
                        span,
                    ))
                }
                _ => Err((Error::Parse(ParseError::InvalidAssignmentTarget), equal_span)),
            };
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.logic_and()?;
        while self.advance_if(&Token::Or) {
            let rt = self.logic_and()?;
            expr = infix(expr, OpInfix::LogicOr, rt);
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.ternary()?;
        while self.advance_if(&Token::And) {
            let rt = self.ternary()?;
            expr = infix(expr, OpInfix::LogicAnd, rt);
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> Result<ExprS, ErrorS> {
        let cond = self.equality()?;
        if self.advance_if(&Token::Question) {
            let then = self.equality()?;
            self.eat(Token::Colon, "':' after then branch")?;
            let else_ = self.equality()?;
            let span = cond.1.start..else_.1.end;
            return Ok((Expr::Ternary(Box::new(ExprTernary { cond, then, else_ })), span));
        }
        Ok(cond)
    }

    fn equality(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.comparison()?;
        while let Some(op) = self.infix_op(&[
            (Token::BangEqual, OpInfix::NotEqual),
            (Token::EqualEqual, OpInfix::Equal),
        ]) {
            let rt = self.comparison()?;
            expr = infix(expr, op, rt);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.term()?;
        while let Some(op) = self.infix_op(&[
            (Token::Greater, OpInfix::Greater),
            (Token::GreaterEqual, OpInfix::GreaterEqual),
            (Token::Less, OpInfix::Less),
            (Token::LessEqual, OpInfix::LessEqual),
            (Token::EqualEqual, OpInfix::Equal),
        ]) {
            let rt = self.term()?;
            expr = infix(expr, op, rt);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.factor()?;
        while let Some(op) =
            self.infix_op(&[(Token::Plus, OpInfix::Add), (Token::Minus, OpInfix::Subtract)])
        {
            let rt = self.factor()?;
            expr = infix(expr, op, rt);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.unary()?;
        while let Some(op) = self.infix_op(&[
            (Token::Asterisk, OpInfix::Multiply),
            (Token::Slash, OpInfix::Divide),
        ]) {
            let rt = self.unary()?;
            expr = infix(expr, op, rt);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<ExprS, ErrorS> {
        let op = match self.peek() {
            Some(Token::Bang) => Some(OpPrefix::Not),
            Some(Token::Minus) => Some(OpPrefix::Negate),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance_span().start;
            let rt = self.unary()?;
            let span = start..rt.1.end;
            return Ok((Expr::Prefix(Box::new(ExprPrefix { op, rt })), span));
        }
        self.lambda()
    }

    fn lambda(&mut self) -> Result<ExprS, ErrorS> {
        if self.check(&Token::Fun) {
            let start = self.advance_span().start;
            let params = self.params("'(' after 'fun'")?;
            self.eat(Token::LtBrace, "'{' before body")?;
            let (body, end) = self.block_raw()?;
            return Ok((Expr::Lambda(Box::new(ExprLambda { params, body })), start..end.end));
        }
        self.call()
    }

    fn call(&mut self) -> Result<ExprS, ErrorS> {
        let mut expr = self.primary()?;
        loop {
            if self.advance_if(&Token::LtParen) {
                let mut args = Vec::new();
                if !self.check(&Token::RtParen) {
                    loop {
                        if args.len() == MAX_ARGS {
                            self.errors
                                .push((Error::Parse(ParseError::TooManyArgs), self.peek_span()));
                        }
                        args.push(self.expression()?);
                        if !self.advance_if(&Token::Comma) {
                            break;
                        }
                    }
                }
                let end = self.eat(Token::RtParen, "')' after arguments")?;
                let span = expr.1.start..end.end;
                expr = (Expr::Call(Box::new(ExprCall { callee: expr, args })), span);
            } else if self.advance_if(&Token::Dot) {
                let (name, name_span) = self.eat_identifier("property name after '.'")?;
                let span = expr.1.start..name_span.end;
                expr = (Expr::Get(Box::new(ExprGet { object: expr, name })), span);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<ExprS, ErrorS> {
        let (token, span) = match self.tokens.get(self.current) {
            Some(spanned) => spanned.clone(),
            None => {
                return Err((Error::Parse(ParseError::ExpectedExpression), self.eof.clone()))
            }
        };
        let expr = match token {
            Token::False => Expr::Literal(ExprLiteral::Bool(false)),
            Token::True => Expr::Literal(ExprLiteral::Bool(true)),
            Token::Null => Expr::Literal(ExprLiteral::Nil),
            Token::Number(number) => Expr::Literal(ExprLiteral::Number(number)),
            Token::String(string) => Expr::Literal(ExprLiteral::String(string)),
            Token::Identifier(name) => Expr::Var(ExprVar { var: Var { name, depth: None } }),
            Token::This => {
                Expr::Var(ExprVar { var: Var { name: "this".to_string(), depth: None } })
            }
            Token::LtParen => {
                self.current += 1;
                let (expr, _) = self.expression()?;
                let end = self.eat(Token::RtParen, "')' after expression")?;
                return Ok((expr, span.start..end.end));
            }
            _ => return Err((Error::Parse(ParseError::ExpectedExpression), span)),
        };
        self.current += 1;
        Ok((expr, span))
    }

    fn infix_op(&mut self, ops: &[(Token, OpInfix)]) -> Option<OpInfix> {
        for (token, op) in ops {
            if self.advance_if(token) {
                return Some(*op);
            }
        }
        None
    }

    fn eat(&mut self, token: Token, expected: &'static str) -> Result<Span, ErrorS> {
        if self.check(&token) {
            Ok(self.advance_span())
        } else {
            Err((Error::Parse(ParseError::ExpectedToken(expected)), self.peek_span()))
        }
    }

    fn eat_identifier(&mut self, expected: &'static str) -> Result<Spanned<String>, ErrorS> {
        match self.tokens.get(self.current) {
            Some((Token::Identifier(name), span)) => {
                let spanned = (name.clone(), span.clone());
                self.current += 1;
                Ok(spanned)
            }
            _ => Err((Error::Parse(ParseError::ExpectedToken(expected)), self.peek_span())),
        }
    }

    /// Consumes the current token when it matches; `check` + bump.
    fn advance_if(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the current token unconditionally and returns its span.
    /// Callers only use this when `peek` already identified the token.
    fn advance_span(&mut self) -> Span {
        let span = self.peek_span();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        span
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|(token, _)| token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1).map(|(token, _)| token)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.current).map(|(_, span)| span.clone()).unwrap_or(self.eof.clone())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }
}

fn infix(lt: ExprS, op: OpInfix, rt: ExprS) -> ExprS {
    let span = lt.1.start..rt.1.end;
    (Expr::Infix(Box::new(ExprInfix { lt, op, rt })), span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("program should parse")
    }

    fn parse_err(source: &str) -> Vec<ErrorS> {
        parse(source).expect_err("program should not parse")
    }

    #[test]
    fn parse_precedence() {
        let program = parse_ok("1 + 2 * 3;");
        let (stmt, _) = &program.stmts[0];
        let infix = match stmt {
            Stmt::Expr(StmtExpr { value: (Expr::Infix(infix), _) }) => infix,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert_eq!(infix.op, OpInfix::Add);
        assert!(matches!(&infix.rt.0, Expr::Infix(mul) if mul.op == OpInfix::Multiply));
    }

    #[test]
    fn parse_equality_binds_at_comparison() {
        // `==` is accepted at the comparison level, so a chain associates
        // left to right: (2 > 1) == 0.
        let program = parse_ok("2 > 1 == 0;");
        let (stmt, _) = &program.stmts[0];
        let infix = match stmt {
            Stmt::Expr(StmtExpr { value: (Expr::Infix(infix), _) }) => infix,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert_eq!(infix.op, OpInfix::Equal);
        assert!(matches!(&infix.lt.0, Expr::Infix(cmp) if cmp.op == OpInfix::Greater));
    }

    #[test]
    fn parse_ternary() {
        let program = parse_ok("print a == 1 ? \"one\" : \"many\";");
        let (stmt, _) = &program.stmts[0];
        let ternary = match stmt {
            Stmt::Print(StmtPrint { value: (Expr::Ternary(ternary), _) }) => ternary,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert!(matches!(&ternary.cond.0, Expr::Infix(eq) if eq.op == OpInfix::Equal));
        assert!(matches!(&ternary.then.0, Expr::Literal(ExprLiteral::String(_))));
    }

    #[test]
    fn parse_grouping_folds_to_inner() {
        let program = parse_ok("(1 + 2) * 3;");
        let (stmt, _) = &program.stmts[0];
        let infix = match stmt {
            Stmt::Expr(StmtExpr { value: (Expr::Infix(infix), _) }) => infix,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert_eq!(infix.op, OpInfix::Multiply);
        assert!(matches!(&infix.lt.0, Expr::Infix(add) if add.op == OpInfix::Add));
        // The folded grouping keeps the parenthesized span.
        assert_eq!(infix.lt.1, 0..7);
    }

    #[test]
    fn parse_assignment_targets() {
        let program = parse_ok("a = 1; a.b = 2;");
        assert!(matches!(
            &program.stmts[0].0,
            Stmt::Expr(StmtExpr { value: (Expr::Assign(_), _) })
        ));
        assert!(matches!(
            &program.stmts[1].0,
            Stmt::Expr(StmtExpr { value: (Expr::Set(_), _) })
        ));
    }

    #[test]
    fn parse_invalid_assignment_target() {
        let errors = parse_err("a + b = 1;");
        assert_eq!(
            errors,
            vec![(Error::Parse(ParseError::InvalidAssignmentTarget), 6..7)]
        );
    }

    #[test]
    fn parse_fun_declaration_vs_lambda() {
        let program = parse_ok("fun named() {} var f = fun (x) { return x; };");
        assert!(matches!(&program.stmts[0].0, Stmt::Fun(fun) if fun.name == "named"));
        let lambda = match &program.stmts[1].0 {
            Stmt::Var(StmtVar { value: Some((Expr::Lambda(lambda), _)), .. }) => lambda,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert_eq!(lambda.params, vec!["x".to_string()]);
    }

    #[test]
    fn parse_for_keeps_distinct_node() {
        let program = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        let for_ = match &program.stmts[0].0 {
            Stmt::For(for_) => for_,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert!(matches!(&for_.init, Some((Stmt::Var(_), _))));
        assert!(for_.cond.is_some());
        assert!(for_.incr.is_some());
    }

    #[test]
    fn parse_for_empty_clauses() {
        let program = parse_ok("for (;;) break;");
        let for_ = match &program.stmts[0].0 {
            Stmt::For(for_) => for_,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert!(for_.init.is_none());
        assert!(for_.cond.is_none());
        assert!(for_.incr.is_none());
        assert!(matches!(for_.body.0, Stmt::Break));
    }

    #[test]
    fn parse_synchronizes_and_collects() {
        let errors = parse_err("var = 1;\nprint \"ok\";\nvar x = ;\n");
        assert_eq!(
            errors,
            vec![
                (Error::Parse(ParseError::ExpectedToken("variable name")), 4..5),
                (Error::Parse(ParseError::ExpectedExpression), 29..30),
            ]
        );
    }

    #[test]
    fn parse_error_at_end() {
        let errors = parse_err("{ print 1;");
        assert_eq!(
            errors,
            vec![(Error::Parse(ParseError::ExpectedToken("'}' after block")), 10..10)]
        );
    }

    #[test]
    fn parse_too_many_args() {
        let mut source = String::from("f(");
        for i in 0..256 {
            if i > 0 {
                source.push_str(", ");
            }
            source.push('0');
        }
        source.push_str(");");
        let errors = parse_err(&source);
        assert!(errors
            .iter()
            .any(|(err, _)| matches!(err, Error::Parse(ParseError::TooManyArgs))));
    }

    #[test]
    fn parse_property_chains() {
        let program = parse_ok("a.b.c(1).d;");
        let get = match &program.stmts[0].0 {
            Stmt::Expr(StmtExpr { value: (Expr::Get(get), _) }) => get,
            stmt => panic!("unexpected statement: {:?}", stmt),
        };
        assert_eq!(get.name, "d");
        assert!(matches!(&get.object.0, Expr::Call(_)));
    }
}
