use skiff_common::error::{Error, ErrorS, ResolveError};
use skiff_common::types::Span;

use rustc_hash::FxHashMap;
use skiff_syntax::ast::{Expr, ExprLambda, ExprS, Program, Stmt, StmtBlock, StmtFun, StmtS, Var};

/// Walks the AST and freezes every variable reference to the scope that
/// declares it, writing the frame distance into the reference in place.
/// The global scope is not represented on the stack; references that fall
/// off the bottom stay unannotated and resolve against the global frame
/// at runtime.
#[derive(Debug, Default)]
pub struct Resolver {
    scopes: Vec<FxHashMap<String, bool>>,
    errors: Vec<ErrorS>,
    function_depth: usize,
    loop_depth: usize,
}

impl Resolver {
    pub fn resolve(mut self, program: &mut Program) -> Vec<ErrorS> {
        for stmt_s in program.stmts.iter_mut() {
            self.resolve_stmt(stmt_s);
        }
        self.errors
    }

    fn resolve_stmt(&mut self, stmt_s: &mut StmtS) {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                self.begin_scope();
                for stmt_s in block.stmts.iter_mut() {
                    self.resolve_stmt(stmt_s);
                }
                self.end_scope();
            }
            Stmt::Break => {
                if self.loop_depth == 0 {
                    self.errors.push((Error::Resolve(ResolveError::BreakOutsideLoop), span.clone()));
                }
            }
            Stmt::Class(class) => {
                self.declare(&class.name, span);
                self.define(&class.name);
                self.begin_scope();
                self.declare("this", span);
                self.define("this");
                for (method, method_span) in class.methods.iter_mut() {
                    let StmtFun { params, body, .. } = method;
                    self.resolve_function(params, body, method_span);
                }
                self.end_scope();
            }
            Stmt::Continue => {
                if self.loop_depth == 0 {
                    self.errors
                        .push((Error::Resolve(ResolveError::ContinueOutsideLoop), span.clone()));
                }
            }
            Stmt::Expr(expr) => self.resolve_expr(&mut expr.value),
            Stmt::For(for_) => {
                self.begin_scope();
                if let Some(init) = &mut for_.init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = &mut for_.cond {
                    self.resolve_expr(cond);
                }
                if let Some(incr) = &mut for_.incr {
                    self.resolve_expr(incr);
                }
                self.loop_depth += 1;
                self.resolve_stmt(&mut for_.body);
                self.loop_depth -= 1;
                self.end_scope();
            }
            Stmt::Fun(fun) => {
                self.declare(&fun.name, span);
                self.define(&fun.name);
                let StmtFun { params, body, .. } = &mut **fun;
                self.resolve_function(params, body, span);
            }
            Stmt::If(if_) => {
                self.resolve_expr(&mut if_.cond);
                self.resolve_stmt(&mut if_.then);
                if let Some(else_) = &mut if_.else_ {
                    self.resolve_stmt(else_);
                }
            }
            Stmt::Print(print) => self.resolve_expr(&mut print.value),
            Stmt::Return(return_) => {
                if self.function_depth == 0 {
                    self.errors
                        .push((Error::Resolve(ResolveError::ReturnOutsideFunction), span.clone()));
                }
                if let Some(value) = &mut return_.value {
                    self.resolve_expr(value);
                }
            }
            Stmt::Var(var) => {
                self.declare(&var.name, span);
                if let Some(value) = &mut var.value {
                    self.resolve_expr(value);
                }
                self.define(&var.name);
            }
            Stmt::While(while_) => {
                self.resolve_expr(&mut while_.cond);
                self.loop_depth += 1;
                self.resolve_stmt(&mut while_.body);
                self.loop_depth -= 1;
            }
        }
    }

    fn resolve_expr(&mut self, expr_s: &mut ExprS) {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                self.resolve_expr(&mut assign.value);
                self.access(&mut assign.var);
            }
            Expr::Call(call) => {
                self.resolve_expr(&mut call.callee);
                for arg in call.args.iter_mut() {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get(get) => self.resolve_expr(&mut get.object),
            Expr::Infix(infix) => {
                self.resolve_expr(&mut infix.lt);
                self.resolve_expr(&mut infix.rt);
            }
            Expr::Lambda(lambda) => {
                let ExprLambda { params, body } = &mut **lambda;
                self.resolve_function(params, body, span);
            }
            Expr::Literal(_) => {}
            Expr::Prefix(prefix) => self.resolve_expr(&mut prefix.rt),
            Expr::Set(set) => {
                self.resolve_expr(&mut set.object);
                self.resolve_expr(&mut set.value);
            }
            Expr::Ternary(ternary) => {
                self.resolve_expr(&mut ternary.cond);
                self.resolve_expr(&mut ternary.then);
                self.resolve_expr(&mut ternary.else_);
            }
            Expr::Var(var) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&var.var.name) == Some(&false) {
                        self.errors
                            .push((Error::Resolve(ResolveError::ReadInInitializer), span.clone()));
                        return;
                    }
                }
                self.access(&mut var.var);
            }
        }
    }

    fn resolve_function(&mut self, params: &[String], body: &mut StmtBlock, span: &Span) {
        self.function_depth += 1;
        // A loop outside the function must not license `break` inside it.
        let enclosing_loops = std::mem::take(&mut self.loop_depth);
        self.begin_scope();
        for param in params {
            self.declare(param, span);
            self.define(param);
        }
        for stmt_s in body.stmts.iter_mut() {
            self.resolve_stmt(stmt_s);
        }
        self.end_scope();
        self.loop_depth = enclosing_loops;
        self.function_depth -= 1;
    }

    fn declare(&mut self, name: &str, span: &Span) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                self.errors.push((Error::Resolve(ResolveError::AlreadyDeclared), span.clone()));
            } else {
                scope.insert(name.to_string(), false);
            }
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn access(&mut self, var: &mut Var) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&var.name) {
                var.depth = Some(depth);
                return;
            }
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop().unwrap_or_else(|| unreachable!("attempted to pop the global scope"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use skiff_syntax::ast::{StmtExpr, StmtPrint, StmtVar};

    fn resolve_ok(source: &str) -> Program {
        let mut program = skiff_syntax::parse(source).expect("program should parse");
        let errors = Resolver::default().resolve(&mut program);
        assert_eq!(errors, Vec::new());
        program
    }

    fn resolve_errs(source: &str) -> Vec<Error> {
        let mut program = skiff_syntax::parse(source).expect("program should parse");
        Resolver::default().resolve(&mut program).into_iter().map(|(err, _)| err).collect()
    }

    fn block_stmts(stmt: &Stmt) -> &[StmtS] {
        match stmt {
            Stmt::Block(block) => &block.stmts,
            stmt => panic!("expected block, got: {:?}", stmt),
        }
    }

    fn printed_var(stmt: &Stmt) -> &Var {
        match stmt {
            Stmt::Print(StmtPrint { value: (Expr::Var(var), _) }) => &var.var,
            stmt => panic!("expected print of a variable, got: {:?}", stmt),
        }
    }

    #[test]
    fn local_read_gets_depth() {
        let program = resolve_ok("{ var a = 1; { print a; } }");
        let outer = block_stmts(&program.stmts[0].0);
        let inner = block_stmts(&outer[1].0);
        assert_eq!(printed_var(&inner[0].0).depth, Some(1));
    }

    #[test]
    fn global_read_stays_unannotated() {
        let program = resolve_ok("var a = 1; { print a; }");
        let inner = block_stmts(&program.stmts[1].0);
        assert_eq!(printed_var(&inner[0].0).depth, None);
    }

    #[test]
    fn closure_binds_declarations_in_force() {
        // The body of `show` is resolved before `a` exists in the block
        // scope, so the reference must stay global even though a local
        // `a` appears later.
        let program = resolve_ok("{ fun show() { print a; } var a = 1; }");
        let outer = block_stmts(&program.stmts[0].0);
        let fun = match &outer[0].0 {
            Stmt::Fun(fun) => fun,
            stmt => panic!("expected function, got: {:?}", stmt),
        };
        assert_eq!(printed_var(&fun.body.stmts[0].0).depth, None);
    }

    #[test]
    fn captured_local_counts_frames() {
        let program = resolve_ok("fun outer() { var i = 0; fun inner() { print i; } }");
        let outer = match &program.stmts[0].0 {
            Stmt::Fun(fun) => fun,
            stmt => panic!("expected function, got: {:?}", stmt),
        };
        let inner = match &outer.body.stmts[1].0 {
            Stmt::Fun(fun) => fun,
            stmt => panic!("expected function, got: {:?}", stmt),
        };
        assert_eq!(printed_var(&inner.body.stmts[0].0).depth, Some(1));
    }

    #[test]
    fn this_resolves_through_binding_frame() {
        let program = resolve_ok("class C { m() { print this; } }");
        let class = match &program.stmts[0].0 {
            Stmt::Class(class) => class,
            stmt => panic!("expected class, got: {:?}", stmt),
        };
        let (method, _) = &class.methods[0];
        assert_eq!(printed_var(&method.body.stmts[0].0).depth, Some(1));
    }

    #[test]
    fn assignment_target_gets_depth() {
        let program = resolve_ok("{ var a = 1; a = 2; }");
        let outer = block_stmts(&program.stmts[0].0);
        let var = match &outer[1].0 {
            Stmt::Expr(StmtExpr { value: (Expr::Assign(assign), _) }) => &assign.var,
            stmt => panic!("expected assignment, got: {:?}", stmt),
        };
        assert_eq!(var.depth, Some(0));
    }

    #[test]
    fn initializer_in_own_scope_is_rejected() {
        assert_eq!(
            resolve_errs("var a = \"outer\"; { var a = a; }"),
            vec![Error::Resolve(ResolveError::ReadInInitializer)]
        );
    }

    #[test]
    fn duplicate_local_is_rejected() {
        assert_eq!(
            resolve_errs("{ var a = 1; var a = 2; }"),
            vec![Error::Resolve(ResolveError::AlreadyDeclared)]
        );
    }

    #[test]
    fn duplicate_global_is_left_to_runtime() {
        assert_eq!(resolve_errs("var a = 1;"), Vec::new());
        let program = resolve_ok("var a = 1; var b = 2;");
        assert!(matches!(&program.stmts[0].0, Stmt::Var(StmtVar { .. })));
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        assert_eq!(
            resolve_errs("fun f(a, a) {}"),
            vec![Error::Resolve(ResolveError::AlreadyDeclared)]
        );
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert_eq!(
            resolve_errs("return 1;"),
            vec![Error::Resolve(ResolveError::ReturnOutsideFunction)]
        );
    }

    #[test]
    fn stray_loop_signals_are_rejected() {
        assert_eq!(resolve_errs("break;"), vec![Error::Resolve(ResolveError::BreakOutsideLoop)]);
        assert_eq!(
            resolve_errs("while (true) { fun f() { continue; } }"),
            vec![Error::Resolve(ResolveError::ContinueOutsideLoop)]
        );
        assert_eq!(resolve_errs("while (true) break;"), Vec::new());
    }
}
