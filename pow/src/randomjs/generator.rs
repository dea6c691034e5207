//! Grammar Generator
//!
//! Builds expression and statement trees from a random source. Two budgets
//! are threaded through every call: the remaining statement nesting depth and
//! the remaining expression depth. When a budget reaches zero only the
//! alternatives that do not spend it stay eligible, so generation terminates
//! for any configuration.

use crate::randomjs::ast::{Block, Expr, FunctionExpr, Literal, Statement};
use crate::randomjs::blake2b::RandomSource;
use crate::randomjs::config::{GrammarTables, ProgramOptions};
use crate::randomjs::error::TableError;
use crate::randomjs::globals::GlobalHelper;
use crate::randomjs::operators::{ExprKind, LiteralKind, OperatorRequirement, StatementKind};
use crate::randomjs::scope::{ScopeId, ScopeKind, ScopeTree};

type GenResult<T> = Result<T, TableError>;

/// Requirement bits that constrain an operand value
const OPERAND_MASK: OperatorRequirement = OperatorRequirement::NUMERIC_ONLY
    .union(OperatorRequirement::RHS_NONZERO)
    .union(OperatorRequirement::RHS_NONNEGATIVE);

/// Recursive tree builder for one program
pub struct Generator<'a, R> {
    rng: R,
    tables: &'a GrammarTables,
    options: &'a ProgramOptions,
    scopes: ScopeTree,
}

impl<'a, R: RandomSource> Generator<'a, R> {
    pub fn new(rng: R, tables: &'a GrammarTables, options: &'a ProgramOptions) -> Self {
        Self {
            rng,
            tables,
            options,
            scopes: ScopeTree::new(),
        }
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    pub fn into_scopes(self) -> ScopeTree {
        self.scopes
    }

    /// Uniform count in `[min, max]`
    pub fn count(&mut self, min: u32, max: u32) -> u32 {
        min + self.rng.gen_below(max.saturating_sub(min) + 1)
    }

    /// Generate an expression.
    ///
    /// `depth` is the remaining expression depth, `stmt_depth` the statement
    /// depth available to function bodies, `req` the constraint the value
    /// must satisfy. The caller still coerces the result through [`Self::operand`]
    /// when the constraint is not met by construction.
    pub fn expression(
        &mut self,
        scope: ScopeId,
        depth: u32,
        stmt_depth: u32,
        req: OperatorRequirement,
    ) -> GenResult<Expr> {
        let has_vars = !self.scopes.visible(scope).is_empty();
        let numeric = req.intersects(OPERAND_MASK);
        let kind = self.tables.expressions.choose_where(&mut self.rng, |k| match k {
            k if depth == 0 && !k.is_terminal() => false,
            ExprKind::Literal | ExprKind::Unary | ExprKind::Binary | ExprKind::Ternary => true,
            ExprKind::Variable | ExprKind::Assignment | ExprKind::Invocation => has_vars,
            ExprKind::Function => stmt_depth > 0 && !numeric,
        })?;
        let sub = depth.saturating_sub(1);

        let expr = match kind {
            ExprKind::Literal => Expr::Literal(self.literal(req)?),
            ExprKind::Variable => Expr::Variable(self.pick_variable(scope)),
            ExprKind::Function => Expr::Function(Box::new(self.function(scope, stmt_depth, req)?)),
            ExprKind::Unary => {
                let op = self.tables.unary.choose(&mut self.rng)?;
                let r = op.requirement();
                let operand = self.operand(scope, sub, stmt_depth, r & OPERAND_MASK)?;
                let expr = Expr::Unary {
                    op,
                    operand: Box::new(operand),
                };
                self.precision(scope, expr, r)
            }
            ExprKind::Binary => {
                let op = self.tables.binary.choose(&mut self.rng)?;
                let r = op.requirement();
                let lhs = self.operand(scope, sub, stmt_depth, r & OperatorRequirement::NUMERIC_ONLY)?;
                let rhs = self.operand(scope, sub, stmt_depth, r & OPERAND_MASK)?;
                let expr = Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                self.precision(scope, expr, r)
            }
            ExprKind::Ternary => {
                let cond = self.expression(scope, sub, stmt_depth, OperatorRequirement::empty())?;
                let then = self.expression(scope, sub, stmt_depth, req)?;
                let otherwise = self.expression(scope, sub, stmt_depth, req)?;
                Expr::Ternary {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                }
            }
            ExprKind::Assignment => {
                let op = self.tables.assignment.choose(&mut self.rng)?;
                let r = op.requirement();
                let target = self.pick_variable(scope);
                let value = if r.contains(OperatorRequirement::WITHOUT_RHS) {
                    None
                } else {
                    Some(Box::new(self.operand(scope, sub, stmt_depth, r & OPERAND_MASK)?))
                };
                Expr::Assignment { op, target, value }
            }
            ExprKind::Invocation => {
                self.scopes.require(scope, GlobalHelper::Invoke);
                let target = self.pick_variable(scope);
                let argc = self.rng.gen_below(self.options.max_call_arguments + 1);
                let mut args = Vec::with_capacity(argc as usize);
                for _ in 0..argc {
                    args.push(self.expression(scope, sub, stmt_depth, OperatorRequirement::empty())?);
                }
                Expr::Invocation { target, args }
            }
        };
        Ok(expr)
    }

    /// Generate an expression and coerce it to satisfy `req`
    pub fn operand(
        &mut self,
        scope: ScopeId,
        depth: u32,
        stmt_depth: u32,
        req: OperatorRequirement,
    ) -> GenResult<Expr> {
        let expr = self.expression(scope, depth, stmt_depth, req)?;
        Ok(self.coerce(scope, expr, req))
    }

    /// Wrap `expr` in the helper enforcing `req`, unless it is a literal that
    /// already satisfies it
    pub fn coerce(&mut self, scope: ScopeId, expr: Expr, req: OperatorRequirement) -> Expr {
        let numeric_literal = matches!(&expr, Expr::Literal(l) if l.is_numeric());
        let satisfied = |check: fn(&Literal) -> bool| match &expr {
            Expr::Literal(l) => l.is_numeric() && check(l),
            _ => false,
        };

        let nonzero = satisfied(|l| !l.is_zero());
        let nonnegative = satisfied(|l| !l.is_negative());

        let helper = if req.contains(OperatorRequirement::RHS_NONZERO) && !nonzero {
            Some(GlobalHelper::NonZero)
        } else if req.contains(OperatorRequirement::RHS_NONNEGATIVE) && !nonnegative {
            Some(GlobalHelper::NonNegative)
        } else if req.contains(OperatorRequirement::NUMERIC_ONLY) && !numeric_literal {
            Some(GlobalHelper::Numeric)
        } else {
            None
        };

        match helper {
            Some(helper) => {
                self.scopes.require(scope, helper);
                Expr::Helper {
                    helper,
                    arg: Box::new(expr),
                }
            }
            None => expr,
        }
    }

    fn precision(&mut self, scope: ScopeId, expr: Expr, r: OperatorRequirement) -> Expr {
        if r.contains(OperatorRequirement::LIMITED_PRECISION) {
            self.scopes.require(scope, GlobalHelper::Precision);
            Expr::Helper {
                helper: GlobalHelper::Precision,
                arg: Box::new(expr),
            }
        } else {
            expr
        }
    }

    /// Only called when at least one variable is visible
    fn pick_variable(&mut self, scope: ScopeId) -> String {
        let visible = self.scopes.visible(scope);
        let index = self.rng.gen_below(visible.len() as u32) as usize;
        self.scopes.name(visible[index]).to_string()
    }

    /// Generate a literal compatible with `req`
    pub fn literal(&mut self, req: OperatorRequirement) -> GenResult<Literal> {
        let numeric = req.intersects(OPERAND_MASK);
        let kind = self
            .tables
            .literals
            .choose_where(&mut self.rng, |k| !numeric || k.is_numeric())?;
        let range = self.options.integer_range;

        let literal = match kind {
            LiteralKind::Integer => {
                let mut n = self.rng.gen_range(-range, range);
                if req.contains(OperatorRequirement::RHS_NONNEGATIVE) {
                    n = n.saturating_abs();
                }
                if req.contains(OperatorRequirement::RHS_NONZERO) && n == 0 {
                    n = 1;
                }
                Literal::Integer(n)
            }
            LiteralKind::Decimal => {
                let whole = self.rng.gen_range(-range, range) as i64;
                let mut milli = whole * 1000 + self.rng.gen_below(1000) as i64;
                if req.contains(OperatorRequirement::RHS_NONNEGATIVE) {
                    milli = milli.abs();
                }
                if req.contains(OperatorRequirement::RHS_NONZERO) && milli == 0 {
                    milli = 1000;
                }
                Literal::Decimal(milli)
            }
            LiteralKind::String => {
                let len = self.rng.gen_below(self.options.max_string_length + 1);
                let text = (0..len)
                    .map(|_| char::from(b'a' + self.rng.gen_below(26) as u8))
                    .collect();
                Literal::String(text)
            }
            LiteralKind::Boolean => Literal::Boolean(self.rng.gen_bool(0.5)),
        };
        Ok(literal)
    }

    /// Generate a function expression in a fresh child scope of `scope`
    pub fn function(
        &mut self,
        scope: ScopeId,
        stmt_depth: u32,
        req: OperatorRequirement,
    ) -> GenResult<FunctionExpr> {
        let body_depth = stmt_depth.saturating_sub(1);
        let fscope = self.scopes.open(scope, ScopeKind::Function);

        let count = self.rng.gen_below(self.options.max_function_parameters + 1);
        let mut params = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = self.scopes.declare(fscope);
            params.push(self.scopes.name(id).to_string());
        }

        let body = self.block(fscope, body_depth)?;
        let default_return = if body.exits() {
            None
        } else {
            let depth = self.options.max_expression_depth;
            Some(self.operand(fscope, depth, body_depth, req)?)
        };

        Ok(FunctionExpr {
            params,
            body,
            default_return,
        })
    }

    /// Generate up to `max_block_statements` statements directly in `scope`,
    /// stopping after an unconditional exit
    pub fn block(&mut self, scope: ScopeId, depth: u32) -> GenResult<Block> {
        let count = 1 + self.rng.gen_below(self.options.max_block_statements);
        let mut statements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let statement = self.statement(scope, depth)?;
            let exits = statement.exits();
            statements.push(statement);
            if exits {
                break;
            }
        }
        Ok(Block { statements })
    }

    fn nested_block(&mut self, parent: ScopeId, kind: ScopeKind, depth: u32) -> GenResult<Block> {
        let scope = self.scopes.open(parent, kind);
        self.block(scope, depth)
    }

    /// Declare a fresh variable in `scope` with a generated initializer.
    ///
    /// The variable becomes visible only after its initializer is built.
    pub fn declaration(&mut self, scope: ScopeId, depth: u32) -> GenResult<Statement> {
        let init = self.expression(
            scope,
            self.options.max_expression_depth,
            depth,
            OperatorRequirement::empty(),
        )?;
        let id = self.scopes.declare(scope);
        Ok(Statement::Declaration {
            name: self.scopes.name(id).to_string(),
            init,
        })
    }

    /// Generate one statement with `depth` levels of nesting left
    pub fn statement(&mut self, scope: ScopeId, depth: u32) -> GenResult<Statement> {
        let in_function = self.scopes.in_function(scope);
        let in_loop = self.scopes.in_loop(scope);
        let kind = self.tables.statements.choose_where(&mut self.rng, |k| match k {
            k if k.is_compound() => depth > 0,
            StatementKind::Return => in_function,
            StatementKind::Break => in_loop,
            _ => true,
        })?;
        let expr_depth = self.options.max_expression_depth;
        let none = OperatorRequirement::empty();
        let inner = depth.saturating_sub(1);

        let statement = match kind {
            StatementKind::Expression => {
                Statement::Expression(self.expression(scope, expr_depth, depth, none)?)
            }
            StatementKind::Declaration => self.declaration(scope, depth)?,
            StatementKind::If => {
                let cond = self.expression(scope, expr_depth, depth, none)?;
                let then = self.nested_block(scope, ScopeKind::Block, inner)?;
                let otherwise = if self.rng.gen_bool(self.options.else_probability) {
                    Some(self.nested_block(scope, ScopeKind::Block, inner)?)
                } else {
                    None
                };
                Statement::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            StatementKind::For => {
                let counter = format!("l{}", self.scopes.next_ordinal());
                let cycles = 1 + self.rng.gen_below(self.options.max_loop_cycles);
                let body = self.nested_block(scope, ScopeKind::Loop, inner)?;
                Statement::For {
                    counter,
                    cycles,
                    body,
                }
            }
            StatementKind::Block => Statement::Block(self.nested_block(scope, ScopeKind::Block, inner)?),
            StatementKind::Return => Statement::Return(self.expression(scope, expr_depth, depth, none)?),
            StatementKind::Break => Statement::Break,
            StatementKind::Output => {
                self.scopes.require(scope, GlobalHelper::Output);
                Statement::Output(self.expression(scope, expr_depth, depth, none)?)
            }
        };
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomjs::blake2b::Blake2Generator;

    fn tables() -> (GrammarTables, ProgramOptions) {
        let options = ProgramOptions::default();
        (GrammarTables::from_options(&options).unwrap(), options)
    }

    /// Every constrained operand is either a satisfying literal or coerced
    fn check_operands(expr: &Expr) {
        type R = OperatorRequirement;
        let check = |req: R, operand: &Expr| {
            if req.contains(R::RHS_NONZERO) {
                match operand {
                    Expr::Literal(l) => assert!(l.is_numeric() && !l.is_zero()),
                    Expr::Helper { helper, .. } => assert_eq!(*helper, GlobalHelper::NonZero),
                    other => panic!("unguarded divisor {}", other),
                }
            } else if req.contains(R::RHS_NONNEGATIVE) {
                match operand {
                    Expr::Literal(l) => assert!(l.is_numeric() && !l.is_negative()),
                    Expr::Helper { helper, .. } => assert_eq!(*helper, GlobalHelper::NonNegative),
                    other => panic!("unguarded operand {}", other),
                }
            } else if req.contains(R::NUMERIC_ONLY) {
                match operand {
                    Expr::Literal(l) => assert!(l.is_numeric()),
                    Expr::Helper { .. } => {}
                    other => panic!("uncoerced operand {}", other),
                }
            }
        };
        match expr {
            Expr::Unary { op, operand } => {
                check(op.requirement() & OPERAND_MASK, operand);
                check_operands(operand);
            }
            Expr::Binary { op, lhs, rhs } => {
                check(op.requirement() & R::NUMERIC_ONLY, lhs);
                check(op.requirement() & OPERAND_MASK, rhs);
                check_operands(lhs);
                check_operands(rhs);
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                check_operands(cond);
                check_operands(then);
                check_operands(otherwise);
            }
            Expr::Assignment { op, value, .. } => {
                if let Some(value) = value {
                    check(op.requirement() & OPERAND_MASK, value);
                    check_operands(value);
                }
            }
            Expr::Invocation { args, .. } => args.iter().for_each(check_operands),
            Expr::Helper { arg, .. } => check_operands(arg),
            Expr::Function(func) => {
                func.body.statements.iter().for_each(|s| check_statement(s, false));
            }
            Expr::Literal(_) | Expr::Variable(_) => {}
        }
    }

    fn check_statement(statement: &Statement, in_loop: bool) {
        match statement {
            Statement::Expression(e) | Statement::Return(e) | Statement::Output(e) => {
                check_operands(e)
            }
            Statement::Declaration { init, .. } => check_operands(init),
            Statement::If {
                cond,
                then,
                otherwise,
            } => {
                check_operands(cond);
                then.statements.iter().for_each(|s| check_statement(s, in_loop));
                if let Some(otherwise) = otherwise {
                    otherwise.statements.iter().for_each(|s| check_statement(s, in_loop));
                }
            }
            Statement::For { body, cycles, .. } => {
                assert!(*cycles >= 1);
                body.statements.iter().for_each(|s| check_statement(s, true));
            }
            Statement::Block(block) => {
                block.statements.iter().for_each(|s| check_statement(s, in_loop));
            }
            Statement::Break => assert!(in_loop, "break outside loop"),
        }
    }

    #[test]
    fn test_depth_zero_is_terminal() {
        let (tables, options) = tables();
        let mut gen = Generator::new(Blake2Generator::new(b"terminal"), &tables, &options);
        let root = gen.scopes().root();
        gen.scopes_mut().declare(root);
        for _ in 0..200 {
            let expr = gen
                .expression(root, 0, 0, OperatorRequirement::empty())
                .unwrap();
            assert!(matches!(expr, Expr::Literal(_) | Expr::Variable(_)), "{}", expr);
        }
    }

    #[test]
    fn test_no_variables_means_literals() {
        let (tables, options) = tables();
        let mut gen = Generator::new(Blake2Generator::new(b"empty scope"), &tables, &options);
        let root = gen.scopes().root();
        for _ in 0..100 {
            let expr = gen
                .expression(root, 0, 3, OperatorRequirement::empty())
                .unwrap();
            assert!(matches!(expr, Expr::Literal(_)));
        }
    }

    #[test]
    fn test_numeric_literals_in_numeric_context() {
        type R = OperatorRequirement;
        let (tables, options) = tables();
        let mut gen = Generator::new(Blake2Generator::new(b"numeric"), &tables, &options);
        for _ in 0..500 {
            let lit = gen.literal(R::NUMERIC_ONLY | R::RHS_NONZERO).unwrap();
            assert!(lit.is_numeric() && !lit.is_zero(), "{}", lit);
            let lit = gen.literal(R::NUMERIC_ONLY | R::RHS_NONNEGATIVE).unwrap();
            assert!(lit.is_numeric() && !lit.is_negative(), "{}", lit);
        }
    }

    #[test]
    fn test_constraints_hold_across_statements() {
        let (tables, options) = tables();
        for seed in 0u32..40 {
            let mut gen = Generator::new(
                Blake2Generator::new(&seed.to_le_bytes()),
                &tables,
                &options,
            );
            let root = gen.scopes().root();
            for _ in 0..3 {
                let decl = gen.declaration(root, options.max_depth).unwrap();
                check_statement(&decl, false);
            }
            for _ in 0..6 {
                let statement = gen.statement(root, options.max_depth).unwrap();
                assert!(!matches!(statement, Statement::Return(_) | Statement::Break));
                check_statement(&statement, false);
            }
        }
    }

    #[test]
    fn test_block_stops_after_exit() {
        let (_, mut options) = tables();
        options.statement_weights.clear();
        options.statement_weights.insert("Return".into(), 1.0);
        options.statement_weights.insert("Expression".into(), 1.0);
        options.max_block_statements = 8;
        let tables = GrammarTables::from_options(&options).unwrap();

        let mut gen = Generator::new(Blake2Generator::new(b"exits"), &tables, &options);
        let root = gen.scopes().root();
        let func = gen.scopes_mut().open(root, ScopeKind::Function);
        for _ in 0..50 {
            let block = gen.block(func, 0).unwrap();
            let first_exit = block.statements.iter().position(Statement::exits);
            if let Some(pos) = first_exit {
                assert_eq!(pos, block.statements.len() - 1);
            }
        }
    }

    #[test]
    fn test_function_params_are_fresh() {
        let (tables, options) = tables();
        let mut gen = Generator::new(Blake2Generator::new(b"params"), &tables, &options);
        let root = gen.scopes().root();
        gen.scopes_mut().declare(root);
        for _ in 0..20 {
            let func = gen.function(root, 2, OperatorRequirement::empty()).unwrap();
            assert!(func.params.len() <= options.max_function_parameters as usize);
            assert!(!func.params.contains(&"v0".to_string()));
            assert_eq!(func.default_return.is_none(), func.body.exits());
        }
    }
}
