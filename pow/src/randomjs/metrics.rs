//! Complexity metrics of a program tree
//!
//! Used for statistics only; never part of the protocol.

use std::collections::HashSet;

use crate::randomjs::ast::{Block, Expr, ProgramTree, Statement};
use crate::randomjs::operators::BinaryOperator;

/// Static complexity of one program
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComplexityMetrics {
    /// Decision points plus one
    pub cyclomatic: u32,
    /// Halstead difficulty `(n1 / 2) * (N2 / n2)`
    pub halstead_difficulty: f64,
}

#[derive(Default)]
struct Counter {
    decisions: u32,
    operators: HashSet<String>,
    operands: HashSet<String>,
    operand_total: u64,
}

impl Counter {
    fn operator(&mut self, op: &str) {
        if !self.operators.contains(op) {
            self.operators.insert(op.to_string());
        }
    }

    fn operand(&mut self, operand: String) {
        self.operand_total += 1;
        self.operands.insert(operand);
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Expression(expr) => self.expr(expr),
            Statement::Declaration { name, init } => {
                self.operator("let");
                self.operand(name.clone());
                self.expr(init);
            }
            Statement::If {
                cond,
                then,
                otherwise,
            } => {
                self.decisions += 1;
                self.operator("if");
                self.expr(cond);
                self.block(then);
                if let Some(otherwise) = otherwise {
                    self.operator("else");
                    self.block(otherwise);
                }
            }
            Statement::For {
                counter,
                cycles,
                body,
            } => {
                self.decisions += 1;
                self.operator("for");
                self.operand(counter.clone());
                self.operand(cycles.to_string());
                self.block(body);
            }
            Statement::Block(block) => self.block(block),
            Statement::Return(expr) => {
                self.operator("return");
                self.expr(expr);
            }
            Statement::Break => self.operator("break"),
            Statement::Output(expr) => {
                self.operator("output");
                self.expr(expr);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(lit) => self.operand(lit.to_string()),
            Expr::Variable(name) => self.operand(name.clone()),
            Expr::Function(func) => {
                self.operator("function");
                for param in &func.params {
                    self.operand(param.clone());
                }
                self.block(&func.body);
                if let Some(ret) = &func.default_return {
                    self.operator("return");
                    self.expr(ret);
                }
            }
            Expr::Unary { op, operand } => {
                self.operator(op.symbol());
                self.expr(operand);
            }
            Expr::Binary { op, lhs, rhs } => {
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
                    self.decisions += 1;
                }
                self.operator(op.symbol());
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.decisions += 1;
                self.operator("?:");
                self.expr(cond);
                self.expr(then);
                self.expr(otherwise);
            }
            Expr::Assignment { op, target, value } => {
                self.operator(op.symbol());
                self.operand(target.clone());
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Expr::Invocation { target, args } => {
                self.operator("()");
                self.operand(target.clone());
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Helper { helper, arg } => {
                self.operator(helper.name());
                self.expr(arg);
            }
        }
    }
}

impl ComplexityMetrics {
    /// Measure a complete program tree
    pub fn measure(tree: &ProgramTree) -> Self {
        let mut counter = Counter::default();
        for statement in tree.globals.iter().chain(&tree.body).chain(&tree.outputs) {
            counter.statement(statement);
        }

        let n1 = counter.operators.len() as f64;
        let n2 = counter.operands.len() as f64;
        let halstead_difficulty = if n2 == 0.0 {
            0.0
        } else {
            (n1 / 2.0) * (counter.operand_total as f64 / n2)
        };

        Self {
            cyclomatic: 1 + counter.decisions,
            halstead_difficulty,
        }
    }
}
