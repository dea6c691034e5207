//! Program tree
//!
//! Closed set of expression and statement kinds produced by the generator.
//! `Display` renders JavaScript; the rendering is the program text that gets
//! hashed, so any change here changes every key's program.

use core::fmt;

use crate::randomjs::globals::GlobalHelper;
use crate::randomjs::operators::{
    AssignmentOperator, BinaryOperator, OperatorRequirement, UnaryOperator,
};

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i32),
    /// Fixed-point value with three decimals
    Decimal(i64),
    /// Lowercase ASCII only, never needs escaping
    String(String),
    Boolean(bool),
}

impl Literal {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Decimal(_))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Literal::Integer(0) | Literal::Decimal(0))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Literal::Integer(n) => *n < 0,
            Literal::Decimal(n) => *n < 0,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) if *n < 0 => write!(f, "({})", n),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Decimal(milli) => {
                let abs = milli.unsigned_abs();
                if *milli < 0 {
                    write!(f, "(-{}.{:03})", abs / 1000, abs % 1000)
                } else {
                    write!(f, "{}.{:03}", abs / 1000, abs % 1000)
                }
            }
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Function(Box<FunctionExpr>),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assignment {
        op: AssignmentOperator,
        target: String,
        value: Option<Box<Expr>>,
    },
    /// Call of a variable's value through the invocation helper
    Invocation {
        target: String,
        args: Vec<Expr>,
    },
    /// Operand coercion or result rounding through a helper
    Helper {
        helper: GlobalHelper,
        arg: Box<Expr>,
    },
}

/// Anonymous function value
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub params: Vec<String>,
    pub body: Block,
    /// Emitted after the body unless the body always returns
    pub default_return: Option<Expr>,
}

/// Braced statement list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    /// Control never falls through the end of this block
    pub fn exits(&self) -> bool {
        self.statements.last().is_some_and(Statement::exits)
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expr),
    Declaration {
        name: String,
        init: Expr,
    },
    If {
        cond: Expr,
        then: Block,
        otherwise: Option<Block>,
    },
    /// Counted loop; the counter is invisible to generated code
    For {
        counter: String,
        cycles: u32,
        body: Block,
    },
    Block(Block),
    Return(Expr),
    Break,
    Output(Expr),
}

impl Statement {
    /// Unconditional control-flow exit
    pub fn exits(&self) -> bool {
        match self {
            Statement::Return(_) | Statement::Break => true,
            Statement::If {
                then,
                otherwise: Some(otherwise),
                ..
            } => then.exits() && otherwise.exits(),
            Statement::Block(block) => block.exits(),
            _ => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Variable(name) => f.write_str(name),
            Expr::Function(func) => write!(f, "({})", func),
            Expr::Unary { op, operand } => {
                let req = op.requirement();
                if req.contains(OperatorRequirement::FUNCTION_CALL) {
                    write!(f, "{}({})", op.symbol(), operand)
                } else if req.contains(OperatorRequirement::PREFIX) {
                    write!(f, "({}{})", op.symbol(), operand)
                } else {
                    write!(f, "({}{})", operand, op.symbol())
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                if op.requirement().contains(OperatorRequirement::FUNCTION_CALL) {
                    write!(f, "{}({}, {})", op.symbol(), lhs, rhs)
                } else {
                    write!(f, "({} {} {})", lhs, op.symbol(), rhs)
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", cond, then, otherwise),
            Expr::Assignment { op, target, value } => {
                let req = op.requirement();
                match value {
                    Some(value) => write!(f, "({} {} {})", target, op.symbol(), value),
                    None if req.contains(OperatorRequirement::PREFIX) => {
                        write!(f, "({}{})", op.symbol(), target)
                    }
                    None => write!(f, "({}{})", target, op.symbol()),
                }
            }
            Expr::Invocation { target, args } => {
                write!(f, "{}({}", GlobalHelper::Invoke.name(), target)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Helper { helper, arg } => write!(f, "{}({})", helper.name(), arg),
        }
    }
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("function (")?;
        f.write_str(&self.params.join(", "))?;
        f.write_str(") {\n")?;
        for statement in &self.body.statements {
            writeln!(f, "{}", statement)?;
        }
        if let Some(ret) = &self.default_return {
            writeln!(f, "return {};", ret)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{\n")?;
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "{};", expr),
            Statement::Declaration { name, init } => write!(f, "let {} = {};", name, init),
            Statement::If {
                cond,
                then,
                otherwise,
            } => {
                write!(f, "if ({}) {}", cond, then)?;
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
                Ok(())
            }
            Statement::For {
                counter,
                cycles,
                body,
            } => write!(
                f,
                "for (let {c} = 0; {c} < {n}; ++{c}) {body}",
                c = counter,
                n = cycles,
                body = body
            ),
            Statement::Block(block) => write!(f, "{}", block),
            Statement::Return(expr) => write!(f, "return {};", expr),
            Statement::Break => f.write_str("break;"),
            Statement::Output(expr) => write!(f, "{}({});", GlobalHelper::Output.name(), expr),
        }
    }
}

/// Complete program before serialization
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTree {
    /// Helper definitions, in emission order
    pub helpers: Vec<GlobalHelper>,
    /// Global variable declarations
    pub globals: Vec<Statement>,
    /// Top-level statements
    pub body: Vec<Statement>,
    /// Final output statements
    pub outputs: Vec<Statement>,
}

impl ProgramTree {
    /// Render the full program text
    pub fn render(&self, max_call_depth: u32) -> String {
        let mut text = String::from("'use strict';\n");
        for helper in &self.helpers {
            text.push_str(&helper.definition(max_call_depth));
        }
        for statement in self.globals.iter().chain(&self.body).chain(&self.outputs) {
            text.push_str(&statement.to_string());
            text.push('\n');
        }
        text.push_str("console.log(__o.join('|'));\n");
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i32) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Integer(n)))
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Literal::Integer(-3).to_string(), "(-3)");
        assert_eq!(Literal::Integer(42).to_string(), "42");
        assert_eq!(Literal::Decimal(-1234).to_string(), "(-1.234)");
        assert_eq!(Literal::Decimal(5).to_string(), "0.005");
        assert_eq!(Literal::String("abc".into()).to_string(), "'abc'");
    }

    #[test]
    fn test_operator_forms() {
        let neg = Expr::Unary {
            op: UnaryOperator::Minus,
            operand: lit(-3),
        };
        assert_eq!(neg.to_string(), "(-(-3))");

        let max = Expr::Binary {
            op: BinaryOperator::Max,
            lhs: lit(1),
            rhs: lit(2),
        };
        assert_eq!(max.to_string(), "Math.max(1, 2)");

        let inc = Expr::Assignment {
            op: AssignmentOperator::Increment,
            target: "v1".into(),
            value: None,
        };
        assert_eq!(inc.to_string(), "(++v1)");
        let dec = Expr::Assignment {
            op: AssignmentOperator::Decrement,
            target: "v1".into(),
            value: None,
        };
        assert_eq!(dec.to_string(), "(v1--)");

        let call = Expr::Invocation {
            target: "v0".into(),
            args: vec![Expr::Literal(Literal::Boolean(true))],
        };
        assert_eq!(call.to_string(), "__invk(v0, true)");
    }

    #[test]
    fn test_exit_tracking() {
        let returns = Block {
            statements: vec![Statement::Return(*lit(1))],
        };
        let branch = Statement::If {
            cond: *lit(1),
            then: returns.clone(),
            otherwise: Some(Block {
                statements: vec![Statement::Break],
            }),
        };
        assert!(branch.exits());
        let half = Statement::If {
            cond: *lit(1),
            then: returns,
            otherwise: None,
        };
        assert!(!half.exits());
    }

    #[test]
    fn test_function_rendering() {
        let func = Expr::Function(Box::new(FunctionExpr {
            params: vec!["v1".into(), "v2".into()],
            body: Block::default(),
            default_return: Some(Expr::Variable("v1".into())),
        }));
        assert_eq!(func.to_string(), "(function (v1, v2) {\nreturn v1;\n})");
    }
}
