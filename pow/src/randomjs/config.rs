//! RandomJS Configuration
//!
//! Size bounds and production weights for program synthesis. Every value
//! here changes the program generated for a key, so miners and verifiers
//! must agree on the whole structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::randomjs::error::{OptionsError, TableError};
use crate::randomjs::operators::{
    AssignmentOperator, BinaryOperator, ExprKind, LiteralKind, StatementKind, UnaryOperator,
};
use crate::randomjs::table::WeightedTable;

/// Global variables declared at program start
pub const GLOBAL_VARIABLES_MIN: u32 = 3;
pub const GLOBAL_VARIABLES_MAX: u32 = 6;

/// Statements generated at top level
pub const TOP_LEVEL_STATEMENTS_MIN: u32 = 4;
pub const TOP_LEVEL_STATEMENTS_MAX: u32 = 8;

/// Maximum statement nesting depth
pub const MAX_STATEMENT_DEPTH: u32 = 3;
/// Maximum expression nesting depth
pub const MAX_EXPRESSION_DEPTH: u32 = 3;
/// Maximum number of parameters of a generated function
pub const MAX_FUNCTION_PARAMETERS: u32 = 3;
/// Maximum number of arguments of an invocation
pub const MAX_CALL_ARGUMENTS: u32 = 3;
/// Maximum statements in one block
pub const MAX_BLOCK_STATEMENTS: u32 = 4;
/// Maximum iterations of a counted loop
pub const MAX_LOOP_CYCLES: u32 = 8;
/// Dynamic call depth allowed through the invocation helper
pub const MAX_CALL_DEPTH: u32 = 4;

/// Integer literals are drawn from `[-INTEGER_LITERAL_RANGE, INTEGER_LITERAL_RANGE]`
pub const INTEGER_LITERAL_RANGE: i32 = 1000;
/// Maximum length of string literals
pub const MAX_STRING_LENGTH: u32 = 6;

/// Largest accepted value of a count option
pub const MAX_COUNT_OPTION: u32 = 256;
/// Largest accepted nesting depth
pub const MAX_DEPTH_OPTION: u32 = 32;

/// Synthesis options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramOptions {
    pub globals_min: u32,
    pub globals_max: u32,
    pub statements_min: u32,
    pub statements_max: u32,
    pub max_depth: u32,
    pub max_expression_depth: u32,
    pub max_function_parameters: u32,
    pub max_call_arguments: u32,
    pub max_block_statements: u32,
    pub max_loop_cycles: u32,
    pub max_call_depth: u32,
    pub integer_range: i32,
    pub max_string_length: u32,
    /// Probability that an `if` gets an `else` branch
    pub else_probability: f64,
    pub expression_weights: BTreeMap<String, f64>,
    pub statement_weights: BTreeMap<String, f64>,
    pub literal_weights: BTreeMap<String, f64>,
    pub unary_weights: BTreeMap<String, f64>,
    pub binary_weights: BTreeMap<String, f64>,
    pub assignment_weights: BTreeMap<String, f64>,
}

fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, w)| (k.to_string(), *w)).collect()
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            globals_min: GLOBAL_VARIABLES_MIN,
            globals_max: GLOBAL_VARIABLES_MAX,
            statements_min: TOP_LEVEL_STATEMENTS_MIN,
            statements_max: TOP_LEVEL_STATEMENTS_MAX,
            max_depth: MAX_STATEMENT_DEPTH,
            max_expression_depth: MAX_EXPRESSION_DEPTH,
            max_function_parameters: MAX_FUNCTION_PARAMETERS,
            max_call_arguments: MAX_CALL_ARGUMENTS,
            max_block_statements: MAX_BLOCK_STATEMENTS,
            max_loop_cycles: MAX_LOOP_CYCLES,
            max_call_depth: MAX_CALL_DEPTH,
            integer_range: INTEGER_LITERAL_RANGE,
            max_string_length: MAX_STRING_LENGTH,
            else_probability: 0.5,
            expression_weights: weights(&[
                ("Literal", 4.0),
                ("Variable", 5.0),
                ("Function", 0.4),
                ("Unary", 1.5),
                ("Binary", 3.0),
                ("Ternary", 0.5),
                ("Assignment", 1.0),
                ("Invocation", 1.2),
            ]),
            statement_weights: weights(&[
                ("Expression", 3.0),
                ("Declaration", 3.0),
                ("If", 1.0),
                ("For", 0.8),
                ("Block", 0.4),
                ("Return", 1.0),
                ("Break", 0.3),
                ("Output", 2.0),
            ]),
            literal_weights: weights(&[
                ("Integer", 5.0),
                ("Decimal", 2.0),
                ("String", 1.5),
                ("Boolean", 1.0),
            ]),
            unary_weights: weights(&[
                ("Plus", 1.0),
                ("Minus", 2.0),
                ("Not", 1.0),
                ("BitNot", 1.0),
                ("Typeof", 0.5),
                ("Abs", 1.0),
                ("Floor", 1.0),
                ("Sqrt", 1.0),
                ("Sin", 1.0),
                ("Cbrt", 0.5),
            ]),
            binary_weights: weights(&[
                ("Add", 4.0),
                ("Sub", 3.0),
                ("Mul", 3.0),
                ("Div", 2.0),
                ("Mod", 2.0),
                ("Less", 1.0),
                ("Greater", 1.0),
                ("Equal", 0.5),
                ("NotEqual", 0.5),
                ("And", 0.5),
                ("Or", 0.5),
                ("BitAnd", 1.0),
                ("BitOr", 1.0),
                ("BitXor", 1.0),
                ("ShiftLeft", 0.5),
                ("ShiftRight", 0.5),
                ("Max", 0.7),
                ("Min", 0.7),
                ("Pow", 0.3),
            ]),
            assignment_weights: weights(&[
                ("Assign", 3.0),
                ("AddAssign", 2.0),
                ("SubAssign", 1.0),
                ("MulAssign", 1.0),
                ("DivAssign", 0.5),
                ("ModAssign", 0.5),
                ("Increment", 1.0),
                ("Decrement", 1.0),
            ]),
        }
    }
}

fn check_bounds(name: &'static str, min: u32, max: u32) -> Result<(), OptionsError> {
    if min > max {
        return Err(OptionsError::Bounds { name, min, max });
    }
    Ok(())
}

fn check_limit(name: &'static str, value: u32, limit: u32) -> Result<(), OptionsError> {
    if value > limit {
        return Err(OptionsError::TooLarge { name, value, limit });
    }
    Ok(())
}

impl ProgramOptions {
    /// Reject bounds the generator cannot honour as given
    pub fn validate(&self) -> Result<(), OptionsError> {
        check_bounds("globals", self.globals_min, self.globals_max)?;
        check_bounds("statements", self.statements_min, self.statements_max)?;

        check_limit("max_depth", self.max_depth, MAX_DEPTH_OPTION)?;
        check_limit("max_expression_depth", self.max_expression_depth, MAX_DEPTH_OPTION)?;
        for (name, value) in [
            ("globals_max", self.globals_max),
            ("statements_max", self.statements_max),
            ("max_function_parameters", self.max_function_parameters),
            ("max_call_arguments", self.max_call_arguments),
            ("max_block_statements", self.max_block_statements),
            ("max_loop_cycles", self.max_loop_cycles),
            ("max_call_depth", self.max_call_depth),
            ("max_string_length", self.max_string_length),
        ] {
            check_limit(name, value, MAX_COUNT_OPTION)?;
        }

        if self.integer_range < 0 {
            return Err(OptionsError::IntegerRange(self.integer_range));
        }
        if !(0.0..=1.0).contains(&self.else_probability) {
            return Err(OptionsError::Probability(self.else_probability));
        }
        Ok(())
    }
}

/// Weighted tables built from [`ProgramOptions`]
#[derive(Debug, Clone)]
pub struct GrammarTables {
    pub expressions: WeightedTable<ExprKind>,
    pub statements: WeightedTable<StatementKind>,
    pub literals: WeightedTable<LiteralKind>,
    pub unary: WeightedTable<UnaryOperator>,
    pub binary: WeightedTable<BinaryOperator>,
    pub assignment: WeightedTable<AssignmentOperator>,
}

fn build<T>(weights: &BTreeMap<String, f64>) -> Result<WeightedTable<T>, TableError>
where
    T: Copy + core::str::FromStr,
{
    let mut table = WeightedTable::new();
    for (name, weight) in weights {
        table.add_named(name, *weight)?;
    }
    Ok(table)
}

impl GrammarTables {
    /// Build and validate the tables.
    ///
    /// Terminal alternatives must be present so that generation can always
    /// bottom out at depth zero.
    pub fn from_options(options: &ProgramOptions) -> Result<Self, TableError> {
        options.validate()?;
        let tables = Self {
            expressions: build(&options.expression_weights)?,
            statements: build(&options.statement_weights)?,
            literals: build(&options.literal_weights)?,
            unary: build(&options.unary_weights)?,
            binary: build(&options.binary_weights)?,
            assignment: build(&options.assignment_weights)?,
        };

        let has_literal = tables
            .expressions
            .choices()
            .iter()
            .any(|c| c.value == ExprKind::Literal);
        let has_numeric = tables.literals.choices().iter().any(|c| c.value.is_numeric());
        let has_simple_statement = tables.statements.choices().iter().any(|c| {
            matches!(
                c.value,
                StatementKind::Expression | StatementKind::Declaration | StatementKind::Output
            )
        });
        if !has_literal
            || !has_numeric
            || !has_simple_statement
            || tables.unary.is_empty()
            || tables.binary.is_empty()
            || tables.assignment.is_empty()
        {
            return Err(TableError::EmptyTable);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_are_complete() {
        let tables = GrammarTables::from_options(&ProgramOptions::default()).unwrap();
        assert_eq!(tables.expressions.len(), ExprKind::ALL.len());
        assert_eq!(tables.statements.len(), StatementKind::ALL.len());
        assert_eq!(tables.binary.len(), BinaryOperator::ALL.len());
        assert_eq!(tables.unary.len(), UnaryOperator::ALL.len());
        assert_eq!(tables.assignment.len(), AssignmentOperator::ALL.len());
    }

    #[test]
    fn test_unknown_name_is_parse_error() {
        let mut options = ProgramOptions::default();
        options.binary_weights.insert("Modulo".into(), 1.0);
        assert_eq!(
            GrammarTables::from_options(&options).unwrap_err(),
            TableError::Parse("Modulo".into())
        );
    }

    #[test]
    fn test_missing_terminal_rejected() {
        let mut options = ProgramOptions::default();
        options.expression_weights.remove("Literal");
        assert_eq!(
            GrammarTables::from_options(&options).unwrap_err(),
            TableError::EmptyTable
        );
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(ProgramOptions::default().validate(), Ok(()));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let options = ProgramOptions {
            globals_min: 5,
            globals_max: 2,
            ..ProgramOptions::default()
        };
        assert_eq!(
            options.validate(),
            Err(OptionsError::Bounds {
                name: "globals",
                min: 5,
                max: 2
            })
        );

        let options = ProgramOptions {
            statements_min: 9,
            statements_max: 8,
            ..ProgramOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(OptionsError::Bounds { name: "statements", .. })
        ));
    }

    #[test]
    fn test_oversized_counts_rejected() {
        let options = ProgramOptions {
            max_string_length: u32::MAX,
            ..ProgramOptions::default()
        };
        assert_eq!(
            GrammarTables::from_options(&options).unwrap_err(),
            TableError::Options(OptionsError::TooLarge {
                name: "max_string_length",
                value: u32::MAX,
                limit: MAX_COUNT_OPTION
            })
        );

        for options in [
            ProgramOptions {
                max_call_arguments: u32::MAX,
                ..ProgramOptions::default()
            },
            ProgramOptions {
                max_function_parameters: MAX_COUNT_OPTION + 1,
                ..ProgramOptions::default()
            },
            ProgramOptions {
                globals_max: u32::MAX,
                ..ProgramOptions::default()
            },
        ] {
            assert!(matches!(options.validate(), Err(OptionsError::TooLarge { .. })));
        }

        let limit = ProgramOptions {
            max_loop_cycles: MAX_COUNT_OPTION,
            ..ProgramOptions::default()
        };
        assert_eq!(limit.validate(), Ok(()));
    }

    #[test]
    fn test_excessive_depth_rejected() {
        let options = ProgramOptions {
            max_depth: MAX_DEPTH_OPTION + 1,
            ..ProgramOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(OptionsError::TooLarge { name: "max_depth", .. })
        ));
        let options = ProgramOptions {
            max_expression_depth: u32::MAX,
            ..ProgramOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_negative_integer_range_rejected() {
        let options = ProgramOptions {
            integer_range: -1,
            ..ProgramOptions::default()
        };
        assert_eq!(options.validate(), Err(OptionsError::IntegerRange(-1)));
    }

    #[test]
    fn test_else_probability_rejected() {
        for p in [-0.1, 1.5, f64::NAN] {
            let options = ProgramOptions {
                else_probability: p,
                ..ProgramOptions::default()
            };
            assert!(matches!(options.validate(), Err(OptionsError::Probability(_))));
        }
        let options = ProgramOptions {
            else_probability: 1.0,
            ..ProgramOptions::default()
        };
        assert_eq!(options.validate(), Ok(()));
    }

    #[test]
    fn test_partial_options_keep_defaults() {
        let options: ProgramOptions = serde_json::from_str(r#"{"max_depth": 5}"#).unwrap();
        assert_eq!(options.max_depth, 5);
        assert_eq!(options.max_call_depth, MAX_CALL_DEPTH);
    }
}
