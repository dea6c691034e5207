//! Grammar alternatives and operator constraints
//!
//! Every alternative the generator can choose is a closed enum with a stable
//! name. Names are used to build weight tables from configuration.

use core::fmt;
use core::str::FromStr;

bitflags::bitflags! {
    /// Constraints an operator places on its operands and on its own form.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperatorRequirement: u8 {
        /// Operands must be numbers
        const NUMERIC_ONLY = 1 << 0;
        /// Right-hand operand must not be zero
        const RHS_NONZERO = 1 << 1;
        /// Right-hand operand must not be negative
        const RHS_NONNEGATIVE = 1 << 2;
        /// Serialized as a function call
        const FUNCTION_CALL = 1 << 3;
        /// Result is rounded to a fixed precision
        const LIMITED_PRECISION = 1 << 4;
        /// Operator precedes its operand
        const PREFIX = 1 << 5;
        /// Operator takes no right-hand operand
        const WITHOUT_RHS = 1 << 6;
    }
}

/// Error for a name outside an enumerated domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, UnknownName> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    _ => Err(UnknownName(s.to_string())),
                }
            }
        }
    };
}

named_enum!(
    /// Expression productions
    ExprKind {
        Literal,
        Variable,
        Function,
        Unary,
        Binary,
        Ternary,
        Assignment,
        Invocation,
    }
);

impl ExprKind {
    /// Does not recurse into sub-expressions
    pub fn is_terminal(self) -> bool {
        matches!(self, ExprKind::Literal | ExprKind::Variable)
    }
}

named_enum!(
    /// Statement productions
    StatementKind {
        Expression,
        Declaration,
        If,
        For,
        Block,
        Return,
        Break,
        Output,
    }
);

impl StatementKind {
    /// Contains nested statements
    pub fn is_compound(self) -> bool {
        matches!(self, StatementKind::If | StatementKind::For | StatementKind::Block)
    }
}

named_enum!(
    /// Literal productions
    LiteralKind {
        Integer,
        Decimal,
        String,
        Boolean,
    }
);

impl LiteralKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, LiteralKind::Integer | LiteralKind::Decimal)
    }
}

named_enum!(
    /// Operators taking one operand
    UnaryOperator {
        Plus,
        Minus,
        Not,
        BitNot,
        Typeof,
        Abs,
        Floor,
        Sqrt,
        Sin,
        Cbrt,
    }
);

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Typeof => "typeof ",
            UnaryOperator::Abs => "Math.abs",
            UnaryOperator::Floor => "Math.floor",
            UnaryOperator::Sqrt => "Math.sqrt",
            UnaryOperator::Sin => "Math.sin",
            UnaryOperator::Cbrt => "Math.cbrt",
        }
    }

    pub fn requirement(self) -> OperatorRequirement {
        type R = OperatorRequirement;
        match self {
            UnaryOperator::Plus | UnaryOperator::Not | UnaryOperator::Typeof => R::PREFIX,
            UnaryOperator::Minus | UnaryOperator::BitNot => R::PREFIX | R::NUMERIC_ONLY,
            UnaryOperator::Abs | UnaryOperator::Floor => R::FUNCTION_CALL | R::NUMERIC_ONLY,
            UnaryOperator::Sqrt => {
                R::FUNCTION_CALL | R::NUMERIC_ONLY | R::RHS_NONNEGATIVE | R::LIMITED_PRECISION
            }
            UnaryOperator::Sin | UnaryOperator::Cbrt => {
                R::FUNCTION_CALL | R::NUMERIC_ONLY | R::LIMITED_PRECISION
            }
        }
    }
}

named_enum!(
    /// Operators taking two operands
    BinaryOperator {
        Add,
        Sub,
        Mul,
        Div,
        Mod,
        Less,
        Greater,
        Equal,
        NotEqual,
        And,
        Or,
        BitAnd,
        BitOr,
        BitXor,
        ShiftLeft,
        ShiftRight,
        Max,
        Min,
        Pow,
    }
);

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Max => "Math.max",
            BinaryOperator::Min => "Math.min",
            BinaryOperator::Pow => "Math.pow",
        }
    }

    pub fn requirement(self) -> OperatorRequirement {
        type R = OperatorRequirement;
        match self {
            BinaryOperator::Add
            | BinaryOperator::Less
            | BinaryOperator::Greater
            | BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::And
            | BinaryOperator::Or => R::empty(),
            BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::BitAnd
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor => R::NUMERIC_ONLY,
            BinaryOperator::Div | BinaryOperator::Mod => R::NUMERIC_ONLY | R::RHS_NONZERO,
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => {
                R::NUMERIC_ONLY | R::RHS_NONNEGATIVE
            }
            BinaryOperator::Max | BinaryOperator::Min => R::FUNCTION_CALL | R::NUMERIC_ONLY,
            BinaryOperator::Pow => R::FUNCTION_CALL | R::NUMERIC_ONLY | R::LIMITED_PRECISION,
        }
    }
}

named_enum!(
    /// Operators writing to a variable
    AssignmentOperator {
        Assign,
        AddAssign,
        SubAssign,
        MulAssign,
        DivAssign,
        ModAssign,
        Increment,
        Decrement,
    }
);

impl AssignmentOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignmentOperator::Assign => "=",
            AssignmentOperator::AddAssign => "+=",
            AssignmentOperator::SubAssign => "-=",
            AssignmentOperator::MulAssign => "*=",
            AssignmentOperator::DivAssign => "/=",
            AssignmentOperator::ModAssign => "%=",
            AssignmentOperator::Increment => "++",
            AssignmentOperator::Decrement => "--",
        }
    }

    pub fn requirement(self) -> OperatorRequirement {
        type R = OperatorRequirement;
        match self {
            AssignmentOperator::Assign | AssignmentOperator::AddAssign => R::empty(),
            AssignmentOperator::SubAssign | AssignmentOperator::MulAssign => R::NUMERIC_ONLY,
            AssignmentOperator::DivAssign | AssignmentOperator::ModAssign => {
                R::NUMERIC_ONLY | R::RHS_NONZERO
            }
            AssignmentOperator::Increment => R::NUMERIC_ONLY | R::WITHOUT_RHS | R::PREFIX,
            AssignmentOperator::Decrement => R::NUMERIC_ONLY | R::WITHOUT_RHS,
        }
    }
}
