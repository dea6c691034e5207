//! Global helper functions
//!
//! Helpers are emitted at most once per program, only when some scope of the
//! program required them. Their JavaScript definitions are part of the
//! program bytes and therefore of the auxiliary hash.

/// A global helper capability that generated code may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlobalHelper {
    /// Output buffer and printer
    Output,
    /// Coerce to a finite number
    Numeric,
    /// Replace zero by one
    NonZero,
    /// Absolute value
    NonNegative,
    /// Round to a fixed number of significant digits
    Precision,
    /// Call a value held in a variable
    Invoke,
}

impl GlobalHelper {
    /// Identifier of the helper in generated code
    pub fn name(self) -> &'static str {
        match self {
            GlobalHelper::Output => "__out",
            GlobalHelper::Numeric => "__numb",
            GlobalHelper::NonZero => "__nonz",
            GlobalHelper::NonNegative => "__nneg",
            GlobalHelper::Precision => "__prec",
            GlobalHelper::Invoke => "__invk",
        }
    }

    /// Helpers whose definitions this helper calls
    pub fn dependencies(self) -> &'static [GlobalHelper] {
        match self {
            GlobalHelper::NonZero | GlobalHelper::NonNegative | GlobalHelper::Precision => {
                &[GlobalHelper::Numeric]
            }
            _ => &[],
        }
    }

    /// JavaScript definition of the helper.
    ///
    /// `max_call_depth` bounds recursion through `__invk`.
    pub fn definition(self, max_call_depth: u32) -> String {
        match self {
            GlobalHelper::Output => concat!(
                "let __o = [];\n",
                "function __out(x) { __o.push(typeof x === 'function' ? 'f' + x.length : String(x)); }\n",
            )
            .to_string(),
            GlobalHelper::Numeric => {
                "function __numb(x) { x = +x; return x === x ? x : 0; }\n".to_string()
            }
            GlobalHelper::NonZero => {
                "function __nonz(x) { x = __numb(x); return x !== 0 ? x : 1; }\n".to_string()
            }
            GlobalHelper::NonNegative => {
                "function __nneg(x) { x = __numb(x); return x < 0 ? -x : x; }\n".to_string()
            }
            GlobalHelper::Precision => {
                "function __prec(x) { return +__numb(x).toPrecision(8); }\n".to_string()
            }
            GlobalHelper::Invoke => format!(
                concat!(
                    "let __d = 0;\n",
                    "function __invk(f, ...a) {{ if (typeof f !== 'function' || __d >= {}) return f; ",
                    "++__d; try {{ return f(...a); }} finally {{ --__d; }} }}\n",
                ),
                max_call_depth
            ),
        }
    }
}
