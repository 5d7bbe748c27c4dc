// Scorch Type Model
// Value types and the conversion rules the analyzer enforces

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static types of script values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Void,
    Bool,
    Int,
    Double,
    String,
    /// Compiled regular expression
    Pattern,
    /// Dynamically typed value, checked by the host at runtime
    Def,
    /// Type of the `null` literal; never declarable
    #[serde(skip)]
    Null,
}

/// How a value moves from one type to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Written by the script with a cast expression
    Explicit,
    /// Inserted by the compiler
    Implicit { strict: bool },
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// Reference types may hold `null`
    pub fn is_reference(self) -> bool {
        matches!(self, Type::String | Type::Pattern | Type::Def | Type::Null)
    }

    /// Stable byte encoding used as the operand of `Cast`
    pub fn code(self) -> u8 {
        match self {
            Type::Void => 0,
            Type::Bool => 1,
            Type::Int => 2,
            Type::Double => 3,
            Type::String => 4,
            Type::Pattern => 5,
            Type::Def => 6,
            Type::Null => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Type> {
        Some(match code {
            0 => Type::Void,
            1 => Type::Bool,
            2 => Type::Int,
            3 => Type::Double,
            4 => Type::String,
            5 => Type::Pattern,
            6 => Type::Def,
            7 => Type::Null,
            _ => return None,
        })
    }

    /// Whether a value of `self` may be converted to `target`
    pub fn converts_to(self, target: Type, conversion: Conversion) -> bool {
        if self == target {
            return true;
        }
        if self == Type::Void || target == Type::Void || target == Type::Null {
            return false;
        }

        match (self, target) {
            (_, Type::Def) => true,
            (Type::Null, to) => to.is_reference(),
            (Type::Int, Type::Double) => match conversion {
                Conversion::Explicit => true,
                Conversion::Implicit { strict } => !strict,
            },
            (Type::Double, Type::Int) => conversion == Conversion::Explicit,
            (Type::Def, to) if to.is_numeric() => match conversion {
                Conversion::Explicit => true,
                Conversion::Implicit { strict } => !strict,
            },
            (Type::Def, _) => true,
            _ => false,
        }
    }

    /// Common type two numeric (or dynamic) operands are promoted to
    pub fn promote_numeric(left: Type, right: Type) -> Option<Type> {
        match (left, right) {
            (Type::Def, r) if r.is_numeric() || r == Type::Def => Some(Type::Def),
            (l, Type::Def) if l.is_numeric() => Some(Type::Def),
            (Type::Int, Type::Int) => Some(Type::Int),
            (l, r) if l.is_numeric() && r.is_numeric() => Some(Type::Double),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "void",
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Double => "double",
            Type::String => "string",
            Type::Pattern => "pattern",
            Type::Def => "def",
            Type::Null => "null",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENIENT: Conversion = Conversion::Implicit { strict: false };
    const STRICT: Conversion = Conversion::Implicit { strict: true };

    #[test]
    fn test_widening_depends_on_strictness() {
        assert!(Type::Int.converts_to(Type::Double, LENIENT));
        assert!(!Type::Int.converts_to(Type::Double, STRICT));
        assert!(Type::Int.converts_to(Type::Double, Conversion::Explicit));
    }

    #[test]
    fn test_narrowing_needs_cast() {
        assert!(!Type::Double.converts_to(Type::Int, LENIENT));
        assert!(Type::Double.converts_to(Type::Int, Conversion::Explicit));
    }

    #[test]
    fn test_def_unboxing() {
        assert!(Type::Def.converts_to(Type::Int, LENIENT));
        assert!(!Type::Def.converts_to(Type::Int, STRICT));
        assert!(Type::Def.converts_to(Type::Bool, STRICT));
        assert!(Type::Bool.converts_to(Type::Def, STRICT));
    }

    #[test]
    fn test_null_only_to_references() {
        assert!(Type::Null.converts_to(Type::String, STRICT));
        assert!(Type::Null.converts_to(Type::Def, STRICT));
        assert!(!Type::Null.converts_to(Type::Int, Conversion::Explicit));
        assert!(!Type::String.converts_to(Type::Null, Conversion::Explicit));
    }

    #[test]
    fn test_void_converts_to_nothing() {
        assert!(!Type::Void.converts_to(Type::Def, Conversion::Explicit));
        assert!(Type::Void.converts_to(Type::Void, STRICT));
    }

    #[test]
    fn test_promotion() {
        assert_eq!(Type::promote_numeric(Type::Int, Type::Int), Some(Type::Int));
        assert_eq!(Type::promote_numeric(Type::Int, Type::Double), Some(Type::Double));
        assert_eq!(Type::promote_numeric(Type::Def, Type::Int), Some(Type::Def));
        assert_eq!(Type::promote_numeric(Type::String, Type::Int), None);
    }
}
