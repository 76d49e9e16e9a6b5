//! Predicate expressions.
//!
//! A small expression tree describing a boolean filter over an entity's
//! properties. Trees are built with [`col`], [`val`] and [`list`] plus the
//! combinators on [`Expr`], then compiled to SQL by the query builder.
//!
//! ```ignore
//! use tabula_orm::expr::{col, list};
//!
//! let filter = col("name").contains("o").and(col("id").gt(1));
//! let members = list([1, 2, 3]).contains_member(col("id"));
//! ```

use std::fmt;

use sea_query::Value;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical `AND`.
    And,
    /// Logical `OR`.
    Or,
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// Arithmetic; never compiles to a filter.
    Add,
    /// Arithmetic; never compiles to a filter.
    Sub,
    /// Arithmetic; never compiles to a filter.
    Mul,
    /// Arithmetic; never compiles to a filter.
    Div,
    /// Arithmetic; never compiles to a filter.
    Mod,
}

impl BinaryOp {
    /// SQL comparison operator, if this is a comparison.
    #[must_use]
    pub const fn comparison(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Ne => Some("<>"),
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            _ => None,
        }
    }

    /// The operator with its operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            other => other,
        }
    }
}

/// Methods callable on an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Prefix match, compiled to `LIKE 'value%'`.
    StartsWith,
    /// Suffix match, compiled to `LIKE '%value'`.
    EndsWith,
    /// Substring match on text, membership on a list.
    Contains,
    /// Equality, compiled like `=`.
    Equals,
    /// Not supported in filters.
    ToUpper,
    /// Not supported in filters.
    ToLower,
    /// Not supported in filters.
    Trim,
}

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Entity property, by property name.
    Column(&'static str),
    /// Literal value.
    Constant(Value),
    /// Literal collection.
    List(Vec<Value>),
    /// Operator applied to left and right operands.
    Binary(BinaryOp, Box<Self>, Box<Self>),
    /// Logical negation.
    Not(Box<Self>),
    /// Method call: target, arguments.
    Call(Method, Box<Self>, Vec<Self>),
    /// Type conversion wrapper; compiles as its operand.
    Convert(Box<Self>),
}

/// Reference a property.
#[must_use]
pub const fn col(property: &'static str) -> Expr {
    Expr::Column(property)
}

/// A literal value.
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// A literal collection.
pub fn list<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Expr {
    Expr::List(values.into_iter().map(Into::into).collect())
}

impl Expr {
    /// `left op right`.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary(op, Box::new(left), Box::new(right))
    }

    /// `target.method(args)`.
    #[must_use]
    pub fn call(method: Method, target: Self, args: Vec<Self>) -> Self {
        Self::Call(method, Box::new(target), args)
    }

    /// Both predicates hold.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::binary(BinaryOp::And, self, other)
    }

    /// Either predicate holds.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::binary(BinaryOp::Or, self, other)
    }

    /// Equal to `value`; a null value compiles to `IS NULL`.
    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Eq, self, val(value))
    }

    /// Not equal to `value`; a null value compiles to `IS NOT NULL`.
    #[must_use]
    pub fn ne(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Ne, self, val(value))
    }

    /// Greater than `value`.
    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Gt, self, val(value))
    }

    /// At least `value`.
    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Gte, self, val(value))
    }

    /// Less than `value`.
    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Lt, self, val(value))
    }

    /// At most `value`.
    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Self {
        Self::binary(BinaryOp::Lte, self, val(value))
    }

    /// Text starts with `value`.
    #[must_use]
    pub fn starts_with(self, value: impl Into<Value>) -> Self {
        Self::call(Method::StartsWith, self, vec![val(value)])
    }

    /// Text ends with `value`.
    #[must_use]
    pub fn ends_with(self, value: impl Into<Value>) -> Self {
        Self::call(Method::EndsWith, self, vec![val(value)])
    }

    /// Text contains `value`.
    #[must_use]
    pub fn contains(self, value: impl Into<Value>) -> Self {
        Self::call(Method::Contains, self, vec![val(value)])
    }

    /// List contains `member`; `self` must be a [`list`].
    #[must_use]
    pub fn contains_member(self, member: Self) -> Self {
        Self::call(Method::Contains, self, vec![member])
    }

    /// `equals` method call, compiled like [`eq`](Self::eq).
    #[must_use]
    pub fn equals(self, value: impl Into<Value>) -> Self {
        Self::call(Method::Equals, self, vec![val(value)])
    }

    /// Property value is one of `values`.
    #[must_use]
    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        list(values).contains_member(self)
    }

    /// Property value is none of `values`.
    #[must_use]
    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        !self.is_in(values)
    }

    /// Wrap in a type conversion.
    #[must_use]
    pub fn cast(self) -> Self {
        Self::Convert(Box::new(self))
    }

    /// Strip conversion wrappers.
    #[must_use]
    pub fn unwrap_convert(&self) -> &Self {
        let mut expr = self;
        while let Self::Convert(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// Node kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::Column(_) => "Column".to_string(),
            Self::Constant(_) => "Constant".to_string(),
            Self::List(_) => "List".to_string(),
            Self::Binary(op, ..) => format!("Binary({op:?})"),
            Self::Not(_) => "Not".to_string(),
            Self::Call(method, ..) => format!("Call({method:?})"),
            Self::Convert(_) => "Convert".to_string(),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Constant(value) => write!(f, "{value:?}"),
            Self::List(values) => write!(f, "{values:?}"),
            Self::Binary(op, left, right) => write!(f, "({left} {op:?} {right})"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::Call(method, target, args) => {
                write!(f, "{target}.{method:?}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Convert(inner) => write!(f, "cast({inner})"),
        }
    }
}
