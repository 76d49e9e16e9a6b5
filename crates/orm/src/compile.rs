//! Predicate compilation.
//!
//! Translates an [`Expr`] into a sea-query [`SimpleExpr`] over the entity's
//! columns. Only a fixed set of shapes translates: comparisons between a
//! property and a literal, `AND`/`OR`, the text methods
//! `starts_with`/`ends_with`/`contains`/`equals`, and list membership. Anything
//! else is rejected with [`Error::UnsupportedPredicate`].

use sea_query::{LikeExpr, SimpleExpr, Value};

use crate::dialect::SqlAdapter;
use crate::entity::value_to_datatype;
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, Method};
use crate::metadata::EntityDescriptor;

/// Compiles predicates for one entity and dialect.
pub struct Compiler<'a> {
    descriptor: &'a EntityDescriptor,
    adapter: &'a dyn SqlAdapter,
}

impl<'a> Compiler<'a> {
    /// A compiler resolving properties against `descriptor`.
    pub fn new(descriptor: &'a EntityDescriptor, adapter: &'a dyn SqlAdapter) -> Self {
        Self { descriptor, adapter }
    }

    /// Compile `expr` into a WHERE predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPredicate`] for shapes that do not translate,
    /// [`Error::UnknownProperty`] for properties the entity does not have, and
    /// [`Error::Argument`] for a null LIKE argument.
    pub fn compile(&self, expr: &Expr) -> Result<SimpleExpr> {
        match expr.unwrap_convert() {
            Expr::Binary(BinaryOp::And, left, right) => {
                Ok(self.compile(left)?.and(self.compile(right)?))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                Ok(self.compile(left)?.or(self.compile(right)?))
            }
            Expr::Binary(op, left, right) => self.comparison(*op, left, right, expr),
            Expr::Not(inner) => match inner.unwrap_convert() {
                Expr::Call(Method::Contains, target, args)
                    if matches!(target.unwrap_convert(), Expr::List(_)) =>
                {
                    self.membership(target, args, true)
                }
                _ => Err(Error::unsupported(expr.kind())),
            },
            Expr::Call(method, target, args) => self.call(*method, target, args),
            other => Err(Error::unsupported(other.kind())),
        }
    }

    fn column(&self, property: &str) -> Result<sea_query::Expr> {
        let property = self.descriptor.property(property)?;
        Ok(sea_query::Expr::col(self.adapter.column(property.column)))
    }

    fn comparison(&self, op: BinaryOp, left: &Expr, right: &Expr, node: &Expr) -> Result<SimpleExpr> {
        if op.comparison().is_none() {
            return Err(Error::unsupported(node.kind()));
        }
        let (column, value, op) = match (left.unwrap_convert(), right.unwrap_convert()) {
            (Expr::Column(column), Expr::Constant(value)) => (*column, value, op),
            (Expr::Constant(value), Expr::Column(column)) => (*column, value, op.flip()),
            _ => return Err(Error::unsupported(node.kind())),
        };
        let column = self.column(column)?;
        let null = is_null(value)?;
        let value = value.clone();

        let predicate = match op {
            BinaryOp::Eq if null => column.is_null(),
            BinaryOp::Ne if null => column.is_not_null(),
            BinaryOp::Eq => column.eq(value),
            BinaryOp::Ne => column.ne(value),
            BinaryOp::Lt => column.lt(value),
            BinaryOp::Lte => column.lte(value),
            BinaryOp::Gt => column.gt(value),
            BinaryOp::Gte => column.gte(value),
            _ => return Err(Error::unsupported(node.kind())),
        };
        Ok(predicate)
    }

    fn call(&self, method: Method, target: &Expr, args: &[Expr]) -> Result<SimpleExpr> {
        let node = || format!("Call({method:?})");
        match (method, target.unwrap_convert()) {
            (Method::Contains, Expr::List(_)) => self.membership(target, args, false),
            (Method::StartsWith | Method::EndsWith | Method::Contains, Expr::Column(column)) => {
                let text = like_argument(method, args)?;
                let escaped = self.adapter.escape_like(&text);
                let pattern = match method {
                    Method::StartsWith => format!("{escaped}%"),
                    Method::EndsWith => format!("%{escaped}"),
                    _ => format!("%{escaped}%"),
                };

                let like = match self.adapter.like_escape_char() {
                    Some(escape) => LikeExpr::new(pattern).escape(escape),
                    None => LikeExpr::new(pattern),
                };
                Ok(self.column(column)?.like(like))
            }
            (Method::Equals, Expr::Column(column)) => {
                let [arg] = args else {
                    return Err(Error::unsupported(node()));
                };
                let Expr::Constant(value) = arg.unwrap_convert() else {
                    return Err(Error::unsupported(node()));
                };
                let column = self.column(column)?;
                if is_null(value)? { Ok(column.is_null()) } else { Ok(column.eq(value.clone())) }
            }
            _ => Err(Error::unsupported(node())),
        }
    }

    fn membership(&self, target: &Expr, args: &[Expr], negated: bool) -> Result<SimpleExpr> {
        let Expr::List(values) = target.unwrap_convert() else {
            return Err(Error::unsupported(target.kind()));
        };
        let [member] = args else {
            return Err(Error::unsupported("Call(Contains)"));
        };
        let Expr::Column(column) = member.unwrap_convert() else {
            return Err(Error::unsupported(member.kind()));
        };
        let column = self.column(column)?;

        // sea-query renders an empty list as `1 = 2`
        if values.is_empty() {
            return Ok(sea_query::Expr::cust(if negated { "1 = 1" } else { "1 = 0" }));
        }

        let values = values.iter().cloned();
        Ok(if negated { column.is_not_in(values) } else { column.is_in(values) })
    }
}

// Also rejects values no driver can bind.
fn is_null(value: &Value) -> Result<bool> {
    Ok(value_to_datatype(value.clone())?.is_null())
}

fn like_argument(method: Method, args: &[Expr]) -> Result<String> {
    let [arg] = args else {
        return Err(Error::unsupported(format!("Call({method:?})")));
    };
    let Expr::Constant(value) = arg.unwrap_convert() else {
        return Err(Error::unsupported(arg.kind()));
    };
    match value {
        Value::String(Some(text)) => Ok((**text).clone()),
        Value::Char(Some(ch)) => Ok(ch.to_string()),
        Value::String(None) | Value::Char(None) => {
            Err(Error::Argument(format!("{method:?} argument must not be null")))
        }
        other => Err(Error::Argument(format!("{method:?} argument must be text, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use sea_query::Asterisk;

    use super::*;
    use crate::DataType;
    use crate::dialect::{MySqlAdapter, SqlServerAdapter, SqliteAdapter};
    use crate::expr::{col, list, val};
    use crate::query::{Ident, Query};

    #[derive(Debug, Clone, Default, crate::Entity)]
    struct User {
        id: i64,
        #[entity(column = "user_name")]
        name: String,
        email: Option<String>,
    }

    // Compile into a SELECT and return the WHERE clause with its values.
    fn compile(expr: &Expr, adapter: &dyn SqlAdapter) -> Result<(String, Vec<DataType>)> {
        let descriptor = EntityDescriptor::build::<User>(None);
        let predicate = Compiler::new(&descriptor, adapter).compile(expr)?;
        let statement = sea_query::Query::select()
            .column(Asterisk)
            .from(Ident::bare("users"))
            .and_where(predicate)
            .to_owned();
        let query = Query::build(&statement, &adapter.query_builder())?;
        let predicate = query.sql.trim_start_matches("SELECT * FROM users WHERE ").to_string();
        Ok((predicate, query.params))
    }

    fn text(value: &str) -> DataType {
        DataType::Str(Some(value.to_string()))
    }

    #[test]
    fn logical_operators() {
        let expr = col("id").gt(1).and(col("name").eq("a").or(col("name").eq("b")));
        let (sql, params) = compile(&expr, &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""id" > ? AND ("user_name" = ? OR "user_name" = ?)"#);
        assert_eq!(params, vec![DataType::Int32(Some(1)), text("a"), text("b")]);

        let expr = col("id").eq(1).or(col("id").eq(2)).and(col("name").eq("c"));
        let (sql, _) = compile(&expr, &SqliteAdapter).unwrap();
        assert_eq!(sql, r#"("id" = ? OR "id" = ?) AND "user_name" = ?"#);
    }

    #[test]
    fn constant_on_left_flips() {
        let expr = Expr::binary(BinaryOp::Lt, val(5), col("id"));
        let (sql, _) = compile(&expr, &MySqlAdapter).unwrap();
        assert_eq!(sql, "`id` > ?");
    }

    #[test]
    fn null_comparisons() {
        let (sql, params) = compile(&col("email").eq(None::<String>), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""email" IS NULL"#);
        assert!(params.is_empty());

        let (sql, _) = compile(&col("email").ne(None::<String>), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""email" IS NOT NULL"#);

        let (sql, _) = compile(&col("email").equals(None::<String>), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""email" IS NULL"#);
    }

    #[test]
    fn like_patterns_are_escaped() {
        let (sql, params) = compile(&col("name").starts_with("100%"), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""user_name" LIKE ? ESCAPE '\'"#);
        assert_eq!(params, vec![text(r"100\%%")]);

        let (sql, params) = compile(&col("name").contains("a_b"), &SqlServerAdapter).unwrap();
        assert_eq!(sql, "[user_name] LIKE @P1");
        assert_eq!(params, vec![text("%a[_]b%")]);

        let (sql, params) = compile(&col("name").ends_with("x"), &MySqlAdapter).unwrap();
        assert_eq!(sql, "`user_name` LIKE ?");
        assert_eq!(params, vec![text("%x")]);
    }

    #[test]
    fn null_like_argument() {
        let err = compile(&col("name").contains(None::<String>), &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn membership() {
        let (sql, params) = compile(&col("id").is_in([1, 2, 3]), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""id" IN (?, ?, ?)"#);
        assert_eq!(params.len(), 3);

        let (sql, _) = compile(&col("id").not_in([1]), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""id" NOT IN (?)"#);

        let (sql, params) = compile(&col("id").is_in(Vec::<i64>::new()), &SqliteAdapter).unwrap();
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());

        let (sql, _) = compile(&col("id").not_in(Vec::<i64>::new()), &SqliteAdapter).unwrap();
        assert_eq!(sql, "1 = 1");

        let (sql, _) = compile(&list(["a"]).contains_member(col("name").cast()), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""user_name" IN (?)"#);
    }

    #[test]
    fn unsupported_shapes() {
        let arithmetic = Expr::binary(BinaryOp::Add, col("id"), val(1));
        let err = compile(&arithmetic, &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPredicate { ref node } if node == "Binary(Add)"));

        let err = compile(&col("id"), &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPredicate { ref node } if node == "Column"));

        let err = compile(&!col("id").eq(1), &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPredicate { ref node } if node == "Not"));

        let trim = Expr::call(Method::Trim, col("name"), vec![]);
        let err = compile(&trim, &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPredicate { ref node } if node == "Call(Trim)"));

        let columns = Expr::binary(BinaryOp::Eq, col("id"), col("name"));
        compile(&columns, &SqliteAdapter).unwrap_err();
    }

    #[test]
    fn conversions_are_transparent() {
        let (sql, _) = compile(&Expr::binary(BinaryOp::Gte, col("id").cast(), val(3).cast()), &SqliteAdapter).unwrap();
        assert_eq!(sql, r#""id" >= ?"#);
    }

    #[test]
    fn unknown_property() {
        let err = compile(&col("age").gt(1), &SqliteAdapter).unwrap_err();
        assert!(matches!(err, Error::UnknownProperty { .. }));
    }

    #[derive(Debug, Clone, Default, crate::Entity)]
    struct Café {
        id: i64,
        crème: String,
    }

    #[test]
    fn non_ascii_names_bind() {
        let descriptor = EntityDescriptor::build::<Café>(None);
        let predicate = Compiler::new(&descriptor, &SqliteAdapter).compile(&col("crème").eq("brûlée")).unwrap();
        let statement = sea_query::Query::delete()
            .from_table(Ident::bare(descriptor.table.as_str()))
            .and_where(predicate)
            .to_owned();
        let query = Query::build(&statement, &SqliteAdapter.query_builder()).unwrap();
        assert_eq!(query.sql, r#"DELETE FROM Cafés WHERE "crème" = ?"#);
        assert_eq!(query.params, vec![text("brûlée")]);
    }
}
