//! Integration tests for filtered, paged and cursor queries against `SQLite`.
//!
//! Tests the public API as users would interact with it.

#![allow(missing_docs)]

mod common;

use common::{Item, User, sqlite};
use tabula_orm::expr::{Expr, col};
use tabula_orm::{Error, SqlMapper};
use tabula_sql::SqliteConnection;

fn seed_users(conn: &SqliteConnection, names: &[&str]) {
    let users: Vec<User> = names
        .iter()
        .map(|name| User {
            id: 0,
            name: (*name).to_string(),
            email: None,
        })
        .collect();
    SqlMapper::new().insert(conn, &users[..]).unwrap();
}

fn seed_items(conn: &SqliteConnection, count: i32) {
    let items: Vec<Item> = (1..=count)
        .map(|n| Item {
            id: 0,
            name: format!("item-{n}"),
            count: n,
        })
        .collect();
    SqlMapper::new().insert(conn, &items[..]).unwrap();
}

fn ids(users: &[User]) -> Vec<i64> {
    users.iter().map(|u| u.id).collect()
}

#[test]
fn fetch_with_and_without_filters() {
    let conn = sqlite();
    seed_users(&conn, &["foo", "bar", "boo"]);
    let mapper = SqlMapper::new();

    let all = mapper.select::<User>(&conn).fetch().unwrap();
    assert_eq!(all.len(), 3);

    let bar = mapper.select::<User>(&conn).where_if(true, col("name").eq("bar")).fetch().unwrap();
    assert_eq!(ids(&bar), [2]);

    // a false condition drops the predicate
    let skipped =
        mapper.select::<User>(&conn).where_if(false, col("name").eq("bar")).fetch().unwrap();
    assert_eq!(skipped.len(), 3);
}

#[test]
fn successive_predicates_are_combined() {
    let conn = sqlite();
    seed_users(&conn, &["foo", "bar", "boo"]);

    let users = SqlMapper::new()
        .select::<User>(&conn)
        .where_if(true, col("name").starts_with("b"))
        .where_if(true, col("id").gt(2))
        .fetch()
        .unwrap();
    assert_eq!(ids(&users), [3]);
}

#[test]
fn or_and_negation() {
    let conn = sqlite();
    seed_users(&conn, &["foo", "bar", "boo"]);
    let mapper = SqlMapper::new();

    let users = mapper
        .select::<User>(&conn)
        .where_if(true, col("name").eq("foo").or(col("name").eq("boo")))
        .order_by_desc("id")
        .fetch()
        .unwrap();
    assert_eq!(ids(&users), [3, 1]);

    let users = mapper.select::<User>(&conn).where_if(true, col("name").ne("bar")).fetch().unwrap();
    assert_eq!(ids(&users), [1, 3]);

    // negation only translates for list membership
    let err = mapper.select::<User>(&conn).where_if(true, !col("name").eq("bar")).fetch().unwrap_err();
    assert!(matches!(err, Error::UnsupportedPredicate { .. }), "{err}");
}

#[test]
fn null_comparisons() {
    let conn = sqlite();
    seed_users(&conn, &["a", "b"]);
    conn.execute_batch("UPDATE users SET email = 'b@example.com' WHERE id = 2").unwrap();
    let mapper = SqlMapper::new();

    let without = mapper
        .select::<User>(&conn)
        .where_if(true, col("email").eq(Option::<String>::None))
        .fetch()
        .unwrap();
    assert_eq!(ids(&without), [1]);

    let with = mapper
        .select::<User>(&conn)
        .where_if(true, col("email").ne(Option::<String>::None))
        .fetch()
        .unwrap();
    assert_eq!(ids(&with), [2]);
}

#[test]
fn constant_on_the_left_is_flipped() {
    let conn = sqlite();
    seed_users(&conn, &["a", "b", "c"]);

    let predicate = Expr::binary(tabula_orm::expr::BinaryOp::Lt, tabula_orm::expr::val(1), col("id"));
    let users = SqlMapper::new().select::<User>(&conn).where_if(true, predicate).fetch().unwrap();
    assert_eq!(ids(&users), [2, 3]);
}

#[test]
fn like_arguments_are_escaped() {
    let conn = sqlite();
    seed_users(&conn, &["100%", "100 percent", "a_b", "axb", r"back\slash"]);
    let mapper = SqlMapper::new();

    let percent =
        mapper.select::<User>(&conn).where_if(true, col("name").contains("%")).fetch().unwrap();
    assert_eq!(ids(&percent), [1]);

    let underscore =
        mapper.select::<User>(&conn).where_if(true, col("name").starts_with("a_")).fetch().unwrap();
    assert_eq!(ids(&underscore), [3]);

    let suffix =
        mapper.select::<User>(&conn).where_if(true, col("name").ends_with("percent")).fetch().unwrap();
    assert_eq!(ids(&suffix), [2]);

    let backslash =
        mapper.select::<User>(&conn).where_if(true, col("name").contains(r"\s")).fetch().unwrap();
    assert_eq!(ids(&backslash), [5]);
}

#[test]
fn membership_tests() {
    let conn = sqlite();
    seed_users(&conn, &["a", "b", "c"]);
    let mapper = SqlMapper::new();

    let some = mapper.select::<User>(&conn).where_if(true, col("id").is_in([1_i64, 3])).fetch().unwrap();
    assert_eq!(ids(&some), [1, 3]);

    let none =
        mapper.select::<User>(&conn).where_if(true, col("id").is_in(Vec::<i64>::new())).fetch().unwrap();
    assert!(none.is_empty());

    let all =
        mapper.select::<User>(&conn).where_if(true, col("id").not_in(Vec::<i64>::new())).fetch().unwrap();
    assert_eq!(all.len(), 3);

    let rest = mapper.select::<User>(&conn).where_if(true, col("name").not_in(["a"])).fetch().unwrap();
    assert_eq!(ids(&rest), [2, 3]);
}

#[test]
fn count_matches() {
    let conn = sqlite();
    seed_users(&conn, &["foo", "bar", "boo"]);
    let mapper = SqlMapper::new();

    assert_eq!(mapper.select::<User>(&conn).count().unwrap(), 3);
    assert_eq!(mapper.select::<User>(&conn).where_if(true, col("name").contains("o")).count().unwrap(), 2);
}

#[test]
fn paged_query() {
    let conn = sqlite();
    seed_users(&conn, &["foo", "bar", "boo"]);

    let page = SqlMapper::new()
        .select::<User>(&conn)
        .where_if(true, col("name").contains("o"))
        .order_by_desc("id")
        .fetch_page(1, 2)
        .unwrap();

    assert_eq!(ids(&page.items), [3, 1]);
    assert_eq!(page.items[0].name, "boo");
    assert_eq!(page.items[1].name, "foo");
    assert_eq!(page.total_items, 2);
    assert_eq!(page.page, 1);
    assert_eq!(page.items_per_page, 2);
    assert_eq!(page.total_pages(), 1);
    assert!(!page.has_next());
}

#[test]
fn paged_query_uses_default_sort() {
    let conn = sqlite();
    seed_items(&conn, 5);
    let mapper = SqlMapper::new();

    let page = mapper.select::<Item>(&conn).fetch_page(2, 2).unwrap();
    let counts: Vec<i32> = page.items.iter().map(|i| i.count).collect();
    assert_eq!(counts, [3, 4]);
    assert_eq!(page.total_pages(), 3);
    assert!(page.has_next());

    // pages below one are clamped
    let first = mapper.select::<Item>(&conn).fetch_page(0, 0).unwrap();
    assert_eq!(first.page, 1);
    assert_eq!(first.items_per_page, 1);
    assert_eq!(first.items.len(), 1);

    let past_end = mapper.select::<Item>(&conn).fetch_page(9, 2).unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total_items, 5);
}

#[test]
fn huge_pages_are_clamped_not_wrapped() {
    let conn = sqlite();
    seed_items(&conn, 5);
    let mapper = SqlMapper::new();

    let far = mapper.select::<Item>(&conn).fetch_page(1 << 62, 4).unwrap();
    assert!(far.items.is_empty());
    assert_eq!(far.total_items, 5);

    let everything = mapper.select::<Item>(&conn).fetch_page(1, u64::MAX).unwrap();
    assert_eq!(everything.items.len(), 5);
    assert!(!everything.has_next());

    let last = mapper.select::<Item>(&conn).fetch_page(u64::MAX, u64::MAX).unwrap();
    assert!(last.items.is_empty());
}

#[test]
fn cursor_page_size_saturates() {
    let conn = sqlite();
    seed_items(&conn, 5);

    let page = SqlMapper::new().select::<Item>(&conn).fetch_cursor(None, u64::MAX).unwrap();
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.page_size, u64::MAX);
    assert!(!page.has_next);
    assert!(page.next_cursor.is_none());
}

#[test]
fn paging_requires_an_ordering() {
    let conn = sqlite();
    let err = SqlMapper::new().select::<User>(&conn).fetch_page(1, 10).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)), "{err}");

    let err = SqlMapper::new().select::<User>(&conn).fetch_cursor(None, 10).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)), "{err}");
}

#[test]
fn cursor_pages_forward() {
    let conn = sqlite();
    seed_items(&conn, 5);
    let mapper = SqlMapper::new();

    let first = mapper.select::<Item>(&conn).fetch_cursor(None, 2).unwrap();
    assert_eq!(first.items.iter().map(|i| i.count).collect::<Vec<_>>(), [1, 2]);
    assert!(first.has_next);
    let cursor = first.next_cursor.unwrap();

    let second = mapper.select::<Item>(&conn).fetch_cursor(Some(&cursor), 2).unwrap();
    assert_eq!(second.items.iter().map(|i| i.count).collect::<Vec<_>>(), [3, 4]);
    let cursor = second.next_cursor.unwrap();

    let last = mapper.select::<Item>(&conn).fetch_cursor(Some(&cursor), 2).unwrap();
    assert_eq!(last.items.iter().map(|i| i.count).collect::<Vec<_>>(), [5]);
    assert!(!last.has_next);
    assert!(last.next_cursor.is_none());
}

#[test]
fn cursor_pages_backward_with_filter() {
    let conn = sqlite();
    seed_items(&conn, 6);
    let mapper = SqlMapper::new();
    let query = || mapper.select::<Item>(&conn).where_if(true, col("count").ne(3)).order_by_desc("id");

    let first = query().fetch_cursor(None, 3).unwrap();
    assert_eq!(first.items.iter().map(|i| i.id).collect::<Vec<_>>(), [6, 5, 4]);

    let second = query().fetch_cursor(first.next_cursor.as_deref(), 3).unwrap();
    assert_eq!(second.items.iter().map(|i| i.id).collect::<Vec<_>>(), [2, 1]);
    assert!(!second.has_next);
}

#[test]
fn malformed_cursor_is_rejected() {
    let conn = sqlite();
    let err = SqlMapper::new().select::<Item>(&conn).fetch_cursor(Some("not a cursor"), 2).unwrap_err();
    assert!(matches!(err, Error::InvalidCursor(_)), "{err}");
}

#[test]
fn compile_errors_surface_from_terminal_methods() {
    let conn = sqlite();
    let mapper = SqlMapper::new();

    let err = mapper.select::<User>(&conn).where_if(true, col("nickname").eq("x")).fetch().unwrap_err();
    assert!(matches!(err, Error::UnknownProperty { .. }), "{err}");

    let unsupported = Expr::binary(tabula_orm::expr::BinaryOp::Add, col("id"), tabula_orm::expr::val(1));
    let err = mapper.select::<User>(&conn).where_if(true, unsupported).count().unwrap_err();
    assert!(matches!(err, Error::UnsupportedPredicate { .. }), "{err}");

    let err = mapper.select::<User>(&conn).order_by("nickname").fetch().unwrap_err();
    assert!(matches!(err, Error::UnknownProperty { .. }), "{err}");
}

#[test]
fn global_mapper_shares_caches() {
    let conn = sqlite();
    seed_users(&conn, &["a"]);

    let mapper = SqlMapper::global();
    assert!(std::ptr::eq(mapper, SqlMapper::global()));
    let first = mapper.describe::<User>();
    assert!(std::sync::Arc::ptr_eq(&first, &mapper.describe::<User>()));
    assert_eq!(mapper.get_all::<User>(&conn).unwrap().len(), 1);
}

#[test]
fn pages_concatenate_to_the_full_result() {
    let conn = sqlite();
    seed_items(&conn, 7);
    let mapper = SqlMapper::new();
    let filter = || col("count").gte(2);

    let full: Vec<i64> = mapper
        .select::<Item>(&conn)
        .where_if(true, filter())
        .order_by_desc("count")
        .fetch()
        .unwrap()
        .iter()
        .map(|i| i.id)
        .collect();

    let mut paged = Vec::new();
    let mut page = 1;
    loop {
        let result = mapper
            .select::<Item>(&conn)
            .where_if(true, filter())
            .order_by_desc("count")
            .fetch_page(page, 4)
            .unwrap();
        assert_eq!(result.total_items, 6);
        paged.extend(result.items.iter().map(|i| i.id));
        if !result.has_next() {
            break;
        }
        page += 1;
    }

    assert_eq!(page, 2);
    assert_eq!(paged, full);
    assert_eq!(full, [7, 6, 5, 4, 3, 2]);
}
