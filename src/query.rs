//! SQL text generation
//!
//! Pure functions from table name and field descriptors to canonical SQL
//! text with positional `?` placeholders. Builders only assemble text and
//! never execute; each build writes into its own locally-scoped buffer.
//!
//! Generated subset:
//! - `CREATE TABLE IF NOT EXISTS t (c1 T1 NOT NULL,c2 T2)`
//! - `SELECT * FROM t [WHERE c1=? AND c2=?]`
//! - `INSERT INTO t VALUES (?, ?, ...)`
//! - `UPDATE t SET c1=?,c2=? WHERE ...`
//! - `DELETE FROM t WHERE ...`
//! - `DROP TABLE t`

use crate::schema::FieldDescriptor;
use crate::{Error, Result};

fn check_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(Error::Configuration(
            "cannot build a query for an empty table name".to_string(),
        ));
    }
    Ok(())
}

/// CREATE TABLE with one column clause per field, in declared order,
/// each NOT NULL unless marked nullable.
pub fn create_table(table: &str, fields: &[FieldDescriptor]) -> Result<String> {
    check_table(table)?;

    let mut query = String::new();
    query.push_str("CREATE TABLE IF NOT EXISTS ");
    query.push_str(table);
    query.push_str(" (");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            query.push(',');
        }
        query.push_str(&field.column);
        query.push(' ');
        query.push_str(&field.sql_type.render());
        if !field.nullable {
            query.push_str(" NOT NULL");
        }
    }
    query.push(')');
    Ok(query)
}

/// SELECT * with an optional conjunctive WHERE clause.
pub fn select(table: &str, where_columns: &[&str]) -> Result<String> {
    check_table(table)?;

    let mut query = String::new();
    query.push_str("SELECT * FROM ");
    query.push_str(table);
    push_where(&mut query, where_columns);
    Ok(query)
}

/// INSERT with one positional placeholder per field, in declared order.
pub fn insert(table: &str, field_count: usize) -> Result<String> {
    check_table(table)?;

    let mut query = String::new();
    query.push_str("INSERT INTO ");
    query.push_str(table);
    query.push_str(" VALUES (");
    for i in 0..field_count {
        if i > 0 {
            query.push_str(", ");
        }
        query.push('?');
    }
    query.push(')');
    Ok(query)
}

/// UPDATE setting every field in declared order, then the WHERE clause.
pub fn update(table: &str, fields: &[FieldDescriptor], where_columns: &[&str]) -> Result<String> {
    check_table(table)?;

    let mut query = String::new();
    query.push_str("UPDATE ");
    query.push_str(table);
    query.push_str(" SET ");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            query.push(',');
        }
        query.push_str(&field.column);
        query.push_str("=?");
    }
    push_where(&mut query, where_columns);
    Ok(query)
}

/// DELETE scoped by the WHERE clause.
pub fn delete(table: &str, where_columns: &[&str]) -> Result<String> {
    check_table(table)?;

    let mut query = String::new();
    query.push_str("DELETE FROM ");
    query.push_str(table);
    push_where(&mut query, where_columns);
    Ok(query)
}

/// DROP TABLE, table-scoped.
pub fn drop(table: &str) -> Result<String> {
    check_table(table)?;
    Ok(format!("DROP TABLE {}", table))
}

fn push_where(query: &mut String, columns: &[&str]) {
    if columns.is_empty() {
        return;
    }
    query.push_str(" WHERE ");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            query.push_str(" AND ");
        }
        query.push_str(column);
        query.push_str("=?");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NativeKind, SqlType};

    fn descriptor(column: &str, sql_type: SqlType, nullable: bool) -> FieldDescriptor {
        FieldDescriptor {
            logical: "ignored",
            column: column.to_string(),
            sql_type,
            native: NativeKind::Text,
            nullable,
            codec: NativeKind::Text.codec_kind(),
            primary: false,
        }
    }

    #[test]
    fn test_create_table_shape() {
        let fields = vec![
            descriptor("tag", SqlType::Text, false),
            descriptor("name", SqlType::Text, true),
            descriptor("level", SqlType::Int, false),
        ];
        let sql = create_table("clans", &fields).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS clans (tag TEXT NOT NULL,name TEXT,level INT NOT NULL)"
        );
    }

    #[test]
    fn test_select_with_and_without_where() {
        assert_eq!(select("users", &[]).unwrap(), "SELECT * FROM users");
        assert_eq!(
            select("users", &["clan_tag", "membership"]).unwrap(),
            "SELECT * FROM users WHERE clan_tag=? AND membership=?"
        );
    }

    #[test]
    fn test_insert_placeholders() {
        assert_eq!(
            insert("users", 4).unwrap(),
            "INSERT INTO users VALUES (?, ?, ?, ?)"
        );
        assert_eq!(insert("users", 1).unwrap(), "INSERT INTO users VALUES (?)");
    }

    #[test]
    fn test_update_sets_all_fields_in_order() {
        let fields = vec![
            descriptor("tag", SqlType::Text, false),
            descriptor("name", SqlType::Text, false),
        ];
        assert_eq!(
            update("clans", &fields, &["tag"]).unwrap(),
            "UPDATE clans SET tag=?,name=? WHERE tag=?"
        );
    }

    #[test]
    fn test_delete_and_drop() {
        assert_eq!(
            delete("users", &["unique_id"]).unwrap(),
            "DELETE FROM users WHERE unique_id=?"
        );
        assert_eq!(drop("users").unwrap(), "DROP TABLE users");
    }

    #[test]
    fn test_empty_table_name_is_rejected() {
        assert!(create_table("", &[]).is_err());
        assert!(select("", &[]).is_err());
        assert!(insert("", 1).is_err());
        assert!(drop("").is_err());
    }

    #[test]
    fn test_builds_are_deterministic() {
        let fields = vec![descriptor("a", SqlType::Int, false)];
        let first = create_table("t", &fields).unwrap();
        let second = create_table("t", &fields).unwrap();
        assert_eq!(first, second);
    }
}
