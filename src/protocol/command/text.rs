use crate::constant::CommandByte;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::r#trait::params::Params;

/// Write COM_QUERY command
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql.as_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexer {
    Sql,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Substitute each `?` placeholder of `sql` with the SQL literal of the matching parameter.
///
/// Placeholders inside string literals, quoted identifiers and comments are left alone.
/// The number of placeholders must equal the number of parameters.
pub fn interpolate<P: Params + ?Sized>(
    sql: &str,
    params: &P,
    no_backslash_escapes: bool,
) -> Result<String> {
    let mut literals = Vec::with_capacity(params.len());
    params.visit(&mut |param| {
        let mut literal = String::new();
        param.write_sql_literal(&mut literal, no_backslash_escapes)?;
        literals.push(literal);
        Ok(())
    })?;

    let mut out = String::with_capacity(sql.len() + literals.iter().map(String::len).sum::<usize>());
    let mut literals = literals.into_iter();
    let mut placeholders = 0usize;
    let mut state = Lexer::Sql;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Lexer::Sql => match c {
                '?' => {
                    placeholders += 1;
                    if let Some(literal) = literals.next() {
                        out.push_str(&literal);
                    }
                    continue;
                }
                '\'' | '"' | '`' => state = Lexer::Quoted(c),
                '#' => state = Lexer::LineComment,
                '-' if chars.peek() == Some(&'-') => {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    if chars.peek().is_none_or(|c| c.is_whitespace()) {
                        state = Lexer::LineComment;
                    }
                    continue;
                }
                '/' if chars.peek() == Some(&'*') => state = Lexer::BlockComment,
                _ => {}
            },
            Lexer::Quoted(quote) => {
                if c == '\\' && quote != '`' && !no_backslash_escapes {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                // a doubled quote stays inside the literal
                if c == quote {
                    if chars.peek() == Some(&quote) {
                        out.push(c);
                        chars.next();
                    } else {
                        state = Lexer::Sql;
                    }
                }
            }
            Lexer::LineComment => {
                if c == '\n' {
                    state = Lexer::Sql;
                }
            }
            Lexer::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push(c);
                    chars.next();
                    out.push('/');
                    state = Lexer::Sql;
                    continue;
                }
            }
        }
        out.push(c);
    }

    if placeholders != params.len() {
        return Err(Error::BadUsageError(format!(
            "query has {} placeholders but {} parameters were given",
            placeholders,
            params.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_query_packet() {
        let mut out = Vec::new();
        write_query(&mut out, "SELECT 1");
        assert_eq!(out, b"\x03SELECT 1");
    }

    #[test]
    fn interpolates_placeholders_in_order() {
        let sql = interpolate("SELECT * FROM foos WHERE id = ? AND bar = ?", &(1i32, "it's"), false).unwrap();
        assert_eq!(sql, r"SELECT * FROM foos WHERE id = 1 AND bar = 'it\'s'");

        let sql = interpolate("INSERT INTO t VALUES (?, ?)", &(None::<i32>, "x"), true).unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES (NULL, 'x')");
    }

    #[test]
    fn ignores_question_marks_in_quotes_and_comments() {
        let sql = interpolate(
            "SELECT '?', \"?\", `a?b`, 'it''s ?', 'esc \\' ?' -- ?\n, ? /* ? */ # ?",
            &(5u8,),
            false,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT '?', \"?\", `a?b`, 'it''s ?', 'esc \\' ?' -- ?\n, 5 /* ? */ # ?"
        );
    }

    #[test]
    fn double_dash_without_space_is_an_operator() {
        let sql = interpolate("SELECT 1--?", &(2i64,), false).unwrap();
        assert_eq!(sql, "SELECT 1--2");
    }

    #[test]
    fn placeholder_count_mismatch() {
        assert!(matches!(
            interpolate("SELECT ?", &(), false),
            Err(Error::BadUsageError(_))
        ));
        assert!(matches!(
            interpolate("SELECT 1", &(1i32,), false),
            Err(Error::BadUsageError(_))
        ));
    }
}
