//! Tests against a live server, skipped when DATABASE_URL is not set

use std::env;

use wire_mysql::constant::{ER_BAD_DB_ERROR, ER_NO_SUCH_TABLE, ER_PARSE_ERROR};
use wire_mysql::Param;
use wire_mysql::error::Error;
use wire_mysql::tokio::Conn;

async fn get_conn() -> Option<Conn> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let Ok(url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };
    Some(Conn::new(url.as_str()).await.expect("Failed to connect"))
}

fn error_code(err: &Error) -> Option<u16> {
    err.server_error().map(|e| e.error_code)
}

#[tokio::test]
async fn utf8_strings_round_trip() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.simple_query(
        "CREATE TEMPORARY TABLE strings (id INT, s VARCHAR(255) CHARACTER SET utf8mb4)",
    )
    .await
    .unwrap();

    let inputs = [
        "",
        "vapor",
        "héllo wörld",
        "日本語のテキスト",
        "emoji 🦀🚀",
        "quote ' and backslash \\",
    ];
    for (id, s) in inputs.iter().enumerate() {
        conn.query("INSERT INTO strings VALUES (?, ?)", (id as i32, *s))
            .await
            .unwrap();
    }
    for (id, s) in inputs.iter().enumerate() {
        let rows = conn
            .query("SELECT s FROM strings WHERE id = ?", (id as i32,))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0).and_then(|v| v.as_str()), Some(*s));
    }
}

#[tokio::test]
async fn integer_boundaries_round_trip() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.simple_query(
        "CREATE TEMPORARY TABLE ints (a TINYINT, b SMALLINT, c MEDIUMINT, d INT, e BIGINT)",
    )
    .await
    .unwrap();

    let boundaries: [[i64; 5]; 3] = [
        [-128, -32_768, -8_388_608, i64::from(i32::MIN), i64::MIN],
        [127, 32_767, 8_388_607, i64::from(i32::MAX), i64::MAX],
        [0, -1, 1, -1, 0],
    ];
    for row in &boundaries {
        conn.query("INSERT INTO ints VALUES (?, ?, ?, ?, ?)", row)
            .await
            .unwrap();
    }

    let rows = conn.query("SELECT * FROM ints", ()).await.unwrap();
    assert_eq!(rows.len(), boundaries.len());
    for (row, expected) in rows.iter().zip(&boundaries) {
        let actual: Vec<Option<i64>> = row.iter().map(|(_, v)| v.as_i64()).collect();
        let expected: Vec<Option<i64>> = expected.iter().copied().map(Some).collect();
        assert_eq!(actual, expected);
    }

    // the text protocol agrees
    let rows = conn.simple_query("SELECT * FROM ints").await.unwrap();
    for (row, expected) in rows.iter().zip(&boundaries) {
        let actual: Vec<Option<i64>> = row.iter().map(|(_, v)| v.as_i64()).collect();
        let expected: Vec<Option<i64>> = expected.iter().copied().map(Some).collect();
        assert_eq!(actual, expected);
    }
}

#[tokio::test]
async fn null_parameter_reads_back_as_null() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.simple_query("CREATE TEMPORARY TABLE nulls (id INT, v VARCHAR(16), n BIGINT)")
        .await
        .unwrap();
    conn.query(
        "INSERT INTO nulls VALUES (?, ?, ?)",
        (1, None::<&str>, None::<i64>),
    )
    .await
    .unwrap();

    let rows = conn
        .query("SELECT v, n FROM nulls WHERE id = ?", (1,))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    for (_, value) in rows[0].iter() {
        assert!(value.is_null());
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_string(), None);
        assert_eq!(value.as_i64(), None);
        assert_eq!(value.as_bool(), None);
    }
}

#[tokio::test]
async fn syntax_error_is_a_server_error() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    let err = conn.simple_query("SELECT &").await.unwrap_err();
    assert_eq!(error_code(&err), Some(ER_PARSE_ERROR));

    let err = conn.query("SELECT &", ()).await.unwrap_err();
    assert_eq!(error_code(&err), Some(ER_PARSE_ERROR));

    let err = conn
        .query("SELECT * FROM no_such_table_here", ())
        .await
        .unwrap_err();
    assert_eq!(error_code(&err), Some(ER_NO_SUCH_TABLE));

    assert!(!conn.is_broken());
    let rows = conn.simple_query("SELECT 1").await.unwrap();
    assert_eq!(rows[0].get(0).and_then(|v| v.as_i64()), Some(1));
}

#[tokio::test]
async fn many_sequential_queries() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    for i in 0..1000i64 {
        let rows = conn.simple_query(&format!("SELECT {i}")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0).and_then(|v| v.as_i64()), Some(i));
    }
    conn.ping().await.unwrap();
}

#[tokio::test]
async fn foos_scenario() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.simple_query("CREATE TEMPORARY TABLE foos (id BIGINT SIGNED, name VARCHAR(64))")
        .await
        .unwrap();
    conn.query("INSERT INTO foos VALUES (?, ?)", (-1i64, "vapor"))
        .await
        .unwrap();
    assert_eq!(conn.affected_rows(), 1);

    for _ in 0..2 {
        let rows = conn
            .query("SELECT * FROM foos WHERE name = ?", ("vapor",))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].column("id").and_then(|v| v.as_i64()), Some(-1));
        assert_eq!(
            rows[0].column("name").and_then(|v| v.as_str()),
            Some("vapor")
        );
    }

    let rows = conn
        .simple_query("SELECT * FROM foos WHERE name = 'vapor'")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].to_string(), r#"{"id": "-1", "name": "vapor"}"#);
}

#[tokio::test]
async fn bool_round_trips_through_bit_column() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.simple_query("CREATE TEMPORARY TABLE flags (id INT, flag BIT(1))")
        .await
        .unwrap();
    conn.query("INSERT INTO flags VALUES (?, ?)", (1, true))
        .await
        .unwrap();
    conn.query("INSERT INTO flags VALUES (?, ?)", (2, false))
        .await
        .unwrap();

    let rows = conn
        .query("SELECT flag FROM flags ORDER BY id", ())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(0).and_then(|v| v.as_bool()), Some(true));
    assert_eq!(rows[1].get(0).and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        rows[0].get(0).map(|v| v.to_string()).as_deref(),
        Some("true")
    );
}

#[tokio::test]
async fn prepared_statement_reuse() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    let sum = conn
        .with_statement("SELECT CAST(? AS SIGNED) + CAST(? AS SIGNED)", async |conn, stmt| {
            let mut total = 0i64;
            for i in 0..5i64 {
                let rows = conn.execute(stmt, (i, i)).await?;
                total += rows[0].get(0).and_then(|v| v.as_i64()).unwrap_or_default();
            }
            Ok(total)
        })
        .await
        .unwrap();
    assert_eq!(sum, 20);
}

#[tokio::test]
async fn select_db_and_reset() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    conn.select_db("information_schema").await.unwrap();
    let rows = conn.simple_query("SELECT DATABASE()").await.unwrap();
    assert_eq!(
        rows[0].get(0).and_then(|v| v.as_str()),
        Some("information_schema")
    );

    conn.simple_query("SET @marker = 7").await.unwrap();
    conn.reset().await.unwrap();
    let rows = conn.simple_query("SELECT @marker").await.unwrap();
    assert!(rows[0].get(0).is_some_and(|v| v.is_null()));

    let err = conn.select_db("no_such_database_here").await.unwrap_err();
    assert_eq!(error_code(&err), Some(ER_BAD_DB_ERROR));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn select_version() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    let rows = conn.simple_query("SELECT @@version").await.unwrap();
    assert_eq!(rows.len(), 1);
    let version = rows[0].column("@@version").and_then(|v| v.as_str());
    assert!(version.is_some_and(|v| v.contains('.')), "{version:?}");
}

#[tokio::test]
async fn select_concat_of_params() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    let rows = conn
        .query("SELECT CONCAT(?, ?) AS test", ("hello", "world"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].column("test").and_then(|v| v.as_str()),
        Some("helloworld")
    );
}

#[tokio::test]
async fn kitchen_sink_types() {
    let Some(mut conn) = get_conn().await else {
        return;
    };
    let columns: Vec<(&str, &str, Box<dyn Param>, &str)> = vec![
        ("xchar", "CHAR(60)", Box::new("hello1"), "hello1"),
        ("xvarchar", "VARCHAR(61)", Box::new("hello2"), "hello2"),
        ("xtext", "TEXT(62)", Box::new("hello3"), "hello3"),
        ("xbinary", "BINARY(6)", Box::new("hello4"), "hello4"),
        ("xvarbinary", "VARBINARY(66)", Box::new("hello5"), "hello5"),
        ("xbit", "BIT", Box::new(true), "true"),
        ("xtinyint", "TINYINT(1)", Box::new(5i8), "5"),
        ("xsmallint", "SMALLINT(1)", Box::new(252i16), "252"),
        ("xvarcharnull", "VARCHAR(10)", Box::new(None::<&str>), "NULL"),
        ("xmediumint", "MEDIUMINT(1)", Box::new(1024i32), "1024"),
        ("xinteger", "INTEGER(1)", Box::new(1_024_293i32), "1024293"),
        ("xbigint", "BIGINT(1)", Box::new(234_234_234i64), "234234234"),
        ("name", "VARCHAR(10) NOT NULL", Box::new("vapor"), "vapor"),
    ];

    let definitions: Vec<String> = columns
        .iter()
        .map(|(name, ty, _, _)| format!("`{name}` {ty}"))
        .collect();
    conn.simple_query(&format!(
        "CREATE TEMPORARY TABLE kitchen_sink ({})",
        definitions.join(", ")
    ))
    .await
    .unwrap();

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut names = Vec::new();
    let mut params = Vec::new();
    let mut expected = Vec::new();
    for (name, _, param, rendered) in columns {
        names.push(name);
        params.push(param);
        expected.push(rendered);
    }
    let rows = conn
        .query(
            &format!("INSERT INTO kitchen_sink VALUES ({placeholders})"),
            params,
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    let binary = conn
        .query("SELECT * FROM kitchen_sink WHERE name = ?", ("vapor",))
        .await
        .unwrap();
    let text = conn
        .simple_query("SELECT * FROM kitchen_sink WHERE name = 'vapor'")
        .await
        .unwrap();
    assert_eq!(binary.len(), 1);
    assert_eq!(text.len(), 1);
    for (name, expected) in names.iter().zip(&expected) {
        let value = binary[0].column(name).unwrap();
        assert_eq!(value.to_string(), *expected, "binary {name}");
        let value = text[0].column(name).unwrap();
        assert_eq!(value.to_string(), *expected, "text {name}");
    }

    let sink = &binary[0];
    assert_eq!(sink.column("xbinary").and_then(|v| v.as_bytes()), Some(&b"hello4"[..]));
    assert_eq!(sink.column("xbit").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(sink.column("xsmallint").and_then(|v| v.as_i64()), Some(252));
    assert!(sink.column("xvarcharnull").is_some_and(|v| v.is_null()));
}
