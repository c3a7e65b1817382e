//! Session integration tests.
//!
//! Runs statements end to end against a real database. Every table is a
//! temporary table so nothing outlives the connection.

use pgscratch::config::{ConnectionTarget, SessionConfig};
use pgscratch::display::{Anchor, BufferSink, Display};
use pgscratch::render::RenderMode;
use pgscratch::session::{ConnectionState, Session};
use pgscratch::ScratchError;

/// Helper to create a connected session, or None without DATABASE_URL.
async fn get_test_session() -> Option<Session> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let target = ConnectionTarget::resolve(&url, &[]).ok()?;

    let mut display = Display::with_sink(Box::new(BufferSink::new(Anchor::Bottom)));
    let mut session = Session::new(&SessionConfig::default());
    session.init(target, false, &mut display).await.ok()?;
    Some(session)
}

#[tokio::test]
async fn test_select_renders_headers() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session
        .execute("create temp table users (id int primary key, email text)")
        .await
        .unwrap();
    session
        .execute("insert into users values (1, 'a@example.com'), (2, null)")
        .await
        .unwrap();

    let output = session.execute("select * from users order by id").await.unwrap();

    let header = &output.lines()[1];
    assert!(header.contains("id") && header.contains("email"));
    assert!(output.lines().iter().any(|l| l.contains("'a@example.com'")));
    assert!(output.lines().iter().any(|l| l.contains("NULL")));
    assert_eq!(output.lines().last().unwrap(), "");

    let (headers, rows) = session.last_result().unwrap();
    assert_eq!(headers[0].name, "id");
    assert_eq!(rows.len(), 2);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_implicit_limit_caps_rows() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.set_render_mode(RenderMode::Compact);
    let output = session
        .execute("select n from generate_series(1, 500) as n;")
        .await
        .unwrap();

    // One header line, 200 rows and the trailing blank line.
    assert_eq!(output.lines().len(), 202);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_reports_commit() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.execute("create temp table t (x int)").await.unwrap();
    let output = session.execute("insert into t(x) values (1)").await.unwrap();

    assert_eq!(
        output.lines(),
        &["\"insert into t(x) values (1)\" committed".to_string()]
    );
    assert!(session.last_result().is_none());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_constraint_violation_recovers() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session
        .execute("create temp table accounts (id int primary key)")
        .await
        .unwrap();
    session
        .execute("insert into accounts values (1)")
        .await
        .unwrap();

    let output = session
        .execute("insert into accounts values (1)")
        .await
        .unwrap();

    assert!(output.lines()[0].starts_with("ERROR:  duplicate key"));
    assert_eq!(session.state(), ConnectionState::Connected);

    let output = session.execute("select count(*) as n from accounts").await.unwrap();
    assert!(output.lines().iter().any(|l| l.contains('1')));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_output() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let output = session.execute("select from where").await.unwrap();

    assert!(output.lines()[0].starts_with("ERROR:"));
    assert!(session.execute("select 1 as ok").await.is_ok());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_drop_schema_refused_on_remote_target() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    if session.is_local() {
        eprintln!("Skipping test: DATABASE_URL points at a local server");
        return;
    }

    let result = session.execute("drop schema public cascade").await;
    assert!(matches!(result, Err(ScratchError::PolicyViolation(_))));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_toggle_changes_timestamp_rendering() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.set_render_mode(RenderMode::Compact);
    let sql = "select '2024-01-02 03:04:05'::timestamp as at";

    let before = session.execute(sql).await.unwrap();
    session.toggle_display_mode();
    let after = session.execute(sql).await.unwrap();

    assert_eq!(before.lines()[1], "[\"<timestamp>(2024-01-02)\"]");
    assert_eq!(after.lines()[1], "[\"<timestamp>(2024-01-02T03:04:05)\"]");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_vacuum_runs_outside_transaction() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.execute("create temp table v (x int)").await.unwrap();
    let output = session.execute("vacuum v").await.unwrap();

    assert_eq!(output.lines(), &["\"vacuum v\" committed".to_string()]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_introspection_helpers() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let output = session.all_tables().await.unwrap();
    assert!(output.lines()[1].contains("table_name"));

    let output = session.all_foreign_keys().await.unwrap();
    assert!(output.lines()[1].contains("table_from"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_select_after_alter_sees_new_column() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.set_render_mode(RenderMode::Compact);
    // An empty table makes the select go through describe.
    session.execute("create temp table pq (x int)").await.unwrap();
    let output = session.execute("select * from pq").await.unwrap();
    assert_eq!(output.lines()[0], "[\"x\"]");

    session
        .execute("alter table pq add column y int")
        .await
        .unwrap();

    for _ in 0..2 {
        let output = session.execute("select * from pq").await.unwrap();
        assert_eq!(output.lines()[0], "[\"x\", \"y\"]");
    }

    session.execute("insert into pq values (1)").await.unwrap();
    let output = session.execute("select * from pq").await.unwrap();
    assert_eq!(output.lines()[1], "[\"1\", \"NULL\"]");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_values_without_a_variant_render_as_text_form() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.set_render_mode(RenderMode::Compact);
    let output = session
        .execute(
            "select 'NaN'::numeric as nan, array[1,2] as arr, \
             interval '1 day' as iv, '10.0.0.1'::inet as ip",
        )
        .await
        .unwrap();

    assert_eq!(output.lines()[1], "[\"NaN\", \"{1,2}\", \"1 day\", \"10.0.0.1\"]");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_multiple_statements_on_one_line() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.set_render_mode(RenderMode::Compact);
    let output = session
        .execute("create temp table m(x int); insert into m values (1);")
        .await
        .unwrap();
    assert!(output.lines()[0].ends_with("committed"));

    let output = session.execute("select count(*) as n from m").await.unwrap();
    assert_eq!(output.lines()[1], "[\"1\"]");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_vacuum_after_rejected_statement() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.execute("create temp table w (x int)").await.unwrap();
    let output = session.execute("select * from no_such_table").await.unwrap();
    assert!(output.lines()[0].starts_with("ERROR:"));

    // VACUUM is refused inside a transaction block, so a dangling one fails here.
    let output = session.execute("vacuum w").await.unwrap();
    assert_eq!(output.lines(), &["\"vacuum w\" committed".to_string()]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_typed_commit_leaves_no_transaction_open() {
    let Some(mut session) = get_test_session().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    session.execute("create temp table c (x int)").await.unwrap();
    let output = session.execute("commit").await.unwrap();
    assert_eq!(output.lines(), &["\"commit\" committed".to_string()]);

    let output = session.execute("vacuum c").await.unwrap();
    assert_eq!(output.lines(), &["\"vacuum c\" committed".to_string()]);
    assert!(session.execute("insert into c values (1)").await.is_ok());
    assert_eq!(session.state(), ConnectionState::Connected);

    session.close().await.unwrap();
}
