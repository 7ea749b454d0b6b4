use triplestack::{
    MemoryBackend, SharedBackend, SqliteBackend, Statement, StatementBackend, StatementPattern,
    Term,
};
use std::sync::Arc;

fn engines() -> Vec<(&'static str, SharedBackend)> {
    let memory: SharedBackend = Arc::new(MemoryBackend::new());
    let sqlite: SharedBackend = Arc::new(SqliteBackend::open_in_memory().expect("sqlite"));
    vec![("memory", memory), ("sqlite", sqlite)]
}

fn sample() -> Vec<Statement> {
    vec![
        Statement::new("ex:alice", "ex:knows", "ex:bob"),
        Statement::new("ex:alice", "ex:knows", "ex:carol").in_context("ex:g1"),
        Statement::new("ex:bob", "ex:name", Term::literal("Bob")).in_context("ex:g2"),
        Statement::new("ex:alice", "rdf:type", "ex:Person").inferred(),
    ]
}

fn count(backend: &SharedBackend, pattern: &StatementPattern) -> usize {
    backend
        .query(pattern)
        .expect("query")
        .count_statements()
        .expect("count")
}

#[test]
fn test_absence_is_never_an_error() {
    for (name, engine) in engines() {
        let missing = Statement::new("ex:nobody", "ex:p", "ex:o");
        assert_eq!(count(&engine, &StatementPattern::exact(&missing)), 0, "{name}");
        engine.remove(&missing).unwrap();
        assert!(!engine.remove_by_query(&StatementPattern::exact(&missing)).unwrap(), "{name}");
        assert_eq!(engine.estimated_size().unwrap(), 0, "{name}");
    }
}

#[test]
fn test_patterns_select_by_slot_context_and_flag() {
    for (name, engine) in engines() {
        engine.add_all(&sample()).unwrap();

        assert_eq!(count(&engine, &StatementPattern::any()), 3, "{name}");
        assert_eq!(count(&engine, &StatementPattern::any().inferred(true)), 1, "{name}");
        assert_eq!(
            count(&engine, &StatementPattern::any().subject("ex:alice")),
            2,
            "{name}"
        );
        assert_eq!(
            count(&engine, &StatementPattern::any().default_context()),
            1,
            "{name}"
        );
        assert_eq!(
            count(&engine, &StatementPattern::any().context("ex:g1").context("ex:g2")),
            2,
            "{name}"
        );
        assert_eq!(
            count(&engine, &StatementPattern::any().object(Term::literal("Bob"))),
            1,
            "{name}"
        );
        assert_eq!(
            count(&engine, &StatementPattern::any().object("Bob")),
            0,
            "{name}"
        );
        assert_eq!(engine.estimated_size().unwrap(), 4, "{name}");
    }
}

#[test]
fn test_duplicate_add_is_idempotent() {
    for (name, engine) in engines() {
        let statement = Statement::new("ex:s", "ex:p", "ex:o");
        engine.add(&statement).unwrap();
        engine.add(&statement).unwrap();
        assert_eq!(count(&engine, &StatementPattern::exact(&statement)), 1, "{name}");
    }
}

#[test]
fn test_statements_visible_before_read_flush_stay_visible() {
    for (name, engine) in engines() {
        let statement = Statement::new("ex:s", "ex:p", "ex:o");
        engine.add(&statement).unwrap();
        assert_eq!(count(&engine, &StatementPattern::any()), 1, "{name}");
        engine.flush_for_reading().unwrap();
        assert_eq!(count(&engine, &StatementPattern::any()), 1, "{name}");
        engine.flush_for_commit().unwrap();
        assert_eq!(count(&engine, &StatementPattern::any()), 1, "{name}");
    }
}

#[test]
fn test_clear_every_context_leaves_other_flag() {
    for (name, engine) in engines() {
        engine.add_all(&sample()).unwrap();
        engine.clear(false, &[]).unwrap();
        assert_eq!(count(&engine, &StatementPattern::any()), 0, "{name}");
        assert_eq!(count(&engine, &StatementPattern::any().inferred(true)), 1, "{name}");
    }
}

#[test]
fn test_remove_by_query_reports_matches() {
    for (name, engine) in engines() {
        engine.add_all(&sample()).unwrap();
        let knows = StatementPattern::any().predicate("ex:knows");
        assert!(engine.remove_by_query(&knows).unwrap(), "{name}");
        assert!(!engine.remove_by_query(&knows).unwrap(), "{name}");
        assert_eq!(count(&engine, &StatementPattern::any()), 1, "{name}");
    }
}

#[test]
fn test_stream_survives_concurrent_write() {
    for (name, engine) in engines() {
        engine.add_all(&sample()).unwrap();
        let mut stream = engine.query(&StatementPattern::any()).unwrap();
        assert!(stream.next().is_some());
        engine
            .add(&Statement::new("ex:dave", "ex:knows", "ex:alice"))
            .unwrap();
        let rest = stream.count_statements().unwrap();
        assert_eq!(rest, 2, "{name}");
    }
}
