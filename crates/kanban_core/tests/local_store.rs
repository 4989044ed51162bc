use kanban_core::db::open_db;
use kanban_core::repo::local_store::STORAGE_KEY;
use kanban_core::{
    BackendError, NoteBackend, NoteBoard, NoteDraft, NoteId, NoteStatus, SqliteLocalStore,
};

fn draft(title: &str) -> NoteDraft {
    NoteDraft::parse(title, "").unwrap()
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let store = SqliteLocalStore::open_in_memory().unwrap();
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn notes_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");

    let created = {
        let store = SqliteLocalStore::open(&path).unwrap();
        let first = store.create(&draft("first")).await.unwrap();
        let second = store.create(&draft("second")).await.unwrap();
        store
            .update_status(&second.id, NoteStatus::Complete)
            .await
            .unwrap();
        vec![first.id, second.id]
    };

    let store = SqliteLocalStore::open(&path).unwrap();
    let notes = store.list().await.unwrap();
    let ids: Vec<_> = notes.iter().map(|note| note.id.clone()).collect();
    assert_eq!(ids, created);
    assert_eq!(notes[0].status, NoteStatus::Todo);
    assert_eq!(notes[1].status, NoteStatus::Complete);
    assert!(notes[0].created_at.is_some());
}

#[tokio::test]
async fn corrupt_value_reads_as_empty_board() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.sqlite3");
    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, '{not json');",
            [STORAGE_KEY],
        )
        .unwrap();
    }

    let store = SqliteLocalStore::open(&path).unwrap();
    assert!(store.list().await.unwrap().is_empty());

    let note = store.create(&draft("fresh start")).await.unwrap();
    let notes = store.list().await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, note.id);
}

#[tokio::test]
async fn legacy_records_with_null_fields_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");
    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2);",
            [
                STORAGE_KEY,
                r#"[{"id":7,"title":"old","content":null,"status":null},
                    {"id":"x","title":"odd","status":"archived"}]"#,
            ],
        )
        .unwrap();
    }

    let store = SqliteLocalStore::open(&path).unwrap();
    let notes = store.list().await.unwrap();
    assert_eq!(notes[0].id, NoteId::new("7"));
    assert_eq!(notes[0].content, "");
    assert_eq!(notes[0].status, NoteStatus::Todo);
    assert_eq!(notes[1].status, NoteStatus::Todo);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let store = SqliteLocalStore::open_in_memory().unwrap();
    let missing = NoteId::new("missing");

    assert!(matches!(
        store.update(&missing, &draft("x")).await,
        Err(BackendError::NotFound(_))
    ));
    assert!(matches!(
        store.update_status(&missing, NoteStatus::Doing).await,
        Err(BackendError::NotFound(_))
    ));
    assert!(matches!(
        store.delete(&missing).await,
        Err(BackendError::NotFound(_))
    ));
}

#[tokio::test]
async fn stores_with_different_keys_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");

    let main = SqliteLocalStore::with_key(open_db(&path).unwrap(), "board_a");
    let other = SqliteLocalStore::with_key(open_db(&path).unwrap(), "board_b");
    main.create(&draft("only in a")).await.unwrap();

    assert_eq!(main.list().await.unwrap().len(), 1);
    assert!(other.list().await.unwrap().is_empty());

    main.clear().unwrap();
    assert!(main.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn board_over_local_store_round_trips_operations() {
    let board = NoteBoard::new(SqliteLocalStore::open_in_memory().unwrap());
    board.load().await.unwrap();

    let note = board.create("write tests", "for the store").await.unwrap();
    board.move_status(&note.id, NoteStatus::Doing).await.unwrap();
    board
        .update(&note.id, "write more tests", "for the store")
        .await
        .unwrap();

    let stored = board.backend().read_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "write more tests");
    assert_eq!(stored[0].status, NoteStatus::Doing);

    board.remove(&note.id).await.unwrap();
    assert!(board.backend().read_all().unwrap().is_empty());
    assert!(board.view().column(NoteStatus::Doing).shows_placeholder());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writes_on_worker_threads_are_all_kept() {
    let store = std::sync::Arc::new(SqliteLocalStore::open_in_memory().unwrap());
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.create(&draft(&format!("task {n}"))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut titles: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|note| note.title)
        .collect();
    titles.sort();
    let mut expected: Vec<_> = (0..8).map(|n| format!("task {n}")).collect();
    expected.sort();
    assert_eq!(titles, expected);
}
