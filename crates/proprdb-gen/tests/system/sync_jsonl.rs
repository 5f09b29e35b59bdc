//! JSONL interchange behavior: export watermarks, last-writer-wins apply,
//! deletes, sync-disabled types, and the unknown-type quarantine.

use rusqlite::Connection;

use crate::payloads::*;

const REMOTE_A: &str = "remote-a";
const REMOTE_WS: &str = "   ";
const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

const UNKNOWN_TYPE_NAME: &str = "generatedtest.example.UnknownThing";
const UNKNOWN_ID: &str = "018f4f3f-6f9f-7a1b-8f55-1234567890aa";
const DRAIN_PERSON_ID: &str = "018f4f3f-6f9f-7a1b-8f55-1234567890ac";

fn new_store(conn: &Connection) -> Store<'_> {
    let store = Store::new(conn);
    store.init().unwrap();
    store
}

fn sync_count(conn: &Connection, remote: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM _sync WHERE remote = ?1",
        [remote],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_generated_jsonl_sync() {
    let source_conn = Connection::open_in_memory().unwrap();
    let target_conn = Connection::open_in_memory().unwrap();
    let source = new_store(&source_conn);
    let target = new_store(&target_conn);

    let person_row = source
        .person
        .insert(&Person {
            name: "Ada".to_string(),
            age: 37,
        })
        .unwrap();
    // A deleted note leaves a tombstone but never reaches the wire.
    let note_row = source
        .note
        .insert(&Note {
            text: "to be deleted".to_string(),
        })
        .unwrap();
    source.note.delete_by_id(&note_row.id).unwrap();

    let mut first_export = Vec::new();
    source.write_jsonl(REMOTE_A, &mut first_export).unwrap();
    let first_text = String::from_utf8(first_export).unwrap();
    assert_eq!(first_text.trim().lines().count(), 1);
    assert!(first_text.contains(&format!("\"id\":\"{}\"", person_row.id)));
    assert!(first_text.contains(&format!("\"atNs\":{}", person_row.at_ns)));
    assert!(first_text.contains("generatedtest.example.Person"));

    // The watermark moved, so a second export is empty.
    let mut second_export = Vec::new();
    source.write_jsonl(REMOTE_A, &mut second_export).unwrap();
    assert!(second_export.is_empty());

    target.read_jsonl(REMOTE_A, first_text.as_bytes()).unwrap();
    let target_people = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert_eq!(target_people.len(), 1);
    assert_eq!(target_people[0].data.name, "Ada");
    assert_eq!(sync_count(&target_conn, REMOTE_A), 1);

    // Records for sync-disabled types are skipped without touching _sync.
    let note_line = format!(
        "{{\"id\":\"{}\",\"atNs\":{},\"data\":{{\"@type\":\"{}{}\",\"text\":\"ignored\"}}}}\n",
        note_row.id,
        person_row.at_ns + 10,
        TYPE_URL_PREFIX,
        NOTE_TYPE_NAME
    );
    target.read_jsonl(REMOTE_A, note_line.as_bytes()).unwrap();
    let target_notes = target.note.select("id = ?1", [note_row.id.as_str()]).unwrap();
    assert!(target_notes.is_empty());
    let note_sync: i64 = target_conn
        .query_row(
            "SELECT COUNT(*) FROM _sync WHERE object_id = ?1 AND table_name = ?2 AND remote = ?3",
            [note_row.id.as_str(), NOTE_TABLE_NAME, REMOTE_A],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(note_sync, 0);

    let updated_person = source
        .person
        .update_by_id(
            &person_row.id,
            &Person {
                name: "Ada Updated".to_string(),
                age: 38,
            },
        )
        .unwrap();

    let mut third_export = Vec::new();
    source.write_jsonl(REMOTE_A, &mut third_export).unwrap();
    let third_text = String::from_utf8(third_export).unwrap();
    assert_eq!(third_text.trim().lines().count(), 1);

    target.read_jsonl(REMOTE_A, third_text.as_bytes()).unwrap();
    let target_people = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert_eq!(target_people.len(), 1);
    assert_eq!(target_people[0].data.name, "Ada Updated");

    // Imports bypass the validation hook: an empty name is applied anyway.
    let invalid_by_validate = format!(
        "{{\"id\":\"{}\",\"atNs\":{},\"data\":{{\"@type\":\"{}{}\",\"name\":\"\",\"age\":1}}}}\n",
        person_row.id,
        target_people[0].at_ns + 1,
        TYPE_URL_PREFIX,
        PERSON_TYPE_NAME
    );
    target
        .read_jsonl(REMOTE_A, invalid_by_validate.as_bytes())
        .unwrap();
    let target_people = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert_eq!(target_people.len(), 1);
    assert_eq!(target_people[0].data.name, "");

    let local_newer = target
        .person
        .update_by_id(
            &person_row.id,
            &Person {
                name: "Local Newer".to_string(),
                age: 99,
            },
        )
        .unwrap();

    // A stale delete loses against the newer live row.
    let stale_delete = format!(
        "{{\"id\":\"{}\",\"deleted\":true,\"atNs\":{},\"data\":{{\"@type\":\"{}{}\"}}}}\n",
        person_row.id,
        local_newer.at_ns - 1,
        TYPE_URL_PREFIX,
        PERSON_TYPE_NAME
    );
    target.read_jsonl(REMOTE_A, stale_delete.as_bytes()).unwrap();
    let after_stale = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert_eq!(after_stale.len(), 1);
    assert_eq!(after_stale[0].data.name, "Local Newer");
    let stale_tombstones: i64 = target_conn
        .query_row(
            "SELECT COUNT(*) FROM _deleted WHERE table_name = ?1 AND id = ?2",
            [PERSON_TABLE_NAME, person_row.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stale_tombstones, 0);

    // A newer delete wins and leaves its tombstone.
    let newer_delete_at_ns = local_newer.at_ns + 1;
    let newer_delete = format!(
        "{{\"id\":\"{}\",\"deleted\":true,\"atNs\":{},\"data\":{{\"@type\":\"{}{}\"}}}}\n",
        person_row.id, newer_delete_at_ns, TYPE_URL_PREFIX, PERSON_TYPE_NAME
    );
    target.read_jsonl(REMOTE_A, newer_delete.as_bytes()).unwrap();
    let after_newer = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert!(after_newer.is_empty());

    let tombstone_at_ns: i64 = target_conn
        .query_row(
            "SELECT at_ns FROM _deleted WHERE table_name = ?1 AND id = ?2",
            [PERSON_TABLE_NAME, person_row.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tombstone_at_ns, newer_delete_at_ns);

    let synced_at_ns: i64 = target_conn
        .query_row(
            "SELECT at_ns FROM _sync WHERE object_id = ?1 AND table_name = ?2 AND remote = ?3",
            [person_row.id.as_str(), PERSON_TABLE_NAME, REMOTE_A],
            |row| row.get(0),
        )
        .unwrap();
    assert!(synced_at_ns >= updated_person.at_ns);
}

#[test]
fn test_import_is_idempotent_and_order_independent() {
    let person_id = "018f4f3f-6f9f-7a1b-8f55-1234567890ad";
    let old_line = format!(
        "{{\"id\":\"{person_id}\",\"atNs\":100,\"data\":{{\"@type\":\"{TYPE_URL_PREFIX}{PERSON_TYPE_NAME}\",\"name\":\"Old\",\"age\":1}}}}\n"
    );
    let new_line = format!(
        "{{\"id\":\"{person_id}\",\"atNs\":200,\"data\":{{\"@type\":\"{TYPE_URL_PREFIX}{PERSON_TYPE_NAME}\",\"name\":\"New\",\"age\":2}}}}\n"
    );

    for batch in [
        format!("{old_line}{new_line}"),
        format!("{new_line}{old_line}"),
        format!("{old_line}{new_line}{old_line}{new_line}"),
    ] {
        let conn = Connection::open_in_memory().unwrap();
        let store = new_store(&conn);
        store.read_jsonl(REMOTE_A, batch.as_bytes()).unwrap();

        let rows = store.person.select("id = ?1", [person_id]).unwrap();
        assert_eq!(rows.len(), 1, "batch {batch:?}");
        assert_eq!(rows[0].data.name, "New");
        assert_eq!(rows[0].at_ns, 200);
        let synced: i64 = conn
            .query_row(
                "SELECT at_ns FROM _sync WHERE object_id = ?1 AND table_name = ?2 AND remote = ?3",
                [person_id, PERSON_TABLE_NAME, REMOTE_A],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(synced, 200);
    }
}

#[test]
fn test_empty_remote_is_an_idempotent_dry_run() {
    let source_conn = Connection::open_in_memory().unwrap();
    let target_conn = Connection::open_in_memory().unwrap();
    let source = new_store(&source_conn);
    let target = new_store(&target_conn);

    let person_row = source
        .person
        .insert(&Person {
            name: "Empty Remote".to_string(),
            age: 1,
        })
        .unwrap();

    let mut first_export = Vec::new();
    source.write_jsonl("", &mut first_export).unwrap();
    assert!(!first_export.is_empty());

    let mut second_export = Vec::new();
    source.write_jsonl("", &mut second_export).unwrap();
    assert_eq!(first_export, second_export);

    target
        .read_jsonl("", first_export.as_slice())
        .unwrap();
    let target_people = target
        .person
        .select("id = ?1", [person_row.id.as_str()])
        .unwrap();
    assert_eq!(target_people.len(), 1);
    assert_eq!(target_people[0].data.name, "Empty Remote");

    for conn in [&source_conn, &target_conn] {
        assert_eq!(sync_count(conn, ""), 0);
    }

    // A whitespace-only remote is an ordinary remote.
    let mut ws_first = Vec::new();
    source.write_jsonl(REMOTE_WS, &mut ws_first).unwrap();
    assert!(!ws_first.is_empty());

    let mut ws_second = Vec::new();
    source.write_jsonl(REMOTE_WS, &mut ws_second).unwrap();
    assert!(ws_second.is_empty());

    target.read_jsonl(REMOTE_WS, ws_first.as_slice()).unwrap();
    for conn in [&source_conn, &target_conn] {
        assert_eq!(sync_count(conn, REMOTE_WS), 1);
    }
}

#[test]
fn test_unknown_types_are_quarantined_and_compacted() {
    let conn = Connection::open_in_memory().unwrap();
    let store = new_store(&conn);

    let first_line = format!(
        "{{\"id\":\"{UNKNOWN_ID}\",\"atNs\":10,\"data\":{{\"@type\":\"{TYPE_URL_PREFIX}{UNKNOWN_TYPE_NAME}\",\"payload\":\"old\"}}}}\n"
    );
    let second_line = format!(
        "{{\"id\":\"{UNKNOWN_ID}\",\"atNs\":20,\"data\":{{\"@type\":\"{TYPE_URL_PREFIX}{UNKNOWN_TYPE_NAME}\",\"payload\":\"new\"}}}}\n"
    );
    store
        .read_jsonl(REMOTE_A, format!("{first_line}{second_line}").as_bytes())
        .unwrap();

    let unknown_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM _unknown_types WHERE type_name = ?1 AND id = ?2",
            [UNKNOWN_TYPE_NAME, UNKNOWN_ID],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unknown_rows, 1);

    let stored_at_ns: i64 = conn
        .query_row(
            "SELECT at_ns FROM _unknown_types WHERE type_name = ?1 AND id = ?2",
            [UNKNOWN_TYPE_NAME, UNKNOWN_ID],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored_at_ns, 20);
}

#[test]
fn test_init_drains_quarantined_rows_for_known_type() {
    let conn = Connection::open_in_memory().unwrap();
    let store = new_store(&conn);

    let person_any_json = format!(
        "{{\"@type\":\"{TYPE_URL_PREFIX}{PERSON_TYPE_NAME}\",\"name\":\"Recovered\",\"age\":44}}"
    );
    conn.execute(
        "INSERT INTO _unknown_types (type_name, id, at_ns, deleted, data_json) VALUES (?1, ?2, 77, 0, ?3)",
        [PERSON_TYPE_NAME, DRAIN_PERSON_ID, person_any_json.as_str()],
    )
    .unwrap();

    store.person.init().unwrap();

    let recovered = store.person.select("id = ?1", [DRAIN_PERSON_ID]).unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].data.name, "Recovered");
    assert_eq!(recovered[0].data.age, 44);
    assert_eq!(recovered[0].at_ns, 77);

    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM _unknown_types WHERE type_name = ?1 AND id = ?2",
            [PERSON_TYPE_NAME, DRAIN_PERSON_ID],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);

    // Draining never fabricates watermarks.
    assert_eq!(sync_count(&conn, ""), 0);
}

#[test]
fn test_missing_type_is_skipped_and_malformed_line_aborts() {
    let conn = Connection::open_in_memory().unwrap();
    let store = new_store(&conn);

    // A record without @type is skipped with a diagnostic.
    store
        .read_jsonl(
            REMOTE_A,
            &b"{\"id\":\"018f4f3f-6f9f-7a1b-8f55-1234567890ae\",\"atNs\":5,\"data\":{}}\n"[..],
        )
        .unwrap();

    // Malformed JSON aborts the stream with a line-numbered diagnostic.
    let error = store
        .read_jsonl(REMOTE_A, &b"{\"id\":\"x\",\"atNs\":1,\"data\":{}}\nnot json\n"[..])
        .unwrap_err();
    assert!(error.to_string().contains("line 2"), "got {error}");
}
