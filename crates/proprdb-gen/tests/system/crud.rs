//! Generated CRUD behavior over an in-memory store.

use rusqlite::Connection;

use crate::payloads::*;

fn tombstone_count(conn: &Connection, table: &str, id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM _deleted WHERE table_name = ?1 AND id = ?2",
        [table, id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_generated_crud() {
    let conn = Connection::open_in_memory().unwrap();
    let store = Store::new(&conn);
    store.init().unwrap();

    // omit_table messages never materialize.
    let hidden_tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            ["generatedtest_example_hidden"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hidden_tables, 0);

    // The validation hook rejects locally invalid writes.
    assert!(store
        .person
        .insert(&Person {
            name: String::new(),
            age: 1
        })
        .is_err());

    let inserted = store
        .person
        .insert(&Person {
            name: "Ada".to_string(),
            age: 37,
        })
        .unwrap();
    assert!(!inserted.id.is_empty());
    assert!(inserted.at_ns > 0);

    let custom_id = "018f4f3f-6f9f-7a1b-8f55-1234567890ab";
    let inserted_with_id = store
        .person
        .insert_with_id(
            custom_id,
            &Person {
                name: "Grace".to_string(),
                age: 30,
            },
        )
        .unwrap();
    assert_eq!(inserted_with_id.id, custom_id);
    assert!(inserted_with_id.at_ns > 0);

    for bad_id in ["", "not-a-uuid"] {
        assert!(
            store
                .person
                .insert_with_id(
                    bad_id,
                    &Person {
                        name: "Bad ID".to_string(),
                        age: 1,
                    },
                )
                .is_err(),
            "accepted id {bad_id:?}"
        );
    }

    let selected = store.person.select("\"name\" = ?1", ["Ada"]).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, inserted.id);
    assert_eq!(selected[0].data.age, 37);

    store.person.delete_by_id(&inserted.id).unwrap();
    assert_eq!(tombstone_count(&conn, PERSON_TABLE_NAME, &inserted.id), 1);

    // Update-after-delete resurrects locally and clears the tombstone.
    let updated = store
        .person
        .update_by_id(
            &inserted.id,
            &Person {
                name: "Ada Lovelace".to_string(),
                age: 38,
            },
        )
        .unwrap();
    assert_eq!(updated.id, inserted.id);
    assert_eq!(tombstone_count(&conn, PERSON_TABLE_NAME, &inserted.id), 0);

    assert!(store
        .person
        .update_by_id(
            "not-a-uuid",
            &Person {
                name: "Nope".to_string(),
                age: 10,
            },
        )
        .is_err());

    // Strict update: no row and no tombstone is an error.
    assert!(store
        .person
        .update_by_id(
            "018f4f3f-6f9f-7a1b-8f55-00000000ffff",
            &Person {
                name: "Ghost".to_string(),
                age: 1,
            },
        )
        .is_err());

    let updated_by_row = store
        .person
        .update_row(PersonRow {
            id: inserted.id.clone(),
            at_ns: updated.at_ns,
            data: Person {
                name: "Countess of Lovelace".to_string(),
                age: 39,
            },
        })
        .unwrap();
    assert_eq!(updated_by_row.id, inserted.id);

    store.person.delete_row(updated_by_row).unwrap();
    assert_eq!(tombstone_count(&conn, PERSON_TABLE_NAME, &inserted.id), 1);

    // Projection columns are written alongside the blob.
    let inserted_note = store
        .note
        .insert(&Note {
            text: "Projected note".to_string(),
        })
        .unwrap();
    let projected_text: String = conn
        .query_row(
            "SELECT \"text\" FROM \"generatedtest_example_note\" WHERE id = ?1",
            [inserted_note.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(projected_text, "Projected note");
}

#[test]
fn test_reprojection_after_schema_drift() {
    let conn = Connection::open_in_memory().unwrap();
    let store = Store::new(&conn);
    store.init().unwrap();

    let inserted = store
        .person
        .insert(&Person {
            name: "X".to_string(),
            age: 7,
        })
        .unwrap();

    // Drift the projected column out-of-band and stale the recorded hash.
    conn.execute(
        "UPDATE \"generatedtest_example_person\" SET \"age\" = 0 WHERE id = ?1",
        [inserted.id.as_str()],
    )
    .unwrap();
    conn.execute(
        "UPDATE _proprdb_schema SET schema_hash = ?1 WHERE table_name = ?2",
        ["stale", PERSON_TABLE_NAME],
    )
    .unwrap();

    store.person.init().unwrap();

    let projected_age: i64 = conn
        .query_row(
            "SELECT \"age\" FROM \"generatedtest_example_person\" WHERE id = ?1",
            [inserted.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(projected_age, 7);
}

#[test]
fn test_managed_index_lifecycle() {
    let conn = Connection::open_in_memory().unwrap();
    let store = Store::new(&conn);
    store.init().unwrap();

    // A leftover generator-owned index disappears on init; user indexes stay.
    conn.execute(
        "CREATE INDEX \"idx_generatedtest_example_person__age\" ON \"generatedtest_example_person\" (\"age\")",
        [],
    )
    .unwrap();
    conn.execute(
        "CREATE INDEX \"my_person_age\" ON \"generatedtest_example_person\" (\"age\")",
        [],
    )
    .unwrap();

    store.person.init().unwrap();

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'generatedtest_example_person' AND name LIKE 'idx\\_%' ESCAPE '\\' ORDER BY name")
        .unwrap();
    let managed: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(managed, vec!["idx_generatedtest_example_person__name".to_string()]);

    let user_indexes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'my_person_age'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(user_indexes, 1);
}

#[test]
fn test_table_over_transaction() {
    let mut conn = Connection::open_in_memory().unwrap();
    {
        let store = Store::new(&conn);
        store.init().unwrap();
    }

    let tx = conn.transaction().unwrap();
    {
        let people = PersonTable::new(&tx);
        people
            .insert(&Person {
                name: "Tx User".to_string(),
                age: 41,
            })
            .unwrap();
    }
    tx.commit().unwrap();

    let store = Store::new(&conn);
    let rows = store.person.select("\"name\" = ?1", ["Tx User"]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data.age, 41);
}

#[test]
fn test_table_descriptors_catalog() {
    let conn = Connection::open_in_memory().unwrap();
    let store = Store::new(&conn);
    store.init().unwrap();

    let descriptors = store.table_descriptors();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].table_name, PERSON_TABLE_NAME);
    assert_eq!(descriptors[0].type_name, PERSON_TYPE_NAME);
    assert!(descriptors[0].sync_enabled);
    assert_eq!(descriptors[1].table_name, NOTE_TABLE_NAME);
    assert!(!descriptors[1].sync_enabled);

    store
        .person
        .insert(&Person {
            name: "Counted".to_string(),
            age: 1,
        })
        .unwrap();

    let stats = proprdb_rt::introspect::table_stats(&conn, &descriptors).unwrap();
    assert_eq!(stats[0].object_count, 1);
    assert!(stats[0].disk_usage_bytes > 0);
    assert_eq!(stats[1].object_count, 0);
}
