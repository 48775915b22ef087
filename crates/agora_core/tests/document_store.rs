use agora_core::pubsub::changed_topic;
use agora_core::store::ChangeKind;
use agora_core::{
    open_db_in_memory, DocumentStore, Event, Filter, FindOptions, PubSub, StoreError, Update,
};
use serde_json::json;

fn seed(store: &DocumentStore<'_>) -> Vec<String> {
    let docs = [
        json!({ "name": "rust", "memberCount": 12, "isPrivate": false, "tags": ["sys"] }),
        json!({ "name": "go", "memberCount": 4, "isPrivate": true }),
        json!({ "name": "zig", "memberCount": 7, "isPrivate": false, "deletedAt": 1 }),
    ];
    docs.into_iter()
        .map(|doc| {
            let stored = store.insert_value("communities", doc).unwrap();
            stored["id"].as_str().unwrap().to_string()
        })
        .collect()
}

fn names(docs: &[agora_core::Document]) -> Vec<&str> {
    docs.iter().map(|doc| doc["name"].as_str().unwrap()).collect()
}

#[test]
fn insert_assigns_unique_ids_and_get_round_trips() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let ids = seed(&store);

    assert_eq!(ids.len(), 3);
    assert_ne!(ids[0], ids[1]);
    let fetched = store.get("communities", &ids[1]).unwrap().unwrap();
    assert_eq!(fetched["name"], "go");
    assert!(store.get("communities", "missing").unwrap().is_none());
}

#[test]
fn filters_sort_and_paginate() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    seed(&store);

    let live = store
        .find(
            "communities",
            &Filter::All.not_deleted(),
            &FindOptions::new().sort_desc("memberCount"),
        )
        .unwrap();
    assert_eq!(names(&live), vec!["rust", "go"]);

    let public = store
        .find_all("communities", &Filter::eq("isPrivate", false))
        .unwrap();
    assert_eq!(names(&public), vec!["rust", "zig"]);

    let mid = store
        .find_all(
            "communities",
            &Filter::gte("memberCount", 5).and(Filter::lt("memberCount", 12)),
        )
        .unwrap();
    assert_eq!(names(&mid), vec!["zig"]);

    let second_page = store
        .find(
            "communities",
            &Filter::All,
            &FindOptions::new().sort_asc("name").skip(1).limit(1),
        )
        .unwrap();
    assert_eq!(names(&second_page), vec!["rust"]);

    let either = store
        .find_all(
            "communities",
            &Filter::any_of(vec![Filter::eq("name", "go"), Filter::exists("tags")]),
        )
        .unwrap();
    assert_eq!(names(&either), vec!["rust", "go"]);

    assert_eq!(
        store
            .count("communities", &Filter::is_in("name", ["go", "zig", "nope"]))
            .unwrap(),
        2
    );
}

#[test]
fn ne_matches_documents_missing_the_field() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    seed(&store);

    let not_deleted_one = store
        .find_all("communities", &Filter::ne("deletedAt", 1))
        .unwrap();
    assert_eq!(names(&not_deleted_one), vec!["rust", "go"]);
    let not_rust = store
        .find_all("communities", &Filter::negate(Filter::eq("name", "rust")))
        .unwrap();
    assert_eq!(names(&not_rust), vec!["go", "zig"]);
}

#[test]
fn updates_apply_partially_and_report_changed_documents() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let ids = seed(&store);

    let updated = store
        .update_by_id(
            "communities",
            &ids[1],
            &Update::new()
                .inc("memberCount", 1)
                .set("settings.theme", "dark")
                .push("tags", "cloud")
                .unset("isPrivate"),
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated["memberCount"], 5);
    assert_eq!(updated["settings"], json!({ "theme": "dark" }));
    assert_eq!(updated["tags"], json!(["cloud"]));
    assert!(updated.get("isPrivate").is_none());

    let floored = store
        .update_by_id(
            "communities",
            &ids[1],
            &Update::new().inc_floor("memberCount", -10, 0),
        )
        .unwrap()
        .unwrap();
    assert_eq!(floored["memberCount"], 0);

    assert!(store
        .update_by_id("communities", "missing", &Update::new().set("name", "x"))
        .unwrap()
        .is_none());

    let all = store
        .update_many("communities", &Filter::All, &Update::new().set("isPrivate", true))
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|doc| doc["isPrivate"] == true));
}

#[test]
fn delete_many_returns_removed_count() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    seed(&store);

    assert_eq!(store.delete_many("communities", &Filter::exists("deletedAt")).unwrap(), 1);
    assert_eq!(store.delete_many("communities", &Filter::exists("deletedAt")).unwrap(), 0);
    assert_eq!(store.count("communities", &Filter::All).unwrap(), 2);
}

#[test]
fn join_pairs_left_rows_with_matching_right_documents() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let ann = store.insert_value("users", json!({ "username": "ann" })).unwrap();
    let bob = store
        .insert_value("users", json!({ "username": "bob", "deletedAt": 5 }))
        .unwrap();
    store
        .insert_value("usersChannels", json!({ "channelId": "c1", "userId": ann["id"] }))
        .unwrap();
    store
        .insert_value("usersChannels", json!({ "channelId": "c1", "userId": bob["id"] }))
        .unwrap();

    let records = store
        .find_all("usersChannels", &Filter::eq("channelId", "c1"))
        .unwrap();
    let rows = store
        .join_filtered(records, "userId", "users", "id", &Filter::All.not_deleted())
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].right["username"], "ann");
    assert_eq!(rows[0].clone().zip()["channelId"], "c1");
}

#[test]
fn invalid_collection_and_path_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);

    assert!(matches!(
        store.find_all("bad name", &Filter::All),
        Err(StoreError::InvalidCollection(_))
    ));
    assert!(matches!(
        store.find_all("users", &Filter::eq("a..b", 1)),
        Err(StoreError::InvalidPath(_))
    ));
    assert!(matches!(
        store.insert_value("users", json!([1, 2])),
        Err(StoreError::InvalidDocument(_))
    ));
}

#[test]
fn committed_mutations_are_published_on_the_bus() {
    let conn = open_db_in_memory().unwrap();
    let bus = PubSub::new();
    let store = DocumentStore::new(&conn).with_bus(&bus);
    let changes = bus.subscribe(&changed_topic("threads"));

    let thread = store.insert_value("threads", json!({ "title": "hi" })).unwrap();
    let id = thread["id"].as_str().unwrap();
    store
        .update_by_id("threads", id, &Update::new().set("title", "hello"))
        .unwrap();
    // Unchanged content produces no event.
    store
        .update_by_id("threads", id, &Update::new().set("title", "hello"))
        .unwrap();
    store.delete_many("threads", &Filter::eq("id", id)).unwrap();

    let kinds: Vec<ChangeKind> = changes
        .drain()
        .into_iter()
        .map(|event| match event {
            Event::Changed(change) => change.kind,
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted]
    );
}
