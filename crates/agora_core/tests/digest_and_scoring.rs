use agora_core::model::thread::ScoreWindow;
use agora_core::model::{now_ms, DAY_MS, HOUR_MS, MINUTE_MS};
use agora_core::repo::message_repo::MessageRepository;
use agora_core::repo::notification_repo::UsersNotificationsRepository;
use agora_core::repo::reaction_repo::ReactionRepository;
use agora_core::repo::settings_repo::UsersSettingsRepository;
use agora_core::repo::thread_repo::ThreadRepository;
use agora_core::service::cleanup_service::CleanupService;
use agora_core::{open_db_in_memory, DocumentStore, Filter, Page, Timeframe};
use serde_json::{json, Value};

fn put(store: &DocumentStore<'_>, collection: &str, value: Value) -> String {
    let stored = store.insert_value(collection, value).unwrap();
    stored["id"].as_str().unwrap().to_string()
}

fn thread_doc(channel_id: &str, title: &str, last_active: i64) -> Value {
    json!({
        "channelId": channel_id,
        "communityId": "c1",
        "creatorId": "ann",
        "content": { "title": title },
        "createdAt": last_active,
        "lastActive": last_active,
    })
}

fn message_doc(thread_id: &str, sender_id: &str, timestamp: i64) -> Value {
    json!({
        "threadId": thread_id,
        "threadType": "story",
        "messageType": "text",
        "senderId": sender_id,
        "content": { "body": "hi" },
        "timestamp": timestamp,
    })
}

#[test]
fn digest_recipients_follow_their_email_toggles() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let settings = UsersSettingsRepository::new(&store);
    for user_id in ["u1", "u2", "u3"] {
        settings.create_defaults(user_id).unwrap();
    }
    settings.set_email("u2", "dailyDigest", false).unwrap();
    settings.set_email("u3", "weeklyDigest", false).unwrap();

    assert_eq!(
        settings.user_ids_for_digest(Timeframe::Daily, Page::default()).unwrap(),
        vec!["u1", "u3"]
    );
    assert_eq!(
        settings.user_ids_for_digest(Timeframe::Weekly, Page::default()).unwrap(),
        vec!["u1", "u2"]
    );
    assert_eq!(
        settings.user_ids_for_digest(Timeframe::Monthly, Page::default()).unwrap(),
        vec!["u1", "u2"]
    );
    assert_eq!(
        settings.user_ids_for_digest(Timeframe::Daily, Page::new(1, 1)).unwrap(),
        vec!["u3"]
    );
}

#[test]
fn digest_threads_are_grouped_by_channel_and_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    put(&store, "threads", thread_doc("a", "a-older", now - 2 * HOUR_MS));
    put(&store, "threads", thread_doc("b", "b-recent", now - 3 * HOUR_MS));
    put(&store, "threads", thread_doc("a", "a-newer", now - HOUR_MS));
    put(&store, "threads", thread_doc("a", "a-stale", now - 10 * DAY_MS));
    put(&store, "threads", thread_doc("c", "c-elsewhere", now - HOUR_MS));
    let mut deleted = thread_doc("b", "b-deleted", now - HOUR_MS);
    deleted["deletedAt"] = json!(now);
    put(&store, "threads", deleted);

    let channels = vec!["a".to_string(), "b".to_string()];
    let threads = ThreadRepository::new(&store);
    let titles = |range| -> Vec<String> {
        threads
            .in_channels_in_timeframe(&channels, range)
            .unwrap()
            .into_iter()
            .map(|thread| thread.content.title)
            .collect()
    };
    assert_eq!(titles(Timeframe::Daily), vec!["b-recent", "a-newer", "a-older"]);
    assert_eq!(titles(Timeframe::Monthly).len(), 4);
}

#[test]
fn new_message_count_covers_only_the_current_window() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    put(&store, "messages", message_doc("t1", "ann", now - HOUR_MS));
    put(&store, "messages", message_doc("t1", "bob", now - 2 * DAY_MS));
    put(&store, "messages", message_doc("t2", "bob", now - HOUR_MS));
    let mut deleted = message_doc("t1", "cat", now - HOUR_MS);
    deleted["deletedAt"] = json!(now);
    put(&store, "messages", deleted);

    let messages = MessageRepository::new(&store);
    assert_eq!(messages.new_count_in_timeframe("t1", Timeframe::Daily).unwrap(), 1);
    assert_eq!(messages.new_count_in_timeframe("t1", Timeframe::Weekly).unwrap(), 2);
    assert_eq!(messages.count("t1").unwrap(), 2);
}

#[test]
fn score_inputs_are_counted_per_age_band() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    for (sender, age) in [
        ("ann", 10 * MINUTE_MS),
        ("ann", 20 * MINUTE_MS),
        ("bob", 30 * MINUTE_MS),
        ("cat", 3 * HOUR_MS),
        ("dan", 3 * DAY_MS),
        ("fay", 30 * DAY_MS),
    ] {
        put(&store, "messages", message_doc("t1", sender, now - age));
    }
    let mut deleted = message_doc("t1", "eve", now - 10 * MINUTE_MS);
    deleted["deletedAt"] = json!(now);
    put(&store, "messages", deleted);

    for (age, deleted) in [(10 * MINUTE_MS, false), (2 * HOUR_MS, false), (5 * MINUTE_MS, true)] {
        let mut reaction = json!({
            "threadId": "t1",
            "userId": "ann",
            "type": "like",
            "createdAt": now - age,
        });
        if deleted {
            reaction["deletedAt"] = json!(now);
        }
        put(&store, "threadReactions", reaction);
    }
    for (user, is_participant) in [("ann", true), ("bob", true), ("cat", false)] {
        put(
            &store,
            "usersThreads",
            json!({ "threadId": "t1", "userId": user, "isParticipant": is_participant, "createdAt": now }),
        );
    }

    let threads = ThreadRepository::new(&store);
    assert_eq!(threads.participant_count("t1").unwrap(), 2);
    let participants: Vec<u64> = [
        ScoreWindow::Hourly,
        ScoreWindow::Daily,
        ScoreWindow::Weekly,
        ScoreWindow::Rest,
    ]
    .into_iter()
    .map(|window| threads.participant_count_by_time("t1", window).unwrap())
    .collect();
    assert_eq!(participants, vec![2, 1, 1, 1]);

    assert_eq!(threads.reaction_count_by_time("t1", ScoreWindow::Hourly).unwrap(), 1);
    assert_eq!(threads.reaction_count_by_time("t1", ScoreWindow::Daily).unwrap(), 1);
    assert_eq!(threads.reaction_count_by_time("t1", ScoreWindow::Rest).unwrap(), 0);
}

#[test]
fn score_window_bounds_do_not_overlap() {
    let now = 100 * DAY_MS;
    assert_eq!(ScoreWindow::Hourly.bounds(now), (Some(now - HOUR_MS), None));
    assert_eq!(
        ScoreWindow::Daily.bounds(now),
        (Some(now - DAY_MS), Some(now - HOUR_MS))
    );
    assert_eq!(
        ScoreWindow::Weekly.bounds(now),
        (Some(now - 7 * DAY_MS), Some(now - DAY_MS))
    );
    assert_eq!(ScoreWindow::Rest.bounds(now), (None, Some(now - 7 * DAY_MS)));
}

#[test]
fn all_reactions_in_messages_include_tombstones() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    for (message_id, deleted) in [("m1", false), ("m1", true), ("m2", false), ("m3", false)] {
        let mut reaction = json!({
            "messageId": message_id,
            "userId": "ann",
            "type": "like",
            "timestamp": 1,
        });
        if deleted {
            reaction["deletedAt"] = json!(2);
        }
        put(&store, "reactions", reaction);
    }

    let reactions = ReactionRepository::new(&store)
        .all_in_messages(&["m1".to_string(), "m2".to_string()])
        .unwrap();
    assert_eq!(reactions.len(), 3);
    assert_eq!(
        reactions.iter().filter(|reaction| reaction.deleted_at.is_some()).count(),
        1
    );
}

#[test]
fn seen_deliveries_are_removed_in_batches() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    for (user, created_at, is_seen) in [
        ("ann", 3, true),
        ("bob", 1, true),
        ("cat", 2, true),
        ("dan", 4, false),
    ] {
        put(
            &store,
            "usersNotifications",
            json!({
                "notificationId": "n1",
                "userId": user,
                "isSeen": is_seen,
                "createdAt": created_at,
                "entityAddedAt": created_at,
            }),
        );
    }

    let deliveries = UsersNotificationsRepository::new(&store);
    let first: Vec<String> = deliveries
        .seen(Page::first(2))
        .unwrap()
        .into_iter()
        .map(|record| record.user_id)
        .collect();
    assert_eq!(first, vec!["bob", "cat"]);
    assert_eq!(deliveries.delete_many(&[]).unwrap(), 0);

    assert_eq!(CleanupService::new(&store).purge_seen_notifications(2).unwrap(), 3);
    assert!(deliveries.seen(Page::default()).unwrap().is_empty());
    assert_eq!(store.count("usersNotifications", &Filter::All).unwrap(), 1);
}
