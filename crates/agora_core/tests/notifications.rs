use agora_core::model::notification::{NewNotification, NotificationRef, DIRECT_MESSAGE_THREAD_CONTEXT};
use agora_core::pubsub::{DIRECT_MESSAGE_NOTIFICATION_ADDED, NOTIFICATION_ADDED};
use agora_core::repo::notification_repo::UsersNotificationsRepository;
use agora_core::repo::participant_repo::ParticipantRepository;
use agora_core::service::notification_service::NotificationService;
use agora_core::{open_db_in_memory, DocumentStore, Event, Page, PubSub};
use serde_json::json;

fn reaction_in(message_id: &str, actor: &str) -> NewNotification {
    NewNotification {
        event: "REACTION_CREATED".to_string(),
        context: NotificationRef::new(message_id, "MESSAGE", json!({})),
        actors: vec![NotificationRef::new(actor, "USER", json!({ "username": actor }))],
        entities: vec![NotificationRef::new(&format!("r-{actor}"), "REACTION", json!({}))],
    }
}

fn recipients(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn repeated_events_in_one_context_are_bundled() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let service = NotificationService::new(&store, &bus);

    let first = service
        .notify(&reaction_in("m1", "ann"), &recipients(&["cat"]))
        .unwrap();
    let second = service
        .notify(&reaction_in("m1", "bob"), &recipients(&["cat"]))
        .unwrap();
    let again = service
        .notify(&reaction_in("m1", "bob"), &recipients(&["cat"]))
        .unwrap();

    assert_eq!(first.id, second.id);
    let actors: Vec<&str> = again.actors.iter().map(|actor| actor.id.as_str()).collect();
    assert_eq!(actors, vec!["ann", "bob"]);
    assert_eq!(again.entities.len(), 2);

    let other_context = service
        .notify(&reaction_in("m2", "ann"), &recipients(&["cat"]))
        .unwrap();
    assert_ne!(other_context.id, first.id);

    let inbox = UsersNotificationsRepository::new(&store)
        .for_user("cat", Page::default())
        .unwrap();
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().any(|entry| entry.notification.id == other_context.id));
}

#[test]
fn earlier_actor_of_a_bundle_is_notified_of_a_later_reply() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let service = NotificationService::new(&store, &bus);
    let reply_by = |actor: &str| NewNotification {
        event: "MESSAGE_CREATED".to_string(),
        context: NotificationRef::new("t1", "THREAD", json!({})),
        actors: vec![NotificationRef::new(actor, "USER", json!({}))],
        entities: vec![NotificationRef::new(&format!("msg-{actor}"), "MESSAGE", json!({}))],
    };

    let first = service.notify(&reply_by("ann"), &recipients(&["bob"])).unwrap();
    let bundled = service.notify(&reply_by("bob"), &recipients(&["ann"])).unwrap();
    assert_eq!(first.id, bundled.id);
    assert_eq!(bundled.actors.len(), 2);

    let deliveries = UsersNotificationsRepository::new(&store);
    let ann_inbox = deliveries.for_user("ann", Page::default()).unwrap();
    assert_eq!(ann_inbox.len(), 1);
    assert_eq!(ann_inbox[0].notification.id, first.id);
    assert!(!ann_inbox[0].delivery.is_seen);
    assert_eq!(deliveries.for_user("bob", Page::default()).unwrap().len(), 1);
}

#[test]
fn different_events_in_one_context_are_not_bundled() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let service = NotificationService::new(&store, &bus).with_buffer_ms(60_000);

    let reaction = service.notify(&reaction_in("m1", "ann"), &[]).unwrap();
    let reply = service
        .notify(
            &NewNotification {
                event: "MESSAGE_CREATED".to_string(),
                ..reaction_in("m1", "bob")
            },
            &[],
        )
        .unwrap();
    assert_ne!(reaction.id, reply.id);
    assert_eq!(reply.actors.len(), 1);
}

#[test]
fn recipients_are_published_on_the_matching_topic_and_actors_skipped() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let regular = bus.subscribe(NOTIFICATION_ADDED);
    let direct = bus.subscribe(DIRECT_MESSAGE_NOTIFICATION_ADDED);
    let service = NotificationService::new(&store, &bus);

    service
        .notify(&reaction_in("m1", "ann"), &recipients(&["ann", "bob", "cat"]))
        .unwrap();
    let delivered = regular.drain();
    assert_eq!(delivered.len(), 2);
    let users: Vec<String> = delivered
        .iter()
        .map(|event| match event {
            Event::Notification(body) => body["delivery"]["userId"].as_str().unwrap().to_string(),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(users, vec!["bob", "cat"]);
    assert!(direct.try_recv().is_none());

    service
        .notify(
            &NewNotification {
                event: "MESSAGE_CREATED".to_string(),
                context: NotificationRef::new("dm1", DIRECT_MESSAGE_THREAD_CONTEXT, json!({})),
                actors: vec![NotificationRef::new("ann", "USER", json!({}))],
                entities: vec![NotificationRef::new("msg1", "MESSAGE", json!({}))],
            },
            &recipients(&["bob"]),
        )
        .unwrap();
    assert_eq!(direct.drain().len(), 1);
    assert!(regular.try_recv().is_none());
}

#[test]
fn seen_state_is_tracked_separately_for_direct_messages() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let service = NotificationService::new(&store, &bus);
    let regular = service
        .notify(&reaction_in("m1", "ann"), &recipients(&["bob"]))
        .unwrap();
    service
        .notify(
            &NewNotification {
                event: "MESSAGE_CREATED".to_string(),
                context: NotificationRef::new("dm1", DIRECT_MESSAGE_THREAD_CONTEXT, json!({})),
                actors: vec![NotificationRef::new("ann", "USER", json!({}))],
                entities: vec![],
            },
            &recipients(&["bob"]),
        )
        .unwrap();

    let deliveries = UsersNotificationsRepository::new(&store);
    assert_eq!(deliveries.mark_all_seen("bob").unwrap(), 1);
    assert_eq!(deliveries.mark_all_seen("bob").unwrap(), 0);
    assert_eq!(deliveries.mark_direct_messages_seen("bob").unwrap(), 1);

    // A bundled follow-up makes the notification unseen again.
    service
        .notify(&reaction_in("m1", "cat"), &recipients(&["bob"]))
        .unwrap();
    let inbox = deliveries.for_user("bob", Page::default()).unwrap();
    let refreshed = inbox
        .iter()
        .find(|entry| entry.notification.id == regular.id)
        .unwrap();
    assert!(!refreshed.delivery.is_seen);
    assert!(deliveries.mark_seen(&regular.id, "bob").unwrap());
    assert!(!deliveries.mark_seen(&regular.id, "nobody").unwrap());
}

#[test]
fn thread_recipients_follow_participant_preferences() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let bus = PubSub::new();
    let participants = ParticipantRepository::new(&store);
    participants.create_participant("t1", "ann").unwrap();
    participants.create_participant("t1", "bob").unwrap();
    participants.create_participant("t1", "cat").unwrap();
    participants.set_notifications("t1", "cat", false).unwrap();

    let recipients = NotificationService::new(&store, &bus)
        .thread_recipients("t1", "ann")
        .unwrap();
    assert_eq!(recipients, vec!["bob".to_string()]);
}
