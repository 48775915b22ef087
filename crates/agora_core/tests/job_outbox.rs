use agora_core::jobs::{Job, JobQueue, SearchEvent, REPUTATION_EVENT_QUEUE, SEARCH_INDEX_QUEUE};
use agora_core::model::now_ms;
use agora_core::{open_db_in_memory, DocumentStore, StoreJobQueue};

#[test]
fn pending_jobs_are_listed_per_queue_in_enqueue_order() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let outbox = StoreJobQueue::new(&store);

    outbox.enqueue(Job::reputation("u1", "message created", "m1")).unwrap();
    outbox.enqueue(Job::search("t1", "thread", SearchEvent::Created)).unwrap();
    outbox.enqueue(Job::reputation("u2", "message created", "m2")).unwrap();

    let reputation = outbox.pending(REPUTATION_EVENT_QUEUE).unwrap();
    let users: Vec<&str> = reputation
        .iter()
        .map(|job| job["payload"]["userId"].as_str().unwrap())
        .collect();
    assert_eq!(users, vec!["u1", "u2"]);

    let search = outbox.pending(SEARCH_INDEX_QUEUE).unwrap();
    assert_eq!(search[0]["payload"]["event"], "created");
    assert_eq!(outbox.all_pending().unwrap().len(), 3);
}

#[test]
fn purge_removes_only_processed_jobs_older_than_the_cutoff() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let outbox = StoreJobQueue::new(&store);
    outbox.enqueue(Job::reputation("u1", "message created", "m1")).unwrap();
    outbox.enqueue(Job::reputation("u2", "message created", "m2")).unwrap();

    let first_id = outbox.pending(REPUTATION_EVENT_QUEUE).unwrap()[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(outbox.mark_processed(&first_id).unwrap());
    assert!(!outbox.mark_processed("missing").unwrap());

    assert_eq!(outbox.purge_processed(0).unwrap(), 0);
    assert_eq!(outbox.purge_processed(now_ms() + 1_000).unwrap(), 1);
    assert_eq!(outbox.purge_processed(now_ms() + 1_000).unwrap(), 0);

    let remaining = outbox.all_pending().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["payload"]["userId"], "u2");
}
