use agora_core::jobs::{
    Job, SearchEvent, REACTION_NOTIFICATION_QUEUE, REPUTATION_EVENT_QUEUE, SEARCH_INDEX_QUEUE,
    THREAD_REACTION_NOTIFICATION_QUEUE,
};
use agora_core::model::community::{Community, NewCommunity};
use agora_core::model::message::{MessageContent, MessageType, NewMessage, ThreadType};
use agora_core::model::reputation::{MESSAGE_CREATED, MESSAGE_DELETED};
use agora_core::model::thread::{NewThread, Thread, ThreadContent};
use agora_core::model::user::{NewUser, User};
use agora_core::repo::channel_repo::ChannelRepository;
use agora_core::repo::direct_message_repo::DirectMessageRepository;
use agora_core::repo::membership_repo::CommunityMembershipRepository;
use agora_core::repo::message_repo::MessageRepository;
use agora_core::repo::participant_repo::ParticipantRepository;
use agora_core::repo::reaction_repo::ReactionRepository;
use agora_core::repo::reputation_repo::ReputationRepository;
use agora_core::repo::thread_repo::ThreadRepository;
use agora_core::repo::user_repo::UserRepository;
use agora_core::service::membership_service::MembershipService;
use agora_core::service::message_service::MessageService;
use agora_core::service::reaction_service::ReactionService;
use agora_core::service::reputation_service::ReputationService;
use agora_core::service::thread_service::ThreadService;
use agora_core::{open_db_in_memory, DocumentStore, MemoryJobQueue, ServiceError, StoreJobQueue, Timeframe};

struct Forum {
    community: Community,
    channel_id: String,
    ann: User,
    bob: User,
}

fn user(store: &DocumentStore<'_>, username: &str) -> User {
    UserRepository::new(store)
        .store(&NewUser {
            username: Some(username.to_string()),
            ..NewUser::default()
        })
        .unwrap()
}

fn forum(store: &DocumentStore<'_>) -> Forum {
    let setup_jobs = MemoryJobQueue::new();
    let ann = user(store, "ann");
    let bob = user(store, "bob");
    let membership = MembershipService::new(store, &setup_jobs);
    let community = membership
        .create_community(
            &NewCommunity {
                name: "Rust".to_string(),
                slug: "rust".to_string(),
                description: None,
                website: None,
                profile_photo: None,
                cover_photo: None,
                is_private: false,
            },
            &ann,
        )
        .unwrap();
    membership.join_community(&community.id, &bob.id).unwrap();
    let channel_id = ChannelRepository::new(store)
        .by_community(&community.id)
        .unwrap()
        .remove(0)
        .id;
    Forum {
        community,
        channel_id,
        ann,
        bob,
    }
}

fn publish<Q: agora_core::JobQueue>(store: &DocumentStore<'_>, jobs: &Q, forum: &Forum) -> Thread {
    ThreadService::new(store, jobs)
        .publish(
            &NewThread {
                channel_id: forum.channel_id.clone(),
                community_id: forum.community.id.clone(),
                content: ThreadContent {
                    title: "Borrow checker tips".to_string(),
                    body: None,
                },
                kind: None,
                watercooler: false,
            },
            &forum.ann.id,
        )
        .unwrap()
}

/// Search index jobs recorded for entities of `kind`, in enqueue order.
fn indexed(jobs: &MemoryJobQueue, kind: &str) -> Vec<(String, SearchEvent)> {
    jobs.jobs_in(SEARCH_INDEX_QUEUE)
        .into_iter()
        .filter_map(|job| match job {
            Job::SearchIndex { id, kind: indexed_kind, event } if indexed_kind == kind => Some((id, event)),
            _ => None,
        })
        .collect()
}

fn story(thread_id: &str, body: &str) -> NewMessage {
    NewMessage {
        thread_id: thread_id.to_string(),
        thread_type: ThreadType::Story,
        message_type: MessageType::Text,
        content: MessageContent {
            body: body.to_string(),
        },
    }
}

#[test]
fn messages_and_reactions_feed_community_reputation() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let outbox = StoreJobQueue::new(&store);

    let thread = publish(&store, &outbox, &forum);
    let message = MessageService::new(&store, &outbox)
        .send(&story(&thread.id, "use clone sparingly"), &forum.bob.id)
        .unwrap();
    ReactionService::new(&store, &outbox)
        .toggle_reaction(&message.id, "like", &forum.ann.id)
        .unwrap();

    assert_eq!(outbox.pending(REPUTATION_EVENT_QUEUE).unwrap().len(), 3);
    let handled = ReputationService::new(&store).process_pending(&outbox).unwrap();
    assert_eq!(handled, 3);
    assert!(outbox.pending(REPUTATION_EVENT_QUEUE).unwrap().is_empty());

    let memberships = CommunityMembershipRepository::new(&store);
    assert_eq!(
        memberships.permissions(&forum.community.id, &forum.bob.id).unwrap().reputation,
        2
    );
    assert_eq!(
        memberships.permissions(&forum.community.id, &forum.ann.id).unwrap().reputation,
        1
    );
    let ledger = ReputationRepository::new(&store);
    assert_eq!(ledger.total(&forum.bob.id).unwrap(), 2);
    assert_eq!(ledger.change_in_timeframe(&forum.bob.id, Timeframe::Daily).unwrap(), 2);

    let stored = ThreadRepository::new(&store).by_id(&thread.id).unwrap().unwrap();
    assert_eq!(stored.message_count, 1);
    let participants: Vec<String> = ParticipantRepository::new(&store)
        .participants(&thread.id)
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(participants, vec![forum.ann.id.clone(), forum.bob.id.clone()]);
}

#[test]
fn toggling_a_reaction_removes_and_restores_it() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let thread = publish(&store, &jobs, &forum);
    let message = MessageService::new(&store, &jobs)
        .send(&story(&thread.id, "hello"), &forum.bob.id)
        .unwrap();
    let reactions = ReactionService::new(&store, &jobs);
    jobs.take();

    reactions.toggle_reaction(&message.id, "like", &forum.ann.id).unwrap();
    reactions.toggle_reaction(&message.id, "like", &forum.ann.id).unwrap();
    let removed = ReactionRepository::new(&store)
        .find_by_user_and_message(&forum.ann.id, &message.id)
        .unwrap()
        .unwrap();
    assert!(removed.deleted_at.is_some());

    reactions.toggle_reaction(&message.id, "like", &forum.ann.id).unwrap();
    let restored = ReactionRepository::new(&store)
        .find_by_user_and_message(&forum.ann.id, &message.id)
        .unwrap()
        .unwrap();
    assert_eq!(restored.id, removed.id);
    assert!(restored.deleted_at.is_none());

    assert_eq!(jobs.jobs_in(REACTION_NOTIFICATION_QUEUE).len(), 2);
    assert_eq!(jobs.jobs_in(REPUTATION_EVENT_QUEUE).len(), 3);

    // Reacting to your own message notifies nobody.
    reactions.toggle_reaction(&message.id, "like", &forum.bob.id).unwrap();
    assert_eq!(jobs.jobs_in(REACTION_NOTIFICATION_QUEUE).len(), 2);
}

#[test]
fn thread_reactions_count_once_per_user() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let thread = publish(&store, &jobs, &forum);
    let reactions = ReactionService::new(&store, &jobs);

    reactions.add_thread_reaction(&thread.id, "like", &forum.bob.id).unwrap();
    reactions.add_thread_reaction(&thread.id, "like", &forum.bob.id).unwrap();
    reactions.add_thread_reaction(&thread.id, "like", &forum.ann.id).unwrap();

    let threads = ThreadRepository::new(&store);
    assert_eq!(threads.by_id(&thread.id).unwrap().unwrap().reaction_count, 2);
    assert_eq!(jobs.jobs_in(THREAD_REACTION_NOTIFICATION_QUEUE).len(), 1);

    assert!(reactions
        .remove_thread_reaction(&thread.id, &forum.bob.id)
        .unwrap()
        .is_some());
    assert!(reactions
        .remove_thread_reaction(&thread.id, &forum.bob.id)
        .unwrap()
        .is_none());
    assert_eq!(threads.by_id(&thread.id).unwrap().unwrap().reaction_count, 1);
}

#[test]
fn locked_threads_reject_messages() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let thread = publish(&store, &jobs, &forum);
    ThreadRepository::new(&store)
        .set_lock(&thread.id, true, &forum.ann.id)
        .unwrap();

    let err = MessageService::new(&store, &jobs)
        .send(&story(&thread.id, "too late"), &forum.bob.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[test]
fn deleting_a_message_twice_only_counts_once() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let thread = publish(&store, &jobs, &forum);
    let messages = MessageService::new(&store, &jobs);
    let message = messages.send(&story(&thread.id, "oops"), &forum.bob.id).unwrap();

    let first = messages.delete(&message.id, &forum.bob.id).unwrap();
    let second = messages.delete(&message.id, &forum.bob.id).unwrap();
    assert_eq!(first.deleted_at, second.deleted_at);

    let stored = ThreadRepository::new(&store).by_id(&thread.id).unwrap().unwrap();
    assert_eq!(stored.message_count, 0);
    let deleted_jobs: Vec<Job> = jobs
        .jobs_in(REPUTATION_EVENT_QUEUE)
        .into_iter()
        .filter(|job| matches!(job, Job::ReputationEvent { kind, .. } if kind == MESSAGE_DELETED))
        .collect();
    assert_eq!(deleted_jobs.len(), 1);
}

#[test]
fn deleting_a_thread_tombstones_messages_and_silences_participants() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let threads = ThreadService::new(&store, &jobs);
    let thread = publish(&store, &jobs, &forum);
    let message = MessageService::new(&store, &jobs)
        .send(&story(&thread.id, "bye"), &forum.bob.id)
        .unwrap();

    let other = MessageService::new(&store, &jobs)
        .send(&story(&thread.id, "see you"), &forum.ann.id)
        .unwrap();
    jobs.take();

    threads.delete(&thread.id, &forum.ann.id).unwrap();

    let mut deleted_messages = indexed(&jobs, "message");
    deleted_messages.sort();
    let mut expected = vec![
        (message.id.clone(), SearchEvent::Deleted),
        (other.id.clone(), SearchEvent::Deleted),
    ];
    expected.sort();
    assert_eq!(deleted_messages, expected);
    assert_eq!(indexed(&jobs, "thread"), vec![(thread.id.clone(), SearchEvent::Deleted)]);
    assert!(ThreadRepository::new(&store).by_id(&thread.id).unwrap().is_none());
    assert!(MessageRepository::new(&store)
        .get(&message.id)
        .unwrap()
        .is_none());
    assert!(ParticipantRepository::new(&store)
        .notified_user_ids(&thread.id)
        .unwrap()
        .is_empty());
    assert!(matches!(
        threads.edit(&thread.id, &ThreadContent::default(), &forum.ann.id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn direct_messages_require_membership_and_skip_reputation() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let conversations = DirectMessageRepository::new(&store);
    let conversation = conversations.create(false).unwrap();
    conversations
        .create_member(&conversation.id, &forum.ann.id, true)
        .unwrap();
    let outsider = user(&store, "eve");

    let direct = NewMessage {
        thread_type: ThreadType::DirectMessageThread,
        ..story(&conversation.id, "psst")
    };
    let messages = MessageService::new(&store, &jobs);
    assert!(matches!(
        messages.send(&direct, &outsider.id),
        Err(ServiceError::Forbidden(_))
    ));

    let sent = messages.send(&direct, &forum.ann.id).unwrap();
    assert!(jobs.jobs_in(REPUTATION_EVENT_QUEUE).is_empty());
    let applied = ReputationService::new(&store)
        .process(&forum.ann.id, MESSAGE_CREATED, &sent.id)
        .unwrap();
    assert!(applied.is_none());
}

#[test]
fn story_messages_are_indexed_through_their_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let thread = publish(&store, &jobs, &forum);
    let messages = MessageService::new(&store, &jobs);

    let message = messages.send(&story(&thread.id, "frist"), &forum.bob.id).unwrap();
    let fixed = MessageContent {
        body: "first".to_string(),
    };
    assert!(matches!(
        messages.edit(&message.id, &fixed, &forum.ann.id),
        Err(ServiceError::Forbidden(_))
    ));
    let edited = messages.edit(&message.id, &fixed, &forum.bob.id).unwrap();
    assert_eq!(edited.content.body, "first");
    assert_eq!(edited.edits.len(), 1);
    assert_eq!(edited.edits[0].content.body, "frist");
    assert_eq!(edited.edits[0].timestamp, message.timestamp);

    messages.delete(&message.id, &forum.bob.id).unwrap();
    messages.delete(&message.id, &forum.bob.id).unwrap();

    assert_eq!(
        indexed(&jobs, "message"),
        vec![
            (message.id.clone(), SearchEvent::Created),
            (message.id.clone(), SearchEvent::Edited),
            (message.id.clone(), SearchEvent::Deleted),
        ]
    );
    assert!(matches!(
        messages.edit(&message.id, &fixed, &forum.bob.id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn direct_messages_are_never_indexed() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let forum = forum(&store);
    let jobs = MemoryJobQueue::new();
    let conversations = DirectMessageRepository::new(&store);
    let conversation = conversations.create(false).unwrap();
    conversations
        .create_member(&conversation.id, &forum.ann.id, true)
        .unwrap();

    let messages = MessageService::new(&store, &jobs);
    let sent = messages
        .send(
            &NewMessage {
                thread_type: ThreadType::DirectMessageThread,
                ..story(&conversation.id, "hi")
            },
            &forum.ann.id,
        )
        .unwrap();
    messages
        .edit(&sent.id, &MessageContent { body: "hey".to_string() }, &forum.ann.id)
        .unwrap();
    messages.delete(&sent.id, &forum.ann.id).unwrap();

    assert!(indexed(&jobs, "message").is_empty());
}
