use agora_core::model::thread::FeedSort;
use agora_core::model::{now_ms, GroupCount, DAY_MS, HOUR_MS, MINUTE_MS};
use agora_core::repo::channel_repo::ChannelRepository;
use agora_core::repo::community_repo::CommunityRepository;
use agora_core::repo::direct_message_repo::DirectMessageRepository;
use agora_core::repo::message_repo::{MessagePage, MessageRepository};
use agora_core::repo::thread_repo::{ThreadRepository, SPAM_CHECK_WINDOW_MS};
use agora_core::repo::user_repo::UserRepository;
use agora_core::{open_db_in_memory, DocumentStore, Filter, Page, Timeframe};
use serde_json::{json, Value};

fn put(store: &DocumentStore<'_>, collection: &str, value: Value) -> String {
    let stored = store.insert_value(collection, value).unwrap();
    stored["id"].as_str().unwrap().to_string()
}

fn community(store: &DocumentStore<'_>, slug: &str, is_private: bool, member_count: i64, created_at: i64) -> String {
    put(
        store,
        "communities",
        json!({
            "name": slug,
            "slug": slug,
            "isPrivate": is_private,
            "memberCount": member_count,
            "createdAt": created_at,
        }),
    )
}

fn channel(store: &DocumentStore<'_>, community_id: &str, slug: &str, is_private: bool) -> String {
    put(
        store,
        "channels",
        json!({
            "communityId": community_id,
            "name": slug,
            "slug": slug,
            "isPrivate": is_private,
            "createdAt": 1,
        }),
    )
}

fn thread_doc(creator: &str, channel_id: &str, community_id: &str, title: &str, at: i64) -> Value {
    json!({
        "creatorId": creator,
        "channelId": channel_id,
        "communityId": community_id,
        "content": { "title": title },
        "createdAt": at,
        "lastActive": at,
    })
}

fn thread(store: &DocumentStore<'_>, creator: &str, channel_id: &str, community_id: &str, title: &str, at: i64) -> String {
    put(store, "threads", thread_doc(creator, channel_id, community_id, title, at))
}

fn titles(threads: Vec<agora_core::model::thread::Thread>) -> Vec<String> {
    threads.into_iter().map(|thread| thread.content.title).collect()
}

fn message(store: &DocumentStore<'_>, thread_id: &str, timestamp: i64, deleted: bool) -> String {
    let mut doc = json!({
        "threadId": thread_id,
        "threadType": "story",
        "messageType": "text",
        "senderId": "ann",
        "content": { "body": format!("at {timestamp}") },
        "timestamp": timestamp,
    });
    if deleted {
        doc["deletedAt"] = json!(timestamp);
    }
    put(store, "messages", doc)
}

fn group(key: &str, count: u64) -> GroupCount {
    GroupCount {
        group: key.to_string(),
        count,
    }
}

#[test]
fn trending_feed_ranks_scored_threads_before_recent_ones() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let hub = community(&store, "hub", false, 1, 1);
    let general = channel(&store, &hub, "general", false);
    let old = thread(&store, "ann", &general, &hub, "old", 100);
    thread(&store, "ann", &general, &hub, "new", 200);
    let hot = thread(&store, "ann", &general, &hub, "hot", 50);
    let mut cooler = thread_doc("ann", &general, &hub, "watercooler", 300);
    cooler["watercooler"] = json!(true);
    put(&store, "threads", cooler);
    let mut deleted = thread_doc("ann", &general, &hub, "deleted", 400);
    deleted["deletedAt"] = json!(400);
    put(&store, "threads", deleted);

    let threads = ThreadRepository::new(&store);
    threads.store_score(&hot, 10.0).unwrap();
    threads.store_score(&old, 5.0).unwrap();
    let channels = vec![general];

    let latest = threads
        .by_channels(&channels, FeedSort::Latest, Page::default())
        .unwrap();
    assert_eq!(titles(latest), vec!["new", "old", "hot"]);
    let trending = threads
        .by_channels(&channels, FeedSort::Trending, Page::default())
        .unwrap();
    assert_eq!(titles(trending), vec!["hot", "old", "new"]);
    let second = threads
        .by_channels(&channels, FeedSort::Trending, Page::new(1, 1))
        .unwrap();
    assert_eq!(titles(second), vec!["old"]);
}

struct Visibility {
    general: String,
    staff: String,
}

/// ann posts in a public channel, a private channel of a public community
/// and a public channel of a private community; bob belongs to the private
/// channel only; dan participates in all three threads.
fn seed_visibility(store: &DocumentStore<'_>) -> Visibility {
    let open = community(store, "open", false, 2, 1);
    let closed = community(store, "closed", true, 1, 1);
    let general = channel(store, &open, "general", false);
    let staff = channel(store, &open, "staff", true);
    let inner = channel(store, &closed, "inner", false);

    let posted = [
        thread(store, "ann", &general, &open, "public", 300),
        thread(store, "ann", &staff, &open, "staff-only", 200),
        thread(store, "ann", &inner, &closed, "closed-community", 100),
    ];
    put(
        store,
        "usersChannels",
        json!({ "userId": "bob", "channelId": staff, "isMember": true }),
    );
    put(
        store,
        "usersCommunities",
        json!({ "userId": "bob", "communityId": open, "isMember": true }),
    );
    for thread_id in posted {
        put(
            store,
            "usersThreads",
            json!({ "userId": "dan", "threadId": thread_id, "isParticipant": true, "createdAt": 1 }),
        );
    }
    Visibility { general, staff }
}

#[test]
fn private_channels_and_communities_hide_threads_from_outsiders() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    seed_visibility(&store);
    let threads = ThreadRepository::new(&store);

    assert_eq!(titles(threads.public_by_user("ann", Page::default()).unwrap()), vec!["public"]);
    assert_eq!(
        titles(threads.viewable_by_user("ann", "cat", Page::default()).unwrap()),
        vec!["public"]
    );
    assert_eq!(
        titles(threads.viewable_by_user("ann", "bob", Page::default()).unwrap()),
        vec!["public", "staff-only"]
    );
    assert_eq!(
        titles(threads.viewable_by_user("ann", "bob", Page::new(1, 1)).unwrap()),
        vec!["staff-only"]
    );

    assert_eq!(
        titles(threads.public_participant_threads("dan", Page::default()).unwrap()),
        vec!["public"]
    );
    assert_eq!(
        titles(
            threads
                .viewable_participant_threads("dan", "bob", Page::default())
                .unwrap()
        ),
        vec!["public", "staff-only"]
    );
}

#[test]
fn everything_feed_spans_joined_channels() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let seeded = seed_visibility(&store);
    put(
        &store,
        "usersChannels",
        json!({ "userId": "bob", "channelId": seeded.general, "isMember": false, "isPending": true }),
    );
    let users = UserRepository::new(&store);

    assert_eq!(
        titles(users.everything("bob", Page::default()).unwrap()),
        vec!["staff-only"]
    );
    assert!(users.everything("cat", Page::default()).unwrap().is_empty());

    let counts = users
        .thread_counts(&["ann".to_string(), "cat".to_string()])
        .unwrap();
    assert_eq!(counts, vec![group("ann", 3), group("cat", 0)]);
    assert_eq!(
        ChannelRepository::new(&store)
            .thread_counts(&[seeded.general.clone(), seeded.staff.clone()])
            .unwrap(),
        vec![group(&seeded.general, 1), group(&seeded.staff, 1)]
    );
}

#[test]
fn timeframe_and_spam_queries_use_creation_time() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    let hub = community(&store, "hub", false, 1, 1);
    let general = channel(&store, &hub, "general", false);
    thread(&store, "ann", &general, &hub, "fresh", now - MINUTE_MS);
    thread(&store, "ann", &general, &hub, "older", now - 3 * DAY_MS);
    thread(&store, "ann", &general, &hub, "quarter-hour", now - 15 * MINUTE_MS);
    let mut cooler = thread_doc("ann", &general, &hub, "watercooler", now - HOUR_MS);
    cooler["watercooler"] = json!(true);
    put(&store, "threads", cooler);
    let mut deleted = thread_doc("ann", &general, &hub, "deleted", now - 2 * MINUTE_MS);
    deleted["deletedAt"] = json!(now);
    put(&store, "threads", deleted);

    let threads = ThreadRepository::new(&store);
    assert_eq!(
        threads
            .by_community_in_timeframe(&hub, Timeframe::Daily)
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        threads
            .by_community_in_timeframe(&hub, Timeframe::Weekly)
            .unwrap()
            .len(),
        3
    );

    let spam = titles(threads.by_user_as_spam_check("ann", SPAM_CHECK_WINDOW_MS).unwrap());
    assert_eq!(spam, vec!["fresh", "deleted"]);
    assert!(threads
        .by_user_as_spam_check("bob", SPAM_CHECK_WINDOW_MS)
        .unwrap()
        .is_empty());
}

#[test]
fn community_listings_and_visibility() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let open = community(&store, "open", false, 12, 1);
    let closed = community(&store, "closed", true, 30, 3);
    let secret = community(&store, "secret", true, 4, 2);
    let mut gone = json!({ "name": "gone", "slug": "gone", "memberCount": 99, "createdAt": 9 });
    gone["deletedAt"] = json!(10);
    let gone = put(&store, "communities", gone);

    for community_id in [&open, &closed, &secret, &gone] {
        put(
            &store,
            "usersCommunities",
            json!({ "userId": "ann", "communityId": community_id, "isMember": true }),
        );
    }
    put(
        &store,
        "usersCommunities",
        json!({ "userId": "bob", "communityId": closed, "isMember": true }),
    );

    let communities = CommunityRepository::new(&store);
    let slugs = |list: Vec<agora_core::model::community::Community>| -> Vec<String> {
        let mut slugs: Vec<String> = list.into_iter().map(|community| community.slug).collect();
        slugs.sort();
        slugs
    };
    assert_eq!(
        slugs(communities.visible_by_user("ann", "bob").unwrap()),
        vec!["closed", "open"]
    );
    assert_eq!(slugs(communities.visible_by_user("ann", "cat").unwrap()), vec!["open"]);

    let recent: Vec<String> = communities
        .recent()
        .unwrap()
        .into_iter()
        .map(|community| community.slug)
        .collect();
    assert_eq!(recent, vec!["closed", "secret", "open"]);
    let top: Vec<String> = communities
        .top_by_member_count(2)
        .unwrap()
        .into_iter()
        .map(|community| community.slug)
        .collect();
    assert_eq!(top, vec!["closed", "open"]);
}

#[test]
fn online_member_counts_include_recently_seen_members() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    let hub = community(&store, "hub", false, 3, 1);
    let general = channel(&store, &hub, "general", false);
    let online = put(&store, "users", json!({ "username": "on", "isOnline": true }));
    let recent = put(&store, "users", json!({ "username": "recent", "lastSeen": now - HOUR_MS }));
    let away = put(&store, "users", json!({ "username": "away", "lastSeen": now - 3 * DAY_MS }));
    let blocked = put(&store, "users", json!({ "username": "blocked", "isOnline": true }));

    for user_id in [&online, &recent, &away] {
        put(
            &store,
            "usersCommunities",
            json!({ "userId": user_id, "communityId": hub, "isMember": true }),
        );
        put(
            &store,
            "usersChannels",
            json!({ "userId": user_id, "channelId": general, "isMember": true }),
        );
    }
    put(
        &store,
        "usersChannels",
        json!({ "userId": blocked, "channelId": general, "isMember": true, "isBlocked": true }),
    );

    assert_eq!(
        CommunityRepository::new(&store)
            .online_member_counts(&[hub.clone()])
            .unwrap(),
        vec![group(&hub, 2)]
    );
    assert_eq!(
        ChannelRepository::new(&store)
            .online_member_counts(&[general.clone()])
            .unwrap(),
        vec![group(&general, 2)]
    );
}

#[test]
fn community_growth_compares_adjacent_windows() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let now = now_ms();
    let hub = community(&store, "hub", false, 1, 1);
    let general = channel(&store, &hub, "general", false);
    thread(&store, "ann", &general, &hub, "a", now - HOUR_MS);
    thread(&store, "ann", &general, &hub, "b", now - 2 * HOUR_MS);
    thread(&store, "ann", &general, &hub, "c", now - DAY_MS - HOUR_MS);

    let communities = CommunityRepository::new(&store);
    let daily = communities
        .growth("threads", Timeframe::Daily, "createdAt", &hub, &Filter::All)
        .unwrap();
    assert_eq!(daily.current_period_count, 2);
    assert_eq!(daily.prev_period_count, 1);
    assert_eq!(daily.growth, Some(100));

    let members = communities
        .growth("usersCommunities", Timeframe::Weekly, "createdAt", &hub, &Filter::eq("isMember", true))
        .unwrap();
    assert_eq!(members.current_period_count, 0);
    assert_eq!(members.growth, None);
}

#[test]
fn message_pages_walk_both_directions() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    for timestamp in [10, 20, 30, 40] {
        message(&store, "t1", timestamp, false);
    }
    message(&store, "t1", 25, true);
    message(&store, "t2", 5, false);

    let messages = MessageRepository::new(&store);
    let stamps = |page| -> Vec<i64> {
        messages
            .page("t1", page)
            .unwrap()
            .into_iter()
            .map(|message| message.timestamp)
            .collect()
    };
    assert_eq!(stamps(MessagePage::Forward { first: 2, after: None }), vec![10, 20]);
    assert_eq!(stamps(MessagePage::Forward { first: 2, after: Some(20) }), vec![30, 40]);
    assert_eq!(stamps(MessagePage::Backward { last: 2, before: None }), vec![40, 30]);
    assert_eq!(stamps(MessagePage::Backward { last: 2, before: Some(30) }), vec![20, 10]);
    assert_eq!(
        stamps(MessagePage::Forward { first: 0, after: None }),
        vec![10, 20, 30, 40]
    );
    assert_eq!(
        stamps(MessagePage::Backward { last: 0, before: Some(40) }),
        vec![30, 20, 10]
    );

    let last: Vec<Option<i64>> = messages
        .last_message_of_threads(&["t1".to_string(), "t2".to_string(), "empty".to_string()])
        .unwrap()
        .into_iter()
        .map(|message| message.map(|message| message.timestamp))
        .collect();
    assert_eq!(last, vec![Some(40), Some(5), None]);
}

#[test]
fn users_are_found_by_any_indexed_field() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let ann = put(
        &store,
        "users",
        json!({ "username": "ann", "githubProviderId": "gh-1" }),
    );
    let users = UserRepository::new(&store);

    let found = users.by_index("githubProviderId", "gh-1").unwrap().unwrap();
    assert_eq!(found.id, ann);
    assert_eq!(users.by_index("username", "ann").unwrap().map(|user| user.id), Some(ann));
    assert!(users.by_index("username", "nobody").unwrap().is_none());
}

#[test]
fn direct_message_last_seen_is_set_for_members_only() {
    let conn = open_db_in_memory().unwrap();
    let store = DocumentStore::new(&conn);
    let direct = DirectMessageRepository::new(&store);
    let thread = direct.create(false).unwrap();
    direct.create_member(&thread.id, "ann", true).unwrap();

    let before = now_ms();
    let record = direct.set_last_seen(&thread.id, "ann").unwrap().unwrap();
    assert!(record.last_seen.unwrap() >= before);
    assert!(direct.set_last_seen(&thread.id, "bob").unwrap().is_none());
}
