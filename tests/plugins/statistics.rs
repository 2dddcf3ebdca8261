use chrono::NaiveDate;
use rusqlite::{Connection, params};
use serde_json::Value;
use solvestat::core::config::CacheConfig;
use solvestat::core::db;
use solvestat::core::error::SolvestatError;
use solvestat::core::store::Store;
use solvestat::core::time;
use solvestat::plugins::attachments::{self, NewAttachment};
use solvestat::plugins::content::{self, ContentKind, NewComment, NewContainer, NewItem};
use solvestat::plugins::forum::Forum;
use solvestat::plugins::permissions::{self, ModPermission, PERM_VIEW_HIDDEN};
use solvestat::plugins::reactions;
use solvestat::plugins::statistics::StatisticsAggregator;
use tempfile::{TempDir, tempdir};

fn epoch(y: i32, m: u32, d: u32, h: u32) -> i64 {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp()
}

struct Board {
    _tmp: TempDir,
    store: Store,
    container: i64,
    item: i64,
}

fn setup() -> Board {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path());
    db::initialize_content_db(&store.root).unwrap();
    let container = content::create_container(
        &store,
        NewContainer {
            name: "General",
            allow_solvable: true,
            allow_member_solvable: true,
        },
    )
    .unwrap();
    let item = new_item(&store, container, "Show your desk");
    Board {
        _tmp: tmp,
        store,
        container,
        item,
    }
}

fn new_item(store: &Store, container: i64, title: &str) -> i64 {
    content::create_item(
        store,
        NewItem {
            container_id: container,
            author_id: 0,
            title,
            archived: false,
        },
    )
    .unwrap()
}

fn post(store: &Store, item: i64, author: i64, date: i64) -> i64 {
    content::create_comment(store, NewComment::visible(item, author, date)).unwrap()
}

fn post_hidden(store: &Store, item: i64, author: i64, date: i64) -> i64 {
    content::create_comment(
        store,
        NewComment {
            hidden: true,
            ..NewComment::visible(item, author, date)
        },
    )
    .unwrap()
}

fn react(store: &Store, comment: i64, times: usize) {
    for i in 0..times {
        reactions::add_reaction(store, &ContentKind::forum_topic(), comment, 1_000 + i as i64)
            .unwrap();
    }
}

fn aggregator(store: &Store) -> StatisticsAggregator {
    StatisticsAggregator::new(store, ContentKind::forum_topic(), &CacheConfig::default())
}

fn open(store: &Store) -> Connection {
    Connection::open(db::content_db_path(&store.root)).unwrap()
}

fn cache_row(store: &Store, item: i64) -> Option<(Value, i64)> {
    let conn = open(store);
    let mut stmt = conn
        .prepare(
            "SELECT cache_contents, cache_added FROM item_statistics_cache
             WHERE cache_class = 'forums_topic' AND cache_item_id = ?1",
        )
        .unwrap();
    let mut rows = stmt
        .query_map([item], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))
        .unwrap();
    rows.next().map(|r| {
        let (raw, added) = r.unwrap();
        (serde_json::from_str(&raw).unwrap(), added)
    })
}

#[test]
fn top_posters_count_visible_comments_only() {
    let b = setup();
    let ann = content::create_member(&b.store, "ann").unwrap();
    let bob = content::create_member(&b.store, "bob").unwrap();
    let cy = content::create_member(&b.store, "cy").unwrap();
    let t = epoch(2024, 3, 7, 9);

    post(&b.store, b.item, bob, t);
    post(&b.store, b.item, ann, t);
    post(&b.store, b.item, ann, t);
    post(&b.store, b.item, bob, t);
    post(&b.store, b.item, cy, t);
    for _ in 0..3 {
        post_hidden(&b.store, b.item, cy, t);
    }

    let mut stats = aggregator(&b.store);
    let top = stats.top_posters(b.item, 10).unwrap();
    let got: Vec<(&str, i64)> = top.iter().map(|p| (p.member.name.as_str(), p.count)).collect();
    assert_eq!(got, vec![("ann", 2), ("bob", 2), ("cy", 1)]);

    let top2 = stats.top_posters(b.item, 2).unwrap();
    assert_eq!(top2.len(), 2);
    assert_eq!(top2[0].member.id, ann);
}

#[test]
fn stale_cache_row_is_recomputed_and_overwritten() {
    let b = setup();
    let ann = content::create_member(&b.store, "ann").unwrap();
    let bob = content::create_member(&b.store, "bob").unwrap();
    post(&b.store, b.item, ann, epoch(2024, 3, 7, 9));

    let first = aggregator(&b.store).top_posters(b.item, 10).unwrap();
    assert_eq!(first.len(), 1);
    let (contents, _) = cache_row(&b.store, b.item).unwrap();
    assert!(contents.get("topPosters_10").is_some());

    // a fresh row is served as-is, even though the data moved on
    post(&b.store, b.item, bob, epoch(2024, 3, 7, 10));
    let cached = aggregator(&b.store).top_posters(b.item, 10).unwrap();
    assert_eq!(cached, first);

    let expired = time::now_epoch() - 86_400 - 1;
    open(&b.store)
        .execute(
            "UPDATE item_statistics_cache SET cache_added = ?1 WHERE cache_item_id = ?2",
            params![expired, b.item],
        )
        .unwrap();

    let fresh = aggregator(&b.store).top_posters(b.item, 10).unwrap();
    assert_eq!(fresh.len(), 2);
    let (_, added) = cache_row(&b.store, b.item).unwrap();
    assert!(added > expired);
}

#[test]
fn clearing_forces_recompute() {
    let b = setup();
    let ann = content::create_member(&b.store, "ann").unwrap();
    let bob = content::create_member(&b.store, "bob").unwrap();
    post(&b.store, b.item, ann, epoch(2024, 3, 7, 9));

    let mut stats = aggregator(&b.store);
    assert_eq!(stats.top_posters(b.item, 10).unwrap().len(), 1);
    post(&b.store, b.item, bob, epoch(2024, 3, 7, 10));
    assert_eq!(stats.top_posters(b.item, 10).unwrap().len(), 1);

    stats.clear_cached_statistics(b.item).unwrap();
    assert!(cache_row(&b.store, b.item).is_none());
    assert_eq!(stats.top_posters(b.item, 10).unwrap().len(), 2);
}

#[test]
fn cache_entries_for_different_items_do_not_mix() {
    let b = setup();
    let other = new_item(&b.store, b.container, "Show your chair");
    let ann = content::create_member(&b.store, "ann").unwrap();
    let bob = content::create_member(&b.store, "bob").unwrap();
    post(&b.store, b.item, ann, epoch(2024, 3, 7, 9));
    post(&b.store, other, bob, epoch(2024, 3, 7, 9));

    let mut stats = aggregator(&b.store);
    let first = stats.top_posters(b.item, 10).unwrap();
    let second = stats.top_posters(other, 10).unwrap();
    assert_eq!(first[0].member.id, ann);
    assert_eq!(second[0].member.id, bob);
}

#[test]
fn top_reacted_posts_hide_what_the_viewer_cannot_see() {
    let b = setup();
    let t = epoch(2024, 3, 7, 9);
    let a = post(&b.store, b.item, 1, t);
    let bb = post(&b.store, b.item, 2, t);
    let c = post_hidden(&b.store, b.item, 3, t);
    react(&b.store, a, 5);
    react(&b.store, bb, 2);
    react(&b.store, c, 10);

    let mut stats = aggregator(&b.store);
    let guest = stats.top_reacted_posts(b.item, 5, None).unwrap();
    let got: Vec<(i64, i64)> = guest.iter().map(|p| (p.comment.id, p.count)).collect();
    assert_eq!(got, vec![(a, 5), (bb, 2)]);

    let moderator = content::create_member(&b.store, "mod").unwrap();
    permissions::set_mod_permission(&b.store, moderator, PERM_VIEW_HIDDEN, &ModPermission::Allowed)
        .unwrap();
    permissions::set_mod_permission(&b.store, moderator, "forums", &ModPermission::Global).unwrap();
    let staff = stats.top_reacted_posts(b.item, 5, Some(moderator)).unwrap();
    let got: Vec<i64> = staff.iter().map(|p| p.comment.id).collect();
    assert_eq!(got, vec![c, a, bb]);

    let one = stats.top_reacted_posts(b.item, 1, None).unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].comment.id, a);
}

#[test]
fn top_reacted_posts_share_one_cached_page() {
    let b = setup();
    let a = post(&b.store, b.item, 1, epoch(2024, 3, 7, 9));
    react(&b.store, a, 1);

    let mut stats = aggregator(&b.store);
    stats.top_reacted_posts(b.item, 5, None).unwrap();
    stats.top_reacted_posts(b.item, 3, None).unwrap();

    let (contents, _) = cache_row(&b.store, b.item).unwrap();
    let keys: Vec<&String> = contents.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["topReactedPosts_100"]);
}

#[test]
fn top_reacted_posts_limit_count_to_the_cached_page() {
    let b = setup();
    let mut stats = aggregator(&b.store);
    let err = stats.top_reacted_posts(b.item, 101, None).unwrap_err();
    assert!(matches!(err, SolvestatError::InvalidArgument(_)), "{:?}", err);
    assert!(stats.top_reacted_posts(b.item, 100, None).unwrap().is_empty());
}

#[test]
fn aggregates_of_an_empty_item_are_empty() {
    let b = setup();
    let mut stats = aggregator(&b.store);
    assert!(stats.top_posters(b.item, 10).unwrap().is_empty());
    assert!(stats.top_reacted_posts(b.item, 5, None).unwrap().is_empty());
    assert!(stats.popular_days(b.item, 10).unwrap().is_empty());
    assert!(stats.top_attachments(b.item, 5).unwrap().is_empty());
    assert!(stats.image_attachments(b.item, 10).unwrap().is_empty());
}

#[test]
fn missing_item_is_not_found() {
    let b = setup();
    let mut stats = aggregator(&b.store);
    let err = stats.top_posters(404, 10).unwrap_err();
    assert!(matches!(err, SolvestatError::NotFound(_)), "{:?}", err);
    let err = stats.popular_days(404, 10).unwrap_err();
    assert!(matches!(err, SolvestatError::NotFound(_)), "{:?}", err);
}

#[test]
fn unsupported_comment_types_are_rejected() {
    let b = setup();
    let anonymous = ContentKind {
        has_author: false,
        reactable: false,
        ..ContentKind::forum_topic()
    };
    let mut stats = StatisticsAggregator::new(&b.store, anonymous, &CacheConfig::default());
    let err = stats.top_posters(b.item, 10).unwrap_err();
    assert!(matches!(err, SolvestatError::Unsupported(_)), "{:?}", err);
    let err = stats.top_reacted_posts(b.item, 5, None).unwrap_err();
    assert!(matches!(err, SolvestatError::Unsupported(_)), "{:?}", err);

    let err = reactions::add_reaction(&b.store, stats.kind(), 1, 1).unwrap_err();
    assert!(matches!(err, SolvestatError::Unsupported(_)), "{:?}", err);
}

#[test]
fn popular_days_group_by_calendar_day() {
    let b = setup();
    let first = post(&b.store, b.item, 1, epoch(2024, 3, 7, 9));
    post(&b.store, b.item, 2, epoch(2024, 3, 7, 18));
    let later = post(&b.store, b.item, 1, epoch(2024, 3, 8, 8));
    post_hidden(&b.store, b.item, 3, epoch(2024, 3, 8, 9));
    post_hidden(&b.store, b.item, 3, epoch(2024, 3, 8, 10));

    let mut stats = aggregator(&b.store);
    let days = stats.popular_days(b.item, 10).unwrap();
    assert_eq!(days.len(), 2);

    assert_eq!(days[0].key, "2024-3-7");
    assert_eq!(days[0].count, 2);
    assert_eq!(days[0].comment_id, first);
    assert_eq!(
        days[0].date,
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    );
    assert_eq!(days[1].key, "2024-3-8");
    assert_eq!(days[1].count, 1);
    assert_eq!(days[1].comment_id, later);

    let top = stats.popular_days(b.item, 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].key, "2024-3-7");
}

#[test]
fn attachments_come_from_visible_comments() {
    let b = setup();
    let kind = ContentKind::forum_topic();
    let t = epoch(2024, 3, 7, 9);
    let shown = post(&b.store, b.item, 1, t);
    let hidden = post_hidden(&b.store, b.item, 2, t);

    let file = |name: &'static str, hits: i64, is_image: bool| NewAttachment {
        file_name: name,
        size: 1_024,
        hits,
        is_image,
        member_id: 1,
    };
    let notes = attachments::attach(&b.store, &kind, shown, file("notes.txt", 3, false)).unwrap();
    let photo = attachments::attach(&b.store, &kind, shown, file("desk.JPG", 9, true)).unwrap();
    let log = attachments::attach(&b.store, &kind, shown, file("build.log", 1, false)).unwrap();
    attachments::attach(&b.store, &kind, hidden, file("secret.png", 50, true)).unwrap();

    let mut stats = aggregator(&b.store);
    let top: Vec<i64> = stats
        .top_attachments(b.item, 5)
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(top, vec![photo, notes, log]);
    assert_eq!(stats.top_attachments(b.item, 2).unwrap().len(), 2);

    let images = stats.image_attachments(b.item, 10).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, photo);
    assert_eq!(images[0].ext, "jpg");
    assert_eq!(images[0].comment_id, shown);

    // listings are never cached
    assert!(cache_row(&b.store, b.item).is_none());
}

#[test]
fn forum_uses_configured_page_size() {
    let b = setup();
    std::fs::write(
        b.store.root.join("solvestat.toml"),
        "[cache]\nttl_secs = 60\nreacted_page = 20\n",
    )
    .unwrap();
    let mut forum = Forum::open(&b.store).unwrap();
    assert_eq!(forum.statistics().reacted_page(), 20);

    let mut topic = forum.item(b.item).unwrap();
    assert!(topic.top_reacted_posts(20, None).unwrap().is_empty());
    let err = topic.top_reacted_posts(21, None).unwrap_err();
    assert!(matches!(err, SolvestatError::InvalidArgument(_)), "{:?}", err);

    topic.top_reacted_posts(5, None).unwrap();
    let (contents, _) = cache_row(&b.store, b.item).unwrap();
    assert!(contents.get("topReactedPosts_20").is_some());
}

#[test]
fn out_of_range_dates_do_not_break_popular_days() {
    let b = setup();
    let ann = content::create_member(&b.store, "ann").unwrap();
    let bob = content::create_member(&b.store, "bob").unwrap();
    let kept = post(&b.store, b.item, ann, epoch(2024, 3, 7, 9));
    // a millisecond timestamp lands far beyond year 9999
    post(&b.store, b.item, bob, 1_700_000_000_000);
    post(&b.store, b.item, bob, 1_700_000_000_500);

    let mut stats = aggregator(&b.store);
    let days = stats.popular_days(b.item, 10).unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].key, "2024-3-7");
    assert_eq!(days[0].comment_id, kept);

    // the bad rows still count as posts
    assert_eq!(stats.top_posters(b.item, 10).unwrap().len(), 2);
}

#[test]
#[cfg(target_pointer_width = "64")]
fn counts_beyond_sql_range_are_rejected() {
    let b = setup();
    let mut stats = aggregator(&b.store);
    let err = stats.top_posters(b.item, usize::MAX).unwrap_err();
    assert!(matches!(err, SolvestatError::InvalidArgument(_)), "{:?}", err);
    let err = stats.popular_days(b.item, usize::MAX).unwrap_err();
    assert!(matches!(err, SolvestatError::InvalidArgument(_)), "{:?}", err);
}
