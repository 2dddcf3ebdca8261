use rusqlite::{Connection, params};
use solvestat::core::db;
use solvestat::core::error::SolvestatError;
use solvestat::core::store::Store;
use solvestat::plugins::content::{self, NewComment, NewContainer, NewItem};
use solvestat::plugins::forum::Forum;
use solvestat::plugins::permissions::{self, ModPermission, PERM_SET_BEST_ANSWER};
use solvestat::plugins::solve::{ItemSummary, SolveEngine};
use tempfile::{TempDir, tempdir};

const T0: i64 = 1_709_805_600; // 2024-03-07 10:00 UTC

struct Topic {
    _tmp: TempDir,
    store: Store,
    container: i64,
    author: i64,
    helper: i64,
    item: i64,
    comments: Vec<i64>,
}

fn setup(allow_solvable: bool, allow_member_solvable: bool) -> Topic {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path());
    db::initialize_content_db(&store.root).unwrap();

    let container = content::create_container(
        &store,
        NewContainer {
            name: "Help",
            allow_solvable,
            allow_member_solvable,
        },
    )
    .unwrap();
    let author = content::create_member(&store, "asker").unwrap();
    let helper = content::create_member(&store, "helper").unwrap();
    let item = content::create_item(
        &store,
        NewItem {
            container_id: container,
            author_id: author,
            title: "Printer is on fire",
            archived: false,
        },
    )
    .unwrap();

    let mut comments = Vec::new();
    for (i, who) in [author, helper, helper].into_iter().enumerate() {
        let id =
            content::create_comment(&store, NewComment::visible(item, who, T0 + i as i64)).unwrap();
        comments.push(id);
    }

    Topic {
        _tmp: tmp,
        store,
        container,
        author,
        helper,
        item,
        comments,
    }
}

fn open(store: &Store) -> Connection {
    Connection::open(db::content_db_path(&store.root)).unwrap()
}

fn index_rows(store: &Store, item: i64) -> Vec<i64> {
    let conn = open(store);
    let mut stmt = conn
        .prepare("SELECT comment_id FROM solved_index WHERE item_id = ?1 ORDER BY id")
        .unwrap();
    stmt.query_map([item], |r| r.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

/// The item's solution, the comments' flags and the index agree.
fn assert_consistent(store: &Store, item_id: i64) {
    let item = content::get_item(store, item_id).unwrap().unwrap();
    let comments = content::list_comments(store, item_id).unwrap();
    let flagged: Vec<i64> = comments.iter().filter(|c| c.solved).map(|c| c.id).collect();
    let index = index_rows(store, item_id);
    match item.solved_comment_id {
        Some(id) => {
            assert_eq!(flagged, vec![id]);
            assert_eq!(index, vec![id]);
        }
        None => {
            assert!(flagged.is_empty(), "stray flags: {:?}", flagged);
            assert!(index.is_empty(), "stray index rows: {:?}", index);
        }
    }
}

#[test]
fn setting_a_new_solution_replaces_the_old_one() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());

    let first = engine
        .toggle_solve(t.item, t.comments[1], true, Some(t.author))
        .unwrap();
    assert!(first.solved);
    assert_eq!(first.replaced, None);
    assert_consistent(&t.store, t.item);

    let second = engine
        .toggle_solve(t.item, t.comments[2], true, Some(t.author))
        .unwrap();
    assert_eq!(second.replaced, Some(t.comments[1]));
    assert_eq!(second.solved_comment_id, Some(t.comments[2]));
    assert_consistent(&t.store, t.item);

    let old = content::get_comment(&t.store, t.comments[1]).unwrap().unwrap();
    assert!(!old.solved);
}

#[test]
fn toggle_sequences_keep_item_comment_and_index_in_step() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    let (a, b, c) = (t.comments[0], t.comments[1], t.comments[2]);

    let steps = [
        (a, true),
        (b, true),
        (a, false),
        (b, false),
        (c, true),
        (c, true),
        (b, false),
        (c, false),
    ];
    for (comment, value) in steps {
        engine.toggle_solve(t.item, comment, value, None).unwrap();
        assert_consistent(&t.store, t.item);
    }
    assert!(!engine.is_solved(t.item).unwrap());
}

#[test]
fn unsetting_twice_is_harmless() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    engine
        .toggle_solve(t.item, t.comments[1], true, None)
        .unwrap();

    for _ in 0..2 {
        let out = engine
            .toggle_solve(t.item, t.comments[1], false, None)
            .unwrap();
        assert!(!out.solved);
        assert_eq!(out.solved_comment_id, None);
        assert_consistent(&t.store, t.item);
    }
}

#[test]
fn unsetting_another_comment_leaves_the_solution_alone() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    engine
        .toggle_solve(t.item, t.comments[1], true, None)
        .unwrap();

    let out = engine
        .toggle_solve(t.item, t.comments[2], false, None)
        .unwrap();
    assert_eq!(out.solved_comment_id, Some(t.comments[1]));
    assert!(engine.is_solved(t.item).unwrap());
    assert_consistent(&t.store, t.item);
}

#[test]
fn solution_round_trips_through_get_solution() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    assert_eq!(engine.get_solution(t.item).unwrap(), None);

    engine
        .toggle_solve(t.item, t.comments[2], true, None)
        .unwrap();
    let solution = engine.get_solution(t.item).unwrap().unwrap();
    assert_eq!(solution.id, t.comments[2]);
    assert_eq!(solution.author_id, t.helper);
    assert!(solution.solved);
}

#[test]
fn missing_rows_fail_with_not_found_and_change_nothing() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());

    let err = engine.toggle_solve(t.item, 9_999, true, None).unwrap_err();
    assert!(matches!(err, SolvestatError::NotFound(_)), "{:?}", err);

    let err = engine
        .toggle_solve(9_999, t.comments[0], true, None)
        .unwrap_err();
    assert!(matches!(err, SolvestatError::NotFound(_)), "{:?}", err);

    assert!(!engine.is_solved(t.item).unwrap());
    assert_consistent(&t.store, t.item);
}

#[test]
fn comment_of_another_item_is_rejected() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    let other_item = content::create_item(
        &t.store,
        NewItem {
            container_id: t.container,
            author_id: t.author,
            title: "Unrelated",
            archived: false,
        },
    )
    .unwrap();
    let stray =
        content::create_comment(&t.store, NewComment::visible(other_item, t.helper, T0)).unwrap();

    let err = engine.toggle_solve(t.item, stray, true, None).unwrap_err();
    assert!(matches!(err, SolvestatError::InvalidArgument(_)), "{:?}", err);

    let stray = content::get_comment(&t.store, stray).unwrap().unwrap();
    assert!(!stray.solved);
}

#[test]
fn is_solved_requires_a_solvable_container() {
    let t = setup(false, false);
    let engine = SolveEngine::new(&t.store, Default::default());
    engine
        .toggle_solve(t.item, t.comments[1], true, None)
        .unwrap();

    let item = content::get_item(&t.store, t.item).unwrap().unwrap();
    assert_eq!(item.solved_comment_id, Some(t.comments[1]));
    assert!(!engine.is_solved(t.item).unwrap());
}

#[test]
fn can_solve_rules() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    let stranger = content::create_member(&t.store, "stranger").unwrap();

    assert!(engine.can_solve(t.item, t.author).unwrap());
    assert!(!engine.can_solve(t.item, t.helper).unwrap());
    assert!(!engine.can_solve(t.item, 0).unwrap());

    // moderator limited to another container
    permissions::set_mod_permission(&t.store, stranger, PERM_SET_BEST_ANSWER, &ModPermission::Allowed)
        .unwrap();
    permissions::set_mod_permission(
        &t.store,
        stranger,
        "forums",
        &ModPermission::Containers(vec![t.container + 100]),
    )
    .unwrap();
    assert!(!engine.can_solve(t.item, stranger).unwrap());

    permissions::set_mod_permission(
        &t.store,
        stranger,
        "forums",
        &ModPermission::Containers(vec![t.container]),
    )
    .unwrap();
    assert!(engine.can_solve(t.item, stranger).unwrap());

    // without the global grant the container list is not enough
    permissions::set_mod_permission(&t.store, stranger, PERM_SET_BEST_ANSWER, &ModPermission::Denied)
        .unwrap();
    assert!(!engine.can_solve(t.item, stranger).unwrap());
}

#[test]
fn archived_items_and_closed_containers_cannot_be_solved() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    open(&t.store)
        .execute("UPDATE items SET archived = 1 WHERE id = ?1", [t.item])
        .unwrap();
    assert!(!engine.can_solve(t.item, t.author).unwrap());

    let closed = setup(false, true);
    let engine = SolveEngine::new(&closed.store, Default::default());
    assert!(!engine.can_solve(closed.item, closed.author).unwrap());

    let staff_only = setup(true, false);
    let engine = SolveEngine::new(&staff_only.store, Default::default());
    assert!(!engine.can_solve(staff_only.item, staff_only.author).unwrap());
}

#[test]
fn search_results_gain_solved_state() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    let unsolved = content::create_item(
        &t.store,
        NewItem {
            container_id: t.container,
            author_id: t.author,
            title: "Still broken",
            archived: false,
        },
    )
    .unwrap();
    let hidden = content::create_item(
        &t.store,
        NewItem {
            container_id: t.container,
            author_id: t.author,
            title: "Spam",
            archived: false,
        },
    )
    .unwrap();
    open(&t.store)
        .execute("UPDATE items SET hidden = 1 WHERE id = ?1", [hidden])
        .unwrap();
    engine
        .toggle_solve(t.item, t.comments[1], true, None)
        .unwrap();

    let rows = vec![
        ItemSummary::new(t.item, "Printer is on fire"),
        ItemSummary::new(unsolved, "Still broken"),
        ItemSummary::new(hidden, "Spam"),
        ItemSummary::new(4_242, "Gone"),
    ];
    let out = engine.search_result_extra_data(&rows, None).unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(out[0].solved, Some(true));
    assert_eq!(out[1].solved, Some(false));
    assert_eq!(out[2].solved, None);
    assert_eq!(out[3].solved, None);
    assert_eq!(out[1].title, "Still broken");
}

#[test]
fn search_results_without_ids_are_empty() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    assert!(engine.search_result_extra_data(&[], None).unwrap().is_empty());
    let zero = vec![ItemSummary::new(0, "draft")];
    assert!(engine.search_result_extra_data(&zero, None).unwrap().is_empty());
}

#[test]
fn solution_count_follows_the_index() {
    let t = setup(true, true);
    let engine = SolveEngine::new(&t.store, Default::default());
    let second = content::create_item(
        &t.store,
        NewItem {
            container_id: t.container,
            author_id: t.author,
            title: "Scanner too",
            archived: false,
        },
    )
    .unwrap();
    let answer =
        content::create_comment(&t.store, NewComment::visible(second, t.helper, T0)).unwrap();

    engine
        .toggle_solve(t.item, t.comments[1], true, None)
        .unwrap();
    engine.toggle_solve(second, answer, true, None).unwrap();
    assert_eq!(engine.solution_count(t.helper).unwrap(), 2);
    assert_eq!(engine.solution_count(t.author).unwrap(), 0);

    engine.toggle_solve(second, answer, false, None).unwrap();
    assert_eq!(engine.solution_count(t.helper).unwrap(), 1);
}

#[test]
fn any_container_allows_solvable_checks_every_container() {
    let t = setup(false, false);
    let engine = SolveEngine::new(&t.store, Default::default());
    assert!(!engine.any_container_allows_solvable().unwrap());

    content::create_container(
        &t.store,
        NewContainer {
            name: "Q&A",
            allow_solvable: false,
            allow_member_solvable: true,
        },
    )
    .unwrap();
    assert!(engine.any_container_allows_solvable().unwrap());
}

#[test]
fn forum_items_delegate_to_the_engine() {
    let t = setup(true, true);
    let mut forum = Forum::open(&t.store).unwrap();

    let mut topic = forum.item(t.item).unwrap();
    assert!(!topic.is_solved().unwrap());
    topic
        .toggle_solve(t.comments[2], true, Some(t.author))
        .unwrap();
    assert_eq!(topic.item().solved_comment_id, Some(t.comments[2]));
    assert!(topic.is_solved().unwrap());
    assert_eq!(topic.solution().unwrap().map(|c| c.id), Some(t.comments[2]));

    let err = forum.item(77_777).err().unwrap();
    assert!(matches!(err, SolvestatError::NotFound(_)));
}

#[test]
fn legacy_zero_solution_reads_as_unsolved() {
    let t = setup(true, true);
    let conn = open(&t.store);
    conn.execute(
        "UPDATE items SET solved_comment_id = 0 WHERE id = ?1",
        params![t.item],
    )
    .unwrap();
    let engine = SolveEngine::new(&t.store, Default::default());
    assert!(!engine.is_solved(t.item).unwrap());
    assert_eq!(engine.get_solution(t.item).unwrap(), None);
}
