//! Centralized database schema definitions.
//!
//! solvestat keeps a single SQLite database (`content.db`) per store. Tables fall
//! into two groups:
//! 1. Framework-owned content the engine reads: containers, members, items,
//!    comments, moderator permissions, reactions and attachments.
//! 2. Engine-owned state: the solved index, the statistics cache and the
//!    notification queue.

pub const CONTENT_DB_NAME: &str = "content.db";

// --- 1. Framework-owned content ---

pub const CONTENT_DB_SCHEMA_CONTAINERS: &str = "
    CREATE TABLE IF NOT EXISTS containers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        allow_solvable INTEGER NOT NULL DEFAULT 0,
        allow_member_solvable INTEGER NOT NULL DEFAULT 0
    )
";

pub const CONTENT_DB_SCHEMA_MEMBERS: &str = "
    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        joined INTEGER NOT NULL DEFAULT 0
    )
";

pub const CONTENT_DB_SCHEMA_ITEMS: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY,
        container_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL DEFAULT 0,
        title TEXT NOT NULL,
        solved_comment_id INTEGER, -- NULL while unsolved
        archived INTEGER NOT NULL DEFAULT 0,
        approved INTEGER NOT NULL DEFAULT 1,
        hidden INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
";

pub const CONTENT_DB_SCHEMA_COMMENTS: &str = "
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY,
        item_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL DEFAULT 0,
        body TEXT NOT NULL DEFAULT '',
        solved INTEGER NOT NULL DEFAULT 0,
        approved INTEGER NOT NULL DEFAULT 1,
        hidden INTEGER NOT NULL DEFAULT 0,
        date INTEGER,
        updated INTEGER
    )
";
pub const CONTENT_DB_SCHEMA_COMMENTS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_item ON comments(item_id)";

pub const CONTENT_DB_SCHEMA_MOD_PERMISSIONS: &str = "
    CREATE TABLE IF NOT EXISTS mod_permissions (
        member_id INTEGER NOT NULL,
        perm_key TEXT NOT NULL,
        value TEXT NOT NULL, -- '1' | '0' | '-1' (use global) | JSON array of container ids
        PRIMARY KEY(member_id, perm_key)
    )
";

pub const CONTENT_DB_SCHEMA_REPUTATION_INDEX: &str = "
    CREATE TABLE IF NOT EXISTS reputation_index (
        id INTEGER PRIMARY KEY,
        app TEXT NOT NULL,
        type TEXT NOT NULL,
        type_id INTEGER NOT NULL,
        item_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        rep_date INTEGER NOT NULL
    )
";
pub const CONTENT_DB_SCHEMA_REPUTATION_INDEX_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reputation_item ON reputation_index(app, type, item_id)";

pub const CONTENT_DB_SCHEMA_ATTACHMENTS: &str = "
    CREATE TABLE IF NOT EXISTS attachments (
        attach_id INTEGER PRIMARY KEY,
        file_name TEXT NOT NULL,
        ext TEXT NOT NULL DEFAULT '',
        size INTEGER NOT NULL DEFAULT 0,
        hits INTEGER NOT NULL DEFAULT 0,
        is_image INTEGER NOT NULL DEFAULT 0,
        member_id INTEGER NOT NULL DEFAULT 0,
        date INTEGER NOT NULL DEFAULT 0
    )
";

pub const CONTENT_DB_SCHEMA_ATTACHMENTS_MAP: &str = "
    CREATE TABLE IF NOT EXISTS attachments_map (
        attachment_id INTEGER NOT NULL,
        location_key TEXT NOT NULL,
        id1 INTEGER NOT NULL, -- item id
        id2 INTEGER NOT NULL, -- comment id
        PRIMARY KEY(attachment_id, location_key, id1, id2)
    )
";

// --- 2. Engine-owned state ---

pub const CONTENT_DB_SCHEMA_SOLVED_INDEX: &str = "
    CREATE TABLE IF NOT EXISTS solved_index (
        id INTEGER PRIMARY KEY,
        member_id INTEGER NOT NULL,
        app TEXT NOT NULL,
        comment_class TEXT NOT NULL,
        comment_id INTEGER NOT NULL,
        item_id INTEGER NOT NULL,
        solved_date INTEGER NOT NULL
    )
";
pub const CONTENT_DB_SCHEMA_SOLVED_INDEX_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_solved_comment ON solved_index(comment_class, comment_id)";

pub const CONTENT_DB_SCHEMA_STATISTICS_CACHE: &str = "
    CREATE TABLE IF NOT EXISTS item_statistics_cache (
        cache_class TEXT NOT NULL,
        cache_item_id INTEGER NOT NULL,
        cache_contents TEXT NOT NULL, -- JSON object: cache key -> value
        cache_added INTEGER NOT NULL,
        PRIMARY KEY(cache_class, cache_item_id)
    )
";

pub const CONTENT_DB_SCHEMA_NOTIFICATIONS: &str = "
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY,
        member_id INTEGER NOT NULL,
        notification_key TEXT NOT NULL,
        item_class TEXT NOT NULL,
        item_id INTEGER NOT NULL,
        comment_id INTEGER,
        sent_at INTEGER NOT NULL,
        read_at INTEGER
    )
";

/// Every statement needed for a fresh content database, in dependency order.
pub const CONTENT_DB_SCHEMAS: &[&str] = &[
    CONTENT_DB_SCHEMA_CONTAINERS,
    CONTENT_DB_SCHEMA_MEMBERS,
    CONTENT_DB_SCHEMA_ITEMS,
    CONTENT_DB_SCHEMA_COMMENTS,
    CONTENT_DB_SCHEMA_COMMENTS_INDEX,
    CONTENT_DB_SCHEMA_MOD_PERMISSIONS,
    CONTENT_DB_SCHEMA_REPUTATION_INDEX,
    CONTENT_DB_SCHEMA_REPUTATION_INDEX_IDX,
    CONTENT_DB_SCHEMA_ATTACHMENTS,
    CONTENT_DB_SCHEMA_ATTACHMENTS_MAP,
    CONTENT_DB_SCHEMA_SOLVED_INDEX,
    CONTENT_DB_SCHEMA_SOLVED_INDEX_IDX,
    CONTENT_DB_SCHEMA_STATISTICS_CACHE,
    CONTENT_DB_SCHEMA_NOTIFICATIONS,
];
