//! Per-item statistics over an item's comments.
//!
//! `top_posters`, `top_reacted_posts` and `popular_days` are read-through
//! cached in [`StatisticsCache`]; attachment listings are computed on every
//! call. Aggregates only count visible comments (approved and not hidden,
//! for comment types that track those attributes).

use crate::core::broker::DbBroker;
use crate::core::config::{CacheConfig, Config};
use crate::core::db;
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::attachments::{self, Attachment};
use crate::plugins::content::{self, Comment, ContentKind, Member};
use crate::plugins::permissions;
use crate::plugins::reactions::{self, ReactionCount};
use crate::plugins::stats_cache::StatisticsCache;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TOP_ATTACHMENTS: usize = 5;
pub const DEFAULT_IMAGE_ATTACHMENTS: usize = 10;
pub const DEFAULT_TOP_POSTERS: usize = 10;
pub const DEFAULT_TOP_REACTED: usize = 5;
pub const DEFAULT_POPULAR_DAYS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopPoster {
    pub member: Member,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactedPost {
    pub comment: Comment,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopularDay {
    /// Day key, `YYYY-M-D` without zero padding.
    pub key: String,
    /// Midday of that day.
    pub date: NaiveDateTime,
    pub count: i64,
    /// Earliest comment posted that day.
    pub comment_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PosterRow {
    author_id: i64,
    sum: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayRow {
    time: String,
    count: i64,
    comment_id: i64,
}

pub struct StatisticsAggregator {
    root: PathBuf,
    kind: ContentKind,
    reacted_page: usize,
    cache: StatisticsCache,
}

impl StatisticsAggregator {
    pub fn new(store: &Store, kind: ContentKind, cache: &CacheConfig) -> Self {
        Self {
            root: store.root.clone(),
            cache: StatisticsCache::new(&kind.item_class, cache.ttl_secs),
            reacted_page: cache.reacted_page,
            kind,
        }
    }

    pub fn from_config(store: &Store, config: &Config) -> Self {
        Self::new(store, config.content.clone(), &config.cache)
    }

    pub fn kind(&self) -> &ContentKind {
        &self.kind
    }

    /// Largest `count` accepted by [`Self::top_reacted_posts`].
    pub fn reacted_page(&self) -> usize {
        self.reacted_page
    }

    fn with_conn<F, R>(&mut self, op: &str, f: F) -> Result<R, SolvestatError>
    where
        F: FnOnce(&Connection, &ContentKind, &mut StatisticsCache) -> Result<R, SolvestatError>,
    {
        let broker = DbBroker::new(&self.root);
        let db_path = db::content_db_path(&self.root);
        let kind = &self.kind;
        let cache = &mut self.cache;
        broker.with_conn(&db_path, "solvestat", op, |conn| f(conn, kind, cache))
    }

    /// Most downloaded attachments of visible comments.
    pub fn top_attachments(
        &mut self,
        item_id: i64,
        count: usize,
    ) -> Result<Vec<Attachment>, SolvestatError> {
        self.with_conn("statistics.top_attachments", |conn, kind, _| {
            content::load_item(conn, item_id)?;
            let mut all = attachments::visible_attachments(conn, kind, item_id, false)?;
            all.sort_by(|a, b| b.hits.cmp(&a.hits));
            all.truncate(count);
            Ok(all)
        })
    }

    /// Image attachments of visible comments.
    pub fn image_attachments(
        &mut self,
        item_id: i64,
        count: usize,
    ) -> Result<Vec<Attachment>, SolvestatError> {
        self.with_conn("statistics.image_attachments", |conn, kind, _| {
            content::load_item(conn, item_id)?;
            let mut images = attachments::visible_attachments(conn, kind, item_id, true)?;
            images.truncate(count);
            Ok(images)
        })
    }

    /// Members with the most visible comments, busiest first.
    pub fn top_posters(
        &mut self,
        item_id: i64,
        count: usize,
    ) -> Result<Vec<TopPoster>, SolvestatError> {
        if !self.kind.has_author {
            return Err(SolvestatError::Unsupported(format!(
                "{} has no author attribute",
                self.kind.comment_class
            )));
        }
        let limit = sql_limit(count)?;
        let cache_key = format!("topPosters_{}", count);

        self.with_conn("statistics.top_posters", |conn, kind, cache| {
            content::load_item(conn, item_id)?;
            let now = time::now_epoch();
            let rows: Vec<PosterRow> = match cache.get(conn, item_id, &cache_key, now)? {
                Some(rows) => rows,
                None => {
                    let rows = query_top_posters(conn, kind, item_id, limit)?;
                    cache.put(conn, item_id, &cache_key, &rows, now)?;
                    rows
                }
            };

            if rows.is_empty() {
                return Ok(Vec::new());
            }

            // The member lookup has no order of its own; re-impose the count order.
            let ids: Vec<i64> = rows.iter().map(|r| r.author_id).collect();
            let mut members = content::members_by_ids(conn, &ids)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                if let Some(member) = members.remove(&row.author_id) {
                    out.push(TopPoster {
                        member,
                        count: row.sum,
                    });
                }
            }
            Ok(out)
        })
    }

    /// Comments with the most reactions that `viewer` may see.
    ///
    /// The cached page holds the top `reacted_page` comments regardless of
    /// `count`; filtering happens after the cache read, so fewer than `count`
    /// results may come back.
    pub fn top_reacted_posts(
        &mut self,
        item_id: i64,
        count: usize,
        viewer: Option<i64>,
    ) -> Result<Vec<ReactedPost>, SolvestatError> {
        if !self.kind.reactable {
            return Err(SolvestatError::Unsupported(format!(
                "{} does not support reactions",
                self.kind.comment_class
            )));
        }
        if count > self.reacted_page {
            return Err(SolvestatError::InvalidArgument(format!(
                "count must be at most {}, got {}",
                self.reacted_page, count
            )));
        }
        let page = self.reacted_page;
        let cache_key = format!("topReactedPosts_{}", page);

        self.with_conn("statistics.top_reacted_posts", |conn, kind, cache| {
            let item = content::load_item(conn, item_id)?;
            let now = time::now_epoch();
            let ranked: Vec<ReactionCount> = match cache.get(conn, item_id, &cache_key, now)? {
                Some(rows) => rows,
                None => {
                    let mut rows = reactions::reaction_counts(conn, kind, item_id)?;
                    rows.truncate(page);
                    cache.put(conn, item_id, &cache_key, &rows, now)?;
                    rows
                }
            };

            if ranked.is_empty() || count == 0 {
                return Ok(Vec::new());
            }

            let ids: Vec<i64> = ranked.iter().map(|r| r.comment_id).collect();
            let mut comments = content::comments_by_ids(conn, &ids)?;
            let mut out = Vec::new();
            for row in ranked {
                let Some(comment) = comments.remove(&row.comment_id) else {
                    continue;
                };
                if comment.item_id != item_id {
                    continue;
                }
                if !permissions::can_view_comment(conn, kind, viewer, &item, &comment)? {
                    continue;
                }
                out.push(ReactedPost {
                    comment,
                    count: row.sum,
                });
                if out.len() == count {
                    break;
                }
            }
            Ok(out)
        })
    }

    /// Days with the most visible comments, busiest first.
    ///
    /// Returned as an ordered list rather than a map keyed by day, so the
    /// ranking survives serialization; each entry carries its `key`.
    /// Comments whose timestamp falls outside SQLite's date range (e.g. a
    /// millisecond value) are left out.
    pub fn popular_days(
        &mut self,
        item_id: i64,
        count: usize,
    ) -> Result<Vec<PopularDay>, SolvestatError> {
        let limit = sql_limit(count)?;
        let cache_key = format!("popularDays_{}", count);

        self.with_conn("statistics.popular_days", |conn, kind, cache| {
            content::load_item(conn, item_id)?;
            let now = time::now_epoch();
            let rows: Vec<DayRow> = match cache.get(conn, item_id, &cache_key, now)? {
                Some(rows) => rows,
                None => {
                    let rows = query_popular_days(conn, kind, item_id, limit)?;
                    cache.put(conn, item_id, &cache_key, &rows, now)?;
                    rows
                }
            };

            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let Some(date) = parse_day_key(&row.time) else {
                    tracing::warn!(item_id, key = %row.time, "skipping unparsable day key");
                    continue;
                };
                out.push(PopularDay {
                    key: row.time,
                    date,
                    count: row.count,
                    comment_id: row.comment_id,
                });
            }
            Ok(out)
        })
    }

    /// Forget every cached statistic for the item.
    pub fn clear_cached_statistics(&mut self, item_id: i64) -> Result<(), SolvestatError> {
        self.with_conn("statistics.clear", |conn, _, cache| {
            cache.clear(conn, item_id)
        })
    }
}

/// `count` as a SQL `LIMIT`. SQLite reads a negative limit as "no limit".
fn sql_limit(count: usize) -> Result<i64, SolvestatError> {
    i64::try_from(count)
        .map_err(|_| SolvestatError::InvalidArgument(format!("count {} is too large", count)))
}

fn visible_filter(kind: &ContentKind) -> String {
    kind.visible_predicates()
        .iter()
        .map(|p| format!(" AND {p}"))
        .collect()
}

fn query_top_posters(
    conn: &Connection,
    kind: &ContentKind,
    item_id: i64,
    limit: i64,
) -> Result<Vec<PosterRow>, SolvestatError> {
    let sql = format!(
        "SELECT author_id, COUNT(*) AS posts FROM comments
         WHERE item_id = ?1{}
         GROUP BY author_id
         ORDER BY posts DESC, author_id ASC
         LIMIT ?2",
        visible_filter(kind)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![item_id, limit], |row| {
        Ok(PosterRow {
            author_id: row.get(0)?,
            sum: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn query_popular_days(
    conn: &Connection,
    kind: &ContentKind,
    item_id: i64,
    limit: i64,
) -> Result<Vec<DayRow>, SolvestatError> {
    let ts = format!("COALESCE({}, 0)", kind.date_column());
    let part = |fmt: &str| format!("CAST(strftime('{fmt}', {ts}, 'unixepoch') AS INTEGER)");
    let day_key = format!(
        "{} || '-' || {} || '-' || {}",
        part("%Y"),
        part("%m"),
        part("%d")
    );
    let sql = format!(
        "SELECT {day_key} AS day_key, COUNT(*) AS posts, MIN(id) AS first_id FROM comments
         WHERE item_id = ?1{}
         GROUP BY day_key
         HAVING day_key IS NOT NULL
         ORDER BY posts DESC, first_id ASC
         LIMIT ?2",
        visible_filter(kind)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![item_id, limit], |row| {
        Ok(DayRow {
            time: row.get(0)?,
            count: row.get(1)?,
            comment_id: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Parse a `YYYY-M-D` key into midday of that date.
pub fn parse_day_key(key: &str) -> Option<NaiveDateTime> {
    let mut parts = key.splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(12, 0, 0)
}
