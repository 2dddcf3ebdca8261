//! Composition root: one content kind in one store, with its solve and
//! statistics collaborators.
//!
//! ```ignore
//! let mut forum = Forum::open(&store)?;
//! let mut topic = forum.item(42)?;
//! topic.toggle_solve(1001, true, Some(7))?;
//! let posters = topic.top_posters(10)?;
//! ```

use crate::core::config::{self, Config};
use crate::core::error::SolvestatError;
use crate::core::store::Store;
use crate::plugins::attachments::Attachment;
use crate::plugins::content::{self, Comment, Item};
use crate::plugins::solve::{SolveEngine, SolveOutcome};
use crate::plugins::statistics::{PopularDay, ReactedPost, StatisticsAggregator, TopPoster};

pub struct Forum {
    store: Store,
    solve: SolveEngine,
    statistics: StatisticsAggregator,
}

impl Forum {
    /// Load `solvestat.toml` from the store and wire the collaborators.
    pub fn open(store: &Store) -> Result<Self, SolvestatError> {
        let config = config::load_config(&store.root)?;
        Ok(Self::with_config(store, config))
    }

    pub fn with_config(store: &Store, config: Config) -> Self {
        Self {
            store: store.clone(),
            solve: SolveEngine::from_config(store, &config),
            statistics: StatisticsAggregator::from_config(store, &config),
        }
    }

    pub fn solve(&self) -> &SolveEngine {
        &self.solve
    }

    pub fn statistics(&mut self) -> &mut StatisticsAggregator {
        &mut self.statistics
    }

    /// Bind to one item. Fails with `NotFound` when the item does not exist.
    pub fn item(&mut self, item_id: i64) -> Result<ContentItem<'_>, SolvestatError> {
        let item = content::get_item(&self.store, item_id)?
            .ok_or_else(|| SolvestatError::NotFound(format!("item {}", item_id)))?;
        Ok(ContentItem {
            item,
            store: &self.store,
            solve: &self.solve,
            statistics: &mut self.statistics,
        })
    }
}

/// An item together with the behavior it gains from its collaborators.
pub struct ContentItem<'f> {
    item: Item,
    store: &'f Store,
    solve: &'f SolveEngine,
    statistics: &'f mut StatisticsAggregator,
}

impl ContentItem<'_> {
    pub fn item(&self) -> &Item {
        &self.item
    }

    fn refresh(&mut self) -> Result<(), SolvestatError> {
        if let Some(item) = content::get_item(self.store, self.item.id)? {
            self.item = item;
        }
        Ok(())
    }

    pub fn toggle_solve(
        &mut self,
        comment_id: i64,
        value: bool,
        acting_member: Option<i64>,
    ) -> Result<SolveOutcome, SolvestatError> {
        let outcome = self
            .solve
            .toggle_solve(self.item.id, comment_id, value, acting_member)?;
        self.refresh()?;
        Ok(outcome)
    }

    pub fn is_solved(&self) -> Result<bool, SolvestatError> {
        self.solve.is_solved(self.item.id)
    }

    pub fn can_solve(&self, member_id: i64) -> Result<bool, SolvestatError> {
        self.solve.can_solve(self.item.id, member_id)
    }

    pub fn solution(&self) -> Result<Option<Comment>, SolvestatError> {
        self.solve.get_solution(self.item.id)
    }

    pub fn top_attachments(&mut self, count: usize) -> Result<Vec<Attachment>, SolvestatError> {
        self.statistics.top_attachments(self.item.id, count)
    }

    pub fn image_attachments(&mut self, count: usize) -> Result<Vec<Attachment>, SolvestatError> {
        self.statistics.image_attachments(self.item.id, count)
    }

    pub fn top_posters(&mut self, count: usize) -> Result<Vec<TopPoster>, SolvestatError> {
        self.statistics.top_posters(self.item.id, count)
    }

    pub fn top_reacted_posts(
        &mut self,
        count: usize,
        viewer: Option<i64>,
    ) -> Result<Vec<ReactedPost>, SolvestatError> {
        self.statistics.top_reacted_posts(self.item.id, count, viewer)
    }

    pub fn popular_days(&mut self, count: usize) -> Result<Vec<PopularDay>, SolvestatError> {
        self.statistics.popular_days(self.item.id, count)
    }

    pub fn clear_cached_statistics(&mut self) -> Result<(), SolvestatError> {
        self.statistics.clear_cached_statistics(self.item.id)
    }
}
