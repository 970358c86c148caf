use crate::feed::FeedSnapshot;
use crate::models::PostSummary;

/// Posts shown beside the hero post
pub const SECONDARY_POSTS: usize = 3;

/// How the home page splits the loaded feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeLayout<'a> {
    pub hero: Option<&'a PostSummary>,
    pub secondary: &'a [PostSummary],
    pub more: &'a [PostSummary],
}

impl<'a> HomeLayout<'a> {
    pub fn from_posts(posts: &'a [PostSummary]) -> Self {
        let (hero, rest) = match posts.split_first() {
            Some((hero, rest)) => (Some(hero), rest),
            None => (None, posts),
        };
        let (secondary, more) = rest.split_at(rest.len().min(SECONDARY_POSTS));
        Self { hero, secondary, more }
    }

    pub fn is_empty(&self) -> bool {
        self.hero.is_none()
    }
}

/// Pagination affordance offered under the "more posts" list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadControl {
    None,
    /// Explicit "load more" button
    Button,
    /// Passive end-of-list marker that loads when scrolled into view
    Sentinel,
}

impl LoadControl {
    pub fn for_snapshot(snapshot: &FeedSnapshot) -> Self {
        let layout = HomeLayout::from_posts(&snapshot.posts);
        if layout.more.is_empty() || !snapshot.can_load_more {
            LoadControl::None
        } else if snapshot.has_loaded_more {
            LoadControl::Sentinel
        } else {
            LoadControl::Button
        }
    }
}
