use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Cover shown for posts published without a cover image
pub const DEFAULT_COVER: &str = "/assets/default-cover.png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub brief: String,
    pub slug: String,
    pub published_at: DateTime<Utc>,
    pub cover_image: Option<String>,
}

impl PostSummary {
    pub fn cover_image_url(&self) -> &str {
        self.cover_image.as_deref().unwrap_or(DEFAULT_COVER)
    }

    /// Site-relative link to the post page
    pub fn path(&self) -> String {
        format!("/{}", self.slug)
    }
}

/// Continuation point returned with every page of posts.
///
/// `end_cursor` is opaque and only meaningful to the content API. A cursor
/// is advanceable only when the API reported a next page *and* handed back
/// a token to request it with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl PageCursor {
    pub fn new(end_cursor: impl Into<String>, has_next_page: bool) -> Self {
        Self {
            end_cursor: Some(end_cursor.into()),
            has_next_page,
        }
    }

    pub fn exhausted() -> Self {
        Self::default()
    }

    pub fn is_advanceable(&self) -> bool {
        self.next_token().is_some()
    }

    /// Token to pass as `after` for the following page, if any
    pub fn next_token(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub posts: Vec<PostSummary>,
    pub cursor: PageCursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    pub display_title: Option<String>,
    pub description_seo: Option<String>,
    pub url: Option<String>,
    pub author_name: String,
    pub logo: Option<String>,
}

/// How the publication identifies itself in the footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand<'a> {
    Logo { src: &'a str, alt: &'a str },
    Title(&'a str),
}

impl Publication {
    pub fn brand(&self) -> Brand<'_> {
        match self.logo.as_deref().filter(|l| !l.is_empty()) {
            Some(src) => Brand::Logo { src, alt: &self.title },
            None => Brand::Title(&self.title),
        }
    }

    /// Absolute link to a post, or the site-relative path when the
    /// publication URL is unknown
    pub fn post_url(&self, post: &PostSummary) -> String {
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), post.path()),
            None => post.path(),
        }
    }

    pub fn page_title(&self) -> &str {
        self.display_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(self.title.as_str()).filter(|t| !t.is_empty()))
            .unwrap_or("Recap")
    }

    pub fn description(&self) -> String {
        self.description_seo
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| Some(self.title.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| format!("{}'s Recap", self.author_name))
    }
}

/// First page of a publication, fetched ahead of the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialPage {
    pub publication: Publication,
    pub page: Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_needs_token_to_advance() {
        assert!(PageCursor::new("c1", true).is_advanceable());
        assert!(!PageCursor::new("c1", false).is_advanceable());
        assert_eq!(PageCursor::new("c1", false).next_token(), None);

        let tokenless = PageCursor { end_cursor: None, has_next_page: true };
        assert!(!tokenless.is_advanceable());
    }

    #[test]
    fn test_publication_title_fallbacks() {
        let mut publication = Publication {
            id: "pub".to_string(),
            title: String::new(),
            display_title: None,
            description_seo: None,
            url: None,
            author_name: "Sam".to_string(),
            logo: None,
        };
        assert_eq!(publication.page_title(), "Recap");
        assert_eq!(publication.description(), "Sam's Recap");

        publication.title = "Weekly".to_string();
        assert_eq!(publication.page_title(), "Weekly");
        assert_eq!(publication.description(), "Weekly");

        publication.display_title = Some("Weekly Recaps".to_string());
        assert_eq!(publication.page_title(), "Weekly Recaps");
    }

    #[test]
    fn test_brand_and_post_links() {
        let mut publication = Publication {
            id: "pub".to_string(),
            title: "Weekly".to_string(),
            display_title: None,
            description_seo: None,
            url: None,
            author_name: "Sam".to_string(),
            logo: None,
        };
        let post = PostSummary {
            id: "p1".to_string(),
            title: "Week 1".to_string(),
            brief: String::new(),
            slug: "week-1".to_string(),
            published_at: Utc::now(),
            cover_image: None,
        };

        assert_eq!(publication.brand(), Brand::Title("Weekly"));
        assert_eq!(publication.post_url(&post), "/week-1");

        publication.logo = Some("https://cdn.example.dev/logo.png".to_string());
        publication.url = Some("https://recap.example.dev/".to_string());
        assert_eq!(
            publication.brand(),
            Brand::Logo { src: "https://cdn.example.dev/logo.png", alt: "Weekly" }
        );
        assert_eq!(publication.post_url(&post), "https://recap.example.dev/week-1");
    }
}
