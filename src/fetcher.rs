use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{InitialPage, Page, PageCursor, PostSummary, Publication};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to content API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content API responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("content API returned errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    #[error("malformed content API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("publication not found: {0}")]
    PublicationNotFound(String),
}

/// One page of posts per call.
///
/// `after` of `None` asks for the first page; a cursor with no next page
/// yields an empty page carrying that same cursor. Implementations must return
/// posts in a stable order for a given cursor and may return fewer than
/// `first` posts only on the final page. Callers never retry on their own.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_page(&self, after: Option<&PageCursor>, first: u32)
        -> Result<Page, FetchError>;
}

const POSTS_BY_PUBLICATION: &str = r#"
query PostsByPublication($host: String!, $first: Int!, $after: String) {
  publication(host: $host) {
    id
    title
    displayTitle
    descriptionSEO
    url
    author { name }
    preferences { logo }
    posts(first: $first, after: $after) {
      edges { node { id title brief slug publishedAt coverImage { url } } }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const MORE_POSTS_BY_PUBLICATION: &str = r#"
query MorePostsByPublication($host: String!, $first: Int!, $after: String) {
  publication(host: $host) {
    posts(first: $first, after: $after) {
      edges { node { id title brief slug publishedAt coverImage { url } } }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

/// Reads a publication's posts from a Hashnode-style GraphQL endpoint
pub struct GraphQlFetcher {
    client: reqwest::Client,
    endpoint: String,
    host: String,
}

impl GraphQlFetcher {
    pub fn new(endpoint: &str, host: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("recapfeed/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            host: host.to_string(),
        })
    }

    /// Fetches the publication together with its first page of posts
    pub async fn fetch_initial(&self, first: u32) -> Result<InitialPage, FetchError> {
        let node: PublicationNode = self
            .query(POSTS_BY_PUBLICATION, first, None)
            .await?
            .ok_or_else(|| FetchError::PublicationNotFound(self.host.clone()))?;

        let publication = Publication {
            id: node.id,
            title: node.title,
            display_title: node.display_title,
            description_seo: node.description_seo,
            url: node.url,
            author_name: node.author.name,
            logo: node.preferences.and_then(|p| p.logo),
        };

        Ok(InitialPage {
            publication,
            page: node.posts.into_page(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        first: u32,
        after: Option<&str>,
    ) -> Result<Option<T>, FetchError> {
        debug!(host = %self.host, first, after, "querying content API");

        let body = json!({
            "query": query,
            "variables": { "host": self.host, "first": first, "after": after },
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        parse_response(&bytes)
    }
}

#[async_trait]
impl FeedFetcher for GraphQlFetcher {
    async fn fetch_page(
        &self,
        after: Option<&PageCursor>,
        first: u32,
    ) -> Result<Page, FetchError> {
        let after = match after {
            None => None,
            Some(cursor) => match cursor.next_token() {
                Some(token) => Some(token),
                // past the last page: nothing to ask for
                None => {
                    debug!(host = %self.host, "cursor has no next page, skipping request");
                    return Ok(Page {
                        posts: Vec::new(),
                        cursor: cursor.clone(),
                    });
                }
            },
        };
        let node: PostsNode = self
            .query(MORE_POSTS_BY_PUBLICATION, first, after)
            .await?
            .ok_or_else(|| FetchError::PublicationNotFound(self.host.clone()))?;
        Ok(node.posts.into_page())
    }
}

/// Unwraps `data.publication`, turning GraphQL-level errors into `FetchError`
fn parse_response<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, FetchError> {
    let response: GraphQlResponse<T> = serde_json::from_slice(bytes)?;

    if !response.errors.is_empty() {
        return Err(FetchError::GraphQl(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    Ok(response.data.and_then(|d| d.publication))
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<PublicationData<T>>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PublicationData<T> {
    publication: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicationNode {
    id: String,
    title: String,
    display_title: Option<String>,
    #[serde(rename = "descriptionSEO")]
    description_seo: Option<String>,
    url: Option<String>,
    author: AuthorNode,
    preferences: Option<PreferencesNode>,
    posts: PostConnection,
}

#[derive(Debug, Deserialize)]
struct AuthorNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PreferencesNode {
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostsNode {
    posts: PostConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostConnection {
    edges: Vec<PostEdge>,
    page_info: PageInfoNode,
}

impl PostConnection {
    fn into_page(self) -> Page {
        let posts = self
            .edges
            .into_iter()
            .map(|edge| {
                let node = edge.node;
                PostSummary {
                    id: node.id,
                    title: node.title,
                    brief: node.brief,
                    slug: node.slug,
                    published_at: node.published_at,
                    cover_image: node.cover_image.map(|c| c.url).filter(|u| !u.is_empty()),
                }
            })
            .collect();

        Page {
            posts,
            cursor: PageCursor {
                end_cursor: self.page_info.end_cursor,
                has_next_page: self.page_info.has_next_page.unwrap_or(false),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostEdge {
    node: PostNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    id: String,
    title: String,
    #[serde(default)]
    brief: String,
    slug: String,
    published_at: DateTime<Utc>,
    cover_image: Option<CoverImageNode>,
}

#[derive(Debug, Deserialize)]
struct CoverImageNode {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfoNode {
    end_cursor: Option<String>,
    has_next_page: Option<bool>,
}
