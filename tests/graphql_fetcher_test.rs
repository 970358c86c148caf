//! Integration tests for the GraphQL content API client.

use recapfeed::feed::{FeedController, FeedPhase, GuardViolation, LoadOutcome};
use recapfeed::fetcher::{FeedFetcher, FetchError, GraphQlFetcher};
use recapfeed::models::{PageCursor, DEFAULT_COVER};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOST: &str = "recap.example.dev";

fn post_node(n: u32) -> Value {
    let cover = if n % 2 == 0 {
        json!({ "url": format!("https://cdn.example.dev/{}.png", n) })
    } else {
        Value::Null
    };
    json!({
        "node": {
            "id": format!("P{}", n),
            "title": format!("Week {}", n),
            "brief": format!("What I watched in week {}", n),
            "slug": format!("week-{}", n),
            "publishedAt": format!("2024-01-{:02}T09:00:00.000Z", n),
            "coverImage": cover,
        }
    })
}

type Range = std::ops::RangeInclusive<u32>;

fn posts_connection(range: Range, end_cursor: &str, has_next_page: bool) -> Value {
    json!({
        "edges": range.map(post_node).collect::<Vec<_>>(),
        "pageInfo": { "endCursor": end_cursor, "hasNextPage": has_next_page },
    })
}

fn first_page_body() -> Value {
    json!({
        "data": {
            "publication": {
                "id": "pub-1",
                "title": "Recap",
                "displayTitle": "Weekly Recap",
                "descriptionSEO": null,
                "url": "https://recap.example.dev",
                "author": { "name": "Test Author" },
                "preferences": { "logo": null },
                "posts": posts_connection(1..=4, "c1", true),
            }
        }
    })
}

fn more_posts_body(range: Range, end_cursor: &str, has_next_page: bool) -> Value {
    let posts = posts_connection(range, end_cursor, has_next_page);
    json!({ "data": { "publication": { "posts": posts } } })
}

fn fetcher_for(server: &MockServer) -> GraphQlFetcher {
    GraphQlFetcher::new(&format!("{}/graphql", server.uri()), HOST).unwrap()
}

#[tokio::test]
async fn test_fetch_initial_reads_publication_and_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query PostsByPublication"))
        .and(body_partial_json(json!({ "variables": { "host": HOST, "first": 10 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page_body()))
        .expect(1)
        .mount(&server)
        .await;

    let initial = fetcher_for(&server).fetch_initial(10).await.unwrap();

    assert_eq!(initial.publication.page_title(), "Weekly Recap");
    assert_eq!(initial.publication.author_name, "Test Author");
    assert_eq!(initial.page.posts.len(), 4);
    assert_eq!(initial.page.posts[0].cover_image_url(), DEFAULT_COVER);
    assert_eq!(initial.page.posts[1].cover_image_url(), "https://cdn.example.dev/2.png");
    assert_eq!(initial.page.cursor, PageCursor::new("c1", true));
}

#[tokio::test]
async fn test_fetch_page_sends_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("query MorePostsByPublication"))
        .and(body_partial_json(json!({ "variables": { "host": HOST, "first": 3, "after": "c1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(more_posts_body(5..=7, "c2", false)))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher_for(&server)
        .fetch_page(Some(&PageCursor::new("c1", true)), 3)
        .await
        .unwrap();

    let ids: Vec<_> = page.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["P5", "P6", "P7"]);
    assert!(!page.cursor.is_advanceable());
}

#[tokio::test]
async fn test_missing_publication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "publication": null } })),
        )
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .fetch_page(Some(&PageCursor::new("c1", true)), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::PublicationNotFound(host) if host == HOST));
}

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetcher_for(&server).fetch_initial(10).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(status) if status.as_u16() == 503));
}

#[tokio::test]
async fn test_load_more_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("query PostsByPublication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "variables": { "after": "c1" } })))
        .and(body_string_contains("query MorePostsByPublication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(more_posts_body(5..=7, "c2", false)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let initial = fetcher.fetch_initial(10).await.unwrap();
    let controller = FeedController::new(fetcher, 10, initial.page);

    assert_eq!(
        controller.notify_viewport_entered().await.unwrap(),
        LoadOutcome::Ignored(GuardViolation::AwaitingManualLoad)
    );

    let outcome = controller.request_load_more().await.unwrap();
    assert_eq!(outcome, LoadOutcome::Appended { added: 3, exhausted: true });

    let snapshot = controller.snapshot();
    let ids: Vec<_> = snapshot.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3", "P4", "P5", "P6", "P7"]);
    assert!(snapshot.has_loaded_more);
    assert_eq!(snapshot.phase, FeedPhase::Exhausted);

    assert_eq!(
        controller.notify_viewport_entered().await.unwrap(),
        LoadOutcome::Ignored(GuardViolation::Exhausted)
    );
    // mock expectations verify no further requests were made
}

#[tokio::test]
async fn test_exhausted_cursor_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page_body()))
        .expect(0)
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server);

    let last = PageCursor::new("c9", false);
    let page = fetcher.fetch_page(Some(&last), 10).await.unwrap();
    assert!(page.posts.is_empty());
    assert_eq!(page.cursor, last);

    let tokenless = PageCursor { end_cursor: None, has_next_page: true };
    let page = fetcher.fetch_page(Some(&tokenless), 10).await.unwrap();
    assert!(page.posts.is_empty());
    assert_eq!(page.cursor, tokenless);
}
