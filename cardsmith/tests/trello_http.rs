//! HTTP-level tests for the Trello client, committer and search tool.
//!
//! The client is blocking, so it is built and used on `spawn_blocking` while
//! the mock server lives on the test runtime.

use std::time::Duration;

use cardsmith::core::evaluator::Evaluator;
use cardsmith::io::commit::{CommitAction, Committer, TrelloCommitter};
use cardsmith::io::search::{SearchResult, SearchTool, TrelloSearch};
use cardsmith::io::trello::{CardFields, CommitError, TrelloClient, TrelloCredentials};
use cardsmith::test_support::{bug_draft, draft_with_id};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(uri: &str) -> TrelloClient {
    TrelloClient::new(
        uri,
        TrelloCredentials {
            api_key: "test-key".to_string(),
            token: "test-token".to_string(),
        },
        Duration::from_secs(5),
    )
    .expect("client")
}

#[tokio::test(flavor = "multi_thread")]
async fn create_posts_card_at_top_of_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/cards"))
        .and(query_param("idList", "list-1"))
        .and(query_param("name", "[Bug] Login page crashes on iOS"))
        .and(query_param("pos", "top"))
        .and(query_param("key", "test-key"))
        .and(query_param("token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new1234567",
            "name": "[Bug] Login page crashes on iOS",
            "shortUrl": "https://trello.com/c/Ab12Cd34"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let receipt = tokio::task::spawn_blocking(move || {
        let committer = TrelloCommitter::new(client(&uri), "list-1");
        let approved = Evaluator::default()
            .approve(&bug_draft("Login page crashes on iOS"))
            .expect("approved");
        committer.commit(&approved)
    })
    .await
    .expect("join")
    .expect("commit");

    assert_eq!(receipt.action, CommitAction::Create);
    assert_eq!(
        receipt.message,
        "SUCCESS: Created card https://trello.com/c/Ab12Cd34"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn update_puts_to_the_card_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/1/cards/abc1234567"))
        .and(query_param("name", "[Bug] Login crash"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc1234567",
            "name": "[Bug] Login crash",
            "shortUrl": "https://trello.com/c/Zz99"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let receipt = tokio::task::spawn_blocking(move || {
        let committer = TrelloCommitter::new(client(&uri), "list-1");
        let approved = Evaluator::default()
            .approve(&draft_with_id("Login crash", "abc1234567"))
            .expect("approved");
        committer.commit(&approved)
    })
    .await
    .expect("join")
    .expect("commit");

    assert_eq!(receipt.action, CommitAction::Update);
    assert_eq!(receipt.card_id.as_deref(), Some("abc1234567"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_carries_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/cards"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid value for idList"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let committer = TrelloCommitter::new(client(&uri), "bogus");
        let approved = Evaluator::default()
            .approve(&bug_draft("Login crash"))
            .expect("approved");
        committer.commit(&approved)
    })
    .await
    .expect("join")
    .expect_err("api error");

    assert!(matches!(err, CommitError::Api { status: 400, .. }));
    assert_eq!(err.to_string(), "API ERROR: invalid value for idList");
}

#[tokio::test(flavor = "multi_thread")]
async fn search_summarizes_board_cards() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/search"))
        .and(query_param("query", "login"))
        .and(query_param("modelTypes", "cards"))
        .and(query_param("idBoards", "board-1"))
        .and(query_param("cards_limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [
                {"id": "abc1234567", "name": "[Bug] Login crash", "desc": "Crashes after submit on iOS 17"},
                {"id": "def1234567", "name": "[Feature] SSO login", "desc": ""}
            ]
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        TrelloSearch::new(client(&uri), Some("board-1".to_string()), 5, 10).search("login")
    })
    .await
    .expect("join");

    let SearchResult::Matches(cards) = &result else {
        panic!("expected matches, got {result:?}");
    };
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].id, "abc1234567");
    assert_eq!(cards[0].description_preview, "Crashes af...");
    assert!(result.render().contains("ID: def1234567"));
}

#[tokio::test(flavor = "multi_thread")]
async fn search_errors_become_readable_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        TrelloSearch::new(client(&uri), None, 5, 100).search("login")
    })
    .await
    .expect("join");

    match result {
        SearchResult::Unavailable(message) => {
            assert!(message.starts_with("search failed:"));
            assert!(message.contains("invalid token"));
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_search_is_no_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cards": []})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        TrelloSearch::new(client(&uri), None, 5, 100).search("nothing")
    })
    .await
    .expect("join");

    assert_eq!(result, SearchResult::NoMatches);
}

#[tokio::test(flavor = "multi_thread")]
async fn lists_are_read_from_the_board() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/boards/board-1/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "list-1", "name": "To Do"},
            {"id": "list-2", "name": "Done"}
        ])))
        .mount(&server)
        .await;

    let uri = server.uri();
    let lists = tokio::task::spawn_blocking(move || client(&uri).lists("board-1"))
        .await
        .expect("join")
        .expect("lists");

    let names: Vec<&str> = lists.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["To Do", "Done"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_id_is_sent_as_a_single_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "me",
            "name": "[Bug] Login crash"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let fields = CardFields {
            name: "[Bug] Login crash".to_string(),
            desc: "Crashes on submit".to_string(),
        };
        client(&uri).update_card("abcdefghij/../../members/me", &fields)
    })
    .await
    .expect("join")
    .expect("update");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let sent = requests[0].url.path();
    assert!(sent.starts_with("/1/cards/abcdefghij"), "sent to {sent}");
    assert!(!sent.contains("/members"), "sent to {sent}");
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_write_with_unexpected_body_still_commits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new1234567"})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let receipt = tokio::task::spawn_blocking(move || {
        let committer = TrelloCommitter::new(client(&uri), "list-1");
        let approved = Evaluator::default()
            .approve(&bug_draft("Login crash"))
            .expect("approved");
        committer.commit(&approved)
    })
    .await
    .expect("join")
    .expect("commit");

    assert_eq!(receipt.action, CommitAction::Create);
    assert_eq!(receipt.card_id.as_deref(), Some("new1234567"));
    assert_eq!(receipt.message, "SUCCESS: Created card new1234567");
}
