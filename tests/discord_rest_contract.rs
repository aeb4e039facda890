//! Discord REST client contract tests.
//!
//! Verify request paths, auth headers and bodies against a mock server, and
//! that HTTP failures surface as `BotError::Platform`.

use foulbot::BotError;
use foulbot::platform::{
    DiscordRest, DisplayNameResolver, NotificationSink, PollPoster, VoteTallySource,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DiscordRest {
    DiscordRest::new("test-token", server.uri())
}

// ────────────────────────────────────────────────────────────────────────────
// Reactions
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reactors_requests_encoded_emoji_with_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/channels/c1/messages/m1/reactions/%E2%9C%85"))
        .and(query_param("limit", "100"))
        .and(header("Authorization", "Bot test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "username": "bot"},
            {"id": "2", "username": "ann"},
            {"id": "3", "username": "ben"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ids = client(&server)
        .reactors("c1", "m1", "✅", 100)
        .await
        .expect("reactors");
    // Filtering our own id is the caller's job.
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn reactors_http_error_maps_to_platform() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/channels/c1/messages/gone/reactions/%E2%9D%8C"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Unknown Message",
            "code": 10008
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .reactors("c1", "gone", "❌", 100)
        .await
        .expect_err("missing message");
    match err {
        BotError::Platform(msg) => {
            assert!(msg.contains("404"), "unexpected message: {msg}");
            assert!(msg.contains("Unknown Message"));
        }
        other => panic!("expected Platform error, got {other:?}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Messages
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_poll_creates_message_and_seeds_reactions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/channels/c1/messages"))
        .and(body_partial_json(json!({"content": "vote please"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "555",
            "channel_id": "c1",
            "content": "vote please"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/channels/c1/messages/555/reactions/%E2%9C%85/@me"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/channels/c1/messages/555/reactions/%E2%9D%8C/@me"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server)
        .post_poll("c1", "vote please", &["✅", "❌"])
        .await
        .expect("post poll");
    assert_eq!(id, "555");
}

#[tokio::test]
async fn post_poll_removes_message_when_reaction_seed_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/channels/c1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "556"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Missing Permissions"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/channels/c1/messages/556"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .post_poll("c1", "vote please", &["✅"])
        .await
        .expect_err("forbidden");
    assert!(matches!(err, BotError::Platform(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn notify_posts_content_with_user_mentions_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/channels/c9/messages"))
        .and(header("Authorization", "Bot test-token"))
        .and(body_partial_json(json!({
            "content": "Poll passed",
            "allowed_mentions": {"parse": ["users"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .notify("c9", "Poll passed")
        .await
        .expect("notify");
}

// ────────────────────────────────────────────────────────────────────────────
// Users
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn display_name_prefers_global_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "7",
            "username": "annie_7",
            "global_name": "Annie"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "8",
            "username": "benji",
            "global_name": null
        })))
        .mount(&server)
        .await;

    let rest = client(&server);
    assert_eq!(rest.display_name("7").await.expect("name"), "Annie");
    assert_eq!(rest.display_name("8").await.expect("name"), "benji");
}

#[tokio::test]
async fn current_user_id_uses_users_me() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "4242",
            "username": "foulbot"
        })))
        .mount(&server)
        .await;

    assert_eq!(
        client(&server).current_user_id().await.expect("id"),
        "4242"
    );
}

#[tokio::test]
async fn rejected_token_is_a_fatal_startup_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let rest = DiscordRest::new("MTIzNDU2Nzg5MDEyMzQ1Njc4.GhIjKl.sig", server.uri());
    let err = rest.current_user_id().await.expect_err("rejected token");
    assert!(matches!(err, BotError::Config(_)), "got {err:?}");
    assert!(err.is_fatal());
}

#[tokio::test]
async fn unreachable_api_is_a_fatal_startup_error() {
    // Nothing listens on the discard port.
    let rest = DiscordRest::new("MTIzNDU2Nzg5MDEyMzQ1Njc4.GhIjKl.sig", "http://127.0.0.1:9");
    let err = rest.current_user_id().await.expect_err("unreachable");
    assert!(matches!(err, BotError::Config(_)), "got {err:?}");
    assert!(err.is_fatal());
}
