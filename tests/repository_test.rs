// Integration tests for the table repositories against a mock REST backend

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use common::{
    recipe_json, sign_in_locally, sign_in_locally_as, test_app, OTHER_ID, RECIPE_ID, USER_ID,
};
use culinair_client::auth::AuthMethod;
use culinair_client::models::{FeedKind, Page};
use culinair_client::ClientError;

fn uuid(s: &str) -> Uuid {
    Uuid::from_str(s).unwrap()
}

fn eq(column: &str, value: &str) -> Matcher {
    Matcher::UrlEncoded(column.into(), format!("eq.{}", value))
}

// ==================================================================================================
// Feeds
// ==================================================================================================

#[tokio::test]
async fn test_following_feed_with_no_follows_skips_recipe_query() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let follows = server
        .mock("GET", "/rest/v1/follows")
        .match_query(eq("follower_id", USER_ID))
        .match_header("authorization", "Bearer A1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let recipes = server
        .mock("GET", "/rest/v1/recipes")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let feed = app
        .recipes
        .feed(FeedKind::Following, Page::default())
        .await
        .unwrap();
    assert!(feed.is_empty());

    follows.assert_async().await;
    recipes.assert_async().await;
}

#[tokio::test]
async fn test_following_feed_filters_by_followed_authors() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let _follows = server
        .mock("GET", "/rest/v1/follows")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{ "following_id": OTHER_ID }]).to_string())
        .create_async()
        .await;
    let recipes = server
        .mock("GET", "/rest/v1/recipes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("user_id".into(), format!("in.({})", OTHER_ID)),
            Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
            Matcher::UrlEncoded("offset".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([recipe_json(RECIPE_ID, OTHER_ID, "Shakshuka")]).to_string())
        .expect(1)
        .create_async()
        .await;

    let feed = app
        .recipes
        .feed(FeedKind::Following, Page::new(5, 10))
        .await
        .unwrap();
    recipes.assert_async().await;

    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].title, "Shakshuka");
    assert_eq!(feed[0].user_id, uuid(OTHER_ID));
}

#[tokio::test]
async fn test_trending_feed_calls_rpc() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());

    let rpc = server
        .mock("POST", "/rest/v1/rpc/trending_recipes")
        .match_body(Matcher::Json(json!({ "p_limit": 20, "p_offset": 0 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([recipe_json(RECIPE_ID, OTHER_ID, "Ramen")]).to_string())
        .expect(1)
        .create_async()
        .await;

    let feed = app
        .recipes
        .feed(FeedKind::Trending, Page::default())
        .await
        .unwrap();
    rpc.assert_async().await;
    assert_eq!(feed[0].title, "Ramen");
}

#[tokio::test]
async fn test_signed_out_feed_needing_user_fails_locally() {
    let server = Server::new_async().await;
    let app = test_app(&server.url());

    let err = app
        .recipes
        .feed(FeedKind::Recommended, Page::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}

// ==================================================================================================
// Profiles
// ==================================================================================================

#[tokio::test]
async fn test_wait_until_exists_polls_until_row_appears() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());

    let missing = server
        .mock("GET", "/rest/v1/profiles")
        .match_query(eq("id", USER_ID))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let present = server
        .mock("GET", "/rest/v1/profiles")
        .match_query(eq("id", USER_ID))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{ "id": USER_ID }]).to_string())
        .expect(1)
        .create_async()
        .await;

    assert!(app.profiles.wait_until_exists(uuid(USER_ID)).await.unwrap());
    missing.assert_async().await;
    present.assert_async().await;
}

#[tokio::test]
async fn test_wait_until_exists_gives_up_after_timeout() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());

    let _missing = server
        .mock("GET", "/rest/v1/profiles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    assert!(!app.profiles.wait_until_exists(uuid(USER_ID)).await.unwrap());
}

// ==================================================================================================
// Comments
// ==================================================================================================

#[tokio::test]
async fn test_comment_thread_is_nested() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());

    let root = "00000000-0000-0000-0000-000000000c01";
    let reply = "00000000-0000-0000-0000-000000000c02";
    let rows = json!([
        {
            "id": root,
            "recipe_id": RECIPE_ID,
            "user_id": USER_ID,
            "parent_id": null,
            "content": "Made this tonight",
            "created_at": "2025-01-12T10:00:00Z",
            "author": { "id": USER_ID, "username": "chef", "avatar_url": null }
        },
        {
            "id": reply,
            "recipe_id": RECIPE_ID,
            "user_id": OTHER_ID,
            "parent_id": root,
            "content": "How long did it bake?",
            "created_at": "2025-01-12T10:05:00Z"
        }
    ]);

    let comments = server
        .mock("GET", "/rest/v1/comments")
        .match_query(Matcher::AllOf(vec![
            eq("recipe_id", RECIPE_ID),
            Matcher::UrlEncoded("order".into(), "created_at.asc".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rows.to_string())
        .expect(1)
        .create_async()
        .await;

    let thread = app.comments.thread(uuid(RECIPE_ID)).await.unwrap();
    comments.assert_async().await;

    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].comment.id, uuid(root));
    assert_eq!(thread[0].comment.author.as_ref().unwrap().username, "chef");
    assert_eq!(thread[0].replies.len(), 1);
    assert_eq!(thread[0].replies[0].comment.id, uuid(reply));
}

#[tokio::test]
async fn test_add_reply_posts_trimmed_content() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let parent = "00000000-0000-0000-0000-000000000c01";
    let insert = server
        .mock("POST", "/rest/v1/comments")
        .match_header("prefer", "return=representation")
        .match_body(Matcher::Json(json!({
            "recipe_id": RECIPE_ID,
            "user_id": USER_ID,
            "parent_id": parent,
            "content": "Thanks!"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{
                "id": "00000000-0000-0000-0000-000000000c02",
                "recipe_id": RECIPE_ID,
                "user_id": USER_ID,
                "parent_id": parent,
                "content": "Thanks!",
                "created_at": "2025-01-12T10:05:00Z"
            }])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let comment = app
        .comments
        .add(uuid(RECIPE_ID), "  Thanks!  ", Some(uuid(parent)))
        .await
        .unwrap();
    insert.assert_async().await;
    assert_eq!(comment.parent_id, Some(uuid(parent)));
}

#[tokio::test]
async fn test_blank_comment_is_rejected_before_sending() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let insert = server
        .mock("POST", "/rest/v1/comments")
        .expect(0)
        .create_async()
        .await;

    let err = app
        .comments
        .add(uuid(RECIPE_ID), "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ValidationError(_)));
    insert.assert_async().await;
}

// ==================================================================================================
// Likes, saves and follows
// ==================================================================================================

#[tokio::test]
async fn test_like_upserts_on_user_and_recipe() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let like = server
        .mock("POST", "/rest/v1/likes")
        .match_query(Matcher::UrlEncoded(
            "on_conflict".into(),
            "user_id,recipe_id".into(),
        ))
        .match_header("prefer", Matcher::Regex("merge-duplicates".into()))
        .match_body(Matcher::Json(json!({
            "user_id": USER_ID,
            "recipe_id": RECIPE_ID
        })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    app.likes.mark(uuid(RECIPE_ID)).await.unwrap();
    like.assert_async().await;
}

#[tokio::test]
async fn test_saved_recipes_keep_save_order() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let first = "00000000-0000-0000-0000-0000000000a1";
    let second = "00000000-0000-0000-0000-0000000000a2";

    let _saves = server
        .mock("GET", "/rest/v1/saves")
        .match_query(eq("user_id", USER_ID))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{ "recipe_id": second }, { "recipe_id": first }]).to_string())
        .create_async()
        .await;
    let _recipes = server
        .mock("GET", "/rest/v1/recipes")
        .match_query(Matcher::UrlEncoded(
            "id".into(),
            format!("in.({},{})", second, first),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                recipe_json(first, OTHER_ID, "Focaccia"),
                recipe_json(second, OTHER_ID, "Tagine")
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let saved = app.saves.marked_recipes(Page::default()).await.unwrap();
    let titles: Vec<&str> = saved.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Tagine", "Focaccia"]);
}

#[tokio::test]
async fn test_following_yourself_is_rejected() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let follow = server
        .mock("POST", "/rest/v1/follows")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = app.follows.follow(uuid(USER_ID)).await.unwrap_err();
    assert!(matches!(err, ClientError::ValidationError(_)));
    follow.assert_async().await;
}

// ==================================================================================================
// Notifications
// ==================================================================================================

#[tokio::test]
async fn test_mark_all_read_counts_updated_rows() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let update = server
        .mock("PATCH", "/rest/v1/notifications")
        .match_query(Matcher::AllOf(vec![
            eq("recipient_id", USER_ID),
            eq("read", "false"),
        ]))
        .match_body(Matcher::Json(json!({ "read": true })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                { "id": "00000000-0000-0000-0000-000000000e01" },
                { "id": "00000000-0000-0000-0000-000000000e02" }
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let updated = app.notifications.mark_all_read().await.unwrap();
    assert_eq!(
        updated,
        vec![
            uuid("00000000-0000-0000-0000-000000000e01"),
            uuid("00000000-0000-0000-0000-000000000e02"),
        ]
    );
    update.assert_async().await;
}

#[tokio::test]
async fn test_push_token_registered_once_per_value() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally(&app, "A1", "R1", AuthMethod::EmailPassword).await;

    let register = server
        .mock("POST", "/rest/v1/push_tokens")
        .match_query(Matcher::UrlEncoded("on_conflict".into(), "token".into()))
        .match_body(Matcher::Json(json!({
            "user_id": USER_ID,
            "token": "fcm-1",
            "platform": "android"
        })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    assert!(app
        .notifications
        .register_push_token("fcm-1", "android")
        .await
        .unwrap());
    assert!(!app
        .notifications
        .register_push_token("fcm-1", "android")
        .await
        .unwrap());
    register.assert_async().await;
}

#[tokio::test]
async fn test_push_token_reregistered_for_next_user() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());
    sign_in_locally_as(&app, USER_ID, "A1").await;

    let first_user = server
        .mock("POST", "/rest/v1/push_tokens")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "user_id": USER_ID, "token": "fcm-1" })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let second_user = server
        .mock("POST", "/rest/v1/push_tokens")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "user_id": OTHER_ID, "token": "fcm-1" })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    assert!(app
        .notifications
        .register_push_token("fcm-1", "android")
        .await
        .unwrap());

    // Another account signs in on the same device with the same token
    app.http.credentials().clear().await.unwrap();
    sign_in_locally_as(&app, OTHER_ID, "B1").await;

    assert!(app
        .notifications
        .register_push_token("fcm-1", "android")
        .await
        .unwrap());
    first_user.assert_async().await;
    second_user.assert_async().await;
}

#[tokio::test]
async fn test_push_registration_needs_a_session() {
    let mut server = Server::new_async().await;
    let app = test_app(&server.url());

    let register = server
        .mock("POST", "/rest/v1/push_tokens")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = app
        .notifications
        .register_push_token("fcm-1", "android")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    register.assert_async().await;
}
