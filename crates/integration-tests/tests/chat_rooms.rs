//! Integration tests for the chat room engine.
//!
//! Exercises message append, room closure, authorization, and the
//! closed-room gate against in-memory fakes.

use atelier_core::{ChatRoomId, OrderStatus};
use atelier_integration_tests::TestContext;
use atelier_server::models::OrderWithRoom;
use atelier_server::notifications::NotificationJob;
use atelier_server::services::{CreateOrder, ServiceError};

async fn place_order(ctx: &TestContext, owner: atelier_core::Actor) -> OrderWithRoom {
    ctx.orders
        .create(
            owner,
            CreateOrder {
                description: "Hand-bound journal".to_string(),
                specifications: serde_json::json!({"pages": 200}),
                quantity: 3,
            },
        )
        .await
        .expect("create order")
}

// =============================================================================
// send_message
// =============================================================================

#[tokio::test]
async fn test_owner_can_send_message() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let order = place_order(&ctx, owner).await;

    let message = ctx
        .chat
        .send_message(order.chat_room.id, owner, "Could the cover be leather?")
        .await
        .expect("send");

    assert_eq!(message.message.content, "Could the cover be leather?");
    assert_eq!(message.message.chat_room_id, order.chat_room.id);
    assert_eq!(message.message.user_id, owner.id);
    assert_eq!(message.author.id, owner.id);
    assert_eq!(message.author.email, "owner@example.com");
}

#[tokio::test]
async fn test_send_message_to_unknown_room_is_not_found() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");

    let result = ctx
        .chat
        .send_message(ChatRoomId::generate(), owner, "anyone there?")
        .await;

    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_send_message_rejects_empty_content() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let order = place_order(&ctx, owner).await;

    let result = ctx.chat.send_message(order.chat_room.id, owner, "  ").await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_stranger_cannot_send_message() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let stranger = ctx.regular_user("stranger@example.com");
    let order = place_order(&ctx, owner).await;

    let result = ctx
        .chat
        .send_message(order.chat_room.id, stranger, "hello")
        .await;

    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_closed_room_rejects_messages_from_everyone() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.chat
        .close_chat(order.chat_room.id, admin, "settled")
        .await
        .expect("close");

    // The closure gate is identity-independent: even the admin who closed
    // the room cannot write to it.
    for actor in [owner, admin] {
        let result = ctx
            .chat
            .send_message(order.chat_room.id, actor, "one more thing")
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }
}

#[tokio::test]
async fn test_admin_message_notifies_owner_with_preview() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.chat
        .send_message(order.chat_room.id, admin, "We can start next week.")
        .await
        .expect("send");

    let jobs = ctx.dispatcher.jobs();
    assert_eq!(
        jobs.last(),
        Some(&NotificationJob::ChatMessage {
            user_id: owner.id,
            chat_room_id: order.chat_room.id,
            preview: "We can start next week.".to_string(),
        })
    );
}

#[tokio::test]
async fn test_owner_message_does_not_notify_owner() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let order = place_order(&ctx, owner).await;
    let jobs_before = ctx.dispatcher.jobs().len();

    ctx.chat
        .send_message(order.chat_room.id, owner, "Following up on my order.")
        .await
        .expect("send");

    assert_eq!(ctx.dispatcher.jobs().len(), jobs_before);
}

// =============================================================================
// close_chat
// =============================================================================

#[tokio::test]
async fn test_regular_user_cannot_close_chat() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let order = place_order(&ctx, owner).await;

    // Ownership doesn't matter; closing is an administrative act.
    let result = ctx
        .chat
        .close_chat(order.chat_room.id, owner, "done I think")
        .await;

    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_regular_user_denied_before_room_lookup() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");

    // Even a room that doesn't exist yields Forbidden, not NotFound.
    let result = ctx
        .chat
        .close_chat(ChatRoomId::generate(), owner, "done")
        .await;

    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_close_chat_stores_summary_and_returns_history() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.chat
        .send_message(order.chat_room.id, owner, "First question")
        .await
        .expect("send");
    ctx.chat
        .send_message(order.chat_room.id, admin, "First answer")
        .await
        .expect("send");

    let closed = ctx
        .chat
        .close_chat(order.chat_room.id, admin, "Scope and price agreed")
        .await
        .expect("close");

    assert!(closed.room.is_closed);
    assert_eq!(closed.room.summary.as_deref(), Some("Scope and price agreed"));
    assert_eq!(closed.order.id, order.order.id);

    let contents: Vec<&str> = closed
        .messages
        .iter()
        .map(|m| m.message.content.as_str())
        .collect();
    assert_eq!(contents, ["First question", "First answer"]);
}

#[tokio::test]
async fn test_close_chat_twice_is_forbidden() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.chat
        .close_chat(order.chat_room.id, admin, "first close")
        .await
        .expect("close");

    let second = ctx
        .chat
        .close_chat(order.chat_room.id, admin, "second close")
        .await;
    assert!(matches!(second, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn test_close_chat_unknown_room_is_not_found_for_admin() {
    let ctx = TestContext::new();
    let admin = ctx.admin_user("reviewer@example.com");

    let result = ctx.chat.close_chat(ChatRoomId::generate(), admin, "done").await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_close_chat_retries_one_lost_race() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.gateway.inject_close_conflicts(1);
    let closed = ctx
        .chat
        .close_chat(order.chat_room.id, admin, "agreed")
        .await
        .expect("single conflict is retried");
    assert!(closed.room.is_closed);
}

#[tokio::test]
async fn test_close_chat_has_no_effect_on_order_status() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    ctx.chat
        .close_chat(order.chat_room.id, admin, "agreed")
        .await
        .expect("close");

    let fetched = ctx.orders.get(order.order.id, admin).await.expect("get");
    assert_eq!(fetched.order.status, OrderStatus::Review);
}

// =============================================================================
// get_room
// =============================================================================

#[tokio::test]
async fn test_get_room_returns_ordered_history() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    for n in 0..4 {
        let actor = if n % 2 == 0 { owner } else { admin };
        ctx.chat
            .send_message(order.chat_room.id, actor, &format!("message {n}"))
            .await
            .expect("send");
    }

    let room = ctx
        .chat
        .get_room(order.chat_room.id, owner)
        .await
        .expect("get room");

    let contents: Vec<&str> = room
        .messages
        .iter()
        .map(|m| m.message.content.as_str())
        .collect();
    assert_eq!(contents, ["message 0", "message 1", "message 2", "message 3"]);
    assert_eq!(room.messages[1].author.email, "reviewer@example.com");
}

#[tokio::test]
async fn test_get_room_authorization() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");
    let stranger = ctx.regular_user("stranger@example.com");
    let admin = ctx.admin_user("reviewer@example.com");
    let order = place_order(&ctx, owner).await;

    assert!(ctx.chat.get_room(order.chat_room.id, owner).await.is_ok());
    assert!(ctx.chat.get_room(order.chat_room.id, admin).await.is_ok());
    assert!(matches!(
        ctx.chat.get_room(order.chat_room.id, stranger).await,
        Err(ServiceError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_get_room_unknown_is_not_found() {
    let ctx = TestContext::new();
    let owner = ctx.regular_user("owner@example.com");

    let result = ctx.chat.get_room(ChatRoomId::generate(), owner).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}
