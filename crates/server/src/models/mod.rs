//! Domain models shared by the repositories, engines, and routes.

pub mod chat;
pub mod order;
pub mod user;

pub use chat::{ChatRoom, ChatRoomWithOrder, Message, MessageWithAuthor, RoomWithMessages};
pub use order::{NewOrder, Order, OrderWithRoom};
pub use user::UserSummary;
