pub mod auth;
pub mod chats;
pub mod health;
pub mod messages;
pub mod scheduler;
