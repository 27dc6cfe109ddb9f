//! Database operations for live chat: conversations, messages, and agent
//! presence.
//!
//! Status transitions are guarded in SQL (`WHERE status ...`) so a stale
//! caller cannot reopen or reassign a closed conversation.

mod agents;
mod conversations;
mod messages;

pub use agents::{list_online_agents, update_agent_status, ChatAgentRow};
pub use conversations::{
    assign_conversation, close_conversation, get_conversation, get_or_create_conversation,
    list_open_conversations, list_user_conversations, ConversationRow,
};
pub use messages::{
    insert_chat_message, list_conversation_messages, mark_messages_read, ChatMessageRow,
};
