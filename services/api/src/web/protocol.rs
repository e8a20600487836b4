//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the live chat view.

use companion_core::domain::{ChatMessage, User};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Appends a user turn to the current session. The model's reply arrives
    /// later through a `ChatHistory` push.
    SendMessage {
        content: String,
        #[serde(default)]
        agent: Option<String>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The user document changed (e.g. `status` flipped to `created`).
    User { user: User },

    /// The full message list of the session, oldest first.
    ChatHistory { messages: Vec<ChatMessage> },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send_message","content":"hi"}"#).unwrap();
        match msg {
            ClientMessage::SendMessage { content, agent } => {
                assert_eq!(content, "hi");
                assert!(agent.is_none());
            }
        }
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::ChatHistory { messages: vec![] }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "chat_history", "messages": [] }));
    }
}
