//! `agentwire chat`: send one turn to a running gateway.

use agentwire_client::{ChatClient, ChatRequest};

pub async fn run(
    url: &str,
    message: String,
    chat_id: Option<String>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ChatClient::new(url)?;
    if let Some(user) = user {
        client = client.with_user(user);
    }

    let mut request = ChatRequest::new(message);
    if let Some(chat_id) = chat_id {
        request = request.with_chat(chat_id);
    }

    let events = client.stream(&request).await?;
    super::print_stream(events).await
}
