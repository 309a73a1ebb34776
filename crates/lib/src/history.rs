//! Recent-chats list for the signed-in user (the sidebar).

use crate::api::ChatClient;
use crate::models::ChatHistory;
use crate::routing::{Navigator, Route};

#[derive(Debug, Clone, Default)]
pub struct HistorySidebar {
    items: Vec<ChatHistory>,
}

impl HistorySidebar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ChatHistory] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_items(&mut self, items: Vec<ChatHistory>) {
        self.items = items;
    }

    /// Reload from the server. On failure the previous list stays and false is returned.
    pub async fn refresh(&mut self, client: &ChatClient, user_id: &str) -> bool {
        match client.list_chat_histories(user_id).await {
            Ok(items) => {
                log::debug!("loaded {} chat histories", items.len());
                self.items = items;
                true
            }
            Err(e) => {
                log::warn!("listing chat histories failed: {}", e);
                false
            }
        }
    }

    /// Delete on the server, then locally. Failures are logged and leave everything as is.
    pub async fn delete(&mut self, client: &ChatClient, chat_id: &str, nav: &mut Navigator) -> bool {
        match client.delete_chat_history(chat_id).await {
            Ok(()) => {
                self.remove_deleted(chat_id, nav);
                true
            }
            Err(e) => {
                log::warn!("deleting chat {} failed: {}", chat_id, e);
                false
            }
        }
    }

    /// Drop a chat the server has deleted. If it is the one on screen, fall back to a
    /// fresh chat; any other location is left alone.
    pub fn remove_deleted(&mut self, chat_id: &str, nav: &mut Navigator) {
        self.items.retain(|h| h.id != chat_id);
        if nav.current().chat_id() == Some(chat_id) {
            nav.replace(Route::Chat(None));
        }
        log::info!("deleted chat {}", chat_id);
    }

    /// Called when a conversation is first saved, so it shows up without a refresh.
    pub fn upsert(&mut self, history: ChatHistory) {
        match self.items.iter_mut().find(|h| h.id == history.id) {
            Some(existing) => *existing = history,
            None => self.items.insert(0, history),
        }
    }
}

/// True when `item` is the chat shown at `route`.
pub fn is_active(item: &ChatHistory, route: &Route) -> bool {
    route.chat_id() == Some(item.id.as_str())
}
