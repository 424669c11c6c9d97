//! # Usage-Context Store
//!
//! Append-only registry of usage contexts.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Ids are dense and strictly increasing | `register()` appends only |
//! | An id never changes meaning | no mutation or removal API |
//! | Keyed contexts are registered once | `by_key` lookup in `register()` |
//!
//! The store is shared between the engine task and every handle, so it is
//! guarded by its own lock instead of living inside the engine's state.
//! Readers never observe a partially appended entry.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::usage_context::UsageContext;
use super::value_objects::{
    BackgroundId, ChannelId, ChatId, MessageFullId, UsageContextId, UserId,
};

#[derive(Default)]
struct StoreInner {
    contexts: Vec<UsageContext>,
    by_key: HashMap<UsageContext, UsageContextId>,
}

/// Append-only usage-context registry.
#[derive(Default)]
pub struct UsageContextStore {
    inner: RwLock<StoreInner>,
}

impl UsageContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from contexts in id order.
    ///
    /// The i-th context gets id `i + 1`, so restoring a saved snapshot yields
    /// the same ids as before. Keyed duplicates keep their own ids; lookups of
    /// the key resolve to the first of them.
    pub fn from_contexts(contexts: Vec<UsageContext>) -> Self {
        let mut inner = StoreInner::default();
        for (index, context) in contexts.iter().enumerate() {
            if context.has_natural_key() {
                let id = UsageContextId::new(index as u32 + 1);
                inner.by_key.entry(context.clone()).or_insert(id);
            }
        }
        inner.contexts = contexts;
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Register a context and return its id.
    ///
    /// Keyed contexts (everything except messages) return the id of an
    /// equal, previously registered context.
    pub fn register(&self, context: UsageContext) -> UsageContextId {
        let keyed = context.has_natural_key();
        if keyed {
            if let Some(id) = self.inner.read().by_key.get(&context) {
                return *id;
            }
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race between the two locks.
        if keyed {
            if let Some(id) = inner.by_key.get(&context) {
                return *id;
            }
        }

        let id = UsageContextId::new(inner.contexts.len() as u32 + 1);
        debug!(
            context_id = %id,
            kind = ?context.kind(),
            context = %context,
            "Registered usage context"
        );
        if keyed {
            inner.by_key.insert(context.clone(), id);
        }
        inner.contexts.push(context);
        id
    }

    /// Context registered under `id`.
    pub fn get(&self, id: UsageContextId) -> Option<UsageContext> {
        let index = id.index()?;
        self.inner.read().contexts.get(index).cloned()
    }

    /// Human-readable description of a context, for diagnostics.
    pub fn describe(&self, id: UsageContextId) -> Option<String> {
        self.get(id).map(|context| context.to_string())
    }

    /// Number of registered contexts.
    pub fn len(&self) -> usize {
        self.inner.read().contexts.len()
    }

    /// True if nothing was registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all contexts in id order.
    pub fn snapshot(&self) -> Vec<UsageContext> {
        self.inner.read().contexts.clone()
    }

    // =========================================================================
    // One entry point per context kind
    // =========================================================================

    /// File attached to a message.
    pub fn create_message_source(&self, message: MessageFullId) -> UsageContextId {
        self.register(UsageContext::Message { message })
    }

    /// One of a user's profile photos.
    pub fn create_user_photo_source(&self, user_id: UserId, photo_id: i64) -> UsageContextId {
        self.register(UsageContext::UserPhoto { user_id, photo_id })
    }

    /// Current photo of a basic group.
    pub fn create_chat_photo_source(&self, chat_id: ChatId) -> UsageContextId {
        self.register(UsageContext::ChatPhoto { chat_id })
    }

    /// Current photo of a channel.
    pub fn create_channel_photo_source(&self, channel_id: ChannelId) -> UsageContextId {
        self.register(UsageContext::ChannelPhoto { channel_id })
    }

    /// Web page preview.
    pub fn create_web_page_source(&self, url: impl Into<String>) -> UsageContextId {
        self.register(UsageContext::WebPage { url: url.into() })
    }

    /// Saved animations list.
    pub fn create_saved_animations_source(&self) -> UsageContextId {
        self.register(UsageContext::SavedAnimations)
    }

    /// Recent (or recent attached) stickers list.
    pub fn create_recent_stickers_source(&self, is_attached: bool) -> UsageContextId {
        self.register(UsageContext::RecentStickers { is_attached })
    }

    /// Favorite stickers list.
    pub fn create_favorite_stickers_source(&self) -> UsageContextId {
        self.register(UsageContext::FavoriteStickers)
    }

    /// Chat background.
    pub fn create_background_source(
        &self,
        background_id: BackgroundId,
        access_hash: i64,
    ) -> UsageContextId {
        self.register(UsageContext::Background {
            background_id,
            access_hash,
        })
    }

    /// Full info of a basic group.
    pub fn create_chat_full_source(&self, chat_id: ChatId) -> UsageContextId {
        self.register(UsageContext::ChatFull { chat_id })
    }

    /// Full info of a channel.
    pub fn create_channel_full_source(&self, channel_id: ChannelId) -> UsageContextId {
        self.register(UsageContext::ChannelFull { channel_id })
    }

    /// Application configuration.
    pub fn create_app_config_source(&self) -> UsageContextId {
        self.register(UsageContext::AppConfig)
    }

    /// Saved notification sounds.
    pub fn create_saved_ringtones_source(&self) -> UsageContextId {
        self.register(UsageContext::SavedRingtones)
    }

    /// Full info of a user.
    pub fn create_user_full_source(&self, user_id: UserId) -> UsageContextId {
        self.register(UsageContext::UserFull { user_id })
    }
}
