//! # Usage Contexts
//!
//! A usage context records *where* a file was seen, which is exactly the
//! information needed to fetch that place again and pull a fresh file
//! reference out of the response.
//!
//! The set of kinds is closed. Adding a kind means adding a variant here and
//! teaching the [`SourceResolver`](crate::ports::SourceResolver) about it.
//!
//! Variant order is part of the persisted format (see
//! [`adapters::persistence`](crate::adapters::persistence)); new kinds are
//! appended at the end.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value_objects::{BackgroundId, ChannelId, ChatId, MessageFullId, UserId};

/// Provenance of a file reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageContext {
    /// The file is attached to a message.
    Message {
        /// Message address.
        message: MessageFullId,
    },
    /// The file is one of a user's profile photos.
    UserPhoto {
        /// Photo owner.
        user_id: UserId,
        /// Photo identifier.
        photo_id: i64,
    },
    /// Current photo of a basic group.
    ChatPhoto {
        /// Group.
        chat_id: ChatId,
    },
    /// Current photo of a channel.
    ChannelPhoto {
        /// Channel.
        channel_id: ChannelId,
    },
    /// Part of a web page preview.
    WebPage {
        /// Page URL.
        url: String,
    },
    /// Saved animations list.
    SavedAnimations,
    /// Recent stickers list.
    RecentStickers {
        /// Attached-stickers list instead of sent-stickers list.
        is_attached: bool,
    },
    /// Favorite stickers list.
    FavoriteStickers,
    /// Chat background.
    Background {
        /// Background.
        background_id: BackgroundId,
        /// Access hash needed to re-fetch the background.
        access_hash: i64,
    },
    /// Full info of a basic group.
    ChatFull {
        /// Group.
        chat_id: ChatId,
    },
    /// Full info of a channel.
    ChannelFull {
        /// Channel.
        channel_id: ChannelId,
    },
    /// Application configuration.
    AppConfig,
    /// Saved notification sounds.
    SavedRingtones,
    /// Full info of a user.
    UserFull {
        /// User.
        user_id: UserId,
    },
}

/// Discriminant of [`UsageContext`], logged as the `kind` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UsageContextKind {
    /// [`UsageContext::Message`]
    Message,
    /// [`UsageContext::UserPhoto`]
    UserPhoto,
    /// [`UsageContext::ChatPhoto`]
    ChatPhoto,
    /// [`UsageContext::ChannelPhoto`]
    ChannelPhoto,
    /// [`UsageContext::WebPage`]
    WebPage,
    /// [`UsageContext::SavedAnimations`]
    SavedAnimations,
    /// [`UsageContext::RecentStickers`]
    RecentStickers,
    /// [`UsageContext::FavoriteStickers`]
    FavoriteStickers,
    /// [`UsageContext::Background`]
    Background,
    /// [`UsageContext::ChatFull`]
    ChatFull,
    /// [`UsageContext::ChannelFull`]
    ChannelFull,
    /// [`UsageContext::AppConfig`]
    AppConfig,
    /// [`UsageContext::SavedRingtones`]
    SavedRingtones,
    /// [`UsageContext::UserFull`]
    UserFull,
}

impl UsageContext {
    /// Kind of this context.
    pub fn kind(&self) -> UsageContextKind {
        match self {
            Self::Message { .. } => UsageContextKind::Message,
            Self::UserPhoto { .. } => UsageContextKind::UserPhoto,
            Self::ChatPhoto { .. } => UsageContextKind::ChatPhoto,
            Self::ChannelPhoto { .. } => UsageContextKind::ChannelPhoto,
            Self::WebPage { .. } => UsageContextKind::WebPage,
            Self::SavedAnimations => UsageContextKind::SavedAnimations,
            Self::RecentStickers { .. } => UsageContextKind::RecentStickers,
            Self::FavoriteStickers => UsageContextKind::FavoriteStickers,
            Self::Background { .. } => UsageContextKind::Background,
            Self::ChatFull { .. } => UsageContextKind::ChatFull,
            Self::ChannelFull { .. } => UsageContextKind::ChannelFull,
            Self::AppConfig => UsageContextKind::AppConfig,
            Self::SavedRingtones => UsageContextKind::SavedRingtones,
            Self::UserFull { .. } => UsageContextKind::UserFull,
        }
    }

    /// Whether two registrations of this same value denote the same context.
    ///
    /// Message contexts are registered once per sighting by their owners, so
    /// every registration gets its own id.
    pub fn has_natural_key(&self) -> bool {
        !matches!(self, Self::Message { .. })
    }

    /// Message address, for message contexts.
    pub fn message(&self) -> Option<MessageFullId> {
        match self {
            Self::Message { message } => Some(*message),
            _ => None,
        }
    }
}

impl fmt::Display for UsageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message { message } => write!(f, "message {message}"),
            Self::UserPhoto { user_id, photo_id } => {
                write!(f, "photo {photo_id} of user {}", user_id.0)
            }
            Self::ChatPhoto { chat_id } => write!(f, "photo of chat {}", chat_id.0),
            Self::ChannelPhoto { channel_id } => write!(f, "photo of channel {}", channel_id.0),
            Self::WebPage { url } => write!(f, "web page {url}"),
            Self::SavedAnimations => f.write_str("saved animations"),
            Self::RecentStickers { is_attached: true } => f.write_str("recent attached stickers"),
            Self::RecentStickers { is_attached: false } => f.write_str("recent stickers"),
            Self::FavoriteStickers => f.write_str("favorite stickers"),
            Self::Background { background_id, .. } => {
                write!(f, "background {}", background_id.0)
            }
            Self::ChatFull { chat_id } => write!(f, "full info of chat {}", chat_id.0),
            Self::ChannelFull { channel_id } => {
                write!(f, "full info of channel {}", channel_id.0)
            }
            Self::AppConfig => f.write_str("app config"),
            Self::SavedRingtones => f.write_str("saved ringtones"),
            Self::UserFull { user_id } => write!(f, "full info of user {}", user_id.0),
        }
    }
}
