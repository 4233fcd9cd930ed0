//! The normalized post record.
//!
//! A [`Post`] is the canonical unit produced by the extractor from a raw
//! intercepted payload. Fields that the source payload did not carry are
//! `None`, never zero or empty-string defaults: "unknown" and "zero" are
//! different answers and downstream consumers rely on the distinction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Post
// ============================================================================

/// One normalized captured post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    /// Stable external identifier. Deduplication only applies when present.
    pub id: Option<String>,

    /// Creation timestamp as carried by the source payload, verbatim.
    pub created_at: Option<String>,

    /// Author identity and statistics.
    pub author: Author,

    /// Post text. Empty when the source carried none.
    pub text: String,

    /// Language tag from the source payload.
    pub lang: Option<String>,

    /// Engagement counts.
    pub metrics: Metrics,

    /// Attached media, in source order.
    pub media: Vec<MediaItem>,

    /// External links, in source order.
    pub urls: Vec<LinkEntity>,

    /// Hashtag texts (without the `#`).
    pub hashtags: Vec<String>,

    /// Mentioned accounts.
    pub mentions: Vec<Mention>,

    /// Id of the post this one replies to.
    pub in_reply_to: Option<String>,

    /// Id of the quoted post, if any.
    pub quoted_id: Option<String>,

    /// Conversation/thread id.
    pub conversation_id: Option<String>,

    /// True when this post is a reshare of another post.
    pub is_reshare: bool,

    /// Id of the reshared post when `is_reshare` is set.
    pub reshared_id: Option<String>,

    /// True for long-form article posts. Article captures enrich a
    /// previously captured stub and therefore bypass dedup filtering.
    pub is_article: bool,

    /// Logical endpoint the payload was captured under. Stamped by the
    /// caller after extraction; the extractor always leaves this `None`.
    pub source_endpoint: Option<String>,

    /// Wall-clock time of normalization.
    pub captured_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Returns true if any attached media is a video or animated gif.
    pub fn has_video(&self) -> bool {
        self.media
            .iter()
            .any(|m| matches!(m.kind, MediaKind::Video | MediaKind::AnimatedGif))
    }

    /// Returns the first video or animated-gif media item, if any.
    pub fn video_media(&self) -> Option<&MediaItem> {
        self.media
            .iter()
            .find(|m| matches!(m.kind, MediaKind::Video | MediaKind::AnimatedGif))
    }
}

// ============================================================================
// Author
// ============================================================================

/// Author identity and statistics.
///
/// Identity (handle, display name) and statistics (followers, verification)
/// are not co-located in the source payloads, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    /// Stable author id.
    pub id: Option<String>,

    /// Account handle (without the `@`).
    pub handle: Option<String>,

    /// Display name.
    pub display_name: Option<String>,

    /// Legacy verification flag.
    pub verified: Option<bool>,

    /// Paid verification flag.
    pub is_blue_verified: Option<bool>,

    /// Follower count.
    pub follower_count: Option<u64>,
}

// ============================================================================
// Metrics
// ============================================================================

/// Engagement counts for a post.
///
/// Counts default to zero when absent, except `views`, which the source
/// reports through a separate subsystem and which stays `None` when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// Like count.
    pub likes: u64,
    /// Reshare count.
    pub reshares: u64,
    /// Reply count.
    pub replies: u64,
    /// View count, when reported.
    pub views: Option<u64>,
    /// Bookmark count.
    pub bookmarks: u64,
    /// Quote count.
    pub quotes: u64,
}

// ============================================================================
// Media
// ============================================================================

/// The kind of an attached media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image.
    Photo,
    /// Video.
    Video,
    /// Animated gif (delivered as a looping video).
    AnimatedGif,
}

impl MediaKind {
    /// Parses the source payload's media type tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "animated_gif" => Some(Self::AnimatedGif),
            _ => None,
        }
    }
}

/// One attached media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Media kind.
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Best available direct URL. `None` when the source offered no usable
    /// variant.
    pub url: Option<String>,

    /// Accessibility alt text.
    pub alt_text: Option<String>,

    /// Duration in milliseconds, for videos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

// ============================================================================
// Entities
// ============================================================================

/// An external link carried by a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkEntity {
    /// Display form shown in the post text.
    pub display: Option<String>,
    /// Fully expanded URL.
    pub expanded: Option<String>,
    /// Shortened wrapper URL.
    pub shortened: Option<String>,
}

/// A mentioned account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mention {
    /// Mentioned account id.
    pub id: Option<String>,
    /// Mentioned account handle.
    pub handle: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
