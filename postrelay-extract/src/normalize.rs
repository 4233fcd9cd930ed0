//! Candidate unwrapping and post normalization.

use chrono::Utc;
use postrelay_core::{Author, LinkEntity, MediaItem, MediaKind, Mention, Metrics, Post};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Item Content
// ============================================================================

/// Extracts one post from an entry's item content, if it is a post at all.
///
/// Ads, prompts, who-to-follow modules and other non-post items are
/// discarded silently.
pub(crate) fn from_item_content(item_content: Option<&Value>) -> Option<Post> {
    let item_content = item_content?;

    let item_type = item_content
        .get("itemType")
        .or_else(|| item_content.get("__typename"))
        .and_then(Value::as_str);
    if item_type != Some("TimelineTweet") {
        return None;
    }

    let result = item_content.get("tweet_results")?.get("result")?;
    let raw = unwrap_result(result)?;
    normalize(raw)
}

/// Unwraps a post result object.
///
/// A direct post passes through; a visibility wrapper unwraps one level;
/// tombstoned/unavailable posts are discarded. An unknown typename is kept
/// only when it carries both `legacy` and `core` (compatibility path for
/// schema drift).
fn unwrap_result(result: &Value) -> Option<&Value> {
    match result.get("__typename").and_then(Value::as_str) {
        Some("Tweet") => Some(result),
        Some("TweetWithVisibilityResults") => result.get("tweet"),
        Some("TweetTombstone" | "TweetUnavailable") => None,
        other => {
            if result.get("legacy").is_some() && result.get("core").is_some() {
                debug!(typename = ?other, "unknown result typename with legacy+core, using as-is");
                Some(result)
            } else {
                None
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Reduces a raw post object into the canonical record shape.
fn normalize(raw: &Value) -> Option<Post> {
    let Some(legacy) = raw.get("legacy") else {
        debug!(
            keys = %object_keys(raw),
            "post candidate has no legacy block, dropping"
        );
        return None;
    };

    let user_result = navigate(raw, &["core", "user_results", "result"]);
    // Identity lives in the user's core block, statistics in its legacy
    // block; they are not always co-located.
    let user_core = user_result.and_then(|u| u.get("core"));
    let user_legacy = user_result.and_then(|u| u.get("legacy"));

    let mut text = full_text(raw);
    let is_reshare = legacy.get("retweeted_status_result").is_some();
    let reshared = navigate(legacy, &["retweeted_status_result", "result"]).and_then(unwrap_result);
    // A reshare's own text field is a truncated stub; display the full text
    // of the reshared post instead. The reshared post is not emitted as its
    // own record.
    if let Some(reshared) = reshared {
        text = full_text(reshared);
    }

    let post = Post {
        id: str_field(legacy, "id_str").or_else(|| str_field(raw, "rest_id")),
        created_at: str_field(legacy, "created_at"),
        author: Author {
            id: user_result
                .and_then(|u| str_field(u, "rest_id"))
                .or_else(|| str_field(legacy, "user_id_str")),
            handle: user_core
                .and_then(|c| str_field(c, "screen_name"))
                .or_else(|| user_legacy.and_then(|l| str_field(l, "screen_name"))),
            display_name: user_core
                .and_then(|c| str_field(c, "name"))
                .or_else(|| user_legacy.and_then(|l| str_field(l, "name"))),
            verified: user_legacy.and_then(|l| l.get("verified")).and_then(Value::as_bool),
            is_blue_verified: user_result
                .and_then(|u| u.get("is_blue_verified"))
                .and_then(Value::as_bool),
            follower_count: user_legacy
                .and_then(|l| l.get("followers_count"))
                .and_then(Value::as_u64),
        },
        text,
        lang: str_field(legacy, "lang"),
        metrics: Metrics {
            likes: count_field(legacy, "favorite_count"),
            reshares: count_field(legacy, "retweet_count"),
            replies: count_field(legacy, "reply_count"),
            // Views come from a separate subsystem and report as a string;
            // absent or unparsable stays null, not zero.
            views: navigate(raw, &["views", "count"])
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            bookmarks: count_field(legacy, "bookmark_count"),
            quotes: count_field(legacy, "quote_count"),
        },
        media: media_items(legacy),
        urls: link_entities(legacy),
        hashtags: navigate(legacy, &["entities", "hashtags"])
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(|h| str_field(h, "text")).collect())
            .unwrap_or_default(),
        mentions: navigate(legacy, &["entities", "user_mentions"])
            .and_then(Value::as_array)
            .map(|mentions| {
                mentions
                    .iter()
                    .map(|m| Mention {
                        id: str_field(m, "id_str"),
                        handle: str_field(m, "screen_name"),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        in_reply_to: str_field(legacy, "in_reply_to_status_id_str"),
        quoted_id: str_field(legacy, "quoted_status_id_str"),
        conversation_id: str_field(legacy, "conversation_id_str"),
        is_reshare,
        reshared_id: navigate(legacy, &["retweeted_status_result", "result", "legacy"])
            .and_then(|l| str_field(l, "id_str")),
        is_article: raw.get("article").is_some(),
        source_endpoint: None,
        captured_at: Some(Utc::now()),
    };

    Some(post)
}

/// Full post text, preferring the long-form note field over the legacy
/// truncated text field.
fn full_text(raw: &Value) -> String {
    navigate(raw, &["note_tweet", "note_tweet_results", "result", "text"])
        .and_then(Value::as_str)
        .or_else(|| navigate(raw, &["legacy", "full_text"]).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Media & Entities
// ============================================================================

/// Suffix requesting the original-resolution rendition of a photo.
const PHOTO_ORIG_SUFFIX: &str = ":orig";

fn media_items(legacy: &Value) -> Vec<MediaItem> {
    let list = navigate(legacy, &["extended_entities", "media"])
        .or_else(|| navigate(legacy, &["entities", "media"]))
        .and_then(Value::as_array);

    let mut items = Vec::new();
    for m in list.into_iter().flatten() {
        let Some(kind) = m
            .get("type")
            .and_then(Value::as_str)
            .and_then(MediaKind::from_tag)
        else {
            debug!(media_type = ?m.get("type"), "unrecognized media type, dropping item");
            continue;
        };

        let mut item = MediaItem {
            kind,
            url: None,
            alt_text: str_field(m, "ext_alt_text"),
            duration_ms: None,
        };

        match kind {
            MediaKind::Photo => {
                item.url = str_field(m, "media_url_https").map(|u| u + PHOTO_ORIG_SUFFIX);
            }
            MediaKind::Video | MediaKind::AnimatedGif => {
                item.url = best_video_variant(m);
                if kind == MediaKind::Video {
                    item.duration_ms = navigate(m, &["video_info", "duration_millis"])
                        .and_then(Value::as_u64);
                }
            }
        }
        items.push(item);
    }
    items
}

/// Picks the highest-bitrate mp4 variant.
fn best_video_variant(media: &Value) -> Option<String> {
    navigate(media, &["video_info", "variants"])
        .and_then(Value::as_array)?
        .iter()
        .filter(|v| v.get("content_type").and_then(Value::as_str) == Some("video/mp4"))
        .max_by_key(|v| v.get("bitrate").and_then(Value::as_u64).unwrap_or(0))
        .and_then(|v| str_field(v, "url"))
}

fn link_entities(legacy: &Value) -> Vec<LinkEntity> {
    navigate(legacy, &["entities", "urls"])
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .map(|u| LinkEntity {
                    display: str_field(u, "display_url"),
                    expanded: str_field(u, "expanded_url"),
                    shortened: str_field(u, "url"),
                })
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Value Helpers
// ============================================================================

fn navigate<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |acc, key| acc.get(key))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn count_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn object_keys(value: &Value) -> String {
    value
        .as_object()
        .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_content(result: Value) -> Value {
        json!({
            "itemType": "TimelineTweet",
            "tweet_results": { "result": result }
        })
    }

    #[test]
    fn test_tombstone_is_discarded() {
        let content = item_content(json!({ "__typename": "TweetTombstone" }));
        assert!(from_item_content(Some(&content)).is_none());

        let content = item_content(json!({ "__typename": "TweetUnavailable" }));
        assert!(from_item_content(Some(&content)).is_none());
    }

    #[test]
    fn test_non_post_items_are_discarded() {
        let ad = json!({
            "itemType": "TimelinePromotedTweet",
            "tweet_results": { "result": { "__typename": "Tweet", "legacy": { "id_str": "1" } } }
        });
        assert!(from_item_content(Some(&ad)).is_none());
    }

    #[test]
    fn test_visibility_wrapper_unwraps_one_level() {
        let content = item_content(json!({
            "__typename": "TweetWithVisibilityResults",
            "tweet": {
                "__typename": "Tweet",
                "legacy": { "id_str": "55", "full_text": "limited" }
            }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.id.as_deref(), Some("55"));
        assert_eq!(post.text, "limited");
    }

    #[test]
    fn test_unknown_typename_with_legacy_and_core_is_kept() {
        let content = item_content(json!({
            "__typename": "TweetV9Experimental",
            "core": {},
            "legacy": { "id_str": "77", "full_text": "drifted schema" }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.id.as_deref(), Some("77"));
    }

    #[test]
    fn test_unknown_typename_without_core_is_dropped() {
        let content = item_content(json!({
            "__typename": "TweetV9Experimental",
            "legacy": { "id_str": "77" }
        }));
        assert!(from_item_content(Some(&content)).is_none());
    }

    #[test]
    fn test_author_identity_and_stats_from_split_blocks() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "8", "full_text": "hi" },
            "core": { "user_results": { "result": {
                "rest_id": "u1",
                "is_blue_verified": true,
                "core": { "screen_name": "alice", "name": "Alice" },
                "legacy": { "followers_count": 320, "verified": false }
            } } }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.author.id.as_deref(), Some("u1"));
        assert_eq!(post.author.handle.as_deref(), Some("alice"));
        assert_eq!(post.author.display_name.as_deref(), Some("Alice"));
        assert_eq!(post.author.follower_count, Some(320));
        assert_eq!(post.author.verified, Some(false));
        assert_eq!(post.author.is_blue_verified, Some(true));
    }

    #[test]
    fn test_missing_author_stats_stay_null() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "8", "full_text": "hi", "user_id_str": "u9" }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.author.id.as_deref(), Some("u9"));
        assert!(post.author.handle.is_none());
        assert!(post.author.verified.is_none());
        assert!(post.author.follower_count.is_none());
    }

    #[test]
    fn test_note_text_preferred_over_legacy() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "2", "full_text": "short stub…" },
            "note_tweet": { "note_tweet_results": { "result": {
                "text": "the full long-form text"
            } } }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.text, "the full long-form text");
    }

    #[test]
    fn test_reshare_uses_full_text_of_reshared_post() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": {
                "id_str": "90",
                "full_text": "RT @bob: truncated stu…",
                "retweeted_status_result": { "result": {
                    "__typename": "Tweet",
                    "legacy": { "id_str": "89", "full_text": "the whole original text" }
                } }
            }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert!(post.is_reshare);
        assert_eq!(post.reshared_id.as_deref(), Some("89"));
        assert_eq!(post.text, "the whole original text");
        // The reshared post itself is not emitted separately.
        assert_eq!(post.id.as_deref(), Some("90"));
    }

    #[test]
    fn test_views_parse_from_string_or_stay_null() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "3", "full_text": "x", "favorite_count": 4 },
            "views": { "count": "12345" }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.metrics.views, Some(12_345));
        assert_eq!(post.metrics.likes, 4);

        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "3", "full_text": "x" }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert!(post.metrics.views.is_none());
        assert_eq!(post.metrics.likes, 0);
    }

    #[test]
    fn test_photo_url_gets_orig_suffix() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": {
                "id_str": "4",
                "full_text": "pic",
                "extended_entities": { "media": [
                    { "type": "photo", "media_url_https": "https://img.example/p.jpg",
                      "ext_alt_text": "a cat" }
                ] }
            }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.media.len(), 1);
        assert_eq!(
            post.media[0].url.as_deref(),
            Some("https://img.example/p.jpg:orig")
        );
        assert_eq!(post.media[0].alt_text.as_deref(), Some("a cat"));
    }

    #[test]
    fn test_video_picks_highest_bitrate_mp4() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": {
                "id_str": "5",
                "full_text": "vid",
                "extended_entities": { "media": [ {
                    "type": "video",
                    "video_info": {
                        "duration_millis": 21_000,
                        "variants": [
                            { "content_type": "application/x-mpegURL",
                              "url": "https://v.example/pl.m3u8" },
                            { "content_type": "video/mp4", "bitrate": 832_000,
                              "url": "https://v.example/low.mp4" },
                            { "content_type": "video/mp4", "bitrate": 2_176_000,
                              "url": "https://v.example/high.mp4" }
                        ]
                    }
                } ] }
            }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.media[0].url.as_deref(), Some("https://v.example/high.mp4"));
        assert_eq!(post.media[0].duration_ms, Some(21_000));
    }

    #[test]
    fn test_article_flag() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": { "id_str": "6", "full_text": "article stub" },
            "article": { "article_results": {} }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert!(post.is_article);
    }

    #[test]
    fn test_entities_and_threading() {
        let content = item_content(json!({
            "__typename": "Tweet",
            "legacy": {
                "id_str": "13",
                "full_text": "link #tag @friend",
                "in_reply_to_status_id_str": "12",
                "conversation_id_str": "11",
                "quoted_status_id_str": "10",
                "entities": {
                    "urls": [ { "display_url": "ex.co", "expanded_url": "https://ex.co/x",
                                "url": "https://t.ex/s" } ],
                    "hashtags": [ { "text": "tag" } ],
                    "user_mentions": [ { "id_str": "u3", "screen_name": "friend" } ]
                }
            }
        }));
        let post = from_item_content(Some(&content)).unwrap();
        assert_eq!(post.in_reply_to.as_deref(), Some("12"));
        assert_eq!(post.conversation_id.as_deref(), Some("11"));
        assert_eq!(post.quoted_id.as_deref(), Some("10"));
        assert_eq!(post.hashtags, vec!["tag"]);
        assert_eq!(post.mentions[0].handle.as_deref(), Some("friend"));
        assert_eq!(post.urls[0].expanded.as_deref(), Some("https://ex.co/x"));
    }
}
