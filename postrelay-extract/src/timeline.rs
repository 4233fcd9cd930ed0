//! Timeline traversal: instruction discovery and entry dispatch.

use postrelay_core::Post;
use serde_json::Value;
use tracing::debug;

use crate::endpoints::instruction_path;
use crate::normalize::from_item_content;

/// Maximum recursion depth for the fallback instruction search.
const FALLBACK_SEARCH_DEPTH: usize = 3;

// ============================================================================
// Entry Point
// ============================================================================

/// Extracts normalized posts from a raw intercepted payload.
///
/// Returns an empty vector for anything unrecognized; never errors. The
/// returned posts carry `source_endpoint = None` — the caller stamps it,
/// since the extractor does not know the endpoint's logical purpose.
pub fn extract(endpoint: &str, payload: &Value) -> Vec<Post> {
    let Some(instructions) = find_instructions(endpoint, payload) else {
        return Vec::new();
    };

    let mut posts = Vec::new();
    for instruction in instructions {
        // TimelineAddEntries / TimelineAddToModule
        let entries = instruction
            .get("entries")
            .or_else(|| instruction.get("moduleItems"))
            .and_then(Value::as_array);
        if let Some(entries) = entries {
            for entry in entries {
                collect_from_entry(entry, &mut posts);
            }
        }

        // Some instructions carry a singular entry (TimelineReplaceEntry).
        if let Some(entry) = instruction.get("entry") {
            collect_from_entry(entry, &mut posts);
        }
    }
    posts
}

// ============================================================================
// Instruction Discovery
// ============================================================================

/// Navigates to the instruction list. Different endpoints nest it at
/// different paths; unknown endpoints get a bounded recursive search.
fn find_instructions<'a>(endpoint: &str, payload: &'a Value) -> Option<&'a [Value]> {
    if let Some(path) = instruction_path(endpoint) {
        if let Some(found) = navigate_path(payload, path).and_then(Value::as_array) {
            return Some(found);
        }
        debug!(endpoint, "known instruction path yielded nothing");
    }

    find_instructions_recursive(payload, FALLBACK_SEARCH_DEPTH)
}

fn navigate_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |acc, key| acc.get(key))
}

/// Searches for a field literally named `instructions` whose value looks
/// like a timeline instruction list. The heuristic guards against unrelated
/// arrays that happen to share the name; exceeding the depth cap is "not
/// found", never an error.
fn find_instructions_recursive(value: &Value, depth: usize) -> Option<&[Value]> {
    if depth == 0 {
        return None;
    }
    let obj = value.as_object()?;

    if let Some(instructions) = obj.get("instructions").and_then(Value::as_array) {
        let plausible = instructions.iter().any(|i| {
            matches!(
                i.get("type").and_then(Value::as_str),
                Some("TimelineAddEntries" | "TimelineAddToModule")
            ) || i.get("entries").is_some()
        });
        if plausible {
            return Some(instructions);
        }
    }

    for (key, child) in obj {
        if key == "instructions" {
            continue;
        }
        if let Some(found) = find_instructions_recursive(child, depth - 1) {
            return Some(found);
        }
    }
    None
}

// ============================================================================
// Entry Dispatch
// ============================================================================

/// Timeline entry discriminants.
enum EntryKind {
    /// Pagination marker; carries no post.
    Cursor,
    /// One post behind `itemContent`.
    Item,
    /// Thread/conversation module with nested `items`.
    Module,
    /// Unrecognized, but may still expose `itemContent` directly.
    Other,
}

fn classify(content: &Value) -> EntryKind {
    let tag = content
        .get("entryType")
        .or_else(|| content.get("__typename"))
        .and_then(Value::as_str);

    if tag == Some("TimelineTimelineCursor") || content.get("cursorType").is_some() {
        return EntryKind::Cursor;
    }
    match tag {
        Some("TimelineTimelineItem") => EntryKind::Item,
        Some("TimelineTimelineModule") => EntryKind::Module,
        _ => EntryKind::Other,
    }
}

fn collect_from_entry(entry: &Value, posts: &mut Vec<Post>) {
    let content = entry.get("content").unwrap_or(entry);

    match classify(content) {
        EntryKind::Cursor => {}
        EntryKind::Item => {
            if let Some(post) = from_item_content(content.get("itemContent")) {
                posts.push(post);
            }
        }
        EntryKind::Module => {
            let items = content.get("items").and_then(Value::as_array);
            for item in items.into_iter().flatten() {
                let item_content = navigate_path(item, &["item", "itemContent"])
                    .or_else(|| item.get("itemContent"));
                if let Some(post) = from_item_content(item_content) {
                    posts.push(post);
                }
            }
        }
        EntryKind::Other => {
            if let Some(item_content) = content.get("itemContent") {
                if let Some(post) = from_item_content(Some(item_content)) {
                    posts.push(post);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tweet_entry(id: &str, text: &str) -> Value {
        json!({
            "content": {
                "entryType": "TimelineTimelineItem",
                "itemContent": {
                    "itemType": "TimelineTweet",
                    "tweet_results": {
                        "result": {
                            "__typename": "Tweet",
                            "legacy": { "id_str": id, "full_text": text }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_minimal_add_entries_payload() {
        let payload = json!({
            "data": { "home": { "home_timeline_urt": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [tweet_entry("1", "hello")] }
            ] } } }
        });

        let posts = extract("HomeTimeline", &payload);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id.as_deref(), Some("1"));
        assert_eq!(posts[0].text, "hello");
        assert!(posts[0].source_endpoint.is_none());
    }

    #[test]
    fn test_cursor_entries_yield_nothing() {
        let payload = json!({
            "data": { "home": { "home_timeline_urt": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [
                    { "content": { "entryType": "TimelineTimelineCursor", "value": "cursor-abc" } },
                    { "content": { "cursorType": "Bottom", "value": "cursor-def" } }
                ] }
            ] } } }
        });

        assert!(extract("HomeTimeline", &payload).is_empty());
    }

    #[test]
    fn test_module_entries_iterate_items() {
        let payload = json!({
            "data": { "threaded_conversation_with_injections_v2": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [ { "content": {
                    "entryType": "TimelineTimelineModule",
                    "items": [
                        { "item": { "itemContent": {
                            "itemType": "TimelineTweet",
                            "tweet_results": { "result": {
                                "__typename": "Tweet",
                                "legacy": { "id_str": "10", "full_text": "first" }
                            } }
                        } } },
                        { "itemContent": {
                            "itemType": "TimelineTweet",
                            "tweet_results": { "result": {
                                "__typename": "Tweet",
                                "legacy": { "id_str": "11", "full_text": "second" }
                            } }
                        } }
                    ]
                } } ] }
            ] } }
        });

        let posts = extract("TweetDetail", &payload);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id.as_deref(), Some("10"));
        assert_eq!(posts[1].id.as_deref(), Some("11"));
    }

    #[test]
    fn test_singular_entry_instruction() {
        let payload = json!({
            "data": { "home": { "home_timeline_urt": { "instructions": [
                { "type": "TimelineReplaceEntry", "entry": tweet_entry("7", "replaced") }
            ] } } }
        });

        let posts = extract("HomeTimeline", &payload);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_unknown_endpoint_uses_fallback_search() {
        let payload = json!({
            "data": { "somewhere": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [tweet_entry("42", "buried")] }
            ] } }
        });

        let posts = extract("BrandNewQuery", &payload);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id.as_deref(), Some("42"));
    }

    #[test]
    fn test_fallback_rejects_unrelated_instructions_array() {
        // An array named "instructions" that does not look like timeline
        // instructions must not be picked up.
        let payload = json!({
            "data": { "recipe": { "instructions": ["preheat oven", "mix", "bake"] } }
        });

        assert!(extract("BrandNewQuery", &payload).is_empty());
    }

    #[test]
    fn test_fallback_depth_is_bounded() {
        let payload = json!({
            "a": { "b": { "c": { "d": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [tweet_entry("9", "too deep")] }
            ] } } } }
        });

        assert!(extract("BrandNewQuery", &payload).is_empty());
    }

    #[test]
    fn test_known_path_empty_falls_back() {
        // Endpoint is known but the payload nests instructions elsewhere.
        let payload = json!({
            "data": { "timeline": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [tweet_entry("3", "moved")] }
            ] } }
        });

        let posts = extract("UserTweets", &payload);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id.as_deref(), Some("3"));
    }

    #[test]
    fn test_malformed_payload_yields_nothing() {
        assert!(extract("HomeTimeline", &json!(null)).is_empty());
        assert!(extract("HomeTimeline", &json!("string")).is_empty());
        assert!(extract("HomeTimeline", &json!({ "data": 17 })).is_empty());
    }
}
