//! Endpoint lookup tables.
//!
//! Known query names map to the explicit field path where their payload
//! nests the timeline instruction list. Unknown endpoints fall back to the
//! bounded recursive search in [`crate::extract`].

/// Returns the known instruction-list path for an endpoint, if any.
pub fn instruction_path(endpoint: &str) -> Option<&'static [&'static str]> {
    const HOME: &[&str] = &["data", "home", "home_timeline_urt", "instructions"];
    const USER: &[&str] = &[
        "data",
        "user",
        "result",
        "timeline_v2",
        "timeline",
        "instructions",
    ];
    const DETAIL: &[&str] = &[
        "data",
        "threaded_conversation_with_injections_v2",
        "instructions",
    ];
    const SEARCH: &[&str] = &[
        "data",
        "search_by_raw_query",
        "search_timeline",
        "timeline",
        "instructions",
    ];
    const LIST: &[&str] = &["data", "list", "tweets_timeline", "timeline", "instructions"];
    const BOOKMARKS: &[&str] = &["data", "bookmark_timeline_v2", "timeline", "instructions"];

    match endpoint {
        "HomeTimeline" | "HomeLatestTimeline" => Some(HOME),
        "UserTweets" | "UserTweetsAndReplies" | "UserMedia" | "UserLikes" | "Likes" => Some(USER),
        "TweetDetail" => Some(DETAIL),
        "SearchTimeline" => Some(SEARCH),
        "ListLatestTweetsTimeline" => Some(LIST),
        "Bookmarks" => Some(BOOKMARKS),
        _ => None,
    }
}

/// Query names that share the intercepted API prefix but never carry posts.
///
/// Events for these endpoints are skipped before extraction.
const IGNORED_ENDPOINTS: &[&str] = &[
    "DataSaverMode",
    "getAltTextPromptPreference",
    "useDirectCallSetupQuery",
    "XChatDmSettingsQuery",
    "useTotalAdCampaignsForUserQuery",
    "useStoryTopicQuery",
    "useSubscriptionsPaymentFailureQuery",
    "PinnedTimelines",
    "ExploreSidebar",
    "SidebarUserRecommendations",
    "useFetchProductSubscriptionsQuery",
    "ExplorePage",
    "UserByScreenName",
    "ProfileSpotlightsQuery",
    "useFetchProfileSections_canViewExpandedProfileQuery",
    "UserSuperFollowTweets",
    "NotificationsTimeline",
    "AuthenticatePeriscope",
    "BookmarkFoldersSlice",
    "EditBookmarkFolder",
    "fetchPostQuery",
    "useReadableMessagesSnapshotMutation",
    "UsersByRestIds",
];

/// Returns true if the endpoint is known to never carry posts.
pub fn is_ignored_endpoint(endpoint: &str) -> bool {
    IGNORED_ENDPOINTS.contains(&endpoint)
}
