// src/utils/html.rs

/// Sanitizes question content before it is stored.
///
/// Whitelist based: formatting tags such as <b>, <p>, <code> survive while
/// <script>, <iframe> and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
