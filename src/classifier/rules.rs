// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in rule sets. Configuration appends to these, never replaces them.

/// Suffixes of static resources that are never worth rendering.
pub const DEFAULT_EXTENSIONS_TO_IGNORE: &[&str] = &[
    ".js", ".css", ".less", ".png", ".jpg", ".jpeg", ".gif", ".pdf", ".doc", ".txt", ".zip",
    ".mp3", ".rar", ".exe", ".wmv", ".avi", ".ppt", ".mpg", ".mpeg", ".tif", ".wav", ".mov",
    ".psd", ".ai", ".xls", ".mp4", ".m4a", ".swf", ".dat", ".dmg", ".iso", ".flv", ".m4v",
    ".torrent",
];

/// User-agent fragments of crawlers and link-preview bots.
///
/// Googlebot, Yahoo and Bingbot are absent: they honour `_escaped_fragment_`,
/// and serving them a snapshot unasked would look like cloaking.
pub const DEFAULT_CRAWLER_USER_AGENTS: &[&str] = &[
    "baiduspider",
    "facebookexternalhit",
    "twitterbot",
    "rogerbot",
    "linkedinbot",
    "embedly",
    "quora link preview",
    "showyoubot",
    "outbrain",
    "pinterest/0.",
    "developers.google.com/+/web/snippet",
    "slackbot",
    "vkShare",
    "W3C_Validator",
    "redditbot",
    "Applebot",
    "WhatsApp",
    "flipboard",
    "tumblr",
    "bitlybot",
    "SkypeUriPreview",
    "nuzzel",
    "Discordbot",
    "Google Page Speed",
    "x-bufferbot",
];
