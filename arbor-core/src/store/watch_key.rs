//! Watch Key Grammar
//!
//! Members whose key follows the grammar below declare a watch:
//!
//! ```text
//! on[.flag]*:path
//!
//! flag := deep | deep=<n> | immediate | once | pre | post | sync
//! path := segment(.segment)*
//! ```
//!
//! Examples: `on:value`, `on.immediate:user.name`, `on.deep=1.sync:items`.
//!
//! Keys that don't follow the grammar (unknown flags, empty segments, a
//! missing `:`) are ordinary members, never an error. Path segments can't
//! contain a literal dot.
//!
//! When several flush flags are given, `pre` wins over `post`, which wins over
//! `sync`. When `deep` is given more than once, the first occurrence counts.

use smallvec::SmallVec;

use crate::reactive::{Deep, Flush, WatchOptions};

/// Path segments of a watch target. Most paths are short.
pub type WatchPath = SmallVec<[String; 4]>;

/// A parsed watch key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchDeclaration {
    pub path: WatchPath,
    pub options: WatchOptions,
}

/// Whether `key` declares a watch.
pub fn is_watch_key(key: &str) -> bool {
    parse_watch_key(key).is_some()
}

/// Parse a watch key, or `None` if `key` is an ordinary member.
pub fn parse_watch_key(key: &str) -> Option<WatchDeclaration> {
    let rest = key.strip_prefix("on")?;
    let (flags, target) = rest.split_once(':')?;

    let flags = if flags.is_empty() {
        None
    } else {
        Some(flags.strip_prefix('.')?)
    };

    let mut options = WatchOptions::new();
    let (mut pre, mut post, mut sync) = (false, false, false);

    for flag in flags.into_iter().flat_map(|flags| flags.split('.')) {
        match flag {
            "immediate" => options.immediate = true,
            "once" => options.once = true,
            "pre" => pre = true,
            "post" => post = true,
            "sync" => sync = true,
            "deep" => {
                if !options.deep.is_set() {
                    options.deep = Deep::Full;
                }
            }
            _ => {
                let depth = flag.strip_prefix("deep=")?;
                if depth.is_empty() || !depth.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let depth = depth.parse::<u32>().unwrap_or(u32::MAX);
                if !options.deep.is_set() {
                    options.deep = Deep::Depth(depth);
                }
            }
        }
    }

    options.flush = if pre {
        Flush::Pre
    } else if post {
        Flush::Post
    } else if sync {
        Flush::Sync
    } else {
        Flush::Default
    };

    let path: WatchPath = target.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return None;
    }

    Some(WatchDeclaration { path, options })
}
