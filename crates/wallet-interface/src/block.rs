use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a block header.
///
/// Backends fill `hash` and `prev_hash` in their own encoding; this layer
/// only compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub hash: String,
    pub height: u64,
    pub prev_hash: String,
    pub block_time: DateTime<Utc>,
}

impl BlockInfo {
    /// Whether `self` directly extends `parent`.
    pub fn is_child_of(&self, parent: &BlockInfo) -> bool {
        self.prev_hash == parent.hash && self.height == parent.height + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hash: &str, height: u64, prev: &str) -> BlockInfo {
        BlockInfo {
            hash: hash.into(),
            height,
            prev_hash: prev.into(),
            block_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn child_links_to_parent() {
        let parent = block("aa", 10, "99");
        let child = block("bb", 11, "aa");
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&child));
    }

    #[test]
    fn sibling_is_not_child() {
        let parent = block("aa", 10, "99");
        let sibling = block("cc", 10, "99");
        assert!(!sibling.is_child_of(&parent));
    }

    #[test]
    fn json_uses_camel_case() {
        let json = serde_json::to_value(block("bb", 11, "aa")).unwrap();
        assert_eq!(json["prevHash"], "aa");
        assert_eq!(json["height"], 11);
        assert_eq!(json["blockTime"], "2023-11-14T22:13:20Z");
    }
}
