use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hint and accepted-response lists as they arrive from seeds and storage.
///
/// Older rows carry the list as a JSON-encoded string, newer ones as a native
/// array. Both are accepted here and collapsed into a plain `Vec<String>` by
/// [`PhraseList::into_vec`], so nothing past the storage layer branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhraseList {
    List(Vec<String>),
    Encoded(String),
}

impl Default for PhraseList {
    fn default() -> Self {
        PhraseList::List(Vec::new())
    }
}

impl PhraseList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PhraseList::List(list) => list,
            PhraseList::Encoded(raw) if raw.trim().is_empty() => Vec::new(),
            PhraseList::Encoded(raw) => match serde_json::from_str::<PhraseList>(&raw) {
                Ok(PhraseList::List(list)) => list,
                // doubly encoded rows
                Ok(inner @ PhraseList::Encoded(_)) => inner.into_vec(),
                Err(e) => {
                    warn!("unparseable phrase list {:?}: {}", raw, e);
                    Vec::new()
                }
            },
        }
    }

    /// JSON text for a TEXT column.
    pub fn to_column(&self) -> String {
        match self {
            PhraseList::List(list) => {
                serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
            }
            PhraseList::Encoded(_) => {
                serde_json::to_string(&self.clone().into_vec()).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }
}

impl From<Vec<String>> for PhraseList {
    fn from(list: Vec<String>) -> Self {
        PhraseList::List(list)
    }
}

impl From<&[&str]> for PhraseList {
    fn from(list: &[&str]) -> Self {
        PhraseList::List(list.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_list_matches_native_list() {
        let native = vec!["Bom dia".to_string(), "Olá".to_string()];
        let encoded = PhraseList::Encoded(serde_json::to_string(&native).unwrap());
        assert_eq!(encoded.into_vec(), native);
    }

    #[test]
    fn deserializes_both_shapes() {
        let a: PhraseList = serde_json::from_str(r#"["Sim", "Não"]"#).unwrap();
        let b: PhraseList = serde_json::from_str(r#""[\"Sim\", \"Não\"]""#).unwrap();
        assert_eq!(a.into_vec(), b.into_vec());
    }

    #[test]
    fn garbage_becomes_empty() {
        assert!(PhraseList::Encoded("not json".into()).into_vec().is_empty());
        assert!(PhraseList::Encoded(String::new()).into_vec().is_empty());
    }

    #[test]
    fn column_text_is_a_json_array() {
        let list = PhraseList::from(&["a", "b"][..]);
        assert_eq!(list.to_column(), r#"["a","b"]"#);
        let encoded = PhraseList::Encoded(r#"["x"]"#.into());
        assert_eq!(encoded.to_column(), r#"["x"]"#);
    }
}
