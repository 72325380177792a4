//! User-facing notifications.
//!
//! Display is someone else's job: the agent hands a [`Notification`] to a
//! [`NotificationSink`] and forgets about it.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::article::wiki_url;

/// A notification as handed to the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub icon: String,
    pub body: String,
    /// Opaque payload returned on click; for articles, the article's url id.
    pub data: String,
}

/// Fire-and-forget notification display.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Resolve a clicked notification's data to the page it should open.
pub fn deep_link(origin: &Url, data: &str) -> Result<Url, Error> {
    if data.is_empty() {
        return Err(Error::InvalidInput("notification data is empty".into()));
    }
    wiki_url(origin, data)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_link() {
        let origin = Url::parse("http://localhost:8000").unwrap();
        let link = deep_link(&origin, "Cat").unwrap();
        assert_eq!(link.as_str(), "http://localhost:8000/wiki/Cat");
    }

    #[test]
    fn test_deep_link_keeps_title_in_path() {
        let origin = Url::parse("http://localhost:8000").unwrap();
        let link = deep_link(&origin, "Who_Framed_Roger_Rabbit?").unwrap();
        assert_eq!(link.as_str(), "http://localhost:8000/wiki/Who_Framed_Roger_Rabbit%3F");
        assert_eq!(link.query(), None);
    }

    #[test]
    fn test_deep_link_empty() {
        let origin = Url::parse("http://localhost:8000").unwrap();
        assert!(matches!(deep_link(&origin, ""), Err(Error::InvalidInput(_))));
    }
}
