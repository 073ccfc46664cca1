//! Session identity in the page location.
//!
//! The active session id is mirrored into a query parameter of the page URL
//! so that a reload resumes the same session. Clearing it drops the whole
//! query string, leaving only the path.

use url::Url;

use crate::protocol::SessionId;

/// Default name of the query parameter carrying the session id.
pub const DEFAULT_SESSION_QUERY_PARAM: &str = "game_id";

/// Read the session id from `location`, if a usable one is present.
pub fn session_id_from_url(location: &Url, param: &str) -> Option<SessionId> {
    location
        .query_pairs()
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| value.parse().ok())
}

/// `location` with `param` set to `session_id`. Other query parameters are
/// preserved.
pub fn with_session_id(location: &Url, param: &str, session_id: &SessionId) -> Url {
    let mut url = location.clone();
    let others: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(others);
        pairs.append_pair(param, session_id.as_str());
    }
    url
}

/// `location` without any query string.
pub fn without_session(location: &Url) -> Url {
    let mut url = location.clone();
    url.set_query(None);
    url
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn reads_the_session_parameter() {
        let id = session_id_from_url(&url("http://localhost:8080/?game_id=xyz"), "game_id");
        assert_eq!(id, Some(SessionId::new("xyz")));
    }

    #[test]
    fn missing_or_blank_parameter_is_none() {
        assert!(session_id_from_url(&url("http://localhost/"), "game_id").is_none());
        assert!(session_id_from_url(&url("http://localhost/?game_id="), "game_id").is_none());
        assert!(session_id_from_url(&url("http://localhost/?other=1"), "game_id").is_none());
    }

    #[test]
    fn setting_replaces_previous_value_and_keeps_others() {
        let set = with_session_id(
            &url("http://localhost/lobby?theme=dark&game_id=old"),
            "game_id",
            &SessionId::new("abc123"),
        );
        assert_eq!(set.as_str(), "http://localhost/lobby?theme=dark&game_id=abc123");
        assert_eq!(
            session_id_from_url(&set, "game_id"),
            Some(SessionId::new("abc123"))
        );
    }

    #[test]
    fn clearing_reverts_to_the_path() {
        let cleared = without_session(&url("http://localhost/lobby?game_id=abc&theme=dark"));
        assert_eq!(cleared.as_str(), "http://localhost/lobby");
        assert!(cleared.query().is_none());
    }
}
