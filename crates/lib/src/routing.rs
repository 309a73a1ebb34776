//! Route shell: paths ↔ pages, the private-route guard, and the one-shot
//! standard-query hand-off to the chat page.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    /// `/`; always redirects to the chat page.
    Index,
    /// `/chat` (fresh conversation) or `/chat/{id}`.
    Chat(Option<String>),
    StandardQueries,
    NotFound(String),
}

/// Sidebar sections, for active-state highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Chat,
    StandardQueries,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Index,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["chat"] => Route::Chat(None),
            ["chat", id] => Route::Chat(Some((*id).to_string())),
            ["standard-queries"] => Route::StandardQueries,
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Index => "/".to_string(),
            Route::Chat(None) => "/chat".to_string(),
            Route::Chat(Some(id)) => format!("/chat/{}", id),
            Route::StandardQueries => "/standard-queries".to_string(),
            Route::NotFound(p) => p.clone(),
        }
    }

    /// Everything except login and register needs a session.
    pub fn is_private(&self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Route::Chat(Some(id)) => Some(id),
            _ => None,
        }
    }

    pub fn section(&self) -> Option<Section> {
        match self {
            Route::Chat(_) => Some(Section::Chat),
            Route::StandardQueries => Some(Section::StandardQueries),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Apply the guard and redirects: private routes without a session go to login;
/// `/` and unknown paths go to a fresh chat.
pub fn resolve(route: Route, has_session: bool) -> Route {
    if route.is_private() && !has_session {
        return Route::Login;
    }
    match route {
        Route::Index | Route::NotFound(_) => Route::Chat(None),
        other => other,
    }
}

/// A query handed to the chat page as if typed. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery(pub String);

/// Current location plus any pending hand-off.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Route,
    pending: Option<PendingQuery>,
    /// Set by an explicit "new chat"; the shell must drop its conversation even
    /// when it is already on `Chat(None)`.
    fresh: bool,
}

impl Navigator {
    pub fn new(start: Route, has_session: bool) -> Self {
        Self {
            current: resolve(start, has_session),
            pending: None,
            fresh: false,
        }
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    /// Go to a path, applying the guard. Returns the route actually landed on.
    pub fn navigate(&mut self, path: &str, has_session: bool) -> &Route {
        self.go(Route::parse(path), has_session)
    }

    pub fn go(&mut self, route: Route, has_session: bool) -> &Route {
        let target = resolve(route, has_session);
        if target != self.current {
            log::debug!("navigate {} -> {}", self.current, target);
        }
        self.current = target;
        &self.current
    }

    /// Swap the location without a page change (after a new chat gets its id).
    pub fn replace(&mut self, route: Route) {
        log::debug!("replace {} -> {}", self.current, route);
        self.current = route;
    }

    /// Start a new chat, discarding whatever the chat page holds.
    pub fn new_chat(&mut self, has_session: bool) -> &Route {
        self.go(Route::Chat(None), has_session);
        self.fresh = matches!(self.current, Route::Chat(None));
        &self.current
    }

    /// Open a fresh chat and hand it `query` to send.
    pub fn navigate_with_query(&mut self, query: impl Into<String>, has_session: bool) -> &Route {
        self.new_chat(has_session);
        self.pending = self.fresh.then(|| PendingQuery(query.into()));
        &self.current
    }

    /// Take the new-chat request, if any. A second call returns false.
    pub fn take_fresh_request(&mut self) -> bool {
        std::mem::take(&mut self.fresh)
    }

    pub fn has_fresh_request(&self) -> bool {
        self.fresh
    }

    /// Take the pending query, if any. A second call returns None.
    pub fn take_pending_query(&mut self) -> Option<String> {
        self.pending.take().map(|PendingQuery(q)| q)
    }

    pub fn has_pending_query(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active_section(&self) -> Option<Section> {
        self.current.section()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_path() {
        assert_eq!(Route::parse("/"), Route::Index);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/chat"), Route::Chat(None));
        assert_eq!(Route::parse("/chat/"), Route::Chat(None));
        assert_eq!(
            Route::parse("/chat/65f0a1?x=1"),
            Route::Chat(Some("65f0a1".to_string()))
        );
        assert_eq!(Route::parse("/standard-queries"), Route::StandardQueries);
        assert_eq!(
            Route::parse("/chat/a/b"),
            Route::NotFound("/chat/a/b".to_string())
        );
        assert_eq!(Route::Chat(Some("c1".to_string())).path(), "/chat/c1");
    }

    #[test]
    fn guard_redirects_without_session() {
        assert_eq!(resolve(Route::Chat(None), false), Route::Login);
        assert_eq!(resolve(Route::StandardQueries, false), Route::Login);
        assert_eq!(resolve(Route::Register, false), Route::Register);
        assert_eq!(resolve(Route::Index, true), Route::Chat(None));
        assert_eq!(
            resolve(Route::NotFound("/nope".to_string()), true),
            Route::Chat(None)
        );
    }

    #[test]
    fn pending_query_is_consumed_once() {
        let mut nav = Navigator::new(Route::StandardQueries, true);
        assert_eq!(nav.active_section(), Some(Section::StandardQueries));
        nav.navigate_with_query("List sites", true);
        assert_eq!(nav.current(), &Route::Chat(None));
        assert_eq!(nav.active_section(), Some(Section::Chat));
        assert_eq!(nav.take_pending_query().as_deref(), Some("List sites"));
        assert_eq!(nav.take_pending_query(), None);
        assert!(nav.take_fresh_request());
    }

    #[test]
    fn new_chat_requests_reset_on_same_route() {
        let mut nav = Navigator::new(Route::Chat(None), true);
        assert!(!nav.has_fresh_request());
        assert_eq!(nav.new_chat(true), &Route::Chat(None));
        assert!(nav.has_fresh_request());
        assert!(nav.take_fresh_request());
        assert!(!nav.take_fresh_request());

        nav.go(Route::Chat(None), true);
        assert!(!nav.has_fresh_request());

        let mut signed_out = Navigator::new(Route::Login, false);
        assert_eq!(signed_out.new_chat(false), &Route::Login);
        assert!(!signed_out.has_fresh_request());
    }

    #[test]
    fn pending_query_dropped_when_signed_out() {
        let mut nav = Navigator::new(Route::Login, false);
        nav.navigate_with_query("List sites", false);
        assert_eq!(nav.current(), &Route::Login);
        assert!(!nav.has_pending_query());
        assert!(!nav.has_fresh_request());
    }

    #[test]
    fn replace_keeps_pending_state() {
        let mut nav = Navigator::new(Route::Index, true);
        assert_eq!(nav.current(), &Route::Chat(None));
        nav.replace(Route::Chat(Some("c1".to_string())));
        assert_eq!(nav.current().chat_id(), Some("c1"));
        assert_eq!(nav.navigate("/chat", true), &Route::Chat(None));
    }
}
