//! Composable listing filters.
//!
//! Each filter decides from the request parameters whether it takes part
//! (`should_apply`) and, if so, narrows the query (`apply`). The pipeline runs
//! filters in the order it was built with, feeding each output into the next.

use std::collections::HashMap;
use std::sync::Arc;

use super::query::UserQuery;

/// Flat key/value parameters taken from the request query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams(HashMap<String, String>);

impl FilterParams {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<HashMap<String, String>> for FilterParams {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

pub trait UserFilter: Send + Sync {
    fn should_apply(&self, params: &FilterParams) -> bool;

    fn apply(&self, query: UserQuery, params: &FilterParams) -> UserQuery;
}

/// `trashed=true|1` switches the listing to soft-deleted rows only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrashedFilter;

impl UserFilter for TrashedFilter {
    fn should_apply(&self, params: &FilterParams) -> bool {
        matches!(params.get("trashed"), Some("true" | "1"))
    }

    fn apply(&self, query: UserQuery, _params: &FilterParams) -> UserQuery {
        query.only_trashed()
    }
}

/// `search=<text>` keeps rows whose name or email contains the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilter;

impl UserFilter for SearchFilter {
    fn should_apply(&self, params: &FilterParams) -> bool {
        params.get("search").is_some_and(|s| !s.is_empty())
    }

    fn apply(&self, query: UserQuery, params: &FilterParams) -> UserQuery {
        match params.get("search") {
            Some(needle) => query.name_or_email_contains(needle),
            None => query,
        }
    }
}

#[derive(Clone)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn UserFilter>>,
}

impl FilterPipeline {
    pub fn new(filters: Vec<Arc<dyn UserFilter>>) -> Self {
        Self { filters }
    }

    /// The filters the user listing is served with.
    pub fn standard() -> Self {
        Self::new(vec![Arc::new(TrashedFilter), Arc::new(SearchFilter)])
    }

    pub fn apply_filters(&self, query: UserQuery, params: &FilterParams) -> UserQuery {
        self.filters.iter().fold(query, |query, filter| {
            if filter.should_apply(params) {
                filter.apply(query, params)
            } else {
                query
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::query::{Condition, TrashScope};
    use std::sync::Mutex;

    #[test]
    fn trashed_filter_accepts_true_and_one() {
        let f = TrashedFilter;
        assert!(f.should_apply(&FilterParams::new().with("trashed", "true")));
        assert!(f.should_apply(&FilterParams::new().with("trashed", "1")));
        assert!(!f.should_apply(&FilterParams::new().with("trashed", "false")));
        assert!(!f.should_apply(&FilterParams::new().with("trashed", "0")));
        assert!(!f.should_apply(&FilterParams::new()));
    }

    #[test]
    fn trashed_filter_switches_scope() {
        let q = TrashedFilter.apply(UserQuery::new(), &FilterParams::new());
        assert_eq!(q.scope(), TrashScope::OnlyTrashed);
    }

    #[test]
    fn search_filter_ignores_empty_string() {
        let f = SearchFilter;
        assert!(!f.should_apply(&FilterParams::new()));
        assert!(!f.should_apply(&FilterParams::new().with("search", "")));
        assert!(f.should_apply(&FilterParams::new().with("search", "john")));
    }

    #[test]
    fn search_filter_adds_condition() {
        let params = FilterParams::new().with("search", "John");
        let q = SearchFilter.apply(UserQuery::new(), &params);
        assert_eq!(
            q.conditions(),
            &[Condition::NameOrEmailContains("John".into())]
        );
        assert_eq!(q.scope(), TrashScope::Active);
    }

    #[test]
    fn pipeline_without_params_leaves_query_untouched() {
        let q = FilterPipeline::standard().apply_filters(UserQuery::new(), &FilterParams::new());
        assert_eq!(q, UserQuery::new());
    }

    #[test]
    fn pipeline_combines_filters() {
        let params = FilterParams::new()
            .with("trashed", "1")
            .with("search", "john");
        let q = FilterPipeline::standard().apply_filters(UserQuery::new(), &params);
        assert_eq!(q.scope(), TrashScope::OnlyTrashed);
        assert_eq!(q.conditions().len(), 1);
    }

    struct Recording {
        name: &'static str,
        applies: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl UserFilter for Recording {
        fn should_apply(&self, _params: &FilterParams) -> bool {
            self.applies
        }

        fn apply(&self, query: UserQuery, _params: &FilterParams) -> UserQuery {
            self.log.lock().unwrap().push(self.name);
            query.name_or_email_contains(self.name)
        }
    }

    #[test]
    fn pipeline_runs_matching_filters_in_configured_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = |name, applies| -> Arc<dyn UserFilter> {
            Arc::new(Recording {
                name,
                applies,
                log: log.clone(),
            })
        };
        let pipeline = FilterPipeline::new(vec![
            make("first", true),
            make("skipped", false),
            make("second", true),
        ]);

        let q = pipeline.apply_filters(UserQuery::new(), &FilterParams::new());

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(
            q.conditions(),
            &[
                Condition::NameOrEmailContains("first".into()),
                Condition::NameOrEmailContains("second".into()),
            ]
        );
    }
}
