//! Canonical cache identity for a listing query.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{EntityTag, SortField, SortOrder};
use crate::query::state::ViewState;

/// Identity of one parameter combination.
///
/// Filters are stored sorted by field name, so two view states that differ only
/// in the order their filters were inserted produce equal keys. Strings are
/// compared exactly: no trimming or case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    entity: EntityTag,
    page: u32,
    page_size: u32,
    search_text: String,
    filters: Vec<(String, String)>,
    sort_field: SortField,
    sort_order: SortOrder,
}

/// Derives the key for `state` under `entity`. Pure.
#[must_use]
pub fn build_key(entity: &EntityTag, state: &ViewState) -> QueryKey {
    QueryKey {
        entity: entity.clone(),
        page: state.page(),
        page_size: state.page_size(),
        search_text: state.search_text().to_string(),
        filters: canonical_filters(state.filters()),
        sort_field: state.sort_field(),
        sort_order: state.sort_order(),
    }
}

fn canonical_filters(filters: &BTreeMap<String, String>) -> Vec<(String, String)> {
    // BTreeMap iteration is already ordered by key
    filters
        .iter()
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

impl QueryKey {
    #[must_use]
    pub const fn entity(&self) -> &EntityTag {
        &self.entity
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    #[must_use]
    pub const fn sort_field(&self) -> SortField {
        self.sort_field
    }

    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Query string parameters for the search endpoint.
    ///
    /// An empty keyword is omitted; filters are sent under their own field name.
    #[must_use]
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("PageNumber".to_string(), self.page.to_string()),
            ("PageSize".to_string(), self.page_size.to_string()),
        ];

        if !self.search_text.is_empty() {
            params.push(("Keyword".to_string(), self.search_text.clone()));
        }

        params.push(("SortBy".to_string(), self.sort_field.as_str().to_string()));
        params.push((
            "SortOrder".to_string(),
            self.sort_order.as_token().to_string(),
        ));

        params.extend(self.filters.iter().cloned());
        params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[page={} size={} q={:?} sort={}:{}",
            self.entity, self.page, self.page_size, self.search_text, self.sort_field, self.sort_order
        )?;
        for (field, value) in &self.filters {
            write!(f, " {field}={value:?}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn state() -> ViewState {
        ViewState::new(3)
    }

    #[test]
    fn equal_states_give_equal_keys() {
        let a = build_key(&EntityTag::books(), &state());
        let b = build_key(&EntityTag::books(), &state());
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn filter_insertion_order_is_irrelevant() {
        let mut first = state();
        first.insert_filter("language", "English");
        first.insert_filter("category", "Fiction");

        let mut second = state();
        second.insert_filter("category", "Fiction");
        second.insert_filter("language", "English");

        assert_eq!(
            build_key(&EntityTag::books(), &first),
            build_key(&EntityTag::books(), &second)
        );
    }

    #[test]
    fn search_text_is_compared_exactly() {
        let upper = state().with_search("Dune");
        let lower = state().with_search("dune");
        let padded = state().with_search("Dune ");

        let books = EntityTag::books();
        assert_ne!(build_key(&books, &upper), build_key(&books, &lower));
        assert_ne!(build_key(&books, &upper), build_key(&books, &padded));
    }

    #[test]
    fn entity_tag_is_part_of_identity() {
        let s = state();
        assert_ne!(
            build_key(&EntityTag::books(), &s),
            build_key(&EntityTag::new("members"), &s)
        );
    }

    #[test]
    fn query_params_use_endpoint_names() {
        let mut s = state();
        s.insert_filter("Language", "English");
        let params = build_key(&EntityTag::books(), &s).to_query_params();

        let lookup = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(lookup("PageNumber"), Some("1"));
        assert_eq!(lookup("PageSize"), Some("3"));
        assert_eq!(lookup("Keyword"), None);
        assert_eq!(lookup("SortBy"), Some("id"));
        assert_eq!(lookup("SortOrder"), Some("asc"));
        assert_eq!(lookup("Language"), Some("English"));
    }

    #[test]
    fn display_is_readable() {
        let mut s = state();
        s.insert_filter("language", "English");
        let key = build_key(&EntityTag::books(), &s);
        assert_eq!(
            key.to_string(),
            r#"books[page=1 size=3 q="" sort=id:asc language="English"]"#
        );
    }
}
