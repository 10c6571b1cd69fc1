use crate::utils::{encode_query_component, escape_like};
use sqlx::{QueryBuilder, Sqlite};

/// Columns matched by the free-text search
const SEARCH_COLUMNS: [&str; 4] = ["claim_id", "patient_name", "insurer", "status"];

/// Status dropdown selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    /// Only claims marked for review
    Flagged,
    /// Exact stored status value
    Status(String),
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => StatusFilter::Any,
            "flagged" => StatusFilter::Flagged,
            other => StatusFilter::Status(other.to_string()),
        }
    }

    /// Value as sent in the `status` query parameter
    pub fn as_param(&self) -> &str {
        match self {
            StatusFilter::Any => "",
            StatusFilter::Flagged => "flagged",
            StatusFilter::Status(status) => status,
        }
    }
}

/// Search and filter state of the claims list
///
/// The same filter drives the full page, the HTMX table partial and the
/// pagination links, so it owns both the SQL conditions and the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFilter {
    search: String,
    status: StatusFilter,
}

impl ClaimFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free-text search term (trimmed)
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into().trim().to_string();
        self
    }

    /// Set the status filter
    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// Build from raw request parameters
    pub fn from_params(search: Option<&str>, status: Option<&str>) -> Self {
        Self::new()
            .search(search.unwrap_or_default())
            .status(StatusFilter::parse(status.unwrap_or_default()))
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn status_filter(&self) -> &StatusFilter {
        &self.status
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.status == StatusFilter::Any
    }

    /// Append the `WHERE` clause for this filter
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");

        if !self.search.is_empty() {
            // SQLite LIKE folds case for ASCII letters only; other letters match as stored.
            let pattern = format!("%{}%", escape_like(&self.search));
            qb.push(" AND (");
            for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(*column);
                qb.push(" LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" ESCAPE '\\'");
            }
            qb.push(")");
        }

        match &self.status {
            StatusFilter::Any => {}
            StatusFilter::Flagged => {
                qb.push(" AND is_flagged = 1");
            }
            StatusFilter::Status(status) => {
                qb.push(" AND status = ");
                qb.push_bind(status.clone());
            }
        }
    }

    /// Query string that reproduces this filter, optionally on a given page
    pub fn query_string(&self, page: Option<u32>) -> String {
        let mut parts = Vec::new();
        if !self.search.is_empty() {
            parts.push(format!("search={}", encode_query_component(&self.search)));
        }
        if self.status != StatusFilter::Any {
            parts.push(format!(
                "status={}",
                encode_query_component(self.status.as_param())
            ));
        }
        if let Some(page) = page {
            parts.push(format!("page={}", page));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_parse() {
        assert_eq!(StatusFilter::parse(""), StatusFilter::Any);
        assert_eq!(StatusFilter::parse(" flagged "), StatusFilter::Flagged);
        assert_eq!(
            StatusFilter::parse("paid"),
            StatusFilter::Status("paid".to_string())
        );
    }

    #[test]
    fn test_conditions_sql() {
        let filter = ClaimFilter::new()
            .search("blue")
            .status(StatusFilter::Flagged);
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM claims");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("claim_id LIKE ? ESCAPE '\\'"));
        assert!(sql.contains("OR status LIKE ?"));
        assert!(sql.ends_with(" AND is_flagged = 1"));
    }

    #[test]
    fn test_empty_filter_has_no_conditions() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM claims");
        ClaimFilter::new().push_conditions(&mut qb);
        assert_eq!(qb.sql(), "SELECT * FROM claims WHERE 1 = 1");
    }

    #[test]
    fn test_query_string_preserves_state() {
        let filter = ClaimFilter::from_params(Some("  blue cross "), Some("under_review"));
        assert_eq!(filter.search_term(), "blue cross");
        assert_eq!(
            filter.query_string(Some(3)),
            "search=blue+cross&status=under_review&page=3"
        );
        assert_eq!(ClaimFilter::new().query_string(Some(2)), "page=2");
        assert_eq!(ClaimFilter::new().query_string(None), "");
    }
}
