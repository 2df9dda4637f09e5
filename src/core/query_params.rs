/// Row filter understood by both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
}

/// A table query: projection, filters, ordering and paging.
///
/// Serialises to PostgREST query parameters with [`Query::to_pairs`], e.g.
/// ```
/// use wavelength::core::query_params::Query;
/// let q = Query::new().eq("user_id", "42").order_desc("created_at").limit(20);
/// assert_eq!(q.to_query_string(), "select=*&user_id=eq.42&order=created_at.desc&limit=20");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub select: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .push(Filter::In(column.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), true));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some((column.to_string(), false));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Zero-based page with `per_page` rows. Pages past the addressable range
    /// clamp to the last offset and come back empty.
    pub fn page(self, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        self.offset(page.saturating_mul(per_page)).limit(per_page)
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];

        for filter in &self.filters {
            match filter {
                Filter::Eq(column, value) => pairs.push((column.clone(), format!("eq.{}", value))),
                Filter::In(column, values) => {
                    let quoted: Vec<String> = values.iter().map(|v| quote_list_value(v)).collect();
                    pairs.push((column.clone(), format!("in.({})", quoted.join(","))));
                }
            }
        }

        if let Some((column, ascending)) = &self.order {
            let dir = if *ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        pairs
    }

    pub fn to_query_string(&self) -> String {
        self.to_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), encode_value(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// Reserved PostgREST characters inside `in.(...)` lists need double quotes.
fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

// Keep the operator punctuation readable; encode everything else.
fn encode_value(value: &str) -> String {
    value
        .split(',')
        .map(|part| {
            urlencoding::encode(part)
                .replace("%28", "(")
                .replace("%29", ")")
                .replace("%2A", "*")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the total out of a `Content-Range` header such as `0-9/42` or `*/42`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    header
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
}
