use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    fn as_sql(&self) -> &'static str {
        match self {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        }
    }
}

/// A filter over the documents in a single store collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    prefix: Option<String>,
    missing: Vec<String>,
    sort: Option<(String, Order)>,
    limit: Option<usize>,
}

impl Query {
    /// Matches documents whose id starts with `prefix`.
    pub fn prefix(prefix: impl ToString) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    /// Matches documents which do not have `field`, or where it is `null`.
    pub fn missing(mut self, field: impl ToString) -> Self {
        self.missing.push(field.to_string());
        self
    }

    pub fn sort_by(mut self, field: impl ToString, order: Order) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the query as SQL over the `documents` table, returning the
    /// statement and its positional parameters.
    pub(super) fn to_sql(&self, select: &str, collection: &str) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {select} FROM documents WHERE collection = ?");
        let mut params = vec![Value::Text(collection.to_string())];

        if let Some(prefix) = &self.prefix {
            sql.push_str(" AND substr(id, 1, length(?)) = ?");
            params.push(Value::Text(prefix.clone()));
            params.push(Value::Text(prefix.clone()));
        }

        for field in &self.missing {
            sql.push_str(" AND COALESCE(json_type(body, ?), 'null') = 'null'");
            params.push(Value::Text(json_path(field)));
        }

        if let Some((field, order)) = &self.sort {
            sql.push_str(&format!(" ORDER BY json_extract(body, ?) {}, id {}", order.as_sql(), order.as_sql()));
            params.push(Value::Text(json_path(field)));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }

        (sql, params)
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query() {
        let (sql, params) = Query::default().to_sql("body", "posts");
        assert_eq!(sql, "SELECT body FROM documents WHERE collection = ?");
        assert_eq!(params, vec![Value::Text("posts".into())]);
    }

    #[test]
    fn test_full_query() {
        let (sql, params) = Query::prefix("123_")
            .missing("comments")
            .sort_by("created_time", Order::Ascending)
            .limit(1)
            .to_sql("body", "posts");

        assert_eq!(
            sql,
            "SELECT body FROM documents WHERE collection = ? AND substr(id, 1, length(?)) = ? AND COALESCE(json_type(body, ?), 'null') = 'null' ORDER BY json_extract(body, ?) ASC, id ASC LIMIT ?"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("posts".into()),
                Value::Text("123_".into()),
                Value::Text("123_".into()),
                Value::Text("$.\"comments\"".into()),
                Value::Text("$.\"created_time\"".into()),
                Value::Integer(1),
            ]
        );
    }
}
