use thiserror::Error;

/// A column the batch cannot run without is missing from an input table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required column '{column}' not found in {table}")]
pub struct SchemaError {
    pub column: String,
    pub table: String,
}

impl SchemaError {
    pub fn new(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: table.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("not authenticated")]
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_column_and_table() {
        let err = SchemaError::new("external_id__c", "RIM extract");
        assert_eq!(
            err.to_string(),
            "required column 'external_id__c' not found in RIM extract"
        );
    }
}
