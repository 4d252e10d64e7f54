use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A record (or RDF text) could not be turned into quads.
    #[error("graph parse error in `{graph}`: {message}")]
    Parse { graph: String, message: String },

    #[error("query error at `{near}`: {message}")]
    Query { near: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn parse(graph: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::Parse {
            graph: graph.into(),
            message: message.into(),
        }
    }

    pub(crate) fn query(near: &str, message: impl Into<String>) -> Self {
        let near: String = near.chars().take(40).collect();
        GraphError::Query {
            near,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
