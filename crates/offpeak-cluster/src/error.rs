use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Cluster API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Workload not found: {namespace}/{name}")]
    NotFound { namespace: String, name: String },
}

pub type Result<T> = std::result::Result<T, ClusterError>;
