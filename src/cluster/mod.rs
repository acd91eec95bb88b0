//! Page clustering: path → cluster classification and per-cluster loss
//! analysis.

mod classifier;
mod loss;

pub use classifier::ClusterClassifier;
pub use loss::{analyze_cluster_loss, dominant_cluster, ClusterLoss};
