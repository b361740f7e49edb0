//! Session state behind the REST handlers
//!
//! Holds the most recently uploaded dataset. An upload is parsed and derived
//! outside the lock, then swapped in whole, so readers never see a partial
//! load and a failed upload leaves the previous dataset in place.

use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::error::LoadError;
use crate::loader::LoadOptions;
use axum::body::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no dataset loaded; POST a CSV export to /api/v1/upload first")]
    NoDataset,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("this export has no account activity columns, so churn analysis is unavailable")]
    MissingAccountActivity,

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct DashboardService {
    config: AnalysisConfig,
    session: Arc<RwLock<Option<Arc<Dataset>>>>,
}

impl DashboardService {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Defaults for per-request analysis parameters.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse `body` and make it the current dataset.
    pub async fn upload(
        &self,
        body: Bytes,
        options: LoadOptions,
    ) -> Result<Arc<Dataset>, ServiceError> {
        let bytes = body.len();
        let loaded = tokio::task::spawn_blocking(move || {
            Dataset::load(body.as_ref(), &options, Utc::now())
        })
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let dataset = match loaded {
            Ok(dataset) => Arc::new(dataset),
            Err(e) => {
                warn!(error = %e, bytes, "Rejected upload");
                return Err(e.into());
            }
        };

        let mut session = self.session.write().await;
        *session = Some(dataset.clone());
        info!(rows = dataset.len(), bytes, "Replaced session dataset");
        Ok(dataset)
    }

    pub async fn current(&self) -> Result<Arc<Dataset>, ServiceError> {
        self.session.read().await.clone().ok_or(ServiceError::NoDataset)
    }

    /// Like [`current`](Self::current), but only for exports carrying account
    /// activity.
    pub async fn current_with_activity(&self) -> Result<Arc<Dataset>, ServiceError> {
        let dataset = self.current().await?;
        if dataset.has_account_activity() {
            Ok(dataset)
        } else {
            Err(ServiceError::MissingAccountActivity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts
2024-01-01 10:00:00,1,u1,event,eticket_issued,2024-01-05 10:00:00,2024-01-06 10:00:00
";

    #[tokio::test]
    async fn test_empty_session() {
        let service = DashboardService::new(AnalysisConfig::default());
        assert!(matches!(service.current().await, Err(ServiceError::NoDataset)));
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_dataset() {
        let service = DashboardService::new(AnalysisConfig::default());
        service
            .upload(Bytes::from_static(SAMPLE.as_bytes()), LoadOptions::default())
            .await
            .unwrap();

        let err = service
            .upload(Bytes::from_static(b"order_id,account_id\n1,u1\n"), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Load(LoadError::MissingColumn { .. })));

        let current = service.current().await.unwrap();
        assert_eq!(current.len(), 1);
        assert!(matches!(
            service.current_with_activity().await,
            Err(ServiceError::MissingAccountActivity)
        ));
    }
}
