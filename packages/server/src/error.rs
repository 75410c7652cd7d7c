//! Mapping of library errors onto HTTP responses.

use accident_map_analytics::AnalyticsError;
use accident_map_database::DbError;
use accident_map_geography::GeoError;
use accident_map_server_models::ApiError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

/// A failed request.
#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    /// Malformed parameter.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown resource or no data to answer with.
    #[error("{0}")]
    NotFound(String),

    /// Anything the client cannot fix.
    #[error("{0}")]
    Internal(String),
}

impl ApiFailure {
    pub(crate) fn internal(context: &str, e: &dyn std::error::Error) -> Self {
        log::error!("{context}: {e}");
        Self::Internal(context.to_string())
    }
}

impl ResponseError for ApiFailure {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiError::new(self.to_string()))
    }
}

impl From<DbError> for ApiFailure {
    fn from(e: DbError) -> Self {
        Self::internal("Database query failed", &e)
    }
}

impl From<GeoError> for ApiFailure {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::UnknownRegion(code) => Self::NotFound(format!("Unknown region {code}")),
            other => Self::internal("Geographic query failed", &other),
        }
    }
}

impl From<AnalyticsError> for ApiFailure {
    fn from(e: AnalyticsError) -> Self {
        Self::internal("Analytics query failed", &e)
    }
}

#[cfg(test)]
mod tests {
    use accident_map_geography_models::RegionCode;

    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiFailure::BadRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let unknown: ApiFailure = GeoError::UnknownRegion(RegionCode::new(4).unwrap()).into();
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(unknown.to_string(), "Unknown region 04");

        let internal: ApiFailure = DbError::PoolPoisoned.into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), "Database query failed");
    }
}
