#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
    Config(ConfigError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
            Self::Config(err) => write!(f, "server config error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigError> for ServerError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn validation(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::ValidationError, message, details),
        }
    }

    fn quota_exceeded(retry_after_seconds: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            error: ApiError::quota_exceeded(retry_after_seconds),
        }
    }

    fn from_rejection(rejection: TurnRejection) -> Self {
        match rejection {
            TurnRejection::RateLimited {
                retry_after_seconds,
            } => Self::quota_exceeded(retry_after_seconds),
            TurnRejection::Invalid(err) => {
                Self::validation("turn request failed validation", Some(err.to_string()))
            }
        }
    }
}

impl IntoResponse for HttpApiError {
    /// Error bodies keep the envelope shape so clients can always read
    /// `events` as an array. 429s additionally carry `Retry-After`.
    fn into_response(self) -> Response {
        let retry_after = self.error.retry_after_seconds;
        let mut response = (self.status, Json(TurnEnvelope::rejected(self.error))).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("retry-after"), value);
            }
        }
        response
    }
}
