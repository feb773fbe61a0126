//! Response codes shared by every network call
//!
//! Modeled on the HTTP status codes the REST providers answer with;
//! the same codes classify transport-level failures (timeouts) so the
//! query protocol can treat both uniformly.

/// Status of one request to one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    Accepted,
    BadRequest,
    NotFound,
    RequestTimeout,
    Error,
}

impl ResponseCode {
    /// Numeric wire code
    pub fn code(&self) -> u16 {
        match self {
            ResponseCode::Ok => 200,
            ResponseCode::Accepted => 202,
            ResponseCode::BadRequest => 400,
            ResponseCode::NotFound => 404,
            ResponseCode::RequestTimeout => 408,
            ResponseCode::Error => 500,
        }
    }

    /// Classify a numeric code; anything unrecognized is an error
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => ResponseCode::Ok,
            202 => ResponseCode::Accepted,
            400 => ResponseCode::BadRequest,
            404 => ResponseCode::NotFound,
            408 => ResponseCode::RequestTimeout,
            _ => ResponseCode::Error,
        }
    }

    /// Whether the provider acknowledged the request (200 or 202)
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::Ok | ResponseCode::Accepted)
    }
}

/// One provider's answer to one request
#[derive(Debug, Clone)]
pub struct ChannelResponse {
    pub code: ResponseCode,
    pub body: Option<String>,
}

impl ChannelResponse {
    pub fn new(code: ResponseCode, body: Option<String>) -> Self {
        Self { code, body }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Ok,
            body: Some(body.into()),
        }
    }

    pub fn timeout() -> Self {
        Self {
            code: ResponseCode::RequestTimeout,
            body: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            code: ResponseCode::NotFound,
            body: None,
        }
    }
}
