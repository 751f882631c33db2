use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("webhook signature headers are missing")]
    MissingSignature,
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("engine credential unavailable: {0}")]
    Credential(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine client used before initialize()")]
    Uninitialized,
    #[error("engine credential unavailable: {0}")]
    Credential(String),
    #[error("engine {method} {endpoint} returned status {status}: {body}")]
    Status { endpoint: String, method: String, status: u16, body: String },
    #[error("engine {method} {endpoint} transport failure: {message}")]
    Transport { endpoint: String, method: String, message: String },
    #[error("engine {method} {endpoint} returned an undecodable body: {message}")]
    Decode { endpoint: String, method: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("gateway login failed: {0}")]
    Login(String),
    #[error("gateway reconnection budget exhausted after {attempts} attempts")]
    ReconnectBudgetExhausted { attempts: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("numeric value is not finite")]
    NonFiniteNumber,
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("malformed stock entry: {0}")]
    MalformedStockEntry(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::BadRequest { .. } => 400,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Auth(error) => {
                Self::Unauthorized { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::MalformedRequest(message) => {
                Self::BadRequest { message, correlation_id: unassigned }
            }
            ApplicationError::Engine(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Connectivity(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Format(error) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}
