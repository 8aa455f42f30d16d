use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Request,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::ServerOptions;
use crate::post::{PostId, ValidationError};
use crate::storage::{PostRepository, StorageError};

mod json;
mod posts;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone)]
pub struct ServerState {
    pub repo: Arc<Mutex<PostRepository>>,
}

impl ServerState {
    pub fn new(repo: PostRepository) -> Self {
        Self {
            repo: Arc::new(Mutex::new(repo)),
        }
    }
}

pub fn routes() -> ServerRouter {
    posts::routes().fallback(fallback)
}

pub fn app(state: ServerState) -> Router {
    routes().layer(TraceLayer::new_for_http()).with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

pub async fn serve(options: &ServerOptions, repo: PostRepository) -> Result<(), ServeError> {
    let address = options.socket_addr();
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(ServeError::TcpBind)?;
    tracing::info!(%address, "serving posts api");
    axum::serve(listener, app(ServerState::new(repo)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::TcpServe)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "listening for ctrl-c failed");
    }
    tracing::info!("shutting down");
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Date {0:?} is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("A hashtag to search for is required")]
    MissingHashtag,
    #[error("Post with id {0} was not found")]
    PostNotFound(PostId),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ServerError::PostNotFound(id),
            other => ServerError::Storage(other),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PostNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PathRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::Validation(_)
            | ServerError::InvalidDate(_)
            | ServerError::MissingHashtag => StatusCode::BAD_REQUEST,
            ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            tracing::debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}
