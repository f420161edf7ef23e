use std::sync::Arc;

use eyre::{eyre, Result};
use flume::Sender;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;
use vending_core::{Money, RequestKind};
use vending_machine::purchase::{PurchaseRequest, PurchaseResponse};
use vending_machine::Stats;

mod form;
pub mod mock;

pub use form::MultipartForm;

#[derive(Debug, Error)]
#[error("Error {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum Response {
    Error { status: u16, msg: String, id: Uuid },
    Int { i: Money, id: Uuid },
    Json { json: Vec<u8>, id: Uuid },
    Stored { name: String, id: Uuid },
}

impl Response {
    fn id(&self) -> Uuid {
        match self {
            Response::Error { id, .. }
            | Response::Int { id, .. }
            | Response::Json { id, .. }
            | Response::Stored { id, .. } => *id,
        }
    }

    /// Convert into an [`ApiResponse`], with `ok` extracting the value of a
    /// successful response
    fn into_api_response<T>(
        self,
        rq_kind: RequestKind,
        ok: impl FnOnce(Response) -> Option<Result<T>>,
    ) -> Result<ApiResponse<T>> {
        let request_id = self.id();
        let result = match self {
            Response::Error { status, msg, .. } => Err(ApiError {
                status,
                message: msg,
            }),
            resp => match ok(resp) {
                Some(value) => Ok(value?),
                None => return Err(eyre!("{rq_kind:?} must not be answered like this")),
            },
        };
        Ok(ApiResponse { request_id, result })
    }
}

struct RequestMsg {
    kind: RequestKind,
    content_type: Option<String>,
    payload: Vec<u8>,
    id: Uuid,
    response_channel: oneshot::Sender<Response>,
}

pub struct Api {
    /// One channel per worker thread
    channels: Arc<Vec<Sender<RequestMsg>>>,

    my_channel: Sender<RequestMsg>,
    my_index: usize,
}

impl Api {
    fn new(channels: Vec<Sender<RequestMsg>>) -> Self {
        let my_channel = channels[0].clone();
        Self {
            channels: Arc::new(channels),
            my_channel,
            my_index: 0,
        }
    }
}

impl Clone for Api {
    fn clone(&self) -> Self {
        let my_index = (self.my_index + 1) % self.channels.len();
        Self {
            channels: self.channels.clone(),
            my_channel: self.channels[my_index].clone(),
            my_index,
        }
    }
}

impl Api {
    async fn make_request(
        &self,
        kind: RequestKind,
        content_type: Option<String>,
        payload: Vec<u8>,
    ) -> Result<Response> {
        let (sender, receiver) = oneshot::channel();
        let msg = RequestMsg {
            kind,
            content_type,
            payload,
            id: Uuid::new_v4(),
            response_channel: sender,
        };
        self.my_channel.send_async(msg).await?;
        Ok(receiver.await?)
    }

    pub async fn get_price(&self) -> Result<ApiResponse<Money>> {
        let kind = RequestKind::Price;
        let response = self.make_request(kind, None, Vec::new()).await?;
        response.into_api_response(kind, |resp| match resp {
            Response::Int { i, .. } => Some(Ok(i)),
            _ => None,
        })
    }

    /// Buy one item tendering `sum`; the result is the change
    pub async fn buy(&self, sum: Money) -> Result<ApiResponse<Money>> {
        self.buy_raw(serde_json::to_vec(&PurchaseRequest { sum })?)
            .await
    }

    /// Send an arbitrary purchase payload
    pub async fn buy_raw(&self, body: impl Into<Vec<u8>>) -> Result<ApiResponse<Money>> {
        let kind = RequestKind::Buy;
        let content_type = Some(String::from("application/json"));
        let response = self.make_request(kind, content_type, body.into()).await?;
        response.into_api_response(kind, |resp| match resp {
            Response::Json { json, .. } => Some(
                serde_json::from_slice::<PurchaseResponse>(&json)
                    .map(|rsp| rsp.change)
                    .map_err(Into::into),
            ),
            _ => None,
        })
    }

    /// Upload `content` as the `file` field; the result is the stored name
    pub async fn upload(&self, file_name: &str, content: &[u8]) -> Result<ApiResponse<String>> {
        let form = MultipartForm::new().file("file", file_name, content);
        self.upload_form(Some(&form.content_type()), form.finish())
            .await
    }

    /// Send an arbitrary upload body
    pub async fn upload_form(
        &self,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<ApiResponse<String>> {
        let kind = RequestKind::Upload;
        let content_type = content_type.map(String::from);
        let response = self.make_request(kind, content_type, body).await?;
        response.into_api_response(kind, |resp| match resp {
            Response::Stored { name, .. } => Some(Ok(name)),
            _ => None,
        })
    }

    pub async fn stats(&self) -> Result<ApiResponse<Stats>> {
        let kind = RequestKind::Stats;
        let response = self.make_request(kind, None, Vec::new()).await?;
        response.into_api_response(kind, |resp| match resp {
            Response::Json { json, .. } => Some(serde_json::from_slice(&json).map_err(Into::into)),
            _ => None,
        })
    }
}

pub struct ApiResponse<T> {
    pub request_id: Uuid,
    pub result: ApiResult<T>,
}

impl<T> ApiResponse<T> {
    /// HTTP status code the response would carry
    pub fn status(&self) -> u16 {
        match &self.result {
            Ok(_) => 200,
            Err(err) => err.status,
        }
    }

    /// Message of an error response, empty for successful ones
    pub fn message(&self) -> &str {
        match &self.result {
            Ok(_) => "",
            Err(err) => &err.message,
        }
    }
}
