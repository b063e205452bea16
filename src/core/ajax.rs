//! Client for the LMS AJAX service endpoint.
//!
//! Every call is a POST of a one-element batch to
//! `{base}/lib/ajax/service.php?sesskey=..&info=<method>`; the reply is a
//! one-element array carrying either `data` or an `exception`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::core::error::{FeedError, FeedResult};
use crate::core::models::{
    CountUnreadRequest, FetchRequest, FetchResponse, MarkAllReadRequest, MarkAllReadResponse,
};
use crate::core::repository::NotificationRepository;

pub const QUERY_METHOD: &str = "message_popup_get_popup_notifications";
pub const MARK_ALL_READ_METHOD: &str = "core_message_mark_all_notifications_as_read";
pub const COUNT_UNREAD_METHOD: &str = "message_popup_get_unread_popup_notification_count";

const SERVICE_PATH: &str = "lib/ajax/service.php";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AjaxException {
    #[serde(default)]
    message: String,
    #[serde(rename = "errorcode", default)]
    error_code: String,
}

#[derive(Debug, Deserialize)]
struct AjaxReply {
    error: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    exception: Option<AjaxException>,
}

#[derive(Clone)]
pub struct AjaxRepository {
    client: Client,
    base_url: Url,
    session_key: String,
}

impl AjaxRepository {
    pub fn new(base_url: Url, session_key: String) -> Self {
        AjaxRepository {
            client: Client::new(),
            base_url,
            session_key,
        }
    }

    fn service_url(&self, method: &str) -> FeedResult<Url> {
        let mut url = self
            .base_url
            .join(SERVICE_PATH)
            .map_err(|e| FeedError::Transport(format!("bad service url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("sesskey", &self.session_key)
            .append_pair("info", method);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> FeedResult<T> {
        let url = self.service_url(method)?;
        log::debug!("ajax call: {method}");

        let response = self
            .client
            .post(url)
            .json(&batch_body(method, args))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedError::Transport(format!("status {status}: {text}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        decode_reply(&body)
    }
}

fn batch_body(method: &str, args: Value) -> Value {
    json!([{ "index": 0, "methodname": method, "args": args }])
}

pub(crate) fn query_args(request: &FetchRequest) -> Value {
    json!({
        "useridto": request.recipient_id,
        "limit": request.limit,
        "offset": request.offset,
        "markasread": request.mark_as_read,
        "status": request.mode.as_str(),
        "embeduserto": request.embed_user_to,
        "embeduserfrom": request.embed_user_from,
        "newestfirst": true,
    })
}

/// Unwrap the first reply of a batch response into `T`.
pub(crate) fn decode_reply<T: DeserializeOwned>(body: &str) -> FeedResult<T> {
    let mut replies: Vec<AjaxReply> = serde_json::from_str(body)
        .map_err(|e| FeedError::MalformedResponse(format!("invalid reply: {e}")))?;
    if replies.is_empty() {
        return Err(FeedError::MalformedResponse("empty reply batch".into()));
    }
    let reply = replies.swap_remove(0);

    if reply.error {
        let exception = reply.exception.unwrap_or(AjaxException {
            message: "unknown error".into(),
            error_code: String::new(),
        });
        return Err(FeedError::Server {
            code: exception.error_code,
            message: exception.message,
        });
    }

    let data = reply
        .data
        .ok_or_else(|| FeedError::MalformedResponse("reply without data".into()))?;
    serde_json::from_value(data).map_err(|e| FeedError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl NotificationRepository for AjaxRepository {
    async fn query(&self, request: &FetchRequest) -> FeedResult<FetchResponse> {
        self.call(QUERY_METHOD, query_args(request)).await
    }

    async fn mark_all_read(&self, request: &MarkAllReadRequest) -> FeedResult<MarkAllReadResponse> {
        let success: bool = self
            .call(MARK_ALL_READ_METHOD, json!({ "useridto": request.recipient_id }))
            .await?;
        Ok(MarkAllReadResponse { success })
    }

    async fn count_unread(&self, request: &CountUnreadRequest) -> FeedResult<u32> {
        self.call(COUNT_UNREAD_METHOD, json!({ "useridto": request.recipient_id }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ViewMode;

    #[test]
    fn query_args_carry_paging_and_mode() {
        let args = query_args(&FetchRequest {
            limit: 20,
            offset: 40,
            recipient_id: 7,
            mark_as_read: true,
            mode: ViewMode::Unread,
            embed_user_from: true,
            embed_user_to: false,
        });
        assert_eq!(args["useridto"], 7);
        assert_eq!(args["limit"], 20);
        assert_eq!(args["offset"], 40);
        assert_eq!(args["status"], "unread");
        assert_eq!(args["markasread"], true);
        assert_eq!(args["embeduserfrom"], true);
    }

    #[test]
    fn decodes_data_payload() {
        let body = r#"[{"error": false, "data": {"notifications": [], "unreadcount": 3}}]"#;
        let response: FetchResponse = decode_reply(body).unwrap();
        assert!(response.notifications.is_empty());
        assert_eq!(response.unread_count, 3);
    }

    #[test]
    fn server_exception_becomes_server_error() {
        let body = r#"[{"error": true, "exception": {"message": "Invalid sesskey", "errorcode": "invalidsesskey"}}]"#;
        let err = decode_reply::<u32>(body).unwrap_err();
        assert_eq!(
            err,
            FeedError::Server {
                code: "invalidsesskey".into(),
                message: "Invalid sesskey".into(),
            }
        );
    }

    #[test]
    fn missing_fields_are_malformed() {
        let body = r#"[{"error": false, "data": {"notifications": []}}]"#;
        let err = decode_reply::<FetchResponse>(body).unwrap_err();
        assert!(matches!(err, FeedError::MalformedResponse(_)));

        let err = decode_reply::<u32>("<html>login</html>").unwrap_err();
        assert!(matches!(err, FeedError::MalformedResponse(_)));
    }

    #[test]
    fn service_url_includes_session_and_method() {
        let repo = AjaxRepository::new(
            Url::parse("https://lms.example.org/").unwrap(),
            "abc123".into(),
        );
        let url = repo.service_url(QUERY_METHOD).unwrap();
        assert_eq!(url.path(), "/lib/ajax/service.php");
        let query = url.query().unwrap();
        assert!(query.contains("sesskey=abc123"));
        assert!(query.contains("info=message_popup_get_popup_notifications"));
    }
}
