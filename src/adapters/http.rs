use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use super::{AnalysisContext, AnalysisRequest, AnalysisResult, AnalysisService};
use crate::error::AdapterError;
use crate::models::RawResponse;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const SCORE_PATH: &str = "/v1/score";

/// Analysis service reached over HTTP. Binary responses travel as base64 in
/// a JSON body.
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    sub_test_id: &'a str,
    context: &'a AnalysisContext,
    response: WireResponse<'a>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum WireResponse<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        data_base64: String,
        mime_type: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Drawing {
        data_base64: String,
    },
    Choice {
        selected: &'a [String],
    },
    Empty,
}

impl<'a> From<&'a RawResponse> for WireResponse<'a> {
    fn from(response: &'a RawResponse) -> Self {
        match response {
            RawResponse::Text { text } => WireResponse::Text { text },
            RawResponse::Audio { data, mime_type } => WireResponse::Audio {
                data_base64: STANDARD.encode(data),
                mime_type,
            },
            RawResponse::Drawing { data } => WireResponse::Drawing {
                data_base64: STANDARD.encode(data),
            },
            RawResponse::Choice { selected } => WireResponse::Choice { selected },
            RawResponse::Empty => WireResponse::Empty,
        }
    }
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("failed to create HTTP client: {err}"))?;

        log_info!("Analysis client targeting {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key,
            timeout,
        })
    }

    fn score_url(&self) -> String {
        format!("{}{}", self.base_url, SCORE_PATH)
    }
}

fn wire_body(request: &AnalysisRequest) -> serde_json::Value {
    let wire = WireRequest {
        sub_test_id: &request.sub_test_id,
        context: &request.context,
        response: WireResponse::from(&request.response),
    };
    serde_json::to_value(wire).unwrap_or(serde_json::Value::Null)
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn submit_for_scoring(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AdapterError> {
        let mut builder = self.client.post(self.score_url()).json(&wire_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                AdapterError::Timeout(self.timeout)
            } else {
                AdapterError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_warn!(
                "Analysis service returned {} for {}: {}",
                status, request.sub_test_id, body
            );
            return Err(AdapterError::Unavailable(format!("HTTP {status}")));
        }

        let result: AnalysisResult = response
            .json()
            .await
            .map_err(|err| AdapterError::Malformed(err.to_string()))?;
        result.validate()?;
        Ok(result)
    }
}
