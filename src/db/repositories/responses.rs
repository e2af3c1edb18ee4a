use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::connection::Database;
use crate::models::RawResponse;

pub fn response_ref(session_id: &str, sub_test_id: &str) -> String {
    format!("{session_id}/{sub_test_id}")
}

struct ResponseColumns {
    text_value: Option<String>,
    mime_type: Option<String>,
    data: Option<Vec<u8>>,
}

fn split(response: &RawResponse) -> Result<ResponseColumns> {
    let columns = match response {
        RawResponse::Text { text } => ResponseColumns {
            text_value: Some(text.clone()),
            mime_type: None,
            data: None,
        },
        RawResponse::Audio { data, mime_type } => ResponseColumns {
            text_value: None,
            mime_type: Some(mime_type.clone()),
            data: Some(data.clone()),
        },
        RawResponse::Drawing { data } => ResponseColumns {
            text_value: None,
            mime_type: None,
            data: Some(data.clone()),
        },
        RawResponse::Choice { selected } => ResponseColumns {
            text_value: Some(serde_json::to_string(selected)?),
            mime_type: None,
            data: None,
        },
        RawResponse::Empty => ResponseColumns {
            text_value: None,
            mime_type: None,
            data: None,
        },
    };
    Ok(columns)
}

fn row_to_response(row: &Row) -> Result<RawResponse> {
    let kind: String = row.get("kind")?;
    let text_value: Option<String> = row.get("text_value")?;
    let mime_type: Option<String> = row.get("mime_type")?;
    let data: Option<Vec<u8>> = row.get("data")?;

    let response = match kind.as_str() {
        "text" => RawResponse::Text {
            text: text_value.unwrap_or_default(),
        },
        "audio" => RawResponse::Audio {
            data: data.unwrap_or_default(),
            mime_type: mime_type.unwrap_or_default(),
        },
        "drawing" => RawResponse::Drawing {
            data: data.unwrap_or_default(),
        },
        "choice" => RawResponse::Choice {
            selected: match text_value {
                Some(raw) => serde_json::from_str(&raw).context("failed to parse choices")?,
                None => Vec::new(),
            },
        },
        "empty" => RawResponse::Empty,
        other => bail!("unknown response kind {other}"),
    };
    Ok(response)
}

impl Database {
    /// Store the raw response for a sub-test, replacing an earlier capture of
    /// the same sub-test (a resumed session re-runs the step).
    pub async fn upsert_response(
        &self,
        session_id: &str,
        sub_test_id: &str,
        response: &RawResponse,
    ) -> Result<String> {
        let reference = response_ref(session_id, sub_test_id);
        let session_id = session_id.to_string();
        let sub_test_id = sub_test_id.to_string();
        let kind = response.kind();
        let columns = split(response)?;
        let id = reference.clone();

        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO responses (id, session_id, sub_test_id, kind, text_value, mime_type, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    session_id,
                    sub_test_id,
                    kind,
                    columns.text_value,
                    columns.mime_type,
                    columns.data,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("failed to store response")?;
            Ok(())
        })
        .await?;

        Ok(reference)
    }

    pub async fn get_response(&self, reference: &str) -> Result<Option<RawResponse>> {
        let reference = reference.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, text_value, mime_type, data FROM responses WHERE id = ?1",
            )?;
            stmt.query_row(params![reference], |row| Ok(row_to_response(row)))
                .optional()?
                .transpose()
        })
        .await
    }
}
