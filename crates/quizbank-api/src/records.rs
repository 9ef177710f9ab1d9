use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use quizbank_types::api::{TestResponse, TestSummary};

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

/// An uploaded audio blob, as pulled off the multipart request.
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: String,
}

/// Everything a create or update operation needs, transport-free.
pub struct TestInput {
    pub kind: String,
    pub title: String,
    /// Raw string fields as submitted; the normalizer strips the control
    /// fields out of these.
    pub fields: HashMap<String, String>,
    pub upload: Option<AudioUpload>,
    /// Update-only flag: detach and delete the current asset.
    pub remove_audio: bool,
}

// -- Core operations --

pub async fn create_test_record(
    state: &AppStateInner,
    input: TestInput,
) -> Result<TestResponse, ApiError> {
    let audio_path = match &input.upload {
        Some(up) => Some(
            state
                .audio
                .store(&up.bytes, up.content_type.as_deref(), &up.file_name)
                .await?,
        ),
        None => None,
    };

    let content = quizbank_content::normalize(&input.kind, input.fields, audio_path.as_deref());
    let stored = serde_json::to_string(&content).map_err(anyhow::Error::from)?;

    let row = state
        .db
        .create_test(&input.kind, &input.title, &stored, audio_path.as_deref())?;

    Ok(TestResponse {
        id: row.id,
        kind: row.kind,
        title: row.title,
        content,
    })
}

/// Full replace: title, kind, and content are rewritten wholesale. The
/// audio reference keeps the prior asset unless a new upload or the
/// remove flag detaches it — detached assets are deleted here, within the
/// same operation.
pub async fn update_test_record(
    state: &AppStateInner,
    id: i64,
    input: TestInput,
) -> Result<TestResponse, ApiError> {
    let existing = state.db.get_test(id)?.ok_or(ApiError::NotFound)?;

    let audio_path = if let Some(up) = &input.upload {
        Some(
            state
                .audio
                .replace(
                    existing.audiofile.as_deref(),
                    &up.bytes,
                    up.content_type.as_deref(),
                    &up.file_name,
                )
                .await?,
        )
    } else if input.remove_audio {
        if let Some(old) = existing.audiofile.as_deref() {
            state.audio.remove(old).await;
        }
        None
    } else {
        existing.audiofile
    };

    let content = quizbank_content::normalize(&input.kind, input.fields, audio_path.as_deref());
    let stored = serde_json::to_string(&content).map_err(anyhow::Error::from)?;

    state
        .db
        .update_test(id, &input.kind, &input.title, &stored, audio_path.as_deref())?;

    Ok(TestResponse {
        id,
        kind: input.kind,
        title: input.title,
        content,
    })
}

pub async fn delete_test_record(state: &AppStateInner, id: i64) -> Result<(), ApiError> {
    let existing = state.db.get_test(id)?.ok_or(ApiError::NotFound)?;
    state.db.delete_test(id)?;

    // Advisory cleanup after the DB-confirmed delete.
    if let Some(path) = existing.audiofile.as_deref() {
        state.audio.remove(path).await;
    }

    Ok(())
}

pub fn list_test_records(state: &AppStateInner) -> Result<Vec<TestSummary>, ApiError> {
    let rows = state.db.list_tests()?;
    Ok(rows
        .into_iter()
        .map(|row| TestSummary {
            id: row.id,
            kind: row.kind,
            title: row.title,
        })
        .collect())
}

pub fn get_test_record(state: &AppStateInner, id: i64) -> Result<TestResponse, ApiError> {
    let row = state.db.get_test(id)?.ok_or(ApiError::NotFound)?;
    let content = quizbank_content::decode(&row.content).map_err(anyhow::Error::from)?;

    Ok(TestResponse {
        id: row.id,
        kind: row.kind,
        title: row.title,
        content,
    })
}

// -- Multipart extraction --

/// Collect the multipart form into a `TestInput`: string parts become raw
/// fields, the `audiofile` part becomes the upload, and the `removeAudio`
/// control field becomes the detach flag.
async fn read_test_input(mut multipart: Multipart) -> Result<TestInput, ApiError> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "audiofile" {
            let content_type = field.content_type().map(str::to_string);
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed upload: {e}")))?;
            upload = Some(AudioUpload {
                bytes: bytes.to_vec(),
                content_type,
                file_name,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    let kind = fields
        .get("type")
        .cloned()
        .ok_or_else(|| ApiError::Validation("Type is required".to_string()))?;
    let title = fields
        .get("title")
        .cloned()
        .ok_or_else(|| ApiError::Validation("Title is required".to_string()))?;
    let remove_audio = fields.remove("removeAudio").as_deref() == Some("true");

    Ok(TestInput {
        kind,
        title,
        fields,
        upload,
        remove_audio,
    })
}

// -- Handlers --

pub async fn create_test(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let input = read_test_input(multipart).await?;
    let record = create_test_record(&state, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let input = read_test_input(multipart).await?;
    let record = update_test_record(&state, id, input).await?;
    Ok(Json(record))
}

pub async fn delete_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    delete_test_record(&state, id).await?;
    Ok(Json(serde_json::json!({ "message": "Test deleted successfully" })))
}

pub async fn list_tests(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(list_test_records(&state)?))
}

pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(get_test_record(&state, id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{AudioStore, DEFAULT_MAX_UPLOAD_BYTES};
    use crate::token::TokenService;
    use quizbank_db::Database;

    async fn state() -> AppStateInner {
        let dir = std::env::temp_dir().join(format!("quizbank-records-{}", rand::random::<u32>()));
        AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenService::new("test-secret"),
            audio: AudioStore::new(dir, DEFAULT_MAX_UPLOAD_BYTES).await.unwrap(),
        }
    }

    fn input(kind: &str, title: &str, pairs: &[(&str, &str)]) -> TestInput {
        TestInput {
            kind: kind.to_string(),
            title: title.to_string(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            upload: None,
            remove_audio: false,
        }
    }

    fn mp3_upload(bytes: &[u8]) -> Option<AudioUpload> {
        Some(AudioUpload {
            bytes: bytes.to_vec(),
            content_type: Some("audio/mpeg".to_string()),
            file_name: "clip.mp3".to_string(),
        })
    }

    fn asset_exists(state: &AppStateInner, path: &str) -> bool {
        std::fs::exists(state.audio.disk_path(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn create_normalizes_content() {
        let state = state().await;
        let record = create_test_record(
            &state,
            input("multiple_choice", "Quiz", &[("answers", "a, b ,c")]),
        )
        .await
        .unwrap();

        assert_eq!(record.content["answers"], serde_json::json!(["a", "b", "c"]));

        // Stored form decodes to the same mapping on read.
        let fetched = get_test_record(&state, record.id).unwrap();
        assert_eq!(fetched.content, record.content);
    }

    #[tokio::test]
    async fn create_with_upload_stores_asset_and_delete_removes_it() {
        let state = state().await;
        let mut test = input("true_false", "Listening", &[("correctAnswer", "true")]);
        test.upload = mp3_upload(b"mp3-bytes");

        let record = create_test_record(&state, test).await.unwrap();
        let path = record.content["audiofile"].as_str().unwrap().to_string();
        assert!(asset_exists(&state, &path));

        delete_test_record(&state, record.id).await.unwrap();
        assert!(!asset_exists(&state, &path));
        assert!(matches!(
            get_test_record(&state, record.id).unwrap_err(),
            ApiError::NotFound
        ));
    }

    #[tokio::test]
    async fn bad_upload_rejected_before_any_write() {
        let state = state().await;
        let mut test = input("essay", "T", &[]);
        test.upload = Some(AudioUpload {
            bytes: b"html".to_vec(),
            content_type: Some("text/html".to_string()),
            file_name: "x.html".to_string(),
        });

        let err = create_test_record(&state, test).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMediaType));
        assert!(state.db.list_tests().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_audio_and_prunes_old_asset() {
        let state = state().await;
        let mut test = input("essay", "T", &[]);
        test.upload = mp3_upload(b"first");
        let record = create_test_record(&state, test).await.unwrap();
        let old_path = record.content["audiofile"].as_str().unwrap().to_string();

        let mut replacement = input("essay", "T2", &[]);
        replacement.upload = mp3_upload(b"second");
        let updated = update_test_record(&state, record.id, replacement)
            .await
            .unwrap();
        let new_path = updated.content["audiofile"].as_str().unwrap().to_string();

        assert_ne!(old_path, new_path);
        assert!(!asset_exists(&state, &old_path));
        assert!(asset_exists(&state, &new_path));
    }

    #[tokio::test]
    async fn update_keeps_audio_unless_detached() {
        let state = state().await;
        let mut test = input("essay", "T", &[]);
        test.upload = mp3_upload(b"keep-me");
        let record = create_test_record(&state, test).await.unwrap();
        let path = record.content["audiofile"].as_str().unwrap().to_string();

        // Plain update without upload or flag retains the reference.
        let updated = update_test_record(&state, record.id, input("essay", "T2", &[]))
            .await
            .unwrap();
        assert_eq!(updated.content["audiofile"], path.as_str());
        assert!(asset_exists(&state, &path));

        // removeAudio detaches and deletes.
        let mut detach = input("essay", "T3", &[]);
        detach.remove_audio = true;
        let updated = update_test_record(&state, record.id, detach).await.unwrap();
        assert!(!updated.content.contains_key("audiofile"));
        assert!(!asset_exists(&state, &path));
    }

    #[tokio::test]
    async fn update_and_delete_missing_are_not_found() {
        let state = state().await;
        assert!(matches!(
            update_test_record(&state, 42, input("essay", "T", &[]))
                .await
                .unwrap_err(),
            ApiError::NotFound
        ));
        // Delete of a missing id is NotFound every time, including after a
        // successful delete.
        let record = create_test_record(&state, input("essay", "T", &[]))
            .await
            .unwrap();
        delete_test_record(&state, record.id).await.unwrap();
        for _ in 0..2 {
            assert!(matches!(
                delete_test_record(&state, record.id).await.unwrap_err(),
                ApiError::NotFound
            ));
        }
    }

    #[tokio::test]
    async fn list_is_a_summary_projection() {
        let state = state().await;
        create_test_record(&state, input("multiple_choice", "A", &[("answers", "x,y")]))
            .await
            .unwrap();
        create_test_record(&state, input("essay", "B", &[]))
            .await
            .unwrap();

        let summaries = list_test_records(&state).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "A");
        assert_eq!(summaries[1].title, "B");

        // The serialized summary carries no content key.
        let json = serde_json::to_value(&summaries).unwrap();
        assert!(json[0].get("content").is_none());
    }
}
