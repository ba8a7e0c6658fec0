//! D-Bus interface for the derma analysis daemon.
//!
//! Bus name: org.derma.Agent1
//! Object path: /org/derma/Agent1
//!
//! String-returning methods carry JSON payloads.

use crate::engine::{EngineError, EngineHandle};
use crate::image_store::ImageStore;
use crate::storage::{Store, StoreError};
use derma_core::report::{self, CaseReport};
use derma_core::validity::ValidityError;
use derma_core::{chat, routine};
use zbus::interface;

pub struct DermaService {
    engine: EngineHandle,
    store: Store,
    images: Option<ImageStore>,
    second_brain: bool,
    face_screen: bool,
}

impl DermaService {
    pub fn new(
        engine: EngineHandle,
        store: Store,
        images: Option<ImageStore>,
        second_brain: bool,
        face_screen: bool,
    ) -> Self {
        Self {
            engine,
            store,
            images,
            second_brain,
            face_screen,
        }
    }
}

fn engine_error(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::Validity(ValidityError::Screen(e)) => zbus::fdo::Error::Failed(e.to_string()),
        EngineError::Validity(v) => zbus::fdo::Error::InvalidArgs(v.to_string()),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

fn store_error(err: StoreError) -> zbus::fdo::Error {
    match err {
        StoreError::UnknownSession(id) => {
            zbus::fdo::Error::InvalidArgs(format!("unknown session: {id}"))
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[interface(name = "org.derma.Agent1")]
impl DermaService {
    /// Analyze an uploaded photo; returns the stored case as JSON.
    ///
    /// Without consent nothing is read or stored.
    async fn analyze(
        &self,
        image_path: &str,
        consent: bool,
        second_opinion: bool,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(image_path, second_opinion, "analyze requested");
        if !consent {
            return Err(zbus::fdo::Error::AccessDenied(
                "consent is required before analysis".into(),
            ));
        }

        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| zbus::fdo::Error::FileNotFound(format!("{image_path}: {e}")))?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let outcome = self
            .engine
            .analyze(bytes, second_opinion && self.second_brain)
            .await
            .map_err(engine_error)?;

        let mut stored_path = None;
        if let Some(images) = &self.images {
            let stored = images
                .save(&session_id, &outcome.image)
                .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
            self.store
                .insert_image(
                    &session_id,
                    &stored.path.to_string_lossy(),
                    &stored.sha256,
                    stored.encrypted,
                )
                .await
                .map_err(store_error)?;
            stored_path = Some(stored.path);
        }

        self.store
            .insert_case(&session_id, &outcome.assessment, &outcome.brain_used)
            .await
            .map_err(store_error)?;

        tracing::info!(
            session = %session_id,
            skin_type = %outcome.assessment.skin_type,
            confidence = outcome.assessment.confidence,
            brain_used = %outcome.brain_used,
            "case stored"
        );

        let mut payload = serde_json::json!({
            "session_id": session_id,
            "skin_type": outcome.assessment.skin_type,
            "issues": outcome.assessment.issues,
            "confidence": outcome.assessment.confidence,
            "doctor_flag": outcome.assessment.doctor_flag,
            "brain_used": outcome.brain_used,
            "notes": outcome.assessment.notes,
        });
        if let Some(path) = stored_path {
            payload["image_path"] = serde_json::Value::String(path.to_string_lossy().into_owned());
        }
        Ok(payload.to_string())
    }

    /// Routine plan for a stored case, as JSON.
    async fn routine(&self, session_id: &str) -> zbus::fdo::Result<String> {
        let case = self.store.get_case(session_id).await.map_err(store_error)?;
        let assessment = case.assessment().map_err(store_error)?;
        let plan = routine::build(&assessment);
        serde_json::to_string(&plan).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Scripted chat reply; both sides of the exchange are recorded.
    async fn chat(&self, session_id: &str, message: &str) -> zbus::fdo::Result<String> {
        // Chat rows must never dangle from a session that has no case.
        self.store.get_case(session_id).await.map_err(store_error)?;

        let reply = chat::scripted_reply(message, &mut rand::thread_rng());
        self.store
            .insert_chat(session_id, "user", message)
            .await
            .map_err(store_error)?;
        self.store
            .insert_chat(session_id, "agent", &reply)
            .await
            .map_err(store_error)?;
        Ok(reply)
    }

    /// Chat transcript for a session, oldest first, as JSON.
    async fn chat_history(&self, session_id: &str, limit: u32) -> zbus::fdo::Result<String> {
        let rows = self
            .store
            .chat_history(session_id, limit)
            .await
            .map_err(store_error)?;
        let entries: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "role": row.role,
                    "message": row.message,
                    "created_at": row.created_at,
                })
            })
            .collect();
        Ok(serde_json::Value::Array(entries).to_string())
    }

    /// Record whether the analysis helped.
    async fn feedback(&self, session_id: &str, helpful: bool) -> zbus::fdo::Result<bool> {
        self.store.get_case(session_id).await.map_err(store_error)?;
        self.store
            .insert_feedback(session_id, if helpful { "Yes" } else { "No" })
            .await
            .map_err(store_error)?;
        tracing::info!(session = %session_id, helpful, "feedback recorded");
        Ok(true)
    }

    /// Render the case PDF to `output_path`; returns the written path.
    async fn export_report(
        &self,
        session_id: &str,
        output_path: &str,
    ) -> zbus::fdo::Result<String> {
        let case = self.store.get_case(session_id).await.map_err(store_error)?;
        let assessment = case.assessment().map_err(store_error)?;
        let plan = routine::build(&assessment);

        let pdf = report::render(&CaseReport {
            session_id: &case.session_id,
            created_at: &case.created_at,
            assessment: &assessment,
            routine: &plan,
        })
        .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        tokio::fs::write(output_path, pdf)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{output_path}: {e}")))?;
        tracing::info!(session = %session_id, output_path, "report exported");
        Ok(output_path.to_string())
    }

    /// Most recent cases as JSON summaries.
    async fn history(&self, limit: u32) -> zbus::fdo::Result<String> {
        let rows = self.store.recent_cases(limit).await.map_err(store_error)?;
        let entries: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "session_id": row.session_id,
                    "created_at": row.created_at,
                    "skin_type": row.skin_type,
                    "confidence": row.confidence,
                    "doctor_flag": row.doctor_flag,
                    "brain_used": row.brain_used,
                })
            })
            .collect();
        Ok(serde_json::Value::Array(entries).to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let cases = self.store.case_count().await.map_err(store_error)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "cases": cases,
            "face_screen": self.face_screen,
            "second_brain": self.second_brain,
            "store_images": self.images.is_some(),
            "sealed_images": self.images.as_ref().is_some_and(ImageStore::is_sealing),
        })
        .to_string())
    }
}
