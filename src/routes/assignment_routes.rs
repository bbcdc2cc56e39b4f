// src/routes/assignment_routes.rs

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiMessage, AppState},
    schedule::model::Role,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/assignments/{secretary_id}", put(put_assignments))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can assign doctors".into(),
        ))
    }
}

async fn role_in_tenant(
    tx: &mut sqlx::PgConnection,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Role>, ApiError> {
    sqlx::query_scalar::<_, Role>(
        r#"
        SELECT role
        FROM app_user
        WHERE user_id = $1
          AND tenant_id = $2
          AND is_active = true
        "#,
    )
    .bind(user_id)
    .bind(tenant_id)
    .fetch_optional(tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))
}

/* ============================================================
   PUT /assignments/{secretary_id}  (replace all)
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutAssignmentsRequest {
    pub doctor_ids: Vec<Uuid>,
}

pub async fn put_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(secretary_id): Path<Uuid>,
    payload: Result<Json<PutAssignmentsRequest>, JsonRejection>,
) -> Result<Json<ApiMessage>, ApiError> {
    ensure_admin(&auth)?;
    let Json(req) = payload?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if role_in_tenant(&mut tx, auth.tenant_id, secretary_id).await? != Some(Role::Secretary) {
        return Err(ApiError::NotFound("NOT_FOUND", "secretary not found".into()));
    }
    for doctor_id in &req.doctor_ids {
        if role_in_tenant(&mut tx, auth.tenant_id, *doctor_id).await? != Some(Role::Doctor) {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("{doctor_id} is not a doctor in this clinic"),
            ));
        }
    }

    // delete old
    sqlx::query(
        r#"
        DELETE FROM secretary_doctor_assignment
        WHERE secretary_id = $1
          AND tenant_id = $2
        "#,
    )
    .bind(secretary_id)
    .bind(auth.tenant_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // insert new
    for doctor_id in &req.doctor_ids {
        sqlx::query(
            r#"
            INSERT INTO secretary_doctor_assignment (secretary_id, doctor_id, tenant_id)
            VALUES ($1,$2,$3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(secretary_id)
        .bind(doctor_id)
        .bind(auth.tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    }

    tx.commit()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tracing::info!(%secretary_id, doctors = req.doctor_ids.len(), "assignments replaced");
    Ok(Json(ApiMessage {
        success: true,
        message: "assignments updated".into(),
    }))
}
