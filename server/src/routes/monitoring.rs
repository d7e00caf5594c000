use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{
    error::AppJsonResult,
    state::{supervisor::MonitorStatus, MonitorSupervisor},
};

#[derive(Serialize, Debug)]
pub struct MonitoringResponse {
    pub user_id: String,
    pub active: bool,
    pub message: String,
}

/// # POST /monitoring/:user_id/start
pub async fn start(
    State(supervisor): State<MonitorSupervisor>,
    Path(user_id): Path<String>,
) -> AppJsonResult<MonitoringResponse> {
    let started = supervisor.start(&user_id)?;

    let message = if started {
        "Email monitoring started"
    } else {
        "Email monitoring is already running"
    };

    Ok(Json(MonitoringResponse {
        active: supervisor.is_active(&user_id),
        user_id,
        message: message.to_string(),
    }))
}

/// # POST /monitoring/:user_id/stop
pub async fn stop(
    State(supervisor): State<MonitorSupervisor>,
    Path(user_id): Path<String>,
) -> AppJsonResult<MonitoringResponse> {
    let message = if supervisor.stop(&user_id) {
        "Email monitoring stopped"
    } else {
        "Email monitoring was not running"
    };

    Ok(Json(MonitoringResponse {
        user_id,
        active: false,
        message: message.to_string(),
    }))
}

/// # GET /monitoring/:user_id
pub async fn status(
    State(supervisor): State<MonitorSupervisor>,
    Path(user_id): Path<String>,
) -> AppJsonResult<MonitorStatus> {
    Ok(Json(supervisor.status(&user_id)))
}

/// # GET /monitoring
pub async fn active(State(supervisor): State<MonitorSupervisor>) -> AppJsonResult<Vec<String>> {
    Ok(Json(supervisor.active_users()))
}
