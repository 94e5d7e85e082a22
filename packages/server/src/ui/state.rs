//! Shared state handed to every connection handler.

use std::sync::Arc;

use crate::{
    config::RelayConfig,
    usecase::{CreateSessionUseCase, JoinSessionUseCase, LeaveSessionUseCase, SendDataUseCase},
};

/// Shared application state
pub struct AppState {
    pub create_session_usecase: Arc<CreateSessionUseCase>,
    pub join_session_usecase: Arc<JoinSessionUseCase>,
    pub send_data_usecase: Arc<SendDataUseCase>,
    pub leave_session_usecase: Arc<LeaveSessionUseCase>,
    pub config: RelayConfig,
}
