//! RPC Method Handlers
//!
//! Checks the caller, validates ids, then delegates to the queue engine.

use crate::error::{invalid_params, to_rpc_error};
use crate::types::{
    AssignRequest, CourseRequest, EntryRequest, ListRequest, ListResponse, OpenRequest,
    OpenResponse, StatusResponse, TakeNextResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use ohq_core::domain::{CourseId, EntryId, QueueEntry, QueueError, QueuePosition, UserId};
use ohq_core::port::StaffDirectory;
use ohq_core::QueueEngine;
use std::sync::Arc;
use tracing::{debug, warn};

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    engine: Arc<QueueEngine>,
    staff: Arc<dyn StaffDirectory>,
}

impl RpcHandler {
    pub fn new(engine: Arc<QueueEngine>, staff: Arc<dyn StaffDirectory>) -> Self {
        Self { engine, staff }
    }

    /// ohqueue.join.v1
    pub async fn join(&self, params: CourseRequest) -> RpcResult<QueueEntry> {
        let caller = require_caller(params.caller_uid)?;
        let course_id = require_course(params.course_id)?;
        self.engine
            .join(course_id, caller)
            .await
            .map_err(to_rpc_error)
    }

    /// ohqueue.leave.v1
    pub async fn leave(&self, params: CourseRequest) -> RpcResult<QueueEntry> {
        let caller = require_caller(params.caller_uid)?;
        let course_id = require_course(params.course_id)?;
        self.engine
            .leave(course_id, caller)
            .await
            .map_err(to_rpc_error)
    }

    /// ohqueue.list.v1
    pub async fn list(&self, params: ListRequest) -> RpcResult<ListResponse> {
        require_caller(params.caller_uid)?;
        let course_id = require_course(params.course_id)?;
        let entries = self
            .engine
            .get_queue_by_cid(course_id, params.status.as_deref())
            .await
            .map_err(to_rpc_error)?;

        Ok(ListResponse { course_id, entries })
    }

    /// ohqueue.position.v1
    pub async fn position(&self, params: CourseRequest) -> RpcResult<QueuePosition> {
        let caller = require_caller(params.caller_uid)?;
        let course_id = require_course(params.course_id)?;
        self.engine
            .get_position(course_id, caller)
            .await
            .map_err(to_rpc_error)
    }

    /// ohqueue.status.v1
    pub async fn status(&self, params: CourseRequest) -> RpcResult<StatusResponse> {
        let caller = require_caller(params.caller_uid)?;
        let course_id = require_course(params.course_id)?;

        let summary = self.engine.summary(course_id).await.map_err(to_rpc_error)?;
        let active_entry = self
            .engine
            .active_entry(course_id, caller)
            .await
            .map_err(to_rpc_error)?;
        let position = self
            .engine
            .get_position(course_id, caller)
            .await
            .map_err(to_rpc_error)?;

        Ok(StatusResponse {
            summary,
            active_entry,
            position,
        })
    }

    /// ohqueue.assign.v1
    pub async fn assign(&self, params: AssignRequest) -> RpcResult<QueueEntry> {
        let caller = self.require_staff(params.caller_uid).await?;
        let entry_id = require_entry(params.entry_id)?;
        let helper = params.helper_uid.unwrap_or(caller);
        if helper <= 0 {
            return Err(invalid_params(format!("invalid helper_uid: {}", helper)));
        }

        self.engine
            .assign(entry_id, helper)
            .await
            .map_err(to_rpc_error)
    }

    /// ohqueue.start.v1
    pub async fn start(&self, params: EntryRequest) -> RpcResult<QueueEntry> {
        self.require_staff(params.caller_uid).await?;
        let entry_id = require_entry(params.entry_id)?;
        self.engine
            .start_session(entry_id)
            .await
            .map_err(to_rpc_error)
    }

    /// ohqueue.resolve.v1
    pub async fn resolve(&self, params: EntryRequest) -> RpcResult<QueueEntry> {
        self.require_staff(params.caller_uid).await?;
        let entry_id = require_entry(params.entry_id)?;
        self.engine.resolve(entry_id).await.map_err(to_rpc_error)
    }

    /// ohqueue.requeue.v1
    pub async fn requeue(&self, params: EntryRequest) -> RpcResult<QueueEntry> {
        self.require_staff(params.caller_uid).await?;
        let entry_id = require_entry(params.entry_id)?;
        self.engine.requeue(entry_id).await.map_err(to_rpc_error)
    }

    /// ohqueue.remove.v1
    pub async fn remove(&self, params: EntryRequest) -> RpcResult<QueueEntry> {
        self.require_staff(params.caller_uid).await?;
        let entry_id = require_entry(params.entry_id)?;
        self.engine.remove(entry_id).await.map_err(to_rpc_error)
    }

    /// ohqueue.take_next.v1
    pub async fn take_next(&self, params: CourseRequest) -> RpcResult<TakeNextResponse> {
        let caller = self.require_staff(params.caller_uid).await?;
        let course_id = require_course(params.course_id)?;
        let entry = self
            .engine
            .take_next(course_id, caller)
            .await
            .map_err(to_rpc_error)?;

        if entry.is_none() {
            debug!(course_id = %course_id, helper_id = %caller, "take_next found nobody waiting");
        }
        Ok(TakeNextResponse { course_id, entry })
    }

    /// ohqueue.open.v1
    pub async fn open(&self, params: OpenRequest) -> RpcResult<OpenResponse> {
        self.require_staff(params.caller_uid).await?;
        let course_id = require_course(params.course_id)?;
        self.engine
            .set_queue_open(course_id, params.open)
            .await
            .map_err(to_rpc_error)?;

        Ok(OpenResponse {
            course_id,
            open: params.open,
        })
    }

    async fn require_staff(&self, caller_uid: UserId) -> RpcResult<UserId> {
        let caller = require_caller(caller_uid)?;
        if self.staff.is_staff(caller).await.map_err(to_rpc_error)? {
            return Ok(caller);
        }

        warn!(caller_uid = %caller, "Rejected staff-only call from non-staff user");
        Err(to_rpc_error(
            QueueError::Unauthorized(format!("user {} is not course staff", caller)).into(),
        ))
    }
}

fn require_caller(caller_uid: UserId) -> RpcResult<UserId> {
    if caller_uid <= 0 {
        return Err(to_rpc_error(
            QueueError::Unauthorized("anonymous caller".to_string()).into(),
        ));
    }
    Ok(caller_uid)
}

fn require_course(course_id: CourseId) -> RpcResult<CourseId> {
    if course_id <= 0 {
        return Err(invalid_params(format!("invalid course_id: {}", course_id)));
    }
    Ok(course_id)
}

fn require_entry(entry_id: EntryId) -> RpcResult<EntryId> {
    if entry_id <= 0 {
        return Err(invalid_params(format!("invalid entry_id: {}", entry_id)));
    }
    Ok(entry_id)
}
