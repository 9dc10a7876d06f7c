//! JSON-RPC Server
//!
//! Serves JSON-RPC 2.0 over HTTP on a TCP address (localhost by default).

use crate::handler::RpcHandler;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use ohq_core::port::StaffDirectory;
use ohq_core::QueueEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9640;

/// Method names, versioned so clients can pin a contract
pub mod methods {
    pub const JOIN: &str = "ohqueue.join.v1";
    pub const LEAVE: &str = "ohqueue.leave.v1";
    pub const LIST: &str = "ohqueue.list.v1";
    pub const POSITION: &str = "ohqueue.position.v1";
    pub const STATUS: &str = "ohqueue.status.v1";
    pub const ASSIGN: &str = "ohqueue.assign.v1";
    pub const START: &str = "ohqueue.start.v1";
    pub const RESOLVE: &str = "ohqueue.resolve.v1";
    pub const REQUEUE: &str = "ohqueue.requeue.v1";
    pub const REMOVE: &str = "ohqueue.remove.v1";
    pub const TAKE_NEXT: &str = "ohqueue.take_next.v1";
    pub const OPEN: &str = "ohqueue.open.v1";
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register method {method}: {reason}")]
    Register { method: &'static str, reason: String },
}

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port (tests)
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

// One registration per method; params are parsed into the handler's request type
macro_rules! register {
    ($module:expr, $handler:expr, $name:expr, $method:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move { handler.$method(params.parse()?).await }
            })
            .map_err(|e| ServerError::Register {
                method: $name,
                reason: e.to_string(),
            })?;
    }};
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        engine: Arc<QueueEngine>,
        staff: Arc<dyn StaffDirectory>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(engine, staff)),
        }
    }

    /// Start the JSON-RPC server, returning the bound address and its handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let mut module = RpcModule::new(());
        let handler = self.handler;

        // Student-facing
        register!(module, handler, methods::JOIN, join);
        register!(module, handler, methods::LEAVE, leave);
        register!(module, handler, methods::LIST, list);
        register!(module, handler, methods::POSITION, position);
        register!(module, handler, methods::STATUS, status);

        // Staff-only
        register!(module, handler, methods::ASSIGN, assign);
        register!(module, handler, methods::START, start);
        register!(module, handler, methods::RESOLVE, resolve);
        register!(module, handler, methods::REQUEUE, requeue);
        register!(module, handler, methods::REMOVE, remove);
        register!(module, handler, methods::TAKE_NEXT, take_next);
        register!(module, handler, methods::OPEN, open);

        info!(
            addr = %local_addr,
            methods = module.method_names().count(),
            "JSON-RPC server started"
        );

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use crate::types::OpenResponse;
    use jsonrpsee::core::client::ClientT;
    use jsonrpsee::http_client::HttpClientBuilder;
    use jsonrpsee::core::params::ObjectParams;
    use ohq_core::domain::{QueueConfig, QueueEntry};
    use ohq_core::port::{StaticStaffDirectory, SystemTimeProvider};
    use ohq_infra_memory::MemoryQueueStore;

    async fn start_server() -> (String, ServerHandle) {
        let engine = Arc::new(QueueEngine::new(
            Arc::new(MemoryQueueStore::new()),
            Arc::new(SystemTimeProvider),
            QueueConfig::default(),
        ));
        let config = RpcServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = RpcServer::new(config, engine, Arc::new(StaticStaffDirectory::new([900])));
        let (addr, handle) = server.start().await.unwrap();
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_join_over_http() {
        let (url, handle) = start_server().await;
        let client = HttpClientBuilder::default().build(&url).unwrap();

        let mut open = ObjectParams::new();
        open.insert("caller_uid", 900).unwrap();
        open.insert("course_id", 5).unwrap();
        open.insert("open", true).unwrap();
        let opened: OpenResponse = client.request(methods::OPEN, open).await.unwrap();
        assert!(opened.open);

        let mut join = ObjectParams::new();
        join.insert("caller_uid", 7).unwrap();
        join.insert("course_id", 5).unwrap();
        let joined: QueueEntry = client.request(methods::JOIN, join).await.unwrap();
        assert_eq!(joined.requester_id, 7);
        assert_eq!(joined.course_id, 5);

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_error_code_over_http() {
        let (url, handle) = start_server().await;
        let client = HttpClientBuilder::default().build(&url).unwrap();

        let mut params = ObjectParams::new();
        params.insert("caller_uid", 7).unwrap();
        params.insert("course_id", 5).unwrap();
        let result: Result<QueueEntry, _> = client.request(methods::JOIN, params).await;

        match result {
            Err(jsonrpsee::core::client::Error::Call(err)) => {
                assert_eq!(err.code(), code::QUEUE_CLOSED)
            }
            other => panic!("expected call error, got {:?}", other),
        }

        handle.stop().unwrap();
    }
}
