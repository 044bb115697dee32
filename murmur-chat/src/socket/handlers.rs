use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use uuid::Uuid;

use murmur_shared::middleware::caller_from_headers;

use super::connections::{Connection, ConnectionId, ConnectionManager};

#[derive(Debug, Clone)]
pub struct SocketSession {
    pub user_id: Uuid,
    pub connection_id: ConnectionId,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

pub fn register(io: &SocketIo, connections: Arc<ConnectionManager>) {
    io.ns("/", move |socket: SocketRef| {
        let connections = connections.clone();
        async move {
            on_connect(socket, connections);
        }
    });
}

fn on_connect(socket: SocketRef, connections: Arc<ConnectionManager>) {
    let caller = match caller_from_headers(&socket.req_parts().headers) {
        Ok(caller) => caller,
        Err(err) => {
            tracing::warn!(error = %err, sid = %socket.id, "socket rejected without identity");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: err.code().code().into(),
                    message: err.to_string(),
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    let Connection { id: connection_id, mut receiver } = connections.accept(caller.id);
    socket.extensions.insert(SocketSession {
        user_id: caller.id,
        connection_id,
    });

    tracing::info!(user_id = %caller.id, sid = %socket.id, "chat socket connected");
    let _ = socket.emit("connected", &serde_json::json!({ "user_id": caller.id }));

    // Forward queued events until the registration is dropped or the socket closes.
    let outbound = socket.clone();
    tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            if outbound.emit("event", &payload).is_err() {
                break;
            }
        }
        tracing::debug!(sid = %outbound.id, "outbound queue closed");
    });

    socket.on("ping", |socket: SocketRef| async move {
        let _ = socket.emit("pong", &serde_json::json!({}));
    });

    socket.on_disconnect(move |socket: SocketRef| {
        let connections = connections.clone();
        async move {
            on_disconnect(socket, &connections);
        }
    });
}

fn on_disconnect(socket: SocketRef, connections: &ConnectionManager) {
    let Some(session) = socket.extensions.get::<SocketSession>() else {
        return;
    };

    connections.disconnect(session.user_id, session.connection_id);
    tracing::info!(user_id = %session.user_id, sid = %socket.id, "chat socket disconnected");
}
