//! IPC message dispatch: parse s-expressions and route to handlers.

use lexpr::Value;
use tracing::{debug, info, warn};

use crate::service::ServiceState;
use crate::sexp::{bool_sexp, escape_string, get_int, get_keyword};

/// Parse an s-expression message and dispatch it.  Returns the response,
/// if any.
pub fn handle_message(state: &mut ServiceState, client_id: u64, raw: &str) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    let is_authenticated = state
        .ipc_server
        .clients
        .get(&client_id)
        .is_some_and(|c| c.authenticated);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(state, client_id, msg_id, &value),
        _ if !is_authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => Some(handle_ping(msg_id, &value)),
        Some("gesture-enable") => Some(handle_gate(state, msg_id, true)),
        Some("gesture-disable") => Some(handle_gate(state, msg_id, false)),
        Some("gesture-status") => Some(handle_status(state, msg_id)),
        Some("landmarks") => Some(handle_landmarks(state, msg_id, &value)),
        Some("mapping-check") => Some(handle_mapping_check(state, msg_id)),
        Some(other) => {
            debug!(client_id, msg_type = other, "unknown message type");
            Some(error_response(msg_id, &format!("unknown message type: {other}")))
        }
        None => Some(error_response(msg_id, "missing :type")),
    }
}

fn handle_hello(state: &mut ServiceState, client_id: u64, msg_id: i64, value: &Value) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    // Only the owning user may drive the pointer.
    let client = state.ipc_server.clients.get_mut(&client_id)?;
    if let Some(peer_uid) = client.peer_uid {
        let our_uid = unsafe { libc::getuid() };
        if peer_uid != our_uid {
            warn!(client_id, peer_uid, our_uid, "rejecting client: UID mismatch");
            return Some(error_response(msg_id, "authentication failed: UID mismatch"));
        }
    }
    client.authenticated = true;
    let client_name = get_keyword(value, "client").unwrap_or_default();
    debug!(client_id, client_name, "hello handshake (authenticated)");

    Some(format!(
        "(:type :hello :id {} :version 1 :server \"gesture-pointer\" :features (:streams {} :enabled {}))",
        msg_id,
        state.streams.len(),
        bool_sexp(state.gate.is_enabled()),
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> String {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts
    )
}

fn handle_gate(state: &mut ServiceState, msg_id: i64, enable: bool) -> String {
    let was = state.gate.is_enabled();
    if enable {
        state.gate.enable();
    } else {
        state.gate.disable();
    }
    if was != enable {
        info!(enabled = enable, "gesture processing toggled over IPC");
        let event = format!(
            "(:type :event :event :gesture-gate :enabled {})",
            bool_sexp(enable)
        );
        state.ipc_server.broadcast_event(&event);
    }
    format!(
        "(:type :response :id {} :status :ok :enabled {})",
        msg_id,
        bool_sexp(enable)
    )
}

fn handle_status(state: &ServiceState, msg_id: i64) -> String {
    let streams: Vec<String> = state
        .streams
        .iter()
        .map(|s| s.status.to_sexp(&s.name))
        .collect();
    format!(
        "(:type :response :id {} :status :ok :enabled {} :uptime-secs {} :streams ({}) :config {} :pipeline {})",
        msg_id,
        bool_sexp(state.gate.is_enabled()),
        state.started.elapsed().as_secs(),
        streams.join(" "),
        state.controller_config.to_sexp(),
        state.pipeline_config.to_sexp(),
    )
}

fn handle_landmarks(state: &ServiceState, msg_id: i64, value: &Value) -> String {
    let wanted = get_keyword(value, "stream");
    let selected: Vec<String> = state
        .streams
        .iter()
        .filter(|s| wanted.as_deref().map_or(true, |w| w == s.name))
        .map(|s| {
            let latest = s.snapshot.latest();
            format!(
                "(:name \"{}\" :frame {} :hands {})",
                escape_string(&s.name),
                latest.frame,
                crate::hand::hands_sexp(&latest.hands)
            )
        })
        .collect();
    if let Some(name) = wanted.filter(|_| selected.is_empty()) {
        return error_response(msg_id, &format!("no stream named {name}"));
    }
    format!(
        "(:type :response :id {} :status :ok :streams ({}))",
        msg_id,
        selected.join(" ")
    )
}

fn handle_mapping_check(state: &ServiceState, msg_id: i64) -> String {
    let path = state.mapping.path().display().to_string();
    match state.mapping.check() {
        Ok(problems) => {
            let items: Vec<String> = problems
                .iter()
                .map(|p| format!("\"{}\"", escape_string(p)))
                .collect();
            format!(
                "(:type :response :id {} :status :ok :path \"{}\" :valid {} :problems ({}))",
                msg_id,
                escape_string(&path),
                bool_sexp(problems.is_empty()),
                items.join(" ")
            )
        }
        Err(e) => error_response(msg_id, &e.to_string()),
    }
}

pub(crate) fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, PipelineConfig};
    use crate::ipc::IpcServer;
    use crate::mapping::FileMappingStore;
    use crate::pipeline::{LandmarkSnapshot, ProcessingGate, StreamStatus};
    use crate::service::StreamView;
    use crate::hand::landmarks::open_hand;
    use crate::hand::Handedness;
    use std::path::PathBuf;

    fn state_with_client(mapping: PathBuf) -> (ServiceState, u64) {
        let mut state = ServiceState::new(
            IpcServer::new(PathBuf::from("/nonexistent/test.sock")),
            ProcessingGate::new(true),
            FileMappingStore::new(mapping),
            ControllerConfig::default(),
            PipelineConfig::default(),
        );
        let snapshot = LandmarkSnapshot::default();
        snapshot.publish(3, &[open_hand(Handedness::Right)]);
        state.streams.push(StreamView {
            name: "replay-0".to_string(),
            snapshot,
            status: StreamStatus::default(),
        });
        let id = state.ipc_server.add_test_client();
        (state, id)
    }

    fn hello(state: &mut ServiceState, id: u64) {
        let resp = handle_message(state, id, "(:type :hello :id 1 :version 1 :client \"test\")").unwrap();
        assert!(resp.starts_with("(:type :hello :id 1 :version 1"), "{resp}");
    }

    #[test]
    fn test_handshake_required() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        let resp = handle_message(&mut state, id, "(:type :ping :id 2)").unwrap();
        assert!(resp.contains("hello handshake required"));
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :ping :id 2 :timestamp 5)").unwrap();
        assert!(resp.contains(":status :ok"));
        assert!(resp.contains(":client-timestamp 5"));
    }

    #[test]
    fn test_bad_version() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        let resp = handle_message(&mut state, id, "(:type :hello :id 1 :version 2)").unwrap();
        assert!(resp.contains("unsupported protocol version: 2"));
    }

    #[test]
    fn test_malformed_message() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        let resp = handle_message(&mut state, id, "(:type").unwrap();
        assert!(resp.contains(":status :error"));
    }

    #[test]
    fn test_gate_toggle() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :gesture-disable :id 3)").unwrap();
        assert!(resp.contains(":enabled nil"));
        assert!(!state.gate.is_enabled());
        let resp = handle_message(&mut state, id, "(:type :gesture-enable :id 4)").unwrap();
        assert!(resp.contains(":enabled t"));
        assert!(state.gate.is_enabled());
    }

    #[test]
    fn test_status() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :gesture-status :id 5)").unwrap();
        assert!(resp.contains(":name \"replay-0\""));
        assert!(resp.contains(":config (:dominant right"));
        assert!(lexpr::from_str(&resp).is_ok());
    }

    #[test]
    fn test_landmarks() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :landmarks :id 6)").unwrap();
        assert!(resp.contains(":frame 3 :hands ((:label right"));
        let resp = handle_message(&mut state, id, "(:type :landmarks :id 7 :stream \"cam\")").unwrap();
        assert!(resp.contains("no stream named cam"));
    }

    #[test]
    fn test_mapping_check() {
        let path = std::env::temp_dir().join(format!("gesture-pointer-ipc-{}.sexp", std::process::id()));
        std::fs::write(&path, "(:fist drag :wave left-click)").unwrap();
        let (mut state, id) = state_with_client(path.clone());
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :mapping-check :id 8)").unwrap();
        assert!(resp.contains(":valid nil"));
        assert!(resp.contains("unknown gesture wave"));
        std::fs::remove_file(&path).unwrap();

        let resp = handle_message(&mut state, id, "(:type :mapping-check :id 9)").unwrap();
        assert!(resp.contains(":status :error"));
    }

    #[test]
    fn test_unknown_type() {
        let (mut state, id) = state_with_client(PathBuf::from("/nonexistent"));
        hello(&mut state, id);
        let resp = handle_message(&mut state, id, "(:type :surface-list :id 10)").unwrap();
        assert!(resp.contains("unknown message type: surface-list"));
    }
}
