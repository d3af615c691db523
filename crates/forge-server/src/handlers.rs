//! JSON-RPC method handlers (§4.5): a single `POST /` dispatches on the
//! request's `method` field (`tasks/send`, `tasks/sendSubscribe`,
//! `tasks/get`, `tasks/cancel`), plus the two plain-HTTP metadata
//! endpoints.

use crate::types::{HealthResponse, RpcError, RpcRequest, RpcResponse, SendParams, StreamEvent, TaskIdParams};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use forge_runtime::{AuditEntry, AuditEventType, Message, StepEvent as LoopStepEvent, Task, TaskState};
use futures::stream::{self, Stream};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// `POST /` — the single JSON-RPC entry point. `tasks/sendSubscribe`
/// upgrades the response to a framed Server-Sent-Events stream (§4.5);
/// every other method returns a single buffered JSON-RPC response.
pub async fn rpc(State(state): State<Arc<AppState>>, Json(req): Json<RpcRequest>) -> Response {
    if req.method == "tasks/sendSubscribe" {
        return rpc_stream(State(state), Json(req)).await;
    }
    let id = req.id.clone();
    let result = dispatch(&state, &req).await;
    Json(match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err(error) => RpcResponse::err(id, error),
    })
    .into_response()
}

async fn dispatch(state: &Arc<AppState>, req: &RpcRequest) -> Result<Value, RpcError> {
    match req.method.as_str() {
        "tasks/send" => handle_send(state, &req.params).await,
        "tasks/sendSubscribe" => handle_send(state, &req.params).await,
        "tasks/get" => handle_get(state, &req.params).await,
        "tasks/cancel" => handle_cancel(state, &req.params).await,
        other => Err(RpcError::method_not_found(other)),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    serde_json::from_value(params.clone()).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// `tasks/send`: guardrail-in, execute, guardrail-out, return the final
/// task (§4.5). A guardrail violation on either side terminates the task
/// `failed` rather than retrying (§7).
async fn handle_send(state: &Arc<AppState>, params: &Value) -> Result<Value, RpcError> {
    let params: SendParams = parse_params(params)?;
    let correlation_id = Uuid::new_v4().to_string();
    let inbound = Message::user(params.message);

    let mut task = Task::new(params.id.clone(), inbound.clone());
    task.touch(TaskState::Submitted);

    if let Some(violation) = state.runner.guardrail.check_inbound(&inbound) {
        task.touch(TaskState::Failed);
        task.history.push(Message::assistant(format!("request refused: {}", violation.message)));
        let _ = state.runner.audit.log(
            AuditEntry::new(AuditEventType::GuardrailViolation, &correlation_id)
                .with_task(task.id.clone())
                .with_details(violation.message.clone()),
        );
        state.tasks.put(task.clone()).await;
        return Err(RpcError::guardrail_violation(violation.message));
    }

    task.touch(TaskState::Working);
    state.tasks.put(task.clone()).await;
    let _ = state
        .runner
        .audit
        .log(AuditEntry::new(AuditEventType::TaskSubmitted, &correlation_id).with_task(task.id.clone()));

    let cancel = state.tasks.cancellation_for(&task.id).await;
    let outcome = state.runner.executor.execute(&mut task, inbound, &correlation_id, cancel).await;

    match outcome {
        Ok(response) => {
            if let Some(violation) = state.runner.guardrail.check_outbound(&response) {
                task.touch(TaskState::Failed);
                task.history.push(Message::assistant(format!("response blocked: {}", violation.message)));
                let _ = state.runner.audit.log(
                    AuditEntry::new(AuditEventType::GuardrailViolation, &correlation_id)
                        .with_task(task.id.clone())
                        .with_details(violation.message.clone()),
                );
            } else {
                task.touch(TaskState::Completed);
                let _ = state
                    .runner
                    .audit
                    .log(AuditEntry::new(AuditEventType::TaskCompleted, &correlation_id).with_task(task.id.clone()));
            }
        }
        Err(forge_runtime::RuntimeError::Canceled) => {
            task.touch(TaskState::Canceled);
            let _ = state
                .runner
                .audit
                .log(AuditEntry::new(AuditEventType::TaskCanceled, &correlation_id).with_task(task.id.clone()));
        }
        Err(err) => {
            task.touch(TaskState::Failed);
            task.history.push(Message::assistant(format!("execution failed: {err}")));
            let _ = state.runner.audit.log(
                AuditEntry::new(AuditEventType::TaskFailed, &correlation_id).with_task(task.id.clone()).with_details(err.to_string()),
            );
        }
    }

    state.tasks.put(task.clone()).await;
    state.tasks.clear_cancellation(&task.id).await;
    Ok(serde_json::to_value(&task).expect("Task serialization is infallible"))
}

async fn handle_get(state: &Arc<AppState>, params: &Value) -> Result<Value, RpcError> {
    let params: TaskIdParams = parse_params(params)?;
    let task = state.tasks.get(&params.id).await.ok_or_else(|| RpcError::task_not_found(&params.id))?;
    Ok(serde_json::to_value(&task).expect("Task serialization is infallible"))
}

/// `tasks/cancel`: sets state to `canceled` and returns the task (§4.5,
/// §8 property 10) regardless of the task's current state, as long as it
/// exists.
async fn handle_cancel(state: &Arc<AppState>, params: &Value) -> Result<Value, RpcError> {
    let params: TaskIdParams = parse_params(params)?;
    state.tasks.cancel(&params.id).await;
    let mut task = state.tasks.get(&params.id).await.ok_or_else(|| RpcError::task_not_found(&params.id))?;
    task.touch(TaskState::Canceled);
    state.tasks.put(task.clone()).await;
    let _ = state.runner.audit.log(AuditEntry::new(AuditEventType::TaskCanceled, "manual-cancel").with_task(task.id.clone()));
    Ok(serde_json::to_value(&task).expect("Task serialization is infallible"))
}

/// `POST /rpc/stream`: the `tasks/sendSubscribe` transport. Event order
/// respects §5's happens-before guarantee: `status(working)` always
/// precedes any `tool` event, and `result` is always last.
pub async fn rpc_stream(State(state): State<Arc<AppState>>, Json(req): Json<RpcRequest>) -> Response {
    if req.method != "tasks/sendSubscribe" && req.method != "tasks/send" {
        return (StatusCode::BAD_REQUEST, Json(RpcError::method_not_found(&req.method))).into_response();
    }
    let params: SendParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(e)).into_response(),
    };

    let correlation_id = Uuid::new_v4().to_string();
    let inbound = Message::user(params.message);
    let mut task = Task::new(params.id.clone(), inbound.clone());

    if state.runner.guardrail.check_inbound(&inbound).is_some() {
        task.touch(TaskState::Failed);
        state.tasks.put(task.clone()).await;
        let events = vec![Ok::<Event, Infallible>(to_sse(&StreamEvent::result(&task)))];
        return Sse::new(stream::iter(events)).keep_alive(KeepAlive::default()).into_response();
    }

    task.touch(TaskState::Working);
    state.tasks.put(task.clone()).await;
    let cancel = state.tasks.cancellation_for(&task.id).await;
    let status_event = StreamEvent::status(&task);

    let runner = state.runner.clone();
    let tasks = state.tasks.clone();
    let executor = runner.executor.clone();

    let body = async_stream::stream! {
        yield Ok::<Event, Infallible>(to_sse(&status_event));

        let mut inner = executor.execute_stream(task.clone(), inbound, correlation_id.clone(), cancel);
        let mut final_task = task;
        use futures::StreamExt;
        while let Some(step) = inner.next().await {
            match step {
                LoopStepEvent::Tool(message) => {
                    yield Ok(to_sse(&StreamEvent::tool(&message)));
                    final_task.history.push(message);
                }
                LoopStepEvent::Final(message) => {
                    let violates = runner.guardrail.check_outbound(&message);
                    final_task.history.push(message);
                    final_task.touch(if violates.is_some() { TaskState::Failed } else { TaskState::Completed });
                }
            }
        }
        tasks.put(final_task.clone()).await;
        tasks.clear_cancellation(&final_task.id).await;
        yield Ok(to_sse(&StreamEvent::result(&final_task)));
    };

    Sse::new(body).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse(event: &StreamEvent) -> Event {
    Event::default().event(event.event).json_data(&event.data).expect("StreamEvent data is always valid JSON")
}

/// `GET /.well-known/agent.json`
pub async fn agent_card(State(state): State<Arc<AppState>>) -> Json<forge_runtime::AgentCard> {
    let card = state.runner.agent_card.read().expect("agent card lock poisoned").clone();
    Json(card)
}

/// `GET /healthz`
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", uptime_seconds: state.started_at.elapsed().as_secs() })
}

/// Named alias kept for readability at call sites that box a raw SSE
/// stream (there are none left in this crate, but the type is a natural
/// extension point for a future non-async_stream transport).
pub type EventResultStream = std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{AppState, HttpServerConfig};
    use forge_context::AgentConfig;

    async fn test_state() -> Arc<AppState> {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::from_yaml("agent_id: test\nversion: \"1.0\"\nmodel: { provider: openai, name: gpt-4o }\n").unwrap();
        std::env::set_var("FORGE_MOCK_TOOLS", "1");
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let runner = forge_runtime::Runner::start(config, dir.path().to_path_buf()).await.unwrap();
        Arc::new(AppState::new(HttpServerConfig::default(), runner))
    }

    #[tokio::test]
    async fn send_then_get_round_trips() {
        let state = test_state().await;
        let send = RpcRequest {
            jsonrpc: None,
            method: "tasks/send".into(),
            params: serde_json::json!({"id": "t1", "message": "hello"}),
            id: Value::from(1),
        };
        let result = dispatch(&state, &send).await.unwrap();
        let task: Task = serde_json::from_value(result).unwrap();
        assert_eq!(task.id, "t1");
        assert!(matches!(task.state, TaskState::Completed | TaskState::Failed));

        let get = RpcRequest { jsonrpc: None, method: "tasks/get".into(), params: serde_json::json!({"id": "t1"}), id: Value::from(2) };
        let fetched = dispatch(&state, &get).await.unwrap();
        let fetched_task: Task = serde_json::from_value(fetched).unwrap();
        assert_eq!(fetched_task.id, "t1");
    }

    #[tokio::test]
    async fn get_unknown_task_is_an_error() {
        let state = test_state().await;
        let get = RpcRequest { jsonrpc: None, method: "tasks/get".into(), params: serde_json::json!({"id": "missing"}), id: Value::from(1) };
        let err = dispatch(&state, &get).await.unwrap_err();
        assert_eq!(err.code, RpcError::TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let state = test_state().await;
        let req = RpcRequest { jsonrpc: None, method: "tasks/nope".into(), params: Value::Null, id: Value::from(1) };
        let err = dispatch(&state, &req).await.unwrap_err();
        assert_eq!(err.code, RpcError::METHOD_NOT_FOUND);
    }
}
