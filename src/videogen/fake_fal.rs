//! Local stand-ins for the fal.ai endpoints, driven by scripted replies.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        Message,
    },
};

/// How long a finished script waits to see what the caller does next
const CALLER_GRACE: Duration = Duration::from_secs(3);

pub enum Step {
    Send(Value),
    Pause(Duration),
    /// Drop the connection without a closing handshake
    HangUp,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CallerEnd {
    /// Caller closed or dropped the connection
    Disconnected,
    /// Caller kept the connection open past the grace period
    StillOpen,
    HungUp,
}

pub struct Session {
    pub authorization: Option<String>,
    pub request: Value,
    pub caller_end: CallerEnd,
}

/// Accepts one websocket session per script, in order
pub async fn spawn_ws_provider(scripts: Vec<Vec<Step>>) -> (String, JoinHandle<Vec<Session>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut sessions = Vec::new();
        for script in scripts {
            let (tcp, _) = listener.accept().await.unwrap();
            sessions.push(run_session(tcp, script).await);
        }
        sessions
    });

    (url, handle)
}

async fn run_session(tcp: TcpStream, script: Vec<Step>) -> Session {
    let mut authorization = None;
    let mut socket = accept_hdr_async(tcp, |req: &Request, res: Response| {
        authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(res)
    })
    .await
    .unwrap();

    let request = socket.next().await.unwrap().unwrap();
    let request: Value = serde_json::from_str(request.to_text().unwrap()).unwrap();

    let mut session = Session {
        authorization,
        request,
        caller_end: CallerEnd::Disconnected,
    };

    for step in script {
        match step {
            Step::Send(message) => {
                if socket
                    .send(Message::Text(message.to_string().into()))
                    .await
                    .is_err()
                {
                    return session;
                }
            }
            Step::Pause(delay) => tokio::time::sleep(delay).await,
            Step::HangUp => {
                session.caller_end = CallerEnd::HungUp;
                return session;
            }
        }
    }

    session.caller_end = match tokio::time::timeout(CALLER_GRACE, socket.next()).await {
        Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => CallerEnd::Disconnected,
        Ok(Some(Ok(_))) | Err(_) => CallerEnd::StillOpen,
    };
    session
}

/// What the HTTP endpoint received: the credential header and the JSON body
pub type HttpCalls = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Answers every POST with `status` and `body` after `delay`
pub async fn spawn_http_provider(
    status: StatusCode,
    body: Value,
    delay: Duration,
) -> (String, HttpCalls) {
    let calls: HttpCalls = Arc::default();
    let seen = calls.clone();

    let app = Router::new().route(
        "/",
        post(move |headers: HeaderMap, Json(payload): Json<Value>| {
            let seen = seen.clone();
            let body = body.clone();
            async move {
                let authorization = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.lock().unwrap().push((authorization, payload));
                tokio::time::sleep(delay).await;
                (status, Json(body))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (url, calls)
}
