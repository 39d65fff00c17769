use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use saab_core::{ChatClient, ChatRole, Conversation, Error};
use serde_json::Value;

/// Requests seen by the fake server: (accept header, x-clinic header, body).
type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Body that trickles out `pieces` with a short pause between each.
fn trickle(pieces: Vec<&'static str>) -> Body {
    let stream = async_stream::stream! {
        for piece in pieces {
            tokio::time::sleep(Duration::from_millis(5)).await;
            yield Ok::<_, Infallible>(piece);
        }
    };
    Body::from_stream(stream)
}

fn record(seen: &Seen, headers: &HeaderMap, body: Value) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    seen.lock()
        .unwrap()
        .push((header("accept").unwrap_or_default(), header("x-clinic"), body));
}

async fn diagnosis(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&seen, &headers, body);
    let body = trickle(vec![
        "data: {\"token\":\"Based on \"}\n\n",
        "data: {\"tok",
        "en\":\"your symptoms\"}\n\n",
        "data: {broken json\n\n",
        ": comment line\n",
        "data: {\"token\":\"\",\"state\":{\"depth\":1,\"asked_symptoms\":[\"chills\"]}}\n\n",
        "data: {\"token\":\" (unterminated)\"}",
    ]);
    ([("content-type", "text/event-stream")], body).into_response()
}

async fn failing(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&seen, &headers, body);
    (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded").into_response()
}

fn router(seen: &Seen) -> Router {
    Router::new()
        .route("/chat", post(diagnosis))
        .route("/api/chat", post(diagnosis))
        .route("/broken/chat", post(failing))
        .with_state(Arc::clone(seen))
}

#[tokio::test]
async fn test_full_turn_renders_tokens_and_swaps_state() {
    let seen: Seen = Arc::default();
    let base = serve(router(&seen)).await;

    let mut headers = BTreeMap::new();
    headers.insert("X-Clinic".to_string(), "north".to_string());
    let client = ChatClient::with_headers(&base, &headers).unwrap();

    let mut conversation = Conversation::default().with_greeting("Good Evening.");
    let request = conversation.begin_turn("fever and chills").unwrap();
    assert!(conversation.is_loading());

    let outcome = client
        .drive_turn(&request, |chunk| {
            conversation.apply_chunk(chunk);
        })
        .await;
    assert!(outcome.is_ok());
    conversation.finish_turn(outcome);

    assert!(!conversation.is_loading());
    let messages = conversation.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, ChatRole::User);
    assert_eq!(messages[2].role, ChatRole::System);
    assert_eq!(messages[2].text, "Based on your symptoms");

    let state = conversation.state();
    assert!(!state.is_initial_prompt());
    assert_eq!(state.get("depth"), Some(&Value::from(1)));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (accept, clinic, body) = &seen[0];
    assert_eq!(accept, "text/event-stream");
    assert_eq!(clinic.as_deref(), Some("north"));
    assert_eq!(body["message"], "fever and chills");
    assert_eq!(body["state"]["is_initail_prompt"], true);
    assert_eq!(body["state"]["max_depth"], 5);
}

#[tokio::test]
async fn test_open_stream_surfaces_malformed_lines_without_stopping() {
    let seen: Seen = Arc::default();
    let base = serve(router(&seen)).await;
    let client = ChatClient::new(format!("{base}/api")).unwrap();

    let mut conversation = Conversation::default();
    let request = conversation.begin_turn("headache").unwrap();

    let stream = client.open_stream(&request).await.unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 4);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    assert!(matches!(&items[2], Err(e) if e.is_malformed_chunk()));
    let last = items[3].as_ref().unwrap();
    assert!(last.state.is_some());
}

#[tokio::test]
async fn test_error_status_fails_turn_quietly() {
    let seen: Seen = Arc::default();
    let base = serve(router(&seen)).await;
    let client = ChatClient::new(format!("{base}/broken")).unwrap();

    let mut conversation = Conversation::default();
    let request = conversation.begin_turn("dizzy").unwrap();

    let mut chunks = 0;
    let outcome = client.drive_turn(&request, |_| chunks += 1).await;
    assert_eq!(chunks, 0);
    match &outcome {
        Err(Error::Api { status, message }) => {
            assert_eq!(*status, 500);
            assert_eq!(message, "model not loaded");
        }
        other => panic!("expected API error, got {other:?}"),
    }

    conversation.finish_turn(outcome);
    assert!(!conversation.is_loading());
    assert_eq!(conversation.messages().last().unwrap().text, "");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatClient::new(format!("http://{addr}")).unwrap();
    let mut conversation = Conversation::default();
    let request = conversation.begin_turn("nausea").unwrap();

    let outcome = client.drive_turn(&request, |_| {}).await;
    assert!(matches!(outcome, Err(Error::Http(_))));
    conversation.finish_turn(outcome);
    assert!(!conversation.is_loading());
}
