//! Request pipeline against a local scripted server: retries, redirects,
//! authentication headers and streamed bodies.

mod common;

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::mock_server::{MockResponse, MockServer};
use courier_core::error::status_of;
use courier_core::{ClientDetails, HttpClient, Method, Request};

fn client(retries: u32) -> HttpClient {
    HttpClient::builder()
        .retries(retries)
        .retry_interval_ms(0)
        .build()
        .unwrap()
}

#[test]
fn retries_service_unavailable_until_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let server = MockServer::start(move |_| match seen.fetch_add(1, Ordering::SeqCst) {
        0 | 1 => MockResponse::new(503).body("busy"),
        _ => MockResponse::new(200).body("ready"),
    });

    let resp = client(2)
        .send_get(&server.url("api/ping"), true, &ClientDetails::default())
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "ready");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn exhausted_retries_report_last_status() {
    let server = MockServer::start(|_| MockResponse::new(503).body("still busy"));
    let err = client(2)
        .send_get(&server.url("api/ping"), true, &ClientDetails::default())
        .unwrap_err();
    assert_eq!(status_of(&err), Some(503));
    assert_eq!(server.count("GET", "/api/ping"), 3);
}

#[test]
fn client_errors_are_returned_without_retry() {
    let server = MockServer::start(|_| MockResponse::new(404).body("no such repo"));
    let resp = client(3)
        .send_get(&server.url("api/repositories/x"), true, &ClientDetails::default())
        .unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_text(), "no such repo");
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn transport_failure_is_retried_then_reported() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/gone", listener.local_addr().unwrap());
    drop(listener);
    let err = client(1).send_get(&url, true, &ClientDetails::default()).unwrap_err();
    assert!(err.to_string().contains("GET"));
}

#[test]
fn post_redirect_is_replayed_as_post_with_same_body() {
    let server = MockServer::start(|req| match req.path.as_str() {
        "/api/old" => MockResponse::new(307).header("Location", "/api/new"),
        "/api/new" => MockResponse::new(200).body(format!("got {}", String::from_utf8_lossy(&req.body))),
        _ => MockResponse::new(404),
    });

    let resp = client(0)
        .send_post(&server.url("api/old"), b"{\"k\":1}", &ClientDetails::default())
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "got {\"k\":1}");

    let replayed: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.path == "/api/new")
        .collect();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].method, "POST");
    assert_eq!(replayed[0].body, b"{\"k\":1}");
}

#[test]
fn get_follows_redirects_unless_told_not_to() {
    let server = MockServer::start(|req| match req.path.as_str() {
        "/a" => MockResponse::new(302).header("Location", "/b"),
        "/b" => MockResponse::new(200).body("target"),
        _ => MockResponse::new(404),
    });
    let c = client(0);

    let followed = c.send_get(&server.url("a"), true, &ClientDetails::default()).unwrap();
    assert_eq!(followed.status, 200);
    assert_eq!(followed.body_text(), "target");

    let not_followed = c.send_get(&server.url("a"), false, &ClientDetails::default()).unwrap();
    assert_eq!(not_followed.status, 302);
    assert_eq!(not_followed.redirect_url.as_deref(), Some(server.url("b").as_str()));
}

#[test]
fn credentials_become_headers() {
    let server = MockServer::start(|_| MockResponse::new(200));
    let c = client(0);

    c.send_get(&server.url("basic"), true, &ClientDetails::with_basic("admin", "password"))
        .unwrap();
    c.send_get(&server.url("bearer"), true, &ClientDetails::with_access_token("tok"))
        .unwrap();
    let api_key = ClientDetails {
        api_key: "AKC123".into(),
        ..ClientDetails::default()
    };
    c.send_get(&server.url("apikey"), true, &api_key).unwrap();

    let reqs = server.requests();
    let find = |p: &str| reqs.iter().find(|r| r.path == p).unwrap().clone();
    assert_eq!(find("/basic").header("Authorization"), Some("Basic YWRtaW46cGFzc3dvcmQ="));
    assert_eq!(find("/bearer").header("Authorization"), Some("Bearer tok"));
    assert_eq!(find("/apikey").header("X-JFrog-Art-Api"), Some("AKC123"));
    assert!(find("/basic").header("User-Agent").unwrap().starts_with("courier/"));
}

#[test]
fn every_verb_reaches_the_server() {
    let server = MockServer::start(|req| MockResponse::new(200).body(req.method.clone()));
    let c = client(0);
    let d = ClientDetails::default();
    let url = server.url("api/thing");

    assert_eq!(c.send_put(&url, b"p", &d).unwrap().body_text(), "PUT");
    assert_eq!(c.send_patch(&url, b"p", &d).unwrap().body_text(), "PATCH");
    assert_eq!(c.send_delete(&url, None, &d).unwrap().body_text(), "DELETE");
    assert_eq!(c.send_head(&url, &d).unwrap().status, 200);

    let reqs = server.requests();
    let put = reqs.iter().find(|r| r.method == "PUT").unwrap();
    assert_eq!(put.body, b"p");
    assert!(reqs.iter().any(|r| r.method == "HEAD"));
}

#[test]
fn request_headers_are_sent() {
    let server = MockServer::start(|_| MockResponse::new(200));
    let req = Request::new(Method::Get, server.url("h")).header("X-Custom", "yes");
    client(0).execute(&req, true, &ClientDetails::default()).unwrap();
    assert_eq!(server.requests()[0].header("X-Custom"), Some("yes"));
}

#[test]
fn read_remote_file_leaves_body_open() {
    let server = MockServer::start(|req| match req.path.as_str() {
        "/file.txt" => MockResponse::new(200).body("streamed content"),
        _ => MockResponse::new(404).body("missing"),
    });
    let c = client(0);

    let mut resp = c.read_remote_file(&server.url("file.txt"), &ClientDetails::default()).unwrap();
    assert_eq!(resp.status, 200);
    let mut text = String::new();
    resp.take_stream().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "streamed content");

    let missing = c.read_remote_file(&server.url("nope"), &ClientDetails::default()).unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body_text(), "missing");
}
