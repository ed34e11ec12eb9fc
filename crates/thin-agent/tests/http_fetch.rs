use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use thin_agent::Envelope;
use thin_agent::tools::{build_client, fetch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Client {
    build_client(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_json_body_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/google"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "login": "google", "public_repos": 2700 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let envelope = fetch(&client(), &format!("{}/users/google", server.uri())).await;
    assert_eq!(
        envelope,
        Envelope::http_ok(200, json!({ "login": "google", "public_repos": 2700 }))
    );
}

#[tokio::test]
async fn test_text_body_is_returned_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\n"))
        .mount(&server)
        .await;

    let envelope = fetch(&client(), &format!("{}/robots.txt", server.uri())).await;
    assert!(envelope.success);
    assert_eq!(envelope.status_code, Some(200));
    assert_eq!(envelope.data, Some(json!("User-agent: *\n")));
}

#[tokio::test]
async fn test_other_success_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let envelope = fetch(&client(), &server.uri()).await;
    assert!(envelope.success);
    assert_eq!(envelope.status_code, Some(204));
    assert_eq!(envelope.data, Some(json!("")));
}

#[tokio::test]
async fn test_rejection_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let envelope = fetch(&client(), &format!("{}/missing", server.uri())).await;
    assert_eq!(envelope, Envelope::http_rejected(404));
    assert_eq!(
        envelope.to_tool_output(),
        r#"{"success":false,"status_code":404,"error":"Request failed with status code 404"}"#
    );
}

#[tokio::test]
async fn test_unreachable_host_has_no_status() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let envelope = fetch(&client(), &format!("http://127.0.0.1:{port}/")).await;
    assert!(!envelope.success);
    assert_eq!(envelope.status_code, None);
    assert_eq!(envelope.data, None);
    assert!(envelope.error.unwrap().starts_with("Request failed: "));
}

#[tokio::test]
async fn test_invalid_url() {
    let envelope = fetch(&client(), "not a url").await;
    assert!(!envelope.success);
    assert_eq!(envelope.status_code, None);
    assert!(envelope.error.unwrap().starts_with("Request failed: "));
}

#[tokio::test]
#[ignore = "needs network access"]
async fn test_github_user() {
    let envelope = fetch(&client(), "https://api.github.com/users/google").await;
    assert!(envelope.success);
    assert_eq!(envelope.status_code, Some(200));
    assert_eq!(envelope.data.unwrap()["login"], "google");
}
