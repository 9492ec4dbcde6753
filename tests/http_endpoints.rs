//! REST surface end to end: reqwest → gateway → scripted backend.

mod common;

use std::time::{Duration, Instant};

use common::{config_for, http_client, start_backend, start_gateway, unreachable_addr, Script};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const OK: &str = r#"{"status":"ok"}"#;

#[tokio::test]
async fn health_answers_without_touching_the_backend() {
    let backend = start_backend(|_| Script::Line(OK.into())).await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .get(format!("{}/health", gateway.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(backend.accepted(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_refused_before_the_handler() {
    let backend = start_backend(|_| Script::Line(OK.into())).await;
    let mut config = config_for(backend.addr);
    config.security.max_body_size = 64;
    let gateway = start_gateway(config).await;

    let res = http_client()
        .post(format!("{}/private", gateway.base_url))
        .json(&json!({"sender": "ana", "recipient": "beto", "message": "x".repeat(200)}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(backend.accepted(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn reads_degrade_to_empty_lists_when_backend_is_down() {
    let gateway = start_gateway(config_for(unreachable_addr().await)).await;
    let client = http_client();

    for path in ["/users", "/groups", "/group/unos", "/private/ana/beto"] {
        let res = client
            .get(format!("{}{path}", gateway.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        assert_eq!(res.json::<Value>().await.unwrap(), json!([]), "{path}");
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn reads_degrade_to_empty_lists_on_refusal_or_bad_shape() {
    let backend = start_backend(|req| match req["action"].as_str() {
        Some("9") => Script::Line(r#"{"status":"error","message":"nope"}"#.into()),
        Some("10") => Script::Line(r#"{"status":"ok","groups":"not a list"}"#.into()),
        _ => Script::Line("garbage".into()),
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;
    let client = http_client();

    for path in ["/users", "/groups", "/group/unos"] {
        let res = client
            .get(format!("{}{path}", gateway.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        assert_eq!(res.json::<Value>().await.unwrap(), json!([]), "{path}");
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn users_and_groups_are_listed() {
    let backend = start_backend(|req| match req["action"].as_str() {
        Some("9") => Script::Line(r#"{"status":"ok","users":["ana","beto"]}"#.into()),
        _ => Script::Line(
            r#"{"status":"ok","groups":[{"name":"unos","members":["ana"]},"dos"]}"#.into(),
        ),
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;
    let client = http_client();

    let users: Value = client
        .get(format!("{}/users", gateway.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users, json!(["ana", "beto"]));

    let groups: Value = client
        .get(format!("{}/groups", gateway.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        groups,
        json!([
            {"name": "unos", "members": ["ana"]},
            {"name": "dos", "members": []}
        ])
    );

    backend.wait_all_closed().await;
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn incomplete_writes_are_rejected_without_a_backend_call() {
    let backend = start_backend(|_| Script::Line(OK.into())).await;
    let gateway = start_gateway(config_for(backend.addr)).await;
    let client = http_client();

    let cases = [
        ("/register", json!({"username": "ana"})),
        ("/register", json!({"username": "  ", "sessionId": "s1"})),
        ("/groups", json!({"groupName": "unos"})),
        ("/groups", json!({"groupName": "unos", "users": []})),
        ("/groups", json!({"groupName": "unos", "users": " , "})),
        ("/private", json!({"sender": "ana", "message": "hola"})),
        ("/group", json!({"sender": "ana", "groupName": "unos"})),
        ("/private", json!({"sender": "ana", "recipient": 5, "message": "hola"})),
        ("/groups", json!({"groupName": "unos", "users": [1, 2]})),
        ("/register", json!({"username": ["ana"], "sessionId": "s1"})),
    ];

    for (path, body) in cases {
        let res = client
            .post(format!("{}{path}", gateway.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path} {body}");
        let err: Value = res.json().await.unwrap();
        assert!(err["error"].is_string(), "{path} {body}");
    }

    assert_eq!(backend.accepted(), 0);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn create_group_sends_joined_members_and_echoes_reply() {
    let backend = start_backend(|_| {
        Script::Line(r#"{"status":"ok","groupName":"unos","members":["ana","beto"],"invalidUsers":["zed"]}"#.into())
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .post(format!("{}/groups", gateway.base_url))
        .header("x-username", "ana")
        .json(&json!({"groupName": "unos", "users": ["ana", "beto", "zed"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["invalidUsers"], json!(["zed"]));

    let sent = &backend.requests()[0];
    assert_eq!(sent["action"], "2");
    assert_eq!(sent["currentUser"], "ana");
    assert_eq!(sent["data"], json!({"groupName": "unos", "users": "ana,beto,zed"}));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn backend_refusal_is_a_client_error_with_its_message() {
    let backend = start_backend(|_| {
        Script::Line(r#"{"status":"error","message":"No valid users","invalidUsers":["zed"]}"#.into())
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .post(format!("{}/groups", gateway.base_url))
        .json(&json!({"groupName": "unos", "users": "zed"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No valid users");
    assert_eq!(body["invalidUsers"], json!(["zed"]));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn register_requires_an_ok_status() {
    let backend = start_backend(|_| Script::Line("Welcome!".into())).await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .post(format!("{}/register", gateway.base_url))
        .json(&json!({"username": "ana", "sessionId": "s1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn writes_fail_with_server_error_when_backend_is_down() {
    let gateway = start_gateway(config_for(unreachable_addr().await)).await;

    let res = http_client()
        .post(format!("{}/private", gateway.base_url))
        .json(&json!({"sender": "ana", "recipient": "beto", "message": "hola"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("backend"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn writes_fail_with_server_error_when_backend_is_silent() {
    let backend = start_backend(|_| Script::Hang).await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .post(format!("{}/group", gateway.base_url))
        .json(&json!({"sender": "ana", "groupName": "unos", "message": "hola"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    backend.wait_all_closed().await;
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn client_disconnect_abandons_the_backend_call() {
    let backend = start_backend(|_| Script::Hang).await;
    let mut config = config_for(backend.addr);
    config.timeouts.call_secs = 20;
    config.timeouts.request_secs = 30;
    let gateway = start_gateway(config).await;

    let body = r#"{"sender":"ana","recipient":"beto","message":"hola"}"#;
    let request = format!(
        "POST /private HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let mut client = TcpStream::connect(gateway.addr).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();

    backend.wait_accepted(1).await;
    let start = Instant::now();
    drop(client);

    // Far sooner than the call deadline.
    backend.wait_all_closed().await;
    assert!(start.elapsed() < Duration::from_secs(5));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_cancels_in_flight_calls() {
    let backend = start_backend(|_| Script::Hang).await;
    let mut config = config_for(backend.addr);
    config.timeouts.call_secs = 20;
    config.timeouts.request_secs = 30;
    let gateway = start_gateway(config).await;

    let url = format!("{}/private", gateway.base_url);
    let pending = tokio::spawn(async move {
        http_client()
            .post(url)
            .json(&json!({"sender": "ana", "recipient": "beto", "message": "hola"}))
            .send()
            .await
    });

    backend.wait_accepted(1).await;
    gateway.shutdown.trigger();

    let res = pending.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    backend.wait_all_closed().await;
}

#[tokio::test]
async fn delete_group_uses_path_name() {
    let backend = start_backend(|_| Script::Line(OK.into())).await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let res = http_client()
        .delete(format!("{}/groups/unos", gateway.base_url))
        .header("x-username", "ana")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let sent = &backend.requests()[0];
    assert_eq!(sent["action"], "4");
    assert_eq!(sent["currentUser"], "ana");
    assert_eq!(sent["data"], json!({"groupName": "unos"}));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn private_history_is_parsed_and_attributed_to_path_user() {
    let backend = start_backend(|_| {
        Script::Line(
            json!({
                "status": "ok",
                "history": [
                    "[2024-05-01 10:00] ana->beto: hola: que tal",
                    "beto->ana:bien",
                    {"sender": "ana", "message": "ok", "timestamp": "t3"},
                    "just text"
                ]
            })
            .to_string(),
        )
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let records: Value = http_client()
        .get(format!("{}/private/ana/beto", gateway.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        records,
        json!([
            {"sender": "ana", "content": "hola: que tal", "timestamp": "2024-05-01 10:00"},
            {"sender": "unknown", "content": "beto->ana:bien", "timestamp": ""},
            {"sender": "ana", "content": "ok", "timestamp": "t3"},
            {"sender": "unknown", "content": "just text", "timestamp": ""}
        ])
    );

    let sent = &backend.requests()[0];
    assert_eq!(sent["action"], "7");
    assert_eq!(sent["currentUser"], "ana");
    assert_eq!(sent["data"], json!({"currentUser": "ana", "user": "beto"}));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn group_history_is_parsed() {
    let backend = start_backend(|_| {
        Script::Line(
            json!({
                "status": "ok",
                "history": ["[10:00] ana en unos: hola a todos"]
            })
            .to_string(),
        )
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;

    let records: Value = http_client()
        .get(format!("{}/group/unos?username=beto", gateway.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        records,
        json!([{"sender": "ana", "content": "hola a todos", "timestamp": "10:00"}])
    );
    let sent = &backend.requests()[0];
    assert_eq!(sent["action"], "8");
    assert_eq!(sent["currentUser"], "beto");
    assert_eq!(sent["data"], json!({"groupName": "unos"}));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn concurrent_requests_are_attributed_to_their_own_caller() {
    let backend = start_backend(|req| {
        let delay = match req["action"].as_str() {
            Some("0") => 200,
            _ => 20,
        };
        Script::Delayed(Duration::from_millis(delay), r#"{"status":"ok","users":[]}"#.into())
    })
    .await;
    let gateway = start_gateway(config_for(backend.addr)).await;
    let client = http_client();

    let register = |name: &'static str| {
        let client = client.clone();
        let url = format!("{}/register", gateway.base_url);
        async move {
            client
                .post(url)
                .json(&json!({"username": name, "sessionId": format!("s-{name}")}))
                .send()
                .await
                .unwrap()
                .status()
        }
    };
    let users = {
        let client = client.clone();
        let url = format!("{}/users", gateway.base_url);
        async move {
            client
                .get(url)
                .header("x-username", "carla")
                .send()
                .await
                .unwrap()
                .status()
        }
    };

    let (a, b, c) = tokio::join!(register("ana"), register("beto"), users);
    assert_eq!(a, StatusCode::OK);
    assert_eq!(b, StatusCode::OK);
    assert_eq!(c, StatusCode::OK);

    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    for req in requests {
        match req["action"].as_str() {
            Some("0") => assert_eq!(req["currentUser"], req["data"]["username"]),
            Some("9") => assert_eq!(req["currentUser"], "carla"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn reloaded_config_points_at_new_backend() {
    let first = start_backend(|_| Script::Line(r#"{"status":"ok","users":["first"]}"#.into())).await;
    let second = start_backend(|_| Script::Line(r#"{"status":"ok","users":["second"]}"#.into())).await;
    let gateway = start_gateway(config_for(first.addr)).await;
    let client = http_client();
    let url = format!("{}/users", gateway.base_url);

    let users: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(users, json!(["first"]));

    gateway.config_tx.send(config_for(second.addr)).unwrap();

    // The reload is applied by a background task.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let users: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        if users == json!(["second"]) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "reload never applied");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    gateway.shutdown.trigger();
}
