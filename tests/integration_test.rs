// Integration tests for the music API client
//
// These tests run the client against a local mock server and count the
// network calls made for each refresh scenario.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use music_client::{
    api::MusicApi,
    auth::{
        MemoryTokenStore, RefreshOutcome, Session, SessionState, SessionToken, TokenStore,
        AUTH_TOKEN_KEY, REFRESH_PATH, REFRESH_TOKEN_KEY,
    },
    error::ApiError,
    http_client::ApiHttpClient,
    models::request::RequestDescriptor,
    models::song::SongUpload,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

struct Harness {
    server: ServerGuard,
    store: Arc<MemoryTokenStore>,
    session: Arc<Session>,
    client: Arc<ApiHttpClient>,
}

/// Client wired to a fresh mock server, with `token` pre-stored if given
async fn harness(token: Option<&str>) -> Harness {
    let server = Server::new_async().await;

    let store = Arc::new(MemoryTokenStore::new());
    if let Some(t) = token {
        store.save(AUTH_TOKEN_KEY, t).unwrap();
    }
    let session = Arc::new(Session::load(store.clone()).unwrap());

    let client = Arc::new(
        ApiHttpClient::new(&format!("{}/api", server.url()), session.clone(), 5, 10)
            .expect("Failed to create HTTP client"),
    );

    Harness {
        server,
        store,
        session,
        client,
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

// ==================================================================================================
// Non-401 responses: one call, no refresh
// ==================================================================================================

#[tokio::test]
async fn test_success_makes_single_call() {
    // Scenario A
    let mut h = harness(Some("old")).await;

    let songs = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("old").as_str())
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .expect(0)
        .create_async()
        .await;

    let response = assert_ok!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert_eq!(response.status().as_u16(), 200);

    songs.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(h.session.token().await, Some(SessionToken::new("old")));
    assert_eq!(h.store.load(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("old"));
}

#[tokio::test]
async fn test_other_failures_are_returned_unchanged() {
    for status in [400usize, 403, 404, 500, 503] {
        let mut h = harness(Some("old")).await;

        let song = h
            .server
            .mock("DELETE", "/api/songs/s1")
            .with_status(status)
            .with_body("nope")
            .expect(1)
            .create_async()
            .await;
        let refresh = h
            .server
            .mock("POST", "/api/users/refresh-token")
            .expect(0)
            .create_async()
            .await;

        let err = assert_err!(
            h.client
                .execute(&RequestDescriptor::delete("/songs/s1"))
                .await
        );
        match err {
            ApiError::Http { status: got, message } => {
                assert_eq!(got as usize, status);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        song.assert_async().await;
        refresh.assert_async().await;
        assert!(h.session.is_authenticated().await);
    }
}

// ==================================================================================================
// 401 followed by a successful refresh: three calls
// ==================================================================================================

#[tokio::test]
async fn test_refresh_then_replay() {
    // Scenario B
    let mut h = harness(Some("old")).await;

    let expired = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("old").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .match_header("authorization", bearer("old").as_str())
        .with_status(200)
        .with_body(json!({"token": "new"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let replay = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("new").as_str())
        .with_status(200)
        .with_body(r#"[{"id":"1","title":"One"}]"#)
        .expect(1)
        .create_async()
        .await;

    let response = assert_ok!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert_eq!(response.text(), r#"[{"id":"1","title":"One"}]"#);

    expired.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
    assert_eq!(h.session.token().await, Some(SessionToken::new("new")));
    assert_eq!(h.store.load(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn test_failed_replay_is_returned_without_another_refresh() {
    let mut h = harness(Some("old")).await;

    let _expired = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("old").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_body(json!({"token": "new"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let replay = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("new").as_str())
        .with_status(500)
        .with_body("server error")
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(matches!(err, ApiError::Http { status: 500, .. }));

    refresh.assert_async().await;
    replay.assert_async().await;
    assert!(h.session.is_authenticated().await);
}

#[tokio::test]
async fn test_replay_401_does_not_loop() {
    let mut h = harness(Some("old")).await;

    let _expired = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("old").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_body(json!({"token": "new"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let replay = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("new").as_str())
        .with_status(401)
        .with_body("still expired")
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(matches!(err, ApiError::AuthExpired { ref message } if message == "still expired"));

    refresh.assert_async().await;
    replay.assert_async().await;
    // The refresh itself succeeded, so the session keeps the new token
    assert_eq!(h.session.token().await, Some(SessionToken::new("new")));
}

// ==================================================================================================
// 401 followed by a failed refresh: two calls, logout
// ==================================================================================================

#[tokio::test]
async fn test_refresh_without_token_logs_out() {
    // Scenario C
    let mut h = harness(Some("old")).await;
    let mut state = h.session.subscribe();

    let expired = h
        .server
        .mock("GET", "/api/songs")
        .with_status(401)
        .with_body("jwt expired")
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_body(json!({"message": "no token for you"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(matches!(err, ApiError::AuthExpired { ref message } if message == "jwt expired"));

    expired.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(h.session.token().await, None);
    assert_eq!(h.store.load(AUTH_TOKEN_KEY).unwrap(), None);

    assert_ok!(state.changed().await);
    assert_eq!(*state.borrow(), SessionState::LoggedOut);
}

#[tokio::test]
async fn test_refresh_401_is_not_refreshed_again() {
    let mut h = harness(Some("old")).await;

    let expired = h
        .server
        .mock("GET", "/api/songs")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(matches!(err, ApiError::AuthExpired { .. }));

    expired.assert_async().await;
    refresh.assert_async().await;
    assert!(!h.session.is_authenticated().await);
}

#[tokio::test]
async fn test_refresh_transport_failure_keeps_session() {
    let mut server = Server::new_async().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.save(AUTH_TOKEN_KEY, "old").unwrap();
    let session = Arc::new(Session::load(store.clone()).unwrap());
    // One second budget per request; the refresh body below never arrives in time
    let client =
        ApiHttpClient::new(&format!("{}/api", server.url()), session.clone(), 1, 1).unwrap();

    let expired = server
        .mock("GET", "/api/songs")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_secs(3));
            w.write_all(br#"{"token":"new"}"#)
        })
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("new").as_str())
        .expect(0)
        .create_async()
        .await;

    let err = assert_err!(client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(matches!(err, ApiError::Transport(_)), "got {:?}", err);

    expired.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
    assert_eq!(session.token().await, Some(SessionToken::new("old")));
    assert_eq!(store.load(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("old"));
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_refresh_endpoint_401_is_not_refreshed() {
    let mut h = harness(Some("old")).await;

    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(401)
        .with_body("expired")
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(
        h.client
            .execute(&RequestDescriptor::post(REFRESH_PATH))
            .await
    );
    assert!(matches!(err, ApiError::AuthExpired { .. }));

    refresh.assert_async().await;
    assert_eq!(h.session.token().await, Some(SessionToken::new("old")));
}

#[tokio::test]
async fn test_anonymous_401_logs_out_once() {
    // Scenario D
    let mut h = harness(None).await;

    let expired = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .match_header("authorization", Matcher::Missing)
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let err = assert_err!(h.client.execute(&RequestDescriptor::get("/songs")).await);
    assert!(err.is_auth_failure());

    expired.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(h.session.state(), SessionState::LoggedOut);
}

// ==================================================================================================
// Concurrent 401s share one refresh
// ==================================================================================================

#[tokio::test]
async fn test_concurrent_401s_refresh_once() {
    let mut h = harness(Some("old")).await;

    let _expired = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("old").as_str())
        .with_status(401)
        .expect_at_least(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_body(json!({"token": "new"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let fresh = h
        .server
        .mock("GET", "/api/songs")
        .match_header("authorization", bearer("new").as_str())
        .with_status(200)
        .with_body("[]")
        .expect(2)
        .create_async()
        .await;

    let first = RequestDescriptor::get("/songs");
    let second = RequestDescriptor::get("/songs");
    let (a, b) = tokio::join!(h.client.execute(&first), h.client.execute(&second));
    assert_ok!(a);
    assert_ok!(b);

    refresh.assert_async().await;
    fresh.assert_async().await;
}

// ==================================================================================================
// Refresh credential transport
// ==================================================================================================

#[tokio::test]
async fn test_login_then_refresh_sends_refresh_token() {
    let mut h = harness(None).await;
    let api = MusicApi::new(h.client.clone());

    let login = h
        .server
        .mock("POST", "/api/users/login")
        .match_body(Matcher::Json(json!({"email": "a@b.c", "password": "pw"})))
        .with_status(200)
        .with_body(json!({"token": "t1", "refreshToken": "r1"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .match_header("authorization", bearer("t1").as_str())
        .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
        .with_status(200)
        .with_body(json!({"token": "t2", "refreshToken": "r2"}).to_string())
        .expect(1)
        .create_async()
        .await;

    assert_ok!(api.login("a@b.c", "pw").await);
    assert_eq!(h.store.load(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("t1"));
    assert_eq!(h.store.load(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));

    let outcome = assert_ok!(api.refresh_token().await);
    assert_eq!(outcome, RefreshOutcome::Refreshed(SessionToken::new("t2")));
    assert_eq!(h.store.load(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));

    login.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_explicit_refresh_denied_logs_out() {
    let mut h = harness(Some("old")).await;
    let api = MusicApi::new(h.client.clone());

    let _refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let outcome = assert_ok!(api.refresh_token().await);
    assert_eq!(outcome, RefreshOutcome::Denied);
    assert!(!api.session().is_authenticated().await);
}

// ==================================================================================================
// Typed endpoints
// ==================================================================================================

#[tokio::test]
async fn test_fetch_songs_accepts_wrapped_list() {
    let mut h = harness(Some("t")).await;
    let api = MusicApi::new(h.client.clone());

    let _songs = h
        .server
        .mock("GET", "/api/songs")
        .with_status(200)
        .with_body(
            json!({"data": [
                {"_id": "a", "title": "First", "artist": "X", "songUrl": "http://cdn/a.mp3"},
                {"_id": "b", "title": "Second", "artist": "Y", "songUrl": "http://cdn/b.mp3"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let songs = assert_ok!(api.fetch_songs().await);
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[1].id(), Some("b"));
    assert_eq!(songs[1].song_url, "http://cdn/b.mp3");
}

#[tokio::test]
async fn test_album_and_song_actions_hit_expected_paths() {
    let mut h = harness(Some("t")).await;
    let api = MusicApi::new(h.client.clone());

    let album = h
        .server
        .mock("GET", "/api/songs/album/al%201")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let like = h
        .server
        .mock("POST", "/api/songs/s1/like")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let dislike = h
        .server
        .mock("POST", "/api/songs/s1/dislike")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let delete = h
        .server
        .mock("DELETE", "/api/songs/s1")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    assert!(assert_ok!(api.fetch_songs_in_album("al 1").await).is_empty());
    assert_ok!(api.like_song("s1").await);
    assert_ok!(api.dislike_song("s1").await);
    assert_ok!(api.delete_song("s1").await);

    album.assert_async().await;
    like.assert_async().await;
    dislike.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_upload_is_replayed_after_refresh() {
    let mut h = harness(Some("old")).await;
    let api = MusicApi::new(h.client.clone());

    let _expired = h
        .server
        .mock("POST", "/api/songs/upload")
        .match_header("authorization", bearer("old").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let _refresh = h
        .server
        .mock("POST", "/api/users/refresh-token")
        .with_status(200)
        .with_body(json!({"token": "new"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let upload = h
        .server
        .mock("POST", "/api/songs/upload")
        .match_header("authorization", bearer("new").as_str())
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data".to_string()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file"; filename="song.mp3""#.to_string()),
            Matcher::Regex("ID3-audio".to_string()),
            Matcher::Regex(r#"name="title""#.to_string()),
        ]))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let song = SongUpload {
        file_name: "song.mp3".to_string(),
        bytes: bytes::Bytes::from_static(b"ID3-audio"),
        title: Some("My Song".to_string()),
        artist: None,
        album_id: None,
    };
    assert_ok!(api.upload_song(song).await);

    upload.assert_async().await;
}

#[tokio::test]
async fn test_logout_clears_session() {
    let h = harness(Some("t")).await;
    let api = MusicApi::new(h.client.clone());

    api.logout().await;

    assert!(!api.session().is_authenticated().await);
    assert_eq!(h.store.load(AUTH_TOKEN_KEY).unwrap(), None);
}
