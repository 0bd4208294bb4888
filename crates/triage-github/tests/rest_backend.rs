//! REST backend against a local canned-response HTTP server.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use triage_core::{ItemFetcher, ItemRef, RepoId, RepositoryEnumerator, TriageError};
use triage_github::RestClient;

/// (request target prefix, status line, JSON body)
type Route = (&'static str, &'static str, String);

struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn serve(routes: Vec<Route>) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => read += n,
                }
            }
            let head = String::from_utf8_lossy(&buf[..read]).to_string();
            let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
            seen.lock().unwrap().push(head);

            let (status, body) = routes
                .iter()
                .find(|(prefix, _, _)| target.starts_with(prefix))
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or(("404 Not Found", r#"{"message": "Not Found"}"#.to_string()));
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    CannedServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

fn issue(n: u32) -> String {
    format!(r#"{{"number": {n}, "html_url": "https://github.com/kubescape/a/issues/{n}"}}"#)
}

fn pull_as_issue(n: u32) -> String {
    format!(
        r#"{{"number": {n}, "html_url": "https://github.com/kubescape/a/pull/{n}", "pull_request": {{"url": "https://api.github.com/repos/kubescape/a/pulls/{n}"}}}}"#
    )
}

#[tokio::test]
async fn issues_listing_drops_pull_requests() {
    let body = format!("[{}, {}, {}]", issue(1), pull_as_issue(2), issue(3));
    let server = serve(vec![("/repos/kubescape/a/issues", "200 OK", body)]).await;
    let client = RestClient::with_base_url(&server.base_url, Some("t0ken".to_string())).unwrap();

    let items = client
        .fetch_issues(&RepoId::new("kubescape", "a"), 50)
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            ItemRef::from("https://github.com/kubescape/a/issues/1"),
            ItemRef::from("https://github.com/kubescape/a/issues/3"),
        ]
    );

    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "short page ends pagination");
    assert!(requests[0].contains("state=open"));
    assert!(requests[0].contains("per_page=50"));
    assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer t0ken"));
}

#[tokio::test]
async fn pagination_follows_full_pages_up_to_limit() {
    let page1 = format!("[{}, {}, {}]", issue(1), pull_as_issue(10), issue(2));
    let page2 = format!("[{}, {}, {}]", issue(3), issue(4), issue(5));
    let server = serve(vec![
        ("/repos/kubescape/a/issues?state=open&per_page=3&page=1", "200 OK", page1),
        ("/repos/kubescape/a/issues?state=open&per_page=3&page=2", "200 OK", page2),
    ])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let items = client
        .fetch_issues(&RepoId::new("kubescape", "a"), 3)
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            ItemRef::from("https://github.com/kubescape/a/issues/1"),
            ItemRef::from("https://github.com/kubescape/a/issues/2"),
            ItemRef::from("https://github.com/kubescape/a/issues/3"),
        ]
    );
    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 2, "limit reached on the second page");
    assert!(requests[1].contains("page=2"));
}

#[tokio::test]
async fn page_of_only_pull_requests_does_not_end_listing() {
    let page1 = format!("[{}, {}]", pull_as_issue(10), pull_as_issue(11));
    let page2 = format!("[{}]", issue(1));
    let server = serve(vec![
        ("/repos/kubescape/a/issues?state=open&per_page=2&page=1", "200 OK", page1),
        ("/repos/kubescape/a/issues?state=open&per_page=2&page=2", "200 OK", page2),
    ])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let items = client
        .fetch_issues(&RepoId::new("kubescape", "a"), 2)
        .await
        .unwrap();
    assert_eq!(items, vec![ItemRef::from("https://github.com/kubescape/a/issues/1")]);
    assert_eq!(server.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn limit_reached_on_first_page_stops_paging() {
    let page1 = format!("[{}, {}]", issue(1), issue(2));
    let server = serve(vec![(
        "/repos/kubescape/a/issues?state=open&per_page=2&page=1",
        "200 OK",
        page1,
    )])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let items = client
        .fetch_issues(&RepoId::new("kubescape", "a"), 2)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(server.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn issues_disabled_is_empty_success() {
    let server = serve(vec![(
        "/repos/kubescape/b/issues",
        "410 Gone",
        r#"{"message": "Issues are disabled for this repo", "documentation_url": "https://docs.github.com"}"#
            .to_string(),
    )])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let items = client
        .fetch_issues(&RepoId::new("kubescape", "b"), 100)
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn server_error_on_pulls_is_fetch_failure() {
    let server = serve(vec![(
        "/repos/kubescape/a/pulls",
        "502 Bad Gateway",
        r#"{"message": "Server Error"}"#.to_string(),
    )])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let err = client
        .fetch_pulls(&RepoId::new("kubescape", "a"), 100)
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::FetchFailure { .. }));
    assert!(err.to_string().contains("HTTP 502 Bad Gateway: Server Error"));
}

#[tokio::test]
async fn repository_listing_skips_archived_and_private() {
    let body = r#"[
        {"name": "live", "owner": {"login": "kubescape"}, "archived": false, "private": false},
        {"name": "old", "owner": {"login": "kubescape"}, "archived": true, "private": false},
        {"name": "secret", "owner": {"login": "kubescape"}, "archived": false, "private": true}
    ]"#
    .to_string();
    let server = serve(vec![("/orgs/kubescape/repos", "200 OK", body)]).await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let repos = client.list_repositories("kubescape", 1000).await.unwrap();
    assert_eq!(repos, vec![RepoId::new("kubescape", "live")]);
}

#[tokio::test]
async fn unknown_org_is_list_failure() {
    let server = serve(Vec::new()).await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let err = client.list_repositories("nope", 10).await.unwrap_err();
    assert!(matches!(err, TriageError::ListFailure { .. }));
    assert!(err.to_string().contains("404"));

    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("GET /users/nope/repos"));
}

#[tokio::test]
async fn user_owner_falls_back_to_user_repositories() {
    let body = r#"[
        {"name": "dotfiles", "owner": {"login": "octo"}, "archived": false, "private": false},
        {"name": "attic", "owner": {"login": "octo"}, "archived": true, "private": false}
    ]"#
    .to_string();
    let server = serve(vec![("/users/octo/repos", "200 OK", body)]).await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let repos = client.list_repositories("octo", 100).await.unwrap();
    assert_eq!(repos, vec![RepoId::new("octo", "dotfiles")]);

    let requests = server.requests.lock().unwrap();
    assert!(requests[0].starts_with("GET /orgs/octo/repos"));
    assert!(requests[1].contains("type=owner"));
}

#[tokio::test]
async fn org_listing_failure_other_than_not_found_is_not_retried() {
    let server = serve(vec![(
        "/orgs/kubescape/repos",
        "403 Forbidden",
        r#"{"message": "API rate limit exceeded"}"#.to_string(),
    )])
    .await;
    let client = RestClient::with_base_url(&server.base_url, None).unwrap();

    let err = client.list_repositories("kubescape", 10).await.unwrap_err();
    assert!(err.to_string().contains("rate limit"));
    assert_eq!(server.requests.lock().unwrap().len(), 1);
}
