mod common;

use std::time::Duration;

use esmirror::errors::FetchError;
use esmirror::mirror::{Fetch, HttpFetcher};
use url::Url;

use common::{TestHttpResponse, TestHttpServer};

fn fetcher(max_redirects: usize) -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5), max_redirects).unwrap()
}

#[tokio::test]
async fn follows_redirect_chain() {
    let server = TestHttpServer::new(vec![
        ("/react@19", TestHttpResponse::redirect(302, "/react@19.0.0")),
        (
            "/react@19.0.0",
            TestHttpResponse::redirect(301, "/react@19.0.0/es2022/react.mjs"),
        ),
        (
            "/react@19.0.0/es2022/react.mjs",
            TestHttpResponse::ok_js("export default {};"),
        ),
    ]);
    let url = Url::parse(&server.url("/react@19")).unwrap();

    let body = fetcher(10).fetch(&url).await.unwrap();

    assert_eq!(body, b"export default {};");
    assert_eq!(server.hits("/react@19"), 1);
    assert_eq!(server.hits("/react@19.0.0"), 1);
    assert_eq!(server.hits("/react@19.0.0/es2022/react.mjs"), 1);
}

#[tokio::test]
async fn resolves_relative_locations_against_the_current_url() {
    let server = TestHttpServer::new(vec![
        ("/pkg@1.0.0/es2022/index.mjs", TestHttpResponse::redirect(307, "./pkg.mjs")),
        ("/pkg@1.0.0/es2022/pkg.mjs", TestHttpResponse::ok_js("export {};")),
    ]);
    let url = Url::parse(&server.url("/pkg@1.0.0/es2022/index.mjs")).unwrap();

    let body = fetcher(10).fetch(&url).await.unwrap();

    assert_eq!(body, b"export {};");
}

#[tokio::test]
async fn stops_after_redirect_limit() {
    let server = TestHttpServer::new(vec![("/loop", TestHttpResponse::redirect(302, "/loop"))]);
    let url = Url::parse(&server.url("/loop")).unwrap();

    let err = fetcher(3).fetch(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::TooManyRedirects { limit: 3, .. }));
    assert_eq!(server.hits("/loop"), 4);
}

#[tokio::test]
async fn reports_status_and_body() {
    let server = TestHttpServer::new(vec![]);
    let url = Url::parse(&server.url("/missing@1.0.0")).unwrap();

    let err = fetcher(10).fetch(&url).await.unwrap_err();

    match err {
        FetchError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn redirect_without_location_fails() {
    let server = TestHttpServer::new(vec![(
        "/broken",
        TestHttpResponse {
            status: 302,
            headers: Vec::new(),
            body: Vec::new(),
        },
    )]);
    let url = Url::parse(&server.url("/broken")).unwrap();

    let err = fetcher(10).fetch(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::MissingLocation { status: 302, .. }));
}
