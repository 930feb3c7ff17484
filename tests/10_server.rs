mod common;

use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn binary_serves_health_and_guards_writes() -> Result<()> {
    let server = common::TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(20)).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["status"], "ok");

    let res = client
        .get(format!("{}/api/places/{}", server.base_url, uuid::Uuid::new_v4()))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(format!("{}/api/places/{}", server.base_url, uuid::Uuid::new_v4()))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn dotenv_database_url_does_not_override_test_environment() -> Result<()> {
    let server =
        common::TestServer::spawn_with_dotenv(Some("DATABASE_URL=postgres://nobody@127.0.0.1:1/places\n"))?;
    server.wait_ready(Duration::from_secs(20)).await?;

    let body = reqwest::get(format!("{}/health", server.base_url))
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(body["database"], "ok");

    Ok(())
}
