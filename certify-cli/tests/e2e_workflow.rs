//! End-to-end workflow tests for certify-cli.
//!
//! A certify-server runs in-process on an ephemeral port; certificates are
//! issued over HTTP and then checked with the CLI binary.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use certify_server::{create_router_with_state, AppState, Config};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Get a Command for the certify binary.
fn certify() -> Command {
    cargo_bin_cmd!("certify").into()
}

/// In-process API server with an admin session and one organization.
struct TestServer {
    rt: Runtime,
    base_url: String,
    client: reqwest::Client,
    token: String,
    org_id: i64,
}

impl TestServer {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let listener = rt
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let app = create_router_with_state(AppState::in_memory(Config::default()));
        rt.spawn(async move { axum::serve(listener, app).await });

        let mut server = Self {
            rt,
            base_url,
            client: reqwest::Client::new(),
            token: String::new(),
            org_id: 0,
        };

        let credentials = json!({"email": "admin@example.edu", "password": "correct horse battery"});
        server.post("/auth/register", credentials.clone());
        server.token = server.post("/auth/login", credentials)["access_token"]
            .as_str()
            .unwrap()
            .to_string();
        server.org_id = server.post("/organizations", json!({"name": "Certify Academy"}))["id"]
            .as_i64()
            .unwrap();

        server
    }

    fn post(&self, path: &str, body: Value) -> Value {
        self.rt.block_on(async {
            let response = self
                .client
                .post(format!("{}{}", self.base_url, path))
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await
                .unwrap();
            assert!(response.status().is_success(), "{path}: {}", response.status());
            response.json().await.unwrap()
        })
    }

    fn issue(&self, owner: &str, course: &str) -> Value {
        self.post(
            "/certificates/issue",
            json!({"owner_name": owner, "course_name": course, "organization_id": self.org_id}),
        )
    }

    fn document(&self, id: i64) -> Vec<u8> {
        self.rt.block_on(async {
            self.client
                .get(format!("{}/certificates/{id}/document", self.base_url))
                .send()
                .await
                .unwrap()
                .bytes()
                .await
                .unwrap()
                .to_vec()
        })
    }
}

// ============================================================================
// Complete Workflow Tests: Issue → Fingerprint → Verify → Revoke
// ============================================================================

#[test]
fn test_e2e_issue_verify_by_hash() {
    let server = TestServer::start();
    let issued = server.issue("Jane Doe", "Blockchain 101");
    let cert_hash = issued["cert_hash"].as_str().unwrap();

    certify()
        .args(["verify", cert_hash, "--api", &server.base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID"))
        .stdout(predicate::str::contains("Jane Doe"))
        .stdout(predicate::str::contains("Blockchain 101"));
}

#[test]
fn test_e2e_downloaded_document_fingerprint_and_verify() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    let issued = server.issue("Jane Doe", "Blockchain 101");

    let path = temp.path().join("jane.json");
    fs::write(&path, server.document(issued["id"].as_i64().unwrap())).unwrap();

    // Step 1: Local fingerprint equals the issued cert_hash
    certify()
        .args(["fingerprint", "-q", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(format!("{}\n", issued["cert_hash"].as_str().unwrap()));

    // Step 2: Verify the document file against the API
    certify()
        .args(["verify", path.to_str().unwrap(), "--api", &server.base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID"));

    // Step 3: A single appended byte makes it unknown
    let mut tampered = fs::read(&path).unwrap();
    tampered.push(b'\n');
    fs::write(&path, tampered).unwrap();

    certify()
        .args(["verify", path.to_str().unwrap(), "--api", &server.base_url])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("NOT FOUND"))
        .stderr(predicate::str::contains(
            "Certificate not found in local records",
        ));
}

#[test]
fn test_e2e_revoked_certificate_fails_verification() {
    let server = TestServer::start();
    let issued = server.issue("Jane Doe", "Blockchain 101");
    let cert_hash = issued["cert_hash"].as_str().unwrap();

    server.post(
        &format!("/certificates/{}/revoke", issued["id"].as_i64().unwrap()),
        json!({}),
    );

    certify()
        .args(["verify", cert_hash, "--api", &server.base_url])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("REVOKED"))
        .stdout(predicate::str::contains("Revoked on chain:"));

    certify()
        .args(["verify", "-q", cert_hash, "--api", &server.base_url])
        .assert()
        .code(65)
        .stdout("revoked\n");
}

#[test]
fn test_e2e_unknown_hash_is_verification_failure() {
    let server = TestServer::start();

    certify()
        .args(["verify", &"0".repeat(64), "--api", &server.base_url])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Verification failed"));
}

#[test]
fn test_e2e_canonical_rebuild_matches_issued_document() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    let issued = server.issue("Jane Doe", "Blockchain 101");
    let document = server.document(issued["id"].as_i64().unwrap());
    let parsed: Value = serde_json::from_slice(&document).unwrap();

    // Rebuilding from the document's own fields reproduces its hash
    let out = temp.path().join("rebuilt.json");
    certify()
        .args([
            "canonical",
            "-q",
            "--owner",
            parsed["owner_name"].as_str().unwrap(),
            "--course",
            parsed["course_name"].as_str().unwrap(),
            "--org",
            &parsed["organization_id"].to_string(),
            "--issued-at",
            parsed["issued_at"].as_str().unwrap(),
            "--nonce",
            parsed["nonce"].as_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(format!("{}\n", issued["cert_hash"].as_str().unwrap()));

    assert_eq!(fs::read(&out).unwrap(), document);
}
