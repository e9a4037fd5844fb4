use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use powershelf_types::{Credential, MacAddr};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{CredentialError, CredentialStore, Result, VaultConfig};

const MOUNT_PATH: &str = "secrets";
const TOKEN_HEADER: &str = "X-Vault-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential store backed by a Vault KV v2 engine mounted at `secrets`.
///
/// Entries live at `secrets/data/pmc/<mac>` as `{"username", "password"}`.
pub struct VaultCredentialStore {
    client: Client,
    address: String,
    token: String,
}

#[derive(Deserialize)]
struct SecretResponse {
    data: Option<SecretData>,
}

#[derive(Deserialize)]
struct SecretData {
    data: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

impl VaultCredentialStore {
    /// Create a store for the given Vault.
    ///
    /// Certificate verification is disabled: in-cluster Vault endpoints are
    /// served with self-signed certificates.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| CredentialError::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path)
    }

    fn secret_path(mac: MacAddr) -> String {
        format!("{MOUNT_PATH}/data/pmc/{mac}")
    }

    fn metadata_path(mac: MacAddr) -> String {
        format!("{MOUNT_PATH}/metadata/pmc/{mac}")
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(TOKEN_HEADER, &self.token)
    }

    async fn ensure_mount(&self) -> Result<()> {
        let response = self
            .authed(self.client.get(self.url("sys/mounts")))
            .send()
            .await?;
        let mounts: serde_json::Value = check(response).await?.json().await?;

        let wanted = format!("{MOUNT_PATH}/");
        // Older servers list mounts at the top level, newer ones under `data`.
        let mounted = [Some(&mounts), mounts.get("data")]
            .into_iter()
            .flatten()
            .filter_map(serde_json::Value::as_object)
            .any(|obj| obj.contains_key(&wanted) || obj.contains_key(MOUNT_PATH));
        if mounted {
            debug!(mount = MOUNT_PATH, "kv engine already mounted");
            return Ok(());
        }

        info!(mount = MOUNT_PATH, "mounting kv-v2 engine");
        let response = self
            .authed(self.client.post(self.url(&format!("sys/mounts/{MOUNT_PATH}"))))
            .json(&json!({ "type": "kv-v2" }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn read(&self, mac: MacAddr) -> Result<Option<Credential>> {
        let response = self
            .authed(self.client.get(self.url(&Self::secret_path(mac))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let secret: SecretResponse = check(response).await?.json().await?;
        Ok(secret
            .data
            .and_then(|d| d.data)
            .map(|map| Credential::from_map(&map)))
    }

    async fn write(&self, mac: MacAddr, credential: &Credential) -> Result<()> {
        let response = self
            .authed(self.client.post(self.url(&Self::secret_path(mac))))
            .json(&json!({ "data": credential.to_map() }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CredentialError::Backend {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CredentialStore for VaultCredentialStore {
    async fn start(&self) -> Result<()> {
        info!(address = %self.address, "Starting Vault credential store");
        self.ensure_mount().await
    }

    async fn stop(&self) -> Result<()> {
        info!("Stopping Vault credential store");
        Ok(())
    }

    async fn get(&self, mac: MacAddr) -> Result<Credential> {
        self.read(mac)
            .await?
            .filter(Credential::is_valid)
            .ok_or(CredentialError::NotFound(mac))
    }

    async fn put(&self, mac: MacAddr, credential: &Credential) -> Result<()> {
        if !credential.is_valid() {
            return Err(CredentialError::Invalid(mac));
        }
        self.write(mac, credential).await
    }

    async fn patch(&self, mac: MacAddr, credential: &Credential) -> Result<()> {
        let mut current = self.read(mac).await?.ok_or(CredentialError::NotFound(mac))?;
        current.patch(credential);
        self.put(mac, &current).await
    }

    /// Removes every version and the metadata, so the key leaves [`keys`].
    ///
    /// [`keys`]: CredentialStore::keys
    async fn delete(&self, mac: MacAddr) -> Result<()> {
        let response = self
            .authed(self.client.delete(self.url(&Self::metadata_path(mac))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<MacAddr>> {
        let response = self
            .authed(
                self.client
                    .get(self.url(&format!("{MOUNT_PATH}/metadata/pmc")))
                    .query(&[("list", "true")]),
            )
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let listing: ListResponse = check(response).await?.json().await?;
        listing
            .data
            .keys
            .iter()
            .map(|key| {
                key.parse::<MacAddr>()
                    .map_err(|e| CredentialError::decode(format!("bad key {key:?}: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powershelf_errors::{Classify, ErrorCategory};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const MAC: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const SECRET: &str = "/v1/secrets/data/pmc/00:11:22:33:44:55";
    const METADATA: &str = "/v1/secrets/metadata/pmc/00:11:22:33:44:55";

    fn store(server: &MockServer) -> Result<VaultCredentialStore> {
        VaultCredentialStore::new(&VaultConfig::new(server.uri(), "s.test"))
    }

    fn secret_body(user: &str, password: &str) -> serde_json::Value {
        json!({
            "data": {
                "data": { "username": user, "password": password },
                "metadata": { "version": 1 }
            }
        })
    }

    #[tokio::test]
    async fn start_mounts_engine_when_missing() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .and(header("X-Vault-Token", "s.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "sys/": { "type": "system" } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/sys/mounts/secrets"))
            .and(body_json(json!({ "type": "kv-v2" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)?.start().await?;
        Ok(())
    }

    #[tokio::test]
    async fn start_skips_existing_mount() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets/": { "type": "kv" },
                "data": { "secrets/": { "type": "kv" } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/sys/mounts/secrets"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        store(&server)?.start().await?;
        Ok(())
    }

    #[tokio::test]
    async fn get_reads_kv_v2_payload() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(secret_body("root", "pw")))
            .mount(&server)
            .await;

        assert_eq!(store(&server)?.get(MAC).await?, Credential::new("root", "pw"));
        Ok(())
    }

    #[tokio::test]
    async fn get_treats_blank_user_as_missing() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(secret_body("", "pw")))
            .mount(&server)
            .await;

        let err = store(&server)?.get(MAC).await.err().ok_or("expected error")?;
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_secret_is_not_found() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
            .mount(&server)
            .await;

        let err = store(&server)?.get(MAC).await.err().ok_or("expected error")?;
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn put_writes_data_envelope() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SECRET))
            .and(body_json(json!({ "data": { "username": "root", "password": "pw" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)?.put(MAC, &Credential::new("root", "pw")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn put_rejects_invalid_credential() -> TestResult {
        let server = MockServer::start().await;
        let err = store(&server)?
            .put(MAC, &Credential::new(" ", "pw"))
            .await
            .err()
            .ok_or("expected error")?;
        assert_eq!(err.category(), ErrorCategory::Input);
        Ok(())
    }

    #[tokio::test]
    async fn patch_merges_with_stored_secret() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(secret_body("root", "old")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SECRET))
            .and(body_json(json!({ "data": { "username": "root", "password": "new" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)?.patch(MAC, &Credential::new("", "new")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn patch_absent_secret_is_not_found() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = store(&server)?
            .patch(MAC, &Credential::new("root", "pw"))
            .await
            .err()
            .ok_or("expected error")?;
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn delete_tolerates_missing_secret() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(METADATA))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        store(&server)?.delete(MAC).await?;
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_metadata_so_keys_forget_it() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(METADATA))
            .and(header("X-Vault-Token", "s.test"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        // Listing after the last key is gone.
        Mock::given(method("GET"))
            .and(path("/v1/secrets/metadata/pmc"))
            .and(query_param("list", "true"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server)?;
        store.delete(MAC).await?;
        assert!(store.keys().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn keys_parses_listing() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secrets/metadata/pmc"))
            .and(query_param("list", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "keys": ["00:11:22:33:44:55", "aa:bb:cc:dd:ee:ff"] }
            })))
            .mount(&server)
            .await;

        let keys = store(&server)?.keys().await?;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.first(), Some(&MAC));
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_classify_as_store() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SECRET))
            .respond_with(ResponseTemplate::new(503).set_body_string("sealed"))
            .mount(&server)
            .await;

        let err = store(&server)?.get(MAC).await.err().ok_or("expected error")?;
        assert_eq!(err.category(), ErrorCategory::Store);
        assert!(err.to_string().contains("sealed"));
        Ok(())
    }
}
