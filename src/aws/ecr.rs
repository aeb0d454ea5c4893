//! ECR registry authorization

use super::error::from_sdk;
use super::{RegistryApi, RegistryAuth};
use crate::error::{ApiError, ApiResult};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecr::Client;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Clone)]
pub struct AwsEcr {
    client: Client,
}

impl AwsEcr {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl RegistryApi for AwsEcr {
    async fn authorization(&self) -> ApiResult<RegistryAuth> {
        let resp = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| from_sdk("GetAuthorizationToken", e))?;

        let data = resp.authorization_data().first().ok_or_else(|| {
            ApiError::new("GetAuthorizationToken", None, "no authorization data returned")
        })?;

        match (data.authorization_token(), data.proxy_endpoint()) {
            (Some(token), Some(endpoint)) => Ok(RegistryAuth {
                token: token.to_string(),
                endpoint: endpoint.to_string(),
            }),
            _ => Err(ApiError::new(
                "GetAuthorizationToken",
                None,
                "authorization data is incomplete",
            )),
        }
    }
}

impl RegistryAuth {
    /// Decode the token into `(username, password)`
    pub fn credentials(&self) -> Result<(String, String)> {
        let decoded = STANDARD
            .decode(self.token.trim())
            .context("ECR token is not valid base64")?;
        let decoded = String::from_utf8(decoded).context("ECR token is not valid UTF-8")?;

        match decoded.split_once(':') {
            Some((user, password)) if !password.is_empty() => {
                Ok((user.to_string(), password.to_string()))
            }
            _ => bail!("ECR token is not of the form <user>:<password>"),
        }
    }

    /// Registry host for `docker login`, without scheme
    pub fn registry_host(&self) -> Result<String> {
        let url = url::Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid registry endpoint: {}", self.endpoint))?;
        let host = url
            .host_str()
            .with_context(|| format!("Registry endpoint has no host: {}", self.endpoint))?;

        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}
