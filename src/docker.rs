//! Image build and push through the local docker CLI

use crate::aws::{RegistryApi, RegistryAuth};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// What to build (optional) and where to push it
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Remote reference, `<registry>/<repo>:<tag>`
    pub image_url: String,
    /// Local image tag to push
    pub local_tag: String,
    /// Build context; no build when unset
    pub build_path: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
    /// `KEY=VALUE` pairs
    pub build_args: Vec<String>,
}

pub async fn push(registry: &dyn RegistryApi, request: &PushRequest) -> Result<()> {
    if let Some(context) = &request.build_path {
        build(request, context).await?;
    }

    let auth = registry.authorization().await?;
    login(&auth).await?;

    tracing::info!("Tagging {} as {}", request.local_tag, request.image_url);
    run(&["tag", request.local_tag.as_str(), request.image_url.as_str()]).await?;

    tracing::info!("Pushing image: {}", request.image_url);
    run(&["push", request.image_url.as_str()]).await?;

    tracing::info!("Successfully pushed image: {}", request.image_url);
    Ok(())
}

async fn build(request: &PushRequest, context: &Path) -> Result<()> {
    let args = build_args(request, context);
    tracing::info!("Building image {} from {}", request.local_tag, context.display());

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run(&args).await
}

fn build_args(request: &PushRequest, context: &Path) -> Vec<String> {
    let mut args = vec!["build".to_string(), "-t".to_string(), request.local_tag.clone()];
    if let Some(dockerfile) = &request.dockerfile {
        args.push("-f".to_string());
        args.push(dockerfile.display().to_string());
    }
    for arg in &request.build_args {
        args.push("--build-arg".to_string());
        args.push(arg.clone());
    }
    args.push(context.display().to_string());
    args
}

/// `docker login` with the password on stdin
async fn login(auth: &RegistryAuth) -> Result<()> {
    let (user, password) = auth.credentials()?;
    let host = auth.registry_host()?;
    tracing::debug!("Authenticating with registry {}", host);

    let mut child = Command::new("docker")
        .args(["login", "--username", user.as_str(), "--password-stdin", host.as_str()])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .context("Failed to run docker login")?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(password.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        bail!("docker login failed for {}", host);
    }
    Ok(())
}

async fn run(args: &[&str]) -> Result<()> {
    tracing::debug!("docker {}", args.join(" "));
    let status = Command::new("docker")
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to run docker {}", args[0]))?;

    if !status.success() {
        bail!("docker {} exited with {}", args[0], status);
    }
    Ok(())
}
