//! SSH/SFTP deploy transport built on `ssh2` with password authentication.
//!
//! Every blocking SSH call runs inside `tokio::task::spawn_blocking`. Remote
//! paths are normalized to forward slashes; directories are created with mode
//! 0755 best-effort and files are streamed with `std::io::copy`.

use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ssh2::{Session, Sftp};
use tracing::debug;

use crate::config::DeployServer;
use crate::deploy::DeployTransport;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::journal::JournalLevel;

/// SSH deployer publishing its per-step log lines onto the event bus.
pub struct SshDeployer {
    events: EventBus,
}

impl SshDeployer {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

fn connect(server: &DeployServer) -> Result<Session> {
    let tcp = TcpStream::connect(server.address())
        .map_err(|e| Error::ssh(format!("TCP connect failed to {}: {}", server.host, e)))?;
    let mut sess =
        Session::new().map_err(|e| Error::ssh(format!("Session init failed: {}", e)))?;
    sess.set_tcp_stream(tcp);
    sess.handshake()
        .map_err(|e| Error::ssh(format!("SSH handshake failed: {}", e)))?;
    sess.userauth_password(&server.user, &server.password)
        .map_err(|e| Error::ssh(format!("Authentication failed: {}", e)))?;
    Ok(sess)
}

/// Run one command on its own exec channel, returning stdout and exit status.
fn exec_command(sess: &Session, cmd: &str) -> Result<(String, i32)> {
    let mut channel = sess
        .channel_session()
        .map_err(|e| Error::ssh(e.to_string()))?;
    channel.exec(cmd).map_err(|e| Error::ssh(e.to_string()))?;
    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| Error::ssh(e.to_string()))?;
    channel
        .wait_close()
        .map_err(|e| Error::ssh(e.to_string()))?;
    let status = channel
        .exit_status()
        .map_err(|e| Error::ssh(e.to_string()))?;
    Ok((output, status))
}

/// Upload a file or directory tree over SFTP. The remote side always uses
/// forward slashes.
fn upload_recursive(sftp: &Sftp, local: &Path, remote: &str) -> Result<()> {
    if local.is_dir() {
        // mkdir fails if the directory exists; that is fine.
        let _ = sftp.mkdir(Path::new(remote), 0o755);
        for entry in std::fs::read_dir(local)? {
            let entry = entry?;
            let child_name = entry.file_name().to_string_lossy().to_string();
            let remote_child = format!("{}/{}", remote.trim_end_matches('/'), child_name);
            upload_recursive(sftp, &entry.path(), &remote_child)?;
        }
    } else {
        let mut local_file = std::fs::File::open(local)?;
        let mut remote_file = sftp
            .create(Path::new(remote))
            .map_err(|e| Error::ssh(format!("SFTP create {} failed: {}", remote, e)))?;
        std::io::copy(&mut local_file, &mut remote_file)?;
    }
    Ok(())
}

/// Execute the post-deploy commands, journaling stdout and non-zero exit
/// statuses. Command failures are reported but do not fail the deploy.
fn run_post_commands(
    events: &EventBus,
    sess: &Session,
    server_name: &str,
    post_commands: &[String],
) -> Result<()> {
    if post_commands.is_empty() {
        return Ok(());
    }
    events.publish_log(
        JournalLevel::Info,
        format!("[{}] Executing post commands...", server_name),
    );
    for cmd in post_commands {
        events.publish_log(JournalLevel::Info, format!("[{}] $ {}", server_name, cmd));
        let (output, status) = exec_command(sess, cmd)?;
        if !output.is_empty() {
            events.publish_log(
                JournalLevel::Info,
                format!("[{}] > {}", server_name, output.trim()),
            );
        }
        if status != 0 {
            events.publish_log(
                JournalLevel::Error,
                format!("[{}] Command failed (exit {})", server_name, status),
            );
        }
    }
    Ok(())
}

fn deploy_manual_blocking(
    events: &EventBus,
    server: &DeployServer,
    post_commands: &[String],
    local_path: &str,
    remote_path: &str,
) -> Result<()> {
    events.publish_log(
        JournalLevel::Info,
        format!(
            "[{}] Connecting to {} for manual deploy of {}",
            server.name,
            server.address(),
            local_path
        ),
    );
    let sess = connect(server)?;
    events.publish_log(
        JournalLevel::Success,
        format!("[{}] SSH connected and authenticated", server.name),
    );

    let local = PathBuf::from(local_path);
    if !local.exists() {
        return Err(Error::Deploy(format!(
            "Local path does not exist: {}",
            local_path
        )));
    }

    // A trailing separator means "into this directory": append the source's
    // file name.
    let mut target = remote_path.to_string();
    if target.ends_with('/') || target.ends_with('\\') {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Deploy(format!("Cannot derive a name from {}", local_path)))?;
        target = format!("{}/{}", target.trim_end_matches(['/', '\\']), name);
    }
    let target = target.replace('\\', "/");

    events.publish_log(
        JournalLevel::Info,
        format!("[{}] Uploading to {}", server.name, target),
    );

    let sftp = sess
        .sftp()
        .map_err(|e| Error::ssh(format!("SFTP init failed: {}", e)))?;

    if let Some(parent) = Path::new(&target).parent() {
        let parent = parent.to_string_lossy().replace('\\', "/");
        if !parent.is_empty() {
            exec_command(&sess, &format!("mkdir -p {}", parent))?;
        }
    }

    upload_recursive(&sftp, &local, &target)?;
    events.publish_log(
        JournalLevel::Success,
        format!("[{}] Upload complete", server.name),
    );

    run_post_commands(events, &sess, &server.name, post_commands)
}

fn deploy_folder_blocking(
    events: &EventBus,
    server: &DeployServer,
    post_commands: &[String],
    local_folder: &Path,
    folder_name: &str,
) -> Result<()> {
    events.publish_log(
        JournalLevel::Info,
        format!("[{}] Connecting to {}", server.name, server.address()),
    );
    let sess = connect(server)?;
    events.publish_log(JournalLevel::Info, format!("[{}] Connected", server.name));

    let remote_target = format!(
        "{}/{}",
        server.remote_path.trim_end_matches('/'),
        folder_name
    );
    let sftp = sess
        .sftp()
        .map_err(|e| Error::ssh(format!("SFTP init failed: {}", e)))?;

    match sftp.stat(Path::new(&remote_target)) {
        Ok(_) => {
            events.publish_log(
                JournalLevel::Info,
                format!(
                    "[{}] Remote directory {} already exists, skipping upload",
                    server.name, remote_target
                ),
            );
        }
        Err(_) => {
            events.publish_log(
                JournalLevel::Info,
                format!("[{}] Uploading to {}", server.name, remote_target),
            );
            exec_command(&sess, &format!("mkdir -p {}", remote_target))?;
            upload_recursive(&sftp, local_folder, &remote_target)?;
        }
    }

    run_post_commands(events, &sess, &server.name, post_commands)
}

#[async_trait]
impl DeployTransport for SshDeployer {
    async fn test_connection(&self, server: &DeployServer) -> Result<String> {
        let server = server.clone();
        tokio::task::spawn_blocking(move || {
            debug!(host = %server.host, port = server.port, "testing SSH connectivity");
            connect(&server)?;
            Ok(format!("Connected to {}", server.name))
        })
        .await
        .map_err(|e| Error::Other(format!("connectivity task panicked: {}", e)))?
    }

    async fn deploy(
        &self,
        server: &DeployServer,
        post_commands: &[String],
        local_path: &str,
        remote_path: &str,
    ) -> Result<()> {
        let events = self.events.clone();
        let server = server.clone();
        let post_commands = post_commands.to_vec();
        let local_path = local_path.to_string();
        let remote_path = remote_path.to_string();
        tokio::task::spawn_blocking(move || {
            deploy_manual_blocking(&events, &server, &post_commands, &local_path, &remote_path)
        })
        .await
        .map_err(|e| Error::Other(format!("deploy task panicked: {}", e)))?
    }

    async fn deploy_folder(
        &self,
        server: &DeployServer,
        post_commands: &[String],
        local_folder: &Path,
        folder_name: &str,
    ) -> Result<()> {
        let events = self.events.clone();
        let server = server.clone();
        let post_commands = post_commands.to_vec();
        let local_folder = local_folder.to_path_buf();
        let folder_name = folder_name.to_string();
        tokio::task::spawn_blocking(move || {
            deploy_folder_blocking(&events, &server, &post_commands, &local_folder, &folder_name)
        })
        .await
        .map_err(|e| Error::Other(format!("deploy task panicked: {}", e)))?
    }
}
