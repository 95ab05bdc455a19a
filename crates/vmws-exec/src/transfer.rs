//! File transfer relative to an instance directory, and whole-file
//! round-trips through a local temp file.

use crate::shell::HostShell;
use log::debug;
use std::path::Path;
use vmws_core::{Vid, VmwsResult};

/// Copy `local` into the instance directory of `vid` as `filename`.
pub async fn upload(shell: &dyn HostShell, vid: &Vid, local: &Path, filename: &str) -> VmwsResult<String> {
    let remote = vid.file(filename);
    shell.put_file(local, &remote).await?;
    Ok(remote)
}

/// Copy `filename` from the instance directory of `vid` to `local`.
pub async fn download(shell: &dyn HostShell, vid: &Vid, local: &Path, filename: &str) -> VmwsResult<String> {
    let remote = vid.file(filename);
    shell.get_file(&remote, local).await?;
    Ok(remote)
}

/// Read a file from the instance directory.
pub async fn read_host_file(shell: &dyn HostShell, vid: &Vid, filename: &str) -> VmwsResult<Vec<u8>> {
    read_host_path(shell, &vid.file(filename)).await
}

/// Replace a file in the instance directory.
pub async fn write_host_file(shell: &dyn HostShell, vid: &Vid, filename: &str, data: &[u8]) -> VmwsResult<()> {
    write_host_path(shell, &vid.file(filename), data).await
}

/// Read any host file by canonical path.
pub async fn read_host_path(shell: &dyn HostShell, remote: &str) -> VmwsResult<Vec<u8>> {
    let tmp = tempfile::NamedTempFile::new()?;
    shell.get_file(remote, tmp.path()).await?;
    let data = tokio::fs::read(tmp.path()).await?;
    debug!("read {} bytes from {}", data.len(), remote);
    Ok(data)
}

/// Write any host file by canonical path.
pub async fn write_host_path(shell: &dyn HostShell, remote: &str, data: &[u8]) -> VmwsResult<()> {
    let tmp = tempfile::NamedTempFile::new()?;
    tokio::fs::write(tmp.path(), data).await?;
    shell.put_file(tmp.path(), remote).await?;
    debug!("wrote {} bytes to {}", data.len(), remote);
    Ok(())
}
