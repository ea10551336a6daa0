/// Local file written by `get <remote> [local]`.
///
/// Without `local` the file lands in the current directory under the remote basename; an
/// existing directory receives the file under the same name, anything else is the target itself.
pub fn get_destination(
    remote: &str,
    local: Option<&std::path::Path>,
) -> anyhow::Result<std::path::PathBuf> {
    let name = common::metadata::basename(remote);
    let needs_name = match local {
        None => true,
        Some(local) => local.is_dir(),
    };
    if needs_name && (name.is_empty() || name == "." || name == "..") {
        return Err(anyhow::anyhow!(
            "cannot derive a local file name from remote path {:?}, please give one explicitly",
            remote
        ));
    }
    Ok(match local {
        None => std::path::PathBuf::from(name),
        Some(local) if local.is_dir() => local.join(name),
        Some(local) => local.to_path_buf(),
    })
}

/// Remote file written by `put <local> [remote]`.
///
/// Without `remote` the file goes to the top level under its local name; a remote path ending
/// with `/` names a directory that receives the file under its local name.
pub fn put_destination(local: &std::path::Path, remote: Option<&str>) -> anyhow::Result<String> {
    let name = || {
        local
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "cannot derive a remote file name from {:?}, please give one explicitly",
                    local
                )
            })
    };
    match remote {
        None => name(),
        Some(remote) if remote.is_empty() || remote.ends_with('/') => {
            Ok(format!("{remote}{}", name()?))
        }
        Some(remote) => Ok(remote.to_string()),
    }
}
