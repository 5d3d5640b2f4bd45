//! Version information with embedded git metadata.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git branch at build time, or "unknown" if unavailable.
pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

/// Full git commit SHA at build time, or "unknown" if unavailable.
/// [`version_string()`] shows only its first 7 characters.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Whether the working tree was dirty at build time.
pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// Default `User-Agent` sent with every request: `streamyyy-net/{version}`.
pub fn user_agent() -> String {
    format!("streamyyy-net/{PKG_VERSION}")
}

/// Full version string: `{version}+{branch}.{short_sha}`, where `short_sha`
/// is the first 7 characters of [`GIT_SHA`], with a `.dirty` suffix when
/// the tree had local changes.
pub fn version_string() -> String {
    let dirty_suffix = if git_dirty() { ".dirty" } else { "" };
    format!(
        "{PKG_VERSION}+{GIT_BRANCH}.{}{dirty_suffix}",
        &GIT_SHA[..7.min(GIT_SHA.len())]
    )
}
