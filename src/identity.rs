//! Local (OS) identity lookup

/// Source of the invoking user's name and home directory.
pub trait LocalIdentity {
    fn username(&self) -> Option<String>;
    fn home_dir(&self) -> Option<std::path::PathBuf>;
}

/// Looks up the current uid in the user database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl SystemIdentity {
    fn lookup(&self) -> Option<nix::unistd::User> {
        match nix::unistd::User::from_uid(nix::unistd::getuid()) {
            Ok(Some(u)) => Some(u),
            Ok(None) => {
                tracing::debug!(message = "current uid has no passwd entry");
                None
            }
            Err(e) => {
                tracing::debug!(message = "failed to look up current user", error = ?e);
                None
            }
        }
    }
}

impl LocalIdentity for SystemIdentity {
    fn username(&self) -> Option<String> {
        self.lookup().map(|u| u.name)
    }

    fn home_dir(&self) -> Option<std::path::PathBuf> {
        self.lookup().map(|u| u.dir)
    }
}

/// Fixed identity, for callers that already know who they are.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pub username: Option<String>,
    pub home_dir: Option<std::path::PathBuf>,
}

impl LocalIdentity for StaticIdentity {
    fn username(&self) -> Option<String> {
        self.username.clone()
    }

    fn home_dir(&self) -> Option<std::path::PathBuf> {
        self.home_dir.clone()
    }
}
