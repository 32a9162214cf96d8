//! Source-control DTOs

use serde::{Deserialize, Serialize};

/// Parameters for bootstrapping a new repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoCreationRequest {
    pub name: String,
    pub description: String,
    pub private: bool,
    pub enable_branch_protection: bool,
    pub protected_branches: Vec<String>,
    pub require_reviews: bool,
}

impl RepoCreationRequest {
    /// Public repository with `main` protected and reviews required
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            private: false,
            enable_branch_protection: true,
            protected_branches: vec!["main".to_string()],
            require_reviews: true,
        }
    }

    /// Branches to protect after the initial commit
    pub fn branches_to_protect(&self) -> &[String] {
        if self.enable_branch_protection {
            &self.protected_branches
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// A repository as returned by the source-control API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: RepositoryOwner,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// OAuth access token returned by the code exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// A file to commit, path relative to the repository root
///
/// Content is raw bytes; templates may ship images and other binary assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub content: Vec<u8>,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Content as text, when it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}
