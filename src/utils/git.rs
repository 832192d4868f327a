use serde::Serialize;
use std::fmt;
use url::Url;

/// Transport family of a remote URL, as far as remote checks are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProtocol {
    Ssh,
    Https,
    Other,
}

impl RemoteProtocol {
    /// Classify a remote URL by its prefix
    pub fn classify(url: &str) -> Self {
        let url = url.trim();
        if url.starts_with("git@") || url.starts_with("ssh://") {
            RemoteProtocol::Ssh
        } else if url.starts_with("https://") || url.starts_with("http://") {
            RemoteProtocol::Https
        } else {
            RemoteProtocol::Other
        }
    }
}

impl fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteProtocol::Ssh => f.write_str("ssh"),
            RemoteProtocol::Https => f.write_str("https"),
            RemoteProtocol::Other => f.write_str("other"),
        }
    }
}

/// A hosted remote broken into host and repository path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub protocol: RemoteProtocol,
    pub host: String,
    pub path: String,
    pub original: String,
}

impl RemoteUrl {
    /// Parse `git@host:path`, `ssh://[user@]host/path` and `https://host/path` forms
    pub fn parse(url: &str) -> Option<Self> {
        let original = url.trim();

        if let Some(rest) = original.strip_prefix("git@") {
            let (host, path) = rest.split_once(':')?;
            return Self::build(RemoteProtocol::Ssh, host, path, original);
        }

        let protocol = match RemoteProtocol::classify(original) {
            RemoteProtocol::Other => return None,
            protocol => protocol,
        };

        let parsed = Url::parse(original).ok()?;
        let host = parsed.host_str()?;
        Self::build(protocol, host, parsed.path(), original)
    }

    fn build(protocol: RemoteProtocol, host: &str, path: &str, original: &str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        if host.is_empty() || path.is_empty() {
            return None;
        }

        Some(Self {
            protocol,
            host: host.to_string(),
            path: path.to_string(),
            original: original.to_string(),
        })
    }

    pub fn to_https(&self) -> String {
        format!("https://{}/{}", self.host, self.path)
    }

    pub fn to_ssh(&self) -> String {
        // Azure DevOps serves SSH from a dedicated host with a versioned path
        if self.host.contains("dev.azure.com") {
            return format!("git@ssh.dev.azure.com:v3/{}", self.path);
        }
        format!("git@{}:{}", self.host, self.path)
    }

    /// Flip the URL to the other transport
    pub fn convert(&self) -> String {
        match self.protocol {
            RemoteProtocol::Https => self.to_ssh(),
            _ => self.to_https(),
        }
    }
}

/// Convert a remote URL between its SSH and HTTPS forms
pub fn convert_remote_url(url: &str) -> Option<String> {
    RemoteUrl::parse(url).map(|remote| remote.convert())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_remote_protocol() {
        assert_eq!(
            RemoteProtocol::classify("git@github.com:user/repo.git"),
            RemoteProtocol::Ssh
        );
        assert_eq!(
            RemoteProtocol::classify("ssh://git@example.com/user/repo.git"),
            RemoteProtocol::Ssh
        );
        assert_eq!(
            RemoteProtocol::classify("https://github.com/user/repo"),
            RemoteProtocol::Https
        );
        assert_eq!(
            RemoteProtocol::classify("/srv/git/repo.git"),
            RemoteProtocol::Other
        );
    }

    #[test]
    fn test_parse_scp_style_url() {
        let remote = RemoteUrl::parse("git@github.com:user/repo.git").unwrap();
        assert_eq!(remote.protocol, RemoteProtocol::Ssh);
        assert_eq!(remote.host, "github.com");
        assert_eq!(remote.path, "user/repo");
        assert_eq!(remote.to_https(), "https://github.com/user/repo");
    }

    #[test]
    fn test_parse_ssh_scheme_url() {
        let remote = RemoteUrl::parse("ssh://git@gitlab.com/group/project.git").unwrap();
        assert_eq!(remote.host, "gitlab.com");
        assert_eq!(remote.path, "group/project");
        assert_eq!(remote.convert(), "https://gitlab.com/group/project");
    }

    #[test]
    fn test_https_to_ssh() {
        assert_eq!(
            convert_remote_url("https://github.com/user/repo.git"),
            Some("git@github.com:user/repo".to_string())
        );
        assert_eq!(
            convert_remote_url("https://dev.azure.com/org/project/_git/repo"),
            Some("git@ssh.dev.azure.com:v3/org/project/_git/repo".to_string())
        );
    }

    #[test]
    fn test_unparseable_urls() {
        assert!(RemoteUrl::parse("").is_none());
        assert!(RemoteUrl::parse("git@github.com").is_none());
        assert!(RemoteUrl::parse("https://github.com/").is_none());
        assert!(RemoteUrl::parse("/local/path").is_none());
    }
}
