//! Install-time static resource manifest.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::net::{CredentialsMode, Request};

/// One static resource to precache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Origin-relative path, e.g. `/css/wiki.css`.
    pub path: String,

    #[serde(default)]
    pub credentials: CredentialsMode,
}

impl ManifestEntry {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_string(), credentials: CredentialsMode::default() }
    }

    pub fn with_credentials(path: &str, credentials: CredentialsMode) -> Self {
        Self { path: path.to_string(), credentials }
    }

    /// Resolve against the origin.
    pub fn request(&self, origin: &Url) -> Result<Request, Error> {
        let url = origin
            .join(&self.path)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.path)))?;
        Ok(Request::new(url).with_credentials(self.credentials))
    }
}

/// Ordered list of static resources that make up one cache version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve every entry against the origin, dropping duplicate requests.
    pub fn requests(&self, origin: &Url) -> Result<Vec<Request>, Error> {
        let mut out: Vec<Request> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let request = entry.request(origin)?;
            if !out.contains(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }
}

const SHELL_RESOURCES: &[&str] = &[
    "/",
    "/js/page.js",
    "/js/page-framework.js",
    "/css/head-wiki.css",
    "/css/wiki.css",
    "/css/flags.css",
    "/components/polymer/polymer.html",
    "/components/polymer/polymer-mini.html",
    "/components/polymer/polymer-micro.html",
    "/vulcanized.html",
    "/components/webcomponentsjs/webcomponents-lite.min.js",
    "/components.html",
    "/components/iron-a11y-keys-behavior/iron-a11y-keys-behavior.html",
    "/components/iron-autogrow-textarea/iron-autogrow-textarea.html",
    "/components/iron-behaviors/iron-button-state.html",
    "/components/iron-behaviors/iron-control-state.html",
    "/components/iron-flex-layout/iron-flex-layout.html",
    "/components/iron-flex-layout/classes/iron-flex-layout.html",
    "/components/iron-flex-layout/classes/iron-shadow-flex-layout.html",
    "/components/iron-form-element-behavior/iron-form-element-behavior.html",
    "/components/iron-icon/iron-icon.html",
    "/components/iron-iconset-svg/iron-iconset-svg.html",
    "/components/iron-input/iron-input.html",
    "/components/iron-meta/iron-meta.html",
    "/components/iron-validatable-behavior/iron-validatable-behavior.html",
    "/components/paper-behaviors/paper-button-behavior.html",
    "/components/paper-behaviors/paper-inky-focus-behavior.html",
    "/components/paper-icon-button/paper-icon-button.html",
    "/components/paper-input/all-imports.html",
    "/components/paper-input/paper-input-addon-behavior.html",
    "/components/paper-input/paper-input-behavior.html",
    "/components/paper-input/paper-input-char-counter.html",
    "/components/paper-input/paper-input-container.html",
    "/components/paper-input/paper-input-error.html",
    "/components/paper-input/paper-input.html",
    "/components/paper-input/paper-textarea.html",
    "/components/paper-ripple/paper-ripple.html",
    "/components/paper-styles/color.html",
    "/components/paper-styles/default-theme.html",
    "/components/paper-styles/demo-pages.html",
    "/components/paper-styles/paper-styles-classes.html",
    "/components/paper-styles/paper-styles.html",
    "/components/paper-styles/shadow.html",
    "/components/paper-styles/typography.html",
    "/components/paper-toggle-button/paper-toggle-button.html",
    "/components/paper-toggle-button/paper-toggle-button.css",
    "/components/platinum-sw/platinum-sw-cache.html",
    "/components/platinum-sw/platinum-sw-elements.html",
    "/components/platinum-sw/platinum-sw-fetch.html",
    "/components/platinum-sw/platinum-sw-import-script.html",
    "/components/platinum-sw/platinum-sw-register.html",
    "/components/wiki-icons/wiki-icons.html",
];

impl Default for Manifest {
    fn default() -> Self {
        let mut entries: Vec<ManifestEntry> = SHELL_RESOURCES.iter().map(|p| ManifestEntry::new(p)).collect();
        // flag state travels in cookies, so the shell must be fetched with them
        entries.insert(1, ManifestEntry::with_credentials("/shell.html", CredentialsMode::Include));
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_shell_credentials() {
        let manifest = Manifest::default();
        let shell = manifest.entries.iter().find(|e| e.path == "/shell.html").unwrap();
        assert_eq!(shell.credentials, CredentialsMode::Include);
        assert_eq!(manifest.entries[0].path, "/");
    }

    #[test]
    fn test_requests_resolve_and_dedupe() {
        let origin = Url::parse("http://localhost:8000").unwrap();
        let manifest = Manifest::new(vec![
            ManifestEntry::new("/css/wiki.css"),
            ManifestEntry::new("/css/wiki.css"),
            ManifestEntry::with_credentials("/css/wiki.css", CredentialsMode::Include),
        ]);

        let requests = manifest.requests(&origin).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url.as_str(), "http://localhost:8000/css/wiki.css");
    }

    #[test]
    fn test_manifest_deserialize() {
        let manifest: Manifest = serde_json::from_str(
            r#"[{"path": "/"}, {"path": "/shell.html", "credentials": "include"}]"#,
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries[1].credentials, CredentialsMode::Include);
    }
}
