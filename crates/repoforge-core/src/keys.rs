//! Object-store key layout and canonical repository paths.
//!
//! ```text
//! repositories/<account>/repository.json
//! repositories/<account>/<package-system>/<unix-ts>-<archive-name>
//! pool/<origin>/<codename>/<component>/<basename>
//! ```

use crate::classify::Component;

pub const REPOSITORIES_PREFIX: &str = "repositories";

/// File name of the repository definition, both in the store and in a workspace.
pub const DEFINITION_FILE: &str = "repository.json";

/// Key of an account's repository definition.
pub fn config_key(account: &str) -> String {
    format!("{REPOSITORIES_PREFIX}/{account}/{DEFINITION_FILE}")
}

/// Key of a published repository archive.
pub fn artifact_key(account: &str, package_system: &str, timestamp: i64, archive: &str) -> String {
    format!("{REPOSITORIES_PREFIX}/{account}/{package_system}/{timestamp}-{archive}")
}

/// Repository-relative pool path of a package.
pub fn canonical_path(origin: &str, codename: &str, component: Component, basename: &str) -> String {
    format!("pool/{origin}/{codename}/{component}/{basename}")
}
