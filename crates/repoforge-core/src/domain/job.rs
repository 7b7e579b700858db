//! Build jobs: what to add to and remove from an account's repositories.
//!
//! The `add`/`remove` sets arrive as nested JSON objects
//! (`origin -> codename -> [package-ref]`). Their key order is significant:
//! packages are ingested and folded into the definition in job order, so the
//! objects decode into ordered groups rather than maps.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::artifact::JobResult;
use super::error::{PipelineError, ValidationError};

/// Object-store key of an uploaded package blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRef(String);

impl PackageRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment of the key.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lowercased file extension of the basename; this is the package system.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.basename())
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Packages for one release codename of an origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodenameGroup {
    pub codename: String,
    pub packages: Vec<PackageRef>,
}

/// All codenames listed for one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginGroup {
    pub origin: String,
    pub codenames: Vec<CodenameGroup>,
}

/// One `(origin, codename, package)` triple of a package set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listing<'a> {
    pub origin: &'a str,
    pub codename: &'a str,
    pub package: &'a PackageRef,
}

/// Ordered `origin -> codename -> [package-ref]` set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageGroups(Vec<OriginGroup>);

impl PackageGroups {
    pub fn new(origins: Vec<OriginGroup>) -> Self {
        Self(origins)
    }

    pub fn origins(&self) -> &[OriginGroup] {
        &self.0
    }

    /// Every listed package in job order.
    pub fn listings(&self) -> impl Iterator<Item = Listing<'_>> {
        self.0.iter().flat_map(|origin| {
            origin.codenames.iter().flat_map(move |codename| {
                codename.packages.iter().map(move |package| Listing {
                    origin: &origin.origin,
                    codename: &codename.codename,
                    package,
                })
            })
        })
    }

    /// Number of listed packages (a package listed under two codenames counts twice).
    pub fn len(&self) -> usize {
        self.listings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(String, String, PackageRef)> for PackageGroups {
    /// Build groups from `(origin, codename, package)` triples, keeping
    /// first-seen order of origins and codenames.
    fn from_iter<T: IntoIterator<Item = (String, String, PackageRef)>>(iter: T) -> Self {
        let mut origins: Vec<OriginGroup> = Vec::new();
        for (origin, codename, package) in iter {
            let origin_group = match origins.iter().position(|o| o.origin == origin) {
                Some(idx) => &mut origins[idx],
                None => {
                    origins.push(OriginGroup {
                        origin,
                        codenames: Vec::new(),
                    });
                    let last = origins.len() - 1;
                    &mut origins[last]
                }
            };
            match origin_group
                .codenames
                .iter_mut()
                .find(|c| c.codename == codename)
            {
                Some(group) => group.packages.push(package),
                None => origin_group.codenames.push(CodenameGroup {
                    codename,
                    packages: vec![package],
                }),
            }
        }
        Self(origins)
    }
}

/// JSON object decoded as a list of entries in document order.
struct OrderedMap<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

impl<'de> Deserialize<'de> for PackageGroups {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let origins = OrderedMap::<OrderedMap<Vec<PackageRef>>>::deserialize(deserializer)?;
        Ok(Self(
            origins
                .0
                .into_iter()
                .map(|(origin, codenames)| OriginGroup {
                    origin,
                    codenames: codenames
                        .0
                        .into_iter()
                        .map(|(codename, packages)| CodenameGroup { codename, packages })
                        .collect(),
                })
                .collect(),
        ))
    }
}

impl Serialize for PackageGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Codenames<'a>(&'a [CodenameGroup]);

        impl Serialize for Codenames<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for group in self.0 {
                    map.serialize_entry(&group.codename, &group.packages)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for origin in &self.0 {
            map.serialize_entry(&origin.origin, &Codenames(&origin.codenames))?;
        }
        map.end()
    }
}

/// Account the job publishes under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A repository build job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    /// Unique job id; names the job's workspace directory.
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<PackageGroups>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<PackageGroups>,

    /// Signing key reference; overrides the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Attached by the pipeline on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_account(mut self, name: impl Into<String>) -> Self {
        self.account = Some(Account {
            name: Some(name.into()),
        });
        self
    }

    pub fn with_add(mut self, add: PackageGroups) -> Self {
        self.add = Some(add);
        self
    }

    pub fn with_remove(mut self, remove: PackageGroups) -> Self {
        self.remove = Some(remove);
        self
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Account name, or `default` when the job names none.
    pub fn account_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.account
            .as_ref()
            .and_then(|account| account.name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(default)
    }

    /// Listings to add, in job order.
    pub fn additions(&self) -> impl Iterator<Item = Listing<'_>> {
        self.add.iter().flat_map(|groups| groups.listings())
    }

    /// Listings to remove, in job order.
    pub fn removals(&self) -> impl Iterator<Item = Listing<'_>> {
        self.remove.iter().flat_map(|groups| groups.listings())
    }

    /// Check everything that can be checked before touching any storage.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.add.is_none() && self.remove.is_none() {
            return Err(ValidationError::NothingToDo.into());
        }
        if !is_safe_segment(&self.id) {
            return Err(ValidationError::InvalidJobId {
                id: self.id.clone(),
            }
            .into());
        }
        if let Some(name) = self.account.as_ref().and_then(|a| a.name.as_deref()) {
            if !name.trim().is_empty() && !is_safe_segment(name) {
                return Err(ValidationError::InvalidAccount {
                    name: name.to_string(),
                }
                .into());
            }
        }

        let mut staged: HashMap<(&str, &str), &PackageRef> = HashMap::new();
        for listing in self.additions() {
            let basename = listing.package.basename();
            if listing.package.extension().is_none() {
                return Err(ValidationError::MissingExtension {
                    package: listing.package.to_string(),
                }
                .into());
            }
            if !is_safe_segment(listing.origin) {
                return Err(ValidationError::InvalidOrigin {
                    origin: listing.origin.to_string(),
                }
                .into());
            }
            match staged.get(&(listing.origin, basename)) {
                Some(existing) if *existing != listing.package => {
                    return Err(ValidationError::DuplicatePackage {
                        origin: listing.origin.to_string(),
                        basename: basename.to_string(),
                        first: existing.to_string(),
                        second: listing.package.to_string(),
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    staged.insert((listing.origin, basename), listing.package);
                }
            }
        }
        Ok(())
    }
}

/// Non-empty, no separators, not `.` or `..`.
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
        && !segment.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(json: &str) -> PackageGroups {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decoding_preserves_document_order() {
        let add = groups(
            r#"{
                "zeta": {"unstable": ["z/b.deb"], "stable": ["z/a.deb"]},
                "acme": {"stable": ["a/c.rpm", "a/b.rpm"]}
            }"#,
        );
        let order: Vec<(&str, &str, &str)> = add
            .listings()
            .map(|l| (l.origin, l.codename, l.package.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("zeta", "unstable", "z/b.deb"),
                ("zeta", "stable", "z/a.deb"),
                ("acme", "stable", "a/c.rpm"),
                ("acme", "stable", "a/b.rpm"),
            ]
        );
    }

    #[test]
    fn serializing_keeps_group_order() {
        let add = groups(r#"{"b": {"x": ["k/1.deb"]}, "a": {"y": ["k/2.deb"]}}"#);
        let json = serde_json::to_string(&add).unwrap();
        assert_eq!(json, r#"{"b":{"x":["k/1.deb"]},"a":{"y":["k/2.deb"]}}"#);
    }

    #[test]
    fn package_ref_derives_basename_and_system() {
        let pkg = PackageRef::new("pkgs/acme/App-1.0.0.DEB");
        assert_eq!(pkg.basename(), "App-1.0.0.DEB");
        assert_eq!(pkg.extension().as_deref(), Some("deb"));
        assert_eq!(PackageRef::new("plain").extension(), None);
        assert_eq!(PackageRef::new("trailing.").extension(), None);
    }

    #[test]
    fn account_name_falls_back_to_default() {
        assert_eq!(Job::new("j").account_name("default"), "default");
        assert_eq!(
            Job::new("j").with_account("hw").account_name("default"),
            "hw"
        );
        let blank = Job {
            account: Some(Account {
                name: Some("  ".into()),
            }),
            ..Job::new("j")
        };
        assert_eq!(blank.account_name("default"), "default");
    }

    #[test]
    fn validate_requires_add_or_remove() {
        let err = Job::new("job-1").validate().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::NothingToDo)
        ));

        // An empty add set is still a valid job.
        Job::new("job-1")
            .with_add(PackageGroups::default())
            .validate()
            .unwrap();
        Job::new("job-1")
            .with_remove(PackageGroups::default())
            .validate()
            .unwrap();
    }

    #[test]
    fn validate_rejects_unsafe_ids() {
        for id in ["", ".", "..", "a/b", "..\\x"] {
            let err = Job::new(id)
                .with_add(PackageGroups::default())
                .validate()
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    PipelineError::Validation(ValidationError::InvalidJobId { .. })
                ),
                "{id:?}"
            );
        }
    }

    #[test]
    fn validate_rejects_package_without_extension() {
        let job = Job::new("j").with_add(groups(r#"{"acme": {"stable": ["pkgs/README"]}}"#));
        assert!(matches!(
            job.validate(),
            Err(PipelineError::Validation(
                ValidationError::MissingExtension { .. }
            ))
        ));
    }

    #[test]
    fn validate_detects_basename_conflicts_within_origin() {
        let job = Job::new("j").with_add(groups(
            r#"{"acme": {"stable": ["a/app.deb"], "unstable": ["b/app.deb"]}}"#,
        ));
        match job.validate() {
            Err(PipelineError::Validation(ValidationError::DuplicatePackage {
                origin,
                basename,
                ..
            })) => {
                assert_eq!(origin, "acme");
                assert_eq!(basename, "app.deb");
            }
            other => panic!("expected DuplicatePackage, got {other:?}"),
        }
    }

    #[test]
    fn validate_allows_same_ref_across_codenames_and_origins() {
        let job = Job::new("j").with_add(groups(
            r#"{
                "acme": {"stable": ["a/app.deb"], "unstable": ["a/app.deb"]},
                "other": {"stable": ["b/app.deb"]}
            }"#,
        ));
        job.validate().unwrap();
    }

    #[test]
    fn groups_collect_from_triples() {
        let built: PackageGroups = vec![
            ("acme".to_string(), "stable".to_string(), PackageRef::new("a.deb")),
            ("zeta".to_string(), "stable".to_string(), PackageRef::new("z.deb")),
            ("acme".to_string(), "stable".to_string(), PackageRef::new("b.deb")),
        ]
        .into_iter()
        .collect();
        assert_eq!(built.origins().len(), 2);
        assert_eq!(built.origins()[0].codenames[0].packages.len(), 2);
        assert_eq!(built.len(), 3);
    }

    #[test]
    fn job_decodes_from_upstream_payload() {
        let job: Job = serde_json::from_str(
            r#"{
                "id": "job-42",
                "account": {"name": "hw"},
                "add": {"acme": {"stable": ["pkgs/app-1.0.0.deb"]}},
                "signing_key": "ABCD"
            }"#,
        )
        .unwrap();
        assert_eq!(job.account_name("default"), "hw");
        assert_eq!(job.additions().count(), 1);
        assert_eq!(job.removals().count(), 0);
        assert_eq!(job.signing_key.as_deref(), Some("ABCD"));
        assert!(job.result.is_none());
    }
}
