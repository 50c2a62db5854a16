//! Static reference data: facilities, routes, subclusters, and user accounts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::facility::{
    Facility, FacilityFunction, FacilityId, Route, RouteId, Subcluster, SubclusterId,
};
use crate::domain::user::{User, UserId, UserRole};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("could not read directory file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse directory file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("directory is inconsistent: {0}")]
    Inconsistent(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDocument {
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub subclusters: Vec<Subcluster>,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Clone, Debug, Default)]
pub struct Directory {
    facilities: BTreeMap<FacilityId, Facility>,
    routes: BTreeMap<RouteId, Route>,
    subclusters: BTreeMap<SubclusterId, Subcluster>,
    users: BTreeMap<UserId, User>,
}

impl Directory {
    pub fn from_document(document: DirectoryDocument) -> Result<Self, DirectoryError> {
        let directory = Self::index(document);
        directory.check_references()?;
        Ok(directory)
    }

    fn index(document: DirectoryDocument) -> Self {
        Self {
            facilities: document.facilities.into_iter().map(|f| (f.id.clone(), f)).collect(),
            routes: document.routes.into_iter().map(|r| (r.id.clone(), r)).collect(),
            subclusters: document.subclusters.into_iter().map(|s| (s.id.clone(), s)).collect(),
            users: document.users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| DirectoryError::ReadFile { path: path.to_path_buf(), source })?;
        let document = toml::from_str::<DirectoryDocument>(&raw)
            .map_err(|source| DirectoryError::ParseFile { path: path.to_path_buf(), source })?;
        Self::from_document(document)
    }

    fn check_references(&self) -> Result<(), DirectoryError> {
        for facility in self.facilities.values() {
            if facility.available_functions.is_empty() {
                return Err(DirectoryError::Inconsistent(format!(
                    "facility `{}` has no operating functions",
                    facility.id.0
                )));
            }
            if let Some(head_id) = &facility.assigned_head_id {
                if !self.users.contains_key(head_id) {
                    return Err(DirectoryError::Inconsistent(format!(
                        "facility `{}` references unknown head `{}`",
                        facility.id.0, head_id.0
                    )));
                }
            }
        }

        for user in self.users.values() {
            if let Some(facility_id) = &user.assigned_facility_id {
                if !self.facilities.contains_key(facility_id) {
                    return Err(DirectoryError::Inconsistent(format!(
                        "user `{}` is assigned to unknown facility `{}`",
                        user.id.0, facility_id.0
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn facility(&self, id: &FacilityId) -> Option<&Facility> {
        self.facilities.get(id)
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn subcluster(&self, id: &SubclusterId) -> Option<&Subcluster> {
        self.subclusters.get(id)
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn facilities(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn administrators(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|user| user.role == UserRole::Administrator)
    }

    /// Facility display name, falling back to the raw id for unknown facilities.
    pub fn facility_name<'a>(&'a self, id: &'a FacilityId) -> &'a str {
        self.facility(id).map(|facility| facility.name.as_str()).unwrap_or(&id.0)
    }

    /// Reference dataset used by `seed` and by tests: six facilities across
    /// the four operating functions, one head per primary facility.
    pub fn demo() -> Self {
        use FacilityFunction::{FmPickup, LmDelivery, RtoDto, RvpFacility};

        let facility = |id: &str,
                        name: &str,
                        functions: &[FacilityFunction],
                        address: &str,
                        head: Option<&str>,
                        pincodes: &[&str]| Facility {
            id: FacilityId(id.to_owned()),
            name: name.to_owned(),
            available_functions: functions.to_vec(),
            address: address.to_owned(),
            assigned_head_id: head.map(|head| UserId(head.to_owned())),
            pincodes: pincodes.iter().map(|pincode| (*pincode).to_owned()).collect(),
        };
        let user = |id: &str, name: &str, role: UserRole, facility: Option<&str>| User {
            id: UserId(id.to_owned()),
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_ascii_lowercase()),
            role,
            assigned_facility_id: facility.map(|facility| FacilityId(facility.to_owned())),
        };
        let route = |id: &str, name: &str, kind: &str| Route {
            id: RouteId(id.to_owned()),
            name: name.to_owned(),
            kind: kind.to_owned(),
        };
        let subcluster = |id: &str, name: &str| Subcluster {
            id: SubclusterId(id.to_owned()),
            name: name.to_owned(),
        };

        let document = DirectoryDocument {
            facilities: vec![
                facility(
                    "facility-1",
                    "PNQ/KHR",
                    &[FmPickup, RtoDto],
                    "123 North St, Anytown",
                    Some("user-fh-fm"),
                    &["411018"],
                ),
                facility(
                    "facility-2",
                    "PNQ/CHK",
                    &[LmDelivery],
                    "456 South Ave, Anytown",
                    Some("user-fh-lm"),
                    &["411001", "411002", "411003", "411014"],
                ),
                facility(
                    "facility-3",
                    "DEL/PTD",
                    &[RtoDto],
                    "789 East Rd, Anytown",
                    Some("user-fh-rto"),
                    &["110001"],
                ),
                facility(
                    "facility-4",
                    "PNQ/Dummy",
                    &[RvpFacility],
                    "101 West Ln, Anytown",
                    Some("user-fh-rvp"),
                    &["411019", "411020"],
                ),
                facility("facility-5", "MUM/BHW", &[FmPickup], "202 Center Blvd", None, &["400001"]),
                facility("facility-6", "PUN/WAK", &[LmDelivery], "777 Wakad Rd, Pune", None, &["411057"]),
            ],
            routes: vec![
                route("route-fm-1", "FM Route Alpha", "Pickup"),
                route("route-fm-2", "FM Route Beta", "Pickup"),
                route("route-rto-1", "RTO Route Gamma", "Transfer"),
                route("route-rto-2", "RTO Route Delta", "Transfer"),
            ],
            subclusters: vec![
                subcluster("sc-central", "Central Subcluster"),
                subcluster("sc-north", "North Subcluster"),
                subcluster("sc-south", "South Subcluster"),
                subcluster("sc-east", "East Subcluster"),
                subcluster("sc-west", "West Subcluster"),
            ],
            users: vec![
                user("user-ops-1", "Subham", UserRole::Ops, None),
                user("user-fh-fm", "Parag", UserRole::FacilityHead, Some("facility-1")),
                user("user-fh-lm", "Ankush", UserRole::FacilityHead, Some("facility-2")),
                user("user-fh-rto", "Priya", UserRole::FacilityHead, Some("facility-3")),
                user("user-fh-rvp", "Mohan", UserRole::FacilityHead, Some("facility-4")),
                user("user-admin-1", "Raman", UserRole::Administrator, None),
            ],
        };

        Self::index(document)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{Directory, DirectoryDocument, DirectoryError};
    use crate::domain::facility::{FacilityFunction, FacilityId};
    use crate::domain::user::{UserId, UserRole};

    #[test]
    fn demo_directory_is_self_consistent() {
        let demo = Directory::demo();
        assert!(demo.check_references().is_ok());
        assert_eq!(demo.administrators().count(), 1);

        let khr = demo.facility(&FacilityId("facility-1".to_owned())).expect("facility-1");
        assert!(khr.performs(FacilityFunction::RtoDto));
        assert!(khr.serves_pincode("411018"));
        assert!(!khr.serves_pincode("411001"));
    }

    #[test]
    fn load_reads_toml_document() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("directory.toml");
        fs::write(
            &path,
            r#"
[[facilities]]
id = "hub-9"
name = "BLR/HUB"
available_functions = ["lm_delivery"]
pincodes = ["560001"]
assigned_head_id = "head-9"

[[subclusters]]
id = "sc-blr"
name = "Bangalore Central"

[[users]]
id = "head-9"
name = "Asha"
role = "facility_head"
assigned_facility_id = "hub-9"

[[users]]
id = "admin-9"
name = "Vikram"
role = "administrator"
"#,
        )
        .expect("write directory");

        let directory = Directory::load(&path).expect("load directory");
        let hub = directory.facility(&FacilityId("hub-9".to_owned())).expect("hub");
        assert_eq!(hub.available_functions, vec![FacilityFunction::LmDelivery]);
        assert_eq!(
            directory.user(&UserId("head-9".to_owned())).map(|user| user.role),
            Some(UserRole::FacilityHead)
        );
        assert_eq!(directory.administrators().count(), 1);
    }

    #[test]
    fn dangling_assignment_is_rejected() {
        let mut document = DirectoryDocument::default();
        document.users.push(crate::domain::user::User {
            id: UserId("head-x".to_owned()),
            name: "Nobody".to_owned(),
            email: String::new(),
            role: UserRole::FacilityHead,
            assigned_facility_id: Some(FacilityId("missing".to_owned())),
        });

        let error = Directory::from_document(document).expect_err("dangling facility");
        assert!(matches!(error, DirectoryError::Inconsistent(ref message) if message.contains("missing")));
    }
}
