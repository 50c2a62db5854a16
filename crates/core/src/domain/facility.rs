use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FacilityId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubclusterId(pub String);

/// Operating function a facility performs. A multi-function facility raises
/// stress separately for each function it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityFunction {
    FmPickup,
    LmDelivery,
    RtoDto,
    RvpFacility,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Facility,
    Route,
    Subcluster,
    Pincode,
}

impl FacilityFunction {
    pub const ALL: [FacilityFunction; 4] =
        [Self::FmPickup, Self::LmDelivery, Self::RtoDto, Self::RvpFacility];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FmPickup => "fm_pickup",
            Self::LmDelivery => "lm_delivery",
            Self::RtoDto => "rto_dto",
            Self::RvpFacility => "rvp_facility",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "fm_pickup" => Some(Self::FmPickup),
            "lm_delivery" => Some(Self::LmDelivery),
            "rto_dto" => Some(Self::RtoDto),
            "rvp_facility" => Some(Self::RvpFacility),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FmPickup => "FM Pickup",
            Self::LmDelivery => "LM Delivery",
            Self::RtoDto => "RTO/DTO",
            Self::RvpFacility => "RVP Facility",
        }
    }

    /// Stress levels an operator may raise under this function.
    pub fn allowed_levels(&self) -> &'static [StressLevel] {
        use StressLevel::{Facility, Pincode, Route, Subcluster};

        match self {
            Self::FmPickup | Self::RtoDto => &[Facility, Route, Pincode],
            Self::LmDelivery => &[Facility, Subcluster, Pincode],
            Self::RvpFacility => &[Facility, Pincode],
        }
    }

    pub fn allows(&self, level: StressLevel) -> bool {
        self.allowed_levels().contains(&level)
    }
}

impl fmt::Display for FacilityFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facility => "facility",
            Self::Route => "route",
            Self::Subcluster => "subcluster",
            Self::Pincode => "pincode",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "facility" => Some(Self::Facility),
            "route" => Some(Self::Route),
            "subcluster" => Some(Self::Subcluster),
            "pincode" => Some(Self::Pincode),
            _ => None,
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    pub available_functions: Vec<FacilityFunction>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub assigned_head_id: Option<UserId>,
    #[serde(default)]
    pub pincodes: Vec<String>,
}

impl Facility {
    pub fn performs(&self, function: FacilityFunction) -> bool {
        self.available_functions.contains(&function)
    }

    pub fn serves_pincode(&self, pincode: &str) -> bool {
        let pincode = pincode.trim();
        self.pincodes.iter().any(|served| served == pincode)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcluster {
    pub id: SubclusterId,
    pub name: String,
}

fn normalize(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' || ch == '/' { '_' } else { ch })
        .collect()
}
