pub mod audit;
pub mod config;
pub mod desk;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod ports;
pub mod scope;
pub mod settings;
pub mod window;

pub use desk::{DeliveryPolicy, DeskCall, DeskSinks, StressDesk};
pub use directory::{Directory, DirectoryDocument, DirectoryError};
pub use domain::facility::{
    Facility, FacilityFunction, FacilityId, Route, RouteId, StressLevel, Subcluster, SubclusterId,
};
pub use domain::notification::{Notification, NotificationId};
pub use domain::request::{
    Disposition, RequestStatus, StressRequest, StressRequestId, StressScope, TrailAction,
    TrailEntry,
};
pub use domain::user::{Actor, User, UserId, UserRole};
pub use errors::{
    ApplicationError, AuthorizationError, EngineError, InterfaceError, ValidationError,
};
pub use lifecycle::{StressEngine, StressSubmission, Transition, TransitionKind};
pub use notify::{NotificationIntent, NotificationSink};
pub use ports::{RequestStore, SettingsStore, SinkError};
pub use scope::ScopeKey;
pub use window::StressWindow;
