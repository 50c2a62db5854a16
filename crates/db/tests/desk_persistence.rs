use chrono::{DateTime, Days, NaiveDate, Utc};

use stressless_core::config::EngineConfig;
use stressless_core::directory::Directory;
use stressless_core::domain::facility::{FacilityFunction, FacilityId};
use stressless_core::domain::request::{RequestStatus, StressScope};
use stressless_core::domain::user::{Actor, UserId, UserRole};
use stressless_core::{DeskCall, StressDesk, StressSubmission, TransitionKind};
use stressless_db::{
    connect_with_settings, migrations, DbPool, DemoSeed, NotificationRepository,
    SqlNotificationRepository, SqlStressRequestRepository, StressRequestRepository,
};

type DeskTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn migrated_pool() -> DeskTestResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect failed: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrations failed: {error}"))?;
    Ok(pool)
}

async fn open_desk(pool: &DbPool) -> DeskTestResult<StressDesk> {
    StressDesk::open(Directory::demo(), &EngineConfig::default(), DemoSeed::sinks(pool))
        .await
        .map_err(|error| format!("desk open failed: {error}"))
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn days_after(date: NaiveDate, days: u64) -> DeskTestResult<NaiveDate> {
    date.checked_add_days(Days::new(days)).ok_or_else(|| format!("{date} + {days} overflowed"))
}

fn lm_submission(start_date: NaiveDate, extension_days: u32) -> StressSubmission {
    StressSubmission {
        facility_id: FacilityId("facility-2".to_owned()),
        facility_function: FacilityFunction::LmDelivery,
        scope: StressScope::Pincode("411002".to_owned()),
        start_date,
        extension_days,
        reason: "Festive Surge".to_owned(),
    }
}

#[tokio::test]
async fn merge_survives_a_desk_restart() -> DeskTestResult {
    let pool = migrated_pool().await?;
    let now = now();
    let today = now.date_naive();
    let ops = DeskCall::new(Actor::new("user-ops-1", UserRole::Ops), now);
    let head = DeskCall::new(
        Actor::new("user-fh-lm", UserRole::FacilityHead).with_facility("facility-2"),
        now,
    );
    let admin = DeskCall::new(Actor::new("user-admin-1", UserRole::Administrator), now);

    let first_id = {
        let desk = open_desk(&pool).await?;
        let first = desk
            .submit(lm_submission(today, 4), &ops)
            .await
            .map_err(|error| format!("first submit failed: {error}"))?
            .request_id;
        desk.approve(&first, None, &admin)
            .await
            .map_err(|error| format!("first approve failed: {error}"))?;
        first
    };

    let desk = open_desk(&pool).await?;
    let second = desk
        .submit(lm_submission(days_after(today, 3)?, 6), &head)
        .await
        .map_err(|error| format!("second submit failed: {error}"))?
        .request_id;
    let transition = desk
        .approve(&second, Some("extend".to_owned()), &admin)
        .await
        .map_err(|error| format!("second approve failed: {error}"))?;

    require_eq!(transition.kind, TransitionKind::Merged { surviving_id: first_id.clone() });

    let requests = SqlStressRequestRepository::new(pool.clone());
    let survivor = requests
        .find_by_id(&first_id)
        .await
        .map_err(|error| format!("load survivor failed: {error}"))?
        .ok_or("survivor missing")?;
    require_eq!(survivor.status, RequestStatus::Approved);
    require_eq!(survivor.end_date(), days_after(today, 9)?);
    require!(survivor.version >= 3, "survivor version should advance, got {}", survivor.version);

    let merged = requests
        .find_by_id(&second)
        .await
        .map_err(|error| format!("load merged failed: {error}"))?
        .ok_or("merged missing")?;
    require_eq!(merged.status, RequestStatus::Merged);
    require_eq!(merged.merged_into, Some(first_id.clone()));

    let inbox = SqlNotificationRepository::new(pool.clone())
        .list_for_recipient(&UserId("user-ops-1".to_owned()), true)
        .await
        .map_err(|error| format!("inbox failed: {error}"))?;
    require!(
        inbox.iter().any(|notification| notification.message.contains("New end date")),
        "original submitter should hear about the extension: {inbox:?}"
    );
    Ok(())
}

#[tokio::test]
async fn extension_ceiling_persists_across_restarts() -> DeskTestResult {
    let pool = migrated_pool().await?;
    let admin = DeskCall::new(Actor::new("user-admin-1", UserRole::Administrator), now());

    {
        let desk = open_desk(&pool).await?;
        require_eq!(desk.max_extension_days().await, 30);
        desk.set_max_extension_days(10, &admin)
            .await
            .map_err(|error| format!("set ceiling failed: {error}"))?;
    }

    let desk = open_desk(&pool).await?;
    require_eq!(desk.max_extension_days().await, 10);

    let ops = DeskCall::new(Actor::new("user-ops-1", UserRole::Ops), now());
    let rejected = desk.submit(lm_submission(now().date_naive(), 11), &ops).await;
    require!(rejected.is_err(), "an 11-day request must exceed the stored ceiling");
    Ok(())
}
