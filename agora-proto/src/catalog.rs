//! The event catalog: the piece of replicated state every replica keeps
//! in sync via the Lamport engine's RELEASE payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user known to the replica set. Read-only after bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
}

/// A single job within an event: a name and a capped list of volunteers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub nb_volunteers: u32,
    #[serde(default)]
    pub volunteer_ids: Vec<u64>,
}

impl Job {
    pub fn is_full(&self) -> bool {
        self.volunteer_ids.len() as u32 >= self.nb_volunteers
    }
}

/// An event: a name, an open/closed flag, a creator and a set of jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub closed: bool,
    pub creator_id: u64,
    pub jobs: BTreeMap<u64, Job>,
}

/// The full replicated catalog, keyed by dense event id starting at 1.
///
/// `BTreeMap` is used (rather than `HashMap`) so that two catalogs built
/// from the same sequence of mutations serialize identically, which keeps
/// REL payload diffs legible in logs and makes the convergence tests exact
/// string comparisons rather than order-insensitive ones.
pub type Catalog = BTreeMap<u64, Event>;

/// The user registry, keyed by numeric user id. Loaded once at bootstrap.
pub type Users = BTreeMap<u64, User>;

/// Domain-rule violations surfaced verbatim to the client as the command's
/// response string. These never stop the replica or the arbiter; they are
/// the "reported to client" branch of the error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    #[error("invalid number of arguments")]
    InvalidNbArgs,
    #[error("must be an integer")]
    MustBeInteger,
    #[error("number of volunteers must be an integer")]
    NbVolunteersInteger,
    #[error("access denied")]
    AccessDenied,
    #[error("unknown command")]
    UnknownCommand,
    #[error("event not found")]
    EventNotFound,
    #[error("event is closed")]
    EventClosed,
    #[error("the creator of an event cannot register for one of its jobs")]
    CreatorRegister,
    #[error("job not found")]
    JobNotFound,
    #[error("job is full")]
    JobFull,
    #[error("already registered for this job")]
    AlreadyRegistered,
    #[error("only the creator of an event can close it")]
    NotCreator,
    #[error("event is already closed")]
    AlreadyClosed,
    #[error("an event needs at least one job")]
    NoJobsGiven,
}

/// Verify a username/password pair against the registry. Mirrors the
/// original's linear scan: there is no index because `U` is small and
/// read-only after bootstrap.
pub fn verify_user(users: &Users, username: &str, password: &str) -> Option<u64> {
    users
        .iter()
        .find(|(_, u)| u.username == username && u.password == password)
        .map(|(id, _)| *id)
}

/// Resolve a user id to its display username, the way `users[id].Username`
/// is used directly in the original's `showEvent`/`showAllEvents`/`jobs`.
/// Falls back to the raw numeric id (stringified) if the registry has no
/// entry for it, which should not happen for ids drawn from the catalog.
pub fn username_of(users: &Users, user_id: u64) -> String {
    users.get(&user_id).map(|u| u.username.clone()).unwrap_or_else(|| user_id.to_string())
}

/// Create a new event, owned by `creator_id`, with the given job
/// `(name, capacity)` pairs. Returns the newly assigned event id.
pub fn create_event(
    catalog: &mut Catalog,
    name: String,
    creator_id: u64,
    job_specs: Vec<(String, u32)>,
) -> Result<u64, CommandError> {
    if job_specs.is_empty() {
        return Err(CommandError::NoJobsGiven);
    }
    let event_id = catalog.len() as u64 + 1;
    let jobs = job_specs
        .into_iter()
        .enumerate()
        .map(|(i, (name, nb_volunteers))| {
            (
                i as u64 + 1,
                Job {
                    name,
                    nb_volunteers,
                    volunteer_ids: Vec::new(),
                },
            )
        })
        .collect();
    catalog.insert(
        event_id,
        Event {
            name,
            closed: false,
            creator_id,
            jobs,
        },
    );
    Ok(event_id)
}

/// Close an event. Only the creator may close it, and only once.
pub fn close_event(catalog: &mut Catalog, event_id: u64, user_id: u64) -> Result<(), CommandError> {
    let event = catalog.get_mut(&event_id).ok_or(CommandError::EventNotFound)?;
    if event.creator_id != user_id {
        return Err(CommandError::NotCreator);
    }
    if event.closed {
        return Err(CommandError::AlreadyClosed);
    }
    event.closed = true;
    Ok(())
}

/// Register `user_id` for `job_id` within `event_id`.
///
/// If the user already volunteers for a different job in the same event,
/// they are moved: removed from the old job before being added to the new
/// one. Registering again for the exact same job is a no-op error
/// (`AlreadyRegistered`), distinct from a move.
pub fn register_user(
    catalog: &mut Catalog,
    event_id: u64,
    job_id: u64,
    user_id: u64,
) -> Result<(), CommandError> {
    let event = catalog.get_mut(&event_id).ok_or(CommandError::EventNotFound)?;
    if event.closed {
        return Err(CommandError::EventClosed);
    }
    if event.creator_id == user_id {
        return Err(CommandError::CreatorRegister);
    }
    if !event.jobs.contains_key(&job_id) {
        return Err(CommandError::JobNotFound);
    }

    let existing_job = event
        .jobs
        .iter()
        .find(|(_, job)| job.volunteer_ids.contains(&user_id))
        .map(|(id, _)| *id);

    if event.jobs.get(&job_id).expect("checked above").is_full() {
        return Err(CommandError::JobFull);
    }

    if existing_job == Some(job_id) {
        return Err(CommandError::AlreadyRegistered);
    }

    if let Some(old_job_id) = existing_job {
        let old_job = event.jobs.get_mut(&old_job_id).expect("just found");
        old_job.volunteer_ids.retain(|id| *id != user_id);
    }

    event
        .jobs
        .get_mut(&job_id)
        .expect("checked above")
        .volunteer_ids
        .push(user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        let mut jobs = BTreeMap::new();
        jobs.insert(
            1,
            Job {
                name: "setup".into(),
                nb_volunteers: 2,
                volunteer_ids: vec![10, 11],
            },
        );
        jobs.insert(
            2,
            Job {
                name: "cleanup".into(),
                nb_volunteers: 2,
                volunteer_ids: vec![],
            },
        );
        Event {
            name: "Baleinev 2023".into(),
            closed: false,
            creator_id: 1,
            jobs,
        }
    }

    #[test]
    fn register_adds_volunteer() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        register_user(&mut catalog, 2, 2, 42).unwrap();
        assert!(catalog[&2].jobs[&2].volunteer_ids.contains(&42));
    }

    #[test]
    fn register_moves_within_event() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        register_user(&mut catalog, 2, 1, 99).unwrap();
        register_user(&mut catalog, 2, 2, 99).unwrap();
        assert!(!catalog[&2].jobs[&1].volunteer_ids.contains(&99));
        assert!(catalog[&2].jobs[&2].volunteer_ids.contains(&99));
    }

    #[test]
    fn register_rejects_creator() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        let err = register_user(&mut catalog, 2, 1, 1).unwrap_err();
        assert!(matches!(err, CommandError::CreatorRegister));
    }

    #[test]
    fn register_rejects_closed_event() {
        let mut catalog = Catalog::new();
        let mut event = sample_event();
        event.closed = true;
        catalog.insert(1, event);
        let err = register_user(&mut catalog, 1, 1, 42).unwrap_err();
        assert!(matches!(err, CommandError::EventClosed));
    }

    #[test]
    fn register_rejects_full_job() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        let err = register_user(&mut catalog, 2, 1, 42).unwrap_err();
        assert!(matches!(err, CommandError::JobFull));
    }

    #[test]
    fn register_rejects_full_job_even_for_its_own_sole_volunteer() {
        let mut catalog = Catalog::new();
        let mut jobs = BTreeMap::new();
        jobs.insert(1, Job { name: "setup".into(), nb_volunteers: 1, volunteer_ids: vec![42] });
        catalog.insert(2, Event { name: "Baleinev 2023".into(), closed: false, creator_id: 1, jobs });
        let err = register_user(&mut catalog, 2, 1, 42).unwrap_err();
        assert!(matches!(err, CommandError::JobFull));
    }

    #[test]
    fn register_rejects_duplicate() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        register_user(&mut catalog, 2, 2, 42).unwrap();
        let err = register_user(&mut catalog, 2, 2, 42).unwrap_err();
        assert!(matches!(err, CommandError::AlreadyRegistered));
    }

    #[test]
    fn close_requires_creator() {
        let mut catalog = Catalog::new();
        catalog.insert(2, sample_event());
        let err = close_event(&mut catalog, 2, 99).unwrap_err();
        assert!(matches!(err, CommandError::NotCreator));
        close_event(&mut catalog, 2, 1).unwrap();
        assert!(catalog[&2].closed);
        let err = close_event(&mut catalog, 2, 1).unwrap_err();
        assert!(matches!(err, CommandError::AlreadyClosed));
    }

    #[test]
    fn create_assigns_dense_ids() {
        let mut catalog = Catalog::new();
        let id1 = create_event(&mut catalog, "First".into(), 1, vec![("a".into(), 1)]).unwrap();
        let id2 = create_event(&mut catalog, "Second".into(), 1, vec![("b".into(), 1)]).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
    }

    #[test]
    fn create_requires_at_least_one_job() {
        let mut catalog = Catalog::new();
        let err = create_event(&mut catalog, "Empty".into(), 1, vec![]).unwrap_err();
        assert!(matches!(err, CommandError::NoJobsGiven));
    }
}
