//! Command-specific business rules: parsing a command's arguments,
//! running its effect against the catalog (if any), and formatting its
//! response string. These are the "external collaborator" rules the core
//! dispatches to — the arbiter and engine know nothing about their
//! content, only whether a command needs the lock.

use agora_proto::catalog::{self, Catalog, CommandError, Users};
use agora_proto::colors::{self, GREEN, RED, YELLOW};
use agora_proto::commands;

/// The result of running a command: the response string to write back to
/// the client, and — for lock-requiring commands — the mutated catalog to
/// publish via RELEASE. Read-only and failed commands return `None` for
/// the catalog half, signalling "nothing changed, don't republish".
pub struct Outcome {
    pub response: String,
    pub mutated_catalog: Option<Catalog>,
}

impl Outcome {
    fn unchanged(response: impl Into<String>) -> Self {
        Outcome {
            response: response.into(),
            mutated_catalog: None,
        }
    }

    fn mutated(response: impl Into<String>, catalog: Catalog) -> Self {
        Outcome {
            response: response.into(),
            mutated_catalog: Some(catalog),
        }
    }
}

fn parse_u64(s: &str, err: CommandError) -> Result<u64, CommandError> {
    s.parse::<u64>().map_err(|_| err)
}

/// `help` — no lock, no catalog access.
pub fn help() -> Outcome {
    Outcome::unchanged(commands::HELP_TEXT)
}

/// `create <name> <job> <capacity> [<job> <capacity> ...]`, run under the
/// critical section with `catalog` as the freshly granted snapshot.
pub fn create(
    mut catalog: Catalog,
    users: &Users,
    args: &[String],
    username: &str,
    password: &str,
) -> Outcome {
    let user_id = match catalog::verify_user(users, username, password) {
        Some(id) => id,
        None => return Outcome::unchanged(CommandError::AccessDenied.to_string()),
    };

    if args.is_empty() {
        return Outcome::unchanged(CommandError::InvalidNbArgs.to_string());
    }
    let name = args[0].clone();
    let rest = &args[1..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Outcome::unchanged(CommandError::InvalidNbArgs.to_string());
    }

    let mut job_specs = Vec::new();
    for pair in rest.chunks(2) {
        let job_name = pair[0].clone();
        let capacity = match pair[1].parse::<u32>() {
            Ok(c) => c,
            Err(_) => return Outcome::unchanged(CommandError::NbVolunteersInteger.to_string()),
        };
        job_specs.push((job_name, capacity));
    }

    match catalog::create_event(&mut catalog, name, user_id, job_specs) {
        Ok(event_id) => Outcome::mutated(format!("event {event_id} created"), catalog),
        Err(e) => Outcome::unchanged(e.to_string()),
    }
}

/// `close <event_id> <username> <password>`.
pub fn close(mut catalog: Catalog, users: &Users, args: &[String], username: &str, password: &str) -> Outcome {
    let user_id = match catalog::verify_user(users, username, password) {
        Some(id) => id,
        None => return Outcome::unchanged(CommandError::AccessDenied.to_string()),
    };
    let event_id = match args.first().map(|s| parse_u64(s, CommandError::MustBeInteger)) {
        Some(Ok(id)) => id,
        Some(Err(e)) => return Outcome::unchanged(e.to_string()),
        None => return Outcome::unchanged(CommandError::InvalidNbArgs.to_string()),
    };

    match catalog::close_event(&mut catalog, event_id, user_id) {
        Ok(()) => Outcome::mutated(format!("event {event_id} closed"), catalog),
        Err(e) => Outcome::unchanged(e.to_string()),
    }
}

/// `register <event_id> <job_id> <username> <password>`.
pub fn register(mut catalog: Catalog, users: &Users, args: &[String], username: &str, password: &str) -> Outcome {
    let user_id = match catalog::verify_user(users, username, password) {
        Some(id) => id,
        None => return Outcome::unchanged(CommandError::AccessDenied.to_string()),
    };
    if args.len() < 2 {
        return Outcome::unchanged(CommandError::InvalidNbArgs.to_string());
    }
    let event_id = match parse_u64(&args[0], CommandError::MustBeInteger) {
        Ok(id) => id,
        Err(e) => return Outcome::unchanged(e.to_string()),
    };
    let job_id = match parse_u64(&args[1], CommandError::MustBeInteger) {
        Ok(id) => id,
        Err(e) => return Outcome::unchanged(e.to_string()),
    };

    match catalog::register_user(&mut catalog, event_id, job_id, user_id) {
        Ok(()) => Outcome::mutated(format!("registered for job {job_id} in event {event_id}"), catalog),
        Err(e) => Outcome::unchanged(e.to_string()),
    }
}

/// `show [event_id]` — no lock; reads whatever catalog snapshot the
/// arbiter currently holds.
pub fn show(catalog: &Catalog, users: &Users, args: &[String]) -> Outcome {
    if let Some(arg) = args.first() {
        let event_id = match parse_u64(arg, CommandError::MustBeInteger) {
            Ok(id) => id,
            Err(e) => return Outcome::unchanged(e.to_string()),
        };
        return Outcome::unchanged(show_one(catalog, users, event_id));
    }
    Outcome::unchanged(show_all(catalog, users))
}

fn show_all(catalog: &Catalog, users: &Users) -> String {
    if catalog.is_empty() {
        return "no events yet".to_string();
    }
    let mut out = String::new();
    for (id, event) in catalog {
        let status = if event.closed {
            colors::paint(RED, "closed")
        } else {
            colors::paint(GREEN, "open")
        };
        let creator = catalog::username_of(users, event.creator_id);
        out.push_str(&format!("{id}: {} [{status}] (creator {creator})\n", event.name));
    }
    out
}

fn show_one(catalog: &Catalog, users: &Users, event_id: u64) -> String {
    let Some(event) = catalog.get(&event_id) else {
        return CommandError::EventNotFound.to_string();
    };
    let status = if event.closed {
        colors::paint(RED, "closed")
    } else {
        colors::paint(GREEN, "open")
    };
    let creator = catalog::username_of(users, event.creator_id);
    let mut out = format!("{event_id}: {} [{status}] (creator {creator})\n", event.name);
    for (job_id, job) in &event.jobs {
        let ratio_color = if job.is_full() { RED } else { GREEN };
        let ratio = colors::paint(ratio_color, &format!("{}/{}", job.volunteer_ids.len(), job.nb_volunteers));
        out.push_str(&format!("  job {job_id}: {} [{ratio}]\n", job.name));
    }
    out
}

/// `jobs <event_id>` — a volunteer × job table, one row per distinct
/// volunteer, with a check mark under the job(s) they hold.
pub fn jobs(catalog: &Catalog, users: &Users, args: &[String]) -> Outcome {
    let Some(arg) = args.first() else {
        return Outcome::unchanged(CommandError::InvalidNbArgs.to_string());
    };
    let event_id = match parse_u64(arg, CommandError::MustBeInteger) {
        Ok(id) => id,
        Err(e) => return Outcome::unchanged(e.to_string()),
    };
    let Some(event) = catalog.get(&event_id) else {
        return Outcome::unchanged(CommandError::EventNotFound.to_string());
    };

    let mut job_ids: Vec<u64> = event.jobs.keys().copied().collect();
    job_ids.sort_unstable();

    let mut volunteers: Vec<u64> = event
        .jobs
        .values()
        .flat_map(|j| j.volunteer_ids.iter().copied())
        .collect();
    volunteers.sort_unstable();
    volunteers.dedup();

    if volunteers.is_empty() {
        return Outcome::unchanged(colors::paint(YELLOW, "no volunteers yet"));
    }

    let mut header = String::from("user");
    for job_id in &job_ids {
        header.push_str(&format!("\t{}", event.jobs[job_id].name));
    }
    let mut out = format!("{header}\n");
    for user_id in volunteers {
        let mut row = catalog::username_of(users, user_id);
        for job_id in &job_ids {
            let mark = if event.jobs[job_id].volunteer_ids.contains(&user_id) {
                "x"
            } else {
                ""
            };
            row.push_str(&format!("\t{mark}"));
        }
        out.push_str(&row);
        out.push('\n');
    }
    Outcome::unchanged(out)
}
