//! The command registry shared by the client (which appends credentials
//! and validates minimal shape) and the server's arbiter (which classifies
//! each command as lock-free or lock-requiring and validates argument
//! counts before a handler ever runs).

/// A command's static shape: whether it needs credentials, and how many
/// positional arguments it requires at minimum.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Requires a trailing `<username> <password>` pair appended by the
    /// client before the line is sent.
    pub auth: bool,
    /// Minimum number of positional arguments, not counting credentials.
    pub min_args: usize,
    /// For commands whose trailing arguments come in repeated pairs (only
    /// `create`'s job/capacity pairs today), the minimum number of pairs
    /// required. `None` for commands with no repeated-pair tail.
    pub min_opt_pairs: Option<usize>,
    /// Whether this command requires the distributed lock.
    pub lock_requiring: bool,
}

pub const HELP: CommandSpec = CommandSpec {
    name: "help",
    auth: false,
    min_args: 0,
    min_opt_pairs: None,
    lock_requiring: false,
};

pub const CREATE: CommandSpec = CommandSpec {
    name: "create",
    auth: true,
    min_args: 1,
    min_opt_pairs: Some(1),
    lock_requiring: true,
};

pub const CLOSE: CommandSpec = CommandSpec {
    name: "close",
    auth: true,
    min_args: 1,
    min_opt_pairs: None,
    lock_requiring: true,
};

pub const REGISTER: CommandSpec = CommandSpec {
    name: "register",
    auth: true,
    min_args: 2,
    min_opt_pairs: None,
    lock_requiring: true,
};

pub const SHOW: CommandSpec = CommandSpec {
    name: "show",
    auth: false,
    min_args: 0,
    min_opt_pairs: None,
    lock_requiring: false,
};

pub const JOBS: CommandSpec = CommandSpec {
    name: "jobs",
    auth: false,
    min_args: 1,
    min_opt_pairs: None,
    lock_requiring: false,
};

pub const QUIT: CommandSpec = CommandSpec {
    name: "quit",
    auth: false,
    min_args: 0,
    min_opt_pairs: None,
    lock_requiring: false,
};

pub const COMMANDS: &[CommandSpec] = &[HELP, CREATE, CLOSE, REGISTER, SHOW, JOBS, QUIT];

/// Look a command up by name (case-sensitive, matching the original).
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// The fixed help text returned by the `help` command, listing every
/// command's usage. Kept here rather than in the server so the client can
/// also render it offline if it ever needs to (e.g. a `--help` flag).
pub const HELP_TEXT: &str = "\
Available commands:
  help                                        show this message
  create <name> <job> <capacity> [...]        create a new event (auth required)
  close <event_id>                            close an event you created (auth required)
  register <event_id> <job_id>                volunteer for a job (auth required)
  show [event_id]                             list events, or show one event's detail
  jobs <event_id>                              show the volunteer table for an event
  quit                                          disconnect
";
