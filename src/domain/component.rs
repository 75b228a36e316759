//! Pipeline component identities and their display names.
//!
//! Every counter cluster belongs to a component: a kind (file, tcp, program,
//! ...) optionally combined with a direction telling whether the component
//! receives records (a source) or writes them (a destination).

use std::fmt;

/// The kind of pipeline component that owns a counter cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    None,
    File,
    Pipe,
    Tcp,
    Udp,
    Tcp6,
    Udp6,
    UnixStream,
    UnixDgram,
    Syslog,
    Network,
    Internal,
    Logstore,
    Program,
    Sql,
    SunStreams,
    Usertty,
    Group,
    Center,
    Host,
    Global,
    Mongodb,
    Class,
    RuleId,
    Tag,
    Severity,
    Facility,
    Sender,
    Smtp,
    Amqp,
    Stomp,
    Redis,
    Snmp,
}

impl ComponentKind {
    /// Every component kind, in declaration order.
    pub const ALL: [ComponentKind; 33] = [
        ComponentKind::None,
        ComponentKind::File,
        ComponentKind::Pipe,
        ComponentKind::Tcp,
        ComponentKind::Udp,
        ComponentKind::Tcp6,
        ComponentKind::Udp6,
        ComponentKind::UnixStream,
        ComponentKind::UnixDgram,
        ComponentKind::Syslog,
        ComponentKind::Network,
        ComponentKind::Internal,
        ComponentKind::Logstore,
        ComponentKind::Program,
        ComponentKind::Sql,
        ComponentKind::SunStreams,
        ComponentKind::Usertty,
        ComponentKind::Group,
        ComponentKind::Center,
        ComponentKind::Host,
        ComponentKind::Global,
        ComponentKind::Mongodb,
        ComponentKind::Class,
        ComponentKind::RuleId,
        ComponentKind::Tag,
        ComponentKind::Severity,
        ComponentKind::Facility,
        ComponentKind::Sender,
        ComponentKind::Smtp,
        ComponentKind::Amqp,
        ComponentKind::Stomp,
        ComponentKind::Redis,
        ComponentKind::Snmp,
    ];

    /// Display name used in published statistics.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::None => "none",
            ComponentKind::File => "file",
            ComponentKind::Pipe => "pipe",
            ComponentKind::Tcp => "tcp",
            ComponentKind::Udp => "udp",
            ComponentKind::Tcp6 => "tcp6",
            ComponentKind::Udp6 => "udp6",
            ComponentKind::UnixStream => "unix-stream",
            ComponentKind::UnixDgram => "unix-dgram",
            ComponentKind::Syslog => "syslog",
            ComponentKind::Network => "network",
            ComponentKind::Internal => "internal",
            ComponentKind::Logstore => "logstore",
            ComponentKind::Program => "program",
            ComponentKind::Sql => "sql",
            ComponentKind::SunStreams => "sun-streams",
            ComponentKind::Usertty => "usertty",
            ComponentKind::Group => "group",
            ComponentKind::Center => "center",
            ComponentKind::Host => "host",
            ComponentKind::Global => "global",
            ComponentKind::Mongodb => "mongodb",
            ComponentKind::Class => "class",
            ComponentKind::RuleId => "rule_id",
            ComponentKind::Tag => "tag",
            ComponentKind::Severity => "severity",
            ComponentKind::Facility => "facility",
            ComponentKind::Sender => "sender",
            ComponentKind::Smtp => "smtp",
            ComponentKind::Amqp => "amqp",
            ComponentKind::Stomp => "stomp",
            ComponentKind::Redis => "redis",
            ComponentKind::Snmp => "snmp",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a component receives or emits records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Direction {
    /// Neither side of the pipeline (center, global, host, ...)
    #[default]
    None,
    /// Records enter the pipeline here
    Source,
    /// Records leave the pipeline here
    Destination,
}

impl Direction {
    /// Prefix prepended to component names: `src.`, `dst.` or nothing.
    pub fn prefix(self) -> &'static str {
        match self {
            Direction::Source => "src.",
            Direction::Destination => "dst.",
            Direction::None => "",
        }
    }
}

/// A component kind together with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component {
    pub kind: ComponentKind,
    pub direction: Direction,
}

impl Component {
    pub const fn new(kind: ComponentKind, direction: Direction) -> Self {
        Self { kind, direction }
    }

    pub const fn source(kind: ComponentKind) -> Self {
        Self::new(kind, Direction::Source)
    }

    pub const fn destination(kind: ComponentKind) -> Self {
        Self::new(kind, Direction::Destination)
    }

    /// A component with no direction.
    pub const fn plain(kind: ComponentKind) -> Self {
        Self::new(kind, Direction::None)
    }

    /// Name combining direction and kind, e.g. `src.file` or `center`.
    ///
    /// Groups are rendered as `source` or `destination`. A group always has a
    /// direction; one without is a caller bug.
    pub fn display_name(&self) -> String {
        if self.kind == ComponentKind::Group {
            return match self.direction {
                Direction::Source => "source".to_string(),
                Direction::Destination => "destination".to_string(),
                Direction::None => {
                    debug_assert!(false, "group component registered without a direction");
                    ComponentKind::Group.name().to_string()
                }
            };
        }
        format!("{}{}", self.direction.prefix(), self.kind.name())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
