use anyhow::{anyhow, bail};
use netconn_lib::{ClientId, ConnectStatus, HOST_SHUTDOWN_REASON};

/// How the simulated transport reports a client disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonArg {
  /// No reason string, the transport lost the link
  None,
  HostShutdown,
  Status(ConnectStatus),
}

impl ReasonArg {
  /// Disconnect reason string as the transport would carry it
  pub fn to_reason_string(&self) -> String {
    match self {
      ReasonArg::None => String::new(),
      ReasonArg::HostShutdown => HOST_SHUTDOWN_REASON.to_string(),
      ReasonArg::Status(status) => status.encode(),
    }
  }
}

/// One line typed into the harness console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
  HostIp { address: String, port: u16 },
  HostSession,
  JoinIp { address: String, port: u16 },
  JoinSession,
  Shutdown,
  Connected(ClientId),
  Disconnected { client_id: ClientId, reason: ReasonArg },
  Approve {
    client_id: ClientId,
    player_id: String,
    player_name: Option<String>,
  },
  ServerStarted,
  ServerStopped,
  TransportFailure,
  /// Session owned by the local player, or joined as a member
  SessionCreate { id: String, is_host: bool },
  SessionDrop,
  GameStarted,
  GameEnded,
  Rejoin(bool),
  State,
  Help,
  Quit,
}

pub const HELP: &str = "\
commands:
  host ip <address> <port>        start hosting on an address
  host session                    start hosting through the current session
  join ip <address> <port>        connect to a host address
  join session                    connect through the current session
  shutdown                        user requested shutdown
  connected <client-id>           transport reports a connected client
  disconnected <client-id> [none|host-shutdown|<status>]
                                  transport reports a disconnect with the given reason
  approve <client-id> <player-id> [name]
                                  run the approval check for a connecting client
  server-started | server-stopped | transport-failure
  session host <id> | session join <id> | session drop
                                  attach a session owned by this player or joined as a member
  game start | game end           game inside the hosted session starts or ends
  rejoin on|off                   whether rejoining the session succeeds
  state                           print the current state
  help | quit";

impl std::str::FromStr for ConsoleCommand {
  type Err = anyhow::Error;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let words = line.split_whitespace().collect::<Vec<_>>();
    let command = match words.as_slice() {
      ["host", "ip", address, port] => ConsoleCommand::HostIp {
        address: address.to_string(),
        port: parse_port(port)?,
      },
      ["host", "session"] => ConsoleCommand::HostSession,
      ["join", "ip", address, port] => ConsoleCommand::JoinIp {
        address: address.to_string(),
        port: parse_port(port)?,
      },
      ["join", "session"] => ConsoleCommand::JoinSession,
      ["shutdown"] => ConsoleCommand::Shutdown,
      ["connected", id] => ConsoleCommand::Connected(parse_client_id(id)?),
      ["disconnected", id, rest @ ..] => {
        let reason = match rest {
          [] | ["none"] => ReasonArg::None,
          ["host-shutdown"] => ReasonArg::HostShutdown,
          [status] => ReasonArg::Status(ConnectStatus::try_from(*status)?),
          _ => bail!("Usage: disconnected <client-id> [none|host-shutdown|<status>]"),
        };
        ConsoleCommand::Disconnected {
          client_id: parse_client_id(id)?,
          reason,
        }
      }
      ["approve", id, player_id, name @ ..] => ConsoleCommand::Approve {
        client_id: parse_client_id(id)?,
        player_id: player_id.to_string(),
        player_name: (!name.is_empty()).then(|| name.join(" ")),
      },
      ["server-started"] => ConsoleCommand::ServerStarted,
      ["server-stopped"] => ConsoleCommand::ServerStopped,
      ["transport-failure"] => ConsoleCommand::TransportFailure,
      ["session", "host", id] => ConsoleCommand::SessionCreate {
        id: id.to_string(),
        is_host: true,
      },
      ["session", "join", id] => ConsoleCommand::SessionCreate {
        id: id.to_string(),
        is_host: false,
      },
      ["session", "drop"] => ConsoleCommand::SessionDrop,
      ["game", "start"] => ConsoleCommand::GameStarted,
      ["game", "end"] => ConsoleCommand::GameEnded,
      ["rejoin", "on"] => ConsoleCommand::Rejoin(true),
      ["rejoin", "off"] => ConsoleCommand::Rejoin(false),
      ["state"] => ConsoleCommand::State,
      ["help"] | ["?"] => ConsoleCommand::Help,
      ["quit"] | ["exit"] => ConsoleCommand::Quit,
      [] => bail!("Empty command"),
      _ => bail!("Unknown command: {}", line.trim()),
    };
    Ok(command)
  }
}

fn parse_port(s: &str) -> Result<u16, anyhow::Error> {
  s.parse().map_err(|_| anyhow!("Invalid port: {}", s))
}

fn parse_client_id(s: &str) -> Result<ClientId, anyhow::Error> {
  s.parse().map_err(|_| anyhow!("Invalid client id: {}", s))
}
