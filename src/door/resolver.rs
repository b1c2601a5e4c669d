use super::state::{Action, DoorCommand, OptoSide};

/// What a confirmed "extreme reached" transition does to the command register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
  /// The command to store next
  pub next: DoorCommand,
  /// Set when the transition completes exactly the outstanding command
  pub capture: Option<Action>,
}

/// Resolve the outstanding command against a switch reaching its extreme.
///
/// Reaching either extreme always clears the register. A duration is only captured when the switch confirms the
/// command that was outstanding; anything else (manual moves, operate toggles, the opposite extreme) is dropped.
pub fn resolve(side: OptoSide, outstanding: DoorCommand) -> Resolution {
  let capture = match (side, outstanding) {
    (OptoSide::Opened, DoorCommand::Open) => Some(Action::Open),
    (OptoSide::Closed, DoorCommand::Close) => Some(Action::Close),
    (_, DoorCommand::None | DoorCommand::Operate)
    | (OptoSide::Opened, DoorCommand::Close)
    | (OptoSide::Closed, DoorCommand::Open) => None,
  };

  Resolution {
    next: DoorCommand::None,
    capture,
  }
}
