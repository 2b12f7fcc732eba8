//! The simulation run/pause/step state.

use std::fmt;

/// Status of the simulation loop as seen by the stepping controller.
///
/// `Running` and `Stepping` permit the loop to advance. `Stopping` is a
/// transient request to halt once the in-flight tick finishes; the loop
/// turns it into `Stopped` at the next tick boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SimulationStatus {
    /// Not yet initialised.
    #[default]
    Unknown,
    /// Idle; the loop only services requests.
    Stopped,
    /// Free-running.
    Running,
    /// Halt requested; takes effect after the current tick.
    Stopping,
    /// Executing explicitly requested single ticks.
    Stepping,
}

impl SimulationStatus {
    /// True if the loop may advance physics in this status.
    pub fn permits_tick(self) -> bool {
        matches!(self, Self::Running | Self::Stepping)
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stepping => "stepping",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_and_stepping_permit_ticks() {
        assert!(SimulationStatus::Running.permits_tick());
        assert!(SimulationStatus::Stepping.permits_tick());
        assert!(!SimulationStatus::Stopped.permits_tick());
        assert!(!SimulationStatus::Stopping.permits_tick());
        assert!(!SimulationStatus::Unknown.permits_tick());
    }
}
