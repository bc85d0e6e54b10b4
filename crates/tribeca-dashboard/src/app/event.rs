/*
[INPUT]:  Transport worker output, stdin lines, shutdown signals
[OUTPUT]: A single event type consumed by the dashboard loop
[POS]:    Runner layer - event definitions
[UPDATE]: When the loop gains a new event source
*/

use tribeca_messaging::TransportEvent;

/// Everything the dashboard loop reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Lifecycle change or inbound frame from the transport worker
    Transport(TransportEvent),

    /// One line typed by the operator
    Input(String),

    /// Stdin reached end of file
    InputClosed,

    /// The transport worker stopped for good
    TransportStopped,

    /// Application should shut down
    Shutdown,
}
