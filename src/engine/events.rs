use crate::config::MapConfigHandle;

/// One-way control messages from a UI or timer, see [SearchEngine::handle](super::SearchEngine::handle).
#[derive(Clone, Debug)]
pub enum ControlEvent {
    Start,
    Pause,
    Reset,
    Step,
    Rebuild,
    /// The engine should follow a different configuration from now on.
    MapConfigurationChanged(MapConfigHandle),
    /// Seconds elapsed since the previous tick.
    Tick(f32),
}
