pub mod animation;
pub mod assets;
pub mod clock;
pub mod control_panel;
pub mod input_adapter;
pub mod input_router;
pub mod orbit;
pub mod timer;

pub use animation::{AnimationLoop, FrameFault, LoopError, LoopState, Reschedule, StopToken};
pub use assets::{AssetQueue, AssetRequest, LoadEvent, Placement};
pub use clock::{Clock, ManualClock};
pub use control_panel::{Binding, ControlPanel, FieldRef, FieldValue};
pub use input_adapter::WinitInput;
pub use input_router::{InputRouter, ScrollState};
pub use orbit::OrbitControls;
