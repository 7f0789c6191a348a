pub mod controller_service;
pub mod coordinator;
pub mod dispatch;
pub mod jog;
pub mod safety;

pub use coordinator::MotionCoordinator;
pub use safety::SafetyGate;
