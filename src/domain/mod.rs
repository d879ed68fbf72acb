// Domain layer: view models and ports. No HTTP or filesystem code lives here.

pub mod model;
pub mod ports;
