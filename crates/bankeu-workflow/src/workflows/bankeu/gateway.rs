use serde::{Deserialize, Serialize};

/// Process-wide toggle controlling whether forwarding to the department is
/// currently permitted. The workflow reads one value per decision and never
/// mutates it; toggling is an admin action outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGateway {
    pub open: bool,
}

impl WorkflowGateway {
    pub const fn open() -> Self {
        Self { open: true }
    }

    pub const fn closed() -> Self {
        Self { open: false }
    }
}

/// Source of the gateway value so hosting services can back it with an
/// admin-controlled toggle while decisions still see a point-in-time value.
pub trait GatewaySource: Send + Sync {
    fn current(&self) -> WorkflowGateway;
}

/// Fixed gateway value, used by tests and single-shot CLI runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticGateway(pub WorkflowGateway);

impl GatewaySource for StaticGateway {
    fn current(&self) -> WorkflowGateway {
        self.0
    }
}
