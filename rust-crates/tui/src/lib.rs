pub mod claim;
pub mod client;
pub mod connector;
pub mod session;
pub mod ui;
pub mod wallets;

pub use client::{
    AppController,
    AppSnapshot,
    ControllerError,
    Status,
    StatusKind,
};
pub use connector::{
    AccountEvent,
    ConnectorStrategy,
};
pub use session::{
    MAX_SESSION,
    Phase,
    Session,
};
