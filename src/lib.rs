pub mod debugger;
pub mod rpc;
pub mod ui;
