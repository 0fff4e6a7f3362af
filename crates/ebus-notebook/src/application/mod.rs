//! Application layer use cases for ebus-notebook.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `ebus_core`) and the infrastructure (sockets, processes,
//! files).  Use cases here orchestrate the pure pieces to fulfil one user
//! goal and reach the outside world only through traits such as
//! [`crate::infrastructure::network::Connector`] and
//! [`input_gate::InputProvider`], so every path is unit-testable with
//! scripted doubles.
//!
//! # Sub-modules
//!
//! - **`input_gate`** – Decides the `${input}` value for a batch, asking the
//!   user when the template needs it and interactive mode is on.
//!
//! - **`send_to_ebusd`** – `filter_and_send`: filter, check, gate, format,
//!   connect, then run the session.
//!
//! - **`run_cell`** – The notebook cell flow: convert TypeSpec, select and
//!   send test commands, upload definitions, build a report.

pub mod input_gate;
pub mod run_cell;
pub mod send_to_ebusd;
