// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! car-core: Domain types for the codex-autorunner harness

pub mod macros;

pub mod clock;
pub mod destination;
pub mod event;
pub mod fsutil;
pub mod id;
pub mod paths;
pub mod process;
pub mod repo;
pub mod ticket;

pub use clock::{rfc3339_from_epoch_ms, Clock, FakeClock, SystemClock};
pub use destination::{Destination, DestinationError, Mount};
pub use event::{FlowEventKind, StepId};
pub use fsutil::write_atomic;
pub use id::short;
pub use paths::{
    app_server_workspace_root, global_state_root, hub_templates_root, repo_state_root, PathError,
    GLOBAL_STATE_ROOT_ENV, STATE_DIR_NAME,
};
pub use process::{pid_alive, ManagedProcessRecord, ProcessRecordError};
pub use repo::{RepoEntry, RepoId, RepoKind};
pub use ticket::{
    checklist_progress, list_ticket_files, parse_ticket, set_done, Ticket, TicketError,
    TicketFront,
};
