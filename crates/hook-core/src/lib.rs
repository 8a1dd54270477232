//! hook-core : descripteurs de mise en page VM, décodage de frame, filtrage
//! des points d'arrêt, contrôle du pas-à-pas et décodage de la boîte aux
//! lettres d'arrêt asynchrone pour une charge utile de debugger in-process.
//!
//! Tout ici est pur et `#![forbid(unsafe_code)]`. La mémoire processus brute,
//! les symboles exportés et le thread worker appartiennent à `hook-abi`, qui
//! détient un [`HookEngine`](engine::HookEngine) et lui fournit les
//! événements décodés via la façade [`VmMemoryReader`](reader::VmMemoryReader).

#![forbid(unsafe_code)]

pub mod breakpoint;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod frame;
pub mod mailbox;
pub mod reader;
pub mod step;

pub use breakpoint::{BreakpointEntry, BreakpointTable, HitRecord};
pub use descriptor::{Dialect, EventKind, GenericOffsets, VmLayoutDescriptor};
pub use engine::{EventOutcome, HookEngine};
pub use error::{HookError, HookResult};
pub use frame::{decode_event, decode_frame, DecodedEvent, DecodedFrame};
pub use mailbox::{HookInstallRequest, MailboxCommand};
pub use reader::{StackProbe, VmMemoryReader};
pub use step::{StepSignal, StepState};
